//! The whole-program linker.
//!
//! Linking merges translation units into one output object vector. External
//! names share a single namespace across all units; internal names are
//! scoped to their unit. Emission is reachability driven: an object is
//! appended to the output the first time a resolved reference demands it,
//! and every cross-object reference becomes an index into the output
//! vector. On the way out, indirect calls through known function globals
//! are lowered to direct calls.

use crate::error::{
    DuplicateExternalFunctionError, DuplicateInternalError, IncompatibleDefinitionError,
    LinkError, LinkInternalError, StartUndefinedError, UndefinedExternError,
    UndefinedInternError,
};
use crate::intern::{known, NameId, TypeId};
use crate::op::{self, Operation};
use crate::ty::TypeCache;
use crate::value::Value;
use crate::verify::unconvert;
use crate::{DataDefinition, FunctionDefinition, Linkage, Object};
use bumpalo::Bump;
use girder_diagnostics::ice;
use girder_span::Span;
use rustc_hash::FxHashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

/// Amends things for tests: internal errors escape as panics instead of
/// being converted into [`LinkError`]s.
static TESTING: AtomicBool = AtomicBool::new(false);

/// Toggle test mode. See [`link_main`] and [`link_lib`].
pub fn set_testing(testing: bool) {
    TESTING.store(testing, Ordering::Relaxed);
}

fn testing() -> bool {
    TESTING.load(Ordering::Relaxed)
}

/// Return all objects transitively referenced from the external function
/// `_start`, or an error. Linking may mutate the passed objects. It is the
/// caller's responsibility to ensure all translation units were produced
/// for the same architecture and platform.
pub fn link_main(units: Vec<Vec<Object>>) -> Result<Vec<Object>, LinkError> {
    guarded(move || {
        let arena = Bump::new();
        let cache = TypeCache::new(&arena);
        let mut linker = Linker::new(units, &cache)?;
        linker.link_main()?;
        Ok(linker.out)
    })
}

/// Return all objects with external linkage defined in the translation
/// units, in sorted name order. A trivial `main` returning zero is injected
/// when no unit defines one. Linking may mutate the passed objects.
pub fn link_lib(mut units: Vec<Vec<Object>>) -> Result<Vec<Object>, LinkError> {
    guarded(move || {
        let has_main = units.iter().flatten().any(|object| {
            matches!(object, Object::Function(f) if f.name == known().main)
        });
        if !has_main {
            units.push(vec![injected_main()]);
        }
        let arena = Bump::new();
        let cache = TypeCache::new(&arena);
        let mut linker = Linker::new(units, &cache)?;
        linker.link()?;
        Ok(linker.out)
    })
}

/// Convert internal invariant violations raised below the public
/// entrypoints into returned errors, unless test mode wants them verbatim.
fn guarded<F>(f: F) -> Result<Vec<Object>, LinkError>
where
    F: FnOnce() -> Result<Vec<Object>, LinkError>,
{
    if testing() {
        return f();
    }
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = match payload.downcast_ref::<&str>() {
                Some(s) => (*s).to_owned(),
                None => match payload.downcast_ref::<String>() {
                    Some(s) => s.clone(),
                    None => "linker panicked".to_owned(),
                },
            };
            Err(LinkInternalError { message }.into())
        }
    }
}

/// The `main` definition injected by [`link_lib`]: an external `int32 main`
/// storing zero into its result slot.
fn injected_main() -> Object {
    let ids = known();
    let span = Span::empty();
    Object::Function(FunctionDefinition {
        name: ids.main,
        type_name: NameId::default(),
        type_id: TypeId::new("func()int32"),
        linkage: Linkage::External,
        arguments: Vec::new(),
        results: Vec::new(),
        body: vec![
            Operation::Result(op::Result {
                address: true,
                index: 0,
                type_id: ids.ptr_int32,
                span,
            }),
            Operation::Const32(op::Const32 {
                l_op: false,
                type_id: ids.int32,
                value: 0,
                span,
            }),
            Operation::Store(op::Store {
                bit_offset: 0,
                bits: 0,
                type_id: ids.int32,
                span,
            }),
            Operation::Drop(op::Drop {
                comma: false,
                l_op: false,
                type_id: ids.int32,
                span,
            }),
            Operation::BeginScope(op::BeginScope { value: false, span }),
            Operation::Return(op::Return { span }),
            Operation::EndScope(op::EndScope { value: false, span }),
        ],
        span,
    })
}

/// A reference to an object slot in the input units.
type Ref = (usize, usize);

struct Linker<'v, 't> {
    /// Idempotence table: input slot to output index.
    defined: FxHashMap<Ref, usize>,
    /// External symbol table: name to input slot.
    external: FxHashMap<NameId, Ref>,
    /// Internal symbol table: (name, unit) to index within the unit.
    internal: FxHashMap<(NameId, usize), usize>,
    input: Vec<Vec<Option<Object>>>,
    out: Vec<Object>,
    cache: &'v TypeCache<'t>,
}

impl<'v, 't> Linker<'v, 't> {
    fn new(units: Vec<Vec<Object>>, cache: &'v TypeCache<'t>) -> Result<Self, LinkError> {
        let mut linker = Linker {
            defined: FxHashMap::default(),
            external: FxHashMap::default(),
            internal: FxHashMap::default(),
            input: units
                .into_iter()
                .map(|unit| unit.into_iter().map(Some).collect())
                .collect(),
            out: Vec::new(),
            cache,
        };
        linker.collect_symbols()?;
        Ok(linker)
    }

    fn collect_symbols(&mut self) -> Result<(), LinkError> {
        tracing::debug!(units = self.input.len(), "collecting symbols");
        for unit in 0..self.input.len() {
            for index in 0..self.input[unit].len() {
                let (name, linkage, type_id, is_function) =
                    match self.input[unit][index].as_ref() {
                        Some(Object::Data(d)) => (d.name, d.linkage, d.type_id, false),
                        Some(Object::Function(f)) => (f.name, f.linkage, f.type_id, true),
                        None => ice!("object taken during symbol collection"),
                    };
                match linkage {
                    Linkage::External => match self.external.get(&name).copied() {
                        Some(existing) => {
                            self.merge_external(name, existing, (unit, index), type_id, is_function)?
                        }
                        None => {
                            self.external.insert(name, (unit, index));
                        }
                    },
                    Linkage::Internal => {
                        if self.internal.insert((name, unit), index).is_some() {
                            return Err(DuplicateInternalError {
                                name: name.to_string(),
                            }
                            .into());
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolve a duplicate external definition.
    ///
    /// Duplicate data definitions must agree on type; a later initializer
    /// fills in a missing earlier one but cannot overwrite it. A duplicate
    /// function definition may only replace a single-`Panic` stub.
    fn merge_external(
        &mut self,
        name: NameId,
        existing: Ref,
        incoming: Ref,
        type_id: TypeId,
        is_function: bool,
    ) -> Result<(), LinkError> {
        let existing_object = self.input[existing.0][existing.1]
            .as_ref()
            .unwrap_or_else(|| ice!("object taken during symbol collection"));
        match (existing_object, is_function) {
            (Object::Data(d), false) => {
                if d.type_id != type_id {
                    return Err(IncompatibleDefinitionError {
                        name: name.to_string(),
                    }
                    .into());
                }
                let incoming_value = match self.input[incoming.0][incoming.1].as_ref() {
                    Some(Object::Data(d)) => d.value.clone(),
                    _ => ice!("mismatched object shapes in symbol merge"),
                };
                if let Some(value) = incoming_value {
                    let Some(Object::Data(existing_data)) =
                        self.input[existing.0][existing.1].as_mut()
                    else {
                        ice!("object taken during symbol collection");
                    };
                    if existing_data.value.is_none() {
                        existing_data.value = Some(value);
                    }
                }
                Ok(())
            }
            (Object::Function(f), true) => {
                if f.type_id != type_id {
                    return Err(IncompatibleDefinitionError {
                        name: name.to_string(),
                    }
                    .into());
                }
                // A single-panic body is a stub; the real definition takes
                // over.
                if f.body.len() == 1 && matches!(f.body[0], Operation::Panic(_)) {
                    self.external.insert(name, incoming);
                    return Ok(());
                }
                Err(DuplicateExternalFunctionError {
                    name: name.to_string(),
                }
                .into())
            }
            _ => Err(IncompatibleDefinitionError {
                name: name.to_string(),
            }
            .into()),
        }
    }

    /// Emit the object behind `r`, returning its output index. Idempotent.
    fn define(&mut self, r: Ref) -> Result<usize, LinkError> {
        if let Some(&index) = self.defined.get(&r) {
            return Ok(index);
        }
        let object = match self.input[r.0][r.1].take() {
            Some(object) => object,
            None => ice!("object defined twice"),
        };
        match object {
            Object::Data(d) => self.define_data(r, d),
            Object::Function(f) => self.define_func(r, f),
        }
    }

    fn define_data(&mut self, r: Ref, mut d: DataDefinition) -> Result<usize, LinkError> {
        let index = self.out.len();
        self.defined.insert(r, index);
        let value = d.value.take();
        let span = d.span;
        self.out.push(Object::Data(d));
        let value = match value {
            Some(mut value) => {
                self.data_initializer(&mut value, r.0, span)?;
                Some(value)
            }
            None => None,
        };
        let Object::Data(d) = &mut self.out[index] else {
            ice!("output slot changed shape");
        };
        d.value = value;
        Ok(index)
    }

    fn define_func(&mut self, r: Ref, mut f: FunctionDefinition) -> Result<usize, LinkError> {
        tracing::trace!(function = %f.name, "emitting function");
        let index = self.out.len();
        self.defined.insert(r, index);
        let mut body = std::mem::take(&mut f.body);
        self.out.push(Object::Function(f));
        unconvert(&mut body);
        for op in body.iter_mut() {
            match op {
                Operation::Global(global) => {
                    global.index = self.resolve_global(
                        global.name,
                        global.linkage,
                        r.0,
                        global.span,
                    )? as i64;
                }
                Operation::Const(constant) => match &mut constant.value {
                    Value::Address(address) => {
                        let resolved = self.resolve_address(address.name, address.linkage, r.0, constant.span)?;
                        address.index = resolved as i64;
                    }
                    value => ice!(format!("unlinkable constant operand {value}")),
                },
                Operation::VariableDeclaration(decl) => {
                    let span = decl.span;
                    if let Some(value) = decl.value.as_mut() {
                        self.variable_initializer(value, span)?;
                    }
                }
                _ => {}
            }
        }
        self.check_calls(&mut body);
        let Object::Function(f) = &mut self.out[index] else {
            ice!("output slot changed shape");
        };
        f.body = body;
        Ok(index)
    }

    /// Recursively link a function-local variable initializer: composite
    /// values are walked element-wise and address values are resolved to
    /// output indices. Only externally linked addresses may appear here.
    fn variable_initializer(&mut self, value: &mut Value, span: Span) -> Result<(), LinkError> {
        match value {
            Value::Int32(_)
            | Value::Int64(_)
            | Value::Float32(_)
            | Value::Float64(_)
            | Value::Complex64 { .. }
            | Value::Complex128 { .. }
            | Value::String(_)
            | Value::WideString(_) => Ok(()),
            Value::Address(address) => match address.linkage {
                Linkage::External => match self.external.get(&address.name).copied() {
                    Some(r) => {
                        address.index = self.define(r)? as i64;
                        Ok(())
                    }
                    None => Err(UndefinedExternError {
                        name: address.name.to_string(),
                        position: span.to_string(),
                    }
                    .into()),
                },
                Linkage::Internal => ice!(format!(
                    "internal address {} in a variable initializer",
                    address.name
                )),
            },
            Value::Composite(composite) => {
                for value in composite.values.iter_mut() {
                    self.variable_initializer(value, span)?;
                }
                Ok(())
            }
            Value::Designated(designated) => self.variable_initializer(&mut designated.value, span),
        }
    }

    /// Recursively link a data definition initializer: composite values are
    /// walked element-wise and address values are resolved to output indices
    /// by their linkage.
    fn data_initializer(
        &mut self,
        value: &mut Value,
        unit: usize,
        span: Span,
    ) -> Result<(), LinkError> {
        match value {
            Value::Int32(_)
            | Value::Int64(_)
            | Value::Float32(_)
            | Value::Float64(_)
            | Value::Complex64 { .. }
            | Value::Complex128 { .. }
            | Value::String(_)
            | Value::WideString(_) => Ok(()),
            Value::Address(address) => {
                let resolved = self.resolve_address(address.name, address.linkage, unit, span)?;
                address.index = resolved as i64;
                Ok(())
            }
            Value::Composite(composite) => {
                for value in composite.values.iter_mut() {
                    self.data_initializer(value, unit, span)?;
                }
                Ok(())
            }
            Value::Designated(designated) => {
                self.data_initializer(&mut designated.value, unit, span)
            }
        }
    }

    fn resolve_address(
        &mut self,
        name: NameId,
        linkage: Linkage,
        unit: usize,
        span: Span,
    ) -> Result<usize, LinkError> {
        match linkage {
            Linkage::External => match self.external.get(&name).copied() {
                Some(r) => self.define(r),
                None => Err(UndefinedExternError {
                    name: name.to_string(),
                    position: span.to_string(),
                }
                .into()),
            },
            Linkage::Internal => match self.internal.get(&(name, unit)).copied() {
                Some(index) => self.define((unit, index)),
                None => Err(UndefinedInternError {
                    name: name.to_string(),
                    position: span.to_string(),
                }
                .into()),
            },
        }
    }

    /// Resolve a `Global` operand. Unresolved external names get one retry
    /// under the `__builtin_` prefix before failing.
    fn resolve_global(
        &mut self,
        name: NameId,
        linkage: Linkage,
        unit: usize,
        span: Span,
    ) -> Result<usize, LinkError> {
        match linkage {
            Linkage::External => {
                if let Some(r) = self.external.get(&name).copied() {
                    return self.define(r);
                }
                let mut prefixed = Vec::from(known().builtin_prefix.as_bytes());
                prefixed.extend_from_slice(name.as_bytes());
                let fallback = NameId::from_bytes(&prefixed);
                match self.external.get(&fallback).copied() {
                    Some(r) => self.define(r),
                    None => Err(UndefinedExternError {
                        name: name.to_string(),
                        position: span.to_string(),
                    }
                    .into()),
                }
            }
            Linkage::Internal => match self.internal.get(&(name, unit)).copied() {
                Some(index) => self.define((unit, index)),
                None => Err(UndefinedInternError {
                    name: name.to_string(),
                    position: span.to_string(),
                }
                .into()),
            },
        }
    }

    /// Lower indirect calls through known function globals to direct calls.
    ///
    /// A `Global` immediately preceding an `Arguments` whose referent is a
    /// function definition marks the following `CallFP` as lowerable: the
    /// call is rewritten to a static `Call` of the pointee function type and
    /// the feeding `Global` is dropped from emission.
    fn check_calls(&mut self, body: &mut Vec<Operation>) {
        let mut out = Vec::with_capacity(body.len());
        let mut static_targets: Vec<i64> = Vec::new();
        let mut previous_global: Option<i64> = None;
        for op in body.drain(..) {
            let this_global = match &op {
                Operation::Global(global) => Some(global.index),
                _ => None,
            };
            match op {
                Operation::Arguments(mut arguments) => {
                    let target = previous_global.filter(|&index| {
                        matches!(self.out.get(index as usize), Some(Object::Function(_)))
                    });
                    match target {
                        Some(index) => {
                            arguments.function_pointer = false;
                            static_targets.push(index);
                            // The feeding global is no longer needed.
                            out.pop();
                            out.push(Operation::Arguments(arguments));
                        }
                        None => {
                            arguments.function_pointer = true;
                            static_targets.push(-1);
                            out.push(Operation::Arguments(arguments));
                        }
                    }
                }
                Operation::Call(_) => {
                    ice!("static call reached the linker before lowering")
                }
                Operation::CallFP(call) => {
                    let index = match static_targets.pop() {
                        Some(index) => index,
                        None => ice!("call without a preceding arguments operation"),
                    };
                    match index >= 0 {
                        true => {
                            let t = self.cache.must_type(call.type_id);
                            let Some(pointer) = t.as_pointer() else {
                                ice!(format!("call through non-pointer type {}", call.type_id));
                            };
                            out.push(Operation::Call(op::Call {
                                arguments: call.arguments,
                                comma: call.comma,
                                index,
                                type_id: pointer.element.id(),
                                span: call.span,
                            }));
                        }
                        false => out.push(Operation::CallFP(call)),
                    }
                }
                other => out.push(other),
            }
            previous_global = this_global;
        }
        *body = out;
    }

    /// Emit the transitive closure of `_start`.
    fn link_main(&mut self) -> Result<(), LinkError> {
        let start = known().start;
        let Some(&r) = self.external.get(&start) else {
            return Err(StartUndefinedError {}.into());
        };
        self.define(r)?;
        tracing::debug!(objects = self.out.len(), "linked program");
        Ok(())
    }

    /// Emit every external object in sorted name order.
    fn link(&mut self) -> Result<(), LinkError> {
        let mut names: Vec<NameId> = self.external.keys().copied().collect();
        names.sort_unstable();
        for name in names {
            let r = self.external[&name];
            self.define(r)?;
        }
        tracing::debug!(objects = self.out.len(), "linked library");
        Ok(())
    }
}

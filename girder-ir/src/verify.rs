//! The per-function static verifier.
//!
//! Verification checks that a function body is a well typed program for the
//! abstract stack machine: scopes balance, every branch target exists, local
//! declarations appear in index order, and a flow sensitive abstract
//! execution over the body keeps the evaluation stack consistent at every
//! join point. As a side effect the body is normalized: no-op conversions
//! are removed, constant branches are folded, and unreachable operations
//! are pruned.

use crate::error::{
    DeclarationIndexError, EmptyFunctionBodyError, InvalidSingleOperationError,
    LabelRedefinedError, MissingReturnError, OpError, OpResult, OperationError,
    StackDepthMismatchError, StacksDifferError, UnbalancedScopeError, UnbalancedScopesError,
    UndefinedBranchTargetError, VerifyError,
};
use crate::intern::{known, NameId, TypeId};
use crate::op::{branch_key, Jmp, Operation};
use crate::ty::{FunctionType, TypeCache, TypeKind};
use crate::FunctionDefinition;
use bumpalo::Bump;
use girder_diagnostics::ice;
use rustc_hash::FxHashMap;

/// Remove conversions whose operand and result types agree.
pub(crate) fn unconvert(body: &mut Vec<Operation>) {
    body.retain(|op| !matches!(op, Operation::Convert(c) if c.type_id == c.result));
}

/// The context an operation's local verify contract runs against.
pub(crate) struct VerifyCtx<'v, 't> {
    /// The abstract evaluation stack of type ids.
    pub stack: Vec<TypeId>,
    pub cache: &'v TypeCache<'t>,
    /// The resolved type of the function under verification.
    pub func: &'t FunctionType<'t>,
    /// Types of the function's local variables, in declaration order.
    pub variables: Vec<TypeId>,
    /// Nesting depth of value scopes (statement expressions).
    pub block_value_level: u32,
}

impl<'v, 't> VerifyCtx<'v, 't> {
    /// Check and apply a binary operator contract: two equal-typed operands
    /// (or a pointer⊕integer pattern) replaced by one result of type `t`.
    pub(crate) fn binop(&mut self, t: TypeId) -> OpResult {
        let n = self.stack.len();
        if n < 2 {
            return Err(OpError::StackUnderflow);
        }
        let (a, b) = (self.stack[n - 2], self.stack[n - 1]);
        if a != b && !self.valid_ptr_binop(a, b) {
            return Err(OpError::MismatchedOperands { a, b });
        }
        if a != t {
            return Err(OpError::MismatchedResultType {
                got: a,
                expected: t,
            });
        }
        self.stack.truncate(n - 2);
        self.stack.push(a);
        Ok(())
    }

    /// Check a unary operator contract: a numeric operand at TOS, left in
    /// place.
    pub(crate) fn unop(&mut self, integral_only: bool) -> OpResult {
        let Some(&tos) = self.stack.last() else {
            return Err(OpError::StackUnderflow);
        };
        let kind = self.cache.must_type(tos).kind();
        match kind.is_integral() || (!integral_only && kind.is_float()) {
            true => Ok(()),
            false => Err(OpError::InvalidOperandType { got: tos }),
        }
    }

    /// Check and apply a comparison contract: a binary operator whose result
    /// is an int32 truth value.
    pub(crate) fn relop(&mut self, t: TypeId) -> OpResult {
        self.binop(t)?;
        *self.stack.last_mut().unwrap() = known().int32;
        Ok(())
    }

    /// Check and apply a conditional branch contract: an int32 condition at
    /// TOS, removed.
    pub(crate) fn branch(&mut self) -> OpResult {
        let Some(&tos) = self.stack.last() else {
            return Err(OpError::StackUnderflow);
        };
        let int32 = known().int32;
        if tos != int32 {
            return Err(OpError::UnexpectedBranchOperand {
                got: tos,
                expected: int32,
            });
        }
        self.stack.pop();
        Ok(())
    }

    /// The type compatibility relation used by operand checks.
    ///
    /// Identity is always assignable; a function type is promoted to a
    /// pointer to itself; two pointer types are assignable if either is the
    /// wildcard `*struct{}`, if their pointees agree, or if both point at
    /// function types with pointwise assignable result lists. Parameter
    /// lists are not checked, to allow forward declared signatures.
    pub(crate) fn assignable(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        let a = self.promote(a);
        let b = self.promote(b);
        if a == b {
            return true;
        }
        let ta = self.cache.must_type(a);
        let tb = self.cache.must_type(b);
        match (ta.as_pointer(), tb.as_pointer()) {
            (Some(pa), Some(pb)) => {
                let void_ptr = known().void_ptr;
                if a == void_ptr || b == void_ptr {
                    return true;
                }
                if pa.element.id() == pb.element.id() {
                    return true;
                }
                match (pa.element.as_function(), pb.element.as_function()) {
                    (Some(fa), Some(fb)) => {
                        fa.results.len() == fb.results.len()
                            && fa
                                .results
                                .iter()
                                .zip(fb.results.iter())
                                .all(|(ra, rb)| self.assignable(ra.id(), rb.id()))
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Whether an array of `expected`'s item type decays to the pointer type
    /// `got`. `expected` may also be a pointer to such an array.
    pub(crate) fn decays_to(&self, expected: TypeId, got: TypeId) -> bool {
        let mut t = self.cache.must_type(expected);
        if let Some(pointer) = t.as_pointer() {
            t = pointer.element;
        }
        match t.as_array() {
            Some(array) => got == self.cache.pointer_to(array.item).id(),
            None => false,
        }
    }

    fn promote(&self, id: TypeId) -> TypeId {
        let t = self.cache.must_type(id);
        match t.kind() {
            TypeKind::Function => self.cache.pointer_to(t).id(),
            _ => id,
        }
    }

    fn valid_ptr_binop(&self, a: TypeId, b: TypeId) -> bool {
        let ka = self.cache.must_type(a).kind();
        let kb = self.cache.must_type(b).kind();
        (ka == TypeKind::Pointer && kb.is_integral()) || (ka.is_integral() && kb == TypeKind::Pointer)
    }

    pub(crate) fn is_pointer(&self, id: TypeId) -> bool {
        self.cache.must_type(id).is_pointer()
    }

    pub(crate) fn is_void_ptr(&self, id: TypeId) -> bool {
        id == known().void_ptr
    }

    pub(crate) fn stack_image(&self) -> String {
        image(&self.stack)
    }
}

fn image(stack: &[TypeId]) -> String {
    let mut s = String::from("[");
    for (i, id) in stack.iter().enumerate() {
        if i != 0 {
            s.push(' ');
        }
        s.push_str(id.as_str());
    }
    s.push(']');
    s
}

/// Where control continues after one abstractly executed operation.
enum Flow {
    Next,
    Goto(usize),
    Branch {
        target: usize,
        jnz: bool,
        name: NameId,
        number: i64,
        span: girder_span::Span,
    },
    Fork {
        targets: Vec<usize>,
        default: usize,
    },
    Stop,
}

struct Walker<'v, 't> {
    body: &'v mut Vec<Operation>,
    cx: VerifyCtx<'v, 't>,
    labels: &'v FxHashMap<i64, usize>,
    visited: Vec<bool>,
    elided: Vec<bool>,
    phi: FxHashMap<usize, Vec<TypeId>>,
    name: NameId,
}

impl<'v, 't> Walker<'v, 't> {
    fn target(&self, name: NameId, number: i64) -> usize {
        match self.labels.get(&branch_key(name, number)) {
            Some(&ip) => ip,
            None => ice!("undefined branch target survived resolution"),
        }
    }

    fn walk(&mut self, mut ip: usize, mut stack: Vec<TypeId>) -> Result<(), VerifyError> {
        loop {
            if ip >= self.body.len() {
                ice!("instruction pointer escaped the function body");
            }
            if self.visited[ip] {
                let Some(expected) = self.phi.get(&ip) else {
                    ice!("revisited operation without a recorded join stack");
                };
                if stack.len() != expected.len() {
                    return Err(StackDepthMismatchError {
                        function: self.name.to_string(),
                        ip,
                        operation: self.body[ip].to_string(),
                        got: image(&stack),
                        expected: image(expected),
                    }
                    .into());
                }
                for (&got, &want) in stack.iter().zip(expected.iter()) {
                    if got != want && !self.cx.assignable(got, want) {
                        return Err(StacksDifferError {
                            function: self.name.to_string(),
                            ip,
                            operation: self.body[ip].to_string(),
                            got: image(&stack),
                            expected: image(expected),
                        }
                        .into());
                    }
                }
                return Ok(());
            }
            self.visited[ip] = true;
            self.cx.stack = std::mem::take(&mut stack);
            if let Err(error) = self.body[ip].verify(&mut self.cx) {
                return Err(OperationError {
                    function: self.name.to_string(),
                    ip,
                    operation: self.body[ip].to_string(),
                    error,
                }
                .into());
            }
            stack = std::mem::take(&mut self.cx.stack);
            let flow = match &self.body[ip] {
                Operation::Jmp(op) => Flow::Goto(self.target(op.name, op.number)),
                Operation::Jnz(op) => Flow::Branch {
                    target: self.target(op.name, op.number),
                    jnz: true,
                    name: op.name,
                    number: op.number,
                    span: op.span,
                },
                Operation::Jz(op) => Flow::Branch {
                    target: self.target(op.name, op.number),
                    jnz: false,
                    name: op.name,
                    number: op.number,
                    span: op.span,
                },
                Operation::Switch(op) => Flow::Fork {
                    targets: op
                        .labels
                        .iter()
                        .map(|l| self.target(l.name, l.number))
                        .collect(),
                    default: self.target(op.default.name, op.default.number),
                },
                Operation::Label(_) => {
                    self.phi.insert(ip, stack.clone());
                    Flow::Next
                }
                Operation::Return(_) | Operation::Panic(_) | Operation::JmpP(_) => Flow::Stop,
                _ => Flow::Next,
            };
            match flow {
                Flow::Next => ip += 1,
                Flow::Goto(target) => ip = target,
                Flow::Stop => return Ok(()),
                Flow::Fork { targets, default } => {
                    for target in targets {
                        self.walk(target, stack.clone())?;
                    }
                    ip = default;
                }
                Flow::Branch {
                    target,
                    jnz,
                    name,
                    number,
                    span,
                } => {
                    let folded = match ip.checked_sub(1).map(|prev| &self.body[prev]) {
                        Some(Operation::Const32(c)) => Some(match jnz {
                            true => c.value != 0,
                            false => c.value == 0,
                        }),
                        _ => None,
                    };
                    match folded {
                        // The branch condition is a constant: the branch
                        // either becomes an unconditional jump or, with its
                        // feeding constant, vanishes into the fall-through
                        // that the pruning pass shortens into the target
                        // label.
                        Some(taken) => {
                            self.elided[ip - 1] = true;
                            match taken {
                                true => {
                                    self.body[ip] = Operation::Jmp(Jmp {
                                        cond: false,
                                        name,
                                        number,
                                        span,
                                    });
                                }
                                false => self.elided[ip] = true,
                            }
                            ip = target;
                        }
                        None => {
                            self.walk(target, stack.clone())?;
                            ip += 1;
                        }
                    }
                }
            }
        }
    }
}

impl FunctionDefinition {
    /// Check that the function body is well formed and well typed.
    ///
    /// Verification mutates the body: no-op conversions are removed,
    /// constant branches are folded, and operations the abstract execution
    /// never reached are pruned (scope delimiters, variable declarations
    /// and returns are always preserved).
    pub fn verify(&mut self) -> Result<(), VerifyError> {
        tracing::debug!(function = %self.name, operations = self.body.len(), "verifying function");
        match self.body.len() {
            0 => return Err(EmptyFunctionBodyError {}.into()),
            1 => {
                return match &self.body[0] {
                    Operation::Return(_) | Operation::Panic(_) => Ok(()),
                    op => Err(InvalidSingleOperationError {
                        operation: op.to_string(),
                    }
                    .into()),
                }
            }
            _ => {}
        }
        unconvert(&mut self.body);

        // Structural prepass: scope balance, label registration and local
        // declaration order.
        let mut labels: FxHashMap<i64, usize> = FxHashMap::default();
        let mut variables = Vec::new();
        let mut block_level = 0usize;
        for ip in 0..self.body.len() {
            match &self.body[ip] {
                Operation::BeginScope(_) => block_level += 1,
                Operation::EndScope(_) => {
                    if block_level == 0 {
                        return Err(UnbalancedScopeError {
                            function: self.name.to_string(),
                            ip,
                            operation: self.body[ip].to_string(),
                        }
                        .into());
                    }
                    block_level -= 1;
                    if block_level == 0 && !matches!(self.body[ip - 1], Operation::Return(_)) {
                        return Err(MissingReturnError {
                            function: self.name.to_string(),
                            ip,
                            operation: self.body[ip].to_string(),
                        }
                        .into());
                    }
                }
                Operation::Label(label) => {
                    if labels.insert(label.key(), ip).is_some() {
                        return Err(LabelRedefinedError {
                            function: self.name.to_string(),
                            ip,
                            operation: self.body[ip].to_string(),
                        }
                        .into());
                    }
                }
                Operation::VariableDeclaration(decl) => {
                    if decl.index != variables.len() {
                        return Err(DeclarationIndexError {
                            function: self.name.to_string(),
                            ip,
                            operation: self.body[ip].to_string(),
                        }
                        .into());
                    }
                    variables.push(decl.type_id);
                }
                _ => {}
            }
        }
        if block_level != 0 {
            return Err(UnbalancedScopesError {
                function: self.name.to_string(),
            }
            .into());
        }

        // Branch target resolution.
        let mut computed_gotos = false;
        for ip in 0..self.body.len() {
            let defined = match &self.body[ip] {
                Operation::Jmp(op) => labels.contains_key(&branch_key(op.name, op.number)),
                Operation::Jnz(op) => labels.contains_key(&branch_key(op.name, op.number)),
                Operation::Jz(op) => labels.contains_key(&branch_key(op.name, op.number)),
                Operation::Switch(op) => {
                    labels.contains_key(&branch_key(op.default.name, op.default.number))
                        && op
                            .labels
                            .iter()
                            .all(|l| labels.contains_key(&branch_key(l.name, l.number)))
                }
                Operation::JmpP(_) => {
                    computed_gotos = true;
                    true
                }
                _ => true,
            };
            if !defined {
                return Err(UndefinedBranchTargetError {
                    function: self.name.to_string(),
                    ip,
                    operation: self.body[ip].to_string(),
                }
                .into());
            }
        }

        // Abstract execution from the entry, join checked at labels.
        let bump = Bump::new();
        let cache = TypeCache::new(&bump);
        let Some(func) = cache.must_type(self.type_id).as_function() else {
            ice!(format!(
                "function {} has non-function type {}",
                self.name, self.type_id
            ));
        };
        let n = self.body.len();
        let mut walker = Walker {
            body: &mut self.body,
            cx: VerifyCtx {
                stack: Vec::new(),
                cache: &cache,
                func,
                variables,
                block_value_level: 0,
            },
            labels: &labels,
            visited: vec![false; n],
            elided: vec![false; n],
            phi: FxHashMap::default(),
            name: self.name,
        };
        walker.walk(0, Vec::new())?;

        // With computed gotos present, any named label approximates an
        // address-taken branch target and must verify as reachable.
        if computed_gotos {
            let mut named: Vec<usize> = labels
                .iter()
                .filter(|(&key, _)| key < 0)
                .map(|(_, &ip)| ip)
                .collect();
            named.sort_unstable();
            for ip in named {
                let snapshot = walker.phi.get(&ip).cloned().unwrap_or_default();
                walker.walk(ip, snapshot)?;
            }
        }

        // Dead code pruning. Scope structure, declarations and returns
        // survive regardless of reachability.
        let Walker {
            visited, elided, ..
        } = walker;
        let keep: Vec<bool> = self
            .body
            .iter()
            .enumerate()
            .map(|(ip, op)| {
                !elided[ip]
                    && (visited[ip]
                        || matches!(
                            op,
                            Operation::BeginScope(_)
                                | Operation::EndScope(_)
                                | Operation::VariableDeclaration(_)
                                | Operation::Return(_)
                        ))
            })
            .collect();
        let mut ip = 0;
        self.body.retain(|_| {
            let k = keep[ip];
            ip += 1;
            k
        });
        Ok(())
    }
}

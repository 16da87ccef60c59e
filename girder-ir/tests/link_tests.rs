use girder_ir::error::LinkError;
use girder_ir::op::{self, Operation};
use girder_ir::value::{AddressValue, CompositeValue};
use girder_ir::{
    link_lib, link_main, DataDefinition, FunctionDefinition, Linkage, NameId, Object, Span,
    TypeId, Value,
};
use girder_macros::{assert_err, assert_ok, assert_some};

fn sp() -> Span {
    Span::empty()
}

fn function(name: &str, type_spec: &str, linkage: Linkage, body: Vec<Operation>) -> Object {
    Object::Function(FunctionDefinition::new(
        sp(),
        NameId::new(name),
        NameId::default(),
        TypeId::new(type_spec),
        linkage,
        Vec::new(),
        Vec::new(),
        body,
    ))
}

fn data(name: &str, type_spec: &str, value: Option<Value>) -> Object {
    Object::Data(DataDefinition::new(
        sp(),
        NameId::new(name),
        NameId::default(),
        TypeId::new(type_spec),
        Linkage::External,
        value,
    ))
}

fn panic_stub(name: &str, type_spec: &str) -> Object {
    function(
        name,
        type_spec,
        Linkage::External,
        vec![Operation::Panic(op::Panic { span: sp() })],
    )
}

fn begin() -> Operation {
    Operation::BeginScope(op::BeginScope {
        value: false,
        span: sp(),
    })
}

fn end() -> Operation {
    Operation::EndScope(op::EndScope {
        value: false,
        span: sp(),
    })
}

fn ret() -> Operation {
    Operation::Return(op::Return { span: sp() })
}

fn global(name: &str, type_spec: &str, linkage: Linkage) -> Operation {
    Operation::Global(op::Global {
        address: true,
        index: -1,
        linkage,
        name: NameId::new(name),
        type_id: TypeId::new(type_spec),
        type_name: NameId::default(),
        span: sp(),
    })
}

fn drop_of(spec: &str) -> Operation {
    Operation::Drop(op::Drop {
        comma: false,
        l_op: false,
        type_id: TypeId::new(spec),
        span: sp(),
    })
}

fn find<'a>(out: &'a [Object], name: &str) -> Option<&'a Object> {
    out.iter().find(|object| object.name() == NameId::new(name))
}

#[test]
fn test_link_lib_injects_main() {
    let out = assert_ok!(link_lib(vec![]));
    assert_eq!(out.len(), 1);
    let Object::Function(main) = &out[0] else {
        panic!("expected a function definition");
    };
    assert_eq!(main.name, NameId::new("main"));
    assert_eq!(main.linkage, Linkage::External);
    assert_eq!(main.body.len(), 7);
    assert!(
        matches!(&main.body[0], Operation::Result(r) if r.address && r.type_id == TypeId::new("*int32"))
    );
    assert!(matches!(&main.body[1], Operation::Const32(c) if c.value == 0));
    assert!(matches!(&main.body[2], Operation::Store(_)));
    assert!(matches!(&main.body[3], Operation::Drop(_)));
    assert!(matches!(&main.body[4], Operation::BeginScope(_)));
    assert!(matches!(&main.body[5], Operation::Return(_)));
    assert!(matches!(&main.body[6], Operation::EndScope(_)));
}

#[test]
fn test_link_lib_keeps_existing_main() {
    let main = function(
        "main",
        "func()int32",
        Linkage::External,
        vec![begin(), ret(), end()],
    );
    let out = assert_ok!(link_lib(vec![vec![main]]));
    assert_eq!(out.len(), 1);
    let Object::Function(main) = &out[0] else {
        panic!("expected a function definition");
    };
    assert_eq!(main.body.len(), 3);
}

#[test]
fn test_link_main_resolves_start() {
    let start = function(
        "_start",
        "func()",
        Linkage::External,
        vec![
            begin(),
            global("f", "*func()", Linkage::External),
            drop_of("*func()"),
            ret(),
            end(),
        ],
    );
    let stub = panic_stub("f", "func()");
    let out = assert_ok!(link_main(vec![vec![start], vec![stub]]));
    assert_eq!(out.len(), 2);
    let Object::Function(start) = &out[0] else {
        panic!("expected a function definition");
    };
    assert_eq!(start.name, NameId::new("_start"));
    let resolved = assert_some!(start.body.iter().find_map(|op| match op {
        Operation::Global(g) => Some(g.index),
        _ => None,
    }));
    assert_eq!(resolved, 1);
    assert_eq!(out[1].name(), NameId::new("f"));
}

#[test]
fn test_link_main_without_start_fails() {
    let err = assert_err!(link_main(vec![vec![panic_stub("f", "func()")]]));
    assert!(matches!(err, LinkError::StartUndefined(_)));
}

#[test]
fn test_unreachable_objects_are_not_emitted() {
    let start = function(
        "_start",
        "func()",
        Linkage::External,
        vec![begin(), ret(), end()],
    );
    let unreachable = panic_stub("orphan", "func()");
    let out = assert_ok!(link_main(vec![vec![start, unreachable]]));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].name(), NameId::new("_start"));
}

#[test]
fn test_define_is_idempotent() {
    // Two references to the same symbol emit it once under one index.
    let start = function(
        "_start",
        "func()",
        Linkage::External,
        vec![
            begin(),
            global("f", "*func()", Linkage::External),
            drop_of("*func()"),
            global("f", "*func()", Linkage::External),
            drop_of("*func()"),
            ret(),
            end(),
        ],
    );
    let out = assert_ok!(link_main(vec![vec![start], vec![panic_stub("f", "func()")]]));
    assert_eq!(out.len(), 2);
    let Object::Function(start) = &out[0] else {
        panic!("expected a function definition");
    };
    let indices: Vec<i64> = start
        .body
        .iter()
        .filter_map(|op| match op {
            Operation::Global(g) => Some(g.index),
            _ => None,
        })
        .collect();
    assert_eq!(indices, vec![1, 1]);
}

#[test]
fn test_indirect_call_is_lowered_to_direct() {
    let start = function(
        "_start",
        "func()",
        Linkage::External,
        vec![
            begin(),
            global("f", "*func()", Linkage::External),
            Operation::Arguments(op::Arguments {
                function_pointer: false,
                span: sp(),
            }),
            Operation::CallFP(op::CallFP {
                arguments: 0,
                comma: false,
                type_id: TypeId::new("*func()"),
                span: sp(),
            }),
            ret(),
            end(),
        ],
    );
    let out = assert_ok!(link_main(vec![vec![start], vec![panic_stub("f", "func()")]]));
    let Object::Function(start) = &out[0] else {
        panic!("expected a function definition");
    };
    assert_eq!(start.body.len(), 5);
    assert!(matches!(&start.body[0], Operation::BeginScope(_)));
    assert!(
        matches!(&start.body[1], Operation::Arguments(a) if !a.function_pointer)
    );
    assert!(
        matches!(&start.body[2], Operation::Call(c) if c.index == 1 && c.type_id == TypeId::new("func()"))
    );
    assert!(matches!(&start.body[3], Operation::Return(_)));
    assert!(!start
        .body
        .iter()
        .any(|op| matches!(op, Operation::Global(_) | Operation::CallFP(_))));
}

#[test]
fn test_call_through_data_pointer_stays_indirect() {
    let start = function(
        "_start",
        "func()",
        Linkage::External,
        vec![
            begin(),
            global("fp", "*func()", Linkage::External),
            Operation::Arguments(op::Arguments {
                function_pointer: false,
                span: sp(),
            }),
            Operation::CallFP(op::CallFP {
                arguments: 0,
                comma: false,
                type_id: TypeId::new("*func()"),
                span: sp(),
            }),
            ret(),
            end(),
        ],
    );
    let fp = data("fp", "*func()", None);
    let out = assert_ok!(link_main(vec![vec![start], vec![fp]]));
    let Object::Function(start) = &out[0] else {
        panic!("expected a function definition");
    };
    // The referent is data, so the global and the indirect call survive.
    assert!(
        matches!(&start.body[2], Operation::Arguments(a) if a.function_pointer)
    );
    assert!(matches!(&start.body[3], Operation::CallFP(_)));
    assert!(start
        .body
        .iter()
        .any(|op| matches!(op, Operation::Global(g) if g.index == 1)));
}

#[test]
fn test_duplicate_external_data_merges_initializer() {
    let empty = data("shared", "int32", None);
    let filled = data("shared", "int32", Some(Value::Int32(7)));
    let out = assert_ok!(link_lib(vec![vec![empty], vec![filled]]));
    let Object::Data(shared) = assert_some!(find(&out, "shared")) else {
        panic!("expected a data definition");
    };
    assert_eq!(shared.value, Some(Value::Int32(7)));
}

#[test]
fn test_duplicate_external_data_with_mismatched_types_fails() {
    let a = data("shared", "int32", None);
    let b = data("shared", "int64", None);
    let err = assert_err!(link_lib(vec![vec![a], vec![b]]));
    assert!(matches!(err, LinkError::IncompatibleDefinition(_)));
}

#[test]
fn test_panic_stub_is_replaced_by_real_definition() {
    let stub = panic_stub("f", "func()");
    let real = function("f", "func()", Linkage::External, vec![begin(), ret(), end()]);
    let out = assert_ok!(link_lib(vec![vec![stub], vec![real]]));
    let Object::Function(f) = assert_some!(find(&out, "f")) else {
        panic!("expected a function definition");
    };
    assert_eq!(f.body.len(), 3);
}

#[test]
fn test_duplicate_external_functions_fail() {
    let a = function("f", "func()", Linkage::External, vec![begin(), ret(), end()]);
    let b = function("f", "func()", Linkage::External, vec![begin(), ret(), end()]);
    let err = assert_err!(link_lib(vec![vec![a], vec![b]]));
    assert!(matches!(err, LinkError::DuplicateExternalFunction(_)));
}

#[test]
fn test_internal_symbols_are_unit_scoped() {
    // Each unit may carry its own internal `helper`; _start resolves the one
    // in its own unit.
    let start = function(
        "_start",
        "func()",
        Linkage::External,
        vec![
            begin(),
            global("helper", "*func()", Linkage::Internal),
            drop_of("*func()"),
            ret(),
            end(),
        ],
    );
    let helper0 = function(
        "helper",
        "func()",
        Linkage::Internal,
        vec![begin(), ret(), end()],
    );
    let helper1 = function(
        "helper",
        "func()",
        Linkage::Internal,
        vec![Operation::Panic(op::Panic { span: sp() })],
    );
    let out = assert_ok!(link_main(vec![vec![start, helper0], vec![helper1]]));
    assert_eq!(out.len(), 2);
    let Object::Function(helper) = &out[1] else {
        panic!("expected a function definition");
    };
    assert_eq!(helper.body.len(), 3);
}

#[test]
fn test_duplicate_internal_symbols_in_one_unit_fail() {
    let a = function("helper", "func()", Linkage::Internal, vec![ret()]);
    let b = function("helper", "func()", Linkage::Internal, vec![ret()]);
    let err = assert_err!(link_lib(vec![vec![a, b]]));
    assert!(matches!(err, LinkError::DuplicateInternal(_)));
}

#[test]
fn test_builtin_fallback_resolves_unprefixed_reference() {
    let start = function(
        "_start",
        "func()",
        Linkage::External,
        vec![
            begin(),
            global("memcpy", "*func()", Linkage::External),
            drop_of("*func()"),
            ret(),
            end(),
        ],
    );
    let builtin = panic_stub("__builtin_memcpy", "func()");
    let out = assert_ok!(link_main(vec![vec![start], vec![builtin]]));
    assert_eq!(out.len(), 2);
    assert_eq!(out[1].name(), NameId::new("__builtin_memcpy"));
}

#[test]
fn test_undefined_external_reference_fails() {
    let start = function(
        "_start",
        "func()",
        Linkage::External,
        vec![
            begin(),
            global("missing", "*func()", Linkage::External),
            drop_of("*func()"),
            ret(),
            end(),
        ],
    );
    let err = assert_err!(link_main(vec![vec![start]]));
    assert!(matches!(err, LinkError::UndefinedExtern(_)));
}

fn declaration_with_initializer(value: Value) -> Operation {
    Operation::VariableDeclaration(op::VariableDeclaration {
        index: 0,
        name: NameId::new("p"),
        type_id: TypeId::new("*func()"),
        type_name: NameId::default(),
        value: Some(value),
        span: sp(),
    })
}

#[test]
fn test_variable_initializer_resolves_external_address() {
    let start = function(
        "_start",
        "func()",
        Linkage::External,
        vec![
            begin(),
            declaration_with_initializer(Value::Address(AddressValue {
                index: -1,
                label: NameId::default(),
                linkage: Linkage::External,
                name: NameId::new("target"),
                offset: 0,
            })),
            ret(),
            end(),
        ],
    );
    let out = assert_ok!(link_main(vec![vec![start], vec![panic_stub("target", "func()")]]));
    assert_eq!(out.len(), 2);
    let Object::Function(start) = &out[0] else {
        panic!("expected a function definition");
    };
    let decl = assert_some!(start.body.iter().find_map(|op| match op {
        Operation::VariableDeclaration(decl) => Some(decl),
        _ => None,
    }));
    let Some(Value::Address(address)) = &decl.value else {
        panic!("expected an address initializer");
    };
    assert_eq!(address.index, 1);
}

#[test]
fn test_variable_initializer_rejects_internal_address() {
    let helper = function("helper", "func()", Linkage::Internal, vec![ret()]);
    let start = function(
        "_start",
        "func()",
        Linkage::External,
        vec![
            begin(),
            declaration_with_initializer(Value::Address(AddressValue {
                index: -1,
                label: NameId::default(),
                linkage: Linkage::Internal,
                name: NameId::new("helper"),
                offset: 0,
            })),
            ret(),
            end(),
        ],
    );
    let err = assert_err!(link_main(vec![vec![start, helper]]));
    assert!(matches!(err, LinkError::Internal(_)));
}

#[test]
fn test_internal_data_initializer_addresses_are_resolved() {
    let start = function(
        "_start",
        "func()",
        Linkage::External,
        vec![
            begin(),
            global("table", "**func()", Linkage::External),
            drop_of("**func()"),
            ret(),
            end(),
        ],
    );
    let table = data(
        "table",
        "*int32",
        Some(Value::Address(AddressValue {
            index: -1,
            label: NameId::default(),
            linkage: Linkage::Internal,
            name: NameId::new("local"),
            offset: 0,
        })),
    );
    let local = Object::Data(DataDefinition::new(
        sp(),
        NameId::new("local"),
        NameId::default(),
        TypeId::new("int32"),
        Linkage::Internal,
        None,
    ));
    let out = assert_ok!(link_main(vec![vec![start, table, local]]));
    assert_eq!(out.len(), 3);
    let Object::Data(table) = &out[1] else {
        panic!("expected a data definition");
    };
    let Some(Value::Address(address)) = &table.value else {
        panic!("expected an address initializer");
    };
    assert_eq!(address.index, 2);
    assert_eq!(out[2].name(), NameId::new("local"));
}

#[test]
fn test_data_initializer_addresses_are_resolved() {
    let start = function(
        "_start",
        "func()",
        Linkage::External,
        vec![
            begin(),
            global("table", "**func()", Linkage::External),
            drop_of("**func()"),
            ret(),
            end(),
        ],
    );
    let table = data(
        "table",
        "*func()",
        Some(Value::Composite(CompositeValue {
            values: vec![Value::Address(AddressValue {
                index: -1,
                label: NameId::default(),
                linkage: Linkage::External,
                name: NameId::new("target"),
                offset: 0,
            })],
        })),
    );
    let target = panic_stub("target", "func()");
    let out = assert_ok!(link_main(vec![vec![start], vec![table], vec![target]]));
    assert_eq!(out.len(), 3);
    let Object::Data(table) = &out[1] else {
        panic!("expected a data definition");
    };
    let Some(Value::Composite(composite)) = &table.value else {
        panic!("expected a composite initializer");
    };
    let Value::Address(address) = &composite.values[0] else {
        panic!("expected an address value");
    };
    assert_eq!(address.index, 2);
    assert_eq!(out[2].name(), NameId::new("target"));
}

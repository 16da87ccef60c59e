use girder_ir::error::{OpError, VerifyError};
use girder_ir::op::{self, Operation};
use girder_ir::{FunctionDefinition, Linkage, NameId, Span, TypeId};
use girder_macros::{assert_err, assert_matches, assert_ok};

fn sp() -> Span {
    Span::empty()
}

fn function(type_spec: &str, body: Vec<Operation>) -> FunctionDefinition {
    FunctionDefinition::new(
        sp(),
        NameId::new("f"),
        NameId::default(),
        TypeId::new(type_spec),
        Linkage::External,
        Vec::new(),
        Vec::new(),
        body,
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

fn const32(value: i32) -> Operation {
    Operation::Const32(op::Const32 {
        l_op: false,
        type_id: TypeId::new("int32"),
        value,
        span: sp(),
    })
}

fn const64(value: i64) -> Operation {
    Operation::Const64(op::Const64 {
        type_id: TypeId::new("int64"),
        value,
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

fn nil(spec: &str) -> Operation {
    Operation::Nil(op::Nil {
        type_id: TypeId::new(spec),
        span: sp(),
    })
}

fn jmp(number: i64) -> Operation {
    Operation::Jmp(op::Jmp {
        cond: false,
        name: NameId::default(),
        number,
        span: sp(),
    })
}

fn jnz(number: i64) -> Operation {
    Operation::Jnz(op::Jnz {
        l_op: false,
        name: NameId::default(),
        number,
        span: sp(),
    })
}

fn jz(number: i64) -> Operation {
    Operation::Jz(op::Jz {
        l_op: false,
        name: NameId::default(),
        number,
        span: sp(),
    })
}

fn label(number: i64) -> Operation {
    Operation::Label(op::Label::numbered(number, sp()))
}

fn store(spec: &str) -> Operation {
    Operation::Store(op::Store {
        bit_offset: 0,
        bits: 0,
        type_id: TypeId::new(spec),
        span: sp(),
    })
}

#[test]
fn test_empty_body_is_rejected() {
    let mut f = function("func()", vec![]);
    let err = assert_err!(f.verify());
    assert!(matches!(err, VerifyError::EmptyFunctionBody(_)));
}

#[test]
fn test_single_operation_bodies() {
    assert_ok!(function("func()", vec![ret()]).verify());
    assert_ok!(
        function("func()", vec![Operation::Panic(op::Panic { span: sp() })]).verify()
    );
    let err = assert_err!(function("func()", vec![const32(0)]).verify());
    assert!(matches!(err, VerifyError::InvalidSingleOperation(_)));
}

#[test]
fn test_return_requires_empty_stack() {
    // func()int32 pushing a constant it never consumes.
    let mut f = function("func()int32", vec![begin(), const32(1), ret(), end()]);
    let err = assert_err!(f.verify());
    let inner = assert_matches!(err, VerifyError::Operation(inner) => inner);
    assert!(matches!(inner.error, OpError::NonEmptyStackOnReturn { .. }));
}

#[test]
fn test_never_taken_branch_is_pruned() {
    let mut f = function(
        "func()",
        vec![
            begin(),
            const32(0),
            jnz(1),
            const32(7),
            drop_of("int32"),
            label(1),
            ret(),
            end(),
        ],
    );
    assert_ok!(f.verify());
    assert_eq!(f.body.len(), 4);
    assert!(matches!(f.body[0], Operation::BeginScope(_)));
    assert!(matches!(f.body[1], Operation::Label(_)));
    assert!(matches!(f.body[2], Operation::Return(_)));
    assert!(matches!(f.body[3], Operation::EndScope(_)));
}

#[test]
fn test_never_taken_jz_is_pruned() {
    let mut f = function(
        "func()",
        vec![
            begin(),
            const32(1),
            jz(1),
            const32(7),
            drop_of("int32"),
            label(1),
            ret(),
            end(),
        ],
    );
    assert_ok!(f.verify());
    assert!(!f
        .body
        .iter()
        .any(|op| matches!(op, Operation::Const32(_) | Operation::Jz(_))));
}

#[test]
fn test_always_taken_branch_folds_to_jmp() {
    let mut f = function(
        "func()",
        vec![
            begin(),
            const32(1),
            jnz(1),
            const32(7),
            drop_of("int32"),
            label(1),
            ret(),
            end(),
        ],
    );
    assert_ok!(f.verify());
    assert_eq!(f.body.len(), 5);
    assert!(matches!(f.body[1], Operation::Jmp(_)));
    assert!(!f.body.iter().any(|op| matches!(op, Operation::Const32(_))));
}

#[test]
fn test_join_depth_mismatch_is_rejected() {
    let mut f = function(
        "func()",
        vec![
            begin(),
            nil("*int32"),
            Operation::Bool(op::Bool {
                type_id: TypeId::new("*int32"),
                span: sp(),
            }),
            jnz(1),
            nil("*int32"),
            label(1),
            ret(),
            end(),
        ],
    );
    let err = assert_err!(f.verify());
    assert!(matches!(err, VerifyError::StackDepthMismatch(_)));
}

#[test]
fn test_join_type_mismatch_is_rejected() {
    let mut f = function(
        "func()",
        vec![
            begin(),
            nil("*int32"),
            Operation::Dup(op::Dup {
                type_id: TypeId::new("*int32"),
                span: sp(),
            }),
            Operation::Bool(op::Bool {
                type_id: TypeId::new("*int32"),
                span: sp(),
            }),
            jnz(1),
            drop_of("*int32"),
            const64(7),
            label(1),
            drop_of("*int32"),
            ret(),
            end(),
        ],
    );
    let err = assert_err!(f.verify());
    assert!(matches!(err, VerifyError::StacksDiffer(_)));
}

#[test]
fn test_unbalanced_scopes_are_rejected() {
    let err = assert_err!(function("func()", vec![end(), ret()]).verify());
    assert!(matches!(err, VerifyError::UnbalancedScope(_)));

    let err = assert_err!(function("func()", vec![begin(), begin(), ret(), end()]).verify());
    assert!(matches!(err, VerifyError::UnbalancedScopes(_)));
}

#[test]
fn test_missing_return_is_rejected() {
    let err = assert_err!(function("func()", vec![begin(), end()]).verify());
    assert!(matches!(err, VerifyError::MissingReturn(_)));
}

#[test]
fn test_duplicate_label_is_rejected() {
    let err = assert_err!(
        function("func()", vec![begin(), label(1), label(1), ret(), end()]).verify()
    );
    assert!(matches!(err, VerifyError::LabelRedefined(_)));
}

#[test]
fn test_undefined_branch_target_is_rejected() {
    let err = assert_err!(function("func()", vec![begin(), jmp(9), ret(), end()]).verify());
    assert!(matches!(err, VerifyError::UndefinedBranchTarget(_)));
}

#[test]
fn test_declaration_index_order_is_checked() {
    let decl = Operation::VariableDeclaration(op::VariableDeclaration {
        index: 1,
        name: NameId::default(),
        type_id: TypeId::new("int64"),
        type_name: NameId::default(),
        value: None,
        span: sp(),
    });
    let err = assert_err!(function("func()", vec![begin(), decl, ret(), end()]).verify());
    assert!(matches!(err, VerifyError::DeclarationIndex(_)));
}

#[test]
fn test_noop_conversions_are_removed() {
    let mut f = function(
        "func()",
        vec![
            begin(),
            const32(3),
            Operation::Convert(op::Convert {
                result: TypeId::new("int32"),
                type_id: TypeId::new("int32"),
                span: sp(),
            }),
            drop_of("int32"),
            ret(),
            end(),
        ],
    );
    assert_ok!(f.verify());
    assert!(!f.body.iter().any(|op| matches!(op, Operation::Convert(_))));
}

#[test]
fn test_locals_arguments_and_results() {
    let mut f = function(
        "func(int8)int32",
        vec![
            begin(),
            Operation::VariableDeclaration(op::VariableDeclaration {
                index: 0,
                name: NameId::new("x"),
                type_id: TypeId::new("int64"),
                type_name: NameId::default(),
                value: None,
                span: sp(),
            }),
            Operation::Variable(op::Variable {
                address: true,
                index: 0,
                type_id: TypeId::new("*int64"),
                span: sp(),
            }),
            const64(9),
            store("int64"),
            drop_of("int64"),
            Operation::Argument(op::Argument {
                address: false,
                index: 0,
                type_id: TypeId::new("int8"),
                span: sp(),
            }),
            drop_of("int8"),
            Operation::Result(op::Result {
                address: true,
                index: 0,
                type_id: TypeId::new("*int32"),
                span: sp(),
            }),
            const32(0),
            store("int32"),
            drop_of("int32"),
            ret(),
            end(),
        ],
    );
    assert_ok!(f.verify());
    // Nothing was unreachable.
    assert_eq!(f.body.len(), 14);
}

#[test]
fn test_arithmetic_and_comparison_contracts() {
    let mut f = function(
        "func()",
        vec![
            begin(),
            const32(2),
            const32(3),
            Operation::Add(op::Add {
                type_id: TypeId::new("int32"),
                span: sp(),
            }),
            const32(4),
            Operation::Lt(op::Lt {
                type_id: TypeId::new("int32"),
                span: sp(),
            }),
            Operation::Not(op::Not { span: sp() }),
            drop_of("int32"),
            ret(),
            end(),
        ],
    );
    assert_ok!(f.verify());

    // Mismatched operand widths fail.
    let mut f = function(
        "func()",
        vec![
            begin(),
            const32(2),
            const64(3),
            Operation::Add(op::Add {
                type_id: TypeId::new("int32"),
                span: sp(),
            }),
            drop_of("int32"),
            ret(),
            end(),
        ],
    );
    let err = assert_err!(f.verify());
    let inner = assert_matches!(err, VerifyError::Operation(inner) => inner);
    assert!(matches!(inner.error, OpError::MismatchedOperands { .. }));
}

#[test]
fn test_shift_requires_int32_count() {
    let mut f = function(
        "func()",
        vec![
            begin(),
            const64(1),
            const64(2),
            Operation::Lsh(op::Lsh {
                type_id: TypeId::new("int64"),
                span: sp(),
            }),
            drop_of("int64"),
            ret(),
            end(),
        ],
    );
    let err = assert_err!(f.verify());
    let inner = assert_matches!(err, VerifyError::Operation(inner) => inner);
    assert!(matches!(inner.error, OpError::MismatchedShiftCount { .. }));
}

#[test]
fn test_switch_forks_to_every_case() {
    let mut f = function(
        "func()",
        vec![
            begin(),
            const32(2),
            Operation::Switch(op::Switch {
                default: op::Label::numbered(3, sp()),
                labels: vec![op::Label::numbered(1, sp()), op::Label::numbered(2, sp())],
                type_id: TypeId::new("int32"),
                values: vec![
                    girder_ir::Value::Int32(1),
                    girder_ir::Value::Int32(2),
                ],
                span: sp(),
            }),
            label(1),
            jmp(3),
            label(2),
            jmp(3),
            label(3),
            ret(),
            end(),
        ],
    );
    assert_ok!(f.verify());
    assert_eq!(f.body.len(), 10);
}

#[test]
fn test_computed_goto_reaches_named_labels() {
    let mut f = function(
        "func()",
        vec![
            begin(),
            nil("*struct{}"),
            Operation::JmpP(op::JmpP { span: sp() }),
            Operation::Label(op::Label::named(NameId::new("after"), sp())),
            ret(),
            end(),
        ],
    );
    assert_ok!(f.verify());
    // The named label is treated as address taken and survives.
    assert_eq!(f.body.len(), 6);
}

#[test]
fn test_value_scope_may_hold_stack_values() {
    let mut f = function(
        "func()",
        vec![
            begin(),
            const32(1),
            Operation::BeginScope(op::BeginScope {
                value: true,
                span: sp(),
            }),
            Operation::EndScope(op::EndScope {
                value: true,
                span: sp(),
            }),
            drop_of("int32"),
            ret(),
            end(),
        ],
    );
    assert_ok!(f.verify());
}

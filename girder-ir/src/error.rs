//! Diagnostic error types for the IR library.

use crate::intern::TypeId;
use girder_macros::declare_error_type;
use miette::Diagnostic;
use thiserror::Error;

declare_error_type! {
    #[error("ir error: {0}")]
    pub enum IrError {
        Type(TypeError),
        Model(ModelError),
        Verify(VerifyError),
        Link(LinkError),
        Snapshot(SnapshotError),
    }
}

/// Handy type alias for all IR-related errors.
pub type IrResult<T> = Result<T, IrError>;

declare_error_type! {
    #[error("type error: {0}")]
    pub enum TypeError {
        UnexpectedToken(UnexpectedTokenError),
        ExpectedToken(ExpectedTokenError),
        UnexpectedTrailingToken(UnexpectedTrailingTokenError),
    }
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::ty::unexpected_token))]
#[error("unexpected {found} in type specifier {spec:?}")]
pub struct UnexpectedTokenError {
    pub found: String,
    pub spec: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::ty::expected_token))]
#[error("expected '{expected}', found {found}")]
pub struct ExpectedTokenError {
    pub expected: String,
    pub found: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::ty::trailing_token))]
#[error("unexpected token {found} after type specifier {spec:?}")]
pub struct UnexpectedTrailingTokenError {
    pub found: String,
    pub spec: String,
}

declare_error_type! {
    #[error("memory model error: {0}")]
    pub enum ModelError {
        UnsupportedArchitecture(UnsupportedArchitectureError),
    }
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::model::unsupported_architecture))]
#[error("unknown or unsupported architecture {arch}")]
pub struct UnsupportedArchitectureError {
    pub arch: String,
}

/// Result of an operation's local verify contract.
pub(crate) type OpResult = Result<(), OpError>;

/// Failure of a single operation's stack contract. Wrapped into an
/// [`OperationError`] carrying the function name, instruction pointer and
/// operation text.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum OpError {
    #[error("missing type")]
    MissingType,
    #[error("missing index type")]
    MissingIndexType,
    #[error("evaluation stack underflow")]
    StackUnderflow,
    #[error("mismatched operand types: {a} and {b}")]
    MismatchedOperands { a: TypeId, b: TypeId },
    #[error("mismatched operands types vs result type: {got} and {expected}")]
    MismatchedResultType { got: TypeId, expected: TypeId },
    #[error("mismatched types, got {got}, expected {expected}")]
    MismatchedTypes { got: TypeId, expected: TypeId },
    #[error("operand type mismatch, got {got}, expected {expected}")]
    MismatchedOperand { got: TypeId, expected: TypeId },
    #[error("have {got}, expected type {expected}")]
    UnexpectedOperandType { got: TypeId, expected: TypeId },
    #[error("invalid operand type: {got}")]
    InvalidOperandType { got: TypeId },
    #[error("unexpected branch stack item of type {got} (expected {expected})")]
    UnexpectedBranchOperand { got: TypeId, expected: TypeId },
    #[error("invalid argument index {index}")]
    InvalidArgumentIndex { index: usize },
    #[error("invalid result index {index}")]
    InvalidResultIndex { index: usize },
    #[error("invalid variable index {index}")]
    InvalidVariableIndex { index: usize },
    #[error("expected function type, got {got}")]
    ExpectedFunctionType { got: TypeId },
    #[error("expected a function pointer before the function arguments, got {got}")]
    ExpectedFunctionPointer { got: TypeId },
    #[error("mismatched result #{index}, got {got}, expected {expected}")]
    MismatchedResult {
        index: usize,
        got: TypeId,
        expected: TypeId,
    },
    #[error("invalid argument #{index} type, got {got}, expected {expected}")]
    InvalidArgument {
        index: usize,
        got: TypeId,
        expected: TypeId,
    },
    #[error("mismatched destination type, got {got}, expected {expected}")]
    MismatchedDestination { got: TypeId, expected: TypeId },
    #[error("mismatched source type, got {got}, expected {expected}")]
    MismatchedSource { got: TypeId, expected: TypeId },
    #[error("invalid index type {got}")]
    InvalidIndexType { got: TypeId },
    #[error("expected a pointer type, have {got}")]
    ExpectedPointerType { got: TypeId },
    #[error("expected a pointer at TOS, got {got}")]
    ExpectedPointerAtTos { got: TypeId },
    #[error("expected pointer and value at TOS, got {address} and {value}")]
    ExpectedPointerAndValue { address: TypeId, value: TypeId },
    #[error("expected a pointer to a struct/union, have {got}")]
    ExpectedStructOrUnionPointer { got: TypeId },
    #[error("expected struct/union type, have {got}")]
    ExpectedStructOrUnionType { got: TypeId },
    #[error("mismatched field pointer types, got {got}, expected {expected}")]
    MismatchedFieldPointer { got: TypeId, expected: TypeId },
    #[error("invalid field index {index}")]
    InvalidFieldIndex { index: usize },
    #[error("invalid operand type {got}")]
    InvalidIncrementOperand { got: TypeId },
    #[error("left operand of a shift must be an integral type, have {got}")]
    NonIntegralShiftOperand { got: TypeId },
    #[error("mismatched shift count type, got {got}, expected {expected}")]
    MismatchedShiftCount { got: TypeId, expected: TypeId },
    #[error("non empty evaluation stack at scope begin")]
    NonEmptyStackAtScopeBegin,
    #[error("non empty evaluation stack at scope end")]
    NonEmptyStackAtScopeEnd,
    #[error("non empty evaluation stack at named label")]
    NonEmptyStackAtNamedLabel,
    #[error("invalid label")]
    InvalidLabel,
    #[error("non empty evaluation stack on return: {stack}")]
    NonEmptyStackOnReturn { stack: String },
    #[error("evaluation stack must have exactly one item")]
    ComputedGotoStackShape,
    #[error("invalid TOS type for a computed goto, have {got}")]
    InvalidComputedGotoOperand { got: TypeId },
    #[error("invalid default case")]
    InvalidDefaultCase,
    #[error("mismatched number of values and cases")]
    MismatchedSwitchArms,
    #[error("invalid switch case value of type {got}")]
    InvalidSwitchValue { got: TypeId },
    #[error("unsupported switch case value")]
    UnsupportedSwitchValue,
}

declare_error_type! {
    #[error("verify error: {0}")]
    pub enum VerifyError {
        EmptyFunctionBody(EmptyFunctionBodyError),
        InvalidSingleOperation(InvalidSingleOperationError),
        UnbalancedScope(UnbalancedScopeError),
        UnbalancedScopes(UnbalancedScopesError),
        MissingReturn(MissingReturnError),
        LabelRedefined(LabelRedefinedError),
        DeclarationIndex(DeclarationIndexError),
        UndefinedBranchTarget(UndefinedBranchTargetError),
        StackDepthMismatch(StackDepthMismatchError),
        StacksDiffer(StacksDifferError),
        Operation(OperationError),
    }
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::verify::empty_body))]
#[error("function body cannot be empty")]
pub struct EmptyFunctionBodyError {}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::verify::invalid_operation))]
#[error("invalid operation\n{operation}")]
pub struct InvalidSingleOperationError {
    pub operation: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::verify::unbalanced_scope))]
#[error("unbalanced end scope\n{function}:{ip:#x}: {operation}")]
pub struct UnbalancedScopeError {
    pub function: String,
    pub ip: usize,
    pub operation: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::verify::unbalanced_scopes))]
#[error("unbalanced BeginScope/EndScope in {function}")]
pub struct UnbalancedScopesError {
    pub function: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::verify::missing_return))]
#[error("missing return before end of function\n{function}:{ip:#x}: {operation}")]
pub struct MissingReturnError {
    pub function: String,
    pub ip: usize,
    pub operation: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::verify::label_redefined))]
#[error("label redefined\n{function}:{ip:#x}: {operation}")]
pub struct LabelRedefinedError {
    pub function: String,
    pub ip: usize,
    pub operation: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::verify::declaration_index))]
#[error("variable declaration out of index order\n{function}:{ip:#x}: {operation}")]
pub struct DeclarationIndexError {
    pub function: String,
    pub ip: usize,
    pub operation: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::verify::undefined_branch_target))]
#[error("undefined branch target\n{function}:{ip:#x}: {operation}")]
pub struct UndefinedBranchTargetError {
    pub function: String,
    pub ip: usize,
    pub operation: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::verify::stack_depth))]
#[error("evaluation stacks depth differs {got} {expected}\n{function}:{ip:#x}: {operation}")]
pub struct StackDepthMismatchError {
    pub function: String,
    pub ip: usize,
    pub operation: String,
    pub got: String,
    pub expected: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::verify::stacks_differ))]
#[error("evaluation stacks differ {got} {expected}\n{function}:{ip:#x}: {operation}")]
pub struct StacksDifferError {
    pub function: String,
    pub ip: usize,
    pub operation: String,
    pub got: String,
    pub expected: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::verify::operation))]
#[error("{error}\n{function}:{ip:#x}: {operation}")]
pub struct OperationError {
    pub function: String,
    pub ip: usize,
    pub operation: String,
    #[source]
    pub error: OpError,
}

declare_error_type! {
    #[error("link error: {0}")]
    pub enum LinkError {
        StartUndefined(StartUndefinedError),
        UndefinedExtern(UndefinedExternError),
        UndefinedIntern(UndefinedInternError),
        DuplicateInternal(DuplicateInternalError),
        DuplicateExternalFunction(DuplicateExternalFunctionError),
        IncompatibleDefinition(IncompatibleDefinitionError),
        Internal(LinkInternalError),
    }
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::link::start_undefined))]
#[error("linker: _start undefined (forgotten crt0?)")]
pub struct StartUndefinedError {}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::link::undefined_extern))]
#[error("{position}: linker: undefined extern {name}")]
pub struct UndefinedExternError {
    pub name: String,
    pub position: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::link::undefined_intern))]
#[error("{position}: linker: undefined {name}")]
pub struct UndefinedInternError {
    pub name: String,
    pub position: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::link::duplicate_internal))]
#[error("duplicate internal symbol {name}")]
pub struct DuplicateInternalError {
    pub name: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::link::duplicate_external_function))]
#[error("duplicate external function {name}")]
pub struct DuplicateExternalFunctionError {
    pub name: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::link::incompatible_definition))]
#[error("incompatible duplicate definitions of {name}")]
pub struct IncompatibleDefinitionError {
    pub name: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::link::internal))]
#[error("linker internal error: {message}")]
pub struct LinkInternalError {
    pub message: String,
}

declare_error_type! {
    #[error("snapshot error: {0}")]
    pub enum SnapshotError {
        UnrecognizedFormat(UnrecognizedFormatError),
        CorruptedFile(CorruptedFileError),
        InvalidPlatform(InvalidPlatformError),
        InvalidArchitecture(InvalidArchitectureError),
        InvalidVersion(InvalidVersionError),
        Io(SnapshotIoError),
        Codec(SnapshotCodecError),
    }
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::snapshot::unrecognized_format))]
#[error("unrecognized file format")]
pub struct UnrecognizedFormatError {}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::snapshot::corrupted_file))]
#[error("corrupted file")]
pub struct CorruptedFileError {}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::snapshot::invalid_platform))]
#[error("invalid platform {platform:?}")]
pub struct InvalidPlatformError {
    pub platform: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::snapshot::invalid_architecture))]
#[error("invalid architecture {arch:?}")]
pub struct InvalidArchitectureError {
    pub arch: String,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::snapshot::invalid_version))]
#[error("invalid version number {version}")]
pub struct InvalidVersionError {
    pub version: u64,
}

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::snapshot::io))]
#[error("snapshot io: {0}")]
pub struct SnapshotIoError(#[from] pub std::io::Error);

#[derive(Error, Diagnostic, Debug)]
#[diagnostic(code(ir::snapshot::codec))]
#[error("snapshot codec: {0}")]
pub struct SnapshotCodecError(#[from] pub bincode::Error);

impl From<std::io::Error> for SnapshotError {
    fn from(error: std::io::Error) -> Self {
        SnapshotError::Io(SnapshotIoError(error))
    }
}

impl From<bincode::Error> for SnapshotError {
    fn from(error: bincode::Error) -> Self {
        SnapshotError::Codec(SnapshotCodecError(error))
    }
}

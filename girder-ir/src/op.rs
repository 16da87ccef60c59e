//! The operation set of the abstract stack machine.
//!
//! Operations form a closed set: every operation is a struct wrapped by the
//! [`Operation`] enum, carries the source position of the construct it was
//! produced from, and knows how to check its own stack contract against a
//! [`VerifyCtx`](crate::verify::VerifyCtx). Branch targets carry either a
//! non-empty name or a non-negative number; exactly one is used.
//!
//! `Display` renders an operation as one line of an assembly style listing.

use crate::error::{OpError, OpResult};
use crate::intern::{known, NameId, StringId, TypeId};
use crate::ty::TypeKind;
use crate::value::Value;
use crate::verify::VerifyCtx;
use crate::Linkage;
use girder_span::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Mnemonic column width of the listing format.
const OPW: usize = 16;

fn addr(address: bool) -> &'static str {
    match address {
        true => "&",
        false => "",
    }
}

/// Add operation adds the top stack item (b) and the previous one (a) and
/// replaces both operands with a + b.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Add {
    /// Operands type.
    pub type_id: TypeId,
    pub span: Span,
}

/// AllocResult operation reserves evaluation stack space for a result of the
/// annotated type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocResult {
    pub type_id: TypeId,
    pub type_name: NameId,
    pub span: Span,
}

/// And operation replaces TOS with the bitwise and of the top two stack
/// items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct And {
    /// Operands type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Argument pushes argument `index`, or its address, to the evaluation
/// stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub address: bool,
    pub index: usize,
    pub type_id: TypeId,
    pub span: Span,
}

/// Arguments operation annotates that function results, if any, are
/// allocated and a function pointer is at TOS. Evaluation of any function
/// arguments follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arguments {
    /// TOS contains a function pointer for a subsequent [`CallFP`].
    /// Determined by the linker.
    pub function_pointer: bool,
    pub span: Span,
}

/// BeginScope operation annotates entering a block scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeginScope {
    /// The evaluation stack may be non-empty on entering a value scope
    /// (a statement expression).
    pub value: bool,
    pub span: Span,
}

/// Bool operation converts TOS to a bool (ie. an int32) such that the result
/// reflects if the operand was non zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bool {
    /// Operand type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Call operation performs a static function call. The evaluation stack
/// contains the space reserved for function results, if any, and any
/// function arguments. On return all arguments are removed from the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Actual number of arguments passed to the function.
    pub arguments: usize,
    /// The call operation is produced by the C comma operator for a void
    /// function.
    pub comma: bool,
    /// A negative value, or a function object index as resolved by the
    /// linker.
    pub index: i64,
    /// Type of the function.
    pub type_id: TypeId,
    pub span: Span,
}

/// CallFP operation performs a function pointer call. The evaluation stack
/// contains the space reserved for function results, if any, the function
/// pointer and any function arguments. On return all arguments and the
/// function pointer are removed from the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallFP {
    /// Actual number of arguments passed to the function.
    pub arguments: usize,
    /// The call operation is produced by the C comma operator for a void
    /// function.
    pub comma: bool,
    /// Type of the function pointer.
    pub type_id: TypeId,
    pub span: Span,
}

/// Const operation pushes a constant value on the evaluation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Const {
    pub type_id: TypeId,
    pub value: Value,
    pub span: Span,
}

/// Const32 operation pushes a 32 bit value on the evaluation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Const32 {
    /// This operation is an artifact of || or &&.
    pub l_op: bool,
    pub type_id: TypeId,
    pub value: i32,
    pub span: Span,
}

/// Const64 operation pushes a 64 bit value on the evaluation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Const64 {
    pub type_id: TypeId,
    pub value: i64,
    pub span: Span,
}

/// ConstC128 operation pushes a complex128 value on the evaluation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstC128 {
    pub type_id: TypeId,
    pub re: f64,
    pub im: f64,
    pub span: Span,
}

/// Convert operation converts TOS to the result type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Convert {
    /// Conversion type.
    pub result: TypeId,
    /// Operand type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Copy assigns source, which address is at TOS, to dest, which address is
/// the previous stack item. The source address is removed from the stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Copy {
    /// Operand type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Cpl operation replaces TOS with ^TOS (bitwise complement).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cpl {
    /// Operand type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Div operation divides the top stack item (b) and the previous one (a) and
/// replaces both operands with a / b. The operation traps at runtime if the
/// operands are integers and b == 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Div {
    /// Operands type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Drop operation removes one item from the evaluation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drop {
    /// The drop operation is produced by the C comma operator.
    pub comma: bool,
    /// This operation is an artifact of || or &&.
    pub l_op: bool,
    pub type_id: TypeId,
    pub span: Span,
}

/// Dup operation duplicates the top stack item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dup {
    pub type_id: TypeId,
    pub span: Span,
}

/// Element replaces a pointer and an index with the indexed element or its
/// address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub address: bool,
    pub index_type: TypeId,
    /// Negate the index expression.
    pub neg: bool,
    /// The indexed type.
    pub type_id: TypeId,
    pub span: Span,
}

/// EndScope operation annotates leaving a block scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndScope {
    /// Leaving a value scope (a statement expression) may leave values on
    /// the evaluation stack.
    pub value: bool,
    pub span: Span,
}

/// Eq operation compares the top stack item (b) and the previous one (a) and
/// replaces both operands with a non zero int32 value if a == b or zero
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eq {
    /// Operands type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Field replaces a struct/union pointer at TOS with its field by index, or
/// its address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub address: bool,
    pub index: usize,
    /// Pointer to a struct/union.
    pub type_id: TypeId,
    pub span: Span,
}

/// FieldValue replaces a struct/union at TOS with its field by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub index: usize,
    /// Struct/union type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Geq operation compares the top stack item (b) and the previous one (a)
/// and replaces both operands with a non zero int32 value if a >= b or zero
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geq {
    /// Operands type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Global operation pushes a global variable, or its address, to the
/// evaluation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Global {
    pub address: bool,
    /// A negative value, or an object index as resolved by the linker.
    pub index: i64,
    pub linkage: Linkage,
    pub name: NameId,
    pub type_id: TypeId,
    pub type_name: NameId,
    pub span: Span,
}

/// Gt operation compares the top stack item (b) and the previous one (a) and
/// replaces both operands with a non zero int32 value if a > b or zero
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gt {
    /// Operands type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Jmp operation performs a branch to a named or numbered label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jmp {
    /// This operation is an artifact of the conditional operator.
    pub cond: bool,
    pub name: NameId,
    pub number: i64,
    pub span: Span,
}

/// JmpP operation performs a branch to the pointer at TOS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JmpP {
    pub span: Span,
}

/// Jnz operation performs a branch to a named or numbered label if the top
/// of the stack is non zero. The TOS type must be int32 and the operation
/// removes TOS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jnz {
    /// This operation is an artifact of || or &&.
    pub l_op: bool,
    pub name: NameId,
    pub number: i64,
    pub span: Span,
}

/// Jz operation performs a branch to a named or numbered label if the top of
/// the stack is zero. The TOS type must be int32 and the operation removes
/// TOS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jz {
    /// This operation is an artifact of || or && or the conditional
    /// operator.
    pub l_op: bool,
    pub name: NameId,
    pub number: i64,
    pub span: Span,
}

/// Label operation declares a named or numbered branch target.
///
/// A valid label has a non-empty name or a non-negative number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    /// This operation is an artifact of the conditional operator.
    pub cond: bool,
    /// This operation is an artifact of &&.
    pub l_and: bool,
    /// This operation is an artifact of ||.
    pub l_or: bool,
    pub name: NameId,
    /// This operation is an artifact of the conditional operator.
    pub nop: bool,
    pub number: i64,
    pub span: Span,
}

impl Label {
    pub fn named(name: NameId, span: Span) -> Self {
        Self {
            cond: false,
            l_and: false,
            l_or: false,
            name,
            nop: false,
            number: -1,
            span,
        }
    }

    pub fn numbered(number: i64, span: Span) -> Self {
        Self {
            cond: false,
            l_and: false,
            l_or: false,
            name: NameId::default(),
            nop: false,
            number,
            span,
        }
    }

    /// A valid label has a non-empty name or a non-negative number.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() || self.number >= 0
    }

    /// The key labels are registered under: names are disjoint from numbers.
    pub(crate) fn key(&self) -> i64 {
        branch_key(self.name, self.number)
    }

    fn target(&self) -> String {
        match self.name.is_empty() {
            true => self.number.to_string(),
            false => self.name.to_string(),
        }
    }
}

/// The label-map key for a branch target: named targets map below zero,
/// numbered targets map to their number.
pub(crate) fn branch_key(name: NameId, number: i64) -> i64 {
    match name.is_empty() {
        true => number,
        false => -i64::from(name.0),
    }
}

/// Leq operation compares the top stack item (b) and the previous one (a)
/// and replaces both operands with a non zero int32 value if a <= b or zero
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leq {
    /// Operands type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Load replaces a pointer at TOS by its pointee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    /// Pointer type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Lsh operation uses the top stack item (b), which must be an int32, and
/// the previous one (a), which must be an integral type, and replaces both
/// operands with a << b.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lsh {
    /// Operand (a) type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Lt operation compares the top stack item (b) and the previous one (a) and
/// replaces both operands with a non zero int32 value if a < b or zero
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lt {
    /// Operands type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Mul operation multiplies the top stack item (b) and the previous one (a)
/// and replaces both operands with a * b.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mul {
    /// Operands type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Neg operation replaces TOS with 0-TOS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neg {
    /// Operand type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Neq operation compares the top stack item (b) and the previous one (a)
/// and replaces both operands with a non zero int32 value if a != b or zero
/// otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neq {
    /// Operands type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Nil pushes a typed nil to TOS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nil {
    /// Pointer type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Not replaces the boolean value at TOS with !value. The TOS type must be
/// int32.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Not {
    pub span: Span,
}

/// Or operation replaces TOS with the bitwise or of the top two stack items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Or {
    /// Operands type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Panic operation aborts execution with a stack trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panic {
    pub span: Span,
}

/// PostIncrement operation adds `delta` to the value pointed to by the
/// address at TOS and replaces TOS by the value the pointee had before the
/// increment. If `bits` is non zero then the effective operand type is
/// `bit_field_type` and the bit field starts at bit `bit_offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostIncrement {
    pub bit_field_type: TypeId,
    pub bit_offset: u32,
    pub bits: u32,
    pub delta: i64,
    /// Operand type.
    pub type_id: TypeId,
    pub span: Span,
}

/// PreIncrement operation adds `delta` to the value pointed to by the
/// address at TOS and replaces TOS by the new value of the pointee. If
/// `bits` is non zero then the effective operand type is `bit_field_type`
/// and the bit field starts at bit `bit_offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreIncrement {
    pub bit_field_type: TypeId,
    pub bit_offset: u32,
    pub bits: u32,
    pub delta: i64,
    /// Operand type.
    pub type_id: TypeId,
    pub span: Span,
}

/// PtrDiff operation subtracts the top stack item (b) from the previous one
/// (a) and replaces both operands with a - b of the annotated integer type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PtrDiff {
    pub ptr_type: TypeId,
    /// Result type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Rem operation divides the top stack item (b) and the previous one (a) and
/// replaces both operands with a % b. The operation traps at runtime if
/// b == 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rem {
    /// Operands type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Result pushes a function result by index, or its address, to the
/// evaluation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Result {
    pub address: bool,
    pub index: usize,
    pub type_id: TypeId,
    pub span: Span,
}

/// Return operation transfers control back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Return {
    pub span: Span,
}

/// Rsh operation uses the top stack item (b), which must be an int32, and
/// the previous one (a), which must be an integral type, and replaces both
/// operands with a >> b.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rsh {
    /// Operand (a) type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Store operation stores the TOS value at the address in the preceding
/// stack position. The address is removed from the evaluation stack. If
/// `bits` is non zero then the destination is a bit field starting at bit
/// `bit_offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    pub bit_offset: u32,
    pub bits: u32,
    /// Type of the value.
    pub type_id: TypeId,
    pub span: Span,
}

/// StringConst operation pushes a string value on the evaluation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringConst {
    pub value: StringId,
    /// Type of the pointer to the string value.
    pub type_id: TypeId,
    pub span: Span,
}

/// Sub operation subtracts the top stack item (b) from the previous one (a)
/// and replaces both operands with a - b.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sub {
    /// Operands type.
    pub type_id: TypeId,
    pub span: Span,
}

/// Switch jumps to a label according to the value at TOS, or to a default
/// label. The value at TOS is removed from the evaluation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Switch {
    pub default: Label,
    pub labels: Vec<Label>,
    /// Operand type.
    pub type_id: TypeId,
    pub values: Vec<Value>,
    pub span: Span,
}

/// Variable pushes a function local variable by index, or its address, to
/// the evaluation stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub address: bool,
    pub index: usize,
    pub type_id: TypeId,
    pub span: Span,
}

/// VariableDeclaration operation declares a function local variable. The
/// name, type name and initializer are all optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDeclaration {
    /// 0-based index within a function.
    pub index: usize,
    pub name: NameId,
    pub type_id: TypeId,
    pub type_name: NameId,
    pub value: Option<Value>,
    pub span: Span,
}

/// Xor operation replaces TOS with the bitwise xor of the top two stack
/// items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Xor {
    /// Operands type.
    pub type_id: TypeId,
    pub span: Span,
}

/// A unit of execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    Add(Add),
    AllocResult(AllocResult),
    And(And),
    Argument(Argument),
    Arguments(Arguments),
    BeginScope(BeginScope),
    Bool(Bool),
    Call(Call),
    CallFP(CallFP),
    Const(Const),
    Const32(Const32),
    Const64(Const64),
    ConstC128(ConstC128),
    Convert(Convert),
    Copy(Copy),
    Cpl(Cpl),
    Div(Div),
    Drop(Drop),
    Dup(Dup),
    Element(Element),
    EndScope(EndScope),
    Eq(Eq),
    Field(Field),
    FieldValue(FieldValue),
    Geq(Geq),
    Global(Global),
    Gt(Gt),
    Jmp(Jmp),
    JmpP(JmpP),
    Jnz(Jnz),
    Jz(Jz),
    Label(Label),
    Leq(Leq),
    Load(Load),
    Lsh(Lsh),
    Lt(Lt),
    Mul(Mul),
    Neg(Neg),
    Neq(Neq),
    Nil(Nil),
    Not(Not),
    Or(Or),
    Panic(Panic),
    PostIncrement(PostIncrement),
    PreIncrement(PreIncrement),
    PtrDiff(PtrDiff),
    Rem(Rem),
    Result(Result),
    Return(Return),
    Rsh(Rsh),
    Store(Store),
    StringConst(StringConst),
    Sub(Sub),
    Switch(Switch),
    Variable(Variable),
    VariableDeclaration(VariableDeclaration),
    Xor(Xor),
}

impl Operation {
    /// The source position of the construct the operation was produced
    /// from.
    pub fn pos(&self) -> Span {
        match self {
            Operation::Add(op) => op.span,
            Operation::AllocResult(op) => op.span,
            Operation::And(op) => op.span,
            Operation::Argument(op) => op.span,
            Operation::Arguments(op) => op.span,
            Operation::BeginScope(op) => op.span,
            Operation::Bool(op) => op.span,
            Operation::Call(op) => op.span,
            Operation::CallFP(op) => op.span,
            Operation::Const(op) => op.span,
            Operation::Const32(op) => op.span,
            Operation::Const64(op) => op.span,
            Operation::ConstC128(op) => op.span,
            Operation::Convert(op) => op.span,
            Operation::Copy(op) => op.span,
            Operation::Cpl(op) => op.span,
            Operation::Div(op) => op.span,
            Operation::Drop(op) => op.span,
            Operation::Dup(op) => op.span,
            Operation::Element(op) => op.span,
            Operation::EndScope(op) => op.span,
            Operation::Eq(op) => op.span,
            Operation::Field(op) => op.span,
            Operation::FieldValue(op) => op.span,
            Operation::Geq(op) => op.span,
            Operation::Global(op) => op.span,
            Operation::Gt(op) => op.span,
            Operation::Jmp(op) => op.span,
            Operation::JmpP(op) => op.span,
            Operation::Jnz(op) => op.span,
            Operation::Jz(op) => op.span,
            Operation::Label(op) => op.span,
            Operation::Leq(op) => op.span,
            Operation::Load(op) => op.span,
            Operation::Lsh(op) => op.span,
            Operation::Lt(op) => op.span,
            Operation::Mul(op) => op.span,
            Operation::Neg(op) => op.span,
            Operation::Neq(op) => op.span,
            Operation::Nil(op) => op.span,
            Operation::Not(op) => op.span,
            Operation::Or(op) => op.span,
            Operation::Panic(op) => op.span,
            Operation::PostIncrement(op) => op.span,
            Operation::PreIncrement(op) => op.span,
            Operation::PtrDiff(op) => op.span,
            Operation::Rem(op) => op.span,
            Operation::Result(op) => op.span,
            Operation::Return(op) => op.span,
            Operation::Rsh(op) => op.span,
            Operation::Store(op) => op.span,
            Operation::StringConst(op) => op.span,
            Operation::Sub(op) => op.span,
            Operation::Switch(op) => op.span,
            Operation::Variable(op) => op.span,
            Operation::VariableDeclaration(op) => op.span,
            Operation::Xor(op) => op.span,
        }
    }

    /// Run the operation's local stack contract against the context.
    pub(crate) fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        match self {
            Operation::Add(op) => op.verify(cx),
            Operation::AllocResult(op) => op.verify(cx),
            Operation::And(op) => op.verify(cx),
            Operation::Argument(op) => op.verify(cx),
            Operation::Arguments(_) => Ok(()), // Verified in Call/CallFP.
            Operation::BeginScope(op) => op.verify(cx),
            Operation::Bool(op) => op.verify(cx),
            Operation::Call(op) => op.verify(cx),
            Operation::CallFP(op) => op.verify(cx),
            Operation::Const(op) => op.verify(cx),
            Operation::Const32(op) => op.verify(cx),
            Operation::Const64(op) => op.verify(cx),
            Operation::ConstC128(op) => op.verify(cx),
            Operation::Convert(op) => op.verify(cx),
            Operation::Copy(op) => op.verify(cx),
            Operation::Cpl(op) => op.verify(cx),
            Operation::Div(op) => op.verify(cx),
            Operation::Drop(op) => op.verify(cx),
            Operation::Dup(op) => op.verify(cx),
            Operation::Element(op) => op.verify(cx),
            Operation::EndScope(op) => op.verify(cx),
            Operation::Eq(op) => op.verify(cx),
            Operation::Field(op) => op.verify(cx),
            Operation::FieldValue(op) => op.verify(cx),
            Operation::Geq(op) => op.verify(cx),
            Operation::Global(op) => op.verify(cx),
            Operation::Gt(op) => op.verify(cx),
            Operation::Jmp(_) => Ok(()),
            Operation::JmpP(op) => op.verify(cx),
            Operation::Jnz(_) | Operation::Jz(_) => cx.branch(),
            Operation::Label(op) => op.verify(cx),
            Operation::Leq(op) => op.verify(cx),
            Operation::Load(op) => op.verify(cx),
            Operation::Lsh(op) => op.verify(cx),
            Operation::Lt(op) => op.verify(cx),
            Operation::Mul(op) => op.verify(cx),
            Operation::Neg(op) => op.verify(cx),
            Operation::Neq(op) => op.verify(cx),
            Operation::Nil(op) => op.verify(cx),
            Operation::Not(op) => op.verify(cx),
            Operation::Or(op) => op.verify(cx),
            Operation::Panic(_) => Ok(()),
            Operation::PostIncrement(op) => op.verify(cx),
            Operation::PreIncrement(op) => op.verify(cx),
            Operation::PtrDiff(op) => op.verify(cx),
            Operation::Rem(op) => op.verify(cx),
            Operation::Result(op) => op.verify(cx),
            Operation::Return(op) => op.verify(cx),
            Operation::Rsh(op) => op.verify(cx),
            Operation::Store(op) => op.verify(cx),
            Operation::StringConst(op) => op.verify(cx),
            Operation::Sub(op) => op.verify(cx),
            Operation::Switch(op) => op.verify(cx),
            Operation::Variable(op) => op.verify(cx),
            Operation::VariableDeclaration(op) => op.verify(cx),
            Operation::Xor(op) => op.verify(cx),
        }
    }
}

fn require_type(type_id: TypeId) -> OpResult {
    match type_id.is_empty() {
        true => Err(OpError::MissingType),
        false => Ok(()),
    }
}

impl Add {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.binop(self.type_id)
    }
}

impl AllocResult {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.stack.push(self.type_id);
        Ok(())
    }
}

impl And {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.binop(self.type_id)
    }
}

impl Argument {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        let arguments = &cx.func.arguments;
        if self.index >= arguments.len() {
            return Err(OpError::InvalidArgumentIndex { index: self.index });
        }
        let mut t = arguments[self.index];
        if self.address {
            t = cx.cache.pointer_to(t);
        }
        let expected = t.id();
        if self.type_id != expected {
            // An array argument decays to a pointer to its item type.
            let decayed = cx
                .cache
                .must_type(expected)
                .as_array()
                .map(|a| cx.cache.pointer_to(a.item).id());
            if decayed != Some(self.type_id) {
                return Err(OpError::UnexpectedOperandType {
                    got: self.type_id,
                    expected,
                });
            }
        }
        cx.stack.push(self.type_id);
        Ok(())
    }
}

impl BeginScope {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        if self.value {
            cx.block_value_level += 1;
        }
        if !cx.stack.is_empty() && cx.block_value_level == 0 {
            return Err(OpError::NonEmptyStackAtScopeBegin);
        }
        Ok(())
    }
}

impl Bool {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        let Some(&tos) = cx.stack.last() else {
            return Err(OpError::StackUnderflow);
        };
        if tos != self.type_id && !cx.assignable(tos, self.type_id) {
            return Err(OpError::MismatchedTypes {
                got: tos,
                expected: self.type_id,
            });
        }
        *cx.stack.last_mut().unwrap() = known().int32;
        Ok(())
    }
}

impl Call {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        let t = cx.cache.must_type(self.type_id);
        let Some(func) = t.as_function() else {
            return Err(OpError::ExpectedFunctionType { got: self.type_id });
        };
        if cx.stack.len() < self.arguments {
            return Err(OpError::StackUnderflow);
        }
        let ap = cx.stack.len() - self.arguments;
        let results = &func.results;
        if cx.stack.len() < results.len() + self.arguments {
            return Err(OpError::StackUnderflow);
        }
        for (i, result) in results.iter().enumerate() {
            let got = cx.stack[ap - results.len() + i];
            let expected = result.id();
            if got != expected && !cx.assignable(got, expected) {
                return Err(OpError::MismatchedResult {
                    index: i,
                    got,
                    expected,
                });
            }
        }
        for (i, &got) in cx.stack[ap..].iter().enumerate() {
            if i >= func.arguments.len() {
                break;
            }
            let expected = func.arguments[i].id();
            if got != expected && !cx.assignable(got, expected) && !cx.decays_to(expected, got) {
                return Err(OpError::InvalidArgument {
                    index: i,
                    got,
                    expected,
                });
            }
        }
        cx.stack.truncate(ap);
        Ok(())
    }
}

impl CallFP {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        if cx.stack.len() < 1 + self.arguments {
            return Err(OpError::StackUnderflow);
        }
        let fp = cx.stack.len() - 1 - self.arguments;
        let tid = cx.stack[fp];
        let t = cx.cache.must_type(tid);
        let Some(pointer) = t.as_pointer() else {
            return Err(OpError::ExpectedFunctionPointer { got: tid });
        };
        let Some(func) = pointer.element.as_function() else {
            return Err(OpError::ExpectedFunctionPointer {
                got: pointer.element.id(),
            });
        };
        let results = &func.results;
        if cx.stack.len() < results.len() + 1 + self.arguments {
            return Err(OpError::StackUnderflow);
        }
        for (i, result) in results.iter().enumerate() {
            let got = cx.stack[fp - results.len() + i];
            let expected = result.id();
            if got != expected && !cx.assignable(got, expected) {
                return Err(OpError::MismatchedResult {
                    index: i,
                    got,
                    expected,
                });
            }
        }
        for (i, &got) in cx.stack[fp + 1..].iter().enumerate() {
            if i >= func.arguments.len() {
                break;
            }
            let expected = func.arguments[i].id();
            if got != expected && !cx.assignable(got, expected) && !cx.decays_to(expected, got) {
                return Err(OpError::InvalidArgument {
                    index: i,
                    got,
                    expected,
                });
            }
        }
        cx.stack.truncate(fp);
        Ok(())
    }
}

impl Const {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.stack.push(self.type_id);
        Ok(())
    }
}

impl Const32 {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.stack.push(self.type_id);
        Ok(())
    }
}

impl Const64 {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.stack.push(self.type_id);
        Ok(())
    }
}

impl ConstC128 {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.stack.push(self.type_id);
        Ok(())
    }
}

impl Convert {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        if self.type_id.is_empty() || self.result.is_empty() {
            return Err(OpError::MissingType);
        }
        let Some(&tos) = cx.stack.last() else {
            return Err(OpError::StackUnderflow);
        };
        if tos != self.type_id && !cx.assignable(tos, self.type_id) {
            return Err(OpError::MismatchedTypes {
                got: tos,
                expected: self.type_id,
            });
        }
        *cx.stack.last_mut().unwrap() = self.result;
        Ok(())
    }
}

impl Copy {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        let n = cx.stack.len();
        if n < 2 {
            return Err(OpError::StackUnderflow);
        }
        let mut t = cx.cache.must_type(self.type_id);
        if let Some(array) = t.as_array() {
            t = array.item;
        }
        let expected = cx.cache.pointer_to(t).id();
        let void_ptr = known().void_ptr;
        if cx.stack[n - 2] != expected && cx.stack[n - 2] != void_ptr {
            return Err(OpError::MismatchedDestination {
                got: cx.stack[n - 2],
                expected,
            });
        }
        if cx.stack[n - 1] != expected && cx.stack[n - 1] != void_ptr {
            return Err(OpError::MismatchedSource {
                got: cx.stack[n - 1],
                expected,
            });
        }
        cx.stack.truncate(n - 1);
        Ok(())
    }
}

impl Cpl {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.unop(true)
    }
}

impl Div {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.binop(self.type_id)
    }
}

impl Drop {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        let Some(&tos) = cx.stack.last() else {
            return Err(OpError::StackUnderflow);
        };
        let mut t = cx.cache.must_type(self.type_id);
        if let Some(array) = t.as_array() {
            t = cx.cache.pointer_to(array.item);
        }
        if !cx.assignable(tos, t.id()) {
            return Err(OpError::MismatchedOperand {
                got: tos,
                expected: t.id(),
            });
        }
        cx.stack.pop();
        Ok(())
    }
}

impl Dup {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        let Some(&tos) = cx.stack.last() else {
            return Err(OpError::StackUnderflow);
        };
        if tos != self.type_id && !cx.assignable(tos, self.type_id) {
            return Err(OpError::MismatchedOperand {
                got: tos,
                expected: self.type_id,
            });
        }
        cx.stack.push(self.type_id);
        Ok(())
    }
}

impl Element {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        if self.index_type.is_empty() {
            return Err(OpError::MissingIndexType);
        }
        if !cx.cache.must_type(self.index_type).kind().is_integral() {
            return Err(OpError::InvalidIndexType {
                got: self.index_type,
            });
        }
        let n = cx.stack.len();
        if n < 2 {
            return Err(OpError::StackUnderflow);
        }
        let expected = cx.stack[n - 2];
        if self.type_id != expected {
            // A pointer to an array indexes as a pointer to its item type,
            // and a void pointer indexes as any pointer type.
            let mut ok = false;
            if let Some(pointer) = cx.cache.must_type(expected).as_pointer() {
                if let Some(array) = pointer.element.as_array() {
                    ok = self.type_id == cx.cache.pointer_to(array.item).id();
                }
            }
            if !ok {
                ok = cx.is_void_ptr(expected) && cx.is_pointer(self.type_id);
            }
            if !ok {
                return Err(OpError::MismatchedTypes {
                    got: self.type_id,
                    expected,
                });
            }
        }
        let Some(pointer) = cx.cache.must_type(self.type_id).as_pointer() else {
            return Err(OpError::ExpectedPointerType { got: self.type_id });
        };
        let mut t = pointer.element;
        if self.address {
            if let Some(array) = t.as_array() {
                t = array.item;
            }
            t = cx.cache.pointer_to(t);
        }
        let id = t.id();
        cx.stack.truncate(n - 2);
        cx.stack.push(id);
        Ok(())
    }
}

impl EndScope {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        if !cx.stack.is_empty() && cx.block_value_level == 0 {
            return Err(OpError::NonEmptyStackAtScopeEnd);
        }
        if self.value {
            cx.block_value_level -= 1;
        }
        Ok(())
    }
}

impl Eq {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.relop(self.type_id)
    }
}

impl Field {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        let Some(&tos) = cx.stack.last() else {
            return Err(OpError::StackUnderflow);
        };
        if self.type_id != tos && !cx.assignable(self.type_id, tos) {
            return Err(OpError::MismatchedFieldPointer {
                got: self.type_id,
                expected: tos,
            });
        }
        let Some(pointer) = cx.cache.must_type(self.type_id).as_pointer() else {
            return Err(OpError::ExpectedPointerType { got: self.type_id });
        };
        let Some(su) = pointer.element.as_struct_or_union() else {
            return Err(OpError::ExpectedStructOrUnionPointer { got: self.type_id });
        };
        if self.index >= su.fields.len() {
            return Err(OpError::InvalidFieldIndex { index: self.index });
        }
        let mut t = su.fields[self.index];
        if self.address {
            if let Some(array) = t.as_array() {
                t = array.item;
            }
            t = cx.cache.pointer_to(t);
        }
        *cx.stack.last_mut().unwrap() = t.id();
        Ok(())
    }
}

impl FieldValue {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        let Some(su) = cx.cache.must_type(self.type_id).as_struct_or_union() else {
            return Err(OpError::ExpectedStructOrUnionType { got: self.type_id });
        };
        let Some(&tos) = cx.stack.last() else {
            return Err(OpError::StackUnderflow);
        };
        if self.type_id != tos {
            return Err(OpError::MismatchedTypes {
                got: self.type_id,
                expected: tos,
            });
        }
        if self.index >= su.fields.len() {
            return Err(OpError::InvalidFieldIndex { index: self.index });
        }
        *cx.stack.last_mut().unwrap() = su.fields[self.index].id();
        Ok(())
    }
}

impl Geq {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.relop(self.type_id)
    }
}

impl Global {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        let t = cx.cache.must_type(self.type_id);
        if self.address && !t.is_pointer() {
            return Err(OpError::ExpectedPointerType { got: self.type_id });
        }
        cx.stack.push(self.type_id);
        Ok(())
    }
}

impl Gt {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.relop(self.type_id)
    }
}

impl JmpP {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        if cx.stack.len() != 1 {
            return Err(OpError::ComputedGotoStackShape);
        }
        let mut t = cx.cache.must_type(cx.stack[0]);
        while let Some(pointer) = t.as_pointer() {
            t = pointer.element;
        }
        if t.id() != known().void {
            return Err(OpError::InvalidComputedGotoOperand { got: t.id() });
        }
        cx.stack.clear();
        Ok(())
    }
}

impl Label {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        if !self.name.is_empty() && !cx.stack.is_empty() {
            return Err(OpError::NonEmptyStackAtNamedLabel);
        }
        if !self.is_valid() {
            return Err(OpError::InvalidLabel);
        }
        Ok(())
    }
}

impl Leq {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.relop(self.type_id)
    }
}

impl Load {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        let Some(&tos) = cx.stack.last() else {
            return Err(OpError::StackUnderflow);
        };
        if self.type_id != tos && !cx.assignable(self.type_id, tos) {
            return Err(OpError::MismatchedTypes {
                got: self.type_id,
                expected: tos,
            });
        }
        let Some(pointer) = cx.cache.must_type(self.type_id).as_pointer() else {
            return Err(OpError::ExpectedPointerType { got: self.type_id });
        };
        *cx.stack.last_mut().unwrap() = pointer.element.id();
        Ok(())
    }
}

fn verify_shift(cx: &mut VerifyCtx<'_, '_>, type_id: TypeId) -> OpResult {
    if !cx.cache.must_type(type_id).kind().is_integral() {
        return Err(OpError::NonIntegralShiftOperand { got: type_id });
    }
    let n = cx.stack.len();
    if n < 2 {
        return Err(OpError::StackUnderflow);
    }
    if cx.stack[n - 2] != type_id {
        return Err(OpError::MismatchedOperand {
            got: cx.stack[n - 2],
            expected: type_id,
        });
    }
    let int32 = known().int32;
    if cx.stack[n - 1] != int32 {
        return Err(OpError::MismatchedShiftCount {
            got: cx.stack[n - 1],
            expected: int32,
        });
    }
    cx.stack.truncate(n - 1);
    Ok(())
}

impl Lsh {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        verify_shift(cx, self.type_id)
    }
}

impl Lt {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.relop(self.type_id)
    }
}

impl Mul {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.binop(self.type_id)
    }
}

impl Neg {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.unop(false)
    }
}

impl Neq {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.relop(self.type_id)
    }
}

impl Nil {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.stack.push(self.type_id);
        Ok(())
    }
}

impl Not {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        let Some(&tos) = cx.stack.last() else {
            return Err(OpError::StackUnderflow);
        };
        let int32 = known().int32;
        if tos != int32 {
            return Err(OpError::MismatchedTypes {
                got: tos,
                expected: int32,
            });
        }
        Ok(())
    }
}

impl Or {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.binop(self.type_id)
    }
}

fn verify_increment(cx: &mut VerifyCtx<'_, '_>, type_id: TypeId, bits: u32, bit_field_type: TypeId) -> OpResult {
    let Some(&tos) = cx.stack.last() else {
        return Err(OpError::StackUnderflow);
    };
    let Some(pointer) = cx.cache.must_type(tos).as_pointer() else {
        return Err(OpError::ExpectedPointerAtTos { got: tos });
    };
    let t = pointer.element;
    if matches!(
        t.kind(),
        TypeKind::Array | TypeKind::Union | TypeKind::Struct | TypeKind::Function
    ) {
        return Err(OpError::InvalidIncrementOperand { got: tos });
    }
    if type_id != t.id() && !cx.assignable(type_id, t.id()) {
        return Err(OpError::MismatchedOperands {
            a: type_id,
            b: t.id(),
        });
    }
    *cx.stack.last_mut().unwrap() = match bits != 0 {
        true => bit_field_type,
        false => type_id,
    };
    Ok(())
}

impl PostIncrement {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        verify_increment(cx, self.type_id, self.bits, self.bit_field_type)
    }
}

impl PreIncrement {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        verify_increment(cx, self.type_id, self.bits, self.bit_field_type)
    }
}

impl PtrDiff {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        if self.type_id.is_empty() || self.ptr_type.is_empty() {
            return Err(OpError::MissingType);
        }
        if !cx.cache.must_type(self.ptr_type).is_pointer() {
            return Err(OpError::ExpectedPointerType { got: self.ptr_type });
        }
        let n = cx.stack.len();
        if n < 2 {
            return Err(OpError::StackUnderflow);
        }
        if !cx.is_pointer(cx.stack[n - 2]) {
            return Err(OpError::ExpectedPointerType {
                got: cx.stack[n - 2],
            });
        }
        let (a, b) = (cx.stack[n - 2], cx.stack[n - 1]);
        if a != b && !cx.assignable(a, b) {
            return Err(OpError::MismatchedOperands { a, b });
        }
        cx.stack.truncate(n - 2);
        cx.stack.push(self.type_id);
        Ok(())
    }
}

impl Rem {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.binop(self.type_id)
    }
}

impl Result {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        let results = &cx.func.results;
        if self.index >= results.len() {
            return Err(OpError::InvalidResultIndex { index: self.index });
        }
        let mut t = results[self.index];
        if self.address {
            t = cx.cache.pointer_to(t);
        }
        if self.type_id != t.id() {
            return Err(OpError::UnexpectedOperandType {
                got: self.type_id,
                expected: t.id(),
            });
        }
        cx.stack.push(self.type_id);
        Ok(())
    }
}

impl Return {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        if !cx.stack.is_empty() {
            return Err(OpError::NonEmptyStackOnReturn {
                stack: cx.stack_image(),
            });
        }
        Ok(())
    }
}

impl Rsh {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        verify_shift(cx, self.type_id)
    }
}

impl Store {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        let n = cx.stack.len();
        if n < 2 {
            return Err(OpError::StackUnderflow);
        }
        let (address, value) = (cx.stack[n - 2], cx.stack[n - 1]);
        let Some(pointer) = cx.cache.must_type(address).as_pointer() else {
            return Err(OpError::ExpectedPointerAndValue { address, value });
        };
        if !cx.assignable(pointer.element.id(), value) {
            return Err(OpError::MismatchedOperands {
                a: pointer.element.id(),
                b: value,
            });
        }
        cx.stack.truncate(n - 2);
        cx.stack.push(value);
        Ok(())
    }
}

impl StringConst {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.stack.push(self.type_id);
        Ok(())
    }
}

impl Sub {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.binop(self.type_id)
    }
}

impl Switch {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        if !self.default.is_valid() {
            return Err(OpError::InvalidDefaultCase);
        }
        if self.values.len() != self.labels.len() {
            return Err(OpError::MismatchedSwitchArms);
        }
        let Some(&tos) = cx.stack.last() else {
            return Err(OpError::StackUnderflow);
        };
        if tos != self.type_id {
            return Err(OpError::MismatchedOperands {
                a: tos,
                b: self.type_id,
            });
        }
        let ids = known();
        for value in &self.values {
            match value {
                Value::Int32(_) => {
                    if self.type_id != ids.int32 && self.type_id != ids.uint32 {
                        return Err(OpError::InvalidSwitchValue { got: self.type_id });
                    }
                }
                Value::Int64(_) => {
                    if self.type_id != ids.int64 && self.type_id != ids.uint64 {
                        return Err(OpError::InvalidSwitchValue { got: self.type_id });
                    }
                }
                _ => return Err(OpError::UnsupportedSwitchValue),
            }
        }
        cx.stack.pop();
        Ok(())
    }
}

impl Variable {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        if self.index >= cx.variables.len() {
            return Err(OpError::InvalidVariableIndex { index: self.index });
        }
        let mut t = cx.cache.must_type(cx.variables[self.index]);
        if self.address {
            if let Some(array) = t.as_array() {
                t = array.item;
            }
            t = cx.cache.pointer_to(t);
        }
        if self.type_id != t.id() {
            return Err(OpError::UnexpectedOperandType {
                got: self.type_id,
                expected: t.id(),
            });
        }
        cx.stack.push(self.type_id);
        Ok(())
    }
}

impl VariableDeclaration {
    fn verify(&self, _cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)
    }
}

impl Xor {
    fn verify(&self, cx: &mut VerifyCtx<'_, '_>) -> OpResult {
        require_type(self.type_id)?;
        cx.binop(self.type_id)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Add(op) => binary(f, "add", op.type_id, op.span),
            Operation::AllocResult(op) => write!(
                f,
                "\t{:<OPW$}\t{}\t; {} {}",
                "allocResult", op.type_id, op.type_name, op.span
            ),
            Operation::And(op) => binary(f, "and", op.type_id, op.span),
            Operation::Argument(op) => write!(
                f,
                "\t{:<OPW$}\t{}#{}, {}\t; {}",
                "argument",
                addr(op.address),
                op.index,
                op.type_id,
                op.span
            ),
            Operation::Arguments(op) => {
                let s = match op.function_pointer {
                    true => "fp",
                    false => "",
                };
                write!(f, "\t{:<OPW$}\t{}\t; {}", "arguments", s, op.span)
            }
            Operation::BeginScope(op) => write!(f, "\t{:<OPW$}\t\t; {}", "beginScope", op.span),
            Operation::Bool(op) => binary(f, "bool", op.type_id, op.span),
            Operation::Call(op) => {
                let comma = match op.comma {
                    true => "(,)",
                    false => "",
                };
                let index = match op.index >= 0 {
                    true => format!("#{}, ", op.index),
                    false => String::new(),
                };
                write!(
                    f,
                    "\t{:<OPW$}\t{}{}, {}\t; {}",
                    format!("call{comma}"),
                    index,
                    op.arguments,
                    op.type_id,
                    op.span
                )
            }
            Operation::CallFP(op) => {
                let comma = match op.comma {
                    true => "(,)",
                    false => "",
                };
                write!(
                    f,
                    "\t{:<OPW$}\t{}, {}\t; {}",
                    format!("callfp{comma}"),
                    op.arguments,
                    op.type_id,
                    op.span
                )
            }
            Operation::Const(op) => write!(
                f,
                "\t{:<OPW$}\t{}, {}\t; {}",
                "const", op.value, op.type_id, op.span
            ),
            Operation::Const32(op) => {
                let s = match op.l_op {
                    true => "(nop)",
                    false => "",
                };
                write!(
                    f,
                    "\t{:<OPW$}\t{:#x}, {}\t; {}",
                    format!("const{s}"),
                    op.value as u32,
                    op.type_id,
                    op.span
                )
            }
            Operation::Const64(op) => write!(
                f,
                "\t{:<OPW$}\t{:#x}, {}\t; {}",
                "const", op.value as u64, op.type_id, op.span
            ),
            Operation::ConstC128(op) => write!(
                f,
                "\t{:<OPW$}\t({}{:+}i), {}\t; {}",
                "const", op.re, op.im, op.type_id, op.span
            ),
            Operation::Convert(op) => write!(
                f,
                "\t{:<OPW$}\t{}, {}\t; {}",
                "convert", op.type_id, op.result, op.span
            ),
            Operation::Copy(op) => binary(f, "copy", op.type_id, op.span),
            Operation::Cpl(op) => binary(f, "cpl", op.type_id, op.span),
            Operation::Div(op) => binary(f, "div", op.type_id, op.span),
            Operation::Drop(op) => {
                let comma = match op.comma {
                    true => "(,)",
                    false => "",
                };
                let nop = match op.l_op {
                    true => "(nop)",
                    false => "",
                };
                write!(
                    f,
                    "\t{:<OPW$}\t{}\t; {}",
                    format!("drop{comma}{nop}"),
                    op.type_id,
                    op.span
                )
            }
            Operation::Dup(op) => binary(f, "dup", op.type_id, op.span),
            Operation::Element(op) => {
                let neg = match op.neg {
                    true => "-",
                    false => "",
                };
                write!(
                    f,
                    "\t{:<OPW$}\t{}[{}{}], {}\t; {}",
                    "element",
                    addr(op.address),
                    neg,
                    op.index_type,
                    op.type_id,
                    op.span
                )
            }
            Operation::EndScope(op) => write!(f, "\t{:<OPW$}\t\t; {}", "endScope", op.span),
            Operation::Eq(op) => binary(f, "eq", op.type_id, op.span),
            Operation::Field(op) => write!(
                f,
                "\t{:<OPW$}\t{}#{}, {}\t; {}",
                "field",
                addr(op.address),
                op.index,
                op.type_id,
                op.span
            ),
            Operation::FieldValue(op) => write!(
                f,
                "\t{:<OPW$}\t#{}, {}\t; {}",
                "fieldvalue", op.index, op.type_id, op.span
            ),
            Operation::Geq(op) => binary(f, "geq", op.type_id, op.span),
            Operation::Global(op) => {
                let index = match op.index >= 0 {
                    true => format!("#{}, ", op.index),
                    false => String::new(),
                };
                write!(
                    f,
                    "\t{:<OPW$}\t{}{}{}, {}\t; {} {}",
                    "global",
                    index,
                    addr(op.address),
                    op.name,
                    op.type_id,
                    op.type_name,
                    op.span
                )
            }
            Operation::Gt(op) => binary(f, "gt", op.type_id, op.span),
            Operation::Jmp(op) => {
                let s = match op.cond {
                    true => "(nop)",
                    false => "",
                };
                jump(f, &format!("jmp{s}"), op.name, op.number, op.span)
            }
            Operation::JmpP(op) => write!(f, "\t{:<OPW$}\t(sp)\t; {}", "jmp", op.span),
            Operation::Jnz(op) => {
                let s = match op.l_op {
                    true => "(nop)",
                    false => "",
                };
                jump(f, &format!("jnz{s}"), op.name, op.number, op.span)
            }
            Operation::Jz(op) => {
                let s = match op.l_op {
                    true => "(nop)",
                    false => "",
                };
                jump(f, &format!("jz{s}"), op.name, op.number, op.span)
            }
            Operation::Label(op) => {
                let s = match (op.l_and, op.l_or, op.cond, op.nop) {
                    (true, ..) => "(&&)",
                    (_, true, ..) => "(||)",
                    (_, _, true, _) => "(a?b:c)",
                    (.., true) => "(nop)",
                    _ => "",
                };
                write!(f, "{}{}:\t\t\t; {}", op.target(), s, op.span)
            }
            Operation::Leq(op) => binary(f, "leq", op.type_id, op.span),
            Operation::Load(op) => binary(f, "load", op.type_id, op.span),
            Operation::Lsh(op) => binary(f, "lsh", op.type_id, op.span),
            Operation::Lt(op) => binary(f, "lt", op.type_id, op.span),
            Operation::Mul(op) => binary(f, "mul", op.type_id, op.span),
            Operation::Neg(op) => binary(f, "neg", op.type_id, op.span),
            Operation::Neq(op) => binary(f, "neq", op.type_id, op.span),
            Operation::Nil(op) => binary(f, "nil", op.type_id, op.span),
            Operation::Not(op) => write!(f, "\t{:<OPW$}\t\t; {}", "not", op.span),
            Operation::Or(op) => binary(f, "or", op.type_id, op.span),
            Operation::Panic(op) => write!(f, "\t{:<OPW$}\t\t; {}", "panic", op.span),
            Operation::PostIncrement(op) => {
                let bits = bit_field(op.bits, op.bit_offset, op.bit_field_type);
                write!(
                    f,
                    "\t{:<OPW$}\t{}\t; {}",
                    format!("{}{}++", op.type_id, bits),
                    op.delta,
                    op.span
                )
            }
            Operation::PreIncrement(op) => {
                let bits = bit_field(op.bits, op.bit_offset, op.bit_field_type);
                write!(
                    f,
                    "\t{:<OPW$}\t{}\t; {}",
                    format!("++{}{}", op.type_id, bits),
                    op.delta,
                    op.span
                )
            }
            Operation::PtrDiff(op) => write!(
                f,
                "\t{:<OPW$}\t{}, {}\t; {}",
                "ptrDiff", op.ptr_type, op.type_id, op.span
            ),
            Operation::Rem(op) => binary(f, "rem", op.type_id, op.span),
            Operation::Result(op) => write!(
                f,
                "\t{:<OPW$}\t{}#{}, {}\t; {}",
                "result",
                addr(op.address),
                op.index,
                op.type_id,
                op.span
            ),
            Operation::Return(op) => write!(f, "\t{:<OPW$}\t\t; {}", "return", op.span),
            Operation::Rsh(op) => binary(f, "rsh", op.type_id, op.span),
            Operation::Store(op) => {
                let bits = match op.bits != 0 {
                    true => format!(":{}@{}", op.bits, op.bit_offset),
                    false => String::new(),
                };
                write!(
                    f,
                    "\t{:<OPW$}\t{}{}\t; {}",
                    "store", op.type_id, bits, op.span
                )
            }
            Operation::StringConst(op) => write!(
                f,
                "\t{:<OPW$}\t{}, {}\t; {}",
                "const", op.value, op.type_id, op.span
            ),
            Operation::Sub(op) => binary(f, "sub", op.type_id, op.span),
            Operation::Switch(op) => {
                write!(f, "\t{:<OPW$}\t{}\t; {}", "switch", op.type_id, op.span)?;
                for (value, label) in op.values.iter().zip(op.labels.iter()) {
                    write!(
                        f,
                        "\n\tcase {}:\tgoto {}\t; {}",
                        value,
                        label.target(),
                        label.span
                    )?;
                }
                write!(
                    f,
                    "\n\tdefault:\tgoto {}\t; {}",
                    op.default.target(),
                    op.default.span
                )
            }
            Operation::Variable(op) => write!(
                f,
                "\t{:<OPW$}\t{}#{}, {}\t; {}",
                "variable",
                addr(op.address),
                op.index,
                op.type_id,
                op.span
            ),
            Operation::VariableDeclaration(op) => {
                let init = match &op.value {
                    Some(value) => format!("{}({})", op.type_id, value),
                    None => format!("{}", op.type_id),
                };
                write!(
                    f,
                    "\t{:<OPW$}\t#{}, {}, {}\t; {} {}",
                    "varDecl", op.index, op.name, init, op.type_name, op.span
                )
            }
            Operation::Xor(op) => binary(f, "xor", op.type_id, op.span),
        }
    }
}

fn binary(f: &mut fmt::Formatter<'_>, mnemonic: &str, type_id: TypeId, span: Span) -> fmt::Result {
    write!(f, "\t{mnemonic:<OPW$}\t{type_id}\t; {span}")
}

fn jump(
    f: &mut fmt::Formatter<'_>,
    mnemonic: &str,
    name: NameId,
    number: i64,
    span: Span,
) -> fmt::Result {
    match name.is_empty() {
        true => write!(f, "\t{mnemonic:<OPW$}\t{number}\t; {span}"),
        false => write!(f, "\t{mnemonic:<OPW$}\t{name}\t; {span}"),
    }
}

fn bit_field(bits: u32, bit_offset: u32, bit_field_type: TypeId) -> String {
    match bits != 0 {
        true => format!(":{bits}@{bit_offset}:{bit_field_type}"),
        false => String::new(),
    }
}

//! Constant expressions used for initializing static data or function
//! variables.

use crate::intern::{NameId, StringId};
use crate::Linkage;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A constant initializer value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Complex64 { re: f32, im: f32 },
    Complex128 { re: f64, im: f64 },
    String(StringValue),
    WideString(WideStringValue),
    Address(AddressValue),
    Composite(CompositeValue),
    Designated(DesignatedValue),
}

/// An initializer constant of type address. Its final value is determined by
/// the linker/loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressValue {
    /// A negative value, or an object index as resolved by the linker.
    pub index: i64,
    pub label: NameId,
    pub linkage: Linkage,
    pub name: NameId,
    pub offset: u64,
}

/// A string literal and a byte offset into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringValue {
    pub string: StringId,
    pub offset: u64,
}

/// A wide string literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WideStringValue {
    pub value: Vec<char>,
}

/// A constant array/struct initializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeValue {
    pub values: Vec<Value>,
}

/// The value of a particular array element or a particular struct field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignatedValue {
    /// Array index or field index.
    pub index: usize,
    pub value: Box<Value>,
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Complex64 { re, im } => write!(f, "({re}{im:+}i)"),
            Value::Complex128 { re, im } => write!(f, "({re}{im:+}i)"),
            Value::String(v) => write!(f, "{}+{}", v.string, v.offset),
            Value::WideString(v) => {
                write!(f, "{:?}", v.value.iter().collect::<String>())
            }
            Value::Address(v) => write!(f, "{v}"),
            Value::Composite(v) => {
                write!(f, "{{")?;
                for (i, value) in v.values.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "}}")
            }
            Value::Designated(v) => write!(f, "{}: {}", v.index, v.value),
        }
    }
}

impl fmt::Display for AddressValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.linkage, self.label.is_empty()) {
            (Linkage::External, true) => {
                write!(f, "(extern {}, &{}+{})", self.index, self.name, self.offset)
            }
            (_, true) => write!(f, "({}, {}+{})", self.index, self.name, self.offset),
            (_, false) => write!(
                f,
                "({}, {}, &&{}+{})",
                self.index, self.name, self.label, self.offset
            ),
        }
    }
}

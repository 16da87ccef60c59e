//! Intermediate representation of compiled programs.
//!
//! The IR is a typed, stack oriented instruction set over a structural type
//! system with interned type identifiers. A producer builds [`Object`]s
//! (data and function definitions) per translation unit, verifies each
//! function body locally with [`FunctionDefinition::verify`], and merges the
//! units into one output program with [`link_main`] or [`link_lib`], which
//! resolve cross unit symbol references and lower indirect calls through
//! known globals into direct calls.
//!
//! Type identity is textual: two types are identical iff their canonical
//! specifiers intern to the same [`TypeId`]. The [`ty::TypeCache`] parses
//! specifiers lazily, and [`model::MemoryModel`] computes sizes, alignments
//! and layouts for them under a chosen architecture. Object vectors can be
//! persisted and restored through [`snapshot::Objects`].

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod error;
pub mod intern;
pub mod link;
pub mod model;
pub mod op;
pub mod snapshot;
pub mod ty;
pub mod value;
mod verify;

pub use error::{IrError, IrResult};
pub use girder_span::Span;
pub use intern::{dict, NameId, StringId, TypeId};
pub use link::{link_lib, link_main, set_testing};
pub use model::{FieldProperties, MemoryModel, MemoryModelItem};
pub use op::Operation;
pub use snapshot::Objects;
pub use ty::{Type, TypeCache, TypeKind};
pub use value::Value;

/// Visibility of a name across translation units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Linkage {
    /// One definition shared by all translation units.
    External,
    /// Scoped to the defining translation unit.
    Internal,
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Linkage::External => write!(f, "external"),
            Linkage::Internal => write!(f, "internal"),
        }
    }
}

/// A declaration or definition of static data or a function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    Data(DataDefinition),
    Function(FunctionDefinition),
}

impl Object {
    pub fn name(&self) -> NameId {
        match self {
            Object::Data(d) => d.name,
            Object::Function(f) => f.name,
        }
    }

    pub fn type_id(&self) -> TypeId {
        match self {
            Object::Data(d) => d.type_id,
            Object::Function(f) => f.type_id,
        }
    }

    pub fn linkage(&self) -> Linkage {
        match self {
            Object::Data(d) => d.linkage,
            Object::Function(f) => f.linkage,
        }
    }

    /// Check that the object is well formed. Data definitions are always
    /// well formed; function definitions run the full body verifier.
    pub fn verify(&mut self) -> Result<(), error::VerifyError> {
        match self {
            Object::Data(_) => Ok(()),
            Object::Function(f) => f.verify(),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Data(d) => write!(f, "{d}"),
            Object::Function(function) => write!(f, "{function}"),
        }
    }
}

/// A variable definition and an optional initializer value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataDefinition {
    pub name: NameId,
    pub type_name: NameId,
    pub type_id: TypeId,
    pub linkage: Linkage,
    pub value: Option<Value>,
    pub span: Span,
}

impl DataDefinition {
    pub fn new(
        span: Span,
        name: NameId,
        type_name: NameId,
        type_id: TypeId,
        linkage: Linkage,
        value: Option<Value>,
    ) -> Self {
        Self {
            name,
            type_name,
            type_id,
            linkage,
            value,
            span,
        }
    }
}

impl fmt::Display for DataDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.linkage, self.name, self.type_id)?;
        if let Some(value) = &self.value {
            write!(f, " = {value}")?;
        }
        write!(f, "\t; {}", self.span)
    }
}

/// A function definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: NameId,
    pub type_name: NameId,
    pub type_id: TypeId,
    pub linkage: Linkage,
    /// Argument names. May be empty.
    pub arguments: Vec<NameId>,
    /// Result names. May be empty.
    pub results: Vec<NameId>,
    pub body: Vec<Operation>,
    pub span: Span,
}

impl fmt::Display for FunctionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} func {} {}\t; {}",
            self.linkage, self.name, self.type_id, self.span
        )?;
        for op in &self.body {
            writeln!(f, "{op}")?;
        }
        Ok(())
    }
}

impl FunctionDefinition {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        span: Span,
        name: NameId,
        type_name: NameId,
        type_id: TypeId,
        linkage: Linkage,
        arguments: Vec<NameId>,
        results: Vec<NameId>,
        body: Vec<Operation>,
    ) -> Self {
        Self {
            name,
            type_name,
            type_id,
            linkage,
            arguments,
            results,
            body,
            span,
        }
    }
}

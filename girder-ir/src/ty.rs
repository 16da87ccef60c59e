//! The structural type system.
//!
//! Types are identified by their canonical textual form, interned into the
//! global dictionary as a [`TypeId`]. The type specifier syntax is:
//!
//! ```text
//! Type     = Scalar | "*" Type | "[" Number "]" Type
//!          | "func" "(" [ TypeList ] [ "..." ] ")" [ Type | "(" TypeList ")" ]
//!          | "struct" "{" [ TypeList ] "}"
//!          | "union" "{" [ TypeList ] "}"
//! TypeList = [ Tag " " ] Type { "," [ Tag " " ] Type }
//! Scalar   = "int8" | "int16" | "int32" | "int64"
//!          | "uint8" | "uint16" | "uint32" | "uint64"
//!          | "float32" | "float64" | "float128"
//!          | "complex64" | "complex128" | "complex256"
//! ```
//!
//! Field tags are consumed by the parser but not represented in the tree, so
//! `struct{a int8}` and `struct{int8}` intern as distinct ids describing
//! structurally identical types.
//!
//! Two types are identical iff their specifiers are byte-equal iff their
//! ids are equal. The [`TypeCache`] is the unique index maintaining that
//! invariant: it parses specifiers lazily and allocates the resulting nodes
//! in an arena, so type comparison inside one cache is id comparison.

use crate::error::{ExpectedTokenError, TypeError, UnexpectedTokenError, UnexpectedTrailingTokenError};
use crate::intern::{dict, TypeId};
use bumpalo::Bump;
use girder_diagnostics::ice;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::fmt;

/// Enumeration of the particular kinds a type can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeKind {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Float128,
    Complex64,
    Complex128,
    Complex256,
    Array,
    Union,
    Struct,
    Pointer,
    Function,
}

impl TypeKind {
    /// Whether the kind is one of the integer kinds.
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            TypeKind::Int8
                | TypeKind::Int16
                | TypeKind::Int32
                | TypeKind::Int64
                | TypeKind::Uint8
                | TypeKind::Uint16
                | TypeKind::Uint32
                | TypeKind::Uint64
        )
    }

    /// Whether the kind is one of the binary floating point kinds.
    pub fn is_float(self) -> bool {
        matches!(self, TypeKind::Float32 | TypeKind::Float64 | TypeKind::Float128)
    }

    /// The canonical specifier of a scalar kind.
    fn spec(self) -> &'static str {
        match self {
            TypeKind::Int8 => "int8",
            TypeKind::Int16 => "int16",
            TypeKind::Int32 => "int32",
            TypeKind::Int64 => "int64",
            TypeKind::Uint8 => "uint8",
            TypeKind::Uint16 => "uint16",
            TypeKind::Uint32 => "uint32",
            TypeKind::Uint64 => "uint64",
            TypeKind::Float32 => "float32",
            TypeKind::Float64 => "float64",
            TypeKind::Float128 => "float128",
            TypeKind::Complex64 => "complex64",
            TypeKind::Complex128 => "complex128",
            TypeKind::Complex256 => "complex256",
            _ => ice!(format!("{self} is not a scalar kind")),
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Array => write!(f, "array"),
            TypeKind::Union => write!(f, "union"),
            TypeKind::Struct => write!(f, "struct"),
            TypeKind::Pointer => write!(f, "pointer"),
            TypeKind::Function => write!(f, "func"),
            scalar => write!(f, "{}", scalar.spec()),
        }
    }
}

/// A single type in the IR.
///
/// Nodes are allocated in the [`TypeCache`]'s arena; referential identity is
/// only meaningful within a single cache. Distinct caches yield distinct
/// nodes for the same id, but their ids and structural predicates agree.
#[derive(Debug)]
pub enum Type<'t> {
    Scalar(ScalarType),
    Pointer(PointerType<'t>),
    Array(ArrayType<'t>),
    Function(FunctionType<'t>),
    StructOrUnion(StructOrUnionType<'t>),
}

/// One of the fixed-width integer, floating point or complex types.
#[derive(Debug)]
pub struct ScalarType {
    pub id: TypeId,
    pub kind: TypeKind,
}

/// A pointer to an element, an instance of another type.
#[derive(Debug)]
pub struct PointerType<'t> {
    pub id: TypeId,
    pub element: &'t Type<'t>,
}

/// A collection of items that can be selected by index.
#[derive(Debug)]
pub struct ArrayType<'t> {
    pub id: TypeId,
    pub item: &'t Type<'t>,
    pub items: u64,
}

/// A function, its possibly variadic arguments and its results.
#[derive(Debug)]
pub struct FunctionType<'t> {
    pub id: TypeId,
    pub arguments: Vec<&'t Type<'t>>,
    pub results: Vec<&'t Type<'t>>,
    /// C-variadic.
    pub variadic: bool,
}

/// A collection of fields that can be selected by index.
#[derive(Debug)]
pub struct StructOrUnionType<'t> {
    pub id: TypeId,
    /// Either [`TypeKind::Struct`] or [`TypeKind::Union`].
    pub kind: TypeKind,
    pub fields: Vec<&'t Type<'t>>,
}

impl<'t> Type<'t> {
    pub fn id(&self) -> TypeId {
        match self {
            Type::Scalar(t) => t.id,
            Type::Pointer(t) => t.id,
            Type::Array(t) => t.id,
            Type::Function(t) => t.id,
            Type::StructOrUnion(t) => t.id,
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            Type::Scalar(t) => t.kind,
            Type::Pointer(_) => TypeKind::Pointer,
            Type::Array(_) => TypeKind::Array,
            Type::Function(_) => TypeKind::Function,
            Type::StructOrUnion(t) => t.kind,
        }
    }

    /// Whether the type is a signed integer type.
    pub fn signed(&self) -> bool {
        matches!(
            self.kind(),
            TypeKind::Int8 | TypeKind::Int16 | TypeKind::Int32 | TypeKind::Int64
        )
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn as_pointer(&self) -> Option<&PointerType<'t>> {
        match self {
            Type::Pointer(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayType<'t>> {
        match self {
            Type::Array(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionType<'t>> {
        match self {
            Type::Function(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_struct_or_union(&self) -> Option<&StructOrUnionType<'t>> {
        match self {
            Type::StructOrUnion(t) => Some(t),
            _ => None,
        }
    }
}

impl fmt::Display for Type<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Tokens of the type specifier grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tok {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Star,
    Ellipsis,
    Number(i64),
    Scalar(TypeKind),
    Func,
    Struct,
    Union,
    Eof,
    Illegal,
}

impl fmt::Display for Tok {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tok::LParen => write!(f, "("),
            Tok::RParen => write!(f, ")"),
            Tok::LBrace => write!(f, "{{"),
            Tok::RBrace => write!(f, "}}"),
            Tok::LBracket => write!(f, "["),
            Tok::RBracket => write!(f, "]"),
            Tok::Comma => write!(f, ","),
            Tok::Star => write!(f, "*"),
            Tok::Ellipsis => write!(f, "..."),
            Tok::Number(n) => write!(f, "{n}"),
            Tok::Scalar(kind) => write!(f, "{kind}"),
            Tok::Func => write!(f, "func"),
            Tok::Struct => write!(f, "struct"),
            Tok::Union => write!(f, "union"),
            Tok::Eof => write!(f, "<eof>"),
            Tok::Illegal => write!(f, "<illegal>"),
        }
    }
}

/// A deterministic one byte lookahead scanner over a type specifier.
struct Scanner<'s> {
    input: &'s [u8],
    pos: usize,
}

impl<'s> Scanner<'s> {
    fn new(input: &'s [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn bump(&mut self) {
        if self.pos < self.input.len() {
            self.pos += 1;
        }
    }

    /// Consume `expected` if and only if it is next in the input.
    fn accept(&mut self, expected: &[u8]) -> bool {
        if self.input[self.pos..].starts_with(expected) {
            self.pos += expected.len();
            return true;
        }
        false
    }

    /// Consume one byte and produce the illegal token.
    fn fail(&mut self) -> Tok {
        self.bump();
        Tok::Illegal
    }

    fn number(&mut self) -> Tok {
        let mut n: i64 = 0;
        while let Some(b @ b'0'..=b'9') = self.peek() {
            self.bump();
            n = match n
                .checked_mul(10)
                .and_then(|n| n.checked_add(i64::from(b - b'0')))
            {
                Some(n) => n,
                None => return Tok::Illegal,
            };
        }
        Tok::Number(n)
    }

    fn lex(&mut self) -> Tok {
        let Some(b) = self.peek() else {
            return Tok::Eof;
        };
        match b {
            b'(' => {
                self.bump();
                Tok::LParen
            }
            b')' => {
                self.bump();
                Tok::RParen
            }
            b'{' => {
                self.bump();
                Tok::LBrace
            }
            b'}' => {
                self.bump();
                Tok::RBrace
            }
            b'[' => {
                self.bump();
                Tok::LBracket
            }
            b']' => {
                self.bump();
                Tok::RBracket
            }
            b',' => {
                self.bump();
                Tok::Comma
            }
            b'*' => {
                self.bump();
                Tok::Star
            }
            b'.' => match self.accept(b"...") {
                true => Tok::Ellipsis,
                false => self.fail(),
            },
            b'0'..=b'9' => self.number(),
            b'c' => {
                if self.accept(b"complex64") {
                    Tok::Scalar(TypeKind::Complex64)
                } else if self.accept(b"complex128") {
                    Tok::Scalar(TypeKind::Complex128)
                } else if self.accept(b"complex256") {
                    Tok::Scalar(TypeKind::Complex256)
                } else {
                    self.fail()
                }
            }
            b'f' => {
                if self.accept(b"float32") {
                    Tok::Scalar(TypeKind::Float32)
                } else if self.accept(b"float64") {
                    Tok::Scalar(TypeKind::Float64)
                } else if self.accept(b"float128") {
                    Tok::Scalar(TypeKind::Float128)
                } else if self.accept(b"func") {
                    Tok::Func
                } else {
                    self.fail()
                }
            }
            b'i' => {
                if self.accept(b"int8") {
                    Tok::Scalar(TypeKind::Int8)
                } else if self.accept(b"int16") {
                    Tok::Scalar(TypeKind::Int16)
                } else if self.accept(b"int32") {
                    Tok::Scalar(TypeKind::Int32)
                } else if self.accept(b"int64") {
                    Tok::Scalar(TypeKind::Int64)
                } else {
                    self.fail()
                }
            }
            b's' => match self.accept(b"struct") {
                true => Tok::Struct,
                false => self.fail(),
            },
            b'u' => {
                if self.accept(b"uint8") {
                    Tok::Scalar(TypeKind::Uint8)
                } else if self.accept(b"uint16") {
                    Tok::Scalar(TypeKind::Uint16)
                } else if self.accept(b"uint32") {
                    Tok::Scalar(TypeKind::Uint32)
                } else if self.accept(b"uint64") {
                    Tok::Scalar(TypeKind::Uint64)
                } else if self.accept(b"union") {
                    Tok::Union
                } else {
                    self.fail()
                }
            }
            _ => self.fail(),
        }
    }

    /// Consume an optional field tag: a run of identifier bytes followed by a
    /// single space, or a bare space for an anonymous tag. The tag is not
    /// part of the type structure.
    fn skip_field_tag(&mut self) {
        let mut j = self.pos;
        while j < self.input.len()
            && (self.input[j].is_ascii_alphanumeric() || self.input[j] == b'_')
        {
            j += 1;
        }
        if self.input.get(j) == Some(&b' ') {
            self.pos = j + 1;
        }
    }
}

/// Maps [`TypeId`]s to parsed [`Type`] nodes.
///
/// Nodes are allocated in the provided arena; the cache acts as an index of
/// every node it has handed out, so the same id always yields the same node
/// within one cache.
pub struct TypeCache<'t> {
    arena: &'t Bump,
    map: RefCell<FxHashMap<TypeId, &'t Type<'t>>>,
}

impl<'t> TypeCache<'t> {
    pub fn new(arena: &'t Bump) -> Self {
        Self {
            arena,
            map: RefCell::new(FxHashMap::default()),
        }
    }

    /// The number of types the cache has materialized.
    pub fn len(&self) -> usize {
        self.map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }

    /// The ids of every type the cache has materialized, in no particular
    /// order.
    pub fn ids(&self) -> Vec<TypeId> {
        self.map.borrow().keys().copied().collect()
    }

    /// Get the type identified by `id`, parsing and caching its specifier if
    /// it has not been materialized yet.
    pub fn type_of(&self, id: TypeId) -> Result<&'t Type<'t>, TypeError> {
        if let Some(t) = self.cached(id) {
            return Ok(t);
        }
        let mut s = Scanner::new(id.as_bytes());
        let t = self.parse(&mut s, id)?;
        let trailing = s.lex();
        if trailing != Tok::Eof {
            return Err(UnexpectedTrailingTokenError {
                found: trailing.to_string(),
                spec: id.as_str().to_owned(),
            }
            .into());
        }
        self.map.borrow_mut().insert(id, t);
        Ok(t)
    }

    /// Like [`TypeCache::type_of`], but treats a parse failure of a
    /// supposedly valid id as an invariant violation.
    pub fn must_type(&self, id: TypeId) -> &'t Type<'t> {
        self.type_of(id)
            .unwrap_or_else(|err| ice!(format!("{:?}: {err}", id.as_str())))
    }

    fn insert(&self, node: Type<'t>) -> &'t Type<'t> {
        let id = node.id();
        let node = &*self.arena.alloc(node);
        self.map.borrow_mut().insert(id, node);
        node
    }

    fn cached(&self, id: TypeId) -> Option<&'t Type<'t>> {
        self.map.borrow().get(&id).copied()
    }

    /// The id of the span consumed since `start`, or the caller-provided id
    /// when the whole specifier is being parsed.
    fn span_id(&self, s: &Scanner, start: usize, id: TypeId) -> TypeId {
        match id.is_empty() {
            true => TypeId(dict().intern(&s.input[start..s.pos])),
            false => id,
        }
    }

    fn parse(&self, s: &mut Scanner, id: TypeId) -> Result<&'t Type<'t>, TypeError> {
        let start = s.pos;
        let tok = s.lex();
        match tok {
            Tok::Scalar(kind) => {
                let id = self.span_id(s, start, id);
                Ok(self.insert(Type::Scalar(ScalarType { id, kind })))
            }
            Tok::Star => {
                let element = self.parse(s, TypeId::default())?;
                let id = self.span_id(s, start, id);
                Ok(self.insert(Type::Pointer(PointerType { id, element })))
            }
            Tok::LBracket => {
                let n = match s.lex() {
                    Tok::Number(n) => n,
                    found => {
                        return Err(unexpected(found, s));
                    }
                };
                let bracket = s.lex();
                if bracket != Tok::RBracket {
                    return Err(unexpected(bracket, s));
                }
                let item = self.parse(s, TypeId::default())?;
                let id = self.span_id(s, start, id);
                Ok(self.insert(Type::Array(ArrayType {
                    id,
                    item,
                    items: n as u64,
                })))
            }
            Tok::Func => {
                let (arguments, results, variadic) = self.parse_func(s)?;
                let id = self.span_id(s, start, id);
                Ok(self.insert(Type::Function(FunctionType {
                    id,
                    arguments,
                    results,
                    variadic,
                })))
            }
            Tok::Struct | Tok::Union => {
                let brace = s.lex();
                if brace != Tok::LBrace {
                    return Err(ExpectedTokenError {
                        expected: "{".to_owned(),
                        found: brace.to_string(),
                    }
                    .into());
                }
                let fields = self.parse_type_list(s)?;
                let brace = s.lex();
                if brace != Tok::RBrace {
                    return Err(ExpectedTokenError {
                        expected: "}".to_owned(),
                        found: brace.to_string(),
                    }
                    .into());
                }
                let kind = match tok {
                    Tok::Struct => TypeKind::Struct,
                    _ => TypeKind::Union,
                };
                let id = self.span_id(s, start, id);
                Ok(self.insert(Type::StructOrUnion(StructOrUnionType { id, kind, fields })))
            }
            found => Err(unexpected(found, s)),
        }
    }

    fn parse_type_list(&self, s: &mut Scanner) -> Result<Vec<&'t Type<'t>>, TypeError> {
        let mut list = Vec::new();
        loop {
            if s.peek() == Some(b'}') {
                return Ok(list);
            }
            s.skip_field_tag();
            list.push(self.parse(s, TypeId::default())?);
            match s.peek() {
                Some(b',') => {
                    s.bump();
                    // A "..." after the comma belongs to the enclosing
                    // function type.
                    if s.peek() == Some(b'.') {
                        return Ok(list);
                    }
                }
                _ => return Ok(list),
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn parse_func(
        &self,
        s: &mut Scanner,
    ) -> Result<(Vec<&'t Type<'t>>, Vec<&'t Type<'t>>, bool), TypeError> {
        let paren = s.lex();
        if paren != Tok::LParen {
            return Err(ExpectedTokenError {
                expected: "(".to_owned(),
                found: paren.to_string(),
            }
            .into());
        }
        let arguments = match s.peek() {
            Some(b')') | Some(b'.') => Vec::new(),
            _ => self.parse_type_list(s)?,
        };
        let mut variadic = false;
        loop {
            match s.lex() {
                Tok::RParen => {
                    let results = self.parse_results(s)?;
                    return Ok((arguments, results, variadic));
                }
                Tok::Ellipsis if !variadic => variadic = true,
                found => return Err(unexpected(found, s)),
            }
        }
    }

    fn parse_results(&self, s: &mut Scanner) -> Result<Vec<&'t Type<'t>>, TypeError> {
        match s.peek() {
            None | Some(b',') | Some(b')') | Some(b'}') => Ok(Vec::new()),
            Some(b'(') => {
                s.bump();
                let results = self.parse_type_list(s)?;
                let paren = s.lex();
                match paren {
                    Tok::RParen => Ok(results),
                    found => Err(ExpectedTokenError {
                        expected: ")".to_owned(),
                        found: found.to_string(),
                    }
                    .into()),
                }
            }
            _ => Ok(vec![self.parse(s, TypeId::default())?]),
        }
    }

    /// Intern a scalar type.
    pub fn scalar(&self, kind: TypeKind) -> &'t Type<'t> {
        let id = TypeId::new(kind.spec());
        if let Some(t) = self.cached(id) {
            return t;
        }
        self.insert(Type::Scalar(ScalarType { id, kind }))
    }

    /// Intern the pointer type whose pointee is `element`.
    pub fn pointer_to(&self, element: &'t Type<'t>) -> &'t Type<'t> {
        let mut spec = Vec::with_capacity(1 + element.id().as_bytes().len());
        spec.push(b'*');
        spec.extend_from_slice(element.id().as_bytes());
        let id = TypeId::from_bytes(&spec);
        if let Some(t) = self.cached(id) {
            return t;
        }
        self.insert(Type::Pointer(PointerType { id, element }))
    }

    /// Intern the array type of `items` repetitions of `item`.
    pub fn array_of(&self, item: &'t Type<'t>, items: u64) -> &'t Type<'t> {
        let id = TypeId::new(&format!("[{items}]{}", item.id()));
        if let Some(t) = self.cached(id) {
            return t;
        }
        self.insert(Type::Array(ArrayType { id, item, items }))
    }

    /// Intern a function type from its argument and result types.
    pub fn function(
        &self,
        arguments: Vec<&'t Type<'t>>,
        results: Vec<&'t Type<'t>>,
        variadic: bool,
    ) -> &'t Type<'t> {
        let mut spec = String::from("func(");
        for (i, arg) in arguments.iter().enumerate() {
            if i != 0 {
                spec.push(',');
            }
            spec.push_str(arg.id().as_str());
        }
        if variadic {
            if !arguments.is_empty() {
                spec.push(',');
            }
            spec.push_str("...");
        }
        spec.push(')');
        match results.as_slice() {
            [] => {}
            [result] => spec.push_str(result.id().as_str()),
            results => {
                spec.push('(');
                for (i, result) in results.iter().enumerate() {
                    if i != 0 {
                        spec.push(',');
                    }
                    spec.push_str(result.id().as_str());
                }
                spec.push(')');
            }
        }
        let id = TypeId::new(&spec);
        if let Some(t) = self.cached(id) {
            return t;
        }
        self.insert(Type::Function(FunctionType {
            id,
            arguments,
            results,
            variadic,
        }))
    }

    /// Intern a struct type from its field types.
    pub fn struct_of(&self, fields: Vec<&'t Type<'t>>) -> &'t Type<'t> {
        self.composite(TypeKind::Struct, fields)
    }

    /// Intern a union type from its field types.
    pub fn union_of(&self, fields: Vec<&'t Type<'t>>) -> &'t Type<'t> {
        self.composite(TypeKind::Union, fields)
    }

    fn composite(&self, kind: TypeKind, fields: Vec<&'t Type<'t>>) -> &'t Type<'t> {
        let mut spec = String::from(match kind {
            TypeKind::Struct => "struct{",
            _ => "union{",
        });
        for (i, field) in fields.iter().enumerate() {
            if i != 0 {
                spec.push(',');
            }
            spec.push_str(field.id().as_str());
        }
        spec.push('}');
        let id = TypeId::new(&spec);
        if let Some(t) = self.cached(id) {
            return t;
        }
        self.insert(Type::StructOrUnion(StructOrUnionType { id, kind, fields }))
    }
}

fn unexpected(found: Tok, s: &Scanner) -> TypeError {
    UnexpectedTokenError {
        found: found.to_string(),
        spec: String::from_utf8_lossy(s.input).into_owned(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexer_totality() {
        let cases: &[(&str, Tok)] = &[
            ("(", Tok::LParen),
            (")", Tok::RParen),
            (",", Tok::Comma),
            ("...", Tok::Ellipsis),
            ("0", Tok::Number(0)),
            ("?", Tok::Illegal),
            ("[", Tok::LBracket),
            ("]", Tok::RBracket),
            ("complex128", Tok::Scalar(TypeKind::Complex128)),
            ("complex256", Tok::Scalar(TypeKind::Complex256)),
            ("complex64", Tok::Scalar(TypeKind::Complex64)),
            ("float128", Tok::Scalar(TypeKind::Float128)),
            ("float32", Tok::Scalar(TypeKind::Float32)),
            ("float64", Tok::Scalar(TypeKind::Float64)),
            ("func", Tok::Func),
            ("int16", Tok::Scalar(TypeKind::Int16)),
            ("int32", Tok::Scalar(TypeKind::Int32)),
            ("int64", Tok::Scalar(TypeKind::Int64)),
            ("int8", Tok::Scalar(TypeKind::Int8)),
            ("struct", Tok::Struct),
            ("uint16", Tok::Scalar(TypeKind::Uint16)),
            ("uint32", Tok::Scalar(TypeKind::Uint32)),
            ("uint64", Tok::Scalar(TypeKind::Uint64)),
            ("uint8", Tok::Scalar(TypeKind::Uint8)),
            ("union", Tok::Union),
            ("{", Tok::LBrace),
            ("}", Tok::RBrace),
            ("9223372036854775807", Tok::Number(i64::MAX)),
        ];
        for (src, expected) in cases {
            let wrapped = format!("({src})");
            let mut s = Scanner::new(wrapped.as_bytes());
            assert_eq!(s.lex(), Tok::LParen, "{src}");
            assert_eq!(s.lex(), *expected, "{src}");
            assert_eq!(s.lex(), Tok::RParen, "{src}");
            assert_eq!(s.lex(), Tok::Eof, "{src}");
        }
    }

    #[test]
    fn test_lexer_number_overflow() {
        // One above i64::MAX.
        let mut s = Scanner::new(b"9223372036854775808");
        assert_eq!(s.lex(), Tok::Illegal);
    }

    #[test]
    fn test_lexer_empty_input() {
        let mut s = Scanner::new(b"");
        assert_eq!(s.lex(), Tok::Eof);
    }
}

//! Process-global string dictionary.
//!
//! Every identifier, string literal and type specifier in the IR is interned
//! into a single process-wide dictionary mapping byte strings to small
//! integers. Id equality is byte equality, and `intern(resolve(id)) == id`
//! holds for every id ever handed out.
//!
//! The dictionary is append-only: interned bytes are leaked once per unique
//! string and live for the lifetime of the process. This keeps `resolve`
//! allocation-free and lets ids be freely copied across threads.

use girder_diagnostics::ice;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

/// The global dictionary instance.
pub fn dict() -> &'static Dict {
    static DICT: OnceLock<Dict> = OnceLock::new();
    DICT.get_or_init(Dict::new)
}

/// A bijection between byte strings and `u32` ids.
///
/// Id 0 is always the empty string, which the rest of the library treats as
/// "absent" wherever an id is optional (an unnamed label, a missing type
/// name).
pub struct Dict {
    inner: RwLock<DictInner>,
}

struct DictInner {
    map: FxHashMap<&'static [u8], u32>,
    entries: Vec<&'static [u8]>,
}

impl Dict {
    fn new() -> Self {
        let empty: &'static [u8] = b"";
        let mut map = FxHashMap::default();
        map.insert(empty, 0);
        Self {
            inner: RwLock::new(DictInner {
                map,
                entries: vec![empty],
            }),
        }
    }

    /// Intern a byte string, returning its id. Idempotent.
    pub fn intern(&self, bytes: &[u8]) -> u32 {
        if let Some(&id) = self.inner.read().map.get(bytes) {
            return id;
        }
        let mut inner = self.inner.write();
        // Another thread may have interned the string between the read and
        // the write lock.
        if let Some(&id) = inner.map.get(bytes) {
            return id;
        }
        let leaked: &'static [u8] = Box::leak(bytes.to_vec().into_boxed_slice());
        let id = u32::try_from(inner.entries.len())
            .unwrap_or_else(|_| ice!("dictionary exceeded u32::MAX entries"));
        inner.map.insert(leaked, id);
        inner.entries.push(leaked);
        id
    }

    /// Resolve an id back to the byte string it was interned from.
    pub fn resolve(&self, id: u32) -> &'static [u8] {
        match self.inner.read().entries.get(id as usize) {
            Some(bytes) => bytes,
            None => ice!(format!("unknown dictionary id {id}")),
        }
    }
}

/// A numeric identifier of a program identifier (a function or variable
/// name) as registered in the global dictionary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameId(pub u32);

impl NameId {
    pub fn new(name: &str) -> Self {
        Self(dict().intern(name.as_bytes()))
    }

    pub fn from_bytes(name: &[u8]) -> Self {
        Self(dict().intern(name))
    }

    pub fn as_bytes(self) -> &'static [u8] {
        dict().resolve(self.0)
    }

    pub fn as_str(self) -> &'static str {
        match std::str::from_utf8(self.as_bytes()) {
            Ok(s) => s,
            Err(_) => ice!(format!("name id {} is not valid utf-8", self.0)),
        }
    }

    /// Whether this is the absent (empty) name.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numeric identifier of a string literal as registered in the global
/// dictionary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StringId(pub u32);

impl StringId {
    pub fn new(value: &[u8]) -> Self {
        Self(dict().intern(value))
    }

    pub fn as_bytes(self) -> &'static [u8] {
        dict().resolve(self.0)
    }
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}

/// A numeric identifier of a type specifier as registered in the global
/// dictionary.
///
/// Two types are identical iff their specifiers are byte-equal iff their
/// `TypeId`s are equal.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub u32);

impl TypeId {
    pub fn new(spec: &str) -> Self {
        Self(dict().intern(spec.as_bytes()))
    }

    pub fn from_bytes(spec: &[u8]) -> Self {
        Self(dict().intern(spec))
    }

    pub fn as_bytes(self) -> &'static [u8] {
        dict().resolve(self.0)
    }

    pub fn as_str(self) -> &'static str {
        match std::str::from_utf8(self.as_bytes()) {
            Ok(s) => s,
            Err(_) => ice!(format!("type id {} is not valid utf-8", self.0)),
        }
    }

    /// Whether this is the absent type id. Operations with an absent type id
    /// fail verification.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether the type is a signed integer type.
    pub fn signed(self) -> bool {
        let ids = known();
        self == ids.int8 || self == ids.int16 || self == ids.int32 || self == ids.int64
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Well-known ids the verifier and linker compare against.
pub(crate) struct KnownIds {
    pub int8: TypeId,
    pub int16: TypeId,
    pub int32: TypeId,
    pub int64: TypeId,
    pub uint32: TypeId,
    pub uint64: TypeId,
    /// The unit type `struct{}`.
    pub void: TypeId,
    /// The wildcard pointer `*struct{}`.
    pub void_ptr: TypeId,
    pub ptr_int32: TypeId,
    pub start: NameId,
    pub main: NameId,
    pub builtin_prefix: NameId,
}

pub(crate) fn known() -> &'static KnownIds {
    static KNOWN: OnceLock<KnownIds> = OnceLock::new();
    KNOWN.get_or_init(|| KnownIds {
        int8: TypeId::new("int8"),
        int16: TypeId::new("int16"),
        int32: TypeId::new("int32"),
        int64: TypeId::new("int64"),
        uint32: TypeId::new("uint32"),
        uint64: TypeId::new("uint64"),
        void: TypeId::new("struct{}"),
        void_ptr: TypeId::new("*struct{}"),
        ptr_int32: TypeId::new("*int32"),
        start: NameId::new("_start"),
        main: NameId::new("main"),
        builtin_prefix: NameId::new("__builtin_"),
    })
}

// The ids serialize as their dictionary text, not their numeric value, so a
// snapshot read in another process re-interns into that process's
// dictionary.

struct BytesIdVisitor;

impl<'de> Visitor<'de> for BytesIdVisitor {
    type Value = u32;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a dictionary byte string")
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(dict().intern(v))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(dict().intern(&v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(dict().intern(v.as_bytes()))
    }
}

macro_rules! impl_id_serde {
    ($id:ident) => {
        impl Serialize for $id {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_bytes(dict().resolve(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $id {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_byte_buf(BytesIdVisitor).map($id)
            }
        }
    };
}

impl_id_serde!(NameId);
impl_id_serde!(StringId);
impl_id_serde!(TypeId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_round_trip() {
        let id = dict().intern(b"the quick brown fox");
        assert_eq!(dict().resolve(id), b"the quick brown fox");
        assert_eq!(dict().intern(b"the quick brown fox"), id);
    }

    #[test]
    fn test_empty_string_is_id_zero() {
        assert_eq!(dict().intern(b""), 0);
        assert!(NameId::default().is_empty());
    }
}

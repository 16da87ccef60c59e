//! Memory layout of types under a particular architecture.
//!
//! A [`MemoryModel`] maps every scalar, pointer and function kind to its
//! size and alignment requirements; sizes and layouts of arrays, structs and
//! unions are derived from those. A valid model must provide items for every
//! kind except `Array`, `Struct` and `Union` — consulting an invalid model
//! is an internal error. Model instances are immutable once built and safe
//! to share between threads.

use crate::error::{ModelError, UnsupportedArchitectureError};
use crate::ty::{Type, TypeKind};
use girder_diagnostics::ice;
use rustc_hash::FxHashMap;

fn roundup(n: u64, to: u64) -> u64 {
    match n % to {
        0 => n,
        r => n + to - r,
    }
}

/// Memory properties of a particular type kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryModelItem {
    pub size: u64,
    pub align: u64,
    /// Alignment of the kind when it appears as a struct field.
    pub struct_align: u64,
}

impl MemoryModelItem {
    const fn new(size: u64, align: u64, struct_align: u64) -> Self {
        Self {
            size,
            align,
            struct_align,
        }
    }
}

/// Memory properties of a struct or union field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldProperties {
    /// Relative to the start of the struct/union.
    pub offset: u64,
    /// Field size for copying.
    pub size: u64,
    /// Adjustment to enforce proper alignment.
    pub padding: u64,
}

impl FieldProperties {
    /// The sum of the field size and its padding.
    pub fn size_of(&self) -> u64 {
        self.size + self.padding
    }
}

/// Defines size and alignment properties of types on one architecture.
#[derive(Debug, Clone)]
pub struct MemoryModel {
    items: FxHashMap<TypeKind, MemoryModelItem>,
}

const SCALARS_32: [(TypeKind, MemoryModelItem); 16] = [
    (TypeKind::Int8, MemoryModelItem::new(1, 1, 1)),
    (TypeKind::Int16, MemoryModelItem::new(2, 2, 2)),
    (TypeKind::Int32, MemoryModelItem::new(4, 4, 4)),
    (TypeKind::Int64, MemoryModelItem::new(8, 4, 4)),
    (TypeKind::Uint8, MemoryModelItem::new(1, 1, 1)),
    (TypeKind::Uint16, MemoryModelItem::new(2, 2, 2)),
    (TypeKind::Uint32, MemoryModelItem::new(4, 4, 4)),
    (TypeKind::Uint64, MemoryModelItem::new(8, 4, 4)),
    (TypeKind::Float32, MemoryModelItem::new(4, 4, 4)),
    (TypeKind::Float64, MemoryModelItem::new(8, 4, 4)),
    (TypeKind::Float128, MemoryModelItem::new(16, 4, 4)),
    (TypeKind::Complex64, MemoryModelItem::new(8, 4, 4)),
    (TypeKind::Complex128, MemoryModelItem::new(16, 4, 4)),
    (TypeKind::Complex256, MemoryModelItem::new(32, 4, 4)),
    (TypeKind::Pointer, MemoryModelItem::new(4, 4, 4)),
    (TypeKind::Function, MemoryModelItem::new(4, 4, 4)),
];

const SCALARS_32_ALIGN_64: [(TypeKind, MemoryModelItem); 16] = [
    (TypeKind::Int8, MemoryModelItem::new(1, 1, 1)),
    (TypeKind::Int16, MemoryModelItem::new(2, 2, 2)),
    (TypeKind::Int32, MemoryModelItem::new(4, 4, 4)),
    (TypeKind::Int64, MemoryModelItem::new(8, 8, 8)),
    (TypeKind::Uint8, MemoryModelItem::new(1, 1, 1)),
    (TypeKind::Uint16, MemoryModelItem::new(2, 2, 2)),
    (TypeKind::Uint32, MemoryModelItem::new(4, 4, 4)),
    (TypeKind::Uint64, MemoryModelItem::new(8, 8, 8)),
    (TypeKind::Float32, MemoryModelItem::new(4, 4, 4)),
    (TypeKind::Float64, MemoryModelItem::new(8, 8, 8)),
    (TypeKind::Float128, MemoryModelItem::new(16, 8, 8)),
    (TypeKind::Complex64, MemoryModelItem::new(8, 8, 8)),
    (TypeKind::Complex128, MemoryModelItem::new(16, 8, 8)),
    (TypeKind::Complex256, MemoryModelItem::new(32, 8, 8)),
    (TypeKind::Pointer, MemoryModelItem::new(4, 4, 4)),
    (TypeKind::Function, MemoryModelItem::new(4, 4, 4)),
];

const SCALARS_64: [(TypeKind, MemoryModelItem); 16] = [
    (TypeKind::Int8, MemoryModelItem::new(1, 1, 1)),
    (TypeKind::Int16, MemoryModelItem::new(2, 2, 2)),
    (TypeKind::Int32, MemoryModelItem::new(4, 4, 4)),
    (TypeKind::Int64, MemoryModelItem::new(8, 8, 8)),
    (TypeKind::Uint8, MemoryModelItem::new(1, 1, 1)),
    (TypeKind::Uint16, MemoryModelItem::new(2, 2, 2)),
    (TypeKind::Uint32, MemoryModelItem::new(4, 4, 4)),
    (TypeKind::Uint64, MemoryModelItem::new(8, 8, 8)),
    (TypeKind::Float32, MemoryModelItem::new(4, 4, 4)),
    (TypeKind::Float64, MemoryModelItem::new(8, 8, 8)),
    (TypeKind::Float128, MemoryModelItem::new(16, 8, 8)),
    (TypeKind::Complex64, MemoryModelItem::new(8, 8, 8)),
    (TypeKind::Complex128, MemoryModelItem::new(16, 8, 8)),
    (TypeKind::Complex256, MemoryModelItem::new(32, 8, 8)),
    (TypeKind::Pointer, MemoryModelItem::new(8, 8, 8)),
    (TypeKind::Function, MemoryModelItem::new(8, 8, 8)),
];

impl MemoryModel {
    /// The memory model of the architecture this process runs on.
    pub fn host() -> Result<Self, ModelError> {
        Self::for_arch(std::env::consts::ARCH)
    }

    /// The memory model for the named architecture.
    pub fn for_arch(arch: &str) -> Result<Self, ModelError> {
        match arch {
            "x86" | "arm" | "m68k" | "mips" | "mips32r6" | "powerpc" | "sparc" | "riscv32" => {
                Ok(Self::model_32())
            }
            "x86_64" | "aarch64" | "loongarch64" | "mips64" | "mips64r6" | "powerpc64"
            | "riscv64" | "s390x" | "sparc64" => Ok(Self::model_64()),
            _ => Err(UnsupportedArchitectureError {
                arch: arch.to_owned(),
            }
            .into()),
        }
    }

    /// 32 bit pointers, 64 bit scalars aligned to 4 bytes.
    pub fn model_32() -> Self {
        Self::from_items(SCALARS_32)
    }

    /// 32 bit pointers, 64 bit scalars aligned to 8 bytes.
    pub fn model_32_align_64() -> Self {
        Self::from_items(SCALARS_32_ALIGN_64)
    }

    /// Natural alignment everywhere, 64 bit pointers.
    pub fn model_64() -> Self {
        Self::from_items(SCALARS_64)
    }

    /// Build a model from explicit per-kind items.
    pub fn from_items(items: impl IntoIterator<Item = (TypeKind, MemoryModelItem)>) -> Self {
        Self {
            items: items.into_iter().collect(),
        }
    }

    fn item(&self, kind: TypeKind) -> MemoryModelItem {
        match self.items.get(&kind) {
            Some(item) => *item,
            None => ice!(format!("missing model item for {kind}")),
        }
    }

    /// Compute the memory alignment requirements of `t`. Zero is returned
    /// for a struct/union type with no fields.
    pub fn align_of(&self, t: &Type) -> usize {
        match t {
            Type::Array(a) => self.align_of(a.item).max(1),
            Type::StructOrUnion(su) => su
                .fields
                .iter()
                .map(|f| self.align_of(f))
                .max()
                .unwrap_or(0)
                .max(1),
            _ => self.item(t.kind()).align as usize,
        }
    }

    /// Compute the memory alignment requirements of `t` when its instance is
    /// a struct field. Zero is returned for a struct/union type with no
    /// fields.
    pub fn struct_align_of(&self, t: &Type) -> usize {
        match t {
            Type::Array(a) => self.struct_align_of(a.item),
            Type::StructOrUnion(su) => su
                .fields
                .iter()
                .map(|f| self.struct_align_of(f))
                .max()
                .unwrap_or(0),
            _ => self.item(t.kind()).struct_align as usize,
        }
    }

    /// Compute the memory size of `t`.
    pub fn size_of(&self, t: &Type) -> u64 {
        match t {
            Type::Array(a) => self.size_of(a.item) * a.items,
            Type::StructOrUnion(su) => {
                if su.fields.is_empty() {
                    return 0;
                }
                match su.kind {
                    TypeKind::Struct => {
                        let mut off = 0u64;
                        for field in &su.fields {
                            let align = self.struct_align_of(field) as u64;
                            if align != 0 {
                                off = roundup(off, align);
                            }
                            off += self.size_of(field);
                        }
                        roundup(off, self.align_of(t) as u64)
                    }
                    _ => {
                        let size = su.fields.iter().map(|f| self.size_of(f)).max().unwrap_or(0);
                        roundup(size, self.align_of(t) as u64)
                    }
                }
            }
            _ => self.item(t.kind()).size,
        }
    }

    /// Compute the memory layout of a struct or union type.
    ///
    /// For structs, field `i`'s padding is credited to the previous field
    /// and equals the bytes inserted before field `i`; the final field's
    /// padding captures the tail padding. For unions, every field is at
    /// offset zero and padded to the size of the union.
    pub fn layout(&self, t: &Type) -> Vec<FieldProperties> {
        let Some(su) = t.as_struct_or_union() else {
            ice!(format!("layout of non struct/union type {t}"));
        };
        if su.fields.is_empty() {
            return Vec::new();
        }
        let mut r = vec![FieldProperties::default(); su.fields.len()];
        match su.kind {
            TypeKind::Struct => {
                let mut off = 0u64;
                for (i, field) in su.fields.iter().enumerate() {
                    let size = self.size_of(field);
                    let align = self.struct_align_of(field) as u64;
                    let before = off;
                    if align != 0 {
                        off = roundup(off, align);
                    }
                    if off != before {
                        r[i - 1].padding = off - before;
                    }
                    r[i] = FieldProperties {
                        offset: off,
                        size,
                        padding: 0,
                    };
                    off += size;
                }
                let before = off;
                off = roundup(off, self.align_of(t) as u64);
                if off != before {
                    let last = r.len() - 1;
                    r[last].padding = off - before;
                }
            }
            _ => {
                let mut size = 0u64;
                for (i, field) in su.fields.iter().enumerate() {
                    let n = self.size_of(field);
                    r[i] = FieldProperties {
                        offset: 0,
                        size: n,
                        padding: 0,
                    };
                    size = size.max(n);
                }
                size = roundup(size, self.align_of(t) as u64);
                for f in &mut r {
                    f.padding = size - f.size;
                }
            }
        }
        r
    }
}

use bumpalo::Bump;
use girder_ir::model::{MemoryModel, MemoryModelItem};
use girder_ir::ty::{Type, TypeCache, TypeKind};
use girder_ir::TypeId;
use girder_macros::{assert_err, assert_ok};

fn item(size: u64, align: u64, struct_align: u64) -> MemoryModelItem {
    MemoryModelItem {
        size,
        align,
        struct_align,
    }
}

/// The model the layout tables below are written against: natural alignment,
/// 8 byte pointers and function pointers.
fn test_model() -> MemoryModel {
    MemoryModel::from_items([
        (TypeKind::Int8, item(1, 1, 1)),
        (TypeKind::Int16, item(2, 2, 2)),
        (TypeKind::Int32, item(4, 4, 4)),
        (TypeKind::Int64, item(8, 8, 8)),
        (TypeKind::Pointer, item(8, 8, 8)),
        (TypeKind::Function, item(8, 8, 8)),
    ])
}

fn parse<'t>(cache: &TypeCache<'t>, spec: &str) -> &'t Type<'t> {
    assert_ok!(cache.type_of(TypeId::new(spec)))
}

#[test]
fn test_align_and_size() {
    let bump = Bump::new();
    let cache = TypeCache::new(&bump);
    let model = test_model();
    let cases: &[(&str, usize, u64)] = &[
        ("[0]int16", 2, 0),
        ("[0]int8", 1, 0),
        ("[1]int16", 2, 2),
        ("[1]int8", 1, 1),
        ("[2]int16", 2, 4),
        ("[2]int8", 1, 2),
        ("[2]struct{_ [3]int8,_ int64}", 8, 32),
        ("[2]struct{_ int64,_ [3]int8}", 8, 32),
        ("[2]struct{_ int64,_ int8}", 8, 32),
        ("[2]struct{_ int8,_ int64}", 8, 32),
        ("[2]union{_ [3]int8,_ int64}", 8, 16),
        ("[2]union{_ int64,_ [3]int8}", 8, 16),
        ("[2]union{_ int64,_ int8}", 8, 16),
        ("[2]union{_ int8,_ int64}", 8, 16),
        ("func()", 8, 8),
        ("struct{_ int32,_ struct{},_ int32}", 4, 8),
        ("struct{_ int64,_ int8}", 8, 16),
        ("struct{_ int64}", 8, 8),
        ("struct{}", 1, 0),
        ("union{_ int64,_ int8}", 8, 8),
        ("union{_ int64}", 8, 8),
        ("union{}", 1, 0),
    ];
    for (spec, align, size) in cases {
        let t = parse(&cache, spec);
        assert_eq!(model.align_of(t), *align, "{spec}: align");
        assert_eq!(model.size_of(t), *size, "{spec}: size");
    }
}

#[test]
fn test_layout_offsets() {
    let bump = Bump::new();
    let cache = TypeCache::new(&bump);
    let model = test_model();
    let cases: &[(&str, &[u64])] = &[
        ("struct{_ int16,_ int8,_ int8,_ int16}", &[0, 2, 3, 4]),
        ("struct{_ int16,_ int8,_ int8,_ int32}", &[0, 2, 3, 4]),
        ("struct{_ int16,_ int8,_ int8,_ int64}", &[0, 2, 3, 8]),
        ("struct{_ int16,_ int8,_ int8}", &[0, 2, 3]),
        ("struct{_ int16,_ int8}", &[0, 2]),
        ("struct{_ int8,_ int16}", &[0, 2]),
        ("struct{_ int8}", &[0]),
        ("struct{}", &[]),
        ("union{_ int16,_ int8,_ int8,_ int16}", &[0, 0, 0, 0]),
        ("union{_ int16,_ int8,_ int8,_ int32}", &[0, 0, 0, 0]),
        ("union{_ int16,_ int8,_ int8,_ int64}", &[0, 0, 0, 0]),
        ("union{_ int16,_ int8,_ int8}", &[0, 0, 0]),
        ("union{_ int16,_ int8}", &[0, 0]),
        ("union{_ int8,_ int16}", &[0, 0]),
        ("union{_ int8}", &[0]),
        ("union{}", &[]),
    ];
    for (spec, offsets) in cases {
        let t = parse(&cache, spec);
        let fields = model.layout(t);
        let got: Vec<u64> = fields.iter().map(|f| f.offset).collect();
        assert_eq!(got, *offsets, "{spec}: offsets");
    }
}

#[test]
fn test_layout_sizes() {
    let bump = Bump::new();
    let cache = TypeCache::new(&bump);
    let model = test_model();
    let cases: &[(&str, &[u64])] = &[
        ("struct{_ int16,_ int8,_ int8,_ int16}", &[2, 1, 1, 2]),
        ("struct{_ int16,_ int8,_ int8,_ int32}", &[2, 1, 1, 4]),
        ("struct{_ int16,_ int8,_ int8,_ int64}", &[2, 1, 1, 8]),
        ("struct{_ int16,_ int8,_ int8}", &[2, 1, 1]),
        ("struct{_ int16,_ int8}", &[2, 1]),
        ("struct{_ int8,_ int16}", &[1, 2]),
        ("struct{_ int8}", &[1]),
        ("struct{}", &[]),
        ("union{_ int16,_ int8,_ int8,_ int16}", &[2, 1, 1, 2]),
        ("union{_ int16,_ int8,_ int8,_ int32}", &[2, 1, 1, 4]),
        ("union{_ int16,_ int8,_ int8,_ int64}", &[2, 1, 1, 8]),
        ("union{_ int16,_ int8,_ int8}", &[2, 1, 1]),
        ("union{_ int16,_ int8}", &[2, 1]),
        ("union{_ int8,_ int16}", &[1, 2]),
        ("union{_ int8}", &[1]),
        ("union{}", &[]),
    ];
    for (spec, sizes) in cases {
        let t = parse(&cache, spec);
        let fields = model.layout(t);
        let got: Vec<u64> = fields.iter().map(|f| f.size).collect();
        assert_eq!(got, *sizes, "{spec}: sizes");
    }
}

#[test]
fn test_layout_padding() {
    let bump = Bump::new();
    let cache = TypeCache::new(&bump);
    let model = test_model();
    let cases: &[(&str, &[u64])] = &[
        ("struct{_ int16,_ int8,_ int8,_ int16}", &[0, 0, 0, 0]),
        ("struct{_ int16,_ int8,_ int8,_ int32}", &[0, 0, 0, 0]),
        ("struct{_ int16,_ int8,_ int8,_ int64}", &[0, 0, 4, 0]),
        ("struct{_ int16,_ int8,_ int8}", &[0, 0, 0]),
        ("struct{_ int16,_ int8}", &[0, 1]),
        ("struct{_ int8,_ int16}", &[1, 0]),
        ("struct{_ int8}", &[0]),
        ("struct{}", &[]),
        ("union{_ int16,_ int8,_ int8, int16}", &[0, 1, 1, 0]),
        ("union{_ int16,_ int8,_ int8, int32}", &[2, 3, 3, 0]),
        ("union{_ int16,_ int8,_ int8, int64}", &[6, 7, 7, 0]),
        ("union{_ int16,_ int8,_ int8}", &[0, 1, 1]),
        ("union{_ int16,_ int8}", &[0, 1]),
        ("union{_ int8,_ int16}", &[1, 0]),
        ("union{_ int8}", &[0]),
        ("union{}", &[]),
    ];
    for (spec, paddings) in cases {
        let t = parse(&cache, spec);
        let fields = model.layout(t);
        let got: Vec<u64> = fields.iter().map(|f| f.padding).collect();
        assert_eq!(got, *paddings, "{spec}: paddings");
    }
}

#[test]
fn test_layout_invariants() {
    let bump = Bump::new();
    let cache = TypeCache::new(&bump);
    let model = test_model();
    let structs = [
        "struct{_ int16,_ int8,_ int8,_ int64}",
        "struct{_ int8,_ int64}",
        "struct{_ int32,_ struct{},_ int32}",
        "struct{_ int8}",
    ];
    for spec in structs {
        let t = parse(&cache, spec);
        let total: u64 = model.layout(t).iter().map(|f| f.size_of()).sum();
        assert_eq!(total, model.size_of(t), "{spec}");
    }
    let unions = [
        "union{_ int16,_ int8,_ int8,_ int64}",
        "union{_ int8,_ int16}",
        "union{_ int8}",
    ];
    for spec in unions {
        let t = parse(&cache, spec);
        let size = model.size_of(t);
        for f in model.layout(t) {
            assert_eq!(f.size_of(), size, "{spec}");
        }
    }
}

#[test]
fn test_array_of_structs_layout() {
    let bump = Bump::new();
    let cache = TypeCache::new(&bump);
    let model = test_model();
    let array = parse(&cache, "[2]struct{_ int8,_ int64}");
    assert_eq!(model.size_of(array), 32);
    assert_eq!(model.align_of(array), 8);
    let element = array.as_array().unwrap().item;
    let fields = model.layout(element);
    assert_eq!(fields.len(), 2);
    assert_eq!((fields[0].offset, fields[0].size, fields[0].padding), (0, 1, 7));
    assert_eq!((fields[1].offset, fields[1].size, fields[1].padding), (8, 8, 0));
}

#[test]
fn test_architecture_table() {
    assert_ok!(MemoryModel::for_arch("x86_64"));
    assert_ok!(MemoryModel::for_arch("aarch64"));
    assert_ok!(MemoryModel::for_arch("arm"));
    assert_err!(MemoryModel::for_arch("vax"));
}

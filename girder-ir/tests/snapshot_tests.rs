use flate2::{Compression, GzBuilder};
use girder_ir::error::SnapshotError;
use girder_ir::op::{self, Operation};
use girder_ir::{
    FunctionDefinition, Linkage, NameId, Object, Objects, Span, StringId, TypeId,
};
use girder_macros::{assert_err, assert_ok};

const MAGIC: [u8; 8] = [0x64, 0xe0, 0xc8, 0x8e, 0xca, 0xeb, 0x80, 0x65];

fn sample_objects() -> Objects {
    Objects(vec![Object::Function(FunctionDefinition::new(
        Span::empty(),
        NameId::new("f"),
        NameId::default(),
        TypeId::new("func()int32"),
        Linkage::External,
        Vec::new(),
        Vec::new(),
        vec![Operation::Result(op::Result {
            address: true,
            index: 0,
            type_id: TypeId::new("*int32"),
            span: Span::empty(),
        })],
    ))])
}

/// Build a gzip stream with an arbitrary envelope tail after the magic and
/// an empty object vector as body.
fn snapshot_with_envelope(tail: &str) -> Vec<u8> {
    let mut extra = Vec::from(MAGIC);
    extra.extend_from_slice(tail.as_bytes());
    let mut buf = Vec::new();
    let mut encoder = GzBuilder::new()
        .extra(extra)
        .write(&mut buf, Compression::default());
    bincode::serialize_into(&mut encoder, &Vec::<Object>::new()).unwrap();
    encoder.finish().unwrap();
    buf
}

fn host_envelope(version: u64) -> String {
    format!(
        "{}|{}|{}",
        std::env::consts::OS,
        std::env::consts::ARCH,
        version
    )
}

#[test]
fn test_snapshot_round_trip() {
    let objects = sample_objects();
    let mut buf = Vec::new();
    let written = assert_ok!(objects.write_to(&mut buf));
    assert_eq!(written, buf.len() as u64);
    let (read, consumed) = assert_ok!(Objects::read_from(buf.as_slice()));
    assert_eq!(consumed, written);
    assert_eq!(read, objects);
}

#[test]
fn test_snapshot_rejects_tampered_magic() {
    let mut buf = Vec::new();
    assert_ok!(sample_objects().write_to(&mut buf));
    // The gzip header is 10 bytes, the extra length 2; the magic follows.
    buf[12] ^= 0xff;
    let err = assert_err!(Objects::read_from(buf.as_slice()));
    assert!(matches!(err, SnapshotError::UnrecognizedFormat(_)));
}

#[test]
fn test_snapshot_rejects_missing_envelope() {
    let buf = {
        let mut inner = Vec::new();
        let mut encoder =
            flate2::write::GzEncoder::new(&mut inner, Compression::default());
        bincode::serialize_into(&mut encoder, &Vec::<Object>::new()).unwrap();
        encoder.finish().unwrap();
        inner
    };
    let err = assert_err!(Objects::read_from(buf.as_slice()));
    assert!(matches!(err, SnapshotError::UnrecognizedFormat(_)));
}

#[test]
fn test_snapshot_rejects_wrong_platform() {
    let buf = snapshot_with_envelope(&format!(
        "notanos|{}|1",
        std::env::consts::ARCH
    ));
    let err = assert_err!(Objects::read_from(buf.as_slice()));
    assert!(matches!(err, SnapshotError::InvalidPlatform(_)));
}

#[test]
fn test_snapshot_rejects_wrong_architecture() {
    let buf = snapshot_with_envelope(&format!(
        "{}|notanarch|1",
        std::env::consts::OS
    ));
    let err = assert_err!(Objects::read_from(buf.as_slice()));
    assert!(matches!(err, SnapshotError::InvalidArchitecture(_)));
}

#[test]
fn test_snapshot_rejects_wrong_version() {
    let buf = snapshot_with_envelope(&host_envelope(2));
    let err = assert_err!(Objects::read_from(buf.as_slice()));
    assert!(matches!(err, SnapshotError::InvalidVersion(_)));
}

#[test]
fn test_snapshot_rejects_corrupt_envelope() {
    let buf = snapshot_with_envelope("only|two");
    let err = assert_err!(Objects::read_from(buf.as_slice()));
    assert!(matches!(err, SnapshotError::CorruptedFile(_)));
}

#[test]
fn test_snapshot_accepts_valid_envelope() {
    let buf = snapshot_with_envelope(&host_envelope(1));
    let (objects, _) = assert_ok!(Objects::read_from(buf.as_slice()));
    assert!(objects.0.is_empty());
}

#[test]
fn test_ids_serialize_as_their_text() {
    let type_id = TypeId::new("The quick brown fox type");
    let encoded = bincode::serialize(&type_id).unwrap();
    assert!(windows_contain(&encoded, b"The quick brown fox type"));
    let decoded: TypeId = bincode::deserialize(&encoded).unwrap();
    assert_eq!(decoded, type_id);

    let name = NameId::new("The quick brown fox name");
    let encoded = bincode::serialize(&name).unwrap();
    assert!(windows_contain(&encoded, b"The quick brown fox name"));
    let decoded: NameId = bincode::deserialize(&encoded).unwrap();
    assert_eq!(decoded, name);

    let string = StringId::new(b"The quick brown fox string");
    let encoded = bincode::serialize(&string).unwrap();
    assert!(windows_contain(&encoded, b"The quick brown fox string"));
    let decoded: StringId = bincode::deserialize(&encoded).unwrap();
    assert_eq!(decoded, string);
}

fn windows_contain(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

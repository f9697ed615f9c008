//! Tests for opening archives and navigating their objects

mod common;

use abcxform::archive::{LIBRARY_VERSION, PropertyKind};
use abcxform::ogawa::Container;
use abcxform::writer::{ArchiveWriter, ObjectBuilder};
use abcxform::{Archive, DumpConfig, Error, MetaData, dump_to_string};

#[test]
fn test_archive_header_information() {
    let archive = Archive::from_bytes("rig.abc", common::rig_bytes()).unwrap();

    assert_eq!(archive.name(), "rig.abc");
    assert_eq!(archive.archive_version(), 0);
    assert_eq!(archive.library_version(), LIBRARY_VERSION);
    assert_eq!(archive.application(), Some("abcxform tests"));
    assert_eq!(archive.num_time_samplings(), 1);
    assert_eq!(archive.max_num_samples(0), Some(1));
}

#[test]
fn test_object_navigation() {
    let archive = Archive::from_bytes("rig.abc", common::rig_bytes()).unwrap();
    let top = archive.top().unwrap();
    assert_eq!(top.num_children(), 1);

    let root = top.child(0).unwrap();
    assert_eq!(root.name(), "root");
    assert_eq!(root.full_name(), "/root");
    assert_eq!(root.metadata().schema(), Some("AbcGeom_Xform_v3"));

    let names: Vec<String> = root
        .children()
        .map(|child| child.unwrap().name().to_string())
        .collect();
    assert_eq!(names, vec!["body", "arm"]);

    let wheel = archive.find_object("/root/body/wheel").unwrap().unwrap();
    assert_eq!(wheel.full_name(), "/root/body/wheel");
    assert_eq!(wheel.num_children(), 0);

    let body = root.child_by_name("body").unwrap().unwrap();
    assert!(body.metadata().is_empty());
    assert!(root.child_by_name("leg").unwrap().is_none());
    assert!(matches!(
        root.child(5),
        Err(Error::ChildOutOfBounds { index: 5, count: 2 })
    ));
}

#[test]
fn test_xform_properties_layout() {
    let archive = Archive::from_bytes("rig.abc", common::rig_bytes()).unwrap();
    let root = archive.find_object("/root").unwrap().unwrap();

    let properties = root.properties();
    assert_eq!(properties.num_properties(), 1);
    let xform = properties.compound(".xform").unwrap();
    assert_eq!(xform.metadata().schema(), Some("AbcGeom_Xform_v3"));

    let names: Vec<&str> = xform
        .property_headers()
        .iter()
        .map(|h| h.name.as_str())
        .collect();
    assert_eq!(names, vec![".inherits", ".ops", ".vals"]);

    let vals = xform.property_header(".vals").unwrap();
    assert_eq!(vals.kind, PropertyKind::Scalar);
    assert_eq!(vals.data_type.extent, 3);

    assert!(matches!(
        xform.array(".vals"),
        Err(Error::TypeMismatch { .. })
    ));
    assert!(matches!(xform.scalar(".missing"), Err(Error::InvalidData(_))));
}

#[test]
fn test_invalid_magic_is_rejected() {
    let mut bytes = common::rig_bytes();
    bytes[0..5].copy_from_slice(b"HDF5!");
    assert!(matches!(
        Archive::from_bytes("bad.abc", bytes),
        Err(Error::InvalidMagic)
    ));
}

#[test]
fn test_truncated_archives_error_without_panicking() {
    let bytes = common::rig_bytes();
    for len in [0, 4, 15, 16, 100, bytes.len() / 2, bytes.len() - 1] {
        let result = Archive::from_bytes("cut.abc", bytes[..len].to_vec())
            .and_then(|archive| dump_to_string(&archive, DumpConfig::new()));
        assert!(result.is_err(), "truncation to {} bytes was accepted", len);
    }
}

/// Rig bytes with the root's translate op byte replaced by `encoding`
fn rig_with_op_byte(encoding: u8) -> Vec<u8> {
    let mut bytes = common::rig_bytes();

    // The translate op byte: a 17-byte block holding a zero key and 0x10
    let mut needle = 17u64.to_le_bytes().to_vec();
    needle.extend_from_slice(&[0u8; 16]);
    needle.push(0x10);
    let at = bytes
        .windows(needle.len())
        .position(|w| w == needle.as_slice())
        .expect("op block present");
    bytes[at + needle.len() - 1] = encoding;
    bytes
}

#[test]
fn test_unknown_op_code_is_reported() {
    let archive = Archive::from_bytes("bad-op.abc", rig_with_op_byte(0x70)).unwrap();
    let result = dump_to_string(&archive, DumpConfig::new());
    assert!(matches!(result, Err(Error::InvalidXformOp(0x70))));
}

#[test]
fn test_stored_hint_out_of_range_reads_as_zero() {
    let archive = Archive::from_bytes("hint.abc", rig_with_op_byte(0x15)).unwrap();
    let text = dump_to_string(&archive, DumpConfig::new()).unwrap();
    assert!(text.contains("[0] type=1 hint=0 vals=[1, 2, 3]\n"), "{}", text);

    let archive = Archive::from_bytes("hint.abc", rig_with_op_byte(0x13)).unwrap();
    let text = dump_to_string(&archive, DumpConfig::new()).unwrap();
    assert!(text.contains("[0] type=1 hint=3 vals=[1, 2, 3]\n"), "{}", text);
}

#[test]
fn test_child_pointing_at_ancestor_is_rejected() {
    let mut bytes = ArchiveWriter::new()
        .with_child(ObjectBuilder::xform("a").with_child(ObjectBuilder::xform("b")))
        .to_bytes()
        .unwrap();

    // Redirect a's only child (group child 1) to a's own group
    let a_pos = {
        let container = Container::from_bytes(bytes.clone()).unwrap();
        let top = container.root().unwrap().group(2).unwrap();
        top.group(1).unwrap().pos()
    };
    let slot = (a_pos + 16) as usize;
    bytes[slot..slot + 8].copy_from_slice(&a_pos.to_le_bytes());

    let archive = Archive::from_bytes("cycle.abc", bytes).unwrap();
    let result = dump_to_string(&archive, DumpConfig::new());
    assert!(matches!(result, Err(Error::CyclicHierarchy(ref name)) if name == "/a/b"));

    let result = dump_to_string(&archive, DumpConfig::new().with_filter("zzz"));
    assert!(matches!(result, Err(Error::CyclicHierarchy(_))));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = Archive::open(dir.path().join("absent.abc"));
    match result {
        Err(err @ Error::Io(_)) => assert!(err.to_string().starts_with("[E1001]")),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("opened a missing file"),
    }
}

#[test]
fn test_metadata_round_trips_through_archive() {
    let archive = Archive::from_bytes("rig.abc", common::rig_bytes()).unwrap();
    let text = archive.metadata().serialize();
    assert_eq!(&MetaData::parse(&text), archive.metadata());
    assert!(archive.metadata().get(MetaData::ALEMBIC_VERSION).is_some());
}

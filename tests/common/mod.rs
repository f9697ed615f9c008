//! Shared fixtures for integration tests
//!
//! Archives are built with the crate's own writer so every test knows exactly
//! which hierarchy it is reading back.

#![allow(dead_code)]

use abcxform::TimeSampling;
use abcxform::writer::{ArchiveWriter, ObjectBuilder};
use abcxform::{XformOp, XformSample};

/// A small rig:
///
/// ```text
/// root      translate (1, 2, 3)
/// ├── body  plain object
/// │   └── wheel  rotate Z 90
/// └── arm   scale 2, does not inherit
/// ```
pub fn rig_writer() -> ArchiveWriter {
    let wheel = ObjectBuilder::xform("wheel")
        .with_sample(XformSample::new().with_op(XformOp::rotate_z(90.0)));
    let body = ObjectBuilder::group("body").with_child(wheel);
    let arm = ObjectBuilder::xform("arm").with_sample(
        XformSample::new()
            .with_op(XformOp::scale(2.0, 2.0, 2.0))
            .with_inherits(false),
    );
    let root = ObjectBuilder::xform("root")
        .with_sample(XformSample::new().with_op(XformOp::translate(1.0, 2.0, 3.0)))
        .with_child(body)
        .with_child(arm);

    let mut writer = ArchiveWriter::new();
    writer.set_application("abcxform tests");
    writer.add_child(root);
    writer
}

/// Bytes of [`rig_writer`]
pub fn rig_bytes() -> Vec<u8> {
    rig_writer().to_bytes().expect("rig archive serializes")
}

/// One node bouncing along Y at 24 fps: y = 0, 1, 2 at frames 0, 1, 2
pub fn bounce_bytes() -> Vec<u8> {
    let mut writer = ArchiveWriter::new();
    let fps = writer.add_time_sampling(TimeSampling::uniform_fps(24.0, 0.0));

    let mut bounce = ObjectBuilder::xform("bounce").with_time_sampling(fps);
    for y in [0.0, 1.0, 2.0] {
        bounce.add_sample(XformSample::new().with_op(XformOp::translate(0.0, y, 0.0)));
    }
    writer.add_child(bounce);
    writer.to_bytes().expect("bounce archive serializes")
}

/// A chain of nested transforms, each translating by its offset
pub fn chain_bytes(offsets: &[[f64; 3]]) -> Vec<u8> {
    let mut node: Option<ObjectBuilder> = None;
    for (i, offset) in offsets.iter().enumerate().rev() {
        let mut builder = ObjectBuilder::xform(format!("n{}", i)).with_sample(
            XformSample::new().with_op(XformOp::translate(offset[0], offset[1], offset[2])),
        );
        if let Some(child) = node.take() {
            builder.add_child(child);
        }
        node = Some(builder);
    }

    let mut writer = ArchiveWriter::new();
    if let Some(root) = node {
        writer.add_child(root);
    }
    writer.to_bytes().expect("chain archive serializes")
}

/// Path of the chain node at `depth` (0-based)
pub fn chain_path(depth: usize) -> String {
    (0..=depth).map(|i| format!("/n{}", i)).collect()
}

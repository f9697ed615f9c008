#![no_main]

use abcxform::writer::{ArchiveWriter, ObjectBuilder};
use abcxform::{Archive, DumpConfig, XformOp, XformSample, dump_to_string};
use libfuzzer_sys::arbitrary::{Arbitrary, Result, Unstructured};
use libfuzzer_sys::fuzz_target;

#[derive(Debug)]
struct FuzzStack {
    encodings: Vec<u8>,
    values: Vec<f64>,
    inherits: bool,
    depth: usize,
}

impl<'a> Arbitrary<'a> for FuzzStack {
    fn arbitrary(u: &mut Unstructured<'a>) -> Result<Self> {
        let op_count = u.int_in_range(0..=24)?;
        let mut encodings = Vec::new();
        for _ in 0..op_count {
            // Only the seven known op types; the hint nibble is free
            let op_type: u8 = u.int_in_range(0..=6)?;
            let hint: u8 = u.int_in_range(0..=15)?;
            encodings.push((op_type << 4) | hint);
        }
        let value_count = u.int_in_range(0..=400)?;
        let mut values = Vec::new();
        for _ in 0..value_count {
            values.push(u.arbitrary()?);
        }
        Ok(FuzzStack {
            encodings,
            values,
            inherits: u.arbitrary()?,
            depth: u.int_in_range(1..=8)?,
        })
    }
}

fuzz_target!(|stack: FuzzStack| {
    let mut values = stack.values.iter().copied().cycle();
    let mut sample = XformSample::new().with_inherits(stack.inherits);
    for &encoding in &stack.encodings {
        let Ok(mut op) = XformOp::from_encoding(encoding) else {
            continue;
        };
        for channel in 0..op.num_channels() {
            op.set_channel(channel, values.next().unwrap_or(0.0));
        }
        sample.add_op(op);
    }

    let mut node = ObjectBuilder::xform("leaf").with_sample(sample.clone());
    for level in 1..stack.depth {
        node = ObjectBuilder::xform(format!("level{}", level))
            .with_sample(sample.clone())
            .with_child(node);
    }

    let bytes = ArchiveWriter::new()
        .with_child(node)
        .to_bytes()
        .expect("writer accepts a single-layout stack");
    let archive = Archive::from_bytes("fuzz", bytes).expect("written archive opens");
    dump_to_string(&archive, DumpConfig::new()).expect("written archive dumps");
});

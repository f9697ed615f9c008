//! Writing transform hierarchies
//!
//! [`ArchiveWriter`] lays out a tree of [`ObjectBuilder`]s as an Ogawa-backed
//! Alembic archive that [`crate::Archive`] (and other Alembic readers) can open.
//!
//! ```
//! use abcxform::writer::{ArchiveWriter, ObjectBuilder};
//! use abcxform::{XformOp, XformSample};
//!
//! let arm = ObjectBuilder::xform("arm")
//!     .with_sample(XformSample::new().with_op(XformOp::rotate_z(45.0)));
//! let root = ObjectBuilder::xform("root")
//!     .with_sample(XformSample::new().with_op(XformOp::translate(1.0, 0.0, 0.0)))
//!     .with_child(arm);
//!
//! let bytes = ArchiveWriter::new().with_child(root).to_bytes()?;
//! let archive = abcxform::Archive::from_bytes("memory", bytes)?;
//! assert!(archive.find_object("/root/arm")?.is_some());
//! # Ok::<(), abcxform::Error>(())
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use log::debug;

use crate::archive::{
    DataType, INLINE_METADATA, LIBRARY_VERSION, MetaData, OBJECT_HEADERS_HASH_SIZE, ObjectHeader,
    Pod, PropertyHeader, PropertyKind, TimeSampling, write_indexed_metadata, write_object_header,
    write_property_header, write_time_samplings,
};
use crate::error::{Error, Result};
use crate::ogawa::{ContainerWriter, data_offset};
use crate::xform::{
    INHERITS_PROPERTY, OPS_PROPERTY, VALS_PROPERTY, XFORM_COMPOUND, XFORM_SCHEMA,
    XFORM_SCHEMA_OBJ_TITLE, XformSample,
};

/// Archive version recorded in written files
pub const ARCHIVE_VERSION: i32 = 0;

/// Most entries an indexed metadata table can hold (0xFF marks inline metadata)
const MAX_INDEXED_METADATA: usize = 255;

/// Longest metadata string that may be indexed
const MAX_INDEXED_METADATA_LEN: usize = 255;

/// Largest extent a scalar property can declare
const MAX_SCALAR_EXTENT: usize = 255;

enum NodeKind {
    Group,
    Xform {
        samples: Vec<XformSample>,
        time_sampling: u32,
    },
}

/// One object of the tree to write
pub struct ObjectBuilder {
    name: String,
    kind: NodeKind,
    children: Vec<ObjectBuilder>,
}

impl ObjectBuilder {
    /// A plain object with no schema
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Group,
            children: Vec::new(),
        }
    }

    /// A transform node; with no samples it is written as one identity sample
    pub fn xform(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Xform {
                samples: Vec::new(),
                time_sampling: 0,
            },
            children: Vec::new(),
        }
    }

    /// Append a sample (ignored on plain objects)
    pub fn add_sample(&mut self, sample: XformSample) {
        if let NodeKind::Xform { samples, .. } = &mut self.kind {
            samples.push(sample);
        }
    }

    /// Builder form of [`ObjectBuilder::add_sample`]
    pub fn with_sample(mut self, sample: XformSample) -> Self {
        self.add_sample(sample);
        self
    }

    /// Use time sampling `index` of the writer for this node's samples
    pub fn with_time_sampling(mut self, index: u32) -> Self {
        if let NodeKind::Xform { time_sampling, .. } = &mut self.kind {
            *time_sampling = index;
        }
        self
    }

    /// Append a child object
    pub fn add_child(&mut self, child: ObjectBuilder) {
        self.children.push(child);
    }

    /// Builder form of [`ObjectBuilder::add_child`]
    pub fn with_child(mut self, child: ObjectBuilder) -> Self {
        self.children.push(child);
        self
    }

    /// Object name
    pub fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> MetaData {
        match self.kind {
            NodeKind::Group => MetaData::new(),
            NodeKind::Xform { .. } => MetaData::new()
                .with(MetaData::SCHEMA, XFORM_SCHEMA)
                .with(MetaData::SCHEMA_OBJ_TITLE, XFORM_SCHEMA_OBJ_TITLE),
        }
    }
}

/// Builds an archive in memory
pub struct ArchiveWriter {
    metadata: MetaData,
    time_samplings: Vec<TimeSampling>,
    children: Vec<ObjectBuilder>,
}

impl Default for ArchiveWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveWriter {
    /// An empty archive with the identity time sampling at index 0
    pub fn new() -> Self {
        let version = LIBRARY_VERSION;
        let metadata = MetaData::new().with(
            MetaData::ALEMBIC_VERSION,
            format!(
                "Alembic {}.{}.{} (abcxform {})",
                version / 10000,
                (version / 100) % 100,
                version % 100,
                env!("CARGO_PKG_VERSION")
            ),
        );
        Self {
            metadata,
            time_samplings: vec![TimeSampling::identity()],
            children: Vec::new(),
        }
    }

    /// Register a time sampling and return its index
    ///
    /// Registering an equal sampling twice returns the existing index.
    pub fn add_time_sampling(&mut self, sampling: TimeSampling) -> u32 {
        let index = match self.time_samplings.iter().position(|ts| *ts == sampling) {
            Some(index) => index,
            None => {
                self.time_samplings.push(sampling);
                self.time_samplings.len() - 1
            }
        };
        index as u32
    }

    /// Record the writing application in the archive metadata
    pub fn set_application(&mut self, application: impl Into<String>) {
        self.metadata.set(MetaData::APPLICATION, application);
    }

    /// Append a top-level object
    pub fn add_child(&mut self, child: ObjectBuilder) {
        self.children.push(child);
    }

    /// Builder form of [`ArchiveWriter::add_child`]
    pub fn with_child(mut self, child: ObjectBuilder) -> Self {
        self.children.push(child);
        self
    }

    /// Serialize the archive
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut state = WriteState {
            container: ContainerWriter::new(),
            indexed_metadata: vec![MetaData::new()],
            max_samples: vec![0; self.time_samplings.len()],
        };

        let version = state.container.write_data(&ARCHIVE_VERSION.to_le_bytes());
        let library = state.container.write_data(&LIBRARY_VERSION.to_le_bytes());
        let top = state.write_object(&self.children, None, "/")?;
        let metadata = state.container.write_data(self.metadata.serialize().as_bytes());

        let table: Vec<(TimeSampling, u32)> = self
            .time_samplings
            .iter()
            .cloned()
            .zip(state.max_samples.iter().copied())
            .collect();
        let samplings = state.container.write_data(&write_time_samplings(&table));
        let indexed = state
            .container
            .write_data(&write_indexed_metadata(&state.indexed_metadata));

        let bytes = state
            .container
            .finish(&[version, library, top, metadata, samplings, indexed]);
        debug!(
            "Wrote archive: {} bytes, {} time samplings, {} indexed metadata",
            bytes.len(),
            table.len(),
            state.indexed_metadata.len()
        );
        Ok(bytes)
    }

    /// Serialize the archive to `path`
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_bytes()?)?;
        Ok(())
    }
}

struct WriteState {
    container: ContainerWriter,
    indexed_metadata: Vec<MetaData>,
    max_samples: Vec<u32>,
}

impl WriteState {
    /// Index of `metadata` in the shared table, or the inline marker
    fn metadata_index(&mut self, metadata: &MetaData) -> u8 {
        if metadata.is_empty() {
            return 0;
        }
        if metadata.serialize().len() > MAX_INDEXED_METADATA_LEN {
            return INLINE_METADATA;
        }
        if let Some(index) = self.indexed_metadata.iter().position(|m| m == metadata) {
            return index as u8;
        }
        if self.indexed_metadata.len() < MAX_INDEXED_METADATA {
            self.indexed_metadata.push(metadata.clone());
            return (self.indexed_metadata.len() - 1) as u8;
        }
        INLINE_METADATA
    }

    /// Write an object group: properties, children, child headers
    fn write_object(
        &mut self,
        children: &[ObjectBuilder],
        kind: Option<&NodeKind>,
        full_name: &str,
    ) -> Result<u64> {
        let properties = match kind {
            Some(NodeKind::Xform {
                samples,
                time_sampling,
            }) => {
                let xform = self.write_xform_compound(samples, *time_sampling, full_name)?;
                let header = PropertyHeader::compound(
                    XFORM_COMPOUND,
                    MetaData::new().with(MetaData::SCHEMA, XFORM_SCHEMA),
                );
                self.write_compound(&[(header, xform)])
            }
            _ => self.write_compound(&[]),
        };

        let mut names = HashSet::new();
        let mut offsets = vec![properties];
        let mut headers = Vec::new();
        for child in children {
            if child.name.is_empty() || child.name.contains('/') {
                return Err(Error::InvalidArchive(format!(
                    "invalid object name '{}' under {}",
                    child.name, full_name
                )));
            }
            if !names.insert(child.name.as_str()) {
                return Err(Error::InvalidArchive(format!(
                    "duplicate object name '{}' under {}",
                    child.name, full_name
                )));
            }

            let child_full_name = if full_name == "/" {
                format!("/{}", child.name)
            } else {
                format!("{}/{}", full_name, child.name)
            };
            offsets.push(self.write_object(&child.children, Some(&child.kind), &child_full_name)?);

            let header = ObjectHeader {
                name: child.name.clone(),
                full_name: child_full_name,
                metadata: child.metadata(),
            };
            let index = self.metadata_index(&header.metadata);
            write_object_header(&mut headers, &header, index);
        }
        headers.extend_from_slice(&[0u8; OBJECT_HEADERS_HASH_SIZE]);
        offsets.push(self.container.write_data(&headers));

        Ok(self.container.write_group(&offsets))
    }

    /// Write a compound group from already written sub-properties
    fn write_compound(&mut self, properties: &[(PropertyHeader, u64)]) -> u64 {
        let mut headers = Vec::new();
        let mut offsets = Vec::with_capacity(properties.len() + 1);
        for (header, offset) in properties {
            let index = self.metadata_index(&header.metadata);
            write_property_header(&mut headers, header, index);
            offsets.push(*offset);
        }
        offsets.push(self.container.write_data(&headers));
        self.container.write_group(&offsets)
    }

    fn write_xform_compound(
        &mut self,
        samples: &[XformSample],
        time_sampling: u32,
        full_name: &str,
    ) -> Result<u64> {
        if time_sampling as usize >= self.max_samples.len() {
            return Err(Error::InvalidArchive(format!(
                "{} uses unknown time sampling {}",
                full_name, time_sampling
            )));
        }

        let identity = [XformSample::new()];
        let samples = if samples.is_empty() {
            &identity[..]
        } else {
            samples
        };

        let encodings: Vec<u8> = samples[0].ops().iter().map(|op| op.encoding()).collect();
        for sample in &samples[1..] {
            if !sample
                .ops()
                .iter()
                .map(|op| op.encoding())
                .eq(encodings.iter().copied())
            {
                return Err(Error::invalid_data(
                    OPS_PROPERTY,
                    format!("operations of {} change between samples", full_name),
                ));
            }
        }

        let mut properties = Vec::new();

        let inherits: Vec<Vec<u8>> = samples
            .iter()
            .map(|s| vec![u8::from(s.inherits())])
            .collect();
        properties.push(self.write_scalar(
            INHERITS_PROPERTY,
            DataType::new(Pod::Boolean, 1),
            time_sampling,
            &inherits,
        ));

        if !encodings.is_empty() {
            let ops = [encodings.clone()];
            properties.push(self.write_samples(OPS_PROPERTY, Pod::Uint8, encodings.len(), 0, &ops));

            let vals: Vec<Vec<u8>> = samples
                .iter()
                .map(|s| {
                    s.ops()
                        .iter()
                        .flat_map(|op| op.channels())
                        .flat_map(|v| v.to_le_bytes())
                        .collect()
                })
                .collect();
            let channels = samples[0].num_channels();
            properties.push(self.write_samples(VALS_PROPERTY, Pod::Float64, channels, time_sampling, &vals));
        }

        Ok(self.write_compound(&properties))
    }

    /// Write values as a scalar when the extent fits, otherwise as an array
    fn write_samples(
        &mut self,
        name: &str,
        pod: Pod,
        count: usize,
        time_sampling: u32,
        samples: &[Vec<u8>],
    ) -> (PropertyHeader, u64) {
        if count <= MAX_SCALAR_EXTENT {
            self.write_scalar(name, DataType::new(pod, count as u8), time_sampling, samples)
        } else {
            self.write_array(name, DataType::new(pod, 1), time_sampling, samples)
        }
    }

    fn write_scalar(
        &mut self,
        name: &str,
        data_type: DataType,
        time_sampling: u32,
        samples: &[Vec<u8>],
    ) -> (PropertyHeader, u64) {
        let mut header = PropertyHeader::scalar(name, data_type);
        let stored = self.fill_change_range(&mut header, time_sampling, samples);

        let mut offsets: Vec<u64> = Vec::with_capacity(stored);
        for (i, sample) in samples[..stored].iter().enumerate() {
            let offset = match offsets.last() {
                Some(&previous) if *sample == samples[i - 1] => previous,
                _ => self.container.write_sample(sample),
            };
            offsets.push(offset);
        }
        (header, self.container.write_group(&offsets))
    }

    fn write_array(
        &mut self,
        name: &str,
        data_type: DataType,
        time_sampling: u32,
        samples: &[Vec<u8>],
    ) -> (PropertyHeader, u64) {
        let mut header = PropertyHeader::scalar(name, data_type);
        header.kind = PropertyKind::Array;
        let stored = self.fill_change_range(&mut header, time_sampling, samples);

        let mut offsets: Vec<u64> = Vec::with_capacity(stored * 2);
        for (i, sample) in samples[..stored].iter().enumerate() {
            let offset = match offsets.len() {
                n if n >= 2 && *sample == samples[i - 1] => offsets[n - 2],
                _ => self.container.write_sample(sample),
            };
            // One-dimensional samples leave their dimensions implied
            offsets.push(offset);
            offsets.push(data_offset(0));
        }
        (header, self.container.write_group(&offsets))
    }

    /// Set sample count and change range; return how many samples to store
    fn fill_change_range(
        &mut self,
        header: &mut PropertyHeader,
        time_sampling: u32,
        samples: &[Vec<u8>],
    ) -> usize {
        let first = samples.iter().skip(1).position(|s| *s != samples[0]);
        let last = (1..samples.len()).rev().find(|&i| samples[i] != samples[i - 1]);

        header.num_samples = samples.len() as u32;
        header.time_sampling_index = time_sampling;
        match (first, last) {
            (Some(first), Some(last)) => {
                header.first_changed_index = first as u32 + 1;
                header.last_changed_index = last as u32;
            }
            _ => {
                header.first_changed_index = 0;
                header.last_changed_index = 0;
            }
        }

        if let Some(max) = self.max_samples.get_mut(time_sampling as usize) {
            *max = (*max).max(header.num_samples);
        }
        header.last_changed_index as usize + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Archive;
    use crate::xform::XformOp;

    fn moving_sample(x: f64) -> XformSample {
        XformSample::new().with_op(XformOp::translate(x, 0.0, 0.0))
    }

    #[test]
    fn test_change_range_of_held_samples() {
        let node = ObjectBuilder::xform("node")
            .with_sample(moving_sample(0.0))
            .with_sample(moving_sample(0.0))
            .with_sample(moving_sample(1.0))
            .with_sample(moving_sample(2.0))
            .with_sample(moving_sample(2.0));
        let bytes = ArchiveWriter::new().with_child(node).to_bytes().unwrap();
        let archive = Archive::from_bytes("mem", bytes).unwrap();

        let node = archive.find_object("/node").unwrap().unwrap();
        let xform = node.properties().compound(XFORM_COMPOUND).unwrap();
        let vals = xform.property_header(VALS_PROPERTY).unwrap();
        assert_eq!(vals.num_samples, 5);
        assert_eq!(vals.first_changed_index, 2);
        assert_eq!(vals.last_changed_index, 3);

        let inherits = xform.property_header(INHERITS_PROPERTY).unwrap();
        assert!(inherits.is_constant());

        let ops = xform.scalar(OPS_PROPERTY).unwrap();
        assert_eq!(ops.num_samples(), 1);
        assert_eq!(ops.read_u8s(0).unwrap(), vec![0x10]);

        let vals = xform.scalar(VALS_PROPERTY).unwrap();
        assert_eq!(vals.read_f64s(1).unwrap(), vec![0.0, 0.0, 0.0]);
        assert_eq!(vals.read_f64s(2).unwrap(), vec![1.0, 0.0, 0.0]);
        assert_eq!(vals.read_f64s(4).unwrap(), vec![2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_held_samples_before_first_change_are_stored() {
        let node = ObjectBuilder::xform("node")
            .with_sample(moving_sample(0.0))
            .with_sample(moving_sample(0.0))
            .with_sample(moving_sample(1.0))
            .with_sample(moving_sample(2.0))
            .with_sample(moving_sample(2.0));
        let bytes = ArchiveWriter::new().with_child(node).to_bytes().unwrap();

        // top -> node -> properties -> .xform -> .vals
        let container = crate::ogawa::Container::from_bytes(bytes).unwrap();
        let node = container.root().unwrap().group(2).unwrap().group(1).unwrap();
        let xform = node.group(0).unwrap().group(0).unwrap();
        let vals = xform.group(2).unwrap();

        // Samples 0..=last_changed, the trailing hold is not written
        assert_eq!(vals.num_children(), 4);
        let held = vals.data(0).unwrap();
        assert_eq!(held.pos(), vals.data(1).unwrap().pos());
        assert_ne!(held.pos(), vals.data(2).unwrap().pos());
    }

    #[test]
    fn test_identity_node_has_no_ops() {
        let bytes = ArchiveWriter::new()
            .with_child(ObjectBuilder::xform("still"))
            .to_bytes()
            .unwrap();
        let archive = Archive::from_bytes("mem", bytes).unwrap();
        let node = archive.find_object("/still").unwrap().unwrap();
        let xform = node.properties().compound(XFORM_COMPOUND).unwrap();
        assert!(!xform.has_property(OPS_PROPERTY));
        assert!(!xform.has_property(VALS_PROPERTY));
        assert!(xform.has_property(INHERITS_PROPERTY));
    }

    #[test]
    fn test_wide_stacks_use_array_properties() {
        let mut sample = XformSample::new();
        for _ in 0..20 {
            sample.add_op(XformOp::matrix_op([1.0; 16]));
        }
        let bytes = ArchiveWriter::new()
            .with_child(ObjectBuilder::xform("wide").with_sample(sample))
            .to_bytes()
            .unwrap();
        let archive = Archive::from_bytes("mem", bytes).unwrap();
        let node = archive.find_object("/wide").unwrap().unwrap();
        let xform = node.properties().compound(XFORM_COMPOUND).unwrap();

        let vals = xform.array(VALS_PROPERTY).unwrap();
        assert_eq!(vals.dimensions(0).unwrap(), vec![320]);
        assert_eq!(vals.read_f64s(0).unwrap().len(), 320);
        assert_eq!(xform.scalar(OPS_PROPERTY).unwrap().data_type().extent, 20);
    }

    #[test]
    fn test_changing_op_layout_is_rejected() {
        let node = ObjectBuilder::xform("node")
            .with_sample(moving_sample(0.0))
            .with_sample(XformSample::new().with_op(XformOp::scale(1.0, 1.0, 1.0)));
        assert!(matches!(
            ArchiveWriter::new().with_child(node).to_bytes(),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let writer = ArchiveWriter::new()
            .with_child(ObjectBuilder::group("a"))
            .with_child(ObjectBuilder::group("a"));
        assert!(matches!(writer.to_bytes(), Err(Error::InvalidArchive(_))));
    }

    #[test]
    fn test_unknown_time_sampling_is_rejected() {
        let writer =
            ArchiveWriter::new().with_child(ObjectBuilder::xform("a").with_time_sampling(3));
        assert!(matches!(writer.to_bytes(), Err(Error::InvalidArchive(_))));
    }

    #[test]
    fn test_time_samplings_are_shared() {
        let mut writer = ArchiveWriter::new();
        assert_eq!(writer.add_time_sampling(TimeSampling::identity()), 0);
        let fps = writer.add_time_sampling(TimeSampling::uniform_fps(24.0, 0.0));
        assert_eq!(fps, 1);
        assert_eq!(writer.add_time_sampling(TimeSampling::uniform_fps(24.0, 0.0)), 1);

        writer.set_application("tests");
        writer.add_child(
            ObjectBuilder::xform("a")
                .with_time_sampling(fps)
                .with_sample(moving_sample(0.0))
                .with_sample(moving_sample(1.0))
                .with_sample(moving_sample(2.0)),
        );
        let archive = Archive::from_bytes("mem", writer.to_bytes().unwrap()).unwrap();
        assert_eq!(archive.num_time_samplings(), 2);
        assert_eq!(archive.max_num_samples(1), Some(3));
        assert_eq!(archive.application(), Some("tests"));
        assert!(
            archive
                .metadata()
                .get(MetaData::ALEMBIC_VERSION)
                .is_some_and(|v| v.starts_with("Alembic 1.8.10"))
        );
    }
}

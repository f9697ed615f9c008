//! Alembic archives on top of an Ogawa container
//!
//! The root group of an archive holds six children:
//!
//! | child | content |
//! |-------|---------|
//! | 0 | archive version (i32) |
//! | 1 | library version that wrote the file (i32) |
//! | 2 | top object group |
//! | 3 | archive metadata |
//! | 4 | time sampling table |
//! | 5 | indexed metadata table |

mod header;
mod metadata;
mod object;
mod property;
mod time_sampling;

pub use header::{DataType, ObjectHeader, Pod, PropertyHeader, PropertyKind};
pub use metadata::MetaData;
pub use object::Object;
pub use property::{ArrayProperty, CompoundProperty, Property, ScalarProperty};
pub use time_sampling::{ACYCLIC_TIME_PER_CYCLE, TimeSampling};

pub(crate) use header::{
    INLINE_METADATA, OBJECT_HEADERS_HASH_SIZE, write_indexed_metadata, write_object_header,
    write_property_header,
};
pub(crate) use time_sampling::write_time_samplings;

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::error::{Error, Result};
use crate::ogawa::{Container, Group};

/// Highest archive version this reader understands
pub const MAX_ARCHIVE_VERSION: i32 = 1;

/// Oldest library version that wrote Ogawa archives
pub const MIN_LIBRARY_VERSION: i32 = 9999;

/// Library version recorded by [`crate::writer::ArchiveWriter`]
pub const LIBRARY_VERSION: i32 = 10810;

/// Number of children in an archive's root group
pub(crate) const ROOT_CHILDREN: u64 = 6;

/// Tables shared by every object and property of one archive
pub(crate) struct ArchiveContext {
    pub(crate) indexed_metadata: Vec<MetaData>,
    pub(crate) time_samplings: Vec<(TimeSampling, u32)>,
}

/// An opened archive
pub struct Archive {
    name: String,
    version: i32,
    library_version: i32,
    metadata: MetaData,
    top_group: Group,
    ctx: Arc<ArchiveContext>,
}

impl Archive {
    /// Open the archive at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::from_container(path.display().to_string(), Container::open(path)?)
    }

    /// Open an archive held in memory
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        Self::from_container(name.into(), Container::from_bytes(bytes)?)
    }

    /// Read an archive from any reader
    pub fn from_reader<R: Read>(name: impl Into<String>, mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(name, bytes)
    }

    fn from_container(name: String, container: Container) -> Result<Self> {
        let root = container.root()?;
        if root.num_children() < ROOT_CHILDREN {
            return Err(Error::InvalidArchive(format!(
                "root group has {} children, expected {}",
                root.num_children(),
                ROOT_CHILDREN
            )));
        }

        let version = read_i32(&root, 0, "archive version")?;
        if !(0..=MAX_ARCHIVE_VERSION).contains(&version) {
            return Err(Error::UnsupportedVersion(format!(
                "archive version {}",
                version
            )));
        }
        let library_version = read_i32(&root, 1, "library version")?;
        if library_version < MIN_LIBRARY_VERSION {
            return Err(Error::UnsupportedVersion(format!(
                "library version {}",
                library_version
            )));
        }

        let metadata = MetaData::parse(std::str::from_utf8(root.data(3)?.as_slice())?);

        let mut time_samplings = time_sampling::read_time_samplings(root.data(4)?.as_slice())?;
        if time_samplings.is_empty() {
            time_samplings.push((TimeSampling::identity(), 0));
        }
        let indexed_metadata = header::read_indexed_metadata(root.data(5)?.as_slice())?;

        debug!(
            "Opened archive {}: version {}, library {}, {} time samplings, {} indexed metadata",
            name,
            version,
            library_version,
            time_samplings.len(),
            indexed_metadata.len()
        );

        Ok(Self {
            name,
            version,
            library_version,
            metadata,
            top_group: root.group(2)?,
            ctx: Arc::new(ArchiveContext {
                indexed_metadata,
                time_samplings,
            }),
        })
    }

    /// Name the archive was opened under (its path for files)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Archive format version
    pub fn archive_version(&self) -> i32 {
        self.version
    }

    /// Version of the library that wrote the archive
    pub fn library_version(&self) -> i32 {
        self.library_version
    }

    /// Archive-level metadata
    pub fn metadata(&self) -> &MetaData {
        &self.metadata
    }

    /// Application that wrote the archive, if recorded
    pub fn application(&self) -> Option<&str> {
        self.metadata.get(MetaData::APPLICATION)
    }

    /// Number of time samplings, including the identity at index 0
    pub fn num_time_samplings(&self) -> usize {
        self.ctx.time_samplings.len()
    }

    /// Time sampling `index`
    pub fn time_sampling(&self, index: usize) -> Option<&TimeSampling> {
        self.ctx.time_samplings.get(index).map(|(ts, _)| ts)
    }

    /// Largest sample count among properties using time sampling `index`
    pub fn max_num_samples(&self, index: usize) -> Option<u32> {
        self.ctx.time_samplings.get(index).map(|&(_, max)| max)
    }

    /// The root of the object hierarchy
    pub fn top(&self) -> Result<Object> {
        let header = ObjectHeader {
            metadata: self.metadata.clone(),
            ..ObjectHeader::root()
        };
        Object::load(header, self.top_group.clone(), Vec::new(), self.ctx.clone())
    }

    /// Find an object by its slash-separated path, e.g. `/root/arm`
    pub fn find_object(&self, path: &str) -> Result<Option<Object>> {
        let mut object = self.top()?;
        for name in path.split('/').filter(|s| !s.is_empty()) {
            match object.child_by_name(name)? {
                Some(child) => object = child,
                None => return Ok(None),
            }
        }
        Ok(Some(object))
    }
}

fn read_i32(root: &Group, index: u64, what: &str) -> Result<i32> {
    let data = root.data(index)?;
    let bytes: [u8; 4] = data
        .as_slice()
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| Error::InvalidArchive(format!("{} is missing", what)))?;
    Ok(i32::from_le_bytes(bytes))
}

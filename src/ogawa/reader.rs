//! Ogawa container reader
//!
//! The whole file is held in memory and shared between groups and data blocks,
//! so navigating the tree never copies payload bytes.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use super::{
    CURRENT_VERSION, FROZEN_FLAG, FROZEN_OFFSET, HEADER_SIZE, MAGIC, ROOT_POS_OFFSET,
    VERSION_OFFSET, extract_offset, is_data_offset,
};
use crate::error::{Error, Result};

/// An opened Ogawa container
#[derive(Clone)]
pub struct Container {
    bytes: Arc<[u8]>,
    version: u16,
    frozen: bool,
}

impl Container {
    /// Read a container from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(bytes)
    }

    /// Wrap an in-memory container, validating the header
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let bytes: Arc<[u8]> = bytes.into();
        if bytes.len() < HEADER_SIZE {
            return Err(Error::UnexpectedEof(bytes.len() as u64));
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(Error::InvalidMagic);
        }

        let frozen = bytes[FROZEN_OFFSET] == FROZEN_FLAG;
        let version = u16::from_be_bytes([bytes[VERSION_OFFSET], bytes[VERSION_OFFSET + 1]]);
        if version != CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(format!(
                "Ogawa container version {}",
                version
            )));
        }

        Ok(Self {
            bytes,
            version,
            frozen,
        })
    }

    /// Container format version
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Whether the writer finalized the file
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Total size in bytes
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Whether the container holds no bytes beyond an empty header
    pub fn is_empty(&self) -> bool {
        self.bytes.len() <= HEADER_SIZE
    }

    /// The root group named by the header
    pub fn root(&self) -> Result<Group> {
        let pos = read_u64(&self.bytes, ROOT_POS_OFFSET as u64)?;
        Group::load(self.bytes.clone(), pos)
    }
}

/// A group: an ordered list of child groups and data blocks
#[derive(Clone)]
pub struct Group {
    bytes: Arc<[u8]>,
    pos: u64,
    children: Vec<u64>,
}

impl Group {
    fn load(bytes: Arc<[u8]>, pos: u64) -> Result<Self> {
        if pos == 0 {
            return Ok(Self {
                bytes,
                pos,
                children: Vec::new(),
            });
        }

        let count = read_u64(&bytes, pos)?;
        // Reject counts the file cannot hold before allocating for them
        let end = count
            .checked_mul(8)
            .and_then(|n| n.checked_add(pos + 8))
            .ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > bytes.len() as u64 {
            return Err(Error::UnexpectedEof(end));
        }

        let children = (0..count)
            .map(|i| read_u64(&bytes, pos + 8 + i * 8))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            bytes,
            pos,
            children,
        })
    }

    /// A group with no children and no backing file
    pub fn empty() -> Self {
        Self {
            bytes: Arc::from(Vec::new()),
            pos: 0,
            children: Vec::new(),
        }
    }

    /// Position of this group in the file (0 for the empty group)
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Number of children
    pub fn num_children(&self) -> u64 {
        self.children.len() as u64
    }

    /// Whether the group has no children
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn child_offset(&self, index: u64) -> Result<u64> {
        self.children
            .get(index as usize)
            .copied()
            .ok_or(Error::ChildOutOfBounds {
                index,
                count: self.num_children(),
            })
    }

    /// Check if the child at `index` is a group
    pub fn is_child_group(&self, index: u64) -> Result<bool> {
        Ok(!is_data_offset(self.child_offset(index)?))
    }

    /// Check if the child at `index` is a data block
    pub fn is_child_data(&self, index: u64) -> Result<bool> {
        Ok(is_data_offset(self.child_offset(index)?))
    }

    /// Open the child group at `index`
    pub fn group(&self, index: u64) -> Result<Group> {
        let offset = self.child_offset(index)?;
        if is_data_offset(offset) {
            return Err(Error::TypeMismatch {
                expected: "group",
                actual: "data",
            });
        }
        Group::load(self.bytes.clone(), extract_offset(offset))
    }

    /// Open the child data block at `index`
    pub fn data(&self, index: u64) -> Result<Data> {
        let offset = self.child_offset(index)?;
        if !is_data_offset(offset) {
            return Err(Error::TypeMismatch {
                expected: "data",
                actual: "group",
            });
        }
        Data::load(self.bytes.clone(), extract_offset(offset))
    }
}

/// A length-prefixed data block
#[derive(Clone)]
pub struct Data {
    bytes: Arc<[u8]>,
    pos: u64,
    size: u64,
}

impl Data {
    fn load(bytes: Arc<[u8]>, pos: u64) -> Result<Self> {
        if pos == 0 {
            return Ok(Self {
                bytes,
                pos,
                size: 0,
            });
        }

        let size = read_u64(&bytes, pos)?;
        let end = size
            .checked_add(pos + 8)
            .ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > bytes.len() as u64 {
            return Err(Error::UnexpectedEof(end));
        }

        Ok(Self { bytes, pos, size })
    }

    /// Position of the block in the file (0 for empty data)
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Payload size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Borrow the payload
    pub fn as_slice(&self) -> &[u8] {
        if self.size == 0 {
            return &[];
        }
        let start = (self.pos + 8) as usize;
        &self.bytes[start..start + self.size as usize]
    }
}

fn read_u64(bytes: &[u8], pos: u64) -> Result<u64> {
    let start = pos as usize;
    bytes
        .get(start..start.saturating_add(8))
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or(Error::UnexpectedEof(pos.saturating_add(8)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ogawa::{data_offset, group_offset};

    fn header(root_pos: u64) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(FROZEN_FLAG);
        bytes.extend_from_slice(&CURRENT_VERSION.to_be_bytes());
        bytes.extend_from_slice(&root_pos.to_le_bytes());
        bytes
    }

    #[test]
    fn test_header_parsing() {
        let container = Container::from_bytes(header(0)).unwrap();
        assert_eq!(container.version(), 1);
        assert!(container.is_frozen());
        assert!(container.root().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = header(0);
        bytes[0] = b'X';
        assert!(matches!(
            Container::from_bytes(bytes),
            Err(Error::InvalidMagic)
        ));
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            Container::from_bytes(b"Ogawa".to_vec()),
            Err(Error::UnexpectedEof(5))
        ));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = header(0);
        bytes[VERSION_OFFSET + 1] = 2;
        assert!(matches!(
            Container::from_bytes(bytes),
            Err(Error::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_group_and_data_navigation() {
        // header | data "abc" @16 | root group @27
        let mut bytes = header(27);
        bytes.extend_from_slice(&3u64.to_le_bytes());
        bytes.extend_from_slice(b"abc");
        bytes.extend_from_slice(&2u64.to_le_bytes());
        bytes.extend_from_slice(&data_offset(16).to_le_bytes());
        bytes.extend_from_slice(&group_offset(0).to_le_bytes());

        let container = Container::from_bytes(bytes).unwrap();
        let root = container.root().unwrap();
        assert_eq!(root.num_children(), 2);
        assert!(root.is_child_data(0).unwrap());
        assert!(root.is_child_group(1).unwrap());
        assert_eq!(root.data(0).unwrap().as_slice(), b"abc");
        assert!(root.group(1).unwrap().is_empty());

        assert!(matches!(root.group(0), Err(Error::TypeMismatch { .. })));
        assert!(matches!(root.data(1), Err(Error::TypeMismatch { .. })));
        assert!(matches!(
            root.data(2),
            Err(Error::ChildOutOfBounds { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_oversized_child_count_is_rejected() {
        let mut bytes = header(16);
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        let container = Container::from_bytes(bytes).unwrap();
        assert!(matches!(container.root(), Err(Error::UnexpectedEof(_))));
    }

    #[test]
    fn test_truncated_data_block() {
        // root group @16 with one data child @32 claiming 100 bytes
        let mut bytes = header(16);
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&data_offset(32).to_le_bytes());
        bytes.extend_from_slice(&100u64.to_le_bytes());
        bytes.extend_from_slice(b"short");

        let root = Container::from_bytes(bytes).unwrap().root().unwrap();
        assert!(matches!(root.data(0), Err(Error::UnexpectedEof(140))));
    }
}

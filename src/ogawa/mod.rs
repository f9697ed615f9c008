//! Ogawa container handling
//!
//! Ogawa is the binary container underneath modern Alembic archives. A file is
//! a 16-byte header followed by a tree of *groups* (lists of child offsets) and
//! *data* blocks (length-prefixed byte strings). The Alembic layer in
//! [`crate::archive`] gives those groups and blocks their meaning.

mod reader;
mod writer;

pub use reader::{Container, Data, Group};
pub use writer::{ContainerWriter, SAMPLE_KEY_SIZE};

/// Magic bytes at the start of every Ogawa file
pub const MAGIC: &[u8; 5] = b"Ogawa";

/// Size of the file header in bytes
pub const HEADER_SIZE: usize = 16;

/// Offset of the frozen flag in the header
pub const FROZEN_OFFSET: usize = 5;

/// Offset of the big-endian format version in the header
pub const VERSION_OFFSET: usize = 6;

/// Offset of the root group position in the header
pub const ROOT_POS_OFFSET: usize = 8;

/// The only container version in existence
pub const CURRENT_VERSION: u16 = 1;

/// Frozen flag value of a finalized archive
pub const FROZEN_FLAG: u8 = 0xFF;

/// Child offsets with this bit set point at data, otherwise at a group
pub const DATA_FLAG: u64 = 1 << 63;

/// Mask extracting the file position from a child offset
pub const OFFSET_MASK: u64 = !DATA_FLAG;

/// Check if a child offset refers to a data block
#[inline]
pub const fn is_data_offset(offset: u64) -> bool {
    offset & DATA_FLAG != 0
}

/// Extract the file position from a child offset
#[inline]
pub const fn extract_offset(offset: u64) -> u64 {
    offset & OFFSET_MASK
}

/// Child offset for a group written at `pos` (0 is the empty group)
#[inline]
pub const fn group_offset(pos: u64) -> u64 {
    pos & OFFSET_MASK
}

/// Child offset for a data block written at `pos` (0 is empty data)
#[inline]
pub const fn data_offset(pos: u64) -> u64 {
    pos | DATA_FLAG
}

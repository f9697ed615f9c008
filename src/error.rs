//! Error types for archive reading and transform dumping
//!
//! Every error carries a code for categorization, in the form `E<category><number>`.
//!
//! Categories:
//! - **E1xxx**: I/O and Ogawa container errors
//! - **E2xxx**: Alembic archive structure errors
//! - **E3xxx**: Sample and schema errors
//!
//! ## Error Codes
//!
//! - `E1001`: I/O error reading or writing a file
//! - `E1002`: Missing `Ogawa` magic
//! - `E1003`: Unsupported container or archive version
//! - `E1004`: Read past the end of the archive
//! - `E1005`: Group/data type mismatch
//! - `E1006`: Child index out of bounds
//! - `E2001`: Invalid archive layout
//! - `E2002`: Invalid object or property header
//! - `E2003`: Invalid UTF-8 in a name or metadata string
//! - `E2004`: Object hierarchy loops back on itself
//! - `E3001`: Sample index out of range
//! - `E3002`: Unknown transform operation encoding
//! - `E3003`: Malformed sample payload
//! - `E3004`: Object is not a transform

use std::io;
use thiserror::Error;

/// Result type for archive operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when reading archives and dumping transforms
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred while reading or writing a file
    ///
    /// **Error Code**: E1001
    ///
    /// **Common Causes**:
    /// - File not found
    /// - Insufficient permissions
    #[error("[E1001] I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file does not start with the Ogawa magic bytes
    ///
    /// **Error Code**: E1002
    ///
    /// **Common Causes**:
    /// - HDF5-based Alembic file (not supported)
    /// - Not an Alembic file at all
    ///
    /// **Suggestions**:
    /// - Re-export the archive with the Ogawa backend
    #[error("[E1002] Invalid magic: not an Ogawa archive")]
    InvalidMagic,

    /// Container or archive version is not one this reader understands
    ///
    /// **Error Code**: E1003
    #[error("[E1003] Unsupported version: {0}")]
    UnsupportedVersion(String),

    /// A read would run past the end of the archive
    ///
    /// **Error Code**: E1004
    ///
    /// **Common Causes**:
    /// - Truncated file (interrupted copy or write)
    /// - Corrupted child offsets
    #[error("[E1004] Unexpected end of archive at byte {0}")]
    UnexpectedEof(u64),

    /// A group child was expected to be data, or the other way around
    ///
    /// **Error Code**: E1005
    #[error("[E1005] Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// What the caller asked for
        expected: &'static str,
        /// What the container actually holds
        actual: &'static str,
    },

    /// Child index past the group's child count
    ///
    /// **Error Code**: E1006
    #[error("[E1006] Child index {index} out of bounds (group has {count} children)")]
    ChildOutOfBounds {
        /// Requested index
        index: u64,
        /// Number of children in the group
        count: u64,
    },

    /// The archive's top-level layout is not a valid Alembic archive
    ///
    /// **Error Code**: E2001
    ///
    /// **Common Causes**:
    /// - Ogawa container written by a tool other than Alembic
    /// - Archive that was never finalized
    #[error("[E2001] Invalid archive: {0}")]
    InvalidArchive(String),

    /// An object or property header block could not be decoded
    ///
    /// **Error Code**: E2002
    #[error("[E2002] Invalid header: {0}")]
    InvalidHeader(String),

    /// A name or metadata string is not valid UTF-8
    ///
    /// **Error Code**: E2003
    #[error("[E2003] Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A child object's group is one of its own ancestors
    ///
    /// **Error Code**: E2004
    ///
    /// **Common Causes**:
    /// - Corrupted child offsets pointing back up the hierarchy
    #[error("[E2004] Cyclic hierarchy: {0} contains its own ancestor")]
    CyclicHierarchy(String),

    /// Requested sample does not exist
    ///
    /// **Error Code**: E3001
    #[error("[E3001] Sample {index} out of range for '{property}' ({count} samples)")]
    SampleOutOfRange {
        /// Property name
        property: String,
        /// Requested index
        index: usize,
        /// Number of samples the property holds
        count: usize,
    },

    /// A transform operation byte has an unknown type nibble
    ///
    /// **Error Code**: E3002
    #[error("[E3002] Invalid transform operation encoding 0x{0:02X}")]
    InvalidXformOp(u8),

    /// A sample payload has the wrong size or layout
    ///
    /// **Error Code**: E3003
    ///
    /// **Common Causes**:
    /// - `.vals` holds fewer values than the ops need
    /// - Scalar payload shorter than its declared extent
    #[error("[E3003] Invalid data: {0}")]
    InvalidData(String),

    /// Object does not carry the transform schema
    ///
    /// **Error Code**: E3004
    #[error("[E3004] Object '{0}' is not a transform")]
    NotAnXform(String),
}

impl Error {
    /// Create an InvalidHeader error naming the block being decoded
    ///
    /// # Arguments
    /// * `block` - Which header block failed (e.g. "object headers")
    /// * `message` - Description of the problem
    pub fn invalid_header(block: &str, message: &str) -> Self {
        Error::InvalidHeader(format!("{}: {}", block, message))
    }

    /// Create an InvalidData error for a property payload
    pub fn invalid_data(property: &str, message: impl std::fmt::Display) -> Self {
        Error::InvalidData(format!("property '{}': {}", property, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_in_messages() {
        let io_err = Error::Io(io::Error::new(io::ErrorKind::NotFound, "test"));
        assert!(io_err.to_string().contains("[E1001]"));

        assert!(Error::InvalidMagic.to_string().contains("[E1002]"));
        assert!(Error::UnexpectedEof(42).to_string().contains("byte 42"));

        let op = Error::InvalidXformOp(0x70);
        assert!(op.to_string().contains("[E3002]"));
        assert!(op.to_string().contains("0x70"));

        let out_of_range = Error::SampleOutOfRange {
            property: ".vals".to_string(),
            index: 5,
            count: 2,
        };
        assert!(out_of_range.to_string().contains("[E3001]"));
        assert!(out_of_range.to_string().contains(".vals"));
    }

    #[test]
    fn test_invalid_header_helper() {
        let err = Error::invalid_header("property headers", "name truncated");
        assert!(err.to_string().contains("[E2002]"));
        assert!(err.to_string().contains("property headers: name truncated"));
    }

    #[test]
    fn test_invalid_data_helper() {
        let err = Error::invalid_data(".vals", "expected 16 values, found 3");
        assert!(err.to_string().contains("[E3003]"));
        assert!(err.to_string().contains("'.vals'"));
    }

    #[test]
    fn test_utf8_conversion() {
        let bytes = vec![0xffu8, 0xfe];
        let utf8_err = std::str::from_utf8(&bytes).unwrap_err();
        let err = Error::from(utf8_err);
        assert!(err.to_string().contains("[E2003]"));
    }

    #[test]
    fn test_cyclic_hierarchy_message() {
        let err = Error::CyclicHierarchy("/a/b".to_string());
        assert!(err.to_string().starts_with("[E2004]"));
        assert!(err.to_string().contains("/a/b"));
    }
}

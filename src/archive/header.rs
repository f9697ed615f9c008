//! Object and property header blocks
//!
//! Each object stores the headers of its children in one data block, and each
//! compound property stores the headers of its sub-properties in another. Both
//! use compact variable-width encodings; this module decodes them and, for the
//! writer, encodes them again.

use super::metadata::MetaData;
use crate::error::{Error, Result};

/// Metadata index meaning "stored inline after the header"
pub(crate) const INLINE_METADATA: u8 = 0xFF;

/// Trailing hash bytes after the object headers (data hash + children hash)
pub(crate) const OBJECT_HEADERS_HASH_SIZE: usize = 32;

/// Plain-old-data element type of a scalar or array property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pod {
    /// 1-byte boolean
    Boolean,
    /// u8
    Uint8,
    /// i8
    Int8,
    /// u16
    Uint16,
    /// i16
    Int16,
    /// u32
    Uint32,
    /// i32
    Int32,
    /// u64
    Uint64,
    /// i64
    Int64,
    /// IEEE half
    Float16,
    /// f32
    Float32,
    /// f64
    Float64,
    /// Null-terminated narrow string
    String,
    /// Null-terminated wide string
    Wstring,
    /// No element type (compound properties)
    Unknown,
}

impl Pod {
    /// Decode the 4-bit on-disk code
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Pod::Boolean,
            1 => Pod::Uint8,
            2 => Pod::Int8,
            3 => Pod::Uint16,
            4 => Pod::Int16,
            5 => Pod::Uint32,
            6 => Pod::Int32,
            7 => Pod::Uint64,
            8 => Pod::Int64,
            9 => Pod::Float16,
            10 => Pod::Float32,
            11 => Pod::Float64,
            12 => Pod::String,
            13 => Pod::Wstring,
            _ => return None,
        })
    }

    /// The 4-bit on-disk code
    pub fn code(self) -> u8 {
        match self {
            Pod::Boolean => 0,
            Pod::Uint8 => 1,
            Pod::Int8 => 2,
            Pod::Uint16 => 3,
            Pod::Int16 => 4,
            Pod::Uint32 => 5,
            Pod::Int32 => 6,
            Pod::Uint64 => 7,
            Pod::Int64 => 8,
            Pod::Float16 => 9,
            Pod::Float32 => 10,
            Pod::Float64 => 11,
            Pod::String => 12,
            Pod::Wstring => 13,
            Pod::Unknown => 127,
        }
    }

    /// Lower-case name used in messages
    pub fn name(self) -> &'static str {
        match self {
            Pod::Boolean => "bool",
            Pod::Uint8 => "uint8",
            Pod::Int8 => "int8",
            Pod::Uint16 => "uint16",
            Pod::Int16 => "int16",
            Pod::Uint32 => "uint32",
            Pod::Int32 => "int32",
            Pod::Uint64 => "uint64",
            Pod::Int64 => "int64",
            Pod::Float16 => "float16",
            Pod::Float32 => "float32",
            Pod::Float64 => "float64",
            Pod::String => "string",
            Pod::Wstring => "wstring",
            Pod::Unknown => "unknown",
        }
    }

    /// Size of one element in bytes, or `None` for variable-length strings
    pub fn size(self) -> Option<usize> {
        match self {
            Pod::Boolean | Pod::Uint8 | Pod::Int8 => Some(1),
            Pod::Uint16 | Pod::Int16 | Pod::Float16 => Some(2),
            Pod::Uint32 | Pod::Int32 | Pod::Float32 => Some(4),
            Pod::Uint64 | Pod::Int64 | Pod::Float64 => Some(8),
            Pod::String | Pod::Wstring | Pod::Unknown => None,
        }
    }
}

/// Element type plus extent (e.g. `Float64 × 3` for a point)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType {
    /// Element type
    pub pod: Pod,
    /// Number of elements per value
    pub extent: u8,
}

impl DataType {
    /// Data type of compound properties
    pub const UNKNOWN: DataType = DataType {
        pod: Pod::Unknown,
        extent: 0,
    };

    /// Create a data type
    pub fn new(pod: Pod, extent: u8) -> Self {
        Self { pod, extent }
    }

    /// Bytes per value, or `None` for string types
    pub fn byte_size(&self) -> Option<usize> {
        self.pod.size().map(|s| s * self.extent as usize)
    }
}

/// Kind of property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    /// Holds sub-properties
    Compound,
    /// One fixed-size value per sample
    Scalar,
    /// A variable-length array per sample
    Array,
}

impl PropertyKind {
    fn describe(self) -> &'static str {
        match self {
            PropertyKind::Compound => "compound property",
            PropertyKind::Scalar => "scalar property",
            PropertyKind::Array => "array property",
        }
    }
}

/// Header of an object (as stored by its parent)
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectHeader {
    /// Object name, unique among its siblings
    pub name: String,
    /// Slash-separated path from the archive root
    pub full_name: String,
    /// Object metadata; carries the schema
    pub metadata: MetaData,
}

impl ObjectHeader {
    /// Header of the archive's root object
    pub fn root() -> Self {
        Self {
            name: "ABC".to_string(),
            full_name: "/".to_string(),
            metadata: MetaData::new(),
        }
    }

    fn child_of(parent_full_name: &str, name: String, metadata: MetaData) -> Self {
        let full_name = if parent_full_name.is_empty() || parent_full_name == "/" {
            format!("/{}", name)
        } else {
            format!("{}/{}", parent_full_name, name)
        };
        Self {
            name,
            full_name,
            metadata,
        }
    }
}

/// Header of a property (as stored by its parent compound)
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyHeader {
    /// Property name
    pub name: String,
    /// Compound, scalar or array
    pub kind: PropertyKind,
    /// Property metadata
    pub metadata: MetaData,
    /// Element type (`DataType::UNKNOWN` for compounds)
    pub data_type: DataType,
    /// Index into the archive's time samplings
    pub time_sampling_index: u32,
    /// Number of samples set on the property
    pub num_samples: u32,
    /// First sample that differs from sample 0 (0 when constant)
    pub first_changed_index: u32,
    /// Last sample that differs from its predecessor (0 when constant)
    pub last_changed_index: u32,
    /// Whether every array sample has the same dimensions
    pub is_homogenous: bool,
}

impl PropertyHeader {
    /// Header for a compound property
    pub fn compound(name: impl Into<String>, metadata: MetaData) -> Self {
        Self {
            name: name.into(),
            kind: PropertyKind::Compound,
            metadata,
            data_type: DataType::UNKNOWN,
            time_sampling_index: 0,
            num_samples: 0,
            first_changed_index: 0,
            last_changed_index: 0,
            is_homogenous: false,
        }
    }

    /// Header for a scalar property with no samples yet
    pub fn scalar(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            kind: PropertyKind::Scalar,
            data_type,
            is_homogenous: true,
            ..Self::compound(name, MetaData::new())
        }
    }

    /// Whether every sample equals sample 0
    pub fn is_constant(&self) -> bool {
        self.first_changed_index == 0 && self.last_changed_index == 0
    }

    /// Map a sample index onto the child that stores it
    ///
    /// Samples after the last change reuse the last changed sample and samples
    /// before the first change reuse sample 0.
    pub fn sample_child_index(&self, index: usize) -> Result<usize> {
        if index >= self.num_samples as usize {
            return Err(Error::SampleOutOfRange {
                property: self.name.clone(),
                index,
                count: self.num_samples as usize,
            });
        }
        let last = self.last_changed_index as usize;
        let first = self.first_changed_index as usize;
        Ok(if index > last {
            last
        } else if index < first {
            0
        } else {
            index
        })
    }

    /// Error for asking this property to be something it is not
    pub(crate) fn kind_mismatch(&self, expected: PropertyKind) -> Error {
        Error::TypeMismatch {
            expected: expected.describe(),
            actual: self.kind.describe(),
        }
    }
}

/// Bounds-checked reader over one header block
struct HeaderCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    block: &'static str,
}

impl<'a> HeaderCursor<'a> {
    fn new(buf: &'a [u8], block: &'static str) -> Self {
        Self { buf, pos: 0, block }
    }

    fn is_done(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn bytes(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let slice = self
            .pos
            .checked_add(len)
            .and_then(|end| self.buf.get(self.pos..end))
            .ok_or_else(|| Error::invalid_header(self.block, &format!("{} truncated", what)))?;
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.bytes(1, what)?[0])
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.bytes(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn with_hint(&mut self, hint: u32, what: &str) -> Result<u32> {
        match hint {
            0 => Ok(self.u8(what)? as u32),
            1 => {
                let b = self.bytes(2, what)?;
                Ok(u16::from_le_bytes([b[0], b[1]]) as u32)
            }
            2 => self.u32(what),
            _ => Err(Error::invalid_header(self.block, "invalid size hint")),
        }
    }

    fn string(&mut self, len: usize, what: &str) -> Result<String> {
        Ok(std::str::from_utf8(self.bytes(len, what)?)?.to_string())
    }

    fn metadata(&mut self, len: usize) -> Result<MetaData> {
        Ok(MetaData::parse(std::str::from_utf8(
            self.bytes(len, "metadata")?,
        )?))
    }
}

fn lookup_metadata(indexed: &[MetaData], index: u8, block: &'static str) -> Result<MetaData> {
    indexed.get(index as usize).cloned().ok_or_else(|| {
        Error::invalid_header(block, &format!("metadata index {} out of range", index))
    })
}

/// Decode the archive's indexed metadata table; entry 0 is always empty
pub(crate) fn read_indexed_metadata(buf: &[u8]) -> Result<Vec<MetaData>> {
    let mut table = vec![MetaData::new()];
    let mut cursor = HeaderCursor::new(buf, "indexed metadata");
    while !cursor.is_done() {
        let len = cursor.u8("entry size")? as usize;
        table.push(cursor.metadata(len)?);
    }
    Ok(table)
}

/// Encode an indexed metadata table (entry 0 is implied and skipped)
pub(crate) fn write_indexed_metadata(table: &[MetaData]) -> Vec<u8> {
    let mut buf = Vec::new();
    for metadata in table.iter().skip(1) {
        let text = metadata.serialize();
        buf.push(text.len() as u8);
        buf.extend_from_slice(text.as_bytes());
    }
    buf
}

/// Decode the child headers of an object whose full path is `parent_full_name`
pub(crate) fn read_object_headers(
    buf: &[u8],
    parent_full_name: &str,
    indexed: &[MetaData],
) -> Result<Vec<ObjectHeader>> {
    const BLOCK: &str = "object headers";
    if buf.len() <= OBJECT_HEADERS_HASH_SIZE {
        return Ok(Vec::new());
    }

    let mut cursor = HeaderCursor::new(&buf[..buf.len() - OBJECT_HEADERS_HASH_SIZE], BLOCK);
    let mut headers = Vec::new();
    while !cursor.is_done() {
        let name_len = cursor.u32("name size")? as usize;
        if name_len == 0 {
            return Err(Error::invalid_header(BLOCK, "empty object name"));
        }
        let name = cursor.string(name_len, "name")?;
        let metadata_index = cursor.u8("metadata index")?;
        let metadata = if metadata_index == INLINE_METADATA {
            let len = cursor.u32("metadata size")? as usize;
            cursor.metadata(len)?
        } else {
            lookup_metadata(indexed, metadata_index, BLOCK)?
        };
        headers.push(ObjectHeader::child_of(parent_full_name, name, metadata));
    }
    Ok(headers)
}

/// Encode one child object header
pub(crate) fn write_object_header(buf: &mut Vec<u8>, header: &ObjectHeader, metadata_index: u8) {
    buf.extend_from_slice(&(header.name.len() as u32).to_le_bytes());
    buf.extend_from_slice(header.name.as_bytes());
    buf.push(metadata_index);
    if metadata_index == INLINE_METADATA {
        let text = header.metadata.serialize();
        buf.extend_from_slice(&(text.len() as u32).to_le_bytes());
        buf.extend_from_slice(text.as_bytes());
    }
}

// Property info word layout
const KIND_MASK: u32 = 0x0003;
const SIZE_HINT_MASK: u32 = 0x000c;
const POD_MASK: u32 = 0x00f0;
const HAS_TIME_SAMPLING: u32 = 0x0100;
const HAS_CHANGE_INDICES: u32 = 0x0200;
const IS_HOMOGENOUS: u32 = 0x0400;
const IS_CONSTANT: u32 = 0x0800;
const EXTENT_MASK: u32 = 0x000f_f000;
const METADATA_MASK: u32 = 0x0ff0_0000;

/// Decode the sub-property headers of a compound property
pub(crate) fn read_property_headers(buf: &[u8], indexed: &[MetaData]) -> Result<Vec<PropertyHeader>> {
    const BLOCK: &str = "property headers";
    let mut cursor = HeaderCursor::new(buf, BLOCK);
    let mut headers = Vec::new();

    while !cursor.is_done() {
        let info = cursor.u32("info")?;
        let hint = (info & SIZE_HINT_MASK) >> 2;
        let kind = match info & KIND_MASK {
            0 => PropertyKind::Compound,
            1 => PropertyKind::Scalar,
            _ => PropertyKind::Array,
        };

        let mut header = PropertyHeader::compound(String::new(), MetaData::new());
        header.kind = kind;

        if kind != PropertyKind::Compound {
            let pod_code = ((info & POD_MASK) >> 4) as u8;
            let pod = Pod::from_code(pod_code).ok_or_else(|| {
                Error::invalid_header(BLOCK, &format!("invalid POD code {}", pod_code))
            })?;
            header.data_type = DataType::new(pod, ((info & EXTENT_MASK) >> 12) as u8);
            header.is_homogenous = info & IS_HOMOGENOUS != 0;
            header.num_samples = cursor.with_hint(hint, "sample count")?;

            if info & HAS_CHANGE_INDICES != 0 {
                header.first_changed_index = cursor.with_hint(hint, "first changed index")?;
                header.last_changed_index = cursor.with_hint(hint, "last changed index")?;
            } else if info & IS_CONSTANT != 0 {
                header.first_changed_index = 0;
                header.last_changed_index = 0;
            } else {
                header.first_changed_index = 1;
                header.last_changed_index = header.num_samples.saturating_sub(1);
            }

            if info & HAS_TIME_SAMPLING != 0 {
                header.time_sampling_index = cursor.with_hint(hint, "time sampling index")?;
            }
        }

        let name_len = cursor.with_hint(hint, "name size")? as usize;
        if name_len == 0 {
            return Err(Error::invalid_header(BLOCK, "empty property name"));
        }
        header.name = cursor.string(name_len, "name")?;

        let metadata_index = ((info & METADATA_MASK) >> 20) as u8;
        header.metadata = if metadata_index == INLINE_METADATA {
            let len = cursor.with_hint(hint, "metadata size")? as usize;
            cursor.metadata(len)?
        } else {
            lookup_metadata(indexed, metadata_index, BLOCK)?
        };

        headers.push(header);
    }

    Ok(headers)
}

fn size_hint_for(max_value: usize) -> u32 {
    if max_value < 256 {
        0
    } else if max_value < 65536 {
        1
    } else {
        2
    }
}

fn push_with_hint(buf: &mut Vec<u8>, value: u32, hint: u32) {
    match hint {
        0 => buf.push(value as u8),
        1 => buf.extend_from_slice(&(value as u16).to_le_bytes()),
        _ => buf.extend_from_slice(&value.to_le_bytes()),
    }
}

/// Encode one property header
pub(crate) fn write_property_header(buf: &mut Vec<u8>, header: &PropertyHeader, metadata_index: u8) {
    let inline_metadata = (metadata_index == INLINE_METADATA).then(|| header.metadata.serialize());
    let hint = size_hint_for(
        [
            header.name.len(),
            inline_metadata.as_ref().map_or(0, String::len),
            header.num_samples as usize,
            header.time_sampling_index as usize,
        ]
        .into_iter()
        .max()
        .unwrap_or(0),
    );

    let mut info = (hint << 2) | ((metadata_index as u32) << 20);
    let has_change_indices = header.kind != PropertyKind::Compound
        && !header.is_constant()
        && (header.first_changed_index != 1
            || header.last_changed_index != header.num_samples.saturating_sub(1));

    match header.kind {
        PropertyKind::Compound => {}
        PropertyKind::Scalar | PropertyKind::Array => {
            info |= if header.kind == PropertyKind::Scalar { 1 } else { 2 };
            info |= (header.data_type.pod.code() as u32 & 0x0f) << 4;
            info |= (header.data_type.extent as u32) << 12;
            if header.is_homogenous {
                info |= IS_HOMOGENOUS;
            }
            if header.time_sampling_index != 0 {
                info |= HAS_TIME_SAMPLING;
            }
            if header.is_constant() {
                info |= IS_CONSTANT;
            } else if has_change_indices {
                info |= HAS_CHANGE_INDICES;
            }
        }
    }
    buf.extend_from_slice(&info.to_le_bytes());

    if header.kind != PropertyKind::Compound {
        push_with_hint(buf, header.num_samples, hint);
        if has_change_indices {
            push_with_hint(buf, header.first_changed_index, hint);
            push_with_hint(buf, header.last_changed_index, hint);
        }
        if header.time_sampling_index != 0 {
            push_with_hint(buf, header.time_sampling_index, hint);
        }
    }

    push_with_hint(buf, header.name.len() as u32, hint);
    buf.extend_from_slice(header.name.as_bytes());

    if let Some(text) = inline_metadata {
        push_with_hint(buf, text.len() as u32, hint);
        buf.extend_from_slice(text.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animated_vals() -> PropertyHeader {
        let mut header = PropertyHeader::scalar(".vals", DataType::new(Pod::Float64, 9));
        header.num_samples = 10;
        header.first_changed_index = 1;
        header.last_changed_index = 9;
        header.time_sampling_index = 1;
        header
    }

    #[test]
    fn test_sample_child_index_mapping() {
        let mut header = PropertyHeader::scalar(".vals", DataType::new(Pod::Float64, 3));
        header.num_samples = 10;
        header.first_changed_index = 3;
        header.last_changed_index = 6;

        assert_eq!(header.sample_child_index(0).unwrap(), 0);
        assert_eq!(header.sample_child_index(2).unwrap(), 0);
        assert_eq!(header.sample_child_index(4).unwrap(), 4);
        assert_eq!(header.sample_child_index(9).unwrap(), 6);
        assert!(matches!(
            header.sample_child_index(10),
            Err(Error::SampleOutOfRange { count: 10, .. })
        ));
    }

    #[test]
    fn test_property_headers_decode_what_was_encoded() {
        let mut constant = PropertyHeader::scalar(".ops", DataType::new(Pod::Uint8, 2));
        constant.num_samples = 1;

        let mut sparse = animated_vals();
        sparse.name = "sparse".to_string();
        sparse.first_changed_index = 4;

        let xform = PropertyHeader::compound(
            ".xform",
            MetaData::new().with("schema", "AbcGeom_Xform_v3"),
        );

        let mut buf = Vec::new();
        write_property_header(&mut buf, &xform, INLINE_METADATA);
        write_property_header(&mut buf, &constant, 0);
        write_property_header(&mut buf, &animated_vals(), 0);
        write_property_header(&mut buf, &sparse, 0);

        let decoded = read_property_headers(&buf, &[MetaData::new()]).unwrap();
        assert_eq!(decoded, vec![xform, constant, animated_vals(), sparse]);
    }

    #[test]
    fn test_large_sample_counts_widen_the_size_hint() {
        let mut header = animated_vals();
        header.num_samples = 70_000;
        header.last_changed_index = 69_999;

        let mut buf = Vec::new();
        write_property_header(&mut buf, &header, 0);
        let info = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        assert_eq!((info & SIZE_HINT_MASK) >> 2, 2);
        assert_eq!(read_property_headers(&buf, &[MetaData::new()]).unwrap()[0], header);
    }

    #[test]
    fn test_object_headers_with_indexed_and_inline_metadata() {
        let indexed = vec![
            MetaData::new(),
            MetaData::parse("schema=AbcGeom_Xform_v3"),
        ];
        let first = ObjectHeader {
            name: "a".to_string(),
            full_name: "/a".to_string(),
            metadata: indexed[1].clone(),
        };
        let second = ObjectHeader {
            name: "b".to_string(),
            full_name: "/b".to_string(),
            metadata: MetaData::parse("schema=Other"),
        };

        let mut buf = Vec::new();
        write_object_header(&mut buf, &first, 1);
        write_object_header(&mut buf, &second, INLINE_METADATA);
        buf.extend_from_slice(&[0u8; OBJECT_HEADERS_HASH_SIZE]);

        let decoded = read_object_headers(&buf, "/", &indexed).unwrap();
        assert_eq!(decoded, vec![first, second]);

        let nested = read_object_headers(&buf, "/root", &indexed).unwrap();
        assert_eq!(nested[0].full_name, "/root/a");
    }

    #[test]
    fn test_object_headers_reject_bad_metadata_index() {
        let header = ObjectHeader::root();
        let mut buf = Vec::new();
        write_object_header(&mut buf, &header, 7);
        buf.extend_from_slice(&[0u8; OBJECT_HEADERS_HASH_SIZE]);
        assert!(matches!(
            read_object_headers(&buf, "/", &[MetaData::new()]),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_truncated_property_header() {
        let mut buf = Vec::new();
        write_property_header(&mut buf, &animated_vals(), 0);
        buf.pop();
        assert!(matches!(
            read_property_headers(&buf, &[MetaData::new()]),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_indexed_metadata_table() {
        let table = vec![
            MetaData::new(),
            MetaData::parse("schema=AbcGeom_Xform_v3"),
            MetaData::parse("interpretation=box"),
        ];
        assert_eq!(read_indexed_metadata(&write_indexed_metadata(&table)).unwrap(), table);
        assert_eq!(read_indexed_metadata(&[]).unwrap(), vec![MetaData::new()]);
    }
}

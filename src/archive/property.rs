//! Compound, scalar and array properties

use std::sync::Arc;

use super::ArchiveContext;
use super::header::{DataType, Pod, PropertyHeader, PropertyKind, read_property_headers};
use super::metadata::MetaData;
use crate::error::{Error, Result};
use crate::ogawa::{Group, SAMPLE_KEY_SIZE};

/// A property of any kind
pub enum Property {
    /// Holds sub-properties
    Compound(CompoundProperty),
    /// One value per sample
    Scalar(ScalarProperty),
    /// One array per sample
    Array(ArrayProperty),
}

impl Property {
    /// Header of the wrapped property
    pub fn header(&self) -> &PropertyHeader {
        match self {
            Property::Compound(p) => &p.header,
            Property::Scalar(p) => &p.header,
            Property::Array(p) => &p.header,
        }
    }
}

/// A property that groups other properties
///
/// Sub-property `i` lives in group child `i`; the last child holds their headers.
pub struct CompoundProperty {
    header: PropertyHeader,
    group: Group,
    children: Vec<PropertyHeader>,
    ctx: Arc<ArchiveContext>,
}

impl CompoundProperty {
    pub(crate) fn load(header: PropertyHeader, group: Group, ctx: Arc<ArchiveContext>) -> Result<Self> {
        let count = group.num_children();
        let children = if count > 0 && group.is_child_data(count - 1)? {
            read_property_headers(group.data(count - 1)?.as_slice(), &ctx.indexed_metadata)?
        } else {
            Vec::new()
        };

        if count > 0 && children.len() as u64 > count - 1 {
            return Err(Error::InvalidArchive(format!(
                "compound '{}' lists {} properties but stores {}",
                header.name,
                children.len(),
                count - 1
            )));
        }

        Ok(Self {
            header,
            group,
            children,
            ctx,
        })
    }

    /// This compound's header
    pub fn header(&self) -> &PropertyHeader {
        &self.header
    }

    /// Property name (empty for an object's top compound)
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Property metadata
    pub fn metadata(&self) -> &MetaData {
        &self.header.metadata
    }

    /// Number of sub-properties
    pub fn num_properties(&self) -> usize {
        self.children.len()
    }

    /// Headers of all sub-properties, in storage order
    pub fn property_headers(&self) -> &[PropertyHeader] {
        &self.children
    }

    /// Header of the sub-property called `name`
    pub fn property_header(&self, name: &str) -> Option<&PropertyHeader> {
        self.children.iter().find(|h| h.name == name)
    }

    /// Whether a sub-property called `name` exists
    pub fn has_property(&self, name: &str) -> bool {
        self.property_header(name).is_some()
    }

    /// Open the sub-property at `index`
    pub fn property_at(&self, index: usize) -> Result<Property> {
        let header = self
            .children
            .get(index)
            .cloned()
            .ok_or(Error::ChildOutOfBounds {
                index: index as u64,
                count: self.children.len() as u64,
            })?;
        let group = self.group.group(index as u64)?;

        Ok(match header.kind {
            PropertyKind::Compound => {
                Property::Compound(CompoundProperty::load(header, group, self.ctx.clone())?)
            }
            PropertyKind::Scalar => Property::Scalar(ScalarProperty { header, group }),
            PropertyKind::Array => Property::Array(ArrayProperty { header, group }),
        })
    }

    /// Open the sub-property called `name`, if present
    pub fn property(&self, name: &str) -> Result<Option<Property>> {
        match self.children.iter().position(|h| h.name == name) {
            Some(index) => self.property_at(index).map(Some),
            None => Ok(None),
        }
    }

    fn require(&self, name: &str, kind: PropertyKind) -> Result<Property> {
        let property = self
            .property(name)?
            .ok_or_else(|| Error::invalid_data(name, "not found"))?;
        if property.header().kind != kind {
            return Err(property.header().kind_mismatch(kind));
        }
        Ok(property)
    }

    /// Open the compound sub-property called `name`
    pub fn compound(&self, name: &str) -> Result<CompoundProperty> {
        match self.require(name, PropertyKind::Compound)? {
            Property::Compound(p) => Ok(p),
            other => Err(other.header().kind_mismatch(PropertyKind::Compound)),
        }
    }

    /// Open the scalar sub-property called `name`
    pub fn scalar(&self, name: &str) -> Result<ScalarProperty> {
        match self.require(name, PropertyKind::Scalar)? {
            Property::Scalar(p) => Ok(p),
            other => Err(other.header().kind_mismatch(PropertyKind::Scalar)),
        }
    }

    /// Open the array sub-property called `name`
    pub fn array(&self, name: &str) -> Result<ArrayProperty> {
        match self.require(name, PropertyKind::Array)? {
            Property::Array(p) => Ok(p),
            other => Err(other.header().kind_mismatch(PropertyKind::Array)),
        }
    }
}

/// Strip the sample key from a stored sample block
fn sample_payload<'a>(header: &PropertyHeader, block: &'a [u8]) -> Result<&'a [u8]> {
    if block.is_empty() {
        return Ok(block);
    }
    block
        .get(SAMPLE_KEY_SIZE..)
        .ok_or_else(|| Error::invalid_data(&header.name, "sample shorter than its key"))
}

fn expect_pod(header: &PropertyHeader, pod: Pod) -> Result<()> {
    if header.data_type.pod == pod {
        Ok(())
    } else {
        Err(Error::TypeMismatch {
            expected: pod.name(),
            actual: header.data_type.pod.name(),
        })
    }
}

fn decode_f64s(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
        .collect()
}

/// A property storing one fixed-size value per sample
pub struct ScalarProperty {
    header: PropertyHeader,
    group: Group,
}

impl ScalarProperty {
    /// Property header
    pub fn header(&self) -> &PropertyHeader {
        &self.header
    }

    /// Property name
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Element type and extent
    pub fn data_type(&self) -> DataType {
        self.header.data_type
    }

    /// Number of samples
    pub fn num_samples(&self) -> usize {
        self.header.num_samples as usize
    }

    /// Whether every sample equals the first
    pub fn is_constant(&self) -> bool {
        self.header.is_constant()
    }

    /// Index of the time sampling the samples follow
    pub fn time_sampling_index(&self) -> u32 {
        self.header.time_sampling_index
    }

    /// Raw bytes of sample `index`, without the key
    pub fn read_sample(&self, index: usize) -> Result<Vec<u8>> {
        let child = self.header.sample_child_index(index)?;
        let block = self.group.data(child as u64)?;
        let payload = sample_payload(&self.header, block.as_slice())?;

        if let Some(expected) = self.header.data_type.byte_size() {
            if payload.len() != expected {
                return Err(Error::invalid_data(
                    &self.header.name,
                    format!("sample {} holds {} bytes, expected {}", index, payload.len(), expected),
                ));
            }
        }
        Ok(payload.to_vec())
    }

    /// Sample `index` as doubles
    pub fn read_f64s(&self, index: usize) -> Result<Vec<f64>> {
        expect_pod(&self.header, Pod::Float64)?;
        Ok(decode_f64s(&self.read_sample(index)?))
    }

    /// Sample `index` as bytes
    pub fn read_u8s(&self, index: usize) -> Result<Vec<u8>> {
        expect_pod(&self.header, Pod::Uint8)?;
        self.read_sample(index)
    }

    /// Sample `index` of a single boolean
    pub fn read_bool(&self, index: usize) -> Result<bool> {
        expect_pod(&self.header, Pod::Boolean)?;
        let bytes = self.read_sample(index)?;
        bytes
            .first()
            .map(|&b| b != 0)
            .ok_or_else(|| Error::invalid_data(&self.header.name, "empty boolean sample"))
    }
}

/// A property storing one array per sample
pub struct ArrayProperty {
    header: PropertyHeader,
    group: Group,
}

impl ArrayProperty {
    /// Property header
    pub fn header(&self) -> &PropertyHeader {
        &self.header
    }

    /// Property name
    pub fn name(&self) -> &str {
        &self.header.name
    }

    /// Element type and extent
    pub fn data_type(&self) -> DataType {
        self.header.data_type
    }

    /// Number of samples
    pub fn num_samples(&self) -> usize {
        self.header.num_samples as usize
    }

    /// Whether every sample equals the first
    pub fn is_constant(&self) -> bool {
        self.header.is_constant()
    }

    /// Index of the time sampling the samples follow
    pub fn time_sampling_index(&self) -> u32 {
        self.header.time_sampling_index
    }

    /// Raw bytes of sample `index`, without the key
    pub fn read_sample(&self, index: usize) -> Result<Vec<u8>> {
        let child = self.header.sample_child_index(index)?;
        let block = self.group.data(2 * child as u64)?;
        Ok(sample_payload(&self.header, block.as_slice())?.to_vec())
    }

    /// Dimensions of sample `index`
    ///
    /// Samples stored without dimensions are one-dimensional; their length
    /// follows from the data size.
    pub fn dimensions(&self, index: usize) -> Result<Vec<usize>> {
        let child = self.header.sample_child_index(index)?;
        let dims = self.group.data(2 * child as u64 + 1)?;

        if dims.is_empty() {
            let payload_len = self.read_sample(index)?.len();
            let elements = match self.header.data_type.byte_size() {
                Some(0) | None => 0,
                Some(size) => payload_len / size,
            };
            return Ok(vec![elements]);
        }

        let bytes = dims.as_slice();
        if bytes.len() % 8 != 0 {
            return Err(Error::invalid_data(&self.header.name, "malformed dimensions"));
        }
        Ok(bytes
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as usize)
            .collect())
    }

    /// Sample `index` as doubles
    pub fn read_f64s(&self, index: usize) -> Result<Vec<f64>> {
        expect_pod(&self.header, Pod::Float64)?;
        Ok(decode_f64s(&self.read_sample(index)?))
    }

    /// Sample `index` as bytes
    pub fn read_u8s(&self, index: usize) -> Result<Vec<u8>> {
        expect_pod(&self.header, Pod::Uint8)?;
        self.read_sample(index)
    }
}

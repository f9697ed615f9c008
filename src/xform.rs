//! Transform schema
//!
//! A transform node stores its local transform as a stack of operations under
//! the `.xform` compound:
//!
//! - `.ops`: one byte per operation, `(type << 4) | hint`
//! - `.vals`: every channel of every operation, in op order
//! - `.inherits`: whether the node composes with its parent's world matrix
//!
//! [`XformSample::matrix`] folds the operations into a single local matrix.

use crate::archive::{CompoundProperty, MetaData, Object, Property, PropertyKind, TimeSampling};
use crate::error::{Error, Result};
use crate::math::{self, M44d};

/// Schema name of transform nodes
pub const XFORM_SCHEMA: &str = "AbcGeom_Xform_v3";

/// Schema title of transform nodes, naming their property compound
pub const XFORM_SCHEMA_OBJ_TITLE: &str = "AbcGeom_Xform_v3:.xform";

/// Name of the compound holding the transform properties
pub const XFORM_COMPOUND: &str = ".xform";

pub(crate) const OPS_PROPERTY: &str = ".ops";
pub(crate) const VALS_PROPERTY: &str = ".vals";
pub(crate) const INHERITS_PROPERTY: &str = ".inherits";
pub(crate) const CHILD_BOUNDS_PROPERTY: &str = ".childBnds";

/// Named operation hints
///
/// Hints describe the role of an operation in a DCC's transform stack. They do
/// not change the matrix an operation produces. A hint outside the range its
/// operation type defines is stored as 0.
pub mod hints {
    /// Plain scale
    pub const SCALE: u8 = 0;

    /// Plain translation
    pub const TRANSLATE: u8 = 0;
    /// Translation to the scale pivot
    pub const SCALE_PIVOT_POINT: u8 = 1;
    /// Scale pivot compensation
    pub const SCALE_PIVOT_TRANSLATION: u8 = 2;
    /// Translation to the rotate pivot
    pub const ROTATE_PIVOT_POINT: u8 = 3;
    /// Rotate pivot compensation
    pub const ROTATE_PIVOT_TRANSLATION: u8 = 4;

    /// Plain rotation
    pub const ROTATE: u8 = 0;
    /// Rotation orientation
    pub const ROTATE_ORIENTATION: u8 = 1;

    /// Plain matrix
    pub const MATRIX: u8 = 0;
    /// Maya shear matrix
    pub const MAYA_SHEAR: u8 = 1;
}

/// Kind of transform operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XformOperationType {
    /// Non-uniform scale, 3 channels
    Scale,
    /// Translation, 3 channels
    Translate,
    /// Rotation about an axis: axis xyz then angle in degrees
    Rotate,
    /// Full 4x4 matrix, 16 channels in row-major order
    Matrix,
    /// Rotation about X in degrees
    RotateX,
    /// Rotation about Y in degrees
    RotateY,
    /// Rotation about Z in degrees
    RotateZ,
}

impl XformOperationType {
    /// Decode the high nibble of an op encoding
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Scale,
            1 => Self::Translate,
            2 => Self::Rotate,
            3 => Self::Matrix,
            4 => Self::RotateX,
            5 => Self::RotateY,
            6 => Self::RotateZ,
            _ => return None,
        })
    }

    /// Numeric code stored in the high nibble
    pub fn code(self) -> u8 {
        match self {
            Self::Scale => 0,
            Self::Translate => 1,
            Self::Rotate => 2,
            Self::Matrix => 3,
            Self::RotateX => 4,
            Self::RotateY => 5,
            Self::RotateZ => 6,
        }
    }

    /// Number of channels an operation of this type carries
    pub fn num_channels(self) -> usize {
        match self {
            Self::Scale | Self::Translate => 3,
            Self::Rotate => 4,
            Self::Matrix => 16,
            Self::RotateX | Self::RotateY | Self::RotateZ => 1,
        }
    }

    /// Largest hint defined for this type
    pub fn max_hint(self) -> u8 {
        match self {
            Self::Scale => hints::SCALE,
            Self::Translate => hints::ROTATE_PIVOT_TRANSLATION,
            Self::Rotate | Self::RotateX | Self::RotateY | Self::RotateZ => {
                hints::ROTATE_ORIENTATION
            }
            Self::Matrix => hints::MAYA_SHEAR,
        }
    }

    fn normalize_hint(self, hint: u8) -> u8 {
        let hint = hint & 0x0F;
        if hint > self.max_hint() { 0 } else { hint }
    }
}

/// One operation of a transform stack
#[derive(Debug, Clone, PartialEq)]
pub struct XformOp {
    op_type: XformOperationType,
    hint: u8,
    channels: Vec<f64>,
}

impl XformOp {
    /// An operation with all channels zero
    pub fn new(op_type: XformOperationType, hint: u8) -> Self {
        Self {
            op_type,
            hint: op_type.normalize_hint(hint),
            channels: vec![0.0; op_type.num_channels()],
        }
    }

    /// Decode an op byte; the channels start at zero
    pub fn from_encoding(encoding: u8) -> Result<Self> {
        let op_type =
            XformOperationType::from_code(encoding >> 4).ok_or(Error::InvalidXformOp(encoding))?;
        Ok(Self::new(op_type, encoding & 0x0F))
    }

    fn with_channels(op_type: XformOperationType, hint: u8, channels: &[f64]) -> Self {
        let mut op = Self::new(op_type, hint);
        op.channels.copy_from_slice(channels);
        op
    }

    /// Scale by `(x, y, z)`
    pub fn scale(x: f64, y: f64, z: f64) -> Self {
        Self::with_channels(XformOperationType::Scale, hints::SCALE, &[x, y, z])
    }

    /// Translate by `(x, y, z)`
    pub fn translate(x: f64, y: f64, z: f64) -> Self {
        Self::with_channels(XformOperationType::Translate, hints::TRANSLATE, &[x, y, z])
    }

    /// Rotate `degrees` about `axis`
    pub fn rotate(axis: [f64; 3], degrees: f64) -> Self {
        Self::with_channels(
            XformOperationType::Rotate,
            hints::ROTATE,
            &[axis[0], axis[1], axis[2], degrees],
        )
    }

    /// Rotate `degrees` about X
    pub fn rotate_x(degrees: f64) -> Self {
        Self::with_channels(XformOperationType::RotateX, hints::ROTATE, &[degrees])
    }

    /// Rotate `degrees` about Y
    pub fn rotate_y(degrees: f64) -> Self {
        Self::with_channels(XformOperationType::RotateY, hints::ROTATE, &[degrees])
    }

    /// Rotate `degrees` about Z
    pub fn rotate_z(degrees: f64) -> Self {
        Self::with_channels(XformOperationType::RotateZ, hints::ROTATE, &[degrees])
    }

    /// A full matrix given in row-major order
    pub fn matrix_op(rows: [f64; 16]) -> Self {
        Self::with_channels(XformOperationType::Matrix, hints::MATRIX, &rows)
    }

    /// Replace the hint, falling back to 0 when it is out of range
    pub fn with_hint(mut self, hint: u8) -> Self {
        self.hint = self.op_type.normalize_hint(hint);
        self
    }

    /// Operation type
    pub fn op_type(&self) -> XformOperationType {
        self.op_type
    }

    /// Operation hint
    pub fn hint(&self) -> u8 {
        self.hint
    }

    /// The stored byte: `(type << 4) | hint`
    pub fn encoding(&self) -> u8 {
        (self.op_type.code() << 4) | (self.hint & 0x0F)
    }

    /// Number of channels
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Channel values
    pub fn channels(&self) -> &[f64] {
        &self.channels
    }

    /// Channel `index`, if present
    pub fn channel(&self, index: usize) -> Option<f64> {
        self.channels.get(index).copied()
    }

    /// Set channel `index`; out-of-range indices are ignored
    pub fn set_channel(&mut self, index: usize, value: f64) {
        if let Some(channel) = self.channels.get_mut(index) {
            *channel = value;
        }
    }

    /// This operation as a matrix
    pub fn matrix(&self) -> M44d {
        let ch = &self.channels;
        match self.op_type {
            XformOperationType::Scale => math::scaling(ch[0], ch[1], ch[2]),
            XformOperationType::Translate => math::translation(ch[0], ch[1], ch[2]),
            XformOperationType::Rotate => math::axis_angle([ch[0], ch[1], ch[2]], ch[3]),
            XformOperationType::Matrix => {
                let mut rows = [0.0; 16];
                rows.copy_from_slice(&ch[..16]);
                math::from_rows(&rows)
            }
            XformOperationType::RotateX => math::axis_angle([1.0, 0.0, 0.0], ch[0]),
            XformOperationType::RotateY => math::axis_angle([0.0, 1.0, 0.0], ch[0]),
            XformOperationType::RotateZ => math::axis_angle([0.0, 0.0, 1.0], ch[0]),
        }
    }
}

/// The state of a transform node at one sample
#[derive(Debug, Clone, PartialEq)]
pub struct XformSample {
    ops: Vec<XformOp>,
    inherits: bool,
}

impl Default for XformSample {
    fn default() -> Self {
        Self {
            ops: Vec::new(),
            inherits: true,
        }
    }
}

impl XformSample {
    /// An inheriting sample with no operations
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sample from operations
    pub fn from_ops(ops: Vec<XformOp>, inherits: bool) -> Self {
        Self { ops, inherits }
    }

    /// Append an operation
    pub fn add_op(&mut self, op: XformOp) {
        self.ops.push(op);
    }

    /// Builder form of [`XformSample::add_op`]
    pub fn with_op(mut self, op: XformOp) -> Self {
        self.ops.push(op);
        self
    }

    /// Builder form of [`XformSample::set_inherits`]
    pub fn with_inherits(mut self, inherits: bool) -> Self {
        self.inherits = inherits;
        self
    }

    /// Whether the node composes with its parent
    pub fn inherits(&self) -> bool {
        self.inherits
    }

    /// Set whether the node composes with its parent
    pub fn set_inherits(&mut self, inherits: bool) {
        self.inherits = inherits;
    }

    /// Operations in stack order
    pub fn ops(&self) -> &[XformOp] {
        &self.ops
    }

    /// Number of operations
    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    /// Operation `index`
    pub fn op(&self, index: usize) -> Option<&XformOp> {
        self.ops.get(index)
    }

    /// Total channels over all operations
    pub fn num_channels(&self) -> usize {
        self.ops.iter().map(XformOp::num_channels).sum()
    }

    /// The local matrix: each op is pre-multiplied onto the running result
    pub fn matrix(&self) -> M44d {
        self.ops
            .iter()
            .fold(math::identity(), |ret, op| op.matrix() * ret)
    }

    /// Whether the local matrix is exactly the identity
    pub fn is_identity(&self) -> bool {
        self.matrix() == math::identity()
    }
}

/// Which sample of a node to read
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleSelector {
    /// Sample index, clamped to the last sample
    Index(usize),
    /// Time in seconds, resolved to the sample at or before it
    Time(f64),
}

impl Default for SampleSelector {
    fn default() -> Self {
        SampleSelector::Index(0)
    }
}

/// Read access to a transform node
pub struct Xform<'a> {
    object: &'a Object,
    schema: CompoundProperty,
}

impl<'a> Xform<'a> {
    /// Whether metadata marks an object as a transform node
    pub fn matches(metadata: &MetaData) -> bool {
        metadata.schema_obj_title() == Some(XFORM_SCHEMA_OBJ_TITLE)
            || metadata.schema() == Some(XFORM_SCHEMA)
    }

    /// Wrap `object`, which must be a transform node
    pub fn new(object: &'a Object) -> Result<Self> {
        if !Self::matches(object.metadata()) {
            return Err(Error::NotAnXform(object.full_name().to_string()));
        }
        let schema = object.properties().compound(XFORM_COMPOUND)?;
        Ok(Self { object, schema })
    }

    /// The wrapped object
    pub fn object(&self) -> &'a Object {
        self.object
    }

    /// Node name
    pub fn name(&self) -> &str {
        self.object.name()
    }

    /// The `.xform` compound
    pub fn schema(&self) -> &CompoundProperty {
        &self.schema
    }

    fn samples_of(&self, name: &str) -> usize {
        self.schema
            .property_header(name)
            .map_or(0, |h| h.num_samples as usize)
    }

    /// Number of samples, at least 1
    pub fn num_samples(&self) -> usize {
        self.samples_of(VALS_PROPERTY)
            .max(self.samples_of(INHERITS_PROPERTY))
            .max(1)
    }

    /// Index of the time sampling the node's samples follow
    pub fn time_sampling_index(&self) -> u32 {
        [VALS_PROPERTY, INHERITS_PROPERTY]
            .iter()
            .filter_map(|name| self.schema.property_header(name))
            .map(|h| h.time_sampling_index)
            .find(|&index| index != 0)
            .unwrap_or(0)
    }

    /// The time sampling the node's samples follow
    pub fn time_sampling(&self) -> Option<&TimeSampling> {
        self.object.time_sampling(self.time_sampling_index())
    }

    /// Whether no sample differs from the first
    pub fn is_constant(&self) -> bool {
        [VALS_PROPERTY, INHERITS_PROPERTY].iter().all(|name| {
            self.schema
                .property_header(name)
                .is_none_or(|h| h.is_constant())
        })
    }

    /// Resolve a selector to a sample index
    pub fn sample_index(&self, selector: SampleSelector) -> usize {
        let last = self.num_samples() - 1;
        match selector {
            SampleSelector::Index(index) => index.min(last),
            SampleSelector::Time(time) => match self.time_sampling() {
                Some(ts) => ts.floor_index(time, last + 1).0,
                None => 0,
            },
        }
    }

    /// Read the sample picked by `selector`
    pub fn sample(&self, selector: SampleSelector) -> Result<XformSample> {
        let index = self.sample_index(selector);

        let inherits = match self.schema.property(INHERITS_PROPERTY)? {
            Some(Property::Scalar(p)) if p.num_samples() > 0 => {
                p.read_bool(index.min(p.num_samples() - 1))?
            }
            Some(Property::Scalar(_)) | None => true,
            Some(other) => {
                return Err(other.header().kind_mismatch(PropertyKind::Scalar));
            }
        };

        let encodings = read_channel_bytes(&self.schema, OPS_PROPERTY, 0)?;
        let mut ops = encodings
            .iter()
            .map(|&byte| XformOp::from_encoding(byte))
            .collect::<Result<Vec<_>>>()?;

        let needed: usize = ops.iter().map(XformOp::num_channels).sum();
        if needed > 0 {
            let vals = read_channel_values(&self.schema, index)?;
            if vals.len() < needed {
                return Err(Error::invalid_data(
                    VALS_PROPERTY,
                    format!(
                        "{} has {} values but its ops need {}",
                        self.object.full_name(),
                        vals.len(),
                        needed
                    ),
                ));
            }
            let mut values = vals.into_iter();
            for op in &mut ops {
                for channel in op.channels.iter_mut() {
                    *channel = values.next().unwrap_or_default();
                }
            }
        }

        Ok(XformSample::from_ops(ops, inherits))
    }

    /// Bounds of the node's children at `index` as `[min xyz, max xyz]`, if stored
    pub fn child_bounds(&self, index: usize) -> Result<Option<[f64; 6]>> {
        match self.schema.property(CHILD_BOUNDS_PROPERTY)? {
            Some(Property::Scalar(p)) if p.num_samples() > 0 => {
                let values = p.read_f64s(index.min(p.num_samples() - 1))?;
                let bounds: [f64; 6] = values.as_slice().try_into().map_err(|_| {
                    Error::invalid_data(CHILD_BOUNDS_PROPERTY, "expected 6 values")
                })?;
                Ok(Some(bounds))
            }
            _ => Ok(None),
        }
    }
}

/// Read the op bytes; a missing property means no ops
fn read_channel_bytes(schema: &CompoundProperty, name: &str, index: usize) -> Result<Vec<u8>> {
    match schema.property(name)? {
        None => Ok(Vec::new()),
        Some(Property::Scalar(p)) if p.num_samples() == 0 => Ok(Vec::new()),
        Some(Property::Scalar(p)) => p.read_u8s(index.min(p.num_samples() - 1)),
        Some(Property::Array(p)) if p.num_samples() == 0 => Ok(Vec::new()),
        Some(Property::Array(p)) => p.read_u8s(index.min(p.num_samples() - 1)),
        Some(Property::Compound(p)) => Err(p.header().kind_mismatch(PropertyKind::Scalar)),
    }
}

/// Read all channel values of sample `index`; a missing property means none
fn read_channel_values(schema: &CompoundProperty, index: usize) -> Result<Vec<f64>> {
    match schema.property(VALS_PROPERTY)? {
        None => Ok(Vec::new()),
        Some(Property::Scalar(p)) if p.num_samples() == 0 => Ok(Vec::new()),
        Some(Property::Scalar(p)) => p.read_f64s(index.min(p.num_samples() - 1)),
        Some(Property::Array(p)) if p.num_samples() == 0 => Ok(Vec::new()),
        Some(Property::Array(p)) => p.read_f64s(index.min(p.num_samples() - 1)),
        Some(Property::Compound(p)) => Err(p.header().kind_mismatch(PropertyKind::Scalar)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding() {
        let op = XformOp::translate(1.0, 2.0, 3.0).with_hint(hints::ROTATE_PIVOT_POINT);
        assert_eq!(op.encoding(), 0x13);

        let decoded = XformOp::from_encoding(0x13).unwrap();
        assert_eq!(decoded.op_type(), XformOperationType::Translate);
        assert_eq!(decoded.hint(), hints::ROTATE_PIVOT_POINT);
        assert_eq!(decoded.channels(), &[0.0, 0.0, 0.0]);

        assert_eq!(XformOp::rotate_z(5.0).encoding(), 0x60);
        assert_eq!(XformOp::matrix_op([0.0; 16]).with_hint(hints::MAYA_SHEAR).encoding(), 0x31);
    }

    #[test]
    fn test_out_of_range_hint_becomes_zero() {
        assert_eq!(XformOp::from_encoding(0x05).unwrap().hint(), 0);
        assert_eq!(XformOp::from_encoding(0x05).unwrap().encoding(), 0x00);
        assert_eq!(XformOp::from_encoding(0x13).unwrap().hint(), 3);
        assert_eq!(XformOp::from_encoding(0x15).unwrap().hint(), 0);
        assert_eq!(XformOp::from_encoding(0x45).unwrap().hint(), 0);
        assert_eq!(XformOp::from_encoding(0x21).unwrap().hint(), 1);
        assert_eq!(XformOp::from_encoding(0x32).unwrap().hint(), 0);
        assert_eq!(XformOp::scale(1.0, 1.0, 1.0).with_hint(5).hint(), 0);
        assert_eq!(
            XformOp::rotate_y(0.0).with_hint(hints::ROTATE_ORIENTATION).hint(),
            hints::ROTATE_ORIENTATION
        );
    }

    #[test]
    fn test_unknown_op_type() {
        assert!(matches!(
            XformOp::from_encoding(0x70),
            Err(Error::InvalidXformOp(0x70))
        ));
        assert!(matches!(
            XformOp::from_encoding(0xF2),
            Err(Error::InvalidXformOp(0xF2))
        ));
    }

    #[test]
    fn test_channel_counts() {
        assert_eq!(XformOp::scale(1.0, 1.0, 1.0).num_channels(), 3);
        assert_eq!(XformOp::rotate([0.0, 1.0, 0.0], 10.0).num_channels(), 4);
        assert_eq!(XformOp::matrix_op([0.0; 16]).num_channels(), 16);
        assert_eq!(XformOp::rotate_y(10.0).num_channels(), 1);

        let sample = XformSample::new()
            .with_op(XformOp::translate(1.0, 0.0, 0.0))
            .with_op(XformOp::rotate_x(90.0));
        assert_eq!(sample.num_channels(), 4);
    }

    #[test]
    fn test_ops_compose_in_stack_order() {
        // translate then rotate: the translation is applied last
        let sample = XformSample::new()
            .with_op(XformOp::translate(1.0, 0.0, 0.0))
            .with_op(XformOp::rotate_z(90.0));
        let expected = XformOp::rotate_z(90.0).matrix() * XformOp::translate(1.0, 0.0, 0.0).matrix();
        assert_eq!(sample.matrix(), expected);
        assert_eq!(sample.matrix()[(3, 0)], 1.0);
    }

    #[test]
    fn test_matrix_op_reads_rows() {
        let mut rows = [0.0; 16];
        rows[0] = 1.0;
        rows[5] = 1.0;
        rows[10] = 1.0;
        rows[15] = 1.0;
        rows[12] = 7.0;
        let m = XformOp::matrix_op(rows).matrix();
        assert_eq!(m[(3, 0)], 7.0);
        assert_eq!(m, math::translation(7.0, 0.0, 0.0));
    }

    #[test]
    fn test_identity_sample() {
        let sample = XformSample::default();
        assert!(sample.inherits());
        assert!(sample.is_identity());
        assert!(
            XformSample::new()
                .with_op(XformOp::scale(1.0, 1.0, 1.0))
                .is_identity()
        );
        assert!(
            !XformSample::new()
                .with_op(XformOp::translate(0.0, 0.5, 0.0))
                .is_identity()
        );
    }

    #[test]
    fn test_schema_match() {
        assert!(Xform::matches(&MetaData::new().with("schema", XFORM_SCHEMA)));
        assert!(Xform::matches(
            &MetaData::new().with("schemaObjTitle", XFORM_SCHEMA_OBJ_TITLE)
        ));
        assert!(!Xform::matches(&MetaData::new().with("schema", "AbcGeom_PolyMesh_v1")));
        assert!(!Xform::matches(&MetaData::new()));
    }
}

//! 4x4 double-precision matrices in the row-vector convention
//!
//! Points are row vectors multiplied on the left (`p' = p * M`), so the
//! translation lives in row 3 and `a * b` applies `a` first, then `b`.

use nalgebra::{Matrix4, Vector3};

/// 4x4 matrix of doubles, indexed `m[(row, col)]`
pub type M44d = Matrix4<f64>;

/// The identity matrix
pub fn identity() -> M44d {
    M44d::identity()
}

/// Translation by `(x, y, z)`
pub fn translation(x: f64, y: f64, z: f64) -> M44d {
    let mut m = M44d::identity();
    m[(3, 0)] = x;
    m[(3, 1)] = y;
    m[(3, 2)] = z;
    m
}

/// Non-uniform scale by `(x, y, z)`
pub fn scaling(x: f64, y: f64, z: f64) -> M44d {
    let mut m = M44d::identity();
    m[(0, 0)] = x;
    m[(1, 1)] = y;
    m[(2, 2)] = z;
    m
}

/// Rotation of `degrees` about `axis`
///
/// The axis is normalised first. A zero axis stays zero, which leaves
/// `cos(angle)` on the diagonal of the rotation block.
pub fn axis_angle(axis: [f64; 3], degrees: f64) -> M44d {
    let axis = Vector3::from(axis);
    let length = axis.norm();
    let u = if length > 0.0 { axis / length } else { axis };
    let (x, y, z) = (u.x, u.y, u.z);

    let radians = degrees.to_radians();
    let (s, c) = radians.sin_cos();
    let t = 1.0 - c;

    M44d::new(
        x * x * t + c,
        x * y * t + z * s,
        x * z * t - y * s,
        0.0,
        x * y * t - z * s,
        y * y * t + c,
        y * z * t + x * s,
        0.0,
        x * z * t + y * s,
        y * z * t - x * s,
        z * z * t + c,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
    )
}

/// Build a matrix from 16 values in row-major order
pub fn from_rows(values: &[f64; 16]) -> M44d {
    M44d::from_row_slice(values)
}

/// Apply `m` to the point `p` as a row vector
pub fn transform_point(m: &M44d, p: [f64; 3]) -> [f64; 3] {
    let row = nalgebra::RowVector4::new(p[0], p[1], p[2], 1.0) * m;
    let w = if row[3] != 0.0 { row[3] } else { 1.0 };
    [row[0] / w, row[1] / w, row[2] / w]
}

/// 3D point type.
pub type Point3 = nalgebra::Point3<f64>;

/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;

/// Global geometric tolerance for floating-point comparisons.
pub const TOLERANCE: f64 = 1e-10;

/// Cotangent of the angle between two vectors: `(a . b) / |a x b|`.
///
/// Does not guard against parallel or zero-length inputs; the caller is
/// responsible for keeping triangles non-degenerate.
#[must_use]
pub fn cot_between(a: &Vector3, b: &Vector3) -> f64 {
    a.dot(b) / a.cross(b).norm()
}

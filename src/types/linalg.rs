//! Linear algebra type system for the PDR engine
//!
//! Fixed-size nalgebra aliases shared by the geometry helpers and the
//! estimators. Everything is 3D and `f64`.

use nalgebra::{Matrix3, Vector3};

use super::TriAxisSample;

// ===== Vector / Matrix Types =====
pub type Vec3 = Vector3<f64>;
pub type Rot3 = Matrix3<f64>;

impl From<TriAxisSample> for Vec3 {
    fn from(s: TriAxisSample) -> Self {
        Vec3::new(s.x, s.y, s.z)
    }
}

impl From<Vec3> for TriAxisSample {
    fn from(v: Vec3) -> Self {
        TriAxisSample::new(v.x, v.y, v.z)
    }
}

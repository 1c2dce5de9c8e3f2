pub mod attitude;
pub mod complementary;
pub mod heading;

use crate::geometry::sign_invert;
use crate::types::{TriAxisSample, Vec3};

/// Accelerometer reading in the convention where a level device reads `+z`.
pub(crate) fn oriented_accel(acc: &TriAxisSample, invert: bool) -> Vec3 {
    let v = Vec3::from(*acc);
    if invert {
        sign_invert(v)
    } else {
        v
    }
}

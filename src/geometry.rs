//! Frame transforms and angle arithmetic shared by every estimator.
//!
//! The global frame is screen-plane oriented: x east, y pointing down the
//! screen (south), z up. The rotation below is `Rz(yaw)·Rx(pitch)·Ry(roll)`
//! expressed in that frame, which is why its middle row carries the opposite
//! sign of the textbook right-handed composition. The matrix stays orthogonal,
//! so the transposed form is its exact inverse.

use std::f64::consts::{PI, TAU};
use std::fmt;
use std::str::FromStr;

use crate::error::PdrError;
use crate::types::{AttitudeEstimate, Rot3, Vec3};

/// Target interval for [`angle_range`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AngleRange {
    /// `[0, 2π)`
    TwoPi,
    /// `(−π, π]`
    Pi,
}

impl FromStr for AngleRange {
    type Err = PdrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2PI" | "TwoPi" | "two_pi" => Ok(AngleRange::TwoPi),
            "PI" | "Pi" | "pi" => Ok(AngleRange::Pi),
            other => Err(PdrError::UnknownAngleRange(other.to_string())),
        }
    }
}

impl fmt::Display for AngleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AngleRange::TwoPi => write!(f, "2PI"),
            AngleRange::Pi => write!(f, "PI"),
        }
    }
}

/// Negate every axis (accelerometer sign convention swap).
pub fn sign_invert(v: Vec3) -> Vec3 {
    -v
}

/// Wrap `angle` into the requested interval using a single remainder.
pub fn angle_range(angle: f64, mode: AngleRange) -> f64 {
    match mode {
        AngleRange::TwoPi => wrap_positive(angle),
        // Mirror into [0, 2π) so the closed end lands on +π.
        AngleRange::Pi => PI - wrap_positive(PI - angle),
    }
}

fn wrap_positive(angle: f64) -> f64 {
    let mut r = angle % TAU;
    if r < 0.0 {
        r += TAU;
    }
    // -1e-17 + 2π rounds up to exactly 2π.
    if r >= TAU {
        r = 0.0;
    }
    r
}

/// Shortest angular distance between two angles, in `[0, π]`.
pub fn angle_diff(a: f64, b: f64) -> f64 {
    let d = a - b;
    d.sin().atan2(d.cos()).abs()
}

/// Signed shortest rotation from `from` to `to`, in `(−π, π]`.
pub fn signed_angle_diff(to: f64, from: f64) -> f64 {
    angle_range(to - from, AngleRange::Pi)
}

/// First-order IIR: `alpha·prev + (1 − alpha)·sample`.
pub fn low_pass_filter(prev: f64, sample: f64, alpha: f64) -> f64 {
    alpha * prev + (1.0 - alpha) * sample
}

/// Weighted mean of angles, unwrapped around the first term before averaging.
///
/// Returns `None` when the weights sum to zero or the result is not finite.
pub fn weighted_angle_mean(terms: &[(f64, f64)]) -> Option<f64> {
    let &(_, reference) = terms.first()?;
    let (sum, weight) = terms.iter().fold((0.0, 0.0), |(sum, weight), &(w, angle)| {
        let unwrapped = reference + signed_angle_diff(angle, reference);
        (sum + w * unwrapped, weight + w)
    });
    if weight == 0.0 {
        return None;
    }
    let mean = sum / weight;
    mean.is_finite().then(|| angle_range(mean, AngleRange::TwoPi))
}

/// Device-to-global rotation for the given attitude.
pub fn rotation_matrix(attitude: &AttitudeEstimate) -> Rot3 {
    let (sp, cp) = attitude.pitch.sin_cos();
    let (sr, cr) = attitude.roll.sin_cos();
    let (sy, cy) = attitude.yaw.sin_cos();

    Rot3::new(
        cy * cr - sy * sp * sr,
        -sy * cp,
        cy * sr + sy * sp * cr,
        -sy * cr - cy * sp * sr,
        -cy * cp,
        -sy * sr + cy * sp * cr,
        -cp * sr,
        sp,
        cp * cr,
    )
}

/// Rotate `v` from the device frame to the global frame, or back when `transpose`.
pub fn lcs_to_gcs(v: Vec3, attitude: &AttitudeEstimate, transpose: bool) -> Vec3 {
    let r = rotation_matrix(attitude);
    if transpose {
        r.transpose() * v
    } else {
        r * v
    }
}

/// Length of `a` along the direction of `b`; `None` if `b` has no direction.
pub fn scalar_projection(a: Vec3, b: Vec3) -> Option<f64> {
    let norm = b.norm();
    if norm < 1e-9 || !norm.is_finite() {
        return None;
    }
    Some(a.dot(&b) / norm)
}

/// Display helper: any degree value into `[0, 360)`.
pub fn degree_range(deg: f64) -> f64 {
    let mut d = deg % 360.0;
    if d < 0.0 {
        d += 360.0;
    }
    if d >= 360.0 {
        d = 0.0;
    }
    d
}

use log::{debug, trace};

use super::oriented_accel;
use crate::geometry::{angle_range, AngleRange};
use crate::types::{AttitudeEstimate, TriAxisSample};

/// Accelerometer + magnetometer attitude (pitch/roll from gravity, yaw from
/// tilt-compensated magnetometer, zero-referenced to the first valid fix).
pub struct AttitudeEstimator {
    invert_accel: bool,
    init_yaw: Option<f64>,
    attitude: AttitudeEstimate,
}

impl AttitudeEstimator {
    pub fn new(invert_accel: bool) -> Self {
        Self {
            invert_accel,
            init_yaw: None,
            attitude: AttitudeEstimate::default(),
        }
    }

    /// Refresh the estimate from one accelerometer/magnetometer pair.
    ///
    /// An all-zero accelerometer keeps the whole previous attitude; an
    /// all-zero magnetometer keeps the previous yaw.
    pub fn update(&mut self, acc: &TriAxisSample, mag: &TriAxisSample) -> AttitudeEstimate {
        if acc.is_degenerate() {
            trace!("attitude: accelerometer sample empty, holding previous estimate");
            return self.attitude;
        }

        let a = oriented_accel(acc, self.invert_accel);

        // Roll first: the magnetometer tilt compensation below uses this roll.
        let roll = (-a.x).atan2(a.z);
        let pitch = a.y.atan2((a.x * a.x + a.z * a.z).sqrt());

        let yaw = if mag.is_degenerate() {
            self.attitude.yaw
        } else {
            let (sin_r, cos_r) = roll.sin_cos();
            let (sin_p, cos_p) = pitch.sin_cos();
            let mx = mag.x * cos_r + mag.z * sin_r;
            let my = mag.x * (-sin_p * sin_r) + mag.y * (-cos_p) + mag.z * sin_p * cos_r;
            let yaw_raw = my.atan2(mx);

            let reference = match self.init_yaw {
                Some(r) => r,
                None => {
                    debug!("attitude: yaw reference latched at {:.4} rad", yaw_raw);
                    self.init_yaw = Some(yaw_raw);
                    yaw_raw
                }
            };
            angle_range(yaw_raw - reference, AngleRange::Pi)
        };

        self.attitude = AttitudeEstimate { pitch, roll, yaw };
        self.attitude
    }

    pub fn attitude(&self) -> AttitudeEstimate {
        self.attitude
    }

    /// Raw magnetometer yaw that maps to zero, once latched.
    pub fn yaw_reference(&self) -> Option<f64> {
        self.init_yaw
    }

    pub fn reset(&mut self) {
        self.init_yaw = None;
        self.attitude = AttitudeEstimate::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_level_device_converges_to_zero() {
        let mut est = AttitudeEstimator::new(false);
        let acc = TriAxisSample::new(0.0, 0.0, 1.0);
        let mag = TriAxisSample::new(1.0, 0.0, 0.0);
        for _ in 0..10 {
            let att = est.update(&acc, &mag);
            assert_abs_diff_eq!(att.pitch, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(att.roll, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(att.yaw, 0.0, epsilon = 1e-12);
        }
        assert!(est.yaw_reference().is_some());
    }

    #[test]
    fn test_inverted_convention_matches() {
        let mut plain = AttitudeEstimator::new(false);
        let mut inverted = AttitudeEstimator::new(true);
        let mag = TriAxisSample::new(0.3, 0.5, -0.2);
        let a = plain.update(&TriAxisSample::new(0.1, 0.2, 0.97), &mag);
        let b = inverted.update(&TriAxisSample::new(-0.1, -0.2, -0.97), &mag);
        assert_abs_diff_eq!(a.pitch, b.pitch, epsilon = 1e-12);
        assert_abs_diff_eq!(a.roll, b.roll, epsilon = 1e-12);
    }

    #[test]
    fn test_pitch_and_roll_from_gravity() {
        let mut est = AttitudeEstimator::new(false);
        let mag = TriAxisSample::new(1.0, 0.0, 0.0);

        // Nose up 90°: gravity along +y
        let att = est.update(&TriAxisSample::new(0.0, 1.0, 0.0), &mag);
        assert_abs_diff_eq!(att.pitch, FRAC_PI_2, epsilon = 1e-12);

        // Rolled: gravity along -x
        let att = est.update(&TriAxisSample::new(-1.0, 0.0, 0.0), &mag);
        assert_abs_diff_eq!(att.roll, FRAC_PI_2, epsilon = 1e-12);
        assert_abs_diff_eq!(att.pitch, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_yaw_is_relative_to_first_fix() {
        let mut est = AttitudeEstimator::new(false);
        let acc = TriAxisSample::new(0.0, 0.0, 1.0);
        est.update(&acc, &TriAxisSample::new(1.0, 0.0, 0.0));

        // Level: my = -mag.y, so a field along -y reads +90°.
        let att = est.update(&acc, &TriAxisSample::new(0.0, -1.0, 0.0));
        assert_abs_diff_eq!(att.yaw, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_samples_hold_state() {
        let mut est = AttitudeEstimator::new(false);
        let acc = TriAxisSample::new(0.0, 0.3, 0.95);
        let before = est.update(&acc, &TriAxisSample::new(0.4, 0.1, 0.0));

        let after = est.update(&TriAxisSample::ZERO, &TriAxisSample::new(1.0, 1.0, 1.0));
        assert_eq!(before, after);

        // Missing magnetometer keeps yaw but refreshes tilt
        let tilted = est.update(&TriAxisSample::new(0.0, 0.0, 1.0), &TriAxisSample::ZERO);
        assert_eq!(tilted.yaw, before.yaw);
        assert_abs_diff_eq!(tilted.pitch, 0.0, epsilon = 1e-12);
        assert!(tilted.pitch.is_finite() && tilted.roll.is_finite());
    }
}

//! Heading direction from magnetometer and gyroscope.
//!
//! Three hypotheses are tracked side by side:
//!   - magnetometer heading: absolute but noisy, tilt-compensated in the global frame
//!   - gyroscope heading: smooth but drifting, integrated about the gravity axis
//!     after subtracting a bias learnt while the magnetometer heading holds still
//!   - fused heading: a weighted vote of the two plus the previous fused value
//!
//! All three live in `[0, 2π)`, 0 = north, increasing clockwise.

use std::collections::VecDeque;

use log::{debug, trace, warn};

use super::oriented_accel;
use crate::geometry::{
    angle_diff, angle_range, lcs_to_gcs, low_pass_filter, scalar_projection, weighted_angle_mean,
    AngleRange,
};
use crate::types::{AttitudeEstimate, GravityUnit, GyroBiasEstimate, HeadingState, TriAxisSample, Vec3};

/// Tuning for [`HeadingEstimator`].
#[derive(Clone, Debug)]
pub struct HeadingConfig {
    pub filter_alpha: f64,
    /// Local magnetic declination subtracted from the magnetometer heading.
    pub declination_rad: f64,
    /// Magnetometer heading change per sample above which the bias queue resets.
    pub bias_stability_threshold_rad: f64,
    pub bias_queue_capacity: usize,
    /// Magnetometer/gyro agreement band for the fusion vote.
    pub fusion_agreement_rad: f64,
    /// Magnetometer step below which it counts as steady in the fusion vote.
    pub mag_steady_rad: f64,
    pub reseed_interval_rad: f64,
    pub reseed_tolerance_rad: f64,
    pub invert_accel: bool,
    pub gravity_unit: GravityUnit,
}

impl Default for HeadingConfig {
    fn default() -> Self {
        Self {
            filter_alpha: 0.95,
            declination_rad: 7.5_f64.to_radians(),
            bias_stability_threshold_rad: 0.7_f64.to_radians(),
            bias_queue_capacity: 600,
            fusion_agreement_rad: 5.0_f64.to_radians(),
            mag_steady_rad: 2.0_f64.to_radians(),
            reseed_interval_rad: 45.0_f64.to_radians(),
            reseed_tolerance_rad: 5.0_f64.to_radians(),
            invert_accel: false,
            gravity_unit: GravityUnit::G,
        }
    }
}

/// What happened during the last [`HeadingEstimator::update`] besides the new state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeadingDiagnostics {
    /// Bias queue length discarded because the magnetometer heading moved.
    pub bias_queue_cleared: Option<usize>,
    /// Gyro heading snapped back onto the magnetometer heading.
    pub gyro_reseeded: bool,
    /// Gravity had no usable direction; gyro heading was held.
    pub projection_skipped: bool,
    /// Fusion produced a non-finite value; previous fused heading kept.
    pub fusion_skipped: bool,
}

pub struct HeadingEstimator {
    config: HeadingConfig,

    gravity_z: f64,
    gyro_angle: Vec3,
    angle_queue: VecDeque<Vec3>,
    bias: GyroBiasEstimate,

    mag_heading: Option<f64>,
    gyro_heading: Option<f64>,
    fused_heading: Option<f64>,

    diagnostics: HeadingDiagnostics,
}

impl HeadingEstimator {
    pub fn new(config: HeadingConfig) -> Self {
        let capacity = config.bias_queue_capacity.max(1);
        Self {
            gravity_z: config.gravity_unit.scale(),
            gyro_angle: Vec3::zeros(),
            angle_queue: VecDeque::with_capacity(capacity),
            bias: GyroBiasEstimate::default(),
            mag_heading: None,
            gyro_heading: None,
            fused_heading: None,
            diagnostics: HeadingDiagnostics::default(),
            config,
        }
    }

    pub fn update(
        &mut self,
        acc: &TriAxisSample,
        mag: &TriAxisSample,
        gyro: &TriAxisSample,
        attitude: &AttitudeEstimate,
        dt_ms: f64,
    ) -> HeadingState {
        self.diagnostics = HeadingDiagnostics::default();

        if !(dt_ms > 0.0 && dt_ms.is_finite()) {
            warn!("heading: ignoring update with non-positive timestep {} ms", dt_ms);
            return self.state();
        }
        let dt = dt_ms / 1000.0;

        // Gravity along the global vertical
        if !acc.is_degenerate() {
            let acc_gcs = lcs_to_gcs(oriented_accel(acc, self.config.invert_accel), attitude, false);
            let sample = acc_gcs.z * self.config.gravity_unit.scale();
            self.gravity_z = low_pass_filter(self.gravity_z, sample, self.config.filter_alpha);
            trace!("heading: gravity z {:.5}", self.gravity_z);
        }

        // Raw gyro angle integral for bias estimation
        self.gyro_angle += Vec3::from(*gyro) * dt;

        let prev_mag = self.mag_heading;
        let mag_fresh = !mag.is_degenerate();
        if mag_fresh {
            self.mag_heading = Some(self.magnetometer_heading(mag, attitude));
        }
        let h_mag = match self.mag_heading {
            Some(h) => h,
            None => return self.state(),
        };
        let prev_mag = prev_mag.unwrap_or(h_mag);

        if mag_fresh {
            self.track_bias(h_mag, prev_mag, dt);
        }

        let h_gyr = self.integrate_gyro(h_mag, gyro, attitude, dt);

        let prev_fused = self.fused_heading.unwrap_or(h_mag);
        let fused = match fuse_heading(h_mag, h_gyr, prev_mag, prev_fused, &self.config) {
            Some(f) => f,
            None => {
                warn!("heading: fusion produced a non-finite value, keeping previous");
                self.diagnostics.fusion_skipped = true;
                prev_fused
            }
        };
        self.fused_heading = Some(fused);

        trace!(
            "heading: mag {:.4} gyr {:.4} fused {:.4}",
            h_mag,
            h_gyr,
            fused
        );
        self.state()
    }

    fn magnetometer_heading(&self, mag: &TriAxisSample, attitude: &AttitudeEstimate) -> f64 {
        let mag_gcs = lcs_to_gcs(Vec3::from(*mag), &attitude.level(), false);
        angle_range(
            (-mag_gcs.y).atan2(mag_gcs.x) - self.config.declination_rad - std::f64::consts::FRAC_PI_2,
            AngleRange::TwoPi,
        )
    }

    fn track_bias(&mut self, h_mag: f64, prev_mag: f64, dt: f64) {
        if angle_diff(h_mag, prev_mag) > self.config.bias_stability_threshold_rad {
            if !self.angle_queue.is_empty() {
                debug!(
                    "heading: magnetometer moved, dropping {} bias samples",
                    self.angle_queue.len()
                );
                self.diagnostics.bias_queue_cleared = Some(self.angle_queue.len());
                self.angle_queue.clear();
            }
        } else {
            if self.angle_queue.len() >= self.config.bias_queue_capacity.max(1) {
                self.angle_queue.pop_front();
            }
            self.angle_queue.push_back(self.gyro_angle);
        }

        if let (Some(first), Some(last)) = (self.angle_queue.front(), self.angle_queue.back()) {
            let span = self.angle_queue.len() as f64 * dt;
            let rate = (last - first) / span;
            self.bias = GyroBiasEstimate { x: rate.x, y: rate.y, z: rate.z };
        }
    }

    fn integrate_gyro(
        &mut self,
        h_mag: f64,
        gyro: &TriAxisSample,
        attitude: &AttitudeEstimate,
        dt: f64,
    ) -> f64 {
        let mut h_gyr = match self.gyro_heading {
            None => h_mag,
            Some(h) if should_reseed(h, &self.config) => {
                if angle_diff(h, h_mag) > 1e-12 {
                    debug!("heading: gyro heading {:.4} re-anchored to {:.4}", h, h_mag);
                    self.diagnostics.gyro_reseeded = true;
                }
                h_mag
            }
            Some(h) => h,
        };

        let gravity_local = lcs_to_gcs(Vec3::new(0.0, 0.0, self.gravity_z), attitude, true);
        let corrected = Vec3::from(*gyro) - Vec3::from(self.bias);
        match scalar_projection(corrected, gravity_local) {
            Some(rate) => h_gyr = angle_range(h_gyr - rate * dt, AngleRange::TwoPi),
            None => {
                warn!("heading: gravity estimate has no direction, holding gyro heading");
                self.diagnostics.projection_skipped = true;
            }
        }

        self.gyro_heading = Some(h_gyr);
        h_gyr
    }

    pub fn state(&self) -> HeadingState {
        HeadingState {
            mag_heading: self.mag_heading.unwrap_or(0.0),
            gyro_heading: self.gyro_heading.unwrap_or(0.0),
            fused_heading: self.fused_heading.unwrap_or(0.0),
        }
    }

    pub fn fused_heading(&self) -> f64 {
        self.fused_heading.unwrap_or(0.0)
    }

    pub fn bias(&self) -> GyroBiasEstimate {
        self.bias
    }

    pub fn bias_queue_len(&self) -> usize {
        self.angle_queue.len()
    }

    pub fn gravity_z(&self) -> f64 {
        self.gravity_z
    }

    pub fn diagnostics(&self) -> HeadingDiagnostics {
        self.diagnostics
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

/// Gyro heading sits just past a multiple of the re-anchor interval.
///
/// The band is one-sided, `[k·interval, k·interval + tolerance]`: a heading a
/// degree below a multiple is not re-anchored.
pub fn should_reseed(gyro_heading: f64, config: &HeadingConfig) -> bool {
    let interval = config.reseed_interval_rad;
    interval > 0.0 && angle_range(gyro_heading, AngleRange::TwoPi) % interval <= config.reseed_tolerance_rad
}

/// Fusion vote between magnetometer and gyro heading.
///
/// | mag vs gyro | mag steady | fused |
/// |---|---|---|
/// | agree | yes | `(2·prev + mag + 2·gyr) / 5` |
/// | agree | no  | `(mag + 2·gyr) / 3` |
/// | disagree | yes | `prev` |
/// | disagree | no  | `(2·prev + 2·gyr) / 4` |
///
/// Means are taken along the shortest arc. `None` if the result is not finite.
pub fn fuse_heading(
    h_mag: f64,
    h_gyr: f64,
    prev_mag: f64,
    prev_fused: f64,
    config: &HeadingConfig,
) -> Option<f64> {
    if ![h_mag, h_gyr, prev_mag, prev_fused].iter().all(|a| a.is_finite()) {
        return None;
    }
    let corr_diff = angle_diff(h_mag, h_gyr);
    let mag_diff = angle_diff(h_mag, prev_mag);
    let steady = mag_diff <= config.mag_steady_rad;

    if corr_diff <= config.fusion_agreement_rad {
        if steady {
            weighted_angle_mean(&[(2.0, prev_fused), (1.0, h_mag), (2.0, h_gyr)])
        } else {
            weighted_angle_mean(&[(1.0, h_mag), (2.0, h_gyr)])
        }
    } else if steady {
        Some(angle_range(prev_fused, AngleRange::TwoPi))
    } else {
        weighted_angle_mean(&[(2.0, prev_fused), (2.0, h_gyr)])
    }
}

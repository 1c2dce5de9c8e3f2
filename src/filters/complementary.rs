use serde::{Deserialize, Serialize};

use crate::geometry::{angle_range, signed_angle_diff, AngleRange};
use crate::types::{AttitudeEstimate, TriAxisSample};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComplementaryFilterState {
    pub attitude: AttitudeEstimate,
    pub attitude_deg: AttitudeEstimate,
    pub updates: u64,
}

/// Gyro-propagated attitude pulled towards the accelerometer/magnetometer
/// solution: `alpha·(prev + ω·dt) + (1 − alpha)·euler` per axis.
///
/// Axis mapping: pitch ← gyro.x, roll ← gyro.y, yaw ← gyro.z. Roll and yaw are
/// blended along the shortest arc so a ±π crossing does not average to zero.
pub struct ComplementaryFilter {
    alpha: f64,
    previous: Option<AttitudeEstimate>,
    updates: u64,
}

impl ComplementaryFilter {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            previous: None,
            updates: 0,
        }
    }

    pub fn update(
        &mut self,
        euler: AttitudeEstimate,
        gyro: &TriAxisSample,
        dt_ms: f64,
    ) -> AttitudeEstimate {
        let dt = dt_ms / 1000.0;
        let blended = match self.previous {
            None => euler,
            Some(prev) => {
                let pitch = self.alpha * (prev.pitch + gyro.x * dt) + (1.0 - self.alpha) * euler.pitch;
                let roll = self.blend_wrapped(prev.roll + gyro.y * dt, euler.roll);
                let yaw = self.blend_wrapped(prev.yaw + gyro.z * dt, euler.yaw);
                AttitudeEstimate { pitch, roll, yaw }
            }
        };

        let blended = if blended.pitch.is_finite() && blended.roll.is_finite() && blended.yaw.is_finite() {
            blended
        } else {
            self.previous.unwrap_or(euler)
        };

        self.previous = Some(blended);
        self.updates += 1;
        blended
    }

    fn blend_wrapped(&self, propagated: f64, measured: f64) -> f64 {
        let propagated = angle_range(propagated, AngleRange::Pi);
        let correction = signed_angle_diff(measured, propagated);
        angle_range(propagated + (1.0 - self.alpha) * correction, AngleRange::Pi)
    }

    pub fn get_state(&self) -> Option<ComplementaryFilterState> {
        self.previous.map(|attitude| ComplementaryFilterState {
            attitude,
            attitude_deg: attitude.to_degrees(),
            updates: self.updates,
        })
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.updates = 0;
    }
}

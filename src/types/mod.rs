pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};

/// One accelerometer, magnetometer or gyroscope reading in the device frame.
///
/// Accelerometer in g, gyroscope in rad/s, magnetometer in any consistent unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TriAxisSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl TriAxisSample {
    pub const ZERO: TriAxisSample = TriAxisSample { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// All three axes exactly zero: the sensor delivered no new data.
    pub fn is_degenerate(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

/// Unit the gravity estimates are tracked in. Accelerometer input is always in g.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GravityUnit {
    #[default]
    G,
    MetersPerSecondSquared,
}

impl GravityUnit {
    pub const STANDARD_GRAVITY: f64 = 9.81;

    /// Multiplier from g to this unit; also the initial gravity estimate.
    pub fn scale(&self) -> f64 {
        match self {
            GravityUnit::G => 1.0,
            GravityUnit::MetersPerSecondSquared => Self::STANDARD_GRAVITY,
        }
    }
}

/// Aligned accelerometer/magnetometer/gyroscope batch as recorded in a session log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SensorReading {
    /// Milliseconds, caller clock.
    pub timestamp: f64,
    pub acc: TriAxisSample,
    pub mag: TriAxisSample,
    pub gyro: TriAxisSample,
}

/// Device orientation relative to the global frame, radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttitudeEstimate {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

impl AttitudeEstimate {
    pub fn new(pitch: f64, roll: f64, yaw: f64) -> Self {
        Self { pitch, roll, yaw }
    }

    /// Same orientation with yaw zeroed (tilt only).
    pub fn level(&self) -> Self {
        Self { yaw: 0.0, ..*self }
    }

    pub fn to_degrees(&self) -> Self {
        Self {
            pitch: self.pitch.to_degrees(),
            roll: self.roll.to_degrees(),
            yaw: self.yaw.to_degrees(),
        }
    }
}

/// Three concurrently tracked heading hypotheses, all in `[0, 2π)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadingState {
    pub mag_heading: f64,
    pub gyro_heading: f64,
    pub fused_heading: f64,
}

/// Gyroscope drift estimate, rad/s per axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GyroBiasEstimate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<GyroBiasEstimate> for Vec3 {
    fn from(b: GyroBiasEstimate) -> Self {
        Vec3::new(b.x, b.y, b.z)
    }
}

/// A fired step with the amplitudes that feed the length regression.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Accelerometer sample index (1-based) at which the detector fired.
    pub index: u64,
    pub peak_amplitude: f64,
    pub valley_amplitude: f64,
    pub heading_at_step: f64,
}

impl StepEvent {
    pub fn peak_to_peak(&self) -> f64 {
        self.peak_amplitude - self.valley_amplitude
    }
}

/// Cumulative dead-reckoned displacement in metres.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionEstimate {
    pub x: f64,
    pub y: f64,
}

impl PositionEstimate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_from_origin(&self) -> f64 {
        self.x.hypot(self.y)
    }
}

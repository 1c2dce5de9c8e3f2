//! Pedestrian dead reckoning from phone inertial sensors.
//!
//! Feed aligned accelerometer/magnetometer/gyroscope batches into
//! [`SensorFusion::ingest`] and read back attitude, heading, step count and
//! 2D position. The crate performs no I/O and logs through the `log` facade.

pub mod error;
pub mod filters;
pub mod geometry;
pub mod position;
pub mod sensor_fusion;
pub mod smoothing;
pub mod step_detection;
pub mod step_length;
pub mod types;

pub use error::{PdrError, PdrResult};
pub use sensor_fusion::{PdrEvent, PipelineConfig, PipelineOutput, PipelineSnapshot, SensorFusion, SensorKind};
pub use types::{
    AttitudeEstimate, GravityUnit, GyroBiasEstimate, HeadingState, PositionEstimate, SensorReading, StepEvent,
    TriAxisSample,
};

// sensor_fusion.rs: pure computation layer for the PDR engine
//
// Everything in this module is independent of:
//   - sensor polling and scheduling
//   - file I/O, display, logging backends
//
// It takes aligned accelerometer/magnetometer/gyroscope batches in, produces
// attitude, heading, step and position estimates plus events out. Recorded
// sessions can be replayed through it unchanged.

use serde::{Deserialize, Serialize};

use log::{debug, warn};

use crate::error::{PdrError, PdrResult};
use crate::filters::attitude::AttitudeEstimator;
use crate::filters::complementary::ComplementaryFilter;
use crate::filters::heading::{HeadingConfig, HeadingEstimator};
use crate::geometry::degree_range;
use crate::position::{PositionTracker, TrajectoryPoint};
use crate::step_detection::{StepDetector, StepDetectorConfig};
use crate::step_length::StepLengthEstimator;
use crate::types::{
    AttitudeEstimate, GravityUnit, GyroBiasEstimate, HeadingState, PositionEstimate, SensorReading,
    StepEvent, TriAxisSample,
};

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // ── Cadence ──
    pub sample_interval_ms: f64,

    // ── Filtering ──
    pub filter_alpha: f64,
    pub attitude_smoothing: bool,
    pub invert_accel: bool,
    pub gravity_unit: GravityUnit,

    // ── Heading ──
    /// Magnetic declination subtracted from the magnetometer heading.
    pub heading_decline_rad: f64,
    pub bias_stability_threshold_rad: f64,
    pub bias_queue_capacity: usize,
    pub fusion_agreement_rad: f64,
    pub mag_steady_rad: f64,
    pub reseed_interval_rad: f64,
    pub reseed_tolerance_rad: f64,

    // ── Step detection ──
    pub peak_threshold: f64,
    pub pp_threshold: f64,
    /// Moving-average window W (odd).
    pub moving_window: usize,
    /// Detection buffer N (even, at least 4).
    pub detection_window: usize,

    // ── Step length ──
    pub step_length_threshold: f64,

    // ── Trajectory ──
    pub record_trajectory: bool,
    pub trajectory_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 100.0,
            filter_alpha: 0.95,
            attitude_smoothing: false,
            invert_accel: false,
            gravity_unit: GravityUnit::G,
            heading_decline_rad: 7.5_f64.to_radians(),
            bias_stability_threshold_rad: 0.7_f64.to_radians(),
            bias_queue_capacity: 600,
            fusion_agreement_rad: 5.0_f64.to_radians(),
            mag_steady_rad: 2.0_f64.to_radians(),
            reseed_interval_rad: 45.0_f64.to_radians(),
            reseed_tolerance_rad: 5.0_f64.to_radians(),
            peak_threshold: 0.5,
            pp_threshold: 1.0,
            moving_window: 3,
            detection_window: 6,
            step_length_threshold: 3.23,
            record_trajectory: true,
            trajectory_capacity: 10_000,
        }
    }
}

impl PipelineConfig {
    /// Reject constants the estimators cannot run with.
    pub fn validate(&self) -> PdrResult<()> {
        let invalid = |msg: String| -> PdrResult<()> { Err(PdrError::InvalidConfig(msg)) };

        if !(self.sample_interval_ms > 0.0 && self.sample_interval_ms.is_finite()) {
            return invalid(format!("sample_interval_ms must be positive, got {}", self.sample_interval_ms));
        }
        if !(0.0..1.0).contains(&self.filter_alpha) {
            return invalid(format!("filter_alpha must be in [0, 1), got {}", self.filter_alpha));
        }
        if !self.heading_decline_rad.is_finite() {
            return invalid("heading_decline_rad must be finite".to_string());
        }

        let non_negative = [
            ("peak_threshold", self.peak_threshold),
            ("pp_threshold", self.pp_threshold),
            ("bias_stability_threshold_rad", self.bias_stability_threshold_rad),
            ("step_length_threshold", self.step_length_threshold),
            ("fusion_agreement_rad", self.fusion_agreement_rad),
            ("mag_steady_rad", self.mag_steady_rad),
            ("reseed_tolerance_rad", self.reseed_tolerance_rad),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0 && value.is_finite()) {
                return invalid(format!("{} must be a non-negative number, got {}", name, value));
            }
        }
        if !(self.reseed_interval_rad > 0.0 && self.reseed_interval_rad.is_finite()) {
            return invalid(format!("reseed_interval_rad must be positive, got {}", self.reseed_interval_rad));
        }

        if self.moving_window < 1 || self.moving_window % 2 == 0 {
            return invalid(format!("moving_window must be odd, got {}", self.moving_window));
        }
        if self.detection_window < 4 || self.detection_window % 2 != 0 {
            return invalid(format!(
                "detection_window must be even and at least 4, got {}",
                self.detection_window
            ));
        }
        if self.bias_queue_capacity == 0 {
            return invalid("bias_queue_capacity must be at least 1".to_string());
        }
        Ok(())
    }

    fn heading_config(&self) -> HeadingConfig {
        HeadingConfig {
            filter_alpha: self.filter_alpha,
            declination_rad: self.heading_decline_rad,
            bias_stability_threshold_rad: self.bias_stability_threshold_rad,
            bias_queue_capacity: self.bias_queue_capacity,
            fusion_agreement_rad: self.fusion_agreement_rad,
            mag_steady_rad: self.mag_steady_rad,
            reseed_interval_rad: self.reseed_interval_rad,
            reseed_tolerance_rad: self.reseed_tolerance_rad,
            invert_accel: self.invert_accel,
            gravity_unit: self.gravity_unit,
        }
    }

    fn step_config(&self) -> StepDetectorConfig {
        StepDetectorConfig {
            peak_threshold: self.peak_threshold,
            pp_threshold: self.pp_threshold,
            moving_window: self.moving_window,
            detection_window: self.detection_window,
            filter_alpha: self.filter_alpha,
            invert_accel: self.invert_accel,
            gravity_unit: self.gravity_unit,
        }
    }

    fn trajectory_capacity(&self) -> usize {
        if self.record_trajectory {
            self.trajectory_capacity
        } else {
            0
        }
    }
}

// ─── Events ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorKind {
    Accelerometer,
    Magnetometer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PdrEvent {
    YawReferenceLatched { reference: f64 },
    SampleSkipped { sensor: SensorKind },
    GyroBiasReset { queue_len: usize },
    GyroHeadingReseeded { heading: f64 },
    StepDetected { event: StepEvent, length: f64 },
    StepRejected { peak_to_peak: f64 },
}

// ─── Pipeline output ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub timestamp: f64,
    pub attitude: AttitudeEstimate,
    pub heading: HeadingState,
    pub step_count: u64,
    pub last_step_length: f64,
    pub position: PositionEstimate,
    pub gyro_bias: GyroBiasEstimate,
    pub events: Vec<PdrEvent>,
}

impl PipelineOutput {
    /// Fused heading in `[0, 360)` degrees.
    pub fn heading_deg(&self) -> f64 {
        degree_range(self.heading.fused_heading.to_degrees())
    }

    pub fn attitude_deg(&self) -> AttitudeEstimate {
        self.attitude.to_degrees()
    }

    /// Steps accepted during this call.
    pub fn steps(&self) -> impl Iterator<Item = (&StepEvent, f64)> {
        self.events.iter().filter_map(|e| match e {
            PdrEvent::StepDetected { event, length } => Some((event, *length)),
            _ => None,
        })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct PipelineSnapshot {
    pub samples: u64,
    pub attitude: AttitudeEstimate,
    pub heading: HeadingState,
    pub step_count: u64,
    pub detections: u64,
    pub last_step_length: f64,
    pub mean_step_length: Option<f64>,
    pub position: PositionEstimate,
    pub distance_travelled: f64,
    pub gyro_bias: GyroBiasEstimate,
    pub bias_queue_len: usize,
    pub last_timestamp: Option<f64>,
}

// ─── The main pipeline struct ────────────────────────────────────────────────

pub struct SensorFusion {
    config: PipelineConfig,

    attitude: AttitudeEstimator,
    smoother: Option<ComplementaryFilter>,
    heading: HeadingEstimator,
    steps: StepDetector,
    lengths: StepLengthEstimator,
    position: PositionTracker,

    current_attitude: AttitudeEstimate,
    step_count: u64,
    samples: u64,
    last_timestamp: Option<f64>,
}

impl SensorFusion {
    pub fn new(config: PipelineConfig) -> PdrResult<Self> {
        config.validate()?;
        Ok(Self {
            attitude: AttitudeEstimator::new(config.invert_accel),
            smoother: config
                .attitude_smoothing
                .then(|| ComplementaryFilter::new(config.filter_alpha)),
            heading: HeadingEstimator::new(config.heading_config()),
            steps: StepDetector::new(config.step_config()),
            lengths: StepLengthEstimator::new(config.step_length_threshold),
            position: PositionTracker::new(config.trajectory_capacity()),
            current_attitude: AttitudeEstimate::default(),
            step_count: 0,
            samples: 0,
            last_timestamp: None,
            config,
        })
    }

    // ── Sensor feeds ─────────────────────────────────────────────────────

    /// Process one aligned batch at the configured sample interval.
    ///
    /// The timestamp is recorded but never used to derive the timestep.
    pub fn ingest(
        &mut self,
        acc: &TriAxisSample,
        mag: &TriAxisSample,
        gyro: &TriAxisSample,
        timestamp: f64,
    ) -> PipelineOutput {
        let dt_ms = self.config.sample_interval_ms;
        self.step(acc, mag, gyro, timestamp, dt_ms)
    }

    /// Like [`ingest`](Self::ingest) with an explicit timestep for this batch.
    pub fn ingest_with_interval(
        &mut self,
        acc: &TriAxisSample,
        mag: &TriAxisSample,
        gyro: &TriAxisSample,
        timestamp: f64,
        dt_ms: f64,
    ) -> PdrResult<PipelineOutput> {
        if !(dt_ms > 0.0 && dt_ms.is_finite()) {
            return Err(PdrError::InvalidTimestep(dt_ms));
        }
        Ok(self.step(acc, mag, gyro, timestamp, dt_ms))
    }

    pub fn ingest_reading(&mut self, reading: &SensorReading) -> PipelineOutput {
        self.ingest(&reading.acc, &reading.mag, &reading.gyro, reading.timestamp)
    }

    fn step(
        &mut self,
        acc: &TriAxisSample,
        mag: &TriAxisSample,
        gyro: &TriAxisSample,
        timestamp: f64,
        dt_ms: f64,
    ) -> PipelineOutput {
        let mut events = Vec::new();
        self.samples += 1;
        self.last_timestamp = Some(timestamp);

        if acc.is_degenerate() {
            events.push(PdrEvent::SampleSkipped { sensor: SensorKind::Accelerometer });
        }
        if mag.is_degenerate() {
            events.push(PdrEvent::SampleSkipped { sensor: SensorKind::Magnetometer });
        }

        // Attitude first: heading and step detection both consume it.
        let latched = self.attitude.yaw_reference().is_some();
        let euler = self.attitude.update(acc, mag);
        if !latched {
            if let Some(reference) = self.attitude.yaw_reference() {
                events.push(PdrEvent::YawReferenceLatched { reference });
            }
        }
        let attitude = match self.smoother.as_mut() {
            Some(filter) => filter.update(euler, gyro, dt_ms),
            None => euler,
        };
        self.current_attitude = attitude;

        let heading = self.heading.update(acc, mag, gyro, &attitude, dt_ms);
        let diagnostics = self.heading.diagnostics();
        if let Some(queue_len) = diagnostics.bias_queue_cleared {
            events.push(PdrEvent::GyroBiasReset { queue_len });
        }
        if diagnostics.gyro_reseeded {
            events.push(PdrEvent::GyroHeadingReseeded { heading: heading.gyro_heading });
        }

        if let Some(event) = self.steps.update(acc, &attitude).event {
            events.push(self.accept_step(event, heading.fused_heading));
        }

        PipelineOutput {
            timestamp,
            attitude,
            heading,
            step_count: self.step_count,
            last_step_length: self.lengths.last_length(),
            position: self.position.position(),
            gyro_bias: self.heading.bias(),
            events,
        }
    }

    fn accept_step(&mut self, event: StepEvent, heading: f64) -> PdrEvent {
        let length = self.lengths.estimate(event.peak_amplitude, event.valley_amplitude);
        if length > 0.0 {
            let event = event.with_heading(heading);
            self.step_count += 1;
            let pos = self.position.advance(length, heading);
            debug!(
                "pipeline: step {} length {:.3} m heading {:.1}° -> ({:.2}, {:.2})",
                self.step_count,
                length,
                degree_range(heading.to_degrees()),
                pos.x,
                pos.y
            );
            PdrEvent::StepDetected { event, length }
        } else {
            warn!(
                "pipeline: step at sample {} rejected, peak-to-peak {:.3}",
                event.index,
                event.peak_to_peak()
            );
            PdrEvent::StepRejected { peak_to_peak: event.peak_to_peak() }
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn get_snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            samples: self.samples,
            attitude: self.current_attitude,
            heading: self.heading.state(),
            step_count: self.step_count,
            detections: self.steps.detections(),
            last_step_length: self.lengths.last_length(),
            mean_step_length: self.lengths.mean_length(),
            position: self.position.position(),
            distance_travelled: self.position.distance_travelled(),
            gyro_bias: self.heading.bias(),
            bias_queue_len: self.heading.bias_queue_len(),
            last_timestamp: self.last_timestamp,
        }
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn position(&self) -> PositionEstimate {
        self.position.position()
    }

    pub fn trajectory(&self) -> impl Iterator<Item = &TrajectoryPoint> {
        self.position.trajectory()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Back to the freshly constructed state, keeping the configuration.
    pub fn reset(&mut self) {
        self.attitude.reset();
        if let Some(filter) = self.smoother.as_mut() {
            filter.reset();
        }
        self.heading.reset();
        self.steps.reset();
        self.lengths.reset();
        self.position.reset();
        self.current_attitude = AttitudeEstimate::default();
        self.step_count = 0;
        self.samples = 0;
        self.last_timestamp = None;
    }
}

//! Step event detection from vertical acceleration.
//!
//! The accelerometer is rotated into the global frame, gravity is removed with
//! a slow low-pass estimate, and the residual vertical acceleration runs
//! through two windows:
//! - a short overlapping moving average (W samples) that smooths sensor noise
//! - a detection buffer (N smoothed values) whose centre is tested for a peak
//!
//! The detection buffer slides by one value on every evaluation. The valley
//! used for step length is the lowest smoothed value seen since the last fire.

use std::collections::VecDeque;

use log::{debug, trace};

use crate::filters::oriented_accel;
use crate::geometry::{lcs_to_gcs, low_pass_filter};
use crate::smoothing::MovingAverageWindow;
use crate::types::{AttitudeEstimate, GravityUnit, StepEvent, TriAxisSample};

/// Configuration for step detection.
#[derive(Debug, Clone)]
pub struct StepDetectorConfig {
    /// Centre value must exceed this (m/s²).
    pub peak_threshold: f64,
    /// Both half-windows must deviate from the centre by more than this (m/s²).
    pub pp_threshold: f64,
    /// Moving-average window W.
    pub moving_window: usize,
    /// Detection buffer N; the centre index is N/2.
    pub detection_window: usize,
    pub filter_alpha: f64,
    pub invert_accel: bool,
    pub gravity_unit: GravityUnit,
}

impl Default for StepDetectorConfig {
    fn default() -> Self {
        Self {
            peak_threshold: 0.5,
            pp_threshold: 1.0,
            moving_window: 3,
            detection_window: 6,
            filter_alpha: 0.95,
            invert_accel: false,
            gravity_unit: GravityUnit::G,
        }
    }
}

/// Result of one [`StepDetector::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepSample {
    /// Smoothed vertical acceleration, when the moving window produced one.
    pub step_acc: Option<f64>,
    pub event: Option<StepEvent>,
}

pub struct StepDetector {
    config: StepDetectorConfig,

    gravity_z: f64,
    smoother: MovingAverageWindow,
    buffer: VecDeque<f64>,
    valley: f64,

    samples: u64,
    detections: u64,
}

impl StepDetector {
    pub fn new(config: StepDetectorConfig) -> Self {
        Self {
            gravity_z: config.gravity_unit.scale(),
            smoother: MovingAverageWindow::new(config.moving_window),
            buffer: VecDeque::with_capacity(config.detection_window),
            valley: 0.0,
            samples: 0,
            detections: 0,
            config,
        }
    }

    /// Feed one accelerometer sample with the attitude computed from it.
    ///
    /// Fired events carry `heading_at_step = 0`; see [`StepEvent::with_heading`].
    pub fn update(&mut self, acc: &TriAxisSample, attitude: &AttitudeEstimate) -> StepSample {
        if acc.is_degenerate() {
            return StepSample::default();
        }
        self.samples += 1;

        let scale = self.config.gravity_unit.scale();
        let acc_gcs = lcs_to_gcs(oriented_accel(acc, self.config.invert_accel), attitude, false);
        let vertical = acc_gcs.z * scale;
        self.gravity_z = low_pass_filter(self.gravity_z, vertical, self.config.filter_alpha);
        let acc_hpf = (vertical - self.gravity_z) * (GravityUnit::STANDARD_GRAVITY / scale);

        let step_acc = match self.smoother.push(acc_hpf) {
            Some(v) => v,
            None => return StepSample::default(),
        };

        self.buffer.push_back(step_acc);
        if self.buffer.len() < self.config.detection_window {
            return StepSample { step_acc: Some(step_acc), event: None };
        }

        let window = self.buffer.make_contiguous();
        let fired = is_step_peak(window, self.config.peak_threshold, self.config.pp_threshold);
        let centre = window[window.len() / 2];

        let event = if fired {
            self.detections += 1;
            let event = StepEvent {
                index: self.samples,
                peak_amplitude: centre,
                valley_amplitude: self.valley,
                heading_at_step: 0.0,
            };
            debug!(
                "step: fired at sample {} (peak {:.3}, valley {:.3})",
                self.samples, centre, self.valley
            );
            self.valley = 0.0;
            Some(event)
        } else {
            self.valley = self.valley.min(step_acc);
            None
        };
        self.buffer.pop_front();

        trace!("step: acc {:.4} gravity {:.4}", step_acc, self.gravity_z);
        StepSample { step_acc: Some(step_acc), event }
    }

    /// Number of times the peak heuristic has fired.
    pub fn detections(&self) -> u64 {
        self.detections
    }

    /// Current valley candidate for the next step.
    pub fn valley(&self) -> f64 {
        self.valley
    }

    pub fn gravity_z(&self) -> f64 {
        self.gravity_z
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }
}

impl StepEvent {
    pub fn with_heading(self, heading: f64) -> Self {
        Self { heading_at_step: heading, ..self }
    }
}

/// Peak heuristic on a full detection buffer, centre at `len / 2`.
///
/// - peak: centre above `peak_threshold`, a local maximum against its immediate
///   neighbours (`buffer[t-1] < centre >= buffer[t+1]`) and above at least one
///   value on each side
/// - pp: largest deviation from the centre on each side above `pp_threshold`
/// - slope: rising into the centre, falling out of it
pub fn is_step_peak(buffer: &[f64], peak_threshold: f64, pp_threshold: f64) -> bool {
    if buffer.len() < 3 {
        return false;
    }
    let t = buffer.len() / 2;
    let centre = buffer[t];
    let (left, right) = (&buffer[..t], &buffer[t + 1..]);
    if right.is_empty() {
        return false;
    }

    let peak = centre > peak_threshold
        && buffer[t - 1] < centre
        && centre >= buffer[t + 1]
        && left.iter().any(|&v| centre > v)
        && right.iter().any(|&v| centre > v);

    let max_dev = |side: &[f64]| side.iter().map(|v| (v - centre).abs()).fold(0.0, f64::max);
    let pp = max_dev(left) > pp_threshold && max_dev(right) > pp_threshold;

    let rising: f64 = buffer[..=t].windows(2).map(|w| w[1] - w[0]).sum();
    let falling: f64 = buffer[t..].windows(2).map(|w| w[1] - w[0]).sum();
    let slope = rising > 0.0 && falling < 0.0;

    peak && pp && slope
}

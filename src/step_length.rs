//! Empirical stride length from step acceleration amplitude.

use log::warn;

/// Switch point between the short-stride and long-stride fits (m/s²).
pub const DEFAULT_MODEL_THRESHOLD: f64 = 3.23;

/// Which regression produced a length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrideModel {
    /// `1.479·pp^¼ − 1.259`
    FourthRoot,
    /// `1.131·ln(pp) + 0.159`
    Logarithmic,
    /// Negative peak-to-peak; no regression applies.
    Invalid,
}

/// Length in metres for a step with the given peak and valley amplitude.
///
/// Negative peak-to-peak yields 0. Small positive amplitudes can produce a
/// negative fourth-root fit; the caller decides what to do with those.
pub fn step_length(peak: f64, valley: f64, threshold: f64) -> f64 {
    stride_model(peak - valley, threshold).1
}

fn stride_model(pp: f64, threshold: f64) -> (StrideModel, f64) {
    if !(pp >= 0.0) {
        return (StrideModel::Invalid, 0.0);
    }
    if pp < threshold {
        (StrideModel::FourthRoot, 1.479 * pp.powf(0.25) - 1.259)
    } else {
        (StrideModel::Logarithmic, 1.131 * pp.ln() + 0.159)
    }
}

/// Running stride statistics on top of [`step_length`].
#[derive(Debug, Clone)]
pub struct StepLengthEstimator {
    threshold: f64,
    last_length: f64,
    last_model: Option<StrideModel>,
    total_length: f64,
    accepted: u64,
}

impl StepLengthEstimator {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            last_length: 0.0,
            last_model: None,
            total_length: 0.0,
            accepted: 0,
        }
    }

    /// Length for one fired step. Non-positive lengths are returned but not
    /// accumulated.
    pub fn estimate(&mut self, peak: f64, valley: f64) -> f64 {
        let (model, length) = stride_model(peak - valley, self.threshold);
        if model == StrideModel::Invalid {
            warn!("step length: peak {:.3} below valley {:.3}, no stride", peak, valley);
        }
        let length = if length.is_finite() { length } else { 0.0 };

        self.last_model = Some(model);
        if length > 0.0 {
            self.last_length = length;
            self.total_length += length;
            self.accepted += 1;
        }
        length
    }

    /// Most recent accepted stride.
    pub fn last_length(&self) -> f64 {
        self.last_length
    }

    pub fn last_model(&self) -> Option<StrideModel> {
        self.last_model
    }

    pub fn mean_length(&self) -> Option<f64> {
        (self.accepted > 0).then(|| self.total_length / self.accepted as f64)
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.threshold);
    }
}

impl Default for StepLengthEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_THRESHOLD)
    }
}

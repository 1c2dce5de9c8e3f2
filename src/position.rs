//! Dead-reckoned 2D position from accepted steps.
//!
//! Heading 0 points along +y (screen up), increasing clockwise, so a step of
//! length `L` at heading `h` moves by `(L·sin h, L·cos h)`. There is no drift
//! correction.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::PositionEstimate;

/// One recorded position with the step that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub step: u64,
    pub position: PositionEstimate,
    pub heading: f64,
    pub length: f64,
}

pub struct PositionTracker {
    position: PositionEstimate,
    steps: u64,
    distance: f64,
    history: VecDeque<TrajectoryPoint>,
    history_capacity: usize,
}

impl PositionTracker {
    /// `history_capacity = 0` disables trajectory recording.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            position: PositionEstimate::default(),
            steps: 0,
            distance: 0.0,
            history: VecDeque::with_capacity(history_capacity.min(1024)),
            history_capacity,
        }
    }

    pub fn advance(&mut self, length: f64, heading: f64) -> PositionEstimate {
        let (sin_h, cos_h) = heading.sin_cos();
        self.position.x += length * sin_h;
        self.position.y += length * cos_h;
        self.steps += 1;
        self.distance += length.abs();

        if self.history_capacity > 0 {
            if self.history.len() >= self.history_capacity {
                self.history.pop_front();
            }
            self.history.push_back(TrajectoryPoint {
                step: self.steps,
                position: self.position,
                heading,
                length,
            });
        }
        self.position
    }

    pub fn position(&self) -> PositionEstimate {
        self.position
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Path length walked, as opposed to displacement.
    pub fn distance_travelled(&self) -> f64 {
        self.distance
    }

    /// Oldest first. Bounded; older points are dropped once full.
    pub fn trajectory(&self) -> impl Iterator<Item = &TrajectoryPoint> {
        self.history.iter()
    }

    pub fn reset(&mut self) {
        self.position = PositionEstimate::default();
        self.steps = 0;
        self.distance = 0.0;
        self.history.clear();
    }
}

use std::collections::VecDeque;

/// Overlapping moving-average window for vertical step acceleration.
///
/// Once `window_size` samples are buffered the mean is emitted and the oldest
/// `(window_size - 1) / 2` samples are dropped, so consecutive means share the
/// newer half of the window instead of restarting from empty.
pub struct MovingAverageWindow {
    window: VecDeque<f64>,
    window_size: usize,
}

impl MovingAverageWindow {
    /// Create a new window (typically 3 or 5 samples)
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        MovingAverageWindow {
            window: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Push one sample; returns the window mean whenever the window is full.
    pub fn push(&mut self, value: f64) -> Option<f64> {
        self.window.push_back(value);
        if self.window.len() < self.window_size {
            return None;
        }

        let mean = self.window.iter().sum::<f64>() / self.window.len() as f64;

        // Always make room for at least one new sample
        let evict = ((self.window_size - 1) / 2).max(1);
        self.window.drain(..evict.min(self.window.len()));

        Some(mean)
    }

    /// Get current fill (actual, not max)
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

use std::collections::VecDeque;

/// Feedback records required before the degradation signal can fire; a
/// couple of early corrections should not trigger a retrain.
const MIN_OBSERVATIONS: usize = 10;

/// Rolling accuracy over the most recent feedback records.
///
/// Each record is one reviewer verdict: `true` when the classification was
/// confirmed, `false` when it was corrected.
#[derive(Debug)]
pub struct AccuracyMonitor {
    window: VecDeque<bool>,
    capacity: usize,
    degradation_threshold: f64,
}

impl AccuracyMonitor {
    pub fn new(capacity: usize, degradation_threshold: f64) -> Self {
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            degradation_threshold,
        }
    }

    pub fn record(&mut self, correct: bool) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(correct);
    }

    /// Trailing-window accuracy; `None` until any feedback has arrived
    pub fn accuracy(&self) -> Option<f64> {
        if self.window.is_empty() {
            return None;
        }
        let correct = self.window.iter().filter(|&&c| c).count();
        Some(correct as f64 / self.window.len() as f64)
    }

    /// Whether trailing accuracy has dropped below the threshold
    pub fn degraded(&self) -> bool {
        if self.window.len() < MIN_OBSERVATIONS {
            return false;
        }
        match self.accuracy() {
            Some(acc) => acc < self.degradation_threshold,
            None => false,
        }
    }

    /// Clear the window, used after a new model is promoted
    pub fn reset(&mut self) {
        self.window.clear();
    }

    pub fn observations(&self) -> usize {
        self.window.len()
    }
}

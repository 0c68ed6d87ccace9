//! Rolling pace estimation.
//!
//! The displayed pace is a simple moving average over the last few
//! recomputations (one per accepted GPS fix). The window counts samples,
//! not seconds: with a 1-5 s fix rate, five samples cover roughly the last
//! 5-25 seconds of running.

use std::collections::VecDeque;

use crate::TrackerConfig;

/// Default number of pace samples averaged.
pub const DEFAULT_PACE_WINDOW: usize = 5;

/// Bounded FIFO of pace samples in seconds per km.
#[derive(Debug, Clone, PartialEq)]
pub struct PaceWindow {
    capacity: usize,
    samples: VecDeque<f64>,
}

impl PaceWindow {
    /// Create an empty window. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a sample, evicting the oldest once over capacity.
    pub fn push(&mut self, pace: f64) {
        self.samples.push_back(pace);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Arithmetic mean of the samples currently held.
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.samples.iter()
    }
}

impl Default for PaceWindow {
    fn default() -> Self {
        Self::new(DEFAULT_PACE_WINDOW)
    }
}

/// Computes the smoothed pace from session totals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaceEstimator {
    /// Below this distance no pace is reported
    pub min_distance_meters: f64,
    /// Below this elapsed time no pace is reported
    pub min_elapsed_seconds: u64,
}

impl PaceEstimator {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            min_distance_meters: config.min_pace_distance_meters,
            min_elapsed_seconds: 1,
        }
    }

    /// Recompute the smoothed pace in seconds per km.
    ///
    /// Each call that yields a reading pushes one sample into `window`, so
    /// call it exactly once per logical tick; extra calls weight the average
    /// towards the current instant.
    ///
    /// ```
    /// use pace_tracker::{PaceEstimator, PaceWindow, TrackerConfig};
    ///
    /// let estimator = PaceEstimator::from_config(&TrackerConfig::default());
    /// let mut window = PaceWindow::default();
    /// assert_eq!(estimator.current_pace(5.0, 100, &mut window), None);
    /// let pace = estimator.current_pace(15.0, 100, &mut window).unwrap();
    /// assert!((pace - 6666.67).abs() < 0.01);
    /// ```
    pub fn current_pace(
        &self,
        total_distance_meters: f64,
        elapsed_seconds: u64,
        window: &mut PaceWindow,
    ) -> Option<f64> {
        if !(total_distance_meters >= self.min_distance_meters)
            || elapsed_seconds < self.min_elapsed_seconds
        {
            return None;
        }

        let instant = elapsed_seconds as f64 / (total_distance_meters / 1000.0);
        window.push(instant);
        window.average()
    }
}

impl Default for PaceEstimator {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

//! Bounded rolling window with a simple moving average.
//!
//! Holds the last `capacity` values. Statistics are only reported once the
//! window is full; a partially filled window yields `None`.

use std::collections::VecDeque;

use super::bollinger::BandLevels;

#[derive(Debug, Clone, PartialEq)]
pub struct RollingWindow {
    capacity: usize,
    values: VecDeque<f64>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "window capacity must be >= 1");
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Arithmetic mean of the window, once full.
    pub fn mean(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.capacity as f64)
    }

    /// Mean ± `multiplier` population standard deviations, once full.
    pub fn bands(&self, multiplier: f64) -> Option<BandLevels> {
        let mean = self.mean()?;
        Some(BandLevels::around(mean, self.values.iter().copied(), multiplier))
    }
}

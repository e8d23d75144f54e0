//! Relative Strength Index (RSI), incremental form.
//!
//! Wilder smoothing (RMA, alpha = 1/period) of gains and losses between
//! consecutive closes. The accumulators are seeded with the raw gain/loss of
//! the second bar, not blended, and every later bar is smoothed:
//!
//! ```text
//! avg_gain = alpha * gain + (1 - alpha) * avg_gain
//! RSI      = 100 - 100 / (1 + avg_gain / avg_loss)
//! ```
//!
//! Edge cases: avg_loss == 0 → RSI = 100; avg_gain == 0 → RSI = 0.
//! The very first bar has no change to measure and reports a neutral 50.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, RsiConfig};

/// RSI reported before any price change has been observed.
pub const NEUTRAL_RSI: f64 = 50.0;

/// Smoothing accumulators for one (instrument, timeframe, strategy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RsiState {
    period: usize,
    smoothed_gain: f64,
    smoothed_loss: f64,
    bars_seen: usize,
    last_close: Option<f64>,
    last_rsi: f64,
}

impl RsiState {
    pub fn new(config: &RsiConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            period: config.period,
            smoothed_gain: 0.0,
            smoothed_loss: 0.0,
            bars_seen: 0,
            last_close: None,
            last_rsi: NEUTRAL_RSI,
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn smoothed_gain(&self) -> f64 {
        self.smoothed_gain
    }

    pub fn smoothed_loss(&self) -> f64 {
        self.smoothed_loss
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    /// Forget all history, as if no bar had been seen.
    pub fn reset(&mut self) {
        self.smoothed_gain = 0.0;
        self.smoothed_loss = 0.0;
        self.bars_seen = 0;
        self.last_close = None;
        self.last_rsi = NEUTRAL_RSI;
    }

    /// Feed one close and return the RSI for that bar.
    ///
    /// A non-finite close leaves the state untouched and repeats the last
    /// reported value.
    pub fn update(&mut self, close: f64) -> f64 {
        if !close.is_finite() {
            return self.last_rsi;
        }

        let Some(prev) = self.last_close else {
            self.last_close = Some(close);
            self.bars_seen = 1;
            self.last_rsi = NEUTRAL_RSI;
            return NEUTRAL_RSI;
        };

        let change = close - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);

        if self.bars_seen == 1 {
            // Raw seed on the second bar.
            self.smoothed_gain = gain;
            self.smoothed_loss = loss;
        } else {
            let alpha = 1.0 / self.period as f64;
            self.smoothed_gain = alpha * gain + (1.0 - alpha) * self.smoothed_gain;
            self.smoothed_loss = alpha * loss + (1.0 - alpha) * self.smoothed_loss;
        }

        self.bars_seen += 1;
        self.last_close = Some(close);
        self.last_rsi = compute_rsi(self.smoothed_gain, self.smoothed_loss);
        self.last_rsi
    }
}

fn compute_rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        (100.0 - 100.0 / (1.0 + avg_gain / avg_loss)).clamp(0.0, 100.0)
    }
}

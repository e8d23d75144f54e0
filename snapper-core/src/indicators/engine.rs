//! Streaming indicator engine: one price bar in, one snapshot out.
//!
//! Owns the RSI accumulators, the rolling window of RSI values used for the
//! moving average / envelope, and the rolling window of closes used for the
//! price bands. All state is per instance, so independent instruments and
//! timeframes never share accumulators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, PriceBandConfig, RsiConfig, SmoothingConfig, SnapperConfig};
use crate::domain::PriceBar;

use super::bollinger::BandLevels;
use super::rsi::RsiState;
use super::sma::RollingWindow;

/// Indicator values for a single bar.
///
/// `None` marks a value that is unavailable (insufficient history or not
/// configured). It is never substituted with `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub bar_index: usize,
    pub rsi: f64,
    pub ma_value: Option<f64>,
    pub upper_band: Option<f64>,
    pub lower_band: Option<f64>,
    /// Bollinger bands over the close price.
    pub price_bands: Option<BandLevels>,
}

#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    rsi: RsiState,
    smoothing: SmoothingConfig,
    rsi_window: RollingWindow,
    price_band_multiplier: f64,
    price_window: RollingWindow,
    bars_seen: usize,
    last_timestamp: Option<DateTime<Utc>>,
}

impl IndicatorEngine {
    pub fn new(
        rsi: &RsiConfig,
        smoothing: &SmoothingConfig,
        price_bands: &PriceBandConfig,
    ) -> Result<Self, ConfigError> {
        smoothing.validate()?;
        price_bands.validate()?;
        Ok(Self {
            rsi: RsiState::new(rsi)?,
            smoothing: smoothing.clone(),
            rsi_window: RollingWindow::new(smoothing.length),
            price_band_multiplier: price_bands.multiplier,
            price_window: RollingWindow::new(price_bands.length),
            bars_seen: 0,
            last_timestamp: None,
        })
    }

    pub fn from_config(config: &SnapperConfig) -> Result<Self, ConfigError> {
        Self::new(&config.rsi, &config.smoothing, &config.price_bands)
    }

    pub fn rsi_state(&self) -> &RsiState {
        &self.rsi
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    /// Bars of history needed before every configured value is available.
    pub fn warmup_requirement(&self) -> usize {
        // The first bar has no change, so RSI-derived values need one bar more
        // than their window.
        (self.rsi.period() + 1)
            .max(self.rsi_window.capacity() + 1)
            .max(self.price_window.capacity())
    }

    pub fn reset(&mut self) {
        self.rsi.reset();
        self.rsi_window.clear();
        self.price_window.clear();
        self.bars_seen = 0;
        self.last_timestamp = None;
    }

    /// Rebuild state from `history`, discarding whatever was there before.
    ///
    /// Replaying the same history always yields the same state. Returns the
    /// snapshot of the last replayed bar.
    pub fn warm_up(&mut self, history: &[PriceBar]) -> Option<IndicatorSnapshot> {
        self.reset();
        history.iter().map(|bar| self.update(bar)).last()
    }

    pub fn update(&mut self, bar: &PriceBar) -> IndicatorSnapshot {
        debug_assert!(
            self.last_timestamp.map_or(true, |t| bar.timestamp > t),
            "price feed delivered non-increasing timestamp {}",
            bar.timestamp
        );
        self.last_timestamp = Some(bar.timestamp);

        let bar_index = self.bars_seen;
        self.bars_seen += 1;

        let rsi = self.rsi.update(bar.close);
        if bar.close.is_finite() {
            // The neutral first-bar RSI is a placeholder and stays out of the average.
            if self.rsi.bars_seen() > 1 {
                self.rsi_window.push(rsi);
            }
            self.price_window.push(bar.close);
        }

        let ma_type = self.smoothing.ma_type;
        let ma_value = if ma_type.produces_average() {
            self.rsi_window.mean()
        } else {
            None
        };
        let envelope = if ma_type.produces_bands() {
            self.rsi_window.bands(self.smoothing.bb_multiplier)
        } else {
            None
        };

        IndicatorSnapshot {
            bar_index,
            rsi,
            ma_value,
            upper_band: envelope.map(|b| b.upper),
            lower_band: envelope.map(|b| b.lower),
            price_bands: self.price_window.bands(self.price_band_multiplier),
        }
    }
}

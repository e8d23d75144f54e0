//! Lagged bullish/bearish divergence between price and RSI.
//!
//! A pivot bar `p` is evaluated `lookback` bars after it closed and compared
//! with the bar `comparison_offset` bars before it:
//!
//! - Bullish: lower low in price, higher RSI, RSI below the oversold gate.
//! - Bearish: higher high in price, lower RSI, RSI above the overbought gate.
//!
//! Events are therefore always `lookback` bars late. History lives in a ring
//! buffer of `lookback + comparison_offset + 1` samples, so each bar costs
//! O(1) and a pivot is evaluated exactly once.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ConfigError, DivergenceConfig};
use crate::domain::PriceBar;
use crate::indicators::IndicatorSnapshot;

/// Distance between the RSI line and the plotted divergence arrow.
pub const MARKER_OFFSET: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergenceKind {
    Bullish,
    Bearish,
}

/// A confirmed divergence at a past pivot bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DivergenceEvent {
    pub pivot_bar_index: usize,
    /// Bar on which the event was confirmed (`pivot_bar_index + lookback`).
    pub emitted_at_bar: usize,
    pub kind: DivergenceKind,
    /// Low of the pivot for bullish events, high for bearish events.
    pub price_extreme: f64,
    /// RSI at the pivot.
    pub indicator_extreme: f64,
}

impl DivergenceEvent {
    /// Where a renderer draws the arrow: below the RSI line for bullish,
    /// above it for bearish.
    pub fn marker(&self) -> f64 {
        match self.kind {
            DivergenceKind::Bullish => self.indicator_extreme - MARKER_OFFSET,
            DivergenceKind::Bearish => self.indicator_extreme + MARKER_OFFSET,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    low: f64,
    high: f64,
    rsi: f64,
}

#[derive(Debug, Clone)]
pub struct DivergenceDetector {
    config: DivergenceConfig,
    samples: VecDeque<Sample>,
}

impl DivergenceDetector {
    pub fn new(config: &DivergenceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let capacity = config.lookback + config.comparison_offset + 1;
        Ok(Self {
            config: config.clone(),
            samples: VecDeque::with_capacity(capacity),
        })
    }

    /// Bars of history needed before the first pivot can be evaluated.
    pub fn warmup_requirement(&self) -> usize {
        self.capacity()
    }

    fn capacity(&self) -> usize {
        self.config.lookback + self.config.comparison_offset + 1
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// Record a bar without evaluating its pivot.
    ///
    /// Used while warming up: the buffer fills, but pivots that fall inside
    /// the warm-up history are never reported.
    pub fn prime(&mut self, bar: &PriceBar, snapshot: &IndicatorSnapshot) {
        if self.samples.len() == self.capacity() {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample {
            low: bar.low,
            high: bar.high,
            rsi: snapshot.rsi,
        });
    }

    /// Record the bar and evaluate the pivot `lookback` bars back.
    pub fn on_bar(&mut self, bar: &PriceBar, snapshot: &IndicatorSnapshot) -> Option<DivergenceEvent> {
        self.prime(bar, snapshot);
        if !self.config.enabled || self.samples.len() < self.capacity() {
            return None;
        }

        // Full buffer: front is p - D, back is the current bar, pivot sits L from the back.
        let reference = self.samples[0];
        let pivot = self.samples[self.config.comparison_offset];
        let pivot_bar_index = snapshot.bar_index.checked_sub(self.config.lookback)?;

        let kind = if pivot.low < reference.low
            && pivot.rsi > reference.rsi
            && pivot.rsi < self.config.oversold_gate
        {
            DivergenceKind::Bullish
        } else if pivot.high > reference.high
            && pivot.rsi < reference.rsi
            && pivot.rsi > self.config.overbought_gate
        {
            DivergenceKind::Bearish
        } else {
            return None;
        };

        let event = DivergenceEvent {
            pivot_bar_index,
            emitted_at_bar: snapshot.bar_index,
            kind,
            price_extreme: match kind {
                DivergenceKind::Bullish => pivot.low,
                DivergenceKind::Bearish => pivot.high,
            },
            indicator_extreme: pivot.rsi,
        };
        debug!(
            kind = ?event.kind,
            pivot = event.pivot_bar_index,
            rsi = event.indicator_extreme,
            "divergence confirmed"
        );
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const L: usize = 5;
    const D: usize = 10;

    fn detector() -> DivergenceDetector {
        DivergenceDetector::new(&DivergenceConfig {
            enabled: true,
            lookback: L,
            comparison_offset: D,
            oversold_gate: 35.0,
            overbought_gate: 65.0,
        })
        .unwrap()
    }

    fn bar(i: usize, low: f64, high: f64) -> PriceBar {
        let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        PriceBar {
            timestamp: base + chrono::Duration::hours(i as i64),
            open: (low + high) / 2.0,
            high,
            low,
            close: (low + high) / 2.0,
            volume: 1000,
        }
    }

    fn snap(i: usize, rsi: f64) -> IndicatorSnapshot {
        IndicatorSnapshot {
            bar_index: i,
            rsi,
            ma_value: None,
            upper_band: None,
            lower_band: None,
            price_bands: None,
        }
    }

    /// Feed `n` bars, overriding the pivot (index `p`) and its reference
    /// (index `p - D`). Returns the events with the bar they appeared on.
    fn run(n: usize, p: usize, pivot: (f64, f64, f64), reference: (f64, f64, f64)) -> Vec<(usize, DivergenceEvent)> {
        let mut det = detector();
        let mut events = Vec::new();
        for i in 0..n {
            let (low, high, rsi) = if i == p {
                pivot
            } else if i == p - D {
                reference
            } else {
                (99.0, 101.0, 50.0)
            };
            if let Some(ev) = det.on_bar(&bar(i, low, high), &snap(i, rsi)) {
                events.push((i, ev));
            }
        }
        events
    }

    #[test]
    fn bullish_emitted_lookback_bars_late() {
        let p = 15;
        let events = run(30, p, (95.0, 101.0, 30.0), (97.0, 101.0, 25.0));
        assert_eq!(events.len(), 1);
        let (seen_at, ev) = events[0];
        assert_eq!(seen_at, p + L);
        assert_eq!(ev.emitted_at_bar, p + L);
        assert_eq!(ev.pivot_bar_index, p);
        assert_eq!(ev.kind, DivergenceKind::Bullish);
        assert_eq!(ev.price_extreme, 95.0);
        assert_eq!(ev.indicator_extreme, 30.0);
        assert_eq!(ev.marker(), 25.0);
    }

    #[test]
    fn nothing_before_confirmation_lag() {
        let p = 15;
        let events = run(p + L, p, (95.0, 101.0, 30.0), (97.0, 101.0, 25.0));
        assert!(events.is_empty());
    }

    #[test]
    fn bullish_requires_oversold_gate() {
        let events = run(30, 15, (95.0, 101.0, 36.0), (97.0, 101.0, 25.0));
        assert!(events.is_empty());
    }

    #[test]
    fn bearish_divergence() {
        let p = 12;
        let events = run(25, p, (99.0, 106.0, 70.0), (99.0, 104.0, 80.0));
        assert_eq!(events.len(), 1);
        let (_, ev) = events[0];
        assert_eq!(ev.kind, DivergenceKind::Bearish);
        assert_eq!(ev.pivot_bar_index, p);
        assert_eq!(ev.price_extreme, 106.0);
        assert_eq!(ev.marker(), 75.0);
    }

    #[test]
    fn bearish_requires_overbought_gate() {
        let events = run(25, 12, (99.0, 106.0, 60.0), (99.0, 104.0, 80.0));
        assert!(events.is_empty());
    }

    #[test]
    fn needs_lookback_plus_offset_history() {
        let det = detector();
        assert_eq!(det.warmup_requirement(), L + D + 1);
        // Pivot at p = D is the earliest that can fire.
        let events = run(D + L + 1, D, (95.0, 101.0, 30.0), (97.0, 101.0, 25.0));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, D + L);
    }

    #[test]
    fn primed_pivots_never_reported() {
        let mut det = detector();
        let p = 15;
        for i in 0..(p + L) {
            let (low, rsi) = match i {
                15 => (95.0, 30.0),
                5 => (97.0, 25.0),
                _ => (99.0, 50.0),
            };
            det.prime(&bar(i, low, 101.0), &snap(i, rsi));
        }
        // The confirming bar arrives live: the pivot is evaluated once.
        let ev = det.on_bar(&bar(p + L, 99.0, 101.0), &snap(p + L, 50.0));
        assert!(ev.is_some());
        // The next bar moves on to the following pivot.
        let ev = det.on_bar(&bar(p + L + 1, 99.0, 101.0), &snap(p + L + 1, 50.0));
        assert!(ev.is_none());
    }

    #[test]
    fn disabled_detector_is_silent() {
        let mut det = DivergenceDetector::new(&DivergenceConfig {
            enabled: false,
            ..DivergenceConfig::default()
        })
        .unwrap();
        for i in 0..40 {
            let low = if i == 20 { 90.0 } else { 99.0 };
            let rsi = if i == 20 { 30.0 } else { 20.0 };
            assert!(det.on_bar(&bar(i, low, 101.0), &snap(i, rsi)).is_none());
        }
    }

    #[test]
    fn zero_lookback_rejected() {
        let config = DivergenceConfig {
            lookback: 0,
            ..DivergenceConfig::default()
        };
        assert!(DivergenceDetector::new(&config).is_err());
    }
}

//! Entry/exit rules, one implementation per configured policy.

use crate::config::{require_percent, ConfigError, PolicyConfig};
use crate::divergence::DivergenceEvent;
use crate::domain::{Direction, PriceBar};
use crate::indicators::IndicatorSnapshot;

/// Everything a policy may look at for one bar.
#[derive(Debug, Clone, Copy)]
pub struct BarContext<'a> {
    pub bar: &'a PriceBar,
    pub snapshot: &'a IndicatorSnapshot,
    /// Divergence confirmed on this bar. Neither built-in policy trades on
    /// it; custom policies may.
    pub divergence: Option<&'a DivergenceEvent>,
}

/// Transition rules for a flat or positioned strategy.
///
/// `entry` is only consulted while flat and `should_exit` only while holding
/// a position; the state machine guarantees that.
pub trait TransitionPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// Direction to enter on this bar, if any.
    fn entry(&self, ctx: &BarContext<'_>) -> Option<Direction>;

    /// Whether a position held in `direction` should be closed on this bar.
    fn should_exit(&self, direction: Direction, ctx: &BarContext<'_>) -> bool;

    /// Order comment attached to an entry.
    fn entry_label(&self, direction: Direction) -> String;
}

// ─── Oscillator threshold ────────────────────────────────────────────

/// Enter long below `buy_threshold`, short above `sell_threshold`; exit when
/// RSI reverts to `exit_level`.
#[derive(Debug, Clone)]
pub struct OscillatorThreshold {
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub exit_level: f64,
}

impl OscillatorThreshold {
    pub fn new(buy_threshold: f64, sell_threshold: f64, exit_level: f64) -> Result<Self, ConfigError> {
        require_percent("policy.buy_threshold", buy_threshold)?;
        require_percent("policy.sell_threshold", sell_threshold)?;
        require_percent("policy.exit_level", exit_level)?;
        Ok(Self {
            buy_threshold,
            sell_threshold,
            exit_level,
        })
    }
}

impl TransitionPolicy for OscillatorThreshold {
    fn name(&self) -> &str {
        "oscillator_threshold"
    }

    fn entry(&self, ctx: &BarContext<'_>) -> Option<Direction> {
        let rsi = ctx.snapshot.rsi;
        if rsi < self.buy_threshold {
            Some(Direction::Long)
        } else if rsi > self.sell_threshold {
            Some(Direction::Short)
        } else {
            None
        }
    }

    fn should_exit(&self, direction: Direction, ctx: &BarContext<'_>) -> bool {
        let rsi = ctx.snapshot.rsi;
        match direction {
            Direction::Long => rsi >= self.exit_level,
            Direction::Short => rsi <= self.exit_level,
        }
    }

    fn entry_label(&self, direction: Direction) -> String {
        match direction {
            Direction::Long => format!("RSI Under {}", self.buy_threshold),
            Direction::Short => format!("RSI Over {}", self.sell_threshold),
        }
    }
}

// ─── Band confirmation ───────────────────────────────────────────────

/// Enter when the close breaks out of its Bollinger band and RSI confirms the
/// extreme; exit when price reverts to the middle band.
///
/// No transition fires while the price bands are still warming up.
#[derive(Debug, Clone)]
pub struct BandConfirmation {
    pub oversold_gate: f64,
    pub overbought_gate: f64,
}

impl BandConfirmation {
    pub fn new(oversold_gate: f64, overbought_gate: f64) -> Result<Self, ConfigError> {
        require_percent("policy.oversold_gate", oversold_gate)?;
        require_percent("policy.overbought_gate", overbought_gate)?;
        Ok(Self {
            oversold_gate,
            overbought_gate,
        })
    }
}

impl TransitionPolicy for BandConfirmation {
    fn name(&self) -> &str {
        "band_confirmation"
    }

    fn entry(&self, ctx: &BarContext<'_>) -> Option<Direction> {
        let bands = ctx.snapshot.price_bands?;
        let close = ctx.bar.close;
        let rsi = ctx.snapshot.rsi;
        if close < bands.lower && rsi < self.oversold_gate {
            Some(Direction::Long)
        } else if close > bands.upper && rsi > self.overbought_gate {
            Some(Direction::Short)
        } else {
            None
        }
    }

    fn should_exit(&self, direction: Direction, ctx: &BarContext<'_>) -> bool {
        let Some(bands) = ctx.snapshot.price_bands else {
            return false;
        };
        let price = ctx.bar.close;
        match direction {
            Direction::Long => price >= bands.middle,
            Direction::Short => price <= bands.middle,
        }
    }

    fn entry_label(&self, direction: Direction) -> String {
        match direction {
            Direction::Long => "Snapper Long".into(),
            Direction::Short => "Snapper Short".into(),
        }
    }
}

/// Build the configured policy.
pub fn create_policy(config: &PolicyConfig) -> Result<Box<dyn TransitionPolicy>, ConfigError> {
    match *config {
        PolicyConfig::OscillatorThreshold {
            buy_threshold,
            sell_threshold,
            exit_level,
        } => Ok(Box::new(OscillatorThreshold::new(
            buy_threshold,
            sell_threshold,
            exit_level,
        )?)),
        PolicyConfig::BandConfirmation {
            oversold_gate,
            overbought_gate,
        } => Ok(Box::new(BandConfirmation::new(oversold_gate, overbought_gate)?)),
    }
}

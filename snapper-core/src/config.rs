//! Serializable strategy configuration.
//!
//! One `SnapperConfig` describes a single strategy instance: the instrument it
//! trades, its identity tag, indicator parameters, the transition policy and
//! the heartbeat cadence. It is loaded from TOML once at startup, validated,
//! and never mutated afterwards. Every component re-validates the slice of
//! configuration it is built from, so invalid values fail at construction and
//! never at runtime.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{ConfigHash, StrategyId};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: `{field}` {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ─── Validation helpers ──────────────────────────────────────────────

pub(crate) fn require_nonzero(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be > 0".into(),
        });
    }
    Ok(())
}

pub(crate) fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("must be positive and finite, got {value}"),
        });
    }
    Ok(())
}

pub(crate) fn require_percent(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("must be within [0, 100], got {value}"),
        });
    }
    Ok(())
}

// ─── Indicator configuration ─────────────────────────────────────────

/// Moving-average variant applied over the RSI series.
///
/// Every variant other than `None` reports the arithmetic mean of the window;
/// `SmaBands` additionally reports the Bollinger envelope around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaType {
    None,
    #[default]
    Sma,
    SmaBands,
    Ema,
    Smma,
    Wma,
}

impl MaType {
    pub fn produces_average(self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn produces_bands(self) -> bool {
        matches!(self, Self::SmaBands)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiConfig {
    pub period: usize,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl RsiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero("rsi.period", self.period)
    }
}

/// Smoothing of the RSI series (moving average and optional bands).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub ma_type: MaType,
    pub length: usize,
    pub bb_multiplier: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            ma_type: MaType::Sma,
            length: 14,
            bb_multiplier: 2.0,
        }
    }
}

impl SmoothingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero("smoothing.length", self.length)?;
        require_positive("smoothing.bb_multiplier", self.bb_multiplier)
    }
}

/// Bollinger bands over the close price, used by the band-confirmation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceBandConfig {
    pub length: usize,
    pub multiplier: f64,
}

impl Default for PriceBandConfig {
    fn default() -> Self {
        Self {
            length: 20,
            multiplier: 2.0,
        }
    }
}

impl PriceBandConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero("price_bands.length", self.length)?;
        require_positive("price_bands.multiplier", self.multiplier)
    }
}

// ─── Divergence ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivergenceConfig {
    pub enabled: bool,
    /// Confirmation lag: the pivot is evaluated this many bars after it closes.
    pub lookback: usize,
    /// Distance between the pivot and the bar it is compared against.
    pub comparison_offset: usize,
    pub oversold_gate: f64,
    pub overbought_gate: f64,
}

impl Default for DivergenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lookback: 5,
            comparison_offset: 10,
            oversold_gate: 35.0,
            overbought_gate: 65.0,
        }
    }
}

impl DivergenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero("divergence.lookback", self.lookback)?;
        require_nonzero("divergence.comparison_offset", self.comparison_offset)?;
        require_percent("divergence.oversold_gate", self.oversold_gate)?;
        require_percent("divergence.overbought_gate", self.overbought_gate)
    }
}

// ─── Transition policy ───────────────────────────────────────────────

fn default_exit_level() -> f64 {
    50.0
}

/// Which transition rules the trading state machine applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfig {
    /// Enter on RSI extremes, exit when RSI reverts to `exit_level`.
    OscillatorThreshold {
        buy_threshold: f64,
        sell_threshold: f64,
        #[serde(default = "default_exit_level")]
        exit_level: f64,
    },
    /// Enter when price closes outside its Bollinger band with RSI confirming,
    /// exit when price reverts to the middle band.
    BandConfirmation {
        oversold_gate: f64,
        overbought_gate: f64,
    },
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::OscillatorThreshold {
            buy_threshold: 37.0,
            sell_threshold: 67.0,
            exit_level: default_exit_level(),
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::OscillatorThreshold {
                buy_threshold,
                sell_threshold,
                exit_level,
            } => {
                require_percent("policy.buy_threshold", buy_threshold)?;
                require_percent("policy.sell_threshold", sell_threshold)?;
                require_percent("policy.exit_level", exit_level)
            }
            Self::BandConfirmation {
                oversold_gate,
                overbought_gate,
            } => {
                require_percent("policy.oversold_gate", oversold_gate)?;
                require_percent("policy.overbought_gate", overbought_gate)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OscillatorThreshold { .. } => "oscillator_threshold",
            Self::BandConfirmation { .. } => "band_confirmation",
        }
    }
}

// ─── Heartbeat / notifications ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub interval_seconds: i64,
    pub send_on_start: bool,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 4 * 3600,
            send_on_start: true,
        }
    }
}

impl HeartbeatConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_seconds <= 0 {
            return Err(ConfigError::Invalid {
                field: "heartbeat.interval_seconds",
                reason: format!("must be > 0, got {}", self.interval_seconds),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Send a message on every entry. Exit messages are always sent.
    pub notify_trades: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            notify_trades: true,
        }
    }
}

// ─── Top level ───────────────────────────────────────────────────────

/// Complete configuration for one strategy instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapperConfig {
    pub instrument: String,
    pub strategy_id: StrategyId,
    pub lot_size: f64,
    /// Leading bars of a replay fed through warm-up instead of live decisions.
    pub warmup_bars: usize,
    pub rsi: RsiConfig,
    pub smoothing: SmoothingConfig,
    pub price_bands: PriceBandConfig,
    pub policy: PolicyConfig,
    pub divergence: DivergenceConfig,
    pub heartbeat: HeartbeatConfig,
    pub notifications: NotificationConfig,
}

impl Default for SnapperConfig {
    fn default() -> Self {
        Self {
            instrument: "EURUSD".into(),
            strategy_id: StrategyId(987654),
            lot_size: 0.02,
            warmup_bars: 100,
            rsi: RsiConfig::default(),
            smoothing: SmoothingConfig::default(),
            price_bands: PriceBandConfig::default(),
            policy: PolicyConfig::default(),
            divergence: DivergenceConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl SnapperConfig {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instrument.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "instrument",
                reason: "must not be empty".into(),
            });
        }
        require_positive("lot_size", self.lot_size)?;
        self.rsi.validate()?;
        self.smoothing.validate()?;
        self.price_bands.validate()?;
        self.policy.validate()?;
        self.divergence.validate()?;
        self.heartbeat.validate()
    }

    /// Deterministic hash of this configuration.
    ///
    /// Two runs with identical configs share the same fingerprint.
    pub fn fingerprint(&self) -> ConfigHash {
        let json = serde_json::to_vec(self).expect("SnapperConfig serialization failed");
        ConfigHash::of_bytes(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SnapperConfig::default().validate().is_ok());
    }

    #[test]
    fn toml_roundtrip() {
        let config = SnapperConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = SnapperConfig::from_toml(&text).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = SnapperConfig::from_toml(
            r#"
            instrument = "GBPUSD"
            strategy_id = 123456

            [policy]
            type = "band_confirmation"
            oversold_gate = 30.0
            overbought_gate = 70.0

            [smoothing]
            ma_type = "sma_bands"
            "#,
        )
        .unwrap();

        assert_eq!(config.instrument, "GBPUSD");
        assert_eq!(config.strategy_id, StrategyId(123456));
        assert_eq!(config.rsi.period, 14);
        assert_eq!(config.smoothing.ma_type, MaType::SmaBands);
        assert_eq!(config.smoothing.length, 14);
        assert_eq!(
            config.policy,
            PolicyConfig::BandConfirmation {
                oversold_gate: 30.0,
                overbought_gate: 70.0
            }
        );
    }

    #[test]
    fn oscillator_exit_level_defaults_to_fifty() {
        let config = SnapperConfig::from_toml(
            r#"
            [policy]
            type = "oscillator_threshold"
            buy_threshold = 30.0
            sell_threshold = 70.0
            "#,
        )
        .unwrap();
        match config.policy {
            PolicyConfig::OscillatorThreshold { exit_level, .. } => assert_eq!(exit_level, 50.0),
            other => panic!("unexpected policy {other:?}"),
        }
    }

    #[test]
    fn zero_period_rejected() {
        let err = SnapperConfig::from_toml("[rsi]\nperiod = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "rsi.period",
                ..
            }
        ));
    }

    #[test]
    fn zero_ma_length_rejected() {
        let mut config = SnapperConfig::default();
        config.smoothing.length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_heartbeat_rejected() {
        let mut config = SnapperConfig::default();
        config.heartbeat.interval_seconds = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("heartbeat.interval_seconds"));
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let mut config = SnapperConfig::default();
        config.policy = PolicyConfig::OscillatorThreshold {
            buy_threshold: -1.0,
            sell_threshold: 67.0,
            exit_level: 50.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_lot_rejected() {
        let mut config = SnapperConfig::default();
        config.lot_size = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn fingerprint_changes_with_params() {
        let a = SnapperConfig::default();
        let mut b = a.clone();
        b.rsi.period = 21;
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn unknown_ma_type_is_parse_error() {
        let err = SnapperConfig::from_toml("[smoothing]\nma_type = \"hull\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}

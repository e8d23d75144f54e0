//! Snapper Core: streaming RSI signals and a single-position trading core.
//!
//! This crate contains:
//! - Domain types (price bars, positions, strategy identity)
//! - Incremental indicators (Wilder RSI, moving average and envelope over
//!   RSI, Bollinger bands over price)
//! - Lagged price/RSI divergence detection
//! - Position tracking and the trading state machine with pluggable
//!   transition policies
//! - Heartbeat scheduling, gateway and notifier seams
//! - Session runtime, replay, CSV bar feed and output export

pub mod config;
pub mod data;
pub mod divergence;
pub mod domain;
pub mod engine;
pub mod gateway;
pub mod heartbeat;
pub mod indicators;
pub mod notify;
pub mod position_tracker;
pub mod strategy;

pub use config::{ConfigError, SnapperConfig};
pub use engine::{run_replay, ReplayResult, Session};

//! Execution gateway: the broker-facing collaborator.
//!
//! The core hands commands to the gateway and reads back success or failure.
//! Retries, timeouts and cancellation are the gateway's business; a rejected
//! command simply leaves the strategy in its previous state.

pub mod paper;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Direction, Position, StrategyId};

pub use paper::PaperGateway;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("no open position for strategy {0}")]
    NoPosition(StrategyId),
}

/// Request to open a market position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub direction: Direction,
    pub size: f64,
    pub instrument: String,
    pub strategy_id: StrategyId,
    pub label: String,
    /// Reference price the decision was taken at (the bar close).
    pub price: f64,
    pub bar_index: usize,
}

/// Account figures reported in heartbeat messages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub balance: f64,
    pub equity: f64,
    pub floating_pnl: f64,
}

pub trait ExecutionGateway {
    /// Open a position; returns the fill price.
    fn open_position(&mut self, request: &OpenRequest) -> Result<f64, GatewayError>;

    /// Close `position` at market; returns the realized profit.
    fn close_position(&mut self, position: &Position, price: f64) -> Result<f64, GatewayError>;

    /// The position the broker holds for `strategy_id`, if any.
    fn query_open_position(&self, strategy_id: StrategyId) -> Option<Position>;

    fn account_summary(&self) -> Option<AccountSummary> {
        None
    }

    /// Latest traded price from the feed. Brokers that mark positions
    /// themselves ignore it.
    fn mark_price(&mut self, _price: f64) {}
}

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::StrategyId;

/// Side of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }
}

/// Decision state of a strategy: flat, or holding one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeState {
    Flat,
    Long,
    Short,
}

impl From<Direction> for TradeState {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Long => Self::Long,
            Direction::Short => Self::Short,
        }
    }
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Flat => "FLAT",
            Self::Long => "LONG",
            Self::Short => "SHORT",
        };
        f.write_str(s)
    }
}

/// The single open position owned by a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub entry_price: f64,
    pub size: f64,
    pub strategy_id: StrategyId,
    pub opened_at_bar: usize,
    pub label: String,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Short
    }

    /// Price-difference P&L per unit size times size (no contract multiplier).
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.direction.sign() * self.size * (current_price - self.entry_price)
    }
}

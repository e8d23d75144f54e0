//! Domain types for Snapper

pub mod bar;
pub mod ids;
pub mod position;

pub use bar::PriceBar;
pub use ids::{ConfigHash, StrategyId};
pub use position::{Direction, Position, TradeState};

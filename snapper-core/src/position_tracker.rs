//! Open-position bookkeeping, one slot per strategy identity.
//!
//! Lookups are keyed by `StrategyId` rather than scanning every open position.
//! The gateway is assumed to tag positions uniquely per strategy; the tracker
//! enforces "at most one" on its own side only.

use std::collections::HashMap;

use thiserror::Error;

use crate::domain::{Position, StrategyId, TradeState};

#[derive(Debug, Error, PartialEq)]
pub enum PositionError {
    #[error("strategy {0} already holds an open position")]
    AlreadyOpen(StrategyId),
}

#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    slots: HashMap<StrategyId, Position>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly opened position. Fails if the slot is taken.
    pub fn open(&mut self, position: Position) -> Result<(), PositionError> {
        let id = position.strategy_id;
        if self.slots.contains_key(&id) {
            return Err(PositionError::AlreadyOpen(id));
        }
        self.slots.insert(id, position);
        Ok(())
    }

    /// Replace whatever the tracker holds for the position's strategy.
    ///
    /// Used when reconciling with the gateway after a restart.
    pub fn adopt(&mut self, position: Position) -> Option<Position> {
        self.slots.insert(position.strategy_id, position)
    }

    pub fn get(&self, id: StrategyId) -> Option<&Position> {
        self.slots.get(&id)
    }

    /// Release the slot and hand back its position.
    pub fn close(&mut self, id: StrategyId) -> Option<Position> {
        self.slots.remove(&id)
    }

    pub fn state(&self, id: StrategyId) -> TradeState {
        self.slots
            .get(&id)
            .map_or(TradeState::Flat, |p| TradeState::from(p.direction))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;

    fn position(id: i64, direction: Direction) -> Position {
        Position {
            direction,
            entry_price: 1.1,
            size: 0.1,
            strategy_id: StrategyId(id),
            opened_at_bar: 0,
            label: "test".into(),
        }
    }

    #[test]
    fn one_slot_per_strategy() {
        let mut tracker = PositionTracker::new();
        tracker.open(position(1, Direction::Long)).unwrap();
        let err = tracker.open(position(1, Direction::Short)).unwrap_err();
        assert_eq!(err, PositionError::AlreadyOpen(StrategyId(1)));
        assert_eq!(tracker.state(StrategyId(1)), TradeState::Long);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn strategies_are_independent() {
        let mut tracker = PositionTracker::new();
        tracker.open(position(1, Direction::Long)).unwrap();
        tracker.open(position(2, Direction::Short)).unwrap();
        assert_eq!(tracker.state(StrategyId(1)), TradeState::Long);
        assert_eq!(tracker.state(StrategyId(2)), TradeState::Short);
        assert_eq!(tracker.state(StrategyId(3)), TradeState::Flat);
    }

    #[test]
    fn close_releases_slot() {
        let mut tracker = PositionTracker::new();
        tracker.open(position(1, Direction::Long)).unwrap();
        let closed = tracker.close(StrategyId(1)).unwrap();
        assert!(closed.is_long());
        assert!(tracker.is_empty());
        assert!(tracker.close(StrategyId(1)).is_none());
        assert!(tracker.open(position(1, Direction::Short)).is_ok());
    }

    #[test]
    fn adopt_overwrites_slot() {
        let mut tracker = PositionTracker::new();
        tracker.open(position(1, Direction::Long)).unwrap();
        let previous = tracker.adopt(position(1, Direction::Short));
        assert!(previous.unwrap().is_long());
        assert_eq!(tracker.state(StrategyId(1)), TradeState::Short);
    }
}

//! In-memory paper gateway.
//!
//! Fills every order at the request's reference price, books realized P&L
//! into a cash balance and can be told to reject the next N commands.

use std::collections::HashMap;

use tracing::debug;

use super::{AccountSummary, ExecutionGateway, GatewayError, OpenRequest};
use crate::domain::{Position, StrategyId};

#[derive(Debug, Clone)]
pub struct PaperGateway {
    balance: f64,
    positions: HashMap<StrategyId, Position>,
    mark: Option<f64>,
    pending_rejections: usize,
    opened: usize,
    closed: usize,
}

impl PaperGateway {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            balance: initial_balance,
            positions: HashMap::new(),
            mark: None,
            pending_rejections: 0,
            opened: 0,
            closed: 0,
        }
    }

    /// Reject the next `count` open/close commands.
    pub fn reject_next(&mut self, count: usize) {
        self.pending_rejections = count;
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn opened_count(&self) -> usize {
        self.opened
    }

    pub fn closed_count(&self) -> usize {
        self.closed
    }

    /// Seed a position as if it had been opened before a restart.
    pub fn with_position(mut self, position: Position) -> Self {
        self.positions.insert(position.strategy_id, position);
        self
    }

    fn take_rejection(&mut self) -> Option<GatewayError> {
        if self.pending_rejections == 0 {
            return None;
        }
        self.pending_rejections -= 1;
        Some(GatewayError::Rejected("paper gateway rejection".into()))
    }

    fn floating_pnl(&self) -> f64 {
        match self.mark {
            Some(price) => self.positions.values().map(|p| p.unrealized_pnl(price)).sum(),
            None => 0.0,
        }
    }
}

impl Default for PaperGateway {
    fn default() -> Self {
        Self::new(10_000.0)
    }
}

impl ExecutionGateway for PaperGateway {
    fn open_position(&mut self, request: &OpenRequest) -> Result<f64, GatewayError> {
        if let Some(err) = self.take_rejection() {
            return Err(err);
        }
        if self.positions.contains_key(&request.strategy_id) {
            return Err(GatewayError::Rejected(format!(
                "strategy {} already has an open position",
                request.strategy_id
            )));
        }
        self.positions.insert(
            request.strategy_id,
            Position {
                direction: request.direction,
                entry_price: request.price,
                size: request.size,
                strategy_id: request.strategy_id,
                opened_at_bar: request.bar_index,
                label: request.label.clone(),
            },
        );
        self.opened += 1;
        debug!(strategy = %request.strategy_id, price = request.price, "paper fill (open)");
        Ok(request.price)
    }

    fn close_position(&mut self, position: &Position, price: f64) -> Result<f64, GatewayError> {
        if let Some(err) = self.take_rejection() {
            return Err(err);
        }
        let held = self
            .positions
            .remove(&position.strategy_id)
            .ok_or(GatewayError::NoPosition(position.strategy_id))?;
        let pnl = held.unrealized_pnl(price);
        self.balance += pnl;
        self.closed += 1;
        debug!(strategy = %position.strategy_id, price, pnl, "paper fill (close)");
        Ok(pnl)
    }

    fn query_open_position(&self, strategy_id: StrategyId) -> Option<Position> {
        self.positions.get(&strategy_id).cloned()
    }

    fn account_summary(&self) -> Option<AccountSummary> {
        let floating_pnl = self.floating_pnl();
        Some(AccountSummary {
            balance: self.balance,
            equity: self.balance + floating_pnl,
            floating_pnl,
        })
    }

    fn mark_price(&mut self, price: f64) {
        self.mark = Some(price);
    }
}

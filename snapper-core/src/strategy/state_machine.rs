//! Single-position trading state machine.
//!
//! ```text
//!          entry (policy)            exit (policy)
//!   FLAT ─────────────────▶ LONG ─────────────────▶ FLAT
//!   FLAT ─────────────────▶ SHORT ────────────────▶ FLAT
//! ```
//!
//! Exactly one transition is evaluated per bar. A strategy that starts the bar
//! holding a position only checks its exit, so an exit is never followed by a
//! re-entry on the same bar. A rejected gateway command leaves the state
//! untouched; the same rule is evaluated again on the next bar.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{require_positive, ConfigError, SnapperConfig};
use crate::domain::{Direction, Position, StrategyId, TradeState};
use crate::gateway::{ExecutionGateway, OpenRequest};
use crate::position_tracker::PositionTracker;

use super::policy::{create_policy, BarContext, TransitionPolicy};

/// Outcome of evaluating the policy for one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Hold,
    Enter(Direction),
    Exit,
}

/// A command the gateway accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TradeCommand {
    Open {
        direction: Direction,
        size: f64,
        instrument: String,
        strategy_id: StrategyId,
        label: String,
        fill_price: f64,
        bar_index: usize,
    },
    Close {
        position: Position,
        exit_price: f64,
        realized_pnl: f64,
        bar_index: usize,
    },
}

impl TradeCommand {
    pub fn bar_index(&self) -> usize {
        match self {
            Self::Open { bar_index, .. } | Self::Close { bar_index, .. } => *bar_index,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Short tag for tabular output.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Open {
                direction: Direction::Long,
                ..
            } => "open_long",
            Self::Open {
                direction: Direction::Short,
                ..
            } => "open_short",
            Self::Close { .. } => "close",
        }
    }

    /// Push-notification text for this command.
    pub fn message(&self, rsi: f64) -> String {
        match self {
            Self::Open {
                direction: Direction::Long,
                instrument,
                ..
            } => format!("📈 BUY Triggered {instrument} | RSI: {rsi:.2}"),
            Self::Open {
                direction: Direction::Short,
                instrument,
                ..
            } => format!("📉 SELL Triggered {instrument} | RSI: {rsi:.2}"),
            Self::Close {
                position,
                realized_pnl,
                ..
            } => {
                let side = if position.is_long() { "Long" } else { "Short" };
                format!("✅ {side} Closed | RSI: {rsi:.2} | Profit: ${realized_pnl:.2}")
            }
        }
    }
}

pub struct TradingStateMachine {
    strategy_id: StrategyId,
    instrument: String,
    lot_size: f64,
    policy: Box<dyn TransitionPolicy>,
}

impl std::fmt::Debug for TradingStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradingStateMachine")
            .field("strategy_id", &self.strategy_id)
            .field("instrument", &self.instrument)
            .field("lot_size", &self.lot_size)
            .field("policy", &self.policy.name())
            .finish()
    }
}

impl TradingStateMachine {
    pub fn new(config: &SnapperConfig) -> Result<Self, ConfigError> {
        Self::with_policy(
            config.strategy_id,
            config.instrument.clone(),
            config.lot_size,
            create_policy(&config.policy)?,
        )
    }

    pub fn with_policy(
        strategy_id: StrategyId,
        instrument: String,
        lot_size: f64,
        policy: Box<dyn TransitionPolicy>,
    ) -> Result<Self, ConfigError> {
        require_positive("lot_size", lot_size)?;
        Ok(Self {
            strategy_id,
            instrument,
            lot_size,
            policy,
        })
    }

    pub fn strategy_id(&self) -> StrategyId {
        self.strategy_id
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    pub fn state(&self, tracker: &PositionTracker) -> TradeState {
        tracker.state(self.strategy_id)
    }

    /// Evaluate the single transition allowed for this bar.
    pub fn decide(&self, ctx: &BarContext<'_>, position: Option<&Position>) -> Transition {
        match position {
            Some(p) if self.policy.should_exit(p.direction, ctx) => Transition::Exit,
            Some(_) => Transition::Hold,
            None => self.policy.entry(ctx).map_or(Transition::Hold, Transition::Enter),
        }
    }

    /// Decide and, if a transition fires, execute it through the gateway.
    ///
    /// Returns the accepted command, or `None` when holding or when the
    /// gateway rejected the command.
    pub fn on_bar(
        &self,
        ctx: &BarContext<'_>,
        tracker: &mut PositionTracker,
        gateway: &mut dyn ExecutionGateway,
    ) -> Option<TradeCommand> {
        match self.decide(ctx, tracker.get(self.strategy_id)) {
            Transition::Hold => None,
            Transition::Enter(direction) => self.enter(direction, ctx, tracker, gateway),
            Transition::Exit => self.exit(ctx, tracker, gateway),
        }
    }

    fn enter(
        &self,
        direction: Direction,
        ctx: &BarContext<'_>,
        tracker: &mut PositionTracker,
        gateway: &mut dyn ExecutionGateway,
    ) -> Option<TradeCommand> {
        let bar_index = ctx.snapshot.bar_index;
        let request = OpenRequest {
            direction,
            size: self.lot_size,
            instrument: self.instrument.clone(),
            strategy_id: self.strategy_id,
            label: self.policy.entry_label(direction),
            price: ctx.bar.close,
            bar_index,
        };

        let fill_price = match gateway.open_position(&request) {
            Ok(price) => price,
            Err(err) => {
                warn!(
                    strategy = %self.strategy_id,
                    ?direction,
                    bar = bar_index,
                    error = %err,
                    "open rejected, staying flat"
                );
                return None;
            }
        };

        let position = Position {
            direction,
            entry_price: fill_price,
            size: self.lot_size,
            strategy_id: self.strategy_id,
            opened_at_bar: bar_index,
            label: request.label.clone(),
        };
        if let Err(err) = tracker.open(position) {
            // decide() only enters from flat, so the slot must be free.
            error!(error = %err, "position tracker out of sync with state machine");
            return None;
        }

        info!(
            strategy = %self.strategy_id,
            ?direction,
            bar = bar_index,
            price = fill_price,
            rsi = ctx.snapshot.rsi,
            "entered position"
        );
        Some(TradeCommand::Open {
            direction,
            size: self.lot_size,
            instrument: request.instrument,
            strategy_id: self.strategy_id,
            label: request.label,
            fill_price,
            bar_index,
        })
    }

    fn exit(
        &self,
        ctx: &BarContext<'_>,
        tracker: &mut PositionTracker,
        gateway: &mut dyn ExecutionGateway,
    ) -> Option<TradeCommand> {
        let bar_index = ctx.snapshot.bar_index;
        let position = tracker.get(self.strategy_id)?.clone();
        let exit_price = ctx.bar.close;

        let realized_pnl = match gateway.close_position(&position, exit_price) {
            Ok(pnl) => pnl,
            Err(err) => {
                warn!(
                    strategy = %self.strategy_id,
                    bar = bar_index,
                    error = %err,
                    "close rejected, keeping position"
                );
                return None;
            }
        };
        tracker.close(self.strategy_id);

        info!(
            strategy = %self.strategy_id,
            direction = ?position.direction,
            bar = bar_index,
            price = exit_price,
            pnl = realized_pnl,
            "closed position"
        );
        Some(TradeCommand::Close {
            position,
            exit_price,
            realized_pnl,
            bar_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceBar;
    use crate::gateway::PaperGateway;
    use crate::indicators::{BandLevels, IndicatorSnapshot};
    use chrono::TimeZone;

    fn machine() -> TradingStateMachine {
        TradingStateMachine::new(&SnapperConfig::default()).unwrap()
    }

    fn bar(i: usize, close: f64) -> PriceBar {
        let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        PriceBar {
            timestamp: base + chrono::Duration::hours(i as i64),
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume: 100,
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

    /// Run a sequence of RSI readings and collect (bar, command) pairs.
    fn drive(
        sm: &TradingStateMachine,
        tracker: &mut PositionTracker,
        gw: &mut PaperGateway,
        rsis: &[f64],
    ) -> Vec<(usize, TradeCommand)> {
        let mut out = Vec::new();
        for (i, &rsi) in rsis.iter().enumerate() {
            let b = bar(i, 100.0 + i as f64);
            let s = snap(i, rsi);
            let ctx = BarContext {
                bar: &b,
                snapshot: &s,
                divergence: None,
            };
            if let Some(cmd) = sm.on_bar(&ctx, tracker, gw) {
                out.push((i, cmd));
            }
        }
        out
    }

    #[test]
    fn single_entry_while_long() {
        let sm = machine();
        let mut tracker = PositionTracker::new();
        let mut gw = PaperGateway::default();
        let cmds = drive(&sm, &mut tracker, &mut gw, &[45.0, 36.0, 30.0, 20.0, 10.0]);
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].0, 1);
        assert_eq!(cmds[0].1.tag(), "open_long");
        assert_eq!(sm.state(&tracker), TradeState::Long);
    }

    #[test]
    fn exit_exactly_once_when_rsi_reverts() {
        let sm = machine();
        let mut tracker = PositionTracker::new();
        let mut gw = PaperGateway::default();
        // Entry at bar 1 (k), RSI first reaches 50 at bar 6 (k + 5).
        let cmds = drive(
            &sm,
            &mut tracker,
            &mut gw,
            &[45.0, 35.0, 30.0, 38.0, 45.0, 48.0, 52.0, 55.0],
        );
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[1].0, 6);
        assert!(matches!(cmds[1].1, TradeCommand::Close { .. }));
        assert_eq!(sm.state(&tracker), TradeState::Flat);
    }

    #[test]
    fn short_round_trip() {
        let sm = machine();
        let mut tracker = PositionTracker::new();
        let mut gw = PaperGateway::default();
        let cmds = drive(&sm, &mut tracker, &mut gw, &[60.0, 70.0, 60.0, 50.0]);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].1.tag(), "open_short");
        assert_eq!(cmds[1].0, 3);
        match &cmds[1].1 {
            // Entered at 101, exited at 103: a losing short.
            TradeCommand::Close { realized_pnl, .. } => assert!(*realized_pnl < 0.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn no_same_bar_reentry() {
        let sm = TradingStateMachine::with_policy(
            StrategyId(1),
            "EURUSD".into(),
            0.1,
            // Exit level above the buy threshold: one reading satisfies both.
            Box::new(super::super::OscillatorThreshold::new(60.0, 90.0, 40.0).unwrap()),
        )
        .unwrap();
        let mut tracker = PositionTracker::new();
        let mut gw = PaperGateway::default();
        let cmds = drive(&sm, &mut tracker, &mut gw, &[30.0, 45.0, 45.0]);
        // bar 0 enters, bar 1 exits (45 >= 40) and does not re-enter, bar 2 re-enters.
        let tags: Vec<_> = cmds.iter().map(|(i, c)| (*i, c.tag())).collect();
        assert_eq!(tags, vec![(0, "open_long"), (1, "close"), (2, "open_long")]);
    }

    #[test]
    fn rejected_open_stays_flat_and_retries() {
        let sm = machine();
        let mut tracker = PositionTracker::new();
        let mut gw = PaperGateway::default();
        gw.reject_next(1);
        let cmds = drive(&sm, &mut tracker, &mut gw, &[30.0, 30.0]);
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].0, 1);
        assert_eq!(sm.state(&tracker), TradeState::Long);
    }

    #[test]
    fn rejected_close_keeps_position() {
        let sm = machine();
        let mut tracker = PositionTracker::new();
        let mut gw = PaperGateway::default();
        drive(&sm, &mut tracker, &mut gw, &[30.0]);
        gw.reject_next(1);
        let b = bar(1, 101.0);
        let s = snap(1, 55.0);
        let ctx = BarContext {
            bar: &b,
            snapshot: &s,
            divergence: None,
        };
        assert!(sm.on_bar(&ctx, &mut tracker, &mut gw).is_none());
        assert_eq!(sm.state(&tracker), TradeState::Long);
        assert!(sm.on_bar(&ctx, &mut tracker, &mut gw).is_some());
        assert_eq!(sm.state(&tracker), TradeState::Flat);
    }

    #[test]
    fn band_policy_enters_once_then_holds_inside_bands() {
        let mut config = SnapperConfig::default();
        config.policy = crate::config::PolicyConfig::BandConfirmation {
            oversold_gate: 30.0,
            overbought_gate: 70.0,
        };
        let sm = TradingStateMachine::new(&config).unwrap();
        let mut tracker = PositionTracker::new();
        let mut gw = PaperGateway::default();
        let bands = BandLevels {
            upper: 110.0,
            middle: 100.0,
            lower: 90.0,
        };

        let mut commands = Vec::new();
        for (i, close) in [89.0, 92.0, 95.0, 98.0].into_iter().enumerate() {
            let b = bar(i, close);
            let mut s = snap(i, 25.0);
            s.price_bands = Some(bands);
            let ctx = BarContext {
                bar: &b,
                snapshot: &s,
                divergence: None,
            };
            commands.extend(sm.on_bar(&ctx, &mut tracker, &mut gw));
        }
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].tag(), "open_long");
        assert_eq!(sm.state(&tracker), TradeState::Long);
    }

    #[test]
    fn command_messages() {
        let cmd = TradeCommand::Open {
            direction: Direction::Long,
            size: 0.02,
            instrument: "EURUSD".into(),
            strategy_id: StrategyId(1),
            label: "RSI Under 37".into(),
            fill_price: 1.08,
            bar_index: 4,
        };
        assert_eq!(cmd.message(31.256), "📈 BUY Triggered EURUSD | RSI: 31.26");
        assert_eq!(cmd.bar_index(), 4);
        assert!(cmd.is_open());
    }
}

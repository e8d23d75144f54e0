//! One strategy instance: indicator state, divergence, position slot, state
//! machine, heartbeat, and the gateway/notifier it talks to.
//!
//! Every callback takes `&mut self`, so bar and timer events are handled
//! strictly one after the other.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::{ConfigError, SnapperConfig};
use crate::divergence::DivergenceDetector;
use crate::domain::{PriceBar, TradeState};
use crate::gateway::ExecutionGateway;
use crate::heartbeat::{format_status, HeartbeatScheduler, PERIODIC_REASON, START_REASON};
use crate::indicators::{IndicatorEngine, IndicatorSnapshot};
use crate::notify::{deliver, Notifier};
use crate::position_tracker::PositionTracker;
use crate::strategy::{BarContext, TradingStateMachine};

use super::output::BarOutput;
use super::warmup::WarmupState;

pub struct Session<G: ExecutionGateway, N: Notifier> {
    config: SnapperConfig,
    indicators: IndicatorEngine,
    divergence: DivergenceDetector,
    tracker: PositionTracker,
    machine: TradingStateMachine,
    heartbeat: HeartbeatScheduler,
    warmup: WarmupState,
    gateway: G,
    notifier: N,
}

impl<G: ExecutionGateway, N: Notifier> Session<G, N> {
    pub fn new(config: SnapperConfig, gateway: G, notifier: N) -> Result<Self, ConfigError> {
        config.validate()?;
        let indicators = IndicatorEngine::from_config(&config)?;
        let divergence = DivergenceDetector::new(&config.divergence)?;
        let warmup = WarmupState::from_components(&[&indicators, &divergence]);
        Ok(Self {
            machine: TradingStateMachine::new(&config)?,
            heartbeat: HeartbeatScheduler::new(&config.heartbeat)?,
            tracker: PositionTracker::new(),
            indicators,
            divergence,
            warmup,
            gateway,
            notifier,
            config,
        })
    }

    pub fn config(&self) -> &SnapperConfig {
        &self.config
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn indicators(&self) -> &IndicatorEngine {
        &self.indicators
    }

    pub fn state(&self) -> TradeState {
        self.machine.state(&self.tracker)
    }

    pub fn is_warm(&self) -> bool {
        self.warmup.is_warm()
    }

    /// Rebuild indicator and divergence state from `history`.
    ///
    /// No commands are issued and no divergence pivots inside the history are
    /// reported. Replaying the same history always produces the same state.
    pub fn warm_up(&mut self, history: &[PriceBar]) -> Option<IndicatorSnapshot> {
        self.indicators.reset();
        self.divergence.reset();
        self.warmup.reset();

        let mut last = None;
        for bar in history {
            let snapshot = self.indicators.update(bar);
            self.divergence.prime(bar, &snapshot);
            self.warmup.process_bar();
            last = Some(snapshot);
        }

        info!(
            bars = history.len(),
            warm = self.warmup.is_warm(),
            rsi = last.map(|s| s.rsi),
            "warm-up complete"
        );
        last
    }

    /// Align the position slot with what the gateway reports.
    pub fn reconcile(&mut self) -> TradeState {
        let id = self.machine.strategy_id();
        match self.gateway.query_open_position(id) {
            Some(position) => {
                info!(
                    strategy = %id,
                    direction = ?position.direction,
                    entry = position.entry_price,
                    "adopted open position from gateway"
                );
                self.tracker.adopt(position);
            }
            None => {
                if self.tracker.close(id).is_some() {
                    warn!(strategy = %id, "gateway holds no position, released local slot");
                }
            }
        }
        self.state()
    }

    /// Startup hook: logs the run identity and sends the start heartbeat if
    /// configured. Returns whether a message went out.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        info!(
            instrument = %self.config.instrument,
            strategy = %self.config.strategy_id,
            policy = self.machine.policy_name(),
            config = %self.config.fingerprint().short(),
            "session started"
        );
        if !self.heartbeat.on_start(now) {
            return false;
        }
        self.send_status(START_REASON);
        true
    }

    /// Timer hook. Returns the heartbeat message if one was sent.
    pub fn on_timer(&mut self, now: DateTime<Utc>) -> Option<String> {
        if !self.heartbeat.on_timer(now) {
            return None;
        }
        Some(self.send_status(PERIODIC_REASON))
    }

    fn send_status(&mut self, reason: &str) -> String {
        let message = format_status(
            reason,
            &self.config.instrument,
            self.state(),
            self.gateway.account_summary(),
        );
        deliver(&mut self.notifier, &message);
        message
    }

    /// Process one live bar: update indicators, check divergence, run at
    /// most one state transition, notify.
    pub fn on_bar(&mut self, bar: &PriceBar) -> BarOutput {
        self.gateway.mark_price(bar.close);

        let snapshot = self.indicators.update(bar);
        self.warmup.process_bar();
        if !self.warmup.is_warm() {
            debug!(
                bar = snapshot.bar_index,
                remaining = self.warmup.bars_until_warm(),
                "indicators still warming up"
            );
        }

        let divergence = self.divergence.on_bar(bar, &snapshot);
        let ctx = BarContext {
            bar,
            snapshot: &snapshot,
            divergence: divergence.as_ref(),
        };
        let command = self
            .machine
            .on_bar(&ctx, &mut self.tracker, &mut self.gateway);

        if let Some(cmd) = &command {
            // Exits are always announced; `notify_trades` only gates entries.
            if !cmd.is_open() || self.config.notifications.notify_trades {
                deliver(&mut self.notifier, &cmd.message(snapshot.rsi));
            }
        }

        BarOutput::new(bar, &snapshot, divergence.as_ref(), self.state(), command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Direction, Position, StrategyId};
    use crate::gateway::PaperGateway;
    use crate::indicators::make_bars;
    use crate::notify::RecordingNotifier;

    fn session() -> Session<PaperGateway, RecordingNotifier> {
        Session::new(
            SnapperConfig::default(),
            PaperGateway::default(),
            RecordingNotifier::new(),
        )
        .unwrap()
    }

    #[test]
    fn warm_up_is_repeatable() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.4).sin()).collect();
        let bars = make_bars(&closes);
        let mut s = session();
        let first = s.warm_up(&bars);
        let second = s.warm_up(&bars);
        assert_eq!(first, second);
        assert!(s.is_warm());
    }

    #[test]
    fn warm_up_issues_no_commands() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 - i as f64).collect();
        let mut s = session();
        s.warm_up(&make_bars(&closes));
        assert_eq!(s.state(), TradeState::Flat);
        assert_eq!(s.gateway().opened_count(), 0);
        assert!(s.notifier().messages().is_empty());
    }

    #[test]
    fn start_sends_initialized_status() {
        let mut s = session();
        assert!(s.start(Utc::now()));
        let msgs = s.notifier().messages();
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("System Initialized"));
        assert!(msgs[0].contains("EURUSD"));
    }

    #[test]
    fn reconcile_adopts_gateway_position() {
        let config = SnapperConfig::default();
        let held = Position {
            direction: Direction::Short,
            entry_price: 1.2,
            size: 0.02,
            strategy_id: config.strategy_id,
            opened_at_bar: 0,
            label: "RSI Over 67".into(),
        };
        let gw = PaperGateway::default().with_position(held);
        let mut s = Session::new(config, gw, RecordingNotifier::new()).unwrap();
        assert_eq!(s.reconcile(), TradeState::Short);
        assert!(s.tracker().get(StrategyId(987_654)).is_some());
    }

    #[test]
    fn disabling_trade_notifications_keeps_exit_messages() {
        let mut config = SnapperConfig::default();
        config.notifications.notify_trades = false;
        let mut s = Session::new(config, PaperGateway::default(), RecordingNotifier::new()).unwrap();
        let closes: Vec<f64> = [100.0, 101.0].into_iter().chain((90..=100).rev().map(f64::from)).collect();
        let bars = make_bars(&closes);
        s.warm_up(&bars[..2]);

        let commands: Vec<_> = bars[2..].iter().filter_map(|b| s.on_bar(b).command).collect();
        let tags: Vec<_> = commands.iter().map(|c| c.tag()).collect();
        assert_eq!(tags, ["open_short", "close"]);

        let msgs = s.notifier().messages();
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].starts_with("✅ Short Closed"));
    }
}

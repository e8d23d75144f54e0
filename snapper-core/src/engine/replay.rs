//! Drive a session over a recorded bar series.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{PriceBar, TradeState};
use crate::gateway::ExecutionGateway;
use crate::notify::Notifier;
use crate::strategy::TradeCommand;

use super::output::BarOutput;
use super::session::Session;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResult {
    /// One row per live bar.
    pub outputs: Vec<BarOutput>,
    /// Every command the gateway accepted, in order.
    pub commands: Vec<TradeCommand>,
    /// Bars consumed by warm-up.
    pub warmup_bars: usize,
    /// Heartbeat messages sent, including the startup one.
    pub heartbeats: usize,
    pub final_state: TradeState,
}

/// Replay `bars` through `session`.
///
/// The first `warmup_bars` bars (from the session's configuration) rebuild
/// indicator state without trading; the session then reconciles with its
/// gateway, starts at the first live bar's timestamp, and every later bar is
/// processed live with the timer ticking on bar time.
pub fn run_replay<G, N>(session: &mut Session<G, N>, bars: &[PriceBar]) -> ReplayResult
where
    G: ExecutionGateway,
    N: Notifier,
{
    let warmup_bars = session.config().warmup_bars.min(bars.len());
    let (history, live) = bars.split_at(warmup_bars);

    session.warm_up(history);
    session.reconcile();

    let mut heartbeats = 0;
    if let Some(first) = live.first() {
        if session.start(first.timestamp) {
            heartbeats += 1;
        }
    }

    let mut outputs = Vec::with_capacity(live.len());
    let mut commands = Vec::new();
    for bar in live {
        if session.on_timer(bar.timestamp).is_some() {
            heartbeats += 1;
        }
        let row = session.on_bar(bar);
        if let Some(cmd) = &row.command {
            commands.push(cmd.clone());
        }
        outputs.push(row);
    }

    let final_state = session.state();
    info!(
        live_bars = live.len(),
        warmup_bars,
        commands = commands.len(),
        heartbeats,
        state = %final_state,
        "replay finished"
    );
    ReplayResult {
        outputs,
        commands,
        warmup_bars,
        heartbeats,
        final_state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SnapperConfig;
    use crate::data::synthetic_bars;
    use crate::gateway::PaperGateway;
    use crate::notify::RecordingNotifier;

    fn replay(bars: &[PriceBar]) -> ReplayResult {
        let mut session = Session::new(
            SnapperConfig::default(),
            PaperGateway::default(),
            RecordingNotifier::new(),
        )
        .unwrap();
        run_replay(&mut session, bars)
    }

    #[test]
    fn splits_warmup_from_live() {
        let bars = synthetic_bars("EURUSD", 300);
        let result = replay(&bars);
        assert_eq!(result.warmup_bars, 100);
        assert_eq!(result.outputs.len(), 200);
        assert_eq!(result.outputs[0].bar_index, 100);
    }

    #[test]
    fn short_series_is_all_warmup() {
        let bars = synthetic_bars("EURUSD", 50);
        let result = replay(&bars);
        assert_eq!(result.warmup_bars, 50);
        assert!(result.outputs.is_empty());
        assert_eq!(result.heartbeats, 0);
    }

    #[test]
    fn deterministic() {
        let bars = synthetic_bars("EURUSD", 400);
        let a = replay(&bars);
        let b = replay(&bars);
        assert_eq!(a.outputs, b.outputs);
        assert_eq!(a.commands, b.commands);
    }

    #[test]
    fn hourly_bars_fire_heartbeat_every_four_hours() {
        let bars = synthetic_bars("EURUSD", 100 + 24);
        let result = replay(&bars);
        // Start message at +0h, periodic ones at +4h through +20h.
        assert_eq!(result.heartbeats, 1 + 5);
    }

    #[test]
    fn commands_alternate_open_and_close() {
        let bars = synthetic_bars("EURUSD", 2_000);
        let result = replay(&bars);
        for pair in result.commands.windows(2) {
            assert_ne!(pair[0].is_open(), pair[1].is_open());
        }
        if let Some(first) = result.commands.first() {
            assert!(first.is_open());
        }
    }
}

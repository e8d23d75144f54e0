//! Heartbeat scheduling: periodic status messages on the timer stream.

use chrono::{DateTime, Duration, Utc};

use crate::config::{ConfigError, HeartbeatConfig};
use crate::domain::TradeState;
use crate::gateway::AccountSummary;

pub const START_REASON: &str = "System Initialized";
pub const PERIODIC_REASON: &str = "Periodic Heartbeat";

/// Decide whether a heartbeat is due.
///
/// A scheduler that has never fired (`last_fire == None`) fires on the first
/// tick. Returns the fire decision and the last-fire time to carry forward.
pub fn should_fire(
    now: DateTime<Utc>,
    last_fire: Option<DateTime<Utc>>,
    interval: Duration,
) -> (bool, Option<DateTime<Utc>>) {
    match last_fire {
        Some(last) if now - last < interval => (false, last_fire),
        _ => (true, Some(now)),
    }
}

#[derive(Debug, Clone)]
pub struct HeartbeatScheduler {
    interval: Duration,
    send_on_start: bool,
    last_fire: Option<DateTime<Utc>>,
}

impl HeartbeatScheduler {
    pub fn new(config: &HeartbeatConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            interval: Duration::seconds(config.interval_seconds),
            send_on_start: config.send_on_start,
            last_fire: None,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_fire(&self) -> Option<DateTime<Utc>> {
        self.last_fire
    }

    /// Startup hook: fires once if configured to announce startup.
    pub fn on_start(&mut self, now: DateTime<Utc>) -> bool {
        if self.send_on_start {
            self.last_fire = Some(now);
        }
        self.send_on_start
    }

    /// Timer hook.
    pub fn on_timer(&mut self, now: DateTime<Utc>) -> bool {
        let (fire, last) = should_fire(now, self.last_fire, self.interval);
        self.last_fire = last;
        fire
    }
}

/// Status message body sent with every heartbeat.
pub fn format_status(
    reason: &str,
    instrument: &str,
    state: TradeState,
    account: Option<AccountSummary>,
) -> String {
    match account {
        Some(a) => format!(
            "💓 {reason}\nPair: {instrument}\nBalance: ${:.2}\nEquity: ${:.2}\nFloating P/L: ${:.2}",
            a.balance, a.equity, a.floating_pnl
        ),
        None => format!("💓 {reason}\nPair: {instrument}\nState: {state}"),
    }
}

//! Notifier: best-effort push messages.
//!
//! Delivery failures are logged and dropped; they never reach trading logic.

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NotifyError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
}

pub trait Notifier {
    fn send(&mut self, message: &str) -> Result<(), NotifyError>;
}

/// Send `message`, swallowing any failure after logging it.
pub fn deliver(notifier: &mut dyn Notifier, message: &str) {
    if let Err(err) = notifier.send(message) {
        warn!(error = %err, "notification dropped");
    }
}

/// Writes every message to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&mut self, message: &str) -> Result<(), NotifyError> {
        info!(target: "snapper::notify", "{message}");
        Ok(())
    }
}

/// Keeps messages in memory; optionally fails every send.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Vec<String>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose channel is down: every send fails, nothing is kept.
    pub fn failing() -> Self {
        Self {
            messages: Vec::new(),
            failing: true,
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl Notifier for RecordingNotifier {
    fn send(&mut self, message: &str) -> Result<(), NotifyError> {
        if self.failing {
            return Err(NotifyError::Unavailable("recording notifier set to fail".into()));
        }
        self.messages.push(message.to_string());
        Ok(())
    }
}

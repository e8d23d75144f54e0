//! Trading decisions: transition policies and the single-position state machine.
//!
//! Policies are pure: they see the bar, its indicator snapshot and the
//! divergence confirmed on this bar, never the gateway. The state machine owns
//! the side effects (gateway commands, position bookkeeping).

pub mod policy;
pub mod state_machine;

pub use policy::{create_policy, BandConfirmation, BarContext, OscillatorThreshold, TransitionPolicy};
pub use state_machine::{TradeCommand, TradingStateMachine, Transition};

//! Session runtime: per-bar and timer callbacks over the core components,
//! warm-up tracking, the output surface, and recorded-bar replay.

pub mod output;
pub mod replay;
pub mod session;
pub mod warmup;

pub use output::{export_outputs_csv, BarOutput};
pub use replay::{run_replay, ReplayResult};
pub use session::Session;
pub use warmup::{WarmupRequirement, WarmupState};

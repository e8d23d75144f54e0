//! Price-bar sources: CSV files and deterministic synthetic series.

pub mod csv_feed;
pub mod synthetic;

use chrono::{DateTime, Utc};
use std::path::PathBuf;

pub use csv_feed::{load_bars_csv, read_bars};
pub use synthetic::synthetic_bars;

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: timestamp {timestamp} is not after the previous bar")]
    OutOfOrder { row: usize, timestamp: DateTime<Utc> },

    #[error("CSV output is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

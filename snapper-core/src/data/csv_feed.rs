//! CSV price feed.
//!
//! Expected header: `timestamp,open,high,low,close,volume` with RFC 3339
//! timestamps. Rows must be strictly increasing in time.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::PriceBar;

use super::DataError;

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: u64,
}

impl From<CsvRow> for PriceBar {
    fn from(row: CsvRow) -> Self {
        PriceBar {
            timestamp: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        }
    }
}

/// Load every bar from a CSV file.
pub fn load_bars_csv(path: &Path) -> Result<Vec<PriceBar>, DataError> {
    let file = std::fs::File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let bars = read_bars(file)?;
    debug!(path = %path.display(), bars = bars.len(), "loaded bars");
    Ok(bars)
}

/// Parse bars from any reader, rejecting non-increasing timestamps.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<PriceBar>, DataError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars: Vec<PriceBar> = Vec::new();

    for (i, record) in rdr.deserialize::<CsvRow>().enumerate() {
        let bar = PriceBar::from(record?);
        if let Some(prev) = bars.last() {
            if bar.timestamp <= prev.timestamp {
                return Err(DataError::OutOfOrder {
                    row: i + 1,
                    timestamp: bar.timestamp,
                });
            }
        }
        if !bar.is_sane() {
            warn!(row = i + 1, timestamp = %bar.timestamp, "bar fails OHLC sanity check");
        }
        bars.push(bar);
    }
    Ok(bars)
}

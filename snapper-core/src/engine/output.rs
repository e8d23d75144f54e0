//! Per-bar output surface and its CSV export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::DataError;
use crate::divergence::{DivergenceEvent, DivergenceKind};
use crate::domain::{PriceBar, TradeState};
use crate::indicators::IndicatorSnapshot;
use crate::strategy::TradeCommand;

/// Everything a renderer needs for one bar.
///
/// Divergence markers sit on the row of the bar that confirmed them;
/// `divergence_pivot` names the bar the arrow belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarOutput {
    pub timestamp: DateTime<Utc>,
    pub bar_index: usize,
    pub close: f64,
    pub rsi: f64,
    pub ma_value: Option<f64>,
    pub upper_band: Option<f64>,
    pub lower_band: Option<f64>,
    pub bullish_marker: Option<f64>,
    pub bearish_marker: Option<f64>,
    pub divergence_pivot: Option<usize>,
    pub state: TradeState,
    pub command: Option<TradeCommand>,
}

impl BarOutput {
    pub fn new(
        bar: &PriceBar,
        snapshot: &IndicatorSnapshot,
        divergence: Option<&DivergenceEvent>,
        state: TradeState,
        command: Option<TradeCommand>,
    ) -> Self {
        let marker = |kind| {
            divergence
                .filter(|ev| ev.kind == kind)
                .map(DivergenceEvent::marker)
        };
        Self {
            timestamp: bar.timestamp,
            bar_index: snapshot.bar_index,
            close: bar.close,
            rsi: snapshot.rsi,
            ma_value: snapshot.ma_value,
            upper_band: snapshot.upper_band,
            lower_band: snapshot.lower_band,
            bullish_marker: marker(DivergenceKind::Bullish),
            bearish_marker: marker(DivergenceKind::Bearish),
            divergence_pivot: divergence.map(|ev| ev.pivot_bar_index),
            state,
            command,
        }
    }
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

/// Export rows as CSV. Unavailable values become empty cells.
///
/// Columns: timestamp, bar_index, close, rsi, ma, upper_band, lower_band,
/// bullish_marker, bearish_marker, divergence_pivot, state, command
pub fn export_outputs_csv(rows: &[BarOutput]) -> Result<String, DataError> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "timestamp",
        "bar_index",
        "close",
        "rsi",
        "ma",
        "upper_band",
        "lower_band",
        "bullish_marker",
        "bearish_marker",
        "divergence_pivot",
        "state",
        "command",
    ])?;

    for r in rows {
        wtr.write_record([
            r.timestamp.to_rfc3339(),
            r.bar_index.to_string(),
            format!("{:.6}", r.close),
            format!("{:.4}", r.rsi),
            opt(r.ma_value),
            opt(r.upper_band),
            opt(r.lower_band),
            opt(r.bullish_marker),
            opt(r.bearish_marker),
            r.divergence_pivot.map(|p| p.to_string()).unwrap_or_default(),
            r.state.to_string(),
            r.command.as_ref().map_or("", TradeCommand::tag).to_string(),
        ])?;
    }

    let data = wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8(data)?)
}

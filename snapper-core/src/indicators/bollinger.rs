//! Bollinger envelope: mean +/- multiplier * standard deviation.
//!
//! Uses population stddev (divide by N). Applied both to the RSI series
//! (smoothing envelope) and to close prices (band-confirmation entries).

use serde::{Deserialize, Serialize};

/// Upper, middle and lower band at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandLevels {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BandLevels {
    /// Build the envelope around a precomputed `mean` of `values`.
    pub fn around(mean: f64, values: impl ExactSizeIterator<Item = f64>, multiplier: f64) -> Self {
        let n = values.len();
        let variance = if n == 0 {
            0.0
        } else {
            values
                .map(|v| {
                    let diff = v - mean;
                    diff * diff
                })
                .sum::<f64>()
                / n as f64
        };
        let stddev = variance.max(0.0).sqrt();
        Self {
            upper: mean + multiplier * stddev,
            middle: mean,
            lower: mean - multiplier * stddev,
        }
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// True when `price` lies strictly between the lower and upper band.
    pub fn contains_strictly(&self, price: f64) -> bool {
        price > self.lower && price < self.upper
    }
}

//! Deterministic synthetic bars for benches, demos and tests.
//!
//! A mean-reverting random walk seeded from the instrument name, so the same
//! name always yields the same series. Output is clearly fake data.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::PriceBar;

const START_PRICE: f64 = 1.1;

/// `n` hourly bars starting 2024-01-02 00:00 UTC.
pub fn synthetic_bars(instrument: &str, n: usize) -> Vec<PriceBar> {
    let seed: [u8; 32] = *blake3::hash(instrument.as_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);
    let start: DateTime<Utc> = Utc
        .with_ymd_and_hms(2024, 1, 2, 0, 0, 0)
        .single()
        .unwrap_or_default();

    let mut price = START_PRICE;
    (0..n)
        .map(|i| {
            // Pull back toward the start price so the series oscillates.
            let drift = (START_PRICE - price) * 0.05;
            let ret: f64 = rng.gen_range(-0.004..0.004);
            let open = price;
            let close = (price * (1.0 + ret) + drift).max(0.0001);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.001));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.001));
            price = close;
            PriceBar {
                timestamp: start + Duration::hours(i as i64),
                open,
                high,
                low,
                close,
                volume: rng.gen_range(100..10_000u64),
            }
        })
        .collect()
}

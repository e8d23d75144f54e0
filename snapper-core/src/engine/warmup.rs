//! Warm-up tracking: how many bars a session must see before every
//! component produces full-history values.

use crate::divergence::DivergenceDetector;
use crate::indicators::IndicatorEngine;

/// Components that need a number of bars before their output is complete.
pub trait WarmupRequirement {
    fn warmup_requirement(&self) -> usize;
}

impl WarmupRequirement for IndicatorEngine {
    fn warmup_requirement(&self) -> usize {
        IndicatorEngine::warmup_requirement(self)
    }
}

impl WarmupRequirement for DivergenceDetector {
    fn warmup_requirement(&self) -> usize {
        DivergenceDetector::warmup_requirement(self)
    }
}

#[derive(Debug, Clone)]
pub struct WarmupState {
    warmup_bars: usize,
    bars_processed: usize,
}

impl WarmupState {
    pub fn new(warmup_bars: usize) -> Self {
        Self {
            warmup_bars,
            bars_processed: 0,
        }
    }

    /// Largest requirement across `components`.
    pub fn from_components(components: &[&dyn WarmupRequirement]) -> Self {
        let max_lookback = components
            .iter()
            .map(|c| c.warmup_requirement())
            .max()
            .unwrap_or(0);
        Self::new(max_lookback)
    }

    pub fn process_bar(&mut self) {
        self.bars_processed += 1;
    }

    pub fn reset(&mut self) {
        self.bars_processed = 0;
    }

    pub fn is_warm(&self) -> bool {
        self.bars_processed >= self.warmup_bars
    }

    pub fn bars_until_warm(&self) -> usize {
        self.warmup_bars.saturating_sub(self.bars_processed)
    }
}

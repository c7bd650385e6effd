//! Exponential moving average baseline.
//!
//! The baseline is used to center samples before variance analysis, so that
//! slow drifts in one subject's heart rate do not dominate the covariance.

use serde::{Deserialize, Serialize};

/// Exponential moving average with a fixed smoothing constant.
///
/// A small `alpha` gives a long memory, a large `alpha` a short one. With
/// `alpha == 1.0` the baseline simply tracks the latest sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ema {
    alpha: f64,
    mean: Option<f64>,
}

impl Ema {
    /// Create an empty average. `alpha` must lie in (0, 1]; this is checked
    /// once by `Config::validate` rather than on every construction.
    pub fn new(alpha: f64) -> Self {
        Self { alpha, mean: None }
    }

    /// Fold a new sample into the average and return the updated value.
    pub fn update(&mut self, sample: f64) -> f64 {
        let next = match self.mean {
            // First observation seeds the baseline
            None => sample,
            Some(prev) => self.alpha * sample + (1.0 - self.alpha) * prev,
        };
        self.mean = Some(next);
        next
    }

    /// Current baseline, if any sample has been observed.
    pub fn value(&self) -> Option<f64> {
        self.mean
    }
}

//! The biometric metrics tracked per subject.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A tracked metric.
///
/// The declared order of [`Metric::ALL`] is the order in which the scheduler
/// updates windows and emits results on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Instantaneous heart rate (beats per minute)
    Hr,
    /// Inter-beat interval (milliseconds)
    Ibi,
    /// Heart-rate variability, the absolute change between consecutive IBIs
    Hrv,
}

impl Metric {
    /// All metrics, in scheduling order.
    pub const ALL: [Metric; 3] = [Metric::Hr, Metric::Ibi, Metric::Hrv];

    /// Number of tracked metrics.
    pub const COUNT: usize = Self::ALL.len();

    /// Address segment used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Hr => "hr",
            Metric::Ibi => "ibi",
            Metric::Hrv => "hrv",
        }
    }

    /// Dense index into per-metric storage.
    pub fn index(self) -> usize {
        match self {
            Metric::Hr => 0,
            Metric::Ibi => 1,
            Metric::Hrv => 2,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hr" => Ok(Metric::Hr),
            "ibi" => Ok(Metric::Ibi),
            "hrv" => Ok(Metric::Hrv),
            other => Err(UnknownMetric(other.to_string())),
        }
    }
}

/// Returned when an address names a metric outside the tracked set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMetric(pub String);

impl fmt::Display for UnknownMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown metric '{}'", self.0)
    }
}

impl std::error::Error for UnknownMetric {}

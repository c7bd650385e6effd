//! Core functionality for the Synheart Synchrony engine.
//!
//! This module contains:
//! - The tracked metric set
//! - Exponential baseline smoothing
//! - The capacity-bounded subject registry
//! - Rolling history windows
//! - The synchrony spectrum computation

pub mod baseline;
pub mod metric;
pub mod registry;
pub mod synchrony;
pub mod windowing;

// Re-export commonly used types
pub use baseline::Ema;
pub use metric::{Metric, UnknownMetric};
pub use registry::{RegistryError, Slot, SubjectRegistry};
pub use synchrony::{compute_spectrum, masked_covariance, SynchronyError};
pub use windowing::{RollingWindow, WindowStore};

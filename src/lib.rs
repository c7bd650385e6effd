//! Synheart Synchrony - cross-subject heart-rate synchrony over OSC.
//!
//! This library ingests heart-rate (HR), inter-beat interval (IBI) and
//! heart-rate variability (HRV) samples from any number of wearable sensors,
//! keeps a rolling history per subject and metric, and periodically computes
//! how strongly the subjects' signals co-vary.
//!
//! # Synchrony
//!
//! For each metric, the recent histories of all active subjects form a
//! matrix. The singular values of its cross-subject covariance, normalized to
//! sum to one, describe how concentrated the shared variance is: `[1.0, 0.0]`
//! for two subjects moving in lockstep, `[0.5, 0.5]` for two independent ones.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Synheart Synchrony                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Ingest    │──▶│  Registry   │──▶│  Windowing  │       │
//! │  │ (OSC/UDP)   │   │ (+baseline) │   │ (ring/tick) │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                             │               │
//! │                                             ▼               │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │  Emission   │◀────────────────────│  Synchrony  │       │
//! │  │ (OSC/UDP)   │                     │ (spectrum)  │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use rosc::{OscMessage, OscType};
//! use synheart_synchrony::{Config, SynchronyEngine};
//!
//! let mut engine = SynchronyEngine::new(&Config::default());
//! let message = OscMessage {
//!     addr: "/polar/1/hr".to_string(),
//!     args: vec![OscType::Int(64)],
//! };
//! engine.ingest(&message).unwrap();
//!
//! let report = engine.tick();
//! assert_eq!(report.results[0].spectrum, vec![1.0]);
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod ingest;
pub mod service;
pub mod stats;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, Destination};
pub use core::{compute_spectrum, Metric, SubjectRegistry, SynchronyError};
pub use engine::{SimilarityResult, SynchronyEngine, TickReport};
pub use ingest::{decode_messages, IngestError, Sample};
pub use service::{run, ServiceHandle, SharedEngine};
pub use stats::{create_shared_stats, EngineStats, SharedStats, StatsSnapshot};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

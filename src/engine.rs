//! The synchrony engine: subject state plus rolling windows.
//!
//! `SynchronyEngine` is the single owner of all per-subject state. The
//! service wraps it in one mutex; each `ingest` call and each `tick` runs to
//! completion under that lock, so samples never interleave with a window
//! update.

use crate::config::Config;
use crate::core::{
    compute_spectrum, Metric, RollingWindow, Slot, SubjectRegistry, SynchronyError, WindowStore,
};
use crate::ingest::{parse_sample, IngestError, Sample};
use rosc::{encoder, OscMessage, OscPacket, OscType};
use serde::{Deserialize, Serialize};

/// Address segment used for outbound results.
pub const SIMILARITY_SEGMENT: &str = "similarity";

/// Normalized synchrony spectrum for one metric at one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityResult {
    pub metric: Metric,
    /// Singular values of the cross-subject covariance, descending, summing to one
    pub spectrum: Vec<f64>,
    /// One-based tags of the subjects that contributed, in slot order
    pub subjects: Vec<u32>,
}

impl SimilarityResult {
    /// Outbound address, e.g. `/polar/similarity/hr`.
    pub fn address(&self, namespace: &str) -> String {
        format!("/{namespace}/{SIMILARITY_SEGMENT}/{}", self.metric)
    }

    /// OSC message with one float argument per spectrum entry.
    pub fn to_message(&self, namespace: &str) -> OscMessage {
        OscMessage {
            addr: self.address(namespace),
            args: self
                .spectrum
                .iter()
                .map(|&v| OscType::Float(v as f32))
                .collect(),
        }
    }

    /// Encode as a datagram payload.
    pub fn encode(&self, namespace: &str) -> Result<Vec<u8>, rosc::OscError> {
        encoder::encode(&OscPacket::Message(self.to_message(namespace)))
    }
}

/// Everything a single tick produced.
#[derive(Debug, Default)]
pub struct TickReport {
    /// Ticks run since the engine was created, including this one
    pub tick: u64,
    /// Number of active subjects at the start of the tick
    pub active_subjects: usize,
    /// Results in metric order; metrics without active subjects are absent
    pub results: Vec<SimilarityResult>,
    /// Metrics whose computation failed this tick
    pub failures: Vec<(Metric, SynchronyError)>,
}

/// Subject registry, baselines and rolling windows for all metrics.
#[derive(Debug, Clone)]
pub struct SynchronyEngine {
    namespace: String,
    centered: bool,
    registry: SubjectRegistry,
    windows: WindowStore,
}

impl SynchronyEngine {
    /// Create an engine sized from the configuration. The configuration is
    /// expected to have passed `Config::validate`.
    pub fn new(config: &Config) -> Self {
        Self {
            namespace: config.namespace.clone(),
            centered: config.centered,
            registry: SubjectRegistry::new(config.max_subjects, config.alpha),
            windows: WindowStore::new(config.max_subjects, config.window_depth),
        }
    }

    /// Parse and apply one inbound message.
    pub fn ingest(&mut self, message: &OscMessage) -> Result<Sample, IngestError> {
        let sample = parse_sample(&self.namespace, message)?;
        self.apply(sample)?;
        Ok(sample)
    }

    /// Apply a validated sample: grow the registry if needed, mark the subject
    /// active and update its latest value and baseline.
    pub fn apply(&mut self, sample: Sample) -> Result<Slot, IngestError> {
        let slot = self.registry.resolve_or_grow(sample.subject)?;
        self.registry.set(slot, sample.metric, sample.value)?;
        Ok(slot)
    }

    /// Run one scheduler tick: for each metric in order, push the newest
    /// column into its window and compute the synchrony spectrum over the
    /// active subjects.
    pub fn tick(&mut self) -> TickReport {
        let active = self.registry.snapshot_active();
        let mut report = TickReport {
            active_subjects: active.len(),
            ..TickReport::default()
        };

        for metric in Metric::ALL {
            self.update_window(metric, &active);
            match self.compute(metric, &active) {
                Ok(Some(result)) => report.results.push(result),
                Ok(None) => {}
                Err(e) => report.failures.push((metric, e)),
            }
        }
        report.tick = self.windows.window(Metric::Hr).ticks();
        report
    }

    /// Advance one metric's window and write the current value of every
    /// active subject into the newest column.
    pub fn update_window(&mut self, metric: Metric, active: &[Slot]) {
        let registry = &self.registry;
        let centered = self.centered;
        let values = active.iter().filter_map(|&slot| {
            let value = if centered {
                registry.centered(slot, metric)
            } else {
                registry.latest(slot, metric)
            };
            value.map(|v| (slot, v))
        });
        self.windows.window_mut(metric).push_column(values);
    }

    /// Synchrony spectrum over the given slots' histories for one metric.
    pub fn compute(
        &self,
        metric: Metric,
        active: &[Slot],
    ) -> Result<Option<SimilarityResult>, SynchronyError> {
        let rows = self.windows.window(metric).rows_for(active);
        let spectrum = compute_spectrum(&rows)?;

        Ok(spectrum.map(|spectrum| SimilarityResult {
            metric,
            spectrum,
            subjects: active.iter().map(|&slot| slot as u32 + 1).collect(),
        }))
    }

    pub fn registry(&self) -> &SubjectRegistry {
        &self.registry
    }

    pub fn window(&self, metric: Metric) -> &RollingWindow {
        self.windows.window(metric)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

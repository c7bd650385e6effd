//! Capacity-bounded registry of observed subjects.
//!
//! The registry owns all per-subject state: the active flag, the latest value
//! for each metric and the exponential baseline for each metric. Storage is a
//! struct-of-arrays whose length is the number of slots seen so far; it never
//! shrinks and never grows past the configured capacity.

use crate::core::baseline::Ema;
use crate::core::metric::Metric;

/// Zero-based subject slot.
pub type Slot = usize;

/// Registry errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Subject tags are one-based; zero has no slot.
    InvalidTag(u32),
    /// The tag maps to a slot at or beyond the configured capacity.
    CapacityExceeded { tag: u32, capacity: usize },
    /// The slot has not been resolved yet.
    UnknownSlot(Slot),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::InvalidTag(tag) => write!(f, "Invalid subject tag: {tag}"),
            RegistryError::CapacityExceeded { tag, capacity } => {
                write!(f, "Subject {tag} exceeds capacity of {capacity} subjects")
            }
            RegistryError::UnknownSlot(slot) => write!(f, "Unknown subject slot: {slot}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Per-subject state for every slot observed so far.
#[derive(Debug, Clone)]
pub struct SubjectRegistry {
    capacity: usize,
    alpha: f64,
    active: Vec<bool>,
    latest: [Vec<Option<f64>>; Metric::COUNT],
    baselines: [Vec<Ema>; Metric::COUNT],
}

impl SubjectRegistry {
    /// Create an empty registry holding at most `capacity` subjects, with
    /// baselines smoothed by `alpha`.
    pub fn new(capacity: usize, alpha: f64) -> Self {
        Self {
            capacity,
            alpha,
            active: Vec::with_capacity(capacity),
            latest: std::array::from_fn(|_| Vec::with_capacity(capacity)),
            baselines: std::array::from_fn(|_| Vec::with_capacity(capacity)),
        }
    }

    /// Map a one-based subject tag to its slot, creating it (and any gap
    /// slots below it) if it has not been seen yet.
    ///
    /// Newly created slots start inactive with every metric unset.
    pub fn resolve_or_grow(&mut self, tag: u32) -> Result<Slot, RegistryError> {
        if tag == 0 {
            return Err(RegistryError::InvalidTag(tag));
        }
        let slot = (tag - 1) as usize;
        if slot >= self.capacity {
            return Err(RegistryError::CapacityExceeded {
                tag,
                capacity: self.capacity,
            });
        }

        while self.active.len() <= slot {
            self.active.push(false);
            for metric in Metric::ALL {
                self.latest[metric.index()].push(None);
                self.baselines[metric.index()].push(Ema::new(self.alpha));
            }
        }

        Ok(slot)
    }

    /// Record a sample: marks the subject active, stores the value as the
    /// latest for `metric` and folds it into the baseline.
    pub fn set(&mut self, slot: Slot, metric: Metric, value: f64) -> Result<(), RegistryError> {
        if slot >= self.active.len() {
            return Err(RegistryError::UnknownSlot(slot));
        }
        self.active[slot] = true;
        self.latest[metric.index()][slot] = Some(value);
        self.baselines[metric.index()][slot].update(value);
        Ok(())
    }

    /// Slots currently flagged active, in ascending order.
    pub fn snapshot_active(&self) -> Vec<Slot> {
        self.active
            .iter()
            .enumerate()
            .filter(|(_, active)| **active)
            .map(|(slot, _)| slot)
            .collect()
    }

    /// Whether a slot has received at least one sample.
    pub fn is_active(&self, slot: Slot) -> bool {
        self.active.get(slot).copied().unwrap_or(false)
    }

    /// Most recent sample for a slot and metric.
    pub fn latest(&self, slot: Slot, metric: Metric) -> Option<f64> {
        self.latest[metric.index()].get(slot).copied().flatten()
    }

    /// Current baseline for a slot and metric.
    pub fn baseline(&self, slot: Slot, metric: Metric) -> Option<f64> {
        self.baselines[metric.index()]
            .get(slot)
            .and_then(|ema| ema.value())
    }

    /// Latest sample minus its baseline.
    pub fn centered(&self, slot: Slot, metric: Metric) -> Option<f64> {
        Some(self.latest(slot, metric)? - self.baseline(slot, metric)?)
    }

    /// Number of slots observed so far (active or gap-filled).
    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

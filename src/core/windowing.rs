//! Rolling per-metric history windows.
//!
//! Each metric has one window matrix with a row per subject slot and a column
//! per recent tick. The matrix is a ring buffer: every tick advances the write
//! cursor by one column, which discards the oldest tick and reuses its storage
//! for the newest one. Cells are `None` wherever a subject had no data at that
//! tick, so "missing" is never confused with a legitimate zero deviation.

use crate::core::metric::Metric;
use crate::core::registry::Slot;

/// Fixed-size ring buffer of per-subject samples for one metric.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    rows: usize,
    depth: usize,
    /// Row-major `rows * depth` cells
    cells: Vec<Option<f64>>,
    /// Column holding the newest tick
    cursor: usize,
    ticks: u64,
}

impl RollingWindow {
    /// Create a window with `rows` subject slots and `depth` ticks of history,
    /// entirely missing.
    pub fn new(rows: usize, depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            rows,
            depth,
            cells: vec![None; rows * depth],
            cursor: depth - 1,
            ticks: 0,
        }
    }

    /// Advance by one tick and fill the newest column.
    ///
    /// The column vacated by the rotation is cleared first; only the slots
    /// yielded by `values` receive data, every other row stays missing for
    /// this tick.
    pub fn push_column<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = (Slot, f64)>,
    {
        self.cursor = (self.cursor + 1) % self.depth;
        self.ticks += 1;

        for row in 0..self.rows {
            self.cells[row * self.depth + self.cursor] = None;
        }
        for (slot, value) in values {
            if slot < self.rows {
                self.cells[slot * self.depth + self.cursor] = Some(value);
            }
        }
    }

    /// Cell for `slot` written `age` ticks ago (0 = newest).
    pub fn get(&self, slot: Slot, age: usize) -> Option<f64> {
        if slot >= self.rows || age >= self.depth {
            return None;
        }
        let column = (self.cursor + self.depth - age) % self.depth;
        self.cells[slot * self.depth + column]
    }

    /// History of one slot, oldest first.
    pub fn row(&self, slot: Slot) -> Vec<Option<f64>> {
        (0..self.depth).rev().map(|age| self.get(slot, age)).collect()
    }

    /// Histories of the given slots, oldest first within each row.
    pub fn rows_for(&self, slots: &[Slot]) -> Vec<Vec<Option<f64>>> {
        slots.iter().map(|&slot| self.row(slot)).collect()
    }

    /// Number of ticks pushed since creation.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// One rolling window per tracked metric.
#[derive(Debug, Clone)]
pub struct WindowStore {
    windows: [RollingWindow; Metric::COUNT],
}

impl WindowStore {
    pub fn new(rows: usize, depth: usize) -> Self {
        Self {
            windows: std::array::from_fn(|_| RollingWindow::new(rows, depth)),
        }
    }

    pub fn window(&self, metric: Metric) -> &RollingWindow {
        &self.windows[metric.index()]
    }

    pub fn window_mut(&mut self, metric: Metric) -> &mut RollingWindow {
        &mut self.windows[metric.index()]
    }
}

//! Progress reporting
//!
//! Stages report local `(done, total)` deltas through a [`ProgressSink`]; the
//! pipeline owns a [`ProgressTracker`] that folds them into the overall
//! [`ProgressState`] seen by observers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Receiver of per-stage progress
pub trait ProgressSink {
    /// `done` units of `total` have been processed for the current item
    fn advance(&mut self, done: u64, total: u64);
}

impl<F: FnMut(u64, u64)> ProgressSink for F {
    fn advance(&mut self, done: u64, total: u64) {
        self(done, total)
    }
}

/// A sink that drops every report
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&mut self, _done: u64, _total: u64) {}
}

/// Snapshot of a run's progress
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Fraction of the whole run, in `[0, 1]`
    pub overall: f64,
    /// Fraction of the file currently being read or written, in `[0, 1]`
    pub current: f64,
    /// File currently being processed
    pub current_file: Option<PathBuf>,
}

/// In-stage fractions never reach 1 until the stage is marked complete
const STAGE_CEILING: f64 = 0.99;

/// Aggregates stage-local progress into overall progress
///
/// The run is weighted as one unit per input file, one for augmentation and
/// one for writing. Overall progress never decreases and only reaches 1 via
/// [`ProgressTracker::finish`].
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    units: usize,
    completed: usize,
    state: ProgressState,
}

impl ProgressTracker {
    /// Create a tracker for a run over `inputs` files
    pub fn new(inputs: usize) -> Self {
        Self {
            units: inputs + 2,
            completed: 0,
            state: ProgressState::default(),
        }
    }

    /// Current snapshot
    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Start a new unit of work, optionally tied to a file
    pub fn begin(&mut self, file: Option<PathBuf>) -> &ProgressState {
        self.state.current = 0.0;
        self.state.current_file = file;
        &self.state
    }

    /// Record progress inside the current unit
    pub fn update(&mut self, done: u64, total: u64) -> &ProgressState {
        let fraction = if total == 0 {
            1.0
        } else {
            (done as f64 / total as f64).clamp(0.0, 1.0)
        };
        self.state.current = self.state.current.max(fraction);
        self.bump(fraction.min(STAGE_CEILING));
        &self.state
    }

    /// Mark the current unit as done
    pub fn complete(&mut self) -> &ProgressState {
        self.completed = (self.completed + 1).min(self.units);
        self.state.current = 1.0;
        if self.completed < self.units {
            self.bump(0.0);
        }
        &self.state
    }

    /// Mark the whole run as done
    pub fn finish(&mut self) -> &ProgressState {
        self.completed = self.units;
        self.state.overall = 1.0;
        self.state.current = 1.0;
        self.state.current_file = None;
        &self.state
    }

    fn bump(&mut self, in_stage: f64) {
        let overall = (self.completed as f64 + in_stage) / self.units as f64;
        // strictly below 1 until finish()
        let overall = overall.min(1.0 - f64::EPSILON);
        self.state.overall = self.state.overall.max(overall);
    }
}

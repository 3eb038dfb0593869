//! Run orchestration: resolve, read, augment, write
//!
//! A run moves through `Resolving → Reading(1..=N) → Augmenting → Writing`
//! and ends with exactly one [`Completion`]. Every failure is terminal and
//! carries the stage it happened in. Nothing is retried.
//!
//! [`Pipeline::run`] blocks the calling thread. [`Pipeline::spawn`] runs on a
//! worker thread and streams [`PipelineEvent`]s over a channel, so a front-end
//! can render progress while files are read and written.

use crate::augment::{AugmentConfig, AugmentationEngine};
use crate::config::RunRequest;
use crate::error::{Error, ErrorKind};
use crate::format::FormatRegistry;
use crate::progress::{ProgressState, ProgressTracker};
use crate::reader::TableReader;
use crate::resolver::InputResolver;
use crate::table::Table;
use crate::writer::TableWriter;
use crossbeam_channel::{Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

/// A step of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Resolving,
    /// Reading input `index` (1-based)
    Reading { index: usize, path: PathBuf },
    Augmenting,
    Writing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Resolving => write!(f, "resolving inputs"),
            Stage::Reading { index, path } => {
                write!(f, "reading input {} ('{}')", index, path.display())
            }
            Stage::Augmenting => write!(f, "augmenting"),
            Stage::Writing => write!(f, "writing output"),
        }
    }
}

/// A run that stopped with an error
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PipelineFailure {
    /// Stage the run was in
    pub stage: Stage,
    /// The error, as raised by the failing component
    #[source]
    pub error: Error,
}

impl PipelineFailure {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn path(&self) -> Option<&Path> {
        self.error.path()
    }
}

/// Summary of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Wall-clock time from the start of resolving to the end of writing
    pub elapsed: Duration,
    pub output: PathBuf,
    pub format: String,
    pub inputs: Vec<PathBuf>,
    pub rows: usize,
    pub columns: usize,
}

/// Terminal outcome of a run
pub type PipelineResult = std::result::Result<RunReport, PipelineFailure>;

/// The single terminal notification of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Succeeded {
        elapsed: Duration,
        output: PathBuf,
        rows: usize,
        columns: usize,
    },
    Failed {
        kind: ErrorKind,
        path: Option<PathBuf>,
        stage: Stage,
        message: String,
    },
}

impl From<&PipelineResult> for Completion {
    fn from(result: &PipelineResult) -> Self {
        match result {
            Ok(report) => Completion::Succeeded {
                elapsed: report.elapsed,
                output: report.output.clone(),
                rows: report.rows,
                columns: report.columns,
            },
            Err(failure) => Completion::Failed {
                kind: failure.kind(),
                path: failure.path().map(Path::to_path_buf),
                stage: failure.stage.clone(),
                message: failure.error.to_string(),
            },
        }
    }
}

/// Notifications delivered while a run is in flight
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StageStarted(Stage),
    Progress(ProgressState),
    Finished(Completion),
}

/// Receiver of pipeline notifications
pub trait PipelineObserver {
    fn notify(&self, event: PipelineEvent);
}

/// Ignores every event
impl PipelineObserver for () {
    fn notify(&self, _event: PipelineEvent) {}
}

impl PipelineObserver for Sender<PipelineEvent> {
    fn notify(&self, event: PipelineEvent) {
        // Nobody listening is not an error for the run
        let _ = self.send(event);
    }
}

/// Forwards events and keeps the latest progress for polling
struct SharedObserver {
    sender: Sender<PipelineEvent>,
    progress: Arc<Mutex<ProgressState>>,
}

impl PipelineObserver for SharedObserver {
    fn notify(&self, event: PipelineEvent) {
        if let PipelineEvent::Progress(state) = &event {
            let mut guard = self.progress.lock().unwrap_or_else(|e| e.into_inner());
            *guard = state.clone();
        }
        self.sender.notify(event);
    }
}

/// A run executing on a worker thread
pub struct RunHandle {
    events: Receiver<PipelineEvent>,
    progress: Arc<Mutex<ProgressState>>,
    cancel: Arc<AtomicBool>,
    join: JoinHandle<PipelineResult>,
}

impl RunHandle {
    /// Stream of events; ends after [`PipelineEvent::Finished`]
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    /// Latest progress snapshot
    pub fn progress(&self) -> ProgressState {
        self.progress
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Ask the run to stop before its next stage or input file
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Wait for the run to end
    pub fn wait(self) -> PipelineResult {
        match self.join.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Runs the resolve, read, augment and write stages
#[derive(Clone)]
pub struct Pipeline {
    registry: Arc<FormatRegistry>,
    engine: Arc<AugmentationEngine>,
}

impl Pipeline {
    /// Create a pipeline over the given formats and engine
    pub fn new(registry: FormatRegistry, engine: AugmentationEngine) -> Self {
        Self {
            registry: Arc::new(registry),
            engine: Arc::new(engine),
        }
    }

    /// Pipeline with the built-in formats and an engine set up from `config`
    pub fn from_config(config: &AugmentConfig) -> Self {
        Self::new(
            FormatRegistry::with_defaults(),
            AugmentationEngine::from_config(config),
        )
    }

    /// Execute a run on the calling thread
    pub fn run(&self, request: &RunRequest, observer: &dyn PipelineObserver) -> PipelineResult {
        self.execute(request, observer, &AtomicBool::new(false))
    }

    /// Execute a run on a worker thread
    pub fn spawn(&self, request: RunRequest) -> RunHandle {
        let (sender, events) = crossbeam_channel::unbounded();
        let progress = Arc::new(Mutex::new(ProgressState::default()));
        let cancel = Arc::new(AtomicBool::new(false));

        let pipeline = self.clone();
        let observer = SharedObserver {
            sender,
            progress: Arc::clone(&progress),
        };
        let flag = Arc::clone(&cancel);
        let join = thread::spawn(move || pipeline.execute(&request, &observer, &flag));

        RunHandle {
            events,
            progress,
            cancel,
            join,
        }
    }

    fn execute(
        &self,
        request: &RunRequest,
        observer: &dyn PipelineObserver,
        cancel: &AtomicBool,
    ) -> PipelineResult {
        let start = Instant::now();
        tracing::info!(output = %request.output.display(), "run started");

        let result = self.stages(request, observer, cancel, start);
        match &result {
            Ok(report) => tracing::info!(
                elapsed = %format_elapsed(report.elapsed),
                rows = report.rows,
                columns = report.columns,
                "run finished"
            ),
            Err(failure) => tracing::warn!(
                kind = %failure.kind(),
                stage = %failure.stage,
                "run failed: {}",
                failure.error
            ),
        }

        observer.notify(PipelineEvent::Finished(Completion::from(&result)));
        result
    }

    fn stages(
        &self,
        request: &RunRequest,
        observer: &dyn PipelineObserver,
        cancel: &AtomicBool,
        start: Instant,
    ) -> PipelineResult {
        let emit = |state: &ProgressState| observer.notify(PipelineEvent::Progress(state.clone()));

        // Resolving
        enter(Stage::Resolving, observer, cancel)?;
        let resolver = InputResolver::new(&self.registry.extensions());
        let selection = resolver
            .resolve(&request.inputs, request.pattern.as_deref(), &request.output)
            .map_err(|error| PipelineFailure {
                stage: Stage::Resolving,
                error,
            })?;
        tracing::debug!(inputs = selection.inputs.len(), "inputs resolved");

        let mut tracker = ProgressTracker::new(selection.inputs.len());
        emit(tracker.state());

        // Reading(i)
        let reader = TableReader::new(&self.registry);
        let mut tables: Vec<Table> = Vec::with_capacity(selection.inputs.len());
        for (i, path) in selection.inputs.iter().enumerate() {
            let stage = Stage::Reading {
                index: i + 1,
                path: path.clone(),
            };
            enter(stage.clone(), observer, cancel)?;
            emit(tracker.begin(Some(path.clone())));

            let read = {
                let mut sink = |done: u64, total: u64| emit(tracker.update(done, total));
                reader.read(path, &mut sink)
            };
            let table = read.map_err(|error| PipelineFailure { stage, error })?;
            tracing::debug!(
                path = %path.display(),
                rows = table.row_count(),
                columns = table.column_count(),
                "input read"
            );
            tables.push(table);
            emit(tracker.complete());
        }

        // Augmenting
        enter(Stage::Augmenting, observer, cancel)?;
        emit(tracker.begin(None));
        let augmented = {
            let mut sink = |done: u64, total: u64| emit(tracker.update(done, total));
            self.engine.augment_with_progress(&tables, &mut sink)
        };
        let table = augmented.map_err(|error| PipelineFailure {
            stage: Stage::Augmenting,
            error,
        })?;
        drop(tables);
        emit(tracker.complete());

        // Writing
        enter(Stage::Writing, observer, cancel)?;
        let format = request.output_format(&self.registry);
        emit(tracker.begin(Some(selection.output.clone())));
        let written = {
            let mut sink = |done: u64, total: u64| emit(tracker.update(done, total));
            TableWriter::new(&self.registry).write(&table, &selection.output, &format, &mut sink)
        };
        written.map_err(|error| PipelineFailure {
            stage: Stage::Writing,
            error,
        })?;

        let elapsed = start.elapsed();
        emit(tracker.finish());

        Ok(RunReport {
            elapsed,
            output: selection.output,
            format,
            inputs: selection.inputs,
            rows: table.row_count(),
            columns: table.column_count(),
        })
    }
}

/// Check for cancellation, then announce the stage
fn enter(
    stage: Stage,
    observer: &dyn PipelineObserver,
    cancel: &AtomicBool,
) -> std::result::Result<(), PipelineFailure> {
    if cancel.load(Ordering::SeqCst) {
        return Err(PipelineFailure {
            stage,
            error: Error::Cancelled,
        });
    }
    tracing::debug!(%stage, "stage started");
    observer.notify(PipelineEvent::StageStarted(stage));
    Ok(())
}

/// Human-readable elapsed time, e.g. `1h2min3s` or `0.125s`
///
/// Under a minute the seconds keep millisecond precision; above it every
/// unit is whole and zero units are left out.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    if total < 60 {
        let secs = (elapsed.as_secs_f64() * 1000.0).round() / 1000.0;
        return if secs > 0.0 {
            format!("{}s", secs)
        } else {
            "0s".to_string()
        };
    }

    let parts = [
        (total / 86_400, "d"),
        (total % 86_400 / 3_600, "h"),
        (total % 3_600 / 60, "min"),
        (total % 60, "s"),
    ];
    parts
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{}{}", value, unit))
        .collect()
}

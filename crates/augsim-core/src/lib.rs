//! augsim-core: Core library for augmenting mortality record tables
//!
//! This library provides functionality to:
//! - Resolve input files from chosen paths and glob patterns
//! - Read DBF, CSV and JSON files into a common table model
//! - Combine tables and derive SIM (mortality information system) columns
//! - Write the result atomically as CSV or JSON
//! - Run the whole thing as a pipeline with progress and classified errors

pub mod augment;
pub mod config;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod progress;
pub mod reader;
pub mod resolver;
pub mod table;
pub mod writer;

pub use augment::{AugmentConfig, AugmentationEngine, Augmenter, CombineRule, Layout};
pub use config::{RunConfig, RunRequest};
pub use error::{Error, ErrorKind, Result};
pub use format::{FormatRegistry, TableFormat};
pub use pipeline::{
    format_elapsed, Completion, Pipeline, PipelineEvent, PipelineFailure, PipelineObserver,
    PipelineResult, RunHandle, RunReport, Stage,
};
pub use progress::{NoProgress, ProgressSink, ProgressState, ProgressTracker};
pub use reader::{read_table, TableReader};
pub use resolver::{InputResolver, InputSelection};
pub use table::{CellValue, Column, Row, Table};
pub use writer::TableWriter;

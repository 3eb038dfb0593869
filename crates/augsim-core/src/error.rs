//! Error types for augsim-core
//!
//! Every failure is raised where it happens and carries the offending path,
//! so callers can show the kind and the file name without re-parsing a
//! message. [`ErrorKind`] is the flat, copyable classification of [`Error`].

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in augsim-core
#[derive(Debug, Error)]
pub enum Error {
    /// Neither chosen files nor a pattern produced any input
    #[error("no input files were selected")]
    MissingInputs,

    /// The selection pattern is empty or whitespace only
    #[error("the selection pattern is blank")]
    BlankPattern,

    /// The selection pattern is not valid glob syntax
    #[error("invalid selection pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// The output path is also one of the inputs
    #[error("output file '{path}' is also an input file")]
    OutputIsInput { path: PathBuf },

    /// No registered format recognizes the file
    #[error("unsupported file format: '{path}'")]
    UnsupportedFormat { path: PathBuf },

    /// The format is known but the content is not a well-formed table
    #[error("invalid or unsupported content in '{path}': {message}")]
    InvalidContent { path: PathBuf, message: String },

    /// Failed to read an input file
    #[error("failed to read file '{path}': {source}")]
    ReadIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Input tables cannot be combined under the configured rule
    #[error("augmentation failed: {message}")]
    Augmentation { message: String },

    /// Output directory does not exist or the path is malformed
    #[error("invalid output path: '{path}'")]
    InvalidPath { path: PathBuf },

    /// Output path names an existing directory
    #[error("output file cannot be a directory: '{path}'")]
    OutputIsDirectory { path: PathBuf },

    /// Write permission denied at the output location
    #[error("cannot save the file at '{path}': permission denied")]
    Forbidden { path: PathBuf },

    /// The output volume is mounted read-only
    #[error("cannot save files on a read-only volume: '{path}'")]
    ReadOnlyTarget { path: PathBuf },

    /// Not enough free space for the output
    #[error("insufficient space to save '{path}'")]
    InsufficientSpace { path: PathBuf },

    /// The output file name exceeds the filesystem limit
    #[error("file name is too long: '{path}'")]
    FileNameTooLong { path: PathBuf },

    /// The requested output format cannot be written
    #[error("unsupported output format '{format}' for '{path}'")]
    UnsupportedOutputFormat { path: PathBuf, format: String },

    /// Any other failure while writing the output
    #[error("failed to write file '{path}': {source}")]
    WriteIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The run was cancelled by the caller
    #[error("the run was cancelled")]
    Cancelled,

    /// Invalid run configuration
    #[error("invalid configuration '{path}': {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// The classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingInputs => ErrorKind::MissingInputs,
            Error::BlankPattern => ErrorKind::BlankPattern,
            Error::InvalidPattern { .. } => ErrorKind::InvalidPattern,
            Error::OutputIsInput { .. } => ErrorKind::OutputIsInput,
            Error::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Error::InvalidContent { .. } => ErrorKind::InvalidOrUnsupportedContent,
            Error::ReadIo { .. } => ErrorKind::ReadIoFailure,
            Error::Augmentation { .. } => ErrorKind::AugmentationFailure,
            Error::InvalidPath { .. } => ErrorKind::InvalidPath,
            Error::OutputIsDirectory { .. } => ErrorKind::OutputIsDirectory,
            Error::Forbidden { .. } => ErrorKind::Forbidden,
            Error::ReadOnlyTarget { .. } => ErrorKind::ReadOnlyTarget,
            Error::InsufficientSpace { .. } => ErrorKind::InsufficientSpace,
            Error::FileNameTooLong { .. } => ErrorKind::FileNameTooLong,
            Error::UnsupportedOutputFormat { .. } => ErrorKind::UnsupportedOutputFormat,
            Error::WriteIo { .. } => ErrorKind::WriteIoFailure,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Config { .. } => ErrorKind::Config,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// The file this error is about, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::OutputIsInput { path }
            | Error::UnsupportedFormat { path }
            | Error::InvalidContent { path, .. }
            | Error::ReadIo { path, .. }
            | Error::InvalidPath { path }
            | Error::OutputIsDirectory { path }
            | Error::Forbidden { path }
            | Error::ReadOnlyTarget { path }
            | Error::InsufficientSpace { path }
            | Error::FileNameTooLong { path }
            | Error::UnsupportedOutputFormat { path, .. }
            | Error::WriteIo { path, .. }
            | Error::Config { path, .. } => Some(path),
            _ => None,
        }
    }

    pub(crate) fn invalid_content(path: &Path, message: impl Into<String>) -> Self {
        Error::InvalidContent {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    pub(crate) fn augmentation(message: impl Into<String>) -> Self {
        Error::Augmentation {
            message: message.into(),
        }
    }
}

/// Flat classification of [`Error`], suitable for reporting to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingInputs,
    BlankPattern,
    InvalidPattern,
    OutputIsInput,
    UnsupportedFormat,
    InvalidOrUnsupportedContent,
    ReadIoFailure,
    AugmentationFailure,
    InvalidPath,
    OutputIsDirectory,
    Forbidden,
    ReadOnlyTarget,
    InsufficientSpace,
    FileNameTooLong,
    UnsupportedOutputFormat,
    WriteIoFailure,
    Cancelled,
    Config,
    Io,
}

impl ErrorKind {
    /// Stable identifier used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingInputs => "missing-inputs",
            ErrorKind::BlankPattern => "blank-pattern",
            ErrorKind::InvalidPattern => "invalid-pattern",
            ErrorKind::OutputIsInput => "output-is-input",
            ErrorKind::UnsupportedFormat => "unsupported-format",
            ErrorKind::InvalidOrUnsupportedContent => "invalid-content",
            ErrorKind::ReadIoFailure => "read-io",
            ErrorKind::AugmentationFailure => "augmentation",
            ErrorKind::InvalidPath => "invalid-path",
            ErrorKind::OutputIsDirectory => "output-is-directory",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::ReadOnlyTarget => "read-only",
            ErrorKind::InsufficientSpace => "insufficient-space",
            ErrorKind::FileNameTooLong => "file-name-too-long",
            ErrorKind::UnsupportedOutputFormat => "unsupported-output-format",
            ErrorKind::WriteIoFailure => "write-io",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an IO error raised while writing `path`
pub fn classify_write_error(err: io::Error, path: &Path) -> Error {
    let path = path.to_path_buf();
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => Error::InvalidPath { path },
        io::ErrorKind::IsADirectory => Error::OutputIsDirectory { path },
        io::ErrorKind::PermissionDenied => Error::Forbidden { path },
        io::ErrorKind::ReadOnlyFilesystem => Error::ReadOnlyTarget { path },
        io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded => {
            Error::InsufficientSpace { path }
        }
        io::ErrorKind::InvalidFilename => Error::FileNameTooLong { path },
        _ => Error::WriteIo { path, source: err },
    }
}

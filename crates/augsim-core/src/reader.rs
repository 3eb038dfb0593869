//! Table reading with format dispatch

use crate::error::{Error, Result};
use crate::format::{FormatRegistry, TableFormat};
use crate::progress::ProgressSink;
use crate::table::Table;
use std::fs;
use std::path::Path;

/// Reads input files into canonical tables
///
/// The format is chosen by file extension; files whose extension is not
/// registered are sniffed from their first bytes.
#[derive(Clone, Copy)]
pub struct TableReader<'a> {
    registry: &'a FormatRegistry,
}

impl<'a> TableReader<'a> {
    /// Create a reader over the given formats
    pub fn new(registry: &'a FormatRegistry) -> Self {
        Self { registry }
    }

    /// Read one file. Either the whole table is returned or an error, never part of one.
    pub fn read(&self, path: &Path, progress: &mut dyn ProgressSink) -> Result<Table> {
        let by_extension = self.registry.for_path(path);

        let bytes = fs::read(path).map_err(|e| Error::ReadIo {
            path: path.to_path_buf(),
            source: e,
        })?;

        let format: &dyn TableFormat = match by_extension {
            Some(format) => format,
            None => self
                .registry
                .sniff(&bytes[..bytes.len().min(1024)])
                .ok_or_else(|| Error::UnsupportedFormat {
                    path: path.to_path_buf(),
                })?,
        };

        tracing::debug!(path = %path.display(), format = format.id(), bytes = bytes.len(), "decoding");
        let table = format.decode(&bytes, path, progress)?;

        if !table.is_rectangular() {
            return Err(Error::invalid_content(path, "rows differ in length from the header"));
        }
        let dups = table.duplicate_columns();
        if !dups.is_empty() {
            tracing::warn!(path = %path.display(), columns = ?dups, "duplicate column names");
        }

        Ok(table)
    }
}

/// Read one file with the default formats
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let registry = FormatRegistry::with_defaults();
    TableReader::new(&registry).read(path.as_ref(), &mut crate::progress::NoProgress)
}

//! Table writing with filesystem precondition checks
//!
//! The table is encoded in memory, written in chunks to a temporary file
//! next to the target and renamed over the target once complete. A failed
//! write never leaves a file at the target path.

use crate::error::{classify_write_error, Error, Result};
use crate::format::FormatRegistry;
use crate::progress::ProgressSink;
use crate::table::Table;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

/// Longest file name accepted by common filesystems, in bytes
pub const MAX_FILE_NAME_LEN: usize = 255;

const CHUNK_SIZE: usize = 64 * 1024;

/// Writes canonical tables to files
#[derive(Clone, Copy)]
pub struct TableWriter<'a> {
    registry: &'a FormatRegistry,
}

impl<'a> TableWriter<'a> {
    /// Create a writer over the given formats
    pub fn new(registry: &'a FormatRegistry) -> Self {
        Self { registry }
    }

    /// Write `table` to `path` in `format`, returning the time spent
    pub fn write(
        &self,
        table: &Table,
        path: &Path,
        format: &str,
        progress: &mut dyn ProgressSink,
    ) -> Result<Duration> {
        let start = Instant::now();

        let encoder = self
            .registry
            .by_id(format)
            .filter(|f| f.can_encode())
            .ok_or_else(|| Error::UnsupportedOutputFormat {
                path: path.to_path_buf(),
                format: format.to_string(),
            })?;

        let parent = check_target(path)?;

        let bytes = encoder.encode(table, &mut crate::progress::NoProgress)?;
        tracing::debug!(path = %path.display(), format, bytes = bytes.len(), "encoded output");

        let classify = |e: std::io::Error| classify_write_error(e, path);

        let mut tmp = tempfile::Builder::new()
            .prefix(".augsim-")
            .suffix(".part")
            .tempfile_in(&parent)
            .map_err(classify)?;

        let total = bytes.len() as u64;
        let mut written = 0u64;
        for chunk in bytes.chunks(CHUNK_SIZE) {
            tmp.write_all(chunk).map_err(classify)?;
            written += chunk.len() as u64;
            progress.advance(written, total);
        }
        if bytes.is_empty() {
            progress.advance(0, 0);
        }
        tmp.as_file().sync_all().map_err(classify)?;
        set_default_permissions(&tmp).map_err(classify)?;

        tmp.persist(path).map_err(|e| classify(e.error))?;

        Ok(start.elapsed())
    }
}

/// Check the output path before anything is written; returns the directory to write in
fn check_target(path: &Path) -> Result<PathBuf> {
    let invalid = || Error::InvalidPath {
        path: path.to_path_buf(),
    };

    if path.is_dir() {
        return Err(Error::OutputIsDirectory {
            path: path.to_path_buf(),
        });
    }

    let name = path.file_name().ok_or_else(invalid)?;
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(Error::FileNameTooLong {
            path: path.to_path_buf(),
        });
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !parent.is_dir() {
        return Err(invalid());
    }

    if let Ok(meta) = fs::metadata(path) {
        if meta.permissions().readonly() {
            return Err(Error::Forbidden {
                path: path.to_path_buf(),
            });
        }
    }

    Ok(parent)
}

#[cfg(unix)]
fn set_default_permissions(tmp: &NamedTempFile) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tmp.as_file()
        .set_permissions(fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_default_permissions(_tmp: &NamedTempFile) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::progress::NoProgress;
    use crate::reader::read_table;
    use crate::table::CellValue;

    fn sample() -> Table {
        Table::from_parts(
            PathBuf::new(),
            vec!["id".into(), "value".into()],
            vec![vec![CellValue::Integer(1), CellValue::text("x")]],
        )
        .unwrap()
    }

    fn write(path: &Path, format: &str) -> Result<Duration> {
        let registry = FormatRegistry::with_defaults();
        TableWriter::new(&registry).write(&sample(), path, format, &mut NoProgress)
    }

    #[test]
    fn test_write_then_read_csv_and_json() {
        let dir = tempfile::tempdir().unwrap();
        for format in ["csv", "json"] {
            let path = dir.path().join(format!("out.{}", format));
            write(&path, format).unwrap();

            let back = read_table(&path).unwrap();
            assert_eq!(back.column_names(), vec!["id", "value"]);
            assert_eq!(back.rows, sample().rows);
        }
    }

    #[test]
    fn test_missing_parent_is_invalid_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.csv");

        let err = write(&path, "csv").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPath);
        assert!(!path.exists());
    }

    #[test]
    fn test_directory_target() {
        let dir = tempfile::tempdir().unwrap();
        let err = write(dir.path(), "csv").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutputIsDirectory);
    }

    #[test]
    fn test_file_name_too_long() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(format!("{}.csv", "a".repeat(300)));
        let err = write(&path, "csv").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNameTooLong);
    }

    #[test]
    fn test_unsupported_output_format() {
        let dir = tempfile::tempdir().unwrap();
        for format in ["dbf", "xlsx"] {
            let path = dir.path().join("out.dbf");
            let err = write(&path, format).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedOutputFormat);
            assert!(!path.exists());
        }
    }

    #[test]
    fn test_read_only_existing_file_is_forbidden() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.csv");
        fs::write(&path, "old").unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms).unwrap();

        let err = write(&path, "csv").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
    }

    #[test]
    fn test_no_temporary_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("out.csv"), "csv").unwrap();
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("out.csv")]);
    }

    #[test]
    fn test_progress_reaches_total() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FormatRegistry::with_defaults();
        let mut reports = Vec::new();
        let mut sink = |done: u64, total: u64| reports.push((done, total));
        TableWriter::new(&registry)
            .write(&sample(), &dir.path().join("o.csv"), "csv", &mut sink)
            .unwrap();
        let (done, total) = *reports.last().unwrap();
        assert!(total > 0);
        assert_eq!(done, total);
    }
}

//! Input selection: chosen files, directories and glob patterns
//!
//! Produces the ordered, deduplicated list of input files for one run and
//! checks that the output does not overwrite any of them.

use crate::error::{Error, Result};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// The validated inputs and output of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSelection {
    /// Input files, in processing order
    pub inputs: Vec<PathBuf>,
    /// Output file
    pub output: PathBuf,
}

/// Resolves chosen paths and patterns into an [`InputSelection`]
#[derive(Debug, Clone)]
pub struct InputResolver {
    /// Extensions picked up when a chosen path is a directory
    extensions: Vec<String>,
}

impl InputResolver {
    /// Create a resolver that expands directories to files with these extensions
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Self {
        Self {
            extensions: extensions
                .iter()
                .map(|e| e.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Resolve the inputs of a run
    ///
    /// - a blank pattern fails with [`Error::BlankPattern`]
    /// - with chosen paths, the pattern filters them by file name or full path
    /// - without chosen paths, the pattern is expanded against the filesystem
    /// - duplicates (same resolved path) are dropped, first occurrence wins
    /// - an output equal to any input fails with [`Error::OutputIsInput`]
    pub fn resolve(
        &self,
        chosen: &[PathBuf],
        pattern: Option<&str>,
        output: &Path,
    ) -> Result<InputSelection> {
        let pattern = match pattern {
            Some(p) if p.trim().is_empty() => return Err(Error::BlankPattern),
            Some(p) => Some(p.trim()),
            None => None,
        };

        if chosen.is_empty() && pattern.is_none() {
            return Err(Error::MissingInputs);
        }

        let candidates = if chosen.is_empty() {
            expand_pattern(pattern.unwrap_or_default())?
        } else {
            let mut files = Vec::new();
            for path in chosen {
                if path.is_dir() {
                    files.extend(self.scan_directory(path)?);
                } else {
                    files.push(path.clone());
                }
            }
            match pattern {
                Some(p) => filter_by_pattern(files, p)?,
                None => files,
            }
        };

        let mut seen = HashSet::new();
        let mut inputs = Vec::new();
        for path in candidates {
            if seen.insert(normalize(&path)) {
                inputs.push(path);
            }
        }

        if inputs.is_empty() {
            return Err(Error::MissingInputs);
        }

        if seen.contains(&normalize(output)) {
            return Err(Error::OutputIsInput {
                path: output.to_path_buf(),
            });
        }

        Ok(InputSelection {
            inputs,
            output: output.to_path_buf(),
        })
    }

    /// Files under `root` with a known extension, sorted
    fn scan_directory(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::ReadIo {
                path: e.path().unwrap_or(root).to_path_buf(),
                source: e.into(),
            })?;
            let path = entry.path();
            let known = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| self.extensions.contains(&ext.to_ascii_lowercase()));
            if entry.file_type().is_file() && known {
                files.push(path.to_path_buf());
            }
        }
        Ok(files)
    }
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })
}

fn filter_by_pattern(files: Vec<PathBuf>, pattern: &str) -> Result<Vec<PathBuf>> {
    let compiled = compile(pattern)?;
    Ok(files
        .into_iter()
        .filter(|path| {
            compiled.matches_path(path)
                || path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| compiled.matches(n))
        })
        .collect())
}

fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = glob::glob(pattern).map_err(|e| Error::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.msg.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| Error::ReadIo {
            path: e.path().to_path_buf(),
            source: e.into(),
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    // Sort for deterministic order
    files.sort();
    Ok(files)
}

/// Canonical form of a path used for identity comparisons
///
/// Existing files are canonicalized. For other paths the longest existing
/// ancestor is canonicalized and the remaining components are appended after
/// removing `.` and `..`.
pub fn normalize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }

    let mut existing = cleaned.as_path();
    let mut rest = Vec::new();
    loop {
        if let Ok(mut out) = existing.canonicalize() {
            out.extend(rest.iter().rev());
            return out;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name);
                existing = parent;
            }
            _ => return cleaned.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;

    fn resolver() -> InputResolver {
        InputResolver::new(&["csv", "dbf", "json"])
    }

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_resolve_chosen_files() {
        let sel = resolver()
            .resolve(&paths(&["a.csv", "b.csv"]), None, Path::new("out.csv"))
            .unwrap();
        assert_eq!(
            sel,
            InputSelection {
                inputs: paths(&["a.csv", "b.csv"]),
                output: PathBuf::from("out.csv"),
            }
        );
    }

    #[test]
    fn test_blank_pattern() {
        let err = resolver()
            .resolve(&[], Some("   "), Path::new("out.csv"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BlankPattern);

        let err = resolver()
            .resolve(&paths(&["a.csv"]), Some("\t"), Path::new("out.csv"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BlankPattern);
    }

    #[test]
    fn test_missing_inputs() {
        let err = resolver().resolve(&[], None, Path::new("out.csv")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInputs);
    }

    #[test]
    fn test_output_is_input() {
        let err = resolver()
            .resolve(&paths(&["a.csv"]), None, Path::new("a.csv"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutputIsInput);

        let err = resolver()
            .resolve(&paths(&["dir/../a.csv", "b.csv"]), None, Path::new("./a.csv"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutputIsInput);
    }

    #[test]
    fn test_deduplicates_preserving_order() {
        let sel = resolver()
            .resolve(
                &paths(&["b.csv", "a.csv", "./b.csv", "a.csv"]),
                None,
                Path::new("out.csv"),
            )
            .unwrap();
        assert_eq!(sel.inputs, paths(&["b.csv", "a.csv"]));
    }

    #[test]
    fn test_pattern_filters_chosen_files() {
        let sel = resolver()
            .resolve(
                &paths(&["data/DOSP2019.dbf", "data/DOSP2020.dbf", "data/notes.csv"]),
                Some("DOSP*.dbf"),
                Path::new("out.csv"),
            )
            .unwrap();
        assert_eq!(sel.inputs, paths(&["data/DOSP2019.dbf", "data/DOSP2020.dbf"]));

        let err = resolver()
            .resolve(&paths(&["a.csv"]), Some("*.dbf"), Path::new("out.csv"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingInputs);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = resolver()
            .resolve(&paths(&["a.csv"]), Some("[a-"), Path::new("out.csv"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPattern);
    }

    #[test]
    fn test_pattern_expands_on_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.csv", "a.csv", "c.txt"] {
            fs::write(dir.path().join(name), "x\n1\n").unwrap();
        }
        let pattern = format!("{}/*.csv", dir.path().display());

        let sel = resolver()
            .resolve(&[], Some(&pattern), &dir.path().join("out.json"))
            .unwrap();
        assert_eq!(
            sel.inputs,
            vec![dir.path().join("a.csv"), dir.path().join("b.csv")]
        );
    }

    #[test]
    fn test_directories_are_scanned() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("z.dbf"), "").unwrap();
        fs::write(dir.path().join("a.csv"), "").unwrap();
        fs::write(dir.path().join("readme.md"), "").unwrap();

        let sel = resolver()
            .resolve(&[dir.path().to_path_buf()], None, Path::new("out.csv"))
            .unwrap();
        assert_eq!(
            sel.inputs,
            vec![dir.path().join("a.csv"), dir.path().join("sub").join("z.dbf")]
        );
    }

    #[test]
    fn test_normalize_cleans_components() {
        assert_eq!(normalize(Path::new("x/../y/./z.csv")), normalize(Path::new("y/z.csv")));
    }
}

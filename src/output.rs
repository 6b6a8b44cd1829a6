//! All-or-nothing writing of derived output files
//!
//! Every file is staged in a temporary file next to its destination and
//! renamed into place. A file being replaced is first moved aside to a
//! backup in the same directory. If any file of a batch fails, the files
//! placed by that batch are removed and the backups are moved back.

use crate::errors::ErrorContext;
use crate::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, warn};

/// Options for placing output files
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether an existing file at the destination may be replaced
    pub overwrite_existing: bool,
    /// Whether missing parent directories are created
    pub create_parent_dirs: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            overwrite_existing: true,
            create_parent_dirs: true,
        }
    }
}

impl OutputConfig {
    /// Write-once artifacts: never replace an existing file
    pub fn write_once() -> Self {
        Self {
            overwrite_existing: false,
            ..Self::default()
        }
    }
}

/// Writes a batch of files; rolls back the batch on the first failure
pub struct BatchWriter {
    config: OutputConfig,
    pending: Vec<(PathBuf, Vec<u8>)>,
}

impl BatchWriter {
    pub fn new(config: OutputConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
        }
    }

    /// Queue a fully rendered file
    pub fn stage(&mut self, path: impl Into<PathBuf>, contents: Vec<u8>) -> &mut Self {
        self.pending.push((path.into(), contents));
        self
    }

    /// Place every staged file, in staging order
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let mut placed: Vec<Placed> = Vec::with_capacity(self.pending.len());

        for (path, contents) in &self.pending {
            let backup = match self.back_up_existing(path) {
                Ok(backup) => backup,
                Err(err) => {
                    roll_back(placed);
                    return Err(err);
                }
            };

            if let Err(err) = write_file(path, contents, &self.config) {
                if let Some(backup) = backup {
                    restore(backup, path);
                }
                roll_back(placed);
                return Err(err);
            }
            debug!(path = %path.display(), bytes = contents.len(), "output file written");
            placed.push(Placed {
                path: path.clone(),
                backup,
            });
        }

        // dropping the placed entries deletes the backups
        Ok(placed.into_iter().map(|p| p.path).collect())
    }

    /// Move a file about to be replaced out of the way
    fn back_up_existing(&self, path: &Path) -> Result<Option<TempPath>> {
        if !self.config.overwrite_existing || !path.is_file() {
            return Ok(None);
        }

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let backup = tempfile::Builder::new()
            .prefix(".backup-")
            .tempfile_in(parent)
            .with_file_context(parent)?
            .into_temp_path();
        std::fs::rename(path, &backup).with_file_context(path)?;
        debug!(path = %path.display(), "existing output moved aside");
        Ok(Some(backup))
    }
}

/// A file written by the current batch, with the file it replaced
struct Placed {
    path: PathBuf,
    backup: Option<TempPath>,
}

fn roll_back(placed: Vec<Placed>) {
    for entry in placed.into_iter().rev() {
        if let Err(remove_err) = std::fs::remove_file(&entry.path) {
            warn!(
                path = %entry.path.display(),
                error = %remove_err,
                "could not roll back output file"
            );
        }
        if let Some(backup) = entry.backup {
            restore(backup, &entry.path);
        }
    }
}

fn restore(backup: TempPath, path: &Path) {
    if let Err(err) = std::fs::rename(&backup, path) {
        warn!(
            path = %path.display(),
            backup = %backup.display(),
            error = %err,
            "could not restore previous output file"
        );
    }
    // either moved back or left behind for manual recovery
    let _ = backup.keep();
}

/// Stage `contents` in a temp file beside `path` and rename it into place
pub fn write_file(path: &Path, contents: &[u8], config: &OutputConfig) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if config.create_parent_dirs {
        std::fs::create_dir_all(&parent).with_file_context(&parent)?;
    }

    let mut staged = NamedTempFile::new_in(&parent).with_file_context(&parent)?;
    staged.write_all(contents).with_file_context(path)?;
    staged.as_file().sync_all().with_file_context(path)?;

    let persisted = if config.overwrite_existing {
        staged.persist(path).map(|_| ())
    } else {
        staged.persist_noclobber(path).map(|_| ())
    };

    persisted.map_err(|e| ReportError::FileProcessing {
        file_path: path.to_path_buf(),
        cause: e.error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_batch_writes_all_files() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("a.csv");
        let second = temp_dir.path().join("nested").join("b.csv");

        let mut batch = BatchWriter::new(OutputConfig::default());
        batch.stage(&first, b"one".to_vec()).stage(&second, b"two".to_vec());
        let written = batch.commit().unwrap();

        assert_eq!(written, vec![first.clone(), second.clone()]);
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
    }

    #[test]
    fn test_batch_rolls_back_on_failure() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("report.html");
        let blocked = temp_dir.path().join("taken.csv");
        std::fs::write(&blocked, "existing").unwrap();

        let mut batch = BatchWriter::new(OutputConfig::write_once());
        batch.stage(&first, b"<html></html>".to_vec()).stage(&blocked, b"new".to_vec());
        let result = batch.commit();

        assert!(result.is_err());
        assert!(!first.exists(), "first file must be removed after failure");
        assert_eq!(std::fs::read_to_string(&blocked).unwrap(), "existing");
    }

    #[test]
    fn test_overwrite_replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.csv");
        std::fs::write(&path, "old").unwrap();

        write_file(&path, b"new", &OutputConfig::default()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_failed_overwrite_restores_previous_files() {
        let temp_dir = TempDir::new().unwrap();
        let cleaned = temp_dir.path().join("cleaned.csv");
        let statistics = temp_dir.path().join("cleaned_統計情報.csv");
        std::fs::write(&cleaned, "previous run").unwrap();
        std::fs::create_dir(&statistics).unwrap();

        let mut batch = BatchWriter::new(OutputConfig::default());
        batch
            .stage(&cleaned, b"new rows".to_vec())
            .stage(&statistics, b"new stats".to_vec());

        assert!(batch.commit().is_err());
        assert_eq!(std::fs::read_to_string(&cleaned).unwrap(), "previous run");
        assert!(statistics.is_dir());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_successful_overwrite_leaves_no_backups() {
        let temp_dir = TempDir::new().unwrap();
        let first = temp_dir.path().join("a.csv");
        let second = temp_dir.path().join("b.csv");
        std::fs::write(&first, "old a").unwrap();
        std::fs::write(&second, "old b").unwrap();

        let mut batch = BatchWriter::new(OutputConfig::default());
        batch.stage(&first, b"new a".to_vec()).stage(&second, b"new b".to_vec());
        batch.commit().unwrap();

        assert_eq!(std::fs::read_to_string(&first).unwrap(), "new a");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "new b");
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 2);
    }
}

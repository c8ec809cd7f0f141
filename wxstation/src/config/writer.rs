//! Atomic persistence of a configuration tree.
//!
//! Writing is two-phase. [`stage`] serializes the tree into a temporary file
//! next to the target, flushes it to disk and copies the target's
//! permissions. [`StagedWrite::commit`] backs up the existing file and
//! renames the temporary file over it. Dropping a staged write without
//! committing removes the temporary file and leaves the target untouched.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use super::tree::ConfigTree;

/// Format of backup timestamps (`station.toml.20240131235959`).
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// I/O failure while persisting a configuration.
#[derive(Debug, Error)]
#[error("Failed to write {}: {source}", .path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

impl WriteError {
    pub(crate) fn new(path: &Path, source: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Whether the previous file is kept when overwriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupPolicy {
    /// Never back up (used when creating a new file).
    None,
    /// Copy the existing file to `<path>.<timestamp>` before replacing it.
    #[default]
    Timestamped,
}

/// Result of a committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub path: PathBuf,
    /// Copy of the previous file, if one was made.
    pub backup_path: Option<PathBuf>,
    pub bytes: usize,
}

/// A serialized configuration waiting to replace its target.
#[derive(Debug)]
pub struct StagedWrite {
    target: PathBuf,
    temp: NamedTempFile,
    backup: BackupPolicy,
    bytes: usize,
}

impl StagedWrite {
    /// Path of the temporary file holding the new contents.
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// Back up the current target (per policy) and move the new contents into place.
    pub fn commit(self) -> Result<WriteOutcome, WriteError> {
        let backup_path = match self.backup {
            BackupPolicy::Timestamped if self.target.exists() => {
                let backup = unique_backup_path(&self.target, &backup_timestamp());
                fs::copy(&self.target, &backup).map_err(|e| WriteError::new(&backup, e))?;
                tracing::info!(backup = %backup.display(), "backed up configuration");
                Some(backup)
            }
            _ => None,
        };

        self.temp
            .persist(&self.target)
            .map_err(|e| WriteError::new(&self.target, e.error))?;

        tracing::info!(path = %self.target.display(), bytes = self.bytes, "wrote configuration");
        Ok(WriteOutcome {
            path: self.target,
            backup_path,
            bytes: self.bytes,
        })
    }
}

/// Serialize `tree` into a temporary file beside `path`.
pub fn stage(
    tree: &ConfigTree,
    path: &Path,
    backup: BackupPolicy,
) -> Result<StagedWrite, WriteError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| WriteError::new(&dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config".to_string());
    let mut temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name))
        .suffix(".tmp")
        .tempfile_in(&dir)
        .map_err(|e| WriteError::new(&dir, e))?;

    let content = tree.to_string();
    temp.write_all(content.as_bytes())
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| WriteError::new(temp.path(), e))?;

    if let Ok(metadata) = fs::metadata(path) {
        temp.as_file()
            .set_permissions(metadata.permissions())
            .map_err(|e| WriteError::new(temp.path(), e))?;
    }

    tracing::debug!(
        temp = %temp.path().display(),
        target = %path.display(),
        "staged configuration"
    );
    Ok(StagedWrite {
        target: path.to_path_buf(),
        temp,
        backup,
        bytes: content.len(),
    })
}

/// Stage and commit in one step.
pub fn write_atomic(
    tree: &ConfigTree,
    path: &Path,
    backup: BackupPolicy,
) -> Result<WriteOutcome, WriteError> {
    stage(tree, path, backup)?.commit()
}

/// Current local time formatted for backup names.
pub(crate) fn backup_timestamp() -> String {
    chrono::Local::now().format(BACKUP_TIMESTAMP_FORMAT).to_string()
}

/// `<path>.<timestamp>`, with `.1`, `.2`, ... appended if that already exists.
pub(crate) fn unique_backup_path(path: &Path, timestamp: &str) -> PathBuf {
    let base = {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(timestamp);
        PathBuf::from(name)
    };
    if !base.exists() {
        return base;
    }
    (1..)
        .map(|n| {
            let mut name = base.as_os_str().to_os_string();
            name.push(format!(".{}", n));
            PathBuf::from(name)
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or(base)
}

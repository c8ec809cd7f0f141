//! Installation and regeneration of packaged skins.
//!
//! Skin templates ship inside the binary. Regenerating a skin rewrites
//! every packaged file that differs on disk, except files the user listed in
//! the skin's [`CUSTOMIZED_MANIFEST`]. Files the user added are never
//! touched. Before anything is rewritten the whole skin directory is copied
//! to `<skin>.<timestamp>`; a skin already matching the templates is left
//! alone.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rust_embed::RustEmbed;
use thiserror::Error;

use super::writer::{backup_timestamp, unique_backup_path};

/// File inside a skin directory listing user-customized files, one relative
/// path per line. Blank lines and `#` comments are ignored.
pub const CUSTOMIZED_MANIFEST: &str = ".customized";

#[derive(RustEmbed)]
#[folder = "skins/"]
struct PackagedSkins;

/// Errors raised while installing skins.
#[derive(Debug, Error)]
pub enum SkinError {
    /// No packaged skin with this name.
    #[error("Unknown skin '{0}'")]
    Unknown(String),

    /// Filesystem failure.
    #[error("Failed to update skin {skin} at {}: {source}", .path.display())]
    Io {
        skin: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What happened to each skin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkinReport {
    /// Skins written into an empty location.
    pub installed: Vec<String>,
    /// Skins with at least one file rewritten.
    pub updated: Vec<String>,
    /// Skins already matching the packaged templates.
    pub unchanged: Vec<String>,
    /// Copies of skin directories taken before rewriting.
    pub backups: Vec<PathBuf>,
    /// Customized files that were kept as they are.
    pub preserved: Vec<PathBuf>,
}

impl SkinReport {
    /// Fold another report into this one.
    pub fn extend(&mut self, other: SkinReport) {
        self.installed.extend(other.installed);
        self.updated.extend(other.updated);
        self.unchanged.extend(other.unchanged);
        self.backups.extend(other.backups);
        self.preserved.extend(other.preserved);
    }

    /// Whether any file on disk changed.
    pub fn changed(&self) -> bool {
        !self.installed.is_empty() || !self.updated.is_empty()
    }
}

/// Names of every packaged skin, sorted.
pub fn packaged_skins() -> Vec<String> {
    let mut names: Vec<String> = PackagedSkins::iter()
        .filter_map(|path| path.split('/').next().map(str::to_string))
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Install every packaged skin under `skin_root`.
pub fn install_skins(skin_root: &Path) -> Result<SkinReport, SkinError> {
    let names = packaged_skins();
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    regenerate_skins(skin_root, &names)
}

/// Regenerate the named skins under `skin_root`.
pub fn regenerate_skins(skin_root: &Path, skins: &[&str]) -> Result<SkinReport, SkinError> {
    let mut report = SkinReport::default();
    for skin in skins {
        report.extend(regenerate_skin(skin_root, skin)?);
    }
    Ok(report)
}

fn regenerate_skin(skin_root: &Path, skin: &str) -> Result<SkinReport, SkinError> {
    let files = packaged_files(skin);
    if files.is_empty() {
        return Err(SkinError::Unknown(skin.to_string()));
    }
    let dir = skin_root.join(skin);
    let io_err = |path: &Path, source: io::Error| SkinError::Io {
        skin: skin.to_string(),
        path: path.to_path_buf(),
        source,
    };
    let mut report = SkinReport::default();

    if !dir.exists() {
        for (relative, data) in &files {
            write_file(&dir.join(relative), data).map_err(|e| io_err(&dir, e))?;
        }
        tracing::info!(skin, dir = %dir.display(), "installed skin");
        report.installed.push(skin.to_string());
        return Ok(report);
    }

    let customized = read_manifest(&dir).map_err(|e| io_err(&dir.join(CUSTOMIZED_MANIFEST), e))?;
    let mut changes = Vec::new();
    for (relative, data) in &files {
        let target = dir.join(relative);
        if customized.contains(relative.as_str()) {
            if target.exists() {
                report.preserved.push(target);
            }
            continue;
        }
        let current = match fs::read(&target) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(io_err(&target, e)),
        };
        if current.as_deref() != Some(data.as_ref()) {
            changes.push((target, data));
        }
    }

    if changes.is_empty() {
        tracing::debug!(skin, "skin already up to date");
        report.unchanged.push(skin.to_string());
        return Ok(report);
    }

    let backup = unique_backup_path(&dir, &backup_timestamp());
    copy_dir(&dir, &backup).map_err(|e| io_err(&backup, e))?;
    for (target, data) in changes {
        write_file(&target, data).map_err(|e| io_err(&target, e))?;
    }
    tracing::info!(skin, backup = %backup.display(), "regenerated skin");
    report.updated.push(skin.to_string());
    report.backups.push(backup);
    Ok(report)
}

/// Packaged files of one skin as (path relative to the skin, contents).
fn packaged_files(skin: &str) -> Vec<(String, Cow<'static, [u8]>)> {
    let prefix = format!("{}/", skin);
    let mut files: Vec<(String, Cow<'static, [u8]>)> = PackagedSkins::iter()
        .filter_map(|path| {
            let relative = path.strip_prefix(&prefix)?.to_string();
            let file = PackagedSkins::get(&path)?;
            Some((relative, file.data))
        })
        .collect();
    files.sort_by(|a, b| a.0.cmp(&b.0));
    files
}

fn read_manifest(dir: &Path) -> io::Result<HashSet<String>> {
    let text = match fs::read_to_string(dir.join(CUSTOMIZED_MANIFEST)) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => return Err(e),
    };
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.trim_start_matches("./").to_string())
        .collect())
}

fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)
}

fn copy_dir(from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

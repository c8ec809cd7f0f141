//! Station configuration file location and loading.
//!
//! The default file lives at `~/wxstation-data/station.toml`. The directory
//! holding the file is the station root; relative roots in the file resolve
//! against it.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::defaults::{DEFAULT_CONFIG_FILE_NAME, DEFAULT_STATION_DIR};
use super::tree::ConfigTree;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// No configuration file at the given path
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Failed to read config file
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML
    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml_edit::TomlError,
    },
}

/// Load the configuration tree stored at `path`.
pub fn load_tree(path: &Path) -> Result<ConfigTree, ConfigFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigFileError::NotFound(path.to_path_buf())
        } else {
            ConfigFileError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    text.parse().map_err(|source| ConfigFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Get the path to the default station directory (~/wxstation-data).
pub fn station_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_STATION_DIR)
}

/// Get the path to the default config file (~/wxstation-data/station.toml).
pub fn config_file_path() -> PathBuf {
    station_directory().join(DEFAULT_CONFIG_FILE_NAME)
}

/// Directory containing the configuration file.
pub fn station_root(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_path() {
        let path = config_file_path();
        assert!(path.ends_with("wxstation-data/station.toml"));
    }

    #[test]
    fn test_station_root() {
        assert_eq!(
            station_root(Path::new("/srv/wx/station.toml")),
            PathBuf::from("/srv/wx")
        );
        assert_eq!(station_root(Path::new("station.toml")), PathBuf::from("."));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("station.toml");

        let err = load_tree(&path).unwrap_err();
        assert!(matches!(err, ConfigFileError::NotFound(p) if p == path));
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("station.toml");
        std::fs::write(&path, "[Station\nlocation = ").unwrap();

        let err = load_tree(&path).unwrap_err();
        assert!(matches!(err, ConfigFileError::Parse { .. }));
        assert!(err.to_string().contains("station.toml"));
    }

    #[test]
    fn test_load_keeps_comments() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("station.toml");
        let text = "# top\n[Station]\n# where\nlocation = \"Here\"\n";
        std::fs::write(&path, text).unwrap();

        let tree = load_tree(&path).unwrap();
        assert_eq!(tree.to_string(), text);
    }
}

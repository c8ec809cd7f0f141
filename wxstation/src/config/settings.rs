//! Typed view of the station settings held in a configuration tree.
//!
//! [`StationSettings`] is a projection: it is rebuilt from the tree whenever
//! it is needed and never written back directly.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use super::keys::StationField;
use super::tree::ConfigTree;
use super::validate::{
    Altitude, DriverId, Latitude, Location, Longitude, RelativeRoot, StationUrl, UnitSystem,
    ValidationError, YesNo,
};

/// A required combination of settings or files is not satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct PreconditionError(pub String);

/// Semantic station settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSettings {
    pub location: Location,
    pub latitude: Latitude,
    pub longitude: Longitude,
    pub altitude: Altitude,
    pub unit_system: UnitSystem,
    pub driver: DriverId,
    /// Whether the station registers with the public registry.
    pub register: bool,
    /// Required when `register` is set.
    pub station_url: Option<StationUrl>,
    pub skin_root: RelativeRoot,
    pub sqlite_root: RelativeRoot,
    pub html_root: RelativeRoot,
}

impl StationSettings {
    /// Validate every station field stored in `tree`.
    ///
    /// Fails on the first missing or invalid value. A missing station URL is
    /// not an error here; see [`StationSettings::check_registration`].
    pub fn from_tree(tree: &ConfigTree) -> Result<Self, ValidationError> {
        let station_url = match StationField::StationUrl.raw(tree) {
            Some(raw) if !raw.trim().is_empty() => Some(typed(tree, StationField::StationUrl)?),
            _ => None,
        };

        Ok(Self {
            location: typed(tree, StationField::Location)?,
            latitude: typed(tree, StationField::Latitude)?,
            longitude: typed(tree, StationField::Longitude)?,
            altitude: typed(tree, StationField::Altitude)?,
            unit_system: typed(tree, StationField::UnitSystem)?,
            driver: typed(tree, StationField::Driver)?,
            register: typed::<YesNo>(tree, StationField::Register)?.0,
            station_url,
            skin_root: typed(tree, StationField::SkinRoot)?,
            sqlite_root: typed(tree, StationField::SqliteRoot)?,
            html_root: typed(tree, StationField::HtmlRoot)?,
        })
    }

    /// Registering requires a station URL.
    pub fn check_registration(&self) -> Result<(), PreconditionError> {
        if self.register && self.station_url.is_none() {
            return Err(PreconditionError(
                "Registering the station requires a station URL (--station-url)".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute skin directory for a station rooted at `station_root`.
    pub fn skin_dir(&self, station_root: &Path) -> PathBuf {
        self.skin_root.resolve(station_root)
    }

    /// Absolute directory of the SQLite databases.
    pub fn sqlite_dir(&self, station_root: &Path) -> PathBuf {
        self.sqlite_root.resolve(station_root)
    }

    /// Absolute directory of generated pages.
    pub fn html_dir(&self, station_root: &Path) -> PathBuf {
        self.html_root.resolve(station_root)
    }
}

/// Read `field` from the tree and validate it as `T`.
fn typed<T>(tree: &ConfigTree, field: StationField) -> Result<T, ValidationError>
where
    T: FromStr<Err = ValidationError>,
{
    let raw = field.raw(tree).ok_or_else(|| {
        ValidationError::new(
            field.name(),
            "",
            format!("missing from configuration ({})", field.path()),
        )
    })?;
    raw.parse::<T>().map_err(|e| e.for_field(field.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::Baseline;
    use crate::config::tree::{KeyPath, TreeValue};

    fn baseline_tree() -> ConfigTree {
        Baseline::load().unwrap().tree().clone()
    }

    #[test]
    fn test_settings_from_baseline() {
        let settings = StationSettings::from_tree(&baseline_tree()).unwrap();

        assert_eq!(settings.location.as_str(), "Weather Station");
        assert_eq!(settings.altitude, Altitude::default());
        assert_eq!(settings.unit_system, UnitSystem::Us);
        assert_eq!(settings.driver.station_type(), "Simulator");
        assert!(!settings.register);
        assert!(settings.station_url.is_none());
        assert!(settings.check_registration().is_ok());
    }

    #[test]
    fn test_register_without_url_is_precondition_error() {
        let mut tree = baseline_tree();
        tree.set(&StationField::Register.path(), TreeValue::scalar("true"));

        let settings = StationSettings::from_tree(&tree).unwrap();
        let err = settings.check_registration().unwrap_err();
        assert!(err.to_string().contains("station URL"));
    }

    #[test]
    fn test_register_with_url_passes() {
        let mut tree = baseline_tree();
        tree.set(&StationField::Register.path(), TreeValue::scalar("true"));
        tree.set(
            &StationField::StationUrl.path(),
            TreeValue::scalar("https://example.com/wx"),
        );

        let settings = StationSettings::from_tree(&tree).unwrap();
        assert!(settings.check_registration().is_ok());
    }

    #[test]
    fn test_invalid_stored_value_is_reported() {
        let mut tree = baseline_tree();
        tree.set(&KeyPath::from("Station.latitude"), TreeValue::scalar("95"));

        let err = StationSettings::from_tree(&tree).unwrap_err();
        assert_eq!(err.field, "latitude");
    }

    #[test]
    fn test_missing_value_is_reported() {
        let mut tree = baseline_tree();
        tree.remove(&KeyPath::from("StdReport.SKIN_ROOT"));

        let err = StationSettings::from_tree(&tree).unwrap_err();
        assert_eq!(err.field, "skin_root");
        assert!(err.reason.contains("StdReport.SKIN_ROOT"));
    }

    #[test]
    fn test_resolved_directories() {
        let settings = StationSettings::from_tree(&baseline_tree()).unwrap();
        let root = Path::new("/srv/wx");

        assert_eq!(settings.skin_dir(root), PathBuf::from("/srv/wx/skins"));
        assert_eq!(settings.sqlite_dir(root), PathBuf::from("/srv/wx/archive"));
        assert_eq!(settings.html_dir(root), PathBuf::from("/srv/wx/public_html"));
    }
}

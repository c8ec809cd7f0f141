//! Baseline defaults for a station configuration.
//!
//! The baseline is a commented TOML document describing a freshly created
//! station. It is parsed once into an immutable [`Baseline`] and handed to
//! the merger explicitly.

use super::keys::STATION_TYPE_KEY;
use super::tree::{ConfigTree, KeyPath, TreeValue};

/// File name of the station configuration inside the station root.
pub const DEFAULT_CONFIG_FILE_NAME: &str = "station.toml";

/// Station root directory name under the user's home directory.
pub const DEFAULT_STATION_DIR: &str = "wxstation-data";

/// Key holding the schema version marker.
pub const VERSION_KEY: &str = "version";

/// Default driver for a new station.
pub const DEFAULT_DRIVER: &str = "wxstation.drivers.simulator";

/// Baseline configuration written by `station create`.
///
/// The `version` marker is replaced with the engine version on load.
pub const DEFAULT_CONFIG: &str = r#"# Configuration file for wxstation.
#
# All values are strings; lists are arrays of strings.
# Comments and unknown settings survive reconfigure and upgrade.

# Schema version of this file. Maintained by `wxstation station upgrade`.
version = "0.0.0"

# Set to "1" for extra debug information in the logs.
debug = "0"

##############################################################################

# Information about the station hardware and where it is installed.
[Station]
# Free-text description of the station location.
location = "Weather Station"
# Latitude and longitude in decimal degrees.
# Negative for southern and western hemispheres.
latitude = "0.00"
longitude = "0.00"
# Altitude of the station as [value, unit]. Unit is foot or meter.
altitude = ["0", "foot"]
# Section holding the settings of the hardware driver.
station_type = "Simulator"
# First month of the rain year (1 = January).
rain_year_start = "1"

##############################################################################

# Settings of the default driver.
[Simulator]
# Module implementing the driver.
driver = "wxstation.drivers.simulator"

##############################################################################

# Public station registry.
[StdRESTful.StationRegistry]
# Set to "true" to register this station. Requires Station.station_url.
register_this_station = "false"

##############################################################################

# Report generation.
[StdReport]
# Where skins live, relative to the station root.
SKIN_ROOT = "skins"
# Where generated pages go, relative to the station root.
HTML_ROOT = "public_html"

# Defaults shared by every report.
[StdReport.Defaults]
# Unit system: us, metricwx or metric.
unit_system = "us"

[StdReport.SeasonsReport]
skin = "Seasons"
enable = "true"

[StdReport.SmartphoneReport]
skin = "Smartphone"
enable = "false"
HTML_ROOT = "public_html/smartphone"

##############################################################################

# Archive service.
[StdArchive]
# Archive interval in seconds.
archive_interval = "300"
# Binding of the archive database.
data_binding = "wx_binding"

##############################################################################

[DataBindings.wx_binding]
database = "archive_sqlite"
table_name = "archive"

##############################################################################

[Databases.archive_sqlite]
database_name = "wxstation.sdb"
database_type = "SQLite"

##############################################################################

[DatabaseTypes.SQLite]
driver = "wxstation.drivers.sqlite"
# Directory of SQLite databases, relative to the station root.
SQLITE_ROOT = "archive"
"#;

/// Immutable baseline configuration tree.
#[derive(Debug, Clone)]
pub struct Baseline {
    tree: ConfigTree,
}

impl Baseline {
    /// Parse [`DEFAULT_CONFIG`] and stamp it with the engine version.
    pub fn load() -> Result<Self, toml_edit::TomlError> {
        Self::from_template(DEFAULT_CONFIG)
    }

    /// Build a baseline from another template, stamped with the engine version.
    pub fn from_template(template: &str) -> Result<Self, toml_edit::TomlError> {
        let mut tree: ConfigTree = template.parse()?;
        tree.set(&KeyPath::from(VERSION_KEY), TreeValue::scalar(crate::VERSION));
        Ok(Self { tree })
    }

    /// The baseline tree.
    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    /// Name of the driver section the baseline ships with.
    pub fn station_type(&self) -> Option<String> {
        self.tree.get_str(&KeyPath::from(STATION_TYPE_KEY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::keys::StationField;

    #[test]
    fn test_baseline_parses_and_is_versioned() {
        let baseline = Baseline::load().unwrap();
        assert_eq!(
            baseline.tree().get_str(&KeyPath::from(VERSION_KEY)).as_deref(),
            Some(crate::VERSION)
        );
    }

    #[test]
    fn test_baseline_keeps_comments() {
        let baseline = Baseline::load().unwrap();
        let text = baseline.tree().to_string();
        assert!(text.contains("# Schema version of this file."));
        assert!(text.contains("# Unit system: us, metricwx or metric."));
    }

    #[test]
    fn test_every_field_has_a_valid_default() {
        let baseline = Baseline::load().unwrap();
        for field in StationField::all() {
            if *field == StationField::StationUrl {
                continue;
            }
            assert!(
                field.read(baseline.tree()).is_some(),
                "no default for {}",
                field
            );
        }
    }

    #[test]
    fn test_baseline_defaults() {
        let tree = Baseline::load().unwrap().tree().clone();
        assert_eq!(StationField::Altitude.read(&tree).as_deref(), Some("0,foot"));
        assert_eq!(StationField::UnitSystem.read(&tree).as_deref(), Some("us"));
        assert_eq!(StationField::Register.read(&tree).as_deref(), Some("n"));
        assert_eq!(
            StationField::Driver.read(&tree).as_deref(),
            Some(DEFAULT_DRIVER)
        );
        assert!(StationField::StationUrl.read(&tree).is_none());
    }

    #[test]
    fn test_baseline_station_type() {
        let baseline = Baseline::load().unwrap();
        assert_eq!(baseline.station_type().as_deref(), Some("Simulator"));
    }
}

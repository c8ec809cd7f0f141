//! Station field access and validation.
//!
//! This module provides a type-safe interface for reading and writing the
//! user-facing station settings by field name, with validation via the
//! Specification Pattern.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::tree::{ConfigTree, KeyPath, TreeValue};
use super::validate::{
    Altitude, DriverId, Latitude, Location, Longitude, RelativeRoot, StationUrl, UnitSystem,
    ValidationError, YesNo,
};

/// Path of the key naming the active driver section.
pub const STATION_TYPE_KEY: &str = "Station.station_type";

/// Errors that can occur when naming a station field.
#[derive(Debug, Error)]
pub enum StationFieldError {
    /// Unknown field name.
    #[error("Unknown station field '{0}'")]
    UnknownField(String),
}

/// User-facing station settings.
///
/// Each field maps to a location in the [`ConfigTree`] and knows how to
/// validate, read and write its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StationField {
    Location,
    Latitude,
    Longitude,
    Altitude,
    UnitSystem,
    Driver,
    Register,
    StationUrl,
    SkinRoot,
    SqliteRoot,
    HtmlRoot,
}

impl FromStr for StationField {
    type Err = StationFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        StationField::all()
            .iter()
            .copied()
            .find(|field| field.name() == normalized)
            .ok_or_else(|| StationFieldError::UnknownField(s.to_string()))
    }
}

impl fmt::Display for StationField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl StationField {
    /// Get the canonical field name (e.g., "station_url").
    pub fn name(&self) -> &'static str {
        match self {
            StationField::Location => "location",
            StationField::Latitude => "latitude",
            StationField::Longitude => "longitude",
            StationField::Altitude => "altitude",
            StationField::UnitSystem => "units",
            StationField::Driver => "driver",
            StationField::Register => "register",
            StationField::StationUrl => "station_url",
            StationField::SkinRoot => "skin_root",
            StationField::SqliteRoot => "sqlite_root",
            StationField::HtmlRoot => "html_root",
        }
    }

    /// Where the field lives in the configuration tree.
    ///
    /// For [`StationField::Driver`] this is the `station_type` key; the driver
    /// identifier itself is stored inside the section it names.
    pub fn path(&self) -> KeyPath {
        KeyPath::from(match self {
            StationField::Location => "Station.location",
            StationField::Latitude => "Station.latitude",
            StationField::Longitude => "Station.longitude",
            StationField::Altitude => "Station.altitude",
            StationField::UnitSystem => "StdReport.Defaults.unit_system",
            StationField::Driver => STATION_TYPE_KEY,
            StationField::Register => "StdRESTful.StationRegistry.register_this_station",
            StationField::StationUrl => "Station.station_url",
            StationField::SkinRoot => "StdReport.SKIN_ROOT",
            StationField::SqliteRoot => "DatabaseTypes.SQLite.SQLITE_ROOT",
            StationField::HtmlRoot => "StdReport.HTML_ROOT",
        })
    }

    /// Question asked interactively, or `None` if the field is never prompted.
    pub fn prompt(&self) -> Option<&'static str> {
        match self {
            StationField::Location => Some("Describe the location of the station"),
            StationField::Latitude => {
                Some("Latitude in decimal degrees, negative for southern hemisphere")
            }
            StationField::Longitude => {
                Some("Longitude in decimal degrees, negative for western hemisphere")
            }
            StationField::Altitude => Some("Altitude as '<value>,<unit>' (foot or meter)"),
            StationField::UnitSystem => Some("Unit system for reports (us, metricwx, metric)"),
            StationField::Driver => Some("Driver to use (e.g. wxstation.drivers.vantage)"),
            StationField::Register => Some("Register this station in the public registry? (y/n)"),
            StationField::StationUrl => Some("Unique URL of the station"),
            StationField::SkinRoot | StationField::SqliteRoot | StationField::HtmlRoot => None,
        }
    }

    /// Validate a raw value, returning the typed result.
    pub fn parse(&self, raw: &str) -> Result<FieldValue, ValidationError> {
        self.specification()
            .is_satisfied_by(raw)
            .map_err(|e| e.for_field(self.name()))
    }

    /// The stored value in input syntax, without validating it.
    pub fn raw(&self, tree: &ConfigTree) -> Option<String> {
        match self {
            StationField::Driver => {
                let station_type = tree.get_str(&KeyPath::from(STATION_TYPE_KEY))?;
                tree.get_str(&KeyPath::new([station_type.as_str(), "driver"]))
            }
            StationField::Altitude => match tree.get(&self.path())? {
                TreeValue::List(parts) => Some(parts.join(",")),
                TreeValue::Scalar(value) => Some(value),
            },
            _ => tree.get_str(&self.path()),
        }
    }

    /// Read the field back from a tree in the syntax a user would type.
    ///
    /// Returns `None` when the key is missing or its value does not validate.
    pub fn read(&self, tree: &ConfigTree) -> Option<String> {
        let raw = self.raw(tree)?;
        self.parse(&raw).ok().map(|value| value.to_string())
    }

    /// Store a validated value in the tree.
    pub fn write(&self, tree: &mut ConfigTree, value: &FieldValue) {
        match value {
            FieldValue::Altitude(altitude) => {
                tree.set(&self.path(), TreeValue::List(altitude.to_pair().to_vec()));
            }
            FieldValue::Driver(driver) => {
                let station_type = driver.station_type();
                if let Some(previous) = tree.get_str(&self.path()) {
                    if previous != station_type {
                        drop_bare_driver_section(tree, &previous);
                    }
                }
                tree.set(&self.path(), TreeValue::scalar(&station_type));
                tree.set(
                    &KeyPath::new([station_type.as_str(), "driver"]),
                    TreeValue::scalar(driver.as_str()),
                );
            }
            FieldValue::Register(flag) => {
                tree.set(&self.path(), TreeValue::scalar(flag.as_config_str()));
            }
            other => {
                tree.set(&self.path(), TreeValue::scalar(other.to_string()));
            }
        }
    }

    /// Get all station fields, in prompting order.
    pub fn all() -> &'static [StationField] {
        &[
            StationField::Location,
            StationField::Latitude,
            StationField::Longitude,
            StationField::Altitude,
            StationField::Driver,
            StationField::UnitSystem,
            StationField::Register,
            StationField::StationUrl,
            StationField::SkinRoot,
            StationField::SqliteRoot,
            StationField::HtmlRoot,
        ]
    }

    fn specification(&self) -> Box<dyn ValueSpecification> {
        match self {
            StationField::Location => Box::new(TypedSpec::new(FieldValue::Location)),
            StationField::Latitude => Box::new(TypedSpec::new(FieldValue::Latitude)),
            StationField::Longitude => Box::new(TypedSpec::new(FieldValue::Longitude)),
            StationField::Altitude => Box::new(TypedSpec::new(FieldValue::Altitude)),
            StationField::UnitSystem => Box::new(TypedSpec::new(FieldValue::UnitSystem)),
            StationField::Driver => Box::new(TypedSpec::new(FieldValue::Driver)),
            StationField::Register => Box::new(TypedSpec::new(FieldValue::Register)),
            StationField::StationUrl => Box::new(TypedSpec::new(FieldValue::StationUrl)),
            StationField::SkinRoot | StationField::SqliteRoot | StationField::HtmlRoot => {
                Box::new(TypedSpec::new(FieldValue::Root))
            }
        }
    }
}

/// Remove a driver section that holds nothing but its `driver` key.
///
/// Sections carrying any other setting belong to the user and are kept.
pub(crate) fn drop_bare_driver_section(tree: &mut ConfigTree, station_type: &str) -> bool {
    let section = KeyPath::new([station_type]);
    if !tree.section_names(&section).is_empty() || tree.keys(&section) != ["driver"] {
        return false;
    }
    tracing::debug!(section = station_type, "dropping unused driver section");
    tree.remove_section(&section)
}

/// A validated field value.
///
/// Displays in the same syntax it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Location(Location),
    Latitude(Latitude),
    Longitude(Longitude),
    Altitude(Altitude),
    UnitSystem(UnitSystem),
    Driver(DriverId),
    Register(YesNo),
    StationUrl(StationUrl),
    Root(RelativeRoot),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Location(v) => v.fmt(f),
            FieldValue::Latitude(v) => v.fmt(f),
            FieldValue::Longitude(v) => v.fmt(f),
            FieldValue::Altitude(v) => v.fmt(f),
            FieldValue::UnitSystem(v) => v.fmt(f),
            FieldValue::Driver(v) => v.fmt(f),
            FieldValue::Register(v) => v.fmt(f),
            FieldValue::StationUrl(v) => v.fmt(f),
            FieldValue::Root(v) => v.fmt(f),
        }
    }
}

// ============================================================================
// Value Specifications (Specification Pattern)
// ============================================================================

/// A specification that validates a raw field value.
trait ValueSpecification {
    /// Check whether the value satisfies this specification.
    fn is_satisfied_by(&self, value: &str) -> Result<FieldValue, ValidationError>;
}

/// Specification backed by a type's `FromStr` validator.
struct TypedSpec<T> {
    wrap: fn(T) -> FieldValue,
}

impl<T> TypedSpec<T> {
    fn new(wrap: fn(T) -> FieldValue) -> Self {
        Self { wrap }
    }
}

impl<T> ValueSpecification for TypedSpec<T>
where
    T: FromStr<Err = ValidationError>,
{
    fn is_satisfied_by(&self, value: &str) -> Result<FieldValue, ValidationError> {
        value.parse::<T>().map(self.wrap)
    }
}

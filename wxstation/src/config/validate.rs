//! Typed station values and the validators that produce them.
//!
//! Every type here parses from the raw text a user types on the command line
//! or at a prompt, and displays back in that same syntax. Parse failures are
//! reported as [`ValidationError`] naming the offending field.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

/// Sections the engine owns; a driver may not claim one of these names.
const RESERVED_SECTIONS: &[&str] = &[
    "Station",
    "StdRESTful",
    "StdReport",
    "StdArchive",
    "DataBindings",
    "Databases",
    "DatabaseTypes",
];

/// A field value failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid value for {field}: '{value}' - {reason}")]
pub struct ValidationError {
    /// Field name (e.g. "altitude").
    pub field: String,
    /// The rejected input.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &str, value: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Re-attribute the error to another field name.
    pub fn for_field(mut self, field: &str) -> Self {
        self.field = field.to_string();
        self
    }
}

/// Unit an altitude is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltitudeUnit {
    Foot,
    Meter,
}

impl AltitudeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            AltitudeUnit::Foot => "foot",
            AltitudeUnit::Meter => "meter",
        }
    }
}

impl FromStr for AltitudeUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "foot" => Ok(AltitudeUnit::Foot),
            "meter" => Ok(AltitudeUnit::Meter),
            _ => Err(ValidationError::new(
                "altitude",
                s,
                "unit must be one of: foot, meter",
            )),
        }
    }
}

/// Station altitude: a value and its unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Altitude {
    pub value: f64,
    pub unit: AltitudeUnit,
}

impl Altitude {
    pub fn new(value: f64, unit: AltitudeUnit) -> Self {
        Self { value, unit }
    }

    /// The `[value, unit]` pair as stored in the configuration file.
    pub fn to_pair(&self) -> [String; 2] {
        [format_number(self.value), self.unit.as_str().to_string()]
    }
}

impl Default for Altitude {
    fn default() -> Self {
        Self::new(0.0, AltitudeUnit::Foot)
    }
}

impl FromStr for Altitude {
    type Err = ValidationError;

    /// Parses `"<number>,<unit>"`, e.g. `"700,foot"` or `"320, METER"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((number, unit)) = s.split_once(',') else {
            return Err(ValidationError::new(
                "altitude",
                s,
                "expected '<number>,<unit>' such as '700,foot' or '320,meter'",
            ));
        };
        let value: f64 = number
            .trim()
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| ValidationError::new("altitude", s, "altitude must be a number"))?;
        if unit.trim().is_empty() {
            return Err(ValidationError::new(
                "altitude",
                s,
                "missing unit (foot or meter)",
            ));
        }
        let unit = unit
            .parse::<AltitudeUnit>()
            .map_err(|e| ValidationError::new("altitude", s, e.reason))?;
        Ok(Self { value, unit })
    }
}

impl fmt::Display for Altitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", format_number(self.value), self.unit.as_str())
    }
}

/// Latitude in decimal degrees, within [-90, 90].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Latitude(f64);

/// Longitude in decimal degrees, within [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Longitude(f64);

impl Latitude {
    pub fn degrees(&self) -> f64 {
        self.0
    }
}

impl Longitude {
    pub fn degrees(&self) -> f64 {
        self.0
    }
}

impl FromStr for Latitude {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_degrees("latitude", s, 90.0).map(Latitude)
    }
}

impl FromStr for Longitude {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_degrees("longitude", s, 180.0).map(Longitude)
    }
}

impl fmt::Display for Latitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_degrees(self.0))
    }
}

impl fmt::Display for Longitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_degrees(self.0))
    }
}

fn parse_degrees(field: &str, raw: &str, limit: f64) -> Result<f64, ValidationError> {
    let value: f64 = raw
        .trim()
        .parse()
        .ok()
        .filter(|v: &f64| v.is_finite())
        .ok_or_else(|| ValidationError::new(field, raw, "must be a number in decimal degrees"))?;
    if !(-limit..=limit).contains(&value) {
        return Err(ValidationError::new(
            field,
            raw,
            format!("must be between -{} and {}", limit, limit),
        ));
    }
    Ok(value)
}

/// Unit system used by generated reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnitSystem {
    #[default]
    Us,
    MetricWx,
    Metric,
}

impl UnitSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Us => "us",
            UnitSystem::MetricWx => "metricwx",
            UnitSystem::Metric => "metric",
        }
    }
}

impl FromStr for UnitSystem {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "us" => Ok(UnitSystem::Us),
            "metricwx" => Ok(UnitSystem::MetricWx),
            "metric" => Ok(UnitSystem::Metric),
            _ => Err(ValidationError::new(
                "units",
                s,
                "must be one of: us, metricwx, metric",
            )),
        }
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of the hardware driver module, e.g. `wxstation.drivers.vantage`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverId(String);

impl DriverId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the section that holds this driver's settings: the last dotted
    /// segment with its first letter capitalised (`...drivers.vantage` → `Vantage`).
    pub fn station_type(&self) -> String {
        let last = self.0.rsplit('.').next().unwrap_or(&self.0);
        let mut chars = last.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl FromStr for DriverId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim();
        if id.is_empty() {
            return Err(ValidationError::new("driver", s, "driver must not be empty"));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(ValidationError::new(
                "driver",
                s,
                "driver must not contain whitespace",
            ));
        }
        if id.split('.').any(str::is_empty) {
            return Err(ValidationError::new(
                "driver",
                s,
                "driver must be a dotted module name such as 'wxstation.drivers.vantage'",
            ));
        }
        let driver = DriverId(id.to_string());
        if RESERVED_SECTIONS.contains(&driver.station_type().as_str()) {
            return Err(ValidationError::new(
                "driver",
                s,
                format!("'{}' is a reserved section name", driver.station_type()),
            ));
        }
        Ok(driver)
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A y/n answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct YesNo(pub bool);

impl YesNo {
    /// Value as written to the configuration file.
    pub fn as_config_str(&self) -> &'static str {
        if self.0 {
            "true"
        } else {
            "false"
        }
    }
}

impl FromStr for YesNo {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "y" | "yes" | "true" | "1" | "on" => Ok(YesNo(true)),
            "n" | "no" | "false" | "0" | "off" => Ok(YesNo(false)),
            _ => Err(ValidationError::new("register", s, "must be y or n")),
        }
    }
}

impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0 { "y" } else { "n" })
    }
}

/// Public URL of the station, used when registering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationUrl(String);

impl StationUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StationUrl {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = s.trim();
        if url.is_empty() {
            return Err(ValidationError::new(
                "station_url",
                s,
                "a station URL is required",
            ));
        }
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"));
        match rest {
            Some(host) if !host.is_empty() && !url.chars().any(char::is_whitespace) => {
                Ok(StationUrl(url.to_string()))
            }
            _ => Err(ValidationError::new(
                "station_url",
                s,
                "must be a URL starting with 'http://' or 'https://'",
            )),
        }
    }
}

impl fmt::Display for StationUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-text station description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location(String);

impl Location {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Location {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        if text.is_empty() {
            return Err(ValidationError::new("location", s, "location must not be empty"));
        }
        Ok(Location(text.to_string()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directory relative to the station root (skins, sqlite, html).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeRoot(PathBuf);

impl RelativeRoot {
    /// Absolute location of this root under `station_root`.
    pub fn resolve(&self, station_root: &Path) -> PathBuf {
        station_root.join(&self.0)
    }
}

impl FromStr for RelativeRoot {
    type Err = ValidationError;

    /// Accepts any relative path that stays inside the station root.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(ValidationError::new("root", s, "path must not be empty"));
        }
        let path = Path::new(raw);
        let mut depth: usize = 0;
        for component in path.components() {
            match component {
                Component::Prefix(_) | Component::RootDir => {
                    return Err(ValidationError::new(
                        "root",
                        s,
                        "must be relative to the station root, not absolute",
                    ));
                }
                Component::ParentDir => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        ValidationError::new("root", s, "must not escape the station root")
                    })?;
                }
                Component::Normal(_) => depth += 1,
                Component::CurDir => {}
            }
        }
        Ok(RelativeRoot(path.to_path_buf()))
    }
}

impl fmt::Display for RelativeRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Format a number without a trailing `.0` for whole values.
fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    format!("{}", value)
}

/// Format degrees with at least two and at most six decimals.
fn format_degrees(value: f64) -> String {
    let value = if value == 0.0 { 0.0 } else { value };
    let text = format!("{:.6}", value);
    let trimmed = text.trim_end_matches('0');
    let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));
    format!("{}.{:0<2}", whole, fraction)
}

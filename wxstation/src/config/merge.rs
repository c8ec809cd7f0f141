//! Layered merge of baseline, existing file, CLI values and prompt answers.
//!
//! The accumulator starts as a copy of the [`Baseline`]; each [`Layer`] is
//! applied in order and later layers win. Tree layers overlay whole
//! documents (the upper document keeps its comments, order and unknown
//! keys), value layers write individual station fields.

use std::collections::BTreeMap;

use super::defaults::Baseline;
use super::keys::{drop_bare_driver_section, FieldValue, StationField, STATION_TYPE_KEY};
use super::tree::{ConfigTree, KeyPath};
use super::validate::ValidationError;

/// Explicitly supplied station field values.
///
/// A field that is absent here is never overridden.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    values: BTreeMap<StationField, FieldValue>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate raw `(field, text)` pairs into an overlay.
    ///
    /// A field given twice keeps its last value.
    pub fn from_raw<'a, I>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (StationField, &'a str)>,
    {
        let mut overlay = Self::new();
        for (field, raw) in pairs {
            overlay.insert(field, field.parse(raw)?);
        }
        Ok(overlay)
    }

    pub fn insert(&mut self, field: StationField, value: FieldValue) {
        self.values.insert(field, value);
    }

    pub fn get(&self, field: StationField) -> Option<&FieldValue> {
        self.values.get(&field)
    }

    pub fn contains(&self, field: StationField) -> bool {
        self.values.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Single overlay equivalent to applying `self` and then `later`.
    pub fn combine(&self, later: &Overlay) -> Overlay {
        let mut values = self.values.clone();
        values.extend(later.values.iter().map(|(k, v)| (*k, v.clone())));
        Overlay { values }
    }

    /// Write every field of the overlay into `tree`.
    pub fn apply(&self, tree: &mut ConfigTree) {
        for field in StationField::all() {
            if let Some(value) = self.values.get(field) {
                field.write(tree, value);
            }
        }
    }
}

/// One layer of the merge.
#[derive(Debug, Clone, Copy)]
pub enum Layer<'a> {
    /// A whole document, e.g. the existing configuration file.
    Tree(&'a ConfigTree),
    /// Individual field values from the CLI or from prompts.
    Values(&'a Overlay),
}

/// Merge `layers` on top of the baseline.
pub fn merge(baseline: &Baseline, layers: &[Layer<'_>]) -> ConfigTree {
    let mut tree = baseline.tree().clone();
    for layer in layers {
        apply_layer(&mut tree, layer);
    }
    tree
}

/// Apply a single layer to an accumulated tree.
pub fn apply_layer(tree: &mut ConfigTree, layer: &Layer<'_>) {
    match layer {
        Layer::Tree(upper) => {
            let lower_type = tree.get_str(&KeyPath::from(STATION_TYPE_KEY));
            let upper_type = upper.get_str(&KeyPath::from(STATION_TYPE_KEY));
            let mut merged = tree.overlay(upper);
            if let (Some(lower_type), Some(upper_type)) = (lower_type, upper_type) {
                let lower_section = KeyPath::new([lower_type.as_str()]);
                if lower_type != upper_type && !upper.has_section(&lower_section) {
                    drop_bare_driver_section(&mut merged, &lower_type);
                }
            }
            *tree = merged;
        }
        Layer::Values(overlay) => overlay.apply(tree),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tree::TreeValue;

    const EXISTING: &str = r#"# My station
version = "5.1.0"

[Station]
# where it lives
location = "Hood River"
latitude = "45.70"
longitude = "-121.50"
altitude = ["700", "foot"]
station_type = "Vantage"

[Vantage]
driver = "wxstation.drivers.vantage"
port = "/dev/ttyUSB0"

[Custom]
# keep me
answer = "42"
"#;

    fn baseline() -> Baseline {
        Baseline::load().unwrap()
    }

    fn overlay(pairs: &[(StationField, &str)]) -> Overlay {
        Overlay::from_raw(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn test_merge_without_layers_is_baseline() {
        let base = baseline();
        let merged = merge(&base, &[]);
        assert_eq!(merged.to_string(), base.tree().to_string());
    }

    #[test]
    fn test_existing_values_and_comments_win() {
        let existing: ConfigTree = EXISTING.parse().unwrap();
        let merged = merge(&baseline(), &[Layer::Tree(&existing)]);

        assert_eq!(
            StationField::Location.read(&merged).as_deref(),
            Some("Hood River")
        );
        assert_eq!(
            merged.comment(&KeyPath::from("Station.location")).as_deref(),
            Some("where it lives")
        );
        assert_eq!(
            merged.get_str(&KeyPath::from("Custom.answer")).as_deref(),
            Some("42")
        );
        // filled in from the baseline
        assert_eq!(
            merged.get_str(&KeyPath::from("StdReport.SKIN_ROOT")).as_deref(),
            Some("skins")
        );
    }

    #[test]
    fn test_stale_baseline_driver_section_is_dropped() {
        let existing: ConfigTree = EXISTING.parse().unwrap();
        let merged = merge(&baseline(), &[Layer::Tree(&existing)]);

        assert!(!merged.has_section(&KeyPath::from("Simulator")));
        assert_eq!(
            StationField::Driver.read(&merged).as_deref(),
            Some("wxstation.drivers.vantage")
        );
    }

    #[test]
    fn test_values_layer_overrides_existing() {
        let existing: ConfigTree = EXISTING.parse().unwrap();
        let cli = overlay(&[(StationField::Location, "Mt. Hood")]);
        let merged = merge(&baseline(), &[Layer::Tree(&existing), Layer::Values(&cli)]);

        assert_eq!(
            StationField::Location.read(&merged).as_deref(),
            Some("Mt. Hood")
        );
        assert_eq!(
            merged.comment(&KeyPath::from("Station.location")).as_deref(),
            Some("where it lives")
        );
        assert_eq!(
            StationField::Latitude.read(&merged).as_deref(),
            Some("45.70")
        );
    }

    #[test]
    fn test_later_layer_wins() {
        let cli = overlay(&[(StationField::UnitSystem, "metric")]);
        let prompted = overlay(&[(StationField::UnitSystem, "metricwx")]);
        let merged = merge(&baseline(), &[Layer::Values(&cli), Layer::Values(&prompted)]);

        assert_eq!(
            merged.get(&KeyPath::from("StdReport.Defaults.unit_system")),
            Some(TreeValue::scalar("metricwx"))
        );
    }

    #[test]
    fn test_combine_matches_sequential_application() {
        let existing: ConfigTree = EXISTING.parse().unwrap();
        let cli = overlay(&[
            (StationField::Location, "Cascade Locks"),
            (StationField::Driver, "wxstation.drivers.simulator"),
            (StationField::Altitude, "100,meter"),
        ]);
        let prompted = overlay(&[
            (StationField::Driver, "wxstation.drivers.acurite"),
            (StationField::Latitude, "45.67"),
            (StationField::UnitSystem, "metric"),
        ]);

        let sequential = merge(
            &baseline(),
            &[
                Layer::Tree(&existing),
                Layer::Values(&cli),
                Layer::Values(&prompted),
            ],
        );
        let combined = cli.combine(&prompted);
        let at_once = merge(&baseline(), &[Layer::Tree(&existing), Layer::Values(&combined)]);

        assert_eq!(sequential.to_string(), at_once.to_string());
    }

    #[test]
    fn test_combine_later_wins() {
        let a = overlay(&[(StationField::Location, "A"), (StationField::Latitude, "1")]);
        let b = overlay(&[(StationField::Location, "B")]);
        let combined = a.combine(&b);

        assert_eq!(combined.len(), 2);
        assert_eq!(
            combined.get(StationField::Location).map(|v| v.to_string()).as_deref(),
            Some("B")
        );
    }

    #[test]
    fn test_from_raw_rejects_invalid_value() {
        let err = Overlay::from_raw([(StationField::Altitude, "tall")]).unwrap_err();
        assert_eq!(err.field, "altitude");
    }
}

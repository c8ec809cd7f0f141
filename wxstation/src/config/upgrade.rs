//! Configuration schema upgrades.
//!
//! A configuration records the schema version it was written with. Older
//! files are brought forward by running every step of [`UPGRADE_STEPS`]
//! newer than the stored version, in ascending order. Each step is
//! idempotent and bumps the stored version when it succeeds, so running the
//! upgrader on an up-to-date tree changes nothing.
//!
//! # Usage
//!
//! ```ignore
//! use wxstation::config::{analyze_config, upgrade_tree, Baseline};
//!
//! let analysis = analyze_config(&tree, &baseline)?;
//! if analysis.needs_upgrade {
//!     println!("{}", analysis.summary());
//!     let report = upgrade_tree(&mut tree)?;
//! }
//! ```

use std::collections::HashSet;

use semver::Version;
use thiserror::Error;

use super::defaults::{Baseline, VERSION_KEY};
use super::keys::STATION_TYPE_KEY;
use super::merge::{merge, Layer};
use super::tree::{ConfigTree, KeyPath, TreeValue};
use super::validate::{Altitude, UnitSystem};

/// Schema version written by this engine.
pub const SCHEMA_VERSION: Version = Version::new(5, 1, 0);

/// Prefix older files used to anchor paths at the station root.
const LEGACY_ROOT_PREFIX: &str = "%(WEEWX_ROOT)s";

/// Settings that are no longer used and are removed on upgrade.
///
/// When deprecating a setting, add it here in "Section.key" format.
pub const DEPRECATED_KEYS: &[&str] = &[
    // Removed in 5.0.0 - week start is now a report option
    "Station.week_start",
    // Removed in 5.0.0 - schemas are owned by the database
    "StdArchive.archive_schema",
    // Removed in 4.0.0 - FTP retries moved into the uploader
    "StdReport.FTP.max_tries",
];

/// A single schema migration.
#[derive(Debug)]
pub struct UpgradeStep {
    /// Version the tree is at once this step has run.
    pub version: Version,
    pub name: &'static str,
    /// Tree migration; `None` for releases that only ship new skins.
    pub apply: Option<fn(&mut ConfigTree) -> Result<(), String>>,
    /// Skins whose packaged templates changed in this version.
    pub skins: &'static [&'static str],
}

/// Every migration, ascending by version.
pub static UPGRADE_STEPS: &[UpgradeStep] = &[
    UpgradeStep {
        version: Version::new(3, 0, 0),
        name: "data-bindings",
        apply: Some(upgrade_data_bindings),
        skins: &[],
    },
    UpgradeStep {
        version: Version::new(3, 2, 0),
        name: "registry-flag",
        apply: Some(upgrade_registry_flag),
        skins: &[],
    },
    UpgradeStep {
        version: Version::new(4, 0, 0),
        name: "report-defaults",
        apply: Some(upgrade_report_defaults),
        skins: &[],
    },
    UpgradeStep {
        version: Version::new(5, 0, 0),
        name: "station-url",
        apply: Some(upgrade_station_url),
        skins: &["Seasons", "Smartphone"],
    },
    UpgradeStep {
        version: Version::new(5, 1, 0),
        name: "skins-refresh",
        apply: None,
        skins: &["Seasons"],
    },
];

/// A migration step failed. Nothing has been written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Upgrade step '{step}' (to {version}) failed: {reason}")]
pub struct UpgradeStepError {
    pub step: String,
    pub version: Version,
    pub reason: String,
}

impl UpgradeStepError {
    fn version_check(reason: String) -> Self {
        Self {
            step: "version-check".to_string(),
            version: SCHEMA_VERSION,
            reason,
        }
    }
}

/// What an upgrade did to a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    pub from: Version,
    pub to: Version,
    /// Names of the steps that ran, in order.
    pub applied: Vec<&'static str>,
    /// Deprecated keys that were removed.
    pub removed_keys: Vec<String>,
    /// Skins to regenerate, without duplicates.
    pub skins: Vec<&'static str>,
}

impl UpgradeReport {
    /// Whether the tree was modified.
    pub fn changed(&self) -> bool {
        self.from != self.to || !self.applied.is_empty() || !self.removed_keys.is_empty()
    }
}

/// Result of analyzing a configuration for upgrade needs.
#[derive(Debug, Clone)]
pub struct ConfigUpgradeAnalysis {
    /// Version recorded in the file (0.0.0 when absent).
    pub stored_version: Version,

    /// Steps that would run, in order.
    pub pending_steps: Vec<&'static str>,

    /// Baseline settings missing from the (upgraded) file.
    pub missing_keys: Vec<String>,

    /// Deprecated settings present in the file.
    pub deprecated_keys: Vec<String>,

    /// Settings the engine does not know about. Preserved on upgrade.
    pub unknown_keys: Vec<String>,

    /// Whether any upgrade action is needed.
    pub needs_upgrade: bool,
}

impl ConfigUpgradeAnalysis {
    /// Get a summary message suitable for display to users.
    pub fn summary(&self) -> String {
        if !self.needs_upgrade {
            return format!("Configuration is up to date (version {}).", SCHEMA_VERSION);
        }

        let mut parts = Vec::new();

        if !self.pending_steps.is_empty() {
            parts.push(format!(
                "{} upgrade step(s) from {} to {} ({})",
                self.pending_steps.len(),
                self.stored_version,
                SCHEMA_VERSION,
                self.pending_steps.join(", ")
            ));
        }

        if !self.missing_keys.is_empty() {
            parts.push(format!("{} new setting(s)", self.missing_keys.len()));
        }

        if !self.deprecated_keys.is_empty() {
            parts.push(format!(
                "{} deprecated setting(s)",
                self.deprecated_keys.len()
            ));
        }

        format!("Configuration needs {}", parts.join(" and "))
    }
}

/// Version recorded in `tree`, or 0.0.0 for files that predate versioning.
///
/// Short forms such as `3.2` are accepted.
pub fn stored_version(tree: &ConfigTree) -> Result<Version, UpgradeStepError> {
    let Some(raw) = tree.get_str(&KeyPath::from(VERSION_KEY)) else {
        return Ok(Version::new(0, 0, 0));
    };
    let raw = raw.trim();
    let padded = match raw.matches('.').count() {
        0 => format!("{}.0.0", raw),
        1 => format!("{}.0", raw),
        _ => raw.to_string(),
    };
    Version::parse(&padded).map_err(|e| {
        UpgradeStepError::version_check(format!("invalid version marker '{}': {}", raw, e))
    })
}

/// Steps that run for a tree at `stored`.
pub fn pending_steps(stored: &Version) -> impl Iterator<Item = &'static UpgradeStep> + '_ {
    UPGRADE_STEPS
        .iter()
        .filter(move |step| step.version > *stored && step.version <= SCHEMA_VERSION)
}

/// Every skin named by any step, in first-seen order.
pub fn all_step_skins() -> Vec<&'static str> {
    union_skins(UPGRADE_STEPS.iter())
}

/// Bring `tree` up to [`SCHEMA_VERSION`].
///
/// On error the tree may be partially migrated and must not be persisted.
pub fn upgrade_tree(tree: &mut ConfigTree) -> Result<UpgradeReport, UpgradeStepError> {
    let from = stored_version(tree)?;
    if from > SCHEMA_VERSION {
        return Err(UpgradeStepError::version_check(format!(
            "configuration version {} is newer than this wxstation ({})",
            from, SCHEMA_VERSION
        )));
    }

    let steps: Vec<&UpgradeStep> = pending_steps(&from).collect();
    for step in &steps {
        tracing::info!(step = step.name, version = %step.version, "running upgrade step");
        if let Some(apply) = step.apply {
            apply(tree).map_err(|reason| UpgradeStepError {
                step: step.name.to_string(),
                version: step.version.clone(),
                reason,
            })?;
        }
        tree.set(
            &KeyPath::from(VERSION_KEY),
            TreeValue::scalar(step.version.to_string()),
        );
    }
    if from < SCHEMA_VERSION {
        tree.set(
            &KeyPath::from(VERSION_KEY),
            TreeValue::scalar(SCHEMA_VERSION.to_string()),
        );
    }

    let removed_keys = remove_deprecated(tree);

    Ok(UpgradeReport {
        from,
        to: SCHEMA_VERSION,
        applied: steps.iter().map(|s| s.name).collect(),
        removed_keys,
        skins: union_skins(steps.into_iter()),
    })
}

/// Analyze a configuration without modifying it.
///
/// Compares the tree, as it would look after upgrading, against the baseline:
///
/// - **Missing keys**: baseline settings the file does not have
/// - **Deprecated keys**: settings that will be removed
/// - **Unknown keys**: settings the baseline does not define (kept as-is)
pub fn analyze_config(
    tree: &ConfigTree,
    baseline: &Baseline,
) -> Result<ConfigUpgradeAnalysis, UpgradeStepError> {
    let stored = stored_version(tree)?;
    let pending: Vec<&'static str> = pending_steps(&stored).map(|s| s.name).collect();

    let mut upgraded = tree.clone();
    upgrade_tree(&mut upgraded)?;

    let present: HashSet<String> = upgraded.leaf_paths().iter().map(|p| p.to_string()).collect();
    let merged = merge(baseline, &[Layer::Tree(&upgraded)]);
    let missing_keys: Vec<String> = merged
        .leaf_paths()
        .iter()
        .map(|p| p.to_string())
        .filter(|p| !present.contains(p))
        .collect();

    let mut deprecated_keys: Vec<String> = DEPRECATED_KEYS
        .iter()
        .filter(|k| tree.contains(&KeyPath::from(**k)))
        .map(|k| k.to_string())
        .collect();
    deprecated_keys.sort();

    let known: HashSet<String> = baseline
        .tree()
        .leaf_paths()
        .iter()
        .map(|p| p.to_string())
        .collect();
    let driver_section = upgraded.get_str(&KeyPath::from(STATION_TYPE_KEY));
    let mut unknown_keys: Vec<String> = upgraded
        .leaf_paths()
        .iter()
        .filter(|p| driver_section.as_deref() != p.segments().first().map(String::as_str))
        .map(|p| p.to_string())
        .filter(|p| !known.contains(p) && p != "Station.station_url")
        .collect();
    unknown_keys.sort();

    let needs_upgrade =
        !pending.is_empty() || !missing_keys.is_empty() || !deprecated_keys.is_empty();

    Ok(ConfigUpgradeAnalysis {
        stored_version: stored,
        pending_steps: pending,
        missing_keys,
        deprecated_keys,
        unknown_keys,
        needs_upgrade,
    })
}

fn union_skins<'a>(steps: impl Iterator<Item = &'a UpgradeStep>) -> Vec<&'static str> {
    let mut skins: Vec<&'static str> = Vec::new();
    for skin in steps.flat_map(|s| s.skins.iter().copied()) {
        if !skins.contains(&skin) {
            skins.push(skin);
        }
    }
    skins
}

fn remove_deprecated(tree: &mut ConfigTree) -> Vec<String> {
    DEPRECATED_KEYS
        .iter()
        .filter(|key| tree.remove(&KeyPath::from(**key)).is_some())
        .map(|key| key.to_string())
        .collect()
}

/// Read a leaf that must be a single value.
fn scalar(tree: &ConfigTree, path: &KeyPath) -> Result<Option<String>, String> {
    match tree.get(path) {
        None => Ok(None),
        Some(TreeValue::Scalar(value)) => Ok(Some(value)),
        Some(TreeValue::List(_)) => Err(format!("{} must be a single value, not a list", path)),
    }
}

/// Move a scalar to a new path with a transformed value, carrying its comment.
fn relocate(tree: &mut ConfigTree, from: &KeyPath, to: &KeyPath, value: String) {
    let comment = tree.comment(from);
    tree.remove(from);
    if tree.set_default(to, TreeValue::Scalar(value)) {
        if let Some(comment) = comment {
            tree.set_comment(to, &comment);
        }
    }
}

// ============================================================================
// Steps
// ============================================================================

fn upgrade_data_bindings(tree: &mut ConfigTree) -> Result<(), String> {
    let archive_database = KeyPath::from("StdArchive.archive_database");
    let data_binding = KeyPath::from("StdArchive.data_binding");
    let binding = KeyPath::from("DataBindings.wx_binding");

    if let Some(database) = scalar(tree, &archive_database)? {
        tree.set_default(&binding.child("database"), TreeValue::Scalar(database));
        let had_binding = tree.contains(&data_binding);
        tree.rename(&archive_database, "data_binding");
        if !had_binding {
            tree.set(&data_binding, TreeValue::scalar("wx_binding"));
        }
    }
    tree.set_default(&binding.child("database"), TreeValue::scalar("archive_sqlite"));
    tree.set_default(&binding.child("table_name"), TreeValue::scalar("archive"));

    let legacy_root = KeyPath::from("Databases.archive_sqlite.root");
    if let Some(root) = scalar(tree, &legacy_root)? {
        let relative = root
            .strip_prefix(LEGACY_ROOT_PREFIX)
            .map(|rest| rest.trim_start_matches('/'))
            .unwrap_or(&root);
        let relative = if relative.is_empty() { "." } else { relative }.to_string();
        relocate(
            tree,
            &legacy_root,
            &KeyPath::from("DatabaseTypes.SQLite.SQLITE_ROOT"),
            relative,
        );
    }
    Ok(())
}

fn upgrade_registry_flag(tree: &mut ConfigTree) -> Result<(), String> {
    tree.rename(
        &KeyPath::from("StdRESTful.StationRegistry.register"),
        "register_this_station",
    );
    Ok(())
}

fn upgrade_report_defaults(tree: &mut ConfigTree) -> Result<(), String> {
    let legacy = KeyPath::from("StdReport.unit_system");
    let target = KeyPath::from("StdReport.Defaults.unit_system");

    if let Some(unit) = scalar(tree, &legacy)? {
        let unit = unit
            .parse::<UnitSystem>()
            .map_err(|e| e.to_string())?;
        relocate(tree, &legacy, &target, unit.to_string());
    }
    tree.set_default(&target, TreeValue::scalar(UnitSystem::default().as_str()));
    Ok(())
}

fn upgrade_station_url(tree: &mut ConfigTree) -> Result<(), String> {
    tree.move_value(
        &KeyPath::from("StdRESTful.StationRegistry.station_url"),
        &KeyPath::from("Station.station_url"),
    );

    let altitude = KeyPath::from("Station.altitude");
    if let Some(legacy) = scalar(tree, &altitude)? {
        let mut parts = legacy
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty());
        let joined = match (parts.next(), parts.next(), parts.next()) {
            (Some(value), Some(unit), None) => format!("{},{}", value, unit),
            _ => legacy.clone(),
        };
        let parsed = joined.parse::<Altitude>().map_err(|e| e.to_string())?;
        tree.set(&altitude, TreeValue::List(parsed.to_pair().to_vec()));
    }

    tree.set_default(&KeyPath::from("StdReport.SKIN_ROOT"), TreeValue::scalar("skins"));
    tree.set_default(
        &KeyPath::from("StdReport.HTML_ROOT"),
        TreeValue::scalar("public_html"),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const V2_CONFIG: &str = r#"# Station from long ago
[Station]
location = "Hood River"
latitude = "45.70"
longitude = "-121.50"
# height above sea level
altitude = "700, foot"
station_type = "Vantage"
week_start = "6"

[Vantage]
driver = "wxstation.drivers.vantage"

[StdRESTful.StationRegistry]
register = "true"
station_url = "https://example.com/wx"

[StdReport]
unit_system = "METRIC"

[StdArchive]
archive_interval = "300"
# which database
archive_database = "archive_sqlite"

[Databases.archive_sqlite]
root = "%(WEEWX_ROOT)s/archive"
database_name = "weewx.sdb"

[Custom]
answer = "42"
"#;

    fn v2() -> ConfigTree {
        V2_CONFIG.parse().unwrap()
    }

    fn get(tree: &ConfigTree, path: &str) -> Option<String> {
        tree.get_str(&KeyPath::from(path))
    }

    #[test]
    fn test_schema_version_matches_package() {
        assert_eq!(SCHEMA_VERSION.to_string(), crate::VERSION);
        assert_eq!(UPGRADE_STEPS.last().map(|s| &s.version), Some(&SCHEMA_VERSION));
    }

    #[test]
    fn test_steps_are_ascending() {
        for pair in UPGRADE_STEPS.windows(2) {
            assert!(pair[0].version < pair[1].version);
        }
    }

    #[test]
    fn test_stored_version_parsing() {
        assert_eq!(stored_version(&v2()).unwrap(), Version::new(0, 0, 0));
        let tree: ConfigTree = "version = \"3.2\"\n".parse().unwrap();
        assert_eq!(stored_version(&tree).unwrap(), Version::new(3, 2, 0));
        let tree: ConfigTree = "version = \"4.10.2\"\n".parse().unwrap();
        assert_eq!(stored_version(&tree).unwrap(), Version::new(4, 10, 2));
        let tree: ConfigTree = "version = \"banana\"\n".parse().unwrap();
        assert!(stored_version(&tree).is_err());
    }

    #[test]
    fn test_full_upgrade_from_unversioned() {
        let mut tree = v2();
        let report = upgrade_tree(&mut tree).unwrap();

        assert_eq!(report.from, Version::new(0, 0, 0));
        assert_eq!(report.to, SCHEMA_VERSION);
        assert_eq!(
            report.applied,
            vec![
                "data-bindings",
                "registry-flag",
                "report-defaults",
                "station-url",
                "skins-refresh"
            ]
        );
        assert_eq!(report.skins, vec!["Seasons", "Smartphone"]);
        assert_eq!(report.removed_keys, vec!["Station.week_start"]);

        assert_eq!(get(&tree, "version").as_deref(), Some("5.1.0"));
        assert_eq!(get(&tree, "StdArchive.data_binding").as_deref(), Some("wx_binding"));
        assert!(get(&tree, "StdArchive.archive_database").is_none());
        assert_eq!(
            tree.comment(&KeyPath::from("StdArchive.data_binding")).as_deref(),
            Some("which database")
        );
        assert_eq!(
            get(&tree, "DataBindings.wx_binding.database").as_deref(),
            Some("archive_sqlite")
        );
        assert_eq!(
            get(&tree, "DatabaseTypes.SQLite.SQLITE_ROOT").as_deref(),
            Some("archive")
        );
        assert!(get(&tree, "Databases.archive_sqlite.root").is_none());
        assert_eq!(
            get(&tree, "StdRESTful.StationRegistry.register_this_station").as_deref(),
            Some("true")
        );
        assert_eq!(
            get(&tree, "StdReport.Defaults.unit_system").as_deref(),
            Some("metric")
        );
        assert_eq!(
            get(&tree, "Station.station_url").as_deref(),
            Some("https://example.com/wx")
        );
        assert_eq!(
            tree.get(&KeyPath::from("Station.altitude")),
            Some(TreeValue::List(vec!["700".into(), "foot".into()]))
        );
        assert_eq!(
            tree.comment(&KeyPath::from("Station.altitude")).as_deref(),
            Some("height above sea level")
        );
        assert_eq!(get(&tree, "StdReport.SKIN_ROOT").as_deref(), Some("skins"));
        assert_eq!(get(&tree, "Custom.answer").as_deref(), Some("42"));
    }

    #[test]
    fn test_upgrade_is_idempotent() {
        let mut tree = v2();
        upgrade_tree(&mut tree).unwrap();
        let once = tree.to_string();

        let report = upgrade_tree(&mut tree).unwrap();
        assert!(!report.changed());
        assert!(report.applied.is_empty());
        assert!(report.skins.is_empty());
        assert_eq!(tree.to_string(), once);
    }

    #[test]
    fn test_partial_upgrade_runs_only_newer_steps() {
        let mut tree: ConfigTree = "version = \"4.5.0\"\n\n[Station]\naltitude = \"320 meter\"\n"
            .parse()
            .unwrap();
        let report = upgrade_tree(&mut tree).unwrap();

        assert_eq!(report.applied, vec!["station-url", "skins-refresh"]);
        assert!(get(&tree, "DataBindings.wx_binding.database").is_none());
        assert_eq!(
            tree.get(&KeyPath::from("Station.altitude")),
            Some(TreeValue::List(vec!["320".into(), "meter".into()]))
        );
    }

    #[test]
    fn test_skins_only_step_bumps_version_and_lists_skins() {
        let text = "version = \"5.0.0\"\n\n[Station]\nlocation = \"Here\"\n";
        let mut tree: ConfigTree = text.parse().unwrap();
        let report = upgrade_tree(&mut tree).unwrap();

        assert_eq!(report.applied, vec!["skins-refresh"]);
        assert_eq!(report.skins, vec!["Seasons"]);
        assert_eq!(get(&tree, "version").as_deref(), Some("5.1.0"));
        assert_eq!(get(&tree, "Station.location").as_deref(), Some("Here"));
    }

    #[test]
    fn test_newer_config_is_rejected() {
        let mut tree: ConfigTree = "version = \"9.0.0\"\n".parse().unwrap();
        let err = upgrade_tree(&mut tree).unwrap_err();
        assert_eq!(err.step, "version-check");
        assert!(err.reason.contains("newer"));
    }

    #[test]
    fn test_bad_legacy_altitude_fails_step() {
        let mut tree: ConfigTree = "version = \"4.0.0\"\n\n[Station]\naltitude = \"very high\"\n"
            .parse()
            .unwrap();
        let err = upgrade_tree(&mut tree).unwrap_err();
        assert_eq!(err.step, "station-url");
        assert_eq!(err.version, Version::new(5, 0, 0));
    }

    #[test]
    fn test_bad_unit_system_fails_step() {
        let mut tree: ConfigTree = "version = \"3.9.0\"\n\n[StdReport]\nunit_system = \"imperial\"\n"
            .parse()
            .unwrap();
        let err = upgrade_tree(&mut tree).unwrap_err();
        assert_eq!(err.step, "report-defaults");
    }

    #[test]
    fn test_list_archive_database_fails_step() {
        let mut tree: ConfigTree = "[StdArchive]\narchive_database = [\"a\", \"b\"]\n"
            .parse()
            .unwrap();
        let err = upgrade_tree(&mut tree).unwrap_err();
        assert_eq!(err.step, "data-bindings");
        assert!(err.reason.contains("single value"));
    }

    #[test]
    fn test_analyze_reports_pending_work() {
        let baseline = Baseline::load().unwrap();
        let analysis = analyze_config(&v2(), &baseline).unwrap();

        assert!(analysis.needs_upgrade);
        assert_eq!(analysis.pending_steps.len(), UPGRADE_STEPS.len());
        assert_eq!(analysis.deprecated_keys, vec!["Station.week_start"]);
        assert!(analysis
            .missing_keys
            .contains(&"StdReport.SeasonsReport.skin".to_string()));
        assert!(analysis.unknown_keys.contains(&"Custom.answer".to_string()));
        assert!(!analysis
            .unknown_keys
            .iter()
            .any(|k| k.starts_with("Vantage.")));
        assert!(analysis.summary().contains("upgrade step(s)"));
    }

    #[test]
    fn test_analyze_up_to_date_baseline() {
        let baseline = Baseline::load().unwrap();
        let analysis = analyze_config(baseline.tree(), &baseline).unwrap();

        assert!(!analysis.needs_upgrade);
        assert!(analysis.missing_keys.is_empty());
        assert!(analysis.unknown_keys.is_empty());
        assert!(analysis.summary().contains("up to date"));
    }

    #[test]
    fn test_all_step_skins() {
        assert_eq!(all_step_skins(), vec!["Seasons", "Smartphone"]);
    }
}

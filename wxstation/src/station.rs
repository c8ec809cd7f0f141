//! Station lifecycle operations.
//!
//! [`StationEngine`] runs the four commands against a configuration file:
//!
//! - [`create`](StationEngine::create): write a new configuration and
//!   lay out the station directories
//! - [`reconfigure`](StationEngine::reconfigure): change values of an existing
//!   configuration in place
//! - [`upgrade`](StationEngine::upgrade): bring an older configuration and
//!   its skins up to date
//! - [`upgrade_skins`](StationEngine::upgrade_skins): refresh only the skins
//!
//! Every operation validates the complete result before touching the disk.
//! Nothing is written unless the final tree is valid, and the configuration
//! file is only ever replaced atomically.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::file::{load_tree, station_root, ConfigFileError};
use crate::config::skins::{install_skins, regenerate_skins, SkinError, SkinReport};
use crate::config::upgrade::{
    all_step_skins, analyze_config, upgrade_tree, ConfigUpgradeAnalysis, UpgradeReport,
    UpgradeStepError,
};
use crate::config::writer::{stage, BackupPolicy, WriteError, WriteOutcome};
use crate::config::{
    merge, prompt_missing, Baseline, ConfigTree, Layer, Overlay, PreconditionError, PromptError,
    RelativeRoot, StationField, StationSettings, ValidationError, ValueSource,
};

/// Errors from station operations.
#[derive(Debug, Error)]
pub enum StationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    UpgradeStep(#[from] UpgradeStepError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    File(#[from] ConfigFileError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Skins(#[from] SkinError),
}

/// Field values given on the command line, not yet validated.
///
/// Fields that were not given are simply absent and never override the
/// existing configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationInputs {
    values: Vec<(StationField, String)>,
}

impl StationInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StationInputs::set`].
    pub fn with(mut self, field: StationField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: StationField, value: impl Into<String>) {
        self.values.push((field, value.into()));
    }

    /// Set `field` only when a value was given.
    pub fn set_opt(&mut self, field: StationField, value: Option<String>) {
        if let Some(value) = value {
            self.set(field, value);
        }
    }

    fn overlay(&self) -> Result<Overlay, ValidationError> {
        Overlay::from_raw(self.values.iter().map(|(f, v)| (*f, v.as_str())))
    }
}

/// Result of [`StationEngine::create`].
#[derive(Debug)]
pub struct CreateResult {
    pub write: WriteOutcome,
    pub settings: StationSettings,
    pub skins: SkinReport,
}

/// Result of [`StationEngine::reconfigure`].
#[derive(Debug)]
pub struct ReconfigureResult {
    pub write: WriteOutcome,
    pub settings: StationSettings,
    /// Schema upgrade applied to the existing file before reconfiguring.
    pub upgrade: UpgradeReport,
    pub skins: SkinReport,
}

/// Result of [`StationEngine::upgrade`].
#[derive(Debug)]
pub struct UpgradeResult {
    /// State of the file before upgrading.
    pub analysis: ConfigUpgradeAnalysis,
    /// `None` for a dry run or when nothing needed upgrading.
    pub report: Option<UpgradeReport>,
    pub write: Option<WriteOutcome>,
    pub skins: SkinReport,
}

impl UpgradeResult {
    pub fn is_dry_run(&self) -> bool {
        self.report.is_none() && self.analysis.needs_upgrade
    }
}

/// Runs station operations against a fixed baseline.
#[derive(Debug, Clone, Copy)]
pub struct StationEngine<'a> {
    baseline: &'a Baseline,
}

impl<'a> StationEngine<'a> {
    pub fn new(baseline: &'a Baseline) -> Self {
        Self { baseline }
    }

    /// Create a new configuration at `path`.
    ///
    /// Fails without touching anything if `path` already exists. The new
    /// file is staged first, then the skin, database and html directories are
    /// created under the station root and the packaged skins are installed.
    /// The file only appears once all of that succeeded.
    pub fn create(
        &self,
        path: &Path,
        inputs: &StationInputs,
        source: &mut dyn ValueSource,
    ) -> Result<CreateResult, StationError> {
        if path.exists() {
            return Err(PreconditionError(format!(
                "Configuration file already exists: {} (use reconfigure)",
                path.display()
            ))
            .into());
        }
        tracing::info!(path = %path.display(), "creating station configuration");

        let cli = inputs.overlay()?;
        let prompted = prompt_missing(source, &cli, self.baseline.tree())?;
        let tree = merge(
            self.baseline,
            &[Layer::Values(&cli), Layer::Values(&prompted)],
        );
        let settings = validated(&tree)?;

        let staged = stage(&tree, path, BackupPolicy::None)?;

        let root = station_root(path);
        for dir in [settings.sqlite_dir(&root), settings.html_dir(&root)] {
            fs::create_dir_all(&dir).map_err(|e| WriteError::new(&dir, e))?;
        }
        let skins = install_skins(&settings.skin_dir(&root))?;

        let write = staged.commit()?;

        Ok(CreateResult {
            write,
            settings,
            skins,
        })
    }

    /// Change values of the configuration at `path`.
    ///
    /// The existing file is upgraded in memory first. Values given in
    /// `inputs` win over prompted ones, which win over the file. Keys,
    /// sections and comments the engine does not manage are kept. Skins named
    /// by the applied upgrade steps are regenerated before the file is
    /// replaced.
    pub fn reconfigure(
        &self,
        path: &Path,
        inputs: &StationInputs,
        source: &mut dyn ValueSource,
    ) -> Result<ReconfigureResult, StationError> {
        let mut existing = load_existing(path)?;
        tracing::info!(path = %path.display(), "reconfiguring station");

        let upgrade = upgrade_tree(&mut existing)?;
        let cli = inputs.overlay()?;
        let defaults = merge(self.baseline, &[Layer::Tree(&existing)]);
        let prompted = prompt_missing(source, &cli, &defaults)?;
        let tree = merge(
            self.baseline,
            &[
                Layer::Tree(&existing),
                Layer::Values(&cli),
                Layer::Values(&prompted),
            ],
        );
        let settings = validated(&tree)?;

        let staged = stage(&tree, path, BackupPolicy::Timestamped)?;

        let skins = if upgrade.skins.is_empty() {
            SkinReport::default()
        } else {
            regenerate_skins(&settings.skin_dir(&station_root(path)), &upgrade.skins)?
        };

        let write = staged.commit()?;

        Ok(ReconfigureResult {
            write,
            settings,
            upgrade,
            skins,
        })
    }

    /// Upgrade the configuration at `path` to the current schema.
    ///
    /// With `dry_run` only the analysis is returned. An up-to-date file is
    /// left untouched. The configuration is replaced only after the skins of
    /// every applied step were regenerated, so a failed skin update leaves the
    /// file at its old version and the upgrade can simply be run again.
    pub fn upgrade(&self, path: &Path, dry_run: bool) -> Result<UpgradeResult, StationError> {
        let existing = load_existing(path)?;
        let analysis = analyze_config(&existing, self.baseline)?;
        tracing::info!(
            path = %path.display(),
            stored = %analysis.stored_version,
            needs_upgrade = analysis.needs_upgrade,
            "analyzed configuration"
        );

        if dry_run || !analysis.needs_upgrade {
            return Ok(UpgradeResult {
                analysis,
                report: None,
                write: None,
                skins: SkinReport::default(),
            });
        }

        let mut upgraded = existing;
        let report = upgrade_tree(&mut upgraded)?;
        let tree = merge(self.baseline, &[Layer::Tree(&upgraded)]);
        let skin_dir = skin_dir(&tree, path)?;

        let staged = stage(&tree, path, BackupPolicy::Timestamped)?;
        let skins = regenerate_skins(&skin_dir, &report.skins)?;
        let write = staged.commit()?;

        Ok(UpgradeResult {
            analysis,
            report: Some(report),
            write: Some(write),
            skins,
        })
    }

    /// Regenerate every skin the upgrade steps know about, regardless of the
    /// configuration's version. The configuration file is not modified.
    pub fn upgrade_skins(&self, path: &Path) -> Result<SkinReport, StationError> {
        let existing = load_existing(path)?;
        let tree = merge(self.baseline, &[Layer::Tree(&existing)]);
        let skin_dir = skin_dir(&tree, path)?;
        tracing::info!(dir = %skin_dir.display(), "regenerating skins");
        Ok(regenerate_skins(&skin_dir, &all_step_skins())?)
    }
}

/// Load the configuration an operation works on; a missing file is a
/// precondition failure rather than an I/O error.
fn load_existing(path: &Path) -> Result<ConfigTree, StationError> {
    match load_tree(path) {
        Ok(tree) => Ok(tree),
        Err(ConfigFileError::NotFound(path)) => Err(PreconditionError(format!(
            "No configuration file at {} (use create)",
            path.display()
        ))
        .into()),
        Err(e) => Err(e.into()),
    }
}

fn validated(tree: &ConfigTree) -> Result<StationSettings, StationError> {
    let settings = StationSettings::from_tree(tree)?;
    settings.check_registration()?;
    Ok(settings)
}

fn skin_dir(tree: &ConfigTree, config_path: &Path) -> Result<PathBuf, ValidationError> {
    let field = StationField::SkinRoot;
    let raw = field.raw(tree).unwrap_or_default();
    let root = raw
        .parse::<RelativeRoot>()
        .map_err(|e| e.for_field(field.name()))?;
    Ok(root.resolve(&station_root(config_path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NoPrompt, ScriptedSource};
    use tempfile::TempDir;

    fn baseline() -> Baseline {
        Baseline::load().unwrap()
    }

    #[test]
    fn test_create_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("station.toml");
        let baseline = baseline();

        let result = StationEngine::new(&baseline)
            .create(&path, &StationInputs::new(), &mut NoPrompt)
            .unwrap();

        assert!(path.exists());
        assert!(result.write.backup_path.is_none());
        assert_eq!(result.settings.location.as_str(), "Weather Station");
        assert!(temp_dir.path().join("archive").is_dir());
        assert!(temp_dir.path().join("public_html").is_dir());
        assert!(temp_dir.path().join("skins/Seasons/skin.toml").exists());
    }

    #[test]
    fn test_create_rejects_invalid_cli_value() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("station.toml");
        let baseline = baseline();
        let inputs = StationInputs::new().with(StationField::Latitude, "91");

        let err = StationEngine::new(&baseline)
            .create(&path, &inputs, &mut NoPrompt)
            .unwrap_err();

        assert!(matches!(err, StationError::Validation(ref e) if e.field == "latitude"));
        assert!(!path.exists());
    }

    #[test]
    fn test_create_prompts_for_missing_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("station.toml");
        let baseline = baseline();
        let inputs = StationInputs::new()
            .with(StationField::Location, "Hood River")
            .with(StationField::Register, "n");
        // latitude, longitude, altitude, driver, units
        let mut source = ScriptedSource::new(["45.7", "", "", "", "metric"]);

        let result = StationEngine::new(&baseline)
            .create(&path, &inputs, &mut source)
            .unwrap();

        assert_eq!(
            source.asked_fields(),
            vec![
                StationField::Latitude,
                StationField::Longitude,
                StationField::Altitude,
                StationField::Driver,
                StationField::UnitSystem,
            ]
        );
        assert_eq!(result.settings.location.as_str(), "Hood River");
        assert_eq!(result.settings.latitude.degrees(), 45.7);
        assert_eq!(result.settings.unit_system.as_str(), "metric");
    }

    #[test]
    fn test_prompt_abort_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("station.toml");
        let baseline = baseline();
        let mut source = ScriptedSource::new(["Somewhere"]);

        let err = StationEngine::new(&baseline)
            .create(&path, &StationInputs::new(), &mut source)
            .unwrap_err();

        assert!(matches!(
            err,
            StationError::Prompt(PromptError::Aborted(StationField::Latitude))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_reconfigure_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("station.toml");
        let baseline = baseline();

        let err = StationEngine::new(&baseline)
            .reconfigure(&path, &StationInputs::new(), &mut NoPrompt)
            .unwrap_err();

        assert!(matches!(err, StationError::Precondition(_)));
        assert!(err.to_string().contains("use create"));
    }

    #[test]
    fn test_reconfigure_changes_driver() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("station.toml");
        let baseline = baseline();
        let engine = StationEngine::new(&baseline);
        engine
            .create(&path, &StationInputs::new(), &mut NoPrompt)
            .unwrap();

        let inputs = StationInputs::new().with(StationField::Driver, "wxstation.drivers.vantage");
        let result = engine.reconfigure(&path, &inputs, &mut NoPrompt).unwrap();

        assert!(result.write.backup_path.is_some());
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("station_type = \"Vantage\""));
        assert!(text.contains("[Vantage]"));
        assert!(!text.contains("[Simulator]"));
    }

    #[test]
    fn test_upgrade_up_to_date_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("station.toml");
        let baseline = baseline();
        let engine = StationEngine::new(&baseline);
        engine
            .create(&path, &StationInputs::new(), &mut NoPrompt)
            .unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let result = engine.upgrade(&path, false).unwrap();

        assert!(!result.analysis.needs_upgrade);
        assert!(result.write.is_none());
        assert!(!result.is_dry_run());
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn test_upgrade_dry_run_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("station.toml");
        let old = "[Station]\nlocation = \"Old\"\nweek_start = \"6\"\n";
        fs::write(&path, old).unwrap();
        let baseline = baseline();

        let result = StationEngine::new(&baseline).upgrade(&path, true).unwrap();

        assert!(result.analysis.needs_upgrade);
        assert!(result.is_dry_run());
        assert_eq!(fs::read_to_string(&path).unwrap(), old);
    }

    #[test]
    fn test_upgrade_skins_without_version_change() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("station.toml");
        let baseline = baseline();
        let engine = StationEngine::new(&baseline);
        engine
            .create(&path, &StationInputs::new(), &mut NoPrompt)
            .unwrap();
        fs::remove_dir_all(temp_dir.path().join("skins/Smartphone")).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let report = engine.upgrade_skins(&path).unwrap();

        assert_eq!(report.installed, vec!["Smartphone"]);
        assert_eq!(report.unchanged, vec!["Seasons"]);
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }
}

//! Station configuration CLI commands.
//!
//! Provides `station create`, `station reconfigure`, `station upgrade` and
//! `station upgrade-skins`. Argument values are passed to the engine as
//! typed on the command line; validation and all file handling happen in
//! [`wxstation::station`].

mod terminal;

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use wxstation::config::{
    config_file_path, Baseline, NoPrompt, SkinReport, StationField, StationSettings, ValueSource,
};
use wxstation::station::{StationEngine, StationInputs, UpgradeResult};

use self::terminal::ConsoleSource;
use crate::error::CliError;

/// Station subcommands.
#[derive(Debug, Subcommand)]
pub enum StationCommands {
    /// Create a new station configuration
    ///
    /// Values not given as flags are asked for interactively, with the
    /// packaged defaults offered. Fails if the configuration file exists.
    Create(StationArgs),

    /// Change settings of an existing station configuration
    ///
    /// Values not given as flags are asked for interactively, with the
    /// current settings offered. Settings not managed here are kept.
    /// Creates a timestamped backup before modifying.
    Reconfigure(StationArgs),

    /// Upgrade the configuration file and skins to the current version
    ///
    /// Creates a timestamped backup before modifying.
    Upgrade {
        #[command(flatten)]
        target: ConfigTarget,

        /// Show what would be changed without modifying anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Regenerate the packaged skins without touching the configuration
    UpgradeSkins {
        #[command(flatten)]
        target: ConfigTarget,
    },
}

/// Location of the configuration file.
#[derive(Debug, Args)]
pub struct ConfigTarget {
    /// Configuration file [default: ~/wxstation-data/station.toml]
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl ConfigTarget {
    pub fn path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(config_file_path)
    }
}

/// Station values accepted by create and reconfigure.
#[derive(Debug, Args)]
pub struct StationArgs {
    #[command(flatten)]
    pub target: ConfigTarget,

    /// Driver module, e.g. wxstation.drivers.vantage
    #[arg(long)]
    pub driver: Option<String>,

    /// Free-text description of the station location
    #[arg(long)]
    pub location: Option<String>,

    /// Altitude as <value>,<unit> where unit is foot or meter
    #[arg(long, allow_hyphen_values = true)]
    pub altitude: Option<String>,

    /// Latitude in decimal degrees, negative for south
    #[arg(long, allow_hyphen_values = true)]
    pub latitude: Option<String>,

    /// Longitude in decimal degrees, negative for west
    #[arg(long, allow_hyphen_values = true)]
    pub longitude: Option<String>,

    /// Register the station in the public registry (y/n)
    #[arg(long)]
    pub register: Option<String>,

    /// Unique URL of the station, required when registering
    #[arg(long)]
    pub station_url: Option<String>,

    /// Unit system for reports: us, metricwx or metric
    #[arg(long)]
    pub units: Option<String>,

    /// Skin directory, relative to the station directory
    #[arg(long)]
    pub skin_root: Option<String>,

    /// Database directory, relative to the station directory
    #[arg(long)]
    pub sqlite_root: Option<String>,

    /// Generated pages directory, relative to the station directory
    #[arg(long)]
    pub html_root: Option<String>,

    /// Do not ask for values; use the current or default ones
    #[arg(long)]
    pub no_prompt: bool,
}

impl StationArgs {
    /// Values given on the command line.
    pub fn inputs(&self) -> StationInputs {
        let mut inputs = StationInputs::new();
        for (field, value) in [
            (StationField::Location, &self.location),
            (StationField::Latitude, &self.latitude),
            (StationField::Longitude, &self.longitude),
            (StationField::Altitude, &self.altitude),
            (StationField::Driver, &self.driver),
            (StationField::UnitSystem, &self.units),
            (StationField::Register, &self.register),
            (StationField::StationUrl, &self.station_url),
            (StationField::SkinRoot, &self.skin_root),
            (StationField::SqliteRoot, &self.sqlite_root),
            (StationField::HtmlRoot, &self.html_root),
        ] {
            inputs.set_opt(field, value.clone());
        }
        inputs
    }

    fn value_source(&self) -> Box<dyn ValueSource> {
        if self.no_prompt {
            return Box::new(NoPrompt);
        }
        if !console::Term::stderr().is_term() {
            tracing::warn!("not running in a terminal, using current and default values");
            return Box::new(NoPrompt);
        }
        Box::new(ConsoleSource::new())
    }
}

/// Run a station subcommand.
pub fn run(command: StationCommands) -> Result<(), CliError> {
    let baseline = Baseline::load().map_err(|e| CliError::Baseline(e.to_string()))?;
    let engine = StationEngine::new(&baseline);

    match command {
        StationCommands::Create(args) => run_create(&engine, &args),
        StationCommands::Reconfigure(args) => run_reconfigure(&engine, &args),
        StationCommands::Upgrade { target, dry_run } => {
            run_upgrade(&engine, &target.path(), dry_run)
        }
        StationCommands::UpgradeSkins { target } => run_upgrade_skins(&engine, &target.path()),
    }
}

fn run_create(engine: &StationEngine<'_>, args: &StationArgs) -> Result<(), CliError> {
    let path = args.target.path();
    let mut source = args.value_source();

    let result = engine.create(&path, &args.inputs(), source.as_mut())?;

    println!();
    println!(
        "{} Created {}",
        style("✓").green(),
        style(result.write.path.display()).cyan()
    );
    print_settings(&result.settings);
    print_skins(&result.skins);
    Ok(())
}

fn run_reconfigure(engine: &StationEngine<'_>, args: &StationArgs) -> Result<(), CliError> {
    let path = args.target.path();
    let mut source = args.value_source();

    let result = engine.reconfigure(&path, &args.inputs(), source.as_mut())?;

    println!();
    if result.upgrade.changed() {
        println!(
            "Upgraded configuration from {} to {}.",
            result.upgrade.from, result.upgrade.to
        );
    }
    println!(
        "{} Saved {}",
        style("✓").green(),
        style(result.write.path.display()).cyan()
    );
    if let Some(backup) = &result.write.backup_path {
        println!("Backup created: {}", backup.display());
    }
    print_settings(&result.settings);
    print_skins(&result.skins);
    Ok(())
}

fn run_upgrade(engine: &StationEngine<'_>, path: &Path, dry_run: bool) -> Result<(), CliError> {
    let result = engine.upgrade(path, dry_run)?;

    if !result.analysis.needs_upgrade {
        println!("{}", result.analysis.summary());
        return Ok(());
    }

    print_analysis(&result);

    if result.is_dry_run() {
        println!("[DRY RUN] No changes made.");
        return Ok(());
    }

    println!("{} Upgrade complete!", style("✓").green());
    if let Some(backup) = result.write.as_ref().and_then(|w| w.backup_path.as_ref()) {
        println!("Backup created: {}", backup.display());
    }
    if let Some(report) = &result.report {
        println!(
            "Applied {} step(s), removed {} deprecated setting(s).",
            report.applied.len(),
            report.removed_keys.len()
        );
    }
    print_skins(&result.skins);
    Ok(())
}

fn run_upgrade_skins(engine: &StationEngine<'_>, path: &Path) -> Result<(), CliError> {
    let report = engine.upgrade_skins(path)?;
    if report.changed() {
        println!("{} Skins regenerated.", style("✓").green());
    } else {
        println!("Skins are up to date.");
    }
    print_skins(&report);
    Ok(())
}

fn print_analysis(result: &UpgradeResult) {
    let analysis = &result.analysis;

    println!("Configuration Upgrade Analysis");
    println!("==============================");
    println!();
    println!("{}", analysis.summary());
    println!();

    if !analysis.pending_steps.is_empty() {
        println!("Upgrade steps ({}):", analysis.pending_steps.len());
        for step in &analysis.pending_steps {
            println!("  > {}", step);
        }
        println!();
    }

    if !analysis.missing_keys.is_empty() {
        println!("Missing settings to add ({}):", analysis.missing_keys.len());
        for key in &analysis.missing_keys {
            println!("  + {}", key);
        }
        println!();
    }

    if !analysis.deprecated_keys.is_empty() {
        println!(
            "Deprecated settings to remove ({}):",
            analysis.deprecated_keys.len()
        );
        for key in &analysis.deprecated_keys {
            println!("  - {}", key);
        }
        println!();
    }

    if !analysis.unknown_keys.is_empty() {
        println!("Unknown settings (will be preserved):");
        for key in &analysis.unknown_keys {
            println!("  ? {}", key);
        }
        println!();
    }
}

fn print_settings(settings: &StationSettings) {
    println!();
    println!("  {:<10} {}", style("Location").bold(), settings.location);
    println!(
        "  {:<10} {}, {}",
        style("Position").bold(),
        settings.latitude,
        settings.longitude
    );
    println!("  {:<10} {}", style("Altitude").bold(), settings.altitude);
    println!("  {:<10} {}", style("Driver").bold(), settings.driver);
    println!("  {:<10} {}", style("Units").bold(), settings.unit_system);
    match &settings.station_url {
        Some(url) if settings.register => {
            println!("  {:<10} {}", style("Registry").bold(), url)
        }
        _ => println!("  {:<10} not registered", style("Registry").bold()),
    }
}

fn print_skins(report: &SkinReport) {
    for skin in &report.installed {
        println!("  {} installed skin {}", style("+").green(), skin);
    }
    for skin in &report.updated {
        println!("  {} regenerated skin {}", style("~").yellow(), skin);
    }
    for backup in &report.backups {
        println!("    previous version saved to {}", backup.display());
    }
    for file in &report.preserved {
        println!("    kept customized {}", file.display());
    }
}

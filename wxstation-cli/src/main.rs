//! wxstation CLI - Command-line interface
//!
//! This binary provides a command-line interface to the wxstation
//! configuration engine.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wxstation::logging::init_logging;

use commands::station::StationCommands;
use error::CliError;

#[derive(Parser)]
#[command(name = "wxstation")]
#[command(version = wxstation::VERSION)]
#[command(about = "Create, reconfigure and upgrade weather station configurations", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Also write log output to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the station configuration
    #[command(subcommand)]
    Station(StationCommands),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let _logging_guard = init_logging(cli.verbose, cli.log_file.as_deref())
        .map_err(|e| CliError::LoggingInit(e.to_string()))?;

    match cli.command {
        Commands::Station(command) => commands::station::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create_with_flags() {
        let cli = Cli::try_parse_from([
            "wxstation",
            "station",
            "create",
            "--config",
            "/tmp/wx/station.toml",
            "--altitude",
            "-10,meter",
            "--longitude",
            "-121.5",
            "--register",
            "n",
            "--no-prompt",
        ])
        .unwrap();

        let Commands::Station(StationCommands::Create(args)) = cli.command else {
            panic!("expected station create");
        };
        assert_eq!(args.altitude.as_deref(), Some("-10,meter"));
        assert_eq!(args.longitude.as_deref(), Some("-121.5"));
        assert!(args.no_prompt);
        assert_eq!(args.target.path(), PathBuf::from("/tmp/wx/station.toml"));
    }

    #[test]
    fn test_parse_upgrade_dry_run() {
        let cli = Cli::try_parse_from(["wxstation", "-v", "station", "upgrade", "--dry-run"])
            .unwrap();

        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Station(StationCommands::Upgrade { dry_run: true, .. })
        ));
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        assert!(Cli::try_parse_from(["wxstation", "station", "destroy"]).is_err());
    }
}

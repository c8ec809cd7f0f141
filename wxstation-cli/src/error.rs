//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use wxstation::station::StationError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// The packaged baseline configuration could not be loaded
    Baseline(String),
    /// A station operation failed
    Station(StationError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Station(StationError::UpgradeStep(_)) => {
                eprintln!();
                eprintln!("The configuration file was not modified.");
                eprintln!("Fix the value named above and run the upgrade again.");
            }
            CliError::Station(StationError::Write(_)) => {
                eprintln!();
                eprintln!("The original configuration file is unchanged.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Baseline(msg) => {
                write!(f, "Packaged default configuration is invalid: {}", msg)
            }
            CliError::Station(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Station(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StationError> for CliError {
    fn from(e: StationError) -> Self {
        CliError::Station(e)
    }
}

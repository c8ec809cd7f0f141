//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`station`] - Station configuration lifecycle (create, reconfigure, upgrade)

pub mod station;

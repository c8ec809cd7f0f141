//! wxstation - Weather station configuration engine
//!
//! This library manages the lifecycle of a weather station's configuration
//! file: creating it, changing it in place, upgrading older files across
//! schema versions and keeping the packaged report skins current.
//!
//! # High-Level API
//!
//! For most use cases, the [`station`] module provides a simplified facade:
//!
//! ```ignore
//! use wxstation::config::{Baseline, NoPrompt, StationField};
//! use wxstation::station::{StationEngine, StationInputs};
//!
//! let baseline = Baseline::load()?;
//! let engine = StationEngine::new(&baseline);
//!
//! let inputs = StationInputs::new().with(StationField::Location, "Hood River");
//! engine.create(&path, &inputs, &mut NoPrompt)?;
//! ```

pub mod config;
pub mod logging;
pub mod station;

/// Version of the wxstation library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
/// Configuration files written by this build carry the same version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


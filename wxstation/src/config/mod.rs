//! Station configuration engine.
//!
//! The configuration file is a comment-preserving TOML document
//! ([`ConfigTree`]). The modules here cover one concern each:
//!
//! - [`validate`] and [`keys`]: typed field values and where they live
//! - [`defaults`]: the packaged baseline configuration
//! - [`merge`]: layering baseline, existing file, CLI values and prompt answers
//! - [`prompt`]: asking for values the command line left open
//! - [`upgrade`] and [`skins`]: bringing older stations up to date
//! - [`writer`]: atomic persistence with backups
//!
//! # Example
//!
//! ```
//! use wxstation::config::{merge, Baseline, Layer, Overlay, StationField};
//!
//! let baseline = Baseline::load().unwrap();
//! let cli = Overlay::from_raw([(StationField::Location, "Hood River")]).unwrap();
//! let tree = merge(&baseline, &[Layer::Values(&cli)]);
//!
//! assert_eq!(StationField::Location.read(&tree).as_deref(), Some("Hood River"));
//! ```

pub mod defaults;
pub mod file;
pub mod keys;
pub mod merge;
pub mod prompt;
pub mod settings;
pub mod skins;
pub mod tree;
pub mod upgrade;
pub mod validate;
pub mod writer;

pub use defaults::{Baseline, DEFAULT_CONFIG_FILE_NAME, DEFAULT_DRIVER, DEFAULT_STATION_DIR};
pub use file::{config_file_path, load_tree, station_directory, station_root, ConfigFileError};
pub use keys::{FieldValue, StationField, StationFieldError};
pub use merge::{merge, Layer, Overlay};
pub use prompt::{
    prompt_missing, NoPrompt, PromptError, PromptRequest, ScriptedSource, ValueSource,
    MAX_PROMPT_ATTEMPTS,
};
pub use settings::{PreconditionError, StationSettings};
pub use skins::{install_skins, packaged_skins, regenerate_skins, SkinError, SkinReport};
pub use tree::{ConfigTree, KeyPath, TreeValue};
pub use upgrade::{
    analyze_config, upgrade_tree, ConfigUpgradeAnalysis, UpgradeReport, UpgradeStepError,
    SCHEMA_VERSION, UPGRADE_STEPS,
};
pub use validate::{
    Altitude, AltitudeUnit, DriverId, Latitude, Location, Longitude, RelativeRoot, StationUrl,
    UnitSystem, ValidationError, YesNo,
};
pub use writer::{stage, write_atomic, BackupPolicy, StagedWrite, WriteError, WriteOutcome};

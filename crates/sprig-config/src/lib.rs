//! Configuration system for sprig.
//!
//! Provides TOML-based configuration with:
//! - Config file layering (user config + project-local overrides)
//! - Environment overrides for connection details and secrets
//! - Defaults for every section, so an empty config is usable

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, config_dir, load_config, load_config_file, load_config_with_options,
    save_config, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;

//! Layered configuration
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. User config (`~/.config/flowvault/config.toml`)
//! 3. Project config (`./flowvault.toml`, or `--config`)
//! 4. CLI flags
//! 5. `FLOWVAULT_ACCESS_TOKEN`

mod defaults;
mod effective;
mod merge;
mod settings;

pub use defaults::BuiltinDefaults;
pub use effective::{
    ConfigError, ConfigOrigin, ConfigPaths, ConfigSource, EffectiveConfig, LoadedConfig,
    ACCESS_TOKEN_ENV, PROJECT_CONFIG_FILE,
};
pub use merge::{deep_merge, merge_layers};
pub use settings::{BatchSettings, ClientSettings, OrgSettings, Settings};

use crate::summary::ExitCode;

impl ConfigError {
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::Config
    }
}

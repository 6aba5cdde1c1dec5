//! Layered configuration
//!
//! Merges, in increasing precedence:
//! 1. Built-in defaults
//! 2. User config (~/.config/gradx/config.toml)
//! 3. Project config (./gradx.toml)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use merge::{deep_merge, merge_layers};

use std::path::PathBuf;

/// File name of the project-level config.
pub const PROJECT_CONFIG: &str = "gradx.toml";

/// Location of the user-level config, if a home directory is known.
pub fn user_config_path() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir).join("gradx").join("config.toml"));
    }
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(|home| PathBuf::from(home).join(".config").join("gradx").join("config.toml"))
}

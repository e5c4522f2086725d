use std::{env, path::PathBuf};

use super::schema::{Settings, StorageSettings};
use crate::storage::StoreConfig;

/// Configuration loading helpers.
///
/// `Settings::load` tries environment variables first (prefix `MEDIASHELF__`), then an
/// optional config file and falls back to struct defaults.
impl Settings {
    /// Load settings from environment and optional config file.
    pub fn load() -> Result<Self, ::config::ConfigError> {
        let config_path = resolve_config_path();

        let mut builder = ::config::Config::builder();

        if let Some(path) = &config_path {
            builder = builder.add_source(::config::File::from(path.as_path()).required(false));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix("MEDIASHELF")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        let settings: Settings = cfg.try_deserialize()?;
        Ok(settings)
    }

    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.library.display_separator.is_empty() && self.library.display_fields.len() > 1 {
            return Err("library.display_separator must not be empty".to_string());
        }
        // Only what is set needs checking; unset options fall back to valid defaults.
        self.storage
            .store_options()
            .apply(StoreConfig::default())
            .validate()
            .map_err(|e| format!("storage: {e}"))
    }
}

impl StorageSettings {
    /// Configured data root, or the XDG default.
    pub fn data_root(&self) -> Option<PathBuf> {
        self.data_root.clone().or_else(default_data_root)
    }
}

/// Resolve the config path from `MEDIASHELF_CONFIG_PATH` or XDG defaults.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Some(p) = env::var_os("MEDIASHELF_CONFIG_PATH") {
        let p = PathBuf::from(p);
        return Some(p);
    }
    default_config_path()
}

/// Compute the default config path under `$XDG_CONFIG_HOME/mediashelf/config.toml`
/// or `~/.config/mediashelf/config.toml` when `XDG_CONFIG_HOME` is not set.
pub fn default_config_path() -> Option<PathBuf> {
    let config_home = if let Some(xdg) = env::var_os("XDG_CONFIG_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
    };

    config_home.map(|d| d.join("mediashelf").join("config.toml"))
}

/// `$XDG_DATA_HOME/mediashelf` or `~/.local/share/mediashelf`.
pub fn default_data_root() -> Option<PathBuf> {
    let data_home = if let Some(xdg) = env::var_os("XDG_DATA_HOME") {
        Some(PathBuf::from(xdg))
    } else {
        env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("share"))
    };

    data_home.map(|d| d.join("mediashelf"))
}

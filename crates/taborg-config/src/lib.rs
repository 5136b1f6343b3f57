mod preferences;

pub use preferences::{
    MemoryPreferenceStore, OrganizeOption, PreferenceError, PreferenceStore, Preferences,
    TomlPreferenceStore,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Config files probed, in order, when no explicit path is given
const DEFAULT_CONFIG_PATHS: [&str; 2] = ["./taborg.toml", "~/.config/taborg/config.toml"];

/// Environment variables with this prefix override file values,
/// e.g. `TABORG_MODEL__TIMEOUT_SECONDS=10`.
const ENV_PREFIX: &str = "TABORG";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    #[serde(default)]
    pub preferences: PreferencesConfig,
}

/// Language model endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    pub base_url: String,
    /// Upper bound on one model call; expiry fails the run
    pub timeout_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Where the synced preferences (API key, default mode) live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesConfig {
    pub path: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_seconds: 30,
            max_tokens: None,
            temperature: None,
        }
    }
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: "~/.config/taborg/preferences.toml".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            preferences: PreferencesConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration: built-in defaults, then the config file, then
    /// `TABORG_*` environment variables.
    ///
    /// An explicit `config_path` must exist. Without one, the default
    /// locations are probed and a missing file simply means defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())
            .context("Failed to build default configuration")?;
        let mut builder = config::Config::builder().add_source(defaults);

        let file = match config_path {
            Some(path) => {
                let expanded = expand_path(path);
                if !expanded.exists() {
                    anyhow::bail!("Config file not found: {}", expanded.display());
                }
                Some(expanded)
            }
            None => find_default_config(),
        };

        if let Some(path) = &file {
            debug!("Loading config from {}", path.display());
            builder = builder.add_source(
                config::File::from(path.as_path()).format(config::FileFormat::Toml),
            );
        } else {
            debug!("No config file found, using defaults");
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.model.model.trim().is_empty() {
            anyhow::bail!("model.model must not be empty");
        }
        if self.model.timeout_seconds == 0 {
            anyhow::bail!("model.timeout_seconds must be greater than zero");
        }
        Ok(())
    }

    pub fn load_with_overrides(
        config_path: Option<&str>,
        model_override: Option<String>,
        timeout_override: Option<u64>,
    ) -> Result<Self> {
        let mut config = Self::load(config_path)?;

        if let Some(model) = model_override {
            config.model.model = model;
        }
        if let Some(timeout) = timeout_override {
            config.model.timeout_seconds = timeout;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    /// Preferences file path with `~` expanded
    pub fn preferences_path(&self) -> PathBuf {
        expand_path(&self.preferences.path)
    }

    pub fn model_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.model.timeout_seconds)
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn find_default_config() -> Option<PathBuf> {
    DEFAULT_CONFIG_PATHS
        .iter()
        .map(|path| expand_path(path))
        .find(|path| path.exists())
}

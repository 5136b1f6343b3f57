//! Synced user preferences: the Gemini API key and the default organize mode.
//!
//! Keys are stored under the same names the options page uses
//! (`geminiApiKey`, `organizeOption`) so a preferences file can be shared
//! with the extension's sync storage export.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("API key must not be empty")]
    EmptyApiKey,
    #[error("unknown organize option '{0}' (expected 'new' or 'all')")]
    InvalidOption(String),
    #[error("preferences I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("preferences file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("could not serialize preferences: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Which tabs a keyboard-shortcut run reorganizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizeOption {
    /// Only tabs that are not in a group yet
    #[default]
    New,
    /// Dissolve every group and regroup the whole window
    All,
}

impl FromStr for OrganizeOption {
    type Err = PreferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(OrganizeOption::New),
            "all" => Ok(OrganizeOption::All),
            other => Err(PreferenceError::InvalidOption(other.to_string())),
        }
    }
}

impl fmt::Display for OrganizeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrganizeOption::New => write!(f, "new"),
            OrganizeOption::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    #[serde(default)]
    pub organize_option: OrganizeOption,
}

impl Preferences {
    /// The configured key, if any non-blank one is stored
    pub fn api_key(&self) -> Option<&str> {
        self.gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Storage for [`Preferences`]. Implementations only need `load`/`save`;
/// the setters validate input and do a read-modify-write.
pub trait PreferenceStore: Send + Sync {
    fn load(&self) -> Result<Preferences, PreferenceError>;

    fn save(&self, preferences: &Preferences) -> Result<(), PreferenceError>;

    /// Store a new API key. Surrounding whitespace is dropped and blank
    /// keys are rejected without touching the stored value.
    fn set_api_key(&self, key: &str) -> Result<(), PreferenceError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(PreferenceError::EmptyApiKey);
        }
        let mut preferences = self.load()?;
        preferences.gemini_api_key = Some(key.to_string());
        self.save(&preferences)
    }

    fn set_organize_option(&self, option: OrganizeOption) -> Result<(), PreferenceError> {
        let mut preferences = self.load()?;
        preferences.organize_option = option;
        self.save(&preferences)
    }
}

/// Preferences persisted to a TOML file
#[derive(Debug, Clone)]
pub struct TomlPreferenceStore {
    path: PathBuf,
}

impl TomlPreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for TomlPreferenceStore {
    fn load(&self) -> Result<Preferences, PreferenceError> {
        if !self.path.exists() {
            debug!("No preferences at {}, using defaults", self.path.display());
            return Ok(Preferences::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&content)?)
    }

    fn save(&self, preferences: &Preferences) -> Result<(), PreferenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, toml::to_string_pretty(preferences)?)?;
        debug!("Saved preferences to {}", self.path.display());
        Ok(())
    }
}

/// In-process preferences, for tests and embedding
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    inner: Mutex<Preferences>,
}

impl MemoryPreferenceStore {
    pub fn new(preferences: Preferences) -> Self {
        Self {
            inner: Mutex::new(preferences),
        }
    }

    pub fn with_api_key(key: &str) -> Self {
        Self::new(Preferences {
            gemini_api_key: Some(key.to_string()),
            organize_option: OrganizeOption::New,
        })
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn load(&self) -> Result<Preferences, PreferenceError> {
        Ok(self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, preferences: &Preferences) -> Result<(), PreferenceError> {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner()) = preferences.clone();
        Ok(())
    }
}

//! User settings, stored as TOML in the platform config directory.

use crate::face::RecognitionModel;
use directories_next::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Distance at or below which a candidate counts as the reference face.
pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 0.008;
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 100;

const SETTINGS_FILE: &str = "settings.toml";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("no config directory available on this platform")]
    NoConfigDir,
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings parse: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("settings encode: {0}")]
    Encode(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the DeepFace-compatible service.
    pub service_url: String,
    pub model: RecognitionModel,
    pub detector_backend: String,
    pub distance_threshold: f32,
    /// Per-request timeout; 0 disables it.
    pub request_timeout_secs: u64,
    pub thumbnail_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:5005".to_string(),
            model: RecognitionModel::Facenet,
            detector_backend: "opencv".to_string(),
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
            request_timeout_secs: 120,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
        }
    }
}

impl Settings {
    /// Settings from the user config file plus `THIEF_FINDER_*` overrides.
    /// A missing or broken file falls back to defaults.
    pub fn load() -> Self {
        let mut settings = match settings_path() {
            Some(path) if path.exists() => match Self::load_from(&path) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("ignoring {}: {e}", path.display());
                    Self::default()
                }
            },
            _ => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        settings
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let raw = fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Write to the user config file and return its path.
    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("THIEF_FINDER_SERVICE_URL") {
            self.service_url = url;
        }
        if let Some(name) = var("THIEF_FINDER_MODEL") {
            match RecognitionModel::from_name(&name) {
                Some(model) => self.model = model,
                None => tracing::warn!("unknown model in THIEF_FINDER_MODEL: {name}"),
            }
        }
        if let Some(threshold) = var("THIEF_FINDER_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.distance_threshold = threshold;
        }
    }
}

pub fn settings_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "ThiefFinder", "ThiefFinder")
        .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
}

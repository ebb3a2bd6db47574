use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::StreamConfig;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Returns the path to the settings file: `~/.config/speaker-stream/settings.json`
pub fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("speaker-stream");
    path.push("settings.json");
    path
}

/// Persisted settings.
///
/// Serialized as JSON to the platform config directory.
/// Fields use `#[serde(default)]` so that adding new settings
/// won't break existing config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    // Stream
    pub stream: StreamConfig,

    // Test signal
    pub frequency: f32,
    pub volume: f32,
    pub lissajous_a: f32,
    pub lissajous_b: f32,
    pub lissajous_delta: f32,

    /// How long the binary plays before stopping
    pub duration_secs: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            stream: StreamConfig::default(),

            frequency: 80.0,
            volume: 0.8,
            lissajous_a: 3.0,
            lissajous_b: 2.0,
            lissajous_delta: std::f32::consts::FRAC_PI_2,

            duration_secs: 5,
        }
    }
}

impl StreamSettings {
    /// Load settings from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        let path = settings_path();
        match Self::load_from(&path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(SettingsError::Io(e)) => {
                log::info!("No settings file found ({}), using defaults", e);
                Self::default()
            }
            Err(e) => {
                log::warn!("Failed to parse settings ({}), using defaults", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save settings to disk as pretty JSON, logging any failure.
    pub fn save(&self) {
        if let Err(e) = self.save_to(&settings_path()) {
            log::warn!("Failed to save settings: {}", e);
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::Settings;

/// Key the settings blob is stored under inside the preference file
pub const SETTINGS_KEY: &str = "AppSettings";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Could not determine config directory")]
    NoConfigDir,
    #[error("Preference file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON preference file holding the settings blob next to any other keys
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<config dir>/maybe-f2/preferences.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("maybe-f2").join("preferences.json"))
    }

    pub fn open_default() -> Result<Self, SettingsError> {
        Self::default_path()
            .map(Self::new)
            .ok_or(SettingsError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_preferences(&self) -> Result<Map<String, Value>, SettingsError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let json = fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Value>(&json)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    /// Stored settings, or the defaults when the file or blob is missing or
    /// cannot be decoded.
    pub fn load_settings(&self) -> Settings {
        let blob = match self.read_preferences() {
            Ok(mut prefs) => prefs.remove(SETTINGS_KEY),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable preference file");
                None
            }
        };

        let Some(blob) = blob else {
            return Settings::default();
        };

        serde_json::from_value(blob).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Stored settings could not be decoded, using defaults");
            Settings::default()
        })
    }

    /// Write the settings blob, keeping any other keys in the file
    pub fn save_settings(&self, settings: &Settings) -> Result<(), SettingsError> {
        let mut prefs = self.read_preferences().unwrap_or_default();
        prefs.insert(SETTINGS_KEY.to_string(), serde_json::to_value(settings)?);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.atomic_write(&Value::Object(prefs))?;

        tracing::debug!(path = %self.path.display(), "Saved settings");
        Ok(())
    }

    /// Write to a sibling temp file, sync, then rename over the target
    fn atomic_write(&self, data: &Value) -> Result<(), SettingsError> {
        let temp_path = self.path.with_extension("tmp");

        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, data)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

use std::path::{Path, PathBuf};

use anyhow::Context;
use directories::ProjectDirs;
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::settings::Settings;

const SETTINGS_FILE: &str = "settings.toml";

/// Loads and saves [`Settings`] at a fixed path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsManager {
    path: PathBuf,
}

impl SettingsManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Manager for `settings.toml` in the platform config directory
    pub fn from_project_dirs() -> Result<Self, SettingsError> {
        let proj_dirs = ProjectDirs::from("com", "flashy", "flashy").ok_or_else(|| {
            error!("Failed to determine project directories - this usually indicates an unsupported OS or missing home directory");
            SettingsError::ProjectDirectoriesUnavailable
        })?;

        Ok(Self::new(proj_dirs.config_dir().join(SETTINGS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the settings file. A missing file yields the defaults.
    #[instrument(skip(self), fields(path = %self.path.display()), level = "debug")]
    pub async fn load(&self) -> Result<Settings, SettingsError> {
        if tokio::fs::metadata(&self.path).await.is_err() {
            debug!("Settings file not found, using defaults");
            return Ok(Settings::default());
        }

        let content = tokio::fs::read(&self.path)
            .await
            .context("Failed to read settings.toml file")
            .map_err(|e| {
                error!("Failed to read settings file {}: {}", self.path.display(), e);
                SettingsError::FileReadFailed {
                    path: self.path.clone(),
                    source: e,
                }
            })?;

        let settings: Settings = toml::from_slice(&content)
            .context("Failed to parse settings.toml file")
            .map_err(|e| {
                error!(
                    "Failed to parse settings file {}: {}",
                    self.path.display(),
                    e
                );
                SettingsError::ParsingFailed {
                    path: self.path.clone(),
                    source: e,
                }
            })?;

        debug!(
            "Loaded settings from {} (storage: {})",
            self.path.display(),
            settings.storage
        );
        Ok(settings)
    }

    #[instrument(skip(self, settings), fields(path = %self.path.display()), level = "debug")]
    pub async fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(dir) = self.path.parent()
            && tokio::fs::metadata(dir).await.is_err()
        {
            info!("Settings directory doesn't exist, creating: {}", dir.display());
            tokio::fs::create_dir_all(dir)
                .await
                .context("Failed to create settings directory")
                .map_err(|e| {
                    error!(
                        "Failed to create settings directory {}: {}",
                        dir.display(),
                        e
                    );
                    SettingsError::DirectoryCreationFailed {
                        path: dir.to_path_buf(),
                        source: e,
                    }
                })?;
        }

        let toml = toml::to_string_pretty(settings)
            .context("Failed to serialize settings to TOML")
            .map_err(|e| {
                error!("Failed to serialize settings: {}", e);
                SettingsError::SerializationFailed { source: e }
            })?;

        tokio::fs::write(&self.path, toml)
            .await
            .context("Failed to write settings.toml file")
            .map_err(|e| {
                error!(
                    "Failed to write settings file {}: {}",
                    self.path.display(),
                    e
                );
                SettingsError::FileWriteFailed {
                    path: self.path.clone(),
                    source: e,
                }
            })?;

        info!("Saved settings at {}", self.path.display());
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(
        "Project directories are unavailable - this usually indicates an unsupported OS or missing home directory"
    )]
    ProjectDirectoriesUnavailable,

    #[error("Failed to create directory '{path}': {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to read settings file '{path}': {source}")]
    FileReadFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to write settings file '{path}': {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to parse settings file '{path}': {source}")]
    ParsingFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to serialize settings: {source}")]
    SerializationFailed {
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::StorageBackend;
    use std::fs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_missing_file_returns_defaults() {
        let temp_dir = tempdir().unwrap();
        let manager = SettingsManager::new(temp_dir.path().join("settings.toml"));

        let settings = manager.load().await.unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = tempdir().unwrap();
        let manager = SettingsManager::new(temp_dir.path().join("nested").join("settings.toml"));

        let settings = Settings {
            api_url: Some("https://flashy.example.com/api/v1".to_string()),
            storage: StorageBackend::Memory,
            log_level: "debug".to_string(),
            ..Settings::default()
        };
        manager.save(&settings).await.unwrap();

        assert!(manager.path().exists());
        assert_eq!(manager.load().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_load_invalid_toml() {
        let temp_dir = tempdir().unwrap();
        let settings_file = temp_dir.path().join("settings.toml");
        fs::write(&settings_file, "invalid toml content {{{").unwrap();

        let manager = SettingsManager::new(&settings_file);
        let result = manager.load().await;

        if let Err(SettingsError::ParsingFailed { path, .. }) = result {
            assert_eq!(path, settings_file);
        } else {
            panic!("Expected ParsingFailed error");
        }
    }
}

//! JSON Configuration Management
//!
//! Handles reading and writing the application configuration file.
//! Environment overrides are applied on top of the file contents when the
//! effective configuration is requested and are never written back.

use std::fs;
use std::path::{Path, PathBuf};

use crate::models::settings::AppConfig;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{config_path, database_path, ensure_dir, knowledge_dir};

/// Configuration service for managing app settings
#[derive(Debug)]
pub struct ConfigService {
    config_path: PathBuf,
    config: AppConfig,
}

impl ConfigService {
    /// Create a new config service at ~/.counsel-desk/config.json
    pub fn new() -> AppResult<Self> {
        Self::from_path(config_path()?)
    }

    /// Load the config at `path`, creating it with defaults when absent
    pub fn from_path(config_path: PathBuf) -> AppResult<Self> {
        if let Some(parent) = config_path.parent() {
            ensure_dir(parent)?;
        }

        let config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            let default_config = AppConfig::default();
            Self::save_to_file(&config_path, &default_config)?;
            tracing::info!(path = %config_path.display(), "wrote default configuration");
            default_config
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a file
    fn load_from_file(path: &Path) -> AppResult<AppConfig> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Save configuration to a file with pretty formatting
    fn save_to_file(path: &Path, config: &AppConfig) -> AppResult<()> {
        config.validate().map_err(AppError::validation)?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get the configuration as stored on disk
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// File configuration with `COUNSEL_*` environment overrides applied
    pub fn effective_config(&self) -> AppResult<AppConfig> {
        let mut config = self.config.clone();
        config.apply_env_overrides();
        config.validate().map_err(AppError::validation)?;
        Ok(config)
    }

    /// Save the current configuration to disk
    pub fn save(&self) -> AppResult<()> {
        Self::save_to_file(&self.config_path, &self.config)
    }

    /// Reload configuration from disk
    pub fn reload(&mut self) -> AppResult<()> {
        self.config = Self::load_from_file(&self.config_path)?;
        Ok(())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Check if the config service is healthy
    pub fn is_healthy(&self) -> bool {
        self.config_path.exists() && self.config.validate().is_ok()
    }
}

/// Database file named by the config, or the default location
pub fn resolve_database_path(config: &AppConfig) -> AppResult<PathBuf> {
    match &config.storage.database_path {
        Some(path) => Ok(path.clone()),
        None => database_path(),
    }
}

/// Knowledge directory named by the config, or the default location
pub fn resolve_knowledge_dir(config: &AppConfig) -> AppResult<PathBuf> {
    match &config.storage.knowledge_dir {
        Some(path) => Ok(path.clone()),
        None => knowledge_dir(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_config_file() -> (NamedTempFile, PathBuf) {
        let mut file = NamedTempFile::new().unwrap();
        let config = AppConfig::default();
        let content = serde_json::to_string_pretty(&config).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let path = file.path().to_path_buf();
        (file, path)
    }

    #[test]
    fn test_load_config_from_file() {
        let (_file, path) = create_test_config_file();
        let config = ConfigService::load_from_file(&path).unwrap();
        assert_eq!(config.retrieval.max_results, 6);
    }

    #[test]
    fn test_from_path_creates_defaults() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("sub").join("config.json");

        let service = ConfigService::from_path(path.clone()).unwrap();

        assert!(path.exists());
        assert!(service.is_healthy());
        assert_eq!(service.get_config().server.bind, "127.0.0.1:8787");
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"retrieval": {"min_score": 4.0, "max_results": 6, "context_radius": 1}}"#)
            .unwrap();
        let err = ConfigService::from_path(file.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_resolve_paths_prefer_config() {
        let mut config = AppConfig::default();
        config.storage.database_path = Some(PathBuf::from("/srv/counsel/data.db"));
        assert_eq!(
            resolve_database_path(&config).unwrap(),
            PathBuf::from("/srv/counsel/data.db")
        );
        assert!(resolve_knowledge_dir(&config)
            .unwrap()
            .ends_with("knowledge"));
    }
}

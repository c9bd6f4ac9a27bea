//! Cross-Platform Path Utilities
//!
//! Functions for resolving application directories across platforms.
//! Everything lives under ~/.counsel-desk/.

use std::path::{Path, PathBuf};

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the Counsel Desk directory (~/.counsel-desk/)
pub fn counsel_desk_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".counsel-desk"))
}

/// Get the config file path (~/.counsel-desk/config.json)
pub fn config_path() -> AppResult<PathBuf> {
    Ok(counsel_desk_dir()?.join("config.json"))
}

/// Get the database file path (~/.counsel-desk/data.db)
pub fn database_path() -> AppResult<PathBuf> {
    Ok(counsel_desk_dir()?.join("data.db"))
}

/// Get the knowledge directory (~/.counsel-desk/knowledge/)
pub fn knowledge_dir() -> AppResult<PathBuf> {
    Ok(counsel_desk_dir()?.join("knowledge"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the Counsel Desk directory, creating if it doesn't exist
pub fn ensure_counsel_desk_dir() -> AppResult<PathBuf> {
    let path = counsel_desk_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}

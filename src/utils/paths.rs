//! Cross-Platform Path Utilities
//!
//! Functions for resolving application directories across platforms.
//! Everything lives under ~/.cellflow/.

use std::path::PathBuf;

use crate::utils::error::{AppError, AppResult};

/// Get the user's home directory
pub fn home_dir() -> AppResult<PathBuf> {
    dirs::home_dir().ok_or_else(|| AppError::config("Could not determine home directory"))
}

/// Get the Cellflow directory (~/.cellflow/)
pub fn cellflow_dir() -> AppResult<PathBuf> {
    Ok(home_dir()?.join(".cellflow"))
}

/// Get the database file path (~/.cellflow/data.db)
pub fn database_path() -> AppResult<PathBuf> {
    Ok(cellflow_dir()?.join("data.db"))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &PathBuf) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Get the Cellflow directory, creating if it doesn't exist
pub fn ensure_cellflow_dir() -> AppResult<PathBuf> {
    let path = cellflow_dir()?;
    ensure_dir(&path)?;
    Ok(path)
}

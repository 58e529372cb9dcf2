//! Path utilities for rewind data directories

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Global storage for custom data directory path
static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Initialize the data directory with an optional custom path.
/// Must be called early in main() before any other path functions are used.
/// If custom_path is None, uses the default ~/.rewind location.
///
/// Returns the directory in effect; the first call wins.
pub fn init_data_dir(custom_path: Option<PathBuf>) -> &'static Path {
    let path = custom_path.unwrap_or_else(default_data_dir);
    let active = DATA_DIR.get_or_init(|| path.clone());
    if *active != path {
        tracing::debug!(
            requested = %path.display(),
            active = %active.display(),
            "Data directory already initialized"
        );
    }
    active
}

/// Get the default data directory path (~/.rewind)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".rewind"))
        .unwrap_or_else(|| PathBuf::from(".rewind"))
}

/// Get the base data directory.
/// Returns the custom path if set via init_data_dir(), otherwise ~/.rewind
pub fn data_dir() -> PathBuf {
    DATA_DIR.get().cloned().unwrap_or_else(default_data_dir)
}

/// Get the logs directory (~/.rewind/logs)
pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Get the log file path (~/.rewind/logs/rewind.log)
pub fn log_file_path() -> PathBuf {
    logs_dir().join("rewind.log")
}

/// Get the config file path (~/.rewind/config.toml)
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

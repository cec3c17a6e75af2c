//! Path management for relay configuration and logs.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/asa-relay/         # Config directory
//! ├── settings.toml            # Relay settings (API key, prompt, display rules)
//! ├── error.log                # Operator-visible relay failures
//! ├── client_state.json        # File-backed widget storage (CLI/testing)
//! └── logs/                    # Rolling tracing logs
//!     └── asa-relay.log.YYYY-MM-DD
//! ```

use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "asa-relay";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Resolves every file the relay reads or writes.
///
/// With a base path all files live directly under it, which is what tests
/// and the `--config-dir` flag use.
#[derive(Debug, Clone, Default)]
pub struct AsaPaths {
    base: Option<PathBuf>,
}

impl AsaPaths {
    pub fn new(base: Option<&Path>) -> Self {
        Self {
            base: base.map(Path::to_path_buf),
        }
    }

    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        if let Some(base) = &self.base {
            return Ok(base.clone());
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME))
            .ok_or(PathError::ConfigDirNotFound)
    }

    pub fn settings_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("settings.toml"))
    }

    pub fn error_log_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("error.log"))
    }

    pub fn client_state_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("client_state.json"))
    }

    pub fn logs_dir(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join("logs"))
    }
}

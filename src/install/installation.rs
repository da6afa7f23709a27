//! Named tool installations

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::download::{LATEST, Platform};
use super::error::InstallerError;

pub const DEFAULT_UPDATE_INTERVAL_HOURS: u64 = 24;

fn default_version() -> String {
    LATEST.to_string()
}

fn default_update_interval() -> u64 {
    DEFAULT_UPDATE_INTERVAL_HOURS
}

/// One configured copy of the CLI: where it lives and which version it tracks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInstallation {
    pub name: String,
    pub home: PathBuf,
    /// Explicit tag, `latest`, or empty
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_update_interval")]
    pub update_interval_hours: u64,
}

impl ToolInstallation {
    pub fn new(name: impl Into<String>, home: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            home: home.into(),
            version: default_version(),
            update_interval_hours: DEFAULT_UPDATE_INTERVAL_HOURS,
        }
    }

    pub fn executable_path(&self, platform: Platform) -> PathBuf {
        self.home.join(platform.executable_name())
    }

    /// Absolute path of the installed executable; it must exist.
    pub fn resolve_executable(&self, platform: Platform) -> Result<PathBuf, InstallerError> {
        resolve_executable(&self.home, platform)
    }
}

pub fn resolve_executable(home: &Path, platform: Platform) -> Result<PathBuf, InstallerError> {
    let executable = home.join(platform.executable_name());
    if !executable.is_file() {
        return Err(InstallerError::ExecutableNotFound { path: executable });
    }
    std::path::absolute(&executable)
        .map_err(|_| InstallerError::ExecutableNotFound { path: executable })
}

//! Last step of an install: make the CLI runnable and record provenance
//!
//! The timestamp marker is written last. If anything before it fails, the
//! next run finds no fresh marker and installs again from scratch.

use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::detection::{INSTALLED_FROM_FILE, TIMESTAMP_FILE};
use super::download::Platform;

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("could not find executable <{}> after extraction", path.display())]
    ExecutableMissing { path: PathBuf },
    #[error("could not set executable flag for the file: {}: {source}", path.display())]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Set mode 0755 on the CLI wrapper (no-op for Windows targets)
pub fn mark_executable(home: &Path, platform: Platform) -> Result<PathBuf, FinalizeError> {
    let executable = home.join(platform.executable_name());
    if !executable.is_file() {
        return Err(FinalizeError::ExecutableMissing { path: executable });
    }
    if platform.is_windows() {
        return Ok(executable);
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let perm_err = |source| FinalizeError::Permissions {
            path: executable.clone(),
            source,
        };
        let mut perms = fs::metadata(&executable).map_err(perm_err)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&executable, perms).map_err(perm_err)?;
        debug!("Marked {} executable", executable.display());
    }

    Ok(executable)
}

/// Write `.installedFrom` then `.timestamp`, both UTF-8 text
pub fn write_records(home: &Path, source_url: &str, now_millis: i64) -> Result<(), FinalizeError> {
    write_text(&home.join(INSTALLED_FROM_FILE), source_url)?;
    write_text(&home.join(TIMESTAMP_FILE), &now_millis.to_string())
}

fn write_text(path: &Path, content: &str) -> Result<(), FinalizeError> {
    fs::write(path, content.as_bytes()).map_err(|source| FinalizeError::Write {
        path: path.to_path_buf(),
        source,
    })
}

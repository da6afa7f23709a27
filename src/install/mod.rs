//! AST CLI installation library
//!
//! Installs the Checkmarx AST CLI into a tool home and keeps it fresh:
//!
//! 1. read the `.timestamp` marker and decide fresh vs. stale
//! 2. if stale, resolve the release, download the artifact (via proxy if set)
//! 3. unpack it into the home
//! 4. mark the wrapper executable, write `.installedFrom` and `.timestamp`
//!
//! The installer works on the filesystem of the machine it runs on and holds no
//! global state; callers pass the home, platform, proxy and version explicitly.
//! There is no locking: two installers targeting the same home concurrently
//! (e.g. agents sharing a network filesystem) race with each other.

mod detection;
pub mod download;
mod error;
mod finalize;
mod installation;

pub use detection::{
    INSTALLED_FROM_FILE, InstallationState, MarkerState, TIMESTAMP_FILE, check_installation_state,
    read_marker,
};
pub use error::InstallerError;
pub use finalize::{FinalizeError, mark_executable, write_records};
pub use installation::{DEFAULT_UPDATE_INTERVAL_HOURS, ToolInstallation, resolve_executable};

use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::config::Config;
use download::{DownloadResolver, Platform, ProxyConfig};

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Runs the check-marker → fetch → extract → finalize sequence
#[derive(Debug, Clone)]
pub struct Installer {
    resolver: DownloadResolver,
    clock: fn() -> i64,
}

impl Installer {
    pub fn new(resolver: DownloadResolver) -> Self {
        Self {
            resolver,
            clock: now_millis,
        }
    }

    /// Replace the wall clock (epoch millis)
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Freshness of the installation under `home`
    pub fn installation_state(
        &self,
        home: &Path,
        update_interval_hours: u64,
    ) -> Result<InstallationState, InstallerError> {
        let marker = read_marker(home).map_err(|source| InstallerError::Marker {
            home: home.to_path_buf(),
            source,
        })?;
        Ok(check_installation_state(
            marker,
            (self.clock)(),
            update_interval_hours,
        ))
    }

    /// Install into `home` unless the existing installation is fresh.
    ///
    /// Returns the home directory. Nothing is recorded as installed until the
    /// executable is in place and marked runnable.
    pub async fn install(
        &self,
        home: &Path,
        platform: Platform,
        proxy: Option<&ProxyConfig>,
        version: &str,
        update_interval_hours: u64,
    ) -> Result<PathBuf, InstallerError> {
        let state = self.installation_state(home, update_interval_hours)?;
        if state.is_up_to_date() {
            info!("Checkmarx installation at {} is UP-TO-DATE", home.display());
            return Ok(home.to_path_buf());
        }
        info!(
            "Installing Checkmarx AST CLI (version '{}') into {} [{:?}]",
            version.trim(),
            home.display(),
            state
        );

        if let Some(proxy) = proxy {
            info!("Installer using proxy: {}", proxy);
        }
        let client = download::http_client(proxy)?;
        let artifact = self
            .resolver
            .resolve_artifact(&client, version, platform)
            .await?;

        std::fs::create_dir_all(home).map_err(|source| InstallerError::CreateHome {
            path: home.to_path_buf(),
            source,
        })?;

        let downloaded = download::download_to_temp(&client, &artifact.url, home).await?;
        download::extract_artifact(
            downloaded.path(),
            &artifact.file_name,
            home,
            platform.executable_name(),
        )
        .await?;
        if let Err(e) = downloaded.close() {
            warn!("Could not remove temporary download: {}", e);
        }

        let executable = mark_executable(home, platform)?;
        write_records(home, artifact.url.as_str(), (self.clock)())?;

        info!(
            "Installed AST CLI {} at {}",
            artifact.tag,
            executable.display()
        );
        Ok(home.to_path_buf())
    }
}

/// Ensure `installation` is present and fresh, returning its executable.
///
/// This is the entry point used by the command line: it detects the platform,
/// resolves the proxy from `config` (falling back to `HTTP_PROXY`) and runs
/// the installer.
pub async fn ensure_installed(
    installation: &ToolInstallation,
    config: &Config,
) -> Result<PathBuf, InstallerError> {
    let platform = Platform::current()?;
    let proxy = ProxyConfig::resolve(config.proxy.as_deref())?;

    let resolver = DownloadResolver::new(config.endpoints.clone())
        .with_version_file(config.version_file.clone());
    let installer = Installer::new(resolver);

    let result = installer
        .install(
            &installation.home,
            platform,
            proxy.as_ref(),
            &installation.version,
            installation.update_interval_hours,
        )
        .await;
    if let Err(e) = &result {
        warn!("Checkmarx AST CLI could not be installed: {}", e);
    }
    result?;

    installation.resolve_executable(platform)
}

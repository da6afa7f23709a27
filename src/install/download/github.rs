//! Release resolution against the GitHub releases API

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use super::core::{FetchError, get_json};
use super::platform::Platform;

/// Prefix of every release artifact name
pub const TOOL_FILE_NAME: &str = "ast-cli";

/// Version installed when nothing else pins one
pub const DEFAULT_CLI_VERSION: &str = "2.3.9";

/// Sentinel meaning "whatever version is pinned locally"
pub const LATEST: &str = "latest";

/// Name of the pinned-version file searched for upward from the working directory
pub const VERSION_FILE_NAME: &str = "cli.version";

pub const DEFAULT_API_BASE: &str = "https://api.github.com/repos/Checkmarx/ast-cli";
pub const DEFAULT_DOWNLOAD_BASE: &str = "https://github.com/Checkmarx/ast-cli/releases/download";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("release tag name must not be empty")]
    EmptyTag,
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("could not read version file {}: {source}", path.display())]
    VersionFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where release metadata and artifacts are fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseEndpoints {
    /// Repository API root; `/releases/tags/<version>` is appended
    pub api_base: String,
    /// Download root; `/<tag>/<file>` is appended
    pub download_base: String,
}

impl Default for ReleaseEndpoints {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            download_base: DEFAULT_DOWNLOAD_BASE.to_string(),
        }
    }
}

impl ReleaseEndpoints {
    pub fn release_url(&self, version: &str) -> Result<Url, ResolveError> {
        parse_url(format!(
            "{}/releases/tags/{}",
            self.api_base.trim_end_matches('/'),
            version
        ))
    }

    pub fn download_url(&self, tag: &str, file_name: &str) -> Result<Url, ResolveError> {
        parse_url(format!(
            "{}/{}/{}",
            self.download_base.trim_end_matches('/'),
            tag,
            file_name
        ))
    }
}

fn parse_url(url: String) -> Result<Url, ResolveError> {
    Url::parse(&url).map_err(|source| ResolveError::InvalidUrl { url, source })
}

/// GitHub release metadata from API
#[derive(Deserialize, Debug)]
pub struct GitHubRelease {
    pub tag_name: String,
}

/// A release pinned down to the exact artifact to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub tag: String,
    pub file_name: String,
    pub url: Url,
}

/// `<tool>_<tag>_<packaging suffix>`
pub fn build_file_name(tag_name: &str, platform: Platform) -> Result<String, ResolveError> {
    if tag_name.trim().is_empty() {
        return Err(ResolveError::EmptyTag);
    }
    Ok(format!(
        "{}_{}_{}",
        TOOL_FILE_NAME,
        tag_name,
        platform.package_extension()
    ))
}

/// First line of a version file, trimmed; `None` when blank
pub fn read_pinned_version(path: &Path) -> Result<Option<String>, ResolveError> {
    let content = std::fs::read_to_string(path).map_err(|source| ResolveError::VersionFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(content
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string))
}

/// Walk from `start` through its ancestors looking for [`VERSION_FILE_NAME`]
pub fn find_version_file(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(VERSION_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Turns a version specifier into a concrete release artifact
#[derive(Debug, Clone)]
pub struct DownloadResolver {
    endpoints: ReleaseEndpoints,
    version_file: Option<PathBuf>,
    search_root: Option<PathBuf>,
}

impl DownloadResolver {
    pub fn new(endpoints: ReleaseEndpoints) -> Self {
        Self {
            endpoints,
            version_file: None,
            search_root: None,
        }
    }

    /// Use this file instead of searching for `cli.version`
    pub fn with_version_file(mut self, path: Option<PathBuf>) -> Self {
        self.version_file = path;
        self
    }

    /// Start the `cli.version` search here instead of the working directory
    pub fn with_search_root(mut self, dir: PathBuf) -> Self {
        self.search_root = Some(dir);
        self
    }

    pub fn endpoints(&self) -> &ReleaseEndpoints {
        &self.endpoints
    }

    /// Explicit tags pass through; `latest` and empty read the pinned version.
    pub fn resolve_version(&self, spec: &str) -> Result<String, ResolveError> {
        let spec = spec.trim();
        if !spec.is_empty() && spec != LATEST {
            return Ok(spec.to_string());
        }

        let version_file = match &self.version_file {
            Some(path) => Some(path.clone()),
            None => {
                let root = match &self.search_root {
                    Some(root) => root.clone(),
                    None => std::env::current_dir().map_err(|source| ResolveError::VersionFile {
                        path: PathBuf::from("."),
                        source,
                    })?,
                };
                find_version_file(&root)
            }
        };

        if let Some(path) = version_file {
            if let Some(version) = read_pinned_version(&path)? {
                debug!("Using version {} pinned in {}", version, path.display());
                return Ok(version);
            }
            debug!("{} is empty, using default version", path.display());
        }

        Ok(DEFAULT_CLI_VERSION.to_string())
    }

    /// Fetch release metadata for a concrete version
    pub async fn get_release(
        &self,
        client: &reqwest::Client,
        version: &str,
    ) -> Result<GitHubRelease, ResolveError> {
        let url = self.endpoints.release_url(version)?;
        Ok(get_json(client, &url).await?)
    }

    pub async fn resolve_artifact(
        &self,
        client: &reqwest::Client,
        spec: &str,
        platform: Platform,
    ) -> Result<ResolvedArtifact, ResolveError> {
        let version = self.resolve_version(spec)?;
        let release = self.get_release(client, &version).await?;
        let file_name = build_file_name(&release.tag_name, platform)?;
        let url = self.endpoints.download_url(&release.tag_name, &file_name)?;

        info!("Resolved version '{}' to release {}", version, release.tag_name);
        Ok(ResolvedArtifact {
            tag: release.tag_name,
            file_name,
            url,
        })
    }

    pub async fn resolve_download_url(
        &self,
        client: &reqwest::Client,
        spec: &str,
        platform: Platform,
    ) -> Result<Url, ResolveError> {
        Ok(self.resolve_artifact(client, spec, platform).await?.url)
    }
}

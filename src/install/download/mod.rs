//! GitHub release download and package extraction
//!
//! This module resolves a version specifier to a concrete AST CLI release,
//! downloads the platform artifact (through a proxy if one is configured) and
//! unpacks it into an installation home.
//!
//! ## Module Organization
//!
//! - `platform` - Platform detection and artifact naming
//! - `github` - Version resolution and release metadata lookup
//! - `proxy` - Proxy validation and HTTP client construction
//! - `core` - HTTP fetch helpers and streaming download
//! - `extract` - tar.gz / tar / zip unpacking, raw binary placement

mod core;
mod extract;
mod github;
mod platform;
mod proxy;

pub use core::{FetchError, download_to_temp, get_json};
pub use extract::{ArtifactKind, ExtractError, extract_artifact};
pub use github::{
    DEFAULT_API_BASE, DEFAULT_CLI_VERSION, DEFAULT_DOWNLOAD_BASE, DownloadResolver, GitHubRelease,
    LATEST, ReleaseEndpoints, ResolveError, ResolvedArtifact, TOOL_FILE_NAME, VERSION_FILE_NAME,
    build_file_name, find_version_file, read_pinned_version,
};
pub use platform::{OS_NAME_KEY, Platform, PlatformError};
pub use proxy::{
    CONNECT_TIMEOUT, ClientError, PROXY_ENV_VARS, ProxyConfig, ProxyError, READ_TIMEOUT,
    http_client,
};

//! Scan configuration resolution and CLI argument assembly

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ScanDefaults;

pub const CLIENT_ID_ENV: &str = "CX_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "CX_CLIENT_SECRET";
pub const GIT_BRANCH_ENV: &str = "GIT_BRANCH";
pub const CVS_BRANCH_ENV: &str = "CVS_BRANCH";
pub const SVN_REVISION_ENV: &str = "SVN_REVISION";

/// Value passed to `--agent`
pub const AGENT_NAME: &str = "cxtool";

const MASK: &str = "****";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanConfigError {
    #[error("Please provide a valid project name.")]
    MissingProjectName,
    #[error("Please setup the server url in the configuration.")]
    MissingServerUrl,
    #[error("Please provide a client id ({CLIENT_ID_ENV}) and client secret ({CLIENT_SECRET_ENV}).")]
    MissingCredentials,
    #[error("No supported scanner is enabled.")]
    NoScanners,
}

/// Scan engines the CLI can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scanner {
    Sca,
    Sast,
    Container,
    Kics,
}

impl Scanner {
    /// Name used in `--scan-types`; container scans have none yet
    pub fn scan_type(self) -> Option<&'static str> {
        match self {
            Scanner::Sca => Some("sca"),
            Scanner::Sast => Some("sast"),
            Scanner::Kics => Some("kics"),
            Scanner::Container => None,
        }
    }
}

/// Credentials for the AST server
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &MASK)
            .finish()
    }
}

/// Per-invocation scan settings, as given on the command line
///
/// Unset values fall back to [`ScanDefaults`] and then to the environment.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    pub project_name: Option<String>,
    pub server_url: Option<String>,
    pub base_auth_url: Option<String>,
    pub tenant: Option<String>,
    pub branch: Option<String>,
    pub source_dir: PathBuf,
    pub scanners: Vec<Scanner>,
    pub file_filters: Option<String>,
    pub additional_options: Option<String>,
}

/// Fully resolved settings for one `scan create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub project_name: String,
    pub server_url: String,
    pub base_auth_url: Option<String>,
    pub tenant: Option<String>,
    pub credentials: Credentials,
    pub branch: String,
    pub source_dir: PathBuf,
    pub scan_types: Vec<&'static str>,
    pub file_filters: Option<String>,
    pub additional_options: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Branch name from the SCM environment of the build
///
/// `GIT_BRANCH` loses its remote prefix (`origin/main` becomes `main`).
pub fn default_branch(env: impl Fn(&str) -> Option<String>) -> String {
    let lookup = |key: &str| env(key).filter(|v| !v.is_empty());

    if let Some(branch) = lookup(GIT_BRANCH_ENV) {
        return match branch.split_once('/') {
            Some((remote, rest)) if !remote.is_empty() => rest.to_string(),
            _ => branch,
        };
    }
    lookup(CVS_BRANCH_ENV)
        .or_else(|| lookup(SVN_REVISION_ENV))
        .unwrap_or_default()
}

impl ScanRequest {
    pub fn resolve(
        self,
        defaults: &ScanDefaults,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ScanConfig, ScanConfigError> {
        let project_name =
            non_empty(self.project_name.as_deref()).ok_or(ScanConfigError::MissingProjectName)?;
        let server_url = non_empty(self.server_url.as_deref())
            .or_else(|| non_empty(defaults.server_url.as_deref()))
            .ok_or(ScanConfigError::MissingServerUrl)?;

        let client_id = non_empty(defaults.client_id.as_deref())
            .or_else(|| non_empty(env(CLIENT_ID_ENV).as_deref()));
        let client_secret = non_empty(defaults.client_secret.as_deref())
            .or_else(|| non_empty(env(CLIENT_SECRET_ENV).as_deref()));
        let credentials = match (client_id, client_secret) {
            (Some(client_id), Some(client_secret)) => Credentials {
                client_id,
                client_secret,
            },
            _ => return Err(ScanConfigError::MissingCredentials),
        };

        let mut scan_types = Vec::new();
        for scanner in &self.scanners {
            match scanner.scan_type() {
                Some(name) if !scan_types.contains(&name) => scan_types.push(name),
                Some(_) => {}
                None => log::error!("Container Scan is not yet supported."),
            }
        }
        if scan_types.is_empty() {
            return Err(ScanConfigError::NoScanners);
        }

        let branch = match non_empty(self.branch.as_deref()) {
            Some(branch) => branch,
            None => default_branch(&env),
        };

        Ok(ScanConfig {
            project_name,
            server_url,
            base_auth_url: non_empty(self.base_auth_url.as_deref())
                .or_else(|| non_empty(defaults.base_auth_url.as_deref())),
            tenant: non_empty(self.tenant.as_deref())
                .or_else(|| non_empty(defaults.tenant.as_deref())),
            credentials,
            branch,
            source_dir: self.source_dir,
            scan_types,
            file_filters: non_empty(self.file_filters.as_deref())
                .or_else(|| non_empty(defaults.file_filters.as_deref())),
            additional_options: non_empty(self.additional_options.as_deref())
                .or_else(|| non_empty(defaults.additional_options.as_deref())),
        })
    }
}

impl ScanConfig {
    pub fn log_summary(&self) {
        log::info!("----**** Checkmarx Scan Configuration ****----");
        log::info!("Checkmarx Server Url: {}", self.server_url);
        if let Some(auth) = &self.base_auth_url {
            log::info!("Checkmarx Auth Server Url: {}", auth);
        }
        log::info!("Tenant Name: {}", self.tenant.as_deref().unwrap_or(""));
        log::info!("Project Name: {}", self.project_name);
        log::info!("Default branch name: {}", self.branch);
        log::info!("Scan types: {}", self.scan_types.join(","));
        log::info!(
            "Additional Options: {}",
            self.additional_options.as_deref().unwrap_or("")
        );
    }
}

/// Server and credential flags shared by every CLI call
pub fn auth_arguments(config: &ScanConfig) -> Vec<String> {
    let mut args = vec!["--base-uri".to_string(), config.server_url.clone()];
    if let Some(auth) = &config.base_auth_url {
        args.extend(["--base-auth-uri".to_string(), auth.clone()]);
    }
    if let Some(tenant) = &config.tenant {
        args.extend(["--tenant".to_string(), tenant.clone()]);
    }
    args.extend([
        "--client-id".to_string(),
        config.credentials.client_id.clone(),
        "--client-secret".to_string(),
        config.credentials.client_secret.clone(),
    ]);
    args
}

/// Arguments for `cx scan create ...`
pub fn scan_arguments(config: &ScanConfig) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "scan".into(),
        "create".into(),
        "--project-name".into(),
        config.project_name.clone(),
        "-s".into(),
        config.source_dir.display().to_string(),
        "--branch".into(),
        config.branch.clone(),
        "--scan-types".into(),
        config.scan_types.join(","),
        "--agent".into(),
        AGENT_NAME.into(),
    ];
    args.extend(auth_arguments(config));
    if let Some(filter) = &config.file_filters {
        args.extend(["--file-filter".to_string(), filter.clone()]);
    }
    if let Some(options) = &config.additional_options {
        args.extend(options.split_whitespace().map(str::to_string));
    }
    args
}

/// Arguments for `cx scan cancel --scan-id <id> ...`
pub fn cancel_arguments(config: &ScanConfig, scan_id: &uuid::Uuid) -> Vec<String> {
    let mut args = vec![
        "scan".to_string(),
        "cancel".to_string(),
        "--scan-id".to_string(),
        scan_id.to_string(),
    ];
    args.extend(auth_arguments(config));
    args
}

/// Join arguments for logging with the client secret hidden
pub fn masked_arguments(args: &[String]) -> String {
    let mut out = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            out.push(MASK);
            hide_next = false;
            continue;
        }
        hide_next = arg == "--client-secret";
        out.push(arg.as_str());
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn request() -> ScanRequest {
        ScanRequest {
            project_name: Some("webgoat".into()),
            server_url: Some("https://ast.example.com".into()),
            source_dir: PathBuf::from("/work/webgoat"),
            scanners: vec![Scanner::Sast, Scanner::Sca],
            ..ScanRequest::default()
        }
    }

    fn credentials() -> impl Fn(&str) -> Option<String> {
        env(&[(CLIENT_ID_ENV, "id"), (CLIENT_SECRET_ENV, "s3cret")])
    }

    #[test]
    fn branch_strips_remote_prefix() {
        assert_eq!(default_branch(env(&[(GIT_BRANCH_ENV, "origin/main")])), "main");
        assert_eq!(
            default_branch(env(&[(GIT_BRANCH_ENV, "origin/feature/x")])),
            "feature/x"
        );
        assert_eq!(default_branch(env(&[(GIT_BRANCH_ENV, "main")])), "main");
    }

    #[test]
    fn branch_falls_back_through_scm_variables() {
        assert_eq!(
            default_branch(env(&[(GIT_BRANCH_ENV, ""), (CVS_BRANCH_ENV, "HEAD")])),
            "HEAD"
        );
        assert_eq!(default_branch(env(&[(SVN_REVISION_ENV, "1234")])), "1234");
        assert_eq!(default_branch(env(&[])), "");
    }

    #[test]
    fn missing_project_name_is_rejected() {
        let req = ScanRequest {
            project_name: Some("  ".into()),
            ..request()
        };
        assert_eq!(
            req.resolve(&ScanDefaults::default(), credentials()),
            Err(ScanConfigError::MissingProjectName)
        );
    }

    #[test]
    fn server_url_comes_from_defaults() {
        let req = ScanRequest {
            server_url: None,
            ..request()
        };
        assert_eq!(
            req.clone().resolve(&ScanDefaults::default(), credentials()),
            Err(ScanConfigError::MissingServerUrl)
        );

        let defaults = ScanDefaults {
            server_url: Some("https://global.example.com".into()),
            ..ScanDefaults::default()
        };
        let config = req.resolve(&defaults, credentials()).unwrap();
        assert_eq!(config.server_url, "https://global.example.com");
    }

    #[test]
    fn credentials_are_required() {
        assert_eq!(
            request().resolve(&ScanDefaults::default(), env(&[(CLIENT_ID_ENV, "id")])),
            Err(ScanConfigError::MissingCredentials)
        );
    }

    #[test]
    fn container_only_has_no_scanners() {
        let req = ScanRequest {
            scanners: vec![Scanner::Container],
            ..request()
        };
        assert_eq!(
            req.resolve(&ScanDefaults::default(), credentials()),
            Err(ScanConfigError::NoScanners)
        );
    }

    #[test]
    fn create_arguments_in_order() {
        let req = ScanRequest {
            tenant: Some("acme".into()),
            branch: Some("develop".into()),
            file_filters: Some("!*.md".into()),
            additional_options: Some("--report-format  json\t--sast-incremental".into()),
            scanners: vec![Scanner::Sast, Scanner::Container, Scanner::Kics, Scanner::Sast],
            ..request()
        };
        let config = req.resolve(&ScanDefaults::default(), credentials()).unwrap();

        let args = scan_arguments(&config);
        let expected: Vec<String> = [
            "scan",
            "create",
            "--project-name",
            "webgoat",
            "-s",
            "/work/webgoat",
            "--branch",
            "develop",
            "--scan-types",
            "sast,kics",
            "--agent",
            "cxtool",
            "--base-uri",
            "https://ast.example.com",
            "--tenant",
            "acme",
            "--client-id",
            "id",
            "--client-secret",
            "s3cret",
            "--file-filter",
            "!*.md",
            "--report-format",
            "json",
            "--sast-incremental",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(args, expected);
    }

    #[test]
    fn secret_is_masked() {
        let config = request()
            .resolve(&ScanDefaults::default(), credentials())
            .unwrap();
        let shown = masked_arguments(&scan_arguments(&config));

        assert!(!shown.contains("s3cret"));
        assert!(shown.contains("--client-secret ****"));
        assert!(!format!("{:?}", config).contains("s3cret"));
    }

    #[test]
    fn cancel_carries_scan_id_and_auth() {
        let config = request()
            .resolve(&ScanDefaults::default(), credentials())
            .unwrap();
        let id = uuid::Uuid::nil();
        let id_text = id.to_string();
        let args = cancel_arguments(&config, &id);

        assert_eq!(&args[..4], &["scan", "cancel", "--scan-id", id_text.as_str()]);
        assert!(args.contains(&"--client-id".to_string()));
    }
}

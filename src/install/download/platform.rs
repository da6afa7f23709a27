//! Platform detection for release artifact selection

use once_cell::sync::OnceCell;
use std::collections::HashMap;
use thiserror::Error;

/// Property key carrying the OS name in a detection property map.
pub const OS_NAME_KEY: &str = "os.name";

/// Operating systems the AST CLI ships release artifacts for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("{0} is not a supported platform")]
    Unsupported(String),
}

/// Global cache for platform detection (initialized once, used everywhere)
static PLATFORM_CACHE: OnceCell<Platform> = OnceCell::new();

impl Platform {
    /// Detect the platform this process runs on (cached after first call)
    pub fn current() -> Result<Self, PlatformError> {
        PLATFORM_CACHE
            .get_or_try_init(|| Self::detect_os_name(conventional_os_name()))
            .copied()
    }

    /// Detect from a property view; the OS name is read from [`OS_NAME_KEY`].
    pub fn detect(properties: &HashMap<String, String>) -> Result<Self, PlatformError> {
        match properties.get(OS_NAME_KEY) {
            Some(os_name) => Self::detect_os_name(os_name),
            None => Err(PlatformError::Unsupported(String::new())),
        }
    }

    /// Case-insensitive substring match; linux, then mac, then windows.
    pub fn detect_os_name(os_name: &str) -> Result<Self, PlatformError> {
        let name = os_name.to_lowercase();
        if name.contains("linux") {
            Ok(Platform::Linux)
        } else if name.contains("mac os x") || name.contains("darwin") || name.contains("osx") {
            Ok(Platform::MacOs)
        } else if name.contains("windows") {
            Ok(Platform::Windows)
        } else {
            Err(PlatformError::Unsupported(os_name.to_string()))
        }
    }

    /// Suffix of the release artifact name for this platform
    pub fn package_extension(&self) -> &'static str {
        match self {
            Platform::Linux => "linux_x64.tar.gz",
            Platform::MacOs => "darwin_x64.tar.gz",
            Platform::Windows => "windows_x64.zip",
        }
    }

    /// File name of the extracted CLI wrapper
    pub fn executable_name(&self) -> &'static str {
        match self {
            Platform::Linux | Platform::MacOs => "cx",
            Platform::Windows => "cx.exe",
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Platform::Linux => "linux",
            Platform::MacOs => "darwin",
            Platform::Windows => "windows",
        };
        f.write_str(name)
    }
}

/// Conventional OS name for the compile target, as reported by most runtimes.
fn conventional_os_name() -> &'static str {
    match std::env::consts::OS {
        "linux" => "Linux",
        "macos" => "Mac OS X",
        "windows" => "Windows",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_families_case_insensitively() {
        assert_eq!(Platform::detect_os_name("Linux"), Ok(Platform::Linux));
        assert_eq!(Platform::detect_os_name("GNU/LINUX amd64"), Ok(Platform::Linux));
        assert_eq!(Platform::detect_os_name("Mac OS X"), Ok(Platform::MacOs));
        assert_eq!(Platform::detect_os_name("Darwin 23.1"), Ok(Platform::MacOs));
        assert_eq!(Platform::detect_os_name("osx"), Ok(Platform::MacOs));
        assert_eq!(Platform::detect_os_name("Windows Server 2022"), Ok(Platform::Windows));
    }

    #[test]
    fn unknown_os_carries_the_name() {
        assert_eq!(
            Platform::detect_os_name("SunOS"),
            Err(PlatformError::Unsupported("SunOS".to_string()))
        );
        assert!(Platform::detect_os_name("").is_err());
    }

    #[test]
    fn linux_wins_over_later_families() {
        // "linux" is tried first, so a string naming both resolves to Linux
        assert_eq!(Platform::detect_os_name("windows subsystem for linux"), Ok(Platform::Linux));
    }

    #[test]
    fn detects_from_property_map() {
        let mut props = HashMap::new();
        props.insert(OS_NAME_KEY.to_string(), "Windows 11".to_string());
        assert_eq!(Platform::detect(&props), Ok(Platform::Windows));

        assert!(Platform::detect(&HashMap::new()).is_err());
    }

    #[test]
    fn packaging_conventions() {
        assert_eq!(Platform::Linux.package_extension(), "linux_x64.tar.gz");
        assert_eq!(Platform::MacOs.package_extension(), "darwin_x64.tar.gz");
        assert_eq!(Platform::Windows.package_extension(), "windows_x64.zip");
        assert_eq!(Platform::Windows.executable_name(), "cx.exe");
        assert_eq!(Platform::MacOs.executable_name(), "cx");
    }

    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    #[test]
    fn current_platform_is_detected() {
        assert!(Platform::current().is_ok());
    }
}

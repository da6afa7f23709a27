//! Installation state detection
//!
//! A tool home is considered installed once its `.timestamp` marker exists.
//! The marker holds the epoch-millisecond time of the last successful install
//! and drives the update policy: an installation older than the configured
//! interval is stale and gets re-downloaded.

use log::warn;
use std::path::Path;

/// Marker recording the time of the last successful install
pub const TIMESTAMP_FILE: &str = ".timestamp";

/// Provenance record: the URL the installed binary came from
pub const INSTALLED_FROM_FILE: &str = ".installedFrom";

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// What the marker file says
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    Absent,
    /// Present but not a number; counts as timestamp 0
    Corrupt,
    Recorded(i64),
}

impl MarkerState {
    pub fn timestamp(&self) -> Option<i64> {
        match self {
            MarkerState::Absent => None,
            MarkerState::Corrupt => Some(0),
            MarkerState::Recorded(ts) => Some(*ts),
        }
    }
}

/// Installation state enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallationState {
    /// No marker: never installed, or the last attempt did not finish
    NotInstalled,
    /// Installed, but older than the update interval
    Stale,
    /// Installed within the update interval
    UpToDate,
}

impl InstallationState {
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, InstallationState::UpToDate)
    }
}

/// Read the marker under `home`.
///
/// A missing file is [`MarkerState::Absent`]; any other read failure is
/// returned to the caller.
pub fn read_marker(home: &Path) -> std::io::Result<MarkerState> {
    let marker = home.join(TIMESTAMP_FILE);
    let content = match std::fs::read_to_string(&marker) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(MarkerState::Absent),
        Err(e) => return Err(e),
    };

    match content.trim().parse::<i64>() {
        Ok(ts) => Ok(MarkerState::Recorded(ts)),
        Err(_) => {
            warn!(
                "{} is corrupt and cannot be read; it will be reset to 0",
                marker.display()
            );
            Ok(MarkerState::Corrupt)
        }
    }
}

/// Decide freshness from a marker, the current time and the update interval.
///
/// A marker from the future (`now - marker <= 0`) always counts as fresh.
pub fn check_installation_state(
    marker: MarkerState,
    now_millis: i64,
    update_interval_hours: u64,
) -> InstallationState {
    let Some(timestamp) = marker.timestamp() else {
        return InstallationState::NotInstalled;
    };

    let elapsed = now_millis.saturating_sub(timestamp);
    if elapsed <= 0 {
        return InstallationState::UpToDate;
    }

    let interval = i64::try_from(update_interval_hours)
        .unwrap_or(i64::MAX)
        .saturating_mul(MILLIS_PER_HOUR);
    if elapsed < interval {
        InstallationState::UpToDate
    } else {
        InstallationState::Stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn absent_marker_is_not_installed() {
        assert_eq!(
            check_installation_state(MarkerState::Absent, NOW, 24),
            InstallationState::NotInstalled
        );
    }

    #[test]
    fn one_millisecond_old_is_fresh() {
        assert_eq!(
            check_installation_state(MarkerState::Recorded(NOW - 1), NOW, 24),
            InstallationState::UpToDate
        );
    }

    #[test]
    fn future_marker_is_fresh_regardless_of_interval() {
        for hours in [0, 1, 24, u64::MAX] {
            assert!(check_installation_state(MarkerState::Recorded(NOW + 5), NOW, hours).is_up_to_date());
            assert!(check_installation_state(MarkerState::Recorded(NOW), NOW, hours).is_up_to_date());
        }
    }

    #[test]
    fn interval_boundary_is_stale() {
        let day = 24 * MILLIS_PER_HOUR;
        assert_eq!(
            check_installation_state(MarkerState::Recorded(NOW - day), NOW, 24),
            InstallationState::Stale
        );
        assert_eq!(
            check_installation_state(MarkerState::Recorded(NOW - day + 1), NOW, 24),
            InstallationState::UpToDate
        );
    }

    #[test]
    fn zero_interval_always_refreshes_past_markers() {
        assert_eq!(
            check_installation_state(MarkerState::Recorded(NOW - 1), NOW, 0),
            InstallationState::Stale
        );
    }

    #[test]
    fn corrupt_marker_is_maximally_stale() {
        assert_eq!(
            check_installation_state(MarkerState::Corrupt, NOW, 24),
            InstallationState::Stale
        );
    }

    #[test]
    fn decision_is_deterministic() {
        let marker = MarkerState::Recorded(NOW - 3 * MILLIS_PER_HOUR);
        let first = check_installation_state(marker, NOW, 4);
        for _ in 0..10 {
            assert_eq!(check_installation_state(marker, NOW, 4), first);
        }
    }

    #[test]
    fn reads_marker_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_marker(dir.path()).unwrap(), MarkerState::Absent);

        std::fs::write(dir.path().join(TIMESTAMP_FILE), "1700000000000\n").unwrap();
        assert_eq!(
            read_marker(dir.path()).unwrap(),
            MarkerState::Recorded(1_700_000_000_000)
        );

        std::fs::write(dir.path().join(TIMESTAMP_FILE), "yesterday").unwrap();
        assert_eq!(read_marker(dir.path()).unwrap(), MarkerState::Corrupt);
    }
}

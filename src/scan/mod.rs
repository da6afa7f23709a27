//! Running scans with an installed AST CLI
//!
//! Nothing here scans anything: settings are resolved into a [`ScanConfig`],
//! turned into `cx scan create` arguments, and the CLI does the work. Its
//! output is forwarded to the log and searched for the scan id, which is used
//! to cancel the scan if the run is interrupted.

mod args;
mod runner;

pub use args::{
    AGENT_NAME, CLIENT_ID_ENV, CLIENT_SECRET_ENV, CVS_BRANCH_ENV, Credentials, GIT_BRANCH_ENV,
    SVN_REVISION_ENV, ScanConfig, ScanConfigError, ScanRequest, Scanner, auth_arguments,
    cancel_arguments, default_branch, masked_arguments, scan_arguments,
};
pub use runner::{ScanError, ScanOutcome, cancel_scan, extract_scan_id, run_scan, run_scan_until};

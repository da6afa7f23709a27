//! Installs the Checkmarx AST CLI (`cx`) into named installation homes, keeps
//! each installation fresh, and runs scans with it.
//!
//! - [`install`] - platform detection, release resolution, download, extraction
//! - [`config`] - the TOML configuration and its list of installations
//! - [`scan`] - scan argument assembly and process supervision

pub mod config;
pub mod install;
pub mod scan;

mod cli;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use cxtool::config::Config;
use cxtool::install::download::Platform;
use cxtool::install::{ToolInstallation, ensure_installed};
use cxtool::scan::{ScanOutcome, ScanRequest, Scanner, run_scan};
use log::{error, info, warn};

/// Exit code for a scan stopped by Ctrl-C
const EXIT_ABORTED: i32 = 2;

fn main() {
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("FATAL: Failed to create Tokio runtime: {e}");
            std::process::exit(1);
        }
    };
    match rt.block_on(real_main()) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}

async fn real_main() -> Result<i32> {
    let args = cli::Args::parse();

    let cfg_path = match args.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let mut cfg = Config::load(&cfg_path)
        .with_context(|| format!("Failed to load config from {}", cfg_path.display()))?;

    match args.sub {
        cli::Cmd::Install {
            name,
            home,
            version,
            update_interval_hours,
            proxy,
        } => {
            let mut installation = match home {
                Some(home) => ToolInstallation::new("adhoc", home),
                None => select_installation(&cfg, name.as_deref())?.clone(),
            };
            if let Some(version) = version {
                installation.version = version;
            }
            if let Some(hours) = update_interval_hours {
                installation.update_interval_hours = hours;
            }
            if proxy.is_some() {
                cfg.proxy = proxy;
            }

            let executable = ensure_installed(&installation, &cfg)
                .await
                .with_context(|| format!("Failed to install '{}'", installation.name))?;
            println!("{}", executable.display());
            Ok(0)
        }
        cli::Cmd::Which { name } => {
            let executable = locate_executable(&cfg, name.as_deref())?;
            println!("{}", executable.display());
            Ok(0)
        }
        cli::Cmd::Platform => {
            let platform = Platform::current()?;
            println!("platform:   {platform}");
            println!("artifact:   {}", platform.package_extension());
            println!("executable: {}", platform.executable_name());
            Ok(0)
        }
        cli::Cmd::Installations { action } => {
            handle_installations(&mut cfg, &cfg_path, action)?;
            Ok(0)
        }
        cli::Cmd::Scan(scan) => handle_scan(&cfg, scan).await,
    }
}

fn select_installation<'a>(cfg: &'a Config, name: Option<&str>) -> Result<&'a ToolInstallation> {
    match name {
        Some(name) => cfg
            .installation(name)
            .ok_or_else(|| anyhow!("Checkmarx installation named '{name}' was not found")),
        None => cfg
            .select_installation(None)
            .ok_or_else(|| anyhow!("No installation given and no default installation configured")),
    }
}

/// Executable of a configured installation, else `cx` from PATH
fn locate_executable(cfg: &Config, name: Option<&str>) -> Result<PathBuf> {
    let platform = Platform::current()?;
    if name.is_some() || cfg.default_installation.is_some() {
        let installation = select_installation(cfg, name)?;
        return Ok(installation.resolve_executable(platform)?);
    }
    which::which(platform.executable_name())
        .with_context(|| format!("{} not found in PATH", platform.executable_name()))
}

fn handle_installations(
    cfg: &mut Config,
    cfg_path: &std::path::Path,
    action: cli::InstallationsCmd,
) -> Result<()> {
    match action {
        cli::InstallationsCmd::List => {
            for installation in &cfg.installations {
                let marker = if cfg.default_installation.as_deref() == Some(installation.name.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {}\t{}\t{}\t{}h",
                    installation.name,
                    installation.home.display(),
                    installation.version,
                    installation.update_interval_hours
                );
            }
            return Ok(());
        }
        cli::InstallationsCmd::Add {
            name,
            home,
            version,
            update_interval_hours,
            default,
        } => {
            let mut installation = ToolInstallation::new(name.clone(), home);
            if let Some(version) = version {
                installation.version = version;
            }
            if let Some(hours) = update_interval_hours {
                installation.update_interval_hours = hours;
            }
            if cfg.upsert_installation(installation).is_some() {
                info!("Replaced installation '{name}'");
            }
            if default || cfg.default_installation.is_none() {
                cfg.default_installation = Some(name);
            }
        }
        cli::InstallationsCmd::Remove { name } => {
            if cfg.remove_installation(&name).is_none() {
                bail!("Checkmarx installation named '{name}' was not found");
            }
        }
    }

    cfg.save(cfg_path)
        .with_context(|| format!("Failed to save config to {}", cfg_path.display()))?;
    info!("Saved configuration to {}", cfg_path.display());
    Ok(())
}

async fn handle_scan(cfg: &Config, args: cli::ScanArgs) -> Result<i32> {
    let mut scanners: Vec<Scanner> = [
        (args.sca, Scanner::Sca),
        (args.sast, Scanner::Sast),
        (args.container, Scanner::Container),
        (args.kics, Scanner::Kics),
    ]
    .into_iter()
    .filter_map(|(enabled, scanner)| enabled.then_some(scanner))
    .collect();
    if scanners.is_empty() {
        scanners = vec![Scanner::Sca, Scanner::Sast, Scanner::Kics];
    }

    let source_dir = std::path::absolute(&args.source_dir)
        .with_context(|| format!("Invalid source directory {}", args.source_dir.display()))?;
    let request = ScanRequest {
        project_name: args.project_name,
        server_url: args.server_url,
        base_auth_url: args.base_auth_url,
        tenant: args.tenant,
        branch: args.branch,
        source_dir,
        scanners,
        file_filters: args.file_filter,
        additional_options: args.additional_options,
    };
    let scan_config = request.resolve(&cfg.scan, |key| std::env::var(key).ok())?;
    scan_config.log_summary();

    let executable = match args
        .installation
        .as_deref()
        .or(cfg.default_installation.as_deref())
    {
        Some(name) => {
            let installation = select_installation(cfg, Some(name))?;
            ensure_installed(installation, cfg)
                .await
                .with_context(|| format!("Failed to install '{name}'"))?
        }
        None => {
            warn!("No installation configured, looking for cx in PATH");
            locate_executable(cfg, None)?
        }
    };

    match run_scan(&executable, &scan_config).await? {
        ScanOutcome::Completed { .. } => Ok(0),
        ScanOutcome::Failed { code, .. } => match code {
            Some(code) => bail!("Checkmarx scan failed with exit code {code}"),
            None => bail!("Checkmarx scan was terminated by a signal"),
        },
        ScanOutcome::Aborted { scan_id } => {
            warn!(
                "Scan aborted{}",
                scan_id.map(|id| format!(" (scan {id})")).unwrap_or_default()
            );
            Ok(EXIT_ABORTED)
        }
    }
}

//! Launch the AST CLI and follow its output

use log::{error, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use uuid::Uuid;

use super::args::{ScanConfig, cancel_arguments, masked_arguments, scan_arguments};

static SCAN_ID: Lazy<Option<Regex>> = Lazy::new(|| {
    match Regex::new(
        r#""ID":"([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})""#,
    ) {
        Ok(re) => Some(re),
        Err(e) => {
            error!("Scan id pattern does not compile, scan ids will not be tracked: {}", e);
            None
        }
    }
});

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to launch {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("lost track of the scan process: {0}")]
    Wait(#[source] std::io::Error),
}

/// How a scan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Completed { scan_id: Option<Uuid> },
    /// Non-zero exit; `code` is `None` when the process was killed by a signal
    Failed { code: Option<i32>, scan_id: Option<Uuid> },
    Aborted { scan_id: Option<Uuid> },
}

impl ScanOutcome {
    pub fn scan_id(&self) -> Option<Uuid> {
        match *self {
            ScanOutcome::Completed { scan_id }
            | ScanOutcome::Failed { scan_id, .. }
            | ScanOutcome::Aborted { scan_id } => scan_id,
        }
    }
}

/// Scan id from a line of CLI output such as `{"ID":"<uuid>",...}`
pub fn extract_scan_id(line: &str) -> Option<Uuid> {
    let captures = SCAN_ID.as_ref()?.captures(line)?;
    Uuid::parse_str(captures.get(1)?.as_str()).ok()
}

/// Run `scan create` and wait for it, cancelling the scan on Ctrl-C.
pub async fn run_scan(executable: &Path, config: &ScanConfig) -> Result<ScanOutcome, ScanError> {
    run_scan_until(executable, config, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Without a signal handler the scan simply runs to completion.
            warn!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}

/// Like [`run_scan`], with an arbitrary interrupt future.
pub async fn run_scan_until<F>(
    executable: &Path,
    config: &ScanConfig,
    interrupt: F,
) -> Result<ScanOutcome, ScanError>
where
    F: Future<Output = ()>,
{
    let args = scan_arguments(config);
    info!("Executing: {} {}", executable.display(), masked_arguments(&args));

    let mut child = Command::new(executable)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ScanError::Spawn {
            path: executable.to_path_buf(),
            source,
        })?;

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!("[cx] {}", line);
            }
        });
    }

    let mut scan_id = None;
    tokio::pin!(interrupt);

    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if scan_id.is_none()
                            && let Some(id) = extract_scan_id(&line)
                        {
                            info!("Scan ID: {}", id);
                            scan_id = Some(id);
                        }
                        info!("[cx] {}", line);
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Could not read scan output: {}", e);
                        break;
                    }
                },
                _ = &mut interrupt => {
                    return Ok(abort(executable, config, &mut child, scan_id).await);
                }
            }
        }
    }

    let status = tokio::select! {
        status = child.wait() => status.map_err(ScanError::Wait)?,
        _ = &mut interrupt => {
            return Ok(abort(executable, config, &mut child, scan_id).await);
        }
    };

    Ok(outcome(status, scan_id))
}

fn outcome(status: ExitStatus, scan_id: Option<Uuid>) -> ScanOutcome {
    if status.success() {
        info!("--------------- Checkmarx execution completed ---------------");
        ScanOutcome::Completed { scan_id }
    } else {
        error!("Checkmarx CLI exited with {}", status);
        ScanOutcome::Failed {
            code: status.code(),
            scan_id,
        }
    }
}

async fn abort(
    executable: &Path,
    config: &ScanConfig,
    child: &mut Child,
    scan_id: Option<Uuid>,
) -> ScanOutcome {
    warn!("Scan interrupted, stopping the Checkmarx CLI");
    if let Err(e) = child.kill().await {
        warn!("Could not stop the Checkmarx CLI: {}", e);
    }
    match scan_id {
        Some(id) => cancel_scan(executable, config, &id).await,
        None => warn!("No scan id seen yet, nothing to cancel"),
    }
    ScanOutcome::Aborted { scan_id }
}

/// Best-effort `scan cancel`; failures are logged only.
pub async fn cancel_scan(executable: &Path, config: &ScanConfig, scan_id: &Uuid) {
    info!("Cancelling scan {}", scan_id);
    let result = Command::new(executable)
        .args(cancel_arguments(config, scan_id))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match result {
        Ok(status) if status.success() => info!("Scan {} cancelled", scan_id),
        Ok(status) => warn!("Scan cancel exited with {}", status),
        Err(e) => warn!("Could not run scan cancel: {}", e),
    }
}

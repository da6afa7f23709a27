//! HTTP fetching of release metadata and artifacts

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use url::Url;

use super::proxy::READ_TIMEOUT;

/// No data for this long aborts the download
const DOWNLOAD_INACTIVITY_TIMEOUT: Duration = READ_TIMEOUT;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("no data received from {url} for {secs} seconds ({downloaded} bytes downloaded)")]
    Timeout { url: String, secs: u64, downloaded: u64 },
    #[error("malformed release metadata from {url}: {source}")]
    Metadata {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

async fn send(client: &reqwest::Client, url: &Url) -> Result<reqwest::Response, FetchError> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }
    Ok(response)
}

/// GET a JSON document and decode it
pub async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &Url,
) -> Result<T, FetchError> {
    let body = send(client, url)
        .await?
        .text()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

    serde_json::from_str(&body).map_err(|source| FetchError::Metadata {
        url: url.to_string(),
        source,
    })
}

/// Download `url` into a temporary file inside `dir`.
///
/// The returned guard deletes the file when dropped.
pub async fn download_to_temp(
    client: &reqwest::Client,
    url: &Url,
    dir: &Path,
) -> Result<NamedTempFile, FetchError> {
    let io_err = |source| FetchError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let temp = tempfile::Builder::new()
        .prefix(".download-")
        .tempfile_in(dir)
        .map_err(io_err)?;
    let mut file = tokio::fs::File::from_std(temp.reopen().map_err(io_err)?);

    info!("Downloading {}", url);
    let response = send(client, url).await?;
    let total_bytes = response.content_length();
    let progress = progress_bar(total_bytes);

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    loop {
        let chunk = match timeout(DOWNLOAD_INACTIVITY_TIMEOUT, stream.next()).await {
            Ok(Some(Ok(chunk))) => chunk,
            Ok(Some(Err(source))) => {
                progress.abandon();
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    source,
                });
            }
            Ok(None) => break,
            Err(_) => {
                progress.abandon();
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                    secs: DOWNLOAD_INACTIVITY_TIMEOUT.as_secs(),
                    downloaded,
                });
            }
        };

        file.write_all(&chunk).await.map_err(|source| FetchError::Io {
            path: temp.path().to_path_buf(),
            source,
        })?;
        downloaded += chunk.len() as u64;
        progress.set_position(downloaded);
    }

    file.flush().await.map_err(|source| FetchError::Io {
        path: temp.path().to_path_buf(),
        source,
    })?;
    progress.finish_and_clear();

    if let Some(total) = total_bytes
        && total != downloaded
    {
        warn!("Expected {} bytes from {} but received {}", total, url, downloaded);
    }
    debug!("Downloaded {} bytes to {}", downloaded, temp.path().display());

    Ok(temp)
}

fn progress_bar(total_bytes: Option<u64>) -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    match total_bytes {
        Some(total) => {
            let bar = ProgressBar::new(total);
            if let Ok(style) =
                ProgressStyle::default_bar().template("   [{bar:40.green/blue}] {bytes}/{total_bytes}")
            {
                bar.set_style(style.progress_chars("█▓░"));
            }
            bar
        }
        None => ProgressBar::new_spinner(),
    }
}

// rcp-net/src/http.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use rcp_aio::checksum::{sha256_file_async, verify_checksum_async};
use rcp_common::cache::Cache;
use rcp_common::error::{FetchError, RcpError, Result};
use rcp_common::model::{ChecksumStatus, LocalArchivePath};
use rcp_common::ValidRecipe;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use tokio::fs::{self, File as TokioFile};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use url::Url;

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "rcp recipe interpreter (Rust)";

/// Downloads the recipe's source archive into the cache.
///
/// A declared sha256 must match or the download is discarded with
/// `ChecksumMismatch`; nothing is left in the cache in that case. Without a
/// sha256 the archive is accepted as `ChecksumStatus::Unverified`.
pub async fn fetch(recipe: &ValidRecipe, cache: &Cache) -> Result<LocalArchivePath> {
    let url = recipe.url.as_str();
    let expected = recipe.sha256.trim();
    let cache_path = cache.download_path(&recipe.name, recipe.version(), url);

    debug!(
        "Preparing to fetch source for '{}' from URL: {}",
        recipe.name, url
    );
    debug!("Target cache path: {}", cache_path.display());

    if cache_path.is_file() {
        if let Some(local) = reuse_cached(&cache_path, url, expected).await? {
            return Ok(local);
        }
    } else {
        debug!("File not found in cache.");
    }

    let parsed = Url::parse(url).map_err(|e| FetchError::NetworkUnavailable {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let temp_path = temp_download_path(&cache_path);
    if temp_path.exists() {
        if let Err(e) = fs::remove_file(&temp_path).await {
            warn!(
                "Could not remove existing temporary file {}: {}",
                temp_path.display(),
                e
            );
        }
    }

    let transfer = match parsed.scheme() {
        "file" => copy_local_source(&parsed, url, &temp_path).await,
        _ => {
            let client = build_http_client()?;
            download_to(&client, url, &temp_path).await
        }
    };
    if let Err(e) = transfer {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }

    let checksum = if expected.is_empty() {
        let actual = sha256_file_async(&temp_path).await?;
        warn!(
            "Recipe '{}' declares no sha256; {} was NOT verified (sha256 {}).",
            recipe.name, url, actual
        );
        ChecksumStatus::Unverified { actual }
    } else {
        match verify_checksum_async(&temp_path, expected, url).await {
            Ok(sha256) => {
                debug!("Checksum verified for {}", temp_path.display());
                ChecksumStatus::Verified { sha256 }
            }
            Err(e) => {
                error!("Discarding download of {}: {}", url, e);
                let _ = fs::remove_file(&temp_path).await;
                return Err(e);
            }
        }
    };

    fs::rename(&temp_path, &cache_path).await?;
    debug!("Moved download to final location: {}", cache_path.display());
    Ok(LocalArchivePath {
        path: cache_path,
        checksum,
    })
}

/// Returns the cached archive if it can be used as-is. A cached file that no
/// longer matches the declared digest is removed so it gets downloaded again.
async fn reuse_cached(
    cache_path: &Path,
    url: &str,
    expected: &str,
) -> Result<Option<LocalArchivePath>> {
    debug!("File exists in cache: {}", cache_path.display());
    if expected.is_empty() {
        let actual = sha256_file_async(cache_path).await?;
        warn!(
            "Using cached {} without checksum verification (sha256 {}).",
            cache_path.display(),
            actual
        );
        return Ok(Some(LocalArchivePath {
            path: cache_path.to_path_buf(),
            checksum: ChecksumStatus::Unverified { actual },
        }));
    }

    match verify_checksum_async(cache_path, expected, url).await {
        Ok(sha256) => {
            debug!("Using valid cached file: {}", cache_path.display());
            Ok(Some(LocalArchivePath {
                path: cache_path.to_path_buf(),
                checksum: ChecksumStatus::Verified { sha256 },
            }))
        }
        Err(RcpError::Fetch(FetchError::ChecksumMismatch { actual, .. })) => {
            debug!(
                "Cached file {} has sha256 {}; redownloading.",
                cache_path.display(),
                actual
            );
            if let Err(e) = fs::remove_file(cache_path).await {
                debug!(
                    "Failed to remove stale cached file {}: {}",
                    cache_path.display(),
                    e
                );
            }
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn temp_download_path(final_path: &Path) -> PathBuf {
    let temp_filename = format!(
        ".{}.download",
        final_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
    );
    final_path.with_file_name(temp_filename)
}

async fn copy_local_source(parsed: &Url, url: &str, temp_path: &Path) -> Result<()> {
    let source = parsed
        .to_file_path()
        .map_err(|_| FetchError::NotFound {
            url: url.to_string(),
        })?;
    if !source.is_file() {
        return Err(FetchError::NotFound {
            url: url.to_string(),
        }
        .into());
    }
    debug!("Copying local source {}", source.display());
    fs::copy(&source, temp_path).await?;
    Ok(())
}

pub fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| RcpError::Generic(format!("Failed to build HTTP client: {e}")))
}

/// Maps a failing HTTP status to a fetch error: gone or missing resources are
/// `NotFound`, anything else means the source is unavailable right now.
fn status_error(url: &str, status: StatusCode) -> FetchError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => FetchError::NotFound {
            url: url.to_string(),
        },
        _ => FetchError::NetworkUnavailable {
            url: url.to_string(),
            reason: format!("HTTP status {status}"),
        },
    }
}

async fn download_to(client: &Client, url: &str, temp_path: &Path) -> Result<()> {
    debug!("Downloading to temporary path: {}", temp_path.display());
    let network_error = |reason: String| FetchError::NetworkUnavailable {
        url: url.to_string(),
        reason,
    };

    let mut response = client.get(url).send().await.map_err(|e| {
        debug!("HTTP request failed for {url}: {e}");
        network_error(e.to_string())
    })?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);

    if !status.is_success() {
        error!("HTTP error {} for URL {}", status, url);
        return Err(status_error(url, status).into());
    }

    let mut temp_file = TokioFile::create(temp_path).await?;
    let mut total = 0usize;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| network_error(format!("failed reading response body: {e}")))?
    {
        total += chunk.len();
        temp_file.write_all(&chunk).await?;
    }
    temp_file.flush().await?;
    debug!("Wrote {} bytes to {}", total, temp_path.display());
    Ok(())
}

//! Streaming download of release assets to disk.

use std::path::Path;

use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::UpdateError;
use crate::constants::USER_AGENT;

/// Stream `url` into a new file at `dest`, returning the number of bytes
/// written. Anything but `200 OK` is an error. Cancellation aborts the
/// transfer between chunks.
pub async fn download_to(
    http: &reqwest::Client,
    url: &str,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<u64, UpdateError> {
    let network = |source: reqwest::Error| UpdateError::Network {
        url: url.to_string(),
        source,
    };

    let mut resp = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
        resp = http.get(url).header("User-Agent", USER_AGENT).send() => resp.map_err(network)?,
    };

    if resp.status() != StatusCode::OK {
        return Err(UpdateError::HttpStatus {
            url: url.to_string(),
            status: resp.status().as_u16(),
        });
    }

    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| UpdateError::fs("create", dest, e))?;

    let mut written = 0u64;
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
            chunk = resp.chunk() => chunk.map_err(network)?,
        };
        let Some(chunk) = chunk else { break };
        file.write_all(&chunk)
            .await
            .map_err(|e| UpdateError::fs("write", dest, e))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| UpdateError::fs("flush", dest, e))?;

    debug!(url, bytes = written, path = %dest.display(), "download complete");
    Ok(written)
}

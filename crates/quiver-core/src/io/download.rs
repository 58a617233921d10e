//! Streaming artifact download.
//!
//! Artifacts are streamed chunk by chunk into a scratch file; nothing is
//! buffered in memory and nothing is extracted here. A failed download
//! removes its scratch file before returning.

use std::path::Path;

use futures::StreamExt;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Why an artifact could not be fetched.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// 403 or 404: the artifact does not exist for this version.
    #[error("asset not found for this version ({url})")]
    NotFound {
        /// Requested URL.
        url: String,
    },

    /// Any other non-2xx response.
    #[error("bad HTTP response {status} from {url}")]
    Status {
        /// Requested URL.
        url: String,
        /// Status received.
        status: StatusCode,
    },

    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Writing the scratch file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Download `url` into `dest`, reporting `(bytes so far, total)` after each chunk.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Any transport failure or non-2xx status. `dest` does not exist afterwards.
pub async fn download_file(
    client: &Client,
    url: &str,
    dest: &Path,
    progress: impl Fn(u64, Option<u64>),
) -> Result<u64, DownloadError> {
    let result = stream_to_file(client, url, dest, progress).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(dest).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("failed to remove partial download {}: {e}", dest.display());
            }
        }
    }
    result
}

async fn stream_to_file(
    client: &Client,
    url: &str,
    dest: &Path,
    progress: impl Fn(u64, Option<u64>),
) -> Result<u64, DownloadError> {
    tracing::debug!("GET {url}");
    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
        return Err(DownloadError::NotFound {
            url: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status,
        });
    }

    let total = response.content_length();
    progress(0, total);

    let mut file = File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        progress(downloaded, total);
    }

    file.flush().await?;
    tracing::debug!("downloaded {downloaded} bytes to {}", dest.display());
    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[tokio::test]
    async fn test_download_writes_body_and_reports_progress() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/foo.tar.gz")
            .with_status(200)
            .with_body("archive bytes")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("foo.tar.gz");
        let last = AtomicU64::new(0);
        let written = download_file(
            &Client::new(),
            &format!("{}/foo.tar.gz", server.url()),
            &dest,
            |current, _| last.store(current, Ordering::SeqCst),
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert_eq!(written, 13);
        assert_eq!(last.load(Ordering::SeqCst), 13);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "archive bytes");
    }

    #[tokio::test]
    async fn test_not_found_and_forbidden_are_distinct() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/private")
            .with_status(403)
            .create_async()
            .await;
        server
            .mock("GET", "/broken")
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("artifact");
        let client = Client::new();

        for path in ["/missing", "/private"] {
            let err = download_file(&client, &format!("{}{path}", server.url()), &dest, |_, _| {})
                .await
                .unwrap_err();
            assert!(matches!(err, DownloadError::NotFound { .. }));
        }

        let err = download_file(&client, &format!("{}/broken", server.url()), &dest, |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DownloadError::Status {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                ..
            }
        ));
        assert!(!dest.exists());
    }
}

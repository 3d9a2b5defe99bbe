//! Source Downloader
//!
//! Fetches the pjproject release archive into the staging workspace.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use reqwest::Client;
use sha2::{Sha256, Digest};
use tracing::{info, debug, warn};

/// Download progress callback
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Download error types
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("Extraction failed: {0}")]
    Extraction(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<DownloadError> for pjbuild_core::PjBuildError {
    fn from(err: DownloadError) -> Self {
        use pjbuild_core::PjBuildError;
        match err {
            DownloadError::Network(e) => PjBuildError::Network(e.to_string()),
            DownloadError::Io(e) => PjBuildError::Io(e),
            DownloadError::Extraction(msg) => PjBuildError::Extraction(msg),
            other => PjBuildError::Download(other.to_string()),
        }
    }
}

/// What the fetch stage did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The archive was already present; nothing was transferred
    Cached,
    /// The archive was downloaded
    Downloaded { bytes: u64 },
}

/// Downloads the source archive once and reuses it afterwards
pub struct SourceFetcher {
    client: Client,
    url: String,
    sha256: Option<String>,
}

impl SourceFetcher {
    /// Create a fetcher for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            sha256: None,
        }
    }

    /// Verify the downloaded archive against a SHA-256 digest
    pub fn with_sha256(mut self, digest: Option<String>) -> Self {
        self.sha256 = digest.map(|d| d.to_lowercase());
        self
    }

    /// URL this fetcher downloads from
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Make sure the archive exists at `target`.
    ///
    /// A regular file already at `target` is trusted as-is: no request is
    /// made and its bytes are left untouched.
    pub async fn fetch(
        &self,
        target: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<FetchOutcome, DownloadError> {
        if tokio::fs::metadata(target).await.map(|m| m.is_file()).unwrap_or(false) {
            info!("pjsip already downloaded");
            return Ok(FetchOutcome::Cached);
        }

        let bytes = self.download_file(target, progress).await?;

        if let Some(ref expected) = self.sha256 {
            let actual = Self::file_sha256(target).await?;
            if &actual != expected {
                warn!("Checksum mismatch: expected {}, got {}", expected, actual);
                tokio::fs::remove_file(target).await?;
                return Err(DownloadError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
            debug!("Checksum verified");
        }

        Ok(FetchOutcome::Downloaded { bytes })
    }

    /// Stream the response body to `<target>.part`, then rename it into place
    async fn download_file(
        &self,
        target: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<u64, DownloadError> {
        info!("Downloading {} to {:?}", self.url, target);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(DownloadError::InvalidResponse(
                format!("HTTP {}", response.status())
            ));
        }

        let total_size = response.content_length().unwrap_or(0);
        let partial = partial_path(target);
        let downloaded = save_stream(response.bytes_stream(), &partial, total_size, progress.as_ref()).await?;
        tokio::fs::rename(&partial, target).await?;

        info!("{} bytes copied to {:?}", downloaded, target);
        Ok(downloaded)
    }

    /// SHA-256 of a file as lowercase hex
    pub async fn file_sha256(path: &Path) -> Result<String, DownloadError> {
        let data = tokio::fs::read(path).await?;
        let mut hasher = Sha256::new();
        hasher.update(&data);
        Ok(hex::encode(hasher.finalize()))
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    target.with_file_name(name)
}

/// Write every chunk of `stream` to `partial`. On any read or write error
/// the partial file is removed.
async fn save_stream<S, B, E>(
    stream: S,
    partial: &Path,
    total_size: u64,
    progress: Option<&ProgressCallback>,
) -> Result<u64, DownloadError>
where
    S: futures::Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<DownloadError>,
{
    let result = write_chunks(stream, partial, total_size, progress).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(partial).await;
    }
    result
}

async fn write_chunks<S, B, E>(
    stream: S,
    partial: &Path,
    total_size: u64,
    progress: Option<&ProgressCallback>,
) -> Result<u64, DownloadError>
where
    S: futures::Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<DownloadError>,
{
    use futures::StreamExt;

    let mut stream = std::pin::pin!(stream);
    let mut file = tokio::fs::File::create(partial).await?;
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::into)?;
        file.write_all(chunk.as_ref()).await?;
        downloaded += chunk.as_ref().len() as u64;

        if let Some(callback) = progress {
            callback(downloaded, total_size);
        }
    }

    file.flush().await?;
    Ok(downloaded)
}

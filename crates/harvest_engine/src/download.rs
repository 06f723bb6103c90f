use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use harvest_logging::{harvest_debug, harvest_info, harvest_warn};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::fetch::{build_client, map_reqwest_error, FetchSettings};
use crate::persist::ensure_output_dir;
use crate::{DownloadProgress, FailureKind, FetchError, HarvestEvent, ProgressSink};

/// Write granularity and progress-report step.
pub const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub fetch: FetchSettings,
    /// Attempts for transient failures (timeouts, dropped connections).
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub source_url: String,
    pub target_path: PathBuf,
    pub expected_size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub path: PathBuf,
    pub bytes_written: u64,
    pub expected_size: Option<u64>,
    /// Lowercase hex SHA-256 of the bytes written.
    pub sha256: String,
}

/// Streams assets to disk. A file appears at the target path only once its
/// full body has been written, synced and verified.
#[derive(Debug, Clone)]
pub struct DownloadManager {
    client: reqwest::Client,
    settings: DownloadSettings,
}

impl DownloadManager {
    pub fn new(settings: DownloadSettings) -> Result<Self, FetchError> {
        Ok(Self {
            client: build_client(&settings.fetch)?,
            settings,
        })
    }

    pub async fn fetch(
        &self,
        item_id: &str,
        asset_url: &str,
        target_path: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadReport, FetchError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch_once(item_id, asset_url, target_path, sink).await {
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    harvest_warn!(
                        "Download of item {} failed (attempt {}/{}): {}",
                        item_id,
                        attempt,
                        max_attempts,
                        err
                    );
                    attempt += 1;
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                result => return result,
            }
        }
    }

    async fn fetch_once(
        &self,
        item_id: &str,
        asset_url: &str,
        target_path: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadReport, FetchError> {
        let parsed = reqwest::Url::parse(asset_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let dir = target_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let task = DownloadTask {
            source_url: asset_url.to_string(),
            target_path: target_path.to_path_buf(),
            expected_size: response.content_length(),
        };
        harvest_debug!("Streaming {:?}", task);

        ensure_output_dir(dir).map_err(|err| FetchError::new(FailureKind::Io, err.to_string()))?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(io_error)?;
        let mut hasher = Sha256::new();
        let mut written: u64 = 0;
        let report = |bytes| {
            sink.emit(HarvestEvent::Progress(DownloadProgress {
                item_id: item_id.to_string(),
                bytes,
                total: task.expected_size,
            }))
        };
        report(0);

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            for piece in chunk.chunks(CHUNK_SIZE) {
                tmp.write_all(piece).map_err(io_error)?;
                hasher.update(piece);
                written += piece.len() as u64;
                report(written);
            }
        }

        tmp.flush().map_err(io_error)?;
        tmp.as_file_mut().sync_all().map_err(io_error)?;
        let on_disk = tmp.as_file().metadata().map_err(io_error)?.len();
        if on_disk != written {
            return Err(FetchError::new(
                FailureKind::Incomplete {
                    expected: written,
                    actual: on_disk,
                },
                "file size does not match bytes written",
            ));
        }
        if let Some(expected) = task.expected_size {
            if expected != written {
                return Err(FetchError::new(
                    FailureKind::Incomplete {
                        expected,
                        actual: written,
                    },
                    "body shorter or longer than declared",
                ));
            }
        }

        tmp.persist(target_path)
            .map_err(|err| io_error(err.error))?;

        let sha256 = hex(&hasher.finalize());
        harvest_info!(
            "Downloaded item {} to {:?} ({} bytes)",
            item_id,
            target_path,
            written
        );
        Ok(DownloadReport {
            path: target_path.to_path_buf(),
            bytes_written: written,
            expected_size: task.expected_size,
            sha256,
        })
    }
}

fn io_error(err: std::io::Error) -> FetchError {
    FetchError::new(FailureKind::Io, err.to_string())
}

fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

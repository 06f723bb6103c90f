use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use harvest_core::ProgressState;
use harvest_logging::{harvest_debug, harvest_info};
use serde::{Deserialize, Serialize};

use crate::persist::{AtomicFileWriter, PersistError};

pub const PROGRESS_FILENAME: &str = "progress.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedProgress {
    #[serde(default = "first_page")]
    current_page: u32,
    #[serde(default)]
    processed_urls: Vec<String>,
    #[serde(default)]
    total_downloaded: u64,
}

fn first_page() -> u32 {
    1
}

/// The single JSON document holding the resume point.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: PathBuf,
    writer: AtomicFileWriter,
    filename: String,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let dir = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| PROGRESS_FILENAME.to_string());
        Self {
            path: dir.join(&filename),
            writer: AtomicFileWriter::new(dir),
            filename,
        }
    }

    /// Store at `{dir}/progress.json`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(PROGRESS_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state, or a fresh one when no document exists yet.
    /// A document that exists but cannot be parsed is an error.
    pub fn load(&self) -> Result<ProgressState, PersistError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                harvest_info!("No progress file at {:?}; starting fresh", self.path);
                return Ok(ProgressState::new());
            }
            Err(err) => return Err(err.into()),
        };

        let persisted: PersistedProgress =
            serde_json::from_str(&content).map_err(|err| PersistError::Corrupt {
                path: self.path.clone(),
                message: err.to_string(),
            })?;

        let state = ProgressState::from_parts(
            persisted.current_page,
            persisted.processed_urls,
            persisted.total_downloaded,
        );
        harvest_info!(
            "Loaded progress from {:?}: page {}, {} processed, {} downloaded",
            self.path,
            state.current_page(),
            state.processed_urls().len(),
            state.total_downloaded()
        );
        Ok(state)
    }

    pub fn save(&self, state: &ProgressState) -> Result<(), PersistError> {
        let persisted = PersistedProgress {
            current_page: state.current_page(),
            processed_urls: state.processed_urls().to_vec(),
            total_downloaded: state.total_downloaded(),
        };
        let content = serde_json::to_vec_pretty(&persisted)?;
        self.writer.write(&self.filename, &content)?;
        harvest_debug!("Progress saved to {:?}", self.path);
        Ok(())
    }
}

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::persist::{ensure_output_dir, PersistError};

pub const METADATA_LOG_FILENAME: &str = "metadata.jsonl";

/// One line of the metadata log. Written only after the file it points at
/// is complete on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub page: u32,
    pub source_url: String,
    pub item_id: String,
    pub download_file: String,
    pub download_path: String,
    pub metadata: serde_json::Value,
    pub timestamp: String,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub sha256: Option<String>,
}

/// Append-only JSON Lines log of [`ItemRecord`]s.
#[derive(Debug, Clone)]
pub struct MetadataLog {
    path: PathBuf,
}

impl MetadataLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(METADATA_LOG_FILENAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &ItemRecord) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_output_dir(parent)?;
        }
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    /// Every record in the log, in append order. A missing log is empty.
    pub fn read_all(&self) -> Result<Vec<ItemRecord>, PersistError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let mut records = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|err| PersistError::Corrupt {
                path: self.path.clone(),
                message: format!("line {}: {err}", number + 1),
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use harvest_logging::harvest_info;
use serde::{Deserialize, Serialize};

pub const CONFIG_FILENAME: &str = "harvest.ron";

/// Run settings read from `harvest.ron`. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub target_downloads: u64,
    /// Per-kind state and files live under `<data_root>/<kind>/`.
    pub data_root: PathBuf,
    pub settle_delay_ms: u64,
    pub max_scrolls: u32,
    pub item_open_delay_ms: u64,
    pub browser_executable: Option<PathBuf>,
    pub headless: bool,
    pub max_pages: Option<u32>,
    /// Read click-through video metadata off the item page instead of the API.
    pub page_metadata: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            target_downloads: 100,
            data_root: PathBuf::from("data"),
            settle_delay_ms: 2000,
            max_scrolls: 50,
            item_open_delay_ms: 3000,
            browser_executable: None,
            headless: false,
            max_pages: None,
            page_metadata: false,
        }
    }
}

impl HarvestConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn item_open_delay(&self) -> Duration {
        Duration::from_millis(self.item_open_delay_ms)
    }

    pub fn kind_dir(&self, kind: &str) -> PathBuf {
        self.data_root.join(kind)
    }
}

/// Load the config at `explicit`, or `./harvest.ron` when no path is given.
/// Only the implicit default may be missing.
pub fn load_config(explicit: Option<&Path>) -> Result<HarvestConfig> {
    let path = explicit.unwrap_or_else(|| Path::new(CONFIG_FILENAME));
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound && explicit.is_none() => {
            return Ok(HarvestConfig::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("cannot read config file {path:?}"));
        }
    };

    let config: HarvestConfig =
        ron::from_str(&content).with_context(|| format!("invalid config file {path:?}"))?;
    harvest_info!("Loaded config from {:?}", path);
    Ok(config)
}

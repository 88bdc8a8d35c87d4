//! The data directory and its `config.json`.
//!
//! A data directory (by default `.tether` in the working directory) holds the
//! configuration, the index snapshot and the persisted access grants. It is created by
//! [`Config::init`] and must exist for every other operation.

use std::path::{Path, PathBuf};

use clap::crate_version;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::engine::WalkOptions;
use crate::error::{Error, Result};
use crate::persist::write_json;

pub const CONFIG_FILENAME: &str = "config.json";
pub const DEFAULT_DATA_DIR: &str = ".tether";

const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Identifies this data directory.
    pub id: Uuid,
    /// Format version of this file.
    pub version: u32,
    /// Version of the tool that created the directory.
    #[serde(default)]
    pub created_with: String,
    /// Skip entries whose name starts with `.` while walking trees.
    #[serde(default = "default_skip_hidden")]
    pub skip_hidden: bool,
    /// Stop descending below this many directory levels. `None` walks everything.
    #[serde(default)]
    pub max_depth: Option<usize>,
    /// Index snapshot, relative to the data directory.
    #[serde(default = "default_index_file")]
    pub index_file: PathBuf,
    /// Persisted grants, relative to the data directory.
    #[serde(default = "default_grants_file")]
    pub grants_file: PathBuf,
}

fn default_skip_hidden() -> bool {
    true
}

fn default_index_file() -> PathBuf {
    PathBuf::from("index.json")
}

fn default_grants_file() -> PathBuf {
    PathBuf::from("grants.json")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            id: Uuid::new_v4(),
            version: CONFIG_VERSION,
            created_with: crate_version!().to_string(),
            skip_hidden: default_skip_hidden(),
            max_depth: None,
            index_file: default_index_file(),
            grants_file: default_grants_file(),
        }
    }
}

impl Config {
    /// Creates `data_dir` if needed and writes a fresh configuration into it.
    ///
    /// Fails with [`Error::AlreadyInitialized`] if a configuration is already present.
    #[instrument(skip(data_dir), fields(data_dir = %data_dir.display()))]
    pub async fn init(data_dir: &Path) -> Result<Config> {
        let path = data_dir.join(CONFIG_FILENAME);
        if fs::try_exists(&path).await? {
            debug!("Refusing to overwrite existing configuration");
            return Err(Error::AlreadyInitialized(data_dir.to_path_buf()));
        }
        let config = Config::default();
        config.save(data_dir).await?;
        debug!("Initialized data directory");
        Ok(config)
    }

    /// Reads the configuration of an initialized data directory.
    #[instrument(skip(data_dir), fields(data_dir = %data_dir.display()))]
    pub async fn load(data_dir: &Path) -> Result<Config> {
        let path = data_dir.join(CONFIG_FILENAME);
        let content = fs::read(&path).await.map_err(|e| {
            warn!("Failed to read config file '{}': {}", path.display(), e);
            Error::InvalidConfig(path.clone())
        })?;
        serde_json::from_slice(&content).map_err(|e| {
            warn!("Failed to parse config file '{}': {}", path.display(), e);
            Error::InvalidConfig(path.clone())
        })
    }

    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        write_json(&data_dir.join(CONFIG_FILENAME), self).await?;
        Ok(())
    }

    pub fn index_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.index_file)
    }

    pub fn grants_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.grants_file)
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            skip_hidden: self.skip_hidden,
            max_depth: self.max_depth,
        }
    }
}

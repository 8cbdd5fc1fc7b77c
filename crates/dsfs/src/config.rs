//! Filesystem settings, loaded from TOML or JSON and overridden from the
//! command line.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::filesystem::DEFAULT_KIND;

/// Settings for opening a filesystem. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Store namespace; records in other namespaces are invisible.
    pub namespace: String,
    /// Entity kind records are stored as.
    pub kind: String,
    /// Snapshot file for the in-memory store. `None` keeps nothing on exit.
    pub store_path: Option<PathBuf>,
    /// Log at debug level.
    pub verbose: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            kind: String::from(DEFAULT_KIND),
            store_path: None,
            verbose: false,
        }
    }
}

impl FsConfig {
    /// Loads a `.toml` or `.json` config file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: FsConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: FsConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }
}

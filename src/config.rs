//! Configuration parsing.
//!
//! Datalab reads a single TOML file: the `[db]` table locates the SQLite
//! database and the optional `[export]` table supplies default
//! [`ExportOptions`] that command-line flags override.
//!
//! ```toml
//! [db]
//! path = "./data/datalab.sqlite"
//!
//! [export]
//! type = "pairs"
//! context = "window"
//! context_turns = 4
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::options::ExportOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub export: ExportOptions,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

impl Config {
    /// A config pointing at `db_path` with default export options.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig {
                path: db_path.into(),
            },
            export: ExportOptions::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    if let Some(id) = config.export.dataset_id {
        if id <= 0 {
            anyhow::bail!("export.dataset_id must be > 0 when set (got {})", id);
        }
    }

    Ok(config)
}

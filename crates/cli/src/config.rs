use anyhow::{Context, Result};
use catalog::ingest::DEFAULT_MAX_UPLOAD_BYTES;
use catalog::{IngestOptions, ThumbnailSize};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use viewer_core::SessionLimits;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const HOME_ENV: &str = "PDF_SHELF_HOME";

/// Optional overrides read from `config.toml` in the data root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub max_upload_bytes: Option<u64>,
    pub search_page_limit: Option<u32>,
    pub thumbnail_width: Option<u32>,
    pub thumbnail_height: Option<u32>,
    pub log_level: Option<String>,
}

impl Config {
    /// Reads the config file under `root`, or returns defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn ingest_options(&self) -> IngestOptions {
        let defaults = ThumbnailSize::default();

        IngestOptions {
            max_upload_bytes: self.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            thumbnail_size: ThumbnailSize {
                width_px: self.thumbnail_width.unwrap_or(defaults.width_px),
                height_px: self.thumbnail_height.unwrap_or(defaults.height_px),
            },
        }
    }

    pub fn session_limits(&self) -> SessionLimits {
        let defaults = SessionLimits::default();
        SessionLimits {
            search_page_limit: self.search_page_limit.unwrap_or(defaults.search_page_limit),
        }
    }
}

/// `--data-dir`, then `PDF_SHELF_HOME`, then the platform data directory.
pub fn resolve_data_root(flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path.to_owned());
    }

    if let Some(home) = std::env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(home));
    }

    storage::default_data_root().context("failed to locate a data directory")
}

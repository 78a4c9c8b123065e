use crate::error::AppError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// App configuration, loaded from `config.yaml`. Every field has a default
/// so a missing or partial file still yields a working setup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Region used for trending queries.
    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            catalog: CatalogConfig::default(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            region: default_region(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {}", e)))?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load `config.yaml` from `path` if present, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::info!("Using default config ({})", e);
                Config::default()
            }
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("earshot")
}

fn default_api_base() -> String {
    "https://api.earshot.fm/v1".to_string()
}

fn default_region() -> String {
    "us".to_string()
}

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::ZokuhenError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub cache: CacheConfig,
    pub finder: FinderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub url: String,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache directory; empty means the platform cache dir.
    pub dir: String,
    pub user_list_ttl_secs: u64,
    pub media_details_ttl_secs: u64,
}

impl CacheConfig {
    pub fn user_list_ttl(&self) -> Duration {
        Duration::from_secs(self.user_list_ttl_secs)
    }

    pub fn media_details_ttl(&self) -> Duration {
        Duration::from_secs(self.media_details_ttl_secs)
    }

    /// Resolved cache directory.
    pub fn resolved_dir(&self) -> PathBuf {
        if self.dir.is_empty() {
            AppConfig::project_dirs()
                .map(|d| d.cache_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".zokuhen-cache"))
        } else {
            PathBuf::from(&self.dir)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinderConfig {
    pub per_page: u32,
    pub batch_size: usize,
    pub list_concurrency: usize,
}

impl AppConfig {
    /// Load config: user file (if exists), else built-in defaults.
    pub fn load() -> Result<Self, ZokuhenError> {
        let user_path = Self::config_path();
        if user_path.exists() {
            let user_str = std::fs::read_to_string(&user_path)?;
            toml::from_str(&user_str).map_err(|e| ZokuhenError::Config(e.to_string()))
        } else {
            toml::from_str(DEFAULT_CONFIG).map_err(|e| ZokuhenError::Config(e.to_string()))
        }
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<(), ZokuhenError> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ZokuhenError::Config(e.to_string()))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "zokuhen")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

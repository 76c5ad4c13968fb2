use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use vouch_ranking::RankConfig;

/// Top-level configuration for the vouch tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VouchConfig {
    /// Default block database path.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Listen address for `vouch serve`.
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Ring bound for the audit partner search.
    #[serde(default = "default_max_audit_hops")]
    pub max_audit_hops: usize,

    /// Personalized PageRank tunables.
    #[serde(default)]
    pub ranking: RankConfig,
}

fn default_db_path() -> String {
    "vouch.db".to_string()
}

fn default_listen() -> String {
    "127.0.0.1:8088".to_string()
}

fn default_max_audit_hops() -> usize {
    10
}

impl Default for VouchConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            listen: default_listen(),
            max_audit_hops: default_max_audit_hops(),
            ranking: RankConfig::default(),
        }
    }
}

impl VouchConfig {
    /// Config file path within the state directory.
    pub fn config_path(state_dir: &Path) -> PathBuf {
        state_dir.join("config.toml")
    }

    /// Load config from disk. Returns default if not found.
    pub fn load(state_dir: &Path) -> Result<Self> {
        let path = Self::config_path(state_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to disk.
    pub fn save(&self, state_dir: &Path) -> Result<()> {
        let path = Self::config_path(state_dir);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&path, content).context("Failed to write config file")?;
        Ok(())
    }
}

/// Where the config lives: `~/.vouch` unless the home directory is unknown.
pub fn state_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".vouch"))
        .unwrap_or_else(|| PathBuf::from(".vouch"))
}

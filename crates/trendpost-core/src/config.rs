//! Configuration: optional YAML file, then environment overrides.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::TrendpostError;

pub const ENV_ADDR: &str = "TRENDPOST_ADDR";
pub const ENV_MODEL: &str = "TRENDPOST_MODEL";
pub const ENV_ORACLE_TIMEOUT: &str = "TRENDPOST_ORACLE_TIMEOUT_SECS";
pub const ENV_ARTIFACTS_DIR: &str = "TRENDPOST_ARTIFACTS_DIR";
pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendpostConfig {
    pub listen_addr: String,
    pub artifacts_dir: PathBuf,
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub api_base: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for TrendpostConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8788".to_string(),
            artifacts_dir: PathBuf::from("artifacts"),
            oracle: OracleConfig::default(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_base: "https://openrouter.ai/api/v1".to_string(),
            model: "openai/gpt-4o".to_string(),
            timeout_secs: 60,
            temperature: 0.7,
            max_tokens: 2048,
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl TrendpostConfig {
    pub fn from_yaml(content: &str) -> Result<Self, TrendpostError> {
        serde_yaml::from_str(content).map_err(|e| TrendpostError::Config(e.to_string()))
    }

    /// Read `path` if given (defaults otherwise), then apply process env.
    pub fn load(path: Option<&Path>) -> Result<Self, TrendpostError> {
        let base = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| TrendpostError::Config(format!("{}: {}", path.display(), e)))?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };
        base.with_env(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, TrendpostError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(ENV_ADDR) {
            self.listen_addr = addr;
        }
        if let Some(model) = lookup(ENV_MODEL) {
            self.oracle.model = model;
        }
        if let Some(secs) = lookup(ENV_ORACLE_TIMEOUT) {
            self.oracle.timeout_secs = secs.trim().parse().map_err(|_| {
                TrendpostError::Config(format!("{} must be whole seconds, got {:?}", ENV_ORACLE_TIMEOUT, secs))
            })?;
        }
        if let Some(dir) = lookup(ENV_ARTIFACTS_DIR) {
            self.artifacts_dir = PathBuf::from(dir);
        }
        Ok(self)
    }
}

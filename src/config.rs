//! TOML configuration
//!
//! Every section is optional; a missing file section falls back to defaults.

use crate::cache::DEFAULT_CACHE_TTL_SECS;
use crate::classifier::FeatureMissingPolicy;
use crate::posture::PostureNames;
use chrono::FixedOffset;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/posture-flux.toml";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub pipeline: Option<PipelineSection>,
    #[serde(default)]
    pub model: Option<ModelSection>,
    /// Posture code -> display name
    #[serde(default)]
    pub names: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PipelineSection {
    pub feature_missing_policy: Option<FeatureMissingPolicy>,
    /// Offset of the chair's local clock from UTC, in minutes
    pub utc_offset_minutes: Option<i32>,
    /// Staleness window for the cached raw table (default: 60)
    pub cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelSection {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse(&contents)
}

/// Parse and validate configuration text
pub fn parse(contents: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(contents)?;
    config.utc_offset()?;
    Ok(config)
}

impl Config {
    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .map(|l| l.level.as_str())
            .unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn feature_missing_policy(&self) -> FeatureMissingPolicy {
        self.pipeline
            .as_ref()
            .and_then(|p| p.feature_missing_policy)
            .unwrap_or_default()
    }

    /// Fixed offset used for naive timestamps, calendar days and hours
    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        let minutes = self
            .pipeline
            .as_ref()
            .and_then(|p| p.utc_offset_minutes)
            .unwrap_or(0);
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::Invalid(format!("utc_offset_minutes out of range: {minutes}"))
            })
    }

    /// Returns the cache staleness window (default: 60 seconds)
    pub fn cache_ttl(&self) -> Duration {
        let secs = self
            .pipeline
            .as_ref()
            .and_then(|p| p.cache_ttl_secs)
            .unwrap_or(DEFAULT_CACHE_TTL_SECS);
        Duration::from_secs(secs)
    }

    pub fn model_path(&self) -> Option<&Path> {
        let path = self.model.as_ref()?.path.as_deref()?;
        if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        }
    }

    pub fn posture_names(&self) -> PostureNames {
        PostureNames::from(self.names.clone())
    }
}

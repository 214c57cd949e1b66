//! Main application configuration
//!
//! This module defines the primary configuration structures for the war-room
//! matchmaking core, including environment variable loading and validation.

use crate::config::matching::MatchingConfig;
use crate::types::MatchDomain;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matching: MatchingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Game mode served by this matcher
    pub mode: String,
    /// Client version served by this matcher
    pub version: String,
    /// Capacity of the completed-room channel
    pub result_buffer_size: usize,
    /// Capacity of the cycle error channel
    pub error_buffer_size: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "war-room".to_string(),
            log_level: "info".to_string(),
            shutdown_timeout_seconds: 30,
            mode: "ranked".to_string(),
            version: "1".to_string(),
            result_buffer_size: 1024,
            error_buffer_size: 64,
        }
    }
}

/// Parse an environment variable into `target` when it is set
fn env_override<T: std::str::FromStr>(key: &str, target: &mut T) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *target = raw
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw))?;
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        env_override("SERVICE_NAME", &mut self.service.name)?;
        env_override("LOG_LEVEL", &mut self.service.log_level)?;
        env_override(
            "SHUTDOWN_TIMEOUT_SECONDS",
            &mut self.service.shutdown_timeout_seconds,
        )?;
        env_override("MATCH_MODE", &mut self.service.mode)?;
        env_override("MATCH_VERSION", &mut self.service.version)?;
        env_override("RESULT_BUFFER_SIZE", &mut self.service.result_buffer_size)?;

        // Matching settings
        let matching = &mut self.matching;
        env_override("MATCH_TIMEOUT_SEC", &mut matching.match_timeout_sec)?;
        env_override("SQUAD_PLAYER_LIMIT", &mut matching.squad_player_limit)?;
        env_override("ROOM_SIDE_COUNT", &mut matching.room_side_count)?;
        env_override("NEWER_WITH_NEWER", &mut matching.newer_with_newer)?;
        env_override(
            "UNFRIENDLY_VARIANCE_MIN",
            &mut matching.unfriendly_variance_min,
        )?;
        env_override("MALICIOUS_VARIANCE_MIN", &mut matching.malicious_variance_min)?;
        env_override(
            "NORMAL_TEAM_WAIT_TIME_SEC",
            &mut matching.normal_team_wait_time_sec,
        )?;
        env_override(
            "UNFRIENDLY_TEAM_WAIT_TIME_SEC",
            &mut matching.unfriendly_team_wait_time_sec,
        )?;
        env_override(
            "MALICIOUS_TEAM_WAIT_TIME_SEC",
            &mut matching.malicious_team_wait_time_sec,
        )?;
        env_override("TICK_INTERVAL_MS", &mut matching.tick_interval_ms)?;
        env_override("CONFIG_REFRESH_CYCLES", &mut matching.config_refresh_cycles)?;

        Ok(())
    }

    /// Matching domain served by this configuration
    pub fn domain(&self) -> MatchDomain {
        MatchDomain::new(self.service.mode.clone(), self.service.version.clone())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.service.mode.is_empty() || config.service.version.is_empty() {
        return Err(anyhow!("Match mode and version cannot be empty"));
    }
    if config.service.result_buffer_size == 0 || config.service.error_buffer_size == 0 {
        return Err(anyhow!("Channel buffer sizes must be greater than 0"));
    }

    config.matching.validate()?;

    Ok(())
}

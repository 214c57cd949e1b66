//! Configuration providers
//!
//! The matcher never owns its policy values; it pulls them through a
//! [`ConfigProvider`] so operators can hot-reload thresholds and the fairness
//! ladder without restarting the service.

use crate::config::app::AppConfig;
use crate::config::matching::MatchingConfig;
use crate::error::{MatchmakingError, Result};
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::info;

/// Accessor for the current matching configuration
#[cfg_attr(test, mockall::automock)]
pub trait ConfigProvider: Send + Sync {
    /// Pull the current configuration
    fn matching_config(&self) -> Result<MatchingConfig>;
}

/// Pull a configuration and reject it unless it validates
pub fn load_validated(provider: &dyn ConfigProvider) -> Result<MatchingConfig> {
    let config = provider.matching_config().map_err(|e| {
        anyhow::Error::from(MatchmakingError::config(format!(
            "Failed to load matching configuration: {}",
            e
        )))
    })?;
    config.validate()?;
    Ok(config)
}

/// Provider that always returns the same configuration
#[derive(Debug, Clone, Default)]
pub struct StaticConfigProvider {
    config: MatchingConfig,
}

impl StaticConfigProvider {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn matching_config(&self) -> Result<MatchingConfig> {
        Ok(self.config.clone())
    }
}

/// Provider whose configuration can be swapped at runtime
#[derive(Debug, Default)]
pub struct ReloadableConfigProvider {
    config: RwLock<MatchingConfig>,
}

impl ReloadableConfigProvider {
    pub fn new(config: MatchingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: RwLock::new(config),
        })
    }

    /// Replace the configuration; invalid configurations are rejected
    pub fn update(&self, config: MatchingConfig) -> Result<()> {
        config.validate()?;
        let mut current = self
            .config
            .write()
            .map_err(|_| MatchmakingError::internal("Failed to acquire config write lock"))?;
        *current = config;
        info!("Matching configuration updated");
        Ok(())
    }
}

impl ConfigProvider for ReloadableConfigProvider {
    fn matching_config(&self) -> Result<MatchingConfig> {
        let config = self
            .config
            .read()
            .map_err(|_| MatchmakingError::internal("Failed to acquire config read lock"))?;
        Ok(config.clone())
    }
}

/// Provider that re-reads a TOML application config file on every pull
#[derive(Debug, Clone)]
pub struct FileConfigProvider {
    path: PathBuf,
}

impl FileConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigProvider for FileConfigProvider {
    fn matching_config(&self) -> Result<MatchingConfig> {
        Ok(AppConfig::from_file(&self.path)?.matching)
    }
}

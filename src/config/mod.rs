//! Configuration management for the war-room matchmaking core
//!
//! This module handles configuration loading from files and environment
//! variables, validation, default values, and the providers through which the
//! matcher pulls hot-reloadable policy.

pub mod app;
pub mod matching;
pub mod provider;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings};
pub use matching::MatchingConfig;
pub use provider::{
    load_validated, ConfigProvider, FileConfigProvider, ReloadableConfigProvider,
    StaticConfigProvider,
};

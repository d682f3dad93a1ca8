//! Configuration management for the match-director service
//!
//! This module handles configuration loading from environment variables and
//! TOML files, validation, and default values.

pub mod app;
pub mod scenario;

// Re-export commonly used types
pub use app::{
    validate_config, AppConfig, DirectorSettings, FrontendSettings, MatchmakingSettings,
    ServiceSettings, SimulationSettings,
};
pub use scenario::{GameModeSettings, PasswordQueueSettings, Scenario};

//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! match-director service, including environment variable loading, TOML file
//! loading and validation. The resulting [`AppConfig`] is built once at
//! startup and passed by reference to every component.

use crate::config::scenario::Scenario;
use crate::matchfunction::grouping::{GroupingPolicy, DEFAULT_BEST_REGION_MAX_PING};
use crate::store::DEFAULT_ASSIGNMENT_RETENTION;
use crate::ticket::random::SimulationMode;
use crate::ticket::region::DEFAULT_PING_THRESHOLD;
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
    pub matchmaking: MatchmakingSettings,
    pub simulation: SimulationSettings,
    pub director: DirectorSettings,
    pub frontend: FrontendSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for the metrics and health endpoints
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Matching engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Which grouping policy the match function runs
    pub grouping_policy: GroupingPolicy,
    /// Latency cap applied to a ticket's best region when scoring
    pub best_region_max_ping: f64,
    /// Regions with ping strictly below this are acceptable to a ticket
    pub region_ping_threshold: f64,
    /// Search space partitioned into profiles
    pub scenario: Scenario,
}

/// Client simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub mode: SimulationMode,
    /// Seed for the ticket generator; random when unset
    pub rng_seed: Option<u64>,
    /// Skills are drawn from [0, skill_range)
    pub skill_range: f64,
    /// Pings are drawn from [0, ping_range)
    pub ping_range: f64,
    /// Chance that a client queues with the configured password
    pub password_probability: f64,
    /// Chance that a client is flagged as a beginner
    pub beginner_probability: f64,
}

/// Director polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorSettings {
    /// Interval between fetch-and-assign cycles in milliseconds
    pub poll_interval_ms: u64,
    /// Maximum number of profiles fetched concurrently
    pub max_concurrent_fetches: usize,
    /// Port appended to generated game server addresses
    pub assignment_port: u16,
    /// Most recent assignments the store remembers for re-assignment
    pub assignment_retention: usize,
}

/// Ticket ingestion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendSettings {
    /// Enable the ticket ingestion loop
    pub enabled: bool,
    /// Tickets created per batch
    pub tickets_per_batch: usize,
    /// Interval between batches in milliseconds
    pub batch_interval_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "match-director".to_string(),
            log_level: "info".to_string(),
            metrics_port: 9090,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            grouping_policy: GroupingPolicy::Skill,
            best_region_max_ping: DEFAULT_BEST_REGION_MAX_PING,
            region_ping_threshold: DEFAULT_PING_THRESHOLD,
            scenario: Scenario::default(),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            mode: SimulationMode::All,
            rng_seed: None,
            skill_range: 500.0,
            ping_range: 500.0,
            password_probability: 0.2,
            beginner_probability: 0.0,
        }
    }
}

impl Default for DirectorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
            max_concurrent_fetches: 64,
            assignment_port: 2222,
            assignment_retention: DEFAULT_ASSIGNMENT_RETENTION,
        }
    }
}

impl Default for FrontendSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            tickets_per_batch: 20,
            batch_interval_ms: 1000,
        }
    }
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
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(port) = env::var("METRICS_PORT") {
            self.service.metrics_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid METRICS_PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Matchmaking settings
        if let Ok(policy) = env::var("GROUPING_POLICY") {
            self.matchmaking.grouping_policy = policy
                .parse()
                .map_err(|_| anyhow!("Invalid GROUPING_POLICY value: {}", policy))?;
        }
        if let Ok(cap) = env::var("BEST_REGION_MAX_PING") {
            self.matchmaking.best_region_max_ping = cap
                .parse()
                .map_err(|_| anyhow!("Invalid BEST_REGION_MAX_PING value: {}", cap))?;
        }
        if let Ok(threshold) = env::var("REGION_PING_THRESHOLD") {
            self.matchmaking.region_ping_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("Invalid REGION_PING_THRESHOLD value: {}", threshold))?;
        }

        // Simulation settings
        if let Ok(mode) = env::var("SIMULATION_MODE") {
            self.simulation.mode = mode
                .parse()
                .map_err(|_| anyhow!("Invalid SIMULATION_MODE value: {}", mode))?;
        }
        if let Ok(seed) = env::var("RNG_SEED") {
            self.simulation.rng_seed = Some(
                seed.parse()
                    .map_err(|_| anyhow!("Invalid RNG_SEED value: {}", seed))?,
            );
        }

        // Director settings
        if let Ok(interval) = env::var("POLL_INTERVAL_MS") {
            self.director.poll_interval_ms = interval
                .parse()
                .map_err(|_| anyhow!("Invalid POLL_INTERVAL_MS value: {}", interval))?;
        }
        if let Ok(max_fetches) = env::var("MAX_CONCURRENT_FETCHES") {
            self.director.max_concurrent_fetches = max_fetches
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_CONCURRENT_FETCHES value: {}", max_fetches))?;
        }
        if let Ok(port) = env::var("ASSIGNMENT_PORT") {
            self.director.assignment_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid ASSIGNMENT_PORT value: {}", port))?;
        }
        if let Ok(retention) = env::var("ASSIGNMENT_RETENTION") {
            self.director.assignment_retention = retention
                .parse()
                .map_err(|_| anyhow!("Invalid ASSIGNMENT_RETENTION value: {}", retention))?;
        }

        // Frontend settings
        if let Ok(batch) = env::var("TICKETS_PER_BATCH") {
            self.frontend.tickets_per_batch = batch
                .parse()
                .map_err(|_| anyhow!("Invalid TICKETS_PER_BATCH value: {}", batch))?;
        }
        if let Ok(interval) = env::var("BATCH_INTERVAL_MS") {
            self.frontend.batch_interval_ms = interval
                .parse()
                .map_err(|_| anyhow!("Invalid BATCH_INTERVAL_MS value: {}", interval))?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get director poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.director.poll_interval_ms)
    }

    /// Get ticket batch interval as Duration
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.frontend.batch_interval_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.metrics_port == 0 {
        return Err(anyhow!("Metrics port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate matchmaking settings
    if config.matchmaking.best_region_max_ping <= 0.0 {
        return Err(anyhow!("Best region max ping must be positive"));
    }
    if config.matchmaking.region_ping_threshold <= 0.0 {
        return Err(anyhow!("Region ping threshold must be positive"));
    }
    config.matchmaking.scenario.validate()?;

    // Validate simulation settings
    if config.simulation.skill_range <= 0.0 || config.simulation.ping_range <= 0.0 {
        return Err(anyhow!("Simulation skill and ping ranges must be positive"));
    }
    for (name, p) in [
        ("password", config.simulation.password_probability),
        ("beginner", config.simulation.beginner_probability),
    ] {
        if !(0.0..=1.0).contains(&p) {
            return Err(anyhow!("Invalid {} probability: {}", name, p));
        }
    }

    // Validate loop settings
    if config.director.poll_interval_ms == 0 {
        return Err(anyhow!("Poll interval must be greater than 0"));
    }
    if config.director.max_concurrent_fetches == 0 {
        return Err(anyhow!("Max concurrent fetches must be greater than 0"));
    }
    if config.director.assignment_retention == 0 {
        return Err(anyhow!("Assignment retention must be greater than 0"));
    }
    if config.frontend.tickets_per_batch == 0 {
        return Err(anyhow!("Tickets per batch must be greater than 0"));
    }
    if config.frontend.batch_interval_ms == 0 {
        return Err(anyhow!("Batch interval must be greater than 0"));
    }

    Ok(())
}

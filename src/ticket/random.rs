//! Random client state for the ticket simulation
//!
//! The generator draws every value from an injected [`Rng`], so a seeded
//! `StdRng` reproduces the same stream of clients.

use crate::config::AppConfig;
use crate::error::{MatchmakingError, Result};
use crate::types::{ClientMatchmakingData, ClientRegionData, TRUSTED_FALSE, TRUSTED_TRUE};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// How much variety the simulated clients have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// Random trust, passwords, skill and pings
    All,
    /// Only skill varies; everyone is trusted and pings are zero
    OnlySkill,
}

impl std::fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimulationMode::All => write!(f, "all"),
            SimulationMode::OnlySkill => write!(f, "only_skill"),
        }
    }
}

impl FromStr for SimulationMode {
    type Err = MatchmakingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(SimulationMode::All),
            "only_skill" | "onlyskill" => Ok(SimulationMode::OnlySkill),
            _ => Err(MatchmakingError::ConfigurationError {
                message: format!("Unknown simulation mode: {}", s),
            }),
        }
    }
}

/// Everything the generator needs to know about the simulated population
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub mode: SimulationMode,
    pub game_modes: Vec<String>,
    pub regions: Vec<String>,
    /// Tag used for private queueing; `None` disables passwords
    pub password: Option<String>,
    pub skill_range: f64,
    pub ping_range: f64,
    pub password_probability: f64,
    pub beginner_probability: f64,
}

impl GeneratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let scenario = &config.matchmaking.scenario;
        Self {
            mode: config.simulation.mode,
            game_modes: scenario.mode_names(),
            regions: scenario.regions.clone(),
            password: scenario.active_passwords.first().cloned(),
            skill_range: config.simulation.skill_range,
            ping_range: config.simulation.ping_range,
            password_probability: config.simulation.password_probability,
            beginner_probability: config.simulation.beginner_probability,
        }
    }
}

/// Produces random [`ClientMatchmakingData`]
#[derive(Debug)]
pub struct ClientDataGenerator<R: Rng> {
    settings: GeneratorSettings,
    rng: R,
}

impl<R: Rng> ClientDataGenerator<R> {
    pub fn new(settings: GeneratorSettings, rng: R) -> Result<Self> {
        if settings.game_modes.is_empty() {
            return Err(MatchmakingError::ConfigurationError {
                message: "Client generator needs at least one game mode".to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&settings.password_probability)
            || !(0.0..=1.0).contains(&settings.beginner_probability)
        {
            return Err(MatchmakingError::ConfigurationError {
                message: "Generator probabilities must lie in [0, 1]".to_string(),
            }
            .into());
        }

        Ok(Self { settings, rng })
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Draw one complete client
    pub fn generate(&mut self) -> ClientMatchmakingData {
        let trusted = self.find_trusted_state();
        let password = self.find_password();
        let skill = self.find_skill();
        let game_mode = self.find_game_mode();
        let beginner = self.find_beginner();

        let mut pings = BTreeMap::new();
        for region in self.settings.regions.clone() {
            let ping = self.find_region_ping();
            pings.insert(region, ping);
        }

        ClientMatchmakingData {
            region_data: ClientRegionData { pings },
            trusted,
            password,
            skill,
            game_mode,
            beginner,
        }
    }

    pub fn find_game_mode(&mut self) -> String {
        self.settings
            .game_modes
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_default()
    }

    pub fn find_trusted_state(&mut self) -> String {
        match self.settings.mode {
            SimulationMode::All => {
                if self.rng.gen_bool(0.5) {
                    TRUSTED_TRUE.to_string()
                } else {
                    TRUSTED_FALSE.to_string()
                }
            }
            SimulationMode::OnlySkill => TRUSTED_TRUE.to_string(),
        }
    }

    /// The password tag, or an empty string when the client queues publicly
    pub fn find_password(&mut self) -> String {
        match (&self.settings.password, self.settings.mode) {
            (Some(password), SimulationMode::All) => {
                if self.rng.gen_bool(self.settings.password_probability) {
                    password.clone()
                } else {
                    String::new()
                }
            }
            _ => String::new(),
        }
    }

    pub fn find_skill(&mut self) -> f64 {
        self.rng.gen::<f64>() * self.settings.skill_range
    }

    pub fn find_region_ping(&mut self) -> f64 {
        match self.settings.mode {
            SimulationMode::All => self.rng.gen::<f64>() * self.settings.ping_range,
            SimulationMode::OnlySkill => 0.0,
        }
    }

    pub fn find_beginner(&mut self) -> bool {
        match self.settings.mode {
            SimulationMode::All => self.rng.gen_bool(self.settings.beginner_probability),
            SimulationMode::OnlySkill => false,
        }
    }
}

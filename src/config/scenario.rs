//! Matchmaking scenario configuration
//!
//! Describes the search space the profile generator partitions: which regions
//! exist, which game modes are played and how each mode is bracketed, plus
//! the private passwords that get their own queues.

use crate::error::{MatchmakingError, Result};
use serde::{Deserialize, Serialize};

/// Per-mode matchmaking parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameModeSettings {
    /// Mode name, also used as the ticket tag
    pub name: String,
    /// Ascending skill boundaries; each adjacent pair forms one bracket
    pub skill_boundaries: Vec<f64>,
    /// Overlap between adjacent brackets (each bracket widens by half of it on both sides)
    pub max_skill_difference: f64,
    /// Whether a separate trusted queue is generated
    pub trusted_queues: bool,
    /// Players per match
    pub players_per_game: usize,
    /// Maximum skill spread tolerated inside one match
    pub skill_diff_band: f64,
    /// Mode supports adding players to an in-progress match
    pub backfill: bool,
    /// Whether a beginner-only variant is generated
    pub beginner: bool,
}

impl GameModeSettings {
    /// Mode with the stock parameters used by the simulation
    pub fn standard(name: &str) -> Self {
        Self {
            name: name.to_string(),
            skill_boundaries: vec![0.0, 500.0, 1500.0],
            max_skill_difference: 50.0,
            trusted_queues: true,
            players_per_game: 16,
            skill_diff_band: 50.0,
            backfill: true,
            beginner: false,
        }
    }
}

/// Parameters recorded on password (private) profiles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordQueueSettings {
    pub players_per_game: usize,
    pub skill_diff_band: f64,
}

impl Default for PasswordQueueSettings {
    fn default() -> Self {
        Self {
            players_per_game: 16,
            skill_diff_band: 1000.0,
        }
    }
}

/// The full search space handed to the profile generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub regions: Vec<String>,
    pub modes: Vec<GameModeSettings>,
    pub active_passwords: Vec<String>,
    pub password_queue: PasswordQueueSettings,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            regions: vec!["europe".to_string(), "us".to_string()],
            modes: ["bank_it", "quick_cash", "tournament_unranked", "tournament_ranked"]
                .iter()
                .map(|name| GameModeSettings::standard(name))
                .collect(),
            active_passwords: vec!["password".to_string()],
            password_queue: PasswordQueueSettings::default(),
        }
    }
}

impl Scenario {
    /// Names of all configured modes, in configuration order
    pub fn mode_names(&self) -> Vec<String> {
        self.modes.iter().map(|m| m.name.clone()).collect()
    }

    /// Validate the scenario before profiles are generated from it
    pub fn validate(&self) -> Result<()> {
        if self.regions.is_empty() {
            return Err(config_error("Scenario must declare at least one region"));
        }
        if self.regions.iter().any(|r| r.is_empty()) {
            return Err(config_error("Region names cannot be empty"));
        }
        if self.modes.is_empty() {
            return Err(config_error("Scenario must declare at least one game mode"));
        }

        for mode in &self.modes {
            if mode.name.is_empty() {
                return Err(config_error("Game mode names cannot be empty"));
            }
            if mode.skill_boundaries.len() < 2 {
                return Err(config_error(&format!(
                    "Mode {} needs at least two skill boundaries",
                    mode.name
                )));
            }
            if mode.skill_boundaries.windows(2).any(|w| w[0] >= w[1]) {
                return Err(config_error(&format!(
                    "Mode {} skill boundaries must be strictly ascending",
                    mode.name
                )));
            }
            if mode.players_per_game == 0 {
                return Err(config_error(&format!(
                    "Mode {} must have at least one player per game",
                    mode.name
                )));
            }
            if mode.skill_diff_band <= 0.0 {
                return Err(config_error(&format!(
                    "Mode {} skill band must be positive",
                    mode.name
                )));
            }
            if mode.max_skill_difference < 0.0 {
                return Err(config_error(&format!(
                    "Mode {} max skill difference cannot be negative",
                    mode.name
                )));
            }
        }

        if self.active_passwords.iter().any(|p| p.is_empty()) {
            return Err(config_error("Active passwords cannot be empty"));
        }
        if self.password_queue.players_per_game == 0 {
            return Err(config_error(
                "Password queue must have at least one player per game",
            ));
        }

        Ok(())
    }
}

fn config_error(message: &str) -> anyhow::Error {
    MatchmakingError::ConfigurationError {
        message: message.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scenario() {
        let scenario = Scenario::default();
        assert_eq!(scenario.regions, vec!["europe", "us"]);
        assert_eq!(scenario.modes.len(), 4);
        assert_eq!(scenario.active_passwords, vec!["password"]);
        assert!(scenario.validate().is_ok());

        let mode = &scenario.modes[0];
        assert_eq!(mode.name, "bank_it");
        assert_eq!(mode.players_per_game, 16);
        assert!(mode.trusted_queues);
        assert!(!mode.beginner);
    }

    #[test]
    fn test_scenario_validation() {
        let mut scenario = Scenario::default();
        scenario.regions.clear();
        assert!(scenario.validate().is_err());

        let mut scenario = Scenario::default();
        scenario.modes[1].skill_boundaries = vec![0.0];
        assert!(scenario.validate().is_err());

        let mut scenario = Scenario::default();
        scenario.modes[0].skill_boundaries = vec![0.0, 500.0, 500.0];
        assert!(scenario.validate().is_err());

        let mut scenario = Scenario::default();
        scenario.modes[0].players_per_game = 0;
        assert!(scenario.validate().is_err());

        let mut scenario = Scenario::default();
        scenario.active_passwords.push(String::new());
        assert!(scenario.validate().is_err());
    }
}

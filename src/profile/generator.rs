//! Profile generation
//!
//! Partitions the matchmaking search space into a fixed list of
//! [`MatchProfile`]s. The list is built once at startup and reused for every
//! polling cycle.

use crate::config::{GameModeSettings, Scenario};
use crate::error::Result;
use crate::extensions::{self, Extensions};
use crate::types::{
    DoubleRangeFilter, MatchProfile, Pool, TagPresentFilter, BEGINNER_TAG, MAX_PLAYERS_KEY,
    MAX_SKILL_DIFFERENCE_KEY, POOL_NAME, PROFILE_REGION_KEY, SKILL_ARG, TRUSTED_FALSE,
    TRUSTED_TRUE,
};
use tracing::{debug, info};

/// Builds the profile set for a [`Scenario`]
#[derive(Debug, Clone)]
pub struct ProfileGenerator {
    scenario: Scenario,
}

impl ProfileGenerator {
    /// Create a generator for a validated scenario
    pub fn new(scenario: Scenario) -> Result<Self> {
        scenario.validate()?;
        Ok(Self { scenario })
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Enumerate every profile.
    ///
    /// The cross-product runs region, mode, skill bracket, trust state and
    /// beginner state from outermost to innermost, with the untrusted and
    /// non-beginner variants first. One profile per active password follows.
    pub fn generate(&self) -> Vec<MatchProfile> {
        let mut profiles = Vec::new();

        for region in &self.scenario.regions {
            for mode in &self.scenario.modes {
                for bracket in 0..mode.skill_boundaries.len().saturating_sub(1) {
                    for &trusted in trust_states(mode) {
                        for &beginner in beginner_states(mode) {
                            profiles
                                .push(bracket_profile(region, mode, bracket, trusted, beginner));
                        }
                    }
                }
            }
        }

        for password in &self.scenario.active_passwords {
            profiles.push(self.password_profile(password));
        }

        info!(
            "Generated {} match profiles ({} regions, {} modes, {} passwords)",
            profiles.len(),
            self.scenario.regions.len(),
            self.scenario.modes.len(),
            self.scenario.active_passwords.len()
        );

        profiles
    }

    fn password_profile(&self, password: &str) -> MatchProfile {
        let mut profile_extensions = Extensions::new();
        extensions::add_number(
            &mut profile_extensions,
            MAX_PLAYERS_KEY,
            self.scenario.password_queue.players_per_game as f64,
        );
        extensions::add_number(
            &mut profile_extensions,
            MAX_SKILL_DIFFERENCE_KEY,
            self.scenario.password_queue.skill_diff_band,
        );

        MatchProfile {
            name: format!("password_{}", password),
            pools: vec![Pool {
                name: POOL_NAME.to_string(),
                double_range_filters: Vec::new(),
                tag_present_filters: vec![TagPresentFilter {
                    tag: password.to_string(),
                }],
            }],
            extensions: profile_extensions,
        }
    }
}

/// Generate the profile set for a scenario in one call
pub fn generate_profiles(scenario: &Scenario) -> Result<Vec<MatchProfile>> {
    Ok(ProfileGenerator::new(scenario.clone())?.generate())
}

/// Unique profile name for one cell of the cross-product, e.g.
/// `europe_bank_it_b0_trusted_true` or `us_quick_cash_b1_trusted_false_beginner`
pub fn profile_name(
    region: &str,
    mode: &str,
    bracket: usize,
    trusted: bool,
    beginner: bool,
) -> String {
    let mut name = format!("{}_{}_b{}_{}", region, mode, bracket, trust_tag(trusted));
    if beginner {
        name.push('_');
        name.push_str(BEGINNER_TAG);
    }
    name
}

fn trust_tag(trusted: bool) -> &'static str {
    if trusted {
        TRUSTED_TRUE
    } else {
        TRUSTED_FALSE
    }
}

fn trust_states(mode: &GameModeSettings) -> &'static [bool] {
    if mode.trusted_queues {
        &[false, true]
    } else {
        &[false]
    }
}

fn beginner_states(mode: &GameModeSettings) -> &'static [bool] {
    if mode.beginner {
        &[false, true]
    } else {
        &[false]
    }
}

fn bracket_profile(
    region: &str,
    mode: &GameModeSettings,
    bracket: usize,
    trusted: bool,
    beginner: bool,
) -> MatchProfile {
    let half_overlap = mode.max_skill_difference / 2.0;
    let min = mode.skill_boundaries[bracket] - half_overlap;
    let max = mode.skill_boundaries[bracket + 1] + half_overlap;

    let mut tag_present_filters = vec![
        TagPresentFilter {
            tag: region.to_string(),
        },
        TagPresentFilter {
            tag: mode.name.clone(),
        },
        TagPresentFilter {
            tag: trust_tag(trusted).to_string(),
        },
    ];
    if beginner {
        tag_present_filters.push(TagPresentFilter {
            tag: BEGINNER_TAG.to_string(),
        });
    }

    let mut profile_extensions = Extensions::new();
    extensions::add_number(
        &mut profile_extensions,
        MAX_PLAYERS_KEY,
        mode.players_per_game as f64,
    );
    extensions::add_number(
        &mut profile_extensions,
        MAX_SKILL_DIFFERENCE_KEY,
        mode.skill_diff_band,
    );
    extensions::add_text(&mut profile_extensions, PROFILE_REGION_KEY, region);

    let name = profile_name(region, &mode.name, bracket, trusted, beginner);
    debug!("Profile {} filters skill [{}, {}]", name, min, max);

    MatchProfile {
        name,
        pools: vec![Pool {
            name: POOL_NAME.to_string(),
            double_range_filters: vec![DoubleRangeFilter {
                double_arg: SKILL_ARG.to_string(),
                min,
                max,
            }],
            tag_present_filters,
        }],
        extensions: profile_extensions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn single_mode_scenario(mode: GameModeSettings) -> Scenario {
        Scenario {
            regions: vec!["europe".to_string()],
            modes: vec![mode],
            active_passwords: Vec::new(),
            ..Scenario::default()
        }
    }

    fn tags(profile: &MatchProfile) -> Vec<&str> {
        profile.pools[0]
            .tag_present_filters
            .iter()
            .map(|f| f.tag.as_str())
            .collect()
    }

    #[test]
    fn test_default_profile_count() {
        // 2 regions x 4 modes x 2 brackets x 2 trust states, plus one password
        let profiles = generate_profiles(&Scenario::default()).unwrap();
        assert_eq!(profiles.len(), 33);
    }

    #[test]
    fn test_profile_names_are_unique() {
        let mut scenario = Scenario::default();
        for mode in &mut scenario.modes {
            mode.beginner = true;
        }
        let profiles = generate_profiles(&scenario).unwrap();
        let names: HashSet<_> = profiles.iter().map(|p| p.name.clone()).collect();
        assert_eq!(names.len(), profiles.len());
    }

    #[test]
    fn test_bracket_bounds_overlap() {
        let profiles =
            generate_profiles(&single_mode_scenario(GameModeSettings::standard("bank_it")))
                .unwrap();

        let bounds: Vec<(f64, f64)> = profiles
            .iter()
            .map(|p| {
                let filter = &p.pools[0].double_range_filters[0];
                (filter.min, filter.max)
            })
            .collect();

        assert_eq!(
            bounds,
            vec![
                (-25.0, 525.0),
                (-25.0, 525.0),
                (475.0, 1525.0),
                (475.0, 1525.0)
            ]
        );
    }

    #[test]
    fn test_filter_tags_and_extensions() {
        let profiles =
            generate_profiles(&single_mode_scenario(GameModeSettings::standard("bank_it")))
                .unwrap();

        assert_eq!(profiles[0].name, "europe_bank_it_b0_trusted_false");
        assert_eq!(tags(&profiles[0]), vec!["europe", "bank_it", "trusted_false"]);
        assert_eq!(profiles[1].name, "europe_bank_it_b0_trusted_true");
        assert_eq!(tags(&profiles[1]), vec!["europe", "bank_it", "trusted_true"]);

        let ext = &profiles[0].extensions;
        assert_eq!(extensions::get_number(ext, MAX_PLAYERS_KEY), 16.0);
        assert_eq!(extensions::get_number(ext, MAX_SKILL_DIFFERENCE_KEY), 50.0);
        assert_eq!(extensions::get_text(ext, PROFILE_REGION_KEY), "europe");
    }

    #[test]
    fn test_untrusted_only_mode() {
        let mut mode = GameModeSettings::standard("quick_cash");
        mode.trusted_queues = false;
        let profiles = generate_profiles(&single_mode_scenario(mode)).unwrap();

        assert_eq!(profiles.len(), 2);
        assert!(profiles.iter().all(|p| tags(p).contains(&TRUSTED_FALSE)));
    }

    #[test]
    fn test_beginner_variant() {
        let mut mode = GameModeSettings::standard("bank_it");
        mode.trusted_queues = false;
        mode.beginner = true;
        let profiles = generate_profiles(&single_mode_scenario(mode)).unwrap();

        assert_eq!(profiles.len(), 4);
        assert_eq!(profiles[1].name, "europe_bank_it_b0_trusted_false_beginner");
        assert_eq!(
            tags(&profiles[1]),
            vec!["europe", "bank_it", "trusted_false", "beginner"]
        );
        assert!(!tags(&profiles[0]).contains(&BEGINNER_TAG));
    }

    #[test]
    fn test_trust_and_beginner_states_enumerate_in_order() {
        let mut mode = GameModeSettings::standard("bank_it");
        mode.skill_boundaries = vec![0.0, 500.0];
        mode.beginner = true;
        let profiles = generate_profiles(&single_mode_scenario(mode)).unwrap();

        let names: Vec<&str> = profiles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "europe_bank_it_b0_trusted_false",
                "europe_bank_it_b0_trusted_false_beginner",
                "europe_bank_it_b0_trusted_true",
                "europe_bank_it_b0_trusted_true_beginner",
            ]
        );
    }

    #[test]
    fn test_password_profiles_follow_cross_product() {
        let mut scenario = single_mode_scenario(GameModeSettings::standard("bank_it"));
        scenario.active_passwords = vec!["secret".to_string(), "friends".to_string()];
        let profiles = generate_profiles(&scenario).unwrap();

        let last = &profiles[profiles.len() - 1];
        assert_eq!(last.name, "password_friends");
        assert_eq!(tags(last), vec!["friends"]);
        assert!(last.pools[0].double_range_filters.is_empty());
        assert_eq!(
            extensions::get_text(&last.extensions, PROFILE_REGION_KEY),
            extensions::NOT_ASSIGNED
        );
        assert_eq!(
            extensions::get_number(&last.extensions, MAX_PLAYERS_KEY),
            16.0
        );
        assert_eq!(profiles[profiles.len() - 2].name, "password_secret");
    }

    #[test]
    fn test_invalid_scenario_rejected() {
        let mut scenario = Scenario::default();
        scenario.modes.clear();
        assert!(ProfileGenerator::new(scenario).is_err());
    }
}

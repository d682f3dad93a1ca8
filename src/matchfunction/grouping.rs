//! Match grouping policies
//!
//! Both policies are pure functions of the fetched pools and the profile
//! parameters. Nothing is remembered between calls.

use crate::error::MatchmakingError;
use crate::extensions::{self, Extensions};
use crate::ticket::{latency_of, skill_of};
use crate::types::{
    Match, MatchProfile, Ticket, AVG_LATENCY_KEY, AVG_SKILL_KEY, LATENCY_DISPERSION_KEY,
    MAX_PLAYERS_KEY, MAX_SKILL_DIFFERENCE_KEY, NUM_MATCHES_KEY, NUM_TICKETS_KEY, POOL_NAME,
    PROFILE_REGION_KEY, SKILL_DISPERSION_KEY,
};
use crate::utils::{current_timestamp, match_id, mean, negative_dispersion};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

/// Identifier recorded on every proposed match
pub const MATCH_FUNCTION_NAME: &str = "basic-matchfunction";

/// Latency cap applied to a ticket's best region
pub const DEFAULT_BEST_REGION_MAX_PING: f64 = 100_000.0;

/// Which grouping algorithm a match function runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingPolicy {
    /// Skill-ordered sliding window over the `all` pool
    #[default]
    Skill,
    /// Population-only grouping that drains every pool in lockstep
    Exhaustive,
}

impl std::fmt::Display for GroupingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupingPolicy::Skill => write!(f, "skill"),
            GroupingPolicy::Exhaustive => write!(f, "exhaustive"),
        }
    }
}

impl FromStr for GroupingPolicy {
    type Err = MatchmakingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skill" => Ok(GroupingPolicy::Skill),
            "exhaustive" | "all" => Ok(GroupingPolicy::Exhaustive),
            _ => Err(MatchmakingError::ConfigurationError {
                message: format!("Unknown grouping policy: {}", s),
            }),
        }
    }
}

/// Grouping parameters decoded from a profile's extensions
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileParams {
    pub profile_name: String,
    pub max_players: usize,
    /// Exclusive upper bound on the skill spread of one match
    pub max_skill_diff: f64,
    /// Region used for latency metadata; password profiles have none
    pub region: Option<String>,
    pub best_region_max_ping: f64,
}

impl ProfileParams {
    /// Decode the parameters stored on `profile`.
    ///
    /// Returns `None` when the player count is missing or not a usable
    /// positive number. A missing skill band decodes to negative infinity, so
    /// the skill policy accepts no window for such a profile.
    pub fn from_profile(profile: &MatchProfile, best_region_max_ping: f64) -> Option<Self> {
        let max_players = extensions::get_number(&profile.extensions, MAX_PLAYERS_KEY);
        if !max_players.is_finite() || max_players < 1.0 {
            return None;
        }

        let region = extensions::get_text(&profile.extensions, PROFILE_REGION_KEY);
        let region = if extensions::is_sentinel(&region) {
            None
        } else {
            Some(region)
        };

        Some(Self {
            profile_name: profile.name.clone(),
            max_players: max_players as usize,
            max_skill_diff: extensions::get_number(&profile.extensions, MAX_SKILL_DIFFERENCE_KEY),
            region,
            best_region_max_ping,
        })
    }
}

/// Group fetched pools into matches with the chosen policy.
///
/// The skill policy only looks at the pool named `all`; the exhaustive
/// policy consumes every pool.
pub fn group_matches(
    policy: GroupingPolicy,
    pools: &BTreeMap<String, Vec<Ticket>>,
    params: &ProfileParams,
) -> Vec<Match> {
    let matches = match policy {
        GroupingPolicy::Skill => pools
            .get(POOL_NAME)
            .map(|tickets| group_by_skill(tickets, params))
            .unwrap_or_default(),
        GroupingPolicy::Exhaustive => group_exhaustive(pools, params),
    };

    debug!(
        "Profile {} produced {} matches with {} policy",
        params.profile_name,
        matches.len(),
        policy
    );
    matches
}

/// Skill-window grouping.
///
/// Tickets are sorted by ascending skill (stable for equal skill) and a window
/// of `max_players` slides one position at a time. A window is accepted when
/// its skill spread is strictly below `max_skill_diff`. Accepted windows may
/// share tickets.
pub fn group_by_skill(tickets: &[Ticket], params: &ProfileParams) -> Vec<Match> {
    group_by_skill_at(tickets, params, current_timestamp())
}

fn group_by_skill_at(
    tickets: &[Ticket],
    params: &ProfileParams,
    now: DateTime<Utc>,
) -> Vec<Match> {
    let size = params.max_players;
    if size == 0 || tickets.len() < size {
        return Vec::new();
    }

    let mut sorted: Vec<&Ticket> = tickets.iter().collect();
    sorted.sort_by(|a, b| skill_of(a).total_cmp(&skill_of(b)));

    let mut matches = Vec::new();
    for window in sorted.windows(size) {
        let (first, last) = (window[0], window[size - 1]);
        if skill_of(last) - skill_of(first) >= params.max_skill_diff {
            continue;
        }

        let sequence = matches.len();
        let mut match_extensions = population_extensions(size, sequence);
        add_quality(&mut match_extensions, window, params);

        matches.push(Match {
            match_id: match_id(&params.profile_name, now, sequence),
            match_profile: params.profile_name.clone(),
            match_function: MATCH_FUNCTION_NAME.to_string(),
            tickets: window.iter().map(|t| (*t).clone()).collect(),
            extensions: match_extensions,
        });
    }

    matches
}

/// Exhaustive population-only grouping.
///
/// While every pool still holds `max_players` unconsumed tickets, the next
/// `max_players` tickets of each pool (in pool name order) form one match.
/// Skill is ignored.
pub fn group_exhaustive(
    pools: &BTreeMap<String, Vec<Ticket>>,
    params: &ProfileParams,
) -> Vec<Match> {
    let size = params.max_players;
    if size == 0 || pools.is_empty() {
        return Vec::new();
    }

    let now = current_timestamp();
    let mut matches = Vec::new();
    let mut offset = 0;

    while pools.values().all(|tickets| tickets.len() >= offset + size) {
        let members: Vec<Ticket> = pools
            .values()
            .flat_map(|tickets| tickets[offset..offset + size].iter().cloned())
            .collect();
        offset += size;

        let sequence = matches.len();
        matches.push(Match {
            match_id: match_id(&params.profile_name, now, sequence),
            match_profile: params.profile_name.clone(),
            match_function: MATCH_FUNCTION_NAME.to_string(),
            extensions: population_extensions(members.len(), sequence),
            tickets: members,
        });
    }

    matches
}

fn population_extensions(num_tickets: usize, sequence: usize) -> Extensions {
    let mut ext = Extensions::new();
    extensions::add_number(&mut ext, NUM_TICKETS_KEY, num_tickets as f64);
    extensions::add_number(&mut ext, NUM_MATCHES_KEY, sequence as f64);
    ext
}

fn add_quality(ext: &mut Extensions, window: &[&Ticket], params: &ProfileParams) {
    if let Some(region) = &params.region {
        let latencies: Vec<f64> = window
            .iter()
            .map(|t| latency_of(t, region, params.best_region_max_ping))
            .collect();
        let avg_latency = mean(&latencies);
        extensions::add_number(ext, AVG_LATENCY_KEY, avg_latency);
        extensions::add_number(
            ext,
            LATENCY_DISPERSION_KEY,
            negative_dispersion(&latencies, avg_latency),
        );
    }

    let skills: Vec<f64> = window.iter().map(|t| skill_of(t)).collect();
    let avg_skill = mean(&skills);
    extensions::add_number(ext, AVG_SKILL_KEY, avg_skill);
    extensions::add_number(ext, SKILL_DISPERSION_KEY, negative_dispersion(&skills, avg_skill));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BEST_REGION_KEY, SKILL_ARG};
    use std::collections::HashSet;

    fn ticket(id: &str, skill: f64) -> Ticket {
        let mut ticket = Ticket {
            id: id.to_string(),
            ..Ticket::default()
        };
        ticket
            .search_fields
            .double_args
            .insert(SKILL_ARG.to_string(), skill);
        ticket
    }

    fn ticket_with_ping(id: &str, skill: f64, best: &str, region: &str, ping: f64) -> Ticket {
        let mut t = ticket(id, skill);
        extensions::add_text(&mut t.extensions, BEST_REGION_KEY, best);
        extensions::add_number(&mut t.extensions, region, ping);
        t
    }

    fn params(max_players: usize, max_skill_diff: f64) -> ProfileParams {
        ProfileParams {
            profile_name: "europe_bank_it_b0_trusted_true".to_string(),
            max_players,
            max_skill_diff,
            region: None,
            best_region_max_ping: DEFAULT_BEST_REGION_MAX_PING,
        }
    }

    fn pool_of(tickets: Vec<Ticket>) -> BTreeMap<String, Vec<Ticket>> {
        BTreeMap::from([(POOL_NAME.to_string(), tickets)])
    }

    #[test]
    fn test_ascending_skills_yield_overlapping_windows() {
        let tickets: Vec<Ticket> = (0..20).map(|i| ticket(&i.to_string(), i as f64)).collect();
        let matches = group_by_skill(&tickets, &params(10, 50.0));

        assert_eq!(matches.len(), 11);
        for (start, m) in matches.iter().enumerate() {
            let expected: Vec<String> = (start..start + 10).map(|i| i.to_string()).collect();
            assert_eq!(m.ticket_ids(), expected);
            assert_eq!(extensions::get_number(&m.extensions, NUM_TICKETS_KEY), 10.0);
            assert_eq!(
                extensions::get_number(&m.extensions, NUM_MATCHES_KEY),
                start as f64
            );
            assert_eq!(m.match_function, MATCH_FUNCTION_NAME);
            assert!(m.match_id.ends_with(&format!("-{}", start)));
        }

        let ids: HashSet<_> = matches.iter().map(|m| m.match_id.clone()).collect();
        assert_eq!(ids.len(), 11);
    }

    #[test]
    fn test_too_few_tickets() {
        let tickets: Vec<Ticket> = (0..5).map(|i| ticket(&i.to_string(), 0.0)).collect();
        assert!(group_by_skill(&tickets, &params(10, 50.0)).is_empty());
        assert!(group_exhaustive(&pool_of(tickets), &params(10, 50.0)).is_empty());
    }

    #[test]
    fn test_spread_equal_to_band_rejected() {
        let tickets = vec![ticket("a", 0.0), ticket("b", 50.0)];
        assert!(group_by_skill(&tickets, &params(2, 50.0)).is_empty());

        let tickets = vec![ticket("a", 0.0), ticket("b", 49.9)];
        assert_eq!(group_by_skill(&tickets, &params(2, 50.0)).len(), 1);
    }

    #[test]
    fn test_unsorted_input_is_sorted_stably() {
        let tickets = vec![
            ticket("high", 300.0),
            ticket("tie_a", 10.0),
            ticket("low", 5.0),
            ticket("tie_b", 10.0),
        ];
        let matches = group_by_skill(&tickets, &params(3, 50.0));

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].ticket_ids(), vec!["low", "tie_a", "tie_b"]);
    }

    #[test]
    fn test_zero_players_guarded() {
        let tickets = vec![ticket("a", 1.0)];
        assert!(group_by_skill(&tickets, &params(0, 50.0)).is_empty());
        assert!(group_exhaustive(&pool_of(tickets), &params(0, 50.0)).is_empty());
    }

    #[test]
    fn test_quality_metadata() {
        let tickets = vec![
            ticket_with_ping("a", 10.0, "europe", "europe", 20.0),
            ticket_with_ping("b", 20.0, "europe", "europe", 40.0),
        ];
        let mut p = params(2, 50.0);
        p.region = Some("europe".to_string());
        let matches = group_by_skill(&tickets, &p);

        let ext = &matches[0].extensions;
        assert_eq!(extensions::get_number(ext, AVG_LATENCY_KEY), 30.0);
        assert_eq!(extensions::get_number(ext, LATENCY_DISPERSION_KEY), -200.0);
        assert_eq!(extensions::get_number(ext, AVG_SKILL_KEY), 15.0);
        assert_eq!(extensions::get_number(ext, SKILL_DISPERSION_KEY), -50.0);
    }

    #[test]
    fn test_quality_uses_capped_latency() {
        let tickets = vec![
            ticket_with_ping("a", 10.0, "europe", "europe", 900.0),
            ticket_with_ping("b", 10.0, "europe", "europe", 100.0),
        ];
        let mut p = params(2, 50.0);
        p.region = Some("europe".to_string());
        p.best_region_max_ping = 100.0;
        let matches = group_by_skill(&tickets, &p);

        let ext = &matches[0].extensions;
        assert_eq!(extensions::get_number(ext, AVG_LATENCY_KEY), 100.0);
        assert_eq!(extensions::get_number(ext, LATENCY_DISPERSION_KEY), 0.0);
    }

    #[test]
    fn test_no_region_omits_latency() {
        let tickets = vec![ticket("a", 1.0), ticket("b", 2.0)];
        let matches = group_by_skill(&tickets, &params(2, 50.0));
        let ext = &matches[0].extensions;
        assert_eq!(extensions::get_number(ext, AVG_LATENCY_KEY), f64::NEG_INFINITY);
        assert_eq!(extensions::get_number(ext, AVG_SKILL_KEY), 1.5);
    }

    #[test]
    fn test_exhaustive_drains_pools_in_lockstep() {
        let mut pools = BTreeMap::new();
        pools.insert(
            "a".to_string(),
            (0..7).map(|i| ticket(&format!("a{}", i), 0.0)).collect(),
        );
        pools.insert(
            "b".to_string(),
            (0..5).map(|i| ticket(&format!("b{}", i), 900.0)).collect(),
        );

        let matches = group_exhaustive(&pools, &params(2, 1.0));
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].ticket_ids(), vec!["a0", "a1", "b0", "b1"]);
        assert_eq!(matches[1].ticket_ids(), vec!["a2", "a3", "b2", "b3"]);
        assert_eq!(
            extensions::get_number(&matches[1].extensions, NUM_TICKETS_KEY),
            4.0
        );
        assert_eq!(
            extensions::get_number(&matches[1].extensions, NUM_MATCHES_KEY),
            1.0
        );
    }

    #[test]
    fn test_policy_dispatch() {
        let tickets: Vec<Ticket> = (0..4)
            .map(|i| ticket(&i.to_string(), i as f64 * 100.0))
            .collect();
        let pools = pool_of(tickets);

        // Skill spread is far above the band, so only the exhaustive policy groups
        assert!(group_matches(GroupingPolicy::Skill, &pools, &params(2, 50.0)).is_empty());
        assert_eq!(
            group_matches(GroupingPolicy::Exhaustive, &pools, &params(2, 50.0)).len(),
            2
        );

        let other = BTreeMap::from([("other".to_string(), vec![ticket("x", 0.0)])]);
        assert!(group_matches(GroupingPolicy::Skill, &other, &params(1, 50.0)).is_empty());
    }

    #[test]
    fn test_params_from_profile() {
        let mut profile = MatchProfile {
            name: "us_quick_cash_b1_trusted_false".to_string(),
            pools: Vec::new(),
            extensions: Extensions::new(),
        };
        assert!(ProfileParams::from_profile(&profile, 100.0).is_none());

        extensions::add_number(&mut profile.extensions, MAX_PLAYERS_KEY, 16.0);
        extensions::add_number(&mut profile.extensions, MAX_SKILL_DIFFERENCE_KEY, 50.0);
        let p = ProfileParams::from_profile(&profile, 100.0).unwrap();
        assert_eq!(p.max_players, 16);
        assert_eq!(p.region, None);

        extensions::add_text(&mut profile.extensions, PROFILE_REGION_KEY, "us");
        let p = ProfileParams::from_profile(&profile, 100.0).unwrap();
        assert_eq!(p.region.as_deref(), Some("us"));
        assert_eq!(p.max_skill_diff, 50.0);
        assert_eq!(p.best_region_max_ping, 100.0);

        extensions::add_number(&mut profile.extensions, MAX_PLAYERS_KEY, 0.5);
        assert!(ProfileParams::from_profile(&profile, 100.0).is_none());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("skill".parse::<GroupingPolicy>().unwrap(), GroupingPolicy::Skill);
        assert_eq!(
            "Exhaustive".parse::<GroupingPolicy>().unwrap(),
            GroupingPolicy::Exhaustive
        );
        assert!("random".parse::<GroupingPolicy>().is_err());
        assert_eq!(GroupingPolicy::default(), GroupingPolicy::Skill);
    }
}

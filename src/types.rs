//! Common types used throughout the matchmaking core

use crate::extensions::Extensions;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Unique identifier for tickets, assigned by ticket storage
pub type TicketId = String;

/// Tag carried by trusted tickets
pub const TRUSTED_TRUE: &str = "trusted_true";
/// Tag carried by untrusted tickets
pub const TRUSTED_FALSE: &str = "trusted_false";
/// Tag carried by beginner tickets
pub const BEGINNER_TAG: &str = "beginner";

/// Name of the single pool every generated profile declares
pub const POOL_NAME: &str = "all";
/// Numeric search field holding the ticket's skill
pub const SKILL_ARG: &str = "skill";

/// Extension key: the ticket's first-ranked region
pub const BEST_REGION_KEY: &str = "best_region";
/// Extension key: players per match on a profile
pub const MAX_PLAYERS_KEY: &str = "max_players";
/// Extension key: skill tolerance band on a profile
pub const MAX_SKILL_DIFFERENCE_KEY: &str = "match_skill";
/// Extension key: region label on a profile
pub const PROFILE_REGION_KEY: &str = "profile_region";
/// Extension key: member count on a match
pub const NUM_TICKETS_KEY: &str = "num_tickets";
/// Extension key: running match counter on a match
pub const NUM_MATCHES_KEY: &str = "num_matches";
/// Extension keys for match quality metadata
pub const AVG_LATENCY_KEY: &str = "avg_latency";
pub const LATENCY_DISPERSION_KEY: &str = "latency_dispersion";
pub const AVG_SKILL_KEY: &str = "avg_skill";
pub const SKILL_DISPERSION_KEY: &str = "skill_dispersion";

/// Searchable attributes of a ticket
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFields {
    pub tags: Vec<String>,
    pub double_args: HashMap<String, f64>,
}

/// A single player's matchmaking request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Empty until ticket storage assigns an id
    pub id: TicketId,
    pub search_fields: SearchFields,
    pub extensions: Extensions,
    pub created_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.search_fields.tags.iter().any(|t| t == tag)
    }
}

/// Inclusive bounds on a numeric search field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleRangeFilter {
    pub double_arg: String,
    pub min: f64,
    pub max: f64,
}

/// Requires a tag to be present on the ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPresentFilter {
    pub tag: String,
}

/// A named filter set used to fetch candidate tickets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub name: String,
    pub double_range_filters: Vec<DoubleRangeFilter>,
    pub tag_present_filters: Vec<TagPresentFilter>,
}

impl Pool {
    /// Check whether a ticket satisfies every filter of this pool
    pub fn matches(&self, ticket: &Ticket) -> bool {
        let ranges_ok = self.double_range_filters.iter().all(|filter| {
            match ticket.search_fields.double_args.get(&filter.double_arg) {
                Some(value) => *value >= filter.min && *value <= filter.max,
                None => false,
            }
        });

        ranges_ok
            && self
                .tag_present_filters
                .iter()
                .all(|filter| ticket.has_tag(&filter.tag))
    }
}

/// A named query describing one segment of the matchmaking search space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchProfile {
    pub name: String,
    pub pools: Vec<Pool>,
    pub extensions: Extensions,
}

/// A proposed grouping of tickets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub match_id: String,
    pub match_profile: String,
    pub match_function: String,
    pub tickets: Vec<Ticket>,
    pub extensions: Extensions,
}

impl Match {
    /// Ids of all member tickets, in match order
    pub fn ticket_ids(&self) -> Vec<TicketId> {
        self.tickets.iter().map(|t| t.id.clone()).collect()
    }
}

/// Per-region ping as reported by a client. Ordered by region name so that
/// region selection breaks ties deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientRegionData {
    pub pings: BTreeMap<String, f64>,
}

/// Simulated client state used to synthesize one ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMatchmakingData {
    pub region_data: ClientRegionData,
    /// Either [`TRUSTED_TRUE`] or [`TRUSTED_FALSE`]
    pub trusted: String,
    /// Empty when the client is not queueing privately
    pub password: String,
    pub skill: f64,
    pub game_mode: String,
    pub beginner: bool,
}

/// A region together with the ping measured towards it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPing {
    pub region: String,
    pub ping: f64,
}

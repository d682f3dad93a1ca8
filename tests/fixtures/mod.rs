//! Test fixtures and mock implementations for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use match_director::config::AppConfig;
use match_director::error::{MatchmakingError, Result};
use match_director::extensions::{self, Extensions};
use match_director::store::{AssignmentBackend, QueryService};
use match_director::types::{
    ClientMatchmakingData, ClientRegionData, DoubleRangeFilter, MatchProfile, Pool, Ticket,
    TicketId, MAX_PLAYERS_KEY, MAX_SKILL_DIFFERENCE_KEY, POOL_NAME, PROFILE_REGION_KEY,
    SKILL_ARG, TRUSTED_TRUE,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One recorded `assign_tickets` call
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentCall {
    pub ticket_ids: Vec<TicketId>,
    pub connection: String,
}

/// Assignment backend that captures every call for inspection
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Arc<Mutex<Vec<AssignmentCall>>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<AssignmentCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

#[async_trait]
impl AssignmentBackend for RecordingBackend {
    async fn assign_tickets(&self, ticket_ids: &[TicketId], connection: &str) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(AssignmentCall {
                ticket_ids: ticket_ids.to_vec(),
                connection: connection.to_string(),
            });
        }
        Ok(())
    }
}

/// Assignment backend that rejects every call
#[derive(Debug, Default)]
pub struct FailingAssignmentBackend {
    attempts: AtomicUsize,
}

impl FailingAssignmentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssignmentBackend for FailingAssignmentBackend {
    async fn assign_tickets(&self, ticket_ids: &[TicketId], _connection: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MatchmakingError::InternalError {
            message: format!("backend unavailable for {} tickets", ticket_ids.len()),
        }
        .into())
    }
}

/// Query service that always fails
#[derive(Debug, Default)]
pub struct FailingQueryService;

#[async_trait]
impl QueryService for FailingQueryService {
    async fn query_pool(&self, pool: &Pool) -> Result<Vec<Ticket>> {
        Err(MatchmakingError::InternalError {
            message: format!("query backend unreachable for pool {}", pool.name),
        }
        .into())
    }
}

/// Query service that returns fixed tickets per pool name
#[derive(Debug, Default)]
pub struct StaticQueryService {
    pools: HashMap<String, Vec<Ticket>>,
    queried: Mutex<Vec<String>>,
}

impl StaticQueryService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, name: &str, tickets: Vec<Ticket>) -> Self {
        self.pools.insert(name.to_string(), tickets);
        self
    }

    /// Pool names in query order
    pub fn queried(&self) -> Vec<String> {
        self.queried
            .lock()
            .map(|queried| queried.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl QueryService for StaticQueryService {
    async fn query_pool(&self, pool: &Pool) -> Result<Vec<Ticket>> {
        if let Ok(mut queried) = self.queried.lock() {
            queried.push(pool.name.clone());
        }
        Ok(self.pools.get(&pool.name).cloned().unwrap_or_default())
    }
}

/// A stored ticket with an id, a skill and the given tags
pub fn skill_ticket(id: &str, skill: f64, tags: &[&str]) -> Ticket {
    let mut ticket = Ticket {
        id: id.to_string(),
        ..Ticket::default()
    };
    ticket.search_fields.tags = tags.iter().map(|t| t.to_string()).collect();
    ticket
        .search_fields
        .double_args
        .insert(SKILL_ARG.to_string(), skill);
    ticket
}

/// `count` stored tickets that all share one skill
pub fn identical_tickets(prefix: &str, count: usize, skill: f64) -> Vec<Ticket> {
    (0..count)
        .map(|i| skill_ticket(&format!("{}_{}", prefix, i), skill, &["bank_it"]))
        .collect()
}

/// Profile with a single `all` pool and the given grouping parameters
pub fn test_profile(name: &str, max_players: f64, skill_band: f64) -> MatchProfile {
    let mut profile_extensions = Extensions::new();
    extensions::add_number(&mut profile_extensions, MAX_PLAYERS_KEY, max_players);
    extensions::add_number(&mut profile_extensions, MAX_SKILL_DIFFERENCE_KEY, skill_band);
    extensions::add_text(&mut profile_extensions, PROFILE_REGION_KEY, "europe");

    MatchProfile {
        name: name.to_string(),
        pools: vec![Pool {
            name: POOL_NAME.to_string(),
            double_range_filters: vec![DoubleRangeFilter {
                double_arg: SKILL_ARG.to_string(),
                min: f64::MIN,
                max: f64::MAX,
            }],
            tag_present_filters: Vec::new(),
        }],
        extensions: profile_extensions,
    }
}

/// A trusted client with the given pings
pub fn client(mode: &str, skill: f64, pings: &[(&str, f64)]) -> ClientMatchmakingData {
    ClientMatchmakingData {
        region_data: ClientRegionData {
            pings: pings
                .iter()
                .map(|(region, ping)| (region.to_string(), *ping))
                .collect::<BTreeMap<_, _>>(),
        },
        trusted: TRUSTED_TRUE.to_string(),
        password: String::new(),
        skill,
        game_mode: mode.to_string(),
        beginner: false,
    }
}

/// Seeded configuration tuned so that one batch fills the default profiles
pub fn dense_config(seed: u64, tickets_per_batch: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.simulation.rng_seed = Some(seed);
    config.simulation.skill_range = 100.0;
    config.frontend.tickets_per_batch = tickets_per_batch;
    config
}

/// Check a connection string has the shape `a.b.c.d:port`
pub fn is_connection(connection: &str, port: u16) -> bool {
    let Some((host, found_port)) = connection.split_once(':') else {
        return false;
    };
    let octets: Vec<&str> = host.split('.').collect();
    found_port == port.to_string()
        && octets.len() == 4
        && octets.iter().all(|o| o.parse::<u8>().is_ok())
}

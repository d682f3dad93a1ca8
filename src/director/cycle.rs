//! The director loop
//!
//! Every poll interval the director fetches proposals for each profile
//! concurrently, hands each proposed match a random game server address and
//! waits for all profiles before the next tick.

use crate::config::DirectorSettings;
use crate::error::{MatchmakingError, Result};
use crate::matchfunction::MatchFunction;
use crate::metrics::MetricsCollector;
use crate::store::AssignmentBackend;
use crate::types::{Match, MatchProfile};
use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

/// Outcome of one director tick across all profiles
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub profiles: usize,
    pub fetch_failures: usize,
    pub assignment_failures: usize,
    pub matches: usize,
    pub tickets_assigned: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Default)]
struct ProfileOutcome {
    matches: usize,
    tickets_assigned: usize,
}

enum ProfileFailure {
    Fetch(anyhow::Error),
    Assignment(anyhow::Error),
}

/// Drives fetch-and-assign cycles over a fixed profile set
pub struct Director {
    profiles: Arc<Vec<MatchProfile>>,
    match_function: MatchFunction,
    backend: Arc<dyn AssignmentBackend>,
    metrics: Option<Arc<MetricsCollector>>,
    fetch_limit: Arc<Semaphore>,
    assignment_port: u16,
    poll_interval: Duration,
    rng: Arc<Mutex<StdRng>>,
    last_report: RwLock<Option<CycleReport>>,
}

impl Director {
    pub fn new(
        profiles: Vec<MatchProfile>,
        match_function: MatchFunction,
        backend: Arc<dyn AssignmentBackend>,
        settings: &DirectorSettings,
        rng: StdRng,
    ) -> Self {
        Self {
            profiles: Arc::new(profiles),
            match_function,
            backend,
            metrics: None,
            fetch_limit: Arc::new(Semaphore::new(settings.max_concurrent_fetches.max(1))),
            assignment_port: settings.assignment_port,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            rng: Arc::new(Mutex::new(rng)),
            last_report: RwLock::new(None),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        metrics.set_profile_count(self.profiles.len());
        self.metrics = Some(metrics);
        self
    }

    pub fn profiles(&self) -> &[MatchProfile] {
        &self.profiles
    }

    /// Report of the most recent completed cycle
    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    /// Run one fetch-and-assign pass over every profile.
    ///
    /// Profiles run concurrently up to the fetch limit. A failing profile is
    /// logged and counted; the others are unaffected.
    pub async fn run_cycle(&self) -> CycleReport {
        let start = Instant::now();
        let mut tasks = JoinSet::new();

        for index in 0..self.profiles.len() {
            let profiles = self.profiles.clone();
            let match_function = self.match_function.clone();
            let backend = self.backend.clone();
            let metrics = self.metrics.clone();
            let fetch_limit = self.fetch_limit.clone();
            let rng = self.rng.clone();
            let port = self.assignment_port;

            tasks.spawn(async move {
                let _permit = fetch_limit.acquire_owned().await;
                let profile = &profiles[index];
                run_profile(
                    profile,
                    &match_function,
                    backend.as_ref(),
                    metrics.as_deref(),
                    &rng,
                    port,
                )
                .await
            });
        }

        let mut report = CycleReport {
            profiles: self.profiles.len(),
            ..CycleReport::default()
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => {
                    report.matches += outcome.matches;
                    report.tickets_assigned += outcome.tickets_assigned;
                }
                Ok(Err(ProfileFailure::Fetch(e))) => {
                    warn!("Fetch failed: {}", e);
                    report.fetch_failures += 1;
                }
                Ok(Err(ProfileFailure::Assignment(e))) => {
                    warn!("Assignment failed: {}", e);
                    report.assignment_failures += 1;
                }
                Err(e) => {
                    error!("Profile task panicked or was cancelled: {}", e);
                    report.fetch_failures += 1;
                }
            }
        }

        let elapsed = start.elapsed();
        report.duration_ms = elapsed.as_millis() as u64;
        if let Some(metrics) = &self.metrics {
            metrics.record_cycle(elapsed);
        }

        debug!("Director cycle finished: {:?}", report);
        *self.last_report.write().await = Some(report.clone());
        report
    }

    /// Run cycles every poll interval until `is_running` turns false
    pub async fn run(&self, is_running: Arc<RwLock<bool>>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        info!(
            "Director started - {} profiles, interval {:?}",
            self.profiles.len(),
            self.poll_interval
        );

        while *is_running.read().await {
            interval.tick().await;
            let report = self.run_cycle().await;
            if report.matches > 0 {
                info!(
                    "Cycle assigned {} tickets across {} matches ({} fetch / {} assignment failures)",
                    report.tickets_assigned,
                    report.matches,
                    report.fetch_failures,
                    report.assignment_failures
                );
            }
        }

        info!("Director stopped");
    }
}

async fn run_profile(
    profile: &MatchProfile,
    match_function: &MatchFunction,
    backend: &dyn AssignmentBackend,
    metrics: Option<&MetricsCollector>,
    rng: &Mutex<StdRng>,
    port: u16,
) -> std::result::Result<ProfileOutcome, ProfileFailure> {
    let start = Instant::now();
    let matches = fetch(profile, match_function).await.map_err(|e| {
        if let Some(metrics) = metrics {
            metrics.record_fetch_failure();
        }
        ProfileFailure::Fetch(e)
    })?;

    let ticket_count: usize = matches.iter().map(|m| m.tickets.len()).sum();
    let elapsed = start.elapsed();
    if let Some(metrics) = metrics {
        metrics.record_fetch(
            &match_function.policy().to_string(),
            matches.len(),
            ticket_count,
            elapsed,
        );
    }
    debug!("Time to fetch took {:?} for profile {}", elapsed, profile.name);
    if ticket_count > 0 {
        info!(
            "Generated {} matches for profile {} ({} tickets)",
            matches.len(),
            profile.name,
            ticket_count
        );
    }

    let mut outcome = ProfileOutcome {
        matches: matches.len(),
        tickets_assigned: 0,
    };

    for proposal in &matches {
        let result = match random_connection(rng, port) {
            Ok(connection) => backend
                .assign_tickets(&proposal.ticket_ids(), &connection)
                .await
                .map_err(|e| MatchmakingError::AssignmentFailed {
                    match_id: proposal.match_id.clone(),
                    message: e.to_string(),
                }),
            Err(e) => Err(MatchmakingError::AssignmentFailed {
                match_id: proposal.match_id.clone(),
                message: e.to_string(),
            }),
        };

        if let Some(metrics) = metrics {
            metrics.record_assignment(result.is_ok());
        }
        result.map_err(|e| ProfileFailure::Assignment(e.into()))?;
        outcome.tickets_assigned += proposal.tickets.len();
    }

    Ok(outcome)
}

async fn fetch(profile: &MatchProfile, match_function: &MatchFunction) -> Result<Vec<Match>> {
    let stream = match_function.run(profile).await?;
    Ok(stream.collect().await)
}

/// Random game server address of the form `a.b.c.d:port`
pub fn random_connection(rng: &Mutex<StdRng>, port: u16) -> Result<String> {
    let mut rng = rng.lock().map_err(|_| MatchmakingError::InternalError {
        message: "Failed to acquire connection rng lock".to_string(),
    })?;
    Ok(format_connection(&mut *rng, port))
}

fn format_connection<R: Rng>(rng: &mut R, port: u16) -> String {
    format!(
        "{}.{}.{}.{}:{}",
        rng.gen::<u8>(),
        rng.gen::<u8>(),
        rng.gen::<u8>(),
        rng.gen::<u8>(),
        port
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions;
    use crate::matchfunction::GroupingPolicy;
    use crate::store::{InMemoryTicketStore, TicketFrontend};
    use crate::types::{
        Pool, Ticket, TicketId, MAX_PLAYERS_KEY, MAX_SKILL_DIFFERENCE_KEY, POOL_NAME, SKILL_ARG,
    };
    use async_trait::async_trait;
    use mockall::mock;
    use rand::SeedableRng;

    mock! {
        pub Backend {}

        #[async_trait]
        impl AssignmentBackend for Backend {
            async fn assign_tickets(&self, ticket_ids: &[TicketId], connection: &str) -> Result<()>;
        }
    }

    fn profile(name: &str) -> MatchProfile {
        let mut profile = MatchProfile {
            name: name.to_string(),
            pools: vec![Pool {
                name: POOL_NAME.to_string(),
                double_range_filters: Vec::new(),
                tag_present_filters: Vec::new(),
            }],
            extensions: Default::default(),
        };
        extensions::add_number(&mut profile.extensions, MAX_PLAYERS_KEY, 4.0);
        extensions::add_number(&mut profile.extensions, MAX_SKILL_DIFFERENCE_KEY, 50.0);
        profile
    }

    async fn store_with(skills: &[f64]) -> Arc<InMemoryTicketStore> {
        let store = Arc::new(InMemoryTicketStore::new());
        for skill in skills {
            let mut ticket = Ticket::default();
            ticket.search_fields.tags.push("bank_it".to_string());
            ticket
                .search_fields
                .double_args
                .insert(SKILL_ARG.to_string(), *skill);
            store.create_ticket(ticket).await.unwrap();
        }
        store
    }

    fn director(store: Arc<InMemoryTicketStore>, backend: Arc<dyn AssignmentBackend>) -> Director {
        Director::new(
            vec![profile("europe_bank_it_b0_trusted_true")],
            MatchFunction::new(store, GroupingPolicy::Skill, 100_000.0),
            backend,
            &DirectorSettings::default(),
            StdRng::seed_from_u64(4),
        )
    }

    #[tokio::test]
    async fn test_cycle_assigns_each_proposal() {
        let store = store_with(&[10.0, 12.0, 14.0, 16.0, 18.0]).await;
        let mut backend = MockBackend::new();
        backend
            .expect_assign_tickets()
            .withf(|ids, connection| ids.len() == 4 && connection.ends_with(":2222"))
            .times(2)
            .returning(|_, _| Ok(()));

        let director = director(store, Arc::new(backend));
        assert!(director.last_report().await.is_none());

        let report = director.run_cycle().await;
        assert_eq!(report.profiles, 1);
        assert_eq!(report.matches, 2);
        assert_eq!(report.tickets_assigned, 8);
        assert_eq!(director.last_report().await, Some(report));
    }

    #[tokio::test]
    async fn test_cycle_with_metrics_records_failures() {
        let store = store_with(&[1.0, 2.0, 3.0, 4.0]).await;
        let mut backend = MockBackend::new();
        backend
            .expect_assign_tickets()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("no game servers")));

        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let director = director(store, Arc::new(backend)).with_metrics(metrics.clone());

        let report = director.run_cycle().await;
        assert_eq!(report.assignment_failures, 1);
        assert_eq!(metrics.service().profiles_active.get(), 1);
        assert_eq!(
            metrics
                .matches()
                .assignments_total
                .with_label_values(&["failed"])
                .get(),
            1
        );
    }

    #[test]
    fn test_connection_format() {
        let rng = Mutex::new(StdRng::seed_from_u64(3));
        let connection = random_connection(&rng, 2222).unwrap();

        let (host, port) = connection.split_once(':').unwrap();
        assert_eq!(port, "2222");
        let octets: Vec<&str> = host.split('.').collect();
        assert_eq!(octets.len(), 4);
        assert!(octets.iter().all(|o| o.parse::<u8>().is_ok()));
    }

    #[test]
    fn test_seeded_connections_repeat() {
        let a = Mutex::new(StdRng::seed_from_u64(9));
        let b = Mutex::new(StdRng::seed_from_u64(9));
        for _ in 0..5 {
            assert_eq!(
                random_connection(&a, 2222).unwrap(),
                random_connection(&b, 2222).unwrap()
            );
        }
    }
}

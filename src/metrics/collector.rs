//! Metrics collection using Prometheus
//!
//! This module provides metrics for the match director: ticket ingestion,
//! per-profile fetch cycles, proposed matches and assignments.

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the match director
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Ticket ingestion metrics
    ticket_metrics: TicketMetrics,

    /// Match proposal and assignment metrics
    match_metrics: MatchMetrics,

    /// Timing metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,

    /// Number of profiles the director polls
    pub profiles_active: IntGauge,
}

/// Ticket ingestion metrics
#[derive(Clone)]
pub struct TicketMetrics {
    /// Tickets accepted by storage
    pub tickets_created_total: IntCounter,

    /// Tickets that could not be synthesized or stored
    pub ticket_failures_total: IntCounterVec,

    /// Tickets still waiting for a match
    pub tickets_pending: IntGauge,

    /// Skill of created tickets
    pub ticket_skill: Histogram,
}

/// Match proposal and assignment metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Matches proposed by the match function
    pub matches_proposed_total: IntCounterVec,

    /// Tickets contained in proposed matches
    pub tickets_matched_total: IntCounter,

    /// Assignment attempts by outcome
    pub assignments_total: IntCounterVec,

    /// Pool fetches that failed
    pub fetch_failures_total: IntCounter,
}

/// Timing metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Time to fetch and group one profile
    pub fetch_duration: Histogram,

    /// Time for one full director cycle
    pub cycle_duration: Histogram,

    /// Ticket batch submission time
    pub batch_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let ticket_metrics = TicketMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            ticket_metrics,
            match_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn tickets(&self) -> &TicketMetrics {
        &self.ticket_metrics
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a ticket accepted by storage
    pub fn record_ticket_created(&self, skill: f64) {
        self.ticket_metrics.tickets_created_total.inc();
        self.ticket_metrics.ticket_skill.observe(skill);
    }

    /// Record a ticket that never made it into storage
    pub fn record_ticket_failure(&self, reason: &str) {
        self.ticket_metrics
            .ticket_failures_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record one ingestion batch
    pub fn record_batch(&self, outcome: &str, duration: Duration) {
        self.performance_metrics
            .batch_duration
            .with_label_values(&[outcome])
            .observe(duration.as_secs_f64());
    }

    /// Record a completed fetch for one profile
    pub fn record_fetch(&self, policy: &str, matches: usize, tickets: usize, duration: Duration) {
        self.match_metrics
            .matches_proposed_total
            .with_label_values(&[policy])
            .inc_by(matches as u64);
        self.match_metrics
            .tickets_matched_total
            .inc_by(tickets as u64);
        self.performance_metrics
            .fetch_duration
            .observe(duration.as_secs_f64());
    }

    pub fn record_fetch_failure(&self) {
        self.match_metrics.fetch_failures_total.inc();
    }

    /// Record one assignment attempt
    pub fn record_assignment(&self, success: bool) {
        let status = if success { "success" } else { "failed" };
        self.match_metrics
            .assignments_total
            .with_label_values(&[status])
            .inc();
    }

    pub fn record_cycle(&self, duration: Duration) {
        self.performance_metrics
            .cycle_duration
            .observe(duration.as_secs_f64());
    }

    pub fn set_profile_count(&self, count: usize) {
        self.service_metrics.profiles_active.set(count as i64);
    }

    pub fn set_pending_tickets(&self, count: usize) {
        self.ticket_metrics.tickets_pending.set(count as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("match_director_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "match_director_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("match_director_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        let profiles_active = IntGauge::new(
            "match_director_profiles_active",
            "Match profiles polled each cycle",
        )?;
        registry.register(Box::new(profiles_active.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
            profiles_active,
        })
    }
}

impl TicketMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let tickets_created_total = IntCounter::new(
            "match_director_tickets_created_total",
            "Tickets accepted by storage",
        )?;
        registry.register(Box::new(tickets_created_total.clone()))?;

        let ticket_failures_total = IntCounterVec::new(
            Opts::new(
                "match_director_ticket_failures_total",
                "Tickets that failed synthesis or creation",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(ticket_failures_total.clone()))?;

        let tickets_pending = IntGauge::new(
            "match_director_tickets_pending",
            "Tickets waiting for a match",
        )?;
        registry.register(Box::new(tickets_pending.clone()))?;

        let ticket_skill = Histogram::with_opts(
            HistogramOpts::new("match_director_ticket_skill", "Skill of created tickets")
                .buckets(vec![50.0, 100.0, 200.0, 300.0, 400.0, 500.0, 1000.0, 1500.0]),
        )?;
        registry.register(Box::new(ticket_skill.clone()))?;

        Ok(Self {
            tickets_created_total,
            ticket_failures_total,
            tickets_pending,
            ticket_skill,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_proposed_total = IntCounterVec::new(
            Opts::new(
                "match_director_matches_proposed_total",
                "Matches proposed by the match function",
            ),
            &["policy"],
        )?;
        registry.register(Box::new(matches_proposed_total.clone()))?;

        let tickets_matched_total = IntCounter::new(
            "match_director_tickets_matched_total",
            "Tickets contained in proposed matches",
        )?;
        registry.register(Box::new(tickets_matched_total.clone()))?;

        let assignments_total = IntCounterVec::new(
            Opts::new("match_director_assignments_total", "Assignment attempts"),
            &["status"],
        )?;
        registry.register(Box::new(assignments_total.clone()))?;

        let fetch_failures_total = IntCounter::new(
            "match_director_fetch_failures_total",
            "Profile fetches that failed",
        )?;
        registry.register(Box::new(fetch_failures_total.clone()))?;

        Ok(Self {
            matches_proposed_total,
            tickets_matched_total,
            assignments_total,
            fetch_failures_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let fetch_duration = Histogram::with_opts(
            HistogramOpts::new(
                "match_director_fetch_duration_seconds",
                "Fetch and grouping time per profile",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(fetch_duration.clone()))?;

        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new(
                "match_director_cycle_duration_seconds",
                "Director cycle time",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(cycle_duration.clone()))?;

        let batch_duration = HistogramVec::new(
            HistogramOpts::new(
                "match_director_ticket_batch_duration_seconds",
                "Ticket batch submission time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
            &["outcome"],
        )?;
        registry.register(Box::new(batch_duration.clone()))?;

        Ok(Self {
            fetch_duration,
            cycle_duration,
            batch_duration,
        })
    }
}

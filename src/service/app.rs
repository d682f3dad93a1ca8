//! Main application state and service coordination
//!
//! This module wires the ticket store, the director, the ticket ingestor and
//! the metrics server together and owns their background tasks.

use crate::config::AppConfig;
use crate::director::{Director, TicketIngestor};
use crate::matchfunction::MatchFunction;
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector, MetricsService};
use crate::profile::ProfileGenerator;
use crate::store::{InMemoryTicketStore, StoreStats};
use crate::utils::seeded_rng;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Rng stream used by the ticket generator
const TICKET_RNG_STREAM: u64 = 0;
/// Rng stream used for server addresses
const CONNECTION_RNG_STREAM: u64 = 1;

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Components shared between the background tasks and the health endpoints
pub struct ServiceContext {
    config: AppConfig,
    store: Arc<InMemoryTicketStore>,
    director: Arc<Director>,
    ingestor: Option<Arc<TicketIngestor>>,
    metrics: Arc<MetricsCollector>,
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl ServiceContext {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<InMemoryTicketStore> {
        self.store.clone()
    }

    pub fn director(&self) -> Arc<Director> {
        self.director.clone()
    }

    pub fn ingestor(&self) -> Option<Arc<TicketIngestor>> {
        self.ingestor.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub async fn store_stats(&self) -> StoreStats {
        self.store.stats().await
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Main application state containing all service components
pub struct AppState {
    context: Arc<ServiceContext>,

    /// Metrics service for monitoring and health checks
    metrics_service: Arc<MetricsService>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing match director service");
        info!(
            "Configuration: service={}, policy={}, simulation={}",
            config.service.name, config.matchmaking.grouping_policy, config.simulation.mode
        );

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let store = Arc::new(InMemoryTicketStore::with_assignment_retention(
            config.director.assignment_retention,
        ));
        let director =
            Self::initialize_director(&config, store.clone(), metrics_collector.clone())?;
        let ingestor =
            Self::initialize_ingestor(&config, store.clone(), metrics_collector.clone())?;

        let context = Arc::new(ServiceContext {
            config,
            store,
            director,
            ingestor,
            metrics: metrics_collector.clone(),
            is_running: Arc::new(RwLock::new(false)),
            started_at: Instant::now(),
        });

        let metrics_service = Self::initialize_metrics(context.clone(), metrics_collector);

        Ok(Self {
            context,
            metrics_service,
            background_tasks: Vec::new(),
        })
    }

    /// Start the metrics server and both driving loops
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting match director service");

        // Mark as running
        *self.context.is_running.write().await = true;

        // Start metrics service first
        self.start_metrics_service().await?;

        // Start the director and ticket ingestion loops
        self.start_background_tasks().await?;

        info!("✅ Match director service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of match director service");

        // Mark as not running
        *self.context.is_running.write().await = false;

        // Stop background tasks (including metrics service task)
        self.stop_background_tasks().await;

        // Stop metrics service
        info!("Stopping metrics service...");
        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        } else {
            info!("✅ Metrics service stopped");
        }

        let final_stats = self.context.store_stats().await;
        info!("Final ticket statistics: {:?}", final_stats);
        if let Some(report) = self.context.director.last_report().await {
            info!("Last director cycle: {:?}", report);
        }
        info!("✅ Match director service shutdown completed");

        Ok(())
    }

    /// Shared components, for health checks
    pub fn context(&self) -> Arc<ServiceContext> {
        self.context.clone()
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.context.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        self.context.is_running().await
    }

    /// Get metrics service
    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    /// Generate the profile set and build the director around it
    fn initialize_director(
        config: &AppConfig,
        store: Arc<InMemoryTicketStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Arc<Director>, ServiceError> {
        let generator = ProfileGenerator::new(config.matchmaking.scenario.clone()).map_err(|e| {
            ServiceError::Configuration {
                message: format!("Invalid matchmaking scenario: {}", e),
            }
        })?;
        let profiles = generator.generate();
        if profiles.is_empty() {
            return Err(ServiceError::Configuration {
                message: "Scenario produced no match profiles".to_string(),
            });
        }

        let match_function = MatchFunction::new(
            store.clone(),
            config.matchmaking.grouping_policy,
            config.matchmaking.best_region_max_ping,
        );

        let director = Director::new(
            profiles,
            match_function,
            store,
            &config.director,
            seeded_rng(config.simulation.rng_seed, CONNECTION_RNG_STREAM),
        )
        .with_metrics(metrics);

        info!(
            "Director initialized with {} profiles",
            director.profiles().len()
        );
        Ok(Arc::new(director))
    }

    /// Build the ticket ingestor unless ingestion is disabled
    fn initialize_ingestor(
        config: &AppConfig,
        store: Arc<InMemoryTicketStore>,
        metrics: Arc<MetricsCollector>,
    ) -> Result<Option<Arc<TicketIngestor>>, ServiceError> {
        if !config.frontend.enabled {
            info!("Ticket ingestion disabled");
            return Ok(None);
        }

        let ingestor = TicketIngestor::from_config(
            config,
            seeded_rng(config.simulation.rng_seed, TICKET_RNG_STREAM),
            store,
        )
        .map_err(|e| ServiceError::Initialization {
            message: format!("Failed to create ticket ingestor: {}", e),
        })?
        .with_metrics(metrics);

        Ok(Some(Arc::new(ingestor)))
    }

    /// Build the metrics service around the shared context
    fn initialize_metrics(
        context: Arc<ServiceContext>,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Arc<MetricsService> {
        info!(
            "Initializing metrics service on port {}",
            context.config.service.metrics_port
        );

        let health_config = HealthServerConfig {
            port: context.config.service.metrics_port,
            host: "0.0.0.0".to_string(),
        };

        let health_server = Arc::new(
            HealthServer::new(health_config, metrics_collector.clone()).with_context(context),
        );
        Arc::new(MetricsService::new(metrics_collector, health_server))
    }

    /// Start metrics service
    async fn start_metrics_service(&mut self) -> Result<(), ServiceError> {
        info!("Starting metrics and health endpoints");

        let metrics_service = self.metrics_service.clone();
        let port = self.context.config.service.metrics_port;

        let metrics_handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });

        self.background_tasks.push(metrics_handle);

        // Give the server a moment to start up
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ Metrics service started on port {}", port);
        Ok(())
    }

    /// Start the director, ingestion and housekeeping tasks
    async fn start_background_tasks(&mut self) -> Result<(), ServiceError> {
        info!("Starting background tasks...");

        let director_task = {
            let director = self.context.director.clone();
            let is_running = self.context.is_running.clone();

            tokio::spawn(async move {
                director.run(is_running).await;
            })
        };
        self.background_tasks.push(director_task);

        if let Some(ingestor) = self.context.ingestor.clone() {
            let is_running = self.context.is_running.clone();
            let ingestion_task = tokio::spawn(async move {
                ingestor.run(is_running).await;
            });
            self.background_tasks.push(ingestion_task);
        }

        info!("Starting health metrics task (15s interval)...");
        let health_metrics_task = {
            let context = self.context.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(15));
                info!("Health metrics task started");

                while context.is_running().await {
                    interval.tick().await;

                    let uptime_seconds = context.uptime().as_secs() as i64;
                    let stats = context.store_stats().await;
                    context.metrics.service().uptime_seconds.set(uptime_seconds);
                    context.metrics.set_pending_tickets(stats.pending);

                    debug!(
                        "Updated service health metrics - uptime: {}s, pending tickets: {}",
                        uptime_seconds, stats.pending
                    );

                    context.metrics.update_health_status(2);
                    context.metrics.update_component_health("director", true);
                    context
                        .metrics
                        .update_component_health("ticket_ingestor", context.ingestor.is_some());
                    context.metrics.update_component_health("ticket_store", true);
                }

                info!("Health metrics task stopped");
            })
        };
        self.background_tasks.push(health_metrics_task);

        info!(
            "{} background tasks started successfully",
            self.background_tasks.len()
        );
        Ok(())
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        // Give tasks time to clean up gracefully
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ All {} background tasks stopped", task_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.simulation.rng_seed = Some(1);
        config
    }

    #[tokio::test]
    async fn test_app_state_initialization() {
        let state = AppState::new(test_config()).await.unwrap();

        assert!(!state.is_running().await);
        assert_eq!(state.context().director().profiles().len(), 33);
        assert!(state.context().ingestor().is_some());
    }

    #[tokio::test]
    async fn test_ingestion_can_be_disabled() {
        let mut config = test_config();
        config.frontend.enabled = false;
        let state = AppState::new(config).await.unwrap();
        assert!(state.context().ingestor().is_none());
    }

    #[tokio::test]
    async fn test_invalid_scenario_is_configuration_error() {
        let mut config = test_config();
        config.matchmaking.scenario.regions.clear();
        let err = AppState::new(config).await.err().unwrap();
        assert!(matches!(err, ServiceError::Configuration { .. }));
    }
}

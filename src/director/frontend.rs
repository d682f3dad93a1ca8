//! Ticket ingestion loop
//!
//! Manufactures simulated clients, turns them into tickets and submits them to
//! ticket storage in fixed-size batches.

use crate::config::{AppConfig, FrontendSettings};
use crate::error::Result;
use crate::metrics::MetricsCollector;
use crate::store::TicketFrontend;
use crate::ticket::{
    skill_of, ClientDataGenerator, GeneratorSettings, RegionSelector, TicketSynthesizer,
};
use crate::types::ClientMatchmakingData;
use rand::rngs::StdRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Outcome of one ingestion batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub created: usize,
    pub synthesis_failures: usize,
    pub creation_failures: usize,
}

/// Periodically creates tickets from random client data
pub struct TicketIngestor {
    generator: Mutex<ClientDataGenerator<StdRng>>,
    synthesizer: TicketSynthesizer,
    frontend: Arc<dyn TicketFrontend>,
    metrics: Option<Arc<MetricsCollector>>,
    tickets_per_batch: usize,
    batch_interval: Duration,
}

impl TicketIngestor {
    pub fn new(
        generator: ClientDataGenerator<StdRng>,
        synthesizer: TicketSynthesizer,
        frontend: Arc<dyn TicketFrontend>,
        settings: &FrontendSettings,
    ) -> Self {
        Self {
            generator: Mutex::new(generator),
            synthesizer,
            frontend,
            metrics: None,
            tickets_per_batch: settings.tickets_per_batch,
            batch_interval: Duration::from_millis(settings.batch_interval_ms),
        }
    }

    /// Build an ingestor from the application config and a seeded rng
    pub fn from_config(
        config: &AppConfig,
        rng: StdRng,
        frontend: Arc<dyn TicketFrontend>,
    ) -> Result<Self> {
        let generator = ClientDataGenerator::new(GeneratorSettings::from_config(config), rng)?;
        let synthesizer = TicketSynthesizer::new(RegionSelector::with_threshold(
            config.matchmaking.region_ping_threshold,
        ));
        Ok(Self::new(generator, synthesizer, frontend, &config.frontend))
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Generate, synthesize and submit one batch of tickets
    pub async fn run_batch(&self) -> BatchReport {
        let start = Instant::now();
        let clients: Vec<ClientMatchmakingData> = {
            let mut generator = self.generator.lock().await;
            (0..self.tickets_per_batch)
                .map(|_| generator.generate())
                .collect()
        };

        let mut report = BatchReport::default();
        for client in clients {
            let ticket = match self.synthesizer.synthesize(&client) {
                Ok(ticket) => ticket,
                Err(e) => {
                    error!("Ticket synthesis aborted: {}", e);
                    report.synthesis_failures += 1;
                    self.record_failure("synthesis");
                    continue;
                }
            };

            let skill = skill_of(&ticket);
            match self.frontend.create_ticket(ticket).await {
                Ok(created) => {
                    debug!("Created ticket {}", created.id);
                    report.created += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.record_ticket_created(skill);
                    }
                }
                Err(e) => {
                    warn!("Failed to create ticket: {}", e);
                    report.creation_failures += 1;
                    self.record_failure("creation");
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            let outcome = if report.created == self.tickets_per_batch {
                "complete"
            } else {
                "partial"
            };
            metrics.record_batch(outcome, start.elapsed());
        }

        report
    }

    /// Submit batches every batch interval until `is_running` turns false
    pub async fn run(&self, is_running: Arc<RwLock<bool>>) {
        let mut interval = tokio::time::interval(self.batch_interval);
        info!(
            "Ticket ingestion started - {} tickets every {:?}",
            self.tickets_per_batch, self.batch_interval
        );

        while *is_running.read().await {
            interval.tick().await;
            let report = self.run_batch().await;
            debug!("Ticket batch finished: {:?}", report);
        }

        info!("Ticket ingestion stopped");
    }

    fn record_failure(&self, reason: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_ticket_failure(reason);
        }
    }
}

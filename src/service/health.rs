//! Health check endpoints and monitoring
//!
//! This module provides health check functionality for the match director,
//! including readiness and liveness probes.

use crate::director::CycleReport;
use crate::service::app::ServiceContext;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    /// Profiles polled every cycle
    pub profiles: usize,
    pub tickets_created: u64,
    pub tickets_assigned: u64,
    pub tickets_pending: usize,
    /// Most recent director cycle, if one has completed
    pub last_cycle: Option<CycleReport>,
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(context: &ServiceContext) -> Result<Self> {
        let mut checks = Vec::new();
        let mut overall_status = HealthStatus::Healthy;

        for check in [
            Self::check_service_running(context).await,
            Self::check_director(context).await,
            Self::check_ingestor(context),
        ] {
            match check.status {
                HealthStatus::Unhealthy => overall_status = HealthStatus::Unhealthy,
                HealthStatus::Degraded if overall_status == HealthStatus::Healthy => {
                    overall_status = HealthStatus::Degraded
                }
                _ => {}
            }
            checks.push(check);
        }

        let stats = Self::gather_service_stats(context).await;

        Ok(HealthCheck {
            status: overall_status,
            service: context.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(context: &ServiceContext) -> Result<HealthStatus> {
        if context.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - the service is running and the director has work
    pub async fn readiness_check(context: &ServiceContext) -> Result<HealthStatus> {
        if !context.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_director(context).await.status)
    }

    async fn check_service_running(context: &ServiceContext) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = if context.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// The director is degraded when every profile failed in the last cycle
    async fn check_director(context: &ServiceContext) -> ComponentCheck {
        let start = Instant::now();
        let director = context.director();

        let (status, message) = if director.profiles().is_empty() {
            (
                HealthStatus::Unhealthy,
                Some("No match profiles configured".to_string()),
            )
        } else {
            match director.last_report().await {
                Some(report)
                    if report.profiles > 0
                        && report.fetch_failures + report.assignment_failures
                            >= report.profiles =>
                {
                    (
                        HealthStatus::Degraded,
                        Some(format!(
                            "All {} profiles failed in the last cycle",
                            report.profiles
                        )),
                    )
                }
                _ => (HealthStatus::Healthy, None),
            }
        };

        ComponentCheck {
            name: "director".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_ingestor(context: &ServiceContext) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match context.ingestor() {
            Some(_) => (HealthStatus::Healthy, None),
            None => (
                HealthStatus::Degraded,
                Some("Ticket ingestion disabled".to_string()),
            ),
        };

        ComponentCheck {
            name: "ticket_ingestor".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn gather_service_stats(context: &ServiceContext) -> ServiceStats {
        let store_stats = context.store_stats().await;

        ServiceStats {
            profiles: context.director().profiles().len(),
            tickets_created: store_stats.created,
            tickets_assigned: store_stats.assigned,
            tickets_pending: store_stats.pending,
            last_cycle: context.director().last_report().await,
            uptime_seconds: context.uptime().as_secs(),
        }
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

//! Service layer for the match director
//!
//! This module contains the main application state, service coordination,
//! and background task management for the running service.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceContext, ServiceError};
pub use health::{HealthCheck, HealthStatus};

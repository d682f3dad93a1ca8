//! Error types for the matchmaking core
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Region selection produced no regions for client with {ping_count} ping entries")]
    EmptyRegionSelection { ping_count: usize },

    #[error("Invalid ticket: {reason}")]
    InvalidTicket { reason: String },

    #[error("Ticket not found: {ticket_id}")]
    TicketNotFound { ticket_id: String },

    #[error("Pool query failed for pool {pool}: {message}")]
    PoolQueryFailed { pool: String, message: String },

    #[error("Assignment failed for match {match_id}: {message}")]
    AssignmentFailed { match_id: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

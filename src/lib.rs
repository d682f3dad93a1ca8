//! Match Director - skill-window matchmaking core
//!
//! This crate partitions a matchmaking search space into match profiles,
//! synthesizes searchable tickets from simulated client data, groups pooled
//! tickets into matches and drives a polling director that assigns every
//! proposed match to a game server.

pub mod config;
pub mod director;
pub mod error;
pub mod extensions;
pub mod matchfunction;
pub mod metrics;
pub mod profile;
pub mod service;
pub mod store;
pub mod ticket;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use director::{Director, TicketIngestor};
pub use matchfunction::{GroupingPolicy, MatchFunction};
pub use profile::ProfileGenerator;
pub use store::{AssignmentBackend, InMemoryTicketStore, QueryService, TicketFrontend};
pub use ticket::{RegionSelector, TicketSynthesizer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

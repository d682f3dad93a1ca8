//! Ticket synthesis for the matchmaking simulation
//!
//! This module turns noisy simulated client state into searchable tickets:
//! region selection, ticket construction and the random client generator.

pub mod random;
pub mod region;
pub mod synthesizer;

// Re-export commonly used types
pub use random::{ClientDataGenerator, GeneratorSettings, SimulationMode};
pub use region::{select_regions, RegionSelector, DEFAULT_PING_THRESHOLD};
pub use synthesizer::{latency_of, skill_of, TicketSynthesizer};

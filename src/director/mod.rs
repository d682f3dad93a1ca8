//! Driving loops around the matching core
//!
//! The director polls profiles and assigns proposals; the ingestor feeds
//! simulated tickets into storage.

pub mod cycle;
pub mod frontend;

pub use cycle::{random_connection, CycleReport, Director};
pub use frontend::{BatchReport, TicketIngestor};

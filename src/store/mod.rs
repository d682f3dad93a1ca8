//! Ticket storage: collaborator interfaces and the in-memory implementation

pub mod memory;
pub mod provider;

pub use memory::{InMemoryTicketStore, StoreStats, DEFAULT_ASSIGNMENT_RETENTION};
pub use provider::{query_pools, AssignmentBackend, QueryService, TicketFrontend};

//! Ticket storage interfaces
//!
//! The matching core never owns ticket storage. These traits describe the
//! three collaborators it talks to: ticket ingress, pool queries and
//! assignment egress.

use crate::error::{MatchmakingError, Result};
use crate::types::{Pool, Ticket, TicketId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;

/// Ticket ingress
#[async_trait]
pub trait TicketFrontend: Send + Sync {
    /// Persist a synthesized ticket and return it with its storage-assigned id
    async fn create_ticket(&self, ticket: Ticket) -> Result<Ticket>;

    /// Look up a ticket that has not been assigned yet
    async fn get_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>>;
}

/// Pool queries
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Every searchable ticket satisfying all of the pool's filters
    async fn query_pool(&self, pool: &Pool) -> Result<Vec<Ticket>>;
}

/// Assignment egress
#[async_trait]
pub trait AssignmentBackend: Send + Sync {
    /// Hand a game server connection to every listed ticket
    async fn assign_tickets(&self, ticket_ids: &[TicketId], connection: &str) -> Result<()>;
}

/// Query every pool of a profile, keyed by pool name.
///
/// The first failing pool aborts the whole query.
pub async fn query_pools(
    service: &dyn QueryService,
    pools: &[Pool],
) -> Result<BTreeMap<String, Vec<Ticket>>> {
    let mut results = BTreeMap::new();

    for pool in pools {
        let tickets = service.query_pool(pool).await.map_err(|e| {
            MatchmakingError::PoolQueryFailed {
                pool: pool.name.clone(),
                message: e.to_string(),
            }
        })?;

        debug!("Pool {} returned {} tickets", pool.name, tickets.len());
        results.insert(pool.name.clone(), tickets);
    }

    Ok(results)
}

//! In-process ticket storage
//!
//! Backs all three storage traits with one shared map so the director and the
//! ingestion loop can run against each other without external services.

use crate::error::{MatchmakingError, Result};
use crate::store::provider::{AssignmentBackend, QueryService, TicketFrontend};
use crate::types::{Pool, Ticket, TicketId};
use crate::utils::{current_timestamp, generate_ticket_id};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Counters exposed on the stats endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub created: u64,
    pub assigned: u64,
    pub pending: usize,
}

/// Assignments remembered by default
pub const DEFAULT_ASSIGNMENT_RETENTION: usize = 10_000;

#[derive(Debug, Default)]
struct StoreState {
    /// Searchable tickets keyed by creation sequence
    pending: BTreeMap<u64, Ticket>,
    index: HashMap<TicketId, u64>,
    assignments: HashMap<TicketId, String>,
    /// Assigned ids, oldest first
    assignment_order: VecDeque<TicketId>,
    next_sequence: u64,
    created: u64,
    assigned: u64,
}

impl StoreState {
    fn record_assignment(&mut self, ticket_id: &TicketId, connection: &str, retention: usize) {
        let previous = self
            .assignments
            .insert(ticket_id.clone(), connection.to_string());
        if previous.is_some() {
            return;
        }

        self.assignment_order.push_back(ticket_id.clone());
        while self.assignment_order.len() > retention {
            if let Some(oldest) = self.assignment_order.pop_front() {
                self.assignments.remove(&oldest);
            }
        }
    }
}

/// Ticket store kept entirely in memory.
///
/// Queries return tickets in creation order. Assigned tickets leave the
/// searchable set and keep their connection string until `retention` newer
/// assignments push them out.
#[derive(Debug)]
pub struct InMemoryTicketStore {
    state: RwLock<StoreState>,
    retention: usize,
}

impl Default for InMemoryTicketStore {
    fn default() -> Self {
        Self::with_assignment_retention(DEFAULT_ASSIGNMENT_RETENTION)
    }
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that remembers at most `retention` assignments (minimum one)
    pub fn with_assignment_retention(retention: usize) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            retention: retention.max(1),
        }
    }

    pub async fn stats(&self) -> StoreStats {
        let state = self.state.read().await;
        StoreStats {
            created: state.created,
            assigned: state.assigned,
            pending: state.pending.len(),
        }
    }

    /// Number of assignments currently remembered
    pub async fn retained_assignments(&self) -> usize {
        self.state.read().await.assignments.len()
    }

    /// Connection handed to a ticket, if it has been assigned
    pub async fn assignment(&self, ticket_id: &str) -> Option<String> {
        self.state.read().await.assignments.get(ticket_id).cloned()
    }

    pub async fn pending_count(&self) -> usize {
        self.state.read().await.pending.len()
    }
}

#[async_trait]
impl TicketFrontend for InMemoryTicketStore {
    async fn create_ticket(&self, mut ticket: Ticket) -> Result<Ticket> {
        if !ticket.id.is_empty() {
            return Err(MatchmakingError::InvalidTicket {
                reason: format!("ticket already has id {}", ticket.id),
            }
            .into());
        }
        if ticket.search_fields.tags.is_empty() {
            return Err(MatchmakingError::InvalidTicket {
                reason: "ticket carries no tags".to_string(),
            }
            .into());
        }

        ticket.id = generate_ticket_id();
        ticket.created_at = Some(current_timestamp());

        let mut state = self.state.write().await;
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.created += 1;
        state.index.insert(ticket.id.clone(), sequence);
        state.pending.insert(sequence, ticket.clone());

        debug!("Stored ticket {} (pending: {})", ticket.id, state.pending.len());
        Ok(ticket)
    }

    async fn get_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>> {
        let state = self.state.read().await;
        Ok(state
            .index
            .get(ticket_id)
            .and_then(|sequence| state.pending.get(sequence))
            .cloned())
    }
}

#[async_trait]
impl QueryService for InMemoryTicketStore {
    async fn query_pool(&self, pool: &Pool) -> Result<Vec<Ticket>> {
        let state = self.state.read().await;
        Ok(state
            .pending
            .values()
            .filter(|ticket| pool.matches(ticket))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AssignmentBackend for InMemoryTicketStore {
    /// Tickets still remembered as assigned are re-assigned to the new
    /// connection. Unknown or evicted ids fail the whole call before anything
    /// is changed.
    async fn assign_tickets(&self, ticket_ids: &[TicketId], connection: &str) -> Result<()> {
        let mut state = self.state.write().await;

        if let Some(unknown) = ticket_ids
            .iter()
            .find(|id| !state.index.contains_key(*id) && !state.assignments.contains_key(*id))
        {
            return Err(MatchmakingError::TicketNotFound {
                ticket_id: unknown.clone(),
            }
            .into());
        }

        for ticket_id in ticket_ids {
            if let Some(sequence) = state.index.remove(ticket_id) {
                state.pending.remove(&sequence);
                state.assigned += 1;
            }
            state.record_assignment(ticket_id, connection, self.retention);
        }

        info!(
            "Assigned {} tickets to {} (pending: {})",
            ticket_ids.len(),
            connection,
            state.pending.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DoubleRangeFilter, TagPresentFilter, SKILL_ARG};

    fn ticket(tags: &[&str], skill: f64) -> Ticket {
        let mut ticket = Ticket::default();
        ticket.search_fields.tags = tags.iter().map(|t| t.to_string()).collect();
        ticket
            .search_fields
            .double_args
            .insert(SKILL_ARG.to_string(), skill);
        ticket
    }

    fn pool(tag: &str, min: f64, max: f64) -> Pool {
        Pool {
            name: "all".to_string(),
            double_range_filters: vec![DoubleRangeFilter {
                double_arg: SKILL_ARG.to_string(),
                min,
                max,
            }],
            tag_present_filters: vec![TagPresentFilter {
                tag: tag.to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_create_assigns_identity() {
        let store = InMemoryTicketStore::new();
        let created = store.create_ticket(ticket(&["europe"], 10.0)).await.unwrap();

        assert!(!created.id.is_empty());
        assert!(created.created_at.is_some());
        assert_eq!(
            store.get_ticket(&created.id).await.unwrap(),
            Some(created.clone())
        );
        assert_eq!(store.stats().await.created, 1);
    }

    #[tokio::test]
    async fn test_create_rejects_bad_tickets() {
        let store = InMemoryTicketStore::new();
        assert!(store.create_ticket(Ticket::default()).await.is_err());

        let mut with_id = ticket(&["europe"], 1.0);
        with_id.id = "preset".to_string();
        assert!(store.create_ticket(with_id).await.is_err());
        assert_eq!(store.stats().await, StoreStats::default());
    }

    #[tokio::test]
    async fn test_query_filters_in_creation_order() {
        let store = InMemoryTicketStore::new();
        let a = store.create_ticket(ticket(&["europe"], 100.0)).await.unwrap();
        store.create_ticket(ticket(&["us"], 100.0)).await.unwrap();
        store.create_ticket(ticket(&["europe"], 900.0)).await.unwrap();
        let d = store.create_ticket(ticket(&["europe"], 525.0)).await.unwrap();

        let found = store.query_pool(&pool("europe", -25.0, 525.0)).await.unwrap();
        let ids: Vec<_> = found.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, vec![a.id, d.id]);
    }

    #[tokio::test]
    async fn test_assignment_removes_from_search() {
        let store = InMemoryTicketStore::new();
        let a = store.create_ticket(ticket(&["europe"], 1.0)).await.unwrap();
        let b = store.create_ticket(ticket(&["europe"], 2.0)).await.unwrap();

        store
            .assign_tickets(&[a.id.clone()], "10.0.0.1:2222")
            .await
            .unwrap();

        assert_eq!(store.get_ticket(&a.id).await.unwrap(), None);
        assert_eq!(
            store.assignment(&a.id).await.as_deref(),
            Some("10.0.0.1:2222")
        );
        let remaining = store.query_pool(&pool("europe", 0.0, 10.0)).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b.id);

        // Reassignment overwrites the connection
        store
            .assign_tickets(&[a.id.clone(), b.id.clone()], "10.0.0.2:2222")
            .await
            .unwrap();
        assert_eq!(
            store.assignment(&a.id).await.as_deref(),
            Some("10.0.0.2:2222")
        );
        assert_eq!(
            store.stats().await,
            StoreStats {
                created: 2,
                assigned: 2,
                pending: 0
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_ticket_fails_whole_assignment() {
        let store = InMemoryTicketStore::new();
        let a = store.create_ticket(ticket(&["europe"], 1.0)).await.unwrap();

        let err = store
            .assign_tickets(&[a.id.clone(), "missing".to_string()], "10.0.0.1:2222")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::TicketNotFound { .. })
        ));
        assert_eq!(store.pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_old_assignments_are_evicted() {
        let store = InMemoryTicketStore::with_assignment_retention(2);
        let mut ids = Vec::new();
        for skill in 0..3 {
            let created = store
                .create_ticket(ticket(&["europe"], skill as f64))
                .await
                .unwrap();
            ids.push(created.id);
        }

        for id in &ids {
            store
                .assign_tickets(&[id.clone()], "10.0.0.1:2222")
                .await
                .unwrap();
        }

        assert_eq!(store.retained_assignments().await, 2);
        assert_eq!(store.assignment(&ids[0]).await, None);
        assert!(store.assignment(&ids[2]).await.is_some());
        assert_eq!(store.stats().await.assigned, 3);

        // Evicted tickets are no longer known to the store
        assert!(store
            .assign_tickets(&[ids[0].clone()], "10.0.0.2:2222")
            .await
            .is_err());
        // Re-assigning a retained ticket keeps its slot
        store
            .assign_tickets(&[ids[1].clone()], "10.0.0.2:2222")
            .await
            .unwrap();
        assert_eq!(store.retained_assignments().await, 2);
        assert_eq!(
            store.assignment(&ids[1]).await.as_deref(),
            Some("10.0.0.2:2222")
        );
    }
}

//! The match function: fetch a profile's pools, group them, stream the result

use crate::error::Result;
use crate::matchfunction::grouping::{group_matches, GroupingPolicy, ProfileParams};
use crate::store::provider::{query_pools, QueryService};
use crate::types::{Match, MatchProfile};
use std::sync::Arc;
use tokio_stream::Iter;
use tracing::{info, warn};

/// Finite, ordered stream of proposals for one profile and one cycle
pub type MatchStream = Iter<std::vec::IntoIter<Match>>;

/// Runs one grouping policy against pools fetched from a [`QueryService`]
#[derive(Clone)]
pub struct MatchFunction {
    query: Arc<dyn QueryService>,
    policy: GroupingPolicy,
    best_region_max_ping: f64,
}

impl MatchFunction {
    pub fn new(
        query: Arc<dyn QueryService>,
        policy: GroupingPolicy,
        best_region_max_ping: f64,
    ) -> Self {
        Self {
            query,
            policy,
            best_region_max_ping,
        }
    }

    pub fn policy(&self) -> GroupingPolicy {
        self.policy
    }

    /// Generate proposals for `profile`.
    ///
    /// Query failures are returned to the caller. A profile without a usable
    /// player count produces an empty stream.
    pub async fn run(&self, profile: &MatchProfile) -> Result<MatchStream> {
        let pools = query_pools(self.query.as_ref(), &profile.pools).await?;

        let matches = match ProfileParams::from_profile(profile, self.best_region_max_ping) {
            Some(params) => group_matches(self.policy, &pools, &params),
            None => {
                warn!(
                    "Profile {} has no valid player count, skipping grouping",
                    profile.name
                );
                Vec::new()
            }
        };

        info!(
            "Streaming {} proposals for profile {}",
            matches.len(),
            profile.name
        );
        Ok(tokio_stream::iter(matches))
    }
}

impl std::fmt::Debug for MatchFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchFunction")
            .field("policy", &self.policy)
            .field("best_region_max_ping", &self.best_region_max_ping)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions;
    use crate::types::{Pool, Ticket, MAX_PLAYERS_KEY, MAX_SKILL_DIFFERENCE_KEY, SKILL_ARG};
    use async_trait::async_trait;
    use mockall::mock;
    use tokio_stream::StreamExt;

    mock! {
        pub Query {}

        #[async_trait]
        impl QueryService for Query {
            async fn query_pool(&self, pool: &Pool) -> Result<Vec<Ticket>>;
        }
    }

    fn tickets(count: usize) -> Vec<Ticket> {
        (0..count)
            .map(|i| {
                let mut t = Ticket {
                    id: format!("t{}", i),
                    ..Ticket::default()
                };
                t.search_fields
                    .double_args
                    .insert(SKILL_ARG.to_string(), i as f64);
                t
            })
            .collect()
    }

    fn profile(max_players: Option<f64>) -> MatchProfile {
        let mut profile = MatchProfile {
            name: "europe_bank_it_b0_trusted_true".to_string(),
            pools: vec![Pool {
                name: "all".to_string(),
                double_range_filters: Vec::new(),
                tag_present_filters: Vec::new(),
            }],
            extensions: Default::default(),
        };
        if let Some(max_players) = max_players {
            extensions::add_number(&mut profile.extensions, MAX_PLAYERS_KEY, max_players);
        }
        extensions::add_number(&mut profile.extensions, MAX_SKILL_DIFFERENCE_KEY, 50.0);
        profile
    }

    #[tokio::test]
    async fn test_run_streams_grouped_matches() {
        let mut query = MockQuery::new();
        query
            .expect_query_pool()
            .times(1)
            .returning(|_| Ok(tickets(12)));

        let function = MatchFunction::new(Arc::new(query), GroupingPolicy::Skill, 100.0);
        let stream = function.run(&profile(Some(10.0))).await.unwrap();
        let matches: Vec<Match> = stream.collect().await;

        assert_eq!(matches.len(), 3);
        assert_eq!(matches[0].match_profile, "europe_bank_it_b0_trusted_true");
    }

    #[tokio::test]
    async fn test_query_failure_is_returned() {
        let mut query = MockQuery::new();
        query
            .expect_query_pool()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));

        let function = MatchFunction::new(Arc::new(query), GroupingPolicy::Skill, 100.0);
        assert!(function.run(&profile(Some(10.0))).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_player_count_yields_empty_stream() {
        let mut query = MockQuery::new();
        query.expect_query_pool().returning(|_| Ok(tickets(12)));

        let function = MatchFunction::new(Arc::new(query), GroupingPolicy::Exhaustive, 100.0);
        let matches: Vec<Match> = function.run(&profile(None)).await.unwrap().collect().await;
        assert!(matches.is_empty());
    }
}

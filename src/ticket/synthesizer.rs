//! Ticket synthesis from simulated client state
//!
//! Turns a [`ClientMatchmakingData`] into the searchable [`Ticket`] handed to
//! ticket storage, and provides the accessors the grouping stage uses to read
//! skill and latency back out of a ticket.

use crate::error::{MatchmakingError, Result};
use crate::extensions::{self, Extensions};
use crate::ticket::region::RegionSelector;
use crate::types::{
    ClientMatchmakingData, SearchFields, Ticket, BEGINNER_TAG, BEST_REGION_KEY, SKILL_ARG,
};
use std::collections::HashMap;
use tracing::debug;

/// Builds tickets from client state
#[derive(Debug, Clone, Default)]
pub struct TicketSynthesizer {
    region_selector: RegionSelector,
}

impl TicketSynthesizer {
    pub fn new(region_selector: RegionSelector) -> Self {
        Self { region_selector }
    }

    /// Build a ticket for one client.
    ///
    /// Tags are `[mode, trust, password?, beginner?, regions...]` with regions
    /// in preference order. Every pinged region is stored as an extension, not
    /// just the selected ones. Fails when region selection comes back empty.
    pub fn synthesize(&self, data: &ClientMatchmakingData) -> Result<Ticket> {
        let desired_regions = self.region_selector.select(&data.region_data.pings);
        let best_region = match desired_regions.first() {
            Some(region) => region.region.clone(),
            None => {
                return Err(MatchmakingError::EmptyRegionSelection {
                    ping_count: data.region_data.pings.len(),
                }
                .into())
            }
        };

        let mut tags = vec![data.game_mode.clone(), data.trusted.clone()];
        if !data.password.is_empty() {
            tags.push(data.password.clone());
        }
        if data.beginner {
            tags.push(BEGINNER_TAG.to_string());
        }
        tags.extend(desired_regions.iter().map(|r| r.region.clone()));

        let mut ticket_extensions = Extensions::new();
        extensions::add_text(&mut ticket_extensions, BEST_REGION_KEY, &best_region);
        for (region, ping) in &data.region_data.pings {
            extensions::add_number(&mut ticket_extensions, region, *ping);
        }

        debug!(
            "Synthesized ticket - mode: '{}', skill: {:.1}, best_region: '{}', regions: {}",
            data.game_mode,
            data.skill,
            best_region,
            desired_regions.len()
        );

        Ok(Ticket {
            id: String::new(),
            search_fields: SearchFields {
                tags,
                double_args: HashMap::from([(SKILL_ARG.to_string(), data.skill)]),
            },
            extensions: ticket_extensions,
            created_at: None,
        })
    }
}

/// The ticket's stored skill; zero when the field is missing
pub fn skill_of(ticket: &Ticket) -> f64 {
    ticket
        .search_fields
        .double_args
        .get(SKILL_ARG)
        .copied()
        .unwrap_or(0.0)
}

/// The ticket's stored ping towards `region`.
///
/// When `region` is the ticket's best region the value is capped at
/// `best_region_max_ping`. Regions the ticket never pinged decode to negative
/// infinity.
pub fn latency_of(ticket: &Ticket, region: &str, best_region_max_ping: f64) -> f64 {
    let region_ping = extensions::get_number(&ticket.extensions, region);
    let best_region = extensions::get_text(&ticket.extensions, BEST_REGION_KEY);

    if !extensions::is_sentinel(&best_region)
        && best_region == region
        && region_ping > best_region_max_ping
    {
        return best_region_max_ping;
    }
    region_ping
}

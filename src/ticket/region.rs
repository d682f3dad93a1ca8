//! Region selection for ticket synthesis
//!
//! Decides which regions a player is willing to be matched in, given the
//! ping the client measured towards every region.

use crate::types::RegionPing;
use std::collections::BTreeMap;

/// Regions with ping strictly below this are acceptable by default
pub const DEFAULT_PING_THRESHOLD: f64 = 300.0;

/// Selects acceptable regions ordered by preference
#[derive(Debug, Clone)]
pub struct RegionSelector {
    threshold: f64,
}

impl RegionSelector {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_PING_THRESHOLD)
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Select every region below the threshold, sorted by ascending ping.
    ///
    /// When no region passes, the single lowest-ping region is returned
    /// instead, so the result is only empty for an empty input. Equal pings
    /// keep the map's iteration order.
    pub fn select(&self, pings: &BTreeMap<String, f64>) -> Vec<RegionPing> {
        let mut best: Option<(&str, f64)> = None;
        let mut selected = Vec::new();

        for (region, &ping) in pings {
            match best {
                Some((_, best_ping)) if ping >= best_ping => {}
                _ => best = Some((region.as_str(), ping)),
            }

            if ping < self.threshold {
                selected.push(RegionPing {
                    region: region.clone(),
                    ping,
                });
            }
        }

        if selected.is_empty() {
            if let Some((region, ping)) = best {
                selected.push(RegionPing {
                    region: region.to_string(),
                    ping,
                });
            }
        }

        selected.sort_by(|a, b| {
            a.ping
                .partial_cmp(&b.ping)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        selected
    }
}

impl Default for RegionSelector {
    fn default() -> Self {
        Self::new()
    }
}

/// Select regions using the default threshold
pub fn select_regions(pings: &BTreeMap<String, f64>) -> Vec<RegionPing> {
    RegionSelector::new().select(pings)
}

//! Utility functions for the matchmaking core

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use uuid::Uuid;

/// Wall-clock format used inside match ids
const MATCH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Generate a new unique ticket ID
pub fn generate_ticket_id() -> String {
    Uuid::new_v4().to_string()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Build a match id from the profile name, a timestamp and a per-call sequence number.
/// Only the sequence number is guaranteed to differ between matches of one call.
pub fn match_id(profile_name: &str, timestamp: DateTime<Utc>, sequence: usize) -> String {
    format!(
        "profile-{}-time-{}-{}",
        profile_name,
        timestamp.format(MATCH_TIME_FORMAT),
        sequence
    )
}

/// Arithmetic mean; zero for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Negative sum of squared deviations from `avg`. More negative means more spread.
pub fn negative_dispersion(values: &[f64], avg: f64) -> f64 {
    values.iter().fold(0.0, |acc, v| {
        let diff = v - avg;
        acc - diff * diff
    })
}

/// Rng for one independent random stream.
///
/// With a seed, each `(seed, stream)` pair gets its own reproducible
/// sequence; without one the rng is seeded from the operating system.
pub fn seeded_rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => {
            // Seed and stream occupy disjoint halves of the key
            let mut key = <StdRng as SeedableRng>::Seed::default();
            key[..8].copy_from_slice(&seed.to_le_bytes());
            key[8..16].copy_from_slice(&stream.to_le_bytes());
            StdRng::from_seed(key)
        }
        None => StdRng::from_entropy(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_ticket_id();
        let id2 = generate_ticket_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_match_id_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(
            match_id("europe_bank_it", ts, 7),
            "profile-europe_bank_it-time-2024-03-01T12:30:05.000-7"
        );
    }

    #[test]
    fn test_seeded_streams() {
        use rand::Rng;

        let a: u64 = seeded_rng(Some(5), 0).gen();
        let b: u64 = seeded_rng(Some(5), 0).gen();
        let c: u64 = seeded_rng(Some(5), 1).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);

        // Neighbouring seeds do not share streams
        let shifted: u64 = seeded_rng(Some(6), 0).gen();
        assert_ne!(c, shifted);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }

    #[test]
    fn test_negative_dispersion() {
        assert_eq!(negative_dispersion(&[5.0, 5.0, 5.0], 5.0), 0.0);
        // deviations -1, 0, 1
        assert_eq!(negative_dispersion(&[1.0, 2.0, 3.0], 2.0), -2.0);
    }
}

//! Match profile generation

pub mod generator;

pub use generator::{generate_profiles, profile_name, ProfileGenerator};

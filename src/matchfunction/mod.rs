//! Match function and grouping policies

pub mod function;
pub mod grouping;

pub use function::{MatchFunction, MatchStream};
pub use grouping::{
    group_by_skill, group_exhaustive, group_matches, GroupingPolicy, ProfileParams,
    DEFAULT_BEST_REGION_MAX_PING, MATCH_FUNCTION_NAME,
};

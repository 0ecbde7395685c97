//! Round engine for jury-rs.
//!
//! `jury-core` runs judging rounds over contest entries: the round state
//! machine, task allocation and rebalancing, ballot validation and
//! recording, disqualification and threshold-based advancement.
//!
//! Every service takes an [`Actor`] for the authenticated user and runs each
//! mutating operation in a single transaction with the round row locked.

pub mod round_config;
pub mod services;
pub mod vote_method;

pub use round_config::RoundConfig;
pub use services::*;
pub use vote_method::{VoteMethod, VoteRules};

//! Business logic services.

#![allow(missing_docs)]

pub mod access;
pub mod advancement;
pub mod allocation;
pub mod ballot;
pub mod campaign;
pub mod disqualification;
pub mod flag;
pub mod round;

pub use access::Actor;
pub use advancement::{
    AverageCount, EntrySummary, RankedEntry, RoundSummary, ThresholdAdvancer, ThresholdMap,
    ThresholdStep, UnderVotedEntry,
};
pub use allocation::{DedupeStats, IntegrityViolation, RebalanceStats, TaskAllocator};
pub use ballot::{BallotItem, BallotService, JurorTask, JurorVote};
pub use campaign::{CampaignDetails, CampaignService, CreateCampaignInput, EditCampaignInput};
pub use disqualification::{
    AutodisqualifyInput, DisqualificationRule, DisqualificationService, DisqualifiedEntry,
};
pub use flag::{FlagEntryInput, FlagService};
pub use round::{
    AddEntriesResult, CreateRoundInput, EditRoundInput, EntryInput, RoundCounts, RoundService,
};

use jury_common::{AppError, AppResult, RoundsConfig};
use jury_db::entities::round::{self as round_entity, RoundStatus};
use rand::{SeedableRng, rngs::StdRng};

/// RNG for allocation shuffles: seeded when the configuration fixes a seed.
pub(crate) fn allocation_rng(config: &RoundsConfig) -> StdRng {
    config
        .allocation_seed
        .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

/// Reject `action` unless the round is in one of `allowed`.
pub(crate) fn ensure_status(
    round: &round_entity::Model,
    allowed: &[RoundStatus],
    action: &str,
) -> AppResult<()> {
    if allowed.contains(&round.status) {
        Ok(())
    } else {
        Err(AppError::InvalidAction(format!(
            "cannot {action} round {} while it is {}",
            round.id,
            round.status.as_str()
        )))
    }
}

/// The round's quorum as a count. A negative stored quorum means the row is
/// corrupt.
pub(crate) fn round_quorum(round: &round_entity::Model) -> AppResult<usize> {
    usize::try_from(round.quorum)
        .map_err(|_| AppError::Internal(format!("round {} has a negative quorum", round.id)))
}

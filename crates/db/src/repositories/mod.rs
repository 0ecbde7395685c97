//! Repository layer.

mod campaign;
mod entry;
mod flag;
mod round;
mod round_juror;
mod task;
mod user;
mod vote;

pub use campaign::CampaignRepository;
pub use entry::{EntryRepository, RoundEntryRepository};
pub use flag::FlagRepository;
pub use round::RoundRepository;
pub use round_juror::RoundJurorRepository;
pub use task::TaskRepository;
pub use user::UserRepository;
pub use vote::VoteRepository;

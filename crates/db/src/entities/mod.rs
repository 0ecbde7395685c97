//! Database entities.

#![allow(missing_docs)]

pub mod campaign;
pub mod campaign_coord;
pub mod entry;
pub mod flag;
pub mod round;
pub mod round_entry;
pub mod round_juror;
pub mod task;
pub mod user;
pub mod vote;

pub use campaign::Entity as Campaign;
pub use campaign_coord::Entity as CampaignCoord;
pub use entry::Entity as Entry;
pub use flag::Entity as Flag;
pub use round::Entity as Round;
pub use round_entry::Entity as RoundEntry;
pub use round_juror::Entity as RoundJuror;
pub use task::Entity as Task;
pub use user::Entity as User;
pub use vote::Entity as Vote;

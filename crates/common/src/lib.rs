//! Shared types for the jury-rs crates.
//!
//! - [`Config`] with its database and round sections
//! - [`AppError`] / [`AppResult`], the error kinds every service returns
//! - [`IdGenerator`] for time-ordered row IDs
//!
//! ```no_run
//! use jury_common::{AppResult, Config, IdGenerator};
//!
//! fn bootstrap() -> AppResult<IdGenerator> {
//!     let config = Config::load()?;
//!     if config.rounds.allocation_seed.is_some() {
//!         tracing::warn!("Task allocation is deterministic");
//!     }
//!     Ok(IdGenerator::new())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;

pub use config::{Config, DatabaseConfig, RoundsConfig};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;

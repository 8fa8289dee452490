//! Shared types used across all modules.
//!
//! Scores, identities and persisted key records live here so the scoring
//! engine, the entity factory, the pipeline and the repository can share
//! them without reaching into each other's internals.

pub mod identity;
pub mod record;
pub mod score;

pub use identity::Identity;
pub use record::{KeyRecord, KeySummary};
pub use score::Score;

// src/relation/mod.rs

//! Relation state tracking for the local unit.
//!
//! - [`state`] holds the committed membership and the rules deciding which
//!   hook may run next.
//! - [`statedir`] persists that state so a restarted agent resumes exactly
//!   where it left off.
//! - [`queue`] is the pure generator turning membership batches into hooks.
//! - [`context`] is the membership view handed to running hooks.

pub mod context;
pub mod queue;
pub mod state;
pub mod statedir;

pub use context::RelationContext;
pub use queue::HookQueue;
pub use state::{RelationState, ValidationError, ValidationReason};
pub use statedir::{read_all_state_dirs, read_state_dir, StateDir, STATE_FILE};

//! Checkpoint/recovery subsystem.
//!
//! - `prune` -- pure retention-policy selection over a checkpoint list
//! - `service` -- snapshot capture, restore with selective cleanup, and
//!   the read API, wired to the repository ports

pub mod prune;
pub mod service;

pub use service::{CheckpointError, CheckpointService};

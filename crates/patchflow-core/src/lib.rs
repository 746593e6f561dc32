//! Engine logic and repository trait definitions for Patchflow.
//!
//! This crate defines the "ports" (repository traits) that the
//! infrastructure layer implements, plus the core subsystems:
//!
//! - `transition` -- the pure workflow state machine
//! - `checkpoint` -- snapshot, restore, and pruning of workflow state
//! - `diagnosis` -- failure context collection, root cause classification,
//!   and fix proposal orchestration
//! - `advisor` -- the optional LLM collaborator boundary (retry, budget,
//!   prompt registry)
//!
//! It depends only on `patchflow-types` -- never on `patchflow-infra` or
//! any database/IO crate.

pub mod advisor;
pub mod checkpoint;
pub mod diagnosis;
pub mod diff;
pub mod repository;
pub mod sidechannel;
pub mod transition;

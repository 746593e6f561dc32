//! Shared domain types for Patchflow.
//!
//! This crate contains the core domain types used across the Patchflow
//! pipeline: workflow lifecycle state, events, checkpoints, failure
//! diagnosis, and their associated error types.
//!
//! Zero infrastructure dependencies -- serde, uuid, chrono, thiserror, and
//! schemars for the advisor output schema.

pub mod advisor;
pub mod checkpoint;
pub mod config;
pub mod diagnosis;
pub mod error;
pub mod event;
pub mod workflow;

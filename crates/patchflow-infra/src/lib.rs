//! Infrastructure layer for Patchflow.
//!
//! Contains implementations of the repository traits defined in
//! `patchflow-core` (the in-memory store used by the services and their
//! tests) and configuration file loading.

pub mod config;
pub mod memory;

pub use memory::MemoryStore;

//! Failure diagnosis: context collection, root cause classification, and
//! fix proposal orchestration.
//!
//! Split the same way the runtime uses it:
//!
//! - `context` -- assembles a `FailureContext` from a failed run
//! - `diagnoser` -- deterministic heuristic classifier plus fix catalog,
//!   with an optional advisor augmentation
//! - `service` -- orchestrates collect -> diagnose -> persist -> propose,
//!   and the proposal approve/reject lifecycle

pub mod context;
pub mod diagnoser;
pub mod service;

pub use context::ContextCollector;
pub use diagnoser::Diagnoser;
pub use service::DiagnosisService;

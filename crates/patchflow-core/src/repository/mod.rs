//! Storage ports implemented by the infrastructure layer.
//!
//! All traits use native async fn in traits (RPITIT, Rust 2024 edition, no
//! async_trait macro) and return `RepositoryError` for storage failures.
//! A single backend typically implements all four.

pub mod change;
pub mod checkpoint;
pub mod diagnosis;
pub mod workflow;

pub use change::ChangeRepository;
pub use checkpoint::CheckpointRepository;
pub use diagnosis::DiagnosisRepository;
pub use workflow::WorkflowRepository;

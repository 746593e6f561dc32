//! Checkpoint repository trait definition.

use patchflow_types::checkpoint::Checkpoint;
use patchflow_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for checkpoint records.
///
/// Checkpoints are immutable: there is no update operation.
pub trait CheckpointRepository: Send + Sync {
    /// Insert a new checkpoint.
    fn create_checkpoint(
        &self,
        checkpoint: &Checkpoint,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a checkpoint by its UUID.
    fn get_checkpoint(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Checkpoint>, RepositoryError>> + Send;

    /// List checkpoints for a workflow, newest first.
    fn list_checkpoints(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Checkpoint>, RepositoryError>> + Send;

    /// Delete a checkpoint by ID. Returns `true` if it existed.
    fn delete_checkpoint(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Delete a batch of checkpoints. Returns the count deleted.
    fn delete_checkpoints(
        &self,
        ids: &[Uuid],
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}

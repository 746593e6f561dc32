//! Change repository trait definition.
//!
//! Covers the records a workflow's proposed change is made of: artifacts,
//! patch sets (with their patches), approvals, and policy violations.

use chrono::{DateTime, Utc};
use patchflow_types::error::RepositoryError;
use patchflow_types::workflow::{
    Approval, Artifact, Patch, PatchSet, PatchSetStatus, PolicyViolation,
};
use uuid::Uuid;

/// Repository trait for change records.
pub trait ChangeRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Artifacts
    // -----------------------------------------------------------------------

    /// Insert a new artifact.
    fn create_artifact(
        &self,
        artifact: &Artifact,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List artifacts for a workflow, newest first.
    fn list_artifacts(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Artifact>, RepositoryError>> + Send;

    /// Delete artifacts created strictly after `cutoff`. Returns the count.
    fn delete_artifacts_after(
        &self,
        workflow_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Patch sets
    // -----------------------------------------------------------------------

    /// Insert a patch set together with its patches.
    fn create_patch_set(
        &self,
        patch_set: &PatchSet,
        patches: &[Patch],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a patch set by its UUID.
    fn get_patch_set(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<PatchSet>, RepositoryError>> + Send;

    /// List patch sets for a workflow, newest first.
    fn list_patch_sets(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<PatchSet>, RepositoryError>> + Send;

    /// List the patches belonging to a patch set.
    fn list_patches(
        &self,
        patch_set_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Patch>, RepositoryError>> + Send;

    /// Update a patch set's approval-lifecycle status.
    fn update_patch_set_status(
        &self,
        id: &Uuid,
        status: PatchSetStatus,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete patch sets (and their patches) created strictly after
    /// `cutoff`. Returns the count of deleted patch sets.
    fn delete_patch_sets_after(
        &self,
        workflow_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Approvals
    // -----------------------------------------------------------------------

    /// Insert an approval record.
    fn create_approval(
        &self,
        approval: &Approval,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List approvals for a workflow, newest first.
    fn list_approvals(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Approval>, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Policy violations
    // -----------------------------------------------------------------------

    /// Insert a policy violation.
    fn create_violation(
        &self,
        violation: &PolicyViolation,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List policy violations for a workflow, newest first.
    fn list_violations(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<PolicyViolation>, RepositoryError>> + Send;
}

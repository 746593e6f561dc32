//! Diagnosis repository trait definition.

use patchflow_types::diagnosis::{DiagnosisResult, FixProposal};
use patchflow_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for diagnosis results and fix proposals.
pub trait DiagnosisRepository: Send + Sync {
    /// Persist a diagnosis result.
    fn save_diagnosis(
        &self,
        diagnosis: &DiagnosisResult,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a diagnosis by its UUID.
    fn get_diagnosis(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<DiagnosisResult>, RepositoryError>> + Send;

    /// Insert a fix proposal.
    fn create_proposal(
        &self,
        proposal: &FixProposal,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a fix proposal by its UUID.
    fn get_proposal(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<FixProposal>, RepositoryError>> + Send;

    /// Replace a fix proposal record (status transitions).
    fn update_proposal(
        &self,
        proposal: &FixProposal,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List proposals for a workflow, newest first.
    fn list_proposals(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<FixProposal>, RepositoryError>> + Send;
}

use uuid::Uuid;

use thiserror::Error;

use crate::workflow::RunStatus;

/// Errors from repository operations (used by trait definitions in
/// patchflow-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the diagnosis subsystem.
///
/// Advisor failures never appear here: the advisor is an optional
/// augmentation and falls back to heuristics internally.
#[derive(Debug, Error)]
pub enum DiagnosisError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(Uuid),

    #[error("workflow run not found: {0}")]
    RunNotFound(Uuid),

    #[error("run {run_id} is not in failed status (found {status:?}); diagnosis is only valid for failed runs")]
    RunNotFailed { run_id: Uuid, status: RunStatus },

    #[error("fix proposal not found: {0}")]
    ProposalNotFound(Uuid),

    #[error("fix proposal {proposal_id} is not pending approval (found {status})")]
    ProposalNotPending { proposal_id: Uuid, status: String },

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_diagnosis_error_display() {
        let id = Uuid::nil();
        let err = DiagnosisError::RunNotFailed {
            run_id: id,
            status: RunStatus::Running,
        };
        assert!(err.to_string().contains("not in failed status"));

        let err = DiagnosisError::from(RepositoryError::NotFound);
        assert!(err.to_string().contains("entity not found"));
    }
}

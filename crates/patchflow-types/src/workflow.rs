//! Workflow domain types for Patchflow.
//!
//! Defines the workflow lifecycle state machine's vocabulary: states, the
//! records the driver persists (workflows, runs, patch sets, approvals,
//! policy violations, artifacts), and the input/output types of the pure
//! transition function (`TransitionContext`, `TransitionResult`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Workflow State
// ---------------------------------------------------------------------------

/// Lifecycle state of a change-pipeline workflow.
///
/// `Done`, `Failed`, `BlockedPolicy`, and `NeedsHuman` are terminal: no
/// event transitions a workflow out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Ingested,
    PatchesProposed,
    WaitingUserApproval,
    ApplyingPatches,
    PrOpen,
    VerifyingCi,
    Done,
    Failed,
    BlockedPolicy,
    NeedsHuman,
}

impl WorkflowState {
    /// Whether this state is terminal (absorbing).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowState::Done
                | WorkflowState::Failed
                | WorkflowState::BlockedPolicy
                | WorkflowState::NeedsHuman
        )
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowState::Ingested => "ingested",
            WorkflowState::PatchesProposed => "patches_proposed",
            WorkflowState::WaitingUserApproval => "waiting_user_approval",
            WorkflowState::ApplyingPatches => "applying_patches",
            WorkflowState::PrOpen => "pr_open",
            WorkflowState::VerifyingCi => "verifying_ci",
            WorkflowState::Done => "done",
            WorkflowState::Failed => "failed",
            WorkflowState::BlockedPolicy => "blocked_policy",
            WorkflowState::NeedsHuman => "needs_human",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// A workflow record as stored by the persistence collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// UUIDv7 workflow ID.
    pub id: Uuid,
    /// Current lifecycle state.
    pub state: WorkflowState,
    /// Base revision the proposed changes apply against.
    pub base_sha: String,
    /// When the workflow was created.
    pub created_at: DateTime<Utc>,
}

/// Status of a single job execution within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// A single job execution instance. Used for query results and diagnosis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// UUIDv7 run ID.
    pub id: Uuid,
    /// Parent workflow ID.
    pub workflow_id: Uuid,
    /// Name of the job that ran (e.g. "ingest_context", "apply_patches").
    pub job_name: String,
    /// Current run status.
    pub status: RunStatus,
    /// Error message if the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
    /// JSON inputs the job was invoked with.
    pub inputs: serde_json::Value,
    /// Partial or full JSON outputs, if any were produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<serde_json::Value>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run completed (None if still running).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Status of a proposed patch set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchSetStatus {
    Proposed,
    Approved,
    Rejected,
    Applied,
}

/// A set of proposed patches awaiting the approval gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchSet {
    /// UUIDv7 patch set ID.
    pub id: Uuid,
    /// Parent workflow ID.
    pub workflow_id: Uuid,
    /// Human-readable title.
    pub title: String,
    /// Current status in the approval lifecycle.
    pub status: PatchSetStatus,
    /// When the patch set was created.
    pub created_at: DateTime<Utc>,
}

/// A single file-level patch within a patch set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    /// UUIDv7 patch ID.
    pub id: Uuid,
    /// Parent patch set ID.
    pub patch_set_id: Uuid,
    /// Path of the file this patch touches.
    pub file_path: String,
    /// Unified diff text.
    pub diff: String,
    /// When the patch was created.
    pub created_at: DateTime<Utc>,
}

/// A recorded human approval for a patch set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    /// UUIDv7 approval ID.
    pub id: Uuid,
    /// Parent workflow ID.
    pub workflow_id: Uuid,
    /// Patch set this approval applies to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_set_id: Option<Uuid>,
    /// Who approved.
    pub approved_by: String,
    /// When the approval was recorded.
    pub created_at: DateTime<Utc>,
}

/// A policy violation raised against a workflow's proposed changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyViolation {
    /// UUIDv7 violation ID.
    pub id: Uuid,
    /// Parent workflow ID.
    pub workflow_id: Uuid,
    /// Rule identifier (e.g. "frozen_file").
    pub rule: String,
    /// Human-readable explanation.
    pub message: String,
    /// Whether this violation blocks the workflow from proceeding.
    pub blocking: bool,
    /// File the violation points at, if file-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// When the violation was recorded.
    pub created_at: DateTime<Utc>,
}

/// A content-addressed artifact attached to a workflow (e.g. a diagnosis
/// report rendered as markdown).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// UUIDv7 artifact ID.
    pub id: Uuid,
    /// Parent workflow ID.
    pub workflow_id: Uuid,
    /// Artifact kind (e.g. "diagnosis", "prd").
    pub kind: String,
    /// Full artifact content.
    pub content: String,
    /// SHA-256 hex digest of the content.
    pub content_hash: String,
    /// When the artifact was created.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Transition function input/output
// ---------------------------------------------------------------------------

/// Read-only projection of storage supplied by the driver at transition time.
///
/// The transition function never queries storage itself; the driver is
/// responsible for assembling a consistent snapshot before each call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionContext {
    /// Workflow the event applies to.
    pub workflow_id: Uuid,
    /// Whether at least one patch set exists.
    pub has_patch_sets: bool,
    /// The most recently created patch set, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_patch_set_id: Option<Uuid>,
    /// Whether an approval exists that permits applying patches.
    pub has_approval_to_apply: bool,
    /// Whether any blocking policy violation is on record.
    pub has_blocking_policy_violations: bool,
}

/// A job the driver should enqueue as a consequence of a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Queue to place the job on.
    pub queue: String,
    /// Job name (matches the `stage` field of later job events).
    pub name: String,
    /// Opaque JSON payload handed to the worker.
    pub payload: serde_json::Value,
}

/// Result of a single transition computation.
///
/// Every call to the transition function returns exactly one of these; the
/// function is total and never errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResult {
    /// State the workflow should move to (may equal the current state).
    pub next_state: WorkflowState,
    /// Jobs the driver must enqueue.
    pub enqueue: Vec<JobSpec>,
    /// Human-readable explanation of why this transition (or non-transition)
    /// was chosen. Useful in audit logs.
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_states() {
        assert!(WorkflowState::Done.is_terminal());
        assert!(WorkflowState::Failed.is_terminal());
        assert!(WorkflowState::BlockedPolicy.is_terminal());
        assert!(WorkflowState::NeedsHuman.is_terminal());

        assert!(!WorkflowState::Ingested.is_terminal());
        assert!(!WorkflowState::PatchesProposed.is_terminal());
        assert!(!WorkflowState::WaitingUserApproval.is_terminal());
        assert!(!WorkflowState::ApplyingPatches.is_terminal());
        assert!(!WorkflowState::PrOpen.is_terminal());
        assert!(!WorkflowState::VerifyingCi.is_terminal());
    }

    #[test]
    fn test_workflow_state_serde() {
        let json_str = serde_json::to_string(&WorkflowState::BlockedPolicy).unwrap();
        assert_eq!(json_str, "\"blocked_policy\"");
        let parsed: WorkflowState = serde_json::from_str("\"waiting_user_approval\"").unwrap();
        assert_eq!(parsed, WorkflowState::WaitingUserApproval);
    }

    #[test]
    fn test_workflow_state_display_matches_serde() {
        for state in [
            WorkflowState::Ingested,
            WorkflowState::PatchesProposed,
            WorkflowState::WaitingUserApproval,
            WorkflowState::ApplyingPatches,
            WorkflowState::PrOpen,
            WorkflowState::VerifyingCi,
            WorkflowState::Done,
            WorkflowState::Failed,
            WorkflowState::BlockedPolicy,
            WorkflowState::NeedsHuman,
        ] {
            let via_serde = serde_json::to_string(&state).unwrap();
            assert_eq!(via_serde, format!("\"{state}\""));
        }
    }

    #[test]
    fn test_workflow_run_json_roundtrip() {
        let run = WorkflowRun {
            id: Uuid::now_v7(),
            workflow_id: Uuid::now_v7(),
            job_name: "apply_patches".to_string(),
            status: RunStatus::Failed,
            error_msg: Some("WRITE_BLOCKED: frozen path".to_string()),
            inputs: json!({"patch_set_id": "ps-1"}),
            outputs: None,
            started_at: Utc::now(),
            completed_at: Some(Utc::now()),
            duration_ms: Some(4200),
        };
        let json_str = serde_json::to_string(&run).unwrap();
        let parsed: WorkflowRun = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.job_name, "apply_patches");
        assert_eq!(parsed.status, RunStatus::Failed);
        assert_eq!(parsed.duration_ms, Some(4200));
    }

    #[test]
    fn test_transition_result_roundtrip() {
        let result = TransitionResult {
            next_state: WorkflowState::ApplyingPatches,
            enqueue: vec![JobSpec {
                queue: "workflow".to_string(),
                name: "apply_patches".to_string(),
                payload: json!({"patch_set_id": "abc"}),
            }],
            reason: "approval recorded".to_string(),
        };
        let json_str = serde_json::to_string(&result).unwrap();
        let parsed: TransitionResult = serde_json::from_str(&json_str).unwrap();
        assert_eq!(parsed.next_state, WorkflowState::ApplyingPatches);
        assert_eq!(parsed.enqueue.len(), 1);
        assert_eq!(parsed.enqueue[0].name, "apply_patches");
    }

    #[test]
    fn test_patch_set_status_serde() {
        for status in [
            PatchSetStatus::Proposed,
            PatchSetStatus::Approved,
            PatchSetStatus::Rejected,
            PatchSetStatus::Applied,
        ] {
            let json_str = serde_json::to_string(&status).unwrap();
            let parsed: PatchSetStatus = serde_json::from_str(&json_str).unwrap();
            assert_eq!(parsed, status);
        }
    }
}

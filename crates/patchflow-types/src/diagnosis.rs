//! Failure diagnosis types.
//!
//! `FailureContext` is the immutable input assembled once per diagnosis
//! request; `DiagnosisResult` is the classified output with ranked fixes;
//! `FixProposal` is the human-approvable suggestion derived from a fix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::WorkflowEvent;
use crate::workflow::{PolicyViolation, WorkflowState};

// ---------------------------------------------------------------------------
// Root cause taxonomy
// ---------------------------------------------------------------------------

/// Closed set of root cause categories a failure can classify into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootCauseCategory {
    CodeError,
    TestFailure,
    BuildError,
    DependencyIssue,
    ConfigurationError,
    PolicyViolation,
    ResourceLimit,
    ExternalService,
    DataIssue,
    PermissionDenied,
    NetworkError,
    Unknown,
}

impl std::fmt::Display for RootCauseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RootCauseCategory::CodeError => "code_error",
            RootCauseCategory::TestFailure => "test_failure",
            RootCauseCategory::BuildError => "build_error",
            RootCauseCategory::DependencyIssue => "dependency_issue",
            RootCauseCategory::ConfigurationError => "configuration_error",
            RootCauseCategory::PolicyViolation => "policy_violation",
            RootCauseCategory::ResourceLimit => "resource_limit",
            RootCauseCategory::ExternalService => "external_service",
            RootCauseCategory::DataIssue => "data_issue",
            RootCauseCategory::PermissionDenied => "permission_denied",
            RootCauseCategory::NetworkError => "network_error",
            RootCauseCategory::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Failure context
// ---------------------------------------------------------------------------

/// Structured context collected from a failed run plus recent history.
///
/// Built once per diagnosis request; immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    pub workflow_id: Uuid,
    pub run_id: Uuid,
    /// Name of the job that failed.
    pub job_name: String,
    /// Error message with any stack trace stripped off.
    pub error_message: String,
    /// Stack trace split out of the raw error, if one was detected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    /// Workflow state at collection time.
    pub workflow_state: WorkflowState,
    /// JSON inputs the failed job was invoked with.
    pub inputs: serde_json::Value,
    /// Any partial outputs the job produced before failing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_outputs: Option<serde_json::Value>,
    /// Recent workflow events, oldest first, bounded by the collector's
    /// `max_events` setting.
    pub recent_events: Vec<WorkflowEvent>,
    /// Policy violations on record, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_violations: Option<Vec<PolicyViolation>>,
    /// Best-effort file paths referenced in run inputs/outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub involved_files: Option<Vec<String>>,
    /// When the run failed.
    pub failed_at: DateTime<Utc>,
    /// How long the run took before failing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Fixes
// ---------------------------------------------------------------------------

/// Estimated effort to apply a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixEffort {
    Trivial,
    Small,
    Medium,
    Large,
}

/// Risk of applying a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixRisk {
    Low,
    Medium,
    High,
}

/// A concrete file change a fix suggests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedChange {
    /// File to change.
    pub file_path: String,
    /// What the change does.
    pub description: String,
    /// Original content, when known (None for new files).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// Replacement content.
    pub after: String,
}

/// A ranked candidate fix for a diagnosed failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PotentialFix {
    /// What to do.
    pub description: String,
    /// Confidence this fix addresses the root cause, in [0, 1].
    pub confidence: f64,
    /// Estimated effort.
    pub effort: FixEffort,
    /// Risk of applying.
    pub risk: FixRisk,
    /// Whether the fix can be turned into an auto-generated patch set.
    pub can_auto_patch: bool,
    /// Concrete file changes, when the fix is specific enough.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_changes: Option<Vec<SuggestedChange>>,
    /// Commands that verify the fix worked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_commands: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Diagnosis result
// ---------------------------------------------------------------------------

/// Result of diagnosing a failed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisResult {
    /// UUIDv7 diagnosis ID.
    pub id: Uuid,
    /// The context this diagnosis was computed from.
    pub context: FailureContext,
    /// Classified root cause.
    pub root_cause: RootCauseCategory,
    /// Classification confidence, in [0, 1].
    pub confidence: f64,
    /// One-line human-readable summary.
    pub summary: String,
    /// Multi-section analysis report (markdown).
    pub analysis: String,
    /// Candidate fixes, sorted descending by confidence.
    pub potential_fixes: Vec<PotentialFix>,
    /// Recurring failure patterns detected in recent history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_patterns: Option<Vec<String>>,
    /// Category-specific prevention recommendations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prevention_recommendations: Option<Vec<String>>,
    /// When the diagnosis completed.
    pub diagnosed_at: DateTime<Utc>,
    /// How long the diagnosis took.
    pub diagnosis_duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Fix proposals
// ---------------------------------------------------------------------------

/// Lifecycle status of a fix proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixProposalStatus {
    PendingApproval,
    Approved,
    Rejected,
    Applied,
    Failed,
}

/// A human-approvable fix suggestion, optionally backed by an auto-generated
/// patch set.
///
/// Status advances only through explicit approve/reject calls; approval
/// never mutates the workflow state machine directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixProposal {
    /// UUIDv7 proposal ID.
    pub id: Uuid,
    /// The diagnosis this proposal came from.
    pub diagnosis_id: Uuid,
    /// Owning workflow ID.
    pub workflow_id: Uuid,
    /// Index into the diagnosis's `potential_fixes`.
    pub fix_index: usize,
    /// The auto-generated patch set, if one was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_set_id: Option<Uuid>,
    /// Current lifecycle status.
    pub status: FixProposalStatus,
    /// When the proposal was created.
    pub proposed_at: DateTime<Utc>,
    /// When the proposal was approved or rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Who resolved it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    /// Free-form resolution notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

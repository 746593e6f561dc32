//! Checkpoint and recovery types.
//!
//! A checkpoint is an immutable, timestamped snapshot of a workflow's state
//! sufficient to restore it. Snapshots carry summaries (ids and content
//! hashes), never full content, so checkpoint storage cost stays bounded
//! regardless of artifact size.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::{PatchSetStatus, RunStatus, WorkflowState};

/// Maximum number of recent event ids embedded in a snapshot.
pub const SNAPSHOT_MAX_EVENT_IDS: usize = 20;

// ---------------------------------------------------------------------------
// Checkpoint record
// ---------------------------------------------------------------------------

/// An immutable point-in-time snapshot of a workflow.
///
/// Never mutated after creation; deleted only by pruning or explicit
/// deletion. Belongs exclusively to one workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// UUIDv7 checkpoint ID.
    pub id: Uuid,
    /// Owning workflow ID.
    pub workflow_id: Uuid,
    /// Checkpoint name (auto-generated for automatic checkpoints).
    pub name: String,
    /// Workflow state at capture time.
    pub state: WorkflowState,
    /// Pipeline stage index at capture time.
    pub stage_index: u32,
    /// Pipeline stage name at capture time.
    pub stage_name: String,
    /// The captured snapshot.
    pub snapshot: CheckpointSnapshot,
    /// Free-form metadata (e.g. {"trigger": "before_risky_op"}).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Whether this checkpoint was created automatically.
    pub is_automatic: bool,
    /// When the checkpoint was created.
    pub created_at: DateTime<Utc>,
    /// Who created it (manual checkpoints only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// Point-in-time summary of a workflow's records.
///
/// Carries ids and hashes only -- never full blobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointSnapshot {
    /// Workflow state at capture time.
    pub workflow_state: WorkflowState,
    /// Base revision at capture time.
    pub base_sha: String,
    /// Artifact summaries.
    pub artifacts: Vec<ArtifactSummary>,
    /// Patch set summaries.
    pub patch_sets: Vec<PatchSetSummary>,
    /// Approval summaries.
    pub approvals: Vec<ApprovalSummary>,
    /// Up to the last [`SNAPSHOT_MAX_EVENT_IDS`] event ids, newest first.
    pub recent_event_ids: Vec<Uuid>,
    /// Most recent run id, if any run exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_id: Option<Uuid>,
    /// Status of the most recent run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_status: Option<RunStatus>,
    /// Number of policy violations on record.
    pub violation_count: usize,
    /// Whether any recorded violation is blocking.
    pub has_blocking_violations: bool,
}

/// Artifact summary inside a snapshot (id and hash, no content).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSummary {
    pub id: Uuid,
    pub kind: String,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Patch set summary inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchSetSummary {
    pub id: Uuid,
    pub title: String,
    pub status: PatchSetStatus,
    pub patch_count: usize,
}

/// Approval summary inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalSummary {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_set_id: Option<Uuid>,
    pub approved_by: String,
}

// ---------------------------------------------------------------------------
// Pruning
// ---------------------------------------------------------------------------

/// Retention policy for checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruningConfig {
    /// Keep at most this many checkpoints per workflow.
    #[serde(default = "default_max_checkpoints")]
    pub max_checkpoints_per_workflow: usize,
    /// Prune checkpoints older than this many days.
    #[serde(default = "default_max_age_days")]
    pub max_checkpoint_age_days: i64,
    /// Never prune the oldest checkpoint of a workflow.
    #[serde(default = "default_true")]
    pub keep_first_checkpoint: bool,
    /// Never prune manually created checkpoints.
    #[serde(default = "default_true")]
    pub preserve_manual_checkpoints: bool,
}

fn default_max_checkpoints() -> usize {
    10
}

fn default_max_age_days() -> i64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            max_checkpoints_per_workflow: default_max_checkpoints(),
            max_checkpoint_age_days: default_max_age_days(),
            keep_first_checkpoint: true,
            preserve_manual_checkpoints: true,
        }
    }
}

/// Result of a pruning pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneOutcome {
    /// How many checkpoints were deleted.
    pub pruned: usize,
    /// How many checkpoints remain.
    pub remaining: usize,
    /// Ids of the deleted checkpoints.
    pub pruned_ids: Vec<Uuid>,
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

/// Caller options for a restore operation.
///
/// Runs are always cleaned up regardless of these flags: a run is tied to a
/// specific point-in-time execution and cannot be preserved across a restore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestoreOptions {
    /// Keep events created after the checkpoint.
    #[serde(default)]
    pub preserve_events: bool,
    /// Keep artifacts created after the checkpoint.
    #[serde(default)]
    pub preserve_artifacts: bool,
    /// Keep patch sets created after the checkpoint.
    #[serde(default)]
    pub preserve_patch_sets: bool,
    /// Why the restore was requested (recorded in the restore event).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Who requested the restore.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_by: Option<String>,
}

/// Counts of records deleted during a restore.
///
/// Zero means "nothing happened", not "not measured".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupCounts {
    pub events: u64,
    pub artifacts: u64,
    pub patch_sets: u64,
    pub runs: u64,
}

impl CleanupCounts {
    /// Whether no records were deleted.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Outcome of a restore operation.
///
/// Expected failure modes (checkpoint not found, storage error mid-restore)
/// are reported here with `success == false` rather than as errors, so
/// callers can branch without exception handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreOutcome {
    /// Whether the restore fully completed.
    pub success: bool,
    /// The checkpoint the restore targeted.
    pub checkpoint_id: Uuid,
    /// State the workflow was reset to (None on failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_to_state: Option<WorkflowState>,
    /// Stage name the workflow was reset to (None on failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_to_stage: Option<String>,
    /// Records deleted during cleanup (all zero on failure).
    pub cleaned_up: CleanupCounts,
    /// Error message when `success == false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RestoreOutcome {
    /// A failed restore with zeroed cleanup counts.
    pub fn failure(checkpoint_id: Uuid, error: impl Into<String>) -> Self {
        Self {
            success: false,
            checkpoint_id,
            restored_to_state: None,
            restored_to_stage: None,
            cleaned_up: CleanupCounts::default(),
            error: Some(error.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

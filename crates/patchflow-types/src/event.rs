//! Event types for the Patchflow workflow lifecycle.
//!
//! Two layers live here:
//!
//! - `WorkflowEvent` -- the append-only record shape the persistence
//!   collaborator stores (type string + raw JSON payload).
//! - `Event` -- the typed tagged union the transition engine consumes.
//!   Raw records are validated into `Event` exactly once at the boundary
//!   (`Event::from_record`), so the engine's pattern matching is
//!   exhaustive-checked by the compiler.
//!
//! Payload structs for events *produced* by the checkpoint and diagnosis
//! services live at the bottom; other components depend on their shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checkpoint::CleanupCounts;
use crate::diagnosis::{FixEffort, FixRisk, RootCauseCategory};
use crate::workflow::WorkflowState;

// ---------------------------------------------------------------------------
// Stored event record
// ---------------------------------------------------------------------------

/// An append-only workflow event record.
///
/// Queried newest-first, truncatable by a `take` limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    /// UUIDv7 event ID (time-sortable).
    pub id: Uuid,
    /// Parent workflow ID.
    pub workflow_id: Uuid,
    /// Event type discriminator (e.g. "job_completed", "checkpoint_created").
    pub event_type: String,
    /// Raw JSON payload.
    pub payload: serde_json::Value,
    /// When the event was appended.
    pub created_at: DateTime<Utc>,
}

impl WorkflowEvent {
    /// Build a new event record with a freshly minted UUIDv7 and timestamp.
    pub fn new(
        workflow_id: Uuid,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            workflow_id,
            event_type: event_type.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed incoming events
// ---------------------------------------------------------------------------

/// Result of a policy evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEvalResult {
    /// Whether any violation blocks the workflow from proceeding.
    pub has_blocking_violations: bool,
}

/// Result of a CI run on the opened pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiResult {
    /// CI conclusion string (e.g. "success", "failure", "cancelled").
    pub conclusion: String,
}

impl CiResult {
    /// Whether CI concluded successfully.
    pub fn is_success(&self) -> bool {
        self.conclusion == "success"
    }
}

/// A typed lifecycle event consumed by the transition engine.
///
/// Externally tagged by `type` to match the stored record shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A workflow was created; kicks off context ingestion.
    WorkflowCreated,
    /// A queued job finished successfully.
    JobCompleted {
        /// Name of the job/stage that completed.
        stage: String,
        /// Job result payload.
        #[serde(default)]
        result: serde_json::Value,
    },
    /// A queued job failed.
    JobFailed {
        /// Name of the job/stage that failed.
        stage: String,
        /// Error message from the worker.
        error: String,
    },
    /// A policy evaluation finished.
    PolicyEvaluated { result: PolicyEvalResult },
    /// A human approval (or rejection) was recorded.
    ApprovalRecorded,
    /// CI on the opened pull request finished.
    CiCompleted { result: CiResult },
}

impl Event {
    /// Event type discriminator string, matching the stored record shape.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::WorkflowCreated => "workflow_created",
            Event::JobCompleted { .. } => "job_completed",
            Event::JobFailed { .. } => "job_failed",
            Event::PolicyEvaluated { .. } => "policy_evaluated",
            Event::ApprovalRecorded => "approval_recorded",
            Event::CiCompleted { .. } => "ci_completed",
        }
    }

    /// Validate a raw stored record into a typed event.
    ///
    /// This is the single ingestion point for untyped payloads: the type
    /// string and payload object are merged and deserialized through the
    /// tagged union, so malformed payloads are rejected here rather than
    /// inside the transition engine.
    pub fn from_record(record: &WorkflowEvent) -> Result<Self, EventDecodeError> {
        let mut merged = match &record.payload {
            serde_json::Value::Object(map) => map.clone(),
            serde_json::Value::Null => serde_json::Map::new(),
            other => {
                return Err(EventDecodeError::PayloadNotObject {
                    event_type: record.event_type.clone(),
                    found: other.to_string(),
                });
            }
        };
        merged.insert(
            "type".to_string(),
            serde_json::Value::String(record.event_type.clone()),
        );
        serde_json::from_value(serde_json::Value::Object(merged)).map_err(|e| {
            EventDecodeError::Invalid {
                event_type: record.event_type.clone(),
                source: e,
            }
        })
    }

    /// Render this event back into a stored record for the given workflow.
    pub fn to_record(&self, workflow_id: Uuid) -> WorkflowEvent {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let serde_json::Value::Object(ref mut map) = value {
            map.remove("type");
        }
        WorkflowEvent::new(workflow_id, self.event_type(), value)
    }
}

/// Failure to decode a stored event record into a typed event.
#[derive(Debug, thiserror::Error)]
pub enum EventDecodeError {
    #[error("event '{event_type}' payload is not a JSON object: {found}")]
    PayloadNotObject { event_type: String, found: String },

    #[error("invalid payload for event '{event_type}': {source}")]
    Invalid {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// Produced event payloads
// ---------------------------------------------------------------------------

/// Payload of a `checkpoint_created` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointCreatedPayload {
    pub checkpoint_id: Uuid,
    pub name: String,
    pub stage_index: u32,
    pub is_automatic: bool,
}

/// Payload of a `checkpoint_restored` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRestoredPayload {
    pub checkpoint_id: Uuid,
    pub restored_to_state: WorkflowState,
    pub restored_to_stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_by: Option<String>,
    pub cleaned_up: CleanupCounts,
}

/// Payload of a `diagnosis_complete` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisCompletePayload {
    pub diagnosis_id: Uuid,
    pub root_cause: RootCauseCategory,
    pub confidence: f64,
    pub summary: String,
    pub fix_count: usize,
    pub diagnosis_duration_ms: u64,
}

/// Payload of a `fix_proposed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixProposedPayload {
    pub proposal_id: Uuid,
    pub diagnosis_id: Uuid,
    pub fix_description: String,
    pub confidence: f64,
    pub effort: FixEffort,
    pub risk: FixRisk,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_set_id: Option<Uuid>,
    /// Always true: auto-generated fixes never bypass the approval gate.
    pub requires_approval: bool,
}

/// Payload of a `fix_approved` or `fix_rejected` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixResolvedPayload {
    pub proposal_id: Uuid,
    pub diagnosis_id: Uuid,
    pub resolved_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_set_id: Option<Uuid>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Failure context collection.
//!
//! Assembles an immutable `FailureContext` from a failed run plus recent
//! workflow history. Diagnosis is only valid for failed runs; collection
//! fails with a precondition error otherwise.

use patchflow_types::diagnosis::FailureContext;
use patchflow_types::error::DiagnosisError;
use patchflow_types::workflow::{RunStatus, WorkflowState};
use uuid::Uuid;

use crate::repository::{ChangeRepository, WorkflowRepository};

/// Maximum recursion depth when scanning run inputs/outputs for file paths.
const FILE_SCAN_MAX_DEPTH: usize = 5;

/// Collects structured failure context for diagnosis.
pub struct ContextCollector<R> {
    repo: R,
    max_events: usize,
}

impl<R> ContextCollector<R>
where
    R: WorkflowRepository + ChangeRepository,
{
    pub fn new(repo: R, max_events: usize) -> Self {
        Self { repo, max_events }
    }

    /// Build a `FailureContext` for a specific failed run.
    ///
    /// Errors if the run does not exist or is not in failed status.
    pub async fn collect_failure_context(
        &self,
        workflow_id: Uuid,
        run_id: Uuid,
    ) -> Result<FailureContext, DiagnosisError> {
        let run = self
            .repo
            .get_run(&run_id)
            .await?
            .ok_or(DiagnosisError::RunNotFound(run_id))?;

        if run.status != RunStatus::Failed {
            return Err(DiagnosisError::RunNotFailed {
                run_id,
                status: run.status,
            });
        }

        let workflow = self
            .repo
            .get_workflow(&workflow_id)
            .await?
            .ok_or(DiagnosisError::WorkflowNotFound(workflow_id))?;

        // Events come back newest-first; diagnosis reads them as a timeline.
        let mut recent_events = self.repo.list_events(&workflow_id, self.max_events).await?;
        recent_events.reverse();

        let violations = self.repo.list_violations(&workflow_id).await?;

        let raw_error = run.error_msg.as_deref().unwrap_or("unknown error");
        let (error_message, stack_trace) = split_error_message(raw_error);

        let mut involved_files = Vec::new();
        scan_for_file_paths(&run.inputs, 0, &mut involved_files);
        if let Some(outputs) = &run.outputs {
            scan_for_file_paths(outputs, 0, &mut involved_files);
        }
        involved_files.dedup();

        Ok(FailureContext {
            workflow_id,
            run_id,
            job_name: run.job_name,
            error_message,
            stack_trace,
            workflow_state: workflow.state,
            inputs: run.inputs,
            partial_outputs: run.outputs,
            recent_events,
            policy_violations: (!violations.is_empty()).then_some(violations),
            involved_files: (!involved_files.is_empty()).then_some(involved_files),
            failed_at: run.completed_at.unwrap_or(run.started_at),
            duration_ms: run.duration_ms,
        })
    }

    /// Build a `FailureContext` from the workflow's current state, if it is
    /// in a failure-relevant terminal state and has a failed run.
    ///
    /// Returns `None` when there is nothing to diagnose.
    pub async fn collect_from_workflow_state(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<FailureContext>, DiagnosisError> {
        let workflow = self
            .repo
            .get_workflow(&workflow_id)
            .await?
            .ok_or(DiagnosisError::WorkflowNotFound(workflow_id))?;

        if !matches!(
            workflow.state,
            WorkflowState::Failed | WorkflowState::NeedsHuman | WorkflowState::BlockedPolicy
        ) {
            return Ok(None);
        }

        let Some(run) = self.repo.latest_failed_run(&workflow_id).await? else {
            return Ok(None);
        };

        self.collect_failure_context(workflow_id, run.id)
            .await
            .map(Some)
    }
}

/// Split a raw error string into a message and an optional stack trace.
///
/// Detects a contiguous tail of `at ...` frame lines (the common
/// `Error: ...\n    at ...` shape). If no frame lines are present the whole
/// string is the message.
pub fn split_error_message(raw: &str) -> (String, Option<String>) {
    let lines: Vec<&str> = raw.lines().collect();
    let first_frame = lines.iter().position(|l| l.trim_start().starts_with("at "));

    match first_frame {
        Some(idx) if idx > 0 => {
            let message = lines[..idx].join("\n").trim_end().to_string();
            let trace = lines[idx..].join("\n");
            (message, Some(trace))
        }
        // A trace with no leading message line is still only a trace.
        Some(_) => (raw.to_string(), None),
        None => (raw.to_string(), None),
    }
}

/// Recursively scan a JSON value for strings that look like file paths.
///
/// Bounded to `FILE_SCAN_MAX_DEPTH`; matches strings that contain `/`, do
/// not start with `http`, and end with a short extension.
fn scan_for_file_paths(value: &serde_json::Value, depth: usize, out: &mut Vec<String>) {
    if depth > FILE_SCAN_MAX_DEPTH {
        return;
    }
    match value {
        serde_json::Value::String(s) => {
            if looks_like_file_path(s) && !out.contains(s) {
                out.push(s.clone());
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                scan_for_file_paths(item, depth + 1, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                scan_for_file_paths(item, depth + 1, out);
            }
        }
        _ => {}
    }
}

fn looks_like_file_path(s: &str) -> bool {
    if !s.contains('/') || s.starts_with("http") {
        return false;
    }
    let Some((_, ext)) = s.rsplit_once('.') else {
        return false;
    };
    !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

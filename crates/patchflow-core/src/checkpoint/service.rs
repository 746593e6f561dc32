//! Checkpoint service: snapshot capture, restore, and pruning.
//!
//! Generic over the repository ports so it works with any storage backend.
//! Creation persists the checkpoint, appends a `checkpoint_created` event,
//! then invokes pruning in the same call; restore deletes records created
//! after the checkpoint and resets the workflow, reporting failure with
//! zeroed cleanup counts if any step errors.

use chrono::Utc;
use patchflow_types::checkpoint::{
    ApprovalSummary, ArtifactSummary, Checkpoint, CheckpointSnapshot, CleanupCounts,
    PatchSetSummary, PruneOutcome, PruningConfig, RestoreOptions, RestoreOutcome,
    SNAPSHOT_MAX_EVENT_IDS,
};
use patchflow_types::error::RepositoryError;
use patchflow_types::event::{CheckpointCreatedPayload, CheckpointRestoredPayload, WorkflowEvent};
use patchflow_types::workflow::Workflow;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use super::prune::select_prunable;
use crate::repository::{ChangeRepository, CheckpointRepository, WorkflowRepository};
use crate::sidechannel::best_effort;
use crate::transition::stage_of;

/// Errors from checkpoint creation.
///
/// Restore and delete deliberately do not use this type: they report
/// expected failures through result objects (`RestoreOutcome`, `bool`).
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("workflow not found: {0}")]
    WorkflowNotFound(Uuid),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Manages checkpoints for workflow recovery.
pub struct CheckpointService<R> {
    repo: R,
    pruning: PruningConfig,
}

impl<R> CheckpointService<R>
where
    R: WorkflowRepository + ChangeRepository + CheckpointRepository,
{
    /// Create a new checkpoint service with the given retention policy.
    pub fn new(repo: R, pruning: PruningConfig) -> Self {
        Self { repo, pruning }
    }

    /// Access the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Create an automatic checkpoint at a stage boundary.
    pub async fn create_auto_checkpoint(
        &self,
        workflow_id: Uuid,
        stage_name: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Checkpoint, CheckpointError> {
        self.create_checkpoint(
            workflow_id,
            format!("auto:{stage_name}"),
            metadata,
            true,
            None,
        )
        .await
    }

    /// Create a manual checkpoint on explicit user request.
    pub async fn create_manual_checkpoint(
        &self,
        workflow_id: Uuid,
        name: &str,
        created_by: &str,
        notes: Option<&str>,
    ) -> Result<Checkpoint, CheckpointError> {
        let metadata = notes.map(|n| json!({ "notes": n }));
        self.create_checkpoint(
            workflow_id,
            name.to_string(),
            metadata,
            false,
            Some(created_by.to_string()),
        )
        .await
    }

    /// Create an automatic checkpoint before a risky operation.
    pub async fn create_pre_op_checkpoint(
        &self,
        workflow_id: Uuid,
        operation_name: &str,
    ) -> Result<Checkpoint, CheckpointError> {
        let metadata = json!({
            "trigger": "before_risky_op",
            "operation": operation_name,
        });
        self.create_checkpoint(
            workflow_id,
            format!("pre:{operation_name}"),
            Some(metadata),
            true,
            None,
        )
        .await
    }

    async fn create_checkpoint(
        &self,
        workflow_id: Uuid,
        name: String,
        metadata: Option<serde_json::Value>,
        is_automatic: bool,
        created_by: Option<String>,
    ) -> Result<Checkpoint, CheckpointError> {
        let workflow = self
            .repo
            .get_workflow(&workflow_id)
            .await?
            .ok_or(CheckpointError::WorkflowNotFound(workflow_id))?;

        let stage = stage_of(workflow.state);
        let snapshot = self.capture_snapshot(&workflow).await?;

        let checkpoint = Checkpoint {
            id: Uuid::now_v7(),
            workflow_id,
            name,
            state: workflow.state,
            stage_index: stage.index,
            stage_name: stage.name.to_string(),
            snapshot,
            metadata,
            is_automatic,
            created_at: Utc::now(),
            created_by,
        };

        CheckpointRepository::create_checkpoint(&self.repo, &checkpoint).await?;

        let payload = CheckpointCreatedPayload {
            checkpoint_id: checkpoint.id,
            name: checkpoint.name.clone(),
            stage_index: checkpoint.stage_index,
            is_automatic,
        };
        // Shares the checkpoint's timestamp so a restore of this checkpoint
        // does not delete the event recording its creation.
        self.repo
            .append_event(&WorkflowEvent {
                id: Uuid::now_v7(),
                workflow_id,
                event_type: "checkpoint_created".to_string(),
                payload: serde_json::to_value(&payload).unwrap_or(serde_json::Value::Null),
                created_at: checkpoint.created_at,
            })
            .await?;

        tracing::debug!(
            workflow_id = %workflow_id,
            checkpoint_id = %checkpoint.id,
            name = %checkpoint.name,
            is_automatic,
            "created checkpoint"
        );

        // Every creation may trigger deletions; a failed pruning pass must
        // not fail the creation that triggered it.
        best_effort("prune checkpoints", self.prune_checkpoints(workflow_id)).await;

        Ok(checkpoint)
    }

    /// Capture a bounded snapshot of the workflow's current records.
    ///
    /// Summaries and ids only -- no content blobs.
    async fn capture_snapshot(
        &self,
        workflow: &Workflow,
    ) -> Result<CheckpointSnapshot, RepositoryError> {
        let artifacts = self.repo.list_artifacts(&workflow.id).await?;
        let patch_sets = self.repo.list_patch_sets(&workflow.id).await?;
        let approvals = self.repo.list_approvals(&workflow.id).await?;
        let events = self
            .repo
            .list_events(&workflow.id, SNAPSHOT_MAX_EVENT_IDS)
            .await?;
        let last_run = self.repo.list_runs(&workflow.id, 1).await?.into_iter().next();
        let violations = self.repo.list_violations(&workflow.id).await?;

        let mut patch_set_summaries = Vec::with_capacity(patch_sets.len());
        for patch_set in patch_sets {
            let patch_count = self.repo.list_patches(&patch_set.id).await?.len();
            patch_set_summaries.push(PatchSetSummary {
                id: patch_set.id,
                title: patch_set.title,
                status: patch_set.status,
                patch_count,
            });
        }

        Ok(CheckpointSnapshot {
            workflow_state: workflow.state,
            base_sha: workflow.base_sha.clone(),
            artifacts: artifacts
                .into_iter()
                .map(|a| ArtifactSummary {
                    id: a.id,
                    kind: a.kind,
                    content_hash: a.content_hash,
                    created_at: a.created_at,
                })
                .collect(),
            patch_sets: patch_set_summaries,
            approvals: approvals
                .into_iter()
                .map(|a| ApprovalSummary {
                    id: a.id,
                    patch_set_id: a.patch_set_id,
                    approved_by: a.approved_by,
                })
                .collect(),
            recent_event_ids: events.iter().map(|e| e.id).collect(),
            last_run_id: last_run.as_ref().map(|r| r.id),
            last_run_status: last_run.map(|r| r.status),
            violation_count: violations.len(),
            has_blocking_violations: violations.iter().any(|v| v.blocking),
        })
    }

    // -----------------------------------------------------------------------
    // Restore
    // -----------------------------------------------------------------------

    /// Restore a workflow to a checkpoint, cleaning up records created
    /// after it.
    ///
    /// Never returns an error: a missing checkpoint or a storage failure
    /// mid-restore yields `success == false` with zeroed cleanup counts.
    /// The workflow state update is the final mutation, so a reported
    /// failure never leaves the state changed with cleanup half-done
    /// unreported.
    pub async fn restore(&self, checkpoint_id: Uuid, options: &RestoreOptions) -> RestoreOutcome {
        match self.restore_inner(checkpoint_id, options).await {
            Ok(outcome) => outcome,
            Err(error) => {
                tracing::error!(
                    checkpoint_id = %checkpoint_id,
                    %error,
                    "restore failed"
                );
                RestoreOutcome::failure(checkpoint_id, error.to_string())
            }
        }
    }

    async fn restore_inner(
        &self,
        checkpoint_id: Uuid,
        options: &RestoreOptions,
    ) -> Result<RestoreOutcome, RepositoryError> {
        let Some(checkpoint) = self.repo.get_checkpoint(&checkpoint_id).await? else {
            return Ok(RestoreOutcome::failure(
                checkpoint_id,
                format!("checkpoint {checkpoint_id} not found"),
            ));
        };

        let workflow_id = checkpoint.workflow_id;
        let cutoff = checkpoint.created_at;
        let mut cleaned_up = CleanupCounts::default();

        if !options.preserve_events {
            cleaned_up.events = self.repo.delete_events_after(&workflow_id, cutoff).await?;
        }
        if !options.preserve_artifacts {
            cleaned_up.artifacts = self
                .repo
                .delete_artifacts_after(&workflow_id, cutoff)
                .await?;
        }
        if !options.preserve_patch_sets {
            cleaned_up.patch_sets = self
                .repo
                .delete_patch_sets_after(&workflow_id, cutoff)
                .await?;
        }
        // Runs are tied to a point-in-time execution and are never preserved.
        cleaned_up.runs = self.repo.delete_runs_after(&workflow_id, cutoff).await?;

        self.repo
            .update_workflow(
                &workflow_id,
                checkpoint.snapshot.workflow_state,
                &checkpoint.snapshot.base_sha,
            )
            .await?;

        let payload = CheckpointRestoredPayload {
            checkpoint_id,
            restored_to_state: checkpoint.snapshot.workflow_state,
            restored_to_stage: checkpoint.stage_name.clone(),
            reason: options.reason.clone(),
            restored_by: options.restored_by.clone(),
            cleaned_up,
        };
        self.repo
            .append_event(&WorkflowEvent::new(
                workflow_id,
                "checkpoint_restored",
                serde_json::to_value(&payload).unwrap_or(serde_json::Value::Null),
            ))
            .await?;

        tracing::info!(
            workflow_id = %workflow_id,
            checkpoint_id = %checkpoint_id,
            restored_to_state = %checkpoint.snapshot.workflow_state,
            events = cleaned_up.events,
            artifacts = cleaned_up.artifacts,
            patch_sets = cleaned_up.patch_sets,
            runs = cleaned_up.runs,
            "restored workflow from checkpoint"
        );

        Ok(RestoreOutcome {
            success: true,
            checkpoint_id,
            restored_to_state: Some(checkpoint.snapshot.workflow_state),
            restored_to_stage: Some(checkpoint.stage_name),
            cleaned_up,
            error: None,
        })
    }

    // -----------------------------------------------------------------------
    // Pruning
    // -----------------------------------------------------------------------

    /// Delete checkpoints exceeding the retention policy.
    ///
    /// Idempotent: running it again immediately prunes nothing.
    pub async fn prune_checkpoints(
        &self,
        workflow_id: Uuid,
    ) -> Result<PruneOutcome, RepositoryError> {
        let checkpoints = self.repo.list_checkpoints(&workflow_id).await?;
        let pruned_ids = select_prunable(&checkpoints, &self.pruning, Utc::now());

        if !pruned_ids.is_empty() {
            self.repo.delete_checkpoints(&pruned_ids).await?;
            tracing::debug!(
                workflow_id = %workflow_id,
                pruned = pruned_ids.len(),
                "pruned checkpoints"
            );
        }

        Ok(PruneOutcome {
            pruned: pruned_ids.len(),
            remaining: checkpoints.len() - pruned_ids.len(),
            pruned_ids,
        })
    }

    // -----------------------------------------------------------------------
    // Read API
    // -----------------------------------------------------------------------

    /// All checkpoints for a workflow, newest first.
    pub async fn get_checkpoints(
        &self,
        workflow_id: Uuid,
    ) -> Result<Vec<Checkpoint>, RepositoryError> {
        self.repo.list_checkpoints(&workflow_id).await
    }

    /// A single checkpoint by ID.
    pub async fn get_checkpoint(
        &self,
        checkpoint_id: Uuid,
    ) -> Result<Option<Checkpoint>, RepositoryError> {
        self.repo.get_checkpoint(&checkpoint_id).await
    }

    /// The most recently created checkpoint, if any.
    pub async fn get_latest_checkpoint(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<Checkpoint>, RepositoryError> {
        Ok(self
            .repo
            .list_checkpoints(&workflow_id)
            .await?
            .into_iter()
            .next())
    }

    /// The most recent checkpoint taken at the named stage, if any.
    pub async fn get_checkpoint_at_stage(
        &self,
        workflow_id: Uuid,
        stage_name: &str,
    ) -> Result<Option<Checkpoint>, RepositoryError> {
        Ok(self
            .repo
            .list_checkpoints(&workflow_id)
            .await?
            .into_iter()
            .find(|c| c.stage_name == stage_name))
    }

    // -----------------------------------------------------------------------
    // Deletion
    // -----------------------------------------------------------------------

    /// Delete a checkpoint by ID.
    ///
    /// Returns `true` on success, `false` if the checkpoint does not exist
    /// or deletion fails.
    pub async fn delete_checkpoint(&self, checkpoint_id: Uuid) -> bool {
        match CheckpointRepository::delete_checkpoint(&self.repo, &checkpoint_id).await {
            Ok(existed) => existed,
            Err(error) => {
                tracing::warn!(
                    checkpoint_id = %checkpoint_id,
                    %error,
                    "checkpoint deletion failed"
                );
                false
            }
        }
    }
}

//! In-memory repository implementation backed by `DashMap`.
//!
//! Implements all four repository traits from `patchflow-core`. Cloning a
//! `MemoryStore` is cheap and shares the underlying maps, so one store can
//! back several services at once. List operations return newest-first,
//! matching the contract the services rely on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use patchflow_core::repository::{
    ChangeRepository, CheckpointRepository, DiagnosisRepository, WorkflowRepository,
};
use patchflow_types::checkpoint::Checkpoint;
use patchflow_types::diagnosis::{DiagnosisResult, FixProposal};
use patchflow_types::error::RepositoryError;
use patchflow_types::event::WorkflowEvent;
use patchflow_types::workflow::{
    Approval, Artifact, Patch, PatchSet, PatchSetStatus, PolicyViolation, RunStatus, Workflow,
    WorkflowRun, WorkflowState,
};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    workflows: DashMap<Uuid, Workflow>,
    runs: DashMap<Uuid, WorkflowRun>,
    events: DashMap<Uuid, WorkflowEvent>,
    artifacts: DashMap<Uuid, Artifact>,
    patch_sets: DashMap<Uuid, PatchSet>,
    patches: DashMap<Uuid, Patch>,
    approvals: DashMap<Uuid, Approval>,
    violations: DashMap<Uuid, PolicyViolation>,
    checkpoints: DashMap<Uuid, Checkpoint>,
    diagnoses: DashMap<Uuid, DiagnosisResult>,
    proposals: DashMap<Uuid, FixProposal>,
}

/// Shared in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Collect the values of `map` matching `filter`, newest first.
fn collect_sorted<T, F, K>(map: &DashMap<Uuid, T>, filter: F, created_at: K) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> bool,
    K: Fn(&T) -> DateTime<Utc>,
{
    let mut items: Vec<T> = map
        .iter()
        .filter(|entry| filter(entry.value()))
        .map(|entry| entry.value().clone())
        .collect();
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items
}

/// Remove entries matching `filter`, returning how many were removed.
fn delete_where<T, F>(map: &DashMap<Uuid, T>, filter: F) -> u64
where
    T: Clone,
    F: Fn(&T) -> bool,
{
    let ids: Vec<Uuid> = map
        .iter()
        .filter(|entry| filter(entry.value()))
        .map(|entry| *entry.key())
        .collect();
    let mut removed = 0u64;
    for id in ids {
        if map.remove(&id).is_some() {
            removed += 1;
        }
    }
    removed
}

impl WorkflowRepository for MemoryStore {
    async fn create_workflow(&self, workflow: &Workflow) -> Result<(), RepositoryError> {
        self.inner.workflows.insert(workflow.id, workflow.clone());
        Ok(())
    }

    async fn get_workflow(&self, id: &Uuid) -> Result<Option<Workflow>, RepositoryError> {
        Ok(self.inner.workflows.get(id).map(|w| w.clone()))
    }

    async fn update_workflow(
        &self,
        id: &Uuid,
        state: WorkflowState,
        base_sha: &str,
    ) -> Result<(), RepositoryError> {
        let mut workflow = self
            .inner
            .workflows
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        workflow.state = state;
        workflow.base_sha = base_sha.to_string();
        Ok(())
    }

    async fn create_run(&self, run: &WorkflowRun) -> Result<(), RepositoryError> {
        self.inner.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, run_id: &Uuid) -> Result<Option<WorkflowRun>, RepositoryError> {
        Ok(self.inner.runs.get(run_id).map(|r| r.clone()))
    }

    async fn list_runs(
        &self,
        workflow_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<WorkflowRun>, RepositoryError> {
        let mut runs = collect_sorted(
            &self.inner.runs,
            |r| r.workflow_id == *workflow_id,
            |r| r.started_at,
        );
        runs.truncate(limit);
        Ok(runs)
    }

    async fn latest_failed_run(
        &self,
        workflow_id: &Uuid,
    ) -> Result<Option<WorkflowRun>, RepositoryError> {
        Ok(collect_sorted(
            &self.inner.runs,
            |r| r.workflow_id == *workflow_id && r.status == RunStatus::Failed,
            |r| r.started_at,
        )
        .into_iter()
        .next())
    }

    async fn delete_runs_after(
        &self,
        workflow_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        Ok(delete_where(&self.inner.runs, |r| {
            r.workflow_id == *workflow_id && r.started_at > cutoff
        }))
    }

    async fn append_event(&self, event: &WorkflowEvent) -> Result<(), RepositoryError> {
        self.inner.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn list_events(
        &self,
        workflow_id: &Uuid,
        take: usize,
    ) -> Result<Vec<WorkflowEvent>, RepositoryError> {
        let mut events = collect_sorted(
            &self.inner.events,
            |e| e.workflow_id == *workflow_id,
            |e| e.created_at,
        );
        events.truncate(take);
        Ok(events)
    }

    async fn delete_events_after(
        &self,
        workflow_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        Ok(delete_where(&self.inner.events, |e| {
            e.workflow_id == *workflow_id && e.created_at > cutoff
        }))
    }
}

impl ChangeRepository for MemoryStore {
    async fn create_artifact(&self, artifact: &Artifact) -> Result<(), RepositoryError> {
        self.inner.artifacts.insert(artifact.id, artifact.clone());
        Ok(())
    }

    async fn list_artifacts(&self, workflow_id: &Uuid) -> Result<Vec<Artifact>, RepositoryError> {
        Ok(collect_sorted(
            &self.inner.artifacts,
            |a| a.workflow_id == *workflow_id,
            |a| a.created_at,
        ))
    }

    async fn delete_artifacts_after(
        &self,
        workflow_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        Ok(delete_where(&self.inner.artifacts, |a| {
            a.workflow_id == *workflow_id && a.created_at > cutoff
        }))
    }

    async fn create_patch_set(
        &self,
        patch_set: &PatchSet,
        patches: &[Patch],
    ) -> Result<(), RepositoryError> {
        self.inner.patch_sets.insert(patch_set.id, patch_set.clone());
        for patch in patches {
            self.inner.patches.insert(patch.id, patch.clone());
        }
        Ok(())
    }

    async fn get_patch_set(&self, id: &Uuid) -> Result<Option<PatchSet>, RepositoryError> {
        Ok(self.inner.patch_sets.get(id).map(|p| p.clone()))
    }

    async fn list_patch_sets(&self, workflow_id: &Uuid) -> Result<Vec<PatchSet>, RepositoryError> {
        Ok(collect_sorted(
            &self.inner.patch_sets,
            |p| p.workflow_id == *workflow_id,
            |p| p.created_at,
        ))
    }

    async fn list_patches(&self, patch_set_id: &Uuid) -> Result<Vec<Patch>, RepositoryError> {
        Ok(collect_sorted(
            &self.inner.patches,
            |p| p.patch_set_id == *patch_set_id,
            |p| p.created_at,
        ))
    }

    async fn update_patch_set_status(
        &self,
        id: &Uuid,
        status: PatchSetStatus,
    ) -> Result<(), RepositoryError> {
        let mut patch_set = self
            .inner
            .patch_sets
            .get_mut(id)
            .ok_or(RepositoryError::NotFound)?;
        patch_set.status = status;
        Ok(())
    }

    async fn delete_patch_sets_after(
        &self,
        workflow_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let doomed: Vec<Uuid> = self
            .inner
            .patch_sets
            .iter()
            .filter(|entry| {
                entry.value().workflow_id == *workflow_id && entry.value().created_at > cutoff
            })
            .map(|entry| *entry.key())
            .collect();
        for patch_set_id in &doomed {
            self.inner.patch_sets.remove(patch_set_id);
            delete_where(&self.inner.patches, |p| p.patch_set_id == *patch_set_id);
        }
        Ok(doomed.len() as u64)
    }

    async fn create_approval(&self, approval: &Approval) -> Result<(), RepositoryError> {
        self.inner.approvals.insert(approval.id, approval.clone());
        Ok(())
    }

    async fn list_approvals(&self, workflow_id: &Uuid) -> Result<Vec<Approval>, RepositoryError> {
        Ok(collect_sorted(
            &self.inner.approvals,
            |a| a.workflow_id == *workflow_id,
            |a| a.created_at,
        ))
    }

    async fn create_violation(&self, violation: &PolicyViolation) -> Result<(), RepositoryError> {
        self.inner.violations.insert(violation.id, violation.clone());
        Ok(())
    }

    async fn list_violations(
        &self,
        workflow_id: &Uuid,
    ) -> Result<Vec<PolicyViolation>, RepositoryError> {
        Ok(collect_sorted(
            &self.inner.violations,
            |v| v.workflow_id == *workflow_id,
            |v| v.created_at,
        ))
    }
}

impl CheckpointRepository for MemoryStore {
    async fn create_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), RepositoryError> {
        self.inner
            .checkpoints
            .insert(checkpoint.id, checkpoint.clone());
        Ok(())
    }

    async fn get_checkpoint(&self, id: &Uuid) -> Result<Option<Checkpoint>, RepositoryError> {
        Ok(self.inner.checkpoints.get(id).map(|c| c.clone()))
    }

    async fn list_checkpoints(
        &self,
        workflow_id: &Uuid,
    ) -> Result<Vec<Checkpoint>, RepositoryError> {
        Ok(collect_sorted(
            &self.inner.checkpoints,
            |c| c.workflow_id == *workflow_id,
            |c| c.created_at,
        ))
    }

    async fn delete_checkpoint(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.inner.checkpoints.remove(id).is_some())
    }

    async fn delete_checkpoints(&self, ids: &[Uuid]) -> Result<u64, RepositoryError> {
        let mut removed = 0u64;
        for id in ids {
            if self.inner.checkpoints.remove(id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl DiagnosisRepository for MemoryStore {
    async fn save_diagnosis(&self, diagnosis: &DiagnosisResult) -> Result<(), RepositoryError> {
        self.inner.diagnoses.insert(diagnosis.id, diagnosis.clone());
        Ok(())
    }

    async fn get_diagnosis(&self, id: &Uuid) -> Result<Option<DiagnosisResult>, RepositoryError> {
        Ok(self.inner.diagnoses.get(id).map(|d| d.clone()))
    }

    async fn create_proposal(&self, proposal: &FixProposal) -> Result<(), RepositoryError> {
        self.inner.proposals.insert(proposal.id, proposal.clone());
        Ok(())
    }

    async fn get_proposal(&self, id: &Uuid) -> Result<Option<FixProposal>, RepositoryError> {
        Ok(self.inner.proposals.get(id).map(|p| p.clone()))
    }

    async fn update_proposal(&self, proposal: &FixProposal) -> Result<(), RepositoryError> {
        if !self.inner.proposals.contains_key(&proposal.id) {
            return Err(RepositoryError::NotFound);
        }
        self.inner.proposals.insert(proposal.id, proposal.clone());
        Ok(())
    }

    async fn list_proposals(
        &self,
        workflow_id: &Uuid,
    ) -> Result<Vec<FixProposal>, RepositoryError> {
        Ok(collect_sorted(
            &self.inner.proposals,
            |p| p.workflow_id == *workflow_id,
            |p| p.proposed_at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn make_workflow() -> Workflow {
        Workflow {
            id: Uuid::now_v7(),
            state: WorkflowState::Ingested,
            base_sha: "abc123".to_string(),
            created_at: Utc::now(),
        }
    }

    fn make_event(workflow_id: Uuid, created_at: DateTime<Utc>) -> WorkflowEvent {
        WorkflowEvent {
            id: Uuid::now_v7(),
            workflow_id,
            event_type: "job_completed".to_string(),
            payload: json!({}),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_workflow_create_get_update() {
        let store = MemoryStore::new();
        let workflow = make_workflow();
        store.create_workflow(&workflow).await.unwrap();

        let loaded = store.get_workflow(&workflow.id).await.unwrap().unwrap();
        assert_eq!(loaded.base_sha, "abc123");

        store
            .update_workflow(&workflow.id, WorkflowState::Done, "def456")
            .await
            .unwrap();
        let loaded = store.get_workflow(&workflow.id).await.unwrap().unwrap();
        assert_eq!(loaded.state, WorkflowState::Done);
        assert_eq!(loaded.base_sha, "def456");
    }

    #[tokio::test]
    async fn test_update_missing_workflow_is_not_found() {
        let store = MemoryStore::new();
        let result = store
            .update_workflow(&Uuid::now_v7(), WorkflowState::Done, "x")
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_events_newest_first_with_take() {
        let store = MemoryStore::new();
        let workflow_id = Uuid::now_v7();
        let base = Utc::now();
        for i in 0..5 {
            store
                .append_event(&make_event(workflow_id, base + Duration::seconds(i)))
                .await
                .unwrap();
        }

        let events = store.list_events(&workflow_id, 3).await.unwrap();
        assert_eq!(events.len(), 3);
        assert!(events[0].created_at > events[1].created_at);
        assert!(events[1].created_at > events[2].created_at);
    }

    #[tokio::test]
    async fn test_delete_events_after_cutoff_is_strict() {
        let store = MemoryStore::new();
        let workflow_id = Uuid::now_v7();
        let cutoff = Utc::now();

        store
            .append_event(&make_event(workflow_id, cutoff - Duration::seconds(10)))
            .await
            .unwrap();
        store.append_event(&make_event(workflow_id, cutoff)).await.unwrap();
        store
            .append_event(&make_event(workflow_id, cutoff + Duration::seconds(10)))
            .await
            .unwrap();

        let deleted = store.delete_events_after(&workflow_id, cutoff).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.list_events(&workflow_id, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_latest_failed_run() {
        let store = MemoryStore::new();
        let workflow_id = Uuid::now_v7();
        let base = Utc::now();

        let mut old_failed = WorkflowRun {
            id: Uuid::now_v7(),
            workflow_id,
            job_name: "build".to_string(),
            status: RunStatus::Failed,
            error_msg: Some("old".to_string()),
            inputs: json!({}),
            outputs: None,
            started_at: base - Duration::minutes(10),
            completed_at: None,
            duration_ms: None,
        };
        store.create_run(&old_failed).await.unwrap();

        old_failed.id = Uuid::now_v7();
        old_failed.error_msg = Some("new".to_string());
        old_failed.started_at = base;
        store.create_run(&old_failed).await.unwrap();

        let mut completed = old_failed.clone();
        completed.id = Uuid::now_v7();
        completed.status = RunStatus::Completed;
        completed.started_at = base + Duration::minutes(1);
        store.create_run(&completed).await.unwrap();

        let latest = store.latest_failed_run(&workflow_id).await.unwrap().unwrap();
        assert_eq!(latest.error_msg.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_patch_set_delete_cascades_to_patches() {
        let store = MemoryStore::new();
        let workflow_id = Uuid::now_v7();
        let cutoff = Utc::now();

        let patch_set = PatchSet {
            id: Uuid::now_v7(),
            workflow_id,
            title: "fix".to_string(),
            status: PatchSetStatus::Proposed,
            created_at: cutoff + Duration::seconds(5),
        };
        let patch = Patch {
            id: Uuid::now_v7(),
            patch_set_id: patch_set.id,
            file_path: "src/lib.rs".to_string(),
            diff: "--- a/src/lib.rs".to_string(),
            created_at: cutoff + Duration::seconds(5),
        };
        store.create_patch_set(&patch_set, &[patch.clone()]).await.unwrap();
        assert_eq!(store.list_patches(&patch_set.id).await.unwrap().len(), 1);

        let deleted = store
            .delete_patch_sets_after(&workflow_id, cutoff)
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store.get_patch_set(&patch_set.id).await.unwrap().is_none());
        assert!(store.list_patches(&patch_set.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let store = MemoryStore::new();
        let clone = store.clone();
        let workflow = make_workflow();
        store.create_workflow(&workflow).await.unwrap();
        assert!(clone.get_workflow(&workflow.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_checkpoint_batch_delete_counts_existing_only() {
        let store = MemoryStore::new();
        let workflow_id = Uuid::now_v7();
        let checkpoint = Checkpoint {
            id: Uuid::now_v7(),
            workflow_id,
            name: "auto:ingest_context".to_string(),
            state: WorkflowState::Ingested,
            stage_index: 0,
            stage_name: "ingest_context".to_string(),
            snapshot: patchflow_types::checkpoint::CheckpointSnapshot {
                workflow_state: WorkflowState::Ingested,
                base_sha: "abc".to_string(),
                artifacts: vec![],
                patch_sets: vec![],
                approvals: vec![],
                recent_event_ids: vec![],
                last_run_id: None,
                last_run_status: None,
                violation_count: 0,
                has_blocking_violations: false,
            },
            metadata: None,
            is_automatic: true,
            created_at: Utc::now(),
            created_by: None,
        };
        store.create_checkpoint(&checkpoint).await.unwrap();

        let removed = store
            .delete_checkpoints(&[checkpoint.id, Uuid::now_v7()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(!store.delete_checkpoint(&checkpoint.id).await.unwrap());
    }
}

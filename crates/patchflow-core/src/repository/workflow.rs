//! Workflow repository trait definition.
//!
//! Covers the workflow record itself, its job runs, and its append-only
//! event log. Events are queried newest-first and truncatable by a `take`
//! limit; the time-bounded delete operations exist for checkpoint restore.

use chrono::{DateTime, Utc};
use patchflow_types::error::RepositoryError;
use patchflow_types::event::WorkflowEvent;
use patchflow_types::workflow::{Workflow, WorkflowRun, WorkflowState};
use uuid::Uuid;

/// Repository trait for workflows, runs, and events.
pub trait WorkflowRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Workflows
    // -----------------------------------------------------------------------

    /// Insert a new workflow record.
    fn create_workflow(
        &self,
        workflow: &Workflow,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a workflow by its UUID.
    fn get_workflow(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Workflow>, RepositoryError>> + Send;

    /// Reset a workflow's state and base revision (checkpoint restore).
    fn update_workflow(
        &self,
        id: &Uuid,
        state: WorkflowState,
        base_sha: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Runs
    // -----------------------------------------------------------------------

    /// Create a new run record.
    fn create_run(
        &self,
        run: &WorkflowRun,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a run by its UUID.
    fn get_run(
        &self,
        run_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowRun>, RepositoryError>> + Send;

    /// List runs for a workflow, newest first, truncated to `limit`.
    fn list_runs(
        &self,
        workflow_id: &Uuid,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowRun>, RepositoryError>> + Send;

    /// The most recent run with failed status, if any.
    fn latest_failed_run(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowRun>, RepositoryError>> + Send;

    /// Delete runs started strictly after `cutoff`. Returns the count.
    fn delete_runs_after(
        &self,
        workflow_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Append an event to the workflow's log.
    fn append_event(
        &self,
        event: &WorkflowEvent,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List events for a workflow, newest first, truncated to `take`.
    fn list_events(
        &self,
        workflow_id: &Uuid,
        take: usize,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowEvent>, RepositoryError>> + Send;

    /// Delete events created strictly after `cutoff`. Returns the count.
    fn delete_events_after(
        &self,
        workflow_id: &Uuid,
        cutoff: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}

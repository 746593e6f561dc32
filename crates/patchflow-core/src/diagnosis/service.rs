//! Diagnosis orchestrator.
//!
//! Sequences collect -> diagnose -> artifact persistence -> event recording
//! -> optional fix-proposal creation, and manages the proposal
//! approve/reject lifecycle. Approval never mutates the workflow state
//! machine directly; it only changes records a subsequent
//! `approval_recorded` event, handled by the transition function, acts on.

use chrono::Utc;
use patchflow_types::config::DiagnosisConfig;
use patchflow_types::diagnosis::{DiagnosisResult, FailureContext, FixProposal, FixProposalStatus};
use patchflow_types::error::DiagnosisError;
use patchflow_types::event::{DiagnosisCompletePayload, FixProposedPayload, FixResolvedPayload, WorkflowEvent};
use patchflow_types::workflow::{Approval, Artifact, Patch, PatchSet, PatchSetStatus};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::context::ContextCollector;
use super::diagnoser::Diagnoser;
use crate::advisor::provider::{FixAdvisor, NoAdvisor};
use crate::diff::{placeholder_diff, unified_diff};
use crate::repository::{ChangeRepository, DiagnosisRepository, WorkflowRepository};

/// Orchestrates failure diagnosis and the fix-proposal lifecycle.
pub struct DiagnosisService<R, A = NoAdvisor> {
    repo: R,
    collector: ContextCollector<R>,
    diagnoser: Diagnoser<A>,
    config: DiagnosisConfig,
}

impl<R> DiagnosisService<R, NoAdvisor>
where
    R: WorkflowRepository + ChangeRepository + DiagnosisRepository + Clone,
{
    /// A heuristic-only diagnosis service.
    pub fn new(repo: R, config: DiagnosisConfig) -> Self {
        let collector = ContextCollector::new(repo.clone(), config.max_events);
        Self {
            repo,
            collector,
            diagnoser: Diagnoser::heuristic_only(),
            config,
        }
    }
}

impl<R, A> DiagnosisService<R, A>
where
    R: WorkflowRepository + ChangeRepository + DiagnosisRepository + Clone,
    A: FixAdvisor,
{
    /// A diagnosis service augmented by an advisor, bounded by the
    /// configured timeout.
    pub fn with_advisor(repo: R, config: DiagnosisConfig, advisor: A) -> Self {
        let collector = ContextCollector::new(repo.clone(), config.max_events);
        let timeout = std::time::Duration::from_millis(config.advisor_timeout_ms);
        Self {
            repo,
            collector,
            diagnoser: Diagnoser::with_advisor(advisor, timeout),
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Diagnosis
    // -----------------------------------------------------------------------

    /// Diagnose a specific failed run.
    pub async fn diagnose_run(
        &self,
        workflow_id: Uuid,
        run_id: Uuid,
    ) -> Result<DiagnosisResult, DiagnosisError> {
        let context = self
            .collector
            .collect_failure_context(workflow_id, run_id)
            .await?;
        self.finish_diagnosis(context).await
    }

    /// Diagnose the most recent failed run of a workflow, if it is in a
    /// failure-relevant state. Returns `None` when there is nothing to
    /// diagnose.
    pub async fn diagnose_workflow(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<DiagnosisResult>, DiagnosisError> {
        match self.collector.collect_from_workflow_state(workflow_id).await? {
            Some(context) => self.finish_diagnosis(context).await.map(Some),
            None => Ok(None),
        }
    }

    async fn finish_diagnosis(
        &self,
        context: FailureContext,
    ) -> Result<DiagnosisResult, DiagnosisError> {
        let workflow_id = context.workflow_id;
        let result = self.diagnoser.diagnose(&context).await;

        if self.config.persist_artifact {
            let content = render_report(&result);
            let artifact = Artifact {
                id: Uuid::now_v7(),
                workflow_id,
                kind: "diagnosis".to_string(),
                content_hash: content_hash(&content),
                content,
                created_at: Utc::now(),
            };
            self.repo.create_artifact(&artifact).await.map_err(DiagnosisError::from)?;
        }

        self.repo.save_diagnosis(&result).await?;

        let payload = DiagnosisCompletePayload {
            diagnosis_id: result.id,
            root_cause: result.root_cause,
            confidence: result.confidence,
            summary: result.summary.clone(),
            fix_count: result.potential_fixes.len(),
            diagnosis_duration_ms: result.diagnosis_duration_ms,
        };
        self.append_event(workflow_id, "diagnosis_complete", &payload)
            .await?;

        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Fix proposals
    // -----------------------------------------------------------------------

    /// Diagnose a failed run, then create a fix proposal for every fix
    /// meeting the confidence threshold that can be auto-patched.
    pub async fn diagnose_and_propose_fixes(
        &self,
        workflow_id: Uuid,
        run_id: Uuid,
    ) -> Result<(DiagnosisResult, Vec<FixProposal>), DiagnosisError> {
        let diagnosis = self.diagnose_run(workflow_id, run_id).await?;

        let mut proposals = Vec::new();
        for (fix_index, fix) in diagnosis.potential_fixes.iter().enumerate() {
            if fix.confidence < self.config.min_fix_confidence || !fix.can_auto_patch {
                continue;
            }

            let patch_set = PatchSet {
                id: Uuid::now_v7(),
                workflow_id,
                title: format!("Proposed fix: {}", fix.description),
                status: PatchSetStatus::Proposed,
                created_at: Utc::now(),
            };
            let patches = match fix.suggested_changes.as_deref() {
                Some(changes) if !changes.is_empty() => changes
                    .iter()
                    .map(|change| Patch {
                        id: Uuid::now_v7(),
                        patch_set_id: patch_set.id,
                        file_path: change.file_path.clone(),
                        diff: unified_diff(change),
                        created_at: Utc::now(),
                    })
                    .collect(),
                // nothing concrete to patch -- a single placeholder that a
                // human must fill in
                _ => vec![Patch {
                    id: Uuid::now_v7(),
                    patch_set_id: patch_set.id,
                    file_path: "MANUAL_FIX.md".to_string(),
                    diff: placeholder_diff(&fix.description),
                    created_at: Utc::now(),
                }],
            };
            self.repo.create_patch_set(&patch_set, &patches).await.map_err(DiagnosisError::from)?;

            let proposal = FixProposal {
                id: Uuid::now_v7(),
                diagnosis_id: diagnosis.id,
                workflow_id,
                fix_index,
                patch_set_id: Some(patch_set.id),
                status: FixProposalStatus::PendingApproval,
                proposed_at: Utc::now(),
                resolved_at: None,
                resolved_by: None,
                resolution_notes: None,
            };
            self.repo.create_proposal(&proposal).await?;

            let payload = FixProposedPayload {
                proposal_id: proposal.id,
                diagnosis_id: diagnosis.id,
                fix_description: fix.description.clone(),
                confidence: fix.confidence,
                effort: fix.effort,
                risk: fix.risk,
                patch_set_id: proposal.patch_set_id,
                requires_approval: true,
            };
            self.append_event(workflow_id, "fix_proposed", &payload)
                .await?;

            tracing::info!(
                workflow_id = %workflow_id,
                proposal_id = %proposal.id,
                fix_index,
                confidence = fix.confidence,
                "fix proposal created"
            );
            proposals.push(proposal);
        }

        Ok((diagnosis, proposals))
    }

    /// Approve a pending fix proposal.
    ///
    /// Marks the proposal approved, marks the linked patch set approved,
    /// and records an approval entry the transition function will act on
    /// when an `approval_recorded` event arrives.
    pub async fn approve_fix_proposal(
        &self,
        proposal_id: Uuid,
        approved_by: &str,
        notes: Option<&str>,
    ) -> Result<FixProposal, DiagnosisError> {
        let proposal = self
            .resolve_proposal(proposal_id, FixProposalStatus::Approved, approved_by, notes)
            .await?;

        if let Some(patch_set_id) = proposal.patch_set_id {
            self.repo
                .update_patch_set_status(&patch_set_id, PatchSetStatus::Approved)
                .await.map_err(DiagnosisError::from)?;
        }
        let approval = Approval {
            id: Uuid::now_v7(),
            workflow_id: proposal.workflow_id,
            patch_set_id: proposal.patch_set_id,
            approved_by: approved_by.to_string(),
            created_at: Utc::now(),
        };
        self.repo.create_approval(&approval).await.map_err(DiagnosisError::from)?;

        let payload = FixResolvedPayload {
            proposal_id,
            diagnosis_id: proposal.diagnosis_id,
            resolved_by: approved_by.to_string(),
            resolution_notes: notes.map(String::from),
            patch_set_id: proposal.patch_set_id,
        };
        self.append_event(proposal.workflow_id, "fix_approved", &payload)
            .await?;

        Ok(proposal)
    }

    /// Reject a pending fix proposal.
    pub async fn reject_fix_proposal(
        &self,
        proposal_id: Uuid,
        rejected_by: &str,
        notes: Option<&str>,
    ) -> Result<FixProposal, DiagnosisError> {
        let proposal = self
            .resolve_proposal(proposal_id, FixProposalStatus::Rejected, rejected_by, notes)
            .await?;

        if let Some(patch_set_id) = proposal.patch_set_id {
            self.repo
                .update_patch_set_status(&patch_set_id, PatchSetStatus::Rejected)
                .await.map_err(DiagnosisError::from)?;
        }

        let payload = FixResolvedPayload {
            proposal_id,
            diagnosis_id: proposal.diagnosis_id,
            resolved_by: rejected_by.to_string(),
            resolution_notes: notes.map(String::from),
            patch_set_id: proposal.patch_set_id,
        };
        self.append_event(proposal.workflow_id, "fix_rejected", &payload)
            .await?;

        Ok(proposal)
    }

    /// List fix proposals for a workflow, newest first.
    pub async fn list_proposals(
        &self,
        workflow_id: Uuid,
    ) -> Result<Vec<FixProposal>, DiagnosisError> {
        Ok(self.repo.list_proposals(&workflow_id).await?)
    }

    async fn resolve_proposal(
        &self,
        proposal_id: Uuid,
        status: FixProposalStatus,
        resolved_by: &str,
        notes: Option<&str>,
    ) -> Result<FixProposal, DiagnosisError> {
        let mut proposal = self
            .repo
            .get_proposal(&proposal_id)
            .await?
            .ok_or(DiagnosisError::ProposalNotFound(proposal_id))?;

        if proposal.status != FixProposalStatus::PendingApproval {
            return Err(DiagnosisError::ProposalNotPending {
                proposal_id,
                status: format!("{:?}", proposal.status),
            });
        }

        proposal.status = status;
        proposal.resolved_at = Some(Utc::now());
        proposal.resolved_by = Some(resolved_by.to_string());
        proposal.resolution_notes = notes.map(String::from);
        self.repo.update_proposal(&proposal).await?;
        Ok(proposal)
    }

    async fn append_event<P: serde::Serialize>(
        &self,
        workflow_id: Uuid,
        event_type: &str,
        payload: &P,
    ) -> Result<(), DiagnosisError> {
        let value = serde_json::to_value(payload).unwrap_or(serde_json::Value::Null);
        self.repo
            .append_event(&WorkflowEvent::new(workflow_id, event_type, value))
            .await.map_err(DiagnosisError::from)
    }
}

// ---------------------------------------------------------------------------
// Report rendering
// ---------------------------------------------------------------------------

/// Render a diagnosis result as a markdown report.
fn render_report(result: &DiagnosisResult) -> String {
    let mut out = format!(
        "# Failure Diagnosis\n\n{}\n\n{}\n\n## Potential Fixes\n\n",
        result.summary, result.analysis
    );
    for (i, fix) in result.potential_fixes.iter().enumerate() {
        let auto = if fix.can_auto_patch {
            "auto-patchable"
        } else {
            "manual"
        };
        out.push_str(&format!(
            "{}. {} (confidence {:.2}, effort {:?}, risk {:?}, {auto})\n",
            i + 1,
            fix.description,
            fix.confidence,
            fix.effort,
            fix.risk,
        ));
    }
    if let Some(patterns) = &result.related_patterns {
        out.push_str("\n## Related Patterns\n\n");
        for p in patterns {
            out.push_str(&format!("- {p}\n"));
        }
    }
    if let Some(tips) = &result.prevention_recommendations {
        out.push_str("\n## Prevention\n\n");
        for t in tips {
            out.push_str(&format!("- {t}\n"));
        }
    }
    out
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use patchflow_types::diagnosis::{FixEffort, FixRisk, PotentialFix, RootCauseCategory};
    use patchflow_types::workflow::WorkflowState;
    use serde_json::json;

    fn make_result() -> DiagnosisResult {
        DiagnosisResult {
            id: Uuid::now_v7(),
            context: FailureContext {
                workflow_id: Uuid::now_v7(),
                run_id: Uuid::now_v7(),
                job_name: "build".to_string(),
                error_message: "tsc exited 2".to_string(),
                stack_trace: None,
                workflow_state: WorkflowState::Failed,
                inputs: json!({}),
                partial_outputs: None,
                recent_events: vec![],
                policy_violations: None,
                involved_files: None,
                failed_at: Utc::now(),
                duration_ms: None,
            },
            root_cause: RootCauseCategory::BuildError,
            confidence: 0.85,
            summary: "Build failed in job 'build'".to_string(),
            analysis: "## Root Cause\n\nbuild_error".to_string(),
            potential_fixes: vec![PotentialFix {
                description: "Fix compilation errors".to_string(),
                confidence: 0.85,
                effort: FixEffort::Small,
                risk: FixRisk::Low,
                can_auto_patch: true,
                suggested_changes: None,
                verification_commands: Some(vec!["npm run build".to_string()]),
            }],
            related_patterns: None,
            prevention_recommendations: Some(vec!["Pin toolchain versions".to_string()]),
            diagnosed_at: Utc::now(),
            diagnosis_duration_ms: 12,
        }
    }

    #[test]
    fn test_report_contains_all_sections() {
        let report = render_report(&make_result());
        assert!(report.starts_with("# Failure Diagnosis"));
        assert!(report.contains("Build failed in job 'build'"));
        assert!(report.contains("## Potential Fixes"));
        assert!(report.contains("1. Fix compilation errors"));
        assert!(report.contains("auto-patchable"));
        assert!(report.contains("## Prevention"));
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        let hash = content_hash("hello");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        // stable
        assert_eq!(content_hash("hello"), hash);
    }
}

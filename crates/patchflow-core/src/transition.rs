//! The pure workflow transition function.
//!
//! `transition(state, event, ctx)` decides, with no I/O and no side effects,
//! the next state and the jobs to enqueue. The driver that wraps it is
//! solely responsible for persistence and job dispatch, and must serialize
//! events per workflow so each call sees a consistent `TransitionContext`.
//!
//! The function is total: every `(state, event, context)` triple returns
//! exactly one result and never panics. Unrecognized combinations stay in
//! the current state with a reason recorded.

use patchflow_types::event::Event;
use patchflow_types::workflow::{JobSpec, TransitionContext, TransitionResult, WorkflowState};
use serde_json::json;

/// Queue all pipeline jobs are dispatched on.
pub const JOB_QUEUE: &str = "workflow";

/// Job names the engine enqueues and matches against event `stage` fields.
pub const JOB_INGEST_CONTEXT: &str = "ingest_context";
pub const JOB_EVALUATE_POLICY: &str = "evaluate_policy";
pub const JOB_APPLY_PATCHES: &str = "apply_patches";

// ---------------------------------------------------------------------------
// Stage table
// ---------------------------------------------------------------------------

/// A named position in the pipeline, used by checkpoint records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub index: u32,
    pub name: &'static str,
}

/// Resolve the pipeline stage for a workflow state.
///
/// Terminal failure states map to their own stages so checkpoints taken
/// there remain distinguishable from in-flight ones.
pub fn stage_of(state: WorkflowState) -> Stage {
    let (index, name) = match state {
        WorkflowState::Ingested => (0, "ingest_context"),
        WorkflowState::PatchesProposed => (1, "propose_patches"),
        WorkflowState::WaitingUserApproval => (2, "await_approval"),
        WorkflowState::ApplyingPatches => (3, "apply_patches"),
        WorkflowState::PrOpen => (4, "pr_open"),
        WorkflowState::VerifyingCi => (5, "verify_ci"),
        WorkflowState::Done => (6, "done"),
        WorkflowState::Failed => (7, "failed"),
        WorkflowState::BlockedPolicy => (8, "blocked_policy"),
        WorkflowState::NeedsHuman => (9, "needs_human"),
    };
    Stage { index, name }
}

// ---------------------------------------------------------------------------
// Transition function
// ---------------------------------------------------------------------------

/// Compute the next state and jobs to enqueue for an incoming event.
///
/// Pure and deterministic: identical inputs yield identical outputs.
pub fn transition(
    current: WorkflowState,
    event: &Event,
    ctx: &TransitionContext,
) -> TransitionResult {
    // Terminal states absorb every event.
    if current.is_terminal() {
        return stay(current, vec![], "no transition from terminal state");
    }

    if let Some(result) = state_rules(current, event, ctx) {
        return result;
    }

    // Cross-cutting override: a blocking policy evaluation moves any
    // non-terminal state to BlockedPolicy, even states with no explicit
    // rule for the event. Checked after state-specific rules, before the
    // default fallthrough.
    if let Event::PolicyEvaluated { result } = event {
        if result.has_blocking_violations {
            return TransitionResult {
                next_state: WorkflowState::BlockedPolicy,
                enqueue: vec![],
                reason: format!("blocking policy violation overrides {current}"),
            };
        }
    }

    stay(
        current,
        vec![],
        &format!("no transition for event '{}' in state {current}", event.event_type()),
    )
}

/// State-specific rules. Returns None when no explicit rule applies, so the
/// caller can check the policy override and the default fallthrough.
fn state_rules(
    current: WorkflowState,
    event: &Event,
    ctx: &TransitionContext,
) -> Option<TransitionResult> {
    match current {
        WorkflowState::Ingested => ingested(event, ctx),
        WorkflowState::PatchesProposed => patches_proposed(event, ctx),
        WorkflowState::WaitingUserApproval => waiting_user_approval(event, ctx),
        WorkflowState::ApplyingPatches => applying_patches(event),
        WorkflowState::PrOpen | WorkflowState::VerifyingCi => ci_gated(event),
        // terminal states are handled before dispatch
        _ => None,
    }
}

fn ingested(event: &Event, ctx: &TransitionContext) -> Option<TransitionResult> {
    match event {
        Event::WorkflowCreated => Some(TransitionResult {
            next_state: WorkflowState::Ingested,
            enqueue: vec![job(
                JOB_INGEST_CONTEXT,
                json!({ "workflow_id": ctx.workflow_id }),
            )],
            reason: "workflow created; ingesting context".to_string(),
        }),
        Event::JobCompleted { stage, .. } if stage == JOB_INGEST_CONTEXT => {
            if ctx.has_patch_sets {
                Some(goto(
                    WorkflowState::PatchesProposed,
                    "context ingested; patch sets proposed",
                ))
            } else {
                Some(goto(
                    WorkflowState::NeedsHuman,
                    "context ingested but no patch sets were produced",
                ))
            }
        }
        Event::JobFailed { stage, error } if stage == JOB_INGEST_CONTEXT => Some(TransitionResult {
            next_state: WorkflowState::Failed,
            enqueue: vec![],
            reason: format!("context ingestion failed: {error}"),
        }),
        _ => None,
    }
}

fn patches_proposed(event: &Event, ctx: &TransitionContext) -> Option<TransitionResult> {
    if let Event::PolicyEvaluated { result } = event {
        return if result.has_blocking_violations {
            Some(goto(
                WorkflowState::BlockedPolicy,
                "policy evaluation found blocking violations",
            ))
        } else {
            Some(goto(
                WorkflowState::WaitingUserApproval,
                "policy evaluation passed; awaiting user approval",
            ))
        };
    }

    // No evaluation on this event. With patch sets present, (re-)request a
    // policy evaluation and hold position; without any, hand off to a human.
    if ctx.has_patch_sets {
        Some(TransitionResult {
            next_state: WorkflowState::PatchesProposed,
            enqueue: vec![job(
                JOB_EVALUATE_POLICY,
                json!({ "workflow_id": ctx.workflow_id }),
            )],
            reason: "awaiting policy evaluation; (re-)enqueueing evaluate_policy".to_string(),
        })
    } else {
        Some(goto(
            WorkflowState::NeedsHuman,
            "no patch sets exist to evaluate",
        ))
    }
}

fn waiting_user_approval(event: &Event, ctx: &TransitionContext) -> Option<TransitionResult> {
    match event {
        Event::ApprovalRecorded => {
            let Some(patch_set_id) = ctx.latest_patch_set_id else {
                return Some(stay(
                    WorkflowState::WaitingUserApproval,
                    vec![],
                    "approval recorded but no patch set exists",
                ));
            };
            if !ctx.has_approval_to_apply {
                return Some(stay(
                    WorkflowState::WaitingUserApproval,
                    vec![],
                    "approval recorded but does not permit applying",
                ));
            }
            // A policy evaluation may have landed after entering this state.
            if ctx.has_blocking_policy_violations {
                return Some(goto(
                    WorkflowState::BlockedPolicy,
                    "approval recorded but blocking policy violations exist",
                ));
            }
            Some(TransitionResult {
                next_state: WorkflowState::ApplyingPatches,
                enqueue: vec![job(
                    JOB_APPLY_PATCHES,
                    json!({ "workflow_id": ctx.workflow_id, "patch_set_id": patch_set_id }),
                )],
                reason: "approval recorded; applying patches".to_string(),
            })
        }
        // A late, non-blocking evaluation changes nothing. Blocking ones are
        // caught by the cross-cutting override.
        Event::PolicyEvaluated { result } if !result.has_blocking_violations => Some(stay(
            WorkflowState::WaitingUserApproval,
            vec![],
            "late non-blocking policy evaluation; still awaiting approval",
        )),
        _ => None,
    }
}

fn applying_patches(event: &Event) -> Option<TransitionResult> {
    match event {
        Event::JobCompleted { stage, result } if stage == JOB_APPLY_PATCHES => {
            if has_pr_reference(result) {
                Some(goto(WorkflowState::PrOpen, "patches applied; PR opened"))
            } else {
                // Apply nominally succeeded but produced no PR. Routed to
                // BlockedPolicy for compatibility with the existing pipeline.
                Some(goto(
                    WorkflowState::BlockedPolicy,
                    "apply completed without a PR reference",
                ))
            }
        }
        Event::JobFailed { stage, error } if stage == JOB_APPLY_PATCHES => {
            if error.contains("WRITE_BLOCKED") || error.contains("NO_APPROVAL") {
                Some(TransitionResult {
                    next_state: WorkflowState::BlockedPolicy,
                    enqueue: vec![],
                    reason: format!("apply blocked by write/approval gate: {error}"),
                })
            } else {
                Some(TransitionResult {
                    next_state: WorkflowState::Failed,
                    enqueue: vec![],
                    reason: format!("apply failed: {error}"),
                })
            }
        }
        _ => None,
    }
}

fn ci_gated(event: &Event) -> Option<TransitionResult> {
    match event {
        Event::CiCompleted { result } => {
            if result.is_success() {
                Some(goto(WorkflowState::Done, "CI succeeded"))
            } else {
                Some(goto(
                    WorkflowState::NeedsHuman,
                    &format!("CI concluded '{}'; needs human review", result.conclusion),
                ))
            }
        }
        _ => None,
    }
}

/// Whether an apply-patches result carries a PR reference.
fn has_pr_reference(result: &serde_json::Value) -> bool {
    result
        .get("pr_url")
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.is_empty())
        || result.get("pr_number").and_then(|v| v.as_u64()).is_some()
}

fn job(name: &str, payload: serde_json::Value) -> JobSpec {
    JobSpec {
        queue: JOB_QUEUE.to_string(),
        name: name.to_string(),
        payload,
    }
}

fn goto(next_state: WorkflowState, reason: &str) -> TransitionResult {
    TransitionResult {
        next_state,
        enqueue: vec![],
        reason: reason.to_string(),
    }
}

fn stay(state: WorkflowState, enqueue: Vec<JobSpec>, reason: &str) -> TransitionResult {
    TransitionResult {
        next_state: state,
        enqueue,
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

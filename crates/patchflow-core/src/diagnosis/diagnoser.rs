//! Root cause classification and fix ranking.
//!
//! The classifier is ordered first-match over the lowered error message and
//! job name, not a scored ensemble. The rule order is load-bearing: several
//! categories share trigger words, and earlier rules win. An optional
//! advisor pass can enrich the analysis text, but root cause and fixes
//! always come from the deterministic heuristics here.

use std::time::{Duration, Instant};

use chrono::Utc;
use patchflow_types::advisor::AdvisorInsight;
use patchflow_types::diagnosis::{
    DiagnosisResult, FailureContext, FixEffort, FixRisk, PotentialFix, RootCauseCategory,
};
use uuid::Uuid;

use crate::advisor::provider::{FixAdvisor, NoAdvisor};

/// Diagnoses failure contexts, optionally augmented by a fix advisor.
pub struct Diagnoser<A = NoAdvisor> {
    advisor: Option<A>,
    advisor_timeout: Duration,
}

impl Diagnoser<NoAdvisor> {
    /// A diagnoser using only the deterministic heuristics.
    pub fn heuristic_only() -> Self {
        Self {
            advisor: None,
            advisor_timeout: Duration::from_secs(10),
        }
    }
}

impl<A: FixAdvisor> Diagnoser<A> {
    /// A diagnoser that asks `advisor` for extra analysis, bounded by
    /// `advisor_timeout` so the heuristic path stays reachable even if the
    /// advisor never returns.
    pub fn with_advisor(advisor: A, advisor_timeout: Duration) -> Self {
        Self {
            advisor: Some(advisor),
            advisor_timeout,
        }
    }

    /// Diagnose a failure context.
    ///
    /// Never fails: advisor errors and timeouts fall back to the pure
    /// heuristic result.
    pub async fn diagnose(&self, context: &FailureContext) -> DiagnosisResult {
        let started = Instant::now();

        let insight = match &self.advisor {
            Some(advisor) => {
                match tokio::time::timeout(self.advisor_timeout, advisor.advise(context)).await {
                    Ok(Ok(insight)) => Some(insight),
                    Ok(Err(error)) => {
                        tracing::warn!(%error, "advisor failed, using heuristics only");
                        None
                    }
                    Err(_) => {
                        tracing::warn!(
                            timeout_ms = self.advisor_timeout.as_millis() as u64,
                            "advisor timed out, using heuristics only"
                        );
                        None
                    }
                }
            }
            None => None,
        };

        let (root_cause, confidence) = classify_root_cause(context);
        let potential_fixes = fixes_for(root_cause);

        let summary = match &insight {
            Some(i) => i.summary.clone(),
            None => summarize(root_cause, context),
        };
        let analysis = build_analysis(context, root_cause, confidence, insight.as_ref());

        let result = DiagnosisResult {
            id: Uuid::now_v7(),
            context: context.clone(),
            root_cause,
            confidence,
            summary,
            analysis,
            potential_fixes,
            related_patterns: detect_patterns(context),
            prevention_recommendations: Some(prevention_for(root_cause)),
            diagnosed_at: Utc::now(),
            diagnosis_duration_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            workflow_id = %context.workflow_id,
            run_id = %context.run_id,
            root_cause = %result.root_cause,
            confidence = result.confidence,
            fixes = result.potential_fixes.len(),
            "diagnosis complete"
        );

        result
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Ordered first-match root cause classification.
///
/// Returns the matched category with its fixed confidence. The rule order
/// must not be rearranged: overlapping trigger words mean earlier rules
/// deliberately shadow later ones.
pub fn classify_root_cause(context: &FailureContext) -> (RootCauseCategory, f64) {
    let msg = context.error_message.to_lowercase();
    let job = context.job_name.to_lowercase();
    let has_violations = context
        .policy_violations
        .as_ref()
        .is_some_and(|v| !v.is_empty());

    let matches_any = |words: &[&str]| words.iter().any(|w| msg.contains(w));

    if has_violations {
        (RootCauseCategory::PolicyViolation, 0.95)
    } else if job.contains("test") || matches_any(&["assertion", "expect", "test failed"]) {
        (RootCauseCategory::TestFailure, 0.9)
    } else if job.contains("build")
        || matches_any(&["compile", "typescript", "tsc", "syntax error"])
    {
        (RootCauseCategory::BuildError, 0.85)
    } else if matches_any(&[
        "module not found",
        "cannot find",
        "npm err",
        "package",
        "dependency",
    ]) {
        (RootCauseCategory::DependencyIssue, 0.85)
    } else if matches_any(&[
        "permission denied",
        "unauthorized",
        "forbidden",
        "access denied",
        "401",
        "403",
    ]) {
        (RootCauseCategory::PermissionDenied, 0.85)
    } else if matches_any(&["timeout", "out of memory", "heap", "quota", "limit exceeded"]) {
        (RootCauseCategory::ResourceLimit, 0.8)
    } else if matches_any(&["econnrefused", "network", "connection", "dns", "socket"]) {
        (RootCauseCategory::NetworkError, 0.8)
    } else if matches_any(&["api", "external", "service unavailable", "500", "502", "503"]) {
        (RootCauseCategory::ExternalService, 0.75)
    } else if matches_any(&["config", "environment", "env", "missing"]) {
        (RootCauseCategory::ConfigurationError, 0.7)
    } else if matches_any(&["invalid", "parse", "json", "undefined", "null", "type error"]) {
        (RootCauseCategory::DataIssue, 0.65)
    } else if context.stack_trace.is_some() || matches_any(&["error", "exception"]) {
        (RootCauseCategory::CodeError, 0.5)
    } else {
        (RootCauseCategory::Unknown, 0.3)
    }
}

// ---------------------------------------------------------------------------
// Fix catalog
// ---------------------------------------------------------------------------

fn fix(
    description: &str,
    confidence: f64,
    effort: FixEffort,
    risk: FixRisk,
    can_auto_patch: bool,
    verification_commands: Option<Vec<&str>>,
) -> PotentialFix {
    PotentialFix {
        description: description.to_string(),
        confidence,
        effort,
        risk,
        can_auto_patch,
        suggested_changes: None,
        verification_commands: verification_commands
            .map(|cmds| cmds.into_iter().map(String::from).collect()),
    }
}

/// Candidate fixes per category, sorted descending by confidence.
pub fn fixes_for(category: RootCauseCategory) -> Vec<PotentialFix> {
    let mut fixes = match category {
        RootCauseCategory::PolicyViolation => vec![
            fix(
                "Revise the proposed changes to comply with the violated policy rules",
                0.9,
                FixEffort::Medium,
                FixRisk::Low,
                false,
                None,
            ),
            fix(
                "Request a policy exception from a maintainer",
                0.4,
                FixEffort::Small,
                FixRisk::Medium,
                false,
                None,
            ),
        ],
        RootCauseCategory::TestFailure => vec![
            fix(
                "Fix the code so the failing assertions pass",
                0.8,
                FixEffort::Small,
                FixRisk::Low,
                true,
                Some(vec!["npm test"]),
            ),
            fix(
                "Update stale test expectations to match intended behavior",
                0.5,
                FixEffort::Small,
                FixRisk::Medium,
                true,
                Some(vec!["npm test"]),
            ),
        ],
        RootCauseCategory::BuildError => vec![fix(
            "Fix compilation errors",
            0.85,
            FixEffort::Small,
            FixRisk::Low,
            true,
            Some(vec!["npm run build"]),
        )],
        RootCauseCategory::DependencyIssue => vec![
            fix(
                "Install missing dependencies",
                0.85,
                FixEffort::Trivial,
                FixRisk::Low,
                false,
                Some(vec!["npm install", "npm run build"]),
            ),
            fix(
                "Update import paths to match installed packages",
                0.6,
                FixEffort::Small,
                FixRisk::Low,
                true,
                Some(vec!["npm run build"]),
            ),
        ],
        RootCauseCategory::ConfigurationError => vec![fix(
            "Correct the missing or invalid configuration values",
            0.75,
            FixEffort::Small,
            FixRisk::Low,
            true,
            None,
        )],
        RootCauseCategory::PermissionDenied => vec![fix(
            "Grant the required credentials or access scopes",
            0.7,
            FixEffort::Small,
            FixRisk::Medium,
            false,
            None,
        )],
        RootCauseCategory::ResourceLimit => vec![fix(
            "Raise the resource limit or reduce the workload size",
            0.65,
            FixEffort::Medium,
            FixRisk::Medium,
            false,
            None,
        )],
        RootCauseCategory::NetworkError => vec![fix(
            "Verify connectivity to the failing endpoint",
            0.5,
            FixEffort::Small,
            FixRisk::Low,
            false,
            None,
        )],
        RootCauseCategory::ExternalService => vec![fix(
            "Check the external service status and credentials",
            0.5,
            FixEffort::Small,
            FixRisk::Low,
            false,
            None,
        )],
        RootCauseCategory::DataIssue => vec![fix(
            "Add validation and handling for the malformed input",
            0.6,
            FixEffort::Small,
            FixRisk::Medium,
            true,
            Some(vec!["npm test"]),
        )],
        RootCauseCategory::CodeError => vec![fix(
            "Fix the error at the failure site indicated by the stack trace",
            0.6,
            FixEffort::Medium,
            FixRisk::Medium,
            true,
            Some(vec!["npm test"]),
        )],
        RootCauseCategory::Unknown => vec![fix(
            "Investigate the failure manually",
            0.3,
            FixEffort::Medium,
            FixRisk::Low,
            false,
            None,
        )],
    };

    if matches!(
        category,
        RootCauseCategory::NetworkError
            | RootCauseCategory::ExternalService
            | RootCauseCategory::ResourceLimit
    ) {
        fixes.push(fix(
            "Retry the job -- the failure may be transient",
            0.4,
            FixEffort::Trivial,
            FixRisk::Low,
            false,
            None,
        ));
    }

    fixes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    fixes
}

// ---------------------------------------------------------------------------
// Report rendering
// ---------------------------------------------------------------------------

fn summarize(category: RootCauseCategory, context: &FailureContext) -> String {
    let job = &context.job_name;
    let first_line = context.error_message.lines().next().unwrap_or("");
    match category {
        RootCauseCategory::PolicyViolation => {
            format!("Job '{job}' was blocked by policy violations")
        }
        RootCauseCategory::TestFailure => format!("Tests failed in job '{job}': {first_line}"),
        RootCauseCategory::BuildError => format!("Build failed in job '{job}': {first_line}"),
        RootCauseCategory::DependencyIssue => {
            format!("Job '{job}' failed on a missing or broken dependency")
        }
        RootCauseCategory::ConfigurationError => {
            format!("Job '{job}' failed on missing or invalid configuration")
        }
        RootCauseCategory::PermissionDenied => format!("Job '{job}' was denied access"),
        RootCauseCategory::ResourceLimit => format!("Job '{job}' hit a resource limit"),
        RootCauseCategory::NetworkError => format!("Job '{job}' hit a network failure"),
        RootCauseCategory::ExternalService => {
            format!("Job '{job}' failed calling an external service")
        }
        RootCauseCategory::DataIssue => format!("Job '{job}' failed on malformed data"),
        RootCauseCategory::CodeError => format!("Job '{job}' crashed: {first_line}"),
        RootCauseCategory::Unknown => format!("Job '{job}' failed for an unknown reason"),
    }
}

const MAX_LISTED_FILES: usize = 10;

fn build_analysis(
    context: &FailureContext,
    root_cause: RootCauseCategory,
    confidence: f64,
    insight: Option<&AdvisorInsight>,
) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "## Root Cause\n\n{root_cause} (confidence {confidence:.2})\n\n"
    ));
    out.push_str(&format!(
        "## Error Details\n\n```\n{}\n```\n\n",
        context.error_message
    ));
    if let Some(trace) = &context.stack_trace {
        out.push_str(&format!("## Stack Trace\n\n```\n{trace}\n```\n\n"));
    }
    if let Some(violations) = &context.policy_violations {
        out.push_str("## Policy Violations\n\n");
        for v in violations {
            let blocking = if v.blocking { "blocking" } else { "non-blocking" };
            out.push_str(&format!("- `{}` ({blocking}): {}\n", v.rule, v.message));
        }
        out.push('\n');
    }
    out.push_str(&format!(
        "## Context\n\n\
         - Workflow: {}\n\
         - Run: {}\n\
         - Job: {}\n\
         - Workflow state: {}\n\
         - Failed at: {}\n",
        context.workflow_id,
        context.run_id,
        context.job_name,
        context.workflow_state,
        context.failed_at.to_rfc3339(),
    ));
    if let Some(duration_ms) = context.duration_ms {
        out.push_str(&format!("- Duration: {duration_ms}ms\n"));
    }
    out.push('\n');
    if let Some(files) = &context.involved_files {
        out.push_str("## Involved Files\n\n");
        for file in files.iter().take(MAX_LISTED_FILES) {
            out.push_str(&format!("- `{file}`\n"));
        }
        out.push('\n');
    }
    if let Some(insight) = insight {
        out.push_str(&format!(
            "## Advisor Analysis\n\n{} (advisor confidence {:.2})\n",
            insight.analysis, insight.confidence
        ));
    }

    out.trim_end().to_string()
}

const REPEATED_FAILURE_THRESHOLD: usize = 3;
const STATE_THRASH_THRESHOLD: usize = 10;

fn detect_patterns(context: &FailureContext) -> Option<Vec<String>> {
    let mut patterns = Vec::new();

    let failure_events = context
        .recent_events
        .iter()
        .filter(|e| e.event_type.contains("failed") || e.event_type.contains("error"))
        .count();
    if failure_events > REPEATED_FAILURE_THRESHOLD {
        patterns.push(format!(
            "repeated failures: {failure_events} failure events in recent history"
        ));
    }

    let state_changes = context
        .recent_events
        .iter()
        .filter(|e| e.event_type.contains("state"))
        .count();
    if state_changes > STATE_THRASH_THRESHOLD {
        patterns.push(format!(
            "state thrashing: {state_changes} state-change events in recent history"
        ));
    }

    (!patterns.is_empty()).then_some(patterns)
}

fn prevention_for(category: RootCauseCategory) -> Vec<String> {
    let tips: &[&str] = match category {
        RootCauseCategory::PolicyViolation => &[
            "Surface policy rules to change authors before patches are proposed",
            "Run policy evaluation earlier in the pipeline",
        ],
        RootCauseCategory::TestFailure => &[
            "Run the affected test suite locally before proposing patches",
            "Keep test expectations close to the code they cover",
        ],
        RootCauseCategory::BuildError => &[
            "Type-check proposed patches before enqueueing apply jobs",
            "Pin toolchain versions so builds are reproducible",
        ],
        RootCauseCategory::DependencyIssue => &[
            "Commit a lockfile and install from it in every job",
            "Audit dependency updates in a separate workflow",
        ],
        RootCauseCategory::ConfigurationError => &[
            "Validate configuration at startup instead of first use",
            "Document required environment variables alongside defaults",
        ],
        RootCauseCategory::PermissionDenied => &[
            "Verify credentials and scopes during workflow ingestion",
            "Rotate tokens before they expire",
        ],
        RootCauseCategory::ResourceLimit => &[
            "Set job resource requests based on observed peaks",
            "Split oversized workloads into smaller jobs",
        ],
        RootCauseCategory::NetworkError => &[
            "Add retries with backoff around outbound calls",
            "Alert on elevated connection failure rates",
        ],
        RootCauseCategory::ExternalService => &[
            "Monitor external service health and fail fast on outages",
            "Cache responses where staleness is acceptable",
        ],
        RootCauseCategory::DataIssue => &[
            "Validate payloads at the boundary before processing",
            "Reject rather than coerce unexpected field types",
        ],
        RootCauseCategory::CodeError => &[
            "Add a regression test covering the failure path",
            "Enable stricter static analysis in CI",
        ],
        RootCauseCategory::Unknown => &[
            "Improve error messages so failures classify into a category",
        ],
    };
    tips.iter().map(|t| t.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use patchflow_types::advisor::AdvisorError;
    use patchflow_types::event::WorkflowEvent;
    use patchflow_types::workflow::{PolicyViolation, WorkflowState};
    use serde_json::json;

    fn make_context(job_name: &str, error: &str) -> FailureContext {
        FailureContext {
            workflow_id: Uuid::now_v7(),
            run_id: Uuid::now_v7(),
            job_name: job_name.to_string(),
            error_message: error.to_string(),
            stack_trace: None,
            workflow_state: WorkflowState::Failed,
            inputs: json!({}),
            partial_outputs: None,
            recent_events: vec![],
            policy_violations: None,
            involved_files: None,
            failed_at: Utc::now(),
            duration_ms: Some(1200),
        }
    }

    fn make_violation(workflow_id: Uuid, rule: &str) -> PolicyViolation {
        PolicyViolation {
            id: Uuid::now_v7(),
            workflow_id,
            rule: rule.to_string(),
            message: "touches a frozen file".to_string(),
            blocking: true,
            file_path: None,
            created_at: Utc::now(),
        }
    }

    // -------------------------------------------------------------------
    // classify_root_cause
    // -------------------------------------------------------------------

    #[test]
    fn test_policy_violations_win_over_everything() {
        let mut context = make_context("build", "TypeScript error: Cannot find module './foo'");
        context.policy_violations = Some(vec![make_violation(context.workflow_id, "frozen_file")]);
        let (cause, confidence) = classify_root_cause(&context);
        assert_eq!(cause, RootCauseCategory::PolicyViolation);
        assert!((confidence - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_violation_list_does_not_match() {
        let mut context = make_context("deploy", "some unclassifiable thing");
        context.policy_violations = Some(vec![]);
        let (cause, _) = classify_root_cause(&context);
        assert_eq!(cause, RootCauseCategory::Unknown);
    }

    #[test]
    fn test_build_job_with_dependency_message_classifies_build() {
        // Rule order: build (3) fires before dependency (4) even though the
        // message matches both.
        let context = make_context("build", "TypeScript error: Cannot find module './foo'");
        let (cause, confidence) = classify_root_cause(&context);
        assert_eq!(cause, RootCauseCategory::BuildError);
        assert!((confidence - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn test_dependency_wins_over_data_issue() {
        // "cannot find" (rule 4) and "undefined" (rule 10) both match;
        // the earlier rule decides.
        let context = make_context("deploy", "Cannot find package, got undefined");
        let (cause, confidence) = classify_root_cause(&context);
        assert_eq!(cause, RootCauseCategory::DependencyIssue);
        assert!((confidence - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn test_test_job_name_classifies_test_failure() {
        let context = make_context("run_tests", "1 of 14 cases red");
        let (cause, confidence) = classify_root_cause(&context);
        assert_eq!(cause, RootCauseCategory::TestFailure);
        assert!((confidence - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_permission_denied() {
        let context = make_context("deploy", "403 Forbidden");
        let (cause, _) = classify_root_cause(&context);
        assert_eq!(cause, RootCauseCategory::PermissionDenied);
    }

    #[test]
    fn test_resource_limit() {
        let context = make_context("deploy", "JavaScript heap out of memory");
        let (cause, confidence) = classify_root_cause(&context);
        assert_eq!(cause, RootCauseCategory::ResourceLimit);
        assert!((confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_network_error() {
        let context = make_context("deploy", "ECONNREFUSED 127.0.0.1:5432");
        let (cause, _) = classify_root_cause(&context);
        assert_eq!(cause, RootCauseCategory::NetworkError);
    }

    #[test]
    fn test_external_service() {
        let context = make_context("deploy", "upstream returned 502");
        let (cause, confidence) = classify_root_cause(&context);
        assert_eq!(cause, RootCauseCategory::ExternalService);
        assert!((confidence - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_configuration_error() {
        let context = make_context("deploy", "required environment variable not set");
        let (cause, _) = classify_root_cause(&context);
        assert_eq!(cause, RootCauseCategory::ConfigurationError);
    }

    #[test]
    fn test_data_issue() {
        let context = make_context("transform", "Unexpected token in JSON at position 0");
        let (cause, confidence) = classify_root_cause(&context);
        assert_eq!(cause, RootCauseCategory::DataIssue);
        assert!((confidence - 0.65).abs() < f64::EPSILON);
    }

    #[test]
    fn test_stack_trace_alone_classifies_code_error() {
        let mut context = make_context("deploy", "something went sideways");
        context.stack_trace = Some("    at main (app.js:1:1)".to_string());
        let (cause, confidence) = classify_root_cause(&context);
        assert_eq!(cause, RootCauseCategory::CodeError);
        assert!((confidence - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unclassifiable_is_unknown() {
        let context = make_context("deploy", "it just stopped");
        let (cause, confidence) = classify_root_cause(&context);
        assert_eq!(cause, RootCauseCategory::Unknown);
        assert!((confidence - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let context = make_context("build", "tsc exited 2");
        assert_eq!(classify_root_cause(&context), classify_root_cause(&context));
    }

    // -------------------------------------------------------------------
    // Fix catalog
    // -------------------------------------------------------------------

    #[test]
    fn test_build_error_fix_is_auto_patchable_with_build_verification() {
        let fixes = fixes_for(RootCauseCategory::BuildError);
        let auto = fixes.iter().find(|f| f.can_auto_patch).unwrap();
        assert!((auto.confidence - 0.85).abs() < f64::EPSILON);
        let commands = auto.verification_commands.as_ref().unwrap();
        assert!(commands.iter().any(|c| c.contains("build")));
    }

    #[test]
    fn test_dependency_fixes_install_not_auto_patchable() {
        let fixes = fixes_for(RootCauseCategory::DependencyIssue);
        let install = fixes
            .iter()
            .find(|f| f.description.contains("Install"))
            .unwrap();
        assert!(!install.can_auto_patch);
        let imports = fixes
            .iter()
            .find(|f| f.description.contains("import paths"))
            .unwrap();
        assert!(imports.can_auto_patch);
        assert!(imports.confidence < install.confidence);
    }

    #[test]
    fn test_transient_categories_get_retry_fix() {
        for category in [
            RootCauseCategory::NetworkError,
            RootCauseCategory::ExternalService,
            RootCauseCategory::ResourceLimit,
        ] {
            let fixes = fixes_for(category);
            let retry = fixes
                .iter()
                .find(|f| f.description.contains("transient"))
                .unwrap();
            assert!((retry.confidence - 0.4).abs() < f64::EPSILON);
            assert!(!retry.can_auto_patch);
        }
        let build_fixes = fixes_for(RootCauseCategory::BuildError);
        assert!(!build_fixes.iter().any(|f| f.description.contains("transient")));
    }

    #[test]
    fn test_fixes_sorted_descending_by_confidence() {
        for category in [
            RootCauseCategory::PolicyViolation,
            RootCauseCategory::DependencyIssue,
            RootCauseCategory::NetworkError,
            RootCauseCategory::TestFailure,
        ] {
            let fixes = fixes_for(category);
            for pair in fixes.windows(2) {
                assert!(pair[0].confidence >= pair[1].confidence);
            }
        }
    }

    // -------------------------------------------------------------------
    // diagnose
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn test_heuristic_diagnosis_end_to_end() {
        let diagnoser = Diagnoser::heuristic_only();
        let mut context = make_context("build", "TypeScript error: Cannot find module './foo'");
        context.involved_files = Some(vec!["src/foo.ts".to_string()]);

        let result = diagnoser.diagnose(&context).await;
        assert_eq!(result.root_cause, RootCauseCategory::BuildError);
        assert!((result.confidence - 0.85).abs() < f64::EPSILON);
        assert!(result.summary.contains("build"));
        assert!(result.analysis.contains("## Root Cause"));
        assert!(result.analysis.contains("src/foo.ts"));
        assert!(!result.analysis.contains("## Advisor Analysis"));
        assert!(result.potential_fixes.iter().any(|f| f.can_auto_patch));
    }

    struct FailingAdvisor;

    impl FixAdvisor for FailingAdvisor {
        async fn advise(&self, _: &FailureContext) -> Result<AdvisorInsight, AdvisorError> {
            Err(AdvisorError::Server {
                message: "boom".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_advisor_failure_falls_back_to_heuristics() {
        let diagnoser = Diagnoser::with_advisor(FailingAdvisor, Duration::from_secs(1));
        let context = make_context("build", "tsc exited 2");
        let result = diagnoser.diagnose(&context).await;
        assert_eq!(result.root_cause, RootCauseCategory::BuildError);
        assert!(!result.analysis.contains("## Advisor Analysis"));
    }

    struct HangingAdvisor;

    impl FixAdvisor for HangingAdvisor {
        async fn advise(&self, _: &FailureContext) -> Result<AdvisorInsight, AdvisorError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_advisor_hang_is_bounded_by_timeout() {
        let diagnoser = Diagnoser::with_advisor(HangingAdvisor, Duration::from_millis(10));
        let context = make_context("build", "tsc exited 2");
        let result = diagnoser.diagnose(&context).await;
        assert_eq!(result.root_cause, RootCauseCategory::BuildError);
    }

    struct FixedAdvisor;

    impl FixAdvisor for FixedAdvisor {
        async fn advise(&self, _: &FailureContext) -> Result<AdvisorInsight, AdvisorError> {
            Ok(AdvisorInsight {
                summary: "Import path points at a deleted module".to_string(),
                analysis: "The refactor in the previous patch removed './foo'.".to_string(),
                confidence: 0.9,
            })
        }
    }

    #[tokio::test]
    async fn test_advisor_insight_enriches_but_does_not_reclassify() {
        let diagnoser = Diagnoser::with_advisor(FixedAdvisor, Duration::from_secs(1));
        let context = make_context("build", "tsc exited 2");
        let result = diagnoser.diagnose(&context).await;
        // root cause still comes from heuristics
        assert_eq!(result.root_cause, RootCauseCategory::BuildError);
        assert!((result.confidence - 0.85).abs() < f64::EPSILON);
        // summary and analysis pick up the insight
        assert_eq!(result.summary, "Import path points at a deleted module");
        assert!(result.analysis.contains("## Advisor Analysis"));
        assert!(result.analysis.contains("deleted module"));
    }

    // -------------------------------------------------------------------
    // Patterns
    // -------------------------------------------------------------------

    #[tokio::test]
    async fn test_repeated_failures_detected() {
        let mut context = make_context("deploy", "it broke");
        context.recent_events = (0..5)
            .map(|_| WorkflowEvent::new(context.workflow_id, "job_failed", json!({})))
            .collect();
        let result = Diagnoser::heuristic_only().diagnose(&context).await;
        let patterns = result.related_patterns.unwrap();
        assert!(patterns.iter().any(|p| p.contains("repeated failures")));
    }

    #[tokio::test]
    async fn test_no_patterns_on_quiet_history() {
        let context = make_context("deploy", "it broke");
        let result = Diagnoser::heuristic_only().diagnose(&context).await;
        assert!(result.related_patterns.is_none());
    }
}

//! Schema-validated structured output on top of a raw advisor client.
//!
//! Wraps an `AdvisorClient` with the full collaborator contract: prompt
//! construction from the registry, transient-error retry, token budget
//! enforcement, and re-asks (up to `max_parse_retries`) when the reply
//! fails to parse or validate against the insight schema.

use patchflow_types::advisor::{
    AdvisorError, AdvisorInsight, AdvisorOptions, CostBudget, RetryPolicy,
};
use patchflow_types::diagnosis::FailureContext;
use tokio::sync::Mutex;

use super::provider::{AdvisorClient, FixAdvisor};
use super::registry::{PromptRegistry, ROLE_DIAGNOSIS};
use super::retry::run_with_retry;

/// Advisor that turns raw completions into validated `AdvisorInsight`s.
pub struct StructuredAdvisor<C> {
    client: C,
    registry: PromptRegistry,
    retry: RetryPolicy,
    options: AdvisorOptions,
    budget: Mutex<CostBudget>,
}

impl<C: AdvisorClient> StructuredAdvisor<C> {
    pub fn new(client: C, registry: PromptRegistry, retry: RetryPolicy, budget: CostBudget) -> Self {
        Self {
            client,
            registry,
            retry,
            options: AdvisorOptions::default(),
            budget: Mutex::new(budget),
        }
    }

    /// Tokens remaining in the budget.
    pub async fn budget_remaining(&self) -> u64 {
        self.budget.lock().await.remaining()
    }

    fn build_prompt(&self, context: &FailureContext) -> String {
        let schema = schemars::schema_for!(AdvisorInsight);
        let schema_json =
            serde_json::to_string_pretty(&schema).unwrap_or_else(|_| "{}".to_string());
        let version = self.registry.get(ROLE_DIAGNOSIS);

        let mut prompt = format!(
            "## Failure Analysis Request ({version})\n\
             \n\
             A workflow job has failed. Analyze the failure below.\n\
             \n\
             **Job:** {job}\n\
             **Workflow state:** {state}\n\
             **Error:**\n\
             ```\n\
             {error}\n\
             ```\n",
            job = context.job_name,
            state = context.workflow_state,
            error = context.error_message,
        );
        if let Some(trace) = &context.stack_trace {
            prompt.push_str(&format!("**Stack trace:**\n```\n{trace}\n```\n"));
        }
        if let Some(files) = &context.involved_files {
            prompt.push_str(&format!("**Involved files:** {}\n", files.join(", ")));
        }
        prompt.push_str(&format!(
            "\nRespond with a single JSON object matching this schema, and nothing else:\n\
             ```json\n{schema_json}\n```\n"
        ));
        prompt
    }
}

impl<C: AdvisorClient> FixAdvisor for StructuredAdvisor<C> {
    async fn advise(&self, context: &FailureContext) -> Result<AdvisorInsight, AdvisorError> {
        let mut prompt = self.build_prompt(context);
        let mut parse_attempt = 0u32;

        loop {
            let reply = run_with_retry(&self.retry, "advisor completion", |_| {
                self.client.run(ROLE_DIAGNOSIS, &prompt, &self.options)
            })
            .await?;

            self.budget.lock().await.try_consume(reply.tokens_used)?;

            match parse_insight(&reply.text) {
                Ok(insight) => {
                    tracing::debug!(
                        client = self.client.name(),
                        tokens = reply.tokens_used,
                        confidence = insight.confidence,
                        "advisor insight accepted"
                    );
                    return Ok(insight);
                }
                Err(error) if parse_attempt < self.retry.max_parse_retries => {
                    tracing::warn!(
                        client = self.client.name(),
                        parse_attempt,
                        %error,
                        "advisor output rejected, re-asking"
                    );
                    prompt.push_str(&format!(
                        "\nYour previous reply was rejected: {error}. \
                         Reply again with only the JSON object.\n"
                    ));
                    parse_attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Parse and validate an insight from raw reply text.
///
/// Tolerates a fenced code block or surrounding prose around the JSON object.
fn parse_insight(text: &str) -> Result<AdvisorInsight, AdvisorError> {
    let json_str = extract_json_object(text)
        .ok_or_else(|| AdvisorError::Parse("no JSON object in reply".to_string()))?;
    let insight: AdvisorInsight =
        serde_json::from_str(json_str).map_err(|e| AdvisorError::Parse(e.to_string()))?;
    insight.validate()?;
    Ok(insight)
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::provider::AdvisorReply;
    use chrono::Utc;
    use patchflow_types::workflow::WorkflowState;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use uuid::Uuid;

    /// Client that plays back scripted replies in order.
    struct ScriptedClient {
        replies: StdMutex<Vec<Result<AdvisorReply, AdvisorError>>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<AdvisorReply, AdvisorError>>) -> Self {
            Self {
                replies: StdMutex::new(replies),
            }
        }
    }

    impl AdvisorClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn run(
            &self,
            _role: &str,
            _prompt: &str,
            _options: &AdvisorOptions,
        ) -> Result<AdvisorReply, AdvisorError> {
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn make_context() -> FailureContext {
        FailureContext {
            workflow_id: Uuid::now_v7(),
            run_id: Uuid::now_v7(),
            job_name: "build".to_string(),
            error_message: "compile error in src/lib.rs".to_string(),
            stack_trace: None,
            workflow_state: WorkflowState::Failed,
            inputs: json!({}),
            partial_outputs: None,
            recent_events: vec![],
            policy_violations: None,
            involved_files: Some(vec!["src/lib.rs".to_string()]),
            failed_at: Utc::now(),
            duration_ms: Some(900),
        }
    }

    fn good_reply(tokens: u64) -> Result<AdvisorReply, AdvisorError> {
        Ok(AdvisorReply {
            text: r#"{"summary": "Build broke on a bad import", "analysis": "The module path is wrong.", "confidence": 0.8}"#.to_string(),
            tokens_used: tokens,
        })
    }

    fn advisor(client: ScriptedClient) -> StructuredAdvisor<ScriptedClient> {
        StructuredAdvisor::new(
            client,
            PromptRegistry::new(),
            RetryPolicy {
                max_retries: 1,
                initial_delay_ms: 1,
                max_delay_ms: 2,
                backoff_multiplier: 2.0,
                max_parse_retries: 2,
            },
            CostBudget::new(10_000),
        )
    }

    #[tokio::test]
    async fn test_parses_valid_reply() {
        let advisor = advisor(ScriptedClient::new(vec![good_reply(100)]));
        let insight = advisor.advise(&make_context()).await.unwrap();
        assert_eq!(insight.summary, "Build broke on a bad import");
        assert_eq!(advisor.budget_remaining().await, 9_900);
    }

    #[tokio::test]
    async fn test_reasks_on_parse_failure() {
        let advisor = advisor(ScriptedClient::new(vec![
            Ok(AdvisorReply {
                text: "sorry, I can't do that".to_string(),
                tokens_used: 50,
            }),
            good_reply(100),
        ]));
        let insight = advisor.advise(&make_context()).await.unwrap();
        assert!((insight.confidence - 0.8).abs() < f64::EPSILON);
        // both replies were charged
        assert_eq!(advisor.budget_remaining().await, 9_850);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_parse_retries() {
        let bad = || {
            Ok(AdvisorReply {
                text: "not json".to_string(),
                tokens_used: 10,
            })
        };
        let advisor = advisor(ScriptedClient::new(vec![bad(), bad(), bad()]));
        let result = advisor.advise(&make_context()).await;
        assert!(matches!(result, Err(AdvisorError::Parse(_))));
    }

    #[tokio::test]
    async fn test_budget_exceeded_stops_call() {
        let mut advisor = advisor(ScriptedClient::new(vec![good_reply(100)]));
        advisor.budget = Mutex::new(CostBudget::new(50));
        let result = advisor.advise(&make_context()).await;
        assert!(matches!(result, Err(AdvisorError::BudgetExceeded { .. })));
    }

    #[tokio::test]
    async fn test_validation_failure_reasks() {
        let advisor = advisor(ScriptedClient::new(vec![
            Ok(AdvisorReply {
                text: r#"{"summary": "x", "analysis": "y", "confidence": 2.5}"#.to_string(),
                tokens_used: 10,
            }),
            good_reply(100),
        ]));
        let insight = advisor.advise(&make_context()).await.unwrap();
        assert!((insight.confidence - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_extract_json_from_fenced_block() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nthanks";
        assert_eq!(extract_json_object(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_prompt_contains_context_and_schema() {
        let advisor = advisor(ScriptedClient::new(vec![]));
        let prompt = advisor.build_prompt(&make_context());
        assert!(prompt.contains("compile error in src/lib.rs"));
        assert!(prompt.contains("src/lib.rs"));
        assert!(prompt.contains("confidence"));
        assert!(prompt.contains("(v1)"));
    }
}

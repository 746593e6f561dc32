//! Types for the optional LLM fix-advisor collaborator.
//!
//! The advisor is never required for diagnosis correctness -- only for the
//! quality of the natural-language analysis. These types define the call
//! shape, the error taxonomy retried per policy, and the budget/backoff
//! configuration. The trait itself lives in `patchflow-core`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// Per-call options for an advisor request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorOptions {
    /// Maximum tokens the call may produce.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    2048
}

impl Default for AdvisorOptions {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Errors from the advisor collaborator.
///
/// `RateLimited`, `Timeout`, and `Server` are transient and retried per
/// policy; the rest surface immediately.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("advisor call timed out")]
    Timeout,

    #[error("server error: {message}")]
    Server { message: String },

    #[error("token budget exceeded: used {used} of {limit}")]
    BudgetExceeded { used: u64, limit: u64 },

    #[error("failed to parse advisor output: {0}")]
    Parse(String),

    #[error("advisor output failed validation: {0}")]
    Validation(String),

    #[error("provider error: {message}")]
    Provider { message: String },
}

impl AdvisorError {
    /// Whether this error should trigger a retry under the standard policy.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdvisorError::RateLimited { .. } | AdvisorError::Timeout | AdvisorError::Server { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Exponential backoff retry policy for advisor calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the initial call.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Upper bound on any single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied per attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Maximum re-asks when structured output fails to parse/validate.
    #[serde(default = "default_max_parse_retries")]
    pub max_parse_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    15_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_parse_retries() -> u32 {
    2
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_parse_retries: default_max_parse_retries(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), capped at `max_delay_ms`.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let raw = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        (raw as u64).min(self.max_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Cost budget
// ---------------------------------------------------------------------------

/// Token/cost ceiling enforced across advisor calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBudget {
    /// Total tokens the advisor may consume.
    pub max_tokens: u64,
    /// Tokens consumed so far.
    #[serde(default)]
    pub used_tokens: u64,
}

impl CostBudget {
    /// Create a budget with the given token ceiling.
    pub fn new(max_tokens: u64) -> Self {
        Self {
            max_tokens,
            used_tokens: 0,
        }
    }

    /// Tokens remaining before the ceiling.
    pub fn remaining(&self) -> u64 {
        self.max_tokens.saturating_sub(self.used_tokens)
    }

    /// Consume `tokens`, failing with `BudgetExceeded` if the ceiling would
    /// be crossed. On failure nothing is consumed.
    pub fn try_consume(&mut self, tokens: u64) -> Result<(), AdvisorError> {
        let would_use = self.used_tokens.saturating_add(tokens);
        if would_use > self.max_tokens {
            return Err(AdvisorError::BudgetExceeded {
                used: self.used_tokens,
                limit: self.max_tokens,
            });
        }
        self.used_tokens = would_use;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Structured output
// ---------------------------------------------------------------------------

/// Schema-validated structured output requested from the advisor.
///
/// Parsed insights enrich the analysis text; root cause and fixes always
/// come from the deterministic heuristic classifier.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AdvisorInsight {
    /// One-line summary of the failure.
    pub summary: String,
    /// Free-form analysis of what went wrong and why.
    pub analysis: String,
    /// Advisor's confidence in its own analysis, in [0, 1].
    pub confidence: f64,
}

impl AdvisorInsight {
    /// Validate value ranges beyond what serde enforces.
    pub fn validate(&self) -> Result<(), AdvisorError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(AdvisorError::Validation(format!(
                "confidence {} outside [0, 1]",
                self.confidence
            )));
        }
        if self.summary.trim().is_empty() {
            return Err(AdvisorError::Validation("empty summary".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

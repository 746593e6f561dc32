//! Advisor trait definitions.
//!
//! `AdvisorClient` is the low-level call shape an LLM integration
//! implements; `FixAdvisor` is what the diagnoser consumes. Both use native
//! async fn in traits (RPITIT, Rust 2024 edition). Implementations live
//! outside this crate.

use patchflow_types::advisor::{AdvisorError, AdvisorInsight, AdvisorOptions};
use patchflow_types::diagnosis::FailureContext;

/// A single raw advisor completion.
#[derive(Debug, Clone)]
pub struct AdvisorReply {
    /// Raw text the model produced.
    pub text: String,
    /// Tokens the call consumed, charged against the cost budget.
    pub tokens_used: u64,
}

/// Low-level advisor client: one prompt in, one reply out.
///
/// `role` selects the prompt version via the registry; integrations may use
/// it to route to different models.
pub trait AdvisorClient: Send + Sync {
    /// Human-readable client name (e.g. "anthropic", "stub").
    fn name(&self) -> &str;

    /// Run a single completion call.
    fn run(
        &self,
        role: &str,
        prompt: &str,
        options: &AdvisorOptions,
    ) -> impl std::future::Future<Output = Result<AdvisorReply, AdvisorError>> + Send;
}

/// High-level advisor the diagnoser calls: failure context in, structured
/// insight out.
pub trait FixAdvisor: Send + Sync {
    fn advise(
        &self,
        context: &FailureContext,
    ) -> impl std::future::Future<Output = Result<AdvisorInsight, AdvisorError>> + Send;
}

/// Placeholder advisor for heuristic-only configurations.
///
/// Exists so `Diagnoser` can default its advisor type parameter; it is
/// never actually invoked (the diagnoser holds `Option<A>` and heuristic
/// configurations hold `None`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAdvisor;

impl FixAdvisor for NoAdvisor {
    async fn advise(&self, _context: &FailureContext) -> Result<AdvisorInsight, AdvisorError> {
        Err(AdvisorError::Provider {
            message: "no advisor configured".to_string(),
        })
    }
}

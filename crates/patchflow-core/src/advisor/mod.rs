//! The optional LLM fix-advisor boundary.
//!
//! Diagnosis never requires the advisor; it only improves the quality of the
//! natural-language analysis. The deterministic heuristic classifier in
//! `diagnosis::diagnoser` remains the single source of truth for root cause
//! and fixes.
//!
//! - `provider` -- the low-level client trait an integration implements,
//!   plus the `FixAdvisor` trait the diagnoser consumes
//! - `retry` -- exponential backoff over transient advisor errors
//! - `registry` -- injected role -> prompt version mapping
//! - `structured` -- schema-validated structured output on top of a client,
//!   with re-asks on parse/validation failure

pub mod provider;
pub mod registry;
pub mod retry;
pub mod structured;

pub use provider::{AdvisorClient, AdvisorReply, FixAdvisor, NoAdvisor};
pub use registry::PromptRegistry;
pub use retry::run_with_retry;
pub use structured::StructuredAdvisor;

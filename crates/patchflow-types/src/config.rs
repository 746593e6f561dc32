//! Configuration types for Patchflow.
//!
//! Everything here is TOML-deserializable with per-field serde defaults, so
//! a missing file or an empty table yields the same behavior as
//! `PatchflowConfig::default()`. File loading lives in `patchflow-infra`.

use serde::{Deserialize, Serialize};

use crate::advisor::RetryPolicy;
use crate::checkpoint::PruningConfig;

/// Tunables for the diagnosis subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisConfig {
    /// How many recent events to gather into a failure context.
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    /// Minimum fix confidence for auto-proposal creation.
    #[serde(default = "default_min_fix_confidence")]
    pub min_fix_confidence: f64,
    /// Whether to persist the diagnosis report as a workflow artifact.
    #[serde(default = "default_true")]
    pub persist_artifact: bool,
    /// Caller-side timeout around the advisor augmentation step. The
    /// heuristic path must stay reachable even if the advisor never returns.
    #[serde(default = "default_advisor_timeout_ms")]
    pub advisor_timeout_ms: u64,
}

fn default_max_events() -> usize {
    20
}

fn default_min_fix_confidence() -> f64 {
    0.7
}

fn default_true() -> bool {
    true
}

fn default_advisor_timeout_ms() -> u64 {
    10_000
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            min_fix_confidence: default_min_fix_confidence(),
            persist_artifact: true,
            advisor_timeout_ms: default_advisor_timeout_ms(),
        }
    }
}

/// Top-level Patchflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchflowConfig {
    /// Checkpoint retention policy.
    #[serde(default)]
    pub pruning: PruningConfig,
    /// Diagnosis tunables.
    #[serde(default)]
    pub diagnosis: DiagnosisConfig,
    /// Retry/backoff policy for the optional advisor collaborator.
    #[serde(default)]
    pub advisor_retry: RetryPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnosis_defaults() {
        let config = DiagnosisConfig::default();
        assert_eq!(config.max_events, 20);
        assert!((config.min_fix_confidence - 0.7).abs() < f64::EPSILON);
        assert!(config.persist_artifact);
        assert_eq!(config.advisor_timeout_ms, 10_000);
    }

    #[test]
    fn test_full_config_from_toml() {
        let toml_str = r#"
[pruning]
max_checkpoints_per_workflow = 5

[diagnosis]
min_fix_confidence = 0.85
persist_artifact = false

[advisor_retry]
max_retries = 1
"#;
        let config: PatchflowConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pruning.max_checkpoints_per_workflow, 5);
        // untouched sections keep defaults
        assert_eq!(config.pruning.max_checkpoint_age_days, 30);
        assert!((config.diagnosis.min_fix_confidence - 0.85).abs() < f64::EPSILON);
        assert!(!config.diagnosis.persist_artifact);
        assert_eq!(config.diagnosis.max_events, 20);
        assert_eq!(config.advisor_retry.max_retries, 1);
        assert_eq!(config.advisor_retry.initial_delay_ms, 500);
    }

    #[test]
    fn test_empty_toml_equals_default() {
        let config: PatchflowConfig = toml::from_str("").unwrap();
        assert_eq!(config.pruning.max_checkpoints_per_workflow, 10);
        assert_eq!(config.diagnosis.max_events, 20);
        assert_eq!(config.advisor_retry.max_retries, 3);
    }
}

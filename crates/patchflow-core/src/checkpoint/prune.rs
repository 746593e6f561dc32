//! Retention-policy selection for checkpoint pruning.
//!
//! The selection walks the checkpoint list newest to oldest. Exemptions are
//! evaluated before the count/age rules, so they can rescue a checkpoint
//! that either rule would otherwise prune:
//!
//! - `keep_first_checkpoint` exempts the last element of the *full* list
//!   (the workflow's oldest checkpoint, by position, not by timestamp math)
//! - `preserve_manual_checkpoints` exempts every non-automatic checkpoint
//!
//! A non-exempt checkpoint at index `i` is pruned when `i` is at or past
//! the count limit, or when it is older than the age limit.

use chrono::{DateTime, Duration, Utc};
use patchflow_types::checkpoint::{Checkpoint, PruningConfig};
use uuid::Uuid;

/// Ids of checkpoints the retention policy says to delete.
///
/// `checkpoints` must be ordered newest first, as the repository returns
/// them. Pure: the caller supplies `now`.
pub fn select_prunable(
    checkpoints: &[Checkpoint],
    config: &PruningConfig,
    now: DateTime<Utc>,
) -> Vec<Uuid> {
    let max_age = Duration::days(config.max_checkpoint_age_days);
    let last_index = checkpoints.len().saturating_sub(1);

    let mut pruned = Vec::new();
    for (i, checkpoint) in checkpoints.iter().enumerate() {
        let is_oldest = !checkpoints.is_empty() && i == last_index;
        if config.keep_first_checkpoint && is_oldest {
            continue;
        }
        if config.preserve_manual_checkpoints && !checkpoint.is_automatic {
            continue;
        }

        let over_count = i >= config.max_checkpoints_per_workflow;
        let over_age = now - checkpoint.created_at > max_age;
        if over_count || over_age {
            pruned.push(checkpoint.id);
        }
    }
    pruned
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchflow_types::checkpoint::CheckpointSnapshot;
    use patchflow_types::workflow::WorkflowState;

    fn checkpoint(age_days: i64, is_automatic: bool) -> Checkpoint {
        let created_at = Utc::now() - Duration::days(age_days);
        Checkpoint {
            id: Uuid::now_v7(),
            workflow_id: Uuid::nil(),
            name: format!("cp-{age_days}d"),
            state: WorkflowState::PatchesProposed,
            stage_index: 1,
            stage_name: "propose_patches".to_string(),
            snapshot: CheckpointSnapshot {
                workflow_state: WorkflowState::PatchesProposed,
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
            is_automatic,
            created_at,
            created_by: None,
        }
    }

    /// Newest-first list of automatic checkpoints aged 0..n days.
    fn auto_checkpoints(n: i64) -> Vec<Checkpoint> {
        (0..n).map(|d| checkpoint(d, true)).collect()
    }

    #[test]
    fn test_empty_list_prunes_nothing() {
        let config = PruningConfig::default();
        assert!(select_prunable(&[], &config, Utc::now()).is_empty());
    }

    #[test]
    fn test_count_limit_prunes_overflow() {
        let checkpoints = auto_checkpoints(5);
        let config = PruningConfig {
            max_checkpoints_per_workflow: 3,
            keep_first_checkpoint: false,
            ..Default::default()
        };
        let pruned = select_prunable(&checkpoints, &config, Utc::now());
        // indices 3 and 4 are past the count limit
        assert_eq!(pruned, vec![checkpoints[3].id, checkpoints[4].id]);
    }

    #[test]
    fn test_oldest_is_never_pruned_when_keep_first() {
        let checkpoints = auto_checkpoints(5);
        let config = PruningConfig {
            max_checkpoints_per_workflow: 3,
            keep_first_checkpoint: true,
            ..Default::default()
        };
        let pruned = select_prunable(&checkpoints, &config, Utc::now());
        // index 4 (oldest) is exempt even though it exceeds the count limit
        assert_eq!(pruned, vec![checkpoints[3].id]);
        assert!(!pruned.contains(&checkpoints[4].id));
    }

    #[test]
    fn test_age_limit_prunes_old_checkpoints() {
        let checkpoints = vec![
            checkpoint(1, true),
            checkpoint(45, true),
            checkpoint(60, true),
        ];
        let config = PruningConfig {
            keep_first_checkpoint: false,
            ..Default::default()
        };
        let pruned = select_prunable(&checkpoints, &config, Utc::now());
        assert_eq!(pruned, vec![checkpoints[1].id, checkpoints[2].id]);
    }

    #[test]
    fn test_keep_first_rescues_from_age_rule() {
        let checkpoints = vec![checkpoint(1, true), checkpoint(90, true)];
        let config = PruningConfig::default();
        let pruned = select_prunable(&checkpoints, &config, Utc::now());
        // the 90-day-old checkpoint is the oldest, so the exemption wins
        assert!(pruned.is_empty());
    }

    #[test]
    fn test_manual_checkpoints_are_preserved() {
        let mut checkpoints = auto_checkpoints(4);
        checkpoints.insert(2, checkpoint(50, false)); // old manual checkpoint
        let config = PruningConfig {
            max_checkpoints_per_workflow: 2,
            ..Default::default()
        };
        let pruned = select_prunable(&checkpoints, &config, Utc::now());
        // manual checkpoint exceeds both count and age rules but survives
        assert!(!pruned.contains(&checkpoints[2].id));
        // non-exempt overflow (index 3) is pruned; index 4 is oldest-exempt
        assert_eq!(pruned, vec![checkpoints[3].id]);
    }

    #[test]
    fn test_manual_pruned_when_preservation_disabled() {
        let checkpoints = vec![checkpoint(0, true), checkpoint(50, false), checkpoint(1, true)];
        let config = PruningConfig {
            preserve_manual_checkpoints: false,
            keep_first_checkpoint: true,
            ..Default::default()
        };
        let pruned = select_prunable(&checkpoints, &config, Utc::now());
        assert_eq!(pruned, vec![checkpoints[1].id]);
    }

    #[test]
    fn test_single_checkpoint_kept_first() {
        let checkpoints = vec![checkpoint(90, true)];
        let pruned = select_prunable(&checkpoints, &PruningConfig::default(), Utc::now());
        assert!(pruned.is_empty());
    }
}

//! The rolling-update math for MachineDeployment (spec.md 4.I).

use fleetctl_types::{IntOrString, RollingUpdateMachineDeployment};

#[derive(Debug, Clone)]
pub struct SetSize {
    pub name: String,
    /// Revision annotation; lower is older.
    pub revision: i64,
    pub replicas: i32,
    pub available: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurgeUnavailable {
    pub max_surge: i32,
    pub max_unavailable: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum RolloutError {
    #[error("resolving maxSurge/maxUnavailable against replica count: {0}")]
    IntOrString(#[from] fleetctl_types::IntOrStringError),
    #[error("strategy must set at least one of maxSurge, maxUnavailable above zero")]
    BothZero,
}

/// Resolves `maxSurge`/`maxUnavailable` against `desired` (spec.md 4.I:
/// "percentages round up for surge, down for unavailable; at least one of
/// them must be > 0").
pub fn resolve_surge_unavailable(
    desired: i32,
    strategy: &RollingUpdateMachineDeployment,
) -> Result<SurgeUnavailable, RolloutError> {
    let max_surge = strategy.max_surge.resolve(desired, true)?;
    let max_unavailable = strategy.max_unavailable.resolve(desired, false)?;
    if max_surge <= 0 && max_unavailable <= 0 {
        return Err(RolloutError::BothZero);
    }
    Ok(SurgeUnavailable {
        max_surge,
        max_unavailable,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RolloutPlan {
    pub new_set_scale_up: i32,
    /// `(set name, amount to reduce by)`, reductions only, always positive.
    pub old_set_scale_down: Vec<(String, i32)>,
}

/// Computes one reconcile's worth of rollout progress: how much to grow the
/// new set and how much to shrink each old set, given the current sizes
/// (spec.md 4.I steps 1-2). Scale-up and scale-down are mutually exclusive
/// within one reconcile: scaling old sets down while a scale-up is still
/// possible would shrink total capacity before the surge room it just freed
/// gets used, needlessly extending the rollout. A subsequent reconcile picks
/// up from whatever the writes in this one actually landed.
pub fn plan_rollout(
    desired: i32,
    surge_unavailable: SurgeUnavailable,
    new_set: &SetSize,
    old_sets: &[SetSize],
) -> RolloutPlan {
    let max_total = desired + surge_unavailable.max_surge;
    let old_total_replicas: i32 = old_sets.iter().map(|s| s.replicas).sum();
    let total_replicas = new_set.replicas + old_total_replicas;
    let room = (max_total - total_replicas).max(0);
    let new_set_room = (desired - new_set.replicas).max(0);
    let new_set_scale_up = room.min(new_set_room);

    let old_set_scale_down = if new_set_scale_up > 0 {
        Vec::new()
    } else {
        let min_available = desired - surge_unavailable.max_unavailable;
        let old_total_available: i32 = old_sets.iter().map(|s| s.available).sum();
        let total_available = new_set.available + old_total_available;
        let reducible = (total_available - min_available).max(0).min(old_total_replicas);
        distribute_reduction(old_sets, reducible)
    };

    RolloutPlan {
        new_set_scale_up,
        old_set_scale_down,
    }
}

/// Distributes `reducible` replicas of reduction across `old_sets`,
/// proportional to current size, with remainder units going to the
/// largest-and-oldest sets first (spec.md 4.I: "deleting from the
/// largest-and-oldest first").
fn distribute_reduction(old_sets: &[SetSize], reducible: i32) -> Vec<(String, i32)> {
    if reducible <= 0 || old_sets.is_empty() {
        return Vec::new();
    }
    let old_total: i32 = old_sets.iter().map(|s| s.replicas).sum();
    if old_total == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..old_sets.len()).collect();
    order.sort_by(|&a, &b| {
        old_sets[b]
            .replicas
            .cmp(&old_sets[a].replicas)
            .then_with(|| old_sets[a].revision.cmp(&old_sets[b].revision))
    });

    let mut shares = vec![0i32; old_sets.len()];
    let mut allocated = 0;
    for &idx in &order {
        let share = (i64::from(reducible) * i64::from(old_sets[idx].replicas) / i64::from(old_total)) as i32;
        let share = share.min(old_sets[idx].replicas);
        shares[idx] = share;
        allocated += share;
    }

    let mut remainder = reducible - allocated;
    for &idx in &order {
        if remainder <= 0 {
            break;
        }
        let room = old_sets[idx].replicas - shares[idx];
        let take = room.min(remainder);
        shares[idx] += take;
        remainder -= take;
    }

    old_sets
        .iter()
        .zip(shares)
        .filter(|(_, share)| *share > 0)
        .map(|(set, share)| (set.name.clone(), share))
        .collect()
}

/// Old machine sets with zero replicas, beyond the revision-history limit,
/// are reaped (spec.md 4.I step 3). Returns the names to delete, oldest
/// first.
pub fn sets_to_reap(old_sets: &[SetSize], revision_history_limit: i32) -> Vec<String> {
    let mut zeroed: Vec<&SetSize> = old_sets.iter().filter(|s| s.replicas == 0).collect();
    zeroed.sort_by_key(|s| s.revision);
    let keep = revision_history_limit.max(0) as usize;
    if zeroed.len() <= keep {
        return Vec::new();
    }
    zeroed[..zeroed.len() - keep]
        .iter()
        .map(|s| s.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy(surge: i32, unavailable: i32) -> RollingUpdateMachineDeployment {
        RollingUpdateMachineDeployment {
            max_surge: IntOrString::Int(surge),
            max_unavailable: IntOrString::Int(unavailable),
        }
    }

    #[test]
    fn both_zero_is_rejected() {
        let err = resolve_surge_unavailable(4, &strategy(0, 0)).unwrap_err();
        assert!(matches!(err, RolloutError::BothZero));
    }

    #[test]
    fn spec_scenario_rolling_update_first_reconcile_creates_one_new_machine() {
        // MachineDeployment{replicas:4, maxSurge:1, maxUnavailable:1} with a
        // brand new template: one reconcile creates a new set sized 1.
        let su = resolve_surge_unavailable(4, &strategy(1, 1)).unwrap();
        let new_set = SetSize {
            name: "new".into(),
            revision: 2,
            replicas: 0,
            available: 0,
        };
        let old_set = SetSize {
            name: "old".into(),
            revision: 1,
            replicas: 4,
            available: 4,
        };
        let plan = plan_rollout(4, su, &new_set, &[old_set]);
        assert_eq!(plan.new_set_scale_up, 1);
        assert!(plan.old_set_scale_down.is_empty());
    }

    #[test]
    fn spec_scenario_rolling_update_second_reconcile_scales_old_down_when_new_is_available() {
        let su = resolve_surge_unavailable(4, &strategy(1, 1)).unwrap();
        let new_set = SetSize {
            name: "new".into(),
            revision: 2,
            replicas: 1,
            available: 1,
        };
        let old_set = SetSize {
            name: "old".into(),
            revision: 1,
            replicas: 4,
            available: 4,
        };
        let plan = plan_rollout(4, su, &new_set, &[old_set]);
        assert_eq!(plan.new_set_scale_up, 0);
        // Scale-up is blocked (total replicas already at maxTotal=5), so
        // the full 2-unit surplus over minAvailable=3 is reclaimed from the
        // old set in this reconcile; the next reconcile uses the freed room
        // to grow the new set, converging toward new=4/old=0.
        assert_eq!(plan.old_set_scale_down, vec![("old".to_string(), 2)]);
    }

    #[test]
    fn reduction_distributes_proportionally_largest_oldest_first() {
        let sets = vec![
            SetSize {
                name: "a".into(),
                revision: 1,
                replicas: 6,
                available: 6,
            },
            SetSize {
                name: "b".into(),
                revision: 2,
                replicas: 4,
                available: 4,
            },
        ];
        let reduction = distribute_reduction(&sets, 5);
        let total: i32 = reduction.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 5);
        // "a" is both larger and older, so it gets the remainder unit.
        assert_eq!(reduction[0], ("a".to_string(), 3));
    }

    #[test]
    fn reaps_zeroed_sets_beyond_history_limit() {
        let sets = vec![
            SetSize { name: "r1".into(), revision: 1, replicas: 0, available: 0 },
            SetSize { name: "r2".into(), revision: 2, replicas: 0, available: 0 },
            SetSize { name: "r3".into(), revision: 3, replicas: 0, available: 0 },
        ];
        let reaped = sets_to_reap(&sets, 1);
        assert_eq!(reaped, vec!["r1".to_string(), "r2".to_string()]);
    }

    #[test]
    fn non_zero_sets_are_never_reaped() {
        let sets = vec![SetSize { name: "r1".into(), revision: 1, replicas: 2, available: 2 }];
        assert!(sets_to_reap(&sets, 0).is_empty());
    }
}

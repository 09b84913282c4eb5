//! Delete-priority scoring for MachineSet scale-down (spec.md 4.H).
//!
//! Each policy maps a machine to a score; scale-down sorts descending by
//! score and deletes the first `k`. In every policy a machine that must be
//! deleted (deletion timestamp set, annotated for delete, or carrying a
//! terminal error) scores above anything a policy itself computes.

use chrono::{DateTime, Utc};
use fleetctl_types::DeletePriority;

/// Annotation marking a machine for preferential deletion, independent of
/// policy (spec.md 4.H: "as does an annotated-for-delete machine").
pub const ANNOTATION_DELETE_MACHINE: &str = "fleetctl.io/delete-machine";

/// Ten days, the saturation constant in the `Oldest` policy's formula
/// (spec.md 4.H).
const OLDEST_SATURATION_SECONDS: f64 = 864_000.0;

/// Above any score a policy computes, so must-delete machines always sort
/// first.
const MUST_DELETE_SCORE: f64 = 1_000.0;

/// Above the `Newest` policy's 0-100 range, so "no node ref yet" always
/// outranks machines that have joined, within the `Default` policy.
const NO_NODE_REF_BASE_SCORE: f64 = 200.0;

#[derive(Debug, Clone)]
pub struct ScoringInput {
    pub uid: String,
    pub creation_timestamp: DateTime<Utc>,
    pub must_delete: bool,
    pub has_node_ref: bool,
}

fn age_seconds(created: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    now.signed_duration_since(created)
        .num_milliseconds()
        .max(0) as f64
        / 1000.0
}

fn newest_score(created: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    100.0 * (-age_seconds(created, now) / OLDEST_SATURATION_SECONDS).exp()
}

fn oldest_score(created: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    100.0 * (1.0 - (-age_seconds(created, now) / OLDEST_SATURATION_SECONDS).exp())
}

pub fn score(policy: DeletePriority, input: &ScoringInput, now: DateTime<Utc>) -> f64 {
    if input.must_delete {
        return MUST_DELETE_SCORE;
    }
    match policy {
        DeletePriority::Random => 20.0,
        DeletePriority::Newest => newest_score(input.creation_timestamp, now),
        DeletePriority::Oldest => oldest_score(input.creation_timestamp, now),
        DeletePriority::Default => {
            if input.has_node_ref {
                newest_score(input.creation_timestamp, now)
            } else {
                NO_NODE_REF_BASE_SCORE + newest_score(input.creation_timestamp, now)
            }
        }
    }
}

/// Ranks `machines` descending by score, breaking ties by UID so the
/// ordering is total and deterministic (spec.md 8, "Delete-priority
/// totality").
pub fn rank(policy: DeletePriority, machines: &[ScoringInput], now: DateTime<Utc>) -> Vec<String> {
    let mut scored: Vec<(f64, &str)> = machines
        .iter()
        .map(|m| (score(policy, m, now), m.uid.as_str()))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap().then_with(|| a.1.cmp(b.1)));
    scored.into_iter().map(|(_, uid)| uid.to_string()).collect()
}

/// The first `k` UIDs to delete under `policy`.
pub fn select_for_delete(policy: DeletePriority, machines: &[ScoringInput], k: usize, now: DateTime<Utc>) -> Vec<String> {
    rank(policy, machines, now).into_iter().take(k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn aged(uid: &str, age_days: i64, now: DateTime<Utc>) -> ScoringInput {
        ScoringInput {
            uid: uid.into(),
            creation_timestamp: now - Duration::days(age_days),
            must_delete: false,
            has_node_ref: true,
        }
    }

    #[test]
    fn must_delete_always_sorts_first() {
        let now = Utc::now();
        let mut fresh = aged("fresh", 0, now);
        fresh.must_delete = true;
        let old = aged("old", 30, now);
        let ranked = rank(DeletePriority::Oldest, &[old, fresh], now);
        assert_eq!(ranked[0], "fresh");
    }

    #[test]
    fn oldest_policy_deletes_30d_then_10d_for_the_spec_scenario() {
        let now = Utc::now();
        let machines = vec![
            aged("1d", 1, now),
            aged("5d", 5, now),
            aged("10d", 10, now),
            aged("30d", 30, now),
        ];
        let chosen = select_for_delete(DeletePriority::Oldest, &machines, 2, now);
        assert_eq!(chosen, vec!["30d".to_string(), "10d".to_string()]);
    }

    #[test]
    fn newest_policy_prefers_the_youngest_machine() {
        let now = Utc::now();
        let machines = vec![aged("1d", 1, now), aged("30d", 30, now)];
        let chosen = select_for_delete(DeletePriority::Newest, &machines, 1, now);
        assert_eq!(chosen, vec!["1d".to_string()]);
    }

    #[test]
    fn default_policy_prefers_machines_without_a_node_ref() {
        let now = Utc::now();
        let mut no_node = aged("no-node", 1, now);
        no_node.has_node_ref = false;
        let with_node = aged("with-node", 30, now);
        let chosen = select_for_delete(DeletePriority::Default, &[with_node, no_node], 1, now);
        assert_eq!(chosen, vec!["no-node".to_string()]);
    }

    #[test]
    fn ties_are_broken_deterministically_by_uid() {
        let now = Utc::now();
        let a = aged("a", 5, now);
        let b = aged("b", 5, now);
        let first = rank(DeletePriority::Newest, &[b.clone(), a.clone()], now);
        let second = rank(DeletePriority::Newest, &[a, b], now);
        assert_eq!(first, second);
        assert_eq!(first[0], "a");
    }
}

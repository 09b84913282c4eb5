//! Status maintenance for MachineSet (spec.md 4.H): "publish observed
//! replicas, ready (node reference present and node condition Ready),
//! available (ready for >= minReadySeconds), fully-labeled (all template
//! labels present on machine)."

use chrono::{DateTime, Utc};
use fleetctl_types::{Machine, MachineSetStatus};
use std::collections::BTreeMap;

/// One owned machine plus whether its node currently reports Ready -- a
/// fact this crate cannot compute itself (it depends on the node cache), so
/// callers supply it alongside the machine.
pub struct OwnedMachine<'a> {
    pub machine: &'a Machine,
    pub node_ready: bool,
}

fn is_fully_labeled(machine: &Machine, template_labels: &BTreeMap<String, String>) -> bool {
    template_labels
        .iter()
        .all(|(k, v)| machine.metadata.labels.get(k) == Some(v))
}

fn is_ready(owned: &OwnedMachine<'_>) -> bool {
    owned.machine.status.node_ref.is_some() && owned.node_ready
}

/// A machine counts as available once it has been ready for at least
/// `min_ready_seconds`. `status.last_updated` is used as the proxy for "time
/// the machine became ready" (this crate does not track a separate
/// ready-since timestamp).
fn is_available(owned: &OwnedMachine<'_>, min_ready_seconds: i32, now: DateTime<Utc>) -> bool {
    if !is_ready(owned) {
        return false;
    }
    match owned.machine.status.last_updated {
        Some(last_updated) => {
            let ready_duration = now.signed_duration_since(last_updated);
            ready_duration.num_seconds() >= i64::from(min_ready_seconds)
        }
        None => min_ready_seconds == 0,
    }
}

pub struct ComputedStatus {
    pub status: MachineSetStatus,
    /// True when `ready > available` and `minReadySeconds > 0`: the caller
    /// should requeue after `minReadySeconds` as a clock-skew defence
    /// (spec.md 4.H).
    pub requeue_for_clock_skew: bool,
}

pub fn compute_status(
    owned: &[OwnedMachine<'_>],
    template_labels: &BTreeMap<String, String>,
    min_ready_seconds: i32,
    generation: i64,
    now: DateTime<Utc>,
) -> ComputedStatus {
    let replicas = owned.len() as i32;
    let ready_replicas = owned.iter().filter(|o| is_ready(o)).count() as i32;
    let available_replicas = owned
        .iter()
        .filter(|o| is_available(o, min_ready_seconds, now))
        .count() as i32;
    let fully_labeled_replicas = owned
        .iter()
        .filter(|o| is_fully_labeled(o.machine, template_labels))
        .count() as i32;

    let status = MachineSetStatus {
        replicas,
        ready_replicas,
        available_replicas,
        fully_labeled_replicas,
        observed_generation: generation,
    };

    let requeue_for_clock_skew = min_ready_seconds > 0 && ready_replicas > available_replicas;

    ComputedStatus {
        status,
        requeue_for_clock_skew,
    }
}

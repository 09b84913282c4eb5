//! The MachineSet reconciler (spec.md 4.H).

use std::time::Duration;

use chrono::Utc;
use fleetctl_runtime::{ObjectStore, ReconcileOutcome};
use fleetctl_types::{EventSeverity, InvolvedObject, MachineSet, ObjectKey};
use futures::future::join_all;
use tracing::info;

use crate::delete_priority::{select_for_delete, ScoringInput, ANNOTATION_DELETE_MACHINE};
use crate::error::Result;
use crate::machineset_env::MachineSetEnvironment;
use crate::machineset_partition::partition;
use crate::machineset_status::{compute_status, OwnedMachine};

const DEFAULT_REQUEUE: Duration = Duration::from_secs(5);

fn set_involved(set: &MachineSet) -> InvolvedObject {
    InvolvedObject::new("MachineSet", set.metadata.namespace.clone(), set.metadata.name.clone(), set.metadata.uid.clone())
}

pub async fn reconcile<S, E>(store: &S, env: &E, set: MachineSet) -> Result<ReconcileOutcome>
where
    S: ObjectStore<MachineSet> + ObjectStore<fleetctl_types::Machine>,
    E: MachineSetEnvironment,
{
    let candidates =
        ObjectStore::<fleetctl_types::Machine>::list(store, &set.metadata.namespace, &Default::default())
            .await?;
    let part = partition(&set.metadata.name, &set.spec.selector, &candidates);

    for orphan in &part.orphans {
        env.adopt(orphan, &set).await?;
    }

    let mut owned = part.owned;
    owned.extend(part.orphans);

    let desired = set.spec.replicas.max(0) as usize;

    if owned.len() < desired {
        let to_create = desired - owned.len();
        info!(set = %set.metadata.name, to_create, "scaling up");
        for _ in 0..to_create {
            let created = env.create_from_template(&set).await?;
            env.wait_observable(&created).await;
        }
        env.record_event(set_involved(&set), "ScalingUp", &format!("creating {to_create} machine(s)"), EventSeverity::Normal)
            .await?;
        return Ok(ReconcileOutcome::RequeueAfter(DEFAULT_REQUEUE));
    }

    if owned.len() > desired {
        let to_delete = owned.len() - desired;
        let now = Utc::now();
        let scoring: Vec<ScoringInput> = owned
            .iter()
            .map(|m| ScoringInput {
                uid: m.metadata.uid.clone(),
                creation_timestamp: m.metadata.creation_timestamp,
                must_delete: m.metadata.is_being_deleted()
                    || m.metadata.annotations.contains_key(ANNOTATION_DELETE_MACHINE)
                    || m.status.has_terminal_error(),
                has_node_ref: m.status.node_ref.is_some(),
            })
            .collect();
        let chosen_uids = select_for_delete(set.spec.delete_priority, &scoring, to_delete, now);
        let to_delete: Vec<_> = owned
            .iter()
            .filter(|m| chosen_uids.contains(&m.metadata.uid))
            .collect();

        info!(set = %set.metadata.name, count = to_delete.len(), "scaling down");
        let deleted = to_delete.len();
        join_all(to_delete.iter().map(|m| env.delete_machine(m))).await;
        join_all(to_delete.iter().map(|m| env.wait_deleted(m))).await;
        env.record_event(set_involved(&set), "ScalingDown", &format!("deleting {deleted} machine(s)"), EventSeverity::Normal)
            .await?;
        return Ok(ReconcileOutcome::RequeueAfter(DEFAULT_REQUEUE));
    }

    let mut node_ready_results = Vec::with_capacity(owned.len());
    for machine in &owned {
        node_ready_results.push(env.node_ready(machine).await);
    }
    let owned_with_ready: Vec<OwnedMachine<'_>> = owned
        .iter()
        .zip(node_ready_results)
        .map(|(machine, node_ready)| OwnedMachine { machine, node_ready })
        .collect();

    let computed = compute_status(
        &owned_with_ready,
        &set.spec.template.labels,
        set.spec.min_ready_seconds,
        set.metadata.generation,
        Utc::now(),
    );

    let mut updated = set.clone();
    updated.status = computed.status;
    ObjectStore::<MachineSet>::update_status(store, updated.clone()).await?;

    if updated.status.observed_generation < updated.metadata.generation || computed.requeue_for_clock_skew {
        let delay = if computed.requeue_for_clock_skew {
            Duration::from_secs(set.spec.min_ready_seconds.max(0) as u64)
        } else {
            DEFAULT_REQUEUE
        };
        return Ok(ReconcileOutcome::RequeueAfter(delay));
    }

    Ok(ReconcileOutcome::Done)
}

#[allow(dead_code)]
fn key_of(set: &MachineSet) -> ObjectKey {
    ObjectKey::new(set.metadata.namespace.clone(), set.metadata.name.clone())
}

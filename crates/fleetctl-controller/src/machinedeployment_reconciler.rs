//! The MachineDeployment reconciler (spec.md 4.I).

use std::time::Duration;

use chrono::Utc;
use fleetctl_runtime::{ObjectStore, ReconcileOutcome};
use fleetctl_types::conditions::{find_condition, set_condition};
use fleetctl_types::{Condition, ConditionStatus, ConditionType, EventSeverity, InvolvedObject, MachineDeployment, MachineSet};
use tracing::info;

use crate::error::Result;
use crate::machinedeployment_env::MachineDeploymentEnvironment;
use crate::machinedeployment_support::{find_new_set, next_revision, pod_template_hash};
use crate::rolling_update::{plan_rollout, resolve_surge_unavailable, sets_to_reap, SetSize};

const DEFAULT_REQUEUE: Duration = Duration::from_secs(5);

const MACHINE_DEPLOYMENT_KIND: &str = "MachineDeployment";

fn deployment_involved(deployment: &MachineDeployment) -> InvolvedObject {
    InvolvedObject::new(
        MACHINE_DEPLOYMENT_KIND,
        deployment.metadata.namespace.clone(),
        deployment.metadata.name.clone(),
        deployment.metadata.uid.clone(),
    )
}

fn partition_sets(
    deployment_name: &str,
    selector: &fleetctl_types::LabelSelector,
    candidates: &[MachineSet],
) -> (Vec<MachineSet>, Vec<MachineSet>) {
    let mut owned = Vec::new();
    let mut orphans = Vec::new();
    for set in candidates {
        if !selector.matches(&set.metadata.labels) {
            continue;
        }
        match set.metadata.controller_ref() {
            Some(owner) if owner.kind == MACHINE_DEPLOYMENT_KIND && owner.name == deployment_name => {
                owned.push(set.clone());
            }
            Some(_) => {}
            None => orphans.push(set.clone()),
        }
    }
    (owned, orphans)
}

fn set_size(set: &MachineSet) -> SetSize {
    SetSize {
        name: set.metadata.name.clone(),
        revision: set
            .metadata
            .annotations
            .get(crate::machinedeployment_support::REVISION_ANNOTATION)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        replicas: set.status.replicas,
        available: set.status.available_replicas,
    }
}

pub async fn reconcile<S, E>(store: &S, env: &E, deployment: MachineDeployment) -> Result<ReconcileOutcome>
where
    S: ObjectStore<MachineDeployment> + ObjectStore<MachineSet>,
    E: MachineDeploymentEnvironment,
{
    if deployment.metadata.is_being_deleted() {
        // Foreground-deletion of children is the store's job once the
        // last finalizer clears; nothing active to do here (spec.md 4.I).
        return Ok(ReconcileOutcome::Done);
    }

    if !deployment
        .spec
        .selector
        .matches(&deployment.spec.template.labels)
    {
        tracing::warn!(
            deployment = %deployment.metadata.name,
            "selector does not match template labels, fatal validation failure"
        );
        return Ok(ReconcileOutcome::Done);
    }

    let candidates =
        ObjectStore::<MachineSet>::list(store, &deployment.metadata.namespace, &Default::default()).await?;
    let (mut owned, orphans) = partition_sets(&deployment.metadata.name, &deployment.spec.selector, &candidates);

    for orphan in &orphans {
        env.adopt(orphan, &deployment).await?;
    }
    owned.extend(orphans);

    let new_set = match find_new_set(&deployment.spec.template, &owned) {
        Some(set) => set.clone(),
        None => {
            let revision = next_revision(&owned);
            let hash = pod_template_hash(&deployment.spec.template);
            let created = env
                .create_set(&deployment, &deployment.spec.template, revision, &hash)
                .await?;
            info!(deployment = %deployment.metadata.name, set = %created.metadata.name, revision, "created new machine set");
            env.record_event(
                deployment_involved(&deployment),
                "NewMachineSetCreated",
                &format!("created machine set {} for revision {revision}", created.metadata.name),
                EventSeverity::Normal,
            )
            .await?;
            owned.push(created.clone());
            created
        }
    };

    let old_sets: Vec<MachineSet> = owned
        .iter()
        .filter(|s| s.metadata.name != new_set.metadata.name)
        .cloned()
        .collect();

    if deployment.spec.paused {
        return Ok(ReconcileOutcome::Done);
    }

    let surge_unavailable = resolve_surge_unavailable(deployment.spec.replicas, &strategy(&deployment))?;
    let new_set_size = set_size(&new_set);
    let old_set_sizes: Vec<SetSize> = old_sets.iter().map(set_size).collect();
    let plan = plan_rollout(deployment.spec.replicas, surge_unavailable, &new_set_size, &old_set_sizes);

    if plan.new_set_scale_up > 0 {
        env.scale_set(&new_set, new_set.spec.replicas + plan.new_set_scale_up)
            .await?;
    }
    for (name, amount) in &plan.old_set_scale_down {
        if let Some(set) = old_sets.iter().find(|s| &s.metadata.name == name) {
            env.scale_set(set, set.spec.replicas - amount).await?;
        }
    }

    let reap_names = sets_to_reap(&old_set_sizes, deployment.spec.revision_history_limit);
    for name in &reap_names {
        if let Some(set) = old_sets.iter().find(|s| &s.metadata.name == name) {
            env.delete_set(set).await?;
        }
    }

    let total_replicas: i32 = new_set.status.replicas + old_set_sizes.iter().map(|s| s.replicas).sum::<i32>();
    let total_available: i32 = new_set.status.available_replicas + old_set_sizes.iter().map(|s| s.available).sum::<i32>();
    let progressing = plan.new_set_scale_up > 0 || !plan.old_set_scale_down.is_empty();

    let prior_progressing = find_condition(&deployment.status.conditions, ConditionType::Progressing)
        .filter(|c| c.status == ConditionStatus::True)
        .map(|c| c.last_transition_time);

    let mut updated = deployment.clone();
    updated.status.replicas = total_replicas;
    updated.status.available_replicas = total_available;
    updated.status.updated_replicas = new_set.status.replicas;
    updated.status.observed_generation = deployment.metadata.generation;

    let deadline_exceeded = prior_progressing
        .map(|since| {
            Utc::now().signed_duration_since(since).num_seconds()
                >= i64::from(deployment.spec.progress_deadline_seconds)
        })
        .unwrap_or(false);

    let condition = if deadline_exceeded && progressing {
        Condition::new(
            ConditionType::Progressing,
            ConditionStatus::False,
            "ProgressDeadlineExceeded",
            "rollout has not progressed within progressDeadlineSeconds",
        )
    } else if progressing {
        Condition::new(ConditionType::Progressing, ConditionStatus::True, "RolloutInProgress", "rollout is progressing")
    } else if total_available >= deployment.spec.replicas {
        Condition::new(ConditionType::Available, ConditionStatus::True, "MinimumReplicasAvailable", "deployment has minimum availability")
    } else {
        Condition::new(ConditionType::Progressing, ConditionStatus::Unknown, "Waiting", "waiting for availability")
    };
    let newly_deadline_exceeded = deadline_exceeded
        && find_condition(&deployment.status.conditions, ConditionType::Progressing)
            .map(|c| c.reason != "ProgressDeadlineExceeded")
            .unwrap_or(true);
    set_condition(&mut updated.status.conditions, condition);

    ObjectStore::<MachineDeployment>::update_status(store, updated).await?;

    if newly_deadline_exceeded {
        env.record_event(
            deployment_involved(&deployment),
            "ProgressDeadlineExceeded",
            "rollout has not progressed within progressDeadlineSeconds",
            EventSeverity::Warning,
        )
        .await?;
    }

    if progressing && !deadline_exceeded {
        Ok(ReconcileOutcome::RequeueAfter(DEFAULT_REQUEUE))
    } else {
        Ok(ReconcileOutcome::Done)
    }
}

fn strategy(deployment: &MachineDeployment) -> fleetctl_types::RollingUpdateMachineDeployment {
    match &deployment.spec.strategy {
        fleetctl_types::MachineDeploymentStrategy::RollingUpdate { rolling_update } => rolling_update.clone(),
    }
}

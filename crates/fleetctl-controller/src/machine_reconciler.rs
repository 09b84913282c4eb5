//! The Machine reconciler (spec.md 4.G): the state machine driven by
//! [`crate::machine_state::determine_state`], dispatching to the
//! collaborator surface in [`crate::machine_env::MachineEnvironment`].

use std::time::Duration;

use chrono::Utc;
use fleetctl_provider::ProviderError;
use fleetctl_runtime::{ObjectStore, ReconcileOutcome, StoreObject, DEFAULT_REQUEUE_DELAY};
use fleetctl_types::conditions::set_condition;
use fleetctl_types::{
    Condition, ConditionStatus, ConditionType, EventSeverity, InvolvedObject, Machine, MachineError, MachineErrorReason, NodeRef,
    FINALIZER_DELETE_NODE,
};
use tracing::{info, warn};

use crate::error::Result;
use crate::machine_env::MachineEnvironment;
use crate::machine_state::{determine_state, MachineState};
use crate::node_adoption::match_node;

fn machine_involved(machine: &Machine) -> InvolvedObject {
    InvolvedObject::new("Machine", machine.metadata.namespace.clone(), machine.metadata.name.clone(), machine.metadata.uid.clone())
}

/// Marks that eviction has been confirmed complete for this machine's
/// deletion, so S4 does not re-invoke eviction after a restart (spec.md
/// 4.G S4.1: "tracked by annotation").
pub const EVICTION_CONFIRMED_ANNOTATION: &str = "fleetctl.io/eviction-confirmed-done";

/// Larger back-off applied while waiting on conditions outside this
/// process's control (node not yet joined, disruption budget blocking
/// eviction) -- the "Eventual" class in spec.md 7.
pub const EVENTUAL_REQUEUE_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct MachineReconcilerConfig {
    pub requeue_delay: Duration,
    /// `None` disables the timeout; the machine waits for a join
    /// indefinitely (spec.md 4.G S2).
    pub join_cluster_timeout: Option<Duration>,
}

impl Default for MachineReconcilerConfig {
    fn default() -> Self {
        Self {
            requeue_delay: DEFAULT_REQUEUE_DELAY,
            join_cluster_timeout: Some(Duration::from_secs(15 * 60)),
        }
    }
}

pub async fn reconcile<S, E>(
    store: &S,
    env: &E,
    config: &MachineReconcilerConfig,
    mut machine: Machine,
) -> Result<ReconcileOutcome>
where
    S: ObjectStore<Machine>,
    E: MachineEnvironment,
{
    match determine_state(&machine) {
        MachineState::New => reconcile_new(store, env, config, &mut machine).await,
        MachineState::Provisioning => reconcile_provisioning(store, env, config, &mut machine).await,
        MachineState::AwaitingJoin => reconcile_awaiting_join(store, env, config, &mut machine).await,
        MachineState::Running => reconcile_running(env, &machine).await,
        MachineState::Deleting => reconcile_deleting(store, env, config, &mut machine).await,
    }
}

async fn reconcile_new<S, E>(
    store: &S,
    env: &E,
    config: &MachineReconcilerConfig,
    machine: &mut Machine,
) -> Result<ReconcileOutcome>
where
    S: ObjectStore<Machine>,
    E: MachineEnvironment,
{
    if machine.metadata.add_finalizer(FINALIZER_DELETE_NODE) {
        store.update(machine.clone()).await?;
        return Ok(ReconcileOutcome::RequeueAfter(config.requeue_delay));
    }

    if let Err(failure) = env.validate_spec(machine).await {
        persist_terminal_error(store, machine, failure.reason, failure.message.clone()).await?;
        env.record_event(machine_involved(machine), "InvalidSpec", &failure.message, EventSeverity::Warning)
            .await?;
        return Ok(ReconcileOutcome::Terminal(failure.reason, failure.message));
    }

    Ok(ReconcileOutcome::RequeueAfter(config.requeue_delay))
}

async fn reconcile_provisioning<S, E>(
    store: &S,
    env: &E,
    config: &MachineReconcilerConfig,
    machine: &mut Machine,
) -> Result<ReconcileOutcome>
where
    S: ObjectStore<Machine>,
    E: MachineEnvironment,
{
    let instance = match env.provider_get(machine).await {
        Ok(Some(instance)) => instance,
        Ok(None) => match env.provider_create(machine).await {
            Ok(instance) => instance,
            Err(err) => return Ok(classify_provider_error(store, env, machine, err).await?),
        },
        Err(err) => return Ok(classify_provider_error(store, env, machine, err).await?),
    };

    machine.status.provider_instance_id = Some(instance.provider_id.clone());
    machine.status.addresses = instance.addresses;
    machine.status.observed_generation = machine.metadata.generation;
    machine.status.last_updated = Some(Utc::now());
    set_condition(
        &mut machine.status.conditions,
        Condition::new(ConditionType::Provisioned, ConditionStatus::True, "InstanceRunning", format!("provider instance {} is running", instance.provider_id)),
    );
    store.update_status(machine.clone()).await?;
    env.record_event(
        machine_involved(machine),
        "Provisioned",
        &format!("provider instance {} is running", instance.provider_id),
        EventSeverity::Normal,
    )
    .await?;
    Ok(ReconcileOutcome::RequeueAfter(config.requeue_delay))
}

async fn reconcile_awaiting_join<S, E>(
    store: &S,
    env: &E,
    config: &MachineReconcilerConfig,
    machine: &mut Machine,
) -> Result<ReconcileOutcome>
where
    S: ObjectStore<Machine>,
    E: MachineEnvironment,
{
    let candidates = env.list_join_candidates(machine).await?;
    let provider_id = machine.status.provider_instance_id.as_deref();
    let matched = match_node(provider_id, &machine.status.addresses, &candidates);

    if let Some(node) = matched {
        env.apply_node_metadata(machine, &node.name).await?;
        machine.status.node_ref = Some(NodeRef {
            name: node.name.clone(),
            uid: node.uid.clone(),
        });
        machine.status.last_updated = Some(Utc::now());
        set_condition(
            &mut machine.status.conditions,
            Condition::new(ConditionType::NodeHealthy, ConditionStatus::True, "NodeJoined", format!("joined node {}", node.name)),
        );
        store.update_status(machine.clone()).await?;
        info!(machine = %machine.metadata.name, node = %node.name, "machine joined node");
        env.record_event(machine_involved(machine), "NodeJoined", &format!("joined node {}", node.name), EventSeverity::Normal)
            .await?;
        return Ok(ReconcileOutcome::RequeueAfter(config.requeue_delay));
    }

    if let Some(timeout) = config.join_cluster_timeout {
        let waited = Utc::now().signed_duration_since(machine.metadata.creation_timestamp);
        if waited.to_std().map(|w| w >= timeout).unwrap_or(false) {
            let reason = MachineErrorReason::CreateFailed;
            let message = "machine did not join the cluster within the configured timeout".to_string();
            set_condition(
                &mut machine.status.conditions,
                Condition::new(ConditionType::NodeHealthy, ConditionStatus::False, "JoinTimeout", message.clone()),
            );
            persist_terminal_error(store, machine, reason, message.clone()).await?;
            env.record_event(machine_involved(machine), "JoinTimeout", &message, EventSeverity::Warning).await?;
            return Ok(ReconcileOutcome::Terminal(reason, message));
        }
    }

    Ok(ReconcileOutcome::RequeueAfter(EVENTUAL_REQUEUE_DELAY))
}

async fn reconcile_running<E: MachineEnvironment>(env: &E, machine: &Machine) -> Result<ReconcileOutcome> {
    if let Some(node_ref) = &machine.status.node_ref {
        env.apply_node_metadata(machine, &node_ref.name).await?;
    }
    Ok(ReconcileOutcome::Done)
}

async fn reconcile_deleting<S, E>(
    store: &S,
    env: &E,
    config: &MachineReconcilerConfig,
    machine: &mut Machine,
) -> Result<ReconcileOutcome>
where
    S: ObjectStore<Machine>,
    E: MachineEnvironment,
{
    if let Some(node_ref) = machine.status.node_ref.clone() {
        if !machine
            .metadata
            .annotations
            .contains_key(EVICTION_CONFIRMED_ANNOTATION)
        {
            let done = env.drain_node(machine, &node_ref.name).await?;
            if !done {
                return Ok(ReconcileOutcome::RequeueAfter(EVENTUAL_REQUEUE_DELAY));
            }
            machine
                .metadata
                .annotations
                .insert(EVICTION_CONFIRMED_ANNOTATION.to_string(), "true".to_string());
            store.update(machine.clone()).await?;
        }
    }

    match env.provider_cleanup(machine).await {
        Ok(true) => {}
        Ok(false) => return Ok(ReconcileOutcome::RequeueAfter(config.requeue_delay)),
        Err(err) => return Ok(classify_provider_error(store, env, machine, err).await?),
    }

    if let Some(node_ref) = &machine.status.node_ref {
        env.delete_node(&node_ref.name).await?;
    }

    machine.metadata.remove_finalizer(FINALIZER_DELETE_NODE);
    store.update(machine.clone()).await?;
    info!(machine = %machine.metadata.name, "machine fully deprovisioned");
    env.record_event(machine_involved(machine), "Deprovisioned", "instance and node cleaned up", EventSeverity::Normal)
        .await?;
    Ok(ReconcileOutcome::Done)
}

async fn classify_provider_error<S: ObjectStore<Machine>, E: MachineEnvironment>(
    store: &S,
    env: &E,
    machine: &mut Machine,
    err: ProviderError,
) -> Result<ReconcileOutcome> {
    match err.terminal_reason() {
        Some(reason) => {
            let message = err.to_string();
            set_condition(
                &mut machine.status.conditions,
                Condition::new(ConditionType::Provisioned, ConditionStatus::False, format!("{reason:?}"), message.clone()),
            );
            persist_terminal_error(store, machine, reason, message.clone()).await?;
            env.record_event(machine_involved(machine), "ProvisionFailed", &message, EventSeverity::Warning).await?;
            Ok(ReconcileOutcome::Terminal(reason, message))
        }
        None => {
            warn!(machine = %machine.metadata.name, error = %err, "transient provider error");
            Ok(ReconcileOutcome::RequeueAfter(DEFAULT_REQUEUE_DELAY))
        }
    }
}

async fn persist_terminal_error<S: ObjectStore<Machine>>(
    store: &S,
    machine: &mut Machine,
    reason: MachineErrorReason,
    message: String,
) -> Result<()> {
    machine.status.error = Some(MachineError { reason, message });
    machine.status.last_updated = Some(Utc::now());
    store.update_status(machine.clone()).await?;
    Ok(())
}

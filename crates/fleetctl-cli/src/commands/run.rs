//! The controller-manager's main loop: load configuration, wire the object
//! stores and collaborator environment, run the three reconcilers under
//! leader election, and serve health/metrics until shutdown (spec.md §6).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use fleetctl_config::FleetctlConfig;
use fleetctl_controller::{machine_reconciler, machinedeployment_reconciler, machineset_reconciler};
use fleetctl_csr::CertificateSigningRequest;
use fleetctl_runtime::{
    spawn_workers, BackoffConfig, ElectionTimings, Identity, InMemoryLeaseStore, InMemoryStore, Metrics, ObjectStore,
    StoreObject, WorkQueue,
};
use fleetctl_types::{Machine, MachineDeployment, MachineSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::environment::Environment;
use crate::health::{serve_health, serve_metrics, ReadinessFlag};

/// Re-lists every object of kind `T` on `resync_period` and enqueues its
/// key, the CLI binary's stand-in for the watch-fed reflector/cache path
/// `fleetctl-runtime` implements for a real cluster API client (spec.md
/// 4.A describes both; only the periodic-resync half is wired here since
/// the in-memory store has no network watch to disconnect from).
async fn resync_loop<T: StoreObject + Clone>(store: InMemoryStore<T>, queue: WorkQueue, resync_period: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(resync_period);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                match store.list("", &Default::default()).await {
                    Ok(items) => {
                        for item in items {
                            queue.add(item.key()).await;
                        }
                    }
                    Err(e) => warn!(error = %e, "resync list failed"),
                }
            }
        }
    }
}

/// Periodically republishes the `machines`/`nodes` gauges from the current
/// store contents (spec.md 6 observability).
async fn metrics_loop(machines: InMemoryStore<Machine>, metrics: Arc<Metrics>, period: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {
                if let Ok(items) = machines.list("", &Default::default()).await {
                    metrics.machines.set(items.len() as i64);
                    let joined = items.iter().filter(|m| m.status.node_ref.is_some()).count();
                    metrics.nodes.set(joined as i64);
                }
            }
        }
    }
}

pub async fn run(config: FleetctlConfig) -> Result<()> {
    let metrics = Arc::new(Metrics::new());
    let shutdown = CancellationToken::new();
    let readiness = ReadinessFlag::default();

    let machines = InMemoryStore::<Machine>::new();
    let machine_sets = InMemoryStore::<MachineSet>::new();
    let machine_deployments = InMemoryStore::<MachineDeployment>::new();
    let csrs = InMemoryStore::<CertificateSigningRequest>::new();

    let cluster_name = "fleetctl".to_string();
    let cluster_server = config.store.master.clone().unwrap_or_else(|| "https://localhost:6443".to_string());
    let env = Arc::new(Environment::new(
        machines.clone(),
        machine_sets.clone(),
        machine_deployments.clone(),
        config.to_node_settings(),
        cluster_name,
        cluster_server,
        Duration::from_secs(config.lifecycle.skip_eviction_timeout_secs),
    ));

    let health_addr: SocketAddr = config
        .observability
        .health_listen_address
        .parse()
        .context("parsing health-probe listen address")?;
    let metrics_addr: SocketAddr = config
        .observability
        .metrics_listen_address
        .parse()
        .context("parsing metrics listen address")?;

    let health_task = tokio::spawn(serve_health(health_addr, readiness.clone(), shutdown.clone()));
    let metrics_task = tokio::spawn(serve_metrics(metrics_addr, metrics.clone(), shutdown.clone()));
    let metrics_loop_task = tokio::spawn(metrics_loop(machines.clone(), metrics.clone(), Duration::from_secs(15), shutdown.clone()));

    let work = {
        let env = env.clone();
        let machines = machines.clone();
        let machine_sets = machine_sets.clone();
        let machine_deployments = machine_deployments.clone();
        let csrs = csrs.clone();
        let metrics = metrics.clone();
        let pools = config.worker_pools;
        let lifecycle = config.lifecycle;
        let shutdown = shutdown.clone();
        let resync_period = Duration::from_secs(300);
        move || spawn_reconcilers(env, machines, machine_sets, machine_deployments, csrs, metrics, pools, lifecycle, resync_period, shutdown)
    };

    let mut worker_handles: Vec<tokio::task::JoinHandle<()>> = Vec::new();
    if config.leader_election.enabled {
        let identity = Identity::generate(&hostname());
        let lease_name = fleetctl_runtime::election::lease_name("fleetctl-controller-manager", config.leader_election.worker_class.as_deref());
        let lease_store = InMemoryLeaseStore::default();
        let election_root = shutdown.clone();
        let acquired_handles: Arc<std::sync::Mutex<Option<Vec<tokio::task::JoinHandle<()>>>>> = Arc::new(std::sync::Mutex::new(None));
        let on_acquired_handles = acquired_handles.clone();
        tokio::spawn(fleetctl_runtime::election::run_until_cancelled(
            lease_store,
            lease_name,
            identity,
            ElectionTimings::default(),
            election_root,
            move || {
                info!("became leader, starting reconcile workers");
                *on_acquired_handles.lock().expect("lock poisoned") = Some(work());
            },
            || {
                warn!("lost leadership");
            },
        ));
        // In-process election always succeeds immediately for a lone
        // candidate; give it one retry interval to acquire before
        // reporting readiness.
        tokio::time::sleep(ElectionTimings::default().retry_period).await;
        if let Some(handles) = acquired_handles.lock().expect("lock poisoned").take() {
            worker_handles = handles;
        }
    } else {
        worker_handles = work();
    }

    readiness.mark_ready();
    info!("fleetctl controller-manager ready");

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutdown requested");
    shutdown.cancel();

    for handle in worker_handles {
        let _ = handle.await;
    }
    let _ = health_task.await;
    let _ = metrics_task.await;
    let _ = metrics_loop_task.await;

    info!("fleetctl controller-manager stopped");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn spawn_reconcilers(
    env: Arc<Environment>,
    machines: InMemoryStore<Machine>,
    machine_sets: InMemoryStore<MachineSet>,
    machine_deployments: InMemoryStore<MachineDeployment>,
    csrs: InMemoryStore<CertificateSigningRequest>,
    metrics: Arc<Metrics>,
    pools: fleetctl_config::WorkerPoolConfig,
    lifecycle: fleetctl_config::LifecycleConfig,
    resync_period: Duration,
    shutdown: CancellationToken,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();
    metrics.workers.set((pools.machine + pools.machine_set + pools.machine_deployment + 1) as i64);

    let machine_queue = WorkQueue::new(BackoffConfig::default());
    handles.push(tokio::spawn(resync_loop(machines.clone(), machine_queue.clone(), resync_period, shutdown.clone())));
    {
        let store = machines.clone();
        let env = env.clone();
        let metrics = metrics.clone();
        let reconciler_config = machine_reconciler::MachineReconcilerConfig {
            join_cluster_timeout: Some(Duration::from_secs(lifecycle.join_cluster_timeout_secs)),
            ..machine_reconciler::MachineReconcilerConfig::default()
        };
        handles.extend(spawn_workers(machine_queue, pools.machine as usize, move |key| {
            let store = store.clone();
            let env = env.clone();
            let metrics = metrics.clone();
            let reconciler_config = reconciler_config.clone();
            async move {
                if let Ok(machine) = store.get(&key).await {
                    let timer = metrics.record_operation("machine").start_timer();
                    let outcome = machine_reconciler::reconcile(&store, env.as_ref(), &reconciler_config, machine).await;
                    timer.observe_duration();
                    if let Err(e) = outcome {
                        metrics.errors_total.inc();
                        warn!(error = %e, key = %key, "machine reconcile failed");
                    }
                }
            }
        }));
    }

    let machine_set_queue = WorkQueue::new(BackoffConfig::default());
    handles.push(tokio::spawn(resync_loop(machine_sets.clone(), machine_set_queue.clone(), resync_period, shutdown.clone())));
    {
        let store = machine_sets.clone();
        let env = env.clone();
        let metrics = metrics.clone();
        handles.extend(spawn_workers(machine_set_queue, pools.machine_set as usize, move |key| {
            let store = store.clone();
            let env = env.clone();
            let metrics = metrics.clone();
            async move {
                if let Ok(set) = store.get(&key).await {
                    let timer = metrics.record_operation("machineset").start_timer();
                    let outcome = machineset_reconciler::reconcile(&store, env.as_ref(), set).await;
                    timer.observe_duration();
                    if let Err(e) = outcome {
                        metrics.errors_total.inc();
                        warn!(error = %e, key = %key, "machineset reconcile failed");
                    }
                }
            }
        }));
    }

    let deployment_queue = WorkQueue::new(BackoffConfig::default());
    handles.push(tokio::spawn(resync_loop(
        machine_deployments.clone(),
        deployment_queue.clone(),
        resync_period,
        shutdown.clone(),
    )));
    {
        let store = machine_deployments.clone();
        let env = env.clone();
        let metrics = metrics.clone();
        handles.extend(spawn_workers(deployment_queue, pools.machine_deployment as usize, move |key| {
            let store = store.clone();
            let env = env.clone();
            let metrics = metrics.clone();
            async move {
                if let Ok(deployment) = store.get(&key).await {
                    let name = deployment.metadata.name.clone();
                    let timer = metrics.record_operation("machinedeployment").start_timer();
                    let outcome = machinedeployment_reconciler::reconcile(&store, env.as_ref(), deployment).await;
                    timer.observe_duration();
                    match outcome {
                        Ok(_) => {
                            if let Ok(updated) = store.get(&key).await {
                                metrics.deployment_replicas.with_label_values(&[&name]).set(updated.status.replicas as i64);
                                metrics
                                    .deployment_available_replicas
                                    .with_label_values(&[&name])
                                    .set(updated.status.available_replicas as i64);
                                metrics
                                    .deployment_ready_replicas
                                    .with_label_values(&[&name])
                                    .set(updated.status.ready_replicas as i64);
                                metrics
                                    .deployment_updated_replicas
                                    .with_label_values(&[&name])
                                    .set(updated.status.updated_replicas as i64);
                            }
                        }
                        Err(e) => {
                            metrics.errors_total.inc();
                            warn!(error = %e, key = %key, "machinedeployment reconcile failed");
                        }
                    }
                }
            }
        }));
    }

    let csr_queue = WorkQueue::new(BackoffConfig::default());
    handles.push(tokio::spawn(resync_loop(csrs.clone(), csr_queue.clone(), resync_period, shutdown)));
    {
        let store = csrs.clone();
        let env = env.clone();
        let metrics = metrics.clone();
        handles.extend(spawn_workers(csr_queue, 1, move |key| {
            let store = store.clone();
            let env = env.clone();
            let metrics = metrics.clone();
            async move {
                if let Ok(csr) = store.get(&key).await {
                    let timer = metrics.record_operation("csr").start_timer();
                    let outcome = fleetctl_csr::reconcile(&store, env.as_ref(), csr).await;
                    timer.observe_duration();
                    if let Err(e) = outcome {
                        metrics.errors_total.inc();
                        warn!(error = %e, key = %key, "csr reconcile failed");
                    }
                }
            }
        }));
    }

    handles
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "fleetctl-controller-manager".to_string())
}

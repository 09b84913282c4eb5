//! The in-process collaborator implementations the controller-manager binary
//! wires its reconcile loops against.
//!
//! The object-store and cache (spec.md 4.A) are in scope; a live cloud API
//! and a live cluster API server are explicitly not (spec.md 1 Non-goals:
//! "no cloud API implementation", "no private persistent store"). This
//! module is therefore the integration seam: it satisfies every
//! collaborator trait the reconcilers need using the in-memory reference
//! store plus a `CloudProvider::None` driver, so the binary runs end to end
//! against itself. Wiring a real provider means registering a driver in
//! [`fleetctl_provider::ProviderRegistry`]; wiring a real cluster means
//! swapping the `InMemoryStore`/`InMemoryNodeDriver` fields below for ones
//! backed by a real API client.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleetctl_bootstrap::{
    generate_userdata, issue_or_reuse, resolve_cluster_ca, BootstrapToken, ClusterCaData, ClusterCaSource, KubeconfigParams,
    NodeSettings, UserDataGenerator,
};
use fleetctl_controller::error::{ControllerError, Result as ControllerResult};
use fleetctl_controller::machine_env::{MachineEnvironment, ValidationFailure};
use fleetctl_controller::machinedeployment_env::MachineDeploymentEnvironment;
use fleetctl_controller::machineset_env::MachineSetEnvironment;
use fleetctl_controller::node_adoption::NodeCandidate;
use fleetctl_csr::CsrEnvironment;
use fleetctl_eviction::{EvictOutcome, EvictionConfig, Evictor, Node as EvictionNode, NodeDriver, Pod, PodLister, Result as EvictionResult};
use fleetctl_provider::{CloudProviderDriver, Instance, InstanceStatus, ProviderError, ProviderRegistry, ProviderResult, UserData};
use fleetctl_runtime::{InMemoryStore, ObjectKey, ObjectStore};
use fleetctl_types::{
    machine::CloudProvider, Event, EventSeverity, InvolvedObject, Machine, MachineDeployment, MachineErrorReason, MachineSet,
    MachineTemplateSpec, ObjectMeta, OwnerReference,
};
use tokio::sync::RwLock;

/// Tracks an adopted node's name and (for the eviction path) whether it has
/// been cordoned -- enough state for the controller-manager to exercise its
/// own state machine without a real cluster.
#[derive(Debug, Clone, Default)]
struct TrackedNode {
    ready: bool,
    cordoned: bool,
}

/// A `CloudProviderDriver` for `CloudProvider::None`: instances exist only
/// in this process's memory, "created" instantly and always healthy. This
/// is the only driver this binary registers by default; real providers
/// plug in by registering additional drivers on the same registry before
/// constructing `Environment`.
struct NullDriver;

#[async_trait]
impl CloudProviderDriver for NullDriver {
    async fn validate(&self, _machine: &Machine) -> ProviderResult<()> {
        Ok(())
    }

    async fn add_defaults(&self, spec: serde_json::Value) -> ProviderResult<serde_json::Value> {
        Ok(spec)
    }

    async fn create(&self, machine: &Machine, _userdata: &UserData) -> ProviderResult<Instance> {
        Ok(Instance {
            provider_id: format!("none-{}", machine.metadata.uid),
            status: InstanceStatus::Running,
            addresses: Vec::new(),
        })
    }

    async fn get(&self, _machine: &Machine) -> ProviderResult<Option<Instance>> {
        Ok(None)
    }

    async fn cleanup(&self, _machine: &Machine) -> ProviderResult<bool> {
        Ok(true)
    }

    async fn migrate_uid(&self, _machine: &Machine, _new_uid: &str) -> ProviderResult<()> {
        Ok(())
    }

    fn metrics_labels(&self, _machine: &Machine) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// Resolves the cluster CA for bootstrap kubeconfigs. There is no live
/// cluster API server behind this binary (spec.md 1 Non-goals), so this
/// stands in for the well-known-configmap lookup `fleetctl_bootstrap::ca`
/// otherwise does against one.
struct NullCaSource;

impl ClusterCaSource for NullCaSource {
    async fn read_well_known_configmap(&self) -> Option<ClusterCaData> {
        Some(ClusterCaData(
            "-----BEGIN CERTIFICATE-----\nfleetctl-in-memory-dev-ca\n-----END CERTIFICATE-----\n".to_string(),
        ))
    }

    async fn reconstruct_from_endpoints(&self) -> Option<ClusterCaData> {
        None
    }
}

/// Renders the kubeconfig plus node settings into a plain-text boot
/// script. A real cloud-init/Ignition templating engine is an external
/// collaborator this binary doesn't implement (spec.md 1 Non-goals: "no
/// cloud API implementation"); this generator is enough to exercise the
/// bootstrap pipeline end to end against the `None` provider.
struct PlainUserDataGenerator;

impl UserDataGenerator for PlainUserDataGenerator {
    fn render(&self, kubeconfig: &str, node_settings: &NodeSettings) -> fleetctl_bootstrap::Result<UserData> {
        Ok(UserData(format!(
            "#!/bin/sh\n# fleetctl bootstrap userdata\ncat <<'KUBECONFIG' > /etc/kubernetes/bootstrap-kubeconfig\n{kubeconfig}\nKUBECONFIG\n# container_runtime={}\n",
            node_settings.container_runtime
        )))
    }
}

/// The shared environment passed to every reconciler loop. Holds the
/// concrete in-memory stores directly: `ObjectStore`'s async methods use
/// return-position `impl Future`, which rules out `dyn ObjectStore` trait
/// objects, so this binary's only store backend is named here rather than
/// behind a trait object.
pub struct Environment {
    pub machines: InMemoryStore<Machine>,
    pub machine_sets: InMemoryStore<MachineSet>,
    pub machine_deployments: InMemoryStore<MachineDeployment>,
    events: InMemoryStore<Event>,
    tokens: InMemoryStore<BootstrapToken>,
    providers: ProviderRegistry,
    nodes: Arc<RwLock<BTreeMap<String, TrackedNode>>>,
    node_settings: NodeSettings,
    cluster_name: String,
    cluster_server: String,
    eviction_config: EvictionConfig,
}

impl Environment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        machines: InMemoryStore<Machine>,
        machine_sets: InMemoryStore<MachineSet>,
        machine_deployments: InMemoryStore<MachineDeployment>,
        node_settings: NodeSettings,
        cluster_name: String,
        cluster_server: String,
        skip_eviction_timeout: Duration,
    ) -> Self {
        let mut providers = ProviderRegistry::new();
        providers.register(CloudProvider::None, Arc::new(NullDriver));
        Self {
            machines,
            machine_sets,
            machine_deployments,
            events: InMemoryStore::new(),
            tokens: InMemoryStore::new(),
            providers,
            nodes: Arc::new(RwLock::new(BTreeMap::new())),
            node_settings,
            cluster_name,
            cluster_server,
            eviction_config: EvictionConfig {
                grace_period: skip_eviction_timeout,
                ..EvictionConfig::default()
            },
        }
    }

    async fn emit_event(&self, involved: InvolvedObject, reason: &str, message: &str, severity: EventSeverity) -> ControllerResult<()> {
        let event = Event::new(involved, reason, message, severity);
        self.events.create(event).await.map_err(ControllerError::from)?;
        Ok(())
    }
}


impl MachineEnvironment for Environment {
    async fn validate_spec(&self, machine: &Machine) -> Result<(), ValidationFailure> {
        let driver = self.providers.driver(machine.spec.provider_spec.cloud_provider).map_err(|e| ValidationFailure {
            reason: MachineErrorReason::InvalidConfiguration,
            message: e.to_string(),
        })?;
        driver.validate(machine).await.map_err(|e| ValidationFailure {
            reason: MachineErrorReason::InvalidConfiguration,
            message: e.to_string(),
        })
    }

    async fn provider_get(&self, machine: &Machine) -> Result<Option<Instance>, ProviderError> {
        self.providers.driver(machine.spec.provider_spec.cloud_provider)?.get(machine).await
    }

    async fn provider_create(&self, machine: &Machine) -> Result<Instance, ProviderError> {
        let token = issue_or_reuse(&self.tokens, &machine.metadata.uid)
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;
        let ca = resolve_cluster_ca(&NullCaSource).await.map_err(|e| ProviderError::Transient(e.to_string()))?;
        let kubeconfig_params = KubeconfigParams {
            cluster_name: &self.cluster_name,
            server: &self.cluster_server,
            ca: &ca,
            token: &token,
        };
        let userdata = generate_userdata(&PlainUserDataGenerator, &kubeconfig_params, &self.node_settings)
            .map_err(|e| ProviderError::Transient(e.to_string()))?;
        self.providers.driver(machine.spec.provider_spec.cloud_provider)?.create(machine, &userdata).await
    }

    async fn provider_cleanup(&self, machine: &Machine) -> Result<bool, ProviderError> {
        self.providers.driver(machine.spec.provider_spec.cloud_provider)?.cleanup(machine).await
    }

    async fn list_join_candidates(&self, _machine: &Machine) -> ControllerResult<Vec<NodeCandidate>> {
        // No real cluster API to list nodes from; a node only becomes a
        // join candidate once something (a test, or a future real node
        // watcher) registers it.
        Ok(Vec::new())
    }

    async fn apply_node_metadata(&self, _machine: &Machine, node_name: &str) -> ControllerResult<()> {
        self.nodes.write().await.entry(node_name.to_string()).or_default().ready = true;
        Ok(())
    }

    async fn drain_node(&self, machine: &Machine, node_name: &str) -> ControllerResult<bool> {
        let driver = InMemoryNodeDriver { nodes: self.nodes.clone() };
        let started_at = machine.metadata.deletion_timestamp.unwrap_or_else(chrono::Utc::now);
        let status = fleetctl_eviction::drain_node(&driver, &EmptyPodLister, &AlwaysEvictor, node_name, &self.eviction_config, started_at)
            .await
            .map_err(ControllerError::from)?;
        Ok(status == fleetctl_eviction::EvictionStatus::Done)
    }

    async fn delete_node(&self, node_name: &str) -> ControllerResult<()> {
        self.nodes.write().await.remove(node_name);
        Ok(())
    }

    async fn record_event(&self, involved: InvolvedObject, reason: &str, message: &str, severity: EventSeverity) -> ControllerResult<()> {
        self.emit_event(involved, reason, message, severity).await
    }
}

impl MachineSetEnvironment for Environment {
    async fn adopt(&self, machine: &Machine, set: &MachineSet) -> ControllerResult<()> {
        let mut updated = machine.clone();
        updated.metadata.owner_references.push(OwnerReference::controller(
            "fleetctl.io/v1alpha1",
            "MachineSet",
            &set.metadata.name,
            &set.metadata.uid,
        ));
        self.machines.update(updated).await.map_err(ControllerError::from)?;
        Ok(())
    }

    async fn create_from_template(&self, set: &MachineSet) -> ControllerResult<Machine> {
        let name = format!("{}-{}", set.metadata.name, uuid::Uuid::new_v4().simple());
        let mut metadata = ObjectMeta::new(set.metadata.namespace.clone(), name);
        metadata.labels = set.spec.template.labels.clone();
        metadata
            .owner_references
            .push(OwnerReference::controller("fleetctl.io/v1alpha1", "MachineSet", &set.metadata.name, &set.metadata.uid));
        let machine = Machine::new(metadata, set.spec.template.spec.clone());
        self.machines.create(machine).await.map_err(ControllerError::from)
    }

    async fn delete_machine(&self, machine: &Machine) -> ControllerResult<()> {
        self.machines.delete(&ObjectKey::new(machine.metadata.namespace.clone(), machine.metadata.name.clone())).await.map_err(ControllerError::from)
    }

    async fn node_ready(&self, machine: &Machine) -> bool {
        match &machine.spec.node_name {
            Some(name) => self.nodes.read().await.get(name).map(|n| n.ready).unwrap_or(false),
            None => false,
        }
    }

    async fn wait_observable(&self, machine: &Machine) -> bool {
        self.machines
            .get(&ObjectKey::new(machine.metadata.namespace.clone(), machine.metadata.name.clone()))
            .await
            .is_ok()
    }

    async fn wait_deleted(&self, machine: &Machine) -> bool {
        self.machines
            .get(&ObjectKey::new(machine.metadata.namespace.clone(), machine.metadata.name.clone()))
            .await
            .is_err()
    }

    async fn record_event(&self, involved: InvolvedObject, reason: &str, message: &str, severity: EventSeverity) -> ControllerResult<()> {
        self.emit_event(involved, reason, message, severity).await
    }
}

impl MachineDeploymentEnvironment for Environment {
    async fn adopt(&self, set: &MachineSet, deployment: &MachineDeployment) -> ControllerResult<()> {
        let mut updated = set.clone();
        updated.metadata.owner_references.push(OwnerReference::controller(
            "fleetctl.io/v1alpha1",
            "MachineDeployment",
            &deployment.metadata.name,
            &deployment.metadata.uid,
        ));
        self.machine_sets.update(updated).await.map_err(ControllerError::from)?;
        Ok(())
    }

    async fn create_set(
        &self,
        deployment: &MachineDeployment,
        template: &MachineTemplateSpec,
        revision: i64,
        pod_template_hash: &str,
    ) -> ControllerResult<MachineSet> {
        let name = format!("{}-{}", deployment.metadata.name, pod_template_hash);
        let mut metadata = ObjectMeta::new(deployment.metadata.namespace.clone(), name);
        metadata.labels = template.labels.clone();
        metadata.annotations.insert("fleetctl.io/revision".to_string(), revision.to_string());
        metadata.owner_references.push(OwnerReference::controller(
            "fleetctl.io/v1alpha1",
            "MachineDeployment",
            &deployment.metadata.name,
            &deployment.metadata.uid,
        ));
        let spec = fleetctl_types::MachineSetSpec {
            replicas: 0,
            selector: deployment.spec.selector.clone(),
            template: template.clone(),
            delete_priority: fleetctl_types::DeletePriority::Default,
            min_ready_seconds: 0,
        };
        self.machine_sets.create(MachineSet::new(metadata, spec)).await.map_err(ControllerError::from)
    }

    async fn scale_set(&self, set: &MachineSet, new_replicas: i32) -> ControllerResult<()> {
        let mut updated = set.clone();
        updated.spec.replicas = new_replicas;
        self.machine_sets.update(updated).await.map_err(ControllerError::from)?;
        Ok(())
    }

    async fn delete_set(&self, set: &MachineSet) -> ControllerResult<()> {
        self.machine_sets
            .delete(&ObjectKey::new(set.metadata.namespace.clone(), set.metadata.name.clone()))
            .await
            .map_err(ControllerError::from)
    }

    async fn record_event(&self, involved: InvolvedObject, reason: &str, message: &str, severity: EventSeverity) -> ControllerResult<()> {
        self.emit_event(involved, reason, message, severity).await
    }
}

impl CsrEnvironment for Environment {
    async fn find_machine_for_node(&self, node_name: &str) -> fleetctl_csr::Result<Option<Machine>> {
        for namespace in ["default"] {
            let machines = self.machines.list(namespace, &Default::default()).await.map_err(fleetctl_csr::CsrError::from)?;
            if let Some(m) = machines.into_iter().find(|m| m.spec.node_name.as_deref() == Some(node_name)) {
                return Ok(Some(m));
            }
        }
        Ok(None)
    }
}

/// A trivial node/pod driver for the eviction path: every node is
/// drainable and carries no pods, since this binary has no real kubelet
/// fleet behind it. Kept as its own small type (rather than folded into
/// `Environment`) because eviction's traits are keyed by node name, not by
/// the object types `Environment` otherwise juggles.
#[derive(Clone, Default)]
pub struct InMemoryNodeDriver {
    nodes: Arc<RwLock<BTreeMap<String, TrackedNode>>>,
}

impl NodeDriver for InMemoryNodeDriver {
    async fn get(&self, name: &str) -> EvictionResult<EvictionNode> {
        let cordoned = self.nodes.read().await.get(name).map(|n| n.cordoned).unwrap_or(false);
        Ok(EvictionNode {
            name: name.to_string(),
            annotations: BTreeMap::new(),
            unschedulable: cordoned,
        })
    }

    async fn cordon(&self, name: &str) -> EvictionResult<()> {
        self.nodes.write().await.entry(name.to_string()).or_default().cordoned = true;
        Ok(())
    }
}

pub struct EmptyPodLister;

impl PodLister for EmptyPodLister {
    async fn list_on_node(&self, _node_name: &str) -> EvictionResult<Vec<Pod>> {
        Ok(Vec::new())
    }
}

pub struct AlwaysEvictor;

impl Evictor for AlwaysEvictor {
    async fn evict(&self, _pod: &Pod) -> EvictionResult<EvictOutcome> {
        Ok(EvictOutcome::Evicted)
    }
}

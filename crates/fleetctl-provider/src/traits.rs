//! The capability interface every provider driver implements (spec.md 4.D).

use async_trait::async_trait;
use fleetctl_types::{Machine, MachineAddress};

use crate::error::ProviderResult;

/// Rendered boot material injected into the cloud instance at create time
/// (produced by fleetctl-bootstrap).
#[derive(Debug, Clone)]
pub struct UserData(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Pending,
    Running,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub provider_id: String,
    pub status: InstanceStatus,
    pub addresses: Vec<MachineAddress>,
}

/// Uniform interface over one cloud provider (spec.md 4.D). Implementations
/// are provider variants; dispatch is keyed by the `cloudProvider`
/// discriminator in the machine's config. Individual provider
/// implementations are out of scope (spec.md 1); this crate specifies and
/// dispatches the interface.
#[async_trait]
pub trait CloudProviderDriver: Send + Sync {
    /// Validates the opaque provider config, independent of any live call.
    async fn validate(&self, machine: &Machine) -> ProviderResult<()>;

    /// Applies provider-specific defaults to a freshly admitted spec,
    /// returning the defaulted JSON value.
    async fn add_defaults(&self, spec: serde_json::Value) -> ProviderResult<serde_json::Value>;

    /// Creates the instance backing `machine`, injecting `userdata` as the
    /// boot script.
    async fn create(&self, machine: &Machine, userdata: &UserData) -> ProviderResult<Instance>;

    /// Looks up the current instance. `Ok(None)` means not-found, which the
    /// Machine reconciler's S1 state treats as "needs creation".
    async fn get(&self, machine: &Machine) -> ProviderResult<Option<Instance>>;

    /// Deprovisions the instance. Returns `true` once fully torn down;
    /// `false` means "not yet done, requeue" (spec.md 4.G S4).
    async fn cleanup(&self, machine: &Machine) -> ProviderResult<bool>;

    /// Re-points a provider-side resource at a new machine UID, used when a
    /// Machine object is recreated with the same name but a new identity.
    async fn migrate_uid(&self, machine: &Machine, new_uid: &str) -> ProviderResult<()>;

    /// Static labels this provider contributes to the metrics surface
    /// (spec.md 4.D: `metrics-labels(machine)`).
    fn metrics_labels(&self, machine: &Machine) -> Vec<(&'static str, String)>;
}

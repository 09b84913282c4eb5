//! The collaborator surface [`crate::machine_reconciler::reconcile`] drives.
//!
//! Each method composes the lower-level crates (`fleetctl-runtime`,
//! `fleetctl-provider`, `fleetctl-bootstrap`, `fleetctl-eviction`) that do
//! the actual store/provider/eviction work; the reconciler itself only
//! decides *which* of these to call and in what order, per the state
//! machine in spec.md 4.G.

use fleetctl_provider::{Instance, ProviderError};
use fleetctl_types::{EventSeverity, InvolvedObject, Machine, MachineErrorReason};

use crate::node_adoption::NodeCandidate;

/// A provider-spec validation failure, carrying the reason the Machine
/// reconciler persists on terminal rejection (spec.md 4.G S0).
#[derive(Debug, Clone)]
pub struct ValidationFailure {
    pub reason: MachineErrorReason,
    pub message: String,
}

pub trait MachineEnvironment: Send + Sync {
    /// Validates the machine's spec independent of any provider call
    /// (spec.md 4.G S0).
    fn validate_spec(
        &self,
        machine: &Machine,
    ) -> impl std::future::Future<Output = Result<(), ValidationFailure>> + Send;

    fn provider_get(
        &self,
        machine: &Machine,
    ) -> impl std::future::Future<Output = Result<Option<Instance>, ProviderError>> + Send;

    /// Mints bootstrap materials, generates userdata, and calls the
    /// provider's `create` (spec.md 4.E, 4.G S1).
    fn provider_create(
        &self,
        machine: &Machine,
    ) -> impl std::future::Future<Output = Result<Instance, ProviderError>> + Send;

    fn provider_cleanup(
        &self,
        machine: &Machine,
    ) -> impl std::future::Future<Output = Result<bool, ProviderError>> + Send;

    /// Lists nodes that could plausibly be this machine's join target
    /// (spec.md 4.G S2).
    fn list_join_candidates(
        &self,
        machine: &Machine,
    ) -> impl std::future::Future<Output = Result<Vec<NodeCandidate>, crate::error::ControllerError>> + Send;

    /// Idempotently applies the owner label plus spec labels/taints/
    /// annotations onto the joined node (spec.md 4.G S2, S3).
    fn apply_node_metadata(
        &self,
        machine: &Machine,
        node_name: &str,
    ) -> impl std::future::Future<Output = Result<(), crate::error::ControllerError>> + Send;

    /// Drains the node ahead of deprovisioning (spec.md 4.F via 4.G S4.1).
    /// Returns `true` once eviction is confirmed done.
    fn drain_node(
        &self,
        machine: &Machine,
        node_name: &str,
    ) -> impl std::future::Future<Output = Result<bool, crate::error::ControllerError>> + Send;

    /// Deletes the Node object. A missing node is success (spec.md 4.G
    /// S4.3).
    fn delete_node(
        &self,
        node_name: &str,
    ) -> impl std::future::Future<Output = Result<(), crate::error::ControllerError>> + Send;

    /// Appends an event recording a state transition (spec.md 7: "every
    /// state change emits an event on the object").
    fn record_event(
        &self,
        involved: InvolvedObject,
        reason: &str,
        message: &str,
        severity: EventSeverity,
    ) -> impl std::future::Future<Output = Result<(), crate::error::ControllerError>> + Send;
}

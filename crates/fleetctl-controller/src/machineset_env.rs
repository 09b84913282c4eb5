//! Collaborator surface the MachineSet reconciler drives (spec.md 4.H).

use fleetctl_types::{EventSeverity, InvolvedObject, Machine, MachineSet};

use crate::error::Result;

pub trait MachineSetEnvironment: Send + Sync {
    /// Patches an owner reference onto an orphaned machine (spec.md 4.H,
    /// "Adopt orphans by patching an owner reference").
    fn adopt(
        &self,
        machine: &Machine,
        set: &MachineSet,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Creates one machine from the set's template, named with a
    /// `generateName` prefix (spec.md 4.H).
    fn create_from_template(
        &self,
        set: &MachineSet,
    ) -> impl std::future::Future<Output = Result<Machine>> + Send;

    fn delete_machine(&self, machine: &Machine) -> impl std::future::Future<Output = Result<()>> + Send;

    /// True once the node backing `machine` reports a Ready condition
    /// (spec.md 4.H, status "ready" field).
    fn node_ready(&self, machine: &Machine) -> impl std::future::Future<Output = bool> + Send;

    /// Bounded-polls the cache until `machine` is observable there (spec.md
    /// 4.H: "wait... until each new machine is observable, so subsequent
    /// reconciles do not double-create"). Returns whether it was observed
    /// within the bound.
    fn wait_observable(&self, machine: &Machine) -> impl std::future::Future<Output = bool> + Send;

    /// Bounded-polls until `machine` is gone from the cache, or a timeout
    /// elapses (spec.md 4.H: default 10 s, 100 ms interval).
    fn wait_deleted(&self, machine: &Machine) -> impl std::future::Future<Output = bool> + Send;

    /// Appends an event recording a state transition (spec.md 7).
    fn record_event(
        &self,
        involved: InvolvedObject,
        reason: &str,
        message: &str,
        severity: EventSeverity,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

//! Collaborator surface the MachineDeployment reconciler drives (spec.md
//! 4.I).

use fleetctl_types::{EventSeverity, InvolvedObject, MachineDeployment, MachineSet, MachineTemplateSpec};

use crate::error::Result;

pub trait MachineDeploymentEnvironment: Send + Sync {
    fn adopt(
        &self,
        set: &MachineSet,
        deployment: &MachineDeployment,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Creates the "new" set: replicas start at zero, grown by the rollout
    /// plan on subsequent reconciles.
    fn create_set(
        &self,
        deployment: &MachineDeployment,
        template: &MachineTemplateSpec,
        revision: i64,
        pod_template_hash: &str,
    ) -> impl std::future::Future<Output = Result<MachineSet>> + Send;

    fn scale_set(
        &self,
        set: &MachineSet,
        new_replicas: i32,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn delete_set(&self, set: &MachineSet) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Appends an event recording a state transition (spec.md 7).
    fn record_event(
        &self,
        involved: InvolvedObject,
        reason: &str,
        message: &str,
        severity: EventSeverity,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

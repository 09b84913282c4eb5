//! The collaborator surface [`crate::reconciler::reconcile`] drives: looking
//! up the Machine a CSR claims to belong to, so its SANs can be checked
//! against that Machine's observed addresses (spec.md 4.K).

use fleetctl_types::Machine;

pub trait CsrEnvironment: Send + Sync {
    /// Finds the Machine whose node name matches the CSR's claimed node
    /// (the `system:node:<nodename>` suffix of its username). `Ok(None)`
    /// when no such Machine exists.
    fn find_machine_for_node(
        &self,
        node_name: &str,
    ) -> impl std::future::Future<Output = crate::error::Result<Option<Machine>>> + Send;
}

//! The CSR reconciler (spec.md 4.K): for each pending certificate-signing
//! request, runs all six checks and approves only if every one passes.
//! A CSR reconciler never fails terminally the way a Machine can --
//! [`ReconcileOutcome::Terminal`] is coupled to [`fleetctl_types::MachineErrorReason`]
//! and has no analogue here, so this only ever returns `Done` or
//! `RequeueAfter`.

use fleetctl_runtime::{ObjectStore, ReconcileOutcome, DEFAULT_REQUEUE_DELAY};
use tracing::{info, warn};

use crate::checks::{
    check_key_usages, check_requester_identity, check_sans_match_machine, check_subject_common_name,
    check_subject_organization, claimed_node_name,
};
use crate::env::CsrEnvironment;
use crate::error::Result;
use crate::types::CertificateSigningRequest;

pub async fn reconcile<S, E>(store: &S, env: &E, mut csr: CertificateSigningRequest) -> Result<ReconcileOutcome>
where
    S: ObjectStore<CertificateSigningRequest>,
    E: CsrEnvironment,
{
    if !csr.is_pending() {
        return Ok(ReconcileOutcome::Done);
    }

    match evaluate(env, &csr).await? {
        Ok(()) => {
            csr.status.approved = true;
            csr.status.reason = Some("all checks passed".to_string());
            store.update_status(csr.clone()).await?;
            info!(csr = %csr.metadata.name, username = %csr.spec.username, "csr approved");
        }
        Err(reason) => {
            csr.status.denied = true;
            csr.status.reason = Some(reason.clone());
            store.update_status(csr.clone()).await?;
            warn!(csr = %csr.metadata.name, username = %csr.spec.username, reason = %reason, "csr denied");
        }
    }

    Ok(ReconcileOutcome::Done)
}

/// Runs the six checks in order, short-circuiting on the first failure so
/// the denial reason names the specific check that failed.
async fn evaluate<E: CsrEnvironment>(env: &E, csr: &CertificateSigningRequest) -> Result<std::result::Result<(), String>> {
    if let Err(reason) = check_requester_identity(&csr.spec) {
        return Ok(Err(reason));
    }
    if let Err(reason) = check_key_usages(&csr.spec) {
        return Ok(Err(reason));
    }
    if let Err(reason) = check_subject_common_name(&csr.spec) {
        return Ok(Err(reason));
    }
    if let Err(reason) = check_subject_organization(&csr.spec) {
        return Ok(Err(reason));
    }

    let node_name = claimed_node_name(&csr.spec).expect("checked by check_requester_identity");
    let machine = match env.find_machine_for_node(node_name).await? {
        Some(machine) => machine,
        None => return Ok(Err(format!("no machine found for node {node_name:?}"))),
    };
    if let Err(reason) = check_sans_match_machine(&csr.spec, &machine) {
        return Ok(Err(reason));
    }

    Ok(Ok(()))
}

/// Back-off applied when the reconciler can't yet resolve the claimed
/// machine (e.g. it hasn't joined the store yet); kept distinct from
/// [`DEFAULT_REQUEUE_DELAY`] so callers can tune CSR polling independently.
pub const MACHINE_LOOKUP_REQUEUE_DELAY: std::time::Duration = DEFAULT_REQUEUE_DELAY;

#[cfg(test)]
mod tests {
    use super::*;
    use fleetctl_runtime::InMemoryStore;
    use fleetctl_types::{
        CloudProvider, Machine, MachineAddress, MachineAddressType, MachineSpec, MachineStatus, MachineVersions,
        ObjectMeta, ProviderSpec,
    };

    use crate::types::{CertificateSigningRequestSpec, KeyUsage};

    struct FakeEnv {
        machine: Option<Machine>,
    }

    impl CsrEnvironment for FakeEnv {
        async fn find_machine_for_node(&self, node_name: &str) -> Result<Option<Machine>> {
            Ok(self
                .machine
                .clone()
                .filter(|m| m.spec.node_name.as_deref() == Some(node_name)))
        }
    }

    fn conforming_spec() -> CertificateSigningRequestSpec {
        CertificateSigningRequestSpec {
            username: "system:node:worker-1".to_string(),
            groups: vec!["system:nodes".to_string(), "system:authenticated".to_string()],
            usages: vec![KeyUsage::DigitalSignature, KeyUsage::KeyEncipherment, KeyUsage::ServerAuth],
            subject_common_name: "system:node:worker-1".to_string(),
            subject_organization: vec!["system:nodes".to_string()],
            dns_sans: vec![],
            ip_sans: vec!["10.0.0.5".to_string()],
        }
    }

    fn machine_for_worker_1() -> Machine {
        let mut machine = Machine::new(
            ObjectMeta::new("default", "worker-1"),
            MachineSpec {
                provider_spec: ProviderSpec { cloud_provider: CloudProvider::None, value: serde_json::Value::Null },
                versions: MachineVersions::default(),
                node_labels: Default::default(),
                node_taints: Vec::new(),
                node_annotations: Default::default(),
                node_name: Some("worker-1".to_string()),
                ssh_authorized_keys: Vec::new(),
                kubelet_config_source: None,
            },
        );
        machine.status = MachineStatus {
            addresses: vec![MachineAddress { kind: MachineAddressType::InternalIp, address: "10.0.0.5".to_string() }],
            ..Default::default()
        };
        machine
    }

    #[tokio::test]
    async fn conforming_csr_is_approved() {
        let store = InMemoryStore::<CertificateSigningRequest>::new();
        let csr = CertificateSigningRequest::new(ObjectMeta::new("default", "csr-1"), conforming_spec());
        store.create(csr.clone()).await.unwrap();
        let env = FakeEnv { machine: Some(machine_for_worker_1()) };

        reconcile(&store, &env, csr.clone()).await.unwrap();

        let updated = store.get(&csr.key()).await.unwrap();
        assert!(updated.status.approved);
        assert!(!updated.status.denied);
    }

    #[tokio::test]
    async fn csr_with_unrecognized_node_is_denied() {
        let store = InMemoryStore::<CertificateSigningRequest>::new();
        let csr = CertificateSigningRequest::new(ObjectMeta::new("default", "csr-1"), conforming_spec());
        store.create(csr.clone()).await.unwrap();
        let env = FakeEnv { machine: None };

        reconcile(&store, &env, csr.clone()).await.unwrap();

        let updated = store.get(&csr.key()).await.unwrap();
        assert!(updated.status.denied);
        assert!(!updated.status.approved);
    }

    #[tokio::test]
    async fn csr_with_unrequested_san_is_denied() {
        let store = InMemoryStore::<CertificateSigningRequest>::new();
        let mut spec = conforming_spec();
        spec.ip_sans.push("10.0.0.9".to_string());
        let csr = CertificateSigningRequest::new(ObjectMeta::new("default", "csr-1"), spec);
        store.create(csr.clone()).await.unwrap();
        let env = FakeEnv { machine: Some(machine_for_worker_1()) };

        reconcile(&store, &env, csr.clone()).await.unwrap();

        let updated = store.get(&csr.key()).await.unwrap();
        assert!(updated.status.denied);
    }

    #[tokio::test]
    async fn already_approved_csr_is_left_alone() {
        let store = InMemoryStore::<CertificateSigningRequest>::new();
        let mut csr = CertificateSigningRequest::new(ObjectMeta::new("default", "csr-1"), conforming_spec());
        csr.status.approved = true;
        store.create(csr.clone()).await.unwrap();
        let env = FakeEnv { machine: Some(machine_for_worker_1()) };

        let outcome = reconcile(&store, &env, csr.clone()).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Done));
    }
}

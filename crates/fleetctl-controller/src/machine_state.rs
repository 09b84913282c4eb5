//! Which state a Machine is in, per `(deletion-timestamp set?,
//! provider-instance present?, node ref present?, finalizers present?)`
//! (spec.md 4.G).

use fleetctl_types::{Machine, FINALIZER_DELETE_NODE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    New,
    Provisioning,
    AwaitingJoin,
    Running,
    Deleting,
}

pub fn determine_state(machine: &Machine) -> MachineState {
    if machine.metadata.is_being_deleted() {
        return MachineState::Deleting;
    }
    if !machine.metadata.has_finalizer(FINALIZER_DELETE_NODE) {
        return MachineState::New;
    }
    if machine.status.provider_instance_id.is_none() {
        return MachineState::Provisioning;
    }
    if machine.status.node_ref.is_none() {
        return MachineState::AwaitingJoin;
    }
    MachineState::Running
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleetctl_types::{
        CloudProvider, MachineSpec, MachineVersions, NodeRef, ObjectMeta, ProviderSpec,
    };
    use std::collections::BTreeMap;

    fn base_spec() -> MachineSpec {
        MachineSpec {
            provider_spec: ProviderSpec {
                cloud_provider: CloudProvider::Aws,
                value: serde_json::json!({}),
            },
            versions: MachineVersions {
                kubelet: "1.28.0".into(),
            },
            node_labels: BTreeMap::new(),
            node_taints: Vec::new(),
            node_annotations: BTreeMap::new(),
            node_name: None,
            ssh_authorized_keys: Vec::new(),
            kubelet_config_source: None,
        }
    }

    fn base_machine() -> Machine {
        Machine::new(ObjectMeta::new("default", "m1"), base_spec())
    }

    #[test]
    fn fresh_machine_without_finalizer_is_new() {
        assert_eq!(determine_state(&base_machine()), MachineState::New);
    }

    #[test]
    fn finalized_machine_without_instance_is_provisioning() {
        let mut machine = base_machine();
        machine.metadata.add_finalizer(FINALIZER_DELETE_NODE);
        assert_eq!(determine_state(&machine), MachineState::Provisioning);
    }

    #[test]
    fn machine_with_instance_and_no_node_is_awaiting_join() {
        let mut machine = base_machine();
        machine.metadata.add_finalizer(FINALIZER_DELETE_NODE);
        machine.status.provider_instance_id = Some("i-123".into());
        assert_eq!(determine_state(&machine), MachineState::AwaitingJoin);
    }

    #[test]
    fn machine_with_node_ref_is_running() {
        let mut machine = base_machine();
        machine.metadata.add_finalizer(FINALIZER_DELETE_NODE);
        machine.status.provider_instance_id = Some("i-123".into());
        machine.status.node_ref = Some(NodeRef {
            name: "node-1".into(),
            uid: "uid-1".into(),
        });
        assert_eq!(determine_state(&machine), MachineState::Running);
    }

    #[test]
    fn deletion_timestamp_always_wins() {
        let mut machine = base_machine();
        machine.status.node_ref = Some(NodeRef {
            name: "node-1".into(),
            uid: "uid-1".into(),
        });
        machine.metadata.deletion_timestamp = Some(Utc::now());
        assert_eq!(determine_state(&machine), MachineState::Deleting);
    }
}

//! "Encoding then decoding any Machine, MachineSet, or MachineDeployment
//! yields a semantically equal object" (spec.md 8).

use std::collections::BTreeMap;

use fleetctl_types::{
    CloudProvider, DeletePriority, LabelSelector, Machine, MachineDeployment, MachineDeploymentSpec,
    MachineDeploymentStrategy, MachineSet, MachineSetSpec, MachineSpec, MachineTemplateSpec, MachineVersions,
    ObjectMeta, ProviderSpec, RollingUpdateMachineDeployment,
};
use proptest::prelude::*;

fn labels_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-z]{1,8}", "[a-z0-9]{1,8}", 0..4)
}

prop_compose! {
    fn machine_spec_strategy()(
        kubelet in "1\\.(2[4-9]|3[0-5])\\.[0-9]{1,2}",
        node_name in prop::option::of("[a-z][a-z0-9-]{0,12}"),
        node_labels in labels_strategy(),
    ) -> MachineSpec {
        MachineSpec {
            provider_spec: ProviderSpec { cloud_provider: CloudProvider::Aws, value: serde_json::json!({"region": "us-east-1"}) },
            versions: MachineVersions { kubelet },
            node_labels,
            node_taints: Vec::new(),
            node_annotations: BTreeMap::new(),
            node_name,
            ssh_authorized_keys: Vec::new(),
            kubelet_config_source: None,
        }
    }
}

prop_compose! {
    fn machine_strategy()(
        name in "[a-z][a-z0-9-]{0,12}",
        spec in machine_spec_strategy(),
    ) -> Machine {
        Machine::new(ObjectMeta::new("default", name), spec)
    }
}

prop_compose! {
    fn machineset_strategy()(
        name in "[a-z][a-z0-9-]{0,12}",
        replicas in 0i32..20,
        selector_labels in labels_strategy(),
        policy in prop_oneof![
            Just(DeletePriority::Random),
            Just(DeletePriority::Newest),
            Just(DeletePriority::Oldest),
            Just(DeletePriority::Default),
        ],
        template_spec in machine_spec_strategy(),
    ) -> MachineSet {
        let selector = if selector_labels.is_empty() {
            LabelSelector::from(BTreeMap::from([("app".to_string(), "x".to_string())]))
        } else {
            LabelSelector::from(selector_labels.clone())
        };
        let template_labels = if selector_labels.is_empty() {
            BTreeMap::from([("app".to_string(), "x".to_string())])
        } else {
            selector_labels
        };
        MachineSet::new(
            ObjectMeta::new("default", name),
            MachineSetSpec {
                replicas,
                selector,
                template: MachineTemplateSpec { labels: template_labels, spec: template_spec },
                delete_priority: policy,
                min_ready_seconds: 0,
            },
        )
    }
}

prop_compose! {
    fn machinedeployment_strategy()(
        name in "[a-z][a-z0-9-]{0,12}",
        replicas in 0i32..20,
        max_surge in 0i32..5,
        max_unavailable in 0i32..5,
        template_spec in machine_spec_strategy(),
    ) -> MachineDeployment {
        let labels = BTreeMap::from([("app".to_string(), "x".to_string())]);
        MachineDeployment::new(
            ObjectMeta::new("default", name),
            MachineDeploymentSpec {
                replicas,
                selector: LabelSelector::from(labels.clone()),
                template: MachineTemplateSpec { labels, spec: template_spec },
                strategy: MachineDeploymentStrategy::RollingUpdate {
                    rolling_update: RollingUpdateMachineDeployment {
                        max_surge: fleetctl_types::IntOrString::Int(max_surge),
                        max_unavailable: fleetctl_types::IntOrString::Int(max_unavailable),
                    },
                },
                revision_history_limit: 10,
                paused: false,
                progress_deadline_seconds: 600,
            },
        )
    }
}

proptest! {
    #[test]
    fn machine_round_trips_through_json(machine in machine_strategy()) {
        let encoded = serde_json::to_value(&machine).unwrap();
        let decoded: Machine = serde_json::from_value(encoded).unwrap();
        prop_assert_eq!(decoded, machine);
    }

    #[test]
    fn machineset_round_trips_through_json(set in machineset_strategy()) {
        let encoded = serde_json::to_value(&set).unwrap();
        let decoded: MachineSet = serde_json::from_value(encoded).unwrap();
        prop_assert_eq!(decoded, set);
    }

    #[test]
    fn machinedeployment_round_trips_through_json(deployment in machinedeployment_strategy()) {
        let encoded = serde_json::to_value(&deployment).unwrap();
        let decoded: MachineDeployment = serde_json::from_value(encoded).unwrap();
        prop_assert_eq!(decoded, deployment);
    }
}

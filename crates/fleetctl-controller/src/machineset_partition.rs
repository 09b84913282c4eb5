//! Partitions selector-matching machines into owned/orphan/foreign buckets
//! (spec.md 4.H).

use fleetctl_types::{LabelSelector, Machine};

#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Controller owner-ref matches this set: the authoritative replica set.
    pub owned: Vec<Machine>,
    /// No controller owner-ref, but labels match: adoptable.
    pub orphans: Vec<Machine>,
    /// Controller owner-ref points at a different set: left alone.
    pub foreign: Vec<Machine>,
}

const MACHINE_SET_KIND: &str = "MachineSet";

pub fn partition(set_name: &str, selector: &LabelSelector, candidates: &[Machine]) -> Partition {
    let mut partition = Partition::default();
    for machine in candidates {
        if !selector.matches(&machine.metadata.labels) {
            continue;
        }
        match machine.metadata.controller_ref() {
            Some(owner) if owner.kind == MACHINE_SET_KIND && owner.name == set_name => {
                partition.owned.push(machine.clone());
            }
            Some(_) => partition.foreign.push(machine.clone()),
            None => partition.orphans.push(machine.clone()),
        }
    }
    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetctl_types::{CloudProvider, MachineSpec, MachineVersions, ObjectMeta, OwnerReference, ProviderSpec};
    use std::collections::BTreeMap;

    fn labeled_machine(name: &str, owner: Option<(&str, &str)>) -> Machine {
        let mut labels = BTreeMap::new();
        labels.insert("app".into(), "web".into());
        let mut meta = ObjectMeta::new("default", name);
        meta.labels = labels;
        if let Some((kind, owner_name)) = owner {
            meta.owner_references
                .push(OwnerReference::controller("v1alpha1", kind, owner_name, "uid"));
        }
        Machine::new(
            meta,
            MachineSpec {
                provider_spec: ProviderSpec {
                    cloud_provider: CloudProvider::None,
                    value: serde_json::json!({}),
                },
                versions: MachineVersions::default(),
                node_labels: BTreeMap::new(),
                node_taints: Vec::new(),
                node_annotations: BTreeMap::new(),
                node_name: None,
                ssh_authorized_keys: Vec::new(),
                kubelet_config_source: None,
            },
        )
    }

    fn selector() -> LabelSelector {
        let mut ml = BTreeMap::new();
        ml.insert("app".into(), "web".into());
        LabelSelector::from(ml)
    }

    #[test]
    fn owned_machines_have_matching_controller_ref() {
        let machines = vec![labeled_machine("m1", Some(("MachineSet", "set-a")))];
        let p = partition("set-a", &selector(), &machines);
        assert_eq!(p.owned.len(), 1);
        assert!(p.orphans.is_empty());
        assert!(p.foreign.is_empty());
    }

    #[test]
    fn unowned_matching_machine_is_an_orphan() {
        let machines = vec![labeled_machine("m1", None)];
        let p = partition("set-a", &selector(), &machines);
        assert_eq!(p.orphans.len(), 1);
    }

    #[test]
    fn machine_owned_by_another_set_is_foreign() {
        let machines = vec![labeled_machine("m1", Some(("MachineSet", "set-b")))];
        let p = partition("set-a", &selector(), &machines);
        assert_eq!(p.foreign.len(), 1);
    }

    #[test]
    fn non_matching_labels_are_excluded_entirely() {
        let mut machine = labeled_machine("m1", None);
        machine.metadata.labels.clear();
        let p = partition("set-a", &selector(), &[machine]);
        assert!(p.owned.is_empty() && p.orphans.is_empty() && p.foreign.is_empty());
    }
}

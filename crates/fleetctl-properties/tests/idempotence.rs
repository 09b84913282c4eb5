//! "Executing a reconcile twice on an unchanged object produces no second-
//! step writes" (spec.md 8), specialized to the admission mutator: running
//! the mutator's defaulting against its own output is a fixed point, so a
//! second `Create` admission of the already-defaulted object yields an
//! empty patch.

use fleetctl_admission::{handle, AdmissionConfig, AdmissionRequest, Operation};
use proptest::prelude::*;
use serde_json::json;

fn machine_json(name: &str, kubelet: &str, replicas_gate: bool) -> serde_json::Value {
    let mut doc = json!({
        "apiVersion": "fleetctl.io/v1alpha1",
        "kind": "Machine",
        "metadata": {"name": name, "namespace": "default"},
        "spec": {
            "providerSpec": {"cloudProvider": "none", "value": {}},
            "versions": {"kubelet": kubelet},
        },
    });
    if replicas_gate {
        doc["spec"]["nodeAnnotations"] = json!({"example.com/gate": "on"});
    }
    doc
}

proptest! {
    #[test]
    fn admission_defaulting_is_a_fixed_point(
        name in "[a-z][a-z0-9-]{0,20}",
        kubelet in "1\\.(2[4-9]|3[0-5])\\.[0-9]{1,2}",
        gate in any::<bool>(),
    ) {
        let config = AdmissionConfig::default();

        let first = handle(
            AdmissionRequest {
                uid: "req-1".to_string(),
                operation: Operation::Create,
                object: machine_json(&name, &kubelet, gate),
                old_object: None,
            },
            &config,
        ).unwrap();
        prop_assert!(first.allowed);

        let mutated = machine_json(&name, &kubelet, gate);
        let mut mutated = mutated;
        if let Some(patch) = &first.patch {
            for p in patch {
                apply(&mut mutated, p);
            }
        }

        let second = handle(
            AdmissionRequest {
                uid: "req-2".to_string(),
                operation: Operation::Create,
                object: mutated,
                old_object: None,
            },
            &config,
        ).unwrap();
        prop_assert!(second.allowed);
        prop_assert!(second.patch.is_none(), "re-admitting an already-defaulted object produced a further patch");
    }
}

/// Minimal RFC 6902 patch application, just enough to replay the patches
/// `fleetctl_admission::json_patch::diff` emits (add/replace on object
/// fields, no array ops -- the mutator never touches arrays).
fn apply(doc: &mut serde_json::Value, patch: &fleetctl_admission::json_patch::Patch) {
    let segments: Vec<String> = patch
        .path
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect();
    let Some((last, parents)) = segments.split_last() else { return };
    let mut cursor = doc;
    for seg in parents {
        cursor = cursor.as_object_mut().unwrap().entry(seg.clone()).or_insert_with(|| json!({}));
    }
    if let Some(obj) = cursor.as_object_mut() {
        match &patch.value {
            Some(v) => {
                obj.insert(last.clone(), v.clone());
            }
            None => {
                obj.remove(last);
            }
        }
    }
}

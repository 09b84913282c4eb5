//! Identifying the "new" MachineSet and naming it (spec.md 4.I).

use fleetctl_types::{MachineSet, MachineTemplateSpec};

pub const REVISION_ANNOTATION: &str = "fleetctl.io/revision";
pub const POD_TEMPLATE_HASH_LABEL: &str = "fleetctl.io/pod-template-hash";

/// A short, deterministic hash of the template, the way a `pod-template-hash`
/// label disambiguates otherwise-identically-named sets.
pub fn pod_template_hash(template: &MachineTemplateSpec) -> String {
    let json = serde_json::to_vec(template).unwrap_or_default();
    blake3::hash(&json).to_hex()[..10].to_string()
}

/// The set whose template is semantically identical to the deployment's
/// current template, if one already exists (spec.md 4.I).
pub fn find_new_set<'a>(template: &MachineTemplateSpec, sets: &'a [MachineSet]) -> Option<&'a MachineSet> {
    sets.iter().find(|s| &s.spec.template == template)
}

/// `max(existing revisions) + 1` (spec.md 4.I).
pub fn next_revision(sets: &[MachineSet]) -> i64 {
    sets.iter()
        .filter_map(|s| s.metadata.annotations.get(REVISION_ANNOTATION))
        .filter_map(|v| v.parse::<i64>().ok())
        .max()
        .unwrap_or(0)
        + 1
}

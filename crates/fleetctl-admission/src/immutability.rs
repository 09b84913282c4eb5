//! Machine spec immutability (spec.md 4.J, 8 scenario 5): "On Machine
//! update, reject any change to spec except `spec.name` defaulting, unless
//! an escape-hatch annotation (`bypass-no-spec-mutation-requirement`) is
//! set (for migrations); the annotation is deleted by the mutator so it is
//! single-use."

use fleetctl_types::Machine;

/// Annotation key that, when present on the incoming object, permits one
/// spec mutation and is then stripped by the mutator.
pub const BYPASS_ANNOTATION: &str = "fleetctl.io/bypass-no-spec-mutation-requirement";

/// Returns `Some(reason)` if the update must be denied.
///
/// Must run after defaulting (so `spec.node_name`'s one-time assignment
/// from `metadata.name` never counts as a forbidden change) and before the
/// bypass annotation is stripped from `updated`.
pub fn check(prior: &Machine, updated: &Machine) -> Option<&'static str> {
    if updated.spec == prior.spec {
        return None;
    }
    if updated.metadata.annotations.contains_key(BYPASS_ANNOTATION) {
        return None;
    }
    Some("spec is immutable after creation; set the fleetctl.io/bypass-no-spec-mutation-requirement annotation to permit this update")
}

/// Strips the single-use bypass annotation, if present. Called once a
/// bypassed update has been allowed, so a second update cannot reuse it.
pub fn consume_bypass_annotation(machine: &mut Machine) {
    machine.metadata.annotations.remove(BYPASS_ANNOTATION);
}

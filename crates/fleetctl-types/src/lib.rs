//! # fleetctl-types: Core object schemas for `fleetctl`
//!
//! This crate contains the versioned object schemas shared across the
//! `fleetctl` system:
//! - Object metadata ([`ObjectMeta`], [`OwnerReference`], finalizers)
//! - Machine lifecycle objects ([`Machine`], [`MachineSpec`], [`MachineStatus`])
//! - Replica control objects ([`MachineSet`], [`MachineSetSpec`])
//! - Rolling-update objects ([`MachineDeployment`], [`MachineDeploymentStrategy`])
//! - Conditions ([`Condition`], [`ConditionType`])
//! - Legacy field migrations ([`migrations`])

pub mod conditions;
pub mod event;
pub mod machine;
pub mod machinedeployment;
pub mod machineset;
pub mod metadata;
pub mod migrations;
pub mod selector;

pub use conditions::{Condition, ConditionStatus, ConditionType};
pub use event::{Event, EventSeverity, InvolvedObject};
pub use machine::{
    CloudProvider, Machine, MachineAddress, MachineAddressType, MachineError, MachineErrorReason,
    MachineSpec, MachineStatus, MachineVersions, NodeRef, NodeTaint, ProviderSpec,
};
pub use machinedeployment::{
    MachineDeployment, MachineDeploymentPhase, MachineDeploymentSpec, MachineDeploymentStatus,
    MachineDeploymentStrategy, RollingUpdateMachineDeployment,
};
pub use machineset::{DeletePriority, MachineSet, MachineSetSpec, MachineSetStatus, MachineTemplateSpec};
pub use metadata::{Finalizer, ObjectMeta, OwnerReference};
pub use selector::LabelSelector;

/// A value that is either an absolute integer or a percentage of some base,
/// the way Kubernetes expresses `maxSurge`/`maxUnavailable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum IntOrString {
    Int(i32),
    String(String),
}

impl IntOrString {
    /// Resolves this value against `total`, rounding surge up and
    /// unavailable down, matching the rolling-update math in spec.md 4.I.
    pub fn resolve(&self, total: i32, round_up: bool) -> Result<i32, IntOrStringError> {
        match self {
            IntOrString::Int(v) => Ok(*v),
            IntOrString::String(s) => {
                let pct = s
                    .strip_suffix('%')
                    .ok_or_else(|| IntOrStringError::NotAPercentage(s.clone()))?;
                let pct: f64 = pct
                    .parse()
                    .map_err(|_| IntOrStringError::NotAPercentage(s.clone()))?;
                let raw = (pct / 100.0) * f64::from(total);
                Ok(if round_up { raw.ceil() as i32 } else { raw.floor() as i32 })
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntOrStringError {
    #[error("value {0:?} is neither an integer nor a percentage")]
    NotAPercentage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_or_string_resolves_integers_verbatim() {
        assert_eq!(IntOrString::Int(2).resolve(10, true).unwrap(), 2);
    }

    #[test]
    fn int_or_string_rounds_surge_up_and_unavailable_down() {
        // 25% of 10 = 2.5
        assert_eq!(
            IntOrString::String("25%".into()).resolve(10, true).unwrap(),
            3
        );
        assert_eq!(
            IntOrString::String("25%".into())
                .resolve(10, false)
                .unwrap(),
            2
        );
    }
}

//! The `MachineDeployment` object: rolling-update controller over
//! MachineSets (spec.md 3, 4.I).

use serde::{Deserialize, Serialize};

use crate::conditions::Condition;
use crate::machine::API_VERSION;
use crate::machineset::MachineTemplateSpec;
use crate::metadata::ObjectMeta;
use crate::selector::LabelSelector;
use crate::IntOrString;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeployment {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: MachineDeploymentSpec,
    #[serde(default)]
    pub status: MachineDeploymentStatus,
}

impl MachineDeployment {
    pub fn new(metadata: ObjectMeta, spec: MachineDeploymentSpec) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: "MachineDeployment".to_string(),
            metadata,
            spec,
            status: MachineDeploymentStatus::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingUpdateMachineDeployment {
    pub max_surge: IntOrString,
    pub max_unavailable: IntOrString,
}

impl Default for RollingUpdateMachineDeployment {
    fn default() -> Self {
        Self {
            max_surge: IntOrString::Int(1),
            max_unavailable: IntOrString::Int(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MachineDeploymentStrategy {
    RollingUpdate {
        #[serde(default)]
        rolling_update: RollingUpdateMachineDeployment,
    },
}

impl Default for MachineDeploymentStrategy {
    fn default() -> Self {
        MachineDeploymentStrategy::RollingUpdate {
            rolling_update: RollingUpdateMachineDeployment::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentSpec {
    pub replicas: i32,
    pub selector: LabelSelector,
    pub template: MachineTemplateSpec,
    #[serde(default)]
    pub strategy: MachineDeploymentStrategy,
    #[serde(default = "default_revision_history_limit")]
    pub revision_history_limit: i32,
    #[serde(default)]
    pub paused: bool,
    #[serde(default = "default_progress_deadline_seconds")]
    pub progress_deadline_seconds: i32,
}

fn default_revision_history_limit() -> i32 {
    10
}

fn default_progress_deadline_seconds() -> i32 {
    600
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MachineDeploymentPhase {
    Progressing,
    Available,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MachineDeploymentStatus {
    pub replicas: i32,
    pub ready_replicas: i32,
    pub available_replicas: i32,
    pub updated_replicas: i32,
    pub observed_generation: i64,
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_strategy_is_rolling_update_with_surge_one() {
        let strategy = MachineDeploymentStrategy::default();
        match strategy {
            MachineDeploymentStrategy::RollingUpdate { rolling_update } => {
                assert_eq!(rolling_update.max_surge, IntOrString::Int(1));
            }
        }
    }
}

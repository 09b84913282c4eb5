//! The `MachineSet` object: replica control over Machines sharing a
//! template (spec.md 3, 4.H).

use serde::{Deserialize, Serialize};

use crate::machine::{MachineSpec, API_VERSION};
use crate::metadata::ObjectMeta;
use crate::selector::LabelSelector;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSet {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: MachineSetSpec,
    #[serde(default)]
    pub status: MachineSetStatus,
}

impl MachineSet {
    pub fn new(metadata: ObjectMeta, spec: MachineSetSpec) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: "MachineSet".to_string(),
            metadata,
            spec,
            status: MachineSetStatus::default(),
        }
    }
}

/// Template from which a MachineSet (or MachineDeployment) produces child
/// Machines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineTemplateSpec {
    #[serde(default)]
    pub labels: std::collections::BTreeMap<String, String>,
    pub spec: MachineSpec,
}

/// Delete-priority policy applied when scaling down (spec.md 4.H).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeletePriority {
    Random,
    Newest,
    Oldest,
    #[default]
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSetSpec {
    pub replicas: i32,
    pub selector: LabelSelector,
    pub template: MachineTemplateSpec,
    #[serde(default)]
    pub delete_priority: DeletePriority,
    #[serde(default)]
    pub min_ready_seconds: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MachineSetStatus {
    pub replicas: i32,
    pub ready_replicas: i32,
    pub available_replicas: i32,
    pub fully_labeled_replicas: i32,
    pub observed_generation: i64,
}

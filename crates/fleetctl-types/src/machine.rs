//! The `Machine` object: desired state of one node (spec.md 3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::conditions::Condition;
use crate::metadata::ObjectMeta;

/// `apiVersion` carried by every canonical fleetctl object (spec.md 6).
pub const API_VERSION: &str = "fleetctl.io/v1alpha1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: MachineSpec,
    #[serde(default)]
    pub status: MachineStatus,
}

impl Machine {
    pub fn new(metadata: ObjectMeta, spec: MachineSpec) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: "Machine".to_string(),
            metadata,
            spec,
            status: MachineStatus::default(),
        }
    }
}

/// Cloud-provider discriminator. New providers are registered in one table
/// at compile time (spec.md 9, "Dynamic polymorphism over clouds").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CloudProvider {
    Aws,
    Azure,
    Gcp,
    EquinixMetal,
    Vsphere,
    None,
}

/// The opaque, provider-specific configuration blob, typed by the
/// `cloudProvider` discriminator (spec.md 6, "provider-specific config is a
/// nested opaque JSON blob").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    pub cloud_provider: CloudProvider,
    /// Opaque provider configuration, validated by the matching driver
    /// (fleetctl-provider) rather than by this crate.
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineVersions {
    pub kubelet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    pub provider_spec: ProviderSpec,
    pub versions: MachineVersions,
    #[serde(default)]
    pub node_labels: BTreeMap<String, String>,
    #[serde(default)]
    pub node_taints: Vec<NodeTaint>,
    #[serde(default)]
    pub node_annotations: BTreeMap<String, String>,
    /// Defaults to `metadata.name` if unset (spec.md 3).
    #[serde(default)]
    pub node_name: Option<String>,
    /// Authorized-keys lines injected into the node's userdata.
    #[serde(default)]
    pub ssh_authorized_keys: Vec<String>,
    /// Deprecated dynamic kubelet config-source reference, forbidden from
    /// `versions.kubelet` 1.24 onward.
    #[serde(default)]
    pub kubelet_config_source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTaint {
    pub key: String,
    pub value: String,
    pub effect: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MachineAddressType {
    ExternalIp,
    InternalIp,
    ExternalDns,
    InternalDns,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineAddress {
    #[serde(rename = "type")]
    pub kind: MachineAddressType,
    pub address: String,
}

/// Sum type of terminal provider errors (spec.md 4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MachineErrorReason {
    InvalidConfiguration,
    CreateFailed,
    DeleteFailed,
    InsufficientResources,
    UpdateFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineError {
    pub reason: MachineErrorReason,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRef {
    pub name: String,
    pub uid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MachineStatus {
    pub provider_instance_id: Option<String>,
    pub addresses: Vec<MachineAddress>,
    pub error: Option<MachineError>,
    pub node_ref: Option<NodeRef>,
    pub conditions: Vec<Condition>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Observed `metadata.generation`; see invariant in spec.md 4.H.
    pub observed_generation: i64,
}

impl MachineStatus {
    pub fn has_terminal_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_joined(&self) -> bool {
        self.node_ref.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ObjectMeta;

    fn sample_spec() -> MachineSpec {
        MachineSpec {
            provider_spec: ProviderSpec {
                cloud_provider: CloudProvider::Aws,
                value: serde_json::json!({"instanceType": "m5.large"}),
            },
            versions: MachineVersions {
                kubelet: "1.28.0".to_string(),
            },
            node_labels: BTreeMap::new(),
            node_taints: Vec::new(),
            node_annotations: BTreeMap::new(),
            node_name: None,
            ssh_authorized_keys: Vec::new(),
            kubelet_config_source: None,
        }
    }

    #[test]
    fn round_trip_through_json_is_semantically_equal() {
        let machine = Machine::new(ObjectMeta::new("default", "m1"), sample_spec());
        let json = serde_json::to_string(&machine).unwrap();
        let back: Machine = serde_json::from_str(&json).unwrap();
        assert_eq!(machine, back);
    }

    #[test]
    fn status_has_terminal_error_reflects_error_presence() {
        let mut status = MachineStatus::default();
        assert!(!status.has_terminal_error());
        status.error = Some(MachineError {
            reason: MachineErrorReason::InvalidConfiguration,
            message: "bad config".to_string(),
        });
        assert!(status.has_terminal_error());
    }
}

//! Common object metadata: names, labels, owner references, finalizers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The `delete-node` finalizer every created [`crate::Machine`] carries
/// (spec.md 3, "Finalizers and owner references").
pub const FINALIZER_DELETE_NODE: &str = "fleetctl.io/delete-node";

/// The foreground-deletion finalizer carried by MachineSets and
/// MachineDeployments so children are reaped before the parent is removed.
pub const FINALIZER_FOREGROUND_DELETION: &str = "fleetctl.io/foreground-deletion";

/// An opaque finalizer string.
pub type Finalizer = String;

/// Metadata header shared by every fleetctl object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    pub namespace: String,
    pub uid: String,
    /// Bumped by the store on every spec write; unaffected by status writes.
    pub generation: i64,
    /// Opaque version token used for compare-and-swap writes (spec.md 4.A).
    pub resource_version: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub owner_references: Vec<OwnerReference>,
    pub finalizers: Vec<Finalizer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    pub creation_timestamp: DateTime<Utc>,
}

impl Default for ObjectMeta {
    fn default() -> Self {
        Self {
            name: String::new(),
            generate_name: None,
            namespace: "default".to_string(),
            uid: String::new(),
            generation: 0,
            resource_version: String::new(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            owner_references: Vec::new(),
            finalizers: Vec::new(),
            deletion_timestamp: None,
            creation_timestamp: Utc::now(),
        }
    }
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn is_being_deleted(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Adds `finalizer` if absent. Returns whether the set changed.
    pub fn add_finalizer(&mut self, finalizer: &str) -> bool {
        if self.has_finalizer(finalizer) {
            return false;
        }
        self.finalizers.push(finalizer.to_string());
        true
    }

    /// Removes `finalizer` if present. Returns whether the set changed.
    pub fn remove_finalizer(&mut self, finalizer: &str) -> bool {
        let before = self.finalizers.len();
        self.finalizers.retain(|f| f != finalizer);
        before != self.finalizers.len()
    }

    /// True once deletion has been requested and every finalizer has been
    /// cleared -- the store is free to drop the object (spec.md 8, invariant).
    pub fn is_finalized_for_deletion(&self) -> bool {
        self.is_being_deleted() && self.finalizers.is_empty()
    }

    /// The controller owner reference, if one is set (spec.md 3: "each set
    /// owns its machines", established controller-style).
    pub fn controller_ref(&self) -> Option<&OwnerReference> {
        self.owner_references.iter().find(|o| o.controller)
    }

    pub fn is_controlled_by(&self, kind: &str, name: &str) -> bool {
        self.controller_ref()
            .is_some_and(|o| o.kind == kind && o.name == name)
    }
}

/// A back-pointer from a child object to its logical parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
    /// True for the unique authoritative parent.
    pub controller: bool,
    pub block_owner_deletion: bool,
}

impl OwnerReference {
    pub fn controller(api_version: &str, kind: &str, name: &str, uid: &str) -> Self {
        Self {
            api_version: api_version.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            uid: uid.to_string(),
            controller: true,
            block_owner_deletion: true,
        }
    }
}

//! Minimal node/pod views eviction needs (spec.md 4.F). The cluster API
//! server's full Node/Pod schemas are an external collaborator; this crate
//! only specifies the fields that drive the drain decision.

use serde::{Deserialize, Serialize};

/// Annotation that opts a node out of eviction entirely.
pub const SKIP_EVICTION_ANNOTATION: &str = "fleetctl.io/skip-eviction";

/// Annotation on the `kubernetes.io/config.mirror` key marks a static
/// (mirror) pod, which cannot be evicted through the API.
pub const MIRROR_POD_ANNOTATION: &str = "kubernetes.io/config.mirror";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub annotations: std::collections::BTreeMap<String, String>,
    pub unschedulable: bool,
}

impl Node {
    pub fn skip_eviction(&self) -> bool {
        self.annotations.contains_key(SKIP_EVICTION_ANNOTATION)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    pub namespace: String,
    pub name: String,
    pub phase: PodPhase,
    /// Controller kind from the pod's controller owner-reference, if any
    /// (e.g. `"DaemonSet"`).
    pub controller_kind: Option<String>,
    #[serde(default)]
    pub annotations: std::collections::BTreeMap<String, String>,
}

impl Pod {
    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, PodPhase::Succeeded | PodPhase::Failed)
    }

    pub fn is_daemonset_controlled(&self) -> bool {
        self.controller_kind.as_deref() == Some("DaemonSet")
    }

    pub fn is_mirror(&self) -> bool {
        self.annotations.contains_key(MIRROR_POD_ANNOTATION)
    }

    /// Whether this pod must be evicted as part of draining the node
    /// (spec.md 4.F: "filter out succeeded/failed pods, daemonset-controlled
    /// pods, and mirror pods").
    pub fn requires_eviction(&self) -> bool {
        !self.is_terminal() && !self.is_daemonset_controlled() && !self.is_mirror()
    }
}

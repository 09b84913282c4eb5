//! Configuration management for the fleetctl controller-manager binary.
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence, applied by `fleetctl-cli`)
//! 2. Environment variables (`FLEETCTL_*` prefix)
//! 3. fleetctl.local.toml (gitignored, local overrides)
//! 4. fleetctl.toml (git-tracked, project config)
//! 5. ~/.config/fleetctl/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Top-level configuration for the fleetctl controller-manager (spec.md §6
/// "CLI surface").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetctlConfig {
    pub store: StoreConfig,
    pub worker_pools: WorkerPoolConfig,
    pub leader_election: LeaderElectionConfig,
    pub observability: ObservabilityConfig,
    pub lifecycle: LifecycleConfig,
    pub node: NodeConfig,
}

/// How to reach the object store (spec.md 4.A).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to a kubeconfig-equivalent credentials file. `None` means
    /// in-cluster/ambient credentials.
    pub kubeconfig: Option<PathBuf>,
    /// Object-store API endpoint. `None` means derive from `kubeconfig`.
    pub master: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            master: None,
        }
    }
}

/// Work-queue worker counts, one pool per reconciler kind (spec.md 4.B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    pub machine: u32,
    pub machine_set: u32,
    pub machine_deployment: u32,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            machine: 5,
            machine_set: 5,
            machine_deployment: 5,
        }
    }
}

/// Leader-election gate (spec.md 4.C).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderElectionConfig {
    pub enabled: bool,
    pub namespace: String,
    /// Distinguishes shards of the same controller running against
    /// disjoint worker classes, per spec.md §6 "worker class name".
    pub worker_class: Option<String>,
}

impl Default for LeaderElectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "fleetctl-system".to_string(),
            worker_class: None,
        }
    }
}

/// Metrics and health-probe listen addresses (spec.md §6 observability).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_listen_address: String,
    pub health_listen_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_listen_address: "0.0.0.0:9090".to_string(),
            health_listen_address: "0.0.0.0:9091".to_string(),
        }
    }
}

/// Timeouts governing node lifecycle transitions (spec.md 4.E, 4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub join_cluster_timeout_secs: u64,
    pub skip_eviction_timeout_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            join_cluster_timeout_secs: 600,
            skip_eviction_timeout_secs: 60,
        }
    }
}

/// Node bootstrap settings threaded through to the userdata generator
/// (spec.md 4.E), mirroring `fleetctl_bootstrap::NodeSettings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub external_cloud_provider: bool,
    pub container_runtime: String,
    pub cluster_dns_ips: Vec<String>,
    pub proxy: ProxyConfig,
    pub insecure_registries: Vec<String>,
    pub pause_image: String,
    pub kubelet_feature_gates: BTreeMap<String, bool>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            external_cloud_provider: false,
            container_runtime: "containerd".to_string(),
            cluster_dns_ips: Vec::new(),
            proxy: ProxyConfig::default(),
            insecure_registries: Vec::new(),
            pause_image: "registry.k8s.io/pause:3.9".to_string(),
            kubelet_feature_gates: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Vec<String>,
}

impl FleetctlConfig {
    /// Load configuration from default locations, rooted at the current
    /// working directory.
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration rooted at a specific project directory.
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Convert this configuration's node settings into the shape
    /// `fleetctl-bootstrap` consumes.
    pub fn to_node_settings(&self) -> fleetctl_bootstrap::NodeSettings {
        fleetctl_bootstrap::NodeSettings {
            cluster_dns_ips: self.node.cluster_dns_ips.clone(),
            http_proxy: self.node.proxy.http_proxy.clone(),
            https_proxy: self.node.proxy.https_proxy.clone(),
            no_proxy: self.node.proxy.no_proxy.clone(),
            insecure_registries: self.node.insecure_registries.clone(),
            pause_image: self.node.pause_image.clone(),
            container_runtime: self.node.container_runtime.clone(),
            kubelet_feature_gates: self.node.kubelet_feature_gates.clone(),
            cloud_provider_external: self.node.external_cloud_provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FleetctlConfig::default();
        assert_eq!(config.worker_pools.machine, 5);
        assert_eq!(config.observability.metrics_listen_address, "0.0.0.0:9090");
        assert!(config.leader_election.enabled);
        assert_eq!(config.node.container_runtime, "containerd");
    }

    #[test]
    fn test_to_node_settings() {
        let mut config = FleetctlConfig::default();
        config.node.pause_image = "registry.example.com/pause:3.10".to_string();
        let settings = config.to_node_settings();
        assert_eq!(settings.pause_image, "registry.example.com/pause:3.10");
        assert_eq!(settings.container_runtime, "containerd");
        assert!(!settings.cloud_provider_external);
    }
}

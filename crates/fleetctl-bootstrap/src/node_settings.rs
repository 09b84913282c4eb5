//! Node-level boot settings threaded into the userdata generator (spec.md
//! 4.E).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    pub cluster_dns_ips: Vec<String>,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub no_proxy: Vec<String>,
    pub insecure_registries: Vec<String>,
    pub pause_image: String,
    pub container_runtime: String,
    #[serde(default)]
    pub kubelet_feature_gates: std::collections::BTreeMap<String, bool>,
    pub cloud_provider_external: bool,
}

impl NodeSettings {
    pub fn new(container_runtime: impl Into<String>, pause_image: impl Into<String>) -> Self {
        Self {
            container_runtime: container_runtime.into(),
            pause_image: pause_image.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_leaves_optional_fields_empty() {
        let settings = NodeSettings::new("containerd", "registry.k8s.io/pause:3.9");
        assert!(settings.cluster_dns_ips.is_empty());
        assert!(settings.http_proxy.is_none());
        assert!(!settings.cloud_provider_external);
    }
}

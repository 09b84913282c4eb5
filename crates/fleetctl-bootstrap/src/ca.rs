//! Cluster CA discovery: the well-known public configmap, with a fallback
//! reconstruction path (spec.md 4.E).

use crate::error::{BootstrapError, Result};

/// PEM-encoded cluster CA certificate data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterCaData(pub String);

/// Where the cluster CA is actually served from is an external collaborator
/// (the cluster API server and its `kube-root-ca.crt` configmap); this crate
/// only specifies the two-step lookup order.
pub trait ClusterCaSource: Send + Sync {
    /// Reads CA data from the well-known public configmap, if present.
    fn read_well_known_configmap(&self) -> impl std::future::Future<Output = Option<ClusterCaData>> + Send;

    /// Reconstructs CA data from the `kubernetes` service's endpoint TLS
    /// material, used when the configmap is absent (older clusters).
    fn reconstruct_from_endpoints(&self) -> impl std::future::Future<Output = Option<ClusterCaData>> + Send;
}

/// Resolves cluster CA data, preferring the well-known configmap and falling
/// back to endpoint reconstruction (spec.md 4.E).
pub async fn resolve_cluster_ca<S: ClusterCaSource>(source: &S) -> Result<ClusterCaData> {
    if let Some(ca) = source.read_well_known_configmap().await {
        return Ok(ca);
    }
    source
        .reconstruct_from_endpoints()
        .await
        .ok_or_else(|| BootstrapError::NoClusterCa("configmap and endpoint reconstruction both failed".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConfigmapSource;
    impl ClusterCaSource for ConfigmapSource {
        async fn read_well_known_configmap(&self) -> Option<ClusterCaData> {
            Some(ClusterCaData("configmap-ca".into()))
        }
        async fn reconstruct_from_endpoints(&self) -> Option<ClusterCaData> {
            None
        }
    }

    struct FallbackSource;
    impl ClusterCaSource for FallbackSource {
        async fn read_well_known_configmap(&self) -> Option<ClusterCaData> {
            None
        }
        async fn reconstruct_from_endpoints(&self) -> Option<ClusterCaData> {
            Some(ClusterCaData("reconstructed-ca".into()))
        }
    }

    struct NoneSource;
    impl ClusterCaSource for NoneSource {
        async fn read_well_known_configmap(&self) -> Option<ClusterCaData> {
            None
        }
        async fn reconstruct_from_endpoints(&self) -> Option<ClusterCaData> {
            None
        }
    }

    #[tokio::test]
    async fn prefers_configmap_over_reconstruction() {
        let ca = resolve_cluster_ca(&ConfigmapSource).await.unwrap();
        assert_eq!(ca.0, "configmap-ca");
    }

    #[tokio::test]
    async fn falls_back_to_reconstruction_when_configmap_absent() {
        let ca = resolve_cluster_ca(&FallbackSource).await.unwrap();
        assert_eq!(ca.0, "reconstructed-ca");
    }

    #[tokio::test]
    async fn errors_when_both_sources_fail() {
        let err = resolve_cluster_ca(&NoneSource).await.unwrap_err();
        assert!(matches!(err, BootstrapError::NoClusterCa(_)));
    }
}

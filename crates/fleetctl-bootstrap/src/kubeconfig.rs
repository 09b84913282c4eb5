//! Kubeconfig rendering for the future kubelet (spec.md 4.E).

use crate::ca::ClusterCaData;
use crate::token::BootstrapToken;
use base64::Engine;

#[derive(Debug, Clone)]
pub struct KubeconfigParams<'a> {
    pub cluster_name: &'a str,
    pub server: &'a str,
    pub ca: &'a ClusterCaData,
    pub token: &'a BootstrapToken,
}

/// Renders a minimal bootstrap kubeconfig: one cluster, one user
/// authenticating with the bearer token, one context.
pub fn render(params: &KubeconfigParams<'_>) -> String {
    let ca_b64 = base64::engine::general_purpose::STANDARD.encode(params.ca.0.as_bytes());
    format!(
        "apiVersion: v1\n\
kind: Config\n\
clusters:\n\
- name: {cluster}\n\
  cluster:\n\
    server: {server}\n\
    certificate-authority-data: {ca}\n\
users:\n\
- name: bootstrap\n\
  user:\n\
    token: {bearer}\n\
contexts:\n\
- name: bootstrap@{cluster}\n\
  context:\n\
    cluster: {cluster}\n\
    user: bootstrap\n\
current-context: bootstrap@{cluster}\n",
        cluster = params.cluster_name,
        server = params.server,
        ca = ca_b64,
        bearer = params.token.bearer(),
    )
}

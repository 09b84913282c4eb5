//! The `CertificateSigningRequest` object (spec.md 4.K). fleetctl's store
//! carries certificate requests the same way it carries every other
//! object: typed JSON, not raw DER. The fields the approver inspects
//! (requester identity, key usages, subject, SANs) are therefore already
//! parsed out of the PKCS#10 request by whatever admits the CSR into the
//! store, mirroring how [`fleetctl_types::ProviderSpec`] carries a typed
//! blob rather than a provider-specific wire format.

use fleetctl_types::ObjectMeta;
use fleetctl_runtime::{ObjectKey, StoreObject};
use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "fleetctl.io/v1alpha1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyUsage {
    DigitalSignature,
    KeyEncipherment,
    ServerAuth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSigningRequestSpec {
    /// The identity that submitted the request, e.g. `system:node:worker-1`.
    pub username: String,
    #[serde(default)]
    pub groups: Vec<String>,
    pub usages: Vec<KeyUsage>,
    pub subject_common_name: String,
    #[serde(default)]
    pub subject_organization: Vec<String>,
    #[serde(default)]
    pub dns_sans: Vec<String>,
    #[serde(default)]
    pub ip_sans: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CertificateSigningRequestStatus {
    pub approved: bool,
    pub denied: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSigningRequest {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: CertificateSigningRequestSpec,
    #[serde(default)]
    pub status: CertificateSigningRequestStatus,
}

impl CertificateSigningRequest {
    pub fn new(metadata: ObjectMeta, spec: CertificateSigningRequestSpec) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: "CertificateSigningRequest".to_string(),
            metadata,
            spec,
            status: CertificateSigningRequestStatus::default(),
        }
    }

    pub fn is_pending(&self) -> bool {
        !self.status.approved && !self.status.denied
    }
}

impl StoreObject for CertificateSigningRequest {
    fn key(&self) -> ObjectKey {
        ObjectKey::new(self.metadata.namespace.clone(), self.metadata.name.clone())
    }

    fn resource_version(&self) -> &str {
        &self.metadata.resource_version
    }
}

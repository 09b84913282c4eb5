//! Bootstrap-issuance errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("store error: {0}")]
    Store(#[from] fleetctl_runtime::StoreError),

    #[error("no cluster CA available: well-known configmap absent and endpoint reconstruction failed: {0}")]
    NoClusterCa(String),

    #[error("userdata generation failed: {0}")]
    UserDataGeneration(String),
}

pub type Result<T> = std::result::Result<T, BootstrapError>;

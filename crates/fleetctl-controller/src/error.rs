//! Controller-wide errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("store error: {0}")]
    Store(#[from] fleetctl_runtime::StoreError),

    #[error("provider error: {0}")]
    Provider(#[from] fleetctl_provider::ProviderError),

    #[error("eviction error: {0}")]
    Eviction(#[from] fleetctl_eviction::EvictionError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ControllerError>;

//! Crate-wide errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CsrError {
    #[error("store error: {0}")]
    Store(#[from] fleetctl_runtime::StoreError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CsrError>;

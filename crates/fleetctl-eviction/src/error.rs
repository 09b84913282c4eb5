//! Eviction errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvictionError {
    #[error("node driver error: {0}")]
    NodeDriver(String),

    #[error("pod lister error: {0}")]
    PodLister(String),

    #[error("eviction request failed: {0}")]
    EvictionRequest(String),
}

pub type Result<T> = std::result::Result<T, EvictionError>;

//! Admission-handler errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("decoding request body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unknown kind {0:?}, expected Machine or MachineDeployment")]
    UnknownKind(String),

    #[error("tls: {0}")]
    Tls(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AdmissionError>;

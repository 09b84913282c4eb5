//! Provider dispatch errors.

use fleetctl_types::MachineErrorReason;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no driver registered for provider {0:?}")]
    UnknownProvider(fleetctl_types::machine::CloudProvider),

    #[error("{reason:?}: {message}")]
    Terminal {
        reason: MachineErrorReason,
        message: String,
    },

    #[error("provider call timed out")]
    DeadlineExceeded,

    #[error("provider call cancelled")]
    Cancelled,

    #[error("transient provider error: {0}")]
    Transient(String),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    pub fn terminal(reason: MachineErrorReason, message: impl Into<String>) -> Self {
        ProviderError::Terminal {
            reason,
            message: message.into(),
        }
    }

    /// Context-cancellation and deadline-exceeded errors are never cached
    /// (spec.md 4.D).
    pub fn is_cacheable_failure(&self) -> bool {
        !matches!(self, ProviderError::DeadlineExceeded | ProviderError::Cancelled)
    }

    pub fn terminal_reason(&self) -> Option<MachineErrorReason> {
        match self {
            ProviderError::Terminal { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

//! The reconcile outcome vocabulary (spec.md 7): every reconciler's public
//! surface returns one of these instead of a bare `Result`, so the error
//! taxonomy is a first-class return value.

use std::time::Duration;

use fleetctl_types::MachineErrorReason;

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Nothing left to do; the object is in its desired steady state.
    Done,
    /// A transient or eventual condition; try again after `Duration`.
    RequeueAfter(Duration),
    /// A classified terminal failure: persist `reason`/`message` on status
    /// and stop retrying until the spec's generation advances.
    Terminal(MachineErrorReason, String),
}

impl ReconcileOutcome {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReconcileOutcome::Terminal(_, _))
    }

    pub fn requeue_delay(&self) -> Option<Duration> {
        match self {
            ReconcileOutcome::RequeueAfter(d) => Some(*d),
            _ => None,
        }
    }
}

/// Default delay for transient failures before a rate-limited retry kicks
/// in via the work queue's own back-off.
pub const DEFAULT_REQUEUE_DELAY: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_outcome_reports_itself_as_terminal() {
        let outcome = ReconcileOutcome::Terminal(
            MachineErrorReason::InvalidConfiguration,
            "bad".to_string(),
        );
        assert!(outcome.is_terminal());
        assert!(!ReconcileOutcome::Done.is_terminal());
    }
}

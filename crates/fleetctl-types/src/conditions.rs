//! Status conditions tracked on Machine and MachineDeployment objects
//! (spec.md 7: "a condition list tracking `Provisioned`, `NodeHealthy`, and
//! `Progressing`").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ConditionType {
    Provisioned,
    NodeHealthy,
    Progressing,
    Available,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionType,
    pub status: ConditionStatus,
    pub reason: String,
    pub message: String,
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    pub fn new(
        kind: ConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}

/// Sets `condition` in `conditions`, replacing any existing condition of the
/// same type. Only bumps `last_transition_time` when the status actually
/// changes, the way Kubernetes-style condition lists behave.
pub fn set_condition(conditions: &mut Vec<Condition>, new: Condition) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.kind == new.kind) {
        if existing.status != new.status {
            existing.last_transition_time = new.last_transition_time;
        }
        existing.status = new.status;
        existing.reason = new.reason;
        existing.message = new.message;
    } else {
        conditions.push(new);
    }
}

pub fn find_condition(conditions: &[Condition], kind: ConditionType) -> Option<&Condition> {
    conditions.iter().find(|c| c.kind == kind)
}

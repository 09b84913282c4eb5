//! Collaborator interfaces eviction drives (spec.md 4.F). The cluster API
//! server is the real implementation; these traits exist so the drain
//! orchestration in [`crate::drain`] can be exercised without one.

use crate::error::Result;
use crate::types::{Node, Pod};

pub trait NodeDriver: Send + Sync {
    fn get(&self, name: &str) -> impl std::future::Future<Output = Result<Node>> + Send;
    /// Marks the node unschedulable. Idempotent.
    fn cordon(&self, name: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait PodLister: Send + Sync {
    fn list_on_node(&self, node_name: &str) -> impl std::future::Future<Output = Result<Vec<Pod>>> + Send;
}

/// The outcome of one eviction attempt (spec.md 4.F): `TooManyRequests`
/// means a disruption budget is blocking eviction right now, distinct from a
/// hard failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvictOutcome {
    Evicted,
    TooManyRequests,
}

pub trait Evictor: Send + Sync {
    fn evict(&self, pod: &Pod) -> impl std::future::Future<Output = Result<EvictOutcome>> + Send;
}

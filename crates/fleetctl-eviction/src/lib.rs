//! # fleetctl-eviction: node cordon and pod-drain orchestration (spec.md 4.F)
//!
//! Drives one node through cordon, pod listing, and concurrent eviction
//! ahead of machine deprovisioning, bounded by a grace period.

pub mod drain;
pub mod error;
pub mod traits;
pub mod types;

pub use drain::{drain_node, EvictionConfig, EvictionStatus, DEFAULT_GRACE_PERIOD};
pub use error::{EvictionError, Result};
pub use traits::{EvictOutcome, Evictor, NodeDriver, PodLister};
pub use types::{Node, Pod, PodPhase, MIRROR_POD_ANNOTATION, SKIP_EVICTION_ANNOTATION};

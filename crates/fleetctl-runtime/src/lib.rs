//! # fleetctl-runtime: the shared runtime substrate
//!
//! Everything that is process-wide rather than per-reconciler:
//! - [`object_store`]: typed store client + watch-fed cache (spec.md 4.A)
//! - [`queue`]: rate-limited, deduplicating work queue (spec.md 4.B)
//! - [`election`]: leader-election gate (spec.md 4.C)
//! - [`metrics`]: Prometheus registry (spec.md 6)

pub mod election;
pub mod error;
pub mod metrics;
pub mod object_store;
pub mod outcome;
pub mod queue;
pub mod watch;

pub use election::{ElectionTimings, Identity, InMemoryLeaseStore, Lease, LeaseStore};
pub use error::{Result, StoreError};
pub use metrics::Metrics;
pub use object_store::{Cache, ChangeSink, InMemoryStore, ListFilter, ObjectKey, ObjectStore, StoreObject};
pub use outcome::{ReconcileOutcome, DEFAULT_REQUEUE_DELAY};
pub use queue::{spawn_workers, BackoffConfig, WorkQueue};
pub use watch::WatchEvent;

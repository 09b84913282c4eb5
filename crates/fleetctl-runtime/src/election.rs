//! Leader election gate (spec.md 4.C).
//!
//! Races on a named coordination object ("lease") in the store. At most one
//! process-wide replica is ever active; the loser keeps retrying to acquire,
//! the holder keeps renewing until it loses or shuts down.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Timings for the lease race (spec.md 4.C: "typical 15s / 10s / 2s").
#[derive(Debug, Clone, Copy)]
pub struct ElectionTimings {
    pub lease_duration: Duration,
    pub renew_deadline: Duration,
    pub retry_period: Duration,
}

impl Default for ElectionTimings {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_secs(15),
            renew_deadline: Duration::from_secs(10),
            retry_period: Duration::from_secs(2),
        }
    }
}

/// A lease record as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub holder_identity: String,
    pub acquire_time: DateTime<Utc>,
    pub renew_time: DateTime<Utc>,
    pub lease_duration_seconds: i64,
}

impl Lease {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let deadline = self.renew_time + chrono::Duration::seconds(self.lease_duration_seconds);
        now > deadline
    }
}

/// Identity of this process's candidacy: hostname plus a per-start random
/// token so two processes on one host do not collide (spec.md 4.C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(String);

impl Identity {
    pub fn generate(hostname: &str) -> Self {
        let token: u64 = rand::thread_rng().gen();
        Identity(format!("{hostname}_{token:016x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Races for a named lease, namespaced by an optional worker-class label so
/// sharded controllers can run disjoint lease pools (spec.md 4.C).
pub fn lease_name(base: &str, worker_class: Option<&str>) -> String {
    match worker_class {
        Some(class) if !class.is_empty() => format!("{base}-{class}"),
        _ => base.to_string(),
    }
}

/// Abstraction over the lease object's backing store, so the election gate
/// doesn't depend on a concrete `ObjectStore<Lease>` instantiation.
pub trait LeaseStore: Send + Sync {
    fn try_acquire_or_renew(
        &self,
        name: &str,
        identity: &Identity,
        timings: ElectionTimings,
    ) -> impl std::future::Future<Output = bool> + Send;
    fn release(&self, name: &str, identity: &Identity) -> impl std::future::Future<Output = ()> + Send;
}

/// An in-memory lease store, the reference implementation used by tests and
/// single-process deployments talking to the in-memory object store.
#[derive(Clone, Default)]
pub struct InMemoryLeaseStore {
    lease: Arc<RwLock<Option<Lease>>>,
}

impl LeaseStore for InMemoryLeaseStore {
    async fn try_acquire_or_renew(&self, _name: &str, identity: &Identity, timings: ElectionTimings) -> bool {
        let now = Utc::now();
        let mut guard = self.lease.write().await;
        match guard.as_mut() {
            Some(existing) if existing.holder_identity == identity.as_str() => {
                existing.renew_time = now;
                true
            }
            Some(existing) if !existing.is_expired(now) => false,
            _ => {
                *guard = Some(Lease {
                    holder_identity: identity.as_str().to_string(),
                    acquire_time: now,
                    renew_time: now,
                    lease_duration_seconds: timings.lease_duration.as_secs() as i64,
                });
                true
            }
        }
    }

    async fn release(&self, _name: &str, identity: &Identity) {
        let mut guard = self.lease.write().await;
        if guard.as_ref().is_some_and(|l| l.holder_identity == identity.as_str()) {
            *guard = None;
        }
    }
}

/// Runs the leader-election loop: while not holding the lease, retries every
/// `retry_period`; once held, renews every `retry_period` and invokes
/// `on_acquired` once, then `on_lost` (which cancels `root`) the moment a
/// renewal fails within `renew_deadline` (spec.md 4.C).
pub async fn run_until_cancelled<L, A, Lo>(
    lease_store: L,
    lease_name: String,
    identity: Identity,
    timings: ElectionTimings,
    root: CancellationToken,
    on_acquired: A,
    on_lost: Lo,
) where
    L: LeaseStore,
    A: FnOnce() + Send,
    Lo: FnOnce() + Send,
{
    let mut holding = false;
    loop {
        if root.is_cancelled() {
            if holding {
                lease_store.release(&lease_name, &identity).await;
            }
            return;
        }

        let acquired = tokio::select! {
            _ = root.cancelled() => {
                if holding {
                    lease_store.release(&lease_name, &identity).await;
                }
                return;
            }
            acquired = lease_store.try_acquire_or_renew(&lease_name, &identity, timings) => acquired,
        };

        if acquired && !holding {
            holding = true;
            info!(identity = identity.as_str(), lease = %lease_name, "acquired leadership");
            on_acquired();
        } else if !acquired && holding {
            holding = false;
            warn!(identity = identity.as_str(), lease = %lease_name, "lost leadership");
            root.cancel();
            on_lost();
            return;
        }

        tokio::time::sleep(timings.retry_period).await;
    }
}

//! Orchestrates one node's drain: cordon, list, filter, evict concurrently
//! (spec.md 4.F). Called repeatedly by the Machine reconciler's S4 step
//! until it reports [`EvictionStatus::Done`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::traits::{EvictOutcome, Evictor, NodeDriver, PodLister};

/// Default grace period bounding total eviction time (spec.md 4.F).
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Clone)]
pub struct EvictionConfig {
    pub grace_period: Duration,
    pub cordon_poll_attempts: u32,
    pub cordon_poll_interval: Duration,
    pub eviction_retry_attempts: u32,
    pub eviction_retry_delay: Duration,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            cordon_poll_attempts: 50,
            cordon_poll_interval: Duration::from_millis(100),
            eviction_retry_attempts: 3,
            eviction_retry_delay: Duration::from_millis(50),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionStatus {
    /// Nothing left to evict (or the node opted out, or the grace period
    /// elapsed): the caller may proceed to deprovision.
    Done,
    /// At least one pod is still blocked; the caller should requeue.
    NotYetDone,
}

/// Runs one pass of the drain state machine for `node_name`.
///
/// `started_at` is the time the owning Machine's deletion began; once
/// `grace_period` has elapsed since then, this returns `Done` regardless of
/// outstanding pods (spec.md 4.F: "A grace period... bounds total eviction
/// time; after that the reconciler proceeds to deprovision regardless").
pub async fn drain_node<N, P, E>(
    node_driver: &N,
    pod_lister: &P,
    evictor: &E,
    node_name: &str,
    config: &EvictionConfig,
    started_at: DateTime<Utc>,
) -> Result<EvictionStatus>
where
    N: NodeDriver,
    P: PodLister,
    E: Evictor,
{
    let node = node_driver.get(node_name).await?;
    if node.skip_eviction() {
        info!(node_name, "skip-eviction annotation present, not draining");
        return Ok(EvictionStatus::Done);
    }

    if grace_period_elapsed(started_at, config.grace_period) {
        warn!(node_name, "eviction grace period elapsed, proceeding regardless");
        return Ok(EvictionStatus::Done);
    }

    if !node.unschedulable {
        node_driver.cordon(node_name).await?;
    }
    if !wait_for_cordon(node_driver, node_name, config).await? {
        debug!(node_name, "cordon not yet observed, requeueing");
        return Ok(EvictionStatus::NotYetDone);
    }

    let pods: Vec<_> = pod_lister
        .list_on_node(node_name)
        .await?
        .into_iter()
        .filter(crate::types::Pod::requires_eviction)
        .collect();

    if pods.is_empty() {
        return Ok(EvictionStatus::Done);
    }

    let outcomes = join_all(
        pods.iter()
            .map(|pod| evict_with_retry(evictor, pod, config)),
    )
    .await;

    let mut all_evicted = true;
    for outcome in outcomes {
        match outcome? {
            EvictOutcome::Evicted => {}
            EvictOutcome::TooManyRequests => all_evicted = false,
        }
    }

    Ok(if all_evicted {
        EvictionStatus::Done
    } else {
        EvictionStatus::NotYetDone
    })
}

fn grace_period_elapsed(started_at: DateTime<Utc>, grace_period: Duration) -> bool {
    let elapsed = Utc::now().signed_duration_since(started_at);
    elapsed
        .to_std()
        .map(|elapsed| elapsed >= grace_period)
        .unwrap_or(false)
}

async fn wait_for_cordon<N: NodeDriver>(
    node_driver: &N,
    node_name: &str,
    config: &EvictionConfig,
) -> Result<bool> {
    for _ in 0..config.cordon_poll_attempts {
        if node_driver.get(node_name).await?.unschedulable {
            return Ok(true);
        }
        tokio::time::sleep(config.cordon_poll_interval).await;
    }
    Ok(false)
}

async fn evict_with_retry<E: Evictor>(
    evictor: &E,
    pod: &crate::types::Pod,
    config: &EvictionConfig,
) -> Result<EvictOutcome> {
    let mut attempt = 0;
    loop {
        match evictor.evict(pod).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) if attempt + 1 < config.eviction_retry_attempts => {
                warn!(pod = %pod.name, attempt, error = %err, "eviction request failed, retrying");
                attempt += 1;
                tokio::time::sleep(config.eviction_retry_delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvictionError;
    use crate::types::{Node, Pod, PodPhase};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct FakeNodes {
        node: Mutex<Node>,
    }

    impl NodeDriver for FakeNodes {
        async fn get(&self, name: &str) -> Result<Node> {
            let node = self.node.lock().unwrap();
            assert_eq!(node.name, name);
            Ok(node.clone())
        }

        async fn cordon(&self, _name: &str) -> Result<()> {
            self.node.lock().unwrap().unschedulable = true;
            Ok(())
        }
    }

    struct FakePods(Vec<Pod>);
    impl PodLister for FakePods {
        async fn list_on_node(&self, _node_name: &str) -> Result<Vec<Pod>> {
            Ok(self.0.clone())
        }
    }

    struct AlwaysEvicts;
    impl Evictor for AlwaysEvicts {
        async fn evict(&self, _pod: &Pod) -> Result<EvictOutcome> {
            Ok(EvictOutcome::Evicted)
        }
    }

    struct AlwaysBlocked;
    impl Evictor for AlwaysBlocked {
        async fn evict(&self, _pod: &Pod) -> Result<EvictOutcome> {
            Ok(EvictOutcome::TooManyRequests)
        }
    }

    struct FailsNTimes(AtomicU32, u32);
    impl Evictor for FailsNTimes {
        async fn evict(&self, _pod: &Pod) -> Result<EvictOutcome> {
            let attempt = self.0.fetch_add(1, Ordering::SeqCst);
            if attempt < self.1 {
                Err(EvictionError::EvictionRequest("transient".into()))
            } else {
                Ok(EvictOutcome::Evicted)
            }
        }
    }

    fn running_pod(name: &str) -> Pod {
        Pod {
            namespace: "default".into(),
            name: name.into(),
            phase: PodPhase::Running,
            controller_kind: None,
            annotations: BTreeMap::new(),
        }
    }

    fn fast_config() -> EvictionConfig {
        EvictionConfig {
            cordon_poll_interval: Duration::from_millis(1),
            eviction_retry_delay: Duration::from_millis(1),
            ..EvictionConfig::default()
        }
    }

    #[tokio::test]
    async fn node_with_skip_annotation_is_not_touched() {
        let mut annotations = BTreeMap::new();
        annotations.insert(crate::types::SKIP_EVICTION_ANNOTATION.to_string(), "true".into());
        let nodes = FakeNodes {
            node: Mutex::new(Node {
                name: "n1".into(),
                annotations,
                unschedulable: false,
            }),
        };
        let pods = FakePods(vec![running_pod("p1")]);
        let status = drain_node(
            &nodes,
            &pods,
            &AlwaysEvicts,
            "n1",
            &fast_config(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(status, EvictionStatus::Done);
        assert!(!nodes.node.lock().unwrap().unschedulable);
    }

    #[tokio::test]
    async fn drain_cordons_evicts_and_completes() {
        let nodes = FakeNodes {
            node: Mutex::new(Node {
                name: "n1".into(),
                annotations: BTreeMap::new(),
                unschedulable: false,
            }),
        };
        let pods = FakePods(vec![running_pod("p1"), running_pod("p2")]);
        let status = drain_node(
            &nodes,
            &pods,
            &AlwaysEvicts,
            "n1",
            &fast_config(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(status, EvictionStatus::Done);
        assert!(nodes.node.lock().unwrap().unschedulable);
    }

    #[tokio::test]
    async fn blocked_eviction_is_not_yet_done() {
        let nodes = FakeNodes {
            node: Mutex::new(Node {
                name: "n1".into(),
                annotations: BTreeMap::new(),
                unschedulable: false,
            }),
        };
        let pods = FakePods(vec![running_pod("p1")]);
        let status = drain_node(
            &nodes,
            &pods,
            &AlwaysBlocked,
            "n1",
            &fast_config(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(status, EvictionStatus::NotYetDone);
    }

    #[tokio::test]
    async fn grace_period_elapsed_forces_done_even_when_blocked() {
        let nodes = FakeNodes {
            node: Mutex::new(Node {
                name: "n1".into(),
                annotations: BTreeMap::new(),
                unschedulable: true,
            }),
        };
        let pods = FakePods(vec![running_pod("p1")]);
        let mut config = fast_config();
        config.grace_period = Duration::from_secs(0);
        let started_at = Utc::now() - chrono::Duration::seconds(1);
        let status = drain_node(&nodes, &pods, &AlwaysBlocked, "n1", &config, started_at)
            .await
            .unwrap();
        assert_eq!(status, EvictionStatus::Done);
    }

    #[tokio::test]
    async fn transient_eviction_failure_is_retried() {
        let nodes = FakeNodes {
            node: Mutex::new(Node {
                name: "n1".into(),
                annotations: BTreeMap::new(),
                unschedulable: true,
            }),
        };
        let pods = FakePods(vec![running_pod("p1")]);
        let evictor = FailsNTimes(AtomicU32::new(0), 2);
        let status = drain_node(&nodes, &pods, &evictor, "n1", &fast_config(), Utc::now())
            .await
            .unwrap();
        assert_eq!(status, EvictionStatus::Done);
    }

    #[tokio::test]
    async fn daemonset_and_terminal_pods_need_no_eviction() {
        let nodes = FakeNodes {
            node: Mutex::new(Node {
                name: "n1".into(),
                annotations: BTreeMap::new(),
                unschedulable: true,
            }),
        };
        let mut ds_pod = running_pod("ds");
        ds_pod.controller_kind = Some("DaemonSet".into());
        let mut done_pod = running_pod("done");
        done_pod.phase = PodPhase::Succeeded;
        let pods = FakePods(vec![ds_pod, done_pod]);
        let status = drain_node(
            &nodes,
            &pods,
            &AlwaysBlocked,
            "n1",
            &fast_config(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(status, EvictionStatus::Done);
    }
}

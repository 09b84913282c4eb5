//! Typed object-store client plus the watch-fed cache built on top of it
//! (spec.md 4.A).
//!
//! The store itself -- the cluster API server -- is an external
//! collaborator (spec.md 1, out of scope). This module specifies the
//! client-side contract against it: typed get/list/watch/create/update/
//! delete plus a status-update subresource, and the cache a reconciler
//! reads from instead of hitting the store on every call.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::watch::WatchEvent;

/// A namespace/name addressed key, the unit the work queue operates on
/// (spec.md 4.B).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Anything storable must expose its key and `resourceVersion` so the cache
/// and the CAS-gated writers can operate generically over it.
pub trait StoreObject: Clone + Send + Sync + 'static {
    fn key(&self) -> ObjectKey;
    fn resource_version(&self) -> &str;
}

/// Label-selector-shaped list filter; kept generic so each kind's selector
/// type can be passed through without this crate knowing its shape.
pub type ListFilter = BTreeMap<String, String>;

/// Typed CRUD + watch against one object kind. Implementations talk to the
/// real cluster API server; this crate ships [`InMemoryStore`] for tests and
/// as the reference that real backends are held to.
pub trait ObjectStore<T: StoreObject>: Send + Sync {
    fn get(&self, key: &ObjectKey) -> impl std::future::Future<Output = Result<T>> + Send;
    fn list(
        &self,
        namespace: &str,
        selector: &ListFilter,
    ) -> impl std::future::Future<Output = Result<Vec<T>>> + Send;
    fn create(&self, obj: T) -> impl std::future::Future<Output = Result<T>> + Send;
    /// Full-object update, gated on the caller's observed `resourceVersion`.
    fn update(&self, obj: T) -> impl std::future::Future<Output = Result<T>> + Send;
    /// Status-subresource update; does not bump `metadata.generation`.
    fn update_status(&self, obj: T) -> impl std::future::Future<Output = Result<T>> + Send;
    fn delete(&self, key: &ObjectKey) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Streams add/update/delete events from `resource_version` onward.
    fn watch(
        &self,
        resource_version: &str,
    ) -> impl std::future::Future<Output = Result<mpsc::Receiver<WatchEvent<T>>>> + Send;
    /// The current store-wide resource version, used to start a watch after
    /// a full list.
    fn current_resource_version(&self) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// An in-memory reference store: every write fans out to watchers
/// immediately. Useful for tests and for exercising the cache/reconciler
/// loop without a real cluster API server.
pub struct InMemoryStore<T: StoreObject> {
    inner: Arc<RwLock<InMemoryState<T>>>,
}

struct InMemoryState<T> {
    objects: BTreeMap<ObjectKey, T>,
    next_resource_version: u64,
    watchers: Vec<mpsc::Sender<WatchEvent<T>>>,
}

impl<T: StoreObject> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(InMemoryState {
                objects: BTreeMap::new(),
                next_resource_version: 1,
                watchers: Vec::new(),
            })),
        }
    }
}

impl<T: StoreObject> Clone for InMemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: StoreObject> InMemoryStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    async fn notify(state: &mut InMemoryState<T>, event: WatchEvent<T>) {
        state.watchers.retain(|tx| !tx.is_closed());
        for tx in &state.watchers {
            let _ = tx.send(event.clone()).await;
        }
    }
}

impl<T: StoreObject> ObjectStore<T> for InMemoryStore<T> {
    async fn get(&self, key: &ObjectKey) -> Result<T> {
        let state = self.inner.read().await;
        state
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                namespace: key.namespace.clone(),
                name: key.name.clone(),
            })
    }

    async fn list(&self, namespace: &str, _selector: &ListFilter) -> Result<Vec<T>> {
        // Selector matching is kind-specific (label semantics live with each
        // type's `LabelSelector`); this reference store only narrows by
        // namespace and leaves selector filtering to the caller.
        let state = self.inner.read().await;
        Ok(state
            .objects
            .iter()
            .filter(|(k, _)| namespace.is_empty() || k.namespace == namespace)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn create(&self, obj: T) -> Result<T> {
        let mut state = self.inner.write().await;
        let key = obj.key();
        if state.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                namespace: key.namespace,
                name: key.name,
            });
        }
        state.objects.insert(key, obj.clone());
        Self::notify(&mut state, WatchEvent::Added(obj.clone())).await;
        Ok(obj)
    }

    async fn update(&self, obj: T) -> Result<T> {
        let mut state = self.inner.write().await;
        let key = obj.key();
        match state.objects.get(&key) {
            None => {
                return Err(StoreError::NotFound {
                    namespace: key.namespace,
                    name: key.name,
                })
            }
            Some(existing) if existing.resource_version() != obj.resource_version() => {
                return Err(StoreError::Conflict {
                    namespace: key.namespace,
                    name: key.name,
                    expected: obj.resource_version().to_string(),
                    actual: existing.resource_version().to_string(),
                })
            }
            Some(_) => {}
        }
        state.next_resource_version += 1;
        state.objects.insert(key, obj.clone());
        Self::notify(&mut state, WatchEvent::Modified(obj.clone())).await;
        Ok(obj)
    }

    async fn update_status(&self, obj: T) -> Result<T> {
        self.update(obj).await
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        let mut state = self.inner.write().await;
        match state.objects.remove(key) {
            Some(removed) => {
                Self::notify(&mut state, WatchEvent::Deleted(removed)).await;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                namespace: key.namespace.clone(),
                name: key.name.clone(),
            }),
        }
    }

    async fn watch(&self, _resource_version: &str) -> Result<mpsc::Receiver<WatchEvent<T>>> {
        let (tx, rx) = mpsc::channel(256);
        let mut state = self.inner.write().await;
        state.watchers.push(tx);
        Ok(rx)
    }

    async fn current_resource_version(&self) -> Result<String> {
        let state = self.inner.read().await;
        Ok(state.next_resource_version.to_string())
    }
}

/// A watch-fed, read-shared local cache (spec.md 4.A, 5: "The in-memory
/// cache is read-shared, written only by the watch thread").
pub struct Cache<T: StoreObject> {
    objects: Arc<RwLock<BTreeMap<ObjectKey, T>>>,
}

impl<T: StoreObject> Default for Cache<T> {
    fn default() -> Self {
        Self {
            objects: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }
}

impl<T: StoreObject> Clone for Cache<T> {
    fn clone(&self) -> Self {
        Self {
            objects: self.objects.clone(),
        }
    }
}

impl<T: StoreObject> Cache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &ObjectKey) -> Option<T> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn list(&self, namespace: &str) -> Vec<T> {
        self.objects
            .read()
            .await
            .iter()
            .filter(|(k, _)| namespace.is_empty() || k.namespace == namespace)
            .map(|(_, v)| v.clone())
            .collect()
    }

    async fn apply(&self, event: &WatchEvent<T>) {
        let mut objects = self.objects.write().await;
        match event {
            WatchEvent::Added(o) | WatchEvent::Modified(o) => {
                objects.insert(o.key(), o.clone());
            }
            WatchEvent::Deleted(o) => {
                objects.remove(&o.key());
            }
            WatchEvent::Expired => {}
        }
    }

    async fn replace_all(&self, items: Vec<T>) {
        let mut objects = self.objects.write().await;
        objects.clear();
        for item in items {
            objects.insert(item.key(), item);
        }
    }
}

/// Enqueues a key on every watch event; the reflector calls this so readers
/// (work queues) learn about changes without polling the cache.
pub trait ChangeSink<T>: Send + Sync {
    fn on_change(&self, event: &WatchEvent<T>);
}

/// Drives a [`Cache`] from a store's watch stream: full list, then watch
/// from that list's resource version, re-listing on disconnect or
/// expiry, plus a periodic full resync (spec.md 4.A, default 5-15 minutes)
/// that re-delivers every cached object as a synthetic `Modified` event so
/// reconcilers defend against missed events.
pub async fn run_reflector<T, S, C>(
    store: S,
    cache: Cache<T>,
    sink: C,
    resync_period: Duration,
) where
    T: StoreObject + std::fmt::Debug,
    S: ObjectStore<T> + Clone + 'static,
    C: ChangeSink<T> + 'static,
{
    loop {
        let items = match store.list("", &ListFilter::new()).await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "reflector list failed, retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };
        cache.replace_all(items.clone()).await;
        for item in &items {
            sink.on_change(&WatchEvent::Modified(item.clone()));
        }

        let resource_version = match store.current_resource_version().await {
            Ok(rv) => rv,
            Err(_) => "0".to_string(),
        };
        let mut rx = match store.watch(&resource_version).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(error = %e, "reflector watch failed, relisting");
                continue;
            }
        };

        let mut resync = tokio::time::interval(resync_period);
        resync.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Some(WatchEvent::Expired) | None => {
                            info!("watch expired or closed, relisting");
                            break;
                        }
                        Some(event) => {
                            cache.apply(&event).await;
                            sink.on_change(&event);
                        }
                    }
                }
                _ = resync.tick() => {
                    debug!("periodic full resync");
                    let all = cache.list("").await;
                    for item in all {
                        sink.on_change(&WatchEvent::Modified(item));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Widget {
        namespace: String,
        name: String,
        resource_version: String,
        value: i32,
    }

    impl StoreObject for Widget {
        fn key(&self) -> ObjectKey {
            ObjectKey::new(self.namespace.clone(), self.name.clone())
        }
        fn resource_version(&self) -> &str {
            &self.resource_version
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryStore::<Widget>::new();
        let w = Widget {
            namespace: "default".into(),
            name: "w1".into(),
            resource_version: "1".into(),
            value: 42,
        };
        store.create(w.clone()).await.unwrap();
        let fetched = store.get(&w.key()).await.unwrap();
        assert_eq!(fetched, w);
    }

    #[tokio::test]
    async fn update_with_stale_resource_version_conflicts() {
        let store = InMemoryStore::<Widget>::new();
        let w = Widget {
            namespace: "default".into(),
            name: "w1".into(),
            resource_version: "1".into(),
            value: 42,
        };
        store.create(w.clone()).await.unwrap();

        let mut conflicting = w;
        conflicting.value = 99;
        conflicting.resource_version = "stale".into();
        let err = store.update(conflicting).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn delete_missing_object_is_not_found() {
        let store = InMemoryStore::<Widget>::new();
        let err = store
            .delete(&ObjectKey::new("default", "missing"))
            .await
            .unwrap_err();
        assert!(err.is_ignorable_on_delete());
    }
}

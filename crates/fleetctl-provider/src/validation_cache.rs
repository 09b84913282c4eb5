//! Validation-result cache keyed by the hash of a provider spec (spec.md 4.D).

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::ProviderError;

/// A cached validation outcome is either a pass or the terminal reason the
/// spec was rejected for. Only [`ProviderError::Terminal`] outcomes are
/// cached; see [`ValidationCache::record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedOutcome {
    Valid,
    Invalid { reason: String },
}

/// Deduplicates expensive provider `validate` calls across reconciles of the
/// same spec. Entries are invalidated implicitly: the key is the hash of the
/// spec contents, so any spec change produces a fresh key.
///
/// Context-cancellation and deadline-exceeded failures are never cached
/// (spec.md 4.D) since they say nothing about the spec itself.
#[derive(Default)]
pub struct ValidationCache {
    entries: RwLock<HashMap<[u8; 32], CachedOutcome>>,
}

impl ValidationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_for(spec: &serde_json::Value) -> [u8; 32] {
        let canonical = serde_json::to_vec(spec).unwrap_or_default();
        *blake3::hash(&canonical).as_bytes()
    }

    pub fn get(&self, key: &[u8; 32]) -> Option<CachedOutcome> {
        self.entries.read().unwrap().get(key).cloned()
    }

    /// Records the outcome of a live validation call. Returns `false` without
    /// recording anything if the error isn't cacheable (spec.md 4.D).
    pub fn record(&self, key: [u8; 32], result: &Result<(), ProviderError>) -> bool {
        let outcome = match result {
            Ok(()) => CachedOutcome::Valid,
            Err(err) if err.is_cacheable_failure() => CachedOutcome::Invalid {
                reason: err.to_string(),
            },
            Err(_) => return false,
        };
        self.entries.write().unwrap().insert(key, outcome);
        true
    }

    pub fn invalidate(&self, key: &[u8; 32]) {
        self.entries.write().unwrap().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_specs_hash_to_distinct_keys() {
        let a = ValidationCache::key_for(&serde_json::json!({"instanceType": "m5.large"}));
        let b = ValidationCache::key_for(&serde_json::json!({"instanceType": "m5.xlarge"}));
        assert_ne!(a, b);
    }

    #[test]
    fn deadline_exceeded_is_not_recorded() {
        let cache = ValidationCache::new();
        let key = ValidationCache::key_for(&serde_json::json!({}));
        let recorded = cache.record(key, &Err(ProviderError::DeadlineExceeded));
        assert!(!recorded);
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn terminal_failure_is_cached_and_retrievable() {
        let cache = ValidationCache::new();
        let key = ValidationCache::key_for(&serde_json::json!({"x": 1}));
        let result = Err(ProviderError::terminal(
            fleetctl_types::MachineErrorReason::InvalidConfiguration,
            "bad field",
        ));
        assert!(cache.record(key, &result));
        assert_eq!(
            cache.get(&key),
            Some(CachedOutcome::Invalid {
                reason: result.unwrap_err().to_string()
            })
        );
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = ValidationCache::new();
        let key = ValidationCache::key_for(&serde_json::json!({}));
        cache.record(key, &Ok(()));
        cache.invalidate(&key);
        assert!(cache.get(&key).is_none());
    }
}

//! The compile-time provider dispatch table (spec.md 9).

use std::collections::HashMap;
use std::sync::Arc;

use fleetctl_types::machine::CloudProvider;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::CloudProviderDriver;

/// Dispatches to the driver registered for a machine's `cloudProvider`.
///
/// New providers are added by registering them here, never by runtime
/// discovery (spec.md 9: "New providers are registered at compile time in
/// one table").
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    drivers: HashMap<CloudProvider, Arc<dyn CloudProviderDriver>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: CloudProvider, driver: Arc<dyn CloudProviderDriver>) {
        self.drivers.insert(provider, driver);
    }

    pub fn driver(&self, provider: CloudProvider) -> ProviderResult<Arc<dyn CloudProviderDriver>> {
        self.drivers
            .get(&provider)
            .cloned()
            .ok_or(ProviderError::UnknownProvider(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{Instance, UserData};
    use async_trait::async_trait;
    use fleetctl_types::Machine;

    struct StubDriver;

    #[async_trait]
    impl CloudProviderDriver for StubDriver {
        async fn validate(&self, _machine: &Machine) -> ProviderResult<()> {
            Ok(())
        }

        async fn add_defaults(
            &self,
            spec: serde_json::Value,
        ) -> ProviderResult<serde_json::Value> {
            Ok(spec)
        }

        async fn create(
            &self,
            _machine: &Machine,
            _userdata: &UserData,
        ) -> ProviderResult<Instance> {
            unimplemented!()
        }

        async fn get(&self, _machine: &Machine) -> ProviderResult<Option<Instance>> {
            Ok(None)
        }

        async fn cleanup(&self, _machine: &Machine) -> ProviderResult<bool> {
            Ok(true)
        }

        async fn migrate_uid(&self, _machine: &Machine, _new_uid: &str) -> ProviderResult<()> {
            Ok(())
        }

        fn metrics_labels(&self, _machine: &Machine) -> Vec<(&'static str, String)> {
            Vec::new()
        }
    }

    #[test]
    fn unregistered_provider_is_unknown() {
        let registry = ProviderRegistry::new();
        let err = registry.driver(CloudProvider::Aws).unwrap_err();
        assert!(matches!(err, ProviderError::UnknownProvider(CloudProvider::Aws)));
    }

    #[test]
    fn registered_provider_dispatches() {
        let mut registry = ProviderRegistry::new();
        registry.register(CloudProvider::None, Arc::new(StubDriver));
        assert!(registry.driver(CloudProvider::None).is_ok());
    }
}

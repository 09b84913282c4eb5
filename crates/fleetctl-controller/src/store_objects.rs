//! [`StoreObject`] impls for the canonical object kinds (spec.md 4.A), so
//! the reconcilers can use [`fleetctl_runtime::ObjectStore`] generically over
//! them. These live here rather than in `fleetctl-types` because
//! `fleetctl-runtime` (which defines the trait) already depends on
//! `fleetctl-types`; the reverse dependency would cycle.

use fleetctl_runtime::{ObjectKey, StoreObject};
use fleetctl_types::{Event, Machine, MachineDeployment, MachineSet};

impl StoreObject for Machine {
    fn key(&self) -> ObjectKey {
        ObjectKey::new(self.metadata.namespace.clone(), self.metadata.name.clone())
    }

    fn resource_version(&self) -> &str {
        &self.metadata.resource_version
    }
}

impl StoreObject for MachineSet {
    fn key(&self) -> ObjectKey {
        ObjectKey::new(self.metadata.namespace.clone(), self.metadata.name.clone())
    }

    fn resource_version(&self) -> &str {
        &self.metadata.resource_version
    }
}

impl StoreObject for MachineDeployment {
    fn key(&self) -> ObjectKey {
        ObjectKey::new(self.metadata.namespace.clone(), self.metadata.name.clone())
    }

    fn resource_version(&self) -> &str {
        &self.metadata.resource_version
    }
}

impl StoreObject for Event {
    fn key(&self) -> ObjectKey {
        ObjectKey::new(self.metadata.namespace.clone(), self.metadata.name.clone())
    }

    fn resource_version(&self) -> &str {
        &self.metadata.resource_version
    }
}

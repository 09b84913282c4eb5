//! # fleetctl-provider: cloud-provider dispatch (spec.md 4.D)
//!
//! A polymorphic interface over N provider drivers, dispatched by the
//! `cloudProvider` discriminator carried in a Machine's [`ProviderSpec`].
//! New providers are registered in one compile-time table
//! ([`ProviderRegistry::with_builtin_providers`]); this crate never
//! discovers implementations at runtime.

pub mod error;
pub mod registry;
pub mod traits;
pub mod validation_cache;

pub use error::{ProviderError, ProviderResult};
pub use registry::ProviderRegistry;
pub use traits::{CloudProviderDriver, Instance, InstanceStatus, UserData};
pub use validation_cache::ValidationCache;

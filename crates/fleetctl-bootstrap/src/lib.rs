//! # fleetctl-bootstrap: bootstrap-token issuance and userdata generation
//! (spec.md 4.E)
//!
//! Mints or reuses a short-lived join token, resolves the cluster CA,
//! renders a kubeconfig, and hands it plus node settings to the userdata
//! generator (an external collaborator) to produce the boot script a
//! provider injects at instance-create time.

pub mod ca;
pub mod error;
pub mod issuer;
pub mod kubeconfig;
pub mod node_settings;
pub mod token;
pub mod userdata;

pub use ca::{resolve_cluster_ca, ClusterCaData, ClusterCaSource};
pub use error::{BootstrapError, Result};
pub use issuer::issue_or_reuse;
pub use kubeconfig::KubeconfigParams;
pub use node_settings::NodeSettings;
pub use token::{BootstrapToken, BOOTSTRAP_TOKEN_TTL_SECONDS};
pub use userdata::{generate as generate_userdata, UserDataGenerator};

//! # fleetctl-admission: synchronous Machine/MachineDeployment admission webhook
//!
//! Applies legacy-field migrations, defaulting, validation, and spec
//! immutability to Machine and MachineDeployment writes before they reach
//! the store (spec.md 4.J, 6).

pub mod defaulting;
pub mod error;
pub mod field_error;
pub mod immutability;
pub mod json_patch;
pub mod kubelet_version;
pub mod pem;
pub mod server;
pub mod tls;
pub mod validation;
pub mod webhook;

pub use error::{AdmissionError, Result};
pub use field_error::{FieldError, ValidationErrors};
pub use kubelet_version::{KubeletVersion, KubeletVersionConstraint, ParseKubeletVersionError};
pub use server::AdmissionServer;
pub use tls::TlsConfig;
pub use webhook::{handle, AdmissionConfig, AdmissionRequest, AdmissionResponse, Operation};

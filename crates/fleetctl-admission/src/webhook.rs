//! Ties migrations, defaulting, validation and immutability together into
//! the admission protocol response (spec.md 6: "Request contains the
//! incoming object, prior object (for updates), operation verb, and UID.
//! Response is an allow/deny verdict, a JSON-patch operation list, and the
//! same UID.").

use std::collections::BTreeMap;

use fleetctl_types::{Machine, MachineDeployment};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{AdmissionError, Result};
use crate::field_error::ValidationErrors;
use crate::immutability;
use crate::json_patch::{self, Patch};
use crate::kubelet_version::KubeletVersionConstraint;
use crate::{defaulting, validation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
pub struct AdmissionRequest {
    pub uid: String,
    pub operation: Operation,
    pub object: Value,
    pub old_object: Option<Value>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Vec<Patch>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl AdmissionResponse {
    fn allow(uid: String, patch: Vec<Patch>) -> Self {
        Self {
            uid,
            allowed: true,
            patch: if patch.is_empty() { None } else { Some(patch) },
            status_message: None,
        }
    }

    fn deny(uid: String, message: impl Into<String>) -> Self {
        Self {
            uid,
            allowed: false,
            patch: None,
            status_message: Some(message.into()),
        }
    }
}

/// Cluster-wide settings the mutator/validator consult; populated from
/// fleetctl-config at startup.
#[derive(Debug, Clone, Default)]
pub struct AdmissionConfig {
    pub default_kubelet_feature_gates: BTreeMap<String, bool>,
    pub kubelet_version_constraint: Option<KubeletVersionConstraint>,
}

/// Handles one admission request end to end. Never panics on malformed
/// input; unparseable objects are denied rather than propagated as an
/// error, matching the protocol's allow/deny contract. Transport-level
/// failures (bad JSON envelope) remain `AdmissionError`.
pub fn handle(req: AdmissionRequest, config: &AdmissionConfig) -> Result<AdmissionResponse> {
    let kind = req
        .object
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| AdmissionError::UnknownKind("<missing>".to_string()))?
        .to_string();

    match kind.as_str() {
        "Machine" => Ok(handle_machine(req, config)),
        "MachineDeployment" => Ok(handle_machine_deployment(req, config)),
        other => Err(AdmissionError::UnknownKind(other.to_string())),
    }
}

fn handle_machine(req: AdmissionRequest, config: &AdmissionConfig) -> AdmissionResponse {
    let mut raw = req.object.clone();
    fleetctl_types::migrations::apply_all(&mut raw);

    let mut machine: Machine = match serde_json::from_value(raw.clone()) {
        Ok(m) => m,
        Err(e) => return AdmissionResponse::deny(req.uid, format!("decoding Machine: {e}")),
    };

    defaulting::apply_machine_defaults(&mut machine, &config.default_kubelet_feature_gates);

    if req.operation == Operation::Update {
        let Some(prior_raw) = req.old_object.as_ref() else {
            return AdmissionResponse::deny(req.uid, "update operation missing prior object");
        };
        let prior: Machine = match serde_json::from_value(prior_raw.clone()) {
            Ok(p) => p,
            Err(e) => return AdmissionResponse::deny(req.uid, format!("decoding prior Machine: {e}")),
        };
        if let Some(reason) = immutability::check(&prior, &machine) {
            warn!(machine = %machine.metadata.name, "denying spec mutation");
            return AdmissionResponse::deny(req.uid, reason);
        }
        immutability::consume_bypass_annotation(&mut machine);
    }

    let mut errors = validation::validate_machine(&machine);
    if let Some(constraint) = &config.kubelet_version_constraint {
        errors.extend(validation::validate_kubelet_version_constraint(&machine.spec, constraint));
    }
    if !errors.is_valid() {
        return AdmissionResponse::deny(req.uid, describe(&errors));
    }

    info!(machine = %machine.metadata.name, "admitted");
    let mutated = serde_json::to_value(&machine).expect("Machine always serializes");
    AdmissionResponse::allow(req.uid, json_patch::diff(&raw, &mutated))
}

fn handle_machine_deployment(req: AdmissionRequest, _config: &AdmissionConfig) -> AdmissionResponse {
    let mut raw = req.object.clone();
    fleetctl_types::migrations::apply_all(&mut raw);

    let mut deployment: MachineDeployment = match serde_json::from_value(raw.clone()) {
        Ok(d) => d,
        Err(e) => return AdmissionResponse::deny(req.uid, format!("decoding MachineDeployment: {e}")),
    };

    defaulting::apply_machine_deployment_defaults(&mut deployment);

    let errors = validation::validate_machine_deployment(&deployment);
    if !errors.is_valid() {
        return AdmissionResponse::deny(req.uid, describe(&errors));
    }

    info!(deployment = %deployment.metadata.name, "admitted");
    let mutated = serde_json::to_value(&deployment).expect("MachineDeployment always serializes");
    AdmissionResponse::allow(req.uid, json_patch::diff(&raw, &mutated))
}

fn describe(errors: &ValidationErrors) -> String {
    errors
        .0
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

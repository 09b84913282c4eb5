//! Validation rules run after defaulting (spec.md 4.J): "selector
//! non-emptiness, selector-matches-template, replica count >= 0,
//! rolling-update bounds, SSH-key parseability, kubelet-version against a
//! configured semver constraint, kubelet config-source forbidden on
//! versions >= 1.24."

use fleetctl_types::{IntOrString, Machine, MachineDeployment, MachineDeploymentStrategy};

use crate::field_error::ValidationErrors;
use crate::kubelet_version::{KubeletVersion, KubeletVersionConstraint};

const KUBELET_CONFIG_SOURCE_FORBIDDEN_FROM: KubeletVersion = KubeletVersion { major: 1, minor: 24, patch: 0 };

fn validate_percent_bound(value: &IntOrString, field: &str, errors: &mut ValidationErrors) {
    if let IntOrString::String(s) = value {
        match s.strip_suffix('%').and_then(|p| p.parse::<f64>().ok()) {
            Some(pct) if pct > 100.0 => errors.push(field, "percentage must not exceed 100%"),
            None => errors.push(field, "must be an integer or a percentage string"),
            _ => {}
        }
    }
}

pub fn validate_machine_deployment(deployment: &MachineDeployment) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if deployment.spec.selector.is_empty() {
        errors.push("spec.selector", "selector must not be empty");
    } else if !deployment.spec.selector.matches(&deployment.spec.template.labels) {
        errors.push("spec.selector", "selector does not match spec.template.metadata.labels");
    }

    if deployment.spec.replicas < 0 {
        errors.push("spec.replicas", "must be >= 0");
    }

    match &deployment.spec.strategy {
        MachineDeploymentStrategy::RollingUpdate { rolling_update } => {
            validate_percent_bound(&rolling_update.max_surge, "spec.strategy.rollingUpdate.maxSurge", &mut errors);
            validate_percent_bound(
                &rolling_update.max_unavailable,
                "spec.strategy.rollingUpdate.maxUnavailable",
                &mut errors,
            );
            let surge = rolling_update.max_surge.resolve(deployment.spec.replicas, true).unwrap_or(0);
            let unavailable = rolling_update
                .max_unavailable
                .resolve(deployment.spec.replicas, false)
                .unwrap_or(0);
            if surge <= 0 && unavailable <= 0 {
                errors.push(
                    "spec.strategy.rollingUpdate",
                    "at least one of maxSurge, maxUnavailable must resolve above zero",
                );
            }
        }
    }

    errors.extend(validate_machine_spec_fields(&deployment.spec.template.spec, "spec.template.spec"));
    errors
}

pub fn validate_machine(machine: &Machine) -> ValidationErrors {
    validate_machine_spec_fields(&machine.spec, "spec")
}

fn validate_machine_spec_fields(spec: &fleetctl_types::MachineSpec, prefix: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    for key in &spec.ssh_authorized_keys {
        if let Err(reason) = parse_ssh_authorized_key(key) {
            errors.push(format!("{prefix}.sshAuthorizedKeys"), reason);
        }
    }

    match spec.versions.kubelet.parse::<KubeletVersion>() {
        Ok(version) => {
            if version >= KUBELET_CONFIG_SOURCE_FORBIDDEN_FROM && spec.kubelet_config_source.is_some() {
                errors.push(
                    format!("{prefix}.kubeletConfigSource"),
                    "dynamic kubelet config source is forbidden on kubelet >= 1.24",
                );
            }
        }
        Err(_) => errors.push(format!("{prefix}.versions.kubelet"), "not a valid kubelet version"),
    }

    errors
}

pub fn validate_kubelet_version_constraint(spec: &fleetctl_types::MachineSpec, constraint: &KubeletVersionConstraint) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if let Ok(version) = spec.versions.kubelet.parse::<KubeletVersion>() {
        if !constraint.is_satisfied_by(version) {
            errors.push("spec.versions.kubelet", "kubelet version is outside the configured allowed range");
        }
    }
    errors
}

/// `ssh-<type> <base64-body> [comment]`. The body must be parseable
/// base64; fleetctl does not further validate the decoded key material.
fn parse_ssh_authorized_key(line: &str) -> Result<(), &'static str> {
    let mut parts = line.split_whitespace();
    let key_type = parts.next().ok_or("empty SSH key line")?;
    if !key_type.starts_with("ssh-") && !key_type.starts_with("ecdsa-") {
        return Err("unrecognized SSH key type prefix");
    }
    let body = parts.next().ok_or("missing SSH key body")?;
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(|_| "SSH key body is not valid base64")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetctl_types::{CloudProvider, LabelSelector, MachineSpec, MachineTemplateSpec, MachineVersions, ObjectMeta, ProviderSpec};
    use std::collections::BTreeMap;

    fn base_spec() -> MachineSpec {
        MachineSpec {
            provider_spec: ProviderSpec {
                cloud_provider: CloudProvider::None,
                value: serde_json::json!({}),
            },
            versions: MachineVersions { kubelet: "1.28.0".into() },
            node_labels: BTreeMap::new(),
            node_taints: Vec::new(),
            node_annotations: BTreeMap::new(),
            node_name: None,
            ssh_authorized_keys: Vec::new(),
            kubelet_config_source: None,
        }
    }

    fn deployment(selector_matches: bool) -> MachineDeployment {
        let mut labels = BTreeMap::new();
        labels.insert("app".to_string(), "web".to_string());
        let mut selector_labels = labels.clone();
        if !selector_matches {
            selector_labels.insert("extra".to_string(), "true".to_string());
        }
        MachineDeployment::new(
            ObjectMeta::new("default", "d1"),
            fleetctl_types::MachineDeploymentSpec {
                replicas: 3,
                selector: LabelSelector::from(selector_labels),
                template: MachineTemplateSpec { labels, spec: base_spec() },
                strategy: Default::default(),
                revision_history_limit: 10,
                paused: false,
                progress_deadline_seconds: 600,
            },
        )
    }

    #[test]
    fn mismatched_selector_and_template_is_invalid() {
        let errors = validate_machine_deployment(&deployment(false));
        assert!(errors.0.iter().any(|e| e.field == "spec.selector"));
    }

    #[test]
    fn matching_selector_and_template_is_valid() {
        let errors = validate_machine_deployment(&deployment(true));
        assert!(errors.is_valid());
    }

    #[test]
    fn empty_selector_is_invalid() {
        let mut d = deployment(true);
        d.spec.selector = LabelSelector::new();
        let errors = validate_machine_deployment(&d);
        assert!(errors.0.iter().any(|e| e.field == "spec.selector"));
    }

    #[test]
    fn both_zero_rolling_update_bounds_are_invalid() {
        let mut d = deployment(true);
        d.spec.strategy = MachineDeploymentStrategy::RollingUpdate {
            rolling_update: fleetctl_types::RollingUpdateMachineDeployment {
                max_surge: IntOrString::Int(0),
                max_unavailable: IntOrString::Int(0),
            },
        };
        let errors = validate_machine_deployment(&d);
        assert!(errors.0.iter().any(|e| e.field.contains("rollingUpdate")));
    }

    #[test]
    fn percent_over_100_is_invalid() {
        let mut d = deployment(true);
        d.spec.strategy = MachineDeploymentStrategy::RollingUpdate {
            rolling_update: fleetctl_types::RollingUpdateMachineDeployment {
                max_surge: IntOrString::String("150%".into()),
                max_unavailable: IntOrString::Int(0),
            },
        };
        let errors = validate_machine_deployment(&d);
        assert!(errors.0.iter().any(|e| e.message.contains("100%")));
    }

    #[test]
    fn kubelet_config_source_forbidden_on_new_kubelet() {
        let mut spec = base_spec();
        spec.kubelet_config_source = Some("configmap/foo".to_string());
        let errors = validate_machine_spec_fields(&spec, "spec");
        assert!(errors.0.iter().any(|e| e.field.contains("kubeletConfigSource")));
    }

    #[test]
    fn kubelet_config_source_allowed_on_old_kubelet() {
        let mut spec = base_spec();
        spec.versions.kubelet = "1.20.0".to_string();
        spec.kubelet_config_source = Some("configmap/foo".to_string());
        let errors = validate_machine_spec_fields(&spec, "spec");
        assert!(errors.is_valid());
    }

    #[test]
    fn unparseable_ssh_key_is_rejected() {
        let mut spec = base_spec();
        spec.ssh_authorized_keys.push("not-a-key".to_string());
        let errors = validate_machine_spec_fields(&spec, "spec");
        assert!(!errors.is_valid());
    }

    #[test]
    fn well_formed_ssh_key_passes() {
        let mut spec = base_spec();
        spec.ssh_authorized_keys.push("ssh-ed25519 AAAAC3NzaC1lZDI1NTE5 user@host".to_string());
        let errors = validate_machine_spec_fields(&spec, "spec");
        assert!(errors.is_valid());
    }
}

//! The six checks a kubelet-serving CSR must pass before fleetctl will
//! approve it unattended (spec.md 4.K). Every check must pass; a single
//! failure denies the request with a reason naming which check failed.

use std::collections::BTreeSet;

use fleetctl_types::{Machine, MachineAddressType};

use crate::types::{CertificateSigningRequestSpec, KeyUsage};

const REQUIRED_GROUPS: &[&str] = &["system:nodes", "system:authenticated"];
const REQUIRED_ORGANIZATION: &str = "system:nodes";

fn required_usages() -> BTreeSet<KeyUsage> {
    [KeyUsage::DigitalSignature, KeyUsage::KeyEncipherment, KeyUsage::ServerAuth]
        .into_iter()
        .collect()
}

/// The node name a conforming kubelet CSR claims, parsed out of its
/// `system:node:<nodename>` username. `None` if the username doesn't
/// follow that convention at all, in which case every other check is
/// moot -- the request isn't from a node identity.
pub fn claimed_node_name(spec: &CertificateSigningRequestSpec) -> Option<&str> {
    spec.username.strip_prefix("system:node:").filter(|n| !n.is_empty())
}

/// Checks the requester is `system:node:<nodename>` and a member of both
/// `system:nodes` and `system:authenticated`.
pub fn check_requester_identity(spec: &CertificateSigningRequestSpec) -> Result<(), String> {
    if claimed_node_name(spec).is_none() {
        return Err(format!("username {:?} is not of the form system:node:<nodename>", spec.username));
    }
    let groups: BTreeSet<&str> = spec.groups.iter().map(String::as_str).collect();
    for required in REQUIRED_GROUPS {
        if !groups.contains(required) {
            return Err(format!("groups missing required member {required:?}"));
        }
    }
    Ok(())
}

/// Checks the requested key usages are exactly
/// `{digital-signature, key-encipherment, server-auth}`, no more, no fewer.
pub fn check_key_usages(spec: &CertificateSigningRequestSpec) -> Result<(), String> {
    let requested: BTreeSet<KeyUsage> = spec.usages.iter().copied().collect();
    if requested != required_usages() {
        return Err("key usages must be exactly {digital-signature, key-encipherment, server-auth}".to_string());
    }
    if requested.len() != spec.usages.len() {
        return Err("key usages must not repeat".to_string());
    }
    Ok(())
}

/// Checks `Subject.CommonName` equals the requesting username.
pub fn check_subject_common_name(spec: &CertificateSigningRequestSpec) -> Result<(), String> {
    if spec.subject_common_name != spec.username {
        return Err(format!(
            "subject common name {:?} does not match username {:?}",
            spec.subject_common_name, spec.username
        ));
    }
    Ok(())
}

/// Checks `Subject.Organization` is exactly `system:nodes`.
pub fn check_subject_organization(spec: &CertificateSigningRequestSpec) -> Result<(), String> {
    if spec.subject_organization != [REQUIRED_ORGANIZATION.to_string()] {
        return Err(format!("subject organization must be exactly [{REQUIRED_ORGANIZATION:?}]"));
    }
    Ok(())
}

/// Checks every DNS SAN and every IP SAN appears among the corresponding
/// Machine's observed status addresses.
pub fn check_sans_match_machine(spec: &CertificateSigningRequestSpec, machine: &Machine) -> Result<(), String> {
    let dns_addresses: BTreeSet<&str> = machine
        .status
        .addresses
        .iter()
        .filter(|a| matches!(a.kind, MachineAddressType::ExternalDns | MachineAddressType::InternalDns))
        .map(|a| a.address.as_str())
        .collect();
    let ip_addresses: BTreeSet<&str> = machine
        .status
        .addresses
        .iter()
        .filter(|a| matches!(a.kind, MachineAddressType::ExternalIp | MachineAddressType::InternalIp))
        .map(|a| a.address.as_str())
        .collect();

    for dns in &spec.dns_sans {
        if !dns_addresses.contains(dns.as_str()) {
            return Err(format!("DNS SAN {dns:?} is not among the machine's observed addresses"));
        }
    }
    for ip in &spec.ip_sans {
        if !ip_addresses.contains(ip.as_str()) {
            return Err(format!("IP SAN {ip:?} is not among the machine's observed addresses"));
        }
    }
    Ok(())
}

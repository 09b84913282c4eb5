//! Matches a provisioning Machine to the cluster Node it produced (spec.md
//! 4.G): "node adoption matches on the first of (provider-id, then any
//! external address, then any internal address). When multiple nodes match,
//! the one with the most recent heartbeat wins."

use chrono::{DateTime, Utc};
use fleetctl_types::{MachineAddress, MachineAddressType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCandidate {
    pub name: String,
    pub uid: String,
    pub provider_id: Option<String>,
    pub addresses: Vec<MachineAddress>,
    pub last_heartbeat: DateTime<Utc>,
}

fn is_external(addr: &MachineAddress) -> bool {
    matches!(
        addr.kind,
        MachineAddressType::ExternalIp | MachineAddressType::ExternalDns
    )
}

fn is_internal(addr: &MachineAddress) -> bool {
    matches!(
        addr.kind,
        MachineAddressType::InternalIp | MachineAddressType::InternalDns
    )
}

fn shares_address(candidate: &NodeCandidate, instance_addresses: &[MachineAddress], pred: fn(&MachineAddress) -> bool) -> bool {
    candidate
        .addresses
        .iter()
        .filter(|a| pred(a))
        .any(|a| instance_addresses.iter().any(|ia| ia == a))
}

fn most_recent_heartbeat<'a>(candidates: &'a [&'a NodeCandidate]) -> &'a NodeCandidate {
    candidates
        .iter()
        .max_by_key(|c| c.last_heartbeat)
        .expect("caller guarantees a non-empty slice")
}

/// Finds the node this machine's provisioned instance joined as, preferring
/// provider-id matches, then external addresses, then internal addresses.
pub fn match_node<'a>(
    provider_instance_id: Option<&str>,
    instance_addresses: &[MachineAddress],
    candidates: &'a [NodeCandidate],
) -> Option<&'a NodeCandidate> {
    if let Some(id) = provider_instance_id {
        let by_id: Vec<&NodeCandidate> = candidates
            .iter()
            .filter(|c| c.provider_id.as_deref() == Some(id))
            .collect();
        if !by_id.is_empty() {
            return Some(most_recent_heartbeat(&by_id));
        }
    }

    let by_external: Vec<&NodeCandidate> = candidates
        .iter()
        .filter(|c| shares_address(c, instance_addresses, is_external))
        .collect();
    if !by_external.is_empty() {
        return Some(most_recent_heartbeat(&by_external));
    }

    let by_internal: Vec<&NodeCandidate> = candidates
        .iter()
        .filter(|c| shares_address(c, instance_addresses, is_internal))
        .collect();
    if !by_internal.is_empty() {
        return Some(most_recent_heartbeat(&by_internal));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn addr(kind: MachineAddressType, address: &str) -> MachineAddress {
        MachineAddress {
            kind,
            address: address.to_string(),
        }
    }

    fn candidate(name: &str, provider_id: Option<&str>, addresses: Vec<MachineAddress>, age_secs: i64) -> NodeCandidate {
        NodeCandidate {
            name: name.into(),
            uid: format!("uid-{name}"),
            provider_id: provider_id.map(String::from),
            addresses,
            last_heartbeat: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn prefers_provider_id_match() {
        let candidates = vec![
            candidate("a", Some("i-1"), vec![], 0),
            candidate(
                "b",
                None,
                vec![addr(MachineAddressType::ExternalIp, "1.2.3.4")],
                0,
            ),
        ];
        let instance_addrs = vec![addr(MachineAddressType::ExternalIp, "1.2.3.4")];
        let matched = match_node(Some("i-1"), &instance_addrs, &candidates).unwrap();
        assert_eq!(matched.name, "a");
    }

    #[test]
    fn falls_back_to_external_address() {
        let external = addr(MachineAddressType::ExternalIp, "1.2.3.4");
        let candidates = vec![candidate("a", None, vec![external.clone()], 0)];
        let matched = match_node(Some("i-1"), std::slice::from_ref(&external), &candidates).unwrap();
        assert_eq!(matched.name, "a");
    }

    #[test]
    fn falls_back_to_internal_address_when_no_external_match() {
        let internal = addr(MachineAddressType::InternalIp, "10.0.0.5");
        let candidates = vec![candidate("a", None, vec![internal.clone()], 0)];
        let matched = match_node(None, std::slice::from_ref(&internal), &candidates).unwrap();
        assert_eq!(matched.name, "a");
    }

    #[test]
    fn ties_broken_by_most_recent_heartbeat() {
        let external = addr(MachineAddressType::ExternalIp, "1.2.3.4");
        let candidates = vec![
            candidate("stale", None, vec![external.clone()], 600),
            candidate("fresh", None, vec![external.clone()], 1),
        ];
        let matched = match_node(None, std::slice::from_ref(&external), &candidates).unwrap();
        assert_eq!(matched.name, "fresh");
    }

    #[test]
    fn no_match_returns_none() {
        let candidates: Vec<NodeCandidate> = vec![];
        let matched = match_node(Some("i-1"), &[], &candidates);
        assert!(matched.is_none());
    }
}

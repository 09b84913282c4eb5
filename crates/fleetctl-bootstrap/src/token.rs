//! Bootstrap tokens: the (id, secret) pair a new kubelet presents to join
//! the cluster (spec.md 4.E).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fleetctl_runtime::{ObjectKey, StoreObject};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Tokens live 24 hours (spec.md 4.E).
pub const BOOTSTRAP_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

const TOKEN_NAMESPACE: &str = "kube-system";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapToken {
    /// Deterministic name derived from the owning machine's UID, so a retry
    /// after a partial failure does not mint a second token (spec.md 4.G:
    /// "Bootstrap-token creation is idempotent via a deterministic name
    /// derived from the machine UID").
    pub name: String,
    #[serde(default)]
    pub resource_version: String,
    pub token_id: String,
    pub token_secret: String,
    pub expires_at: DateTime<Utc>,
}

impl StoreObject for BootstrapToken {
    fn key(&self) -> ObjectKey {
        ObjectKey::new(TOKEN_NAMESPACE, self.name.clone())
    }

    fn resource_version(&self) -> &str {
        &self.resource_version
    }
}

impl BootstrapToken {
    /// The store name a token for `machine_uid` must have, so repeated
    /// issuance attempts converge on the same object instead of creating
    /// duplicates.
    pub fn name_for_machine(machine_uid: &str) -> String {
        format!("bootstrap-token-{machine_uid}")
    }

    pub fn mint(machine_uid: &str) -> Self {
        let mut rng = rand::thread_rng();
        let token_id: String = (0..6).map(|_| char::from(rng.gen_range(b'a'..=b'z'))).collect();
        let token_secret: String = (0..16).map(|_| char::from(rng.gen_range(b'a'..=b'z'))).collect();
        Self {
            name: Self::name_for_machine(machine_uid),
            resource_version: String::new(),
            token_id,
            token_secret,
            expires_at: Utc::now() + ChronoDuration::seconds(BOOTSTRAP_TOKEN_TTL_SECONDS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// The `token_id.token_secret` wire form embedded in kubeconfigs.
    pub fn bearer(&self) -> String {
        format!("{}.{}", self.token_id, self.token_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_for_machine_is_deterministic() {
        assert_eq!(
            BootstrapToken::name_for_machine("uid-1"),
            BootstrapToken::name_for_machine("uid-1")
        );
    }

    #[test]
    fn distinct_machines_get_distinct_names() {
        assert_ne!(
            BootstrapToken::name_for_machine("uid-1"),
            BootstrapToken::name_for_machine("uid-2")
        );
    }

    #[test]
    fn freshly_minted_token_is_not_expired() {
        let token = BootstrapToken::mint("uid-1");
        assert!(!token.is_expired(Utc::now()));
    }

    #[test]
    fn token_expires_after_ttl() {
        let token = BootstrapToken::mint("uid-1");
        let past_expiry = token.expires_at + ChronoDuration::seconds(1);
        assert!(token.is_expired(past_expiry));
    }
}

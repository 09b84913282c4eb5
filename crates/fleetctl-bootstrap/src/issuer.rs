//! Orchestrates token issuance: read a pre-existing token, or mint one
//! (spec.md 4.E).

use fleetctl_runtime::{ObjectKey, ObjectStore, StoreError};
use tracing::info;

use crate::error::Result;
use crate::token::BootstrapToken;

/// Returns the existing bootstrap token for `machine_uid` if one was already
/// minted, otherwise creates it. Idempotent: concurrent callers racing to
/// create converge on whichever write the store accepted first.
pub async fn issue_or_reuse<S: ObjectStore<BootstrapToken>>(
    store: &S,
    machine_uid: &str,
) -> Result<BootstrapToken> {
    let key = ObjectKey::new("kube-system", BootstrapToken::name_for_machine(machine_uid));
    match store.get(&key).await {
        Ok(existing) => {
            info!(machine_uid, "reusing existing bootstrap token");
            Ok(existing)
        }
        Err(StoreError::NotFound { .. }) => {
            let minted = BootstrapToken::mint(machine_uid);
            match store.create(minted.clone()).await {
                Ok(created) => {
                    info!(machine_uid, "minted new bootstrap token");
                    Ok(created)
                }
                Err(StoreError::AlreadyExists { .. }) => Ok(store.get(&key).await?),
                Err(other) => Err(other.into()),
            }
        }
        Err(other) => Err(other.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetctl_runtime::InMemoryStore;

    #[tokio::test]
    async fn first_call_mints_a_token() {
        let store = InMemoryStore::<BootstrapToken>::new();
        let token = issue_or_reuse(&store, "uid-1").await.unwrap();
        assert_eq!(token.name, BootstrapToken::name_for_machine("uid-1"));
    }

    #[tokio::test]
    async fn second_call_reuses_the_same_token() {
        let store = InMemoryStore::<BootstrapToken>::new();
        let first = issue_or_reuse(&store, "uid-1").await.unwrap();
        let second = issue_or_reuse(&store, "uid-1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn distinct_machines_get_distinct_tokens() {
        let store = InMemoryStore::<BootstrapToken>::new();
        let a = issue_or_reuse(&store, "uid-1").await.unwrap();
        let b = issue_or_reuse(&store, "uid-2").await.unwrap();
        assert_ne!(a.name, b.name);
    }
}

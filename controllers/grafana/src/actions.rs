//! Operator-invoked actions.

use crate::controller::Inputs;
use crate::error::ControllerError;
use crate::secret::SecretStore;
use serde::Serialize;

/// Result of the `get-admin-password` action.
#[derive(Debug, Serialize)]
pub struct AdminCredential {
    pub username: String,
    pub password: String,
}

/// Resolve and return the current admin credential.
///
/// Goes through the same resolution as a reconciliation pass, so the
/// answer matches what Grafana is actually configured with (including an
/// operator override or a peer-published value). Unreadable peer state is
/// an error here: unlike a reconciliation pass there is nothing a locally
/// generated fallback would be applied to.
pub async fn get_admin_password(
    inputs: &Inputs,
    secrets: &SecretStore,
) -> Result<AdminCredential, ControllerError> {
    let raw = inputs.load_config()?;
    let desired = model::normalize(&raw, inputs.bind_address)?;
    let secret = secrets
        .try_resolve(&desired.admin_user, &desired.admin_password)
        .await?;
    Ok(AdminCredential {
        username: secret.username,
        password: secret.password,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peers::{InMemoryPeerStore, PeerStore};
    use crate::secret::PEER_ADMIN_PASSWORD_KEY;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_action_returns_group_password() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = Inputs {
            config_file: dir.path().join("config.yaml"),
            sources_file: dir.path().join("sources.json"),
            bind_address: None,
        };
        let peers = InMemoryPeerStore::new();
        peers
            .set(PEER_ADMIN_PASSWORD_KEY, "group-password")
            .await
            .unwrap();
        let secrets = SecretStore::new(Arc::new(peers));

        let credential = get_admin_password(&inputs, &secrets).await.unwrap();
        assert_eq!(credential.username, "admin");
        assert_eq!(credential.password, "group-password");
    }

    #[tokio::test]
    async fn test_action_reflects_operator_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "admin_user: ops\nadmin_password: operator-set\n",
        )
        .unwrap();
        let inputs = Inputs {
            config_file: dir.path().join("config.yaml"),
            sources_file: dir.path().join("sources.json"),
            bind_address: None,
        };
        let secrets = SecretStore::new(Arc::new(InMemoryPeerStore::new()));

        let credential = get_admin_password(&inputs, &secrets).await.unwrap();
        assert_eq!(credential.username, "ops");
        assert_eq!(credential.password, "operator-set");
    }

    #[tokio::test]
    async fn test_action_fails_when_peer_state_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = Inputs {
            config_file: dir.path().join("config.yaml"),
            sources_file: dir.path().join("sources.json"),
            bind_address: None,
        };
        let peers = InMemoryPeerStore::new();
        peers.set_unavailable(true);
        let secrets = SecretStore::new(Arc::new(peers));

        let err = get_admin_password(&inputs, &secrets).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::ControllerError::SecretResolution(_)
        ));
    }
}

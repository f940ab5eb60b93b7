//! Admin credential lifecycle.
//!
//! Precedence: operator override > peer-published value > fresh generation.
//! An override is published to peers so the whole group converges on it;
//! a generated password is published once and then read back unchanged on
//! every later pass, so the credential is stable across reconciliations.
//! Cleartext passwords never reach the logs.

use crate::error::ControllerError;
use crate::peers::PeerStore;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use model::{AdminSecret, SecretOrigin};
use rand::RngCore as _;
use rand::rngs::OsRng;
use std::sync::Arc;
use tracing::{info, warn};

/// Peer-state key the resolved password is published under.
pub const PEER_ADMIN_PASSWORD_KEY: &str = "admin_password";

/// Generate a cryptographically random password (16 bytes, URL-safe base64).
#[must_use]
pub fn generate_password() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Owns resolution of the administrator credential across the group.
pub struct SecretStore {
    peers: Arc<dyn PeerStore>,
}

impl std::fmt::Debug for SecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretStore").finish_non_exhaustive()
    }
}

impl SecretStore {
    /// Create a secret store on top of the group's peer state.
    #[must_use]
    pub fn new(peers: Arc<dyn PeerStore>) -> Self {
        Self { peers }
    }

    /// Resolve the authoritative admin credential for this pass.
    ///
    /// * non-empty `operator_override` wins, is published to peers, and is
    ///   returned;
    /// * otherwise an already-published peer value is returned unchanged;
    /// * otherwise a new password is generated and published, making this
    ///   instance the group's generator.
    ///
    /// Peer-state failures are not fatal: the resolution degrades to a
    /// locally generated password and a warning. That divergence heals on
    /// the next pass where peer state is readable again, because the peer
    /// value is always preferred over regeneration.
    pub async fn resolve(&self, username: &str, operator_override: &str) -> AdminSecret {
        match self.try_resolve(username, operator_override).await {
            Ok(secret) => secret,
            Err(e) => {
                // Known divergence risk during group formation; see DESIGN.md
                warn!("Peer state unavailable, generating a local admin password: {e}");
                AdminSecret {
                    username: username.to_string(),
                    password: generate_password(),
                    origin: SecretOrigin::Generated,
                }
            }
        }
    }

    /// Resolve like [`Self::resolve`], but unreadable peer state is an
    /// error instead of a local fallback.
    ///
    /// The action surface uses this: reporting a freshly minted password
    /// that no reconciliation pass ever applied would mislead the operator.
    pub async fn try_resolve(
        &self,
        username: &str,
        operator_override: &str,
    ) -> Result<AdminSecret, ControllerError> {
        if !operator_override.is_empty() {
            if let Err(e) = self
                .peers
                .set(PEER_ADMIN_PASSWORD_KEY, operator_override)
                .await
            {
                warn!("Could not publish admin password override to peers: {e}");
            }
            return Ok(AdminSecret {
                username: username.to_string(),
                password: operator_override.to_string(),
                origin: SecretOrigin::OperatorOverride,
            });
        }

        match self.peers.get(PEER_ADMIN_PASSWORD_KEY).await {
            Ok(Some(password)) => Ok(AdminSecret {
                username: username.to_string(),
                password,
                origin: SecretOrigin::Peer,
            }),
            Ok(None) => {
                let password = generate_password();
                if let Err(e) = self.peers.set(PEER_ADMIN_PASSWORD_KEY, &password).await {
                    warn!("Could not publish generated admin password to peers: {e}");
                } else {
                    info!("Generated and published new admin password");
                }
                Ok(AdminSecret {
                    username: username.to_string(),
                    password,
                    origin: SecretOrigin::Generated,
                })
            }
            Err(e) => Err(ControllerError::SecretResolution(e.to_string())),
        }
    }
}

//! Credential login and authenticated identity lookup.

use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::hasher::CredentialHasher;
use crate::identity::{normalize_email, ProfileIdentity};
use crate::store::{IdentityStore, Lookup};
use crate::token::{IssuedToken, SessionTokenService};

pub struct AuthenticationGate {
    store: Arc<dyn IdentityStore>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: Arc<SessionTokenService>,
    /// Verified against when there is no real hash, so every failed login
    /// pays the same hashing cost.
    decoy_hash: Option<String>,
}

impl AuthenticationGate {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: Arc<SessionTokenService>,
    ) -> Self {
        let decoy_hash = hasher
            .hash("decoy-password-never-matches")
            .inspect_err(|e| tracing::warn!("Could not prepare decoy hash: {e}"))
            .ok();
        Self {
            store,
            hasher,
            tokens,
            decoy_hash,
        }
    }

    /// Logs in with email and password.
    ///
    /// Unknown email, an account without a local password and a wrong
    /// password all return the same [`CoreError::InvalidCredentials`].
    pub fn login(&self, email: &str, password: &str) -> CoreResult<IssuedToken> {
        let email = normalize_email(email);

        let Some(identity) = self.store.find_identity(&Lookup::Email(&email))? else {
            tracing::warn!("Failed login attempt: unknown email");
            self.burn_decoy(password);
            return Err(CoreError::InvalidCredentials);
        };

        let Some(credential) = self.store.find_credential(identity.id)? else {
            tracing::warn!("Failed login attempt: no local credential for id={}", identity.id);
            self.burn_decoy(password);
            return Err(CoreError::InvalidCredentials);
        };

        if !self.hasher.verify(&credential.password_hash, password)? {
            tracing::warn!("Failed login attempt for id={}", identity.id);
            return Err(CoreError::InvalidCredentials);
        }

        tracing::info!("Password verified successfully for id={}", identity.id);
        self.tokens.issue(identity.id)
    }

    /// Loads the identity a verified token points at.
    pub fn current_identity(&self, subject_id: u64) -> CoreResult<ProfileIdentity> {
        self.store
            .find_identity(&Lookup::Id(subject_id))?
            .ok_or(CoreError::NotFound)
    }

    /// `true` if no identity holds `username`. No side effects.
    pub fn username_available(&self, username: &str) -> CoreResult<bool> {
        Ok(self
            .store
            .find_identity(&Lookup::Username(username))?
            .is_none())
    }

    fn burn_decoy(&self, password: &str) {
        if let Some(hash) = &self.decoy_hash {
            let _ = self.hasher.verify(hash, password);
        }
    }
}

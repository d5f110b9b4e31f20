//! Local account registration.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::{ConflictKind, CoreError, CoreResult};
use crate::hasher::CredentialHasher;
use crate::identity::{normalize_email, NewCredential, NewIdentity, ProfileIdentity, DEFAULT_ROLE};
use crate::store::{IdentityStore, Lookup};
use crate::validation::{check_email, check_required, check_username, PasswordPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Creates a profile and its credential together.
pub struct Registrar {
    store: Arc<dyn IdentityStore>,
    hasher: Arc<dyn CredentialHasher>,
    policy: PasswordPolicy,
}

impl Registrar {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        hasher: Arc<dyn CredentialHasher>,
        policy: PasswordPolicy,
    ) -> Self {
        Self {
            store,
            hasher,
            policy,
        }
    }

    /// Registers a local account.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Validation`] for malformed input.
    /// - [`CoreError::Duplicate`] if the email or username is taken, whether
    ///   found up front or raised by the store on a lost race.
    /// - [`CoreError::Hashing`] / [`CoreError::Storage`] otherwise.
    pub fn register(&self, request: RegisterRequest) -> CoreResult<ProfileIdentity> {
        check_username(&request.username)?;
        check_required("Full name", &request.full_name)?;
        check_email(&request.email)?;
        self.policy.check(&request.password)?;

        let email = normalize_email(&request.email);
        let role = request
            .role
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_ROLE.to_string());

        if let Some(existing) = self.store.find_identity(&Lookup::EmailOrUsername {
            email: &email,
            username: &request.username,
        })? {
            let kind = classify_conflict(&existing, &email, &request.username);
            tracing::info!("Registration rejected: {kind:?} already in use");
            return Err(CoreError::Duplicate(kind));
        }

        let password_hash = self.hasher.hash(&request.password)?;

        let identity = NewIdentity {
            username: request.username,
            email,
            full_name: request.full_name.trim().to_string(),
            role,
            external_id: None,
            password_less: false,
        };

        let created = self
            .store
            .create_atomic(identity, Some(NewCredential { password_hash }))
            .inspect_err(|e| tracing::warn!("Identity creation failed: {e}"))?;

        tracing::info!("User registered: id={}, username={}", created.id, created.username);
        Ok(created)
    }
}

fn classify_conflict(existing: &ProfileIdentity, email: &str, username: &str) -> ConflictKind {
    if existing.email == email {
        ConflictKind::Email
    } else if existing.username == username {
        ConflictKind::Username
    } else {
        ConflictKind::Account
    }
}

//! Federated (OAuth-style) sign-in.
//!
//! A verified provider claim either resolves to an existing identity, which
//! is simply logged in, or provisions a new passwordless identity. Federated
//! sign-in never fails because the suggested username is taken; a
//! deterministic alternative is chosen instead.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::{CoreError, CoreResult};
use crate::identity::{normalize_email, NewIdentity, ProfileIdentity, DEFAULT_ROLE};
use crate::store::{IdentityStore, Lookup, StoreError, UniqueField};
use crate::token::{IssuedToken, SessionTokenService};
use crate::validation::{check_email, check_required};

const EXTERNAL_SUFFIX_LEN: usize = 8;
const MAX_CREATE_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Deserialize)]
pub struct FederatedClaim {
    #[serde(rename = "googleId")]
    pub external_id: String,
    pub email: String,
    pub username: String,
    #[serde(default, rename = "name")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub identity: ProfileIdentity,
    pub token: IssuedToken,
    pub is_new: bool,
}

pub struct OAuthIdentityLinker {
    store: Arc<dyn IdentityStore>,
    tokens: Arc<SessionTokenService>,
}

impl OAuthIdentityLinker {
    pub fn new(store: Arc<dyn IdentityStore>, tokens: Arc<SessionTokenService>) -> Self {
        Self { store, tokens }
    }

    pub fn link_or_create(&self, claim: FederatedClaim) -> CoreResult<LinkOutcome> {
        check_required("External id", &claim.external_id)?;
        check_required("Username", &claim.username)?;
        check_email(&claim.email)?;

        let email = normalize_email(&claim.email);
        let external_id = claim.external_id.trim();
        let suggested = claim.username.trim();

        if let Some(existing) = self.find_existing(&email, external_id)? {
            tracing::info!("Federated login for existing id={}", existing.id);
            return self.outcome(existing, false);
        }

        let display_name = claim
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(suggested)
            .to_string();

        let mut candidates = username_candidates(suggested, external_id);
        for _ in 0..MAX_CREATE_ATTEMPTS {
            let Some(username) = self.next_free_username(&mut candidates)? else {
                break;
            };

            let new = NewIdentity {
                username,
                email: email.clone(),
                full_name: display_name.clone(),
                role: DEFAULT_ROLE.to_string(),
                external_id: Some(external_id.to_string()),
                password_less: true,
            };

            match self.store.create_atomic(new, None) {
                Ok(created) => {
                    tracing::info!(
                        "Federated identity provisioned: id={}, username={}",
                        created.id,
                        created.username
                    );
                    return self.outcome(created, true);
                }
                // Someone took the name between our check and the insert.
                Err(StoreError::Conflict(UniqueField::Username)) => continue,
                // A concurrent sign-in for the same person won the race.
                Err(StoreError::Conflict(UniqueField::Email | UniqueField::ExternalId)) => {
                    let winner = self
                        .find_existing(&email, external_id)?
                        .ok_or_else(|| CoreError::Storage("conflicting identity vanished".to_string()))?;
                    return self.outcome(winner, false);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CoreError::Storage(format!(
            "could not assign a unique username for '{suggested}'"
        )))
    }

    fn find_existing(&self, email: &str, external_id: &str) -> CoreResult<Option<ProfileIdentity>> {
        Ok(self
            .store
            .find_identity(&Lookup::EmailOrExternalId { email, external_id })?)
    }

    fn next_free_username(
        &self,
        candidates: &mut impl Iterator<Item = String>,
    ) -> CoreResult<Option<String>> {
        for candidate in candidates.by_ref().take(MAX_CREATE_ATTEMPTS) {
            if self
                .store
                .find_identity(&Lookup::Username(&candidate))?
                .is_none()
            {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    fn outcome(&self, identity: ProfileIdentity, is_new: bool) -> CoreResult<LinkOutcome> {
        let token = self.tokens.issue(identity.id)?;
        Ok(LinkOutcome {
            identity,
            token,
            is_new,
        })
    }
}

/// `suggested`, then `suggested_<first 8 chars of external id>`, then that
/// with `_2`, `_3`, ... appended.
fn username_candidates(suggested: &str, external_id: &str) -> impl Iterator<Item = String> {
    let prefix: String = external_id.chars().take(EXTERNAL_SUFFIX_LEN).collect();
    let base = format!("{suggested}_{prefix}");
    let first = suggested.to_string();

    std::iter::once(first)
        .chain(std::iter::once(base.clone()))
        .chain((2u32..).map(move |n| format!("{base}_{n}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::fast_hasher;
    use crate::registration::tests::request;
    use crate::registration::Registrar;
    use crate::store::MemoryStore;
    use crate::token::TokenConfig;
    use crate::validation::PasswordPolicy;

    fn claim(external_id: &str, email: &str, username: &str) -> FederatedClaim {
        FederatedClaim {
            external_id: external_id.to_string(),
            email: email.to_string(),
            username: username.to_string(),
            display_name: None,
        }
    }

    fn linker() -> (OAuthIdentityLinker, Arc<MemoryStore>, Arc<SessionTokenService>) {
        let store = Arc::new(MemoryStore::new());
        let tokens = Arc::new(SessionTokenService::new(
            "oauth-test-secret-0123456789abcdef",
            TokenConfig::default(),
        ));
        (
            OAuthIdentityLinker::new(store.clone(), tokens.clone()),
            store,
            tokens,
        )
    }

    #[test]
    fn first_sign_in_provisions_passwordless_identity() {
        let (linker, store, tokens) = linker();
        let outcome = linker
            .link_or_create(claim("109876543210", "New@Example.com", "newbie"))
            .unwrap();

        assert!(outcome.is_new);
        assert!(outcome.identity.password_less);
        assert_eq!(outcome.identity.role, "user");
        assert_eq!(outcome.identity.email, "new@example.com");
        assert_eq!(outcome.identity.external_id.as_deref(), Some("109876543210"));
        assert_eq!(outcome.identity.full_name, "newbie");
        assert!(store.find_credential(outcome.identity.id).unwrap().is_none());
        assert_eq!(tokens.verify(&outcome.token.token).unwrap(), outcome.identity.id);
    }

    #[test]
    fn second_sign_in_reuses_identity_without_writes() {
        let (linker, store, _) = linker();
        let first = linker
            .link_or_create(claim("109876543210", "new@example.com", "newbie"))
            .unwrap();
        let second = linker
            .link_or_create(claim("109876543210", "changed@example.com", "whatever"))
            .unwrap();

        assert!(!second.is_new);
        assert_eq!(second.identity, first.identity);
        assert_ne!(second.token.token, first.token.token);
        assert_eq!(store.identity_count().unwrap(), 1);
    }

    #[test]
    fn matches_existing_local_account_by_email() {
        let (linker, store, _) = linker();
        let registrar = Registrar::new(store.clone(), Arc::new(fast_hasher()), PasswordPolicy::default());
        let local = registrar.register(request("alice", "alice@example.com")).unwrap();

        let outcome = linker
            .link_or_create(claim("g-555", "ALICE@example.com", "alice_g"))
            .unwrap();
        assert!(!outcome.is_new);
        assert_eq!(outcome.identity.id, local.id);
        assert_eq!(store.identity_count().unwrap(), 1);
    }

    #[test]
    fn username_collision_gets_external_suffix() {
        let (linker, _, _) = linker();
        linker
            .link_or_create(claim("aaaaaaaaaaaa", "one@example.com", "runner"))
            .unwrap();

        let outcome = linker
            .link_or_create(claim("1234567890", "two@example.com", "runner"))
            .unwrap();
        assert!(outcome.is_new);
        assert_eq!(outcome.identity.username, "runner_12345678");
    }

    #[test]
    fn suffixed_collision_gets_counter() {
        let (linker, _, _) = linker();
        linker.link_or_create(claim("x1", "a@example.com", "runner")).unwrap();
        linker
            .link_or_create(claim("99999999", "b@example.com", "runner_12345678"))
            .unwrap();

        let outcome = linker
            .link_or_create(claim("12345678zz", "c@example.com", "runner"))
            .unwrap();
        assert_eq!(outcome.identity.username, "runner_12345678_2");
    }

    #[test]
    fn short_external_id_does_not_panic() {
        let (linker, _, _) = linker();
        linker.link_or_create(claim("long-id-1", "a@example.com", "sam")).unwrap();
        let outcome = linker.link_or_create(claim("42", "b@example.com", "sam")).unwrap();
        assert_eq!(outcome.identity.username, "sam_42");
    }

    #[test]
    fn display_name_is_used_when_present() {
        let (linker, _, _) = linker();
        let mut c = claim("g-1", "ada@example.com", "ada");
        c.display_name = Some("Ada Lovelace".to_string());
        let outcome = linker.link_or_create(c).unwrap();
        assert_eq!(outcome.identity.full_name, "Ada Lovelace");
    }

    #[test]
    fn invalid_claims_are_rejected() {
        let (linker, store, _) = linker();
        assert!(matches!(
            linker.link_or_create(claim("", "a@example.com", "a")),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            linker.link_or_create(claim("g", "nope", "a")),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            linker.link_or_create(claim("g", "a@example.com", " ")),
            Err(CoreError::Validation(_))
        ));
        assert_eq!(store.identity_count().unwrap(), 0);
    }

    #[test]
    fn concurrent_first_sign_ins_create_one_identity() {
        let (linker, store, _) = linker();

        let outcomes: Vec<LinkOutcome> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..6)
                .map(|_| {
                    let linker = &linker;
                    s.spawn(move || {
                        linker
                            .link_or_create(claim("same-ext", "same@example.com", "twin"))
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(outcomes.iter().filter(|o| o.is_new).count(), 1);
        let id = outcomes[0].identity.id;
        assert!(outcomes.iter().all(|o| o.identity.id == id));
        assert_eq!(store.identity_count().unwrap(), 1);
    }

    #[test]
    fn candidate_sequence() {
        let got: Vec<String> = username_candidates("bob", "abcdefghijk").take(4).collect();
        assert_eq!(got, ["bob", "bob_abcdefgh", "bob_abcdefgh_2", "bob_abcdefgh_3"]);
    }
}

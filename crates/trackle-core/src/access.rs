//! Wiring for the whole access-control core.

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::AccessConfig;
use crate::error::CoreResult;
use crate::gate::AuthenticationGate;
use crate::hasher::{Argon2Hasher, CredentialHasher};
use crate::limiter::SlidingWindowLimiter;
use crate::oauth::OAuthIdentityLinker;
use crate::registration::Registrar;
use crate::store::IdentityStore;
use crate::token::SessionTokenService;

/// Every component, built once at startup and shared behind `Arc`s.
pub struct AccessControl {
    pub registrar: Registrar,
    pub gate: AuthenticationGate,
    pub linker: OAuthIdentityLinker,
    pub tokens: Arc<SessionTokenService>,
    /// Lenient policy applied to every request.
    pub default_limiter: SlidingWindowLimiter,
    /// Tight policy for registration and login.
    pub strict_limiter: SlidingWindowLimiter,
}

impl AccessControl {
    pub fn new(
        config: &AccessConfig,
        signing_secret: &str,
        store: Arc<dyn IdentityStore>,
    ) -> CoreResult<Self> {
        let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2Hasher::new(config.hashing)?);
        Self::with_parts(config, signing_secret, store, hasher, Arc::new(SystemClock))
    }

    pub fn with_parts(
        config: &AccessConfig,
        signing_secret: &str,
        store: Arc<dyn IdentityStore>,
        hasher: Arc<dyn CredentialHasher>,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        config.validate()?;

        let tokens = Arc::new(SessionTokenService::with_clock(
            signing_secret,
            config.token,
            clock.clone(),
        ));

        Ok(Self {
            registrar: Registrar::new(store.clone(), hasher.clone(), config.password.clone()),
            gate: AuthenticationGate::new(store.clone(), hasher, tokens.clone()),
            linker: OAuthIdentityLinker::new(store, tokens.clone()),
            tokens,
            default_limiter: SlidingWindowLimiter::with_clock(
                config.rate_limit.default,
                clock.clone(),
            )?,
            strict_limiter: SlidingWindowLimiter::with_clock(config.rate_limit.strict, clock)?,
        })
    }
}

//! Stateless session tokens (HS256 JWT).
//!
//! A token binds one identity id to an expiry instant. Nothing is stored
//! server-side, so a token stays valid until it expires even after the
//! client discards it on logout.

use std::sync::Arc;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
    pub jti: String,
}

/// A freshly signed token and its expiry (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
        }
    }
}

fn default_ttl_hours() -> u64 {
    24
}

/// One leap year.
pub const MAX_TTL_HOURS: u64 = 24 * 366;

impl TokenConfig {
    /// Lifetime must be between one hour and [`MAX_TTL_HOURS`].
    pub fn validate(&self) -> CoreResult<()> {
        if self.ttl_hours == 0 {
            return Err(CoreError::Validation(
                "token lifetime must be at least one hour".to_string(),
            ));
        }
        if self.ttl_hours > MAX_TTL_HOURS {
            return Err(CoreError::Validation(format!(
                "token lifetime must not exceed {MAX_TTL_HOURS} hours"
            )));
        }
        Ok(())
    }
}

pub struct SessionTokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
    clock: Arc<dyn Clock>,
}

impl SessionTokenService {
    pub fn new(secret: &str, config: TokenConfig) -> Self {
        Self::with_clock(secret, config, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: &str, config: TokenConfig, clock: Arc<dyn Clock>) -> Self {
        // Expiry is checked by hand against `clock` once the signature holds.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs: config.ttl_hours.min(MAX_TTL_HOURS) * 3600,
            clock,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn issue(&self, subject_id: u64) -> CoreResult<IssuedToken> {
        let now = self.clock.unix_seconds();
        let expires_at = now.saturating_add(self.ttl_secs);

        let claims = Claims {
            sub: subject_id.to_string(),
            iat: now,
            exp: expires_at,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| CoreError::Token(format!("Failed to sign token: {e}")))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Returns the subject id. Signature first, then expiry.
    pub fn verify(&self, token: &str) -> CoreResult<u64> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token rejected: {e}");
                CoreError::TokenInvalid
            })?
            .claims;

        if self.clock.unix_seconds() >= claims.exp {
            return Err(CoreError::TokenExpired);
        }

        claims.sub.parse().map_err(|_| CoreError::TokenInvalid)
    }
}

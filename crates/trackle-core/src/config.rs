//! Access-control settings loaded from a TOML file.
//!
//! Every section is optional; a missing file section falls back to the
//! defaults listed on each type.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::hasher::HashingConfig;
use crate::limiter::RatePolicy;
use crate::token::TokenConfig;
use crate::validation::PasswordPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub password: PasswordPolicy,
    #[serde(default)]
    pub hashing: HashingConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

/// The two limiter policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "RatePolicy::default_policy")]
    pub default: RatePolicy,
    #[serde(default = "RatePolicy::strict")]
    pub strict: RatePolicy,
    /// Key clients by the first `X-Forwarded-For` hop instead of the peer
    /// address. Only safe behind a proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            default: RatePolicy::default_policy(),
            strict: RatePolicy::strict(),
            trust_forwarded_for: false,
        }
    }
}

impl AccessConfig {
    /// Loads configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Io`] if the file cannot be read.
    /// - [`CoreError::ConfigParse`] if the TOML is malformed.
    /// - [`CoreError::Validation`] if a rate policy is unusable.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> CoreResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| CoreError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        self.rate_limit.default.validate()?;
        self.rate_limit.strict.validate()?;
        self.token.validate()
    }
}

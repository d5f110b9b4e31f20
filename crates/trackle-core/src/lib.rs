//! Trackle access-control core: transport-agnostic identity logic.
//!
//! `trackle-core` decides whether a client may make a request and who that
//! client is. It knows nothing about HTTP; `trackle-web` adapts it.
//!
//! # Modules
//!
//! - [`limiter`] - Per-client sliding-window-log admission.
//! - [`registration`] - Atomic creation of a profile plus its credential.
//! - [`gate`] - Password login and authenticated identity lookup.
//! - [`oauth`] - Federated sign-in with collision-safe usernames.
//! - [`token`] - Signed, time-bounded session tokens.
//! - [`store`] - The identity store seam and its in-memory implementation.
//! - [`hasher`] - Argon2id password hashing.
//! - [`config`] - TOML settings for all of the above.
//! - [`error`] - Unified error type ([`CoreError`]) and result alias ([`CoreResult`]).

pub mod access;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod hasher;
pub mod identity;
pub mod limiter;
pub mod oauth;
pub mod registration;
pub mod store;
pub mod token;
pub mod validation;

pub use access::AccessControl;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AccessConfig, RateLimitConfig};
pub use error::{ConflictKind, CoreError, CoreResult};
pub use gate::AuthenticationGate;
pub use hasher::{Argon2Hasher, CredentialHasher, HashingConfig};
pub use identity::{CredentialRecord, ProfileIdentity};
pub use limiter::{RatePolicy, SlidingWindowLimiter};
pub use oauth::{FederatedClaim, LinkOutcome, OAuthIdentityLinker};
pub use registration::{RegisterRequest, Registrar};
pub use store::{IdentityStore, MemoryStore, StoreError, UniqueField};
pub use token::{IssuedToken, SessionTokenService, TokenConfig};
pub use validation::PasswordPolicy;

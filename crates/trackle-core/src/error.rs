//! Error types for `trackle-core`.
//!
//! All fallible operations in the core library return [`CoreResult<T>`],
//! which is an alias for `Result<T, CoreError>`.

use crate::store::{StoreError, UniqueField};

/// Which piece of an identity collided with an existing account.
///
/// Classified in priority order: email first, then username, then a
/// generic account conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Email,
    Username,
    Account,
}

impl ConflictKind {
    /// The user-facing message for this conflict.
    pub fn message(self) -> &'static str {
        match self {
            ConflictKind::Email => {
                "This email is already registered. Please use a different email."
            }
            ConflictKind::Username => {
                "This username is already taken. Please choose another username."
            }
            ConflictKind::Account => "An account with these details already exists.",
        }
    }
}

impl From<UniqueField> for ConflictKind {
    fn from(field: UniqueField) -> Self {
        match field {
            UniqueField::Email => ConflictKind::Email,
            UniqueField::Username => ConflictKind::Username,
            UniqueField::ExternalId | UniqueField::CredentialOwner => ConflictKind::Account,
        }
    }
}

/// Unified error type for all core operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed input. Never reaches storage.
    #[error("{0}")]
    Validation(String),

    /// A uniqueness conflict with an existing identity.
    #[error("{}", .0.message())]
    Duplicate(ConflictKind),

    /// Login failed. Deliberately says nothing about which check failed.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The token was valid but the identity it names no longer exists.
    #[error("User not found")]
    NotFound,

    /// The token signature is valid but its lifetime has elapsed.
    #[error("Token has expired")]
    TokenExpired,

    /// The token is malformed or its signature does not verify.
    #[error("Invalid token")]
    TokenInvalid,

    /// Password hashing or hash parsing failed.
    #[error("hashing error: {0}")]
    Hashing(String),

    /// Token encoding failed.
    #[error("token error: {0}")]
    Token(String),

    /// The identity store failed for a reason unrelated to input.
    #[error("storage error: {0}")]
    Storage(String),

    /// Failed to parse a TOML configuration file.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// An I/O error that doesn't fit a more specific variant.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Returns `true` for failures caused by the server rather than the input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            CoreError::Hashing(_)
                | CoreError::Token(_)
                | CoreError::Storage(_)
                | CoreError::ConfigParse(_)
                | CoreError::Io(_)
        )
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(field) => CoreError::Duplicate(field.into()),
            StoreError::Io(msg) => CoreError::Storage(msg),
        }
    }
}

/// Convenience alias used throughout `trackle-core`.
pub type CoreResult<T> = Result<T, CoreError>;

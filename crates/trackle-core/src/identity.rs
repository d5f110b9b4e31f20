//! Identity records: the public profile and its paired secret verifier.

use serde::{Deserialize, Serialize};

pub const DEFAULT_ROLE: &str = "user";

/// Public account attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileIdentity {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub external_id: Option<String>,
    #[serde(rename = "passwordLess")]
    pub password_less: bool,
    pub created_at: u64,
}

/// The hashed secret belonging to exactly one local identity.
///
/// Deliberately not `Serialize`: the hash never leaves the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub identity_id: u64,
    pub password_hash: String,
}

/// A profile waiting for the store to assign its id.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub external_id: Option<String>,
    pub password_less: bool,
}

/// A credential waiting for its identity id.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub password_hash: String,
}

/// Trims and lower-cases an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

//! Identity storage.
//!
//! [`IdentityStore`] is the seam to whatever persistence backs the service.
//! Its uniqueness constraints are authoritative: lookups done before a write
//! are only there to produce friendlier errors, and a write that loses a race
//! comes back as [`StoreError::Conflict`] rather than as a generic failure.
//!
//! [`MemoryStore`] is the in-process implementation. Writes go through a
//! transaction that undoes every staged row unless it is committed.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::clock::{Clock, SystemClock};
use crate::identity::{CredentialRecord, NewCredential, NewIdentity, ProfileIdentity};

/// A column with a uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
    ExternalId,
    /// Credential records are one per identity.
    CredentialOwner,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0:?}")]
    Conflict(UniqueField),

    #[error("store I/O failure: {0}")]
    Io(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Predicates understood by [`IdentityStore::find_identity`].
///
/// Email values are compared as given; callers normalize first.
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    Id(u64),
    Email(&'a str),
    Username(&'a str),
    EmailOrUsername { email: &'a str, username: &'a str },
    EmailOrExternalId { email: &'a str, external_id: &'a str },
}

impl Lookup<'_> {
    fn matches(&self, identity: &ProfileIdentity) -> bool {
        match *self {
            Lookup::Id(id) => identity.id == id,
            Lookup::Email(email) => identity.email == email,
            Lookup::Username(username) => identity.username == username,
            Lookup::EmailOrUsername { email, username } => {
                identity.email == email || identity.username == username
            }
            Lookup::EmailOrExternalId { email, external_id } => {
                identity.email == email || identity.external_id.as_deref() == Some(external_id)
            }
        }
    }
}

pub trait IdentityStore: Send + Sync {
    /// Returns the first identity (lowest id) matching `lookup`.
    fn find_identity(&self, lookup: &Lookup<'_>) -> StoreResult<Option<ProfileIdentity>>;

    fn find_credential(&self, identity_id: u64) -> StoreResult<Option<CredentialRecord>>;

    /// Creates an identity and, if given, its credential as one unit.
    ///
    /// Either both rows exist afterwards or neither does.
    fn create_atomic(
        &self,
        identity: NewIdentity,
        credential: Option<NewCredential>,
    ) -> StoreResult<ProfileIdentity>;
}

#[derive(Debug, Default)]
struct Tables {
    identities: BTreeMap<u64, ProfileIdentity>,
    credentials: HashMap<u64, CredentialRecord>,
    last_id: u64,
    #[cfg(test)]
    fail_credential_writes: bool,
}

/// Staged writes against the tables. Dropping without `commit`
/// removes everything that was staged.
struct Transaction<'a> {
    tables: RwLockWriteGuard<'a, Tables>,
    staged_identities: Vec<u64>,
    staged_credentials: Vec<u64>,
    committed: bool,
}

impl Transaction<'_> {
    fn insert_identity(
        &mut self,
        new: NewIdentity,
        created_at: u64,
    ) -> StoreResult<ProfileIdentity> {
        let tables = &mut *self.tables;
        let existing = tables.identities.values();
        let mut username_taken = false;
        let mut external_taken = false;
        for identity in existing {
            if identity.email == new.email {
                return Err(StoreError::Conflict(UniqueField::Email));
            }
            username_taken |= identity.username == new.username;
            external_taken |= new.external_id.is_some() && identity.external_id == new.external_id;
        }
        if username_taken {
            return Err(StoreError::Conflict(UniqueField::Username));
        }
        if external_taken {
            return Err(StoreError::Conflict(UniqueField::ExternalId));
        }

        tables.last_id += 1;
        let identity = ProfileIdentity {
            id: tables.last_id,
            username: new.username,
            email: new.email,
            full_name: new.full_name,
            role: new.role,
            external_id: new.external_id,
            password_less: new.password_less,
            created_at,
        };
        tables.identities.insert(identity.id, identity.clone());
        self.staged_identities.push(identity.id);
        Ok(identity)
    }

    fn insert_credential(&mut self, record: CredentialRecord) -> StoreResult<()> {
        #[cfg(test)]
        {
            if self.tables.fail_credential_writes {
                return Err(StoreError::Io("credential table unavailable".to_string()));
            }
        }

        if self.tables.credentials.contains_key(&record.identity_id) {
            return Err(StoreError::Conflict(UniqueField::CredentialOwner));
        }
        self.staged_credentials.push(record.identity_id);
        self.tables.credentials.insert(record.identity_id, record);
        Ok(())
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for id in self.staged_credentials.drain(..) {
            self.tables.credentials.remove(&id);
        }
        for id in self.staged_identities.drain(..) {
            self.tables.identities.remove(&id);
        }
        tracing::debug!("Store transaction rolled back");
    }
}

/// Process-local [`IdentityStore`].
pub struct MemoryStore {
    tables: RwLock<Tables>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock,
        }
    }

    pub fn identity_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.identities.len())
    }

    pub fn credential_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.credentials.len())
    }

    /// Opens a write transaction. Held for the whole check-and-insert so
    /// concurrent creates serialize on the constraints.
    fn begin(&self) -> StoreResult<Transaction<'_>> {
        let tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Io("store lock poisoned".to_string()))?;
        Ok(Transaction {
            tables,
            staged_identities: Vec::new(),
            staged_credentials: Vec::new(),
            committed: false,
        })
    }

    #[cfg(test)]
    pub(crate) fn fail_credential_writes(&self) {
        if let Ok(mut tables) = self.tables.write() {
            tables.fail_credential_writes = true;
        }
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Io("store lock poisoned".to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStore for MemoryStore {
    fn find_identity(&self, lookup: &Lookup<'_>) -> StoreResult<Option<ProfileIdentity>> {
        let tables = self.read()?;
        if let Lookup::Id(id) = lookup {
            return Ok(tables.identities.get(id).cloned());
        }
        Ok(tables
            .identities
            .values()
            .find(|identity| lookup.matches(identity))
            .cloned())
    }

    fn find_credential(&self, identity_id: u64) -> StoreResult<Option<CredentialRecord>> {
        Ok(self.read()?.credentials.get(&identity_id).cloned())
    }

    fn create_atomic(
        &self,
        identity: NewIdentity,
        credential: Option<NewCredential>,
    ) -> StoreResult<ProfileIdentity> {
        let created_at = self.clock.unix_seconds();
        let mut tx = self.begin()?;
        let created = tx.insert_identity(identity, created_at)?;
        if let Some(credential) = credential {
            tx.insert_credential(CredentialRecord {
                identity_id: created.id,
                password_hash: credential.password_hash,
            })?;
        }
        tx.commit();
        tracing::debug!("Identity stored: id={}, username={}", created.id, created.username);
        Ok(created)
    }
}

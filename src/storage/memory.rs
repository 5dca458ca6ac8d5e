//! In-memory reference backend.
//!
//! [`Tables`] holds the full relational state in one struct so that a
//! transaction can span every table, and [`MemoryStore`] provides the
//! transactional access path: mutations run against a working copy that is
//! only installed on success, so a failed operation is never visible to
//! readers.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::collection::Permission;
use crate::entity::{Entity, EntityId};
use crate::error::{DossierError, DossierResult, StorageError};
use crate::identity::{EntityIdentity, IdentityId};
use crate::storage::alerts::AlertTable;
use crate::storage::dependent::Dependent;

/// The full relational state of the engine.
///
/// Mutating operations take `&mut Tables` as their explicit unit-of-work
/// handle; nothing commits until the enclosing
/// [`MemoryStore::transaction`] returns `Ok`.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    /// Canonical entity rows, keyed by id. Rows are soft-deleted in place,
    /// never removed.
    pub entities: HashMap<EntityId, Entity>,
    /// Alternate identifier rows; physically removed on entity deletion.
    pub identities: HashMap<IdentityId, EntityIdentity>,
    /// Read/write grants per collection and role.
    pub permissions: Vec<Permission>,
    /// Alert subscriptions, the built-in dependent record type.
    pub alerts: AlertTable,
}

impl Tables {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every dependent record table, as the cascade interface.
    ///
    /// Entity deletion and merge iterate this instead of naming concrete
    /// record types; registering a new dependent type means adding its
    /// table here.
    pub fn dependents_mut(&mut self) -> impl Iterator<Item = &mut dyn Dependent> {
        std::iter::once(&mut self.alerts as &mut dyn Dependent)
    }

    /// Adds an identity row.
    pub fn add_identity(&mut self, identity: EntityIdentity) {
        self.identities.insert(identity.id, identity);
    }

    /// All identity rows owned by an entity.
    #[must_use]
    pub fn identities_for(&self, entity_id: EntityId) -> Vec<&EntityIdentity> {
        let mut rows: Vec<&EntityIdentity> = self
            .identities
            .values()
            .filter(|row| row.entity_id == entity_id)
            .collect();
        rows.sort_by_key(|row| row.id);
        rows
    }

    /// Physically removes every identity row owned by an entity.
    ///
    /// Returns the number of rows removed.
    pub fn delete_identities(&mut self, entity_id: EntityId) -> usize {
        let before = self.identities.len();
        self.identities.retain(|_, row| row.entity_id != entity_id);
        before - self.identities.len()
    }
}

/// Thread-safe in-memory store.
///
/// Intended for embedded usage, tests, and as a reference implementation
/// of the transactional contract the engine assumes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs a read-only closure against the current state.
    ///
    /// # Errors
    /// Returns [`StorageError::LockPoisoned`] if a writer panicked.
    pub fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> Result<T, StorageError> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StorageError::LockPoisoned("tables.read"))?;
        Ok(f(&tables))
    }

    /// Runs a mutating closure as one atomic transaction.
    ///
    /// The closure receives a working copy of the state. On `Ok` the copy
    /// replaces the live state in one step; on `Err` it is discarded, so
    /// partial mutations from a failed operation are never observable.
    ///
    /// # Errors
    /// Propagates the closure's error, or
    /// [`StorageError::LockPoisoned`] if a previous writer panicked.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Tables) -> DossierResult<T>,
    ) -> DossierResult<T> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| DossierError::from(StorageError::LockPoisoned("tables.write")))?;
        let mut working = tables.clone();
        let result = f(&mut working)?;
        *tables = working;
        Ok(result)
    }
}

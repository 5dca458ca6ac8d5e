//! Collection scoping and read authorization.
//!
//! A collection is an isolation scope: entities belong to exactly one and
//! merges never cross the boundary. The engine does not own collection
//! metadata; it only references collections by id and consults permission
//! rows when a caller supplies an authorization context.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, stable identifier of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionId(Uuid);

impl CollectionId {
    /// Creates a new random collection ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a collection ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for CollectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a role held by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(Uuid);

impl RoleId {
    /// Creates a new random role ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A grant row tying a role to a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub collection_id: CollectionId,
    pub role_id: RoleId,
    pub read: bool,
    pub write: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Permission {
    /// Creates a live read grant for a role on a collection.
    #[must_use]
    pub fn read_grant(collection_id: CollectionId, role_id: RoleId) -> Self {
        Self {
            collection_id,
            role_id,
            read: true,
            write: false,
            deleted_at: None,
        }
    }
}

/// Authorization context supplied by the caller.
///
/// Lookups given `None` instead of a context run unfiltered (trusted-caller
/// mode); lookups given a context only return entities whose collection
/// carries a live read grant for one of the held roles.
#[derive(Debug, Clone, Default)]
pub struct Authz {
    /// Roles the caller holds.
    pub roles: Vec<RoleId>,
}

impl Authz {
    /// Creates a context from a list of held roles.
    #[must_use]
    pub fn with_roles(roles: Vec<RoleId>) -> Self {
        Self { roles }
    }
}

/// Capability predicate: does any of `roles` have a live read grant on
/// `collection_id`?
///
/// Applied as a uniform post-filter on every listing and lookup operation
/// rather than woven into query construction.
#[must_use]
pub fn grants_read(permissions: &[Permission], collection_id: CollectionId, roles: &[RoleId]) -> bool {
    permissions.iter().any(|p| {
        p.collection_id == collection_id
            && p.read
            && p.deleted_at.is_none()
            && roles.contains(&p.role_id)
    })
}

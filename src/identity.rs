//! Alternate identifier rows owned by an entity.
//!
//! Identity rows record external identifiers an entity has been matched
//! under. Unlike the entity itself they are never soft-deleted: when an
//! entity is deleted, its identity rows are physically removed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityId;

/// Unique identifier for an identity row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(Uuid);

impl IdentityId {
    /// Creates a new random identity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IdentityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An alternate identifier associated with an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityIdentity {
    pub id: IdentityId,
    /// Owning entity.
    pub entity_id: EntityId,
    /// The identifier value itself.
    pub identity: String,
    pub created_at: DateTime<Utc>,
}

impl EntityIdentity {
    /// Creates a new identity row for an entity.
    #[must_use]
    pub fn new(entity_id: EntityId, identity: impl Into<String>) -> Self {
        Self {
            id: IdentityId::new(),
            entity_id,
            identity: identity.into(),
            created_at: Utc::now(),
        }
    }
}

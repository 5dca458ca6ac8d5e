//! Entity types and identity management.
//!
//! An entity is the canonical record for a real-world person, organization,
//! document, or other object inside a collection. Everything else in the
//! engine hangs off the stable [`EntityId`]: identity rows, dependent
//! records, and the merge machinery all reference entities by id.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::collection::CollectionId;
use crate::data::ensure_list;
use crate::matching::reduce_terms;
use crate::text::string_value;

/// Reserved data field holding alternate names.
pub const ALIAS_FIELD: &str = "alias";

/// Globally unique, stable entity identifier.
///
/// Once created, an `EntityId` never changes and is never reassigned, even
/// when the entity it names is merged away or soft-deleted.
///
/// # Examples
///
/// ```
/// use dossier::EntityId;
///
/// let id = EntityId::new();
/// assert!(!id.is_nil());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entity ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is a nil (all zeros) UUID.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Creates a nil entity ID (for testing or sentinel values).
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EntityId> for Uuid {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Lifecycle state of an entity.
///
/// The state governs default visibility and mergeability: deleted entities
/// are excluded from lookups unless explicitly requested, and a merge
/// always leaves the survivor `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    /// Fully ingested and visible.
    Active,
    /// Created but not yet confirmed by an ingest pass.
    Pending,
    /// Soft-deleted; the row is kept for provenance.
    Deleted,
}

impl Default for EntityState {
    fn default() -> Self {
        Self::Active
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Pending => write!(f, "pending"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// The canonical mutable aggregate of the engine.
///
/// An entity belongs to exactly one collection for its lifetime. Its
/// `schema` names the validator applied to `data`, and is immutable after
/// creation. `foreign_ids` carries caller-supplied external identifiers
/// used for duplicate detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Globally unique identifier.
    pub id: EntityId,

    /// Schema (type) name; set once at creation.
    pub schema: String,

    /// Lifecycle state.
    pub state: EntityState,

    /// Primary display name. Never empty for an active entity.
    pub name: String,

    /// Validated structured payload. May contain the reserved `alias`
    /// field holding alternate names.
    pub data: Map<String, Value>,

    /// Deduplicated set of caller-supplied external identifiers.
    pub foreign_ids: BTreeSet<String>,

    /// Owning collection; never changes after assignment.
    pub collection_id: CollectionId,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Soft-delete timestamp; `None` while the entity is live.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity {
    /// Allocates a fresh entity shell for the given schema and collection.
    ///
    /// The shell is `Pending` with an empty name; the first `update` fills
    /// in the validated payload and activates it.
    pub(crate) fn create(schema: impl Into<String>, collection_id: CollectionId) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            schema: schema.into(),
            state: EntityState::Pending,
            name: String::new(),
            data: Map::new(),
            foreign_ids: BTreeSet::new(),
            collection_id,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Returns true if the entity has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Returns true if the entity is in the active state.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == EntityState::Active
    }

    /// The set of human-readable name strings for this entity: the primary
    /// name plus every non-empty alias.
    #[must_use]
    pub fn terms(&self) -> BTreeSet<String> {
        let mut terms = BTreeSet::new();
        terms.insert(self.name.clone());
        if let Some(aliases) = self.data.get(ALIAS_FIELD) {
            for alias in ensure_list(aliases) {
                if let Some(alias) = string_value(&alias) {
                    terms.insert(alias);
                }
            }
        }
        terms
    }

    /// The minimal set of normalized terms sufficient to match all name
    /// variants of this entity.
    ///
    /// Terms that are substrings of other terms after normalization are
    /// dropped: matching the shorter form already matches every occurrence
    /// of the longer one.
    #[must_use]
    pub fn regex_terms(&self) -> BTreeSet<String> {
        reduce_terms(&self.terms())
    }

    /// Canonical serialized projection of this entity.
    #[must_use]
    pub fn to_record(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "schema": self.schema,
            "name": self.name,
            "state": self.state,
            "data": self.data,
            "foreign_ids": self.foreign_ids,
            "collection_id": self.collection_id,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
            "deleted_at": self.deleted_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_id_creation() {
        let id1 = EntityId::new();
        let id2 = EntityId::new();
        assert_ne!(id1, id2);
        assert!(!id1.is_nil());
    }

    #[test]
    fn test_entity_id_nil() {
        let nil = EntityId::nil();
        assert!(nil.is_nil());
    }

    #[test]
    fn test_entity_id_display() {
        let id = EntityId::new();
        let display = format!("{id}");
        assert!(display.contains('-')); // UUID format
    }

    #[test]
    fn test_state_display_and_serde() {
        assert_eq!(format!("{}", EntityState::Active), "active");
        assert_eq!(format!("{}", EntityState::Deleted), "deleted");
        let json = serde_json::to_string(&EntityState::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }

    #[test]
    fn test_create_shell() {
        let collection = CollectionId::new();
        let ent = Entity::create("Person", collection);
        assert_eq!(ent.schema, "Person");
        assert_eq!(ent.state, EntityState::Pending);
        assert!(ent.name.is_empty());
        assert!(!ent.is_deleted());
        assert_eq!(ent.collection_id, collection);
    }

    #[test]
    fn test_terms_include_name_and_aliases() {
        let mut ent = Entity::create("Person", CollectionId::new());
        ent.name = "John Doe".to_string();
        ent.data
            .insert(ALIAS_FIELD.to_string(), json!(["Johnny", "", "J. Doe"]));

        let terms = ent.terms();
        assert!(terms.contains("John Doe"));
        assert!(terms.contains("Johnny"));
        assert!(terms.contains("J. Doe"));
        // Empty aliases are skipped.
        assert_eq!(terms.len(), 3);
    }

    #[test]
    fn test_terms_with_scalar_alias() {
        let mut ent = Entity::create("Person", CollectionId::new());
        ent.name = "John Doe".to_string();
        ent.data.insert(ALIAS_FIELD.to_string(), json!("Johnny"));
        assert!(ent.terms().contains("Johnny"));
    }

    #[test]
    fn test_to_record_projection() {
        let mut ent = Entity::create("Company", CollectionId::new());
        ent.name = "Acme".to_string();
        ent.foreign_ids.insert("reg-1".to_string());

        let record = ent.to_record();
        assert_eq!(record["schema"], json!("Company"));
        assert_eq!(record["name"], json!("Acme"));
        assert_eq!(record["state"], json!("pending"));
        assert_eq!(record["foreign_ids"], json!(["reg-1"]));
        assert!(record["id"].is_string());
    }

    #[test]
    fn test_entity_serialization_round_trip() {
        let mut ent = Entity::create("Person", CollectionId::new());
        ent.name = "Jane".to_string();
        let json = serde_json::to_string(&ent).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(ent, back);
    }
}

//! Entity operations: save, update, merge, delete, and lookups.
//!
//! The mutating operations are free functions over an explicit
//! [`Tables`] handle (the unit of work) and never commit anything
//! themselves. [`EntityEngine`] is the convenience wrapper that runs each
//! operation inside one [`MemoryStore`] transaction; callers composing
//! multiple operations atomically use [`MemoryStore::transaction`]
//! directly and call the free functions.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde_json::{Map, Value};

use crate::collection::{grants_read, Authz, CollectionId};
use crate::data::{ensure_list, merge_maps};
use crate::entity::{Entity, EntityId, EntityState, ALIAS_FIELD};
use crate::error::{DossierResult, MergeError, StorageError, ValidationError};
use crate::schema::SchemaRegistry;
use crate::storage::memory::{MemoryStore, Tables};
use crate::text::string_value;

/// Incoming payload for [`save`] and [`update`].
///
/// Foreign ids arrive as raw JSON values; anything that does not normalize
/// to a non-empty string is dropped during `update`.
#[derive(Debug, Clone, Default)]
pub struct EntityInput {
    /// Id of an existing entity to update; `None` to create.
    pub id: Option<EntityId>,
    /// Schema name; required when creating, ignored on update.
    pub schema: Option<String>,
    /// Primary display name.
    pub name: Option<String>,
    /// Type-specific structured payload (without `name`).
    pub data: Map<String, Value>,
    /// Caller-supplied external identifiers, in raw form.
    pub foreign_ids: Vec<Value>,
    /// Lifecycle state; defaults to active.
    pub state: Option<EntityState>,
}

impl EntityInput {
    /// Payload creating a new entity with the given schema and name.
    #[must_use]
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Payload addressing an existing entity.
    #[must_use]
    pub fn existing(id: EntityId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Sets the target entity id.
    #[must_use]
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the primary name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a data field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Adds a raw foreign id candidate.
    #[must_use]
    pub fn with_foreign_id(mut self, value: impl Into<Value>) -> Self {
        self.foreign_ids.push(value.into());
        self
    }

    /// Sets the lifecycle state.
    #[must_use]
    pub fn with_state(mut self, state: EntityState) -> Self {
        self.state = Some(state);
        self
    }

    /// Fold this payload over the current record, incoming values winning
    /// on scalar collisions and list-valued fields unioning.
    fn merged_over(mut self, current: &Entity) -> Self {
        let data = std::mem::take(&mut self.data);
        self.data = merge_maps(&current.data, &data);
        if self.name.is_none() {
            self.name = Some(current.name.clone());
        }
        if self.state.is_none() {
            self.state = Some(current.state);
        }
        let mut foreign_ids: Vec<Value> = current
            .foreign_ids
            .iter()
            .cloned()
            .map(Value::String)
            .collect();
        foreign_ids.append(&mut self.foreign_ids);
        self.foreign_ids = foreign_ids;
        self
    }
}

/// Create or update an entity from an incoming payload.
///
/// An `id` naming a live entity updates it in place; otherwise a fresh id
/// is allocated and the payload must declare a schema. With `merge` set,
/// the payload is first folded over the current record (incoming wins,
/// lists union) before being applied.
///
/// # Errors
/// - [`ValidationError::MissingSchema`] when creating without a schema.
/// - [`ValidationError::CollectionMismatch`] when the resolved entity
///   belongs to a different collection; an entity's collection never
///   changes.
/// - Whatever [`update`] rejects.
pub fn save(
    txn: &mut Tables,
    schemata: &SchemaRegistry,
    collection_id: CollectionId,
    input: EntityInput,
    merge: bool,
) -> DossierResult<Entity> {
    let existing = input
        .id
        .and_then(|id| txn.entities.get(&id))
        .filter(|ent| !ent.is_deleted())
        .cloned();

    let (id, input) = match existing {
        Some(current) => {
            if current.collection_id != collection_id {
                return Err(ValidationError::CollectionMismatch {
                    id: current.id,
                    actual: current.collection_id,
                    requested: collection_id,
                }
                .into());
            }
            let input = if merge { input.merged_over(&current) } else { input };
            (current.id, input)
        }
        None => {
            let schema = input
                .schema
                .clone()
                .ok_or(ValidationError::MissingSchema)?;
            let ent = Entity::create(schema, collection_id);
            let id = ent.id;
            debug!("creating entity {id} in collection {collection_id}");
            txn.entities.insert(id, ent);
            (id, input)
        }
    };

    update(txn, schemata, id, &input)
}

/// Apply a validated payload to an existing entity.
///
/// The name travels through schema validation inside the data payload and
/// is extracted back out afterwards. Foreign ids are normalized through
/// [`string_value`] and deduplicated; unconvertible candidates are
/// dropped. The state defaults to active. Idempotent for a fixed payload,
/// apart from `updated_at`.
///
/// # Errors
/// - [`StorageError::EntityNotFound`] when the id is unknown.
/// - [`ValidationError::UnknownSchema`] / [`ValidationError::UnknownField`]
///   from the schema registry.
/// - [`ValidationError::MissingName`] when no usable name survives
///   validation.
pub fn update(
    txn: &mut Tables,
    schemata: &SchemaRegistry,
    id: EntityId,
    input: &EntityInput,
) -> DossierResult<Entity> {
    let mut ent = txn
        .entities
        .get(&id)
        .cloned()
        .ok_or(StorageError::EntityNotFound(id))?;

    let mut data = input.data.clone();
    data.insert(
        "name".to_string(),
        input.name.clone().map_or(Value::Null, Value::String),
    );
    let mut validated = schemata.validate(&ent.schema, data)?;
    let name = validated
        .remove("name")
        .as_ref()
        .and_then(string_value)
        .ok_or(ValidationError::MissingName)?;

    ent.name = name;
    ent.data = validated;
    ent.foreign_ids = input.foreign_ids.iter().filter_map(string_value).collect();
    ent.state = input.state.unwrap_or(EntityState::Active);
    ent.updated_at = Utc::now();

    txn.entities.insert(id, ent.clone());
    Ok(ent)
}

/// Soft-delete an entity.
///
/// Owned identity rows are physically removed, every dependent table is
/// told to soft-delete its rows with one shared timestamp, and the entity
/// itself flips to the deleted state. Idempotent: deleting an
/// already-deleted entity re-runs the identity removal and leaves the
/// original deletion timestamp in place.
///
/// # Errors
/// [`StorageError::EntityNotFound`] when the id is unknown.
pub fn delete(
    txn: &mut Tables,
    id: EntityId,
    deleted_at: Option<DateTime<Utc>>,
) -> DossierResult<()> {
    if !txn.entities.contains_key(&id) {
        return Err(StorageError::EntityNotFound(id).into());
    }

    let stamp = deleted_at.unwrap_or_else(Utc::now);
    let identities = txn.delete_identities(id);
    let mut dependents = 0;
    for table in txn.dependents_mut() {
        dependents += table.on_entity_deleted(id, stamp);
    }
    debug!("deleting entity {id}: {identities} identities, {dependents} dependent rows");

    if let Some(ent) = txn.entities.get_mut(&id) {
        ent.state = EntityState::Deleted;
        if ent.deleted_at.is_none() {
            ent.deleted_at = Some(stamp);
        }
    }
    Ok(())
}

/// Fold `loser` into `survivor`, leaving one canonical record.
///
/// Preconditions are checked before anything is touched: the two ids must
/// differ and both entities must live in the same collection. The
/// survivor keeps its scalar values, absorbs the loser's data and foreign
/// ids, inherits the earlier creation time, and picks up the loser's name
/// as an alias when the names differ case-insensitively. Dependent rows
/// are bulk-repointed to the survivor before the loser is soft-deleted.
///
/// Re-running a merge whose loser is already soft-deleted is safe: every
/// folding step is a union or an idempotent assignment.
///
/// # Errors
/// - [`MergeError::SelfMerge`] / [`MergeError::CollectionMismatch`] on
///   precondition failure, with no mutation performed.
/// - [`StorageError::EntityNotFound`] when either entity is unknown.
pub fn merge(txn: &mut Tables, survivor_id: EntityId, loser_id: EntityId) -> DossierResult<Entity> {
    if survivor_id == loser_id {
        return Err(MergeError::SelfMerge { id: survivor_id }.into());
    }
    let mut survivor = txn
        .entities
        .get(&survivor_id)
        .cloned()
        .ok_or(StorageError::EntityNotFound(survivor_id))?;
    let loser = txn
        .entities
        .get(&loser_id)
        .cloned()
        .ok_or(StorageError::EntityNotFound(loser_id))?;
    if survivor.collection_id != loser.collection_id {
        return Err(MergeError::CollectionMismatch {
            survivor: survivor_id,
            loser: loser_id,
            survivor_collection: survivor.collection_id,
            loser_collection: loser.collection_id,
        }
        .into());
    }

    // Survivor scalars win; list-valued fields union.
    survivor.data = merge_maps(&loser.data, &survivor.data);

    if !loser.name.is_empty() && survivor.name.to_lowercase() != loser.name.to_lowercase() {
        let mut aliases = survivor
            .data
            .get(ALIAS_FIELD)
            .map(ensure_list)
            .unwrap_or_default();
        let candidate = Value::String(loser.name.clone());
        if !aliases.contains(&candidate) {
            aliases.push(candidate);
        }
        survivor.data.insert(ALIAS_FIELD.to_string(), Value::Array(aliases));
    }

    survivor.state = EntityState::Active;
    survivor
        .foreign_ids
        .extend(loser.foreign_ids.iter().cloned());
    survivor.created_at = survivor.created_at.min(loser.created_at);
    survivor.updated_at = Utc::now();

    let mut repointed = 0;
    for table in txn.dependents_mut() {
        repointed += table.repoint(loser_id, survivor_id);
    }
    info!("merged entity {loser_id} into {survivor_id}, repointed {repointed} dependent rows");

    txn.entities.insert(survivor_id, survivor.clone());
    delete(txn, loser_id, None)?;
    Ok(survivor)
}

/// Look up an entity by id.
///
/// Deleted entities are excluded unless `include_deleted` is set. Absence
/// is a value, not an error.
#[must_use]
pub fn by_id(tables: &Tables, id: EntityId, include_deleted: bool) -> Option<Entity> {
    tables
        .entities
        .get(&id)
        .filter(|ent| include_deleted || !ent.is_deleted())
        .cloned()
}

/// Look up an entity by foreign id within one collection.
///
/// The raw id is normalized through [`string_value`]; unconvertible values
/// match nothing. When several rows carry the same foreign id (tolerated
/// as a data-quality reality), live rows win over deleted ones, and the
/// most recently deleted row wins among the deleted.
#[must_use]
pub fn by_foreign_id(
    tables: &Tables,
    foreign_id: &Value,
    collection_id: CollectionId,
    include_deleted: bool,
) -> Option<Entity> {
    let foreign_id = string_value(foreign_id)?;
    let mut candidates: Vec<&Entity> = tables
        .entities
        .values()
        .filter(|ent| ent.collection_id == collection_id)
        .filter(|ent| include_deleted || !ent.is_deleted())
        .filter(|ent| ent.foreign_ids.contains(&foreign_id))
        .collect();
    candidates.sort_by_key(|ent| (ent.deleted_at.is_some(), Reverse(ent.deleted_at), ent.id));
    candidates.first().map(|ent| (*ent).clone())
}

/// Authorization-scoped bulk lookup by id.
///
/// With no context the lookup is unfiltered (trusted-caller mode); with a
/// context, only entities whose collection carries a live read grant for
/// one of the held roles are returned. Results are ordered by id.
#[must_use]
pub fn all_by_ids(
    tables: &Tables,
    ids: &[EntityId],
    include_deleted: bool,
    authz: Option<&Authz>,
) -> Vec<Entity> {
    let wanted: HashSet<EntityId> = ids.iter().copied().collect();
    let mut found: Vec<Entity> = tables
        .entities
        .values()
        .filter(|ent| wanted.contains(&ent.id))
        .filter(|ent| include_deleted || !ent.is_deleted())
        .filter(|ent| readable(tables, ent.collection_id, authz))
        .cloned()
        .collect();
    found.sort_by_key(|ent| ent.id);
    found
}

/// Authorization-scoped listing of all entity ids.
#[must_use]
pub fn all_ids(tables: &Tables, include_deleted: bool, authz: Option<&Authz>) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = tables
        .entities
        .values()
        .filter(|ent| include_deleted || !ent.is_deleted())
        .filter(|ent| readable(tables, ent.collection_id, authz))
        .map(|ent| ent.id)
        .collect();
    ids.sort_unstable();
    ids
}

// The uniform post-filter applied to every listing operation.
fn readable(tables: &Tables, collection_id: CollectionId, authz: Option<&Authz>) -> bool {
    match authz {
        None => true,
        Some(authz) => grants_read(&tables.permissions, collection_id, &authz.roles),
    }
}

/// The most recent `updated_at` across all active entities.
///
/// Callers use this for cache-invalidation checks. `None` when no active
/// entity exists.
#[must_use]
pub fn latest(tables: &Tables) -> Option<DateTime<Utc>> {
    tables
        .entities
        .values()
        .filter(|ent| ent.is_active())
        .map(|ent| ent.updated_at)
        .max()
}

/// A reference to an entity by explicit id or by foreign id.
///
/// Callers that receive loosely-structured references (a parent record in
/// an ingest payload, say) resolve them through [`resolve_ref`].
#[derive(Debug, Clone)]
pub enum EntityRef {
    /// Direct reference by entity id.
    Id(EntityId),
    /// Reference by raw foreign id.
    ForeignId(Value),
}

/// Resolve an entity reference within one collection.
#[must_use]
pub fn resolve_ref(tables: &Tables, collection_id: CollectionId, entity_ref: &EntityRef) -> Option<Entity> {
    match entity_ref {
        EntityRef::Id(id) => {
            by_id(tables, *id, false).filter(|ent| ent.collection_id == collection_id)
        }
        EntityRef::ForeignId(value) => by_foreign_id(tables, value, collection_id, false),
    }
}

/// Entity engine: one transaction per operation.
///
/// Holds the store and the schema registry; each method delegates to the
/// free function of the same name inside a single transaction or read.
#[derive(Clone)]
pub struct EntityEngine {
    store: Arc<MemoryStore>,
    schemata: SchemaRegistry,
}

impl EntityEngine {
    /// Creates an engine over a store with the given schema registry.
    #[must_use]
    pub fn new(store: Arc<MemoryStore>, schemata: SchemaRegistry) -> Self {
        Self { store, schemata }
    }

    /// The underlying store, for composing multi-entity transactions.
    #[must_use]
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Create or update an entity; see [`save`].
    pub fn save(
        &self,
        collection_id: CollectionId,
        input: EntityInput,
        merge: bool,
    ) -> DossierResult<Entity> {
        self.store
            .transaction(|txn| save(txn, &self.schemata, collection_id, input, merge))
    }

    /// Apply a payload to an existing entity; see [`update`].
    pub fn update(&self, id: EntityId, input: &EntityInput) -> DossierResult<Entity> {
        self.store
            .transaction(|txn| update(txn, &self.schemata, id, input))
    }

    /// Soft-delete an entity; see [`delete`].
    pub fn delete(&self, id: EntityId) -> DossierResult<()> {
        self.store.transaction(|txn| delete(txn, id, None))
    }

    /// Merge two entities; see [`merge`].
    pub fn merge(&self, survivor: EntityId, loser: EntityId) -> DossierResult<Entity> {
        self.store.transaction(|txn| merge(txn, survivor, loser))
    }

    /// Look up an entity by id, excluding deleted entities.
    pub fn by_id(&self, id: EntityId) -> DossierResult<Option<Entity>> {
        Ok(self.store.read(|tables| by_id(tables, id, false))?)
    }

    /// Look up an entity by foreign id; see [`by_foreign_id`].
    pub fn by_foreign_id(
        &self,
        foreign_id: &Value,
        collection_id: CollectionId,
        include_deleted: bool,
    ) -> DossierResult<Option<Entity>> {
        Ok(self
            .store
            .read(|tables| by_foreign_id(tables, foreign_id, collection_id, include_deleted))?)
    }

    /// Authorization-scoped bulk lookup; see [`all_by_ids`].
    pub fn all_by_ids(
        &self,
        ids: &[EntityId],
        include_deleted: bool,
        authz: Option<&Authz>,
    ) -> DossierResult<Vec<Entity>> {
        Ok(self
            .store
            .read(|tables| all_by_ids(tables, ids, include_deleted, authz))?)
    }

    /// Authorization-scoped id listing; see [`all_ids`].
    pub fn all_ids(
        &self,
        include_deleted: bool,
        authz: Option<&Authz>,
    ) -> DossierResult<Vec<EntityId>> {
        Ok(self
            .store
            .read(|tables| all_ids(tables, include_deleted, authz))?)
    }

    /// Most recent activity timestamp; see [`latest`].
    pub fn latest(&self) -> DossierResult<Option<DateTime<Utc>>> {
        Ok(self.store.read(latest)?)
    }

    /// Resolve a loose entity reference; see [`resolve_ref`].
    pub fn resolve_ref(
        &self,
        collection_id: CollectionId,
        entity_ref: &EntityRef,
    ) -> DossierResult<Option<Entity>> {
        Ok(self
            .store
            .read(|tables| resolve_ref(tables, collection_id, entity_ref))?)
    }
}

//! Error types for dossier.
//!
//! All errors are strongly typed using thiserror. This enables pattern
//! matching on specific failure conditions and keeps the failure taxonomy
//! explicit: payload validation, merge preconditions, and storage faults
//! are distinct classes. Lookups that find nothing return `Option`, not an
//! error; absence is a value the caller interprets.

use thiserror::Error;

use crate::collection::CollectionId;
use crate::entity::EntityId;

/// Validation errors raised while applying an incoming payload.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No schema provided for new entity")]
    MissingSchema,

    #[error("Unknown schema: {schema}")]
    UnknownSchema {
        schema: String,
    },

    #[error("Schema '{schema}' does not define field '{field}'")]
    UnknownField {
        schema: String,
        field: String,
    },

    #[error("Entity name is missing or empty")]
    MissingName,

    #[error("Entity {id} belongs to collection {actual}, not {requested}")]
    CollectionMismatch {
        id: EntityId,
        actual: CollectionId,
        requested: CollectionId,
    },
}

/// Merge precondition failures.
///
/// These are raised before any record is touched; a failed merge leaves
/// both entities exactly as they were.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Cannot merge entity {id} with itself")]
    SelfMerge {
        id: EntityId,
    },

    #[error("Cannot merge across collections: {survivor} is in {survivor_collection}, {loser} is in {loser_collection}")]
    CollectionMismatch {
        survivor: EntityId,
        loser: EntityId,
        survivor_collection: CollectionId,
        loser_collection: CollectionId,
    },
}

/// Errors surfaced by the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Entity not found.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// A lock guarding shared state was poisoned.
    #[error("Poisoned lock: {0}")]
    LockPoisoned(&'static str),
}

/// Top-level error type for dossier operations.
#[derive(Debug, Error)]
pub enum DossierError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl DossierError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a merge precondition error.
    #[must_use]
    pub const fn is_merge(&self) -> bool {
        matches!(self, Self::Merge(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type alias for dossier operations.
pub type DossierResult<T> = Result<T, DossierError>;

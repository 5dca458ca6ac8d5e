//! Cascade interface for records that reference entities.

use chrono::{DateTime, Utc};

use crate::entity::EntityId;

/// A table of records that reference entities by id.
///
/// The entity operations never name concrete dependent record types; merge
/// and delete fan out through this trait. Implementations must apply both
/// operations in bulk; record-by-record reconstruction would break the
/// atomicity expectations of the callers.
pub trait Dependent {
    /// Repoint every row referencing `from` to reference `to` instead.
    ///
    /// Returns the number of rows updated.
    fn repoint(&mut self, from: EntityId, to: EntityId) -> usize;

    /// Soft-delete every live row referencing the deleted entity, stamping
    /// each with the same deletion timestamp.
    ///
    /// Returns the number of rows affected.
    fn on_entity_deleted(&mut self, entity_id: EntityId, deleted_at: DateTime<Utc>) -> usize;
}

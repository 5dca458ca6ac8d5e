//! Alert records: the built-in dependent record type.
//!
//! An alert subscribes a role to activity around one entity. Alerts follow
//! their entity through the lifecycle: they are repointed when the entity
//! is merged away and soft-deleted when it is deleted.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collection::RoleId;
use crate::entity::EntityId;
use crate::storage::dependent::Dependent;

/// Unique identifier for an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(Uuid);

impl AlertId {
    /// Creates a new random alert ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A role's subscription to activity on one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    /// The entity this alert tracks.
    pub entity_id: EntityId,
    /// The subscribing role.
    pub role_id: RoleId,
    /// Human-readable label shown to the subscriber.
    pub label: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Creates a live alert on an entity for a role.
    #[must_use]
    pub fn new(entity_id: EntityId, role_id: RoleId, label: impl Into<String>) -> Self {
        Self {
            id: AlertId::new(),
            entity_id,
            role_id,
            label: label.into(),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    /// Returns true if the alert has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// In-memory alert table.
#[derive(Debug, Clone, Default)]
pub struct AlertTable {
    rows: HashMap<AlertId, Alert>,
}

impl AlertTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an alert row.
    pub fn insert(&mut self, alert: Alert) {
        self.rows.insert(alert.id, alert);
    }

    /// Returns the alert with the given id.
    #[must_use]
    pub fn get(&self, id: AlertId) -> Option<&Alert> {
        self.rows.get(&id)
    }

    /// All alerts referencing an entity, deleted or not.
    #[must_use]
    pub fn by_entity(&self, entity_id: EntityId) -> Vec<&Alert> {
        let mut rows: Vec<&Alert> = self
            .rows
            .values()
            .filter(|a| a.entity_id == entity_id)
            .collect();
        rows.sort_by_key(|a| a.id);
        rows
    }

    /// Number of rows in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Dependent for AlertTable {
    fn repoint(&mut self, from: EntityId, to: EntityId) -> usize {
        let mut updated = 0;
        for alert in self.rows.values_mut() {
            if alert.entity_id == from {
                alert.entity_id = to;
                updated += 1;
            }
        }
        updated
    }

    fn on_entity_deleted(&mut self, entity_id: EntityId, deleted_at: DateTime<Utc>) -> usize {
        let mut affected = 0;
        for alert in self.rows.values_mut() {
            if alert.entity_id == entity_id && alert.deleted_at.is_none() {
                alert.deleted_at = Some(deleted_at);
                affected += 1;
            }
        }
        affected
    }
}

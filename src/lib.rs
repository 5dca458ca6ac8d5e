//! # Dossier: entity identity & merge engine
//!
//! Dossier manages canonical entity records (people, organizations,
//! documents) inside collection-scoped investigative datasets, and resolves
//! when multiple ingested records describe the same real-world entity.
//!
//! ## Core concepts
//!
//! - **Entity**: the canonical mutable record with schema-validated data,
//!   lifecycle state, foreign identifiers, collection scope
//! - **Merge**: folding two same-collection entities into one survivor,
//!   repointing dependent records and soft-deleting the loser
//! - **Terms**: the minimal set of normalized name variants seeding
//!   downstream fuzzy matching
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use dossier::{CollectionId, EntityEngine, EntityInput, MemoryStore, OpenSchema, SchemaRegistry};
//!
//! let mut schemata = SchemaRegistry::new();
//! schemata.register("Person", Arc::new(OpenSchema));
//! let engine = EntityEngine::new(Arc::new(MemoryStore::new()), schemata);
//!
//! let collection = CollectionId::new();
//! let jane = engine
//!     .save(
//!         collection,
//!         EntityInput::new("Person", "Jane Doe").with_foreign_id("p1"),
//!         false,
//!     )
//!     .unwrap();
//! assert!(jane.foreign_ids.contains("p1"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod collection;
pub mod data;
pub mod engine;
pub mod entity;
pub mod error;
pub mod identity;
pub mod matching;
pub mod schema;
pub mod storage;
pub mod text;

// Re-export primary types at crate root for convenience
pub use collection::{grants_read, Authz, CollectionId, Permission, RoleId};
pub use engine::{EntityEngine, EntityInput, EntityRef};
pub use entity::{Entity, EntityId, EntityState};
pub use error::{DossierError, DossierResult, MergeError, StorageError, ValidationError};
pub use identity::{EntityIdentity, IdentityId};
pub use matching::{reduce_terms, term_regex, MAX_TERM_LENGTH, MIN_TERM_LENGTH};
pub use schema::{FieldSchema, OpenSchema, SchemaRegistry, Validator};
pub use storage::{Alert, AlertId, AlertTable, Dependent, MemoryStore, Tables};

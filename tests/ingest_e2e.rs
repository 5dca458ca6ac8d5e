//! End-to-end ingestion flows: create, look up, update, authorize, delete.

use std::sync::Arc;

use serde_json::json;

use dossier::{
    Alert, Authz, CollectionId, EntityEngine, EntityIdentity, EntityInput, EntityState,
    FieldSchema, MemoryStore, OpenSchema, Permission, RoleId, SchemaRegistry,
};

fn engine() -> EntityEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut schemata = SchemaRegistry::new();
    schemata.register(
        "Person",
        Arc::new(FieldSchema::new("Person", ["nationality", "birth_date"])),
    );
    schemata.register("Company", Arc::new(OpenSchema));
    EntityEngine::new(Arc::new(MemoryStore::new()), schemata)
}

#[test]
fn ingest_then_lookup_by_foreign_id() {
    let engine = engine();
    let collection = CollectionId::new();

    let created = engine
        .save(
            collection,
            EntityInput::new("Person", "Jane Doe")
                .with_field("nationality", json!("DE"))
                .with_foreign_id("ABC-123"),
            false,
        )
        .unwrap();

    // Found in its own collection, post-normalization.
    let found = engine
        .by_foreign_id(&json!("  ABC-123 "), collection, false)
        .unwrap()
        .unwrap();
    assert_eq!(found.id, created.id);

    // Not found in any other collection.
    assert!(engine
        .by_foreign_id(&json!("ABC-123"), CollectionId::new(), false)
        .unwrap()
        .is_none());

    // Unknown ids resolve to absence, not an error.
    assert!(engine
        .by_foreign_id(&json!("XYZ-999"), collection, false)
        .unwrap()
        .is_none());
}

#[test]
fn ingest_twice_updates_in_place() {
    let engine = engine();
    let collection = CollectionId::new();

    let first = engine
        .save(
            collection,
            EntityInput::new("Person", "J Doe").with_foreign_id("p1"),
            false,
        )
        .unwrap();

    let second = engine
        .save(
            collection,
            EntityInput::existing(first.id)
                .with_name("Jane Doe")
                .with_field("nationality", json!("DE"))
                .with_foreign_id("p1")
                .with_foreign_id("p2"),
            false,
        )
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.name, "Jane Doe");
    assert_eq!(second.schema, "Person");
    assert!(second.foreign_ids.contains("p2"));
    assert!(second.updated_at >= first.updated_at);
    assert_eq!(engine.all_ids(false, None).unwrap().len(), 1);
}

#[test]
fn delete_cascades_identities_and_alerts() {
    let engine = engine();
    let collection = CollectionId::new();
    let ent = engine
        .save(
            collection,
            EntityInput::new("Person", "Jane Doe").with_foreign_id("p1"),
            false,
        )
        .unwrap();

    let alert_id = engine
        .store()
        .transaction(|txn| {
            txn.add_identity(EntityIdentity::new(ent.id, "passport:X1"));
            txn.add_identity(EntityIdentity::new(ent.id, "tax:77"));
            let alert = Alert::new(ent.id, RoleId::new(), "watch Jane");
            let id = alert.id;
            txn.alerts.insert(alert);
            Ok(id)
        })
        .unwrap();

    engine.delete(ent.id).unwrap();

    let deleted = engine
        .by_foreign_id(&json!("p1"), collection, true)
        .unwrap()
        .unwrap();
    assert_eq!(deleted.state, EntityState::Deleted);
    let stamp = deleted.deleted_at.unwrap();

    engine
        .store()
        .read(|tables| {
            // Identity rows are physically gone; the alert is soft-deleted
            // with the same timestamp as the entity.
            assert!(tables.identities_for(ent.id).is_empty());
            let alert = tables.alerts.get(alert_id).unwrap();
            assert_eq!(alert.deleted_at, Some(stamp));
        })
        .unwrap();

    // Default lookups no longer see the entity.
    assert!(engine
        .by_foreign_id(&json!("p1"), collection, false)
        .unwrap()
        .is_none());
    assert!(engine.by_id(ent.id).unwrap().is_none());

    // Deleting again is a no-op that keeps the original timestamp.
    engine.delete(ent.id).unwrap();
    let again = engine
        .by_foreign_id(&json!("p1"), collection, true)
        .unwrap()
        .unwrap();
    assert_eq!(again.deleted_at, Some(stamp));
}

#[test]
fn authz_context_filters_bulk_lookups() {
    let engine = engine();
    let open_collection = CollectionId::new();
    let closed_collection = CollectionId::new();
    let role = RoleId::new();

    let visible = engine
        .save(open_collection, EntityInput::new("Person", "Jane"), false)
        .unwrap();
    let hidden = engine
        .save(closed_collection, EntityInput::new("Person", "John"), false)
        .unwrap();

    engine
        .store()
        .transaction(|txn| {
            txn.permissions.push(Permission::read_grant(open_collection, role));
            Ok(())
        })
        .unwrap();

    let ids = [visible.id, hidden.id];

    // Trusted-caller mode returns everything.
    assert_eq!(engine.all_by_ids(&ids, false, None).unwrap().len(), 2);

    // A context restricts to collections with a live read grant.
    let authz = Authz::with_roles(vec![role]);
    let scoped = engine.all_by_ids(&ids, false, Some(&authz)).unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].id, visible.id);

    let scoped_ids = engine.all_ids(false, Some(&authz)).unwrap();
    assert_eq!(scoped_ids, vec![visible.id]);

    // A context with no roles sees nothing.
    let empty = Authz::default();
    assert!(engine.all_by_ids(&ids, false, Some(&empty)).unwrap().is_empty());
}

#[test]
fn latest_reflects_most_recent_active_update() {
    let engine = engine();
    let collection = CollectionId::new();

    let a = engine
        .save(collection, EntityInput::new("Person", "A"), false)
        .unwrap();
    let b = engine
        .save(collection, EntityInput::new("Person", "B"), false)
        .unwrap();
    assert_eq!(engine.latest().unwrap(), Some(b.updated_at));

    let a2 = engine
        .save(
            collection,
            EntityInput::existing(a.id).with_name("A updated"),
            false,
        )
        .unwrap();
    assert_eq!(engine.latest().unwrap(), Some(a2.updated_at));
}

#[test]
fn failed_save_leaves_no_partial_state() {
    let engine = engine();
    let collection = CollectionId::new();

    // The unknown field fails validation after the entity shell was
    // allocated inside the transaction; nothing may leak out.
    let err = engine
        .save(
            collection,
            EntityInput::new("Person", "Jane").with_field("shoe_size", json!(42)),
            false,
        )
        .unwrap_err();
    assert!(err.is_validation());
    assert!(engine.all_ids(true, None).unwrap().is_empty());
}

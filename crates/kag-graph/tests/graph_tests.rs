use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kag_core::config::LinkingSettings;
use kag_core::traits::GraphStore;
use kag_core::types::{Entity, EntityId, Relationship};
use kag_core::{Error, Result};
use kag_graph::{EntityLinker, RelationshipResolver, SqliteGraphStore};
use tempfile::TempDir;

fn seeded() -> (SqliteGraphStore, EntityId, EntityId, EntityId) {
    let store = SqliteGraphStore::open_in_memory().unwrap();
    let rust = store.insert_entity("Rust", "LANGUAGE", Some("systems language"), &["rustlang".to_string()]).unwrap();
    let tokio = store.insert_entity("Tokio", "LIBRARY", None, &[]).unwrap();
    let mozilla = store.insert_entity("Mozilla", "ORGANIZATION", None, &[]).unwrap();
    store.insert_relationship(tokio, rust, "written_in", Some(7)).unwrap();
    store.insert_relationship(mozilla, rust, "sponsored", None).unwrap();
    store.insert_relationship(mozilla, rust, "sponsored", None).unwrap();
    (store, rust, tokio, mozilla)
}

#[derive(Default)]
struct CountingStore {
    calls: AtomicUsize,
}

impl GraphStore for CountingStore {
    fn find_entities_by_names(&self, _names: &[String], _limit: usize) -> Result<Vec<Entity>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::Storage("database is locked".to_string()))
    }
    fn relationships_for(&self, _entity_ids: &[EntityId], _limit: usize) -> Result<Vec<Relationship>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::Storage("database is locked".to_string()))
    }
}

#[test]
fn linker_matches_tokens_by_name() {
    let (store, rust, tokio, _) = seeded();
    let linker = EntityLinker::new(store, &LinkingSettings::default());
    let entities = linker.link("Async I/O in rust is usually done with TOKIO.");
    let ids: Vec<EntityId> = entities.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![rust, tokio]);
    assert_eq!(entities[0].aliases, vec!["rustlang".to_string()]);
    assert_eq!(entities[0].category, "LANGUAGE");
}

#[test]
fn linker_returns_empty_without_matching_tokens() {
    let (store, ..) = seeded();
    let linker = EntityLinker::new(store, &LinkingSettings::default());
    assert!(linker.link("an of is to").is_empty());
    assert!(linker.link("nothing relevant here").is_empty());
}

#[test]
fn linker_respects_cap() {
    let store = SqliteGraphStore::open_in_memory().unwrap();
    let words: Vec<String> = (0..15).map(|i| format!("term{i:02}")).collect();
    for w in &words { store.insert_entity(w, "CONCEPT", None, &[]).unwrap(); }
    let settings = LinkingSettings { entity_limit: 10, ..LinkingSettings::default() };
    let linker = EntityLinker::new(store, &settings);
    assert_eq!(linker.link(&words.join(" ")).len(), 10);
}

#[test]
fn malformed_aliases_degrade_to_empty_linkage() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("graph.sqlite");
    let store = SqliteGraphStore::open(&path).unwrap();
    let id = store.insert_entity("Lancedb", "LIBRARY", None, &[]).unwrap();
    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute("UPDATE entities SET aliases = 'not json' WHERE entity_id = ?1", [id]).unwrap();

    assert!(matches!(store.find_entities_by_names(&["lancedb".to_string()], 10), Err(Error::Storage(_))));
    let linker = EntityLinker::new(store, &LinkingSettings::default());
    assert!(linker.link("stored in lancedb").is_empty());
}

#[test]
fn linker_degrades_on_store_failure() {
    let store = Arc::new(CountingStore::default());
    let linker = EntityLinker::new(Arc::clone(&store), &LinkingSettings::default());
    assert!(linker.link("rust tokio").is_empty());
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn resolver_returns_incident_edges_with_names() {
    let (store, rust, tokio, mozilla) = seeded();
    let resolver = RelationshipResolver::new(store, &LinkingSettings::default());
    let edges = resolver.resolve(&[tokio]);
    assert_eq!(edges.len(), 1);
    assert_eq!((edges[0].source_entity_id, edges[0].target_entity_id), (tokio, rust));
    assert_eq!(edges[0].source_name.as_deref(), Some("Tokio"));
    assert_eq!(edges[0].target_name.as_deref(), Some("Rust"));
    assert_eq!(edges[0].metadata.get("doc_id"), Some(&serde_json::json!(7)));

    let all = resolver.resolve(&[rust]);
    assert_eq!(all.len(), 2, "duplicate sponsored edges collapse");
    assert!(all.iter().any(|r| r.source_entity_id == mozilla && r.metadata.is_empty()));
}

#[test]
fn resolver_skips_store_on_empty_input_and_degrades_on_failure() {
    let store = Arc::new(CountingStore::default());
    let resolver = RelationshipResolver::new(Arc::clone(&store), &LinkingSettings::default());
    assert!(resolver.resolve(&[]).is_empty());
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    assert!(resolver.resolve(&[1, 2]).is_empty());
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn resolver_respects_cap() {
    let store = SqliteGraphStore::open_in_memory().unwrap();
    let hub = store.insert_entity("hub", "CONCEPT", None, &[]).unwrap();
    for i in 0..30 {
        let spoke = store.insert_entity(&format!("spoke{i}"), "CONCEPT", None, &[]).unwrap();
        store.insert_relationship(hub, spoke, "links", None).unwrap();
    }
    let settings = LinkingSettings { relationship_limit: 20, ..LinkingSettings::default() };
    assert_eq!(RelationshipResolver::new(store, &settings).resolve(&[hub]).len(), 20);
}

#[test]
fn snapshot_groups_categories_and_weights_links() {
    let (store, rust, tokio, mozilla) = seeded();
    let snapshot = store.snapshot().unwrap();

    let node = |id: EntityId| snapshot.nodes.iter().find(|n| n.id == id).unwrap();
    assert_eq!(node(rust).group, 1, "LANGUAGE sorts first");
    assert_eq!(node(tokio).group, 2);
    assert_eq!(node(mozilla).group, 3);
    assert_eq!(node(rust).value, 3);
    assert_eq!(node(tokio).value, 1);

    assert_eq!(snapshot.links.len(), 2);
    let sponsored = snapshot.links.iter().find(|l| l.relation_type == "sponsored").unwrap();
    assert_eq!(sponsored.weight, 2);
}

#[test]
fn isolated_entity_has_minimum_node_value() {
    let store = SqliteGraphStore::open_in_memory().unwrap();
    store.insert_entity("loner", "CONCEPT", None, &[]).unwrap();
    let snapshot = store.snapshot().unwrap();
    assert_eq!(snapshot.nodes[0].value, 1);
    assert!(snapshot.links.is_empty());
}

#[test]
fn stats_count_entities_and_relationships() {
    let (store, ..) = seeded();
    let stats = store.stats().unwrap();
    assert_eq!(stats.entity_count, 3);
    assert_eq!(stats.category_count, 3);
    assert_eq!(stats.relationship_count, 3);
    assert_eq!(stats.relation_type_count, 2);
}

#[test]
fn schema_creation_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested").join("graph.sqlite");
    SqliteGraphStore::open(&path).unwrap().insert_entity("Rust", "LANGUAGE", None, &[]).unwrap();
    let reopened = SqliteGraphStore::open(&path).unwrap();
    assert_eq!(reopened.stats().unwrap().entity_count, 1);
}

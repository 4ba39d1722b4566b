use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use kag_core::traits::GraphStore;
use kag_core::types::{DocId, Entity, EntityId, Relationship};
use kag_core::{Error, Result};

/// Upper bound on bound parameters per statement, below SQLite's
/// historical limit of 999.
const MAX_PARAMS_PER_QUERY: usize = 400;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS entities (
        entity_id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        description TEXT,
        aliases     TEXT,
        category    TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_entities_name ON entities (LOWER(name));
    CREATE TABLE IF NOT EXISTS relationships (
        relationship_id  INTEGER PRIMARY KEY AUTOINCREMENT,
        source_entity_id INTEGER NOT NULL,
        target_entity_id INTEGER NOT NULL,
        relation_type    TEXT,
        doc_id           INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships (source_entity_id);
    CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships (target_entity_id);
    CREATE INDEX IF NOT EXISTS idx_relationships_doc ON relationships (doc_id);
";

/// SQLite-backed graph store. All statements use bound parameters.
pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
}

impl SqliteGraphStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(Error::storage)?;
            }
        }
        let conn = Connection::open(path).map_err(Error::storage)?;
        info!(path = %path.display(), "opened graph store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(Error::storage)?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(Error::storage)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::Storage("graph store connection poisoned".to_string()))
    }

    pub fn insert_entity(&self, name: &str, category: &str, description: Option<&str>, aliases: &[String]) -> Result<EntityId> {
        let aliases_json = serde_json::to_string(aliases).map_err(Error::storage)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO entities (name, description, aliases, category) VALUES (?1, ?2, ?3, ?4)",
            params![name, description, aliases_json, category],
        )
        .map_err(Error::storage)?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_relationship(&self, source: EntityId, target: EntityId, relation_type: &str, doc_id: Option<DocId>) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO relationships (source_entity_id, target_entity_id, relation_type, doc_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![source, target, relation_type, doc_id],
            )
            .map_err(Error::storage)?;
        Ok(())
    }

    pub fn entity(&self, id: EntityId) -> Result<Option<Entity>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT entity_id, name, COALESCE(category, 'unknown'), description, COALESCE(aliases, '[]')
                 FROM entities WHERE entity_id = ?1",
                params![id],
                read_entity_row,
            )
            .optional()
            .map_err(Error::storage)?;
        row.map(decode_entity).transpose()
    }
}

type EntityRow = (EntityId, String, String, Option<String>, String);

fn read_entity_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntityRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn decode_entity((id, name, category, description, aliases_json): EntityRow) -> Result<Entity> {
    let aliases: Vec<String> = serde_json::from_str(&aliases_json)
        .map_err(|e| Error::Storage(format!("malformed aliases for entity {id}: {e}")))?;
    Ok(Entity { id, name, category, description: description.filter(|d| !d.is_empty()), aliases })
}

fn placeholders(start: usize, count: usize) -> String {
    (start..start + count).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

impl GraphStore for SqliteGraphStore {
    fn find_entities_by_names(&self, names: &[String], limit: usize) -> Result<Vec<Entity>> {
        let mut seen = HashSet::new();
        let lowered: Vec<String> = names.iter().map(|n| n.to_lowercase()).filter(|n| seen.insert(n.clone())).collect();
        if lowered.is_empty() || limit == 0 {
            return Ok(vec![]);
        }
        let conn = self.conn()?;
        let mut entities = Vec::new();
        for batch in lowered.chunks(MAX_PARAMS_PER_QUERY) {
            let remaining = limit - entities.len();
            let sql = format!(
                "SELECT DISTINCT entity_id, name, COALESCE(category, 'unknown'), description, COALESCE(aliases, '[]')
                 FROM entities
                 WHERE LOWER(name) IN ({})
                 ORDER BY entity_id
                 LIMIT ?{}",
                placeholders(1, batch.len()),
                batch.len() + 1
            );
            let remaining_param = remaining as i64;
            let mut bound: Vec<&dyn ToSql> = batch.iter().map(|n| n as &dyn ToSql).collect();
            bound.push(&remaining_param);
            let mut stmt = conn.prepare(&sql).map_err(Error::storage)?;
            let rows = stmt.query_map(bound.as_slice(), read_entity_row).map_err(Error::storage)?;
            for row in rows {
                entities.push(decode_entity(row.map_err(Error::storage)?)?);
            }
            if entities.len() >= limit {
                break;
            }
        }
        entities.truncate(limit);
        debug!(terms = lowered.len(), found = entities.len(), "entity lookup");
        Ok(entities)
    }

    fn relationships_for(&self, entity_ids: &[EntityId], limit: usize) -> Result<Vec<Relationship>> {
        if entity_ids.is_empty() || limit == 0 {
            return Ok(vec![]);
        }
        let conn = self.conn()?;
        let mut seen = HashSet::new();
        let mut relationships = Vec::new();
        for batch in entity_ids.chunks(MAX_PARAMS_PER_QUERY) {
            // The id list is bound once and referenced by both IN clauses.
            let ids = placeholders(1, batch.len());
            let sql = format!(
                "SELECT r.source_entity_id, r.target_entity_id, COALESCE(r.relation_type, 'related_to'), r.doc_id,
                        s.name, t.name, MIN(r.relationship_id) AS first_id
                 FROM relationships r
                 LEFT JOIN entities s ON s.entity_id = r.source_entity_id
                 LEFT JOIN entities t ON t.entity_id = r.target_entity_id
                 WHERE r.source_entity_id IN ({ids}) OR r.target_entity_id IN ({ids})
                 GROUP BY r.source_entity_id, r.target_entity_id, r.relation_type, r.doc_id
                 ORDER BY first_id
                 LIMIT ?{}",
                batch.len() + 1
            );
            let limit_param = limit as i64;
            let mut bound: Vec<&dyn ToSql> = batch.iter().map(|id| id as &dyn ToSql).collect();
            bound.push(&limit_param);
            let mut stmt = conn.prepare(&sql).map_err(Error::storage)?;
            let rows = stmt
                .query_map(bound.as_slice(), |row| {
                    Ok((
                        row.get::<_, EntityId>(0)?,
                        row.get::<_, EntityId>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<DocId>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                })
                .map_err(Error::storage)?;
            for row in rows {
                let (source, target, relation_type, doc_id, source_name, target_name) = row.map_err(Error::storage)?;
                if !seen.insert((source, target, relation_type.clone(), doc_id)) {
                    continue;
                }
                let mut metadata = serde_json::Map::new();
                if let Some(doc_id) = doc_id {
                    metadata.insert("doc_id".to_string(), doc_id.into());
                }
                relationships.push(Relationship {
                    source_entity_id: source,
                    target_entity_id: target,
                    relation_type,
                    metadata,
                    source_name,
                    target_name,
                });
            }
            if relationships.len() >= limit {
                break;
            }
        }
        relationships.truncate(limit);
        debug!(entities = entity_ids.len(), found = relationships.len(), "relationship lookup");
        Ok(relationships)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_lists_are_numbered() {
        assert_eq!(placeholders(1, 3), "?1, ?2, ?3");
        assert_eq!(placeholders(4, 1), "?4");
    }

    #[test]
    fn entity_round_trip_and_missing_lookup() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        let id = store.insert_entity("Tokio", "LIBRARY", Some("async runtime"), &["tokio-rs".to_string()]).unwrap();
        let e = store.entity(id).unwrap().unwrap();
        assert_eq!(e.name, "Tokio");
        assert_eq!(e.aliases, vec!["tokio-rs".to_string()]);
        assert!(store.entity(id + 100).unwrap().is_none());
    }

    #[test]
    fn names_are_matched_case_insensitively_and_injection_is_inert() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.insert_entity("Python", "LANGUAGE", None, &[]).unwrap();
        let found = store.find_entities_by_names(&["python".to_string(), "x') OR 1=1 --".to_string()], 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Python");
        assert_eq!(found[0].description, None);
    }
}

use std::collections::HashMap;

use rusqlite::params;
use serde::{Deserialize, Serialize};

use kag_core::types::EntityId;
use kag_core::{Error, Result};

use crate::store::SqliteGraphStore;

/// One node of the graph visualization. `group` numbers categories in
/// sorted order starting at 1; `value` is the degree, at least 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: EntityId,
    pub name: String,
    pub category: String,
    pub group: usize,
    pub value: usize,
}

/// Parallel edges of the same type collapse into one link whose `weight`
/// is their count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: EntityId,
    pub target: EntityId,
    pub relation_type: String,
    pub weight: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub entity_count: usize,
    pub category_count: usize,
    pub relationship_count: usize,
    pub relation_type_count: usize,
}

impl SqliteGraphStore {
    pub fn snapshot(&self) -> Result<GraphSnapshot> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT DISTINCT category FROM entities WHERE category IS NOT NULL ORDER BY category")
            .map_err(Error::storage)?;
        let categories = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(Error::storage)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::storage)?;
        let groups: HashMap<String, usize> = categories.into_iter().enumerate().map(|(i, c)| (c, i + 1)).collect();

        let mut stmt = conn
            .prepare(
                "SELECT e.entity_id, e.name, COALESCE(e.category, 'unknown'),
                        (SELECT COUNT(*) FROM relationships r WHERE r.source_entity_id = e.entity_id)
                      + (SELECT COUNT(*) FROM relationships r WHERE r.target_entity_id = e.entity_id)
                 FROM entities e
                 ORDER BY e.entity_id",
            )
            .map_err(Error::storage)?;
        let nodes = stmt
            .query_map([], |row| {
                let category: String = row.get(2)?;
                let degree: i64 = row.get(3)?;
                Ok(GraphNode {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    group: groups.get(&category).copied().unwrap_or(0),
                    category,
                    value: degree.max(1) as usize,
                })
            })
            .map_err(Error::storage)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::storage)?;

        let mut stmt = conn
            .prepare(
                "SELECT source_entity_id, target_entity_id, COALESCE(relation_type, 'related_to'), COUNT(*)
                 FROM relationships
                 GROUP BY source_entity_id, target_entity_id, relation_type
                 ORDER BY MIN(relationship_id)",
            )
            .map_err(Error::storage)?;
        let links = stmt
            .query_map([], |row| {
                Ok(GraphLink {
                    source: row.get(0)?,
                    target: row.get(1)?,
                    relation_type: row.get(2)?,
                    weight: row.get::<_, i64>(3)? as usize,
                })
            })
            .map_err(Error::storage)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(Error::storage)?;

        Ok(GraphSnapshot { nodes, links })
    }

    pub fn stats(&self) -> Result<GraphStats> {
        let conn = self.conn()?;
        let (entity_count, category_count): (i64, i64) = conn
            .query_row("SELECT COUNT(*), COUNT(DISTINCT category) FROM entities", params![], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(Error::storage)?;
        let (relationship_count, relation_type_count): (i64, i64) = conn
            .query_row("SELECT COUNT(*), COUNT(DISTINCT relation_type) FROM relationships", params![], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .map_err(Error::storage)?;
        Ok(GraphStats {
            entity_count: entity_count as usize,
            category_count: category_count as usize,
            relationship_count: relationship_count as usize,
            relation_type_count: relation_type_count as usize,
        })
    }
}

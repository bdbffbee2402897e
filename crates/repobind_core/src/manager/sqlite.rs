//! SQLite-backed entity manager and handles.
//!
//! # Responsibility
//! - Resolve entity references against a borrowed `EntityModel`.
//! - Execute builder queries and hierarchy walks on a borrowed connection.
//!
//! # Invariants
//! - Records list columns in descriptor order, primary key first.
//! - Tree walks are bounded by `MAX_TREE_DEPTH` so cyclic parent links terminate.
//! - A walk never lists its start node, even when a cycle leads back to it.
//! - Children, roots and descendants are ordered deterministically.

use crate::manager::{
    EntityManager, ManagerError, ManagerResult, RepositoryHandle, TreeRepositoryHandle,
};
use crate::model::entity::{EntityDescriptor, EntityRef, Hierarchy};
use crate::model::entity_model::EntityModel;
use crate::model::ident::quoted;
use crate::query::builder::{Order, QueryBuilder};
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::collections::{BTreeMap, HashSet};

/// One fetched row keyed by column name.
pub type Record = BTreeMap<String, Value>;

const MAX_TREE_DEPTH: u32 = 1024;
const DEFAULT_ALIAS: &str = "e";

/// Entity manager over one SQLite connection.
pub struct SqliteEntityManager<'a> {
    conn: &'a Connection,
    model: &'a EntityModel,
}

impl<'a> SqliteEntityManager<'a> {
    pub fn new(conn: &'a Connection, model: &'a EntityModel) -> Self {
        Self { conn, model }
    }

    fn descriptor(&self, entity: &EntityRef) -> ManagerResult<&'a EntityDescriptor> {
        self.model.resolve(entity).ok_or_else(|| {
            warn!(
                "event=manager_handle module=manager status=error error_code=unknown_entity entity={}",
                entity
            );
            ManagerError::UnknownEntity(entity.name().to_string())
        })
    }
}

impl<'a> EntityManager for SqliteEntityManager<'a> {
    type Repository = SqliteRepository<'a>;
    type TreeRepository = SqliteTreeRepository<'a>;

    fn repository_for(&self, entity: &EntityRef) -> ManagerResult<SqliteRepository<'a>> {
        let descriptor = self.descriptor(entity)?;
        debug!(
            "event=manager_handle module=manager status=ok shape=flat entity={}",
            descriptor.name
        );
        Ok(SqliteRepository {
            conn: self.conn,
            entity: descriptor,
        })
    }

    fn tree_repository_for(&self, entity: &EntityRef) -> ManagerResult<SqliteTreeRepository<'a>> {
        let descriptor = self.descriptor(entity)?;
        let Some(hierarchy) = descriptor.hierarchy.as_ref() else {
            warn!(
                "event=manager_handle module=manager status=error shape=tree error_code=not_tree_entity entity={}",
                descriptor.name
            );
            return Err(ManagerError::NotTreeEntity(descriptor.name.clone()));
        };
        debug!(
            "event=manager_handle module=manager status=ok shape=tree entity={}",
            descriptor.name
        );
        Ok(SqliteTreeRepository {
            flat: SqliteRepository {
                conn: self.conn,
                entity: descriptor,
            },
            hierarchy,
        })
    }
}

/// Flat handle over one entity table.
pub struct SqliteRepository<'a> {
    conn: &'a Connection,
    entity: &'a EntityDescriptor,
}

impl RepositoryHandle for SqliteRepository<'_> {
    fn entity(&self) -> &EntityDescriptor {
        self.entity
    }
}

impl SqliteRepository<'_> {
    /// Runs a builder query and returns all matching records.
    pub fn fetch(&self, query: &QueryBuilder) -> ManagerResult<Vec<Record>> {
        let (sql, bind_values) = query.to_sql()?;
        query_records(self.conn, query.entity(), &sql, bind_values)
    }

    /// Loads one record by primary key.
    pub fn find_by_id(&self, id: impl Into<Value>) -> ManagerResult<Option<Record>> {
        let query = self
            .create_query_builder(DEFAULT_ALIAS)?
            .where_eq(&self.entity.primary_key, id)
            .limit(1);
        Ok(self.fetch(&query)?.into_iter().next())
    }

    pub fn count(&self) -> ManagerResult<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {};", quoted(&self.entity.table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Tree handle over one hierarchical entity table.
pub struct SqliteTreeRepository<'a> {
    flat: SqliteRepository<'a>,
    hierarchy: &'a Hierarchy,
}

impl RepositoryHandle for SqliteTreeRepository<'_> {
    fn entity(&self) -> &EntityDescriptor {
        self.flat.entity
    }
}

impl TreeRepositoryHandle for SqliteTreeRepository<'_> {
    fn hierarchy(&self) -> &Hierarchy {
        self.hierarchy
    }
}

impl SqliteTreeRepository<'_> {
    pub fn fetch(&self, query: &QueryBuilder) -> ManagerResult<Vec<Record>> {
        self.flat.fetch(query)
    }

    pub fn find_by_id(&self, id: impl Into<Value>) -> ManagerResult<Option<Record>> {
        self.flat.find_by_id(id)
    }

    /// Lists records without a parent.
    pub fn find_roots(&self) -> ManagerResult<Vec<Record>> {
        let query = self
            .create_query_builder(DEFAULT_ALIAS)?
            .where_null(&self.hierarchy.parent_column)
            .order_by(&self.flat.entity.primary_key, Order::Asc);
        self.fetch(&query)
    }

    /// Lists direct children of `id`.
    pub fn find_children(&self, id: impl Into<Value>) -> ManagerResult<Vec<Record>> {
        let query = self
            .create_query_builder(DEFAULT_ALIAS)?
            .where_eq(&self.hierarchy.parent_column, id)
            .order_by(&self.flat.entity.primary_key, Order::Asc);
        self.fetch(&query)
    }

    /// Lists every record below `id`, nearest levels first. `id` itself is never listed.
    pub fn find_descendants(&self, id: impl Into<Value>) -> ManagerResult<Vec<Record>> {
        let entity = self.flat.entity;
        let pk = quoted(&entity.primary_key);
        let parent = quoted(&self.hierarchy.parent_column);
        let table = quoted(&entity.table);
        let sql = format!(
            "WITH RECURSIVE walk(node_id, depth) AS (
                SELECT {pk}, 1 FROM {table} WHERE {parent} = ?1
                UNION ALL
                SELECT t.{pk}, w.depth + 1
                FROM {table} t
                JOIN walk w ON t.{parent} = w.node_id
                WHERE w.depth < {MAX_TREE_DEPTH}
             )
             SELECT {projection}
             FROM walk w
             JOIN {table} t ON t.{pk} = w.node_id
             WHERE t.{pk} IS NOT ?1
             ORDER BY w.depth ASC, t.{pk} ASC;",
            projection = projection(entity, "t"),
        );
        let mut records = query_records(self.flat.conn, entity, &sql, vec![id.into()])?;
        dedup_by_primary_key(entity, &mut records);
        Ok(records)
    }

    /// Lists every record above `id`, root first. `id` itself is never listed.
    pub fn find_ancestors(&self, id: impl Into<Value>) -> ManagerResult<Vec<Record>> {
        let entity = self.flat.entity;
        let pk = quoted(&entity.primary_key);
        let parent = quoted(&self.hierarchy.parent_column);
        let table = quoted(&entity.table);
        let sql = format!(
            "WITH RECURSIVE walk(node_id, parent_id, depth) AS (
                SELECT {pk}, {parent}, 0 FROM {table} WHERE {pk} = ?1
                UNION ALL
                SELECT t.{pk}, t.{parent}, w.depth + 1
                FROM {table} t
                JOIN walk w ON t.{pk} = w.parent_id
                WHERE w.depth < {MAX_TREE_DEPTH}
             )
             SELECT {projection}
             FROM walk w
             JOIN {table} t ON t.{pk} = w.node_id
             WHERE w.depth > 0 AND t.{pk} IS NOT ?1
             ORDER BY w.depth ASC;",
            projection = projection(entity, "t"),
        );
        let mut records = query_records(self.flat.conn, entity, &sql, vec![id.into()])?;
        dedup_by_primary_key(entity, &mut records);
        records.reverse();
        Ok(records)
    }
}

fn projection(entity: &EntityDescriptor, alias: &str) -> String {
    entity
        .all_columns()
        .map(|column| format!("{alias}.{column} AS {column}", column = quoted(column)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn query_records(
    conn: &Connection,
    entity: &EntityDescriptor,
    sql: &str,
    bind_values: Vec<Value>,
) -> ManagerResult<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(parse_record(entity, row)?);
    }
    Ok(records)
}

fn parse_record(entity: &EntityDescriptor, row: &Row<'_>) -> ManagerResult<Record> {
    let mut record = Record::new();
    for (index, column) in entity.all_columns().enumerate() {
        record.insert(column.to_string(), row.get::<_, Value>(index)?);
    }
    Ok(record)
}

// Rows arrive nearest level first; a node revisited through a cycle keeps its first visit.
fn dedup_by_primary_key(entity: &EntityDescriptor, records: &mut Vec<Record>) {
    let mut seen = HashSet::new();
    records.retain(|record| seen.insert(primary_key_token(record.get(&entity.primary_key))));
}

fn primary_key_token(value: Option<&Value>) -> String {
    match value {
        Some(Value::Integer(id)) => format!("i:{id}"),
        Some(Value::Text(id)) => format!("t:{id}"),
        other => format!("{other:?}"),
    }
}

//! # Schema Reflector
//!
//! Reads live structure from a database: catalog list, table list, and per
//! table the columns, indexes and primary key.
//!
//! Each dialect has its own [`SchemaSource`]:
//!
//! | Dialect | Databases | Tables / columns / indexes |
//! |---------|-----------|----------------------------|
//! | MySQL/MariaDB | `information_schema.SCHEMATA` | `information_schema` |
//! | PostgreSQL | `pg_database` | `pg_catalog` |
//! | SQLite | `pragma_database_list` | `sqlite_master` + `pragma_*` |
//!
//! Sources never decide what an empty result means. A reachable schema with
//! no tables yields `Ok(vec![])`; any driver failure yields
//! [`GenError::SchemaUnreachable`]. Capabilities a dialect lacks (comments on
//! SQLite) come back as `None`.
//!
//! Live handles come from a [`SchemaProvider`], normally the
//! [`EngineCache`](crate::engine::EngineCache).

mod mysql;
mod postgres;
mod sqlite;

#[cfg(test)]
pub(crate) mod fake;

pub use mysql::MySqlSource;
pub use postgres::PostgresSource;
pub use sqlite::SqliteSource;

use crate::catalog::{Connection, Database};
use crate::error::{GenError, Result};
use crate::typemap::Dialect;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub name: String,
    pub owner: Option<String>,
    pub encoding: Option<String>,
    pub collation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub raw_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub comment: Option<String>,
    pub autoincrement: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub index_type: Option<String>,
}

/// Columns (in ordinal order), secondary indexes and primary key of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStructure {
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
    pub primary_key: Vec<String>,
}

/// Live introspection for one database handle.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Catalogs visible through this handle.
    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>>;

    /// Base tables in the handle's current database/schema.
    async fn list_tables(&self) -> Result<Vec<TableInfo>>;

    async fn describe_table(&self, table: &str) -> Result<TableStructure>;
}

/// Hands out live sources for a connection or one of its databases.
#[async_trait]
pub trait SchemaProvider: Send + Sync {
    /// Server-level handle, used for catalog listing.
    async fn for_connection(&self, connection: &Connection) -> Result<Arc<dyn SchemaSource>>;

    /// Handle bound to `database`.
    async fn for_database(
        &self,
        connection: &Connection,
        database: &Database,
    ) -> Result<Arc<dyn SchemaSource>>;
}

pub(crate) type RowResult<T> = std::result::Result<T, sqlx::Error>;

pub(crate) fn unreachable(scope: impl Into<String>) -> impl FnOnce(sqlx::Error) -> GenError {
    let scope = scope.into();
    move |e| GenError::SchemaUnreachable {
        scope,
        reason: e.to_string(),
    }
}

pub(crate) fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Fold `(index, column, unique, type)` rows (ordered by index then
/// position) into descriptors, keeping first-seen index order.
pub(crate) fn group_indexes(
    rows: impl IntoIterator<Item = (String, String, bool, Option<String>)>,
) -> Vec<IndexInfo> {
    let mut order: Vec<String> = Vec::new();
    let mut by_name: BTreeMap<String, IndexInfo> = BTreeMap::new();
    for (name, column, unique, index_type) in rows {
        let entry = by_name.entry(name.clone()).or_insert_with(|| {
            order.push(name.clone());
            IndexInfo {
                name,
                columns: Vec::new(),
                unique,
                index_type,
            }
        });
        entry.columns.push(column);
    }
    order
        .into_iter()
        .filter_map(|n| by_name.remove(&n))
        .collect()
}

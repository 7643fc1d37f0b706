//! Scriptable in-memory schema used by unit tests.

use super::{
    ColumnInfo, DatabaseInfo, IndexInfo, SchemaProvider, SchemaSource, TableInfo, TableStructure,
};
use crate::catalog::{Connection, Database};
use crate::error::{GenError, Result};
use crate::typemap::Dialect;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Scriptable live schema shared by every handle the provider hands out.
#[derive(Default)]
pub(crate) struct FakeSchema {
    pub(crate) databases: Vec<String>,
    pub(crate) tables: Vec<String>,
    pub(crate) structures: HashMap<String, TableStructure>,
    pub(crate) unreachable: bool,
    /// Handles still granted before the provider goes unreachable.
    pub(crate) handles_left: Option<usize>,
    pub(crate) describe_fails: bool,
}

#[derive(Clone, Default)]
pub(crate) struct FakeSource(pub(crate) Arc<Mutex<FakeSchema>>);

fn refused(reason: &str) -> GenError {
    GenError::SchemaUnreachable {
        scope: "fake".into(),
        reason: reason.into(),
    }
}

impl FakeSource {
    fn check(&self) -> Result<()> {
        if self.0.lock().unreachable {
            return Err(refused("connection refused"));
        }
        Ok(())
    }

    fn handle(&self) -> Result<Arc<dyn SchemaSource>> {
        let mut schema = self.0.lock();
        match schema.handles_left.as_mut() {
            Some(0) => return Err(refused("connection reset")),
            Some(left) => *left -= 1,
            None => {}
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl SchemaSource for FakeSource {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>> {
        self.check()?;
        Ok(self
            .0
            .lock()
            .databases
            .iter()
            .map(|name| DatabaseInfo {
                name: name.clone(),
                owner: Some("postgres".into()),
                encoding: Some("UTF8".into()),
                collation: None,
            })
            .collect())
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        self.check()?;
        Ok(self
            .0
            .lock()
            .tables
            .iter()
            .map(|name| TableInfo {
                name: name.clone(),
                comment: Some(format!("{name} table")),
            })
            .collect())
    }

    async fn describe_table(&self, table: &str) -> Result<TableStructure> {
        self.check()?;
        let schema = self.0.lock();
        if schema.describe_fails {
            return Err(refused("read timed out"));
        }
        Ok(schema
            .structures
            .get(table)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl SchemaProvider for FakeSource {
    async fn for_connection(&self, _connection: &Connection) -> Result<Arc<dyn SchemaSource>> {
        self.handle()
    }

    async fn for_database(
        &self,
        _connection: &Connection,
        _database: &Database,
    ) -> Result<Arc<dyn SchemaSource>> {
        self.handle()
    }
}

pub(crate) fn column(name: &str, raw_type: &str) -> ColumnInfo {
    ColumnInfo {
        name: name.into(),
        raw_type: raw_type.into(),
        nullable: name != "id",
        default: None,
        comment: None,
        autoincrement: name == "id",
    }
}

pub(crate) fn users_structure() -> TableStructure {
    TableStructure {
        columns: vec![
            column("id", "bigint"),
            column("name", "character varying(64)"),
            column("age", "numeric(10,2)"),
        ],
        indexes: vec![IndexInfo {
            name: "users_name_key".into(),
            columns: vec!["name".into()],
            unique: true,
            index_type: Some("btree".into()),
        }],
        primary_key: vec!["id".into()],
    }
}

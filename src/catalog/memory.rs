use super::{
    paginate, Catalog, Connection, Database, FieldSyncBatch, GenField, GenTable, MetaField,
    MetaIndex, MetaTable, Page, PageQuery, TableMirror,
};
use crate::error::{GenError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct CatalogState {
    connections: BTreeMap<i64, Connection>,
    databases: BTreeMap<i64, Database>,
    tables: BTreeMap<i64, MetaTable>,
    fields: BTreeMap<i64, MetaField>,
    indexes: BTreeMap<i64, MetaIndex>,
    gen_tables: BTreeMap<i64, GenTable>,
    gen_fields: BTreeMap<i64, GenField>,
}

impl CatalogState {
    fn remove_table_cascade(&mut self, table_id: i64) {
        self.tables.remove(&table_id);
        self.fields.retain(|_, f| f.table_id != table_id);
        self.indexes.retain(|_, i| i.table_id != table_id);
    }

    fn remove_database_cascade(&mut self, database_id: i64) {
        self.databases.remove(&database_id);
        let tables: Vec<i64> = self
            .tables
            .values()
            .filter(|t| t.database_id == database_id)
            .map(|t| t.id)
            .collect();
        for id in tables {
            self.remove_table_cascade(id);
        }
    }

    fn check_database_unique(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for db in self.databases.values() {
            if !seen.insert((db.connection_id, db.database_name.as_str())) {
                return Err(GenError::Catalog(format!(
                    "duplicate database `{}` for connection {}",
                    db.database_name, db.connection_id
                )));
            }
        }
        Ok(())
    }

    fn check_table_unique(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for t in self.tables.values() {
            if !seen.insert((t.database_id, t.name.as_str())) {
                return Err(GenError::Catalog(format!(
                    "duplicate table `{}` in database {}",
                    t.name, t.database_id
                )));
            }
        }
        Ok(())
    }

    fn check_field_unique(&self) -> Result<()> {
        let mut fields = HashSet::new();
        for f in self.fields.values() {
            if !fields.insert((f.table_id, f.name.as_str())) {
                return Err(GenError::Catalog(format!(
                    "duplicate field `{}` in table {}",
                    f.name, f.table_id
                )));
            }
        }
        let mut indexes = HashSet::new();
        for i in self.indexes.values() {
            if !indexes.insert((i.table_id, i.name.as_str())) {
                return Err(GenError::Catalog(format!(
                    "duplicate index `{}` in table {}",
                    i.name, i.table_id
                )));
            }
        }
        Ok(())
    }
}

/// In-memory [`Catalog`] with an optional JSON snapshot.
///
/// Mutations clone the state, apply the change, write the snapshot and only
/// then publish the new state, so a failure at any step leaves both memory
/// and disk as they were.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
    path: Option<PathBuf>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or create on first write) a snapshot-backed catalog.
    ///
    /// # Errors
    ///
    /// Fails when an existing snapshot cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| GenError::Catalog(format!("read {}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| GenError::Catalog(format!("parse {}: {e}", path.display())))?
        } else {
            CatalogState::default()
        };
        Ok(Self {
            state: RwLock::new(state),
            path: Some(path),
        })
    }

    fn read<R>(&self, f: impl FnOnce(&CatalogState) -> R) -> R {
        f(&self.state.read())
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut CatalogState) -> Result<R>) -> Result<R> {
        let mut guard = self.state.write();
        let mut next = guard.clone();
        let out = f(&mut next)?;
        if let Some(path) = &self.path {
            persist(path, &next)?;
        }
        *guard = next;
        Ok(out)
    }
}

fn persist(path: &Path, state: &CatalogState) -> Result<()> {
    let body = serde_json::to_vec_pretty(state)
        .map_err(|e| GenError::Catalog(format!("serialize snapshot: {e}")))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| GenError::Catalog(format!("create {}: {e}", parent.display())))?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body).map_err(|e| GenError::Catalog(format!("write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path)
        .map_err(|e| GenError::Catalog(format!("rename {}: {e}", path.display())))?;
    debug!(path = %path.display(), "catalog snapshot written");
    Ok(())
}

fn sorted<T: Clone>(rows: impl Iterator<Item = T>, key: impl Fn(&T) -> i32) -> Vec<T> {
    let mut v: Vec<T> = rows.collect();
    v.sort_by_key(|r| key(r));
    v
}

impl Catalog for MemoryCatalog {
    fn insert_connection(&self, connection: Connection) -> Result<()> {
        self.mutate(|s| {
            s.connections.insert(connection.id, connection);
            Ok(())
        })
    }

    fn get_connection(&self, id: i64) -> Result<Connection> {
        self.read(|s| s.connections.get(&id).cloned())
            .ok_or_else(|| GenError::not_found("Connection", id))
    }

    fn page_connections(&self, query: &PageQuery) -> Result<Page<Connection>> {
        let rows = self.read(|s| s.connections.values().cloned().collect::<Vec<_>>());
        Ok(paginate(rows, query))
    }

    fn get_database(&self, id: i64) -> Result<Database> {
        self.read(|s| s.databases.get(&id).cloned())
            .ok_or_else(|| GenError::not_found("Database", id))
    }

    fn databases_for(&self, connection_id: i64) -> Result<Vec<Database>> {
        Ok(self.read(|s| {
            s.databases
                .values()
                .filter(|d| d.connection_id == connection_id)
                .cloned()
                .collect()
        }))
    }

    fn page_databases(&self, query: &PageQuery) -> Result<Page<Database>> {
        let rows = self.read(|s| s.databases.values().cloned().collect::<Vec<_>>());
        Ok(paginate(rows, query))
    }

    fn apply_database_sync(&self, add: Vec<Database>, remove: Vec<i64>) -> Result<()> {
        self.mutate(|s| {
            for id in remove {
                s.remove_database_cascade(id);
            }
            for db in add {
                if !s.connections.contains_key(&db.connection_id) {
                    return Err(GenError::not_found("Connection", db.connection_id));
                }
                s.databases.insert(db.id, db);
            }
            s.check_database_unique()
        })
    }

    fn get_meta_table(&self, id: i64) -> Result<MetaTable> {
        self.read(|s| s.tables.get(&id).cloned())
            .ok_or_else(|| GenError::not_found("MetaTable", id))
    }

    fn tables_for(&self, database_id: i64) -> Result<Vec<MetaTable>> {
        Ok(self.read(|s| {
            s.tables
                .values()
                .filter(|t| t.database_id == database_id)
                .cloned()
                .collect()
        }))
    }

    fn page_tables(&self, query: &PageQuery) -> Result<Page<MetaTable>> {
        let rows = self.read(|s| s.tables.values().cloned().collect::<Vec<_>>());
        Ok(paginate(rows, query))
    }

    fn apply_table_sync(
        &self,
        add: Vec<MetaTable>,
        update: Vec<MetaTable>,
        remove: Vec<i64>,
    ) -> Result<()> {
        self.mutate(|s| {
            for id in remove {
                s.remove_table_cascade(id);
            }
            for t in update {
                if !s.tables.contains_key(&t.id) {
                    return Err(GenError::not_found("MetaTable", t.id));
                }
                s.tables.insert(t.id, t);
            }
            for t in add {
                if !s.databases.contains_key(&t.database_id) {
                    return Err(GenError::not_found("Database", t.database_id));
                }
                s.tables.insert(t.id, t);
            }
            s.check_table_unique()
        })
    }

    fn fields_for(&self, table_id: i64) -> Result<Vec<MetaField>> {
        Ok(self.read(|s| {
            sorted(
                s.fields.values().filter(|f| f.table_id == table_id).cloned(),
                |f| f.sort,
            )
        }))
    }

    fn indexes_for(&self, table_id: i64) -> Result<Vec<MetaIndex>> {
        Ok(self.read(|s| {
            s.indexes
                .values()
                .filter(|i| i.table_id == table_id)
                .cloned()
                .collect()
        }))
    }

    fn page_fields(&self, query: &PageQuery) -> Result<Page<MetaField>> {
        let rows = self.read(|s| s.fields.values().cloned().collect::<Vec<_>>());
        Ok(paginate(rows, query))
    }

    fn apply_field_sync(&self, batch: FieldSyncBatch) -> Result<()> {
        self.mutate(|s| {
            for id in batch.remove_fields {
                s.fields.remove(&id);
            }
            for id in batch.remove_indexes {
                s.indexes.remove(&id);
            }
            for f in batch.update_fields.into_iter().chain(batch.add_fields) {
                if !s.tables.contains_key(&f.table_id) {
                    return Err(GenError::not_found("MetaTable", f.table_id));
                }
                s.fields.insert(f.id, f);
            }
            for i in batch.update_indexes.into_iter().chain(batch.add_indexes) {
                if !s.tables.contains_key(&i.table_id) {
                    return Err(GenError::not_found("MetaTable", i.table_id));
                }
                s.indexes.insert(i.id, i);
            }
            s.check_field_unique()
        })
    }

    fn get_gen_table(&self, id: i64) -> Result<GenTable> {
        self.read(|s| s.gen_tables.get(&id).cloned())
            .ok_or_else(|| GenError::not_found("GenTable", id))
    }

    fn gen_table_for_meta(&self, db_table_id: i64) -> Result<Option<GenTable>> {
        Ok(self.read(|s| {
            s.gen_tables
                .values()
                .find(|g| g.db_table_id == db_table_id)
                .cloned()
        }))
    }

    fn page_gen_tables(&self, query: &PageQuery) -> Result<Page<GenTable>> {
        let rows = self.read(|s| s.gen_tables.values().cloned().collect::<Vec<_>>());
        Ok(paginate(rows, query))
    }

    fn gen_fields_for(&self, gen_table_id: i64) -> Result<Vec<GenField>> {
        Ok(self.read(|s| {
            sorted(
                s.gen_fields
                    .values()
                    .filter(|f| f.gen_table_id == gen_table_id)
                    .cloned(),
                |f| f.sort,
            )
        }))
    }

    fn insert_gen_table(&self, table: GenTable, fields: Vec<GenField>) -> Result<()> {
        self.mutate(|s| {
            if !s.tables.contains_key(&table.db_table_id) {
                return Err(GenError::not_found("MetaTable", table.db_table_id));
            }
            if s.gen_tables.contains_key(&table.id)
                || s.gen_tables.values().any(|g| g.db_table_id == table.db_table_id)
            {
                return Err(GenError::Catalog(format!(
                    "meta table {} is already imported",
                    table.db_table_id
                )));
            }
            for f in fields {
                s.gen_fields.insert(f.id, f);
            }
            s.gen_tables.insert(table.id, table);
            Ok(())
        })
    }

    fn update_gen_table(&self, table: GenTable, fields: Vec<GenField>) -> Result<()> {
        self.mutate(|s| {
            if !s.gen_tables.contains_key(&table.id) {
                return Err(GenError::not_found("GenTable", table.id));
            }
            for f in fields {
                if f.gen_table_id != table.id {
                    return Err(GenError::Catalog(format!(
                        "gen field {} belongs to gen table {}, not {}",
                        f.id, f.gen_table_id, table.id
                    )));
                }
                s.gen_fields.insert(f.id, f);
            }
            s.gen_tables.insert(table.id, table);
            Ok(())
        })
    }

    fn delete_gen_table(&self, id: i64) -> Result<GenTable> {
        self.mutate(|s| {
            let table = s
                .gen_tables
                .remove(&id)
                .ok_or_else(|| GenError::not_found("GenTable", id))?;
            s.gen_fields.retain(|_, f| f.gen_table_id != id);
            s.remove_table_cascade(table.db_table_id);
            Ok(table)
        })
    }

    fn rebuild_gen_table(
        &self,
        mirror: TableMirror,
        table: GenTable,
        fields: Vec<GenField>,
    ) -> Result<()> {
        self.mutate(|s| {
            let previous = s
                .gen_tables
                .remove(&table.id)
                .ok_or_else(|| GenError::not_found("GenTable", table.id))?;
            s.gen_fields.retain(|_, f| f.gen_table_id != table.id);
            s.remove_table_cascade(previous.db_table_id);

            let meta = mirror.table;
            if !s.databases.contains_key(&meta.database_id) {
                return Err(GenError::not_found("Database", meta.database_id));
            }
            if table.db_table_id != meta.id {
                return Err(GenError::Catalog(format!(
                    "gen table {} must point at rebuilt table {}",
                    table.id, meta.id
                )));
            }
            if let Some(stale) = s
                .tables
                .values()
                .find(|t| t.database_id == meta.database_id && t.name == meta.name)
                .map(|t| t.id)
            {
                if s.gen_tables.values().any(|g| g.db_table_id == stale) {
                    return Err(GenError::Catalog(format!(
                        "table `{}` is already imported by another gen table",
                        meta.name
                    )));
                }
                s.remove_table_cascade(stale);
            }
            let table_id = meta.id;
            s.tables.insert(table_id, meta);
            for f in mirror.fields {
                if f.table_id != table_id {
                    return Err(GenError::not_found("MetaTable", f.table_id));
                }
                s.fields.insert(f.id, f);
            }
            for i in mirror.indexes {
                if i.table_id != table_id {
                    return Err(GenError::not_found("MetaTable", i.table_id));
                }
                s.indexes.insert(i.id, i);
            }
            for f in fields {
                if f.gen_table_id != table.id {
                    return Err(GenError::Catalog(format!(
                        "gen field {} belongs to gen table {}, not {}",
                        f.id, f.gen_table_id, table.id
                    )));
                }
                s.gen_fields.insert(f.id, f);
            }
            s.gen_tables.insert(table.id, table);
            s.check_table_unique()?;
            s.check_field_unique()
        })
    }
}

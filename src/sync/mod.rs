//! # Metadata Synchronizer
//!
//! Reconciles reflected live structure against the persisted mirror at three
//! granularities: databases of a connection, tables of a database, and
//! fields plus indexes of a table.
//!
//! ## Pass
//!
//! 1. Reflect the live scope. Connectivity failures abort before anything is
//!    read from or written to the catalog.
//! 2. Load the persisted rows of the scope.
//! 3. Diff by name: new live names are added, vanished names removed, and
//!    kept rows updated in place when their descriptor changed.
//! 4. Apply the whole change set through one atomic catalog call.
//! 5. Return the requested page of the now-current rows.
//!
//! Columns whose type cannot be mapped are skipped and reported. Their
//! persisted rows, if any, are left alone.
//!
//! ## Empty reflection
//!
//! A reachable scope that reflects as empty while the catalog still holds
//! rows for it is refused with `SchemaUnreachable` unless the caller opts in
//! through [`SyncOptions::allow_empty`] or the synchronizer was built with
//! `allow_empty_schema`.
//!
//! [`Synchronizer::reflect_table`] is the one read-only pass: it builds a
//! detached [`TableMirror`] for a GenTable rebuild.
//!
//! Routine passes never touch GenTable or GenField rows. GenFields whose
//! MetaField disappeared are listed in [`SyncReport::orphaned_gen_fields`].

mod diff;

#[cfg(test)]
mod tests;

use crate::catalog::{
    Catalog, Database, FieldSyncBatch, MetaField, MetaIndex, MetaTable, Page, PageQuery,
    TableMirror,
};
use crate::error::{ErrorReport, GenError, Result};
use crate::ids::IdGenerator;
use crate::reflect::{ColumnInfo, IndexInfo, SchemaProvider, TableStructure};
use crate::typemap::{map_column, Dialect};
use diff::diff_by_name;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-call switches for [`Synchronizer::sync_tables`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Accept an empty reflection as authoritative.
    pub allow_empty: bool,
    /// Hide tables that already have a GenTable from the returned page.
    pub exclude_imported: bool,
}

/// What one pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub scope: String,
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    /// Columns skipped because their type is not mapped.
    pub skipped: Vec<ErrorReport>,
    /// GenField ids whose MetaField no longer exists.
    pub orphaned_gen_fields: Vec<i64>,
}

impl SyncReport {
    fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..Self::default()
        }
    }

    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0 && self.removed == 0
    }
}

/// Report plus the page of current rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncResult<T> {
    pub report: SyncReport,
    pub page: Page<T>,
}

/// Drives sync passes over a catalog using live sources from a provider.
#[derive(Clone)]
pub struct Synchronizer {
    catalog: Arc<dyn Catalog>,
    provider: Arc<dyn SchemaProvider>,
    ids: Arc<IdGenerator>,
    allow_empty: bool,
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("allow_empty", &self.allow_empty)
            .finish_non_exhaustive()
    }
}

impl Synchronizer {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        provider: Arc<dyn SchemaProvider>,
        ids: Arc<IdGenerator>,
    ) -> Self {
        Self {
            catalog,
            provider,
            ids,
            allow_empty: false,
        }
    }

    /// Treat every empty reflection as authoritative.
    pub fn with_allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn provider(&self) -> &Arc<dyn SchemaProvider> {
        &self.provider
    }

    fn guard_empty(&self, scope: &str, live: usize, persisted: usize, allow: bool) -> Result<()> {
        if live == 0 && persisted > 0 && !(allow || self.allow_empty) {
            warn!(scope, persisted, "refusing to wipe scope from empty reflection");
            return Err(GenError::SchemaUnreachable {
                scope: scope.to_string(),
                reason: format!(
                    "reflection returned nothing while {persisted} rows are catalogued; \
                     pass allow_empty to accept an empty schema"
                ),
            });
        }
        Ok(())
    }

    /// Reconcile the databases of `connection_id`.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` for an unknown connection, `SchemaUnreachable` when
    /// the server cannot be listed.
    pub async fn sync_databases(
        &self,
        connection_id: i64,
        query: &PageQuery,
        allow_empty: bool,
    ) -> Result<SyncResult<Database>> {
        let connection = self.catalog.get_connection(connection_id)?;
        let source = self.provider.for_connection(&connection).await?;
        let live = source.list_databases().await?;
        let persisted = self.catalog.databases_for(connection_id)?;
        let mut report = SyncReport::new(connection.connection_name.clone());
        self.guard_empty(&report.scope, live.len(), persisted.len(), allow_empty)?;

        let diff = diff_by_name(
            &live,
            |d| d.name.as_str(),
            &persisted,
            |d| d.database_name.as_str(),
            &HashSet::new(),
        );
        let add: Vec<Database> = diff
            .add
            .iter()
            .map(|d| Database {
                id: self.ids.next_id(),
                connection_id,
                database_name: d.name.clone(),
                owner: d.owner.clone(),
                encoding: d.encoding.clone(),
                collation: d.collation.clone(),
            })
            .collect();
        let remove: Vec<i64> = diff.remove.iter().map(|d| d.id).collect();
        report.added = add.len();
        report.removed = remove.len();
        if !report.is_noop() {
            self.catalog.apply_database_sync(add, remove)?;
        }
        info!(
            connection_id,
            added = report.added,
            removed = report.removed,
            "synchronized databases"
        );

        let query = query
            .clone()
            .eq("connection_id", connection_id)
            .with_default_order("database_name");
        let page = self.catalog.page_databases(&query)?;
        Ok(SyncResult { report, page })
    }

    /// Reconcile the tables of `database_id`.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` for an unknown database or connection,
    /// `SchemaUnreachable` when the schema cannot be listed or reflects as
    /// empty without consent.
    pub async fn sync_tables(
        &self,
        database_id: i64,
        query: &PageQuery,
        options: SyncOptions,
    ) -> Result<SyncResult<MetaTable>> {
        let database = self.catalog.get_database(database_id)?;
        let connection = self.catalog.get_connection(database.connection_id)?;
        let source = self.provider.for_database(&connection, &database).await?;
        let live = source.list_tables().await?;
        let persisted = self.catalog.tables_for(database_id)?;
        let mut report = SyncReport::new(format!(
            "{}/{}",
            connection.connection_name, database.database_name
        ));
        self.guard_empty(&report.scope, live.len(), persisted.len(), options.allow_empty)?;

        let diff = diff_by_name(
            &live,
            |t| t.name.as_str(),
            &persisted,
            |t| t.name.as_str(),
            &HashSet::new(),
        );
        let add: Vec<MetaTable> = diff
            .add
            .iter()
            .map(|t| MetaTable {
                id: self.ids.next_id(),
                database_id,
                name: t.name.clone(),
                comment: t.comment.clone(),
            })
            .collect();
        let update: Vec<MetaTable> = diff
            .keep
            .iter()
            .filter(|(live, row)| live.comment != row.comment)
            .map(|(live, row)| MetaTable {
                comment: live.comment.clone(),
                ..(*row).clone()
            })
            .collect();
        let remove: Vec<i64> = diff.remove.iter().map(|t| t.id).collect();
        report.added = add.len();
        report.updated = update.len();
        report.removed = remove.len();
        if !report.is_noop() {
            self.catalog.apply_table_sync(add, update, remove)?;
        }
        info!(
            database_id,
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            "synchronized tables"
        );

        let mut query = query
            .clone()
            .eq("database_id", database_id)
            .with_default_order("name");
        if options.exclude_imported {
            let imported = self
                .catalog
                .page_gen_tables(&PageQuery::all().eq("database_id", database_id))?;
            for imported_table in imported.rows {
                query = query.ne("id", imported_table.db_table_id);
            }
        }
        let page = self.catalog.page_tables(&query)?;
        Ok(SyncResult { report, page })
    }

    /// Reconcile the fields and indexes of `table_id`.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` for an unknown table, `SchemaUnreachable` when the
    /// table cannot be described or reflects as empty without consent.
    pub async fn sync_fields(
        &self,
        table_id: i64,
        query: &PageQuery,
        allow_empty: bool,
    ) -> Result<SyncResult<MetaField>> {
        let table = self.catalog.get_meta_table(table_id)?;
        let database = self.catalog.get_database(table.database_id)?;
        let connection = self.catalog.get_connection(database.connection_id)?;
        let source = self.provider.for_database(&connection, &database).await?;
        let structure = source.describe_table(&table.name).await?;
        let persisted_fields = self.catalog.fields_for(table_id)?;
        let persisted_indexes = self.catalog.indexes_for(table_id)?;
        let mut report = SyncReport::new(format!(
            "{}/{}.{}",
            connection.connection_name, database.database_name, table.name
        ));
        self.guard_empty(
            &report.scope,
            structure.columns.len(),
            persisted_fields.len(),
            allow_empty,
        )?;

        let (described, protected) =
            describe_columns(source.dialect(), table_id, &structure, &mut report);

        let mut batch = FieldSyncBatch::default();
        let fields = diff_by_name(
            &described,
            |f| f.name.as_str(),
            &persisted_fields,
            |f| f.name.as_str(),
            &protected,
        );
        for live in fields.add {
            batch.add_fields.push(MetaField {
                id: self.ids.next_id(),
                ..live.clone()
            });
        }
        for (live, row) in fields.keep {
            let candidate = MetaField {
                id: row.id,
                ..live.clone()
            };
            if &candidate != row {
                batch.update_fields.push(candidate);
            }
        }
        batch.remove_fields = fields.remove.iter().map(|f| f.id).collect();

        let indexes = diff_by_name(
            &structure.indexes,
            |i| i.name.as_str(),
            &persisted_indexes,
            |i| i.name.as_str(),
            &HashSet::new(),
        );
        for live in indexes.add {
            batch
                .add_indexes
                .push(describe_index(self.ids.next_id(), table_id, live));
        }
        for (live, row) in indexes.keep {
            let candidate = describe_index(row.id, table_id, live);
            if &candidate != row {
                batch.update_indexes.push(candidate);
            }
        }
        batch.remove_indexes = indexes.remove.iter().map(|i| i.id).collect();

        report.added = batch.add_fields.len() + batch.add_indexes.len();
        report.updated = batch.update_fields.len() + batch.update_indexes.len();
        report.removed = batch.remove_fields.len() + batch.remove_indexes.len();

        let mut surviving: HashSet<i64> = persisted_fields.iter().map(|f| f.id).collect();
        for id in &batch.remove_fields {
            surviving.remove(id);
        }
        if let Some(gen_table) = self.catalog.gen_table_for_meta(table_id)? {
            report.orphaned_gen_fields = self
                .catalog
                .gen_fields_for(gen_table.id)?
                .into_iter()
                .filter(|g| !surviving.contains(&g.db_field_id))
                .map(|g| g.id)
                .collect();
        }

        if !batch.is_empty() {
            self.catalog.apply_field_sync(batch)?;
        }
        info!(
            table_id,
            added = report.added,
            updated = report.updated,
            removed = report.removed,
            skipped = report.skipped.len(),
            orphaned = report.orphaned_gen_fields.len(),
            "synchronized fields"
        );

        let query = query
            .clone()
            .eq("table_id", table_id)
            .with_default_order("sort");
        let page = self.catalog.page_fields(&query)?;
        Ok(SyncResult { report, page })
    }

    /// Reflect `table` into a fresh mirror with new ids, writing nothing.
    ///
    /// Used to rebuild a GenTable: the caller swaps the mirror in through
    /// [`Catalog::rebuild_gen_table`]. An empty description is refused while
    /// the table or its GenTable still has fields, whatever the empty-schema
    /// setting says.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` when the live table is gone, `SchemaUnreachable`
    /// when it cannot be read or describes as empty.
    pub async fn reflect_table(&self, table: &MetaTable) -> Result<(TableMirror, SyncReport)> {
        let database = self.catalog.get_database(table.database_id)?;
        let connection = self.catalog.get_connection(database.connection_id)?;
        let source = self.provider.for_database(&connection, &database).await?;
        let live = source
            .list_tables()
            .await?
            .into_iter()
            .find(|t| t.name == table.name)
            .ok_or_else(|| {
                warn!(table_id = table.id, table = %table.name, "live table is gone");
                GenError::not_found("MetaTable", table.id)
            })?;
        let structure = source.describe_table(&table.name).await?;
        let mut report = SyncReport::new(format!(
            "{}/{}.{}",
            connection.connection_name, database.database_name, table.name
        ));

        let old_fields = self.catalog.fields_for(table.id)?.len();
        let old_indexes = self.catalog.indexes_for(table.id)?.len();
        let mut persisted = old_fields;
        if let Some(gen_table) = self.catalog.gen_table_for_meta(table.id)? {
            persisted = persisted.max(self.catalog.gen_fields_for(gen_table.id)?.len());
        }
        if structure.columns.is_empty() && persisted > 0 {
            warn!(scope = %report.scope, persisted, "refusing to rebuild from empty description");
            return Err(GenError::SchemaUnreachable {
                scope: report.scope,
                reason: format!("table described with no columns while {persisted} are catalogued"),
            });
        }

        let table_id = self.ids.next_id();
        let (described, _) = describe_columns(source.dialect(), table_id, &structure, &mut report);
        let fields: Vec<MetaField> = described
            .into_iter()
            .map(|f| MetaField {
                id: self.ids.next_id(),
                ..f
            })
            .collect();
        let indexes: Vec<MetaIndex> = structure
            .indexes
            .iter()
            .map(|i| describe_index(self.ids.next_id(), table_id, i))
            .collect();
        report.added = fields.len() + indexes.len();
        report.removed = old_fields + old_indexes;
        let mirror = TableMirror {
            table: MetaTable {
                id: table_id,
                database_id: table.database_id,
                name: table.name.clone(),
                comment: live.comment,
            },
            fields,
            indexes,
        };
        Ok((mirror, report))
    }
}

fn describe_columns(
    dialect: Dialect,
    table_id: i64,
    structure: &TableStructure,
    report: &mut SyncReport,
) -> (Vec<MetaField>, HashSet<String>) {
    let mut described = Vec::with_capacity(structure.columns.len());
    let mut skipped = HashSet::new();
    for (ordinal, column) in structure.columns.iter().enumerate() {
        match map_column(dialect, &column.name, &column.raw_type) {
            Ok(mapped) => {
                let sort = i32::try_from(ordinal).unwrap_or(i32::MAX);
                described.push(describe_field(
                    table_id,
                    column,
                    mapped,
                    sort,
                    &structure.primary_key,
                ));
            }
            Err(err) => {
                warn!(table_id, column = %column.name, error = %err, "skipping column");
                report.skipped.push(err.report());
                skipped.insert(column.name.clone());
            }
        }
    }
    (described, skipped)
}

fn describe_field(
    table_id: i64,
    column: &ColumnInfo,
    mapped: crate::typemap::MappedType,
    sort: i32,
    primary_key: &[String],
) -> MetaField {
    MetaField {
        id: 0,
        table_id,
        name: column.name.clone(),
        field_type: column.raw_type.clone(),
        storage: mapped.storage,
        length: mapped.length,
        scale: mapped.scale,
        default: column.default.clone(),
        comment: column.comment.clone(),
        nullable: column.nullable,
        primary_key: primary_key.iter().any(|p| p == &column.name),
        autoincrement: column.autoincrement,
        sort,
    }
}

fn describe_index(id: i64, table_id: i64, index: &IndexInfo) -> MetaIndex {
    MetaIndex {
        id,
        table_id,
        name: index.name.clone(),
        columns: index.columns.clone(),
        unique: index.unique,
        index_type: index.index_type.clone(),
    }
}

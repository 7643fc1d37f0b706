//! # Metadata Catalog
//!
//! Persisted rows the engine works on:
//!
//! - **Connection / Database** - server endpoints and the catalogs inside them
//! - **MetaTable / MetaField / MetaIndex** - a disposable mirror of the live
//!   schema, rewritten freely by the synchronizer
//! - **GenTable / GenField** - operator-owned generation settings, created only
//!   by an explicit import and removed only by an explicit delete or rebuild
//!
//! The [`Catalog`] trait is the persistence contract. Every `apply_*` and
//! GenTable mutation is atomic: either all of its rows change or none do.
//! [`MemoryCatalog`] implements it in memory with an optional JSON snapshot
//! on disk.

mod memory;
mod model;
mod query;

#[cfg(test)]
mod tests;

pub use memory::MemoryCatalog;
pub use model::*;
pub use query::{paginate, Filter, Page, PageQuery};

use crate::error::Result;

/// Changes computed by one field/index sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSyncBatch {
    pub add_fields: Vec<MetaField>,
    pub update_fields: Vec<MetaField>,
    pub remove_fields: Vec<i64>,
    pub add_indexes: Vec<MetaIndex>,
    pub update_indexes: Vec<MetaIndex>,
    pub remove_indexes: Vec<i64>,
}

impl FieldSyncBatch {
    pub fn is_empty(&self) -> bool {
        self.add_fields.is_empty()
            && self.update_fields.is_empty()
            && self.remove_fields.is_empty()
            && self.add_indexes.is_empty()
            && self.update_indexes.is_empty()
            && self.remove_indexes.is_empty()
    }
}

/// Freshly reflected rows for one table, with ids already assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMirror {
    pub table: MetaTable,
    pub fields: Vec<MetaField>,
    pub indexes: Vec<MetaIndex>,
}

/// Persistence contract for catalog rows.
///
/// Lookups by id fail with `ResourceNotFound`. Listing methods take a
/// [`PageQuery`] whose filters name serialized row fields.
pub trait Catalog: Send + Sync {
    fn insert_connection(&self, connection: Connection) -> Result<()>;
    fn get_connection(&self, id: i64) -> Result<Connection>;
    fn page_connections(&self, query: &PageQuery) -> Result<Page<Connection>>;

    fn get_database(&self, id: i64) -> Result<Database>;
    fn databases_for(&self, connection_id: i64) -> Result<Vec<Database>>;
    fn page_databases(&self, query: &PageQuery) -> Result<Page<Database>>;
    /// Insert `add`, delete `remove` (with their tables, fields and indexes).
    fn apply_database_sync(&self, add: Vec<Database>, remove: Vec<i64>) -> Result<()>;

    fn get_meta_table(&self, id: i64) -> Result<MetaTable>;
    fn tables_for(&self, database_id: i64) -> Result<Vec<MetaTable>>;
    fn page_tables(&self, query: &PageQuery) -> Result<Page<MetaTable>>;
    /// Insert `add`, update `update`, delete `remove` with their fields and
    /// indexes. GenTables are never touched.
    fn apply_table_sync(
        &self,
        add: Vec<MetaTable>,
        update: Vec<MetaTable>,
        remove: Vec<i64>,
    ) -> Result<()>;

    fn fields_for(&self, table_id: i64) -> Result<Vec<MetaField>>;
    fn indexes_for(&self, table_id: i64) -> Result<Vec<MetaIndex>>;
    fn page_fields(&self, query: &PageQuery) -> Result<Page<MetaField>>;
    /// Apply one field/index pass. GenFields are never touched.
    fn apply_field_sync(&self, batch: FieldSyncBatch) -> Result<()>;

    fn get_gen_table(&self, id: i64) -> Result<GenTable>;
    fn gen_table_for_meta(&self, db_table_id: i64) -> Result<Option<GenTable>>;
    fn page_gen_tables(&self, query: &PageQuery) -> Result<Page<GenTable>>;
    fn gen_fields_for(&self, gen_table_id: i64) -> Result<Vec<GenField>>;
    fn insert_gen_table(&self, table: GenTable, fields: Vec<GenField>) -> Result<()>;
    /// Replace the GenTable row and upsert the given GenFields.
    fn update_gen_table(&self, table: GenTable, fields: Vec<GenField>) -> Result<()>;
    /// Delete a GenTable, its GenFields, its bound MetaTable and that table's
    /// MetaFields and indexes. Returns the deleted GenTable.
    fn delete_gen_table(&self, id: i64) -> Result<GenTable>;
    /// Swap GenTable `table.id` onto a new mirror of its table: the old
    /// GenFields and mirror rows go, `mirror`, `table` and `fields` come in.
    fn rebuild_gen_table(
        &self,
        mirror: TableMirror,
        table: GenTable,
        fields: Vec<GenField>,
    ) -> Result<()>;
}

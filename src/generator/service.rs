use super::archive::{archive_filename, namespace_prefixes, ArchiveWriter};
use super::context::{build_context, ContextInput, GenerationContext};
use super::engine::TemplateEngine;
use super::init::{init_field, init_table};
use super::render::{render_templates, RenderOutcome, RenderedFile};
use super::templates::TemplateRegistry;
use crate::catalog::{Catalog, GenField, GenTable, MetaTable, Page, PageQuery, TemplateCategory};
use crate::config::CodegenConfig;
use crate::error::{ErrorReport, GenError, Result};
use crate::ids::IdGenerator;
use crate::sync::{SyncReport, Synchronizer};
use crate::typemap::Backend;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of [`GeneratorService::import_tables`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportReport {
    /// New GenTables.
    pub imported: Vec<GenTable>,
    /// MetaTable ids skipped because they already have a GenTable.
    pub already_imported: Vec<i64>,
    pub sync_reports: Vec<SyncReport>,
}

/// GenTable row joined with its connection, database and table.
///
/// The joined columns are `None` once a sync removed the row they point at.
/// Such a GenTable is `stale` until it is rebuilt or deleted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenTableSummary {
    pub id: i64,
    pub connection_name: Option<String>,
    pub database_name: Option<String>,
    pub table_id: i64,
    pub table_name: Option<String>,
    pub table_comment: Option<String>,
    pub stale: bool,
    pub class_name: String,
    pub backend: Backend,
    pub category: TemplateCategory,
    pub create_time: DateTime<Utc>,
}

/// A GenTable with its GenFields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenTableDetail {
    pub table: GenTable,
    pub fields: Vec<GenField>,
}

/// Rendered archive handed to whatever delivers downloads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Download {
    pub filename: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub entries: usize,
    pub errors: Vec<ErrorReport>,
}

/// Result of writing generated files to disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub errors: Vec<ErrorReport>,
}

/// GenTable lifecycle and code generation on top of the catalog.
pub struct GeneratorService {
    catalog: Arc<dyn Catalog>,
    sync: Synchronizer,
    ids: Arc<IdGenerator>,
    settings: CodegenConfig,
    registry: Arc<TemplateRegistry>,
    engine: Arc<dyn TemplateEngine>,
}

impl std::fmt::Debug for GeneratorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorService")
            .field("language", &self.registry.language())
            .finish_non_exhaustive()
    }
}

impl GeneratorService {
    pub fn new(
        sync: Synchronizer,
        ids: Arc<IdGenerator>,
        settings: CodegenConfig,
        registry: Arc<TemplateRegistry>,
        engine: Arc<dyn TemplateEngine>,
    ) -> Self {
        Self {
            catalog: Arc::clone(sync.catalog()),
            sync,
            ids,
            settings,
            registry,
            engine,
        }
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    /// Create a GenTable (and its GenFields) for each of `table_ids`.
    ///
    /// Fields are synced from the live schema first. Tables that already
    /// have a GenTable are skipped.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` when a table is unknown or belongs to another
    /// database; any sync error aborts the remaining imports.
    pub async fn import_tables(
        &self,
        database_id: i64,
        table_ids: &[i64],
        backend: Option<Backend>,
    ) -> Result<ImportReport> {
        let backend = backend.unwrap_or(self.settings.language);
        let mut report = ImportReport::default();
        for &table_id in table_ids {
            let table = self.catalog.get_meta_table(table_id)?;
            if table.database_id != database_id {
                return Err(GenError::not_found("MetaTable", table_id));
            }
            if self.catalog.gen_table_for_meta(table_id)?.is_some() {
                warn!(table_id, table = %table.name, "table already imported, skipping");
                report.already_imported.push(table_id);
                continue;
            }
            let synced = self
                .sync
                .sync_fields(table_id, &PageQuery::all(), false)
                .await?;
            report.sync_reports.push(synced.report);
            let gen_table = self.create_gen_table(&table, backend)?;
            info!(
                gen_table_id = gen_table.id,
                table = %table.name,
                backend = %backend,
                "imported table"
            );
            report.imported.push(gen_table);
        }
        Ok(report)
    }

    fn create_gen_table(&self, table: &MetaTable, backend: Backend) -> Result<GenTable> {
        let gen_table = init_table(self.ids.next_id(), table, backend, &self.settings, Utc::now());
        let fields: Vec<GenField> = self
            .catalog
            .fields_for(table.id)?
            .iter()
            .map(|f| init_field(self.ids.next_id(), gen_table.id, f))
            .collect();
        self.catalog.insert_gen_table(gen_table.clone(), fields)?;
        Ok(gen_table)
    }

    /// GenTables joined with their connection, database and table names.
    ///
    /// GenTables whose references are gone are listed as stale.
    pub fn list_gen_tables(&self, query: &PageQuery) -> Result<Page<GenTableSummary>> {
        let query = query.clone().with_default_order("create_time");
        let page = self.catalog.page_gen_tables(&query)?;
        let mut rows = Vec::with_capacity(page.rows.len());
        for gen_table in &page.rows {
            let table = found(self.catalog.get_meta_table(gen_table.db_table_id))?;
            let database = found(self.catalog.get_database(gen_table.database_id))?;
            let connection = match &database {
                Some(db) => found(self.catalog.get_connection(db.connection_id))?,
                None => None,
            };
            if table.is_none() {
                warn!(
                    gen_table_id = gen_table.id,
                    db_table_id = gen_table.db_table_id,
                    "gen table lost its meta table"
                );
            }
            rows.push(GenTableSummary {
                id: gen_table.id,
                connection_name: connection.map(|c| c.connection_name),
                database_name: database.map(|d| d.database_name),
                table_id: gen_table.db_table_id,
                stale: table.is_none(),
                table_comment: table.as_ref().and_then(|t| t.comment.clone()),
                table_name: table.map(|t| t.name),
                class_name: gen_table.class_name.clone(),
                backend: gen_table.backend,
                category: gen_table.category(),
                create_time: gen_table.create_time,
            });
        }
        Ok(Page {
            rows,
            total: page.total,
        })
    }

    pub fn gen_table_detail(&self, id: i64) -> Result<GenTableDetail> {
        Ok(GenTableDetail {
            table: self.catalog.get_gen_table(id)?,
            fields: self.catalog.gen_fields_for(id)?,
        })
    }

    /// Save operator edits to a GenTable and its GenFields.
    ///
    /// Identity columns (`db_table_id`, `database_id`, `create_time`) keep
    /// their stored values.
    ///
    /// # Errors
    ///
    /// `InvalidGenOptions` for incomplete category options,
    /// `ResourceNotFound` for an unknown GenTable or GenField.
    pub fn update_gen_table(&self, detail: GenTableDetail) -> Result<GenTable> {
        let current = self.catalog.get_gen_table(detail.table.id)?;
        detail.table.options.validate(current.id)?;
        let known: HashSet<i64> = self
            .catalog
            .gen_fields_for(current.id)?
            .iter()
            .map(|f| f.id)
            .collect();
        if let Some(unknown) = detail.fields.iter().find(|f| !known.contains(&f.id)) {
            return Err(GenError::not_found("GenField", unknown.id));
        }
        let table = GenTable {
            database_id: current.database_id,
            db_table_id: current.db_table_id,
            create_time: current.create_time,
            update_time: Utc::now(),
            ..detail.table
        };
        self.catalog.update_gen_table(table.clone(), detail.fields)?;
        info!(gen_table_id = table.id, "updated gen table");
        Ok(table)
    }

    /// Delete GenTables with their GenFields, MetaTable and MetaFields.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound` on the first unknown id; earlier ids stay deleted.
    pub fn delete_gen_tables(&self, ids: &[i64]) -> Result<Vec<GenTable>> {
        let mut deleted = Vec::with_capacity(ids.len());
        for &id in ids {
            let table = self.catalog.delete_gen_table(id)?;
            info!(gen_table_id = id, db_table_id = table.db_table_id, "deleted gen table");
            deleted.push(table);
        }
        Ok(deleted)
    }

    /// Rebuild a GenTable from the live schema.
    ///
    /// The table is reflected first; only then are the GenTable's mirror rows
    /// and GenFields swapped for fresh ones in one catalog call. The GenTable
    /// id and its table-level attributes survive, GenField flags are reset.
    ///
    /// # Errors
    ///
    /// `SchemaUnreachable` if the schema cannot be read or the table
    /// describes as empty; `ResourceNotFound` if the live table no longer
    /// exists. The catalog is unchanged on any error.
    pub async fn sync_gen_table(&self, id: i64) -> Result<GenTable> {
        let previous = self.catalog.get_gen_table(id)?;
        let meta = self.catalog.get_meta_table(previous.db_table_id)?;
        let (mirror, report) = self.sync.reflect_table(&meta).await?;

        let rebuilt = GenTable {
            database_id: mirror.table.database_id,
            db_table_id: mirror.table.id,
            update_time: Utc::now(),
            ..previous
        };
        let fields: Vec<GenField> = mirror
            .fields
            .iter()
            .map(|f| init_field(self.ids.next_id(), id, f))
            .collect();
        let field_count = fields.len();
        self.catalog.rebuild_gen_table(mirror, rebuilt.clone(), fields)?;
        info!(
            gen_table_id = id,
            db_table_id = rebuilt.db_table_id,
            fields = field_count,
            skipped = report.skipped.len(),
            "rebuilt gen table"
        );
        Ok(rebuilt)
    }

    /// Build the render context for one GenTable.
    ///
    /// # Errors
    ///
    /// `ResourceNotFound`, `MissingPrimaryKey` or `InvalidGenOptions`.
    pub fn context(&self, id: i64) -> Result<GenerationContext> {
        let table = self.catalog.get_gen_table(id)?;
        let meta_table = self.catalog.get_meta_table(table.db_table_id)?;
        let meta_fields = self.catalog.fields_for(meta_table.id)?;
        let gen_fields = self.catalog.gen_fields_for(id)?;
        let indexes = self.catalog.indexes_for(meta_table.id)?;
        build_context(
            ContextInput {
                table: &table,
                meta_table: &meta_table,
                meta_fields: &meta_fields,
                gen_fields: &gen_fields,
                indexes: &indexes,
            },
            &self.settings,
            Utc::now().date_naive(),
        )
    }

    fn render(&self, context: &GenerationContext, table: &GenTable) -> Result<RenderOutcome> {
        let specs = self.registry.resolve(
            table.backend,
            &table.backend_kind,
            table.category(),
            &table.frontend_kind,
        );
        render_templates(self.engine.as_ref(), &specs, context)
    }

    /// Render every template for one GenTable without packaging.
    pub fn preview(&self, id: i64) -> Result<RenderOutcome> {
        let table = self.catalog.get_gen_table(id)?;
        let context = self.context(id)?;
        self.render(&context, &table)
    }

    /// Render one or more GenTables into a single zip archive.
    ///
    /// With several tables every path is prefixed by the table's class name.
    /// Template failures and, for multi-table requests, per-table context
    /// failures are collected into [`Download::errors`].
    ///
    /// # Errors
    ///
    /// A single-table request fails on a context error; any request fails
    /// when nothing could be built or the archive cannot be written.
    pub fn download(&self, ids: &[i64]) -> Result<Download> {
        let mut errors = Vec::new();
        let mut jobs: Vec<(GenTable, GenerationContext)> = Vec::with_capacity(ids.len());
        let mut first_error = None;
        for &id in ids {
            let built = self
                .catalog
                .get_gen_table(id)
                .and_then(|t| Ok((self.context(id)?, t)));
            match built {
                Ok((context, table)) => jobs.push((table, context)),
                Err(err) if ids.len() > 1 => {
                    warn!(gen_table_id = id, error = %err, "skipping table in bundle");
                    errors.push(err.report());
                    first_error.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }
        if jobs.is_empty() {
            return Err(first_error.unwrap_or_else(|| {
                GenError::Archive("no tables requested for download".to_string())
            }));
        }

        let prefixes: Vec<Option<String>> = if ids.len() > 1 {
            let named: Vec<(i64, &str)> =
                jobs.iter().map(|(t, _)| (t.id, t.class_name.as_str())).collect();
            namespace_prefixes(&named).into_iter().map(Some).collect()
        } else {
            vec![None]
        };

        let writer = ArchiveWriter::new();
        let results: Vec<Result<RenderOutcome>> = std::thread::scope(|scope| {
            let handles: Vec<_> = jobs
                .iter()
                .zip(&prefixes)
                .map(|((table, context), prefix)| {
                    let writer = &writer;
                    scope.spawn(move || -> Result<RenderOutcome> {
                        let outcome = self.render(context, table)?;
                        for file in &outcome.files {
                            let path = match prefix {
                                Some(p) => format!("{p}/{}", file.path),
                                None => file.path.clone(),
                            };
                            writer.add(&path, file.content.as_bytes())?;
                        }
                        Ok(outcome)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join().unwrap_or_else(|_| {
                        Err(GenError::Archive("render worker panicked".to_string()))
                    })
                })
                .collect()
        });
        for result in results {
            errors.extend(result?.errors);
        }

        let entries = writer.len();
        let bytes = writer.finish()?;
        let names: Vec<&str> = jobs.iter().map(|(_, c)| c.table_name.as_str()).collect();
        let filename = archive_filename(&names, Utc::now());
        info!(
            tables = jobs.len(),
            entries,
            errors = errors.len(),
            filename = %filename,
            "built code archive"
        );
        Ok(Download {
            filename,
            bytes,
            entries,
            errors,
        })
    }

    /// Render one GenTable and write the files under `root`, or under the
    /// GenTable's `gen_path` when `root` is `None`. Existing files are kept
    /// unless `force` is set.
    ///
    /// # Errors
    ///
    /// Context errors, or an I/O error while writing.
    pub fn write_to_dir(&self, id: i64, root: Option<&Path>, force: bool) -> anyhow::Result<WriteReport> {
        use anyhow::Context;

        let table = self.catalog.get_gen_table(id)?;
        let root = root.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(&table.gen_path));
        let context = self.context(id)?;
        let outcome = self.render(&context, &table)?;
        let mut report = WriteReport {
            errors: outcome.errors,
            ..WriteReport::default()
        };
        for RenderedFile { path, content, .. } in outcome.files {
            let target = root.join(&path);
            if target.exists() && !force {
                println!("⚠️  Skipping existing file: {target:?}");
                report.skipped.push(target);
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            fs::write(&target, content)
                .with_context(|| format!("failed to write {}", target.display()))?;
            println!("✅ Generated {target:?}");
            report.written.push(target);
        }
        Ok(report)
    }
}

/// Turn a missing row into `None`, keeping every other failure.
fn found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(row) => Ok(Some(row)),
        Err(GenError::ResourceNotFound { .. }) => Ok(None),
        Err(err) => Err(err),
    }
}

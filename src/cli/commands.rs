use crate::catalog::{Catalog, Connection, MemoryCatalog, PageQuery};
use crate::config::AppConfig;
use crate::engine::EngineCache;
use crate::generator::{GeneratorService, MiniJinjaEngine, TemplateRegistry};
use crate::ids::IdGenerator;
use crate::logging::{init_logging_with_config, LogConfig};
use crate::naming::{convert, NameStyle, NameVariants};
use crate::sync::{SyncOptions, Synchronizer};
use crate::typemap::{Backend, Dialect};
use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Command-line interface for metagen
///
/// Registers connections, mirrors live schemas into the catalog and renders
/// code for imported tables.
#[derive(Debug, Parser)]
#[command(name = "metagen")]
#[command(about = "Schema-driven CRUD code generator", long_about = None)]
pub struct Cli {
    /// Configuration file (YAML or TOML)
    #[arg(short, long, global = true, env = "METAGEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Register or list database connections
    #[command(subcommand)]
    Connection(ConnectionCommand),
    /// Mirror live structure into the catalog
    #[command(subcommand)]
    Sync(SyncCommand),
    /// Import tables as generation targets
    Import {
        #[arg(long)]
        database: i64,

        /// MetaTable ids (comma-separated or repeated)
        #[arg(long, num_args = 1.., value_delimiter = ',', required = true)]
        tables: Vec<i64>,

        /// Backend language (defaults to the configured language)
        #[arg(long)]
        backend: Option<Backend>,
    },
    /// List imported tables
    List {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show one imported table with its fields
    Show { id: i64 },
    /// Delete imported tables and their mirrored rows
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
    /// Rebuild an imported table from the live schema
    SyncTable { id: i64 },
    /// Print the rendered files of one imported table
    Preview {
        id: i64,

        /// Only print this template
        #[arg(long)]
        template: Option<String>,
    },
    /// Render imported tables into a zip archive
    Download {
        #[arg(required = true)]
        ids: Vec<i64>,

        /// Directory the archive is written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Render one imported table into a directory
    Write {
        id: i64,

        /// Output root (defaults to the table's configured path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite existing files
        #[arg(short, long, default_value_t = false)]
        force: bool,
    },
    /// Print every naming variant of a table name, or one converted style
    Names {
        name: String,

        /// singular, plural, camel, pascal, snake, kebab, upper or lower
        #[arg(long)]
        style: Option<NameStyle>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConnectionCommand {
    /// Register a connection
    Add {
        #[arg(long)]
        name: String,

        /// mysql, postgres or sqlite
        #[arg(long)]
        dialect: Dialect,

        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        username: Option<String>,

        #[arg(long, env = "METAGEN_DB_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Default database, or the database file for SQLite
        #[arg(long)]
        database: Option<String>,
    },
    /// List registered connections
    List {
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Debug, Subcommand)]
pub enum SyncCommand {
    /// Databases of a connection
    Databases {
        #[arg(long)]
        connection: i64,

        #[arg(long, default_value_t = false)]
        allow_empty: bool,
    },
    /// Tables of a database
    Tables {
        #[arg(long)]
        database: i64,

        #[arg(long, default_value_t = false)]
        allow_empty: bool,

        /// Hide tables that are already imported
        #[arg(long, default_value_t = false)]
        exclude_imported: bool,

        #[command(flatten)]
        page: PageArgs,
    },
    /// Fields and indexes of a table
    Fields {
        #[arg(long)]
        table: i64,

        #[arg(long, default_value_t = false)]
        allow_empty: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct PageArgs {
    /// 1-based page number
    #[arg(long, default_value_t = 1)]
    pub page: usize,

    #[arg(long, default_value_t = 20)]
    pub size: usize,

    /// Substring match on names
    #[arg(long)]
    pub like: Option<String>,
}

impl PageArgs {
    fn query(&self, columns: &[&str]) -> PageQuery {
        let query = PageQuery::page(self.page, self.size);
        match &self.like {
            Some(needle) => query.like(columns, needle),
            None => query,
        }
    }
}

/// Long-lived handles shared by every command.
pub struct App {
    catalog: Arc<MemoryCatalog>,
    engines: Arc<EngineCache>,
    ids: Arc<IdGenerator>,
    service: GeneratorService,
}

impl App {
    /// Build the catalog, engine cache, synchronizer and generator from config.
    ///
    /// # Errors
    ///
    /// Fails when the catalog snapshot or a template override cannot be read.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let catalog = Arc::new(match &config.catalog.path {
            Some(path) => MemoryCatalog::open(path)
                .with_context(|| format!("failed to open catalog {}", path.display()))?,
            None => {
                warn!("no catalog path configured, changes are kept in memory only");
                MemoryCatalog::new()
            }
        });
        let engines = Arc::new(EngineCache::new(config.engine.clone()));
        let ids = Arc::new(IdGenerator::new(config.catalog.worker_id));

        let mut registry = TemplateRegistry::builtin(config.codegen.language);
        if let Some(dir) = &config.codegen.template_dir {
            registry.load_overrides(dir)?;
        }

        let sync = Synchronizer::new(
            Arc::clone(&catalog) as Arc<dyn Catalog>,
            Arc::clone(&engines) as Arc<dyn crate::reflect::SchemaProvider>,
            Arc::clone(&ids),
        )
        .with_allow_empty(config.sync.allow_empty_schema);
        let service = GeneratorService::new(
            sync,
            Arc::clone(&ids),
            config.codegen.clone(),
            Arc::new(registry),
            Arc::new(MiniJinjaEngine::new()),
        );
        Ok(Self {
            catalog,
            engines,
            ids,
            service,
        })
    }

    pub fn catalog(&self) -> &Arc<MemoryCatalog> {
        &self.catalog
    }

    pub fn service(&self) -> &GeneratorService {
        &self.service
    }

    /// Close every cached pool.
    pub async fn shutdown(&self) {
        self.engines.clear().await;
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run one parsed command against `app`.
///
/// # Errors
///
/// Any library error, wrapped with the command that failed.
pub async fn execute(app: &App, command: Commands) -> anyhow::Result<()> {
    let service = &app.service;
    let sync = service.synchronizer();
    match command {
        Commands::Connection(ConnectionCommand::Add {
            name,
            dialect,
            host,
            port,
            username,
            password,
            database,
        }) => {
            let connection = Connection {
                id: app.ids.next_id(),
                connection_name: name,
                database_type: dialect,
                host,
                port,
                username,
                password,
                connection_database: database,
                create_time: Utc::now(),
            };
            let endpoint = connection.endpoint();
            let id = connection.id;
            app.catalog
                .insert_connection(connection)
                .context("failed to register connection")?;
            info!(connection_id = id, endpoint = %endpoint, "registered connection");
            println!("✅ Registered connection {id} ({endpoint})");
        }
        Commands::Connection(ConnectionCommand::List { page }) => {
            let rows = app
                .catalog
                .page_connections(&page.query(&["connection_name"]))?
                .map(|c| (c.id, c.connection_name.clone(), c.endpoint()));
            print_json(&rows)?;
        }
        Commands::Sync(SyncCommand::Databases {
            connection,
            allow_empty,
        }) => {
            let result = sync
                .sync_databases(connection, &PageQuery::all(), allow_empty)
                .await
                .with_context(|| format!("failed to sync databases of connection {connection}"))?;
            print_json(&result)?;
        }
        Commands::Sync(SyncCommand::Tables {
            database,
            allow_empty,
            exclude_imported,
            page,
        }) => {
            let options = SyncOptions {
                allow_empty,
                exclude_imported,
            };
            let result = sync
                .sync_tables(database, &page.query(&["name", "comment"]), options)
                .await
                .with_context(|| format!("failed to sync tables of database {database}"))?;
            print_json(&result)?;
        }
        Commands::Sync(SyncCommand::Fields { table, allow_empty }) => {
            let result = sync
                .sync_fields(table, &PageQuery::all(), allow_empty)
                .await
                .with_context(|| format!("failed to sync fields of table {table}"))?;
            print_json(&result)?;
        }
        Commands::Import {
            database,
            tables,
            backend,
        } => {
            let report = service
                .import_tables(database, &tables, backend)
                .await
                .context("import failed")?;
            for table in &report.imported {
                println!("✅ Imported {} as gen table {}", table.class_name, table.id);
            }
            for id in &report.already_imported {
                println!("⚠️  Table {id} is already imported");
            }
        }
        Commands::List { page } => {
            print_json(&service.list_gen_tables(&page.query(&["class_name", "function_name"]))?)?;
        }
        Commands::Show { id } => print_json(&service.gen_table_detail(id)?)?,
        Commands::Delete { ids } => {
            for table in service.delete_gen_tables(&ids)? {
                println!("🗑️  Deleted gen table {} ({})", table.id, table.class_name);
            }
        }
        Commands::SyncTable { id } => {
            let table = service
                .sync_gen_table(id)
                .await
                .with_context(|| format!("failed to rebuild gen table {id}"))?;
            println!("✅ Rebuilt gen table {} from table {}", table.id, table.db_table_id);
        }
        Commands::Preview { id, template } => {
            let outcome = service.preview(id)?;
            for file in outcome
                .files
                .iter()
                .filter(|f| template.as_deref().is_none_or(|t| t == f.template_id))
            {
                println!("// ===== {} ({})", file.path, file.template_id);
                println!("{}", file.content);
            }
            report_errors(&outcome.errors);
        }
        Commands::Download { ids, output } => {
            let download = service.download(&ids)?;
            let target = output.join(&download.filename);
            write_archive(&target, &download.bytes)?;
            println!(
                "✅ Wrote {} files to {}",
                download.entries,
                target.display()
            );
            report_errors(&download.errors);
        }
        Commands::Write { id, output, force } => {
            let report = service.write_to_dir(id, output.as_deref(), force)?;
            println!(
                "✅ {} written, {} skipped",
                report.written.len(),
                report.skipped.len()
            );
            report_errors(&report.errors);
        }
        Commands::Names { name, style } => match style {
            Some(style) => println!("{}", convert(&name, style)),
            None => print_json(&NameVariants::from_table(&name))?,
        },
    }
    Ok(())
}

fn write_archive(target: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(target, bytes).with_context(|| format!("failed to write {}", target.display()))
}

fn report_errors(errors: &[crate::error::ErrorReport]) {
    for err in errors {
        eprintln!("❌ {}: {}", err.kind, err.message);
    }
}

/// Parse arguments, load configuration and run the command
///
/// # Errors
///
/// Returns an error if configuration or logging cannot be initialised, or
/// the command fails.
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging_with_config(&LogConfig::from_env())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(async {
        let app = App::from_config(&config)?;
        let result = execute(&app, cli.command).await;
        app.shutdown().await;
        result
    })
}

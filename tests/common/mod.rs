#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

pub mod sqlite {
    use chrono::Utc;
    use metagen::catalog::{Catalog, Connection, MemoryCatalog, PageQuery};
    use metagen::config::{CodegenConfig, EngineConfig};
    use metagen::engine::EngineCache;
    use metagen::generator::{GeneratorService, MiniJinjaEngine, TemplateRegistry};
    use metagen::ids::IdGenerator;
    use metagen::reflect::SchemaProvider;
    use metagen::sync::Synchronizer;
    use metagen::typemap::{Backend, Dialect};
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::TempDir;

    pub const CONNECTION_ID: i64 = 1;

    pub const USERS: &str =
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(64), age DECIMAL(10,2))";

    /// A scratch SQLite file plus a catalog, engine cache and service wired to it.
    pub struct Harness {
        _dir: TempDir,
        pub path: PathBuf,
        pub writer: SqlitePool,
        pub catalog: Arc<MemoryCatalog>,
        pub engines: Arc<EngineCache>,
        pub service: GeneratorService,
    }

    impl Harness {
        pub async fn new(ddl: &[&str]) -> Self {
            Self::with_registry(ddl, TemplateRegistry::builtin(Backend::Rust)).await
        }

        pub async fn with_registry(ddl: &[&str], registry: TemplateRegistry) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("schema.db");
            let writer = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(
                    SqliteConnectOptions::new()
                        .filename(&path)
                        .create_if_missing(true)
                        .journal_mode(SqliteJournalMode::Delete),
                )
                .await
                .unwrap();
            for stmt in ddl {
                sqlx::query(stmt).execute(&writer).await.unwrap();
            }

            let catalog = Arc::new(MemoryCatalog::new());
            catalog
                .insert_connection(Connection {
                    id: CONNECTION_ID,
                    connection_name: "scratch".into(),
                    database_type: Dialect::Sqlite,
                    host: None,
                    port: None,
                    username: None,
                    password: None,
                    connection_database: Some(path.to_string_lossy().into_owned()),
                    create_time: Utc::now(),
                })
                .unwrap();
            let engines = Arc::new(EngineCache::new(EngineConfig::default()));
            let ids = Arc::new(IdGenerator::new(3));
            let sync = Synchronizer::new(
                Arc::clone(&catalog) as Arc<dyn Catalog>,
                Arc::clone(&engines) as Arc<dyn SchemaProvider>,
                Arc::clone(&ids),
            );
            let service = GeneratorService::new(
                sync,
                ids,
                CodegenConfig::default(),
                Arc::new(registry),
                Arc::new(MiniJinjaEngine::new()),
            );
            Self {
                _dir: dir,
                path,
                writer,
                catalog,
                engines,
                service,
            }
        }

        pub async fn exec(&self, sql: &str) {
            sqlx::query(sql).execute(&self.writer).await.unwrap();
        }

        /// Sync databases and return the id of `main`.
        pub async fn main_database(&self) -> i64 {
            let result = self
                .service
                .synchronizer()
                .sync_databases(CONNECTION_ID, &PageQuery::all(), false)
                .await
                .unwrap();
            result
                .page
                .rows
                .iter()
                .find(|d| d.database_name == "main")
                .map(|d| d.id)
                .expect("sqlite always lists main")
        }

        pub fn table_id(&self, database_id: i64, name: &str) -> i64 {
            self.catalog
                .tables_for(database_id)
                .unwrap()
                .into_iter()
                .find(|t| t.name == name)
                .map(|t| t.id)
                .unwrap_or_else(|| panic!("table {name} not catalogued"))
        }

        pub async fn shutdown(self) {
            self.engines.clear().await;
            self.writer.close().await;
        }
    }
}

//! # Engine Cache
//!
//! Owns the live connection pools used for reflection. One pool exists per
//! `(connection_id, database_id)` key; `database_id = None` is the
//! server-level handle used to list catalogs.
//!
//! ## Concurrency
//!
//! - Cache hits read the [`DashMap`] shard directly and never wait on the
//!   creation lock, so lookups for unrelated keys proceed in parallel.
//! - Misses take a single async mutex around check-then-create, so two
//!   concurrent requests for the same key build exactly one pool.
//!
//! Build one cache at start-up and hand an `Arc<EngineCache>` to whatever
//! needs it; [`EngineCache::clear`] closes every pool (tests, shutdown).

use crate::catalog::{Connection, Database};
use crate::config::EngineConfig;
use crate::error::{GenError, Result};
use crate::reflect::{
    MySqlSource, PostgresSource, SchemaProvider, SchemaSource, SqliteSource,
};
use crate::typemap::Dialect;
use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Cache key: connection plus optional database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineKey {
    pub connection_id: i64,
    pub database_id: Option<i64>,
}

/// A live pool for one of the supported dialects.
#[derive(Debug, Clone)]
pub enum DatabasePool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl DatabasePool {
    pub fn dialect(&self) -> Dialect {
        match self {
            DatabasePool::MySql(_) => Dialect::MySql,
            DatabasePool::Postgres(_) => Dialect::Postgres,
            DatabasePool::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Wrap the pool in the matching reflector.
    pub fn source(&self, scope: impl Into<String>) -> Arc<dyn SchemaSource> {
        match self {
            DatabasePool::MySql(p) => Arc::new(MySqlSource::new(p.clone(), scope)),
            DatabasePool::Postgres(p) => Arc::new(PostgresSource::new(p.clone(), scope)),
            DatabasePool::Sqlite(p) => Arc::new(SqliteSource::new(p.clone(), scope)),
        }
    }

    pub async fn close(&self) {
        match self {
            DatabasePool::MySql(p) => p.close().await,
            DatabasePool::Postgres(p) => p.close().await,
            DatabasePool::Sqlite(p) => p.close().await,
        }
    }
}

/// Process-wide cache of live pools.
#[derive(Debug)]
pub struct EngineCache {
    pools: DashMap<EngineKey, DatabasePool>,
    create_lock: Mutex<()>,
    settings: EngineConfig,
}

impl EngineCache {
    pub fn new(settings: EngineConfig) -> Self {
        Self {
            pools: DashMap::new(),
            create_lock: Mutex::new(()),
            settings,
        }
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn contains(&self, key: EngineKey) -> bool {
        self.pools.contains_key(&key)
    }

    /// Return the cached pool for `connection`/`database`, creating it once.
    ///
    /// # Errors
    ///
    /// [`GenError::SchemaUnreachable`] when the server cannot be reached.
    pub async fn get_or_create(
        &self,
        connection: &Connection,
        database: Option<&Database>,
    ) -> Result<DatabasePool> {
        let key = EngineKey {
            connection_id: connection.id,
            database_id: database.map(|d| d.id),
        };
        if let Some(pool) = self.pools.get(&key) {
            return Ok(pool.value().clone());
        }

        let _guard = self.create_lock.lock().await;
        if let Some(pool) = self.pools.get(&key) {
            return Ok(pool.value().clone());
        }
        let pool = self
            .connect(connection, database.map(|d| d.database_name.as_str()))
            .await?;
        info!(
            connection_id = connection.id,
            database_id = ?key.database_id,
            endpoint = %connection.endpoint(),
            "created database engine"
        );
        self.pools.insert(key, pool.clone());
        Ok(pool)
    }

    /// Drop and close every pool for `connection_id`.
    pub async fn evict_connection(&self, connection_id: i64) {
        let keys: Vec<EngineKey> = self
            .pools
            .iter()
            .filter(|e| e.key().connection_id == connection_id)
            .map(|e| *e.key())
            .collect();
        for key in keys {
            if let Some((_, pool)) = self.pools.remove(&key) {
                pool.close().await;
            }
        }
    }

    /// Close and forget every pool.
    pub async fn clear(&self) {
        let _guard = self.create_lock.lock().await;
        let keys: Vec<EngineKey> = self.pools.iter().map(|e| *e.key()).collect();
        for key in keys {
            if let Some((_, pool)) = self.pools.remove(&key) {
                pool.close().await;
            }
        }
        debug!("engine cache cleared");
    }

    async fn connect(&self, connection: &Connection, database: Option<&str>) -> Result<DatabasePool> {
        let scope = connection.endpoint();
        let fail = |reason: String| GenError::SchemaUnreachable {
            scope: scope.clone(),
            reason,
        };
        let timeout = Duration::from_secs(self.settings.acquire_timeout_secs.max(1));
        let max = self.settings.max_connections.max(1);
        let host = connection.host.as_deref().unwrap_or("localhost");

        let pool = match connection.database_type {
            Dialect::MySql => {
                let mut opts = MySqlConnectOptions::new()
                    .host(host)
                    .port(connection.port.unwrap_or(3306));
                if let Some(user) = &connection.username {
                    opts = opts.username(user);
                }
                if let Some(pass) = &connection.password {
                    opts = opts.password(pass);
                }
                if let Some(db) = database.or(connection.connection_database.as_deref()) {
                    opts = opts.database(db);
                }
                let pool = MySqlPoolOptions::new()
                    .max_connections(max)
                    .acquire_timeout(timeout)
                    .connect_with(opts)
                    .await
                    .map_err(|e| fail(e.to_string()))?;
                DatabasePool::MySql(pool)
            }
            Dialect::Postgres => {
                let mut opts = PgConnectOptions::new()
                    .host(host)
                    .port(connection.port.unwrap_or(5432))
                    .database(
                        database
                            .or(connection.connection_database.as_deref())
                            .unwrap_or("postgres"),
                    );
                if let Some(user) = &connection.username {
                    opts = opts.username(user);
                }
                if let Some(pass) = &connection.password {
                    opts = opts.password(pass);
                }
                let pool = PgPoolOptions::new()
                    .max_connections(max)
                    .acquire_timeout(timeout)
                    .connect_with(opts)
                    .await
                    .map_err(|e| fail(e.to_string()))?;
                DatabasePool::Postgres(pool)
            }
            Dialect::Sqlite => {
                let file = connection
                    .connection_database
                    .as_deref()
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| fail("sqlite connection has no database file".to_string()))?;
                let opts = SqliteConnectOptions::new()
                    .filename(file)
                    .create_if_missing(false)
                    .read_only(true);
                let pool = SqlitePoolOptions::new()
                    .max_connections(max)
                    .acquire_timeout(timeout)
                    .connect_with(opts)
                    .await
                    .map_err(|e| fail(e.to_string()))?;
                DatabasePool::Sqlite(pool)
            }
        };
        if pool.dialect() != connection.database_type {
            warn!(connection_id = connection.id, "pool dialect mismatch");
        }
        Ok(pool)
    }
}

#[async_trait]
impl SchemaProvider for EngineCache {
    async fn for_connection(&self, connection: &Connection) -> Result<Arc<dyn SchemaSource>> {
        let pool = self.get_or_create(connection, None).await?;
        Ok(pool.source(connection.connection_name.clone()))
    }

    async fn for_database(
        &self,
        connection: &Connection,
        database: &Database,
    ) -> Result<Arc<dyn SchemaSource>> {
        if database.connection_id != connection.id {
            return Err(GenError::not_found("Database", database.id));
        }
        // SQLite catalogs all live in the one file.
        let scoped = match connection.database_type {
            Dialect::Sqlite => None,
            _ => Some(database),
        };
        let pool = self.get_or_create(connection, scoped).await?;
        Ok(pool.source(format!(
            "{}/{}",
            connection.connection_name, database.database_name
        )))
    }
}

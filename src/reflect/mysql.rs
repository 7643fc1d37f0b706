use super::{
    group_indexes, non_empty, unreachable, ColumnInfo, DatabaseInfo, IndexInfo, RowResult,
    SchemaSource, TableInfo, TableStructure,
};
use crate::error::Result;
use crate::typemap::Dialect;
use async_trait::async_trait;
use sqlx::mysql::MySqlPool;
use sqlx::Row;

// information_schema columns come back as VARBINARY on some servers; cast
// everything read as text.
const LIST_DATABASES: &str = "SELECT CAST(SCHEMA_NAME AS CHAR) AS name, \
     CAST(DEFAULT_CHARACTER_SET_NAME AS CHAR) AS encoding, \
     CAST(DEFAULT_COLLATION_NAME AS CHAR) AS collation_name \
     FROM information_schema.SCHEMATA ORDER BY SCHEMA_NAME";

const LIST_TABLES: &str = "SELECT CAST(TABLE_NAME AS CHAR) AS name, \
     CAST(TABLE_COMMENT AS CHAR) AS comment \
     FROM information_schema.TABLES \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
     ORDER BY TABLE_NAME";

const LIST_COLUMNS: &str = "SELECT CAST(COLUMN_NAME AS CHAR) AS name, \
     CAST(COLUMN_TYPE AS CHAR) AS column_type, \
     CAST(IS_NULLABLE AS CHAR) AS is_nullable, \
     CAST(COLUMN_DEFAULT AS CHAR) AS column_default, \
     CAST(COLUMN_COMMENT AS CHAR) AS column_comment, \
     CAST(EXTRA AS CHAR) AS extra \
     FROM information_schema.COLUMNS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
     ORDER BY ORDINAL_POSITION";

const LIST_INDEXES: &str = "SELECT CAST(INDEX_NAME AS CHAR) AS index_name, \
     CAST(COLUMN_NAME AS CHAR) AS column_name, \
     CAST(NON_UNIQUE AS SIGNED) AS non_unique, \
     CAST(INDEX_TYPE AS CHAR) AS index_type \
     FROM information_schema.STATISTICS \
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
     ORDER BY INDEX_NAME, SEQ_IN_INDEX";

/// MySQL / MariaDB reflection over `information_schema`.
#[derive(Debug, Clone)]
pub struct MySqlSource {
    pool: MySqlPool,
    scope: String,
}

impl MySqlSource {
    pub fn new(pool: MySqlPool, scope: impl Into<String>) -> Self {
        Self {
            pool,
            scope: scope.into(),
        }
    }
}

#[async_trait]
impl SchemaSource for MySqlSource {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>> {
        let rows = sqlx::query(LIST_DATABASES)
            .fetch_all(&self.pool)
            .await
            .map_err(unreachable(&self.scope))?;
        rows.iter()
            .map(|r| -> RowResult<DatabaseInfo> {
                Ok(DatabaseInfo {
                    name: r.try_get("name")?,
                    owner: None,
                    encoding: r.try_get("encoding")?,
                    collation: r.try_get("collation_name")?,
                })
            })
            .collect::<RowResult<_>>()
            .map_err(unreachable(&self.scope))
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>> {
        let rows = sqlx::query(LIST_TABLES)
            .fetch_all(&self.pool)
            .await
            .map_err(unreachable(&self.scope))?;
        rows.iter()
            .map(|r| -> RowResult<TableInfo> {
                Ok(TableInfo {
                    name: r.try_get("name")?,
                    comment: non_empty(r.try_get("comment")?),
                })
            })
            .collect::<RowResult<_>>()
            .map_err(unreachable(&self.scope))
    }

    async fn describe_table(&self, table: &str) -> Result<TableStructure> {
        let scope = format!("{}.{}", self.scope, table);
        let column_rows = sqlx::query(LIST_COLUMNS)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(unreachable(&scope))?;
        let columns = column_rows
            .iter()
            .map(|r| -> RowResult<ColumnInfo> {
                let extra: Option<String> = r.try_get("extra")?;
                let nullable: String = r.try_get("is_nullable")?;
                Ok(ColumnInfo {
                    name: r.try_get("name")?,
                    raw_type: r.try_get("column_type")?,
                    nullable: nullable.eq_ignore_ascii_case("YES"),
                    default: r.try_get("column_default")?,
                    comment: non_empty(r.try_get("column_comment")?),
                    autoincrement: extra
                        .unwrap_or_default()
                        .to_lowercase()
                        .contains("auto_increment"),
                })
            })
            .collect::<RowResult<Vec<_>>>()
            .map_err(unreachable(&scope))?;

        let index_rows = sqlx::query(LIST_INDEXES)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(unreachable(&scope))?;
        let raw = index_rows
            .iter()
            .map(|r| -> RowResult<(String, String, bool, Option<String>)> {
                let non_unique: i64 = r.try_get("non_unique")?;
                Ok((
                    r.try_get::<String, _>("index_name")?,
                    r.try_get::<String, _>("column_name")?,
                    non_unique == 0,
                    r.try_get::<Option<String>, _>("index_type")?,
                ))
            })
            .collect::<RowResult<Vec<_>>>()
            .map_err(unreachable(&scope))?;

        let (primary, secondary): (Vec<IndexInfo>, Vec<IndexInfo>) = group_indexes(raw)
            .into_iter()
            .partition(|i| i.name == "PRIMARY");
        Ok(TableStructure {
            columns,
            indexes: secondary,
            primary_key: primary.into_iter().flat_map(|i| i.columns).collect(),
        })
    }
}

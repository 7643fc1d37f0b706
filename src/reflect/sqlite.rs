use super::{
    group_indexes, unreachable, ColumnInfo, DatabaseInfo, RowResult, SchemaSource, TableInfo,
    TableStructure,
};
use crate::error::Result;
use crate::typemap::Dialect;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

const LIST_DATABASES: &str = "SELECT name, file FROM pragma_database_list ORDER BY seq";

const LIST_TABLES: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

const TABLE_INFO: &str =
    "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid";

const INDEX_LIST: &str =
    "SELECT name, \"unique\", origin FROM pragma_index_list(?1) ORDER BY seq";

const INDEX_INFO: &str = "SELECT name FROM pragma_index_info(?1) ORDER BY seqno";

/// SQLite reflection over `sqlite_master` and the `pragma_*` table functions.
///
/// SQLite keeps no table or column comments, so those are always `None`.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    pool: SqlitePool,
    scope: String,
}

impl SqliteSource {
    pub fn new(pool: SqlitePool, scope: impl Into<String>) -> Self {
        Self {
            pool,
            scope: scope.into(),
        }
    }
}

#[async_trait]
impl SchemaSource for SqliteSource {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
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
                    encoding: None,
                    collation: None,
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
                    comment: None,
                })
            })
            .collect::<RowResult<_>>()
            .map_err(unreachable(&self.scope))
    }

    async fn describe_table(&self, table: &str) -> Result<TableStructure> {
        let scope = format!("{}.{}", self.scope, table);
        let rows = sqlx::query(TABLE_INFO)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(unreachable(&scope))?;

        let parsed = rows
            .iter()
            .map(|r| -> RowResult<(ColumnInfo, i64)> {
                let not_null: i64 = r.try_get("notnull")?;
                let pk_pos: i64 = r.try_get("pk")?;
                Ok((
                    ColumnInfo {
                        name: r.try_get("name")?,
                        raw_type: r.try_get("type")?,
                        // SQLite lets non-INTEGER primary keys hold NULL, but
                        // generated code treats every key as required.
                        nullable: not_null == 0 && pk_pos == 0,
                        default: r.try_get("dflt_value")?,
                        comment: None,
                        autoincrement: false,
                    },
                    pk_pos,
                ))
            })
            .collect::<RowResult<Vec<_>>>()
            .map_err(unreachable(&scope))?;

        let mut pk: Vec<(i64, String)> = Vec::new();
        let mut columns = Vec::with_capacity(parsed.len());
        for (column, pk_pos) in parsed {
            if pk_pos > 0 {
                pk.push((pk_pos, column.name.clone()));
            }
            columns.push(column);
        }
        pk.sort_by_key(|(pos, _)| *pos);
        let primary_key: Vec<String> = pk.into_iter().map(|(_, n)| n).collect();

        // A lone INTEGER primary key aliases the rowid.
        if let [only] = primary_key.as_slice() {
            if let Some(col) = columns.iter_mut().find(|c| &c.name == only) {
                col.autoincrement = col.raw_type.eq_ignore_ascii_case("integer");
            }
        }

        let index_rows = sqlx::query(INDEX_LIST)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(unreachable(&scope))?;
        let listed = index_rows
            .iter()
            .map(|r| -> RowResult<(String, i64, String)> {
                Ok((r.try_get("name")?, r.try_get("unique")?, r.try_get("origin")?))
            })
            .collect::<RowResult<Vec<_>>>()
            .map_err(unreachable(&scope))?;

        let mut raw = Vec::new();
        for (name, unique, origin) in listed {
            if origin == "pk" {
                continue;
            }
            let members = sqlx::query(INDEX_INFO)
                .bind(&name)
                .fetch_all(&self.pool)
                .await
                .map_err(unreachable(&scope))?
                .iter()
                .map(|c| c.try_get::<Option<String>, _>("name"))
                .collect::<RowResult<Vec<_>>>()
                .map_err(unreachable(&scope))?;
            // Expression index members have no column name.
            for column in members.into_iter().flatten() {
                raw.push((name.clone(), column, unique != 0, None));
            }
        }

        Ok(TableStructure {
            columns,
            indexes: group_indexes(raw),
            primary_key,
        })
    }
}

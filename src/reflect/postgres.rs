use super::{
    group_indexes, non_empty, unreachable, ColumnInfo, DatabaseInfo, IndexInfo, RowResult,
    SchemaSource, TableInfo, TableStructure,
};
use crate::error::Result;
use crate::typemap::Dialect;
use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

const LIST_DATABASES: &str = "SELECT datname::text AS name, \
     pg_get_userbyid(datdba)::text AS owner, \
     pg_encoding_to_char(encoding)::text AS encoding, \
     datcollate::text AS collation_name \
     FROM pg_database WHERE NOT datistemplate ORDER BY datname";

const LIST_TABLES: &str = "SELECT c.relname::text AS name, \
     obj_description(c.oid, 'pg_class') AS comment \
     FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace \
     WHERE n.nspname = current_schema() AND c.relkind IN ('r', 'p') \
     ORDER BY c.relname";

const LIST_COLUMNS: &str = "SELECT a.attname::text AS name, \
     format_type(a.atttypid, a.atttypmod) AS column_type, \
     NOT a.attnotnull AS nullable, \
     pg_get_expr(d.adbin, d.adrelid) AS column_default, \
     col_description(a.attrelid, a.attnum) AS column_comment, \
     (a.attidentity <> '' OR COALESCE(pg_get_expr(d.adbin, d.adrelid), '') LIKE 'nextval(%') AS autoincrement \
     FROM pg_attribute a \
     LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
     WHERE a.attrelid = format('%I.%I', current_schema(), $1)::regclass \
       AND a.attnum > 0 AND NOT a.attisdropped \
     ORDER BY a.attnum";

const LIST_INDEXES: &str = "SELECT i.relname::text AS index_name, \
     a.attname::text AS column_name, \
     ix.indisunique AS is_unique, \
     ix.indisprimary AS is_primary, \
     am.amname::text AS index_type \
     FROM pg_index ix \
     JOIN pg_class i ON i.oid = ix.indexrelid \
     JOIN pg_am am ON am.oid = i.relam \
     CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord) \
     JOIN pg_attribute a ON a.attrelid = ix.indrelid AND a.attnum = k.attnum \
     WHERE ix.indrelid = format('%I.%I', current_schema(), $1)::regclass \
     ORDER BY i.relname, k.ord";

/// PostgreSQL reflection over `pg_catalog`, scoped to `current_schema()`.
#[derive(Debug, Clone)]
pub struct PostgresSource {
    pool: PgPool,
    scope: String,
}

impl PostgresSource {
    pub fn new(pool: PgPool, scope: impl Into<String>) -> Self {
        Self {
            pool,
            scope: scope.into(),
        }
    }
}

#[async_trait]
impl SchemaSource for PostgresSource {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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
                    owner: r.try_get("owner")?,
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
                Ok(ColumnInfo {
                    name: r.try_get("name")?,
                    raw_type: r.try_get("column_type")?,
                    nullable: r.try_get("nullable")?,
                    default: r.try_get("column_default")?,
                    comment: non_empty(r.try_get("column_comment")?),
                    autoincrement: r.try_get::<Option<bool>, _>("autoincrement")?.unwrap_or(false),
                })
            })
            .collect::<RowResult<Vec<_>>>()
            .map_err(unreachable(&scope))?;

        let index_rows = sqlx::query(LIST_INDEXES)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(unreachable(&scope))?;
        let mut primary_key = Vec::new();
        let mut raw = Vec::new();
        for r in &index_rows {
            let is_primary: bool = r.try_get("is_primary").map_err(unreachable(&scope))?;
            let column: String = r.try_get("column_name").map_err(unreachable(&scope))?;
            if is_primary {
                primary_key.push(column);
                continue;
            }
            raw.push((
                r.try_get::<String, _>("index_name")
                    .map_err(unreachable(&scope))?,
                column,
                r.try_get::<bool, _>("is_unique").map_err(unreachable(&scope))?,
                r.try_get::<Option<String>, _>("index_type")
                    .map_err(unreachable(&scope))?,
            ));
        }
        let indexes: Vec<IndexInfo> = group_indexes(raw);
        Ok(TableStructure {
            columns,
            indexes,
            primary_key,
        })
    }
}

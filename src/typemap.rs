//! # Type Mapper
//!
//! Maps a dialect-specific column type string (as reported by the reflector)
//! onto a generic [`StorageType`], and from there onto the type names used by
//! each generated backend and by the TypeScript frontend.
//!
//! ```text
//! ("postgresql", "character varying(255)") ──► StorageType::String ──► String / str / string
//! ("mysql", "decimal(10,2) unsigned")      ──► StorageType::Decimal ──► Decimal / Decimal / number
//! ```
//!
//! MySQL, MariaDB and SQLite share the MySQL-family table. PostgreSQL has its
//! own. Type parameters (`(255)`, `(10,2)`, `(6)` inside `timestamp(6) without
//! time zone`) are extracted into `length`/`scale` and removed before lookup.
//!
//! Unknown types fail with [`GenError::UnsupportedColumnType`]. Callers treat
//! that as fatal for the one column only.

use crate::error::{GenError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed length assigned to PostgreSQL columns recognised as embeddings.
pub const VECTOR_LENGTH: i64 = 2560;

static PARAMS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^)]*)\)").expect("type parameter regex should be valid"));
static SPACES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex should be valid"));

/// Database product whose introspection API and type system are in play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    #[serde(rename = "mysql", alias = "mariadb")]
    MySql,
    #[serde(rename = "postgresql", alias = "postgres", alias = "pgsql")]
    Postgres,
    #[serde(rename = "sqlite")]
    Sqlite,
}

/// Mapping family: SQLite borrows the MySQL rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectFamily {
    MySql,
    Postgres,
}

impl Dialect {
    pub fn family(self) -> DialectFamily {
        match self {
            Dialect::MySql | Dialect::Sqlite => DialectFamily::MySql,
            Dialect::Postgres => DialectFamily::Postgres,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgresql",
            Dialect::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgresql" | "postgres" | "pgsql" | "pg" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            _ => Err(GenError::UnsupportedDialect(s.to_string())),
        }
    }
}

/// Server-side language a GenTable targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Rust,
    Python,
    Java,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Rust => "rust",
            Backend::Python => "python",
            Backend::Java => "java",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rust" => Ok(Backend::Rust),
            "python" => Ok(Backend::Python),
            "java" => Ok(Backend::Java),
            _ => Err(GenError::UnsupportedBackend(s.to_string())),
        }
    }
}

/// Generic storage type, independent of dialect and target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageType {
    BigInteger,
    Integer,
    SmallInteger,
    Boolean,
    Float,
    Double,
    Decimal,
    String,
    Char,
    Text,
    Date,
    Time,
    DateTime,
    Timestamp,
    Json,
    Binary,
    Uuid,
    Enum,
    Vector,
}

impl StorageType {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageType::BigInteger => "BigInteger",
            StorageType::Integer => "Integer",
            StorageType::SmallInteger => "SmallInteger",
            StorageType::Boolean => "Boolean",
            StorageType::Float => "Float",
            StorageType::Double => "Double",
            StorageType::Decimal => "Decimal",
            StorageType::String => "String",
            StorageType::Char => "Char",
            StorageType::Text => "Text",
            StorageType::Date => "Date",
            StorageType::Time => "Time",
            StorageType::DateTime => "DateTime",
            StorageType::Timestamp => "Timestamp",
            StorageType::Json => "Json",
            StorageType::Binary => "Binary",
            StorageType::Uuid => "Uuid",
            StorageType::Enum => "Enum",
            StorageType::Vector => "Vector",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            StorageType::BigInteger
                | StorageType::Integer
                | StorageType::SmallInteger
                | StorageType::Float
                | StorageType::Double
                | StorageType::Decimal
        )
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            StorageType::Date | StorageType::Time | StorageType::DateTime | StorageType::Timestamp
        )
    }

    pub fn is_textual(self) -> bool {
        matches!(
            self,
            StorageType::String | StorageType::Char | StorageType::Text | StorageType::Enum
        )
    }

    /// Type name in the given backend's source code.
    pub fn target_type(self, backend: Backend) -> &'static str {
        match backend {
            Backend::Rust => self.rust_type(),
            Backend::Python => self.python_type(),
            Backend::Java => self.java_type(),
        }
    }

    pub fn rust_type(self) -> &'static str {
        match self {
            StorageType::BigInteger => "i64",
            StorageType::Integer => "i32",
            StorageType::SmallInteger => "i16",
            StorageType::Boolean => "bool",
            StorageType::Float => "f32",
            StorageType::Double => "f64",
            StorageType::Decimal => "Decimal",
            StorageType::String | StorageType::Char | StorageType::Text | StorageType::Enum => {
                "String"
            }
            StorageType::Date => "NaiveDate",
            StorageType::Time => "NaiveTime",
            StorageType::DateTime | StorageType::Timestamp => "NaiveDateTime",
            StorageType::Json => "serde_json::Value",
            StorageType::Binary => "Vec<u8>",
            StorageType::Uuid => "Uuid",
            StorageType::Vector => "Vec<f32>",
        }
    }

    pub fn python_type(self) -> &'static str {
        match self {
            StorageType::BigInteger | StorageType::Integer | StorageType::SmallInteger => "int",
            StorageType::Boolean => "bool",
            StorageType::Float | StorageType::Double => "float",
            StorageType::Decimal => "Decimal",
            StorageType::String | StorageType::Char | StorageType::Text | StorageType::Enum => {
                "str"
            }
            StorageType::Date => "date",
            StorageType::Time => "time",
            StorageType::DateTime | StorageType::Timestamp => "datetime",
            StorageType::Json => "dict",
            StorageType::Binary => "bytes",
            StorageType::Uuid => "UUID",
            StorageType::Vector => "List[float]",
        }
    }

    pub fn java_type(self) -> &'static str {
        match self {
            StorageType::BigInteger => "Long",
            StorageType::Integer | StorageType::SmallInteger => "Integer",
            StorageType::Boolean => "Boolean",
            StorageType::Float => "Float",
            StorageType::Double => "Double",
            StorageType::Decimal => "BigDecimal",
            StorageType::String | StorageType::Char | StorageType::Text | StorageType::Enum => {
                "String"
            }
            StorageType::Date => "Date",
            StorageType::Time => "LocalTime",
            StorageType::DateTime | StorageType::Timestamp => "LocalDateTime",
            StorageType::Json => "String",
            StorageType::Binary => "byte[]",
            StorageType::Uuid => "UUID",
            StorageType::Vector => "float[]",
        }
    }

    /// Type used in generated TypeScript.
    pub fn ts_type(self) -> &'static str {
        match self {
            t if t.is_numeric() => "number",
            StorageType::Boolean => "boolean",
            StorageType::Json => "Record<string, unknown>",
            StorageType::Vector => "number[]",
            _ => "string",
        }
    }

    /// Import line (or path) a backend needs to use this type, if any.
    pub fn import_for(self, backend: Backend) -> Option<&'static str> {
        match (backend, self) {
            (Backend::Rust, StorageType::Decimal) => Some("rust_decimal::Decimal"),
            (Backend::Rust, StorageType::Date) => Some("chrono::NaiveDate"),
            (Backend::Rust, StorageType::Time) => Some("chrono::NaiveTime"),
            (Backend::Rust, StorageType::DateTime | StorageType::Timestamp) => {
                Some("chrono::NaiveDateTime")
            }
            (Backend::Rust, StorageType::Uuid) => Some("uuid::Uuid"),
            (Backend::Python, StorageType::Decimal) => Some("from decimal import Decimal"),
            (Backend::Python, StorageType::Date) => Some("from datetime import date"),
            (Backend::Python, StorageType::Time) => Some("from datetime import time"),
            (Backend::Python, StorageType::DateTime | StorageType::Timestamp) => {
                Some("from datetime import datetime")
            }
            (Backend::Python, StorageType::Uuid) => Some("from uuid import UUID"),
            (Backend::Python, StorageType::Vector) => Some("from typing import List"),
            (Backend::Java, StorageType::Decimal) => Some("java.math.BigDecimal"),
            (Backend::Java, StorageType::Date) => Some("java.util.Date"),
            (Backend::Java, StorageType::Time) => Some("java.time.LocalTime"),
            (Backend::Java, StorageType::DateTime | StorageType::Timestamp) => {
                Some("java.time.LocalDateTime")
            }
            (Backend::Java, StorageType::Uuid) => Some("java.util.UUID"),
            _ => None,
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of mapping one reflected column type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedType {
    /// Normalised base type without parameters or modifiers, e.g. `varchar`.
    pub column_type: String,
    pub storage: StorageType,
    pub length: Option<i64>,
    pub scale: Option<i64>,
}

impl MappedType {
    pub fn target_type(&self, backend: Backend) -> &'static str {
        self.storage.target_type(backend)
    }

    pub fn ts_type(&self) -> &'static str {
        self.storage.ts_type()
    }
}

/// Map a raw column type for `dialect`.
///
/// # Errors
///
/// [`GenError::UnsupportedColumnType`] when the base type is not recognised.
pub fn map_type(dialect: Dialect, raw_type: &str) -> Result<MappedType> {
    let (base, params) = split_type(raw_type);
    let unsupported = || GenError::UnsupportedColumnType {
        dialect: dialect.to_string(),
        raw_type: raw_type.to_string(),
    };
    if base.is_empty() {
        return Err(unsupported());
    }
    let length = params.first().copied().flatten();
    let scale = params.get(1).copied().flatten();

    let storage = match dialect.family() {
        DialectFamily::MySql => mysql_storage(&base, length),
        DialectFamily::Postgres => postgres_storage(&base),
    }
    .ok_or_else(unsupported)?;

    Ok(MappedType {
        column_type: base,
        storage,
        length,
        scale,
    })
}

/// Map a column, applying the PostgreSQL embedding override by column name.
pub fn map_column(dialect: Dialect, column_name: &str, raw_type: &str) -> Result<MappedType> {
    if dialect.family() == DialectFamily::Postgres && is_embedding_column(column_name) {
        return Ok(MappedType {
            column_type: "vector".to_string(),
            storage: StorageType::Vector,
            length: Some(VECTOR_LENGTH),
            scale: None,
        });
    }
    map_type(dialect, raw_type)
}

fn is_embedding_column(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("vector") || lower.contains("embedding")
}

/// Split `decimal(10,2) unsigned` into (`decimal`, [Some(10), Some(2)]).
fn split_type(raw: &str) -> (String, Vec<Option<i64>>) {
    let lower = raw.trim().to_lowercase();
    let params: Vec<Option<i64>> = PARAMS
        .captures(&lower)
        .and_then(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .split(',')
                .map(|p| p.trim().parse::<i64>().ok())
                .collect()
        })
        .unwrap_or_default();
    let without = PARAMS.replace_all(&lower, " ");
    let base = without
        .split_whitespace()
        .filter(|w| !matches!(*w, "unsigned" | "signed" | "zerofill"))
        .collect::<Vec<_>>()
        .join(" ");
    (SPACES.replace_all(&base, " ").into_owned(), params)
}

fn mysql_storage(base: &str, length: Option<i64>) -> Option<StorageType> {
    let t = match base {
        "tinyint" if length == Some(1) => StorageType::Boolean,
        "tinyint" | "smallint" | "year" => StorageType::SmallInteger,
        "mediumint" | "int" | "integer" => StorageType::Integer,
        "bigint" => StorageType::BigInteger,
        "bit" if length.unwrap_or(1) == 1 => StorageType::Boolean,
        "bit" => StorageType::Binary,
        "bool" | "boolean" => StorageType::Boolean,
        "float" => StorageType::Float,
        "double" | "double precision" | "real" => StorageType::Double,
        "decimal" | "numeric" | "dec" | "fixed" => StorageType::Decimal,
        "char" | "nchar" => StorageType::Char,
        "varchar" | "nvarchar" | "character varying" | "varchar2" => StorageType::String,
        "tinytext" | "text" | "mediumtext" | "longtext" | "clob" => StorageType::Text,
        "date" => StorageType::Date,
        "time" => StorageType::Time,
        "datetime" => StorageType::DateTime,
        "timestamp" => StorageType::Timestamp,
        "json" => StorageType::Json,
        "binary" | "varbinary" | "blob" | "tinyblob" | "mediumblob" | "longblob" => {
            StorageType::Binary
        }
        "enum" | "set" => StorageType::Enum,
        _ => return None,
    };
    Some(t)
}

fn postgres_storage(base: &str) -> Option<StorageType> {
    if base.ends_with("[]") {
        return Some(StorageType::Json);
    }
    let t = match base {
        "smallint" | "int2" | "smallserial" | "serial2" => StorageType::SmallInteger,
        "integer" | "int" | "int4" | "serial" | "serial4" => StorageType::Integer,
        "bigint" | "int8" | "bigserial" | "serial8" => StorageType::BigInteger,
        "boolean" | "bool" => StorageType::Boolean,
        "real" | "float4" => StorageType::Float,
        "double precision" | "float8" | "float" => StorageType::Double,
        "numeric" | "decimal" | "money" => StorageType::Decimal,
        "character varying" | "varchar" | "inet" | "cidr" | "macaddr" => StorageType::String,
        "character" | "char" | "bpchar" => StorageType::Char,
        "text" | "citext" | "name" | "xml" => StorageType::Text,
        "date" => StorageType::Date,
        "time" | "time without time zone" | "time with time zone" | "timetz" => StorageType::Time,
        "timestamp" | "timestamp without time zone" => StorageType::DateTime,
        "timestamp with time zone" | "timestamptz" => StorageType::Timestamp,
        "json" | "jsonb" => StorageType::Json,
        "bytea" => StorageType::Binary,
        "uuid" => StorageType::Uuid,
        "vector" => StorageType::Vector,
        _ => return None,
    };
    Some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(d: &str, raw: &str) -> MappedType {
        map_type(d.parse().unwrap(), raw).unwrap()
    }

    #[test]
    fn test_postgres_varchar_is_deterministic() {
        let first = map("postgresql", "varchar(255)");
        for _ in 0..10 {
            assert_eq!(map("postgresql", "varchar(255)"), first);
        }
        assert_eq!(first.storage, StorageType::String);
        assert_eq!(first.length, Some(255));
        assert_eq!(first.target_type(Backend::Rust), "String");
        assert_eq!(first.ts_type(), "string");
    }

    #[test]
    fn test_embedding_column_forces_vector() {
        for raw in ["text", "bytea", "vector(1536)", "jsonb"] {
            let m = map_column(Dialect::Postgres, "embedding", raw).unwrap();
            assert_eq!(m.storage, StorageType::Vector);
            assert_eq!(m.length, Some(VECTOR_LENGTH));
        }
        let m = map_column(Dialect::Postgres, "doc_vector", "text").unwrap();
        assert_eq!(m.storage, StorageType::Vector);
    }

    #[test]
    fn test_embedding_override_is_postgres_only() {
        let m = map_column(Dialect::MySql, "embedding", "longtext").unwrap();
        assert_eq!(m.storage, StorageType::Text);
    }

    #[test]
    fn test_mysql_modifiers_and_params() {
        let m = map("mysql", "decimal(10,2) unsigned");
        assert_eq!(m.storage, StorageType::Decimal);
        assert_eq!((m.length, m.scale), (Some(10), Some(2)));
        assert_eq!(m.column_type, "decimal");

        assert_eq!(map("mysql", "tinyint(1)").storage, StorageType::Boolean);
        assert_eq!(map("mysql", "tinyint(4)").storage, StorageType::SmallInteger);
        assert_eq!(map("mysql", "BIGINT(20) UNSIGNED ZEROFILL").storage, StorageType::BigInteger);
        assert_eq!(map("mariadb", "enum('a','b')").storage, StorageType::Enum);
        assert_eq!(map("mariadb", "enum('a','b')").length, None);
    }

    #[test]
    fn test_sqlite_uses_mysql_rules() {
        assert_eq!(map("sqlite", "INTEGER").storage, StorageType::Integer);
        assert_eq!(map("sqlite", "VARCHAR(64)").length, Some(64));
        assert_eq!(map("sqlite", "DECIMAL(10,2)").storage, StorageType::Decimal);
    }

    #[test]
    fn test_postgres_params_inside_name() {
        let m = map("postgresql", "timestamp(6) without time zone");
        assert_eq!(m.storage, StorageType::DateTime);
        assert_eq!(m.column_type, "timestamp without time zone");
        assert_eq!(map("postgresql", "character varying(64)").storage, StorageType::String);
        assert_eq!(map("postgresql", "integer[]").storage, StorageType::Json);
    }

    #[test]
    fn test_unknown_type_reports_dialect_and_raw() {
        let err = map_type(Dialect::Postgres, "tsvector").unwrap_err();
        assert_eq!(
            err,
            GenError::UnsupportedColumnType {
                dialect: "postgresql".to_string(),
                raw_type: "tsvector".to_string(),
            }
        );
        assert!(map_type(Dialect::Sqlite, "").is_err());
    }

    #[test]
    fn test_unknown_dialect() {
        assert!(matches!(
            "oracle".parse::<Dialect>(),
            Err(GenError::UnsupportedDialect(_))
        ));
    }

    #[test]
    fn test_backend_imports() {
        assert_eq!(
            StorageType::Decimal.import_for(Backend::Java),
            Some("java.math.BigDecimal")
        );
        assert_eq!(StorageType::String.import_for(Backend::Rust), None);
        assert_eq!(StorageType::DateTime.target_type(Backend::Python), "datetime");
    }
}

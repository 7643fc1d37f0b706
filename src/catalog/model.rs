use crate::error::{GenError, Result};
use crate::typemap::{Backend, Dialect, StorageType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// A database server endpoint registered by an operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: i64,
    pub connection_name: String,
    pub database_type: Dialect,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Default database (MySQL/PostgreSQL) or database file (SQLite).
    pub connection_database: Option<String>,
    pub create_time: DateTime<Utc>,
}

impl Connection {
    /// Endpoint string with credentials stripped, safe for logs.
    pub fn endpoint(&self) -> String {
        match self.database_type {
            Dialect::Sqlite => format!(
                "sqlite://{}",
                self.connection_database.as_deref().unwrap_or("")
            ),
            dialect => format!(
                "{}://{}@{}:{}/{}",
                dialect,
                self.username.as_deref().unwrap_or(""),
                self.host.as_deref().unwrap_or("localhost"),
                self.port.map(|p| p.to_string()).unwrap_or_default(),
                self.connection_database.as_deref().unwrap_or("")
            ),
        }
    }
}

/// One catalog/schema inside a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    pub id: i64,
    pub connection_id: i64,
    pub database_name: String,
    pub owner: Option<String>,
    pub encoding: Option<String>,
    pub collation: Option<String>,
}

/// Mirror of one live table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTable {
    pub id: i64,
    pub database_id: i64,
    pub name: String,
    pub comment: Option<String>,
}

/// Mirror of one live column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaField {
    pub id: i64,
    pub table_id: i64,
    pub name: String,
    /// Raw type as reflected, e.g. `varchar(64)`.
    pub field_type: String,
    pub storage: StorageType,
    pub length: Option<i64>,
    pub scale: Option<i64>,
    pub default: Option<String>,
    pub comment: Option<String>,
    pub nullable: bool,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub sort: i32,
}

/// Mirror of one live index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaIndex {
    pub id: i64,
    pub table_id: i64,
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub index_type: Option<String>,
}

/// Template category of a GenTable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateCategory {
    #[serde(rename = "1")]
    Single,
    #[serde(rename = "2")]
    Relational,
    #[serde(rename = "3")]
    Tree,
}

impl TemplateCategory {
    pub fn code(self) -> &'static str {
        match self {
            TemplateCategory::Single => "1",
            TemplateCategory::Relational => "2",
            TemplateCategory::Tree => "3",
        }
    }
}

impl fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TemplateCategory::Single => "single",
            TemplateCategory::Relational => "relational",
            TemplateCategory::Tree => "tree",
        })
    }
}

impl FromStr for TemplateCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "single" | "crud" => Ok(TemplateCategory::Single),
            "2" | "relational" | "sub" => Ok(TemplateCategory::Relational),
            "3" | "tree" => Ok(TemplateCategory::Tree),
            other => Err(format!("unknown template category `{other}`")),
        }
    }
}

/// Category-specific generation options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenOptions {
    #[default]
    Single,
    /// Master/detail: `sub_table` rows reference this table through `fk`.
    Relational { sub_table: String, fk: String },
    /// Self-referencing tree keyed by `code`, linked by `parent_code`.
    Tree {
        code: String,
        parent_code: String,
        name: String,
    },
}

impl GenOptions {
    pub fn category(&self) -> TemplateCategory {
        match self {
            GenOptions::Single => TemplateCategory::Single,
            GenOptions::Relational { .. } => TemplateCategory::Relational,
            GenOptions::Tree { .. } => TemplateCategory::Tree,
        }
    }

    /// Parse the legacy `(category, options JSON)` pair.
    ///
    /// Relational options use `subTableName`/`subTableFkName`, tree options
    /// `treeCode`/`treeParentCode`/`treeName`.
    ///
    /// # Errors
    ///
    /// [`GenError::InvalidGenOptions`] for an unknown category, malformed JSON
    /// or missing keys.
    pub fn from_raw(category: &str, raw: Option<&str>, gen_table_id: i64) -> Result<Self> {
        let invalid = |reason: String| GenError::InvalidGenOptions {
            gen_table_id,
            reason,
        };
        let category: TemplateCategory = category.parse().map_err(invalid)?;
        if category == TemplateCategory::Single {
            return Ok(GenOptions::Single);
        }
        let raw = raw
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| invalid(format!("{category} generation requires options")))?;
        let value: Value =
            serde_json::from_str(raw).map_err(|e| invalid(format!("malformed options JSON: {e}")))?;
        let obj = value
            .as_object()
            .ok_or_else(|| invalid("options must be a JSON object".to_string()))?;
        let key = |k: &str| -> Result<String> {
            obj.get(k)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| invalid(format!("missing option `{k}`")))
        };
        let options = match category {
            TemplateCategory::Relational => GenOptions::Relational {
                sub_table: key("subTableName")?,
                fk: key("subTableFkName")?,
            },
            TemplateCategory::Tree => GenOptions::Tree {
                code: key("treeCode")?,
                parent_code: key("treeParentCode")?,
                name: key("treeName")?,
            },
            TemplateCategory::Single => GenOptions::Single,
        };
        Ok(options)
    }

    /// Reject empty names in well-typed options.
    pub fn validate(&self, gen_table_id: i64) -> Result<()> {
        let empty = match self {
            GenOptions::Single => None,
            GenOptions::Relational { sub_table, fk } => [("sub_table", sub_table), ("fk", fk)]
                .into_iter()
                .find(|(_, v)| v.trim().is_empty()),
            GenOptions::Tree {
                code,
                parent_code,
                name,
            } => [("code", code), ("parent_code", parent_code), ("name", name)]
                .into_iter()
                .find(|(_, v)| v.trim().is_empty()),
        };
        match empty {
            Some((k, _)) => Err(GenError::InvalidGenOptions {
                gen_table_id,
                reason: format!("`{k}` must not be empty"),
            }),
            None => Ok(()),
        }
    }

    /// Legacy key/value view exposed to templates.
    pub fn to_legacy_json(&self) -> Value {
        match self {
            GenOptions::Single => Value::Object(Map::new()),
            GenOptions::Relational { sub_table, fk } => json!({
                "subTableName": sub_table,
                "subTableFkName": fk,
            }),
            GenOptions::Tree {
                code,
                parent_code,
                name,
            } => json!({
                "treeCode": code,
                "treeParentCode": parent_code,
                "treeName": name,
            }),
        }
    }
}

/// Where generated output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenType {
    #[default]
    Zip,
    Path,
}

/// Operator-owned generation target bound to one MetaTable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenTable {
    pub id: i64,
    pub database_id: i64,
    pub db_table_id: i64,
    pub backend: Backend,
    /// Backend template flavour (`default`).
    pub backend_kind: String,
    /// Frontend template set (`react`).
    pub frontend_kind: String,
    pub options: GenOptions,
    pub class_name: String,
    pub package_name: String,
    pub module_name: String,
    pub business_name: String,
    pub function_name: String,
    pub function_author: String,
    pub gen_type: GenType,
    pub gen_path: String,
    pub comment: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl GenTable {
    pub fn category(&self) -> TemplateCategory {
        self.options.category()
    }
}

/// Comparison a generated query form applies to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryType {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Between,
}

/// Widget a generated form uses for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HtmlType {
    Input,
    Textarea,
    Number,
    Select,
    Radio,
    Checkbox,
    Switch,
    Datetime,
    ImageUpload,
    FileUpload,
    Editor,
}

impl HtmlType {
    /// Widgets backed by a dictionary of options.
    pub fn uses_dict(self) -> bool {
        matches!(self, HtmlType::Select | HtmlType::Radio | HtmlType::Checkbox)
    }
}

/// Operator-tunable generation flags for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenField {
    pub id: i64,
    pub gen_table_id: i64,
    pub db_field_id: i64,
    pub field_name: String,
    pub field_type: String,
    pub storage: StorageType,
    pub length: Option<i64>,
    pub scale: Option<i64>,
    pub sort: i32,
    pub default: Option<String>,
    pub primary_key: bool,
    pub nullable: bool,
    pub creatable: bool,
    pub queryable: bool,
    pub listed: bool,
    pub detailable: bool,
    pub updatable: bool,
    pub batch_updatable: bool,
    pub query_type: QueryType,
    pub html_type: HtmlType,
    pub dict_type: Option<String>,
    pub comment: Option<String>,
}

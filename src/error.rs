//! # Error Taxonomy
//!
//! Every failure the generation engine can surface is a [`GenError`]. Each
//! variant maps to one [`ErrorKind`] and can be flattened into a serialisable
//! [`ErrorReport`] (`{kind, message, context}`) for whatever boundary hands the
//! result to an operator.
//!
//! ## Propagation
//!
//! | Kind | Scope |
//! |------|-------|
//! | `SchemaUnreachable` | fatal for the current sync call, catalog untouched |
//! | `UnsupportedColumnType` | one column, skipped and reported |
//! | `MissingPrimaryKey` / `InvalidGenOptions` | one GenTable's context |
//! | `TemplateRenderError` | one template, siblings still render |
//! | `ResourceNotFound` | referenced row does not exist |
//! | `UnsupportedStyle` / `UnsupportedDialect` / `UnsupportedBackend` | caller or config error |

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Result alias used across the library.
pub type Result<T, E = GenError> = std::result::Result<T, E>;

/// Errors raised by reflection, synchronization and generation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenError {
    #[error("schema unreachable ({scope}): {reason}")]
    SchemaUnreachable { scope: String, reason: String },

    #[error("unsupported column type `{raw_type}` for dialect {dialect}")]
    UnsupportedColumnType { dialect: String, raw_type: String },

    #[error("gen table {gen_table_id} has no primary key field")]
    MissingPrimaryKey { gen_table_id: i64 },

    #[error("invalid generation options for gen table {gen_table_id}: {reason}")]
    InvalidGenOptions { gen_table_id: i64, reason: String },

    #[error("template `{template_id}` failed to render: {cause}")]
    TemplateRender { template_id: String, cause: String },

    #[error("{entity} {id} not found")]
    ResourceNotFound { entity: &'static str, id: i64 },

    #[error("unsupported naming style `{0}`")]
    UnsupportedStyle(String),

    #[error("unsupported dialect `{0}`")]
    UnsupportedDialect(String),

    #[error("unsupported backend `{0}`")]
    UnsupportedBackend(String),

    #[error("catalog persistence failed: {0}")]
    Catalog(String),

    #[error("archive packaging failed: {0}")]
    Archive(String),
}

/// Stable, machine-readable classification of a [`GenError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    SchemaUnreachable,
    UnsupportedColumnType,
    MissingPrimaryKey,
    InvalidGenOptions,
    TemplateRenderError,
    ResourceNotFound,
    UnsupportedStyle,
    UnsupportedDialect,
    UnsupportedBackend,
    CatalogError,
    ArchiveError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::SchemaUnreachable => "SchemaUnreachable",
            ErrorKind::UnsupportedColumnType => "UnsupportedColumnType",
            ErrorKind::MissingPrimaryKey => "MissingPrimaryKey",
            ErrorKind::InvalidGenOptions => "InvalidGenOptions",
            ErrorKind::TemplateRenderError => "TemplateRenderError",
            ErrorKind::ResourceNotFound => "ResourceNotFound",
            ErrorKind::UnsupportedStyle => "UnsupportedStyle",
            ErrorKind::UnsupportedDialect => "UnsupportedDialect",
            ErrorKind::UnsupportedBackend => "UnsupportedBackend",
            ErrorKind::CatalogError => "CatalogError",
            ErrorKind::ArchiveError => "ArchiveError",
        };
        f.write_str(s)
    }
}

/// Structured form of an error handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub context: BTreeMap<String, String>,
}

impl GenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenError::SchemaUnreachable { .. } => ErrorKind::SchemaUnreachable,
            GenError::UnsupportedColumnType { .. } => ErrorKind::UnsupportedColumnType,
            GenError::MissingPrimaryKey { .. } => ErrorKind::MissingPrimaryKey,
            GenError::InvalidGenOptions { .. } => ErrorKind::InvalidGenOptions,
            GenError::TemplateRender { .. } => ErrorKind::TemplateRenderError,
            GenError::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            GenError::UnsupportedStyle(_) => ErrorKind::UnsupportedStyle,
            GenError::UnsupportedDialect(_) => ErrorKind::UnsupportedDialect,
            GenError::UnsupportedBackend(_) => ErrorKind::UnsupportedBackend,
            GenError::Catalog(_) => ErrorKind::CatalogError,
            GenError::Archive(_) => ErrorKind::ArchiveError,
        }
    }

    /// Flatten into `{kind, message, context}`.
    pub fn report(&self) -> ErrorReport {
        let mut context = BTreeMap::new();
        match self {
            GenError::SchemaUnreachable { scope, reason } => {
                context.insert("scope".to_string(), scope.clone());
                context.insert("reason".to_string(), reason.clone());
            }
            GenError::UnsupportedColumnType { dialect, raw_type } => {
                context.insert("dialect".to_string(), dialect.clone());
                context.insert("raw_type".to_string(), raw_type.clone());
            }
            GenError::MissingPrimaryKey { gen_table_id } => {
                context.insert("gen_table_id".to_string(), gen_table_id.to_string());
            }
            GenError::InvalidGenOptions {
                gen_table_id,
                reason,
            } => {
                context.insert("gen_table_id".to_string(), gen_table_id.to_string());
                context.insert("reason".to_string(), reason.clone());
            }
            GenError::TemplateRender { template_id, cause } => {
                context.insert("template_id".to_string(), template_id.clone());
                context.insert("cause".to_string(), cause.clone());
            }
            GenError::ResourceNotFound { entity, id } => {
                context.insert("entity".to_string(), (*entity).to_string());
                context.insert("id".to_string(), id.to_string());
            }
            GenError::UnsupportedStyle(v)
            | GenError::UnsupportedDialect(v)
            | GenError::UnsupportedBackend(v) => {
                context.insert("value".to_string(), v.clone());
            }
            GenError::Catalog(_) | GenError::Archive(_) => {}
        }
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            context,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        GenError::ResourceNotFound { entity, id }
    }
}

impl From<&GenError> for ErrorReport {
    fn from(err: &GenError) -> Self {
        err.report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_error_report_names_template() {
        let err = GenError::TemplateRender {
            template_id: "react/page".to_string(),
            cause: "undefined value".to_string(),
        };
        let report = err.report();
        assert_eq!(report.kind, ErrorKind::TemplateRenderError);
        assert_eq!(report.context["template_id"], "react/page");
        assert!(report.message.contains("react/page"));
    }

    #[test]
    fn test_report_serializes_kind_as_string() {
        let report = GenError::MissingPrimaryKey { gen_table_id: 7 }.report();
        let json = serde_json::to_value(&report).unwrap_or_default();
        assert_eq!(json["kind"], "MissingPrimaryKey");
        assert_eq!(json["context"]["gen_table_id"], "7");
    }

    #[test]
    fn test_kind_display_matches_taxonomy() {
        assert_eq!(
            GenError::UnsupportedStyle("shout".into()).kind().to_string(),
            "UnsupportedStyle"
        );
        assert_eq!(
            GenError::not_found("GenTable", 1).kind(),
            ErrorKind::ResourceNotFound
        );
    }
}

//! # metagen
//!
//! **metagen** reflects live MySQL, PostgreSQL and SQLite schemas into a
//! metadata catalog and renders CRUD scaffolding (a Rust, Python or Java
//! backend plus a React/TypeScript frontend) for the tables an operator
//! imports.
//!
//! ## Architecture
//!
//! - **[`catalog`]** - Connections, mirrored databases/tables/fields/indexes and
//!   operator-owned generation settings, behind the [`catalog::Catalog`] trait
//! - **[`reflect`]** - Live schema introspection per dialect
//! - **[`engine`]** - Cached connection pools keyed by connection and database
//! - **[`sync`]** - Reconciles the catalog with the live schema
//! - **[`typemap`]** - Dialect column types to storage types and language types
//! - **[`naming`]** - Case styles and English inflection
//! - **[`generator`]** - Import, render context, templates, preview and archives
//! - **[`cli`]** - The `metagen` command line
//!
//! ### Generation Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Operator
//!     participant Sync as sync::Synchronizer
//!     participant Live as reflect::SchemaSource
//!     participant Catalog as catalog::Catalog
//!     participant Gen as generator::GeneratorService
//!     participant Tpl as generator::TemplateEngine
//!
//!     Operator->>Sync: sync_tables(database_id)
//!     Sync->>Live: list_tables()
//!     Live-->>Sync: Vec<TableInfo>
//!     Sync->>Catalog: apply_table_sync(add, update, remove)
//!     Operator->>Gen: import_tables(database_id, table_ids)
//!     Gen->>Sync: sync_fields(table_id)
//!     Sync->>Live: describe_table(name)
//!     Gen->>Catalog: insert_gen_table(table, fields)
//!     Operator->>Gen: download(ids)
//!     Gen->>Catalog: load GenTable, MetaFields, GenFields
//!     Gen->>Tpl: render(template, context) per template
//!     Tpl-->>Gen: files + per-template errors
//!     Gen-->>Operator: zip bytes + filename
//! ```
//!
//! ## Error Handling
//!
//! Library calls return [`error::Result`] with a [`error::GenError`]; every
//! error flattens into an [`error::ErrorReport`] for callers that need a
//! structured `{kind, message, context}` view. The binary wraps these in
//! `anyhow` with command context.
//!
//! ## Example
//!
//! ```rust,ignore
//! use metagen::cli::App;
//! use metagen::config::AppConfig;
//!
//! let app = App::from_config(&AppConfig::load(None)?)?;
//! let tables = app.service().synchronizer()
//!     .sync_tables(database_id, &Default::default(), Default::default())
//!     .await?;
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod generator;
pub mod ids;
pub mod logging;
pub mod naming;
pub mod reflect;
pub mod sync;
pub mod typemap;

pub use error::{ErrorKind, ErrorReport, GenError, Result};

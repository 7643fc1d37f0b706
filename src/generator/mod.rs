//! # Generator Module
//!
//! Turns imported tables into source files: GenTable defaults, render
//! contexts, template selection, rendering and zip packaging.
//!
//! ## Architecture
//!
//! ```text
//! MetaTable + MetaFields → init → GenTable + GenFields (operator edits)
//!         → context → TemplateRegistry::resolve → TemplateEngine → RenderOutcome
//!         → ArchiveWriter (download) | filesystem (write_to_dir)
//! ```
//!
//! ## Output Layout
//!
//! ```text
//! server/src/{model,schema,dao,service,controller}/   # Rust backend
//! main/app/{model,schema,mapper,service,controller}/  # Python backend
//! main/java/<package>/{domain,mapper,service,controller}/  # Java backend
//! src/app/(main)/<module>/<business>/                 # React pages and components
//! src/service/<business>.ts                           # API client
//! src/types/<business>.ts                             # TypeScript types
//! ```
//!
//! Multi-table downloads put each table's files under a directory named
//! after its class.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use metagen::generator::GeneratorService;
//!
//! let report = service.import_tables(database_id, &[table_id], None).await?;
//! let id = report.imported[0].id;
//! let preview = service.preview(id)?;
//! let download = service.download(&[id])?;
//! std::fs::write(&download.filename, &download.bytes)?;
//! ```
//!
//! ## Template Customization
//!
//! Built-in templates live in `templates/` and are compiled in. Set
//! `codegen.template_dir` (or `METAGEN_TEMPLATE_DIR`) to a directory with the
//! same layout to replace individual templates at startup.

mod archive;
mod context;
mod engine;
mod init;
mod render;
mod service;
mod templates;

pub use archive::{archive_filename, namespace_prefixes, ArchiveWriter};
pub use context::{
    build_context, ContextField, ContextInput, GenerationContext, SubContext, TreeContext,
};
pub use engine::{MiniJinjaEngine, TemplateEngine};
pub use init::{init_field, init_table};
pub use render::{derive_output_path, render_templates, RenderOutcome, RenderedFile};
pub use service::{
    Download, GenTableDetail, GenTableSummary, GeneratorService, ImportReport, WriteReport,
};
pub use templates::{Applies, TemplateRegistry, TemplateSpec};

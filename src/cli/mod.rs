//! # CLI Module
//!
//! Operator command line for the `metagen` binary. Every command works on
//! the catalog configured by `catalog.path` (or `METAGEN_CATALOG_PATH`);
//! without one, changes last for a single invocation.
//!
//! ## Commands
//!
//! | Command | Action |
//! |---------|--------|
//! | `connection add` / `connection list` | Register or list database connections |
//! | `sync databases` / `sync tables` / `sync fields` | Mirror live structure into the catalog |
//! | `import` | Create GenTables for MetaTables |
//! | `list` / `show` | Inspect imported tables |
//! | `delete` | Remove GenTables and their mirrored rows |
//! | `sync-table` | Rebuild one GenTable from the live schema |
//! | `preview` / `download` / `write` | Render code |
//! | `names` | Naming variants of a table name |
//!
//! ## Examples
//!
//! ```bash
//! export METAGEN_CATALOG_PATH=.metagen/catalog.json
//!
//! metagen connection add --name local --dialect sqlite --database app.db
//! metagen sync databases --connection <connection-id>
//! metagen sync tables --database <database-id> --exclude-imported
//! metagen import --database <database-id> --tables <table-id>,<table-id>
//! metagen download <gen-table-id> <gen-table-id> --output dist
//! ```

mod commands;


pub use commands::{
    execute, run_cli, App, Cli, Commands, ConnectionCommand, PageArgs, SyncCommand,
};

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::catalog::{
    Connection, GenField, GenOptions, GenTable, GenType, HtmlType, MemoryCatalog, QueryType,
};
use crate::error::ErrorKind;
use crate::reflect::fake::{column, users_structure, FakeSource};
use crate::typemap::{Backend, Dialect};
use chrono::Utc;

struct Fixture {
    schema: FakeSource,
    catalog: Arc<MemoryCatalog>,
    sync: Synchronizer,
    database_id: i64,
}

async fn fixture() -> Fixture {
    let schema = FakeSource::default();
    {
        let mut s = schema.0.lock();
        s.databases = vec!["app".into()];
        s.tables = vec!["orders".into(), "users".into()];
        s.structures.insert("users".into(), users_structure());
    }
    let catalog = Arc::new(MemoryCatalog::new());
    catalog
        .insert_connection(Connection {
            id: 1,
            connection_name: "local".into(),
            database_type: Dialect::Postgres,
            host: None,
            port: None,
            username: None,
            password: None,
            connection_database: None,
            create_time: Utc::now(),
        })
        .unwrap();
    let sync = Synchronizer::new(
        catalog.clone(),
        Arc::new(schema.clone()),
        Arc::new(IdGenerator::new(3)),
    );
    let dbs = sync.sync_databases(1, &PageQuery::all(), false).await.unwrap();
    let database_id = dbs.page.rows[0].id;
    Fixture {
        schema,
        catalog,
        sync,
        database_id,
    }
}

fn table_id(f: &Fixture, name: &str) -> i64 {
    f.catalog
        .tables_for(f.database_id)
        .unwrap()
        .into_iter()
        .find(|t| t.name == name)
        .unwrap()
        .id
}

#[tokio::test]
async fn test_sync_tables_is_idempotent() {
    let f = fixture().await;
    let first = f
        .sync
        .sync_tables(f.database_id, &PageQuery::all(), SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(first.report.added, 2);

    let second = f
        .sync
        .sync_tables(f.database_id, &PageQuery::all(), SyncOptions::default())
        .await
        .unwrap();
    assert!(second.report.is_noop());
    assert_eq!(first.page, second.page);
}

#[tokio::test]
async fn test_sync_fields_round_trip_and_idempotence() {
    let f = fixture().await;
    f.sync
        .sync_tables(f.database_id, &PageQuery::all(), SyncOptions::default())
        .await
        .unwrap();
    let users = table_id(&f, "users");

    let first = f.sync.sync_fields(users, &PageQuery::all(), false).await.unwrap();
    let names: Vec<&str> = first.page.rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["id", "name", "age"]);
    let pk: Vec<&str> = first
        .page
        .rows
        .iter()
        .filter(|r| r.primary_key)
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(pk, vec!["id"]);
    assert_eq!(first.page.rows[2].scale, Some(2));
    assert_eq!(f.catalog.indexes_for(users).unwrap().len(), 1);

    let second = f.sync.sync_fields(users, &PageQuery::all(), false).await.unwrap();
    assert!(second.report.is_noop());
    assert_eq!(first.page, second.page);
}

#[tokio::test]
async fn test_changed_column_is_updated_in_place() {
    let f = fixture().await;
    f.sync
        .sync_tables(f.database_id, &PageQuery::all(), SyncOptions::default())
        .await
        .unwrap();
    let users = table_id(&f, "users");
    let before = f.sync.sync_fields(users, &PageQuery::all(), false).await.unwrap();

    f.schema.0.lock().structures.get_mut("users").unwrap().columns[1].raw_type =
        "character varying(128)".into();
    let after = f.sync.sync_fields(users, &PageQuery::all(), false).await.unwrap();
    assert_eq!(after.report.updated, 1);
    assert_eq!(after.page.rows[1].id, before.page.rows[1].id);
    assert_eq!(after.page.rows[1].length, Some(128));
}

#[tokio::test]
async fn test_unsupported_column_is_skipped_and_reported() {
    let f = fixture().await;
    f.schema
        .0
        .lock()
        .structures
        .get_mut("users")
        .unwrap()
        .columns
        .push(column("location", "geography"));
    f.sync
        .sync_tables(f.database_id, &PageQuery::all(), SyncOptions::default())
        .await
        .unwrap();
    let users = table_id(&f, "users");
    let result = f.sync.sync_fields(users, &PageQuery::all(), false).await.unwrap();
    assert_eq!(result.page.total, 3);
    assert_eq!(result.report.skipped.len(), 1);
    assert_eq!(result.report.skipped[0].kind, ErrorKind::UnsupportedColumnType);
    assert_eq!(result.report.skipped[0].context["raw_type"], "geography");
}

#[tokio::test]
async fn test_embedding_column_maps_to_vector() {
    let f = fixture().await;
    f.schema
        .0
        .lock()
        .structures
        .get_mut("users")
        .unwrap()
        .columns
        .push(column("embedding", "text"));
    f.sync
        .sync_tables(f.database_id, &PageQuery::all(), SyncOptions::default())
        .await
        .unwrap();
    let users = table_id(&f, "users");
    let result = f.sync.sync_fields(users, &PageQuery::all(), false).await.unwrap();
    let embedding = result.page.rows.iter().find(|r| r.name == "embedding").unwrap();
    assert_eq!(embedding.storage, crate::typemap::StorageType::Vector);
    assert_eq!(embedding.length, Some(crate::typemap::VECTOR_LENGTH));
}

#[tokio::test]
async fn test_empty_reflection_does_not_wipe_catalog() {
    let f = fixture().await;
    f.sync
        .sync_tables(f.database_id, &PageQuery::all(), SyncOptions::default())
        .await
        .unwrap();
    f.schema.0.lock().tables.clear();

    let err = f
        .sync
        .sync_tables(f.database_id, &PageQuery::all(), SyncOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaUnreachable);
    assert_eq!(f.catalog.tables_for(f.database_id).unwrap().len(), 2);

    let accepted = f
        .sync
        .sync_tables(
            f.database_id,
            &PageQuery::all(),
            SyncOptions {
                allow_empty: true,
                ..SyncOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(accepted.report.removed, 2);
    assert_eq!(accepted.page.total, 0);
}

#[tokio::test]
async fn test_unreachable_schema_leaves_catalog_untouched() {
    let f = fixture().await;
    f.sync
        .sync_tables(f.database_id, &PageQuery::all(), SyncOptions::default())
        .await
        .unwrap();
    f.schema.0.lock().unreachable = true;
    let err = f
        .sync
        .sync_tables(f.database_id, &PageQuery::all(), SyncOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GenError::SchemaUnreachable { .. }));
    assert_eq!(f.catalog.tables_for(f.database_id).unwrap().len(), 2);
}

#[tokio::test]
async fn test_sync_tables_filters_and_excludes_imported() {
    let f = fixture().await;
    f.sync
        .sync_tables(f.database_id, &PageQuery::all(), SyncOptions::default())
        .await
        .unwrap();
    let users = table_id(&f, "users");
    let now = Utc::now();
    f.catalog
        .insert_gen_table(
            GenTable {
                id: 900,
                database_id: f.database_id,
                db_table_id: users,
                backend: Backend::Rust,
                backend_kind: "default".into(),
                frontend_kind: "react".into(),
                options: GenOptions::Single,
                class_name: "User".into(),
                package_name: "app".into(),
                module_name: "system".into(),
                business_name: "user".into(),
                function_name: "user".into(),
                function_author: "metagen".into(),
                gen_type: GenType::Zip,
                gen_path: "/".into(),
                comment: None,
                create_time: now,
                update_time: now,
            },
            vec![],
        )
        .unwrap();

    let importable = f
        .sync
        .sync_tables(
            f.database_id,
            &PageQuery::all(),
            SyncOptions {
                exclude_imported: true,
                ..SyncOptions::default()
            },
        )
        .await
        .unwrap();
    let names: Vec<&str> = importable.page.rows.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["orders"]);

    let searched = f
        .sync
        .sync_tables(
            f.database_id,
            &PageQuery::all().like(&["name", "comment"], "user"),
            SyncOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(searched.page.total, 1);
}

#[tokio::test]
async fn test_vanished_column_reports_orphaned_gen_field() {
    let f = fixture().await;
    f.sync
        .sync_tables(f.database_id, &PageQuery::all(), SyncOptions::default())
        .await
        .unwrap();
    let users = table_id(&f, "users");
    let fields = f.sync.sync_fields(users, &PageQuery::all(), false).await.unwrap().page.rows;
    let now = Utc::now();
    let gen_fields: Vec<GenField> = fields
        .iter()
        .enumerate()
        .map(|(i, m)| GenField {
            id: 700 + i as i64,
            gen_table_id: 901,
            db_field_id: m.id,
            field_name: m.name.clone(),
            field_type: m.field_type.clone(),
            storage: m.storage,
            length: m.length,
            scale: m.scale,
            sort: m.sort,
            default: None,
            primary_key: m.primary_key,
            nullable: m.nullable,
            creatable: true,
            queryable: false,
            listed: true,
            detailable: true,
            updatable: true,
            batch_updatable: false,
            query_type: QueryType::Eq,
            html_type: HtmlType::Input,
            dict_type: None,
            comment: None,
        })
        .collect();
    f.catalog
        .insert_gen_table(
            GenTable {
                id: 901,
                database_id: f.database_id,
                db_table_id: users,
                backend: Backend::Rust,
                backend_kind: "default".into(),
                frontend_kind: "react".into(),
                options: GenOptions::Single,
                class_name: "User".into(),
                package_name: "app".into(),
                module_name: "system".into(),
                business_name: "user".into(),
                function_name: "user".into(),
                function_author: "metagen".into(),
                gen_type: GenType::Zip,
                gen_path: "/".into(),
                comment: None,
                create_time: now,
                update_time: now,
            },
            gen_fields,
        )
        .unwrap();

    f.schema.0.lock().structures.get_mut("users").unwrap().columns.pop();
    let result = f.sync.sync_fields(users, &PageQuery::all(), false).await.unwrap();
    assert_eq!(result.report.removed, 1);
    assert_eq!(result.report.orphaned_gen_fields, vec![702]);
    assert_eq!(f.catalog.gen_fields_for(901).unwrap().len(), 3);
}

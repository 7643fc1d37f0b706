#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::error::GenError;
use crate::typemap::{Backend, Dialect, StorageType};
use chrono::Utc;
use serde_json::json;

fn connection(id: i64) -> Connection {
    Connection {
        id,
        connection_name: format!("conn-{id}"),
        database_type: Dialect::MySql,
        host: Some("db.internal".into()),
        port: Some(3306),
        username: Some("admin".into()),
        password: Some("hunter2".into()),
        connection_database: Some("app".into()),
        create_time: Utc::now(),
    }
}

fn database(id: i64, connection_id: i64, name: &str) -> Database {
    Database {
        id,
        connection_id,
        database_name: name.into(),
        owner: None,
        encoding: None,
        collation: None,
    }
}

fn table(id: i64, database_id: i64, name: &str) -> MetaTable {
    MetaTable {
        id,
        database_id,
        name: name.into(),
        comment: None,
    }
}

fn field(id: i64, table_id: i64, name: &str, sort: i32) -> MetaField {
    MetaField {
        id,
        table_id,
        name: name.into(),
        field_type: "bigint".into(),
        storage: StorageType::BigInteger,
        length: None,
        scale: None,
        default: None,
        comment: None,
        nullable: false,
        primary_key: sort == 0,
        autoincrement: false,
        sort,
    }
}

fn gen_table(id: i64, database_id: i64, db_table_id: i64) -> GenTable {
    GenTable {
        id,
        database_id,
        db_table_id,
        backend: Backend::Rust,
        backend_kind: "default".into(),
        frontend_kind: "react".into(),
        options: GenOptions::Single,
        class_name: "User".into(),
        package_name: "app".into(),
        module_name: "system".into(),
        business_name: "user".into(),
        function_name: "users".into(),
        function_author: "metagen".into(),
        gen_type: GenType::Zip,
        gen_path: "/".into(),
        comment: None,
        create_time: Utc::now(),
        update_time: Utc::now(),
    }
}

fn gen_field(id: i64, gen_table_id: i64, meta: &MetaField) -> GenField {
    GenField {
        id,
        gen_table_id,
        db_field_id: meta.id,
        field_name: meta.name.clone(),
        field_type: meta.field_type.clone(),
        storage: meta.storage,
        length: None,
        scale: None,
        sort: meta.sort,
        default: None,
        primary_key: meta.primary_key,
        nullable: meta.nullable,
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
    }
}

/// Two tables in one database, both imported.
fn seeded() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();
    catalog.insert_connection(connection(1)).unwrap();
    catalog
        .apply_database_sync(vec![database(10, 1, "app")], vec![])
        .unwrap();
    catalog
        .apply_table_sync(vec![table(100, 10, "users"), table(101, 10, "orders")], vec![], vec![])
        .unwrap();
    let users = vec![field(1000, 100, "id", 0), field(1001, 100, "name", 1)];
    let orders = vec![field(1010, 101, "id", 0)];
    catalog
        .apply_field_sync(FieldSyncBatch {
            add_fields: users.iter().chain(&orders).cloned().collect(),
            add_indexes: vec![MetaIndex {
                id: 5000,
                table_id: 100,
                name: "idx_name".into(),
                columns: vec!["name".into()],
                unique: true,
                index_type: None,
            }],
            ..Default::default()
        })
        .unwrap();
    catalog
        .insert_gen_table(
            gen_table(200, 10, 100),
            users.iter().enumerate().map(|(i, f)| gen_field(2000 + i as i64, 200, f)).collect(),
        )
        .unwrap();
    catalog
        .insert_gen_table(gen_table(201, 10, 101), vec![gen_field(2010, 201, &orders[0])])
        .unwrap();
    catalog
}

#[test]
fn test_lookup_missing_is_resource_not_found() {
    let catalog = MemoryCatalog::new();
    let err = catalog.get_gen_table(42).unwrap_err();
    assert_eq!(
        err,
        GenError::ResourceNotFound {
            entity: "GenTable",
            id: 42
        }
    );
}

#[test]
fn test_duplicate_database_name_rejected_atomically() {
    let catalog = MemoryCatalog::new();
    catalog.insert_connection(connection(1)).unwrap();
    catalog
        .apply_database_sync(vec![database(10, 1, "app")], vec![])
        .unwrap();
    let err = catalog
        .apply_database_sync(vec![database(11, 1, "new"), database(12, 1, "app")], vec![])
        .unwrap_err();
    assert!(matches!(err, GenError::Catalog(_)));
    // Neither row of the failed batch landed.
    assert_eq!(catalog.databases_for(1).unwrap().len(), 1);
}

#[test]
fn test_fields_come_back_in_sort_order() {
    let catalog = seeded();
    let names: Vec<String> = catalog
        .fields_for(100)
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["id", "name"]);
}

#[test]
fn test_table_sync_never_touches_gen_tables() {
    let catalog = seeded();
    catalog.apply_table_sync(vec![], vec![], vec![101]).unwrap();
    assert!(catalog.get_meta_table(101).is_err());
    assert!(catalog.fields_for(101).unwrap().is_empty());
    assert!(catalog.get_gen_table(201).is_ok());
    assert_eq!(catalog.gen_fields_for(201).unwrap().len(), 1);
}

#[test]
fn test_delete_gen_table_cascades_without_touching_siblings() {
    let catalog = seeded();
    let deleted = catalog.delete_gen_table(200).unwrap();
    assert_eq!(deleted.db_table_id, 100);

    assert!(catalog.get_meta_table(100).is_err());
    assert!(catalog.fields_for(100).unwrap().is_empty());
    assert!(catalog.indexes_for(100).unwrap().is_empty());
    assert!(catalog.gen_fields_for(200).unwrap().is_empty());

    assert!(catalog.get_gen_table(201).is_ok());
    assert!(catalog.get_meta_table(101).is_ok());
    assert_eq!(catalog.fields_for(101).unwrap().len(), 1);
    assert_eq!(catalog.gen_fields_for(201).unwrap().len(), 1);
}

fn users_mirror(table_id: i64, database_id: i64) -> TableMirror {
    TableMirror {
        table: table(table_id, database_id, "users"),
        fields: vec![
            field(table_id + 1, table_id, "id", 0),
            field(table_id + 2, table_id, "email", 1),
        ],
        indexes: vec![],
    }
}

#[test]
fn test_rebuild_gen_table_swaps_mirror() {
    let catalog = seeded();
    let mirror = users_mirror(700, 10);
    let fields = mirror.fields.iter().map(|f| gen_field(f.id + 100, 200, f)).collect();
    catalog
        .rebuild_gen_table(mirror, gen_table(200, 10, 700), fields)
        .unwrap();

    assert!(catalog.get_meta_table(100).is_err());
    assert!(catalog.indexes_for(100).unwrap().is_empty());
    assert_eq!(catalog.get_gen_table(200).unwrap().db_table_id, 700);
    let names: Vec<String> = catalog
        .gen_fields_for(200)
        .unwrap()
        .into_iter()
        .map(|g| g.field_name)
        .collect();
    assert_eq!(names, vec!["id", "email"]);
    assert_eq!(catalog.fields_for(700).unwrap().len(), 2);
    assert_eq!(catalog.gen_fields_for(201).unwrap().len(), 1);
}

#[test]
fn test_rebuild_gen_table_failure_changes_nothing() {
    let catalog = seeded();
    let mirror = users_mirror(700, 99);
    let fields = mirror.fields.iter().map(|f| gen_field(f.id + 100, 200, f)).collect();
    let err = catalog
        .rebuild_gen_table(mirror, gen_table(200, 99, 700), fields)
        .unwrap_err();
    assert_eq!(err, GenError::not_found("Database", 99));

    assert_eq!(catalog.get_gen_table(200).unwrap().db_table_id, 100);
    assert_eq!(catalog.gen_fields_for(200).unwrap().len(), 2);
    assert_eq!(catalog.fields_for(100).unwrap().len(), 2);
    assert_eq!(catalog.indexes_for(100).unwrap().len(), 1);
    assert!(catalog.get_meta_table(700).is_err());
}

#[test]
fn test_double_import_rejected() {
    let catalog = seeded();
    let err = catalog
        .insert_gen_table(gen_table(300, 10, 100), vec![])
        .unwrap_err();
    assert!(matches!(err, GenError::Catalog(_)));
}

#[test]
fn test_update_rejects_foreign_gen_field() {
    let catalog = seeded();
    let meta = field(1010, 101, "id", 0);
    let foreign = gen_field(2010, 201, &meta);
    let err = catalog
        .update_gen_table(gen_table(200, 10, 100), vec![foreign])
        .unwrap_err();
    assert!(matches!(err, GenError::Catalog(_)));
}

#[test]
fn test_paginate_filters_and_pages() {
    let catalog = seeded();
    let page = catalog
        .page_tables(&PageQuery::page(1, 1).eq("database_id", 10).order_by("name", false))
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].name, "orders");

    let second = catalog
        .page_tables(&PageQuery::page(2, 1).eq("database_id", 10).order_by("name", false))
        .unwrap();
    assert_eq!(second.rows[0].name, "users");

    let like = catalog
        .page_tables(&PageQuery::all().like(&["name", "comment"], "USE"))
        .unwrap();
    assert_eq!(like.total, 1);
    assert_eq!(like.rows[0].id, 100);
}

#[test]
fn test_paginate_ne_and_descending() {
    let rows = vec![json!({"id": 1}), json!({"id": 2}), json!({"id": 3})];
    let page = paginate(rows, &PageQuery::all().ne("id", 2).order_by("id", true));
    let ids: Vec<i64> = page.rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![3, 1]);
}

#[test]
fn test_paginate_far_past_the_end_is_empty() {
    let rows = vec![json!({"id": 1}), json!({"id": 2})];
    let page = paginate(rows, &PageQuery::page(usize::MAX, 50));
    assert_eq!(page.total, 2);
    assert!(page.rows.is_empty());
}

#[test]
fn test_snapshot_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    {
        let catalog = MemoryCatalog::open(&path).unwrap();
        catalog.insert_connection(connection(7)).unwrap();
    }
    assert!(path.exists());
    let reopened = MemoryCatalog::open(&path).unwrap();
    assert_eq!(reopened.get_connection(7).unwrap().connection_name, "conn-7");
}

#[test]
fn test_endpoint_hides_password() {
    let c = connection(1);
    let endpoint = c.endpoint();
    assert!(!endpoint.contains("hunter2"));
    assert!(endpoint.contains("db.internal:3306"));
}

#[test]
fn test_gen_options_from_raw() {
    let tree = GenOptions::from_raw(
        "3",
        Some(r#"{"treeCode":"id","treeParentCode":"parent_id","treeName":"name"}"#),
        9,
    )
    .unwrap();
    assert_eq!(tree.category(), TemplateCategory::Tree);

    let err = GenOptions::from_raw("2", Some("{not json"), 9).unwrap_err();
    assert!(matches!(err, GenError::InvalidGenOptions { gen_table_id: 9, .. }));

    let err = GenOptions::from_raw("2", Some(r#"{"subTableName":"items"}"#), 9).unwrap_err();
    assert!(err.to_string().contains("subTableFkName"));

    assert_eq!(GenOptions::from_raw("1", None, 9).unwrap(), GenOptions::Single);
}

#[test]
fn test_gen_options_validate_rejects_blank() {
    let opts = GenOptions::Relational {
        sub_table: "items".into(),
        fk: " ".into(),
    };
    assert!(opts.validate(1).is_err());
    assert_eq!(
        opts.to_legacy_json(),
        json!({"subTableName": "items", "subTableFkName": " "})
    );
}

#[test]
fn test_template_category_serializes_as_code() {
    assert_eq!(
        serde_json::to_value(TemplateCategory::Relational).unwrap(),
        json!("2")
    );
    assert_eq!("tree".parse::<TemplateCategory>().unwrap(), TemplateCategory::Tree);
}

//! Defaults stamped onto freshly imported GenTables and GenFields.

use crate::catalog::{
    GenField, GenOptions, GenTable, GenType, HtmlType, MetaField, MetaTable, QueryType,
};
use crate::config::CodegenConfig;
use crate::naming::NameVariants;
use crate::typemap::{Backend, StorageType};
use chrono::{DateTime, Utc};

/// Columns filled by the persistence layer, hidden from create/update forms.
const AUDIT_COLUMNS: &[&str] = &[
    "create_time",
    "update_time",
    "created_at",
    "updated_at",
    "create_by",
    "update_by",
    "deleted",
    "del_flag",
];

/// New GenTable for `table` with names derived from the table name.
pub fn init_table(
    id: i64,
    table: &MetaTable,
    backend: Backend,
    settings: &CodegenConfig,
    now: DateTime<Utc>,
) -> GenTable {
    let names = NameVariants::from_table(&table.name);
    let function_name = table
        .comment
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} management", names.pascal));
    GenTable {
        id,
        database_id: table.database_id,
        db_table_id: table.id,
        backend,
        backend_kind: "default".to_string(),
        frontend_kind: settings.frontend.clone(),
        options: GenOptions::Single,
        class_name: names.pascal.clone(),
        package_name: settings.package_name.clone(),
        module_name: settings.module_name.clone(),
        business_name: names.kebab,
        function_name,
        function_author: settings.author.clone(),
        gen_type: GenType::Zip,
        gen_path: "/".to_string(),
        comment: table.comment.clone(),
        create_time: now,
        update_time: now,
    }
}

/// New GenField for `field` under `gen_table_id`.
pub fn init_field(id: i64, gen_table_id: i64, field: &MetaField) -> GenField {
    let audit = AUDIT_COLUMNS.contains(&field.name.to_lowercase().as_str());
    let editable = !field.primary_key && !audit;
    let queryable = !field.primary_key
        && !audit
        && matches!(
            field.storage,
            StorageType::String | StorageType::Char | StorageType::Enum | StorageType::Boolean
        );
    let query_type = match field.storage {
        StorageType::String | StorageType::Char | StorageType::Text => QueryType::Like,
        t if t.is_temporal() => QueryType::Between,
        _ => QueryType::Eq,
    };
    GenField {
        id,
        gen_table_id,
        db_field_id: field.id,
        field_name: field.name.clone(),
        field_type: field.field_type.clone(),
        storage: field.storage,
        length: field.length,
        scale: field.scale,
        sort: field.sort,
        default: field.default.clone(),
        primary_key: field.primary_key,
        nullable: field.nullable,
        creatable: editable,
        queryable,
        listed: !matches!(
            field.storage,
            StorageType::Text | StorageType::Binary | StorageType::Json | StorageType::Vector
        ),
        detailable: true,
        updatable: editable,
        batch_updatable: false,
        query_type,
        html_type: html_type_for(field),
        dict_type: None,
        comment: field.comment.clone(),
    }
}

fn html_type_for(field: &MetaField) -> HtmlType {
    match field.storage {
        StorageType::Boolean => HtmlType::Switch,
        StorageType::Text | StorageType::Json => HtmlType::Textarea,
        StorageType::Enum => HtmlType::Select,
        t if t.is_temporal() => HtmlType::Datetime,
        t if t.is_numeric() => HtmlType::Number,
        _ => HtmlType::Input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(name: &str, storage: StorageType, primary_key: bool) -> MetaField {
        MetaField {
            id: 1,
            table_id: 2,
            name: name.into(),
            field_type: "x".into(),
            storage,
            length: None,
            scale: None,
            default: None,
            comment: None,
            nullable: !primary_key,
            primary_key,
            autoincrement: primary_key,
            sort: 0,
        }
    }

    #[test]
    fn test_table_defaults_from_name() {
        let table = MetaTable {
            id: 5,
            database_id: 6,
            name: "sys_dict_types".into(),
            comment: None,
        };
        let g = init_table(9, &table, Backend::Python, &CodegenConfig::default(), Utc::now());
        assert_eq!(g.class_name, "SysDictType");
        assert_eq!(g.business_name, "sys-dict-type");
        assert_eq!(g.function_name, "SysDictType management");
        assert_eq!(g.db_table_id, 5);
        assert_eq!(g.options, GenOptions::Single);
    }

    #[test]
    fn test_comment_becomes_function_name() {
        let table = MetaTable {
            id: 5,
            database_id: 6,
            name: "users".into(),
            comment: Some("User accounts".into()),
        };
        let g = init_table(9, &table, Backend::Rust, &CodegenConfig::default(), Utc::now());
        assert_eq!(g.function_name, "User accounts");
    }

    #[test]
    fn test_primary_key_not_editable() {
        let f = init_field(1, 2, &meta("id", StorageType::BigInteger, true));
        assert!(!f.creatable);
        assert!(!f.updatable);
        assert!(f.primary_key);
        assert_eq!(f.html_type, HtmlType::Number);
    }

    #[test]
    fn test_widgets_and_operators_by_storage() {
        let name = init_field(1, 2, &meta("name", StorageType::String, false));
        assert_eq!(name.query_type, QueryType::Like);
        assert_eq!(name.html_type, HtmlType::Input);
        assert!(name.queryable);

        let created = init_field(1, 2, &meta("create_time", StorageType::DateTime, false));
        assert_eq!(created.html_type, HtmlType::Datetime);
        assert_eq!(created.query_type, QueryType::Between);
        assert!(!created.creatable);

        let flag = init_field(1, 2, &meta("enabled", StorageType::Boolean, false));
        assert_eq!(flag.html_type, HtmlType::Switch);

        let body = init_field(1, 2, &meta("body", StorageType::Text, false));
        assert_eq!(body.html_type, HtmlType::Textarea);
        assert!(!body.listed);
    }
}

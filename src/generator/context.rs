//! # Generation Context
//!
//! Everything a template can see for one GenTable, assembled from the
//! GenTable, its bound MetaTable, the MetaFields paired with their GenField
//! flags, and the table's indexes.
//!
//! | Key | Contents |
//! |-----|----------|
//! | `license` | License header for the configured author, empty when disabled |
//! | `names` | [`NameVariants`] of the table name |
//! | `pk` | The primary-key field |
//! | `fields` | Every paired field, in column order |
//! | `imports` | Sorted import set for the GenTable's backend |
//! | `permission_prefix` | `module:business` |
//! | `dicts` | Dictionary types used by select/radio/checkbox widgets |
//! | `tree` / `sub` | Category-specific linkage, `none` otherwise |

use crate::catalog::{
    GenField, GenOptions, GenTable, HtmlType, MetaField, MetaIndex, MetaTable, QueryType,
};
use crate::config::CodegenConfig;
use crate::error::{GenError, Result};
use crate::naming::{to_camel, to_pascal, to_plural, NameVariants};
use crate::typemap::{Backend, StorageType};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

const LICENSE: &str = "Copyright (c) {year} {author} and/or its affiliates. All rights reserved.

Licensed under the Apache License, Version 2.0 (the \"License\");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an \"AS IS\" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.";

/// One MetaField paired with its GenField flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextField {
    pub name: String,
    pub camel: String,
    pub pascal: String,
    /// Raw column type as reflected.
    pub column_type: String,
    pub storage: StorageType,
    pub target_type: String,
    pub ts_type: String,
    pub length: Option<i64>,
    pub scale: Option<i64>,
    pub default: Option<String>,
    pub comment: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub sort: i32,
    pub creatable: bool,
    pub queryable: bool,
    pub listed: bool,
    pub detailable: bool,
    pub updatable: bool,
    pub batch_updatable: bool,
    pub query_type: QueryType,
    pub html_type: HtmlType,
    pub dict_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeContext {
    pub code: String,
    pub parent_code: String,
    pub name: String,
    pub code_camel: String,
    pub parent_code_camel: String,
    pub name_camel: String,
    /// Index among all fields of the first listed non-key field.
    pub expand_column: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubContext {
    pub table_name: String,
    pub fk: String,
    pub fk_camel: String,
    pub fk_pascal: String,
    pub names: NameVariants,
}

/// Render context for one GenTable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationContext {
    pub gen_table_id: i64,
    pub license: String,
    pub author: String,
    pub datetime: String,
    pub backend: Backend,
    pub category: String,
    pub package_name: String,
    pub module_name: String,
    pub business_name: String,
    pub function_name: String,
    pub class_name: String,
    pub table_name: String,
    pub table_comment: String,
    pub names: NameVariants,
    pub pk: ContextField,
    pub pk_plural: String,
    pub fields: Vec<ContextField>,
    pub indexes: Vec<MetaIndex>,
    pub imports: Vec<String>,
    pub permission_prefix: String,
    pub dicts: Vec<String>,
    pub options: Value,
    pub tree: Option<TreeContext>,
    pub sub: Option<SubContext>,
}

/// Rows a context is built from.
#[derive(Debug, Clone, Copy)]
pub struct ContextInput<'a> {
    pub table: &'a GenTable,
    pub meta_table: &'a MetaTable,
    pub meta_fields: &'a [MetaField],
    pub gen_fields: &'a [GenField],
    pub indexes: &'a [MetaIndex],
}

/// Assemble the render context.
///
/// GenFields whose MetaField is gone are ignored.
///
/// # Errors
///
/// - [`GenError::InvalidGenOptions`] if the category options are incomplete
/// - [`GenError::MissingPrimaryKey`] if no paired field is flagged as key
pub fn build_context(
    input: ContextInput<'_>,
    settings: &CodegenConfig,
    today: NaiveDate,
) -> Result<GenerationContext> {
    let table = input.table;
    table.options.validate(table.id)?;

    let meta_by_id: HashMap<i64, &MetaField> =
        input.meta_fields.iter().map(|f| (f.id, f)).collect();
    let mut paired: Vec<(&GenField, &MetaField)> = Vec::with_capacity(input.gen_fields.len());
    for gen_field in input.gen_fields {
        match meta_by_id.get(&gen_field.db_field_id) {
            Some(meta) => paired.push((gen_field, *meta)),
            None => debug!(
                gen_table_id = table.id,
                gen_field_id = gen_field.id,
                "ignoring orphaned gen field"
            ),
        }
    }
    paired.sort_by_key(|(_, meta)| meta.sort);

    let fields: Vec<ContextField> = paired
        .iter()
        .map(|(gen_field, meta)| context_field(gen_field, meta, table.backend))
        .collect();

    let mut keys = fields.iter().filter(|f| f.primary_key);
    let pk = keys
        .next()
        .cloned()
        .ok_or(GenError::MissingPrimaryKey {
            gen_table_id: table.id,
        })?;
    if keys.next().is_some() {
        warn!(
            gen_table_id = table.id,
            pk = %pk.name,
            "composite primary key, templates see the first column only"
        );
    }

    let imports: BTreeSet<String> = fields
        .iter()
        .filter_map(|f| f.storage.import_for(table.backend))
        .map(str::to_string)
        .collect();
    let dicts: BTreeSet<String> = fields
        .iter()
        .filter(|f| f.html_type.uses_dict())
        .filter_map(|f| f.dict_type.clone())
        .filter(|d| !d.trim().is_empty())
        .collect();

    let tree = match &table.options {
        GenOptions::Tree {
            code,
            parent_code,
            name,
        } => Some(TreeContext {
            code: code.clone(),
            parent_code: parent_code.clone(),
            name: name.clone(),
            code_camel: to_camel(code),
            parent_code_camel: to_camel(parent_code),
            name_camel: to_camel(name),
            expand_column: fields
                .iter()
                .position(|f| f.listed && !f.primary_key)
                .unwrap_or(0),
        }),
        _ => None,
    };
    let sub = match &table.options {
        GenOptions::Relational { sub_table, fk } => Some(SubContext {
            table_name: sub_table.clone(),
            fk: fk.clone(),
            fk_camel: to_camel(fk),
            fk_pascal: to_pascal(fk),
            names: NameVariants::from_table(sub_table),
        }),
        _ => None,
    };

    let author = to_pascal(&table.function_author);
    let license = if settings.license {
        LICENSE
            .replace("{year}", &today.year().to_string())
            .replace("{author}", &author)
    } else {
        String::new()
    };

    Ok(GenerationContext {
        gen_table_id: table.id,
        license,
        author,
        datetime: today.format("%Y-%m-%d").to_string(),
        backend: table.backend,
        category: table.category().to_string(),
        package_name: table.package_name.clone(),
        module_name: non_empty_or(&table.module_name, &settings.module_name),
        business_name: table.business_name.clone(),
        function_name: table.function_name.clone(),
        class_name: table.class_name.clone(),
        table_name: input.meta_table.name.clone(),
        table_comment: input.meta_table.comment.clone().unwrap_or_default(),
        names: NameVariants::from_table(&input.meta_table.name),
        pk_plural: to_plural(&pk.name),
        pk,
        fields,
        indexes: input.indexes.to_vec(),
        imports: imports.into_iter().collect(),
        permission_prefix: format!(
            "{}:{}",
            non_empty_or(&table.module_name, &settings.module_name),
            table.business_name
        ),
        dicts: dicts.into_iter().collect(),
        options: table.options.to_legacy_json(),
        tree,
        sub,
    })
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn context_field(flags: &GenField, meta: &MetaField, backend: Backend) -> ContextField {
    ContextField {
        name: meta.name.clone(),
        camel: to_camel(&meta.name),
        pascal: to_pascal(&meta.name),
        column_type: meta.field_type.clone(),
        storage: meta.storage,
        target_type: meta.storage.target_type(backend).to_string(),
        ts_type: meta.storage.ts_type().to_string(),
        length: meta.length,
        scale: meta.scale,
        default: meta.default.clone(),
        comment: flags
            .comment
            .clone()
            .or_else(|| meta.comment.clone())
            .unwrap_or_else(|| meta.name.clone()),
        nullable: meta.nullable,
        primary_key: flags.primary_key,
        autoincrement: meta.autoincrement,
        sort: meta.sort,
        creatable: flags.creatable,
        queryable: flags.queryable,
        listed: flags.listed,
        detailable: flags.detailable,
        updatable: flags.updatable,
        batch_updatable: flags.batch_updatable,
        query_type: flags.query_type,
        html_type: flags.html_type,
        dict_type: flags.dict_type.clone(),
    }
}

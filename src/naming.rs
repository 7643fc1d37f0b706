//! # Naming Converter
//!
//! Pure string transforms used to derive class, file, route and variable
//! names from raw table identifiers.
//!
//! ## Styles
//!
//! | Style | Aliases | `sys_user_role` |
//! |-------|---------|-----------------|
//! | singular | `sing` | `sys_user_role` |
//! | plural | `plur` | `sys_user_roles` |
//! | camel | `camelcase` | `sysUserRole` |
//! | pascal | `pascalcase`, `pascal_case` | `SysUserRole` |
//! | snake | `snakecase`, `snake_case` | `sys_user_role` |
//! | kebab | `kebabcase`, `kebab-case` | `sys-user-role` |
//! | upper | `uppercase` | `SYS_USER_ROLE` |
//! | lower | `lowercase` | `sys_user_role` |
//!
//! Case styles first clean the input (hyphens and whitespace become `_`, any
//! other non-alphanumeric character is dropped) and then re-split on
//! underscores and camel-case boundaries. Singular and plural use English
//! inflection, so irregular nouns round-trip (`child` → `children` → `child`).
//!
//! Everything here is stateless and safe to call from any thread.

use crate::error::{GenError, Result};
use heck::{ToKebabCase, ToLowerCamelCase, ToPascalCase, ToSnakeCase};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::str::FromStr;

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-\s]").expect("separator regex should be valid"));
static DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_]").expect("identifier regex should be valid"));

/// A naming style accepted by [`convert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameStyle {
    Singular,
    Plural,
    Camel,
    Pascal,
    Snake,
    Kebab,
    Upper,
    Lower,
}

impl FromStr for NameStyle {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "singular" | "sing" => Ok(NameStyle::Singular),
            "plural" | "plur" => Ok(NameStyle::Plural),
            "camel" | "camelcase" => Ok(NameStyle::Camel),
            "pascal" | "pascalcase" | "pascal_case" => Ok(NameStyle::Pascal),
            "snake" | "snakecase" | "snake_case" => Ok(NameStyle::Snake),
            "kebab" | "kebabcase" | "kebab-case" => Ok(NameStyle::Kebab),
            "upper" | "uppercase" => Ok(NameStyle::Upper),
            "lower" | "lowercase" => Ok(NameStyle::Lower),
            _ => Err(GenError::UnsupportedStyle(s.to_string())),
        }
    }
}

/// Convert `name` into `style`. Empty input is returned unchanged.
pub fn convert(name: &str, style: NameStyle) -> String {
    if name.is_empty() {
        return String::new();
    }
    match style {
        NameStyle::Singular => to_singular(name),
        NameStyle::Plural => to_plural(name),
        NameStyle::Camel => to_camel(name),
        NameStyle::Pascal => to_pascal(name),
        NameStyle::Snake => to_snake(name),
        NameStyle::Kebab => to_kebab(name),
        NameStyle::Upper => name.to_uppercase(),
        NameStyle::Lower => name.to_lowercase(),
    }
}

/// Convert using a style given by name.
///
/// # Errors
///
/// Returns [`GenError::UnsupportedStyle`] for an unknown style name.
pub fn convert_named(name: &str, style: &str) -> Result<String> {
    Ok(convert(name, style.parse()?))
}

pub fn to_singular(word: &str) -> String {
    pluralizer::pluralize(word, 1, false)
}

pub fn to_plural(word: &str) -> String {
    pluralizer::pluralize(word, 2, false)
}

pub fn to_camel(s: &str) -> String {
    clean(s).to_lower_camel_case()
}

pub fn to_pascal(s: &str) -> String {
    clean(s).to_pascal_case()
}

pub fn to_snake(s: &str) -> String {
    clean(s).to_snake_case()
}

pub fn to_kebab(s: &str) -> String {
    clean(s).to_kebab_case()
}

fn clean(s: &str) -> Cow<'_, str> {
    match SEPARATORS.replace_all(s, "_") {
        Cow::Borrowed(b) => DISALLOWED.replace_all(b, ""),
        Cow::Owned(o) => Cow::Owned(DISALLOWED.replace_all(&o, "").into_owned()),
    }
}

/// Every naming variant the templates use for one table.
///
/// `raw` is the singular form of the table name; the short keys mirror the
/// template variables (`cN` = lowerCamel, `CN` = Pascal, `c_n` = snake and the
/// `s` suffix for plurals).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameVariants {
    pub raw: String,
    pub camel: String,
    pub pascal: String,
    pub snake: String,
    pub kebab: String,
    pub snake_plural: String,
    pub camel_plural: String,
    pub pascal_plural: String,
    pub kebab_plural: String,
    pub upper: String,
}

impl NameVariants {
    pub fn from_table(table_name: &str) -> Self {
        let raw = to_singular(table_name);
        let plural = to_plural(&raw);
        Self {
            camel: to_camel(&raw),
            pascal: to_pascal(&raw),
            snake: to_snake(&raw),
            kebab: to_kebab(&raw),
            snake_plural: to_snake(&plural),
            camel_plural: to_camel(&plural),
            pascal_plural: to_pascal(&plural),
            kebab_plural: to_kebab(&plural),
            upper: to_snake(&raw).to_uppercase(),
            raw,
        }
    }
}

//! # Application Configuration
//!
//! Settings for code generation, catalog persistence, the engine cache and
//! the synchronizer. Loaded from a YAML (`.yaml`/`.yml`) or TOML (`.toml`)
//! file, then overridden from the environment.
//!
//! ## Example (`metagen.yaml`)
//!
//! ```yaml
//! codegen:
//!   language: rust
//!   author: acme
//!   package_name: app
//!   module_name: system
//! catalog:
//!   path: ./catalog.json
//! engine:
//!   max_connections: 4
//! sync:
//!   allow_empty_schema: false
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `METAGEN_CODEGEN_LANGUAGE` | `codegen.language` |
//! | `METAGEN_AUTHOR` | `codegen.author` |
//! | `METAGEN_MODULE_NAME` | `codegen.module_name` |
//! | `METAGEN_CATALOG_PATH` | `catalog.path` |
//! | `METAGEN_WORKER_ID` | `catalog.worker_id` |
//! | `METAGEN_TEMPLATE_DIR` | `codegen.template_dir` |
//! | `METAGEN_ALLOW_EMPTY_SCHEMA` | `sync.allow_empty_schema` |

use crate::typemap::Backend;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub codegen: CodegenConfig,
    pub catalog: CatalogConfig,
    pub engine: EngineConfig,
    pub sync: SyncConfig,
}

/// Defaults stamped onto newly imported GenTables and into every context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// The configured code-generation language. Backend templates render only
    /// for GenTables whose backend matches it.
    pub language: Backend,
    pub author: String,
    pub package_name: String,
    pub module_name: String,
    /// Frontend template set (`react`).
    pub frontend: String,
    /// Prepend the license header to generated files.
    pub license: bool,
    /// Directory whose files replace built-in templates of the same id.
    pub template_dir: Option<PathBuf>,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            language: Backend::Rust,
            author: "metagen".to_string(),
            package_name: "app".to_string(),
            module_name: "system".to_string(),
            frontend: "react".to_string(),
            license: true,
            template_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON snapshot file. `None` keeps the catalog in memory only.
    pub path: Option<PathBuf>,
    /// Worker id for the snowflake generator (0..1024).
    pub worker_id: u16,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: None,
            worker_id: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_connections: 4,
            acquire_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Accept an empty reflection as "the schema really has no tables".
    pub allow_empty_schema: bool,
}

impl AppConfig {
    /// Load from `path` (if given and present) and apply env overrides.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read, has an unknown extension or does
    /// not parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => Self::from_file(p)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)
                .with_context(|| format!("invalid YAML config {}", path.display())),
            Some("toml") => {
                toml::from_str(&raw).with_context(|| format!("invalid TOML config {}", path.display()))
            }
            other => bail!("unsupported config extension {:?} for {}", other, path.display()),
        }
    }

    /// Apply `METAGEN_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(lang) = lookup("METAGEN_CODEGEN_LANGUAGE") {
            self.codegen.language = lang.parse()?;
        }
        if let Some(author) = lookup("METAGEN_AUTHOR") {
            self.codegen.author = author;
        }
        if let Some(module) = lookup("METAGEN_MODULE_NAME") {
            self.codegen.module_name = module;
        }
        if let Some(dir) = lookup("METAGEN_TEMPLATE_DIR") {
            self.codegen.template_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = lookup("METAGEN_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(path));
        }
        if let Some(worker) = lookup("METAGEN_WORKER_ID") {
            self.catalog.worker_id = worker
                .parse()
                .with_context(|| format!("METAGEN_WORKER_ID is not a number: {worker}"))?;
        }
        if let Some(allow) = lookup("METAGEN_ALLOW_EMPTY_SCHEMA") {
            self.sync.allow_empty_schema = matches!(allow.as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.codegen.language, Backend::Rust);
        assert_eq!(cfg.codegen.module_name, "system");
        assert!(!cfg.sync.allow_empty_schema);
        assert!(cfg.catalog.path.is_none());
    }

    #[test]
    fn test_yaml_and_toml_files() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("metagen.yaml");
        fs::write(&yaml, "codegen:\n  language: python\n  author: acme\n").unwrap();
        let cfg = AppConfig::from_file(&yaml).unwrap();
        assert_eq!(cfg.codegen.language, Backend::Python);
        assert_eq!(cfg.codegen.author, "acme");
        assert_eq!(cfg.codegen.module_name, "system");

        let toml_path = dir.path().join("metagen.toml");
        fs::write(&toml_path, "[sync]\nallow_empty_schema = true\n").unwrap();
        let cfg = AppConfig::from_file(&toml_path).unwrap();
        assert!(cfg.sync.allow_empty_schema);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("metagen.ini");
        fs::write(&p, "x=1").unwrap();
        assert!(AppConfig::from_file(&p).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("METAGEN_CODEGEN_LANGUAGE", "java"),
            ("METAGEN_AUTHOR", "ops"),
            ("METAGEN_ALLOW_EMPTY_SCHEMA", "true"),
        ]
        .into_iter()
        .collect();
        let mut cfg = AppConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.codegen.language, Backend::Java);
        assert_eq!(cfg.codegen.author, "ops");
        assert!(cfg.sync.allow_empty_schema);
    }

    #[test]
    fn test_bad_language_override() {
        let mut cfg = AppConfig::default();
        let res = cfg.apply_overrides(|k| (k == "METAGEN_CODEGEN_LANGUAGE").then(|| "cobol".into()));
        assert!(res.is_err());
    }
}

//! # Template Registry
//!
//! Static, ordered list of every built-in template, with the output path
//! pattern each one renders to.
//!
//! ## Selection
//!
//! | Layer | Included when |
//! |-------|---------------|
//! | Backend (model, schema, data access, service, controller) | the GenTable's backend is the configured language |
//! | Backend sub-model | as above, relational category only |
//! | Frontend page | always (tree category gets the tree page) |
//! | Frontend components, API client, types | always |
//!
//! Output patterns are small templates rendered against the same context,
//! e.g. `src/service/{{ names.kebab }}.ts`.
//!
//! Operators can replace any built-in source by dropping a file with the same
//! id (relative path) into the configured template directory.

use crate::catalog::TemplateCategory;
use crate::typemap::Backend;
use anyhow::Context;
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Category filter for one template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applies {
    Always,
    /// List page for single and relational tables.
    ListPage,
    TreePage,
    Relational,
}

impl Applies {
    fn matches(self, category: TemplateCategory) -> bool {
        match self {
            Applies::Always => true,
            Applies::ListPage => category != TemplateCategory::Tree,
            Applies::TreePage => category == TemplateCategory::Tree,
            Applies::Relational => category == TemplateCategory::Relational,
        }
    }
}

/// One registered template.
#[derive(Debug, Clone)]
pub struct TemplateSpec {
    /// Stable id, also the relative path used for overrides.
    pub id: &'static str,
    /// `None` for frontend templates.
    pub backend: Option<Backend>,
    pub applies: Applies,
    /// Output path pattern.
    pub output: &'static str,
    pub source: Cow<'static, str>,
}

macro_rules! builtin {
    ($id:literal, $backend:expr, $applies:expr, $output:literal) => {
        TemplateSpec {
            id: $id,
            backend: $backend,
            applies: $applies,
            output: $output,
            source: Cow::Borrowed(include_str!(concat!("../../templates/", $id))),
        }
    };
}

fn builtin_templates() -> Vec<TemplateSpec> {
    use Applies::*;
    const RUST: Option<Backend> = Some(Backend::Rust);
    const PYTHON: Option<Backend> = Some(Backend::Python);
    const JAVA: Option<Backend> = Some(Backend::Java);
    vec![
        builtin!("rust/model.rs.j2", RUST, Always, "server/src/model/{{ table_name }}_model.rs"),
        builtin!("rust/schema.rs.j2", RUST, Always, "server/src/schema/{{ table_name }}_schema.rs"),
        builtin!("rust/dao.rs.j2", RUST, Always, "server/src/dao/{{ table_name }}_dao.rs"),
        builtin!("rust/service.rs.j2", RUST, Always, "server/src/service/{{ table_name }}_service.rs"),
        builtin!(
            "rust/controller.rs.j2",
            RUST,
            Always,
            "server/src/controller/{{ table_name }}_controller.rs"
        ),
        builtin!(
            "rust/sub_model.rs.j2",
            RUST,
            Relational,
            "server/src/model/{{ sub.table_name }}_model.rs"
        ),
        builtin!("python/model.py.j2", PYTHON, Always, "main/app/model/{{ table_name }}_model.py"),
        builtin!("python/schema.py.j2", PYTHON, Always, "main/app/schema/{{ table_name }}_schema.py"),
        builtin!("python/mapper.py.j2", PYTHON, Always, "main/app/mapper/{{ table_name }}_mapper.py"),
        builtin!(
            "python/service.py.j2",
            PYTHON,
            Always,
            "main/app/service/{{ table_name }}_service.py"
        ),
        builtin!(
            "python/service_impl.py.j2",
            PYTHON,
            Always,
            "main/app/service/impl/{{ table_name }}_service_impl.py"
        ),
        builtin!(
            "python/controller.py.j2",
            PYTHON,
            Always,
            "main/app/controller/{{ table_name }}_controller.py"
        ),
        builtin!(
            "python/sub_model.py.j2",
            PYTHON,
            Relational,
            "main/app/model/{{ sub.table_name }}_model.py"
        ),
        builtin!(
            "java/model.java.j2",
            JAVA,
            Always,
            "main/java/{{ package_name | replace('.', '/') }}/domain/{{ class_name }}.java"
        ),
        builtin!(
            "java/mapper.java.j2",
            JAVA,
            Always,
            "main/java/{{ package_name | replace('.', '/') }}/mapper/{{ class_name }}Mapper.java"
        ),
        builtin!(
            "java/service.java.j2",
            JAVA,
            Always,
            "main/java/{{ package_name | replace('.', '/') }}/service/{{ class_name }}Service.java"
        ),
        builtin!(
            "java/controller.java.j2",
            JAVA,
            Always,
            "main/java/{{ package_name | replace('.', '/') }}/controller/{{ class_name }}Controller.java"
        ),
        builtin!(
            "react/page.tsx.j2",
            None,
            ListPage,
            "src/app/(main)/{{ module_name }}/{{ names.kebab }}/page.tsx"
        ),
        builtin!(
            "react/page_tree.tsx.j2",
            None,
            TreePage,
            "src/app/(main)/{{ module_name }}/{{ names.kebab }}/page.tsx"
        ),
        builtin!(
            "react/query.tsx.j2",
            None,
            Always,
            "src/app/(main)/{{ module_name }}/{{ names.kebab }}/components/query-{{ names.kebab }}.tsx"
        ),
        builtin!(
            "react/create.tsx.j2",
            None,
            Always,
            "src/app/(main)/{{ module_name }}/{{ names.kebab }}/components/create-{{ names.kebab }}.tsx"
        ),
        builtin!(
            "react/detail.tsx.j2",
            None,
            Always,
            "src/app/(main)/{{ module_name }}/{{ names.kebab }}/components/{{ names.kebab }}-detail.tsx"
        ),
        builtin!(
            "react/update.tsx.j2",
            None,
            Always,
            "src/app/(main)/{{ module_name }}/{{ names.kebab }}/components/update-{{ names.kebab }}.tsx"
        ),
        builtin!(
            "react/batch_update.tsx.j2",
            None,
            Always,
            "src/app/(main)/{{ module_name }}/{{ names.kebab }}/components/batch-update-{{ names.kebab }}.tsx"
        ),
        builtin!(
            "react/import.tsx.j2",
            None,
            Always,
            "src/app/(main)/{{ module_name }}/{{ names.kebab }}/components/import-{{ names.kebab }}.tsx"
        ),
        builtin!("react/service.ts.j2", None, Always, "src/service/{{ names.kebab }}.ts"),
        builtin!("react/types.ts.j2", None, Always, "src/types/{{ names.kebab }}.ts"),
    ]
}

/// Backend template flavours with a built-in set.
const BACKEND_KINDS: &[&str] = &["default"];
/// Frontend template sets with a built-in set.
const FRONTEND_KINDS: &[&str] = &["react"];

/// Ordered template list plus the configured code-generation language.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    language: Backend,
    templates: Vec<TemplateSpec>,
}

impl TemplateRegistry {
    /// Built-in templates; backend layers render for `language` only.
    pub fn builtin(language: Backend) -> Self {
        Self {
            language,
            templates: builtin_templates(),
        }
    }

    pub fn language(&self) -> Backend {
        self.language
    }

    pub fn get(&self, id: &str) -> Option<&TemplateSpec> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.templates.iter().map(|t| t.id)
    }

    /// Replace the source of template `id`. Returns `false` for unknown ids.
    pub fn override_source(&mut self, id: &str, source: impl Into<String>) -> bool {
        match self.templates.iter_mut().find(|t| t.id == id) {
            Some(spec) => {
                spec.source = Cow::Owned(source.into());
                true
            }
            None => false,
        }
    }

    /// Load overrides from `dir`, one file per template id.
    ///
    /// # Errors
    ///
    /// Fails when an existing override file cannot be read.
    pub fn load_overrides(&mut self, dir: &Path) -> anyhow::Result<usize> {
        let mut loaded = 0;
        for spec in &mut self.templates {
            let path = dir.join(spec.id);
            if !path.is_file() {
                continue;
            }
            let source = fs::read_to_string(&path)
                .with_context(|| format!("failed to read template override {}", path.display()))?;
            spec.source = Cow::Owned(source);
            loaded += 1;
        }
        if loaded > 0 {
            info!(dir = %dir.display(), loaded, "loaded template overrides");
        }
        Ok(loaded)
    }

    /// Ordered templates for one GenTable.
    ///
    /// Unknown backend or frontend kinds fall back to the built-in set.
    pub fn resolve(
        &self,
        backend: Backend,
        backend_kind: &str,
        category: TemplateCategory,
        frontend_kind: &str,
    ) -> Vec<&TemplateSpec> {
        if !BACKEND_KINDS.contains(&backend_kind) {
            warn!(backend_kind, "unknown backend template kind, using default");
        }
        if !FRONTEND_KINDS.contains(&frontend_kind) {
            warn!(frontend_kind, "unknown frontend template kind, using react");
        }
        let with_backend = backend == self.language;
        let backend_layer = self
            .templates
            .iter()
            .filter(|t| with_backend && t.backend == Some(backend));
        let frontend_layer = self.templates.iter().filter(|t| t.backend.is_none());
        backend_layer
            .chain(frontend_layer)
            .filter(|t| t.applies.matches(category))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(specs: &[&TemplateSpec]) -> Vec<&'static str> {
        specs.iter().map(|s| s.id).collect()
    }

    #[test]
    fn test_frontend_always_present() {
        let reg = TemplateRegistry::builtin(Backend::Rust);
        let other = reg.resolve(Backend::Python, "default", TemplateCategory::Single, "react");
        assert_eq!(other.len(), 9);
        assert!(other.iter().all(|s| s.backend.is_none()));

        let own = reg.resolve(Backend::Rust, "default", TemplateCategory::Single, "react");
        assert_eq!(own.len(), 14);
        assert_eq!(own[0].id, "rust/model.rs.j2");
        assert_eq!(own.last().map(|s| s.id), Some("react/types.ts.j2"));
    }

    #[test]
    fn test_category_variants() {
        let reg = TemplateRegistry::builtin(Backend::Python);
        let tree = ids(&reg.resolve(Backend::Python, "default", TemplateCategory::Tree, "react"));
        assert!(tree.contains(&"react/page_tree.tsx.j2"));
        assert!(!tree.contains(&"react/page.tsx.j2"));
        assert!(!tree.contains(&"python/sub_model.py.j2"));

        let rel = ids(&reg.resolve(Backend::Python, "default", TemplateCategory::Relational, "react"));
        assert!(rel.contains(&"python/sub_model.py.j2"));
        assert!(rel.contains(&"react/page.tsx.j2"));
    }

    #[test]
    fn test_unknown_kinds_fall_back() {
        let reg = TemplateRegistry::builtin(Backend::Java);
        let a = ids(&reg.resolve(Backend::Java, "mybatis", TemplateCategory::Single, "vue"));
        let b = ids(&reg.resolve(Backend::Java, "default", TemplateCategory::Single, "react"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_overrides() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("react")).unwrap();
        fs::write(dir.path().join("react/types.ts.j2"), "custom").unwrap();
        let mut reg = TemplateRegistry::builtin(Backend::Rust);
        assert_eq!(reg.load_overrides(dir.path()).unwrap(), 1);
        assert_eq!(reg.get("react/types.ts.j2").unwrap().source, "custom");
        assert!(!reg.override_source("nope.j2", "x"));
    }
}

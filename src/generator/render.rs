use super::context::GenerationContext;
use super::engine::TemplateEngine;
use super::templates::TemplateSpec;
use crate::error::{ErrorReport, GenError, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// One rendered template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedFile {
    pub template_id: String,
    /// Relative output path.
    pub path: String,
    pub content: String,
}

/// Files that rendered plus a report for every template that did not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderOutcome {
    pub files: Vec<RenderedFile>,
    pub errors: Vec<ErrorReport>,
}

impl RenderOutcome {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Render the output path pattern of `spec`.
///
/// # Errors
///
/// [`GenError::TemplateRender`] when the pattern references a missing key or
/// renders to an empty or absolute path.
pub fn derive_output_path(
    engine: &dyn TemplateEngine,
    spec: &TemplateSpec,
    context: &Value,
) -> Result<String> {
    let path = engine.render(spec.id, spec.output, context)?;
    let path = path.trim().replace('\\', "/");
    if path.is_empty() || path.starts_with('/') || path.split('/').any(|p| p == "..") {
        return Err(GenError::TemplateRender {
            template_id: spec.id.to_string(),
            cause: format!("invalid output path `{path}`"),
        });
    }
    Ok(path)
}

/// Render every spec against `context`. A failing template is reported and
/// skipped; the rest still render.
///
/// # Errors
///
/// Only when the context itself cannot be serialised.
pub fn render_templates(
    engine: &dyn TemplateEngine,
    specs: &[&TemplateSpec],
    context: &GenerationContext,
) -> Result<RenderOutcome> {
    let value = serde_json::to_value(context).map_err(|e| GenError::TemplateRender {
        template_id: "<context>".to_string(),
        cause: e.to_string(),
    })?;
    let mut outcome = RenderOutcome::default();
    for spec in specs {
        let rendered = engine
            .render(spec.id, &spec.source, &value)
            .and_then(|content| Ok((derive_output_path(engine, spec, &value)?, content)));
        match rendered {
            Ok((path, content)) => outcome.files.push(RenderedFile {
                template_id: spec.id.to_string(),
                path,
                content,
            }),
            Err(err) => {
                warn!(
                    gen_table_id = context.gen_table_id,
                    template_id = spec.id,
                    error = %err,
                    "template failed to render"
                );
                outcome.errors.push(err.report());
            }
        }
    }
    Ok(outcome)
}

use crate::error::{GenError, Result};
use crate::naming;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde_json::Value;

/// Renders template source against a JSON context.
///
/// Implementations must support conditionals, loops and whitespace control.
pub trait TemplateEngine: Send + Sync {
    /// # Errors
    ///
    /// [`GenError::TemplateRender`] naming `template_id` and the cause.
    fn render(&self, template_id: &str, source: &str, context: &Value) -> Result<String>;
}

/// [`TemplateEngine`] backed by minijinja.
///
/// Undefined variables are errors and block tags eat their own line. On top
/// of the builtin filters the naming filters (`camel`, `pascal`, `snake`,
/// `kebab`, `plural`, `singular`) are registered, plus `comment(prefix)`
/// which prefixes every line of a block of text.
#[derive(Debug)]
pub struct MiniJinjaEngine {
    env: Environment<'static>,
}

impl Default for MiniJinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MiniJinjaEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_filter("camel", |s: String| naming::to_camel(&s));
        env.add_filter("pascal", |s: String| naming::to_pascal(&s));
        env.add_filter("snake", |s: String| naming::to_snake(&s));
        env.add_filter("kebab", |s: String| naming::to_kebab(&s));
        env.add_filter("plural", |s: String| naming::to_plural(&s));
        env.add_filter("singular", |s: String| naming::to_singular(&s));
        env.add_filter("comment", comment_lines);
        Self { env }
    }
}

fn comment_lines(text: String, prefix: String) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                prefix.trim_end().to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl TemplateEngine for MiniJinjaEngine {
    fn render(&self, template_id: &str, source: &str, context: &Value) -> Result<String> {
        self.env
            .render_named_str(template_id, source, context)
            .map_err(|e| GenError::TemplateRender {
                template_id: template_id.to_string(),
                cause: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loops_conditionals_and_filters() {
        let engine = MiniJinjaEngine::new();
        let src = "{% for f in fields %}\n{% if f.pk %}*{% endif %}{{ f.name | pascal }}\n{% endfor %}\n";
        let out = engine
            .render(
                "t",
                src,
                &json!({"fields": [{"name": "user_id", "pk": true}, {"name": "nick_name", "pk": false}]}),
            )
            .unwrap();
        assert_eq!(out, "*UserId\nNickName\n");
    }

    #[test]
    fn test_undefined_variable_names_template() {
        let engine = MiniJinjaEngine::new();
        let err = engine
            .render("react/page.tsx.j2", "{{ missing.key }}", &json!({}))
            .unwrap_err();
        match err {
            GenError::TemplateRender { template_id, cause } => {
                assert_eq!(template_id, "react/page.tsx.j2");
                assert!(!cause.is_empty());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_comment_filter() {
        let engine = MiniJinjaEngine::new();
        let out = engine
            .render("t", "{{ text | comment('# ') }}", &json!({"text": "a\n\nb"}))
            .unwrap();
        assert_eq!(out, "# a\n#\n# b");
    }

    #[test]
    fn test_syntax_error_is_render_error() {
        let engine = MiniJinjaEngine::new();
        assert!(engine.render("bad", "{% if %}", &json!({})).is_err());
    }
}

//! Handlebars template renderer
//!
//! Templates in release job directories are rendered against the render
//! context (`p.*`, `spec.*`, `link.<name>.*`) in strict mode, so a reference
//! to a missing value fails the render. Output is not HTML-escaped. Use the
//! `json` helper to inline lists and maps, and `\{{` for a literal `{{`.

use handlebars::Handlebars;
use keel_resolver::{RenderError, RenderInput, TemplateRef, TemplateRenderer};
use serde::Serialize;
use std::fmt;
use std::io::ErrorKind;

/// Renders templates read from release job directories
pub struct HandlebarsRenderer {
    handlebars: Handlebars<'static>,
}

impl HandlebarsRenderer {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);
        handlebars.register_helper("json", Box::new(json_helper));
        Self { handlebars }
    }

    /// Render template source against a serializable context
    pub fn render_source<T: Serialize>(&self, source: &str, context: &T) -> Result<String, RenderError> {
        self.handlebars
            .render_template(source, context)
            .map_err(|e| RenderError::Failed(e.to_string()))
    }
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlebarsRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlebarsRenderer").finish_non_exhaustive()
    }
}

impl TemplateRenderer for HandlebarsRenderer {
    fn render(&self, template: &TemplateRef, input: &RenderInput<'_>) -> Result<Vec<u8>, RenderError> {
        let path = template
            .source_path()
            .ok_or_else(|| RenderError::TemplateNotFound(template.to_string()))?;
        let source = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => RenderError::TemplateNotFound(path.display().to_string()),
            _ => RenderError::Io(e),
        })?;

        self.render_source(&source, &input.context())
            .map(String::into_bytes)
    }
}

fn json_helper(
    h: &handlebars::Helper,
    _: &Handlebars,
    _: &handlebars::Context,
    _: &mut handlebars::RenderContext,
    out: &mut dyn handlebars::Output,
) -> handlebars::HelperResult {
    if let Some(v) = h.param(0) {
        out.write(&v.value().to_string())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_types::PropertyValue;

    fn context() -> PropertyValue {
        serde_yaml::from_str(
            r#"
p:
  port: 8080
  tls: { enabled: true }
  hosts: [a, b]
  banner: "<b>&</b>"
spec:
  address: web-0.default.svc.cluster.local
link:
  db:
    address: db.default.svc.cluster.local
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_render_paths() {
        let renderer = HandlebarsRenderer::new();
        let rendered = renderer
            .render_source(
                "--port={{ p.port }} --tls={{p.tls.enabled}} --db={{ link.db.address }} {{json p.hosts}}",
                &context(),
            )
            .unwrap();
        assert_eq!(
            rendered,
            r#"--port=8080 --tls=true --db=db.default.svc.cluster.local ["a","b"]"#
        );
    }

    #[test]
    fn test_render_is_not_html_escaped() {
        let renderer = HandlebarsRenderer::new();
        assert_eq!(renderer.render_source("{{ p.banner }}", &context()).unwrap(), "<b>&</b>");
    }

    #[test]
    fn test_literal_braces() {
        let renderer = HandlebarsRenderer::new();
        let rendered = renderer.render_source("args: ['\\{{', '}}']", &context()).unwrap();
        assert_eq!(rendered, "args: ['{{', '}}']");
    }

    #[test]
    fn test_render_errors() {
        let renderer = HandlebarsRenderer::new();
        assert!(matches!(
            renderer.render_source("{{ p.missing }}", &context()),
            Err(RenderError::Failed(_))
        ));
        assert!(matches!(
            renderer.render_source("{{ p.port", &context()),
            Err(RenderError::Failed(_))
        ));
        assert_eq!(
            renderer.render_source("no placeholders", &context()).unwrap(),
            "no placeholders"
        );
    }
}

//! Script template rendering
//!
//! Templates are handlebars with HTML escaping disabled, since the output is
//! JavaScript. Two helpers are always available:
//!
//! - `{{{json value}}}` serializes a value as a JSON literal, which is the
//!   safe way to place request data into a script.
//! - `{{{load "name" ...}}}` inserts the raw text of a named partial. The
//!   parameters are concatenated, so `{{{load "procedure_" procedure_type}}}`
//!   selects a partial by request type. Only available when the caller passes
//!   a [`PartialSource`].

use crate::error::{Error, Result};
use handlebars::{
    no_escape, Context, Handlebars, Helper, HelperResult, Output, RenderContext,
    RenderErrorReason,
};
use serde_json::Value;

/// Supplies partial templates to the `load` helper
pub trait PartialSource: Send + Sync {
    fn load(&self, name: &str) -> Result<String>;
}

/// Renders a template string against a JSON context
pub trait Renderer: Send + Sync {
    fn render(
        &self,
        template: &str,
        context: &Value,
        partials: Option<&dyn PartialSource>,
    ) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HandlebarsRenderer;

impl HandlebarsRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for HandlebarsRenderer {
    fn render(
        &self,
        template: &str,
        context: &Value,
        partials: Option<&dyn PartialSource>,
    ) -> Result<String> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(no_escape);
        handlebars.register_helper("json", Box::new(json_helper));

        if let Some(source) = partials {
            handlebars.register_helper(
                "load",
                Box::new(
                    move |h: &Helper,
                          _: &Handlebars,
                          _: &Context,
                          _: &mut RenderContext,
                          out: &mut dyn Output|
                          -> HelperResult {
                        let name: String =
                            h.params().iter().map(|p| param_text(p.value())).collect();
                        if name.is_empty() {
                            return Err(RenderErrorReason::Other(
                                "load requires a partial name".to_string(),
                            )
                            .into());
                        }

                        let partial = source
                            .load(&name)
                            .map_err(|e| RenderErrorReason::Other(e.to_string()))?;
                        out.write(&partial)?;
                        Ok(())
                    },
                ),
            );
        }

        handlebars
            .render_template(template, context)
            .map_err(|e| Error::Template(e.to_string()))
    }
}

fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let value = h.param(0).map(|v| v.value().clone()).unwrap_or(Value::Null);
    out.write(&serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string()))?;
    Ok(())
}

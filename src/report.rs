//! Report rendering
//!
//! One variant today: a Handlebars template expanded with the watch's
//! filter result. Escaping is disabled because the rendered output is
//! expected to be markdown, where entity-escaped diff text would be
//! mangled.

use std::sync::LazyLock;

use handlebars::Handlebars;
use serde_json::json;

use crate::{
   config::ReportConfig,
   error::{Result, VigilError},
   types::{FilterResult, ReportMetadata},
};

/// Global template registry, built once per process
static HANDLEBARS: LazyLock<Handlebars<'static>> = LazyLock::new(|| {
   let mut registry = Handlebars::new();
   registry.register_escape_fn(handlebars::no_escape);
   registry
});

/// Rendered report content plus its assembled metadata
#[derive(Debug, Clone)]
pub struct Rendered {
   pub content:  String,
   pub metadata: ReportMetadata,
}

/// Expand the report template against a filter result
///
/// Template variables: `filePath`, `diffText`, `left.artifact`,
/// `right.artifact`. A template failure is fatal for the owning signal.
pub fn render(report: &ReportConfig, result: &FilterResult, file_path: &str) -> Result<Rendered> {
   match report {
      ReportConfig::Handlebars { template } => {
         let data = json!({
            "filePath": file_path,
            "diffText": result.diff,
            "left": { "artifact": result.left.artifact },
            "right": { "artifact": result.right.artifact },
         });

         let content = HANDLEBARS
            .render_template(template, &data)
            .map_err(|e| VigilError::RenderError(e.to_string()))?;

         Ok(Rendered {
            metadata: ReportMetadata {
               file_name:  file_path.to_string(),
               diff_text:  result.diff.clone(),
               message:    content.clone(),
               line_range: result.line_range,
               context:    result.context.clone(),
            },
            content,
         })
      },
   }
}

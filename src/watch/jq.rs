//! jq watch
//!
//! Runs the query in-process (jaq) instead of spawning a `jq` binary, so a
//! run never pays a per-file process and needs no external tool. Each
//! produced value is printed as compact JSON, joined by newline.

use jaq_interpret::{Ctx, FilterT, ParseCtx, RcIter, Val};

use crate::{
   config::JqWatch,
   error::{Result, VigilError},
   types::Extraction,
};

/// Parse the query without running it, for eager ruleset validation
pub(crate) fn check_query(query: &str) -> Result<()> {
   let (main, errs) = jaq_parse::parse(query, jaq_parse::main());
   if !errs.is_empty() || main.is_none() {
      return Err(VigilError::ExtractorError(format!("Invalid jq query '{query}': {errs:?}")));
   }
   Ok(())
}

/// Run the jq query over the content as JSON
pub fn extract(watch: &JqWatch, content: &str) -> Result<Extraction> {
   let input: serde_json::Value = serde_json::from_str(content)
      .map_err(|e| VigilError::ExtractorError(format!("Input is not valid JSON: {e}")))?;

   let mut defs = ParseCtx::new(Vec::new());
   defs.insert_natives(jaq_core::core());
   defs.insert_defs(jaq_std::std());

   let (main, errs) = jaq_parse::parse(&watch.query, jaq_parse::main());
   if !errs.is_empty() {
      return Err(VigilError::ExtractorError(format!(
         "Invalid jq query '{}': {errs:?}",
         watch.query
      )));
   }
   let main = main.ok_or_else(|| {
      VigilError::ExtractorError(format!("Invalid jq query '{}'", watch.query))
   })?;

   let filter = defs.compile(main);
   if !defs.errs.is_empty() {
      return Err(VigilError::ExtractorError(format!(
         "Invalid jq query '{}': undefined names",
         watch.query
      )));
   }

   let inputs = RcIter::new(core::iter::empty());
   let mut lines = Vec::new();
   for out in filter.run((Ctx::new([], &inputs), Val::from(input))) {
      let val = out.map_err(|e| VigilError::ExtractorError(format!("jq evaluation failed: {e}")))?;
      let json = serde_json::Value::from(val);
      lines.push(serde_json::to_string(&json)?);
   }

   Ok(Extraction { text: lines.join("\n"), context: Vec::new() })
}

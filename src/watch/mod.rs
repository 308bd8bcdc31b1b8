//! The watch engine
//!
//! Five extractor kinds unified behind one contract: run the kind-specific
//! extractor against both sides of a file-version pair, diff the textual
//! artifacts, and return a [`FilterResult`] when they differ. Equal
//! artifacts mean absence.
//!
//! Extractor runtime failures (bad query, unparseable input) collapse to an
//! empty extraction at this boundary. Configuration contract violations
//! (missing or unsupported language) surface to the caller.

pub mod astgrep;
pub mod jq;
pub mod pattern;
pub mod textdiff;
pub mod tsq;
pub mod xpath;

use crate::{
   config::{WatchConfig, WatchKind},
   error::Result,
   types::{Artifact, Extraction, FileVersions, FilterResult},
};

fn extract_side(kind: &WatchKind, content: Option<&str>, path: Option<&str>) -> Result<Extraction> {
   // Absent content extracts to empty text with empty context
   let Some(content) = content else {
      return Ok(Extraction::default());
   };

   let outcome = match kind {
      WatchKind::Jq(watch) => jq::extract(watch, content),
      WatchKind::Regex(watch) => pattern::extract(watch, content),
      WatchKind::Xpath(watch) => xpath::extract(watch, content),
      WatchKind::Tsq(watch) => tsq::extract(watch, content, path),
      WatchKind::AstGrep(watch) => astgrep::extract(watch, content),
   };

   match outcome {
      Ok(extraction) => Ok(extraction),
      Err(e) if e.is_contract_violation() => Err(e),
      Err(_) => Ok(Extraction::default()),
   }
}

/// Whether this kind's extracted text is line-structured enough for a line
/// range to mean anything. jq output is a transformation, not a subset, so
/// a range would mislead.
const fn emits_line_range(kind: &WatchKind) -> bool {
   !matches!(kind, WatchKind::Jq(_))
}

/// Apply a watch to both sides of a file change
///
/// Returns `Ok(None)` when nothing report-worthy changed: both sides
/// absent, or both extractions produced the same text.
pub fn apply(
   watch: &WatchConfig,
   versions: &FileVersions,
   file_path: Option<&str>,
) -> Result<Option<FilterResult>> {
   if versions.is_empty() {
      return Ok(None);
   }

   // The two sides share no mutable state, so extract them concurrently
   let (left, right) = rayon::join(
      || extract_side(&watch.kind, versions.old.as_deref(), file_path),
      || extract_side(&watch.kind, versions.new.as_deref(), file_path),
   );
   let (left, right) = (left?, right?);

   if left.text == right.text {
      return Ok(None);
   }

   let diff = textdiff::unified_diff(&left.text, &right.text);
   let line_range = if emits_line_range(&watch.kind) {
      textdiff::first_hunk_range(&diff)
   } else {
      None
   };

   // Merge left-then-right contexts with set semantics, keeping first-seen
   // order
   let mut context = Vec::new();
   for entry in left.context.into_iter().chain(right.context) {
      if !context.contains(&entry) {
         context.push(entry);
      }
   }

   Ok(Some(FilterResult {
      diff,
      left: Artifact { artifact: left.text },
      right: Artifact { artifact: right.text },
      line_range,
      context,
   }))
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::config::{JqWatch, RegexWatch, TsqWatch};

   fn regex_watch(pattern: &str) -> WatchConfig {
      WatchConfig {
         kind:    WatchKind::Regex(RegexWatch { pattern: pattern.to_string(), flags: None }),
         include: None,
      }
   }

   fn versions(old: &str, new: &str) -> FileVersions {
      FileVersions { old: Some(old.to_string()), new: Some(new.to_string()) }
   }

   #[test]
   fn test_both_sides_absent_is_absence() {
      let watch = regex_watch("foo");
      let result = apply(&watch, &FileVersions::default(), None).unwrap();
      assert!(result.is_none());
   }

   #[test]
   fn test_equal_extractions_are_absence() {
      let watch = regex_watch("foo.*baz");
      let result = apply(&watch, &versions("foo bar baz", "foo bar baz\nother"), None).unwrap();
      assert!(result.is_none());
   }

   #[test]
   fn test_differing_extractions_produce_filter_result() {
      let watch = regex_watch("v\\d+");
      let result = apply(&watch, &versions("v1", "v2"), None)
         .unwrap()
         .expect("versions differ");
      assert_eq!(result.left.artifact, "v1");
      assert_eq!(result.right.artifact, "v2");
      assert!(result.diff.contains("-v1"));
      assert!(result.diff.contains("+v2"));
      assert!(result.line_range.is_some());
   }

   #[test]
   fn test_absence_symmetry() {
      let watch = regex_watch("v\\d+");
      let forward = apply(&watch, &versions("v1", "v2"), None).unwrap().unwrap();
      let swapped = apply(&watch, &versions("v2", "v1"), None).unwrap().unwrap();
      assert_eq!(forward.left.artifact, swapped.right.artifact);
      assert_eq!(forward.right.artifact, swapped.left.artifact);
      // Both ranges refer to their own new side
      assert!(swapped.line_range.is_some());
   }

   #[test]
   fn test_one_absent_side_extracts_to_empty() {
      let watch = regex_watch("a+");
      let only_new = FileVersions { old: None, new: Some("aaa".to_string()) };
      let result = apply(&watch, &only_new, None).unwrap().unwrap();
      assert_eq!(result.left.artifact, "");
      assert_eq!(result.right.artifact, "aaa");
   }

   #[test]
   fn test_runtime_failure_collapses_to_empty() {
      // Invalid pattern fails compilation on both sides: empty == empty
      let watch = regex_watch("(unclosed");
      let result = apply(&watch, &versions("a", "b"), None).unwrap();
      assert!(result.is_none());
   }

   #[test]
   fn test_contract_violation_surfaces() {
      let watch = WatchConfig {
         kind:    WatchKind::Tsq(TsqWatch {
            query:    "(identifier) @id".to_string(),
            capture:  None,
            language: None,
         }),
         include: None,
      };
      // No language and no file path extension: configuration error
      let err = apply(&watch, &versions("x", "y"), None).unwrap_err();
      assert!(err.is_contract_violation());
   }

   #[test]
   fn test_jq_watch_never_emits_line_range() {
      let watch = WatchConfig {
         kind:    WatchKind::Jq(JqWatch { query: ".v".to_string() }),
         include: None,
      };
      let result = apply(&watch, &versions(r#"{"v":1}"#, r#"{"v":2}"#), None)
         .unwrap()
         .expect("values differ");
      assert!(result.line_range.is_none());
   }

   #[test]
   fn test_context_merge_deduplicates() {
      let watch = regex_watch("name=(?<name>\\w+)");
      let result = apply(
         &watch,
         &versions("name=alpha\nname=beta", "name=alpha"),
         None,
      )
      .unwrap()
      .unwrap();
      // "alpha" appears on both sides but only once in the merged context
      let alphas = result
         .context
         .iter()
         .filter(|entry| entry.get("name").is_some_and(|v| v == "alpha"))
         .count();
      assert_eq!(alphas, 1);
      assert_eq!(result.context.len(), 2);
   }
}

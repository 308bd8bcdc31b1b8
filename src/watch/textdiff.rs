//! Line diffing of filtered artifacts
//!
//! Every watch funnels its left/right extractions through the same unified
//! diff so consumers see a consistent format, with three context lines so
//! the first hunk header stays findable.

use std::sync::LazyLock;

use regex::Regex;
use similar::TextDiff;

use crate::types::LineRange;

/// Unified diff between two artifacts, three lines of context
pub fn unified_diff(left: &str, right: &str) -> String {
   let diff = TextDiff::from_lines(left, right);
   diff
      .unified_diff()
      .context_radius(3)
      .header("left", "right")
      .to_string()
}

/// First new-side hunk header of an artifact diff
static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
   Regex::new(r"(?m)^@@ -\d+(?:,\d+)? \+(\d+)(?:,(\d+))? @@").expect("hunk header regex is valid")
});

/// Parse the first hunk's new-side `(start, length)` into an inclusive
/// range. An omitted length means 1. No matchable header means no range.
pub fn first_hunk_range(diff: &str) -> Option<LineRange> {
   let caps = HUNK_HEADER.captures(diff)?;
   let start: usize = caps.get(1)?.as_str().parse().ok()?;
   let length: usize = match caps.get(2) {
      Some(m) => m.as_str().parse().ok()?,
      None => 1,
   };
   Some(LineRange { start, end: (start + length).saturating_sub(1) })
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_unified_diff_marks_changed_lines() {
      let diff = unified_diff("\"1.0.0\"", "\"2.0.0\"");
      assert!(diff.contains("-\"1.0.0\""));
      assert!(diff.contains("+\"2.0.0\""));
      assert!(diff.contains("@@"));
   }

   #[test]
   fn test_unified_diff_keeps_three_context_lines() {
      let left = "a\nb\nc\nd\ne\nf\ng\nh\n";
      let right = "a\nb\nc\nd\nX\nf\ng\nh\n";
      let diff = unified_diff(left, right);
      // Three lines either side of the single change
      assert!(diff.contains("@@ -2,7 +2,7 @@"));
   }

   #[test]
   fn test_first_hunk_range_with_length() {
      let range = first_hunk_range("@@ -1,3 +2,4 @@\n").unwrap();
      assert_eq!(range.start, 2);
      assert_eq!(range.end, 5);
   }

   #[test]
   fn test_first_hunk_range_omitted_length_means_one() {
      let range = first_hunk_range("@@ -1 +7 @@\n").unwrap();
      assert_eq!(range.start, 7);
      assert_eq!(range.end, 7);
      assert_eq!(range.end - range.start + 1, 1);
   }

   #[test]
   fn test_first_hunk_range_uses_first_header_only() {
      let diff = "@@ -1,2 +1,2 @@\n-a\n+b\n@@ -10,2 +20,2 @@\n-c\n+d\n";
      let range = first_hunk_range(diff).unwrap();
      assert_eq!(range.start, 1);
   }

   #[test]
   fn test_first_hunk_range_absent_without_header() {
      assert!(first_hunk_range("no hunks here").is_none());
      assert!(first_hunk_range("").is_none());
   }

   #[test]
   fn test_range_length_matches_header_length() {
      let left = "one\ntwo\nthree\n";
      let right = "one\n2\n3\nthree\n";
      let diff = unified_diff(left, right);
      let range = first_hunk_range(&diff).unwrap();
      // New side of the only hunk covers the whole four-line file
      assert_eq!(range.end - range.start + 1, 4);
   }
}

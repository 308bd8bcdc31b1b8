//! Eager ruleset validation
//!
//! The runner resolves references lazily, so a broken signal only fails
//! when a file actually reaches it. Hosts that want to reject a bad
//! ruleset up front (CI gates, config editing) run this pass instead: it
//! walks every concern and signal, resolves all references, and compiles
//! every glob, pattern, query and template, collecting one message per
//! problem instead of stopping at the first.

use std::fmt;

use crate::{
   config::{ReportConfig, RuleSet, Signal, WatchKind},
   report,
   types::{Artifact, FilterResult},
   watch,
};

/// One problem found in a ruleset, tied to the signal that carries it
#[derive(Debug, Clone)]
pub struct ValidationIssue {
   pub concern: String,
   pub signal:  String,
   pub message: String,
}

impl fmt::Display for ValidationIssue {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "{} / {}: {}", self.concern, self.signal, self.message)
   }
}

/// Probe a report template by rendering it against an empty filter result
fn check_report(config: &ReportConfig) -> Option<String> {
   let empty = FilterResult {
      diff:       String::new(),
      left:       Artifact { artifact: String::new() },
      right:      Artifact { artifact: String::new() },
      line_range: None,
      context:    vec![],
   };
   report::render(config, &empty, "").err().map(|e| e.to_string())
}

fn check_signal(rules: &RuleSet, signal: &Signal, problems: &mut Vec<String>) {
   match rules.resolve_watch(&signal.watch) {
      Err(e) => problems.push(e.to_string()),
      Ok(watch_config) => {
         // Compiling the globs is the same work matching would do
         if let Err(e) = watch_config.includes("probe") {
            problems.push(e.to_string());
         }
         let checked = match &watch_config.kind {
            WatchKind::Jq(w) => watch::jq::check_query(&w.query),
            WatchKind::Regex(w) => watch::pattern::build_regex(w).map(|_| ()),
            WatchKind::Xpath(w) => watch::xpath::check_expression(&w.expression),
            WatchKind::Tsq(w) => watch::tsq::check_query(w),
            WatchKind::AstGrep(w) => watch::astgrep::check_pattern(w),
         };
         if let Err(e) = checked {
            problems.push(e.to_string());
         }
      },
   }

   match rules.resolve_report(&signal.report) {
      Err(e) => problems.push(e.to_string()),
      Ok(report_config) => {
         if let Some(message) = check_report(report_config) {
            problems.push(message);
         }
      },
   }
}

/// Validate the whole configuration graph
///
/// Returns every problem found; an empty vec means the ruleset would never
/// fail on resolution, compilation or template grounds at run time.
pub fn validate(rules: &RuleSet) -> Vec<ValidationIssue> {
   let mut issues = Vec::new();

   for (concern_id, concern) in &rules.concerns {
      for (index, signal_ref) in concern.signals.iter().enumerate() {
         let label = signal_ref.label(index);
         let mut problems = Vec::new();

         match rules.resolve_signal(signal_ref) {
            Err(e) => problems.push(e.to_string()),
            Ok(signal) => check_signal(rules, signal, &mut problems),
         }

         issues.extend(problems.into_iter().map(|message| ValidationIssue {
            concern: concern_id.clone(),
            signal: label.clone(),
            message,
         }));
      }
   }

   issues
}

#[cfg(test)]
mod tests {
   use super::*;

   fn rules(yaml: &str) -> RuleSet {
      RuleSet::from_yaml(yaml).unwrap()
   }

   #[test]
   fn test_clean_ruleset_has_no_issues() {
      let yaml = r#"
concerns:
  deps:
    signals:
      - watch:
          type: jq
          query: ".version"
          include: "**/package.json"
        report:
          type: handlebars
          template: "{{left.artifact}} -> {{right.artifact}}"
      - watch:
          type: regex
          pattern: "TODO"
        report:
          type: handlebars
          template: "{{diffText}}"
"#;
      assert!(validate(&rules(yaml)).is_empty());
   }

   #[test]
   fn test_dangling_reference_is_reported_with_signal_label() {
      let yaml = r##"
concerns:
  deps:
    signals:
      - use: "#defined/signals/ghost"
"##;
      let issues = validate(&rules(yaml));
      assert_eq!(issues.len(), 1);
      assert_eq!(issues[0].concern, "deps");
      assert_eq!(issues[0].signal, "#defined/signals/ghost");
      assert!(issues[0].message.contains("signals 'ghost' not found"));
   }

   #[test]
   fn test_multiple_problems_collected_in_one_pass() {
      let yaml = r##"
concerns:
  deps:
    signals:
      - watch:
          type: regex
          pattern: "(open"
        report:
          type: handlebars
          template: "{{#if}}"
      - watch:
          use: "#defined/watches/missing"
        report:
          type: handlebars
          template: "fine"
"##;
      let issues = validate(&rules(yaml));
      // Bad regex + broken template on the first signal, dangling watch on
      // the second
      assert_eq!(issues.len(), 3);
      assert_eq!(issues[0].signal, "signal #1");
      assert_eq!(issues[1].signal, "signal #1");
      assert_eq!(issues[2].signal, "signal #2");
   }

   #[test]
   fn test_bad_jq_query_is_reported() {
      let yaml = r#"
concerns:
  deps:
    signals:
      - watch:
          type: jq
          query: ".["
        report:
          type: handlebars
          template: "x"
"#;
      let issues = validate(&rules(yaml));
      assert_eq!(issues.len(), 1);
      assert!(issues[0].message.contains("Invalid jq query"));
   }

   #[test]
   fn test_tsq_without_language_is_deferred() {
      // The grammar depends on the analyzed file, so only an explicit
      // language can be checked eagerly
      let yaml = r#"
concerns:
  api:
    signals:
      - watch:
          type: tsq
          query: "(identifier) @id"
        report:
          type: handlebars
          template: "x"
"#;
      assert!(validate(&rules(yaml)).is_empty());
   }

   #[test]
   fn test_unknown_ast_grep_language_is_reported() {
      let yaml = r#"
concerns:
  api:
    signals:
      - watch:
          type: ast-grep
          language: cobol-2157
          pattern: "$A"
        report:
          type: handlebars
          template: "x"
"#;
      let issues = validate(&rules(yaml));
      assert_eq!(issues.len(), 1);
      assert!(issues[0].message.contains("unsupported language"));
   }

   #[test]
   fn test_invalid_glob_is_reported() {
      let yaml = r#"
concerns:
  deps:
    signals:
      - watch:
          type: regex
          pattern: "x"
          include: "a["
        report:
          type: handlebars
          template: "x"
"#;
      let issues = validate(&rules(yaml));
      assert_eq!(issues.len(), 1);
      assert!(issues[0].message.contains("Invalid include glob"));
   }

   #[test]
   fn test_issue_display_format() {
      let issue = ValidationIssue {
         concern: "deps".to_string(),
         signal:  "signal #1".to_string(),
         message: "broken".to_string(),
      };
      assert_eq!(issue.to_string(), "deps / signal #1: broken");
   }
}

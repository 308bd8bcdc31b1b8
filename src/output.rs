//! Terminal rendering of a run's results
//!
//! The JSON surface is just serde on [`RunOutput`]; this module is the
//! human one. Report content is printed as-is (it is already markdown),
//! framed with separators and a concern/file header line.

use std::collections::BTreeSet;

use crate::{
   style,
   types::{ReportOutput, RunOutput},
};

fn report_header(report: &ReportOutput) -> String {
   format!(
      "{} {} {}",
      style::bold(&report.concern),
      style::icons::ARROW,
      style::dim(&report.metadata.file_name)
   )
}

/// Summary line: report and concern counts
fn summary(output: &RunOutput) -> String {
   let concerns: BTreeSet<&str> = output
      .reports
      .iter()
      .map(|r| r.concern.as_str())
      .collect();
   style::success(&format!(
      "{} {} report(s) across {} concern(s)",
      style::icons::SUCCESS,
      output.reports.len(),
      concerns.len()
   ))
}

/// Render the whole run for a terminal of the given width
pub fn render_human(output: &RunOutput, width: usize) -> String {
   if output.reports.is_empty() {
      return format!("{} No governed changes detected", style::icons::INFO);
   }

   let mut out = String::new();
   for report in &output.reports {
      out.push_str(&style::separator(width));
      out.push('\n');
      out.push_str(&report_header(report));
      out.push('\n');
      out.push_str(&report.content);
      if !report.content.ends_with('\n') {
         out.push('\n');
      }
   }
   out.push_str(&style::separator(width));
   out.push('\n');
   out.push_str(&summary(output));
   out
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::types::{ReportMetadata, ReportOutput};

   fn report(concern: &str, file: &str, content: &str) -> ReportOutput {
      ReportOutput {
         concern:  concern.to_string(),
         signal:   "signal #1".to_string(),
         content:  content.to_string(),
         metadata: ReportMetadata {
            file_name:  file.to_string(),
            diff_text:  String::new(),
            message:    content.to_string(),
            line_range: None,
            context:    vec![],
         },
         notify:   None,
      }
   }

   #[test]
   fn test_empty_run_prints_placeholder() {
      let rendered = render_human(&RunOutput::default(), 40);
      assert!(rendered.contains("No governed changes detected"));
   }

   #[test]
   fn test_reports_appear_in_order_with_headers() {
      let output = RunOutput {
         reports:  vec![
            report("deps", "package.json", "version bumped"),
            report("api", "app.js", "function renamed"),
         ],
         concerns: Default::default(),
         failures: vec![],
      };
      let rendered = render_human(&output, 40);

      let deps_at = rendered.find("version bumped").unwrap();
      let api_at = rendered.find("function renamed").unwrap();
      assert!(deps_at < api_at);
      assert!(rendered.contains("deps"));
      assert!(rendered.contains("package.json"));
      assert!(rendered.contains("2 report(s) across 2 concern(s)"));
   }

   #[test]
   fn test_trailing_newline_not_duplicated() {
      let output = RunOutput {
         reports:  vec![report("deps", "a", "line\n")],
         concerns: Default::default(),
         failures: vec![],
      };
      let rendered = render_human(&output, 10);
      assert!(!rendered.contains("line\n\n"));
   }
}

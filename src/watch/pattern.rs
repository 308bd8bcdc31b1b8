//! regex watch
//!
//! Effective flags always include global and multiline; user flags add to
//! those. Matches are non-overlapping and left-to-right, and zero-length
//! matches are dropped after the scan advances past them, so two versions
//! with identical ordered match sequences always compare equal.

use regex::RegexBuilder;

use crate::{
   config::RegexWatch,
   error::{Result, VigilError},
   types::{ContextEntry, Extraction},
};

pub(crate) fn build_regex(watch: &RegexWatch) -> Result<regex::Regex> {
   let mut builder = RegexBuilder::new(&watch.pattern);
   builder.multi_line(true);

   if let Some(flags) = &watch.flags {
      for flag in flags.chars() {
         match flag {
            'i' => {
               builder.case_insensitive(true);
            },
            's' => {
               builder.dot_matches_new_line(true);
            },
            'x' => {
               builder.ignore_whitespace(true);
            },
            'U' => {
               builder.swap_greed(true);
            },
            // Global and multiline are always on; unicode is the default
            'g' | 'm' | 'u' => {},
            other => {
               return Err(VigilError::ExtractorError(format!("Unknown regex flag '{other}'")));
            },
         }
      }
   }

   builder
      .build()
      .map_err(|e| VigilError::ExtractorError(format!("Invalid regex pattern: {e}")))
}

/// Collect all matches; the artifact is the match strings joined by
/// newline, and each match with named groups contributes a context entry
pub fn extract(watch: &RegexWatch, content: &str) -> Result<Extraction> {
   let re = build_regex(watch)?;

   let mut matches = Vec::new();
   let mut context = Vec::new();

   for caps in re.captures_iter(content) {
      let Some(whole) = caps.get(0) else { continue };
      if whole.is_empty() {
         continue;
      }
      matches.push(whole.as_str().to_string());

      let mut entry = ContextEntry::new();
      for name in re.capture_names().flatten() {
         if let Some(group) = caps.name(name) {
            entry.insert(name.to_string(), group.as_str().to_string());
         }
      }
      if !entry.is_empty() {
         context.push(entry);
      }
   }

   Ok(Extraction { text: matches.join("\n"), context })
}

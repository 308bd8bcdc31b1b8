//! ast-grep watch
//!
//! Structural pattern matching over a version's syntax tree. A plain
//! string pattern is a code-shaped template with metavariables (`$NAME`,
//! `$$$REST`); the object form wraps the pattern in a `context` snippet and
//! extracts the `selector` node kind from it, which disambiguates patterns
//! that are not valid standalone code.

use std::sync::LazyLock;

use ast_grep_core::{matcher::Pattern, tree_sitter::LanguageExt};
use ast_grep_language::SupportLang;
use regex::Regex;

use crate::{
   config::{AstGrepWatch, PatternSpec},
   error::{Result, VigilError},
   types::{ContextEntry, Extraction},
};

/// Metavariable tokens in a pattern: `$NAME` (single) or `$$$NAME` (multi)
static METAVAR: LazyLock<Regex> = LazyLock::new(|| {
   Regex::new(r"\$(\$\$)?([A-Z_][A-Z0-9_]*)").expect("metavariable regex is valid")
});

/// Names declared in the pattern text, split into single and multi captures
fn metavar_names(pattern: &str) -> (Vec<String>, Vec<String>) {
   let mut singles = Vec::new();
   let mut multis = Vec::new();
   for caps in METAVAR.captures_iter(pattern) {
      let name = caps[2].to_string();
      let target = if caps.get(1).is_some() { &mut multis } else { &mut singles };
      if !target.contains(&name) {
         target.push(name);
      }
   }
   (singles, multis)
}

fn build_pattern(spec: &PatternSpec, lang: SupportLang) -> Result<(Pattern, String)> {
   match spec {
      PatternSpec::Template(template) => {
         let pattern = Pattern::try_new(template, lang)
            .map_err(|e| VigilError::ExtractorError(format!("Invalid ast-grep pattern: {e}")))?;
         Ok((pattern, template.clone()))
      },
      PatternSpec::Contextual { context, selector } => {
         let pattern = Pattern::contextual(context, selector, lang)
            .map_err(|e| VigilError::ExtractorError(format!("Invalid ast-grep pattern: {e}")))?;
         Ok((pattern, context.clone()))
      },
   }
}

/// Build the pattern without matching it, for eager ruleset validation
pub(crate) fn check_pattern(watch: &AstGrepWatch) -> Result<()> {
   let lang: SupportLang = watch
      .language
      .parse()
      .map_err(|_| VigilError::WatchContract(format!("unsupported language: {}", watch.language)))?;
   build_pattern(&watch.pattern, lang).map(|_| ())
}

/// Match the structural pattern over the content
pub fn extract(watch: &AstGrepWatch, content: &str) -> Result<Extraction> {
   let lang: SupportLang = watch
      .language
      .parse()
      .map_err(|_| VigilError::WatchContract(format!("unsupported language: {}", watch.language)))?;

   let (pattern, pattern_text) = build_pattern(&watch.pattern, lang)?;
   let (singles, multis) = metavar_names(&pattern_text);

   let root = lang.ast_grep(content);
   let mut texts = Vec::new();
   let mut context = Vec::new();

   for m in root.root().find_all(&pattern) {
      texts.push(m.text().to_string());

      let env = m.get_env();
      let mut entry = ContextEntry::new();
      for name in &singles {
         if let Some(node) = env.get_match(name) {
            entry.insert(name.clone(), node.text().to_string());
         }
      }
      for name in &multis {
         let nodes = env.get_multiple_matches(name);
         if !nodes.is_empty() {
            let joined = nodes
               .iter()
               .map(|n| n.text().to_string())
               .collect::<Vec<_>>()
               .join("\n");
            entry.insert(name.clone(), joined);
         }
      }
      if !entry.is_empty() {
         context.push(entry);
      }
   }

   Ok(Extraction { text: texts.join("\n\n"), context })
}

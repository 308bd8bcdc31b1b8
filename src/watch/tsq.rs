//! tsq watch: tree-sitter queries
//!
//! Grammars load once per language and compiled queries are cached by
//! `(language, query)`, both shared process-wide behind a mutex the way the
//! template registry is.

use std::{
   collections::{HashMap, HashSet},
   path::Path,
   sync::{Arc, LazyLock},
};

use parking_lot::Mutex;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Parser, Query, QueryCursor};

use crate::{
   config::TsqWatch,
   error::{Result, VigilError},
   types::{ContextEntry, Extraction},
};

/// Languages the tsq watch can parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TsLanguage {
   JavaScript,
   TypeScript,
   Tsx,
   Python,
   Go,
   Java,
   Rust,
   C,
   Cpp,
   Json,
}

impl TsLanguage {
   /// Map a file extension (without the dot) to a grammar
   pub fn from_extension(ext: &str) -> Option<Self> {
      match ext {
         "js" | "jsx" | "mjs" => Some(Self::JavaScript),
         "ts" => Some(Self::TypeScript),
         "tsx" => Some(Self::Tsx),
         "py" => Some(Self::Python),
         "go" => Some(Self::Go),
         "java" => Some(Self::Java),
         "rs" => Some(Self::Rust),
         "c" | "h" => Some(Self::C),
         "cpp" | "cxx" | "hpp" => Some(Self::Cpp),
         "json" => Some(Self::Json),
         _ => None,
      }
   }

   fn load(self) -> Language {
      match self {
         Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
         Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
         Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
         Self::Python => tree_sitter_python::LANGUAGE.into(),
         Self::Go => tree_sitter_go::LANGUAGE.into(),
         Self::Java => tree_sitter_java::LANGUAGE.into(),
         Self::Rust => tree_sitter_rust::LANGUAGE.into(),
         Self::C => tree_sitter_c::LANGUAGE.into(),
         Self::Cpp => tree_sitter_cpp::LANGUAGE.into(),
         Self::Json => tree_sitter_json::LANGUAGE.into(),
      }
   }
}

static GRAMMARS: LazyLock<Mutex<HashMap<TsLanguage, Language>>> =
   LazyLock::new(|| Mutex::new(HashMap::new()));

static QUERIES: LazyLock<Mutex<HashMap<(TsLanguage, String), Arc<Query>>>> =
   LazyLock::new(|| Mutex::new(HashMap::new()));

fn grammar(id: TsLanguage) -> Language {
   GRAMMARS.lock().entry(id).or_insert_with(|| id.load()).clone()
}

fn compiled_query(id: TsLanguage, source: &str) -> Result<Arc<Query>> {
   let key = (id, source.to_string());
   if let Some(query) = QUERIES.lock().get(&key) {
      return Ok(Arc::clone(query));
   }

   let query = Query::new(&grammar(id), source)
      .map_err(|e| VigilError::ExtractorError(format!("Invalid tree-sitter query: {e}")))?;
   let query = Arc::new(query);
   QUERIES.lock().insert(key, Arc::clone(&query));
   Ok(query)
}

/// Resolve the grammar from the explicit `language` extension, falling back
/// to the file path's extension. Both failures are contract violations.
fn resolve_language(language: Option<&str>, path: Option<&str>) -> Result<TsLanguage> {
   let ext = match language {
      Some(lang) => lang.trim_start_matches('.').to_string(),
      None => {
         let path = path.ok_or_else(|| {
            VigilError::WatchContract("tsq watch requires a file extension".to_string())
         })?;
         Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
               VigilError::WatchContract("tsq watch requires a file extension".to_string())
            })?
      },
   };

   TsLanguage::from_extension(&ext)
      .ok_or_else(|| VigilError::WatchContract(format!("unsupported language: .{ext}")))
}

/// Compile the query for eager ruleset validation. Without an explicit
/// `language` the grammar depends on the file under analysis, so only the
/// extension mapping is checked.
pub(crate) fn check_query(watch: &TsqWatch) -> Result<()> {
   let Some(language) = watch.language.as_deref() else {
      return Ok(());
   };
   let id = resolve_language(Some(language), None)?;
   compiled_query(id, &watch.query).map(|_| ())
}

/// Run the query and emit the content captures
pub fn extract(watch: &TsqWatch, content: &str, path: Option<&str>) -> Result<Extraction> {
   let id = resolve_language(watch.language.as_deref(), path)?;
   let language = grammar(id);
   let query = compiled_query(id, &watch.query)?;

   let mut parser = Parser::new();
   parser
      .set_language(&language)
      .map_err(|e| VigilError::ExtractorError(format!("Failed to load grammar: {e}")))?;
   let Some(tree) = parser.parse(content, None) else {
      return Ok(Extraction::default());
   };

   let names = query.capture_names();
   let source = content.as_bytes();

   let mut seen_nodes = HashSet::new();
   let mut texts = Vec::new();
   let mut context = Vec::new();

   let mut cursor = QueryCursor::new();
   let mut matches = cursor.matches(&query, tree.root_node(), source);
   while let Some(m) = matches.next() {
      // Content captures: the named one if configured, else the maximal
      // captures (not spatially contained by another capture in the match),
      // which filters nested captures so content is not emitted twice
      let content_indices: Vec<usize> = match watch.capture.as_deref() {
         Some(wanted) => m
            .captures
            .iter()
            .enumerate()
            .filter(|(_, c)| names[c.index as usize] == wanted)
            .map(|(i, _)| i)
            .collect(),
         None => m
            .captures
            .iter()
            .enumerate()
            .filter(|(i, capture)| {
               let range = capture.node.byte_range();
               !m.captures.iter().enumerate().any(|(j, other)| {
                  let outer = other.node.byte_range();
                  j != *i && outer != range && outer.start <= range.start && range.end <= outer.end
               })
            })
            .map(|(i, _)| i)
            .collect(),
      };

      for &i in &content_indices {
         let node = m.captures[i].node;
         // Node ids are stable integers; dedupe content across matches
         if seen_nodes.insert(node.id()) {
            texts.push(node.utf8_text(source).unwrap_or_default().to_string());
         }
      }

      let mut entry = ContextEntry::new();
      for (i, capture) in m.captures.iter().enumerate() {
         if content_indices.contains(&i) {
            continue;
         }
         let name = names[capture.index as usize].to_string();
         let text = capture.node.utf8_text(source).unwrap_or_default().to_string();
         entry.insert(name, text);
      }
      if !entry.is_empty() {
         context.push(entry);
      }
   }

   Ok(Extraction { text: texts.join("\n\n"), context })
}

#[cfg(test)]
mod tests {
   use super::*;

   fn watch(query: &str, capture: Option<&str>, language: Option<&str>) -> TsqWatch {
      TsqWatch {
         query:    query.to_string(),
         capture:  capture.map(String::from),
         language: language.map(String::from),
      }
   }

   #[test]
   fn test_named_capture_extracts_function_names() {
      let config = watch("(function_declaration name: (identifier) @name)", Some("name"), None);
      let extraction = extract(&config, "function foo() {}", Some("app.js")).unwrap();
      assert_eq!(extraction.text, "foo");

      let extraction = extract(&config, "function bar() {}", Some("app.js")).unwrap();
      assert_eq!(extraction.text, "bar");
   }

   #[test]
   fn test_maximal_capture_wins_without_capture_name() {
      let config = watch(
         "(function_declaration name: (identifier) @name) @fn",
         None,
         None,
      );
      let extraction = extract(&config, "function foo() {}", Some("app.js")).unwrap();
      // The whole declaration contains @name, so only @fn is content
      assert_eq!(extraction.text, "function foo() {}");
      // The nested capture becomes symbolic context
      assert_eq!(extraction.context.len(), 1);
      assert_eq!(extraction.context[0]["name"], "foo");
   }

   #[test]
   fn test_multiple_matches_joined_by_blank_line() {
      let config = watch("(function_declaration name: (identifier) @name)", Some("name"), None);
      let extraction =
         extract(&config, "function a() {}\nfunction b() {}", Some("app.js")).unwrap();
      assert_eq!(extraction.text, "a\n\nb");
   }

   #[test]
   fn test_explicit_language_overrides_path() {
      let config = watch(
         "(function_declaration name: (identifier) @name)",
         Some("name"),
         Some(".js"),
      );
      let extraction = extract(&config, "function x() {}", None).unwrap();
      assert_eq!(extraction.text, "x");
   }

   #[test]
   fn test_missing_extension_is_a_contract_violation() {
      let config = watch("(identifier) @id", None, None);
      let err = extract(&config, "let x = 1;", None).unwrap_err();
      assert!(err.is_contract_violation());
      assert!(err.to_string().contains("requires a file extension"));
   }

   #[test]
   fn test_unsupported_extension_is_a_contract_violation() {
      let config = watch("(identifier) @id", None, None);
      let err = extract(&config, "x", Some("file.zig")).unwrap_err();
      assert!(err.is_contract_violation());
      assert!(err.to_string().contains("unsupported language"));
   }

   #[test]
   fn test_invalid_query_is_a_runtime_error() {
      let config = watch("(no_such_node_kind) @x", None, Some(".js"));
      let err = extract(&config, "let x = 1;", None).unwrap_err();
      assert!(!err.is_contract_violation());
   }

   #[test]
   fn test_rust_grammar() {
      let config = watch("(function_item name: (identifier) @name)", Some("name"), None);
      let extraction = extract(&config, "fn compute() -> u8 { 0 }", Some("lib.rs")).unwrap();
      assert_eq!(extraction.text, "compute");
   }

   #[test]
   fn test_python_grammar() {
      let config = watch("(function_definition name: (identifier) @name)", Some("name"), None);
      let extraction = extract(&config, "def handler():\n    pass\n", Some("app.py")).unwrap();
      assert_eq!(extraction.text, "handler");
   }

   #[test]
   fn test_json_grammar_pairs() {
      let config = watch(
         "(pair key: (string) @key value: (string) @value)",
         Some("value"),
         None,
      );
      let extraction = extract(&config, r#"{"version": "1.0.0"}"#, Some("package.json")).unwrap();
      assert_eq!(extraction.text, "\"1.0.0\"");
      assert_eq!(extraction.context.len(), 1);
      assert_eq!(extraction.context[0]["key"], "\"version\"");
   }

   #[test]
   fn test_duplicate_nodes_emitted_once() {
      // Both patterns capture the same identifier node
      let config = watch(
         "[(function_declaration name: (identifier) @id) (identifier) @id]",
         Some("id"),
         None,
      );
      let extraction = extract(&config, "function solo() {}", Some("a.js")).unwrap();
      assert_eq!(extraction.text, "solo");
   }
}

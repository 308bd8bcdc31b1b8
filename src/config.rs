//! Ruleset schema and reference resolution
//!
//! A ruleset maps concern ids to ordered signal lists. Watches, reports and
//! whole signals may be written inline or referenced out of the shared
//! `defined` block with `use: "#defined/<kind>/<name>"`. Resolution is
//! shallow and happens lazily at use time; an unreferenced defined entry is
//! valid.

use std::{
   collections::{BTreeMap, HashMap},
   fmt,
   path::Path,
   sync::LazyLock,
};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, VigilError};

// === Watch configuration ===

/// One glob or a list of globs, minimatch semantics (`*` does not cross
/// `/`, `**` does)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncludeSpec {
   One(String),
   Many(Vec<String>),
}

impl IncludeSpec {
   pub fn patterns(&self) -> &[String] {
      match self {
         Self::One(p) => std::slice::from_ref(p),
         Self::Many(ps) => ps,
      }
   }
}

/// Compiled include globs, cached process-wide like the other compiled
/// pattern kinds
static GLOB_CACHE: LazyLock<Mutex<HashMap<String, GlobSet>>> =
   LazyLock::new(|| Mutex::new(HashMap::new()));

fn compile_globs(patterns: &[String]) -> Result<GlobSet> {
   let key = patterns.join("\n");
   if let Some(set) = GLOB_CACHE.lock().get(&key) {
      return Ok(set.clone());
   }

   let mut builder = GlobSetBuilder::new();
   for pattern in patterns {
      let glob = GlobBuilder::new(pattern)
         .literal_separator(true)
         .build()
         .map_err(|e| VigilError::ConfigError(format!("Invalid include glob '{pattern}': {e}")))?;
      builder.add(glob);
   }
   let set = builder
      .build()
      .map_err(|e| VigilError::ConfigError(format!("Failed to compile include globs: {e}")))?;

   GLOB_CACHE.lock().insert(key, set.clone());
   Ok(set)
}

/// jq watch: run a query over each version as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JqWatch {
   pub query: String,
}

/// regex watch: collect matches, with named groups as context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegexWatch {
   pub pattern: String,
   /// Extra flags on top of the always-on global + multiline
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub flags:   Option<String>,
}

/// xpath watch: evaluate an expression over each version as XML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpathWatch {
   pub expression: String,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub namespaces: Option<BTreeMap<String, String>>,
}

/// tsq watch: run a tree-sitter query and emit the content captures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TsqWatch {
   pub query:    String,
   /// Capture name whose nodes form the extracted content; defaults to the
   /// maximal captures of each match
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub capture:  Option<String>,
   /// File extension (like ".ts") forcing the grammar; defaults to the
   /// file path's extension
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub language: Option<String>,
}

/// ast-grep pattern: a code-shaped template, or a surrounding context
/// snippet plus the node kind to select from it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternSpec {
   Template(String),
   Contextual { context: String, selector: String },
}

/// ast-grep watch: structural match with metavariable context
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AstGrepWatch {
   pub language: String,
   pub pattern:  PatternSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WatchKind {
   Jq(JqWatch),
   Regex(RegexWatch),
   Xpath(XpathWatch),
   Tsq(TsqWatch),
   #[serde(rename = "ast-grep")]
   AstGrep(AstGrepWatch),
}

impl WatchKind {
   pub const fn name(&self) -> &'static str {
      match self {
         Self::Jq(_) => "jq",
         Self::Regex(_) => "regex",
         Self::Xpath(_) => "xpath",
         Self::Tsq(_) => "tsq",
         Self::AstGrep(_) => "ast-grep",
      }
   }
}

/// A watch: one extractor kind plus the include globs gating it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
   #[serde(flatten)]
   pub kind:    WatchKind,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub include: Option<IncludeSpec>,
}

impl WatchConfig {
   /// Whether the file path passes this watch's include globs.
   /// A watch without `include` accepts every path.
   pub fn includes(&self, path: &str) -> Result<bool> {
      match &self.include {
         None => Ok(true),
         Some(spec) => Ok(compile_globs(spec.patterns())?.is_match(path)),
      }
   }
}

// === Report configuration ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReportConfig {
   Handlebars { template: String },
}

// === Signals and concerns ===

/// A `use:` reference into the `defined` block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
   #[serde(rename = "use")]
   pub target: String,
}

/// Either an inline configuration or a reference to a defined one
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrRef<T> {
   Ref(Reference),
   Inline(T),
}

impl<T> OrRef<T> {
   /// Label for diagnostics: the reference target, or a positional name
   /// for inline definitions
   pub fn label(&self, index: usize) -> String {
      match self {
         Self::Ref(reference) => reference.target.clone(),
         Self::Inline(_) => format!("signal #{}", index + 1),
      }
   }
}

/// A (watch, report, optional notify) triple
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
   pub watch:  OrRef<WatchConfig>,
   pub report: OrRef<ReportConfig>,
   /// Passed through verbatim to the report output
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub notify:  Option<Value>,
   /// Key/value pairs merged into the owning concern's shared context when
   /// the signal fires
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub context: Option<BTreeMap<String, String>>,
}

/// A named governance area holding an ordered sequence of signals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concern {
   pub signals:      Vec<OrRef<Signal>>,
   /// Opaque to the engine; passed through to notification consumers
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub stakeholders: Option<Value>,
}

/// Shared definitions referenced with `#defined/<kind>/<name>`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Defined {
   #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
   pub watches: IndexMap<String, WatchConfig>,
   #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
   pub reports: IndexMap<String, ReportConfig>,
   #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
   pub signals: IndexMap<String, Signal>,
}

/// Configuration root; concern order is declaration order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
   pub concerns: IndexMap<String, Concern>,
   #[serde(default)]
   pub defined:  Defined,
}

impl RuleSet {
   pub fn from_yaml(text: &str) -> Result<Self> {
      Ok(serde_yaml::from_str(text)?)
   }

   pub fn from_file(path: &Path) -> Result<Self> {
      let contents = std::fs::read_to_string(path).map_err(|e| {
         VigilError::ConfigError(format!("Failed to read ruleset {}: {e}", path.display()))
      })?;
      Self::from_yaml(&contents)
   }

   pub fn resolve_watch<'a>(&'a self, watch: &'a OrRef<WatchConfig>) -> Result<&'a WatchConfig> {
      match watch {
         OrRef::Inline(config) => Ok(config),
         OrRef::Ref(reference) => {
            let name = expect_kind(&reference.target, DefinedKind::Watches)?;
            self
               .defined
               .watches
               .get(name)
               .ok_or_else(|| not_found(DefinedKind::Watches, name))
         },
      }
   }

   pub fn resolve_report<'a>(&'a self, report: &'a OrRef<ReportConfig>) -> Result<&'a ReportConfig> {
      match report {
         OrRef::Inline(config) => Ok(config),
         OrRef::Ref(reference) => {
            let name = expect_kind(&reference.target, DefinedKind::Reports)?;
            self
               .defined
               .reports
               .get(name)
               .ok_or_else(|| not_found(DefinedKind::Reports, name))
         },
      }
   }

   pub fn resolve_signal<'a>(&'a self, signal: &'a OrRef<Signal>) -> Result<&'a Signal> {
      match signal {
         OrRef::Inline(config) => Ok(config),
         OrRef::Ref(reference) => {
            let name = expect_kind(&reference.target, DefinedKind::Signals)?;
            self
               .defined
               .signals
               .get(name)
               .ok_or_else(|| not_found(DefinedKind::Signals, name))
         },
      }
   }
}

// === Reference parsing ===

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinedKind {
   Watches,
   Reports,
   Signals,
}

impl DefinedKind {
   const fn as_str(self) -> &'static str {
      match self {
         Self::Watches => "watches",
         Self::Reports => "reports",
         Self::Signals => "signals",
      }
   }

   fn parse(s: &str) -> Option<Self> {
      match s {
         "watches" => Some(Self::Watches),
         "reports" => Some(Self::Reports),
         "signals" => Some(Self::Signals),
         _ => None,
      }
   }
}

impl fmt::Display for DefinedKind {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.as_str())
   }
}

/// Parse `#defined/<kind>/<name>` into its kind and name
pub fn parse_reference(target: &str) -> Result<(DefinedKind, &str)> {
   let invalid = || VigilError::ReferenceError("Invalid reference format".to_string());

   let rest = target.strip_prefix("#defined/").ok_or_else(invalid)?;
   let (kind_str, name) = rest.split_once('/').ok_or_else(invalid)?;
   if name.is_empty() {
      return Err(invalid());
   }
   let kind = DefinedKind::parse(kind_str).ok_or_else(invalid)?;
   Ok((kind, name))
}

fn expect_kind(target: &str, expected: DefinedKind) -> Result<&str> {
   let (kind, name) = parse_reference(target)?;
   if kind == expected {
      Ok(name)
   } else {
      Err(VigilError::ReferenceError(format!(
         "Expected a {expected} reference, got {kind}"
      )))
   }
}

fn not_found(kind: DefinedKind, name: &str) -> VigilError {
   VigilError::ReferenceError(format!("{kind} '{name}' not found"))
}

#[cfg(test)]
mod tests {
   use super::*;

   const SAMPLE: &str = r##"
concerns:
  dependencies:
    stakeholders:
      - team: platform
    signals:
      - watch:
          use: "#defined/watches/version"
        report:
          use: "#defined/reports/plain"
        notify:
          labels: [deps]
      - watch:
          type: regex
          pattern: '"license":\s*"(?<license>[^"]+)"'
          include: "**/package.json"
        report:
          type: handlebars
          template: "license changed in {{filePath}}"
defined:
  watches:
    version:
      type: jq
      query: ".version"
      include:
        - "**/package.json"
        - "package.json"
  reports:
    plain:
      type: handlebars
      template: "{{filePath}}: {{diffText}}"
"##;

   #[test]
   fn test_ruleset_parses_and_preserves_order() {
      let rules = RuleSet::from_yaml(SAMPLE).unwrap();
      assert_eq!(rules.concerns.len(), 1);
      let concern = &rules.concerns["dependencies"];
      assert_eq!(concern.signals.len(), 2);
      assert!(concern.stakeholders.is_some());
      assert_eq!(rules.defined.watches.len(), 1);
      assert_eq!(rules.defined.reports.len(), 1);
   }

   #[test]
   fn test_resolve_watch_reference() {
      let rules = RuleSet::from_yaml(SAMPLE).unwrap();
      let concern = &rules.concerns["dependencies"];
      let signal = rules.resolve_signal(&concern.signals[0]).unwrap();
      let watch = rules.resolve_watch(&signal.watch).unwrap();
      assert_eq!(watch.kind.name(), "jq");
      match &watch.kind {
         WatchKind::Jq(jq) => assert_eq!(jq.query, ".version"),
         other => panic!("Expected jq watch, got {}", other.name()),
      }
   }

   #[test]
   fn test_inline_watch_with_flags() {
      let rules = RuleSet::from_yaml(SAMPLE).unwrap();
      let concern = &rules.concerns["dependencies"];
      let signal = rules.resolve_signal(&concern.signals[1]).unwrap();
      let watch = rules.resolve_watch(&signal.watch).unwrap();
      assert_eq!(watch.kind.name(), "regex");
      assert!(watch.includes("ui/package.json").unwrap());
      assert!(!watch.includes("ui/Cargo.toml").unwrap());
   }

   #[test]
   fn test_reference_error_messages_are_exact() {
      let rules = RuleSet::from_yaml(SAMPLE).unwrap();

      let bad_format = OrRef::<WatchConfig>::Ref(Reference { target: "defined/watches/x".to_string() });
      let err = rules.resolve_watch(&bad_format).unwrap_err();
      assert_eq!(err.to_string(), "Reference error: Invalid reference format");

      let wrong_kind =
         OrRef::<WatchConfig>::Ref(Reference { target: "#defined/reports/plain".to_string() });
      let err = rules.resolve_watch(&wrong_kind).unwrap_err();
      assert_eq!(
         err.to_string(),
         "Reference error: Expected a watches reference, got reports"
      );

      let missing =
         OrRef::<WatchConfig>::Ref(Reference { target: "#defined/watches/nope".to_string() });
      let err = rules.resolve_watch(&missing).unwrap_err();
      assert_eq!(err.to_string(), "Reference error: watches 'nope' not found");
   }

   #[test]
   fn test_parse_reference_rejects_bad_shapes() {
      assert!(parse_reference("#defined/watches/x").is_ok());
      assert!(parse_reference("#defined/watches/").is_err());
      assert!(parse_reference("#defined/gadgets/x").is_err());
      assert!(parse_reference("#define/watches/x").is_err());
      assert!(parse_reference("").is_err());
   }

   #[test]
   fn test_include_single_star_does_not_cross_directories() {
      let watch = WatchConfig {
         kind:    WatchKind::Jq(JqWatch { query: ".".to_string() }),
         include: Some(IncludeSpec::One("*.json".to_string())),
      };
      assert!(watch.includes("package.json").unwrap());
      assert!(!watch.includes("nested/package.json").unwrap());
   }

   #[test]
   fn test_include_double_star_crosses_directories() {
      let watch = WatchConfig {
         kind:    WatchKind::Jq(JqWatch { query: ".".to_string() }),
         include: Some(IncludeSpec::Many(vec!["**/*.json".to_string()])),
      };
      assert!(watch.includes("a/b/c/package.json").unwrap());
      assert!(watch.includes("package.json").unwrap());
   }

   #[test]
   fn test_missing_include_matches_everything() {
      let watch = WatchConfig {
         kind:    WatchKind::Jq(JqWatch { query: ".".to_string() }),
         include: None,
      };
      assert!(watch.includes("anything/at/all").unwrap());
   }

   #[test]
   fn test_invalid_glob_is_a_config_error() {
      let watch = WatchConfig {
         kind:    WatchKind::Jq(JqWatch { query: ".".to_string() }),
         include: Some(IncludeSpec::One("a[".to_string())),
      };
      let err = watch.includes("a").unwrap_err();
      assert!(err.is_contract_violation());
   }

   #[test]
   fn test_ast_grep_pattern_shapes() {
      let yaml = r#"
type: ast-grep
language: rust
pattern:
  context: "fn f() { $BODY }"
  selector: block
"#;
      let watch: WatchConfig = serde_yaml::from_str(yaml).unwrap();
      match &watch.kind {
         WatchKind::AstGrep(ag) => match &ag.pattern {
            PatternSpec::Contextual { context, selector } => {
               assert!(context.contains("$BODY"));
               assert_eq!(selector, "block");
            },
            PatternSpec::Template(_) => panic!("Expected contextual pattern"),
         },
         other => panic!("Expected ast-grep watch, got {}", other.name()),
      }
   }

   #[test]
   fn test_unreferenced_defined_entry_is_valid() {
      let yaml = r#"
concerns:
  empty:
    signals: []
defined:
  watches:
    unused:
      type: regex
      pattern: "TODO"
"#;
      let rules = RuleSet::from_yaml(yaml).unwrap();
      assert!(rules.defined.watches.contains_key("unused"));
   }
}

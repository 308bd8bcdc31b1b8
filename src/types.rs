use std::{collections::BTreeMap, path::PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// === Diff model ===

/// How a file changed between the base and head revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
   Add,
   Delete,
   Modify,
   Rename,
   Copy,
}

/// A single hunk from a unified diff
///
/// Format: @@ -`old_start,old_count` +`new_start,new_count` @@ with omitted
/// counts defaulting to 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
   pub old_start: usize,
   pub old_count: usize,
   pub new_start: usize,
   pub new_count: usize,
   pub lines:     Vec<String>,
}

/// One changed file recovered from a unified diff
#[derive(Debug, Clone)]
pub struct FileChange {
   pub old_path:  Option<String>,
   pub new_path:  Option<String>,
   pub kind:      ChangeKind,
   pub hunks:     Vec<Hunk>,
   pub is_binary: bool,
}

impl FileChange {
   /// Path used for glob matching and reporting: the new path, falling back
   /// to the old one for deletions.
   pub fn effective_path(&self) -> Option<&str> {
      self.new_path.as_deref().or(self.old_path.as_deref())
   }
}

/// Both sides of a file across the revision pair; either may be absent
#[derive(Debug, Clone, Default)]
pub struct FileVersions {
   pub old: Option<String>,
   pub new: Option<String>,
}

impl FileVersions {
   pub const fn is_empty(&self) -> bool {
      self.old.is_none() && self.new.is_none()
   }
}

// === Watch output ===

/// Key/value map describing structure around a match (named capture values,
/// enclosing node captures, metavariable bindings)
pub type ContextEntry = BTreeMap<String, String>;

/// Raw extractor output for one side of a file-version pair
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
   pub text:    String,
   pub context: Vec<ContextEntry>,
}

/// One side's filtered artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
   pub artifact: String,
}

/// Inclusive line range within a filtered artifact's diff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
   pub start: usize,
   pub end:   usize,
}

/// Non-empty result of applying a watch to a file-version pair
///
/// Invariant: `left.artifact != right.artifact`; equal artifacts make the
/// watch return absence instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterResult {
   /// Unified diff of the two artifacts, three context lines
   pub diff:       String,
   pub left:       Artifact,
   pub right:      Artifact,
   /// First hunk's new-side range, counted within the filtered artifact.
   /// This is not a source-file line range.
   #[serde(rename = "lineRange", skip_serializing_if = "Option::is_none")]
   pub line_range: Option<LineRange>,
   #[serde(skip_serializing_if = "Vec::is_empty", default)]
   pub context:    Vec<ContextEntry>,
}

// === Report output ===

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
   pub file_name: String,
   pub diff_text: String,
   /// Duplicate of the rendered content for consumers that prefer a single
   /// field
   pub message:   String,
   /// Range within the filtered artifact's diff, not the source file
   #[serde(skip_serializing_if = "Option::is_none")]
   pub line_range: Option<LineRange>,
   #[serde(skip_serializing_if = "Vec::is_empty", default)]
   pub context:    Vec<ContextEntry>,
}

/// One rendered report plus the metadata downstream consumers need
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutput {
   pub concern:  String,
   pub signal:   String,
   pub content:  String,
   pub metadata: ReportMetadata,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub notify:   Option<Value>,
}

/// A signal that failed without stopping the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalFailure {
   pub concern: String,
   pub signal:  String,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub file:    Option<String>,
   pub error:   String,
}

/// Everything a run produces
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunOutput {
   pub reports:  Vec<ReportOutput>,
   /// Shared concern context accumulated by firing signals
   #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
   pub concerns: BTreeMap<String, BTreeMap<String, String>>,
   #[serde(skip_serializing_if = "Vec::is_empty", default)]
   pub failures: Vec<SignalFailure>,
}

// CLI Args
#[derive(Parser, Debug)]
#[command(author, version, about = "Report governed changes between two revisions", long_about = None)]
pub struct Args {
   /// Ruleset file (YAML)
   #[arg(long, short = 'c', required_unless_present = "test")]
   pub config: Option<PathBuf>,

   /// Base revision to compare from
   #[arg(long, default_value = "HEAD")]
   pub base: String,

   /// Head revision to compare to ("." means the working tree)
   #[arg(long, default_value = ".")]
   pub head: String,

   /// Read the unified diff from a file instead of invoking git
   #[arg(long)]
   pub diff: Option<PathBuf>,

   /// Directory to run git commands in
   #[arg(long, default_value = ".")]
   pub dir: String,

   /// Print the full run output as JSON
   #[arg(long)]
   pub json: bool,

   /// Validate the ruleset (references, globs, queries, templates) and exit
   #[arg(long)]
   pub check: bool,

   // === Pull request mode ===
   /// GitHub repository as owner/repo (enables PR mode)
   #[arg(long, requires = "pr")]
   pub github: Option<String>,

   /// Pull request number
   #[arg(long, requires = "github")]
   pub pr: Option<u64>,

   /// GitHub token (defaults to GITHUB_TOKEN)
   #[arg(long)]
   pub token: Option<String>,

   // === Test mode args ===
   /// Run fixture-based golden tests
   #[arg(long, conflicts_with_all = ["github", "diff"])]
   pub test: bool,

   /// Update golden files with current output
   #[arg(long, requires = "test")]
   pub test_update: bool,

   /// Filter fixtures by name pattern
   #[arg(long, requires = "test")]
   pub test_filter: Option<String>,

   /// List available fixtures
   #[arg(long, requires = "test")]
   pub test_list: bool,

   /// Custom fixtures directory
   #[arg(long, requires = "test")]
   pub fixtures_dir: Option<PathBuf>,
}

//! Fixture execution and golden comparison

use std::path::{Path, PathBuf};

use crate::{
   error::Result,
   provider::MemoryProvider,
   runner::{self, ProcessContext},
   testing::fixture::{Fixture, discover_fixtures},
   types::{ChangeKind, FileChange},
   watch::textdiff,
};

/// Result of running one fixture
#[derive(Debug, Clone)]
pub struct RunResult {
   pub name:   String,
   pub passed: bool,
   /// Human explanation: "ok", "golden updated", or a mismatch diff
   pub detail: String,
}

/// Aggregate over a whole fixture run
#[derive(Debug, Clone, Default)]
pub struct TestSummary {
   pub results: Vec<RunResult>,
}

impl TestSummary {
   pub fn passed(&self) -> usize {
      self.results.iter().filter(|r| r.passed).count()
   }

   pub fn failed(&self) -> usize {
      self.results.len() - self.passed()
   }

   pub fn all_passed(&self) -> bool {
      self.failed() == 0
   }
}

/// Synthesize file changes from the two frozen trees
fn changes_between(fixture: &Fixture) -> Vec<FileChange> {
   let mut changes = Vec::new();

   for (path, old_content) in &fixture.base {
      match fixture.head.get(path) {
         None => changes.push(FileChange {
            old_path:  Some(path.clone()),
            new_path:  None,
            kind:      ChangeKind::Delete,
            hunks:     vec![],
            is_binary: false,
         }),
         Some(new_content) if new_content != old_content => changes.push(FileChange {
            old_path:  Some(path.clone()),
            new_path:  Some(path.clone()),
            kind:      ChangeKind::Modify,
            hunks:     vec![],
            is_binary: false,
         }),
         Some(_) => {},
      }
   }
   for path in fixture.head.keys() {
      if !fixture.base.contains_key(path) {
         changes.push(FileChange {
            old_path:  None,
            new_path:  Some(path.clone()),
            kind:      ChangeKind::Add,
            hunks:     vec![],
            is_binary: false,
         });
      }
   }

   // Deterministic order regardless of tree layout
   changes.sort_by(|a, b| a.effective_path().cmp(&b.effective_path()));
   changes
}

/// Runs fixtures against the engine and compares to golden outputs
pub struct TestRunner {
   fixtures_dir: PathBuf,
   filter:       Option<String>,
   update:       bool,
}

impl TestRunner {
   pub fn new(fixtures_dir: &Path) -> Self {
      Self {
         fixtures_dir: fixtures_dir.to_path_buf(),
         filter:       None,
         update:       false,
      }
   }

   /// Only run fixtures whose name contains the pattern
   pub fn with_filter(mut self, filter: Option<String>) -> Self {
      self.filter = filter;
      self
   }

   /// Record current output as golden instead of comparing
   pub fn with_update(mut self, update: bool) -> Self {
      self.update = update;
      self
   }

   pub fn list(&self) -> Result<Vec<String>> {
      discover_fixtures(&self.fixtures_dir)
   }

   fn run_one(&self, name: &str) -> Result<RunResult> {
      let fixture = Fixture::load(&self.fixtures_dir, name)?;

      let mut provider = MemoryProvider::new();
      for (path, content) in &fixture.base {
         provider.insert("base", path, content);
      }
      for (path, content) in &fixture.head {
         provider.insert("head", path, content);
      }

      let files = changes_between(&fixture);
      let ctx = ProcessContext::new(&provider, "base", "head");
      let output = runner::run(&files, &fixture.rules, &ctx);
      let actual = serde_json::to_value(&output)?;

      if self.update {
         fixture.save_golden(&self.fixtures_dir, &actual)?;
         return Ok(RunResult {
            name:   name.to_string(),
            passed: true,
            detail: "golden updated".to_string(),
         });
      }

      match &fixture.golden {
         None => Ok(RunResult {
            name:   name.to_string(),
            passed: false,
            detail: "no golden output recorded (run with --test-update)".to_string(),
         }),
         Some(golden) if *golden == actual => Ok(RunResult {
            name:   name.to_string(),
            passed: true,
            detail: "ok".to_string(),
         }),
         Some(golden) => {
            let expected = serde_json::to_string_pretty(golden)?;
            let got = serde_json::to_string_pretty(&actual)?;
            Ok(RunResult {
               name:   name.to_string(),
               passed: false,
               detail: textdiff::unified_diff(&expected, &got),
            })
         },
      }
   }

   pub fn run_all(&self) -> Result<TestSummary> {
      let mut summary = TestSummary::default();

      for name in self.list()? {
         if let Some(filter) = &self.filter
            && !name.contains(filter.as_str())
         {
            continue;
         }
         summary.results.push(self.run_one(&name)?);
      }

      Ok(summary)
   }
}

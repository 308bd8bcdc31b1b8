//! Testing infrastructure for vigil
//!
//! Provides fixture-based golden file testing for rulesets: freeze a pair
//! of file trees and a ruleset, record the run output once, and from then
//! on any engine change that alters the output fails the fixture.
//!
//! # Directory Structure
//!
//! ```text
//! tests/fixtures/
//! ├── npm-version-bump/
//! │   ├── meta.yml               # Fixture metadata
//! │   ├── rules.yml              # Ruleset under test
//! │   ├── base/                  # File tree at the base revision
//! │   │   └── package.json
//! │   ├── head/                  # File tree at the head revision
//! │   │   └── package.json
//! │   └── golden/
//! │       └── output.json        # Expected run output
//! └── ...
//! ```

pub mod fixture;
pub mod runner;

use std::path::{Path, PathBuf};

pub use fixture::{Fixture, FixtureMeta, discover_fixtures};
pub use runner::{RunResult, TestRunner, TestSummary};

/// Default fixtures directory relative to crate root
pub const FIXTURES_DIR: &str = "tests/fixtures";

/// Get the fixtures directory path
pub fn fixtures_dir() -> PathBuf {
   // Try to find it relative to CARGO_MANIFEST_DIR or current dir
   if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
      return Path::new(&manifest_dir).join(FIXTURES_DIR);
   }

   // Fall back to current directory
   Path::new(FIXTURES_DIR).to_path_buf()
}

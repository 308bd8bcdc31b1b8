//! Content-provider contract
//!
//! The engine's only boundary for byte retrieval: given an opaque revision
//! and a path, return the file's content or absence. Absence is never an
//! error; only real I/O or authorization failures raise.

use std::collections::HashMap;

use crate::error::Result;

/// Returns the content of `path` at `revision`, or `None` when the file
/// does not exist at that revision
pub trait ContentProvider: Sync {
   fn fetch(&self, revision: &str, path: &str) -> Result<Option<String>>;
}

/// Whether a revision names the working tree rather than a snapshot
pub fn is_working_tree(revision: &str) -> bool {
   revision.is_empty() || revision == "."
}

/// In-memory provider for tests and embedding hosts
#[derive(Debug, Default)]
pub struct MemoryProvider {
   files: HashMap<(String, String), String>,
}

impl MemoryProvider {
   pub fn new() -> Self {
      Self::default()
   }

   pub fn insert(&mut self, revision: &str, path: &str, content: &str) -> &mut Self {
      self
         .files
         .insert((revision.to_string(), path.to_string()), content.to_string());
      self
   }
}

impl ContentProvider for MemoryProvider {
   fn fetch(&self, revision: &str, path: &str) -> Result<Option<String>> {
      Ok(self
         .files
         .get(&(revision.to_string(), path.to_string()))
         .cloned())
   }
}

//! Git subprocess glue
//!
//! Local-repository adapter: acquires the unified diff between two
//! revisions and serves file content at a revision via `git show`. The
//! sentinel revision `.` (or empty) means the working tree and reads the
//! filesystem directly.

use std::{io::ErrorKind, path::Path, process::Command};

use crate::{
   error::{Result, VigilError},
   provider::{ContentProvider, is_working_tree},
};

/// Get the unified diff between two revisions
///
/// A working-tree head compares the base against the checkout. An empty
/// diff is a valid result, not an error.
pub fn diff_range(dir: &str, base: &str, head: &str) -> Result<String> {
   let mut cmd = Command::new("git");
   cmd.arg("diff").arg(base);
   if !is_working_tree(head) {
      cmd.arg(head);
   }

   let output = cmd
      .current_dir(dir)
      .output()
      .map_err(|e| VigilError::GitError(format!("Failed to run git diff: {e}")))?;

   if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(VigilError::GitError(format!("git diff failed: {stderr}")));
   }

   Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Content provider backed by `git show <revision>:<path>`
pub struct GitContentProvider {
   dir: String,
}

impl GitContentProvider {
   pub fn new(dir: &str) -> Self {
      Self { dir: dir.to_string() }
   }

   fn read_working_tree(&self, path: &str) -> Result<Option<String>> {
      match std::fs::read_to_string(Path::new(&self.dir).join(path)) {
         Ok(content) => Ok(Some(content)),
         Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
         Err(e) => Err(e.into()),
      }
   }
}

impl ContentProvider for GitContentProvider {
   fn fetch(&self, revision: &str, path: &str) -> Result<Option<String>> {
      if is_working_tree(revision) {
         return self.read_working_tree(path);
      }

      let spec = format!("{revision}:{path}");
      let output = Command::new("git")
         .args(["show", &spec])
         .current_dir(&self.dir)
         .output()
         .map_err(|e| VigilError::GitError(format!("Failed to run git show: {e}")))?;

      if output.status.success() {
         return Ok(Some(String::from_utf8_lossy(&output.stdout).to_string()));
      }

      // A path missing at the revision is absence; anything else (bad
      // revision, not a repository) is a real failure
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("does not exist in") || stderr.contains("exists on disk, but not in") {
         Ok(None)
      } else {
         Err(VigilError::GitError(format!("git show {spec} failed: {stderr}")))
      }
   }
}

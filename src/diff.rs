//! Unified diff parsing
//!
//! Turns `git diff`-style text into per-file change records. The engine
//! treats files holistically afterwards; hunks are retained so callers can
//! derive line ranges.

use crate::types::{ChangeKind, FileChange, Hunk};

/// Parse a hunk header into (`old_start`, `old_count`, `new_start`,
/// `new_count`). An omitted count defaults to 1.
pub fn parse_hunk_header(header: &str) -> Option<(usize, usize, usize, usize)> {
   let trimmed = header.trim();
   if !trimmed.starts_with("@@") {
      return None;
   }

   // Extract the part between @@ markers
   let after_first = &trimmed[2..];
   let middle = after_first.find("@@").map(|end| after_first[..end].trim())?;

   let parts: Vec<&str> = middle.split_whitespace().collect();
   if parts.len() < 2 {
      return None;
   }

   let old_part = parts[0].strip_prefix('-')?;
   let new_part = parts[1].strip_prefix('+')?;

   let parse_range = |s: &str| -> Option<(usize, usize)> {
      if let Some((start, count)) = s.split_once(',') {
         Some((start.parse().ok()?, count.parse().ok()?))
      } else {
         // No comma: just a line number, count is 1
         Some((s.parse().ok()?, 1))
      }
   };

   let (old_start, old_count) = parse_range(old_part)?;
   let (new_start, new_count) = parse_range(new_part)?;

   Some((old_start, old_count, new_start, new_count))
}

/// Strip the `a/` or `b/` diff prefix; `/dev/null` means the side is absent
fn parse_marker_path(raw: &str) -> Option<String> {
   let trimmed = raw.trim();
   if trimmed == "/dev/null" {
      return None;
   }
   let stripped = trimmed
      .strip_prefix("a/")
      .or_else(|| trimmed.strip_prefix("b/"))
      .unwrap_or(trimmed);
   Some(stripped.to_string())
}

/// Pull default old/new paths out of a `diff --git a/X b/Y` line
fn parse_git_line_paths(line: &str) -> (Option<String>, Option<String>) {
   let parts: Vec<&str> = line.split_whitespace().collect();
   let old = parts.get(2).and_then(|p| parse_marker_path(p));
   let new = parts.get(3).and_then(|p| parse_marker_path(p));
   (old, new)
}

struct PendingFile {
   old_path:  Option<String>,
   new_path:  Option<String>,
   kind:      Option<ChangeKind>,
   hunks:     Vec<Hunk>,
   is_binary: bool,
}

impl PendingFile {
   fn finish(self) -> FileChange {
      let kind = self.kind.unwrap_or(ChangeKind::Modify);
      // Enforce the path invariants for additions and deletions
      let (old_path, new_path) = match kind {
         ChangeKind::Add => (None, self.new_path),
         ChangeKind::Delete => (self.old_path, None),
         _ => (self.old_path, self.new_path),
      };
      FileChange {
         old_path,
         new_path,
         kind,
         hunks: self.hunks,
         is_binary: self.is_binary,
      }
   }
}

/// Parse a unified diff into ordered file-change records
///
/// Tolerates added/deleted file headers, rename and copy headers, binary
/// markers and absent-newline markers. Empty input yields an empty vec.
pub fn parse_diff(diff: &str) -> Vec<FileChange> {
   let mut files = Vec::new();
   let mut current: Option<PendingFile> = None;
   let mut in_hunk = false;

   for line in diff.lines() {
      if line.starts_with("diff --git") {
         if let Some(file) = current.take() {
            files.push(file.finish());
         }
         let (old_path, new_path) = parse_git_line_paths(line);
         current = Some(PendingFile {
            old_path,
            new_path,
            kind: None,
            hunks: Vec::new(),
            is_binary: false,
         });
         in_hunk = false;
      } else if let Some(ref mut file) = current {
         if line.starts_with("@@") {
            in_hunk = true;
            if let Some((old_start, old_count, new_start, new_count)) = parse_hunk_header(line) {
               file.hunks.push(Hunk {
                  old_start,
                  old_count,
                  new_start,
                  new_count,
                  lines: Vec::new(),
               });
            }
         } else if in_hunk {
            // Change, context and absent-newline lines all belong to the
            // current hunk
            if let Some(hunk) = file.hunks.last_mut() {
               hunk.lines.push(line.to_string());
            }
         } else if line.starts_with("new file mode") {
            file.kind = Some(ChangeKind::Add);
         } else if line.starts_with("deleted file mode") {
            file.kind = Some(ChangeKind::Delete);
         } else if let Some(path) = line.strip_prefix("rename from ") {
            file.kind = Some(ChangeKind::Rename);
            file.old_path = Some(path.trim().to_string());
         } else if let Some(path) = line.strip_prefix("rename to ") {
            file.kind = Some(ChangeKind::Rename);
            file.new_path = Some(path.trim().to_string());
         } else if let Some(path) = line.strip_prefix("copy from ") {
            file.kind = Some(ChangeKind::Copy);
            file.old_path = Some(path.trim().to_string());
         } else if let Some(path) = line.strip_prefix("copy to ") {
            file.kind = Some(ChangeKind::Copy);
            file.new_path = Some(path.trim().to_string());
         } else if line.starts_with("Binary files") || line.starts_with("GIT binary patch") {
            file.is_binary = true;
         } else if let Some(raw) = line.strip_prefix("--- ") {
            file.old_path = parse_marker_path(raw);
         } else if let Some(raw) = line.strip_prefix("+++ ") {
            file.new_path = parse_marker_path(raw);
         }
         // index lines, mode lines and similarity index are ignored
      }
   }

   if let Some(file) = current {
      files.push(file.finish());
   }

   files
}

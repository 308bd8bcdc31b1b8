//! Fixture types and I/O operations

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
   config::RuleSet,
   error::{Result, VigilError},
};

/// Metadata for a fixture
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureMeta {
   /// Why this fixture is interesting
   #[serde(default)]
   pub description: String,
   /// Tags for filtering (e.g., "jq", "edge-case")
   #[serde(default)]
   pub tags: Vec<String>,
}

/// A complete fixture with all data
#[derive(Debug, Clone)]
pub struct Fixture {
   /// Fixture name (directory name)
   pub name:   String,
   pub meta:   FixtureMeta,
   /// Ruleset under test
   pub rules:  RuleSet,
   /// File tree at the base revision, keyed by relative path
   pub base:   BTreeMap<String, String>,
   /// File tree at the head revision
   pub head:   BTreeMap<String, String>,
   /// Golden run output as JSON (None if not yet recorded)
   pub golden: Option<serde_json::Value>,
}

/// Read every file under a tree root into path → content, relative paths
/// with `/` separators
fn read_tree(root: &Path) -> Result<BTreeMap<String, String>> {
   let mut files = BTreeMap::new();
   if !root.exists() {
      return Ok(files);
   }
   read_tree_into(root, root, &mut files)?;
   Ok(files)
}

fn read_tree_into(root: &Path, dir: &Path, files: &mut BTreeMap<String, String>) -> Result<()> {
   for entry in fs::read_dir(dir)? {
      let entry = entry?;
      let path = entry.path();
      if path.is_dir() {
         read_tree_into(root, &path, files)?;
      } else {
         let relative = path
            .strip_prefix(root)
            .map_err(|e| VigilError::Other(format!("Bad fixture path: {e}")))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
         files.insert(relative, fs::read_to_string(&path)?);
      }
   }
   Ok(())
}

impl Fixture {
   /// Load a fixture from disk
   pub fn load(fixtures_dir: &Path, name: &str) -> Result<Self> {
      let fixture_dir = fixtures_dir.join(name);
      if !fixture_dir.exists() {
         return Err(VigilError::Other(format!(
            "Fixture '{}' not found at {}",
            name,
            fixture_dir.display()
         )));
      }

      let meta_path = fixture_dir.join("meta.yml");
      let meta: FixtureMeta = if meta_path.exists() {
         serde_yaml::from_str(&fs::read_to_string(&meta_path)?)
            .map_err(|e| VigilError::Other(format!("Failed to parse {}: {e}", meta_path.display())))?
      } else {
         FixtureMeta::default()
      };

      let rules = RuleSet::from_file(&fixture_dir.join("rules.yml"))?;
      let base = read_tree(&fixture_dir.join("base"))?;
      let head = read_tree(&fixture_dir.join("head"))?;

      let golden_path = fixture_dir.join("golden").join("output.json");
      let golden = if golden_path.exists() {
         Some(serde_json::from_str(&fs::read_to_string(&golden_path)?)?)
      } else {
         None
      };

      Ok(Self { name: name.to_string(), meta, rules, base, head, golden })
   }

   /// Write the recorded golden output back to disk
   pub fn save_golden(&self, fixtures_dir: &Path, output: &serde_json::Value) -> Result<()> {
      let golden_dir = fixtures_dir.join(&self.name).join("golden");
      fs::create_dir_all(&golden_dir)?;
      fs::write(
         golden_dir.join("output.json"),
         serde_json::to_string_pretty(output)?,
      )?;
      Ok(())
   }
}

/// Discover all fixtures in a directory
pub fn discover_fixtures(fixtures_dir: &Path) -> Result<Vec<String>> {
   let mut fixtures = Vec::new();

   if !fixtures_dir.exists() {
      return Ok(fixtures);
   }

   for entry in fs::read_dir(fixtures_dir)? {
      let entry = entry?;
      let path = entry.path();
      if !path.is_dir() {
         continue;
      }

      // A valid fixture carries a ruleset
      if path.join("rules.yml").exists()
         && let Some(name) = path.file_name().and_then(|n| n.to_str())
      {
         fixtures.push(name.to_string());
      }
   }

   fixtures.sort();
   Ok(fixtures)
}

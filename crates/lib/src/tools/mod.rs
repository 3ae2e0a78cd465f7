//! Locating external tools and toolchain directories.
//!
//! Tools are declared in the manifest and resolved once, before any prompt:
//! a missing required tool stops the release, a missing optional one is
//! reported and the features that need it are skipped.

pub mod build_paths;
pub mod locator;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::manifest::ToolSpec;
use crate::process::ProcessError;

pub use build_paths::BuildPaths;
pub use locator::{CandidateLocator, EnvLocator, LocatorChain, PathLocator, ToolLocator};

#[derive(Debug, Error)]
pub enum LocateError {
  #[error("required tools not found: {}", .0.join(", "))]
  MissingRequired(Vec<String>),

  #[error("build path helper {script} failed with exit code {code:?}: {stderr}")]
  HelperFailed {
    script: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("build path '{name}' not reported by {script}")]
  MissingBuildPath { name: String, script: String },

  #[error(transparent)]
  Process(#[from] ProcessError),
}

/// Resolved tool directories, keyed by manifest name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolPaths {
  dirs: BTreeMap<String, PathBuf>,
}

impl ToolPaths {
  pub fn get(&self, name: &str) -> Option<&Path> {
    self.dirs.get(name).map(PathBuf::as_path)
  }

  pub fn insert(&mut self, name: impl Into<String>, dir: PathBuf) {
    self.dirs.insert(name.into(), dir);
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
    self.dirs.iter().map(|(n, d)| (n.as_str(), d.as_path()))
  }
}

/// Outcome of resolving every declared tool.
#[derive(Debug, Clone, Default)]
pub struct ToolResolution {
  pub found: ToolPaths,
  pub missing_required: Vec<String>,
  pub missing_optional: Vec<String>,
}

impl ToolResolution {
  pub fn is_complete(&self) -> bool {
    self.missing_required.is_empty()
  }

  /// The found tools, or an error naming every missing required tool.
  pub fn into_paths(self) -> Result<ToolPaths, LocateError> {
    if self.missing_required.is_empty() {
      Ok(self.found)
    } else {
      Err(LocateError::MissingRequired(self.missing_required))
    }
  }
}

/// Resolve every tool in `tools` with `locator`.
pub fn resolve_tools(tools: &BTreeMap<String, ToolSpec>, locator: &dyn ToolLocator) -> ToolResolution {
  let mut resolution = ToolResolution::default();

  for (name, spec) in tools {
    match locator.locate(name, spec) {
      Some(dir) => {
        info!(tool = %spec.display_name(name), dir = %dir.display(), "found tool");
        resolution.found.insert(name.clone(), dir);
      }
      None if spec.required => {
        warn!(tool = %spec.display_name(name), "required tool not found");
        resolution.missing_required.push(name.clone());
      }
      None => {
        warn!(tool = %spec.display_name(name), "optional tool not found");
        resolution.missing_optional.push(name.clone());
      }
    }
  }

  resolution
}

#[cfg(test)]
mod tests {
  use super::*;

  struct Fixed(&'static [&'static str]);

  impl ToolLocator for Fixed {
    fn locate(&self, name: &str, _spec: &ToolSpec) -> Option<PathBuf> {
      self.0.contains(&name).then(|| PathBuf::from("/tools").join(name))
    }
  }

  fn tools() -> BTreeMap<String, ToolSpec> {
    let mut tools = BTreeMap::new();
    tools.insert(
      "inno".to_string(),
      ToolSpec {
        required: true,
        ..Default::default()
      },
    );
    tools.insert(
      "qtcreator".to_string(),
      ToolSpec {
        required: true,
        ..Default::default()
      },
    );
    tools.insert("doxygen".to_string(), ToolSpec::default());
    tools
  }

  #[test]
  fn classifies_missing_tools() {
    let resolution = resolve_tools(&tools(), &Fixed(&["qtcreator"]));

    assert_eq!(resolution.found.get("qtcreator"), Some(Path::new("/tools/qtcreator")));
    assert_eq!(resolution.missing_required, vec!["inno"]);
    assert_eq!(resolution.missing_optional, vec!["doxygen"]);
    assert!(!resolution.is_complete());
  }

  #[test]
  fn missing_required_is_an_error() {
    let err = resolve_tools(&tools(), &Fixed(&["doxygen"])).into_paths().unwrap_err();
    assert_eq!(err.to_string(), "required tools not found: inno, qtcreator");
  }

  #[test]
  fn missing_optional_is_fine() {
    let paths = resolve_tools(&tools(), &Fixed(&["inno", "qtcreator"])).into_paths().unwrap();
    assert!(paths.get("doxygen").is_none());
    assert_eq!(paths.iter().count(), 2);
  }
}

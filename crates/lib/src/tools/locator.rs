//! Strategies for finding a tool installation directory.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::manifest::ToolSpec;
use crate::platform::paths::tool_env_var;

/// Finds the installation directory of a named tool.
pub trait ToolLocator {
  fn locate(&self, name: &str, spec: &ToolSpec) -> Option<PathBuf>;
}

/// `RELBUILD_TOOL_<NAME>` pointing at an existing directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvLocator;

impl ToolLocator for EnvLocator {
  fn locate(&self, name: &str, _spec: &ToolSpec) -> Option<PathBuf> {
    let var = tool_env_var(name);
    let value = std::env::var(&var).ok().filter(|v| !v.is_empty())?;
    let dir = PathBuf::from(value);

    if dir.is_dir() {
      debug!(tool = name, var = %var, dir = %dir.display(), "tool located through environment");
      Some(dir)
    } else {
      warn!(tool = name, var = %var, dir = %dir.display(), "override does not point at a directory, ignoring");
      None
    }
  }
}

/// The manifest's candidate directories.
///
/// The last existing candidate wins, so newer installations are listed
/// after older ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct CandidateLocator;

impl ToolLocator for CandidateLocator {
  fn locate(&self, name: &str, spec: &ToolSpec) -> Option<PathBuf> {
    let found = spec
      .candidates
      .iter()
      .rev()
      .map(Path::new)
      .find(|dir| dir.is_dir())
      .map(Path::to_path_buf);

    if let Some(dir) = &found {
      debug!(tool = name, dir = %dir.display(), "tool located from candidates");
    }
    found
  }
}

/// Search `PATH` for the tool's executable and use its directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathLocator;

impl ToolLocator for PathLocator {
  fn locate(&self, name: &str, spec: &ToolSpec) -> Option<PathBuf> {
    let executable = spec.executable.as_deref()?;
    match which::which(executable) {
      Ok(path) => {
        debug!(tool = name, path = %path.display(), "tool located on PATH");
        path.parent().map(Path::to_path_buf)
      }
      Err(e) => {
        debug!(tool = name, executable, error = %e, "not found on PATH");
        None
      }
    }
  }
}

/// Tries locators in order and returns the first hit.
pub struct LocatorChain {
  locators: Vec<Box<dyn ToolLocator>>,
}

impl LocatorChain {
  pub fn new(locators: Vec<Box<dyn ToolLocator>>) -> Self {
    Self { locators }
  }
}

impl Default for LocatorChain {
  /// Environment override, then candidates, then `PATH`.
  fn default() -> Self {
    Self::new(vec![Box::new(EnvLocator), Box::new(CandidateLocator), Box::new(PathLocator)])
  }
}

impl ToolLocator for LocatorChain {
  fn locate(&self, name: &str, spec: &ToolSpec) -> Option<PathBuf> {
    self.locators.iter().find_map(|l| l.locate(name, spec))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;
  use tempfile::TempDir;

  fn spec_with(candidates: &[&Path]) -> ToolSpec {
    ToolSpec {
      candidates: candidates.iter().map(|p| p.display().to_string()).collect(),
      ..Default::default()
    }
  }

  #[test]
  fn last_existing_candidate_wins() {
    let temp = TempDir::new().unwrap();
    let old = temp.path().join("qtcreator-3.5.1");
    let new = temp.path().join("qtcreator-3.6.0");
    let missing = temp.path().join("Tools").join("QtCreator");
    std::fs::create_dir_all(&old).unwrap();
    std::fs::create_dir_all(&new).unwrap();

    let spec = spec_with(&[&old, &new, &missing]);
    assert_eq!(CandidateLocator.locate("qtcreator", &spec), Some(new));
  }

  #[test]
  fn no_existing_candidate() {
    let temp = TempDir::new().unwrap();
    let spec = spec_with(&[&temp.path().join("nope")]);
    assert_eq!(CandidateLocator.locate("inno", &spec), None);
  }

  #[test]
  #[serial]
  fn env_override_wins_over_candidates() {
    let temp = TempDir::new().unwrap();
    let candidate = temp.path().join("candidate");
    let custom = temp.path().join("custom");
    std::fs::create_dir_all(&candidate).unwrap();
    std::fs::create_dir_all(&custom).unwrap();
    let spec = spec_with(&[&candidate]);

    temp_env::with_var("RELBUILD_TOOL_INNO", Some(custom.to_str().unwrap()), || {
      assert_eq!(LocatorChain::default().locate("inno", &spec), Some(custom.clone()));
    });
  }

  #[test]
  #[serial]
  fn env_override_to_missing_dir_is_ignored() {
    let temp = TempDir::new().unwrap();
    let candidate = temp.path().join("candidate");
    std::fs::create_dir_all(&candidate).unwrap();
    let spec = spec_with(&[&candidate]);
    let bogus = temp.path().join("bogus");

    temp_env::with_var("RELBUILD_TOOL_INNO", Some(bogus.to_str().unwrap()), || {
      assert_eq!(LocatorChain::default().locate("inno", &spec), Some(candidate.clone()));
    });
  }

  #[test]
  #[cfg(unix)]
  fn path_locator_returns_parent_directory() {
    let spec = ToolSpec {
      executable: Some("sh".to_string()),
      ..Default::default()
    };
    let dir = PathLocator.locate("shell", &spec).unwrap();
    assert!(dir.join("sh").exists());
  }

  #[test]
  fn path_locator_needs_executable() {
    assert_eq!(PathLocator.locate("x", &ToolSpec::default()), None);
  }
}

//! Toolchain directories reported by the project's build-path helper.
//!
//! The helper is a batch file that prints lines such as
//!
//! ```text
//! mingw: C:\Qt\Tools\mingw530_32\bin
//! qmake: C:\Qt\5.6\mingw49_32\bin
//! ```
//!
//! Only the first `:` separates name from value, so drive letters survive.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use super::LocateError;
use crate::platform::Arch;
use crate::process::{self, CommandSpec};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPaths {
  entries: Vec<(String, String)>,
}

impl BuildPaths {
  /// Parse helper output. Lines without a `name: value` shape are ignored.
  pub fn parse(output: &str) -> Self {
    let entries = output
      .lines()
      .filter_map(|line| {
        let (name, value) = line.split_once(':')?;
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
          return None;
        }
        Some((name.to_string(), value.trim().to_string()))
      })
      .collect();
    Self { entries }
  }

  /// Look up a value by name, falling back to the first entry whose name
  /// starts with `name`.
  pub fn get(&self, name: &str) -> Option<&str> {
    self
      .entries
      .iter()
      .find(|(n, _)| n == name)
      .or_else(|| self.entries.iter().find(|(n, _)| n.starts_with(name)))
      .map(|(_, v)| v.as_str())
      .filter(|v| !v.is_empty())
  }

  pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
    self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
  }

  /// Fail when any of `keys` is missing.
  ///
  /// The returned paths also carry every key under its exact name, so a key
  /// found through a prefix match resolves as a placeholder too.
  pub fn require(&self, keys: &[String], script: &str) -> Result<Self, LocateError> {
    let mut resolved = self.clone();
    for key in keys {
      let value = self.get(key).ok_or_else(|| LocateError::MissingBuildPath {
        name: key.clone(),
        script: script.to_string(),
      })?;
      if !self.entries.iter().any(|(n, _)| n == key) {
        debug!(name = %key, value, "build path found by prefix");
        resolved.entries.push((key.clone(), value.to_string()));
      }
    }
    Ok(resolved)
  }

  /// Run the helper for `arch` from `root` and parse what it prints.
  pub async fn fetch(root: &Path, script: &str, arch: Arch, timeout: Option<Duration>) -> Result<Self, LocateError> {
    info!(script, arch = %arch, "querying build paths");

    let spec = CommandSpec::shell(&format!("{script} {arch}"))
      .current_dir(root)
      .timeout(timeout);
    let output = process::output(&spec).await?;

    if !output.success() {
      return Err(LocateError::HelperFailed {
        script: script.to_string(),
        code: output.code,
        stderr: output.stderr,
      });
    }

    let paths = Self::parse(&output.stdout);
    for (name, value) in paths.entries() {
      debug!(name, value, "build path");
    }
    Ok(paths)
  }
}

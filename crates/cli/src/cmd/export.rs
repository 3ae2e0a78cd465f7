//! Implementation of the `relbuild export` command.

use std::path::Path;

use anyhow::{Context, Result};

use relbuild_lib::util::fs::mkdirs;
use relbuild_lib::vcs::Exporter;

use crate::output::{print_stat, print_success};

/// Export `src` from `repo` (or the current directory) into `dest`.
pub fn cmd_export(src: &str, dest: &Path, repo: Option<&Path>) -> Result<bool> {
  mkdirs(dest).with_context(|| format!("Failed to create {}", dest.display()))?;

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt
    .block_on(Exporter::default().export(src, dest, repo))
    .with_context(|| format!("Failed to export {src}"))?;

  print_success(&format!("Exported {src}"));
  print_stat("Target", &report.target.display().to_string());
  print_stat("Repositories", &report.archives.to_string());

  Ok(true)
}

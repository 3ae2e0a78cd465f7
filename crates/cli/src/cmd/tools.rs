//! Implementation of the `relbuild tools` command.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use relbuild_lib::manifest::Manifest;
use relbuild_lib::platform::Arch;
use relbuild_lib::tools::{BuildPaths, LocatorChain, resolve_tools};

use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success, print_warning};

#[derive(Debug, Serialize)]
struct ToolsReport {
  arch: &'static str,
  found: BTreeMap<String, String>,
  missing_required: Vec<String>,
  missing_optional: Vec<String>,
  build_paths: BTreeMap<String, String>,
  build_paths_error: Option<String>,
}

/// Resolve every tool the manifest declares and report where it was found.
///
/// Fails (exit status 1) when a required tool is missing.
pub fn cmd_tools(root: &Path, x86: bool, output: OutputFormat) -> Result<bool> {
  let manifest = Manifest::load(root).context("Failed to load release manifest")?;
  let arch = if x86 { Arch::X86 } else { Arch::X64 };

  let resolution = resolve_tools(&manifest.tools, &LocatorChain::default());

  let mut build_paths = BTreeMap::new();
  let mut build_paths_error = None;
  if let Some(script) = &manifest.helpers.build_paths {
    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
    match rt.block_on(BuildPaths::fetch(root, script, arch, None)) {
      Ok(paths) => {
        build_paths.extend(paths.entries().map(|(n, v)| (n.to_string(), v.to_string())));
        if let Err(e) = paths.require(&manifest.helpers.build_path_keys, script) {
          build_paths_error = Some(e.to_string());
        }
      }
      Err(e) => build_paths_error = Some(e.to_string()),
    }
  }

  let report = ToolsReport {
    arch: arch.as_str(),
    found: resolution
      .found
      .iter()
      .map(|(n, d)| (n.to_string(), d.display().to_string()))
      .collect(),
    missing_required: resolution.missing_required.clone(),
    missing_optional: resolution.missing_optional.clone(),
    build_paths,
    build_paths_error,
  };

  if output.is_json() {
    print_json(&report)?;
  } else {
    print_text(&report, &manifest);
  }

  Ok(resolution.is_complete() && report.build_paths_error.is_none())
}

fn print_text(report: &ToolsReport, manifest: &Manifest) {
  let name = |tool: &str| {
    manifest
      .tools
      .get(tool)
      .map_or(tool.to_string(), |spec| spec.display_name(tool).to_string())
  };

  print_info(&format!("Tools for a {} release", report.arch));
  for (tool, dir) in &report.found {
    print_stat(&name(tool), dir);
  }
  for tool in &report.missing_optional {
    print_warning(&format!("{} not found; features using it are skipped", name(tool)));
  }
  for tool in &report.missing_required {
    print_warning(&format!("{} not found (required)", name(tool)));
  }

  if !report.build_paths.is_empty() {
    println!();
    print_info("Build paths");
    for (key, value) in &report.build_paths {
      print_stat(key, value);
    }
  }
  if let Some(error) = &report.build_paths_error {
    print_warning(error);
  }

  if report.missing_required.is_empty() && report.build_paths_error.is_none() {
    print_success("All required tools found");
  }
}

//! Implementation of the `relbuild init` command.

use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;

use relbuild_lib::init::init;

use crate::output::symbols;

/// Write a `release.toml` template into `dir`.
///
/// # Errors
///
/// Returns an error if a manifest already exists or the directory cannot be
/// written.
pub fn cmd_init(dir: &Path) -> Result<bool> {
  let manifest = init(dir).context("Failed to write release manifest")?;

  println!(
    "{} {}",
    symbols::SUCCESS.green(),
    "Initialized release manifest!".green().bold()
  );
  println!();
  println!("  {} Manifest: {}", symbols::INFO.cyan(), manifest.display());
  println!();
  println!("{}", "Next steps:".bold());
  println!(
    "  1. Edit {} to match the installed toolchains",
    manifest.display().to_string().cyan()
  );
  println!("  2. Run: {}", "relbuild tools".cyan());
  println!("  3. Run: {}", "relbuild release".cyan());

  Ok(true)
}

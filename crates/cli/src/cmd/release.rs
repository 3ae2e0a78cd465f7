//! Implementation of the `relbuild release` command.
//!
//! Everything the release needs is asked up front: tools are located, the
//! operator answers the questions (or flags answer them), the summary is
//! confirmed, and only then is the working tree locked and touched.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use owo_colors::OwoColorize;
use tokio::runtime::Runtime;
use tracing::warn;

use relbuild_lib::config::{ReleaseAnswers, ReleaseConfig};
use relbuild_lib::consts::APP_NAME;
use relbuild_lib::lock::ReleaseLock;
use relbuild_lib::manifest::Manifest;
use relbuild_lib::pipeline::{Interaction, PipelineReport, Release, ValidationStatus, run_pipeline};
use relbuild_lib::platform::Arch;
use relbuild_lib::process::{self, CommandSpec};
use relbuild_lib::tools::{BuildPaths, LocatorChain, ToolPaths, resolve_tools};
use relbuild_lib::vcs::{find_repo_root, head_revision_stamp};

use crate::ReleaseArgs;
use crate::output::{
  format_elapsed, print_error, print_info, print_stat, print_success, print_warning, symbols, yes_no,
};
use crate::prompts::{self, CliInteraction};

/// Run an interactive release of the project at `args.root`.
///
/// Returns whether the release completed. Errors are printed before the
/// closing pause.
pub fn cmd_release(args: &ReleaseArgs) -> Result<bool> {
  let interaction = CliInteraction {
    assume_yes: args.yes,
    no_pause: args.no_pause,
  };

  let completed = match run_release(args, &interaction) {
    Ok(completed) => completed,
    Err(e) => {
      print_error(&format!("{e:#}"));
      false
    }
  };

  interaction.pause("Press enter to continue...");
  Ok(completed)
}

fn run_release(args: &ReleaseArgs, interaction: &CliInteraction) -> Result<bool> {
  let root = std::path::absolute(&args.root).with_context(|| format!("Invalid project root {}", args.root.display()))?;
  let manifest = Manifest::load(&root).context("Failed to load release manifest")?;
  let rt = Runtime::new().context("Failed to create async runtime")?;

  let arch = if args.x86 || prompts::ask_yes_no("Do you want to build a 32-bit release?", false)? {
    Arch::X86
  } else {
    Arch::X64
  };

  let tools = locate_tools(&manifest)?;
  let build_paths = fetch_build_paths(&rt, &root, &manifest, arch)?;

  let version = match &args.version {
    Some(version) => version.clone(),
    None => prompts::ask_text("Enter version number (empty for a dev build)", "")?,
  };
  let revision = match &args.revision {
    Some(revision) => revision.clone(),
    None => ask_revision(&rt, &root, &manifest)?,
  };

  let build_msvc = match (args.msvc_answer(), &manifest.build.msvc) {
    (_, None) => false,
    (Some(answer), Some(_)) => answer,
    (None, Some(_)) => prompts::ask_yes_no(
      &format!("Do you want to build VC++ {}Core?", manifest.product.name),
      false,
    )?,
  };
  let include_compiler = match &manifest.installer.compiler {
    None => false,
    Some(_) => args.include_compiler || prompts::ask_yes_no("Do you want to include the compiler?", false)?,
  };

  let answers = ReleaseAnswers {
    arch,
    version,
    revision,
    build_msvc,
    include_compiler,
  };
  let config = ReleaseConfig::new(&root, &manifest, &answers).context("Failed to configure release")?;

  print_summary(&config);
  if !confirm_release(args.yes)? {
    print_info("Release cancelled");
    return Ok(false);
  }

  let command = std::env::args().collect::<Vec<_>>().join(" ");
  let lock = ReleaseLock::acquire(&root, &command).context("Failed to lock working tree")?;

  let placeholders = config.placeholders(&build_paths, &tools);

  let started = Instant::now();
  let mut release = Release::new(&manifest, &config, &placeholders, interaction);
  let report = rt.block_on(run_pipeline(&mut release, interaction));
  drop(lock);

  print_report(&report, &config);
  print_stat("Elapsed", &format_elapsed(started.elapsed()));
  Ok(report.succeeded())
}

fn locate_tools(manifest: &Manifest) -> Result<ToolPaths> {
  let resolution = resolve_tools(&manifest.tools, &LocatorChain::default());
  for name in &resolution.missing_optional {
    let spec = &manifest.tools[name];
    print_warning(&format!("{} not found; features using it are skipped", spec.display_name(name)));
  }
  resolution
    .into_paths()
    .with_context(|| format!("Run `{APP_NAME} tools` to see where tools are searched"))
}

fn fetch_build_paths(rt: &Runtime, root: &Path, manifest: &Manifest, arch: Arch) -> Result<BuildPaths> {
  let Some(script) = &manifest.helpers.build_paths else {
    return Ok(BuildPaths::default());
  };

  let paths = rt
    .block_on(BuildPaths::fetch(root, script, arch, None))
    .context("Failed to query build paths")?;
  Ok(paths.require(&manifest.helpers.build_path_keys, script)?)
}

/// Show the revision helper, then ask with the `HEAD` commit date as default.
fn ask_revision(rt: &Runtime, root: &Path, manifest: &Manifest) -> Result<String> {
  if let Some(helper) = &manifest.helpers.revision {
    let spec = CommandSpec::shell(helper).current_dir(root);
    match rt.block_on(process::output(&spec)) {
      Ok(output) => print!("{}", output.stdout),
      Err(e) => warn!(helper = %helper, error = %e, "revision helper failed"),
    }
  }

  let default = find_repo_root(root)
    .map(|repo| head_revision_stamp(&repo))
    .transpose()
    .unwrap_or_else(|e| {
      warn!(error = %e, "could not read HEAD commit date");
      None
    })
    .unwrap_or_default();

  Ok(prompts::ask_text("Enter revision number", &default)?)
}

fn confirm_release(assume_yes: bool) -> Result<bool> {
  if assume_yes {
    return Ok(true);
  }
  if !prompts::is_interactive() {
    bail!("Cannot prompt for confirmation in non-interactive mode. Use --yes to proceed.");
  }
  Ok(prompts::ask_yes_no("Is this OK?", false)?)
}

fn print_summary(config: &ReleaseConfig) {
  println!();
  println!("{}", "Release".bold());
  print_stat("Product", &config.product);
  print_stat("Version", &config.full_version());
  print_stat("Dev build", yes_no(config.dev_build));
  print_stat("Architecture", config.arch.as_str());
  print_stat("Build MSVC", yes_no(config.build_msvc));
  print_stat("Include compiler", yes_no(config.include_compiler));
  print_stat("Staging", &config.staging_dir.display().to_string());
  print_stat("Output", &config.output_dir.display().to_string());
  println!();
}

fn print_report(report: &PipelineReport, config: &ReleaseConfig) {
  println!();
  let phases: Vec<&str> = report.completed.iter().map(|p| p.as_str()).collect();
  print_stat("Completed", &phases.join(&format!(" {} ", symbols::ARROW)));

  match &report.validation {
    ValidationStatus::NotRun => {}
    ValidationStatus::Passed => print_success("Validation passed"),
    ValidationStatus::Failed(reason) => print_warning(&format!("Validation failed: {reason}")),
  }

  if let Some(error) = &report.cleanup_error {
    print_error(&format!("Cleanup failed: {error}"));
  }

  match &report.failure {
    Some(failure) => print_error(&format!("Release failed in {}: {}", failure.phase, failure.reason)),
    None if report.succeeded() => {
      print_success(&format!("Released {}", config.release_name()));
      print_stat("Packages", &config.output_dir.display().to_string());
    }
    None => {}
  }
}

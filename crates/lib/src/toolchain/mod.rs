//! Toolchain invocation and artifact verification.
//!
//! Compilers run inside generated batch scripts. Their exit status is not
//! trusted: a build succeeded when the artifacts it was meant to produce
//! exist afterwards.

pub mod scripts;

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::ReleaseConfig;
use crate::manifest::{Build, CommandBuild, MingwBuild, MsvcBuild};
use crate::placeholder::{PlaceholderError, Placeholders, Resolver};
use crate::platform::Arch;
use crate::prepare::{EditError, apply_edits};
use crate::process::{self, CommandSpec, ProcessError};
use crate::util::fs::{FsError, mkdirs, move_into, remove_dir_all_force, remove_file_if_exists};

pub use scripts::{MINGW_SCRIPT, MSVC_SCRIPT, MingwScript, MsvcScript};

#[derive(Debug, Error)]
pub enum BuildError {
  #[error("{toolchain} did not produce {}", path.display())]
  MissingArtifact { toolchain: String, path: PathBuf },

  #[error(transparent)]
  Edit(#[from] EditError),

  #[error(transparent)]
  Placeholder(#[from] PlaceholderError),

  #[error(transparent)]
  Process(#[from] ProcessError),

  #[error(transparent)]
  Fs(#[from] FsError),
}

/// Toolchains that ran and produced their artifacts, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
  pub built: Vec<String>,
}

/// `bin` subdirectory receiving one MSVC core build.
pub fn msvc_output_dir_name(version: &str, arch: Arch) -> String {
  format!("MSVC{version}_{arch}")
}

/// Run every configured toolchain, stopping at the first failure.
pub async fn build_all(
  build: &Build,
  config: &ReleaseConfig,
  placeholders: &Placeholders,
) -> Result<BuildReport, BuildError> {
  let timeout = build.timeout_secs.map(Duration::from_secs);
  let mut report = BuildReport::default();

  if let Some(msvc) = &build.msvc {
    apply_edits(&config.root, &msvc.edits, config.dev_build, placeholders)?;
    if config.build_msvc {
      build_msvc(msvc, config, placeholders, timeout, &mut report).await?;
    } else {
      remove_msvc_outputs(msvc, &config.bin_dir)?;
    }
  }

  if let Some(mingw) = &build.mingw {
    apply_edits(&config.root, &mingw.edits, config.dev_build, placeholders)?;
    build_mingw(mingw, config, placeholders, timeout).await?;
    report.built.push("MinGW".to_string());
  }

  for command in &build.commands {
    run_command_build(command, config, placeholders, timeout).await?;
    report.built.push(command.name.clone());
  }

  Ok(report)
}

async fn build_msvc(
  msvc: &MsvcBuild,
  config: &ReleaseConfig,
  placeholders: &Placeholders,
  timeout: Option<Duration>,
  report: &mut BuildReport,
) -> Result<(), BuildError> {
  for variant in &msvc.variants {
    let sdk_dir = match placeholders.resolve_tool(&variant.tool) {
      Ok(dir) => PathBuf::from(dir),
      Err(_) => {
        warn!(version = %variant.version, tool = %variant.tool, "SDK not located, skipping MSVC build");
        continue;
      }
    };

    for arch in &variant.archs {
      build_msvc_variant(msvc, &variant.version, *arch, &sdk_dir, config, placeholders, timeout).await?;
      report.built.push(format!("MSVC{} {}", variant.version, arch));
    }
  }
  Ok(())
}

/// Build the core library with one SDK for one architecture and move the
/// artifacts into `bin/MSVC<ver>_<arch>`.
#[allow(clippy::too_many_arguments)]
pub async fn build_msvc_variant(
  msvc: &MsvcBuild,
  version: &str,
  arch: Arch,
  sdk_dir: &Path,
  config: &ReleaseConfig,
  placeholders: &Placeholders,
  timeout: Option<Duration>,
) -> Result<PathBuf, BuildError> {
  let toolchain = format!("MSVC{version} {arch}");
  info!(toolchain = %toolchain, "compiling core library");

  for artifact in &msvc.artifacts {
    remove_file_if_exists(&config.bin_dir.join(artifact))?;
  }

  let build_dir = config.root.join(&msvc.build_dir);
  remove_dir_all_force(&build_dir)?;
  mkdirs(&build_dir)?;

  let jom = placeholders.expand(&msvc.jom)?;
  let qmake = placeholders.expand(&msvc.qmake)?;
  let project = config.root.join(&msvc.project);
  let script = MsvcScript {
    sdk_dir,
    arch,
    version,
    build_dir: &build_dir,
    project: &project,
    jom: &jom,
    qmake: &qmake,
    extra_qmake_args: &msvc.extra_qmake_args,
  }
  .render();

  let output = script.run(&config.root.join(MSVC_SCRIPT), &config.root, timeout).await?;
  if !output.success() {
    warn!(toolchain = %toolchain, code = ?output.code, "compile script exited unsuccessfully");
  }

  remove_dir_all_force(&build_dir)?;
  verify_artifacts(&toolchain, &config.bin_dir, &msvc.artifacts)?;

  let target = config.bin_dir.join(msvc_output_dir_name(version, arch));
  remove_dir_all_force(&target)?;
  mkdirs(&target)?;
  for artifact in &msvc.artifacts {
    move_into(&config.bin_dir.join(artifact), &target)?;
  }

  info!(toolchain = %toolchain, dir = %target.display(), "core library built");
  Ok(target)
}

/// Remove stale MSVC outputs when the MSVC build was declined.
pub fn remove_msvc_outputs(msvc: &MsvcBuild, bin_dir: &Path) -> Result<(), BuildError> {
  for variant in &msvc.variants {
    for arch in &variant.archs {
      remove_dir_all_force(&bin_dir.join(msvc_output_dir_name(&variant.version, *arch)))?;
    }
  }
  Ok(())
}

/// Build the application with MinGW from a fresh build directory.
pub async fn build_mingw(
  mingw: &MingwBuild,
  config: &ReleaseConfig,
  placeholders: &Placeholders,
  timeout: Option<Duration>,
) -> Result<(), BuildError> {
  info!("compiling with MinGW");

  let build_dir = config.root.join(&mingw.build_dir);
  remove_dir_all_force(&build_dir)?;
  mkdirs(&build_dir)?;

  let project = config.root.join(&mingw.project);
  let script = MingwScript {
    mingw_dir: placeholders.resolve_var("mingw")?,
    qmake_dir: placeholders.resolve_var("qmake")?,
    project: &project,
    mkspec: &mingw.mkspec,
    jobs: mingw.jobs,
  }
  .render();

  let output = script.run(&config.root.join(MINGW_SCRIPT), &build_dir, timeout).await?;
  if !output.success() {
    warn!(code = ?output.code, "compile script exited unsuccessfully");
  }

  verify_artifacts("MinGW", &config.bin_dir, &mingw.artifacts)?;
  info!("MinGW build finished");
  Ok(())
}

/// Run a generic toolchain command and check its artifacts below the root.
pub async fn run_command_build(
  command: &CommandBuild,
  config: &ReleaseConfig,
  placeholders: &Placeholders,
  timeout: Option<Duration>,
) -> Result<(), BuildError> {
  info!(toolchain = %command.name, "running build command");

  let run = placeholders.expand(&command.run)?;
  let dir = match &command.dir {
    Some(dir) => config.root.join(placeholders.expand(dir)?),
    None => config.root.clone(),
  };

  let spec = CommandSpec::shell(&run)
    .current_dir(dir)
    .timeout(timeout)
    .stream_output(true);
  let output = process::output(&spec).await?;
  if !output.success() {
    warn!(toolchain = %command.name, code = ?output.code, "build command exited unsuccessfully");
  }

  let artifacts = command
    .artifacts
    .iter()
    .map(|a| placeholders.expand(a))
    .collect::<Result<Vec<_>, _>>()?;
  verify_artifacts(&command.name, &config.root, &artifacts)
}

/// Fail with the first artifact missing below `dir`.
pub fn verify_artifacts(toolchain: &str, dir: &Path, artifacts: &[String]) -> Result<(), BuildError> {
  for artifact in artifacts {
    let path = dir.join(artifact);
    if !path.is_file() {
      return Err(BuildError::MissingArtifact {
        toolchain: toolchain.to_string(),
        path,
      });
    }
  }
  Ok(())
}

//! Release packages: zip archive, installer executable, and the same pair
//! again with the bundled compiler.

pub mod archive;
pub mod inno;

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{PackageKind, ReleaseConfig};
use crate::manifest::{BundledCompiler, Installer};
use crate::placeholder::{PlaceholderError, Placeholders, Resolver};
use crate::process::ProcessError;
use crate::util::fs::{FsError, copy_dir_to, copy_file_to_dir, move_path};

pub use archive::zip_directory;
pub use inno::InnoInvocation;

#[derive(Debug, Error)]
pub enum PackageError {
  #[error("{} is not a directory", .0.display())]
  NotADirectory(PathBuf),

  #[error("package was not created: {}", .0.display())]
  MissingPackage(PathBuf),

  #[error("io error on {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to traverse {}: {source}", path.display())]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("zip error: {0}")]
  Zip(#[from] ::zip::result::ZipError),

  #[error(transparent)]
  Process(#[from] ProcessError),

  #[error(transparent)]
  Placeholder(#[from] PlaceholderError),

  #[error(transparent)]
  Fs(#[from] FsError),
}

/// Packages written to the output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageReport {
  pub packages: Vec<PathBuf>,
  pub release_notes: Option<PathBuf>,
}

/// Create every configured package from the staging tree.
pub async fn create_packages(
  installer: &Installer,
  config: &ReleaseConfig,
  placeholders: &Placeholders,
  timeout: Option<Duration>,
) -> Result<PackageReport, PackageError> {
  let mut report = PackageReport::default();

  package_set(installer, config, placeholders, false, timeout, &mut report).await?;

  if config.include_compiler {
    match &installer.compiler {
      Some(compiler) => {
        bundle_compiler(compiler, config, placeholders)?;
        package_set(installer, config, placeholders, true, timeout, &mut report).await?;
      }
      None => warn!("no bundled compiler configured, skipping compiler packages"),
    }
  }

  if let Some(notes) = &installer.release_notes {
    match copy_file_to_dir(&config.root, notes, &config.output_dir, false) {
      Ok(path) => report.release_notes = Some(path),
      Err(FsError::SourceMissing(path)) => warn!(path = %path.display(), "release notes not found"),
      Err(e) => return Err(e.into()),
    }
  }

  Ok(report)
}

async fn package_set(
  installer: &Installer,
  config: &ReleaseConfig,
  placeholders: &Placeholders,
  with_compiler: bool,
  timeout: Option<Duration>,
  report: &mut PackageReport,
) -> Result<(), PackageError> {
  if installer.zip {
    let zip_path = config
      .output_dir
      .join(config.package_name(PackageKind::Zip, with_compiler));
    zip_directory(&config.staging_dir, &zip_path)?;
    if !zip_path.is_file() {
      return Err(PackageError::MissingPackage(zip_path));
    }
    info!(package = %zip_path.display(), "created zip package");
    report.packages.push(zip_path);
  }

  if let Some(inno) = &installer.inno {
    let tool_dir = PathBuf::from(placeholders.resolve_tool(&inno.tool)?);
    let invocation = InnoInvocation::for_release(
      config,
      config.package_name(PackageKind::Installer, with_compiler),
      &inno.script,
    );
    let exe = invocation.run(&tool_dir, &inno.compiler, &config.root, timeout).await?;
    info!(package = %exe.display(), "created installer");
    report.packages.push(exe);
  }

  Ok(())
}

/// Copy the compiler installation into the staging tree under its
/// per-architecture name (`mingw64` for 64-bit releases).
pub fn bundle_compiler(
  compiler: &BundledCompiler,
  config: &ReleaseConfig,
  placeholders: &Placeholders,
) -> Result<PathBuf, PackageError> {
  let from = config.root.join(placeholders.expand(&compiler.from)?);
  let from = dunce::canonicalize(&from).map_err(|e| PackageError::Io { path: from, source: e })?;

  info!(compiler = %from.display(), "copying compiler");
  let copied = copy_dir_to(&from, &config.staging_dir)?;
  let target = config.staging_dir.join(compiler.name.get(config.arch));
  move_path(&copied, &target)?;
  Ok(target)
}

//! Assembling the staging tree that gets packaged.
//!
//! The tree is built from scratch on every run: stale content from an
//! earlier attempt is removed first. Items are either plain copies from the
//! working tree (built binaries, generated documentation) or clean exports of
//! tracked content. Once complete, a marker file goes into every directory
//! and every file is made read-only.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::ReleaseConfig;
use crate::manifest::{Docs, Stage, StageItem, StageKind};
use crate::placeholder::{PlaceholderError, Placeholders};
use crate::platform::immutable::{ImmutableError, make_read_only};
use crate::process::{self, CommandSpec, ProcessError};
use crate::util::fs::{FsError, copy_dir_to, copy_file_to_dir, mkdirs, remove_dir_all_force};
use crate::vcs::{ExportError, Exporter};

#[derive(Debug, Error)]
pub enum StageError {
  #[error("failed to stage {src}: {source}")]
  Item {
    src: String,
    #[source]
    source: Box<StageError>,
  },

  #[error(transparent)]
  Export(#[from] ExportError),

  #[error(transparent)]
  Fs(#[from] FsError),

  #[error(transparent)]
  Process(#[from] ProcessError),

  #[error(transparent)]
  Placeholder(#[from] PlaceholderError),

  #[error(transparent)]
  ReadOnly(#[from] ImmutableError),

  #[error("failed to write marker {}: {source}", path.display())]
  Marker {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// What ended up in the staging tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
  pub dir: PathBuf,
  pub staged: usize,
  pub skipped: usize,
  pub markers: usize,
  pub read_only_files: usize,
}

/// Build the staging tree at `config.staging_dir`.
pub async fn stage_release(
  stage: &Stage,
  config: &ReleaseConfig,
  placeholders: &Placeholders,
  exporter: &Exporter,
  timeout: Option<Duration>,
) -> Result<StageReport, StageError> {
  let staging = &config.staging_dir;
  info!(dir = %staging.display(), "assembling staging tree");

  remove_dir_all_force(staging)?;
  mkdirs(staging)?;
  for dir in &stage.dirs {
    mkdirs(&staging.join(dir))?;
  }

  if let Some(docs) = &stage.docs {
    build_docs(docs, &config.root, placeholders, timeout).await?;
  }

  let mut report = StageReport {
    dir: staging.clone(),
    ..Default::default()
  };

  for item in &stage.items {
    match stage_item(item, config, exporter).await {
      Ok(target) => {
        debug!(src = %item.src, target = %target.display(), "staged");
        report.staged += 1;
      }
      Err(e) if item.optional => {
        warn!(src = %item.src, error = %e, "optional item not staged");
        report.skipped += 1;
      }
      Err(e) => {
        return Err(StageError::Item {
          src: item.src.clone(),
          source: Box::new(e),
        });
      }
    }
  }

  report.markers = write_markers(staging, &stage.marker)?;
  if stage.read_only {
    report.read_only_files = make_read_only(staging)?;
  }

  info!(
    staged = report.staged,
    skipped = report.skipped,
    markers = report.markers,
    "staging tree complete"
  );
  Ok(report)
}

/// Run the documentation build. Failure only warns.
async fn build_docs(
  docs: &Docs,
  root: &Path,
  placeholders: &Placeholders,
  timeout: Option<Duration>,
) -> Result<(), StageError> {
  let run = placeholders.expand(&docs.run)?;
  let spec = CommandSpec::shell(&run).current_dir(root).timeout(timeout);

  match process::output(&spec).await {
    Ok(output) if !output.success() => warn!(code = ?output.code, "documentation build failed"),
    Ok(_) => {}
    Err(e) => warn!(error = %e, "documentation build failed"),
  }

  if let Some(check) = &docs.check
    && !root.join(check).is_file()
  {
    warn!(file = %check, "documentation was not generated");
  }
  Ok(())
}

async fn stage_item(item: &StageItem, config: &ReleaseConfig, exporter: &Exporter) -> Result<PathBuf, StageError> {
  let dest = config.staging_dir.join(&item.dest);

  match item.kind {
    StageKind::Copy => {
      let src = config.root.join(&item.src);
      if src.is_file() {
        let name = src
          .file_name()
          .map(|n| n.to_string_lossy().into_owned())
          .ok_or_else(|| FsError::SourceMissing(src.clone()))?;
        let dir = src.parent().unwrap_or(&config.root);
        Ok(copy_file_to_dir(dir, &name, &dest, false)?)
      } else {
        Ok(copy_dir_to(&src, &dest)?)
      }
    }
    StageKind::Export => {
      mkdirs(&dest)?;
      let report = exporter.export(&item.src, &dest, Some(&config.root)).await?;
      Ok(report.target)
    }
  }
}

/// Write `marker` as an empty file into every directory below `root`.
///
/// Returns the number of markers written. An empty marker name disables
/// this step.
pub fn write_markers(root: &Path, marker: &str) -> Result<usize, StageError> {
  if marker.is_empty() {
    return Ok(0);
  }

  let dirs: Vec<PathBuf> = WalkDir::new(root)
    .into_iter()
    .filter_map(Result::ok)
    .filter(|e| e.file_type().is_dir())
    .map(|e| e.into_path())
    .collect();

  for dir in &dirs {
    let path = dir.join(marker);
    std::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(&path)
      .map_err(|e| StageError::Marker { path, source: e })?;
  }

  Ok(dirs.len())
}

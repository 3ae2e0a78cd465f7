//! Version-control access: repository discovery, clean exports of tracked
//! content and the default revision stamp.
//!
//! Exports shell out to `git archive` because only git itself knows exactly
//! what is tracked at `HEAD`; the revision stamp reads the repository
//! directly through gix.

mod export;
mod tree;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::consts::REPO_MARKER;

pub use export::{ExportError, ExportReport, Exporter};
pub use tree::{NestedRepository, NodeKind, SourceNode};

/// How a directory is marked as the root of a working tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoMarker {
  /// `.git` is a directory.
  Repository,
  /// `.git` is a file pointing elsewhere (submodules, worktrees).
  Submodule,
}

/// The marker in `dir`, if it is a repository root.
pub fn marker(dir: &Path) -> Option<RepoMarker> {
  let git = dir.join(REPO_MARKER);
  if git.is_dir() {
    Some(RepoMarker::Repository)
  } else if git.is_file() {
    Some(RepoMarker::Submodule)
  } else {
    None
  }
}

/// Nearest directory at or above `path` that is a repository root.
pub fn find_repo_root(path: &Path) -> Option<PathBuf> {
  path.ancestors().find(|p| marker(p).is_some()).map(Path::to_path_buf)
}

#[derive(Debug, Error)]
pub enum RevisionError {
  #[error("failed to open repository at {}: {source}", path.display())]
  Open {
    path: PathBuf,
    #[source]
    source: Box<gix::open::Error>,
  },

  #[error("failed to resolve HEAD: {0}")]
  ResolveHead(String),

  #[error("commit time {0} is out of range")]
  InvalidTime(i64),
}

/// `HEAD` commit date as `YYYYmmdd.HHMM` in the committer's time zone.
///
/// Offered as the default revision number.
pub fn head_revision_stamp(repo: &Path) -> Result<String, RevisionError> {
  let repository = gix::open(repo).map_err(|e| RevisionError::Open {
    path: repo.to_path_buf(),
    source: Box::new(e),
  })?;

  let commit = repository
    .head_commit()
    .map_err(|e| RevisionError::ResolveHead(e.to_string()))?;
  let time = commit.time().map_err(|e| RevisionError::ResolveHead(e.to_string()))?;

  let offset = chrono::FixedOffset::east_opt(time.offset).ok_or(RevisionError::InvalidTime(time.seconds))?;
  let stamp = chrono::DateTime::from_timestamp(time.seconds, 0)
    .ok_or(RevisionError::InvalidTime(time.seconds))?
    .with_timezone(&offset);

  Ok(stamp.format("%Y%m%d.%H%M").to_string())
}

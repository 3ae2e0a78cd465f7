//! Clean exports of tracked content through `git archive`.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::tree::{NodeKind, SourceNode};
use crate::process::{self, CommandSpec, ProcessError};
use crate::util::fs::{FsError, last_component, mkdirs};

#[derive(Debug, Error)]
pub enum ExportError {
  #[error("export source does not exist: {}", .0.display())]
  SourceMissing(PathBuf),

  #[error("{} is not inside a repository", .0.display())]
  NotARepository(PathBuf),

  #[error("failed to resolve {}: {source}", path.display())]
  Canonicalize {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to scan {} for nested repositories: {source}", path.display())]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },

  #[error("git archive failed in {} with exit code {code:?}: {stderr}", repo.display())]
  Archive {
    repo: PathBuf,
    code: Option<i32>,
    stderr: String,
  },

  #[error("failed to create temporary archive: {0}")]
  TempFile(#[source] std::io::Error),

  #[error("failed to unpack archive into {}: {source}", dest.display())]
  Unpack {
    dest: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Fs(#[from] FsError),

  #[error(transparent)]
  Process(#[from] ProcessError),
}

/// What an export produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
  /// The exported file or directory in the destination.
  pub target: PathBuf,
  /// Archives taken, one per repository involved.
  pub archives: usize,
}

/// Exports tracked content at `HEAD` into a destination directory.
///
/// Existing files in the destination are overwritten without any conflict
/// check; exporting into an empty destination is reproducible.
#[derive(Debug, Clone)]
pub struct Exporter {
  git: String,
}

impl Default for Exporter {
  fn default() -> Self {
    Self { git: "git".to_string() }
  }
}

impl Exporter {
  pub fn new(git: impl Into<String>) -> Self {
    Self { git: git.into() }
  }

  /// Export `src` (relative to `repo_dir`, or the current directory) into
  /// `dst_dir`.
  ///
  /// A file lands at `<dst_dir>/<file name>`, a directory at
  /// `<dst_dir>/<last component>`. Nested repositories below a directory are
  /// exported into the mirrored location. The first failure aborts the whole
  /// export.
  pub async fn export(&self, src: &str, dst_dir: &Path, repo_dir: Option<&Path>) -> Result<ExportReport, ExportError> {
    let repo_dir = match repo_dir {
      Some(dir) => dir.to_path_buf(),
      None => std::env::current_dir().map_err(|e| ExportError::Canonicalize {
        path: PathBuf::from("."),
        source: e,
      })?,
    };

    let src = src.trim_end_matches(['/', '\\']);
    let node = SourceNode::discover(&repo_dir, Path::new(src))?;

    info!(src, dest = %dst_dir.display(), "exporting");
    let target = self.export_node(&node, dst_dir).await?;

    Ok(ExportReport {
      target,
      archives: node.archive_count(),
    })
  }

  /// Export an already discovered node and everything nested in it.
  pub async fn export_node(&self, node: &SourceNode, dst_dir: &Path) -> Result<PathBuf, ExportError> {
    let location = node.location();
    let name = last_component(&location)
      .map(|n| n.to_os_string())
      .ok_or_else(|| ExportError::SourceMissing(location.clone()))?;

    let (args, unpack_into, target) = match node.kind {
      NodeKind::File => {
        let file = to_git_path(Path::new(&name));
        let tree = match node.path.parent().filter(|p| !p.as_os_str().is_empty()) {
          Some(dir) => format!("HEAD:{}", to_git_path(dir)),
          None => "HEAD".to_string(),
        };
        (vec![tree, file], dst_dir.to_path_buf(), dst_dir.join(&name))
      }
      NodeKind::Directory => {
        let target = dst_dir.join(&name);
        (vec![format!("HEAD:{}", to_git_path(&node.path))], target.clone(), target)
      }
      NodeKind::Repository => {
        info!(repository = %location.display(), dest = %dst_dir.display(), "exporting repository");
        let target = dst_dir.join(&name);
        (vec!["HEAD".to_string()], target.clone(), target)
      }
    };

    self.archive_and_unpack(&node.repo, &args, &unpack_into).await?;

    for nested in &node.nested {
      let parent = match nested.relative.parent() {
        Some(parent) => target.join(parent),
        None => target.clone(),
      };
      Box::pin(self.export_node(&nested.node, &parent)).await?;
    }

    Ok(target)
  }

  async fn archive_and_unpack(&self, repo: &Path, tree_args: &[String], dest: &Path) -> Result<(), ExportError> {
    let temp_dir = tempfile::tempdir().map_err(ExportError::TempFile)?;
    let archive = tempfile::Builder::new()
      .prefix("export-")
      .suffix(".tar")
      .tempfile_in(temp_dir.path())
      .map_err(ExportError::TempFile)?
      .into_temp_path();

    let spec = CommandSpec::new(&self.git)
      .args(["archive", "--format=tar"])
      .args(tree_args)
      .arg("-o")
      .arg(archive.as_os_str())
      .current_dir(repo);

    let output = process::output(&spec).await?;
    if !output.success() {
      return Err(ExportError::Archive {
        repo: repo.to_path_buf(),
        code: output.code,
        stderr: output.stderr,
      });
    }

    mkdirs(dest)?;
    debug!(archive = %archive.display(), dest = %dest.display(), "unpacking");

    let file = std::fs::File::open(&archive).map_err(|e| ExportError::Unpack {
      dest: dest.to_path_buf(),
      source: e,
    })?;
    let mut tar = tar::Archive::new(file);
    tar.set_preserve_mtime(true);
    tar.set_overwrite(true);
    tar.unpack(dest).map_err(|e| ExportError::Unpack {
      dest: dest.to_path_buf(),
      source: e,
    })?;

    Ok(())
  }
}

/// Tree-ish paths always use forward slashes.
fn to_git_path(path: &Path) -> String {
  path.to_string_lossy().replace('\\', "/")
}

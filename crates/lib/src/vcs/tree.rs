//! The shape of an export, discovered before anything is archived.
//!
//! `git archive` of a parent repository does not descend into nested
//! repositories, so every nested working tree below the exported path is
//! recorded up front and exported on its own afterwards.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::export::ExportError;
use super::{find_repo_root, marker};
use crate::consts::REPO_MARKER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
  /// A single tracked file, archived as `HEAD:<dir> <file>`.
  File,
  /// A directory of its repository, archived as `HEAD:<path>`.
  Directory,
  /// The root of a repository, archived as `HEAD` from inside it.
  Repository,
}

/// One thing to export: where it lives and which repository owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceNode {
  pub kind: NodeKind,
  /// Root of the owning repository.
  pub repo: PathBuf,
  /// Path relative to `repo`; empty for [`NodeKind::Repository`].
  pub path: PathBuf,
  pub nested: Vec<NestedRepository>,
}

/// A repository found below an exported directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedRepository {
  /// Location relative to the directory that contains it.
  pub relative: PathBuf,
  pub node: SourceNode,
}

impl SourceNode {
  /// Describe the export of `src` (relative to `repo_dir`).
  ///
  /// When `src` lies inside a nested repository it is rebased onto that
  /// repository's root, so the archive is taken from the repository that
  /// actually tracks it.
  pub fn discover(repo_dir: &Path, src: &Path) -> Result<Self, ExportError> {
    let repo_dir = canonical(repo_dir)?;
    let abs = repo_dir.join(src);
    if !abs.exists() {
      return Err(ExportError::SourceMissing(abs));
    }
    let abs = canonical(&abs)?;

    let owner = find_repo_root(&abs).ok_or_else(|| ExportError::NotARepository(abs.clone()))?;

    if owner == abs && abs.is_dir() {
      return Self::repository(&abs);
    }

    if owner != repo_dir {
      let rebased = abs.strip_prefix(&owner).unwrap_or(&abs);
      debug!(
        src = %src.display(),
        repository = %owner.display(),
        rebased = %rebased.display(),
        "path belongs to a nested repository"
      );
      return Self::discover(&owner, rebased);
    }

    let path = abs.strip_prefix(&repo_dir).unwrap_or(&abs).to_path_buf();

    if abs.is_file() {
      return Ok(Self {
        kind: NodeKind::File,
        repo: repo_dir,
        path,
        nested: Vec::new(),
      });
    }

    Ok(Self {
      kind: NodeKind::Directory,
      nested: nested_repositories(&abs)?,
      repo: repo_dir,
      path,
    })
  }

  /// Describe the export of a whole repository rooted at `root`.
  pub fn repository(root: &Path) -> Result<Self, ExportError> {
    let root = canonical(root)?;
    Ok(Self {
      kind: NodeKind::Repository,
      nested: nested_repositories(&root)?,
      repo: root,
      path: PathBuf::new(),
    })
  }

  /// Absolute location in the working tree.
  pub fn location(&self) -> PathBuf {
    if self.path.as_os_str().is_empty() {
      self.repo.clone()
    } else {
      self.repo.join(&self.path)
    }
  }

  /// Number of archives an export of this node takes.
  pub fn archive_count(&self) -> usize {
    1 + self.nested.iter().map(|n| n.node.archive_count()).sum::<usize>()
  }
}

fn canonical(path: &Path) -> Result<PathBuf, ExportError> {
  dunce::canonicalize(path).map_err(|e| ExportError::Canonicalize {
    path: path.to_path_buf(),
    source: e,
  })
}

/// Repositories directly below `dir`, each with its own nested ones.
fn nested_repositories(dir: &Path) -> Result<Vec<NestedRepository>, ExportError> {
  let mut found = Vec::new();
  let mut walker = WalkDir::new(dir).min_depth(1).sort_by_file_name().into_iter();

  while let Some(entry) = walker.next() {
    let entry = entry.map_err(|e| ExportError::Walk {
      path: dir.to_path_buf(),
      source: e,
    })?;

    if !entry.file_type().is_dir() {
      continue;
    }

    if entry.file_name() == REPO_MARKER {
      walker.skip_current_dir();
      continue;
    }

    if marker(entry.path()).is_some() {
      walker.skip_current_dir();
      let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path()).to_path_buf();
      debug!(repository = %entry.path().display(), "found nested repository");
      found.push(NestedRepository {
        relative,
        node: SourceNode::repository(entry.path())?,
      });
    }
  }

  Ok(found)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  /// Marker-only layout; discovery never runs git.
  fn layout(root: &Path) {
    for dir in [
      "",
      "libs/sub",
      "libs/sub/deeper/inner",
      "libs/plain",
      "models",
    ] {
      std::fs::create_dir_all(root.join(dir)).unwrap();
    }
    std::fs::create_dir_all(root.join(".git")).unwrap();
    std::fs::write(root.join("libs/sub/.git"), "gitdir: x").unwrap();
    std::fs::write(root.join("libs/sub/deeper/inner/.git"), "gitdir: y").unwrap();
    std::fs::write(root.join("libs/sub/deeper/file.txt"), "f").unwrap();
    std::fs::write(root.join("notes.txt"), "n").unwrap();
  }

  #[test]
  fn file_node() {
    let temp = TempDir::new().unwrap();
    layout(temp.path());

    let node = SourceNode::discover(temp.path(), Path::new("notes.txt")).unwrap();
    assert_eq!(node.kind, NodeKind::File);
    assert_eq!(node.path, PathBuf::from("notes.txt"));
    assert_eq!(node.archive_count(), 1);
  }

  #[test]
  fn directory_records_nested_repositories_recursively() {
    let temp = TempDir::new().unwrap();
    layout(temp.path());

    let node = SourceNode::discover(temp.path(), Path::new("libs")).unwrap();
    assert_eq!(node.kind, NodeKind::Directory);
    assert_eq!(node.nested.len(), 1);

    let sub = &node.nested[0];
    assert_eq!(sub.relative, PathBuf::from("sub"));
    assert_eq!(sub.node.kind, NodeKind::Repository);
    assert_eq!(sub.node.nested.len(), 1);
    assert_eq!(sub.node.nested[0].relative, PathBuf::from("deeper").join("inner"));
    assert_eq!(node.archive_count(), 3);
  }

  #[test]
  fn path_inside_nested_repository_is_rebased() {
    let temp = TempDir::new().unwrap();
    layout(temp.path());

    let node = SourceNode::discover(temp.path(), Path::new("libs/sub/deeper/file.txt")).unwrap();
    assert_eq!(node.kind, NodeKind::File);
    assert_eq!(node.repo, dunce::canonicalize(temp.path().join("libs/sub")).unwrap());
    assert_eq!(node.path, PathBuf::from("deeper").join("file.txt"));
  }

  #[test]
  fn nested_repository_root_is_a_repository_node() {
    let temp = TempDir::new().unwrap();
    layout(temp.path());

    let node = SourceNode::discover(temp.path(), Path::new("libs/sub/")).unwrap();
    assert_eq!(node.kind, NodeKind::Repository);
    assert_eq!(node.location(), dunce::canonicalize(temp.path().join("libs/sub")).unwrap());
  }

  #[test]
  fn missing_source_is_reported() {
    let temp = TempDir::new().unwrap();
    layout(temp.path());

    let result = SourceNode::discover(temp.path(), Path::new("nope"));
    assert!(matches!(result, Err(ExportError::SourceMissing(_))));
  }
}

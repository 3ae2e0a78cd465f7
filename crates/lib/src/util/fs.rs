//! Filesystem helpers for assembling release trees.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::platform::immutable::make_writable;

#[derive(Debug, Error)]
pub enum FsError {
  #[error("source does not exist: {}", .0.display())]
  SourceMissing(PathBuf),

  #[error("target already exists: {}", .0.display())]
  TargetExists(PathBuf),

  #[error("{op} {}: {source}", path.display())]
  Io {
    op: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to traverse {}: {source}", path.display())]
  Walk {
    path: PathBuf,
    #[source]
    source: walkdir::Error,
  },
}

fn io_err<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(io::Error) -> FsError + 'a {
  move |source| FsError::Io {
    op,
    path: path.to_path_buf(),
    source,
  }
}

/// Last component of `path`, ignoring trailing separators and `.`.
pub fn last_component(path: &Path) -> Option<&std::ffi::OsStr> {
  path.components().rev().find_map(|c| match c {
    Component::Normal(name) => Some(name),
    _ => None,
  })
}

/// Create `path` and its parents, succeeding if it already exists.
pub fn mkdirs(path: &Path) -> Result<(), FsError> {
  fs::create_dir_all(path).map_err(io_err("failed to create directory", path))
}

/// Copy `src_dir/file` into `dst_dir`.
///
/// With `keep_relative_path`, directory parts of `file` are recreated under
/// `dst_dir` (`plugins/qsvg.dll` lands in `dst_dir/plugins`). Returns the path
/// of the copy.
pub fn copy_file_to_dir(src_dir: &Path, file: &str, dst_dir: &Path, keep_relative_path: bool) -> Result<PathBuf, FsError> {
  let src = src_dir.join(file);
  if !src.is_file() {
    return Err(FsError::SourceMissing(src));
  }

  let relative = Path::new(file);
  let target_dir = match relative.parent() {
    Some(parent) if keep_relative_path && !parent.as_os_str().is_empty() => dst_dir.join(parent),
    _ => dst_dir.to_path_buf(),
  };

  if !target_dir.exists() {
    debug!(dir = %target_dir.display(), "creating destination");
    mkdirs(&target_dir)?;
  }

  let name = relative.file_name().ok_or_else(|| FsError::SourceMissing(src.clone()))?;
  let target = target_dir.join(name);
  fs::copy(&src, &target).map_err(io_err("failed to copy", &src))?;
  Ok(target)
}

/// Copy the directory `src` into `dst_parent`, creating `dst_parent/<name of src>`.
///
/// Fails when the target already exists rather than merging into it.
pub fn copy_dir_to(src: &Path, dst_parent: &Path) -> Result<PathBuf, FsError> {
  if !src.is_dir() {
    return Err(FsError::SourceMissing(src.to_path_buf()));
  }

  let name = last_component(src).ok_or_else(|| FsError::SourceMissing(src.to_path_buf()))?;
  mkdirs(dst_parent)?;

  let target = dst_parent.join(name);
  if target.exists() {
    return Err(FsError::TargetExists(target));
  }

  debug!(src = %src.display(), dst = %target.display(), "copying directory");
  copy_tree(src, &target)?;
  Ok(target)
}

/// Recursively copy the contents of `src` into `dst`.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<(), FsError> {
  for entry in WalkDir::new(src).follow_links(true) {
    let entry = entry.map_err(|e| FsError::Walk {
      path: src.to_path_buf(),
      source: e,
    })?;

    let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
    let target = dst.join(relative);

    if entry.file_type().is_dir() {
      mkdirs(&target)?;
    } else {
      fs::copy(entry.path(), &target).map_err(io_err("failed to copy", entry.path()))?;
    }
  }

  Ok(())
}

/// Remove a directory tree, clearing read-only flags first.
///
/// A missing directory is not an error.
pub fn remove_dir_all_force(path: &Path) -> Result<(), FsError> {
  if !path.exists() {
    return Ok(());
  }

  if let Err(e) = make_writable(path) {
    warn!(path = %path.display(), error = %e, "could not clear read-only flags");
  }

  match fs::remove_dir_all(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(FsError::Io {
      op: "failed to remove",
      path: path.to_path_buf(),
      source: e,
    }),
  }
}

/// Remove a file if it exists.
pub fn remove_file_if_exists(path: &Path) -> Result<(), FsError> {
  match fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(FsError::Io {
      op: "failed to remove",
      path: path.to_path_buf(),
      source: e,
    }),
  }
}

/// Move `src` to `dst`, falling back to copy-and-delete across volumes.
pub fn move_path(src: &Path, dst: &Path) -> Result<(), FsError> {
  if src == dst {
    return Ok(());
  }

  debug!(src = %src.display(), dst = %dst.display(), "moving");

  if fs::rename(src, dst).is_ok() {
    return Ok(());
  }

  if src.is_dir() {
    copy_tree(src, dst)?;
    remove_dir_all_force(src)
  } else if src.is_file() {
    fs::copy(src, dst).map_err(io_err("failed to copy", src))?;
    remove_file_if_exists(src)
  } else {
    Err(FsError::SourceMissing(src.to_path_buf()))
  }
}

/// Move the file `src` into the directory `dst_dir`, keeping its name.
pub fn move_into(src: &Path, dst_dir: &Path) -> Result<PathBuf, FsError> {
  let name = src.file_name().ok_or_else(|| FsError::SourceMissing(src.to_path_buf()))?;
  let target = dst_dir.join(name);
  move_path(src, &target)?;
  Ok(target)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn last_component_ignores_trailing_separator() {
    assert_eq!(last_component(Path::new("Models/Example Models/")).unwrap(), "Example Models");
    assert_eq!(last_component(Path::new("bin/./")).unwrap(), "bin");
  }

  #[test]
  fn copy_file_keeps_relative_path() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("qt");
    std::fs::create_dir_all(src.join("platforms")).unwrap();
    std::fs::write(src.join("platforms").join("qwindows.dll"), "dll").unwrap();
    let dst = temp.path().join("bin");

    let copied = copy_file_to_dir(&src, "platforms/qwindows.dll", &dst, true).unwrap();
    assert_eq!(copied, dst.join("platforms").join("qwindows.dll"));

    let flat = copy_file_to_dir(&src, "platforms/qwindows.dll", &dst, false).unwrap();
    assert_eq!(flat, dst.join("qwindows.dll"));
  }

  #[test]
  fn copy_file_reports_missing_source() {
    let temp = TempDir::new().unwrap();
    let result = copy_file_to_dir(temp.path(), "nope.dll", temp.path(), true);
    assert!(matches!(result, Err(FsError::SourceMissing(_))));
  }

  #[test]
  fn copy_dir_to_refuses_existing_target() {
    let temp = TempDir::new().unwrap();
    let src = temp.path().join("doc");
    std::fs::create_dir_all(src.join("html")).unwrap();
    std::fs::write(src.join("html").join("index.html"), "<html/>").unwrap();
    let dst = temp.path().join("staging");

    let target = copy_dir_to(&src, &dst).unwrap();
    assert_eq!(target, dst.join("doc"));
    assert!(dst.join("doc").join("html").join("index.html").is_file());

    assert!(matches!(copy_dir_to(&src, &dst), Err(FsError::TargetExists(_))));
  }

  #[test]
  fn remove_dir_all_force_handles_read_only_files() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("staging");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("locked.txt"), "x").unwrap();
    crate::platform::immutable::make_read_only(&dir).unwrap();

    remove_dir_all_force(&dir).unwrap();
    assert!(!dir.exists());
    remove_dir_all_force(&dir).unwrap();
  }

  #[test]
  fn move_into_keeps_name() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("HopsanCore.dll");
    std::fs::write(&file, "dll").unwrap();
    let target_dir = temp.path().join("MSVC2010_x64");
    std::fs::create_dir_all(&target_dir).unwrap();

    let moved = move_into(&file, &target_dir).unwrap();
    assert_eq!(moved, target_dir.join("HopsanCore.dll"));
    assert!(!file.exists());
  }
}

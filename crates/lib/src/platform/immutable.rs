//! Read-only management for staged release trees.
//!
//! Every file placed in the staging directory is write-protected before it is
//! packaged, so that a user unpacking the zip archive gets read-only example
//! models and libraries. Removing the staging tree later requires making it
//! writable again first.
//!
//! ## Platform Behavior
//!
//! - **Unix**: Sets permissions to 0444 (files) or 0555 (executables)
//! - **Windows**: Sets the read-only attribute

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Error during permission changes.
#[derive(Debug, thiserror::Error)]
pub enum ImmutableError {
  #[error("failed to set permissions on {path}: {source}")]
  SetPermissions {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to read metadata for {path}: {source}")]
  Metadata {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to traverse directory {path}: {source}")]
  WalkDir {
    path: String,
    #[source]
    source: walkdir::Error,
  },
}

/// Make every file below `path` read-only.
///
/// Directories are left writable. Per-entry failures are logged and skipped
/// (best-effort); only a failure to traverse the tree is returned.
pub fn make_read_only(path: &Path) -> Result<usize, ImmutableError> {
  if !path.exists() {
    return Ok(0);
  }

  debug!(path = ?path, "setting files read-only");

  let mut changed = 0;
  for entry in WalkDir::new(path) {
    let entry = entry.map_err(|e| ImmutableError::WalkDir {
      path: path.display().to_string(),
      source: e,
    })?;

    if !entry.file_type().is_file() {
      continue;
    }

    match set_entry_read_only(entry.path(), true) {
      Ok(()) => changed += 1,
      Err(e) => warn!(path = ?entry.path(), error = %e, "failed to set read-only, continuing"),
    }
  }

  Ok(changed)
}

/// Make every file below `path` writable again (before deletion or rebuild).
pub fn make_writable(path: &Path) -> Result<(), ImmutableError> {
  if !path.exists() {
    return Ok(());
  }

  debug!(path = ?path, "making files writable");

  for entry in WalkDir::new(path) {
    let entry = entry.map_err(|e| ImmutableError::WalkDir {
      path: path.display().to_string(),
      source: e,
    })?;

    if entry.file_type().is_symlink() {
      continue;
    }

    if let Err(e) = set_entry_read_only(entry.path(), false) {
      warn!(path = ?entry.path(), error = %e, "failed to make writable, continuing");
    }
  }

  Ok(())
}

/// Returns true when the file at `path` is write-protected
pub fn is_read_only(path: &Path) -> Result<bool, ImmutableError> {
  let metadata = std::fs::metadata(path).map_err(|e| ImmutableError::Metadata {
    path: path.display().to_string(),
    source: e,
  })?;
  Ok(metadata.permissions().readonly())
}

#[cfg(unix)]
fn set_entry_read_only(path: &Path, read_only: bool) -> Result<(), ImmutableError> {
  use std::os::unix::fs::PermissionsExt;

  let metadata = std::fs::metadata(path).map_err(|e| ImmutableError::Metadata {
    path: path.display().to_string(),
    source: e,
  })?;

  let current_mode = metadata.permissions().mode();
  let executable = metadata.is_dir() || (current_mode & 0o111 != 0);

  let new_mode = match (read_only, executable) {
    (true, true) => 0o555,
    (true, false) => 0o444,
    (false, true) => 0o755,
    (false, false) => 0o644,
  };

  let mut perms = metadata.permissions();
  perms.set_mode(new_mode);
  std::fs::set_permissions(path, perms).map_err(|e| ImmutableError::SetPermissions {
    path: path.display().to_string(),
    source: e,
  })
}

#[cfg(windows)]
fn set_entry_read_only(path: &Path, read_only: bool) -> Result<(), ImmutableError> {
  let metadata = std::fs::metadata(path).map_err(|e| ImmutableError::Metadata {
    path: path.display().to_string(),
    source: e,
  })?;

  let mut perms = metadata.permissions();
  perms.set_readonly(read_only);
  std::fs::set_permissions(path, perms).map_err(|e| ImmutableError::SetPermissions {
    path: path.display().to_string(),
    source: e,
  })
}

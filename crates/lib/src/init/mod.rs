//! Scaffold a `release.toml` for a project.
//!
//! The written manifest describes the reference project and is meant to be
//! edited: tool candidates and runtime lists depend on the installed Qt and
//! MinGW versions.

mod templates;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

use crate::platform::paths::manifest_path;

pub use templates::RELEASE_TOML_TEMPLATE;

#[derive(Debug, Error)]
pub enum InitError {
  #[error("file already exists: {}", path.display())]
  PathExists { path: PathBuf },

  #[error("failed to create directory {}: {source}", path.display())]
  CreateDir { path: PathBuf, source: std::io::Error },

  #[error("failed to write file {}: {source}", path.display())]
  WriteFile { path: PathBuf, source: std::io::Error },

  #[error("failed to canonicalize path {}: {source}", path.display())]
  Canonicalize { path: PathBuf, source: std::io::Error },
}

/// Write the manifest template into `dir`, creating it if needed.
///
/// Returns the path of the written manifest. An existing manifest is never
/// overwritten.
pub fn init(dir: &Path) -> Result<PathBuf, InitError> {
  fs::create_dir_all(dir).map_err(|e| InitError::CreateDir {
    path: dir.to_path_buf(),
    source: e,
  })?;

  let dir = dunce::canonicalize(dir).map_err(|e| InitError::Canonicalize {
    path: dir.to_path_buf(),
    source: e,
  })?;

  let manifest = manifest_path(&dir);
  if manifest.exists() {
    return Err(InitError::PathExists { path: manifest });
  }

  fs::write(&manifest, RELEASE_TOML_TEMPLATE).map_err(|e| InitError::WriteFile {
    path: manifest.clone(),
    source: e,
  })?;

  info!(path = %manifest.display(), "wrote release manifest template");
  Ok(manifest)
}

//! Working-tree directories the release rotates and recreates.
//!
//! The developer's `bin` is moved aside before the build so no local junk
//! ends up in the release, and brought back afterwards. The freshly built
//! `bin` is kept as `bin_last_build`.

use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;
use tracing::{info, warn};

use crate::consts::{BIN_BACKUP_PREFIX, BIN_LAST_BUILD};
use crate::util::fs::{FsError, mkdirs, move_path, remove_dir_all_force};

#[derive(Debug, Error)]
pub enum WorkspaceError {
  #[error("could not move {} out of the way before the build", .0.display())]
  BinStillPresent(PathBuf),

  #[error("unable to clear old output directory {}", .0.display())]
  OutputNotCleared(PathBuf),

  #[error("{} has no parent directory", .0.display())]
  NoParent(PathBuf),

  #[error(transparent)]
  Fs(#[from] FsError),
}

/// Record of a rotated `bin` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinBackup {
  bin: PathBuf,
  backup: Option<PathBuf>,
}

impl BinBackup {
  /// Move `bin` to `bin_build_backup_<timestamp>` and create an empty `bin`.
  pub fn rotate(bin: &Path) -> Result<Self, WorkspaceError> {
    let parent = bin.parent().ok_or_else(|| WorkspaceError::NoParent(bin.to_path_buf()))?;

    let backup = if bin.exists() {
      let target = unique_backup_path(parent);
      info!(from = %bin.display(), to = %target.display(), "moving bin aside");
      move_path(bin, &target)?;
      if bin.exists() {
        return Err(WorkspaceError::BinStillPresent(bin.to_path_buf()));
      }
      Some(target)
    } else {
      None
    };

    mkdirs(bin)?;
    Ok(Self {
      bin: bin.to_path_buf(),
      backup,
    })
  }

  pub fn backup(&self) -> Option<&Path> {
    self.backup.as_deref()
  }

  /// Keep the built `bin` as `bin_last_build` and put the backup back.
  ///
  /// Does nothing when there was no `bin` to back up.
  pub fn restore(&self) -> Result<(), WorkspaceError> {
    let Some(backup) = &self.backup else {
      return Ok(());
    };
    if !backup.exists() {
      warn!(backup = %backup.display(), "bin backup vanished, nothing to restore");
      return Ok(());
    }

    let parent = self
      .bin
      .parent()
      .ok_or_else(|| WorkspaceError::NoParent(self.bin.clone()))?;
    let last_build = parent.join(BIN_LAST_BUILD);

    remove_dir_all_force(&last_build)?;
    if self.bin.exists() {
      move_path(&self.bin, &last_build)?;
    }
    move_path(backup, &self.bin)?;

    info!(bin = %self.bin.display(), last_build = %last_build.display(), "restored bin");
    Ok(())
  }
}

fn unique_backup_path(parent: &Path) -> PathBuf {
  let stamp = Local::now().format("%Y%m%d_%H%M%S");
  let base = parent.join(format!("{BIN_BACKUP_PREFIX}_{stamp}"));
  let mut candidate = base.clone();
  let mut n = 1;
  while candidate.exists() {
    candidate = PathBuf::from(format!("{}_{n}", base.display()));
    n += 1;
  }
  candidate
}

/// Remove the old output directory.
pub fn clear_output_dir(dir: &Path) -> Result<(), WorkspaceError> {
  if let Err(e) = remove_dir_all_force(dir) {
    warn!(dir = %dir.display(), error = %e, "failed to remove output directory");
  }
  if dir.exists() {
    return Err(WorkspaceError::OutputNotCleared(dir.to_path_buf()));
  }
  Ok(())
}

pub fn create_output_dir(dir: &Path) -> Result<(), WorkspaceError> {
  mkdirs(dir)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::write;
  use tempfile::TempDir;

  #[test]
  fn rotation_round_trip_keeps_last_build() {
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("bin");
    write(temp.path(), "bin/dev.dll", "developer");

    let backup = BinBackup::rotate(&bin).unwrap();
    let backup_dir = backup.backup().unwrap().to_path_buf();
    assert!(
      backup_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("bin_build_backup_")
    );
    assert!(bin.is_dir());
    assert_eq!(std::fs::read_dir(&bin).unwrap().count(), 0);

    write(temp.path(), "bin/release.dll", "built");
    backup.restore().unwrap();

    assert_eq!(std::fs::read_to_string(bin.join("dev.dll")).unwrap(), "developer");
    assert_eq!(
      std::fs::read_to_string(temp.path().join(BIN_LAST_BUILD).join("release.dll")).unwrap(),
      "built"
    );
    assert!(!backup_dir.exists());
  }

  #[test]
  fn previous_last_build_is_replaced() {
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("bin");
    write(temp.path(), "bin/dev.dll", "");
    write(temp.path(), "bin_last_build/old.dll", "");

    let backup = BinBackup::rotate(&bin).unwrap();
    write(temp.path(), "bin/new.dll", "");
    backup.restore().unwrap();

    let last = temp.path().join(BIN_LAST_BUILD);
    assert!(last.join("new.dll").exists());
    assert!(!last.join("old.dll").exists());
  }

  #[test]
  fn missing_bin_is_created_without_backup() {
    let temp = TempDir::new().unwrap();
    let bin = temp.path().join("bin");

    let backup = BinBackup::rotate(&bin).unwrap();
    assert!(backup.backup().is_none());
    assert!(bin.is_dir());

    backup.restore().unwrap();
    assert!(bin.is_dir());
    assert!(!temp.path().join(BIN_LAST_BUILD).exists());
  }

  #[test]
  fn backup_names_do_not_collide() {
    let temp = TempDir::new().unwrap();
    let first = unique_backup_path(temp.path());
    std::fs::create_dir_all(&first).unwrap();
    let second = unique_backup_path(temp.path());
    assert_ne!(first, second);
  }

  #[test]
  fn output_dir_is_cleared_and_recreated() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("output64");
    write(temp.path(), "output64/stale.zip", "");

    clear_output_dir(&output).unwrap();
    assert!(!output.exists());
    create_output_dir(&output).unwrap();
    assert!(output.is_dir());
  }
}

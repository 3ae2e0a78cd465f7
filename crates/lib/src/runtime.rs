//! Copying runtime dependency binaries into the working `bin`.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ReleaseConfig;
use crate::manifest::RuntimeGroup;
use crate::placeholder::{PlaceholderError, Placeholders};
use crate::util::fs::{FsError, copy_file_to_dir};

#[derive(Debug, Error)]
pub enum RuntimeError {
  #[error("runtime file {file} not found in {}", dir.display())]
  Missing { file: String, dir: PathBuf },

  #[error(transparent)]
  Placeholder(#[from] PlaceholderError),

  #[error(transparent)]
  Fs(#[from] FsError),
}

/// Copy every runtime group for the configured architecture into `bin`.
///
/// Returns the number of files copied. Files of optional groups may be
/// missing; anything else missing fails the collection.
pub fn collect_runtime(
  groups: &[RuntimeGroup],
  config: &ReleaseConfig,
  placeholders: &Placeholders,
) -> Result<usize, RuntimeError> {
  let mut copied = 0;

  for group in groups {
    let dir = config.root.join(placeholders.expand(&group.from)?);
    debug!(dir = %dir.display(), optional = group.optional, "collecting runtime group");

    for file in group.files_for(config.arch) {
      match copy_file_to_dir(&dir, file, &config.bin_dir, group.keep_relative) {
        Ok(_) => copied += 1,
        Err(FsError::SourceMissing(_)) if group.optional => {
          warn!(file = %file, dir = %dir.display(), "optional runtime file missing");
        }
        Err(FsError::SourceMissing(_)) => {
          return Err(RuntimeError::Missing {
            file: file.clone(),
            dir,
          });
        }
        Err(e) => return Err(e.into()),
      }
    }
  }

  info!(files = copied, "collected runtime binaries");
  Ok(copied)
}

//! Exclusive lock guarding a working tree against concurrent releases.
//!
//! Two releases in one tree would fight over `bin`, the build directories and
//! the generated scripts. The lock file sits at the project root and carries
//! who holds it, so a blocked run can say why.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{APP_NAME, LOCK_FILENAME};

#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: i64,
  pub command: String,
  pub root: PathBuf,
}

#[derive(Debug, Error)]
pub enum LockError {
  #[error(
    "working tree is locked by another release: {command} (PID {pid}, started {started_at})\n\
     If you're sure no {app} process is running, remove the lock file:\n  {path}",
    app = APP_NAME,
    path = .lock_path.display()
  )]
  Contention {
    command: String,
    pid: u32,
    started_at: String,
    lock_path: PathBuf,
  },

  #[error(
    "working tree is locked (could not read lock metadata)\n\
     If you're sure no {app} process is running, remove the lock file:\n  {path}",
    app = APP_NAME,
    path = .lock_path.display()
  )]
  ContentionUnknown { lock_path: PathBuf },

  #[error("failed to open lock file: {0}")]
  OpenFile(#[source] io::Error),

  #[error("failed to write lock metadata: {0}")]
  WriteMetadata(#[source] io::Error),

  #[error("failed to acquire lock: {0}")]
  LockFailed(#[source] io::Error),
}

/// Held for the duration of a release; released when dropped.
#[derive(Debug)]
pub struct ReleaseLock {
  file: File,
  lock_path: PathBuf,
}

impl ReleaseLock {
  /// Take the lock for `root` without waiting.
  pub fn acquire(root: &Path, command: &str) -> Result<Self, LockError> {
    let lock_path = root.join(LOCK_FILENAME);

    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&lock_path)
      .map_err(LockError::OpenFile)?;

    if let Err(err) = try_lock_exclusive(&file) {
      if err.kind() == io::ErrorKind::WouldBlock || is_lock_violation(&err) {
        return Err(read_contention_error(&lock_path));
      }
      return Err(LockError::LockFailed(err));
    }

    write_metadata(&file, command, root)?;
    debug!(path = %lock_path.display(), "acquired release lock");

    Ok(Self { file, lock_path })
  }

  /// Read the metadata through the held handle.
  pub fn read_metadata(&self) -> io::Result<LockMetadata> {
    use std::io::{Seek, SeekFrom};

    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(io::Error::other)
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

fn write_metadata(file: &File, command: &str, root: &Path) -> Result<(), LockError> {
  let metadata = LockMetadata {
    version: 1,
    pid: std::process::id(),
    started_at_unix: Local::now().timestamp(),
    command: command.to_string(),
    root: root.to_path_buf(),
  };

  file.set_len(0).map_err(LockError::WriteMetadata)?;
  let mut writer = io::BufWriter::new(file);
  serde_json::to_writer_pretty(&mut writer, &metadata).map_err(|e| LockError::WriteMetadata(io::Error::other(e)))?;
  writer.flush().map_err(LockError::WriteMetadata)?;
  Ok(())
}

fn read_contention_error(lock_path: &Path) -> LockError {
  if let Ok(mut file) = File::open(lock_path) {
    let mut contents = String::new();
    if file.read_to_string(&mut contents).is_ok()
      && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&contents)
    {
      let started_at = Local
        .timestamp_opt(metadata.started_at_unix, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| format!("Unix timestamp {}", metadata.started_at_unix));

      return LockError::Contention {
        command: metadata.command,
        pid: metadata.pid,
        started_at,
        lock_path: lock_path.to_path_buf(),
      };
    }
  }

  LockError::ContentionUnknown {
    lock_path: lock_path.to_path_buf(),
  }
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};
  use std::os::unix::io::AsFd;

  flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
    .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

#[cfg(windows)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;

  // SAFETY: OVERLAPPED is plain data and valid when zeroed; the handle is
  // owned by `file` for the duration of the call.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(
      handle,
      LOCKFILE_FAIL_IMMEDIATELY | LOCKFILE_EXCLUSIVE_LOCK,
      0,
      1,
      0,
      &mut overlapped,
    )
  };

  if result == 0 {
    Err(io::Error::last_os_error())
  } else {
    Ok(())
  }
}

/// `ERROR_LOCK_VIOLATION` is what `LockFileEx` reports on contention.
fn is_lock_violation(err: &io::Error) -> bool {
  cfg!(windows) && err.raw_os_error() == Some(33)
}

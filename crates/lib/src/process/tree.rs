//! Killing a timed-out command together with the processes it started.
//!
//! Unix commands run as the leader of their own process group, Windows
//! commands inside a job object. `kill_on_drop` alone only reaches the
//! direct child, which leaves compilers started by a batch file running.

use tokio::process::{Child, Command};
use tracing::{debug, warn};

#[cfg(unix)]
pub(crate) struct ProcessTree {
  group: Option<rustix::process::Pid>,
}

#[cfg(unix)]
impl ProcessTree {
  /// Make the command lead a new process group once spawned.
  pub(crate) fn isolate(command: &mut Command) {
    command.process_group(0);
  }

  pub(crate) fn attach(child: &Child) -> Self {
    let group = child
      .id()
      .and_then(|id| i32::try_from(id).ok())
      .and_then(rustix::process::Pid::from_raw);
    Self { group }
  }

  pub(crate) fn kill(&self) {
    use rustix::io::Errno;
    use rustix::process::{Signal, kill_process_group};

    let Some(group) = self.group else {
      return;
    };
    match kill_process_group(group, Signal::KILL) {
      Ok(()) => debug!(pgid = %group.as_raw_nonzero(), "killed process group"),
      Err(Errno::SRCH) => debug!(pgid = %group.as_raw_nonzero(), "process group already gone"),
      Err(e) => warn!(pgid = %group.as_raw_nonzero(), error = %e, "failed to kill process group"),
    }
  }
}

#[cfg(windows)]
pub(crate) struct ProcessTree {
  job: Option<std::os::windows::io::OwnedHandle>,
}

#[cfg(windows)]
impl ProcessTree {
  pub(crate) fn isolate(_command: &mut Command) {}

  pub(crate) fn attach(child: &Child) -> Self {
    Self {
      job: child.raw_handle().and_then(assign_job),
    }
  }

  pub(crate) fn kill(&self) {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::System::JobObjects::TerminateJobObject;

    let Some(job) = &self.job else {
      return;
    };
    // SAFETY: the job handle is owned by `self` and stays open for the call.
    if unsafe { TerminateJobObject(job.as_raw_handle() as HANDLE, 1) } == 0 {
      warn!(error = %std::io::Error::last_os_error(), "failed to terminate job object");
    } else {
      debug!("terminated job object");
    }
  }
}

/// Put `process` into a fresh anonymous job.
#[cfg(windows)]
fn assign_job(process: std::os::windows::io::RawHandle) -> Option<std::os::windows::io::OwnedHandle> {
  use std::io;
  use std::os::windows::io::{FromRawHandle, OwnedHandle, RawHandle};
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::System::JobObjects::{AssignProcessToJobObject, CreateJobObjectW};

  // SAFETY: null attributes and name request an unnamed job with default security.
  let raw = unsafe { CreateJobObjectW(std::ptr::null(), std::ptr::null()) };
  if raw.is_null() {
    warn!(error = %io::Error::last_os_error(), "failed to create job object");
    return None;
  }
  // SAFETY: `raw` was just created and nothing else owns it.
  let job = unsafe { OwnedHandle::from_raw_handle(raw as RawHandle) };

  // SAFETY: both handles are open for the duration of the call.
  if unsafe { AssignProcessToJobObject(raw, process as HANDLE) } == 0 {
    warn!(error = %io::Error::last_os_error(), "failed to assign process to job object");
    return None;
  }
  Some(job)
}

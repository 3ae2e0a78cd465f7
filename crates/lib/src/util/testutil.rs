//! Test utilities for relbuild-lib.
//!
//! Cross-platform helpers for tests that need to execute shell commands or
//! build throwaway git repositories.

use std::path::Path;
use std::process::Command;

/// Returns the shell command and args to execute a shell script.
#[cfg(unix)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("/bin/sh", vec!["-c".to_string(), script.to_string()])
}

#[cfg(windows)]
pub fn shell_cmd(script: &str) -> (&'static str, Vec<String>) {
  ("cmd.exe", vec!["/C".to_string(), script.to_string()])
}

/// Returns the command and args to create a marker file in the current directory.
#[cfg(unix)]
pub fn touch_file(filename: &str) -> (&'static str, Vec<String>) {
  ("/usr/bin/touch", vec![filename.to_string()])
}

#[cfg(windows)]
pub fn touch_file(filename: &str) -> (&'static str, Vec<String>) {
  (
    "powershell.exe",
    vec![
      "-NoProfile".to_string(),
      "-Command".to_string(),
      format!("New-Item -ItemType File -Path '{}' -Force | Out-Null", filename),
    ],
  )
}

/// Run git in `dir` with a fixed identity, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) {
  let status = Command::new("git")
    .args(["-c", "user.name=relbuild", "-c", "user.email=relbuild@example.com"])
    .args(["-c", "init.defaultBranch=main", "-c", "core.autocrlf=false"])
    .args(args)
    .current_dir(dir)
    .output()
    .unwrap();
  assert!(
    status.status.success(),
    "git {:?} failed: {}",
    args,
    String::from_utf8_lossy(&status.stderr)
  );
}

/// Write `content` to `dir/relative`, creating parent directories.
pub fn write(dir: &Path, relative: &str, content: &str) {
  let path = dir.join(relative);
  std::fs::create_dir_all(path.parent().unwrap()).unwrap();
  std::fs::write(path, content).unwrap();
}

/// Initialise a repository in `dir` and commit everything in it.
pub fn init_repo(dir: &Path) {
  std::fs::create_dir_all(dir).unwrap();
  git(dir, &["init", "-q"]);
  git(dir, &["add", "-A"]);
  git(dir, &["commit", "-q", "--allow-empty", "-m", "initial"]);
}

//! External tool invocation.
//!
//! Every external program the release touches runs through here: helper
//! batch files, `git`, Inkscape, Inno Setup, the generated compile scripts.
//! Unlike an isolated build, commands inherit the caller's environment
//! because the Windows toolchains depend on it.

pub mod script;
mod tree;

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

pub use script::BatchScript;
use tree::ProcessTree;

/// Errors raised while running an external program.
#[derive(Debug, Error)]
pub enum ProcessError {
  /// The program could not be started at all.
  #[error("failed to start {program}: {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The program ran and exited unsuccessfully.
  #[error("command failed with exit code {code:?}: {command}")]
  Failed {
    command: String,
    code: Option<i32>,
    stderr: String,
  },

  /// The program exceeded its time budget and was killed.
  #[error("command timed out after {secs}s: {command}")]
  TimedOut { command: String, secs: u64 },

  /// An executable expected at a located tool directory is missing.
  #[error("{} does not exist", .0.display())]
  NotFound(PathBuf),

  /// Writing or removing a generated script failed.
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// A program invocation, built up before it is run.
#[derive(Debug, Clone)]
pub struct CommandSpec {
  program: OsString,
  args: Vec<OsString>,
  cwd: Option<PathBuf>,
  env: BTreeMap<String, String>,
  timeout: Option<Duration>,
  stream: bool,
}

impl CommandSpec {
  pub fn new(program: impl Into<OsString>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      env: BTreeMap::new(),
      timeout: None,
      stream: false,
    }
  }

  /// Start from an executable inside a located tool directory, failing early
  /// when it is not there.
  pub fn tool(dir: &Path, executable: &str) -> Result<Self, ProcessError> {
    let program = dir.join(executable);
    if !program.is_file() {
      return Err(ProcessError::NotFound(program));
    }
    Ok(Self::new(program))
  }

  /// Run `cmd` through the platform shell.
  pub fn shell(cmd: &str) -> Self {
    let (shell, args) = get_shell(None);
    let mut spec = Self::new(shell);
    spec.args.extend(args.into_iter().map(OsString::from));
    spec.args.push(cmd.into());
    spec
  }

  pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// Let the child write straight to the console instead of capturing.
  ///
  /// Used for compilers whose output the operator wants to watch.
  pub fn stream_output(mut self, stream: bool) -> Self {
    self.stream = stream;
    self
  }

  pub fn program(&self) -> String {
    self.program.to_string_lossy().into_owned()
  }

  /// Human readable command line, quoting parts that contain spaces.
  pub fn display(&self) -> String {
    std::iter::once(&self.program)
      .chain(self.args.iter())
      .map(|part| {
        let part = part.to_string_lossy();
        if part.contains(' ') {
          quote_path(&part)
        } else {
          part.into_owned()
        }
      })
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// Wrap `path` in double quotes unless it already is.
pub fn quote_path(path: &str) -> String {
  let mut quoted = String::with_capacity(path.len() + 2);
  if !path.starts_with('"') {
    quoted.push('"');
  }
  quoted.push_str(path);
  if !path.ends_with('"') || path.len() == 1 {
    quoted.push('"');
  }
  quoted
}

/// Run a command and return its output whatever the exit status.
///
/// Only failing to start the process or running out of time is an error.
/// A timed-out command is killed along with the processes it started.
pub async fn output(spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
  let command_line = spec.display();
  info!(cmd = %command_line, "executing command");

  let mut command = Command::new(&spec.program);
  command.args(&spec.args).kill_on_drop(true);

  if let Some(cwd) = &spec.cwd {
    command.current_dir(cwd);
  }

  for (key, value) in &spec.env {
    command.env(key, value);
  }

  if spec.stream {
    command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
  } else {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
  }

  if spec.timeout.is_some() {
    ProcessTree::isolate(&mut command);
  }

  debug!(working_dir = ?spec.cwd, "spawning process");

  let child = command.spawn().map_err(|e| ProcessError::Spawn {
    program: spec.program(),
    source: e,
  })?;
  let tree = spec.timeout.map(|_| ProcessTree::attach(&child));

  let waited = match spec.timeout {
    Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
      Ok(result) => result,
      Err(_) => {
        if let Some(tree) = &tree {
          tree.kill();
        }
        return Err(ProcessError::TimedOut {
          command: command_line,
          secs: limit.as_secs(),
        });
      }
    },
    None => child.wait_with_output().await,
  };

  let raw = waited.map_err(|e| ProcessError::Spawn {
    program: spec.program(),
    source: e,
  })?;

  let output = CommandOutput {
    code: raw.status.code(),
    stdout: String::from_utf8_lossy(&raw.stdout).trim().to_string(),
    stderr: String::from_utf8_lossy(&raw.stderr).trim().to_string(),
  };

  if !output.stdout.is_empty() {
    debug!(stdout = %output.stdout, "command output");
  }
  if !output.stderr.is_empty() {
    debug!(stderr = %output.stderr, "command stderr");
  }

  Ok(output)
}

/// Run a command and fail unless it exits successfully.
pub async fn run(spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
  let result = output(spec).await?;

  if !result.success() {
    return Err(ProcessError::Failed {
      command: spec.display(),
      code: result.code,
      stderr: result.stderr,
    });
  }

  Ok(result)
}

/// Get the shell command and arguments for the current platform.
///
/// Batch helpers shipped with the project only run under `cmd.exe`, so that
/// is the Windows default rather than PowerShell.
pub fn get_shell(override_shell: Option<&str>) -> (String, Vec<String>) {
  if let Some(shell) = override_shell {
    let args = if shell.contains("powershell") || shell.contains("pwsh") {
      vec!["-NoProfile".to_string(), "-Command".to_string()]
    } else if shell.contains("cmd") {
      vec!["/C".to_string()]
    } else {
      vec!["-c".to_string()]
    };
    return (shell.to_string(), args);
  }

  #[cfg(unix)]
  {
    ("/bin/sh".to_string(), vec!["-c".to_string()])
  }

  #[cfg(windows)]
  {
    ("cmd.exe".to_string(), vec!["/C".to_string()])
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::testutil::shell_cmd;
  use tempfile::TempDir;

  fn spec_for(script: &str) -> CommandSpec {
    let (program, args) = shell_cmd(script);
    CommandSpec::new(program).args(args)
  }

  #[test]
  fn quote_path_adds_missing_quotes() {
    assert_eq!(quote_path(r"C:\Program Files\Inno"), r#""C:\Program Files\Inno""#);
    assert_eq!(quote_path(r#""already""#), r#""already""#);
  }

  #[test]
  fn display_quotes_parts_with_spaces() {
    let spec = CommandSpec::new("iscc.exe").arg(r"C:\My Files\setup.iss").arg("/Q");
    assert_eq!(spec.display(), r#"iscc.exe "C:\My Files\setup.iss" /Q"#);
  }

  #[tokio::test]
  async fn run_captures_stdout() {
    let result = run(&spec_for("echo hello")).await.unwrap();
    assert_eq!(result.stdout, "hello");
    assert!(result.success());
  }

  #[tokio::test]
  async fn run_reports_exit_code() {
    let result = run(&spec_for("exit 3")).await;
    assert!(matches!(result, Err(ProcessError::Failed { code: Some(3), .. })));
  }

  #[tokio::test]
  async fn output_does_not_fail_on_exit_code() {
    let result = output(&spec_for("exit 2")).await.unwrap();
    assert_eq!(result.code, Some(2));
    assert!(!result.success());
  }

  #[tokio::test]
  async fn spawn_failure_is_reported() {
    let result = run(&CommandSpec::new("/definitely/not/a/program")).await;
    assert!(matches!(result, Err(ProcessError::Spawn { .. })));
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn timeout_kills_hung_command() {
    let spec = spec_for("sleep 5").timeout(Some(Duration::from_millis(100)));
    let result = run(&spec).await;
    assert!(matches!(result, Err(ProcessError::TimedOut { .. })));
  }

  #[tokio::test]
  #[cfg(target_os = "linux")]
  async fn timeout_kills_processes_started_by_command() {
    let temp = TempDir::new().unwrap();
    let pid_file = temp.path().join("sleeper.pid");
    let script = format!("sleep 30 & echo $! > {}; wait", pid_file.display());
    let spec = spec_for(&script).timeout(Some(Duration::from_millis(500)));

    let result = run(&spec).await;
    assert!(matches!(result, Err(ProcessError::TimedOut { .. })));

    // Gone, or a zombie nobody has reaped yet.
    let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
    let stat = Path::new("/proc").join(&pid).join("stat");
    let mut dead = false;
    for _ in 0..100 {
      match std::fs::read_to_string(&stat) {
        Err(_) => dead = true,
        Ok(s) => dead = s.rsplit(')').next().is_some_and(|rest| rest.trim_start().starts_with('Z')),
      }
      if dead {
        break;
      }
      tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(dead, "sleep {pid} outlived the timeout");
  }

  #[tokio::test]
  async fn runs_in_requested_directory() {
    let temp = TempDir::new().unwrap();
    let (program, args) = crate::util::testutil::touch_file("cwd_marker");
    let spec = CommandSpec::new(program).args(args).current_dir(temp.path());

    run(&spec).await.unwrap();

    assert!(temp.path().join("cwd_marker").exists());
  }

  #[test]
  fn tool_requires_existing_executable() {
    let temp = TempDir::new().unwrap();
    let result = CommandSpec::tool(temp.path(), "iscc.exe");
    assert!(matches!(result, Err(ProcessError::NotFound(_))));
  }

  #[test]
  fn get_shell_with_cmd_override() {
    let (shell, args) = get_shell(Some("cmd.exe"));
    assert_eq!(shell, "cmd.exe");
    assert_eq!(args, vec!["/C"]);
  }

  #[test]
  fn get_shell_default() {
    let (shell, args) = get_shell(None);
    #[cfg(unix)]
    {
      assert_eq!(shell, "/bin/sh");
      assert_eq!(args, vec!["-c"]);
    }
    #[cfg(windows)]
    {
      assert_eq!(shell, "cmd.exe");
      assert_eq!(args, vec!["/C"]);
    }
  }
}

//! Generated batch scripts.
//!
//! The Windows SDK and MinGW environments are set up by sourcing vendor
//! scripts, so compilation happens inside a throwaway `.bat` file that sets up
//! the environment and calls the build tools in one shell session.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use super::{CommandOutput, CommandSpec, ProcessError, get_shell, output};

/// Header line written into every generated script.
pub const GENERATED_NOTICE: &str = "REM This file has been automatically generated by relbuild. Do NOT commit it!";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchScript {
  lines: Vec<String>,
}

impl BatchScript {
  /// Start a script with echo disabled and the generated-file notice.
  pub fn generated() -> Self {
    Self {
      lines: vec!["echo off".to_string(), GENERATED_NOTICE.to_string()],
    }
  }

  pub fn line(mut self, line: impl Into<String>) -> Self {
    self.lines.push(line.into());
    self
  }

  pub fn lines(&self) -> &[String] {
    &self.lines
  }

  /// Render with CRLF line endings, as `cmd.exe` expects.
  pub fn render(&self) -> String {
    let mut rendered = self.lines.join("\r\n");
    rendered.push_str("\r\n");
    rendered
  }

  /// Write the script to `path`, run it from `cwd`, then delete it.
  ///
  /// The exit status is returned rather than judged: callers verify the
  /// artifacts the script was meant to produce.
  pub async fn run(&self, path: &Path, cwd: &Path, timeout: Option<Duration>) -> Result<CommandOutput, ProcessError> {
    std::fs::write(path, self.render())?;
    debug!(script = %path.display(), "wrote generated script");

    let (shell, shell_args) = get_shell(None);
    let shell_args: Vec<String> = shell_args.into_iter().filter(|a| a != "-c").collect();

    let spec = CommandSpec::new(shell)
      .args(shell_args)
      .arg(path.as_os_str())
      .current_dir(cwd)
      .timeout(timeout)
      .stream_output(true);

    let result = output(&spec).await;

    if let Err(e) = std::fs::remove_file(path) {
      warn!(script = %path.display(), error = %e, "failed to remove generated script");
    }

    result
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn generated_scripts_start_with_notice() {
    let script = BatchScript::generated().line("call jom");
    assert_eq!(script.lines()[0], "echo off");
    assert_eq!(script.lines()[1], GENERATED_NOTICE);
    assert_eq!(script.lines()[2], "call jom");
  }

  #[test]
  fn render_uses_crlf() {
    let rendered = BatchScript::generated().line("cd ..").render();
    assert!(rendered.ends_with("cd ..\r\n"));
    assert_eq!(rendered.matches("\r\n").count(), 3);
  }
}

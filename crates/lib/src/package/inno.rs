//! Installer executables compiled by Inno Setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use super::PackageError;
use crate::config::ReleaseConfig;
use crate::process::{self, CommandSpec};

/// Arguments handed to the Inno Setup compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnoInvocation {
  pub output_dir: PathBuf,
  /// Installer file name without `.exe`.
  pub name: String,
  pub version: String,
  pub arch: &'static str,
  pub files_source: PathBuf,
  pub script: PathBuf,
}

impl InnoInvocation {
  pub fn for_release(config: &ReleaseConfig, name: String, script: &str) -> Self {
    Self {
      output_dir: config.output_dir.clone(),
      name,
      version: config.full_version(),
      arch: config.arch.inno_arch(),
      files_source: config.staging_dir.clone(),
      script: config.root.join(script),
    }
  }

  pub fn args(&self) -> Vec<String> {
    vec![
      format!("/o{}", self.output_dir.display()),
      format!("/f{}", self.name),
      format!("/dMyAppVersion={}", self.version),
      format!("/dMyArchitecture={}", self.arch),
      format!("/dMyFilesSource={}", self.files_source.display()),
      self.script.display().to_string(),
    ]
  }

  pub fn installer_path(&self) -> PathBuf {
    self.output_dir.join(format!("{}.exe", self.name))
  }

  /// Run the compiler and check that the installer was written.
  pub async fn run(
    &self,
    tool_dir: &Path,
    compiler: &str,
    cwd: &Path,
    timeout: Option<Duration>,
  ) -> Result<PathBuf, PackageError> {
    info!(installer = %self.name, "generating installer executable");

    let spec = CommandSpec::tool(tool_dir, compiler)?
      .args(self.args())
      .current_dir(cwd)
      .timeout(timeout)
      .stream_output(true);
    process::output(&spec).await?;

    let installer = self.installer_path();
    if !installer.is_file() {
      return Err(PackageError::MissingPackage(installer));
    }
    Ok(installer)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn invocation(arch: &'static str) -> InnoInvocation {
    InnoInvocation {
      output_dir: PathBuf::from("out"),
      name: "Hopsan-2.8.0.1-win32-installer".to_string(),
      version: "2.8.0.1".to_string(),
      arch,
      files_source: PathBuf::from("staging"),
      script: PathBuf::from("setup.iss"),
    }
  }

  #[test]
  fn defines_version_arch_and_source() {
    assert_eq!(
      invocation("").args(),
      vec![
        "/oout",
        "/fHopsan-2.8.0.1-win32-installer",
        "/dMyAppVersion=2.8.0.1",
        "/dMyArchitecture=",
        "/dMyFilesSource=staging",
        "setup.iss",
      ]
    );
  }

  #[tokio::test]
  async fn missing_compiler_is_reported() {
    let temp = TempDir::new().unwrap();
    let result = invocation("x64").run(temp.path(), "iscc.exe", temp.path(), None).await;
    assert!(matches!(
      result,
      Err(PackageError::Process(crate::process::ProcessError::NotFound(_)))
    ));
  }
}

//! Compile scripts for the Windows toolchains.

use std::path::Path;

use crate::platform::Arch;
use crate::process::{BatchScript, quote_path};

pub const MSVC_SCRIPT: &str = "compileWithMSVC.bat";
pub const MINGW_SCRIPT: &str = "compileWithMinGW.bat";

/// Inputs of one MSVC core build.
#[derive(Debug, Clone)]
pub struct MsvcScript<'a> {
  pub sdk_dir: &'a Path,
  pub arch: Arch,
  pub version: &'a str,
  pub build_dir: &'a Path,
  pub project: &'a Path,
  pub jom: &'a str,
  pub qmake: &'a str,
  pub extra_qmake_args: &'a [String],
}

impl MsvcScript<'_> {
  pub fn mkspec(&self) -> String {
    format!("win32-msvc{}", self.version)
  }

  pub fn render(&self) -> BatchScript {
    let set_env = format!("{}\\SetEnv.cmd", self.sdk_dir.display());
    let jom = quote_path(self.jom);

    let mut qmake = format!(
      "call {} {} -r -spec {} \"CONFIG+=release\"",
      quote_path(self.qmake),
      quote_path(&self.project.display().to_string()),
      self.mkspec()
    );
    for arg in self.extra_qmake_args {
      qmake.push(' ');
      qmake.push_str(arg);
    }

    BatchScript::generated()
      .line("setlocal enabledelayedexpansion")
      .line(format!("call {} /Release /{}", quote_path(&set_env), self.arch))
      .line("COLOR 07")
      .line(format!("cd {}", quote_path(&self.build_dir.display().to_string())))
      .line(format!("call {jom} clean"))
      .line(qmake)
      .line(format!("call {jom}"))
      .line("cd ..")
  }
}

/// Inputs of the MinGW application build.
#[derive(Debug, Clone)]
pub struct MingwScript<'a> {
  pub mingw_dir: &'a str,
  pub qmake_dir: &'a str,
  pub project: &'a Path,
  pub mkspec: &'a str,
  pub jobs: u32,
}

impl MingwScript<'_> {
  pub fn render(&self) -> BatchScript {
    BatchScript::generated()
      .line(format!("SET PATH={};{};%PATH%", self.mingw_dir, self.qmake_dir))
      .line("mingw32-make.exe clean")
      .line(format!(
        "qmake.exe {} -r -spec {} \"CONFIG+=release\"",
        quote_path(&self.project.display().to_string()),
        self.mkspec
      ))
      .line(format!("mingw32-make.exe -j{}", self.jobs))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn msvc_script_sets_up_sdk_and_builds_with_jom() {
    let extra = vec!["\"QMAKE_CXXFLAGS_RELEASE += -wd4251\"".to_string()];
    let script = MsvcScript {
      sdk_dir: Path::new(r"C:\Program Files\Microsoft SDKs\Windows\v7.1\Bin"),
      arch: Arch::X86,
      version: "2010",
      build_dir: Path::new(r"C:\hopsan\HopsanCore_bd"),
      project: Path::new(r"C:\hopsan\HopsanCore\HopsanCore.pro"),
      jom: r"C:\Qt\Tools\QtCreator\bin\jom.exe",
      qmake: r"C:\Qt\5.6\bin\qmake.exe",
      extra_qmake_args: &extra,
    }
    .render();

    let lines = script.lines();
    assert_eq!(lines[2], "setlocal enabledelayedexpansion");
    assert_eq!(
      lines[3],
      r#"call "C:\Program Files\Microsoft SDKs\Windows\v7.1\Bin\SetEnv.cmd" /Release /x86"#
    );
    assert_eq!(lines[5], r#"cd "C:\hopsan\HopsanCore_bd""#);
    assert_eq!(lines[6], r#"call "C:\Qt\Tools\QtCreator\bin\jom.exe" clean"#);
    assert_eq!(
      lines[7],
      r#"call "C:\Qt\5.6\bin\qmake.exe" "C:\hopsan\HopsanCore\HopsanCore.pro" -r -spec win32-msvc2010 "CONFIG+=release" "QMAKE_CXXFLAGS_RELEASE += -wd4251""#
    );
    assert_eq!(lines[8], r#"call "C:\Qt\Tools\QtCreator\bin\jom.exe""#);
    assert_eq!(lines.last().map(String::as_str), Some("cd .."));
  }

  #[test]
  fn mingw_script_prepends_toolchain_to_path() {
    let script = MingwScript {
      mingw_dir: r"C:\mingw64\bin",
      qmake_dir: r"C:\Qt\5.6\bin",
      project: Path::new(r"C:\hopsan\HopsanNG_remote.pro"),
      mkspec: "win32-g++",
      jobs: 4,
    }
    .render();

    assert_eq!(
      script.lines()[2..],
      [
        r"SET PATH=C:\mingw64\bin;C:\Qt\5.6\bin;%PATH%".to_string(),
        "mingw32-make.exe clean".to_string(),
        r#"qmake.exe "C:\hopsan\HopsanNG_remote.pro" -r -spec win32-g++ "CONFIG+=release""#.to_string(),
        "mingw32-make.exe -j4".to_string(),
      ]
    );
  }
}

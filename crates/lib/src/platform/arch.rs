use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target architecture of a Windows release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
  X86,
  #[default]
  X64,
}

impl Arch {
  /// Returns the identifier passed to the toolchain scripts ("x86" / "x64")
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::X86 => "x86",
      Self::X64 => "x64",
    }
  }

  /// Returns the platform suffix used in package names ("win32" / "win64")
  pub fn win_suffix(&self) -> &'static str {
    match self {
      Self::X86 => "win32",
      Self::X64 => "win64",
    }
  }

  /// Returns the architecture define handed to Inno Setup.
  ///
  /// Inno Setup expects an empty value for 32-bit installers.
  pub fn inno_arch(&self) -> &'static str {
    match self {
      Self::X86 => "",
      Self::X64 => "x64",
    }
  }

  pub fn is_64bit(&self) -> bool {
    matches!(self, Self::X64)
  }
}

impl fmt::Display for Arch {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Arch {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "x86" | "win32" | "i686" => Ok(Self::X86),
      "x64" | "win64" | "x86_64" | "amd64" => Ok(Self::X64),
      other => Err(format!("unknown architecture: {other}")),
    }
  }
}

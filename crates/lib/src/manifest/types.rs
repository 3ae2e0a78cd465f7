//! Manifest types for relbuild.
//!
//! The manifest is the project's release checklist expressed as data: which
//! tools must be present, which files are edited before the build, which
//! toolchains run, what is copied into the release tree and how it is
//! packaged. It lives in `release.toml` at the project root.
//!
//! String fields that name paths or commands may contain placeholders (see
//! [`crate::placeholder`]); they are expanded once a release is configured.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::consts::DO_NOT_SAVE_MARKER;
use crate::platform::Arch;

/// The complete release manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
  pub product: Product,
  #[serde(default)]
  pub helpers: Helpers,
  /// Tools to locate before anything runs, keyed by the name used in
  /// `{tool:<name>}` placeholders.
  #[serde(default)]
  pub tools: BTreeMap<String, ToolSpec>,
  #[serde(default)]
  pub prepare: Prepare,
  #[serde(default)]
  pub build: Build,
  #[serde(default)]
  pub runtime: Vec<RuntimeGroup>,
  #[serde(default)]
  pub stage: Stage,
  #[serde(default)]
  pub installer: Installer,
  #[serde(default)]
  pub validation: Option<Validation>,
}

/// A value that differs between the 32-bit and 64-bit release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerArch<T> {
  pub x86: T,
  pub x64: T,
}

impl<T> PerArch<T> {
  pub fn get(&self, arch: Arch) -> &T {
    match arch {
      Arch::X86 => &self.x86,
      Arch::X64 => &self.x64,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Product {
  pub name: String,
  /// Used when the operator leaves the version empty (a dev build).
  pub base_version: String,
  #[serde(default = "default_bin_dir")]
  pub bin_dir: String,
  /// Directory staging trees are created under.
  #[serde(default)]
  pub staging_root: Option<String>,
  #[serde(default = "default_output_dir")]
  pub output_dir: PerArch<String>,
}

impl Default for Product {
  fn default() -> Self {
    Self {
      name: String::new(),
      base_version: String::new(),
      bin_dir: default_bin_dir(),
      staging_root: None,
      output_dir: default_output_dir(),
    }
  }
}

fn default_bin_dir() -> String {
  "bin".to_string()
}

fn default_output_dir() -> PerArch<String> {
  PerArch {
    x86: "output".to_string(),
    x64: "output64".to_string(),
  }
}

/// Project helper scripts the release relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Helpers {
  /// Script printing `name: value` lines with toolchain directories. It is
  /// invoked with the architecture as its only argument.
  #[serde(default)]
  pub build_paths: Option<String>,
  /// Names that must be present in the build-path output.
  #[serde(default = "default_build_path_keys")]
  pub build_path_keys: Vec<String>,
  /// Command whose output is shown before asking for the revision.
  #[serde(default)]
  pub revision: Option<String>,
}

impl Default for Helpers {
  fn default() -> Self {
    Self {
      build_paths: None,
      build_path_keys: default_build_path_keys(),
      revision: None,
    }
  }
}

fn default_build_path_keys() -> Vec<String> {
  vec!["mingw".to_string(), "qmake".to_string()]
}

/// How to find one external tool installation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolSpec {
  /// Missing required tools abort the release, missing optional ones warn.
  #[serde(default)]
  pub required: bool,
  /// Installation directories to search. When several exist the last one wins.
  #[serde(default)]
  pub candidates: Vec<String>,
  /// Executable to search for on `PATH`; its parent directory is the tool dir.
  #[serde(default)]
  pub executable: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
}

impl ToolSpec {
  pub fn display_name<'a>(&'a self, name: &'a str) -> &'a str {
    self.description.as_deref().unwrap_or(name)
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Prepare {
  #[serde(default)]
  pub commands: Vec<HelperCommand>,
  #[serde(default)]
  pub splash: Option<Splash>,
  #[serde(default)]
  pub edits: Vec<TextEdit>,
}

/// A shell command run from a directory below the project root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HelperCommand {
  pub run: String,
  #[serde(default)]
  pub dir: Option<String>,
}

/// Splash image regenerated from an SVG template through Inkscape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Splash {
  pub template: String,
  pub output: String,
  #[serde(default = "default_splash_background")]
  pub background: String,
  /// Text removed from the template for non-dev releases.
  #[serde(default)]
  pub dev_marker: Option<String>,
  #[serde(default = "default_version_token")]
  pub version_token: String,
  #[serde(default = "default_revision_token")]
  pub revision_token: String,
  #[serde(default = "default_splash_tool")]
  pub tool: String,
  #[serde(default = "default_splash_executable")]
  pub executable: String,
}

fn default_splash_background() -> String {
  "#ffffff".to_string()
}

fn default_version_token() -> String {
  "X.X.X".to_string()
}

fn default_revision_token() -> String {
  "R.R.R".to_string()
}

fn default_splash_tool() -> String {
  "inkscape".to_string()
}

fn default_splash_executable() -> String {
  "inkscape.exe".to_string()
}

/// When a text edit applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditWhen {
  #[default]
  Always,
  /// Only for versioned releases, skipped for dev builds.
  Release,
  /// Only for dev builds.
  Dev,
}

impl EditWhen {
  pub fn applies(&self, dev_build: bool) -> bool {
    match self {
      Self::Always => true,
      Self::Release => !dev_build,
      Self::Dev => dev_build,
    }
  }
}

/// How a matched pattern is replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditMode {
  /// Replace every match in the file.
  #[default]
  Replace,
  /// Replace whole lines containing a match; an empty replacement deletes them.
  Lines,
}

/// An in-place regex edit of a file below the project root.
///
/// `replace` may contain placeholders and uses the `regex` crate's
/// replacement syntax (`$1` for a group, `$$` for a literal dollar).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TextEdit {
  pub file: String,
  pub pattern: String,
  #[serde(default)]
  pub replace: String,
  #[serde(default)]
  pub mode: EditMode,
  #[serde(default)]
  pub when: EditWhen,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Build {
  #[serde(default)]
  pub msvc: Option<MsvcBuild>,
  #[serde(default)]
  pub mingw: Option<MingwBuild>,
  /// Generic toolchains: a shell command and the artifacts it must produce.
  #[serde(default)]
  pub commands: Vec<CommandBuild>,
  /// Upper bound for a single toolchain invocation.
  #[serde(default)]
  pub timeout_secs: Option<u64>,
}

/// Core library builds with the Windows SDK compilers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MsvcBuild {
  pub project: String,
  #[serde(default = "default_msvc_build_dir")]
  pub build_dir: String,
  #[serde(default = "default_jom")]
  pub jom: String,
  #[serde(default = "default_qmake")]
  pub qmake: String,
  #[serde(default)]
  pub extra_qmake_args: Vec<String>,
  /// Files the build leaves in `bin`, moved into `bin/MSVC<ver>_<arch>`.
  pub artifacts: Vec<String>,
  #[serde(default)]
  pub variants: Vec<MsvcVariant>,
  /// Applied before the MSVC builds run.
  #[serde(default)]
  pub edits: Vec<TextEdit>,
}

fn default_msvc_build_dir() -> String {
  "build_msvc".to_string()
}

fn default_jom() -> String {
  "{tool:qtcreator}\\bin\\jom.exe".to_string()
}

fn default_qmake() -> String {
  "{qmake}\\qmake.exe".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MsvcVariant {
  /// Compiler version, used in the mkspec (`win32-msvc<version>`).
  pub version: String,
  /// Tool whose directory contains `SetEnv.cmd`. Unlocated SDKs are skipped.
  pub tool: String,
  #[serde(default = "default_msvc_archs")]
  pub archs: Vec<Arch>,
}

fn default_msvc_archs() -> Vec<Arch> {
  vec![Arch::X86, Arch::X64]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MingwBuild {
  pub project: String,
  #[serde(default = "default_mingw_build_dir")]
  pub build_dir: String,
  #[serde(default = "default_mkspec")]
  pub mkspec: String,
  #[serde(default = "default_jobs")]
  pub jobs: u32,
  /// Files that must exist in `bin` after the build.
  pub artifacts: Vec<String>,
  /// Applied before the MinGW build runs.
  #[serde(default)]
  pub edits: Vec<TextEdit>,
}

fn default_mingw_build_dir() -> String {
  "build_mingw".to_string()
}

fn default_mkspec() -> String {
  "win32-g++".to_string()
}

fn default_jobs() -> u32 {
  4
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandBuild {
  pub name: String,
  pub run: String,
  #[serde(default)]
  pub dir: Option<String>,
  /// Paths relative to the project root that must exist afterwards.
  #[serde(default)]
  pub artifacts: Vec<String>,
}

/// Runtime binaries copied from one directory into `bin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeGroup {
  pub from: String,
  #[serde(default)]
  pub files: Vec<String>,
  /// Replaces `files` for 32-bit releases when present.
  #[serde(default)]
  pub files_x86: Option<Vec<String>>,
  /// Recreate the directory part of each file below `bin`.
  #[serde(default = "default_true")]
  pub keep_relative: bool,
  /// Missing files only warn.
  #[serde(default)]
  pub optional: bool,
}

impl RuntimeGroup {
  pub fn files_for(&self, arch: Arch) -> &[String] {
    match (arch, &self.files_x86) {
      (Arch::X86, Some(files)) => files,
      _ => &self.files,
    }
  }
}

fn default_true() -> bool {
  true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stage {
  /// Directories created up front, relative to the staging directory.
  #[serde(default)]
  pub dirs: Vec<String>,
  #[serde(default)]
  pub docs: Option<Docs>,
  #[serde(default)]
  pub items: Vec<StageItem>,
  /// File written into every staged directory. Empty disables it.
  #[serde(default = "default_marker")]
  pub marker: String,
  #[serde(default = "default_true")]
  pub read_only: bool,
}

impl Default for Stage {
  fn default() -> Self {
    Self {
      dirs: Vec::new(),
      docs: None,
      items: Vec::new(),
      marker: default_marker(),
      read_only: true,
    }
  }
}

fn default_marker() -> String {
  DO_NOT_SAVE_MARKER.to_string()
}

/// Documentation build; a missing `check` file only warns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Docs {
  pub run: String,
  #[serde(default)]
  pub check: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
  /// Plain directory copy from the working tree.
  Copy,
  /// Clean export of tracked content at `HEAD`.
  Export,
}

/// One entry placed into the staging directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageItem {
  pub kind: StageKind,
  /// Relative to the project root.
  pub src: String,
  /// Parent directory inside the staging tree; empty means its root.
  #[serde(default)]
  pub dest: String,
  #[serde(default)]
  pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Installer {
  #[serde(default = "default_true")]
  pub zip: bool,
  #[serde(default)]
  pub inno: Option<Inno>,
  /// Copied into the output directory once packages exist.
  #[serde(default)]
  pub release_notes: Option<String>,
  /// Bundled compiler for the `with_compiler` packages.
  #[serde(default)]
  pub compiler: Option<BundledCompiler>,
}

impl Default for Installer {
  fn default() -> Self {
    Self {
      zip: true,
      inno: None,
      release_notes: None,
      compiler: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Inno {
  pub script: String,
  #[serde(default = "default_inno_tool")]
  pub tool: String,
  #[serde(default = "default_inno_compiler")]
  pub compiler: String,
}

fn default_inno_tool() -> String {
  "inno".to_string()
}

fn default_inno_compiler() -> String {
  "iscc.exe".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundledCompiler {
  #[serde(default = "default_compiler_from")]
  pub from: String,
  #[serde(default = "default_compiler_name")]
  pub name: PerArch<String>,
}

fn default_compiler_from() -> String {
  "{mingw}/..".to_string()
}

fn default_compiler_name() -> PerArch<String> {
  PerArch {
    x86: "mingw".to_string(),
    x64: "mingw64".to_string(),
  }
}

/// Smoke test run after packaging. Failure is only a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Validation {
  pub run: String,
  #[serde(default)]
  pub pause_on_failure: bool,
}

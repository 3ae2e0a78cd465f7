//! Release configuration built once from the operator's answers.
//!
//! Nothing here changes after the final confirmation: every phase receives
//! the same [`ReleaseConfig`] by reference.

use std::path::{Path, PathBuf};

use crate::manifest::Manifest;
use crate::placeholder::{PlaceholderError, Placeholders};
use crate::platform::Arch;
use crate::platform::paths::staging_root;
use crate::tools::{BuildPaths, ToolPaths};

/// Answers to the release questions, from prompts or flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseAnswers {
  pub arch: Arch,
  /// Empty for a dev build.
  pub version: String,
  pub revision: String,
  pub build_msvc: bool,
  pub include_compiler: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseConfig {
  pub product: String,
  pub root: PathBuf,
  pub base_version: String,
  pub revision: String,
  pub dev_build: bool,
  pub arch: Arch,
  pub build_msvc: bool,
  pub include_compiler: bool,
  pub bin_dir: PathBuf,
  pub staging_dir: PathBuf,
  pub output_dir: PathBuf,
}

/// Which package a file name is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
  Zip,
  Installer,
}

impl ReleaseConfig {
  /// Derive the configuration. An empty version answer means a dev build
  /// using the manifest's base version.
  pub fn new(root: &Path, manifest: &Manifest, answers: &ReleaseAnswers) -> Result<Self, PlaceholderError> {
    let version = answers.version.trim();
    let dev_build = version.is_empty();
    let base_version = if dev_build {
      manifest.product.base_version.clone()
    } else {
      version.to_string()
    };

    let mut config = Self {
      product: manifest.product.name.clone(),
      root: root.to_path_buf(),
      base_version,
      revision: answers.revision.trim().to_string(),
      dev_build,
      arch: answers.arch,
      build_msvc: answers.build_msvc,
      include_compiler: answers.include_compiler,
      bin_dir: root.join(&manifest.product.bin_dir),
      staging_dir: PathBuf::new(),
      output_dir: root.join(manifest.product.output_dir.get(answers.arch)),
    };

    let configured_root = match &manifest.product.staging_root {
      Some(value) => Some(config.base_placeholders().expand(value)?),
      None => None,
    };
    config.staging_dir = staging_root(configured_root.as_deref()).join(config.release_name());

    Ok(config)
  }

  /// `<base>.<revision>`, or just the base version without a revision.
  pub fn full_version(&self) -> String {
    if self.revision.is_empty() {
      self.base_version.clone()
    } else {
      format!("{}.{}", self.base_version, self.revision)
    }
  }

  /// `<Product>-<full version>-win64`, the staging directory name.
  pub fn release_name(&self) -> String {
    format!("{}-{}-{}", self.product, self.full_version(), self.arch.win_suffix())
  }

  /// File name of a package, without extension for installers.
  pub fn package_name(&self, kind: PackageKind, with_compiler: bool) -> String {
    let compiler = if with_compiler { "-with_compiler" } else { "" };
    match kind {
      PackageKind::Zip => format!("{}{}-zip.zip", self.release_name(), compiler),
      PackageKind::Installer => format!("{}{}-installer", self.release_name(), compiler),
    }
  }

  fn base_placeholders(&self) -> Placeholders {
    let mut p = Placeholders::new();
    p.set("root", self.root.display().to_string())
      .set("bin", self.bin_dir.display().to_string())
      .set("output", self.output_dir.display().to_string())
      .set("product", self.product.clone())
      .set("version", self.base_version.clone())
      .set("revision", self.revision.clone())
      .set("full_version", self.full_version())
      .set("arch", self.arch.as_str());
    p
  }

  /// Everything manifest strings may refer to for this release.
  pub fn placeholders(&self, build_paths: &BuildPaths, tools: &ToolPaths) -> Placeholders {
    let mut p = Placeholders::new();
    for (name, value) in build_paths.entries() {
      p.set(name, value);
    }
    for (name, dir) in tools.iter() {
      p.set_tool(name, dir.display().to_string());
    }

    let base = self.base_placeholders();
    for name in ["root", "bin", "output", "product", "version", "revision", "full_version", "arch"] {
      if let Some(value) = base.var(name) {
        p.set(name, value);
      }
    }
    p.set("staging", self.staging_dir.display().to_string());
    p
  }
}

//! Release manifest loading and validation.
//!
//! `release.toml` is parsed with serde and checked for references that would
//! otherwise only fail halfway through a release: toolchain variants naming
//! undeclared tools, edit patterns that do not compile, unknown placeholder
//! kinds.

mod types;

use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::placeholder::{self, PlaceholderError};
use crate::platform::paths::manifest_path;

pub use types::*;

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("no {} found in {}", crate::consts::MANIFEST_FILENAME, .0.display())]
  NotFound(PathBuf),

  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: Box<toml::de::Error>,
  },

  #[error("product name must not be empty")]
  MissingProductName,

  #[error("{context} refers to undeclared tool '{tool}'")]
  UndeclaredTool { context: String, tool: String },

  #[error("invalid pattern in edit of {file}: {source}")]
  InvalidPattern {
    file: String,
    #[source]
    source: Box<regex::Error>,
  },

  #[error("invalid placeholder in '{value}': {source}")]
  Placeholder {
    value: String,
    #[source]
    source: PlaceholderError,
  },
}

impl Manifest {
  /// Load `release.toml` from a project root.
  pub fn load(root: &Path) -> Result<Self, ManifestError> {
    let path = manifest_path(root);
    if !path.is_file() {
      return Err(ManifestError::NotFound(root.to_path_buf()));
    }

    let content = std::fs::read_to_string(&path).map_err(|e| ManifestError::Read {
      path: path.clone(),
      source: e,
    })?;

    debug!(path = %path.display(), "loaded manifest");
    Self::parse(&content, &path)
  }

  /// Parse and validate manifest text; `path` is only used in errors.
  pub fn parse(content: &str, path: &Path) -> Result<Self, ManifestError> {
    let manifest: Manifest = toml::from_str(content).map_err(|e| ManifestError::Parse {
      path: path.to_path_buf(),
      source: Box::new(e),
    })?;
    manifest.validate()?;
    Ok(manifest)
  }

  /// Check cross references and syntax that serde cannot.
  pub fn validate(&self) -> Result<(), ManifestError> {
    if self.product.name.trim().is_empty() {
      return Err(ManifestError::MissingProductName);
    }

    for edit in self.all_edits() {
      Regex::new(&edit.pattern).map_err(|e| ManifestError::InvalidPattern {
        file: edit.file.clone(),
        source: Box::new(e),
      })?;
    }

    let mut tool_refs: Vec<(String, &str)> = Vec::new();
    if let Some(msvc) = &self.build.msvc {
      for variant in &msvc.variants {
        tool_refs.push((format!("MSVC {} build", variant.version), &variant.tool));
      }
    }
    if let Some(splash) = &self.prepare.splash {
      tool_refs.push(("splash image".to_string(), &splash.tool));
    }
    if let Some(inno) = &self.installer.inno {
      tool_refs.push(("installer".to_string(), &inno.tool));
    }

    for value in self.templated_values() {
      let segments = placeholder::parse(value).map_err(|e| ManifestError::Placeholder {
        value: value.to_string(),
        source: e,
      })?;
      for segment in segments {
        if let placeholder::Segment::Placeholder(placeholder::Placeholder::Tool(tool)) = segment
          && !self.tools.contains_key(&tool)
        {
          return Err(ManifestError::UndeclaredTool {
            context: format!("'{value}'"),
            tool,
          });
        }
      }
    }

    for (context, tool) in tool_refs {
      if !self.tools.contains_key(tool) {
        return Err(ManifestError::UndeclaredTool {
          context,
          tool: tool.to_string(),
        });
      }
    }

    Ok(())
  }

  /// Every text edit in the manifest, in no particular order.
  pub fn all_edits(&self) -> impl Iterator<Item = &TextEdit> {
    let msvc = self.build.msvc.iter().flat_map(|m| m.edits.iter());
    let mingw = self.build.mingw.iter().flat_map(|m| m.edits.iter());
    self.prepare.edits.iter().chain(msvc).chain(mingw)
  }

  fn templated_values(&self) -> Vec<&str> {
    let mut values: Vec<&str> = Vec::new();
    values.extend(self.product.staging_root.as_deref());
    values.extend(self.helpers.build_paths.as_deref());
    values.extend(self.helpers.revision.as_deref());
    values.extend(self.prepare.commands.iter().map(|c| c.run.as_str()));
    values.extend(self.all_edits().map(|e| e.replace.as_str()));
    if let Some(msvc) = &self.build.msvc {
      values.push(&msvc.jom);
      values.push(&msvc.qmake);
    }
    for command in &self.build.commands {
      values.push(&command.run);
      values.extend(command.artifacts.iter().map(String::as_str));
    }
    values.extend(self.runtime.iter().map(|r| r.from.as_str()));
    values.extend(self.stage.docs.iter().map(|d| d.run.as_str()));
    values.extend(self.installer.compiler.iter().map(|c| c.from.as_str()));
    values.extend(self.validation.iter().map(|v| v.run.as_str()));
    values
  }
}

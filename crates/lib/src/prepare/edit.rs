//! In-place regex edits of project files.
//!
//! Patterns run in CRLF mode so `.*` stops before the `\r` of Windows line
//! endings and edited files keep their original line endings.

use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use thiserror::Error;
use tracing::{debug, warn};

use crate::manifest::{EditMode, TextEdit};
use crate::placeholder::{PlaceholderError, Placeholders};

#[derive(Debug, Error)]
pub enum EditError {
  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to write {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("invalid pattern '{pattern}': {source}")]
  Pattern {
    pattern: String,
    #[source]
    source: Box<regex::Error>,
  },

  #[error(transparent)]
  Placeholder(#[from] PlaceholderError),
}

pub fn compile(pattern: &str) -> Result<Regex, EditError> {
  RegexBuilder::new(pattern)
    .crlf(true)
    .multi_line(true)
    .build()
    .map_err(|e| EditError::Pattern {
      pattern: pattern.to_string(),
      source: Box::new(e),
    })
}

fn read(path: &Path) -> Result<String, EditError> {
  std::fs::read_to_string(path).map_err(|e| EditError::Read {
    path: path.to_path_buf(),
    source: e,
  })
}

fn write(path: &Path, content: &str) -> Result<(), EditError> {
  std::fs::write(path, content).map_err(|e| EditError::Write {
    path: path.to_path_buf(),
    source: e,
  })
}

/// Replace every match of `pattern` in the file. Returns the match count.
pub fn replace_pattern(path: &Path, pattern: &Regex, replacement: &str) -> Result<usize, EditError> {
  let content = read(path)?;
  let count = pattern.find_iter(&content).count();
  if count > 0 {
    let edited = pattern.replace_all(&content, replacement);
    write(path, &edited)?;
  }
  Ok(count)
}

/// Replace each line containing a match with `replacement`, or drop it when
/// `replacement` is empty. Returns the number of lines touched.
pub fn replace_matching_lines(path: &Path, pattern: &Regex, replacement: &str) -> Result<usize, EditError> {
  let content = read(path)?;
  let mut edited = String::with_capacity(content.len());
  let mut count = 0;

  for line in content.split_inclusive('\n') {
    let body = line.trim_end_matches(['\r', '\n']);
    if !pattern.is_match(body) {
      edited.push_str(line);
      continue;
    }

    count += 1;
    if !replacement.is_empty() {
      edited.push_str(replacement);
      edited.push_str(&line[body.len()..]);
    }
  }

  if count > 0 {
    write(path, &edited)?;
  }
  Ok(count)
}

/// Apply one manifest edit to a file below `root`.
pub fn apply_edit(root: &Path, edit: &TextEdit, placeholders: &Placeholders) -> Result<usize, EditError> {
  let path = root.join(&edit.file);
  let pattern = compile(&edit.pattern)?;
  let replacement = placeholders.expand(&edit.replace)?;

  let count = match edit.mode {
    EditMode::Replace => replace_pattern(&path, &pattern, &replacement)?,
    EditMode::Lines => replace_matching_lines(&path, &pattern, &replacement)?,
  };

  if count == 0 {
    warn!(file = %edit.file, pattern = %edit.pattern, "edit pattern matched nothing");
  } else {
    debug!(file = %edit.file, pattern = %edit.pattern, count, "edited");
  }
  Ok(count)
}

/// Apply the edits that are relevant for this kind of build, in order.
pub fn apply_edits(root: &Path, edits: &[TextEdit], dev_build: bool, placeholders: &Placeholders) -> Result<usize, EditError> {
  let mut total = 0;
  for edit in edits.iter().filter(|e| e.when.applies(dev_build)) {
    total += apply_edit(root, edit, placeholders)?;
  }
  Ok(total)
}

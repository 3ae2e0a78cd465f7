//! Placeholder parsing and substitution for manifest strings.
//!
//! Paths and commands in `release.toml` refer to values that are only known
//! once a release has been configured: where the project lives, where the
//! toolchains were found, which version is being built.
//!
//! # Placeholder Formats
//!
//! - `{name}` - a release variable (`root`, `mingw`, `qmake`, `version`,
//!   `revision`, `full_version`, `arch`, `staging`, ...)
//! - `{tool:<name>}` - the resolved directory of a located tool
//!
//! # Literal Braces
//!
//! A `{` that does not start a well-formed placeholder passes through
//! unchanged, so shell syntax like `${PATH}` or `{ 1 }` survives. Use `{{` to
//! force a literal `{` in front of something that would otherwise parse.
//!
//! # Example
//!
//! ```
//! use relbuild_lib::placeholder::{Placeholder, Segment, parse};
//!
//! let segments = parse("{tool:inno}\\iscc.exe").unwrap();
//! assert_eq!(segments, vec![
//!     Segment::Placeholder(Placeholder::Tool("inno".to_string())),
//!     Segment::Literal("\\iscc.exe".to_string()),
//! ]);
//! ```

use std::collections::BTreeMap;

use thiserror::Error;

/// A parsed placeholder reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
  /// `{name}` - a release variable
  Var(String),

  /// `{tool:<name>}` - directory of a located tool
  Tool(String),
}

/// A segment of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Literal(String),
  Placeholder(Placeholder),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaceholderError {
  #[error("unclosed placeholder at position {0}")]
  Unclosed(usize),

  #[error("unknown placeholder type: {0}")]
  UnknownType(String),

  #[error("malformed placeholder: {0}")]
  Malformed(String),

  #[error("unknown variable '{{{0}}}'")]
  UnresolvedVar(String),

  #[error("tool '{0}' was not located")]
  UnresolvedTool(String),
}

/// Looks up the values placeholders stand for.
pub trait Resolver {
  fn resolve_var(&self, name: &str) -> Result<&str, PlaceholderError>;

  fn resolve_tool(&self, name: &str) -> Result<&str, PlaceholderError>;
}

fn is_name_char(c: char) -> bool {
  c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' || c == ':'
}

/// Parse a string containing placeholders into segments.
///
/// # Errors
///
/// Returns an error when a placeholder is started but never closed, or when
/// its type is not one of the known kinds.
pub fn parse(input: &str) -> Result<Vec<Segment>, PlaceholderError> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut chars = input.char_indices().peekable();

  while let Some((pos, ch)) = chars.next() {
    if ch != '{' {
      literal.push(ch);
      continue;
    }

    if let Some((_, '{')) = chars.peek() {
      chars.next();
      literal.push('{');
      continue;
    }

    let mut content = String::new();
    let mut closed = false;
    let mut interrupted = false;

    while let Some(&(_, c)) = chars.peek() {
      if c == '}' {
        chars.next();
        closed = true;
        break;
      }
      if !is_name_char(c) {
        interrupted = true;
        break;
      }
      content.push(c);
      chars.next();
    }

    let starts_with_letter = content.chars().next().is_some_and(|c| c.is_ascii_lowercase());

    if closed && starts_with_letter {
      if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(&mut literal)));
      }
      segments.push(Segment::Placeholder(parse_placeholder_content(&content)?));
    } else if !closed && !interrupted && starts_with_letter {
      return Err(PlaceholderError::Unclosed(pos));
    } else {
      literal.push('{');
      literal.push_str(&content);
      if closed {
        literal.push('}');
      }
    }
  }

  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }

  Ok(segments)
}

fn parse_placeholder_content(content: &str) -> Result<Placeholder, PlaceholderError> {
  match content.split_once(':') {
    None => Ok(Placeholder::Var(content.to_string())),
    Some(("tool", name)) if !name.is_empty() && !name.contains(':') => Ok(Placeholder::Tool(name.to_string())),
    Some(("tool", _)) => Err(PlaceholderError::Malformed(content.to_string())),
    Some((kind, _)) => Err(PlaceholderError::UnknownType(kind.to_string())),
  }
}

/// Substitute all placeholders in a string using the provided resolver.
pub fn substitute(input: &str, resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let segments = parse(input)?;
  substitute_segments(&segments, resolver)
}

pub fn substitute_segments(segments: &[Segment], resolver: &impl Resolver) -> Result<String, PlaceholderError> {
  let mut result = String::new();

  for segment in segments {
    match segment {
      Segment::Literal(s) => result.push_str(s),
      Segment::Placeholder(Placeholder::Var(name)) => result.push_str(resolver.resolve_var(name)?),
      Segment::Placeholder(Placeholder::Tool(name)) => result.push_str(resolver.resolve_tool(name)?),
    }
  }

  Ok(result)
}

/// Variable and tool tables for one release.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
  vars: BTreeMap<String, String>,
  tools: BTreeMap<String, String>,
}

impl Placeholders {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
    self.vars.insert(name.into(), value.into());
    self
  }

  pub fn set_tool(&mut self, name: impl Into<String>, dir: impl Into<String>) -> &mut Self {
    self.tools.insert(name.into(), dir.into());
    self
  }

  pub fn var(&self, name: &str) -> Option<&str> {
    self.vars.get(name).map(String::as_str)
  }

  pub fn expand(&self, input: &str) -> Result<String, PlaceholderError> {
    substitute(input, self)
  }
}

impl Resolver for Placeholders {
  fn resolve_var(&self, name: &str) -> Result<&str, PlaceholderError> {
    self
      .vars
      .get(name)
      .map(String::as_str)
      .ok_or_else(|| PlaceholderError::UnresolvedVar(name.to_string()))
  }

  fn resolve_tool(&self, name: &str) -> Result<&str, PlaceholderError> {
    self
      .tools
      .get(name)
      .map(String::as_str)
      .ok_or_else(|| PlaceholderError::UnresolvedTool(name.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn table() -> Placeholders {
    let mut p = Placeholders::new();
    p.set("root", r"C:\hopsan")
      .set("full_version", "2.9.0.20240101.1200")
      .set_tool("inno", r"C:\Program Files\Inno Setup 5");
    p
  }

  #[test]
  fn parses_vars_and_tools() {
    let segments = parse("{root}/bin/{tool:qtcreator}").unwrap();
    assert_eq!(
      segments,
      vec![
        Segment::Placeholder(Placeholder::Var("root".to_string())),
        Segment::Literal("/bin/".to_string()),
        Segment::Placeholder(Placeholder::Tool("qtcreator".to_string())),
      ]
    );
  }

  #[test]
  fn expands_known_values() {
    let expanded = table().expand(r#""{tool:inno}\iscc.exe" /dMyAppVersion={full_version}"#).unwrap();
    assert_eq!(
      expanded,
      r#""C:\Program Files\Inno Setup 5\iscc.exe" /dMyAppVersion=2.9.0.20240101.1200"#
    );
  }

  #[test]
  fn non_placeholder_braces_pass_through() {
    let p = table();
    assert_eq!(p.expand("echo ${PATH} { 1 } {}").unwrap(), "echo ${PATH} { 1 } {}");
    assert_eq!(p.expand("{{root}").unwrap(), "{root}");
    assert_eq!(p.expand("{Upper}").unwrap(), "{Upper}");
  }

  #[test]
  fn unknown_variable_is_an_error() {
    let err = table().expand("{qmake}/qmake.exe").unwrap_err();
    assert_eq!(err, PlaceholderError::UnresolvedVar("qmake".to_string()));
  }

  #[test]
  fn missing_tool_is_an_error() {
    let err = table().expand("{tool:inkscape}").unwrap_err();
    assert_eq!(err, PlaceholderError::UnresolvedTool("inkscape".to_string()));
  }

  #[test]
  fn unclosed_placeholder_is_reported() {
    assert_eq!(parse("abc {root").unwrap_err(), PlaceholderError::Unclosed(4));
  }

  #[test]
  fn unknown_kind_is_reported() {
    assert_eq!(
      parse("{env:path}").unwrap_err(),
      PlaceholderError::UnknownType("env".to_string())
    );
  }
}

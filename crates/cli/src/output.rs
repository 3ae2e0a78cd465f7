//! CLI output formatting utilities.
//!
//! Colored status lines go to the terminal; diagnostics go through
//! `tracing` on stderr.

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

/// `yes`/`no` for summaries.
pub fn yes_no(value: bool) -> &'static str {
  if value { "yes" } else { "no" }
}

/// Rounded down to whole seconds.
pub fn format_elapsed(elapsed: std::time::Duration) -> String {
  humantime::format_duration(std::time::Duration::from_secs(elapsed.as_secs())).to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[test]
  fn test_format_elapsed() {
    assert_eq!(format_elapsed(Duration::from_millis(1500)), "1s");
    assert_eq!(format_elapsed(Duration::from_secs(65)), "1m 5s");
    assert_eq!(format_elapsed(Duration::from_secs(3600)), "1h");
  }

  #[test]
  fn test_yes_no() {
    assert_eq!(yes_no(true), "yes");
    assert_eq!(yes_no(false), "no");
  }
}

//! Console prompts.
//!
//! Questions are written to stderr and answers read from stdin. Without a
//! terminal nothing is asked: yes/no questions fall back to their default
//! and free text to its default value.

use std::io::{self, BufRead, IsTerminal, Write};

use relbuild_lib::pipeline::Interaction;
use tracing::warn;

/// Whether both stdin and stderr are attached to a terminal.
pub fn is_interactive() -> bool {
  io::stdin().is_terminal() && io::stderr().is_terminal()
}

/// `y`/`yes`/`n`/`no` in any case; anything else is not an answer.
pub fn parse_yes_no(input: &str) -> Option<bool> {
  match input.trim().to_ascii_lowercase().as_str() {
    "y" | "yes" => Some(true),
    "n" | "no" => Some(false),
    _ => None,
  }
}

/// Trimmed answer, or `default` when the line is blank.
pub fn parse_text(input: &str, default: &str) -> String {
  let answer = input.trim();
  if answer.is_empty() {
    default.to_string()
  } else {
    answer.to_string()
  }
}

/// Ask until a yes/no answer is given. End of input is a "no".
pub fn ask_yes_no_with(reader: &mut impl BufRead, writer: &mut impl Write, question: &str) -> io::Result<bool> {
  loop {
    write!(writer, "{} [y/n] ", question)?;
    writer.flush()?;

    let mut input = String::new();
    if reader.read_line(&mut input)? == 0 {
      return Ok(false);
    }
    if let Some(answer) = parse_yes_no(&input) {
      return Ok(answer);
    }
    writeln!(writer, "Please answer y or n.")?;
  }
}

pub fn ask_text_with(
  reader: &mut impl BufRead,
  writer: &mut impl Write,
  question: &str,
  default: &str,
) -> io::Result<String> {
  if default.is_empty() {
    write!(writer, "{}: ", question)?;
  } else {
    write!(writer, "{} [{}]: ", question, default)?;
  }
  writer.flush()?;

  let mut input = String::new();
  reader.read_line(&mut input)?;
  Ok(parse_text(&input, default))
}

pub fn ask_yes_no(question: &str, default: bool) -> io::Result<bool> {
  if !is_interactive() {
    return Ok(default);
  }
  ask_yes_no_with(&mut io::stdin().lock(), &mut io::stderr(), question)
}

pub fn ask_text(question: &str, default: &str) -> io::Result<String> {
  if !is_interactive() {
    return Ok(default.to_string());
  }
  ask_text_with(&mut io::stdin().lock(), &mut io::stderr(), question, default)
}

/// Wait for enter on a terminal; return at once otherwise.
pub fn press_enter(message: &str) -> io::Result<()> {
  if !is_interactive() {
    return Ok(());
  }
  eprint!("{} ", message);
  io::stderr().flush()?;
  let mut input = String::new();
  io::stdin().read_line(&mut input)?;
  Ok(())
}

/// Answers pipeline questions on the console.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliInteraction {
  /// Answer yes without asking.
  pub assume_yes: bool,
  pub no_pause: bool,
}

impl Interaction for CliInteraction {
  fn confirm(&self, question: &str) -> bool {
    if self.assume_yes {
      return true;
    }
    ask_yes_no(question, false).unwrap_or_else(|e| {
      warn!(error = %e, "failed to read answer");
      false
    })
  }

  fn pause(&self, message: &str) {
    if self.no_pause {
      return;
    }
    if let Err(e) = press_enter(message) {
      warn!(error = %e, "failed to wait for enter");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[test]
  fn yes_no_answers() {
    assert_eq!(parse_yes_no("y\n"), Some(true));
    assert_eq!(parse_yes_no("  YES "), Some(true));
    assert_eq!(parse_yes_no("n"), Some(false));
    assert_eq!(parse_yes_no("No\r\n"), Some(false));
    assert_eq!(parse_yes_no(""), None);
    assert_eq!(parse_yes_no("maybe"), None);
  }

  #[test]
  fn blank_text_takes_default() {
    assert_eq!(parse_text("\n", "20240101.1200"), "20240101.1200");
    assert_eq!(parse_text(" 2.9.0 \r\n", ""), "2.9.0");
    assert_eq!(parse_text("   ", ""), "");
  }

  #[test]
  fn reprompts_until_answered() {
    let mut input = Cursor::new("what\n\ny\n");
    let mut out = Vec::new();

    let answer = ask_yes_no_with(&mut input, &mut out, "Do you want to build a 32-bit release?").unwrap();

    assert!(answer);
    let shown = String::from_utf8(out).unwrap();
    assert_eq!(shown.matches("32-bit release? [y/n]").count(), 3);
    assert_eq!(shown.matches("Please answer y or n.").count(), 2);
  }

  #[test]
  fn end_of_input_is_no() {
    let mut input = Cursor::new("");
    let mut out = Vec::new();
    assert!(!ask_yes_no_with(&mut input, &mut out, "Continue?").unwrap());
  }

  #[test]
  fn text_prompt_shows_default() {
    let mut input = Cursor::new("\n");
    let mut out = Vec::new();

    let answer = ask_text_with(&mut input, &mut out, "Enter revision number", "20240101.1200").unwrap();

    assert_eq!(answer, "20240101.1200");
    assert_eq!(String::from_utf8(out).unwrap(), "Enter revision number [20240101.1200]: ");
  }

  #[test]
  fn assume_yes_never_asks() {
    let interaction = CliInteraction {
      assume_yes: true,
      no_pause: true,
    };
    assert!(interaction.confirm("Unable to clear old output folder. Continue?"));
  }
}

mod cmd;
mod output;
mod prompts;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::output::{OutputFormat, print_error};

/// relbuild - Windows release builder driven by release.toml
#[derive(Parser)]
#[command(name = "relbuild")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Build, stage and package a release (the default)
  Release(ReleaseArgs),

  /// Export tracked content of a repository, nested repositories included
  Export {
    /// File or directory to export, relative to the repository
    src: String,

    /// Destination directory
    dest: PathBuf,

    /// Repository to export from (default: current directory)
    #[arg(long)]
    repo: Option<PathBuf>,
  },

  /// Resolve and report tool locations
  Tools {
    /// Report the toolchain for a 32-bit release
    #[arg(long)]
    x86: bool,

    /// Project root containing release.toml
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Write a release.toml template
  Init {
    /// Project directory
    #[arg(default_value = ".")]
    dir: PathBuf,
  },
}

/// Pre-answers for the release questions.
#[derive(Args)]
pub struct ReleaseArgs {
  /// Project root containing release.toml
  #[arg(long, default_value = ".")]
  pub root: PathBuf,

  /// Build a 32-bit release
  #[arg(long)]
  pub x86: bool,

  /// Version number; empty for a dev build
  #[arg(long = "release-version", value_name = "VERSION")]
  pub version: Option<String>,

  /// Revision number
  #[arg(long)]
  pub revision: Option<String>,

  /// Build the MSVC core libraries
  #[arg(long, overrides_with = "no_msvc")]
  pub msvc: bool,

  /// Skip the MSVC core libraries
  #[arg(long, overrides_with = "msvc")]
  pub no_msvc: bool,

  /// Also build packages with the bundled compiler
  #[arg(long)]
  pub include_compiler: bool,

  /// Answer yes to every remaining question
  #[arg(short, long)]
  pub yes: bool,

  /// Do not wait for enter when finished
  #[arg(long)]
  pub no_pause: bool,
}

impl Default for ReleaseArgs {
  fn default() -> Self {
    Self {
      root: PathBuf::from("."),
      x86: false,
      version: None,
      revision: None,
      msvc: false,
      no_msvc: false,
      include_compiler: false,
      yes: false,
      no_pause: false,
    }
  }
}

impl ReleaseArgs {
  /// `Some` when the MSVC question was answered by a flag.
  pub fn msvc_answer(&self) -> Option<bool> {
    match (self.msvc, self.no_msvc) {
      (true, _) => Some(true),
      (false, true) => Some(false),
      (false, false) => None,
    }
  }
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    None => cmd::cmd_release(&ReleaseArgs::default()),
    Some(Commands::Release(args)) => cmd::cmd_release(&args),
    Some(Commands::Export { src, dest, repo }) => cmd::cmd_export(&src, &dest, repo.as_deref()),
    Some(Commands::Tools { x86, root, output }) => cmd::cmd_tools(&root, x86, output),
    Some(Commands::Init { dir }) => cmd::cmd_init(&dir),
  };

  match result {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(e) => {
      print_error(&format!("{e:#}"));
      ExitCode::FAILURE
    }
  }
}

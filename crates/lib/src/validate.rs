//! Post-package smoke test.

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::manifest::Validation;
use crate::placeholder::{PlaceholderError, Placeholders};
use crate::process::{self, CommandSpec, ProcessError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
  Passed,
  Failed { code: Option<i32> },
  NotConfigured,
}

impl ValidationOutcome {
  pub fn passed(&self) -> bool {
    !matches!(self, Self::Failed { .. })
  }
}

/// Run the validation command from the project root.
///
/// A failing command is an outcome, not an error; only an unexpandable
/// command line or a process that cannot start is.
pub async fn run_validation(
  validation: Option<&Validation>,
  root: &Path,
  placeholders: &Placeholders,
  timeout: Option<Duration>,
) -> Result<ValidationOutcome, ValidationError> {
  let Some(validation) = validation else {
    return Ok(ValidationOutcome::NotConfigured);
  };

  info!("running validation tests");
  let run = placeholders.expand(&validation.run)?;
  let spec = CommandSpec::shell(&run)
    .current_dir(root)
    .timeout(timeout)
    .stream_output(true);

  let output = process::output(&spec).await?;
  if output.success() {
    Ok(ValidationOutcome::Passed)
  } else {
    warn!(code = ?output.code, "validation failed");
    Ok(ValidationOutcome::Failed { code: output.code })
  }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
  #[error(transparent)]
  Placeholder(#[from] PlaceholderError),

  #[error(transparent)]
  Process(#[from] ProcessError),
}

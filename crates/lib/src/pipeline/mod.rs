//! The ordered release pipeline.
//!
//! Phases run strictly one after another. The driver stops at the first
//! fatal failure and then runs cleanup exactly once, whether the release
//! completed, failed, or stopped early. Only `validate` is non-fatal: its
//! failure is reported as a warning.

pub mod release;

use std::fmt;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::package::PackageError;
use crate::placeholder::PlaceholderError;
use crate::prepare::PrepareError;
use crate::runtime::RuntimeError;
use crate::stage::StageError;
use crate::toolchain::BuildError;
use crate::validate::ValidationError;
use crate::workspace::WorkspaceError;

pub use release::Release;

/// One step of a release, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
  BackupBin,
  PrepareSources,
  Build,
  CollectRuntime,
  PrepareOutput,
  Stage,
  Package,
  Validate,
}

impl Phase {
  pub const ORDER: [Phase; 8] = [
    Phase::BackupBin,
    Phase::PrepareSources,
    Phase::Build,
    Phase::CollectRuntime,
    Phase::PrepareOutput,
    Phase::Stage,
    Phase::Package,
    Phase::Validate,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::BackupBin => "backup-bin",
      Self::PrepareSources => "prepare-sources",
      Self::Build => "build",
      Self::CollectRuntime => "collect-runtime",
      Self::PrepareOutput => "prepare-output",
      Self::Stage => "stage",
      Self::Package => "package",
      Self::Validate => "validate",
    }
  }

  /// Whether a failure of this phase stops the release.
  pub fn is_fatal(&self) -> bool {
    !matches!(self, Self::Validate)
  }
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
pub enum PhaseError {
  #[error(transparent)]
  Workspace(#[from] WorkspaceError),

  #[error(transparent)]
  Prepare(#[from] PrepareError),

  #[error(transparent)]
  Build(#[from] BuildError),

  #[error(transparent)]
  Runtime(#[from] RuntimeError),

  #[error(transparent)]
  Stage(#[from] StageError),

  #[error(transparent)]
  Package(#[from] PackageError),

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error(transparent)]
  Placeholder(#[from] PlaceholderError),

  #[error("validation tests failed with exit code {code:?}")]
  ValidationFailed { code: Option<i32> },

  #[error("aborted by user: {0}")]
  Aborted(String),
}

/// Questions the pipeline may need to ask while running.
pub trait Interaction {
  /// Ask a yes/no question.
  fn confirm(&self, question: &str) -> bool;

  /// Show `message` and wait for acknowledgement.
  fn pause(&self, message: &str);
}

/// Answers every question with a fixed value and never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive {
  pub answer: bool,
}

impl Interaction for NonInteractive {
  fn confirm(&self, question: &str) -> bool {
    info!(question, answer = self.answer, "answering without prompting");
    self.answer
  }

  fn pause(&self, _message: &str) {}
}

/// The phases of one release and its cleanup.
#[allow(async_fn_in_trait)]
pub trait ReleaseStages {
  async fn run_phase(&mut self, phase: Phase) -> Result<(), PhaseError>;

  /// Undo what the release did to the working tree. Called exactly once.
  async fn cleanup(&mut self) -> Result<(), PhaseError>;

  fn pause_on_validation_failure(&self) -> bool {
    false
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseFailure {
  pub phase: Phase,
  pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ValidationStatus {
  #[default]
  NotRun,
  Passed,
  Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
  pub completed: Vec<Phase>,
  pub failure: Option<PhaseFailure>,
  pub validation: ValidationStatus,
  /// Error message when cleanup itself failed.
  pub cleanup_error: Option<String>,
}

impl PipelineReport {
  /// Every fatal phase succeeded and the working tree was restored.
  pub fn succeeded(&self) -> bool {
    self.failure.is_none() && self.cleanup_error.is_none()
  }
}

/// Run every phase in order, then clean up once.
pub async fn run_pipeline<S: ReleaseStages>(stages: &mut S, interaction: &dyn Interaction) -> PipelineReport {
  let mut report = PipelineReport::default();

  for phase in Phase::ORDER {
    info!(phase = %phase, "starting phase");

    match stages.run_phase(phase).await {
      Ok(()) => {
        if phase == Phase::Validate {
          report.validation = ValidationStatus::Passed;
        }
        report.completed.push(phase);
      }
      Err(e) if !phase.is_fatal() => {
        warn!(phase = %phase, error = %e, "phase failed, continuing");
        report.validation = ValidationStatus::Failed(e.to_string());
        report.completed.push(phase);
        if stages.pause_on_validation_failure() {
          interaction.pause("Validation failed. Press enter to continue...");
        }
      }
      Err(e) => {
        error!(phase = %phase, error = %e, "phase failed");
        report.failure = Some(PhaseFailure {
          phase,
          reason: e.to_string(),
        });
        break;
      }
    }
  }

  info!("cleaning up");
  if let Err(e) = stages.cleanup().await {
    error!(error = %e, "cleanup failed");
    report.cleanup_error = Some(e.to_string());
  }

  report
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;

  #[derive(Default)]
  struct Recorder {
    ran: Vec<Phase>,
    fail_at: Option<Phase>,
    cleanups: usize,
    pause: bool,
  }

  impl ReleaseStages for Recorder {
    async fn run_phase(&mut self, phase: Phase) -> Result<(), PhaseError> {
      self.ran.push(phase);
      if self.fail_at == Some(phase) {
        return match phase {
          Phase::Validate => Err(PhaseError::ValidationFailed { code: Some(1) }),
          _ => Err(PhaseError::Aborted(format!("{phase} failed"))),
        };
      }
      Ok(())
    }

    async fn cleanup(&mut self) -> Result<(), PhaseError> {
      self.cleanups += 1;
      Ok(())
    }

    fn pause_on_validation_failure(&self) -> bool {
      self.pause
    }
  }

  #[derive(Default)]
  struct CountingPause {
    pauses: Cell<usize>,
  }

  impl Interaction for CountingPause {
    fn confirm(&self, _question: &str) -> bool {
      true
    }

    fn pause(&self, _message: &str) {
      self.pauses.set(self.pauses.get() + 1);
    }
  }

  #[test]
  fn phase_names_follow_order() {
    let names: Vec<&str> = Phase::ORDER.iter().map(Phase::as_str).collect();
    assert_eq!(
      names,
      [
        "backup-bin",
        "prepare-sources",
        "build",
        "collect-runtime",
        "prepare-output",
        "stage",
        "package",
        "validate"
      ]
    );
    assert!(Phase::ORDER.iter().filter(|p| !p.is_fatal()).eq([&Phase::Validate]));
  }

  #[tokio::test]
  async fn all_phases_run_then_cleanup_once() {
    let mut stages = Recorder::default();
    let report = run_pipeline(&mut stages, &NonInteractive::default()).await;

    assert!(report.succeeded());
    assert_eq!(stages.ran, Phase::ORDER);
    assert_eq!(report.validation, ValidationStatus::Passed);
    assert_eq!(stages.cleanups, 1);
  }

  #[tokio::test]
  async fn build_failure_stops_before_packaging() {
    let mut stages = Recorder {
      fail_at: Some(Phase::Build),
      ..Default::default()
    };
    let report = run_pipeline(&mut stages, &NonInteractive::default()).await;

    assert!(!report.succeeded());
    assert_eq!(report.failure.as_ref().map(|f| f.phase), Some(Phase::Build));
    assert_eq!(report.completed, [Phase::BackupBin, Phase::PrepareSources]);
    assert!(!stages.ran.contains(&Phase::Package));
    assert_eq!(report.validation, ValidationStatus::NotRun);
    assert_eq!(stages.cleanups, 1);
  }

  #[tokio::test]
  async fn validation_failure_is_only_a_warning() {
    let mut stages = Recorder {
      fail_at: Some(Phase::Validate),
      pause: true,
      ..Default::default()
    };
    let interaction = CountingPause::default();
    let report = run_pipeline(&mut stages, &interaction).await;

    assert!(report.succeeded());
    assert!(matches!(report.validation, ValidationStatus::Failed(_)));
    assert_eq!(interaction.pauses.get(), 1);
    assert_eq!(stages.cleanups, 1);
  }

  #[tokio::test]
  async fn failing_first_phase_still_cleans_up() {
    let mut stages = Recorder {
      fail_at: Some(Phase::BackupBin),
      ..Default::default()
    };
    let report = run_pipeline(&mut stages, &NonInteractive::default()).await;

    assert!(report.completed.is_empty());
    assert_eq!(stages.cleanups, 1);
  }
}

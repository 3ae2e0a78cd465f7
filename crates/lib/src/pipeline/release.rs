//! The real release phases, driven by the manifest.

use std::time::Duration;

use tracing::{info, warn};

use super::{Interaction, Phase, PhaseError, ReleaseStages};
use crate::config::ReleaseConfig;
use crate::manifest::Manifest;
use crate::package::create_packages;
use crate::placeholder::Placeholders;
use crate::prepare::prepare_sources;
use crate::runtime::collect_runtime;
use crate::stage::stage_release;
use crate::toolchain::build_all;
use crate::util::fs::remove_dir_all_force;
use crate::validate::{ValidationOutcome, run_validation};
use crate::vcs::Exporter;
use crate::workspace::{BinBackup, WorkspaceError, clear_output_dir, create_output_dir};

/// A configured release of one working tree.
pub struct Release<'a> {
  manifest: &'a Manifest,
  config: &'a ReleaseConfig,
  placeholders: &'a Placeholders,
  interaction: &'a dyn Interaction,
  exporter: Exporter,
  timeout: Option<Duration>,
  bin_backup: Option<BinBackup>,
}

impl<'a> Release<'a> {
  pub fn new(
    manifest: &'a Manifest,
    config: &'a ReleaseConfig,
    placeholders: &'a Placeholders,
    interaction: &'a dyn Interaction,
  ) -> Self {
    Self {
      manifest,
      config,
      placeholders,
      interaction,
      exporter: Exporter::default(),
      timeout: manifest.build.timeout_secs.map(Duration::from_secs),
      bin_backup: None,
    }
  }

  pub fn with_exporter(mut self, exporter: Exporter) -> Self {
    self.exporter = exporter;
    self
  }

  fn prepare_output(&self) -> Result<(), PhaseError> {
    let output = &self.config.output_dir;
    match clear_output_dir(output) {
      Ok(()) => {}
      Err(WorkspaceError::OutputNotCleared(dir)) => {
        warn!(dir = %dir.display(), "unable to clear old output directory");
        if !self.interaction.confirm("Unable to clear old output folder. Continue?") {
          return Err(PhaseError::Aborted("old output directory not cleared".to_string()));
        }
      }
      Err(e) => return Err(e.into()),
    }
    create_output_dir(output)?;
    Ok(())
  }
}

impl ReleaseStages for Release<'_> {
  async fn run_phase(&mut self, phase: Phase) -> Result<(), PhaseError> {
    let (manifest, config, placeholders) = (self.manifest, self.config, self.placeholders);

    match phase {
      Phase::BackupBin => {
        self.bin_backup = Some(BinBackup::rotate(&config.bin_dir)?);
      }
      Phase::PrepareSources => {
        prepare_sources(&manifest.prepare, config, placeholders, self.timeout).await?;
      }
      Phase::Build => {
        let report = build_all(&manifest.build, config, placeholders).await?;
        info!(toolchains = ?report.built, "build finished");
      }
      Phase::CollectRuntime => {
        collect_runtime(&manifest.runtime, config, placeholders)?;
      }
      Phase::PrepareOutput => self.prepare_output()?,
      Phase::Stage => {
        stage_release(&manifest.stage, config, placeholders, &self.exporter, self.timeout).await?;
      }
      Phase::Package => {
        let report = create_packages(&manifest.installer, config, placeholders, self.timeout).await?;
        for package in &report.packages {
          info!(package = %package.display(), "package ready");
        }
      }
      Phase::Validate => {
        let outcome = run_validation(manifest.validation.as_ref(), &config.root, placeholders, self.timeout).await?;
        if let ValidationOutcome::Failed { code } = outcome {
          return Err(PhaseError::ValidationFailed { code });
        }
      }
    }

    Ok(())
  }

  async fn cleanup(&mut self) -> Result<(), PhaseError> {
    let staging = remove_dir_all_force(&self.config.staging_dir);
    if let Err(e) = &staging {
      warn!(staging = %self.config.staging_dir.display(), error = %e, "failed to remove staging directory");
    }

    // bin is restored even when the staging tree is stuck.
    let restored = match self.bin_backup.take() {
      Some(backup) => backup.restore(),
      None => Ok(()),
    };

    staging.map_err(WorkspaceError::from)?;
    restored?;
    Ok(())
  }

  fn pause_on_validation_failure(&self) -> bool {
    self
      .manifest
      .validation
      .as_ref()
      .is_some_and(|v| v.pause_on_failure)
  }
}

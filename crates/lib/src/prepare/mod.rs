//! Source preparation before the build.
//!
//! Runs the project's generator commands, regenerates the splash image with
//! the release version, and applies the manifest's text edits (version
//! defines, feature flags).

pub mod edit;

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::ReleaseConfig;
use crate::manifest::{HelperCommand, Prepare, Splash};
use crate::placeholder::{PlaceholderError, Placeholders, Resolver};
use crate::process::{self, CommandSpec, ProcessError};
use crate::util::fs::{FsError, remove_file_if_exists};

pub use edit::{EditError, apply_edit, apply_edits, replace_matching_lines, replace_pattern};

#[derive(Debug, Error)]
pub enum PrepareError {
  #[error(transparent)]
  Edit(#[from] EditError),

  #[error(transparent)]
  Placeholder(#[from] PlaceholderError),

  #[error(transparent)]
  Process(#[from] ProcessError),

  #[error(transparent)]
  Fs(#[from] FsError),

  #[error("splash template does not exist: {}", .0.display())]
  MissingTemplate(PathBuf),

  #[error("failed to write {}: {source}", path.display())]
  Write {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Run every preparation step in order: commands, splash image, edits.
pub async fn prepare_sources(
  prepare: &Prepare,
  config: &ReleaseConfig,
  placeholders: &Placeholders,
  timeout: Option<Duration>,
) -> Result<(), PrepareError> {
  for command in &prepare.commands {
    run_helper(&config.root, command, placeholders, timeout).await?;
  }

  if let Some(splash) = &prepare.splash {
    render_splash(splash, config, placeholders, timeout).await?;
  }

  let edited = apply_edits(&config.root, &prepare.edits, config.dev_build, placeholders)?;
  info!(matches = edited, "applied source edits");
  Ok(())
}

async fn run_helper(
  root: &Path,
  command: &HelperCommand,
  placeholders: &Placeholders,
  timeout: Option<Duration>,
) -> Result<(), PrepareError> {
  let run = placeholders.expand(&command.run)?;
  let dir = match &command.dir {
    Some(dir) => root.join(placeholders.expand(dir)?),
    None => root.to_path_buf(),
  };

  let spec = CommandSpec::shell(&run).current_dir(dir).timeout(timeout);
  process::run(&spec).await?;
  Ok(())
}

/// Fill the splash template with the version and render it to PNG.
///
/// The template itself is never modified; a temporary copy next to it is
/// edited, rendered and deleted again.
pub async fn render_splash(
  splash: &Splash,
  config: &ReleaseConfig,
  placeholders: &Placeholders,
  timeout: Option<Duration>,
) -> Result<(), PrepareError> {
  let template = config.root.join(&splash.template);
  let content = std::fs::read_to_string(&template).map_err(|_| PrepareError::MissingTemplate(template.clone()))?;

  let stem = template
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_else(|| "splash".to_string());
  let temp_svg = template.with_file_name(format!("{stem}_relbuild_tmp.svg"));

  let filled = fill_splash(&content, splash, config);
  std::fs::write(&temp_svg, filled).map_err(|e| PrepareError::Write {
    path: temp_svg.clone(),
    source: e,
  })?;

  let result = run_inkscape(splash, config, placeholders, &temp_svg, timeout).await;

  if let Err(e) = remove_file_if_exists(&temp_svg) {
    warn!(path = %temp_svg.display(), error = %e, "failed to remove temporary splash");
  }

  result
}

fn fill_splash(content: &str, splash: &Splash, config: &ReleaseConfig) -> String {
  let mut filled = content.to_string();
  if !config.dev_build
    && let Some(marker) = &splash.dev_marker
  {
    filled = filled.replace(marker.as_str(), "");
  }
  filled
    .replace(splash.version_token.as_str(), &config.base_version)
    .replace(splash.revision_token.as_str(), &config.revision)
}

async fn run_inkscape(
  splash: &Splash,
  config: &ReleaseConfig,
  placeholders: &Placeholders,
  svg: &Path,
  timeout: Option<Duration>,
) -> Result<(), PrepareError> {
  let tool_dir = PathBuf::from(placeholders.resolve_tool(&splash.tool)?);
  let output = config.root.join(&splash.output);

  info!(output = %output.display(), "rendering splash image");
  let spec = CommandSpec::tool(&tool_dir, &splash.executable)?
    .arg(svg.as_os_str())
    .arg(format!("--export-background={}", splash.background))
    .arg("--export-png")
    .arg(output.as_os_str())
    .current_dir(&config.root)
    .timeout(timeout);

  process::run(&spec).await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ReleaseAnswers;
  use crate::manifest::{Manifest, TextEdit};
  use tempfile::TempDir;

  fn config(root: &Path, version: &str) -> ReleaseConfig {
    let manifest = Manifest::parse(
      "[product]\nname = \"Demo\"\nbase_version = \"1.0.0\"\n",
      Path::new("release.toml"),
    )
    .unwrap();
    let answers = ReleaseAnswers {
      version: version.to_string(),
      revision: "42".to_string(),
      ..Default::default()
    };
    ReleaseConfig::new(root, &manifest, &answers).unwrap()
  }

  fn splash() -> Splash {
    Splash {
      template: "splash.svg".to_string(),
      output: "splash.png".to_string(),
      background: "#ffffff".to_string(),
      dev_marker: Some("Development version".to_string()),
      version_token: "X.X.X".to_string(),
      revision_token: "R.R.R".to_string(),
      tool: "inkscape".to_string(),
      executable: "inkscape.exe".to_string(),
    }
  }

  #[test]
  fn release_splash_drops_dev_marker() {
    let temp = TempDir::new().unwrap();
    let filled = fill_splash("<t>X.X.X rR.R.R Development version</t>", &splash(), &config(temp.path(), "2.0.0"));
    assert_eq!(filled, "<t>2.0.0 r42 </t>");
  }

  #[test]
  fn dev_splash_keeps_dev_marker() {
    let temp = TempDir::new().unwrap();
    let filled = fill_splash("<t>X.X.X Development version</t>", &splash(), &config(temp.path(), ""));
    assert_eq!(filled, "<t>1.0.0 Development version</t>");
  }

  #[tokio::test]
  async fn splash_without_located_tool_fails_and_cleans_up() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("splash.svg"), "<svg>X.X.X</svg>").unwrap();

    let result = render_splash(&splash(), &config(temp.path(), "2.0.0"), &Placeholders::new(), None).await;

    assert!(matches!(result, Err(PrepareError::Placeholder(_))));
    assert!(!temp.path().join("splash_relbuild_tmp.svg").exists());
    assert_eq!(
      std::fs::read_to_string(temp.path().join("splash.svg")).unwrap(),
      "<svg>X.X.X</svg>"
    );
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn commands_run_in_their_directory_then_edits_apply() {
    let temp = TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("lib")).unwrap();
    std::fs::write(temp.path().join("version.h"), "#define V \"0\"\n").unwrap();

    let prepare = Prepare {
      commands: vec![HelperCommand {
        run: "touch generated.cc".to_string(),
        dir: Some("lib".to_string()),
      }],
      splash: None,
      edits: vec![TextEdit {
        file: "version.h".to_string(),
        pattern: "#define V.*".to_string(),
        replace: "#define V \"{version}\"".to_string(),
        ..Default::default()
      }],
    };
    let config = config(temp.path(), "3.1.0");
    let mut placeholders = Placeholders::new();
    placeholders.set("version", config.base_version.clone());

    prepare_sources(&prepare, &config, &placeholders, None).await.unwrap();

    assert!(temp.path().join("lib").join("generated.cc").exists());
    assert_eq!(
      std::fs::read_to_string(temp.path().join("version.h")).unwrap(),
      "#define V \"3.1.0\"\n"
    );
  }

  #[tokio::test]
  #[cfg(unix)]
  async fn failing_command_stops_preparation() {
    let temp = TempDir::new().unwrap();
    let prepare = Prepare {
      commands: vec![HelperCommand {
        run: "exit 1".to_string(),
        dir: None,
      }],
      ..Default::default()
    };

    let result = prepare_sources(&prepare, &config(temp.path(), ""), &Placeholders::new(), None).await;
    assert!(matches!(result, Err(PrepareError::Process(ProcessError::Failed { .. }))));
  }
}

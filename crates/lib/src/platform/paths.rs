use std::path::{Path, PathBuf};

use crate::consts::{APP_NAME, MANIFEST_FILENAME, STAGING_ROOT_ENV};

/// Returns the directory staging trees are assembled under.
///
/// `RELBUILD_STAGING_ROOT` wins over the manifest value, which wins over the
/// platform default.
pub fn staging_root(manifest_value: Option<&str>) -> PathBuf {
  if let Ok(root) = std::env::var(STAGING_ROOT_ENV)
    && !root.is_empty()
  {
    return PathBuf::from(root);
  }

  match manifest_value {
    Some(value) if !value.is_empty() => PathBuf::from(value),
    _ => default_staging_root(),
  }
}

#[cfg(windows)]
pub fn default_staging_root() -> PathBuf {
  let drive = std::env::var("SYSTEMDRIVE").unwrap_or_else(|_| "C:".to_string());
  PathBuf::from(format!("{drive}\\")).join("temp_release")
}

#[cfg(not(windows))]
pub fn default_staging_root() -> PathBuf {
  std::env::temp_dir().join(APP_NAME)
}

/// Returns the manifest location for a project root
pub fn manifest_path(root: &Path) -> PathBuf {
  root.join(MANIFEST_FILENAME)
}

/// Name of the directory a tool may be pointed at through the environment
pub fn tool_env_var(tool: &str) -> String {
  let normalized: String = tool
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
    .collect();
  format!("{}_TOOL_{}", APP_NAME.to_ascii_uppercase(), normalized)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn env_takes_precedence_over_manifest() {
    temp_env::with_var(STAGING_ROOT_ENV, Some("/custom/staging"), || {
      assert_eq!(staging_root(Some("/from/manifest")), PathBuf::from("/custom/staging"));
    });
  }

  #[test]
  #[serial]
  fn manifest_value_used_without_env() {
    temp_env::with_var(STAGING_ROOT_ENV, None::<&str>, || {
      assert_eq!(staging_root(Some("/from/manifest")), PathBuf::from("/from/manifest"));
      assert_eq!(staging_root(None), default_staging_root());
    });
  }

  #[test]
  fn tool_env_var_is_uppercased() {
    assert_eq!(tool_env_var("inno"), "RELBUILD_TOOL_INNO");
    assert_eq!(tool_env_var("msvc-2008"), "RELBUILD_TOOL_MSVC_2008");
  }
}

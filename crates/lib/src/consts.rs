//! Names shared across the crate.

pub const APP_NAME: &str = "relbuild";

/// Project manifest expected at the root of the working tree
pub const MANIFEST_FILENAME: &str = "release.toml";

/// Lock file guarding a working tree against concurrent releases
pub const LOCK_FILENAME: &str = ".relbuild.lock";

/// Overrides the directory staging trees are created in
pub const STAGING_ROOT_ENV: &str = "RELBUILD_STAGING_ROOT";

/// Marker directory or file identifying a repository root
pub const REPO_MARKER: &str = ".git";

/// Default marker file written into every staged directory
pub const DO_NOT_SAVE_MARKER: &str = "---DO_NOT_SAVE_FILES_IN_THIS_DIRECTORY---";

/// Prefix of the directory the working `bin` is moved to during a release
pub const BIN_BACKUP_PREFIX: &str = "bin_build_backup";

/// Where the `bin` produced by the previous release is kept
pub const BIN_LAST_BUILD: &str = "bin_last_build";

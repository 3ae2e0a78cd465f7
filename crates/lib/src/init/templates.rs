//! Template content for `relbuild init`.

/// Manifest for the reference project, with its tool locations, build
/// variants, runtime lists and staging layout.
pub const RELEASE_TOML_TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../templates/release.toml"));

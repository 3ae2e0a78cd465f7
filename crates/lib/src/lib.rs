//! relbuild-lib: release builder for Windows desktop applications
//!
//! A release is one project's checklist expressed as a manifest
//! (`release.toml`) and executed as an ordered pipeline:
//! - `tools`: locate external tools and toolchain directories
//! - `prepare`: generator commands, version stamping, splash image
//! - `toolchain`: MSVC, MinGW and command builds, verified by artifacts
//! - `runtime`, `stage`, `package`: assemble the release tree and package it
//! - `vcs`: clean exports of tracked content, nested repositories included
//! - `pipeline`: phase ordering with guaranteed cleanup

pub mod config;
pub mod consts;
pub mod init;
pub mod lock;
pub mod manifest;
pub mod package;
pub mod pipeline;
pub mod placeholder;
pub mod platform;
pub mod prepare;
pub mod process;
pub mod runtime;
pub mod stage;
pub mod toolchain;
pub mod tools;
pub mod util;
pub mod validate;
pub mod vcs;
pub mod workspace;

//! Shared utilities.
//!
//! Filesystem helpers used by the release phases, and test helpers.

pub mod fs;

#[cfg(test)]
pub mod testutil;

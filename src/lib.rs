//! kazel - BUILD file generation for Go trees
//!
//! This crate scans a Go source tree, derives Bazel rules for every package
//! and merges them into the tree's BUILD files without disturbing
//! hand-written rules.

pub mod build_file;
pub mod core;
pub mod generator;
pub mod importer;
pub mod ops;
pub mod util;

/// Test utilities for kazel unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides a builder for throwaway Go source trees.
#[cfg(test)]
pub mod test_support;

pub use core::{Label, Package, Rule};
pub use ops::{update, UpdateOptions, UpdateReport};
pub use util::Config;

//! Core data structures for kazel.
//!
//! - Classified Go packages
//! - Bazel labels and import path resolution
//! - Generated rules

pub mod label;
pub mod package;
pub mod rule;

pub use label::{Label, LabelResolver, DEFAULT_LIBRARY, VENDOR_SCOPE};
pub use package::Package;
pub use rule::{FileGroup, FileGroupSrcs, GoAttrs, Rule, RuleKind};

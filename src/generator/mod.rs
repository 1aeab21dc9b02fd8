//! Rule generation.
//!
//! - [`deps`]: import lists to dependency labels
//! - [`emit`]: rules for one classified package
//! - [`sources`]: `package-srcs` / `all-srcs` filegroups

pub mod deps;
pub mod emit;
pub mod sources;

pub use deps::{extract_deps, label_strings};
pub use emit::{emit, DefaultNamer, Namer, PackageDeps, PackageSources, RuleType, VendorNamer};
pub use sources::{aggregate_sources, Additions, Aggregation, ALL_SRCS_TARGET, PKG_SRCS_TARGET};

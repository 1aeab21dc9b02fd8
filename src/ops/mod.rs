//! High-level operations.
//!
//! This module contains the implementation of the kazel run: walking the
//! tree, generating rules and reconciling BUILD files.

pub mod kazel_update;
pub mod reconcile;
pub mod walk;

pub use kazel_update::{update, UpdateOptions, UpdateReport};
pub use reconcile::{reconcile_rules, Reconciled};
pub use walk::{Failure, SkipList, TreeWalker, WalkedPackage};

//! Shared utilities

pub mod config;
pub mod diff;
pub mod fs;
pub mod process;

pub use config::{Config, CONFIG_FILE};

//! CLI definitions using clap.

use std::path::PathBuf;

use clap::Parser;

use kazel::util::CONFIG_FILE;

/// kazel - generate and reconcile Bazel BUILD files for a Go tree
#[derive(Parser)]
#[command(name = "kazel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Workspace root
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Configuration file, relative to the root
    #[arg(long, default_value = CONFIG_FILE)]
    pub cfg_path: PathBuf,

    /// Report BUILD files that would change without writing them
    #[arg(long)]
    pub dry_run: bool,

    /// Print a unified diff of every changed BUILD file
    #[arg(long)]
    pub print_diff: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Only update the BUILD file of this root-relative directory
    pub package: Option<String>,
}

impl Cli {
    /// The configuration path; relative paths are taken from the root.
    pub fn config_path(&self) -> PathBuf {
        if self.cfg_path.is_absolute() {
            self.cfg_path.clone()
        } else {
            self.root.join(&self.cfg_path)
        }
    }
}

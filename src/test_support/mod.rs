//! Test utilities for kazel unit tests.
//!
//! [`GoTree`] lays out a throwaway Go workspace on disk:
//!
//! ```rust,ignore
//! let tree = GoTree::new()
//!     .with_go("pkg/x.go", "x", &["example.com/repo/util", "fmt"])
//!     .with_go("util/u.go", "util", &[]);
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Import prefix used by fixtures.
pub const PREFIX: &str = "example.com/repo";

/// A Go source tree in a temporary directory.
pub struct GoTree {
    dir: TempDir,
}

impl GoTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        GoTree {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Root directory of the tree.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a root-relative path.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Add a file with the given contents.
    pub fn with_file(self, rel: &str, contents: &str) -> Self {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create fixture dir");
        }
        fs::write(&path, contents).expect("failed to write fixture file");
        self
    }

    /// Add a Go file declaring `package` and importing `imports`.
    pub fn with_go(self, rel: &str, package: &str, imports: &[&str]) -> Self {
        let contents = go_source(package, imports);
        self.with_file(rel, &contents)
    }

    /// Add an empty directory.
    pub fn with_dir(self, rel: &str) -> Self {
        fs::create_dir_all(self.path(rel)).expect("failed to create fixture dir");
        self
    }

    /// Read a root-relative file.
    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap_or_else(|e| panic!("failed to read {}: {}", rel, e))
    }

    /// Whether a root-relative path exists.
    pub fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }
}

impl Default for GoTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Go source text with a package clause and a grouped import block.
pub fn go_source(package: &str, imports: &[&str]) -> String {
    let mut src = format!("package {}\n", package);
    if !imports.is_empty() {
        src.push_str("\nimport (\n");
        for import in imports {
            src.push_str(&format!("\t\"{}\"\n", import));
        }
        src.push_str(")\n");
    }
    src.push_str("\nfunc init() {}\n");
    src
}

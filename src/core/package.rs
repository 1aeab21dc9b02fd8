//! Classified Go packages.

use std::path::{Path, PathBuf};

/// A Go package discovered in a single directory.
///
/// Filename lists hold bare file names (no directory component) in
/// directory order. Import lists are sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    /// Import path of the package
    pub import_path: String,

    /// Directory containing the package
    pub dir: PathBuf,

    /// Go package name from the package clause
    pub name: String,

    /// Provided by the Go distribution rather than the workspace
    pub standard: bool,

    /// Go sources without cgo
    pub go_files: Vec<String>,

    /// Go sources that `import "C"`
    pub cgo_files: Vec<String>,

    /// Assembly sources
    pub s_files: Vec<String>,

    /// C sources
    pub c_files: Vec<String>,

    /// C++ sources
    pub cxx_files: Vec<String>,

    /// C and C++ headers
    pub h_files: Vec<String>,

    /// In-package test sources
    pub test_go_files: Vec<String>,

    /// Test sources of the `<name>_test` package
    pub x_test_go_files: Vec<String>,

    /// Go sources excluded by build constraints
    pub ignored_go_files: Vec<String>,

    /// Imports of library sources
    pub imports: Vec<String>,

    /// Imports of in-package tests
    pub test_imports: Vec<String>,

    /// Imports of external tests
    pub x_test_imports: Vec<String>,
}

impl Package {
    /// A standard library package. These are never scanned.
    pub fn standard(import_path: impl Into<String>) -> Self {
        Package {
            import_path: import_path.into(),
            standard: true,
            ..Default::default()
        }
    }

    /// Whether the package builds an executable.
    pub fn is_command(&self) -> bool {
        self.name == "main"
    }

    /// Directory name, used to name binaries.
    pub fn dir_name(&self) -> &str {
        dir_base(&self.dir)
    }

    /// Sources compiled directly by the Go rules: Go files then assembly.
    pub fn library_sources(&self) -> Vec<String> {
        self.go_files
            .iter()
            .chain(&self.s_files)
            .cloned()
            .collect()
    }

    /// Sources that go through cgo code generation.
    pub fn interop_sources(&self) -> Vec<String> {
        self.cgo_files
            .iter()
            .chain(&self.c_files)
            .chain(&self.cxx_files)
            .chain(&self.h_files)
            .cloned()
            .collect()
    }

    /// Whether any Go file of any role survived classification.
    pub fn has_go_files(&self) -> bool {
        !(self.go_files.is_empty()
            && self.cgo_files.is_empty()
            && self.test_go_files.is_empty()
            && self.x_test_go_files.is_empty())
    }
}

fn dir_base(dir: &Path) -> &str {
    dir.file_name().and_then(|n| n.to_str()).unwrap_or(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_groups() {
        let pkg = Package {
            name: "util".to_string(),
            dir: PathBuf::from("/repo/pkg/util"),
            go_files: vec!["a.go".to_string()],
            s_files: vec!["a_amd64.s".to_string()],
            cgo_files: vec!["c.go".to_string()],
            c_files: vec!["c.c".to_string()],
            h_files: vec!["c.h".to_string()],
            ..Default::default()
        };

        assert_eq!(pkg.library_sources(), vec!["a.go", "a_amd64.s"]);
        assert_eq!(pkg.interop_sources(), vec!["c.go", "c.c", "c.h"]);
        assert_eq!(pkg.dir_name(), "util");
        assert!(!pkg.is_command());
        assert!(pkg.has_go_files());
    }

    #[test]
    fn test_standard_package() {
        let pkg = Package::standard("fmt");
        assert!(pkg.standard);
        assert!(!pkg.has_go_files());
    }
}

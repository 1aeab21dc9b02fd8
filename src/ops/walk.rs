//! Directory walking with skip rules.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use regex::Regex;
use walkdir::WalkDir;

use crate::core::Package;
use crate::importer::Importer;
use crate::util::fs::{slash_path, slash_relative};

/// Directories never visited, matched against root-relative paths.
const BUILTIN_SKIPS: &[&str] = &[r"^\.(git|hg|svn)(/|$)", r"^bazel-"];

/// Root-relative path of the vendor root.
pub const VENDOR_ROOT: &str = "vendor";

/// Regexes of directories to skip together with their subtrees.
#[derive(Debug, Clone)]
pub struct SkipList {
    patterns: Vec<Regex>,
}

impl SkipList {
    /// The built-in deny-list plus `configured` patterns.
    pub fn new(configured: &[String]) -> Result<Self> {
        let patterns = BUILTIN_SKIPS
            .iter()
            .copied()
            .chain(configured.iter().map(String::as_str))
            .map(|p| Regex::new(p).with_context(|| format!("invalid skip pattern `{}`", p)))
            .collect::<Result<Vec<_>>>()?;
        Ok(SkipList { patterns })
    }

    /// Whether a root-relative, forward-slash path is skipped.
    ///
    /// The root itself is matched as `.`.
    pub fn is_skipped(&self, rel: &str) -> bool {
        let rel = if rel.is_empty() { "." } else { rel };
        self.patterns.iter().any(|p| p.is_match(rel))
    }
}

/// Whether a root-relative path lies in a vendor tree.
pub fn is_vendored(rel: &str) -> bool {
    rel.split('/').any(|part| part == VENDOR_ROOT)
}

/// A package found by the walker.
#[derive(Debug, Clone)]
pub struct WalkedPackage {
    /// Directory relative to the workspace root (`""` for the root)
    pub rel_dir: String,
    pub package: Arc<Package>,
}

/// A directory that could not be processed.
#[derive(Debug)]
pub struct Failure {
    pub dir: PathBuf,
    pub error: anyhow::Error,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:#}", self.dir.display(), self.error)
    }
}

/// Depth-first walk over package directories, sorted by name.
pub struct TreeWalker<'a> {
    root: &'a Path,
    skip: &'a SkipList,
}

impl<'a> TreeWalker<'a> {
    pub fn new(root: &'a Path, skip: &'a SkipList) -> Self {
        TreeWalker { root, skip }
    }

    /// Visit every package under the root-relative directory `base`.
    ///
    /// Walks that do not start in the vendor root skip vendor trees.
    /// Directories without buildable sources are descended into but not
    /// visited. Failures are collected and the walk continues.
    pub fn walk<F>(&self, importer: &mut Importer, base: &str, mut visit: F) -> Vec<Failure>
    where
        F: FnMut(&mut Importer, &WalkedPackage) -> Result<()>,
    {
        let base = slash_path(Path::new(base));
        let start = if base.is_empty() {
            self.root.to_path_buf()
        } else {
            self.root.join(&base)
        };
        let skip_vendor = !is_vendored(&base);
        let mut failures = Vec::new();

        let walker = WalkDir::new(&start)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() {
                    return false;
                }
                let rel = slash_relative(self.root, entry.path());
                !(self.skip.is_skipped(&rel) || (skip_vendor && is_vendored(&rel)))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let dir = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| start.clone());
                    failures.push(Failure {
                        dir,
                        error: anyhow::Error::new(e).context("failed to walk directory"),
                    });
                    continue;
                }
            };

            let dir = entry.path();
            let package = match importer.import_dir(dir) {
                Ok(package) => package,
                Err(e) if e.is_no_buildable_sources() => {
                    tracing::debug!("{}", e);
                    continue;
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    failures.push(Failure {
                        dir: dir.to_path_buf(),
                        error: e.into(),
                    });
                    continue;
                }
            };

            let walked = WalkedPackage {
                rel_dir: slash_relative(self.root, dir),
                package,
            };
            if let Err(error) = visit(importer, &walked) {
                tracing::error!("{}: {:#}", dir.display(), error);
                failures.push(Failure {
                    dir: dir.to_path_buf(),
                    error,
                });
            }
        }

        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::BuildContext;
    use crate::test_support::{GoTree, PREFIX};

    fn walk(tree: &GoTree, skip: &SkipList, base: &str) -> (Vec<String>, Vec<Failure>) {
        let mut importer = Importer::new(tree.root(), PREFIX, BuildContext::default());
        let mut seen = Vec::new();
        let failures = TreeWalker::new(tree.root(), skip).walk(&mut importer, base, |_, pkg| {
            seen.push(pkg.rel_dir.clone());
            Ok(())
        });
        (seen, failures)
    }

    #[test]
    fn test_skip_list() {
        let skip = SkipList::new(&["^_".to_string(), "/testdata$".to_string()]).unwrap();
        assert!(skip.is_skipped(".git"));
        assert!(skip.is_skipped(".git/objects"));
        assert!(skip.is_skipped("bazel-out"));
        assert!(skip.is_skipped("_output"));
        assert!(skip.is_skipped("pkg/testdata"));
        assert!(!skip.is_skipped(".github"));
        assert!(!skip.is_skipped("pkg"));
        assert!(!skip.is_skipped(""));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(SkipList::new(&["(".to_string()]).is_err());
    }

    #[test]
    fn test_walk_order_and_skips() {
        let tree = GoTree::new()
            .with_go("b/b.go", "b", &[])
            .with_go("a/a.go", "a", &[])
            .with_go("a/inner/i.go", "inner", &[])
            .with_file("docs/README.md", "docs\n")
            .with_go("docs/examples/e.go", "examples", &[])
            .with_go("vendor/github.com/x/y/y.go", "y", &[])
            .with_go("bazel-out/gen.go", "gen", &[])
            .with_go("_output/o.go", "o", &[]);
        let skip = SkipList::new(&["^_output".to_string()]).unwrap();

        let (seen, failures) = walk(&tree, &skip, ".");
        assert!(failures.is_empty());
        assert_eq!(seen, vec!["a", "a/inner", "b", "docs/examples"]);

        let (seen, _) = walk(&tree, &skip, VENDOR_ROOT);
        assert_eq!(seen, vec!["vendor/github.com/x/y"]);
    }

    #[test]
    fn test_failures_do_not_stop_the_walk() {
        let tree = GoTree::new()
            .with_go("a/a.go", "a", &[])
            .with_go("a/b.go", "b", &[])
            .with_go("c/c.go", "c", &[]);
        let skip = SkipList::new(&[]).unwrap();

        let (seen, failures) = walk(&tree, &skip, ".");
        assert_eq!(seen, vec!["c"]);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].to_string().contains("found packages a"));
    }

    #[test]
    fn test_visitor_errors_are_collected() {
        let tree = GoTree::new().with_go("a/a.go", "a", &[]).with_go("b/b.go", "b", &[]);
        let skip = SkipList::new(&[]).unwrap();
        let mut importer = Importer::new(tree.root(), PREFIX, BuildContext::default());
        let mut visited = 0;

        let failures = TreeWalker::new(tree.root(), &skip).walk(&mut importer, ".", |_, pkg| {
            visited += 1;
            if pkg.rel_dir == "a" {
                anyhow::bail!("boom");
            }
            Ok(())
        });
        assert_eq!(visited, 2);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].to_string().ends_with("boom"));
    }
}

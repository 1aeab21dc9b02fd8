//! Implementation of `kazel`: generate rules for the tree and reconcile
//! them into BUILD files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::{LabelResolver, Rule};
use crate::generator::{
    aggregate_sources, emit, extract_deps, label_strings, DefaultNamer, Namer, PackageDeps,
    PackageSources, VendorNamer,
};
use crate::importer::{BuildContext, Importer};
use crate::ops::reconcile::{reconcile_rules, Reconciled};
use crate::ops::walk::{is_vendored, Failure, SkipList, TreeWalker, WalkedPackage, VENDOR_ROOT};
use crate::util::fs::{slash_path, slash_relative};
use crate::util::Config;

/// Options for an update run.
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Workspace root
    pub root: PathBuf,

    pub config: Config,

    /// Report changes without writing
    pub dry_run: bool,

    /// Only reconcile this root-relative directory
    pub package: Option<String>,
}

/// Result of an update run.
#[derive(Debug, Default)]
pub struct UpdateReport {
    /// Every BUILD file that was reconciled, in path order
    pub reconciled: Vec<Reconciled>,

    /// Directories that could not be processed
    pub failures: Vec<Failure>,
}

impl UpdateReport {
    /// BUILD files whose contents changed (or would change).
    pub fn changed(&self) -> impl Iterator<Item = &Reconciled> {
        self.reconciled.iter().filter(|r| r.changed)
    }

    pub fn has_changes(&self) -> bool {
        self.changed().next().is_some()
    }
}

/// Generate rules for the whole tree and merge them into BUILD files.
///
/// Per-directory failures are collected in the report; only setup errors,
/// such as invalid skip patterns, abort the run.
pub fn update(opts: &UpdateOptions) -> Result<UpdateReport> {
    let root = opts.root.as_path();
    let config = &opts.config;

    let target = match &opts.package {
        Some(package) => Some(package_key(root, config, package)?),
        None => None,
    };

    let skip = SkipList::new(&config.skipped_paths)?;
    let resolver = LabelResolver::new(config.go_prefix.as_str())
        .with_vendor_multiple_build_files(config.vendor_multiple_build_files);
    let mut importer = Importer::new(root, &config.go_prefix, BuildContext::from_config(config));
    let walker = TreeWalker::new(root, &skip);

    let mut new_rules: BTreeMap<String, Vec<Rule>> = BTreeMap::new();
    let mut failures = Vec::new();

    if root.join(VENDOR_ROOT).is_dir() && !skip.is_skipped(VENDOR_ROOT) {
        tracing::debug!("walking {}", VENDOR_ROOT);
        let vendor_failures = if config.vendor_multiple_build_files {
            walker.walk(&mut importer, VENDOR_ROOT, |importer, walked| {
                add_rules(&mut new_rules, walked, package_rules(importer, &resolver, walked));
                Ok(())
            })
        } else {
            walker.walk(&mut importer, VENDOR_ROOT, |importer, walked| {
                let rules = vendored_rules(importer, &resolver, walked);
                new_rules
                    .entry(VENDOR_ROOT.to_string())
                    .or_default()
                    .extend(rules);
                Ok(())
            })
        };
        failures.extend(vendor_failures);
    }

    for src_dir in &config.src_dirs {
        tracing::debug!("walking {}", src_dir);
        failures.extend(walker.walk(&mut importer, src_dir, |importer, walked| {
            add_rules(&mut new_rules, walked, package_rules(importer, &resolver, walked));
            Ok(())
        }));
    }

    let src_roots: Vec<String> = config
        .src_dirs
        .iter()
        .map(|dir| slash_path(Path::new(dir)))
        .collect();
    let format_scope = |rel: &str| {
        if is_vendored(rel) {
            return rel == VENDOR_ROOT || config.vendor_multiple_build_files;
        }
        src_roots.iter().any(|src| contains_path(src, rel))
    };
    let has_rules = |rel: &str| new_rules.contains_key(rel);
    let aggregation =
        aggregate_sources(root, &skip, config.add_sources_rules, &has_rules, &format_scope);
    for (rel, rules) in aggregation.additions {
        new_rules.entry(rel).or_default().extend(rules);
    }
    failures.extend(aggregation.failures);

    // A directory that failed keeps its BUILD file as it is.
    let mut untouched = aggregation.incomplete;
    untouched.extend(
        failures
            .iter()
            .map(|f| owner_key(config, &slash_relative(root, &f.dir))),
    );
    new_rules.retain(|rel, _| !untouched.contains(rel));

    if let Some(key) = &target {
        new_rules.retain(|rel, _| rel == key);
        failures.retain(|f| owner_key(config, &slash_relative(root, &f.dir)) == *key);
    }

    let mut reconciled = Vec::with_capacity(new_rules.len());
    for (rel, rules) in &new_rules {
        let dir = rel_dir(root, rel);
        match reconcile_rules(&dir, rules, opts.dry_run) {
            Ok(result) => reconciled.push(result),
            Err(error) => {
                tracing::error!("{}: {:#}", dir.display(), error);
                failures.push(Failure { dir, error });
            }
        }
    }

    Ok(UpdateReport {
        reconciled,
        failures,
    })
}

/// Key of the BUILD file that owns a package directory given on the
/// command line.
fn package_key(root: &Path, config: &Config, package: &str) -> Result<String> {
    let rel = slash_path(Path::new(package));
    let dir = rel_dir(root, &rel);
    if !dir.is_dir() {
        bail!("package directory {} does not exist", dir.display());
    }
    Ok(owner_key(config, &rel))
}

/// Key of the BUILD file holding the rules of a root-relative directory.
fn owner_key(config: &Config, rel: &str) -> String {
    if is_vendored(rel) && !config.vendor_multiple_build_files {
        VENDOR_ROOT.to_string()
    } else {
        rel.to_string()
    }
}

fn rel_dir(root: &Path, rel: &str) -> PathBuf {
    if rel.is_empty() {
        root.to_path_buf()
    } else {
        root.join(rel)
    }
}

/// Whether the root-relative `path` lies in the root-relative `dir`.
fn contains_path(dir: &str, path: &str) -> bool {
    dir.is_empty()
        || path == dir
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn add_rules(new_rules: &mut BTreeMap<String, Vec<Rule>>, walked: &WalkedPackage, rules: Vec<Rule>) {
    if !rules.is_empty() {
        new_rules.insert(walked.rel_dir.clone(), rules);
    }
}

/// Rules for a package with its own BUILD file.
fn package_rules(
    importer: &mut Importer,
    resolver: &LabelResolver,
    walked: &WalkedPackage,
) -> Vec<Rule> {
    let pkg = &walked.package;
    let sources = PackageSources::from_package(pkg);
    generate(importer, resolver, walked, sources, &DefaultNamer::for_package(pkg))
}

/// Rules for a vendored package kept in `vendor/BUILD`.
///
/// Rules are named after the import path and source files are given
/// relative to the vendor root.
fn vendored_rules(
    importer: &mut Importer,
    resolver: &LabelResolver,
    walked: &WalkedPackage,
) -> Vec<Rule> {
    let pkg = &walked.package;
    let sub = walked
        .rel_dir
        .strip_prefix(VENDOR_ROOT)
        .unwrap_or(&walked.rel_dir)
        .trim_start_matches('/')
        .to_string();
    let sources = PackageSources::from_package(pkg).map(|file| format!("{}/{}", sub, file));
    let namer = VendorNamer {
        tag: pkg.import_path.clone(),
    };
    generate(importer, resolver, walked, sources, &namer)
}

fn generate(
    importer: &mut Importer,
    resolver: &LabelResolver,
    walked: &WalkedPackage,
    sources: PackageSources,
    namer: &dyn Namer,
) -> Vec<Rule> {
    let pkg = &walked.package;
    let deps = PackageDeps {
        library: label_strings(&extract_deps(importer, resolver, &pkg.imports)),
        test: label_strings(&extract_deps(importer, resolver, &pkg.test_imports)),
        external_test: label_strings(&extract_deps(importer, resolver, &pkg.x_test_imports)),
    };
    let rules = emit(&sources, &deps, pkg.is_command(), namer);
    tracing::debug!("{}: {} rules", walked.rel_dir, rules.len());
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{GoTree, PREFIX};
    use pretty_assertions::assert_eq;

    fn options(tree: &GoTree, config: Config) -> UpdateOptions {
        UpdateOptions {
            root: tree.root().to_path_buf(),
            config,
            dry_run: false,
            package: None,
        }
    }

    fn config() -> Config {
        Config {
            go_prefix: PREFIX.to_string(),
            ..Config::default()
        }
    }

    fn scenario() -> GoTree {
        GoTree::new()
            .with_go("util/u.go", "util", &[])
            .with_go("pkg/x.go", "pkg", &["example.com/repo/util", "fmt"])
    }

    #[test]
    fn test_scenario() {
        let tree = scenario();
        let report = update(&options(&tree, config())).unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(report.changed().count(), 2);
        assert_eq!(
            tree.read("pkg/BUILD"),
            r#"package(default_visibility = ["//visibility:public"])

licenses(["notice"])

load("@io_bazel_rules_go//go:def.bzl", "go_library")

go_library(
    name = "go_default_library",
    srcs = ["x.go"],
    deps = ["//util:go_default_library"],
    tags = ["automanaged"],
)
"#
        );
        assert!(!tree.exists("BUILD"));
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let tree = scenario().with_go("pkg/x_test.go", "pkg", &["testing"]);
        update(&options(&tree, config())).unwrap();
        let before = tree.read("pkg/BUILD");

        let report = update(&options(&tree, config())).unwrap();
        assert!(!report.has_changes());
        assert_eq!(tree.read("pkg/BUILD"), before);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let tree = scenario();
        let mut opts = options(&tree, config());
        opts.dry_run = true;

        let report = update(&opts).unwrap();
        assert!(report.has_changes());
        assert!(!tree.exists("pkg/BUILD"));
        assert!(!tree.exists("util/BUILD"));
    }

    #[test]
    fn test_command_package() {
        let tree = GoTree::new()
            .with_go("cmd/tool/main.go", "main", &["os"])
            .with_go("cmd/tool/main_test.go", "main_test", &["testing"]);
        update(&options(&tree, config())).unwrap();
        let out = tree.read("cmd/tool/BUILD");
        assert!(out.contains("go_binary(\n    name = \"tool\",\n    srcs = [\"main.go\"],"));
        assert!(out.contains("go_test(\n    name = \"go_default_xtest\",\n    srcs = [\"main_test.go\"],"));
        assert!(out.contains("load(\"@io_bazel_rules_go//go:def.bzl\", \"go_binary\", \"go_test\")"));
    }

    #[test]
    fn test_single_vendor_build_file() {
        let tree = GoTree::new()
            .with_go("vendor/github.com/golang/glog/glog.go", "glog", &[])
            .with_go("pkg/x.go", "pkg", &["github.com/golang/glog"]);
        let report = update(&options(&tree, config())).unwrap();
        assert!(report.failures.is_empty());

        assert!(!tree.exists("vendor/github.com/golang/glog/BUILD"));
        let vendor = tree.read("vendor/BUILD");
        assert!(vendor.contains("name = \"github.com/golang/glog\""));
        assert!(vendor.contains("srcs = [\"github.com/golang/glog/glog.go\"]"));
        assert!(tree
            .read("pkg/BUILD")
            .contains("deps = [\"//vendor:github.com/golang/glog\"]"));
    }

    #[test]
    fn test_vendor_multiple_build_files() {
        let tree = GoTree::new()
            .with_go("vendor/github.com/golang/glog/glog.go", "glog", &[])
            .with_go("pkg/x.go", "pkg", &["github.com/golang/glog"]);
        let config = Config {
            vendor_multiple_build_files: true,
            ..config()
        };
        update(&options(&tree, config)).unwrap();

        assert!(!tree.exists("vendor/BUILD"));
        let glog = tree.read("vendor/github.com/golang/glog/BUILD");
        assert!(glog.contains("name = \"go_default_library\""));
        assert!(glog.contains("srcs = [\"glog.go\"]"));
        assert!(tree
            .read("pkg/BUILD")
            .contains("deps = [\"//vendor/github.com/golang/glog:go_default_library\"]"));
    }

    #[test]
    fn test_sources_rules() {
        let tree = scenario().with_file("BUILD", "");
        let config = Config {
            add_sources_rules: true,
            ..config()
        };
        update(&options(&tree, config)).unwrap();

        let root = tree.read("BUILD");
        assert!(root.contains("\"//pkg:all-srcs\","));
        assert!(root.contains("\"//util:all-srcs\","));
        assert!(root.contains("\".git/**\""));
        let pkg = tree.read("pkg/BUILD");
        assert!(pkg.contains("name = \"package-srcs\""));
        assert!(pkg.contains("srcs = [\":package-srcs\"]"));
        assert!(pkg.contains("name = \"go_default_library\""));
    }

    #[test]
    fn test_stale_rules_removed_outside_generated_dirs() {
        let tree = GoTree::new().with_file(
            "docs/BUILD",
            "go_library(\n    name = \"go_default_library\",\n    srcs = [\"gone.go\"],\n    tags = [\"automanaged\"],\n)\n\nexports_files([\"README.md\"])\n",
        );
        let report = update(&options(&tree, config())).unwrap();
        assert_eq!(report.changed().count(), 1);
        assert_eq!(tree.read("docs/BUILD"), "exports_files([\"README.md\"])\n");
    }

    #[test]
    fn test_src_dirs_limit_generation() {
        let tree = scenario();
        let config = Config {
            src_dirs: vec!["pkg".to_string()],
            ..config()
        };
        update(&options(&tree, config)).unwrap();
        assert!(tree.exists("pkg/BUILD"));
        assert!(!tree.exists("util/BUILD"));
    }

    #[test]
    fn test_single_package() {
        let tree = scenario();
        let mut opts = options(&tree, config());
        opts.package = Some("pkg".to_string());

        let report = update(&opts).unwrap();
        assert_eq!(report.reconciled.len(), 1);
        assert!(tree.exists("pkg/BUILD"));
        assert!(!tree.exists("util/BUILD"));
    }

    #[test]
    fn test_missing_package_dir() {
        let tree = scenario();
        let mut opts = options(&tree, config());
        opts.package = Some("nope".to_string());
        assert!(update(&opts).is_err());
    }

    #[test]
    fn test_failures_are_collected() {
        let tree = scenario()
            .with_go("bad/a.go", "a", &[])
            .with_go("bad/b.go", "b", &[]);
        let report = update(&options(&tree, config())).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].dir, tree.path("bad"));
        assert!(tree.exists("pkg/BUILD"));
    }

    #[test]
    fn test_failed_package_keeps_its_build_file() {
        let tree = scenario();
        let config = Config {
            add_sources_rules: true,
            ..config()
        };
        update(&options(&tree, config.clone())).unwrap();
        let before = tree.read("pkg/BUILD");
        assert!(before.contains("name = \"go_default_library\""));

        let tree = tree.with_go("pkg/y.go", "other", &[]);
        let report = update(&options(&tree, config)).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].dir, tree.path("pkg"));
        assert!(report.reconciled.iter().all(|r| !r.path.starts_with(tree.path("pkg"))));
        assert_eq!(tree.read("pkg/BUILD"), before);
    }

    #[test]
    fn test_failed_vendored_package_keeps_vendor_build_file() {
        let tree = GoTree::new().with_go("vendor/github.com/golang/glog/glog.go", "glog", &[]);
        update(&options(&tree, config())).unwrap();
        let before = tree.read("vendor/BUILD");

        let tree = tree.with_go("vendor/github.com/golang/glog/other.go", "other", &[]);
        let report = update(&options(&tree, config())).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(tree.read("vendor/BUILD"), before);
    }

    #[test]
    fn test_unparsable_build_file_is_a_failure() {
        let tree = scenario().with_file("util/BUILD", "go_library(\n");
        let report = update(&options(&tree, config())).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].dir, tree.path("util"));
        assert!(tree.exists("pkg/BUILD"));
    }

    #[test]
    fn test_contains_path() {
        assert!(contains_path("", "a/b"));
        assert!(contains_path("pkg", "pkg"));
        assert!(contains_path("pkg", "pkg/sub"));
        assert!(!contains_path("pkg", "pkgs"));
    }
}

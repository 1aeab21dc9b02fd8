//! `package-srcs` / `all-srcs` filegroups.
//!
//! Every package gets a `package-srcs` filegroup globbing its own files and
//! an `all-srcs` filegroup that collects `package-srcs` together with the
//! `all-srcs` of the nearest packages below it. Directories that are not
//! packages pass their children's targets up unchanged.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::build_file::find_build_file;
use crate::core::{FileGroup, FileGroupSrcs, Label, Rule, RuleKind};
use crate::ops::walk::{Failure, SkipList};

pub const PKG_SRCS_TARGET: &str = "package-srcs";
pub const ALL_SRCS_TARGET: &str = "all-srcs";

/// Excluded from the root `package-srcs` glob.
const ROOT_EXCLUDES: &[&str] = &["bazel-*/**", ".git/**"];

/// Rules to add to a directory, keyed by root-relative path.
///
/// An empty rule list only asks for the BUILD file to be reconciled.
pub type Additions = Vec<(String, Vec<Rule>)>;

/// Outcome of [`aggregate_sources`].
#[derive(Debug, Default)]
pub struct Aggregation {
    pub additions: Additions,

    /// Root-relative directories whose filegroups could not be computed.
    /// Their BUILD files must be left alone.
    pub incomplete: BTreeSet<String>,

    /// Directories that could not be read
    pub failures: Vec<Failure>,
}

/// Walk the tree below `root`, returning filegroup additions.
///
/// * `has_rules` tells whether Go rules were generated for a directory.
/// * `format_scope` tells whether an existing BUILD file without generated
///   rules should still be reconciled.
///
/// An unreadable directory is recorded as a failure. With sources rules on,
/// it and every directory above it are marked incomplete; the rest of the
/// tree is still aggregated.
pub fn aggregate_sources(
    root: &Path,
    skip: &SkipList,
    add_sources_rules: bool,
    has_rules: &dyn Fn(&str) -> bool,
    format_scope: &dyn Fn(&str) -> bool,
) -> Aggregation {
    let walk = SourceWalk {
        skip,
        add_sources_rules,
        has_rules,
        format_scope,
    };
    let mut out = Aggregation::default();
    walk.visit("", root, &mut out);
    out
}

struct SourceWalk<'a> {
    skip: &'a SkipList,
    add_sources_rules: bool,
    has_rules: &'a dyn Fn(&str) -> bool,
    format_scope: &'a dyn Fn(&str) -> bool,
}

impl SourceWalk<'_> {
    /// Records the additions for the subtree and returns the targets its
    /// parent should aggregate, or `None` if they could not be computed.
    fn visit(&self, rel: &str, dir: &Path, out: &mut Aggregation) -> Option<Vec<String>> {
        if self.skip.is_skipped(rel) {
            return Some(Vec::new());
        }

        let subdirs = match read_subdirs(dir) {
            Ok(subdirs) => subdirs,
            Err(error) => {
                tracing::error!("{:#}", error);
                out.failures.push(Failure {
                    dir: dir.to_path_buf(),
                    error,
                });
                out.incomplete.insert(rel.to_string());
                return None;
            }
        };

        let mut children = Vec::new();
        let mut complete = true;
        for (name, path) in subdirs {
            let child = if rel.is_empty() {
                name
            } else {
                format!("{}/{}", rel, name)
            };
            match self.visit(&child, &path, out) {
                Some(targets) => children.extend(targets),
                None => complete = false,
            }
        }

        if !complete && self.add_sources_rules {
            out.incomplete.insert(rel.to_string());
            return None;
        }

        let has_rules = (self.has_rules)(rel);
        if !has_rules && find_build_file(dir).is_none() {
            return Some(children);
        }

        if !has_rules && (self.format_scope)(rel) {
            out.additions.push((rel.to_string(), Vec::new()));
        }

        if !self.add_sources_rules {
            return Some(Vec::new());
        }

        out.additions.push((rel.to_string(), srcs_rules(rel, children)));
        Some(vec![Label::new(rel, ALL_SRCS_TARGET).to_string()])
    }
}

/// Subdirectories of `dir` as `(name, path)`, sorted by name.
///
/// Names are only used for labels; the walk itself follows `path`.
fn read_subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?;
    let mut subdirs = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read directory: {}", dir.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("failed to stat: {}", entry.path().display()))?;
        if file_type.is_dir() {
            subdirs.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
        }
    }
    subdirs.sort();
    Ok(subdirs)
}

/// The filegroups of one package.
fn srcs_rules(rel: &str, children: Vec<String>) -> Vec<Rule> {
    let exclude = if rel.is_empty() {
        ROOT_EXCLUDES.iter().map(|s| s.to_string()).collect()
    } else {
        Vec::new()
    };

    let mut all = children;
    all.push(format!(":{}", PKG_SRCS_TARGET));

    vec![
        Rule::new(
            PKG_SRCS_TARGET,
            RuleKind::FileGroup(FileGroup {
                srcs: FileGroupSrcs::Glob {
                    include: vec!["**".to_string()],
                    exclude,
                },
                visibility: vec!["//visibility:private".to_string()],
            }),
        ),
        Rule::new(
            ALL_SRCS_TARGET,
            RuleKind::FileGroup(FileGroup {
                srcs: FileGroupSrcs::Labels(all),
                visibility: vec!["//visibility:public".to_string()],
            }),
        ),
    ]
}

//! Merging generated rules into BUILD files.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::build_file::{self, Arg, Call, Expr, File, Stmt, NEW_BUILD_FILE};
use crate::core::rule::{RULES_GO_BZL, RULES_GO_KINDS};
use crate::core::Rule;
use crate::util::fs::{read_to_string, write_string};

/// Calls that make up the header of a BUILD file.
const HEADER_CALLS: &[&str] = &["package", "licenses", "load"];

/// Outcome of reconciling one BUILD file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// The BUILD file, existing or to be created
    pub path: PathBuf,
    /// Whether the merged contents differ from what is on disk
    pub changed: bool,
    /// Contents before the merge, `None` for a new file
    pub original: Option<String>,
    /// Contents after the merge
    pub formatted: String,
}

/// Merge `rules` into the BUILD file of `dir`.
///
/// Existing `BUILD.bazel` or `BUILD` files are updated in place; new files
/// are named `BUILD`. Managed rules are overwritten or removed, unmanaged
/// rules are never touched. The file is written only when its contents
/// change and `dry_run` is off.
pub fn reconcile_rules(dir: &Path, rules: &[Rule], dry_run: bool) -> Result<Reconciled> {
    let existing = build_file::find_build_file(dir);
    let path = existing
        .clone()
        .unwrap_or_else(|| dir.join(NEW_BUILD_FILE));

    let (mut file, original) = match &existing {
        Some(path) => {
            let original = read_to_string(path)?;
            let file = build_file::parse(&path.display().to_string(), &original)?;
            (file, Some(original))
        }
        None if rules.is_empty() => {
            return Ok(Reconciled {
                path,
                changed: false,
                original: None,
                formatted: String::new(),
            });
        }
        None => {
            if path.is_dir() {
                bail!("cannot create {}: it is a directory", path.display());
            }
            (new_file(), None)
        }
    };

    merge_rules(&mut file, rules, &path);
    reconcile_load(&mut file);

    let formatted = file.format();
    let changed = original.as_deref() != Some(formatted.as_str());
    if changed && !dry_run {
        write_string(&path, &formatted)?;
        tracing::info!("wrote {}", path.display());
    }

    Ok(Reconciled {
        path,
        changed,
        original,
        formatted,
    })
}

/// Header of a new BUILD file. The `load` is added by [`reconcile_load`].
fn new_file() -> File {
    let mut file = File::new();
    file.stmts.push(Stmt::call(Call::new("package").with_arg(Arg::keyword(
        "default_visibility",
        Expr::string_list(["//visibility:public"]),
    ))));
    file.stmts.push(Stmt::call(
        Call::new("licenses").with_arg(Arg::positional(Expr::string_list(["notice"]))),
    ));
    file
}

fn merge_rules(file: &mut File, rules: &[Rule], path: &Path) {
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, call) in file.rules() {
        if let Some(name) = call.name() {
            index.entry(name.to_string()).or_insert(i);
        }
    }

    let mut appended = Vec::new();
    for rule in rules {
        let Some(&i) = index.get(&rule.name) else {
            appended.push(Stmt::call(rule.to_call()));
            continue;
        };
        let stmt = &mut file.stmts[i];
        if !stmt.as_call().is_some_and(Call::is_managed) {
            tracing::warn!(
                "{}: rule {:?} is not managed by kazel, leaving it alone",
                path.display(),
                rule.name
            );
            continue;
        }
        stmt.update_call(|call| update_managed(call, rule));
    }

    let wanted: HashSet<&str> = rules.iter().map(|r| r.name.as_str()).collect();
    remove_stmts(file, |stmt| match stmt.as_call() {
        Some(call) if call.is_managed() => call.name().is_some_and(|name| !wanted.contains(name)),
        _ => false,
    });

    file.stmts.extend(appended);
}

/// Remove statements, handing their leading comments to whatever follows.
fn remove_stmts(file: &mut File, remove: impl Fn(&Stmt) -> bool) {
    let mut kept = Vec::with_capacity(file.stmts.len());
    let mut orphaned: Vec<String> = Vec::new();
    for mut stmt in file.stmts.drain(..) {
        if remove(&stmt) {
            orphaned.append(&mut stmt.comments);
            continue;
        }
        if !orphaned.is_empty() {
            orphaned.append(&mut stmt.comments);
            stmt.comments = std::mem::take(&mut orphaned);
        }
        kept.push(stmt);
    }
    if !orphaned.is_empty() {
        orphaned.append(&mut file.trailing_comments);
        file.trailing_comments = orphaned;
    }
    file.stmts = kept;
}

/// Overwrite the generated attributes of a managed rule.
fn update_managed(call: &mut Call, rule: &Rule) -> bool {
    let mut changed = false;
    if call.func != rule.kind_name() {
        call.func = rule.kind_name().to_string();
        changed = true;
    }
    let attrs = [
        ("srcs", rule.srcs_attr()),
        ("deps", rule.deps_attr()),
        ("library", rule.library_attr()),
    ];
    for (name, value) in attrs {
        changed |= match value {
            Some(value) => call.set_attr(name, value),
            None => call.del_attr(name),
        };
    }
    changed
}

fn is_rules_go_load(stmt: &Stmt) -> bool {
    stmt.as_call().is_some_and(|c| {
        c.func == "load" && c.positional_strings().first() == Some(&RULES_GO_BZL)
    })
}

/// Make the Go rules `load` list exactly the kinds used in the file.
fn reconcile_load(file: &mut File) {
    let load_index = file.stmts.iter().position(is_rules_go_load);

    let mut candidates: BTreeSet<String> = RULES_GO_KINDS.iter().map(|s| s.to_string()).collect();
    if let Some(call) = load_index.and_then(|i| file.stmts[i].as_call()) {
        candidates.extend(call.positional_strings().iter().skip(1).map(|s| s.to_string()));
    }
    let used: HashSet<&str> = file
        .stmts
        .iter()
        .filter_map(Stmt::as_call)
        .filter(|c| c.func != "load")
        .map(|c| c.func.as_str())
        .collect();
    let needed: Vec<String> = candidates
        .into_iter()
        .filter(|kind| used.contains(kind.as_str()))
        .collect();

    match load_index {
        Some(_) if needed.is_empty() => remove_stmts(file, is_rules_go_load),
        Some(i) => {
            file.stmts[i].update_call(|call| {
                let current: Vec<String> = call
                    .positional_strings()
                    .iter()
                    .skip(1)
                    .map(|s| s.to_string())
                    .collect();
                if current == needed {
                    return false;
                }
                let keywords: Vec<Arg> = call.args.iter().filter(|a| a.name.is_some()).cloned().collect();
                call.args = std::iter::once(Arg::positional(Expr::string(RULES_GO_BZL)))
                    .chain(needed.iter().map(|k| Arg::positional(Expr::string(k.clone()))))
                    .chain(keywords)
                    .collect();
                true
            });
        }
        None if needed.is_empty() => {}
        None => {
            let mut load = Call::new("load").with_arg(Arg::positional(Expr::string(RULES_GO_BZL)));
            for kind in &needed {
                load = load.with_arg(Arg::positional(Expr::string(kind.clone())));
            }
            let mut stmt = Stmt::call(load);

            let at = file
                .stmts
                .iter()
                .take_while(|s| s.as_call().is_some_and(|c| HEADER_CALLS.contains(&c.func.as_str())))
                .count();
            // A comment block set off by a blank line stays at the top.
            if at == 0 {
                if let Some(first) = file.stmts.first_mut() {
                    if let Some(blank) = first.comments.iter().rposition(String::is_empty) {
                        stmt.comments = first.comments.drain(..=blank).collect();
                    }
                }
            }
            file.stmts.insert(at, stmt);
        }
    }
}

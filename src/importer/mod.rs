//! Package importer.
//!
//! Classifies the files of a directory into the source groups of a Go
//! package and resolves import paths to packages. Results are memoized in
//! an [`ImportCache`] owned by the importer.

pub mod cache;
pub mod context;
pub mod scan;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

pub use cache::{ImportCache, ImportResult};
pub use context::BuildContext;

use crate::core::{LabelResolver, Package};
use crate::util::fs::slash_relative;

/// Synthetic imports that never resolve to a directory.
const SYNTHETIC_IMPORTS: &[&str] = &["C"];

/// Name of vendor directories.
const VENDOR_DIR: &str = "vendor";

/// Error while importing a package.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("no buildable Go source files in {}", .dir.display())]
    NoBuildableSources { dir: PathBuf },

    #[error("cannot find package \"{import_path}\" from {}", .src_dir.display())]
    NotFound {
        import_path: String,
        src_dir: PathBuf,
    },

    #[error("found packages {first} ({first_file}) and {second} ({second_file}) in {}", .dir.display())]
    MultiplePackages {
        dir: PathBuf,
        first: String,
        first_file: String,
        second: String,
        second_file: String,
    },

    #[error("failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("{}: {message}", .path.display())]
    Syntax { path: PathBuf, message: String },
}

impl ImportError {
    /// Whether the error only means the directory is not a package.
    pub fn is_no_buildable_sources(&self) -> bool {
        matches!(self, ImportError::NoBuildableSources { .. })
    }

    /// Whether this is an unresolvable synthetic import that callers drop
    /// without reporting.
    pub fn is_synthetic(&self) -> bool {
        matches!(self, ImportError::NotFound { import_path, .. } if SYNTHETIC_IMPORTS.contains(&import_path.as_str()))
    }
}

/// Classifies directories and resolves imports.
#[derive(Debug)]
pub struct Importer {
    root: PathBuf,
    resolver: LabelResolver,
    context: BuildContext,
    cache: ImportCache,
}

impl Importer {
    /// Create an importer for the workspace at `root`.
    pub fn new(root: impl Into<PathBuf>, prefix: &str, context: BuildContext) -> Self {
        Importer {
            root: root.into(),
            resolver: LabelResolver::new(prefix),
            context,
            cache: ImportCache::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache(&self) -> &ImportCache {
        &self.cache
    }

    /// Classify the package in `dir`.
    pub fn import_dir(&mut self, dir: &Path) -> ImportResult {
        if let Some(cached) = self.cache.get_dir(dir) {
            return cached;
        }
        let import_path = self.import_path_for(dir);
        tracing::debug!("scanning {} ({})", dir.display(), import_path);
        let result = classify(dir, import_path, &self.context).map(Arc::new);
        self.cache.insert_dir(dir, result.clone());
        result
    }

    /// Resolve an import path as seen from `src_dir`.
    pub fn import(&mut self, import_path: &str, src_dir: &Path) -> ImportResult {
        if let Some(cached) = self.cache.get_import(import_path, src_dir) {
            return cached;
        }
        let result = self.resolve(import_path, src_dir);
        self.cache.insert_import(import_path, src_dir, result.clone());
        result
    }

    fn resolve(&mut self, import_path: &str, src_dir: &Path) -> ImportResult {
        let not_found = || ImportError::NotFound {
            import_path: import_path.to_string(),
            src_dir: src_dir.to_path_buf(),
        };

        if SYNTHETIC_IMPORTS.contains(&import_path) {
            return Err(not_found());
        }

        if !self.resolver.prefix().is_empty() {
            if let Some(rest) = self.resolver.strip_prefix(import_path) {
                let dir = self.root.join(rest);
                return self.import_dir(&dir);
            }
        }

        if is_standard(import_path) {
            return Ok(Arc::new(Package::standard(import_path)));
        }

        if let Some(dir) = self.find_vendored(import_path, src_dir) {
            return self.import_dir(&dir);
        }

        if self.resolver.prefix().is_empty() {
            let dir = self.root.join(import_path);
            if dir.is_dir() {
                return self.import_dir(&dir);
            }
        }

        Err(not_found())
    }

    /// Nearest `vendor/<import_path>` from `src_dir` up to the root.
    fn find_vendored(&self, import_path: &str, src_dir: &Path) -> Option<PathBuf> {
        let mut dir = Some(src_dir);
        while let Some(current) = dir {
            if !current.starts_with(&self.root) {
                break;
            }
            let candidate = current.join(VENDOR_DIR).join(import_path);
            if candidate.is_dir() {
                return Some(candidate);
            }
            if current == self.root {
                break;
            }
            dir = current.parent();
        }
        None
    }

    /// Import path of a directory inside the workspace.
    ///
    /// Packages under a `vendor/` directory are imported by the path that
    /// follows the innermost `vendor` component.
    pub fn import_path_for(&self, dir: &Path) -> String {
        let rel = slash_relative(&self.root, dir);
        let parts: Vec<&str> = rel.split('/').filter(|p| !p.is_empty()).collect();
        if let Some(i) = parts.iter().rposition(|p| *p == VENDOR_DIR) {
            return parts[i + 1..].join("/");
        }
        match (self.resolver.prefix(), rel.as_str()) {
            (prefix, "") => prefix.to_string(),
            ("", rel) => rel.to_string(),
            (prefix, rel) => format!("{}/{}", prefix, rel),
        }
    }
}

/// Whether an import path belongs to the standard library.
///
/// Standard library paths have no dot in their first element.
pub fn is_standard(import_path: &str) -> bool {
    let first = import_path.split('/').next().unwrap_or(import_path);
    !first.is_empty() && !first.contains('.')
}

/// Which role a Go file plays.
enum GoRole {
    Library,
    Cgo,
    Test,
    ExternalTest,
}

fn classify(dir: &Path, import_path: String, ctx: &BuildContext) -> Result<Package, ImportError> {
    let read_err = |path: &Path, e: std::io::Error| ImportError::Read {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| read_err(dir, e))? {
        let entry = entry.map_err(|e| read_err(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('_') || name.starts_with('.') {
            continue;
        }
        names.push(name);
    }
    names.sort();

    let mut pkg = Package {
        import_path,
        dir: dir.to_path_buf(),
        ..Default::default()
    };
    // (package name, file that declared it)
    let mut declared: Option<(String, String)> = None;
    let mut imports = Vec::new();
    let mut test_imports = Vec::new();
    let mut x_test_imports = Vec::new();

    for name in names {
        let Some(ext) = name.rsplit_once('.').map(|(_, ext)| ext) else {
            continue;
        };
        let path = dir.join(&name);

        if ext != "go" {
            let list = match ext {
                "s" | "S" => &mut pkg.s_files,
                "c" => &mut pkg.c_files,
                "cc" | "cpp" | "cxx" => &mut pkg.cxx_files,
                "h" | "hh" | "hpp" | "hxx" => &mut pkg.h_files,
                _ => continue,
            };
            if !ctx.matches_file_name(&name) {
                continue;
            }
            let src = fs::read_to_string(&path).map_err(|e| read_err(&path, e))?;
            if ctx.matches_constraints(&scan::constraint_comments(&src)) {
                list.push(name);
            }
            continue;
        }

        let src = fs::read_to_string(&path).map_err(|e| read_err(&path, e))?;
        let header = scan::scan_header(&src).map_err(|message| ImportError::Syntax {
            path: path.clone(),
            message,
        })?;

        if !ctx.matches_file_name(&name) || !ctx.matches_constraints(&header.constraint_comments) {
            pkg.ignored_go_files.push(name);
            continue;
        }

        let is_test = name.ends_with("_test.go");
        let role = if is_test && header.package.ends_with("_test") {
            GoRole::ExternalTest
        } else if is_test {
            GoRole::Test
        } else if header.imports_c() {
            if !ctx.cgo_enabled {
                pkg.ignored_go_files.push(name);
                continue;
            }
            GoRole::Cgo
        } else {
            GoRole::Library
        };

        let package_name = match role {
            GoRole::ExternalTest => header
                .package
                .strip_suffix("_test")
                .unwrap_or(&header.package)
                .to_string(),
            _ => header.package.clone(),
        };
        match &declared {
            Some((first, first_file)) if *first != package_name => {
                return Err(ImportError::MultiplePackages {
                    dir: dir.to_path_buf(),
                    first: first.clone(),
                    first_file: first_file.clone(),
                    second: header.package,
                    second_file: name,
                });
            }
            Some(_) => {}
            None => declared = Some((package_name, name.clone())),
        }

        match role {
            GoRole::Library => {
                imports.extend(header.imports);
                pkg.go_files.push(name);
            }
            GoRole::Cgo => {
                imports.extend(header.imports);
                pkg.cgo_files.push(name);
            }
            GoRole::Test => {
                test_imports.extend(header.imports);
                pkg.test_go_files.push(name);
            }
            GoRole::ExternalTest => {
                x_test_imports.extend(header.imports);
                pkg.x_test_go_files.push(name);
            }
        }
    }

    if !pkg.has_go_files() {
        return Err(ImportError::NoBuildableSources {
            dir: dir.to_path_buf(),
        });
    }

    pkg.name = declared.map(|(name, _)| name).unwrap_or_default();
    pkg.imports = sorted(imports);
    pkg.test_imports = sorted(test_imports);
    pkg.x_test_imports = sorted(x_test_imports);
    Ok(pkg)
}

fn sorted(mut values: Vec<String>) -> Vec<String> {
    values.sort();
    values.dedup();
    values
}

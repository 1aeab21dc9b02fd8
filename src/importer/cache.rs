//! Import result memoization.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::ImportError;
use crate::core::Package;

/// Result of importing one package.
pub type ImportResult = Result<Arc<Package>, ImportError>;

/// Memoized import results.
///
/// Lookups by import path depend on the directory the import is resolved
/// from (vendor directories shadow each other), so those are keyed by the
/// pair. Every directory is scanned at most once regardless of how it was
/// reached. Entries are never evicted.
#[derive(Debug, Default)]
pub struct ImportCache {
    /// Results by (import path, resolving directory)
    by_import: HashMap<(String, PathBuf), ImportResult>,

    /// Results by scanned directory
    by_dir: HashMap<PathBuf, ImportResult>,
}

impl ImportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached result for an import resolved from `src_dir`.
    pub fn get_import(&self, import_path: &str, src_dir: &Path) -> Option<ImportResult> {
        self.by_import
            .get(&(import_path.to_string(), src_dir.to_path_buf()))
            .cloned()
    }

    pub fn insert_import(&mut self, import_path: &str, src_dir: &Path, result: ImportResult) {
        self.by_import
            .insert((import_path.to_string(), src_dir.to_path_buf()), result);
    }

    /// Cached result for a scanned directory.
    pub fn get_dir(&self, dir: &Path) -> Option<ImportResult> {
        self.by_dir.get(dir).cloned()
    }

    pub fn insert_dir(&mut self, dir: &Path, result: ImportResult) {
        self.by_dir.insert(dir.to_path_buf(), result);
    }

    /// Number of directories scanned.
    pub fn scanned_dirs(&self) -> usize {
        self.by_dir.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_keys_include_source_dir() {
        let mut cache = ImportCache::new();
        let pkg = Arc::new(Package::standard("fmt"));
        cache.insert_import("fmt", Path::new("/repo/a"), Ok(pkg.clone()));

        assert!(cache.get_import("fmt", Path::new("/repo/a")).is_some());
        assert!(cache.get_import("fmt", Path::new("/repo/b")).is_none());
    }

    #[test]
    fn test_errors_are_cached() {
        let mut cache = ImportCache::new();
        let err = ImportError::NoBuildableSources {
            dir: PathBuf::from("/repo/docs"),
        };
        cache.insert_dir(Path::new("/repo/docs"), Err(err.clone()));

        assert_eq!(cache.get_dir(Path::new("/repo/docs")), Some(Err(err)));
        assert_eq!(cache.scanned_dirs(), 1);
    }
}

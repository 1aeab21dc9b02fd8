//! Bazel labels and import path resolution.

use std::fmt;

/// Target name of the library rule generated for every in-repo package.
pub const DEFAULT_LIBRARY: &str = "go_default_library";

/// Package scope used for vendored dependencies kept in a single BUILD file.
pub const VENDOR_SCOPE: &str = "vendor";

/// A `//package:target` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label {
    /// Package path relative to the workspace root (empty for the root package)
    pub package: String,
    /// Target name within the package
    pub target: String,
}

impl Label {
    /// Create a new label.
    pub fn new(package: impl Into<String>, target: impl Into<String>) -> Self {
        Label {
            package: package.into(),
            target: target.into(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "//{}:{}", self.package, self.target)
    }
}

/// Maps Go import paths to labels.
#[derive(Debug, Clone)]
pub struct LabelResolver {
    prefix: String,
    vendor_multiple_build_files: bool,
}

impl LabelResolver {
    /// Create a resolver for the given internal import prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        LabelResolver {
            prefix: prefix.into().trim_end_matches('/').to_string(),
            vendor_multiple_build_files: false,
        }
    }

    /// Give every vendored package its own BUILD file.
    pub fn with_vendor_multiple_build_files(mut self, enabled: bool) -> Self {
        self.vendor_multiple_build_files = enabled;
        self
    }

    /// The configured internal prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Strip the internal prefix from an import path.
    ///
    /// Returns `None` for paths outside the prefix. An empty prefix claims
    /// every import path.
    pub fn strip_prefix<'a>(&self, import_path: &'a str) -> Option<&'a str> {
        if self.prefix.is_empty() {
            return Some(import_path);
        }
        let rest = import_path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("")
        } else {
            rest.strip_prefix('/')
        }
    }

    /// Resolve an import path to a label.
    pub fn resolve(&self, import_path: &str) -> Label {
        if let Some(pkg) = self.strip_prefix(import_path) {
            return Label::new(pkg, DEFAULT_LIBRARY);
        }
        if self.vendor_multiple_build_files {
            return Label::new(format!("{}/{}", VENDOR_SCOPE, import_path), DEFAULT_LIBRARY);
        }
        Label::new(VENDOR_SCOPE, import_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_display() {
        assert_eq!(
            Label::new("pkg/util", DEFAULT_LIBRARY).to_string(),
            "//pkg/util:go_default_library"
        );
        assert_eq!(Label::new("", "all-srcs").to_string(), "//:all-srcs");
    }

    #[test]
    fn test_resolve_internal() {
        let resolver = LabelResolver::new("k8s.io/kubernetes");
        assert_eq!(
            resolver.resolve("k8s.io/kubernetes/pkg/api"),
            Label::new("pkg/api", DEFAULT_LIBRARY)
        );
    }

    #[test]
    fn test_resolve_requires_path_boundary() {
        let resolver = LabelResolver::new("k8s.io/kube");
        assert_eq!(
            resolver.resolve("k8s.io/kubernetes/pkg"),
            Label::new("vendor", "k8s.io/kubernetes/pkg")
        );
    }

    #[test]
    fn test_resolve_vendor() {
        let resolver = LabelResolver::new("k8s.io/kubernetes");
        assert_eq!(
            resolver.resolve("github.com/golang/glog").to_string(),
            "//vendor:github.com/golang/glog"
        );
    }

    #[test]
    fn test_resolve_vendor_multiple_build_files() {
        let resolver =
            LabelResolver::new("k8s.io/kubernetes").with_vendor_multiple_build_files(true);
        assert_eq!(
            resolver.resolve("github.com/golang/glog").to_string(),
            "//vendor/github.com/golang/glog:go_default_library"
        );
    }

    #[test]
    fn test_equal_inputs_resolve_equal() {
        let resolver = LabelResolver::new("example.com/repo");
        let a: Vec<Label> = ["example.com/repo/a", "golang.org/x/net"]
            .iter()
            .map(|p| resolver.resolve(p))
            .collect();
        let b: Vec<Label> = ["example.com/repo/a", "golang.org/x/net"]
            .iter()
            .map(|p| resolver.resolve(p))
            .collect();
        assert_eq!(a, b);
    }
}

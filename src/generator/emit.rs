//! Rule emission for a classified package.

use crate::core::rule::CGO_CLINKOPTS;
use crate::core::{GoAttrs, Package, Rule, RuleKind, DEFAULT_LIBRARY};

/// The role of a generated rule, used to pick its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleType {
    Binary,
    Library,
    Test,
    ExternalTest,
    CgoCodegen,
}

/// Chooses rule names.
pub trait Namer {
    fn name(&self, rule_type: RuleType) -> String;
}

/// Names used for packages with their own BUILD file.
#[derive(Debug, Clone)]
pub struct DefaultNamer {
    /// Name of the binary, the package directory's name
    pub binary: String,
}

impl DefaultNamer {
    pub fn for_package(pkg: &Package) -> Self {
        DefaultNamer {
            binary: pkg.dir_name().to_string(),
        }
    }
}

impl Namer for DefaultNamer {
    fn name(&self, rule_type: RuleType) -> String {
        match rule_type {
            RuleType::Binary => self.binary.clone(),
            RuleType::Library => DEFAULT_LIBRARY.to_string(),
            RuleType::Test => "go_default_test".to_string(),
            RuleType::ExternalTest => "go_default_xtest".to_string(),
            RuleType::CgoCodegen => "cgo_codegen".to_string(),
        }
    }
}

/// Names used when every vendored package shares `vendor/BUILD`.
///
/// Rules are named after the import path so they cannot collide.
#[derive(Debug, Clone)]
pub struct VendorNamer {
    pub tag: String,
}

impl Namer for VendorNamer {
    fn name(&self, rule_type: RuleType) -> String {
        match rule_type {
            RuleType::Binary => format!("{}_bin", self.tag),
            RuleType::Library => self.tag.clone(),
            RuleType::Test => format!("{}_test", self.tag),
            RuleType::ExternalTest => format!("{}_xtest", self.tag),
            RuleType::CgoCodegen => format!("{}_cgo", self.tag),
        }
    }
}

/// Source file groups of a package, as they will appear in `srcs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSources {
    /// Go and assembly sources
    pub library: Vec<String>,
    /// cgo Go, C, C++ and header sources
    pub interop: Vec<String>,
    pub test: Vec<String>,
    pub external_test: Vec<String>,
}

impl PackageSources {
    pub fn from_package(pkg: &Package) -> Self {
        PackageSources {
            library: pkg.library_sources(),
            interop: pkg.interop_sources(),
            test: pkg.test_go_files.clone(),
            external_test: pkg.x_test_go_files.clone(),
        }
    }

    /// Rewrite every file name.
    pub fn map(self, f: impl Fn(&str) -> String) -> Self {
        let apply = |files: Vec<String>| files.iter().map(|s| f(s)).collect();
        PackageSources {
            library: apply(self.library),
            interop: apply(self.interop),
            test: apply(self.test),
            external_test: apply(self.external_test),
        }
    }
}

/// Dependency labels of a package per role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDeps {
    pub library: Vec<String>,
    pub test: Vec<String>,
    pub external_test: Vec<String>,
}

/// Generate the rules for one package.
///
/// The cgo rule comes first and is embedded by the library or binary.
/// Commands get a binary. Other packages get an in-package test and the
/// library. Both get an external test when there are external test sources.
pub fn emit(
    sources: &PackageSources,
    deps: &PackageDeps,
    is_command: bool,
    namer: &dyn Namer,
) -> Vec<Rule> {
    if sources.library.is_empty() && sources.interop.is_empty() {
        return Vec::new();
    }

    let mut rules = Vec::new();
    let mut embedded = None;

    if !sources.interop.is_empty() {
        let name = namer.name(RuleType::CgoCodegen);
        rules.push(Rule::new(
            name.clone(),
            RuleKind::CgoCodegen {
                srcs: sources.interop.clone(),
                clinkopts: CGO_CLINKOPTS.iter().map(|s| s.to_string()).collect(),
            },
        ));
        embedded = Some(name);
    }

    let library_attrs = GoAttrs {
        srcs: sources.library.clone(),
        deps: deps.library.clone(),
        library: embedded,
    };

    if is_command {
        rules.push(Rule::new(
            namer.name(RuleType::Binary),
            RuleKind::Binary(library_attrs),
        ));
    } else {
        let library_name = namer.name(RuleType::Library);
        if !sources.test.is_empty() {
            rules.push(Rule::new(
                namer.name(RuleType::Test),
                RuleKind::Test(GoAttrs {
                    srcs: sources.test.clone(),
                    deps: deps.test.clone(),
                    library: Some(library_name.clone()),
                }),
            ));
        }
        rules.push(Rule::new(library_name, RuleKind::Library(library_attrs)));
    }

    if !sources.external_test.is_empty() {
        rules.push(Rule::new(
            namer.name(RuleType::ExternalTest),
            RuleKind::ExternalTest {
                srcs: sources.external_test.clone(),
                deps: deps.external_test.clone(),
            },
        ));
    }

    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn files(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn namer() -> DefaultNamer {
        DefaultNamer {
            binary: "tool".to_string(),
        }
    }

    fn names(rules: &[Rule]) -> Vec<(&str, &str)> {
        rules.iter().map(|r| (r.kind_name(), r.name.as_str())).collect()
    }

    #[test]
    fn test_nothing_without_sources() {
        let sources = PackageSources {
            test: files(&["a_test.go"]),
            ..Default::default()
        };
        assert!(emit(&sources, &PackageDeps::default(), false, &namer()).is_empty());
    }

    #[test]
    fn test_library_with_tests() {
        let sources = PackageSources {
            library: files(&["a.go"]),
            test: files(&["a_test.go"]),
            external_test: files(&["b_test.go"]),
            ..Default::default()
        };
        let deps = PackageDeps {
            library: files(&["//util:go_default_library"]),
            test: Vec::new(),
            external_test: files(&["//pkg:go_default_library"]),
        };
        let rules = emit(&sources, &deps, false, &namer());

        assert_eq!(
            names(&rules),
            vec![
                ("go_test", "go_default_test"),
                ("go_library", "go_default_library"),
                ("go_test", "go_default_xtest"),
            ]
        );
        assert_eq!(
            rules[0].kind,
            RuleKind::Test(GoAttrs {
                srcs: files(&["a_test.go"]),
                deps: Vec::new(),
                library: Some("go_default_library".to_string()),
            })
        );
        assert_eq!(rules[2].library_attr(), None);
        assert_eq!(
            rules[2].to_call().attr_strings("deps"),
            vec!["//pkg:go_default_library"]
        );
    }

    #[test]
    fn test_command_gets_binary_and_external_test() {
        let sources = PackageSources {
            library: files(&["main.go"]),
            test: files(&["main_test.go"]),
            ..Default::default()
        };
        let rules = emit(&sources, &PackageDeps::default(), true, &namer());
        assert_eq!(names(&rules), vec![("go_binary", "tool")]);

        let sources = PackageSources {
            external_test: files(&["cli_test.go"]),
            ..sources
        };
        let deps = PackageDeps {
            external_test: vec!["//util:go_default_library".to_string()],
            ..Default::default()
        };
        let rules = emit(&sources, &deps, true, &namer());
        assert_eq!(
            names(&rules),
            vec![("go_binary", "tool"), ("go_test", "go_default_xtest")]
        );
        assert_eq!(
            rules[1].kind,
            RuleKind::ExternalTest {
                srcs: files(&["cli_test.go"]),
                deps: vec!["//util:go_default_library".to_string()],
            }
        );
    }

    #[test]
    fn test_cgo_rule_is_embedded() {
        let sources = PackageSources {
            interop: files(&["c.go", "c.c", "c.h"]),
            ..Default::default()
        };
        let rules = emit(&sources, &PackageDeps::default(), false, &namer());

        assert_eq!(
            names(&rules),
            vec![("cgo_genrule", "cgo_codegen"), ("go_library", "go_default_library")]
        );
        let library = rules[1].to_call();
        assert!(library.attr("srcs").is_none());
        assert_eq!(
            library.attr("library").and_then(|e| e.as_str()),
            Some(":cgo_codegen")
        );
    }

    #[test]
    fn test_vendor_namer() {
        let namer = VendorNamer {
            tag: "github.com/golang/glog".to_string(),
        };
        assert_eq!(namer.name(RuleType::Library), "github.com/golang/glog");
        assert_eq!(namer.name(RuleType::Binary), "github.com/golang/glog_bin");
        assert_eq!(namer.name(RuleType::Test), "github.com/golang/glog_test");
        assert_eq!(namer.name(RuleType::ExternalTest), "github.com/golang/glog_xtest");
        assert_eq!(namer.name(RuleType::CgoCodegen), "github.com/golang/glog_cgo");
    }

    #[test]
    fn test_sources_map() {
        let sources = PackageSources {
            library: files(&["vendor/x/a.go"]),
            test: files(&["vendor/x/a_test.go"]),
            ..Default::default()
        }
        .map(|s| s.trim_start_matches("vendor/").to_string());
        assert_eq!(sources.library, vec!["x/a.go"]);
        assert_eq!(sources.test, vec!["x/a_test.go"]);
    }
}

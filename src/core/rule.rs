//! Generated rules.
//!
//! Rule kinds form a closed set; each variant carries only the attributes
//! that kind accepts. Rules lower to BUILD file calls tagged as managed.

use crate::build_file::{Arg, Call, Expr, MANAGED_TAG};

/// Repository that provides the Go rules.
pub const RULES_GO_BZL: &str = "@io_bazel_rules_go//go:def.bzl";

/// Link options passed to every cgo code generation rule.
pub const CGO_CLINKOPTS: &[&str] = &["-lz", "-lm", "-lpthread", "-ldl"];

/// Rule kinds provided by the Go rules repository.
pub const RULES_GO_KINDS: &[&str] = &["cgo_genrule", "go_binary", "go_library", "go_test"];

/// Sources of a filegroup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileGroupSrcs {
    /// `glob(include, exclude = exclude)`
    Glob {
        include: Vec<String>,
        exclude: Vec<String>,
    },
    /// Explicit labels
    Labels(Vec<String>),
}

/// Attributes of a filegroup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    pub srcs: FileGroupSrcs,
    pub visibility: Vec<String>,
}

/// Attributes shared by binaries, libraries and in-package tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoAttrs {
    pub srcs: Vec<String>,
    pub deps: Vec<String>,
    /// Name of the rule whose sources are compiled in
    pub library: Option<String>,
}

/// The kind of a rule and its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    Binary(GoAttrs),
    Library(GoAttrs),
    Test(GoAttrs),
    /// Tests of the `_test` package. Never embeds a library.
    ExternalTest {
        srcs: Vec<String>,
        deps: Vec<String>,
    },
    CgoCodegen {
        srcs: Vec<String>,
        clinkopts: Vec<String>,
    },
    FileGroup(FileGroup),
}

impl RuleKind {
    /// The function called in the BUILD file.
    pub fn kind_name(&self) -> &'static str {
        match self {
            RuleKind::Binary(_) => "go_binary",
            RuleKind::Library(_) => "go_library",
            RuleKind::Test(_) | RuleKind::ExternalTest { .. } => "go_test",
            RuleKind::CgoCodegen { .. } => "cgo_genrule",
            RuleKind::FileGroup(_) => "filegroup",
        }
    }
}

/// A named rule to be placed in a BUILD file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub kind: RuleKind,
}

impl Rule {
    pub fn new(name: impl Into<String>, kind: RuleKind) -> Self {
        Rule {
            name: name.into(),
            kind,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.kind_name()
    }

    /// The `srcs` attribute as it appears in the BUILD file, if non-empty.
    pub fn srcs_attr(&self) -> Option<Expr> {
        match &self.kind {
            RuleKind::Binary(a) | RuleKind::Library(a) | RuleKind::Test(a) => {
                non_empty_list(&a.srcs)
            }
            RuleKind::ExternalTest { srcs, .. } | RuleKind::CgoCodegen { srcs, .. } => {
                non_empty_list(srcs)
            }
            RuleKind::FileGroup(group) => match &group.srcs {
                FileGroupSrcs::Glob { include, exclude } => Some(glob(include, exclude)),
                FileGroupSrcs::Labels(labels) => non_empty_list(labels),
            },
        }
    }

    /// The `deps` attribute, if non-empty.
    pub fn deps_attr(&self) -> Option<Expr> {
        match &self.kind {
            RuleKind::Binary(a) | RuleKind::Library(a) | RuleKind::Test(a) => {
                non_empty_list(&a.deps)
            }
            RuleKind::ExternalTest { deps, .. } => non_empty_list(deps),
            RuleKind::CgoCodegen { .. } | RuleKind::FileGroup(_) => None,
        }
    }

    /// The `library` attribute, if set.
    pub fn library_attr(&self) -> Option<Expr> {
        match &self.kind {
            RuleKind::Binary(a) | RuleKind::Library(a) | RuleKind::Test(a) => {
                a.library.as_ref().map(|l| Expr::string(format!(":{}", l)))
            }
            _ => None,
        }
    }

    /// Lower the rule to a call.
    pub fn to_call(&self) -> Call {
        let mut call = Call::new(self.kind_name())
            .with_arg(Arg::keyword("name", Expr::string(self.name.clone())));

        if let Some(srcs) = self.srcs_attr() {
            call = call.with_arg(Arg::keyword("srcs", srcs));
        }
        match &self.kind {
            RuleKind::CgoCodegen { clinkopts, .. } if !clinkopts.is_empty() => {
                call = call.with_arg(Arg::keyword("clinkopts", Expr::string_list(clinkopts)));
            }
            RuleKind::FileGroup(group) if !group.visibility.is_empty() => {
                call = call.with_arg(Arg::keyword(
                    "visibility",
                    Expr::string_list(&group.visibility),
                ));
            }
            _ => {}
        }
        if let Some(deps) = self.deps_attr() {
            call = call.with_arg(Arg::keyword("deps", deps));
        }
        if let Some(library) = self.library_attr() {
            call = call.with_arg(Arg::keyword("library", library));
        }

        call.with_arg(Arg::keyword("tags", Expr::string_list([MANAGED_TAG])))
    }
}

fn non_empty_list(values: &[String]) -> Option<Expr> {
    if values.is_empty() {
        None
    } else {
        Some(Expr::string_list(values))
    }
}

fn glob(include: &[String], exclude: &[String]) -> Expr {
    let mut call = Call::new("glob").with_arg(Arg::positional(Expr::string_list(include)));
    if !exclude.is_empty() {
        call = call.with_arg(Arg::keyword("exclude", Expr::string_list(exclude)));
    }
    Expr::Call(call)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_file::format_expr;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_library_lowering() {
        let rule = Rule::new(
            "go_default_library",
            RuleKind::Library(GoAttrs {
                srcs: vec!["a.go".into(), "b.go".into()],
                deps: vec!["//util:go_default_library".into()],
                library: Some("cgo_codegen".into()),
            }),
        );
        assert_eq!(
            format_expr(&Expr::Call(rule.to_call()), 0),
            r#"go_library(
    name = "go_default_library",
    srcs = [
        "a.go",
        "b.go",
    ],
    deps = ["//util:go_default_library"],
    library = ":cgo_codegen",
    tags = ["automanaged"],
)"#
        );
    }

    #[test]
    fn test_empty_attributes_are_omitted() {
        let rule = Rule::new("go_default_xtest", RuleKind::ExternalTest {
            srcs: vec!["x_test.go".into()],
            deps: Vec::new(),
        });
        let call = rule.to_call();
        assert!(call.attr("deps").is_none());
        assert!(call.attr("library").is_none());
        assert_eq!(call.func, "go_test");
        assert!(call.is_managed());
    }

    #[test]
    fn test_cgo_lowering() {
        let rule = Rule::new("cgo_codegen", RuleKind::CgoCodegen {
            srcs: vec!["c.go".into(), "c.h".into()],
            clinkopts: CGO_CLINKOPTS.iter().map(|s| s.to_string()).collect(),
        });
        let call = rule.to_call();
        assert_eq!(call.func, "cgo_genrule");
        assert_eq!(
            call.attr_strings("clinkopts"),
            vec!["-lz", "-lm", "-lpthread", "-ldl"]
        );
    }

    #[test]
    fn test_filegroup_is_native() {
        let rule = Rule::new(
            "package-srcs",
            RuleKind::FileGroup(FileGroup {
                srcs: FileGroupSrcs::Glob {
                    include: vec!["**".into()],
                    exclude: Vec::new(),
                },
                visibility: vec!["//visibility:private".into()],
            }),
        );
        assert_eq!(
            format_expr(rule.srcs_attr().as_ref().unwrap(), 0),
            r#"glob(["**"])"#
        );
        assert_eq!(
            rule.to_call().attr_strings("visibility"),
            vec!["//visibility:private"]
        );
    }
}

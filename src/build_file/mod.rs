//! BUILD file syntax.
//!
//! A BUILD file is modelled as an ordered list of top-level statements.
//! Parsed statements remember their source text: a statement that is never
//! modified prints back exactly as it was read, while new or modified
//! statements go through the canonical printer.

pub mod lexer;
mod parser;
mod printer;

pub use parser::{parse, ParseError};
pub use printer::{format_expr, format_file};

use std::path::{Path, PathBuf};

/// Tag marking a rule as owned by kazel.
pub const MANAGED_TAG: &str = "automanaged";

/// BUILD file names, in lookup order.
pub const BUILD_FILE_NAMES: &[&str] = &["BUILD.bazel", "BUILD"];

/// Name given to new BUILD files.
pub const NEW_BUILD_FILE: &str = "BUILD";

/// The existing BUILD file of a directory.
pub fn find_build_file(dir: &Path) -> Option<PathBuf> {
    BUILD_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Ident(String),
    Number(String),
    List(ListExpr),
    Tuple(ListExpr),
    Dict(DictExpr),
    Call(Call),
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: String,
        operand: Box<Expr>,
    },
}

impl Expr {
    /// A string literal.
    pub fn string(value: impl Into<String>) -> Self {
        Expr::Str(value.into())
    }

    /// A list of string literals.
    pub fn string_list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expr::List(ListExpr::new(values.into_iter().map(|v| Expr::Str(v.into()))))
    }

    /// The value of a string literal.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The string literals of a list, skipping other elements.
    pub fn strings(&self) -> Vec<&str> {
        match self {
            Expr::List(list) => list
                .elements
                .iter()
                .filter_map(|e| e.value.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether any comment is attached inside this expression.
    pub fn has_comments(&self) -> bool {
        match self {
            Expr::List(list) | Expr::Tuple(list) => {
                !list.trailing_comments.is_empty()
                    || list.elements.iter().any(|e| e.has_comments())
            }
            Expr::Dict(dict) => {
                !dict.trailing_comments.is_empty()
                    || dict.entries.iter().any(|e| {
                        !e.comments.is_empty()
                            || e.suffix.is_some()
                            || e.key.has_comments()
                            || e.value.has_comments()
                    })
            }
            Expr::Call(call) => call.has_comments(),
            Expr::Binary { lhs, rhs, .. } => lhs.has_comments() || rhs.has_comments(),
            Expr::Unary { operand, .. } => operand.has_comments(),
            Expr::Str(_) | Expr::Ident(_) | Expr::Number(_) => false,
        }
    }

    /// A copy with every attached comment removed.
    pub fn without_comments(&self) -> Expr {
        match self {
            Expr::List(list) => Expr::List(list.without_comments()),
            Expr::Tuple(list) => Expr::Tuple(list.without_comments()),
            Expr::Dict(dict) => Expr::Dict(DictExpr {
                entries: dict
                    .entries
                    .iter()
                    .map(|e| DictEntry {
                        comments: Vec::new(),
                        key: e.key.without_comments(),
                        value: e.value.without_comments(),
                        suffix: None,
                    })
                    .collect(),
                trailing_comments: Vec::new(),
            }),
            Expr::Call(call) => Expr::Call(call.without_comments()),
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: op.clone(),
                lhs: Box::new(lhs.without_comments()),
                rhs: Box::new(rhs.without_comments()),
            },
            Expr::Unary { op, operand } => Expr::Unary {
                op: op.clone(),
                operand: Box::new(operand.without_comments()),
            },
            other => other.clone(),
        }
    }

    /// Equality that ignores comments.
    pub fn same_value(&self, other: &Expr) -> bool {
        self.without_comments() == other.without_comments()
    }
}

/// Elements of a list or tuple.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListExpr {
    pub elements: Vec<Element>,
    /// Comments between the last element and the closing bracket
    pub trailing_comments: Vec<String>,
}

impl ListExpr {
    pub fn new(values: impl IntoIterator<Item = Expr>) -> Self {
        ListExpr {
            elements: values.into_iter().map(Element::new).collect(),
            trailing_comments: Vec::new(),
        }
    }

    fn without_comments(&self) -> ListExpr {
        ListExpr::new(self.elements.iter().map(|e| e.value.without_comments()))
    }
}

/// One list or tuple element with its comments.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub comments: Vec<String>,
    pub value: Expr,
    pub suffix: Option<String>,
}

impl Element {
    pub fn new(value: Expr) -> Self {
        Element {
            comments: Vec::new(),
            value,
            suffix: None,
        }
    }

    fn has_comments(&self) -> bool {
        !self.comments.is_empty() || self.suffix.is_some() || self.value.has_comments()
    }
}

/// A dict literal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DictExpr {
    pub entries: Vec<DictEntry>,
    pub trailing_comments: Vec<String>,
}

/// One `key: value` entry of a dict.
#[derive(Debug, Clone, PartialEq)]
pub struct DictEntry {
    pub comments: Vec<String>,
    pub key: Expr,
    pub value: Expr,
    pub suffix: Option<String>,
}

/// A function call such as `go_library(...)` or `glob(...)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Call {
    pub func: String,
    pub args: Vec<Arg>,
    /// Comments between the last argument and the closing parenthesis
    pub trailing_comments: Vec<String>,
}

/// A positional or keyword argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub comments: Vec<String>,
    pub name: Option<String>,
    pub value: Expr,
    pub suffix: Option<String>,
}

impl Arg {
    pub fn positional(value: Expr) -> Self {
        Arg {
            comments: Vec::new(),
            name: None,
            value,
            suffix: None,
        }
    }

    pub fn keyword(name: impl Into<String>, value: Expr) -> Self {
        Arg {
            comments: Vec::new(),
            name: Some(name.into()),
            value,
            suffix: None,
        }
    }
}

impl Call {
    pub fn new(func: impl Into<String>) -> Self {
        Call {
            func: func.into(),
            args: Vec::new(),
            trailing_comments: Vec::new(),
        }
    }

    /// Append an argument, builder style.
    pub fn with_arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    /// The value of a keyword argument.
    pub fn attr(&self, name: &str) -> Option<&Expr> {
        self.args
            .iter()
            .find(|a| a.name.as_deref() == Some(name))
            .map(|a| &a.value)
    }

    /// String elements of a list-valued keyword argument.
    pub fn attr_strings(&self, name: &str) -> Vec<&str> {
        self.attr(name).map(Expr::strings).unwrap_or_default()
    }

    /// The `name` attribute of a rule call.
    pub fn name(&self) -> Option<&str> {
        self.attr("name").and_then(Expr::as_str)
    }

    /// Whether the rule carries the managed tag.
    pub fn is_managed(&self) -> bool {
        self.attr_strings("tags").contains(&MANAGED_TAG)
    }

    /// String literals passed positionally, in order.
    pub fn positional_strings(&self) -> Vec<&str> {
        self.args
            .iter()
            .filter(|a| a.name.is_none())
            .filter_map(|a| a.value.as_str())
            .collect()
    }

    /// Set a keyword argument. Returns whether the call changed.
    ///
    /// Comments attached to an existing argument are kept; replacing a value
    /// with an equal one (ignoring comments) is not a change.
    pub fn set_attr(&mut self, name: &str, value: Expr) -> bool {
        match self.args.iter_mut().find(|a| a.name.as_deref() == Some(name)) {
            Some(arg) if arg.value.same_value(&value) => false,
            Some(arg) => {
                arg.value = value;
                true
            }
            None => {
                self.args.push(Arg::keyword(name, value));
                true
            }
        }
    }

    /// Remove a keyword argument. Returns whether it was present.
    pub fn del_attr(&mut self, name: &str) -> bool {
        let before = self.args.len();
        self.args.retain(|a| a.name.as_deref() != Some(name));
        self.args.len() != before
    }

    fn has_comments(&self) -> bool {
        !self.trailing_comments.is_empty()
            || self.args.iter().any(|a| {
                !a.comments.is_empty() || a.suffix.is_some() || a.value.has_comments()
            })
    }

    fn without_comments(&self) -> Call {
        Call {
            func: self.func.clone(),
            args: self
                .args
                .iter()
                .map(|a| Arg {
                    comments: Vec::new(),
                    name: a.name.clone(),
                    value: a.value.without_comments(),
                    suffix: None,
                })
                .collect(),
            trailing_comments: Vec::new(),
        }
    }
}

/// The body of a top-level statement.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Call(Call),
    Assign { target: String, value: Expr },
    Expr(Expr),
}

/// A top-level statement with its leading comments.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// Comment lines above the statement; an empty string is a blank line
    pub comments: Vec<String>,
    pub kind: StmtKind,
    /// Comment on the statement's last line
    pub suffix: Option<String>,
    /// Original source text, dropped once the statement is modified
    raw: Option<String>,
}

impl Stmt {
    /// A new, canonically printed statement.
    pub fn new(kind: StmtKind) -> Self {
        Stmt {
            comments: Vec::new(),
            kind,
            suffix: None,
            raw: None,
        }
    }

    /// A new call statement.
    pub fn call(call: Call) -> Self {
        Stmt::new(StmtKind::Call(call))
    }

    pub(crate) fn parsed(
        comments: Vec<String>,
        kind: StmtKind,
        suffix: Option<String>,
        raw: String,
    ) -> Self {
        Stmt {
            comments,
            kind,
            suffix,
            raw: Some(raw),
        }
    }

    /// The call of a call statement.
    pub fn as_call(&self) -> Option<&Call> {
        match &self.kind {
            StmtKind::Call(call) => Some(call),
            _ => None,
        }
    }

    /// The rule name when this statement is a rule call.
    pub fn rule_name(&self) -> Option<&str> {
        self.as_call().and_then(Call::name)
    }

    /// Whether the statement still prints from its original text.
    pub fn is_verbatim(&self) -> bool {
        self.raw.is_some()
    }

    pub(crate) fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Edit the call of a call statement.
    ///
    /// The closure reports whether it changed anything; a change switches
    /// the statement to canonical printing.
    pub fn update_call(&mut self, edit: impl FnOnce(&mut Call) -> bool) -> bool {
        let StmtKind::Call(call) = &mut self.kind else {
            return false;
        };
        let changed = edit(call);
        if changed {
            self.raw = None;
        }
        changed
    }
}

/// A parsed BUILD file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct File {
    pub stmts: Vec<Stmt>,
    /// Comments after the last statement
    pub trailing_comments: Vec<String>,
}

impl File {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rule calls, i.e. calls with a string `name` attribute.
    pub fn rules(&self) -> impl Iterator<Item = (usize, &Call)> {
        self.stmts.iter().enumerate().filter_map(|(i, s)| {
            let call = s.as_call()?;
            call.name().map(|_| (i, call))
        })
    }

    /// Print the file.
    pub fn format(&self) -> String {
        format_file(self)
    }
}

//! Recursive-descent parser for BUILD files.
//!
//! Only the declarative subset of Starlark used in BUILD files is accepted:
//! calls, assignments, literals, and simple operators. `def`, `if`, `for`,
//! comprehensions and indexing are rejected.

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use super::lexer::{LexError, Lexer, Token, TokenKind};
use super::{Arg, Call, DictEntry, DictExpr, Element, Expr, File, ListExpr, Stmt, StmtKind};

/// A malformed BUILD file.
#[derive(Debug, Error, Diagnostic)]
#[error("{path}:{line}:{column}: {message}")]
#[diagnostic(code(kazel::build_file::parse))]
pub struct ParseError {
    pub path: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("here")]
    pub span: SourceSpan,
}

/// Parse BUILD file contents. `path` is only used in error messages.
pub fn parse(path: &str, source: &str) -> Result<File, ParseError> {
    let tokens = Lexer::new(source)
        .tokenize()
        .map_err(|e| lex_error(path, source, e))?;
    Parser {
        path,
        source,
        tokens,
        pos: 0,
    }
    .parse_file()
}

fn lex_error(path: &str, source: &str, e: LexError) -> ParseError {
    ParseError {
        path: path.to_string(),
        line: e.line,
        column: e.column,
        message: e.message,
        src: NamedSource::new(path, source.to_string()),
        span: (e.offset, 1).into(),
    }
}

/// Keywords that start statements we do not support.
const UNSUPPORTED_STATEMENTS: &[&str] = &["def", "if", "for", "while", "return", "lambda"];

struct Parser<'a> {
    path: &'a str,
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, ParseError>;

impl<'a> Parser<'a> {
    fn parse_file(mut self) -> PResult<File> {
        let mut file = File::new();
        let mut pending: Vec<String> = Vec::new();
        let mut last_line: Option<usize> = None;

        loop {
            let tok = self.peek().clone();
            match tok.kind {
                TokenKind::Eof => break,
                TokenKind::Semicolon => {
                    self.pos += 1;
                }
                TokenKind::Comment => {
                    if !pending.is_empty() && last_line.is_some_and(|l| tok.line > l + 1) {
                        pending.push(String::new());
                    }
                    pending.push(tok.text.trim_end().to_string());
                    last_line = Some(tok.end_line);
                    self.pos += 1;
                }
                _ => {
                    if !pending.is_empty() && last_line.is_some_and(|l| tok.line > l + 1) {
                        pending.push(String::new());
                    }
                    let kind = self.parse_stmt()?;
                    let last = self.previous();
                    let mut end = last.end;
                    let end_line = last.end_line;

                    let mut suffix = None;
                    let next = self.peek();
                    if next.kind == TokenKind::Comment && next.line == end_line {
                        suffix = Some(next.text.trim_end().to_string());
                        end = next.end;
                        self.pos += 1;
                    }

                    let raw = self.source[tok.start..end].to_string();
                    file.stmts.push(Stmt::parsed(
                        std::mem::take(&mut pending),
                        kind,
                        suffix,
                        raw,
                    ));
                    last_line = Some(end_line);
                }
            }
        }

        file.trailing_comments = pending;
        Ok(file)
    }

    fn parse_stmt(&mut self) -> PResult<StmtKind> {
        let tok = self.peek().clone();
        if tok.kind == TokenKind::Ident {
            if UNSUPPORTED_STATEMENTS.contains(&tok.text.as_str()) {
                return Err(self.error_at(&tok, format!("unsupported statement `{}`", tok.text)));
            }
            if self.peek_at(1).kind == TokenKind::Assign {
                self.pos += 2;
                self.skip_comments();
                let value = self.parse_expr()?;
                return Ok(StmtKind::Assign {
                    target: tok.text,
                    value,
                });
            }
        }

        match self.parse_expr()? {
            Expr::Call(call) => Ok(StmtKind::Call(call)),
            expr => Ok(StmtKind::Expr(expr)),
        }
    }

    fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.at_keyword("or") {
            self.pos += 1;
            self.skip_comments();
            let rhs = self.parse_and()?;
            lhs = binary("or", lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_not()?;
        while self.at_keyword("and") {
            self.pos += 1;
            self.skip_comments();
            let rhs = self.parse_not()?;
            lhs = binary("and", lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> PResult<Expr> {
        if self.at_keyword("not") {
            self.pos += 1;
            self.skip_comments();
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: "not".to_string(),
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        let lhs = self.parse_additive()?;
        let tok = self.peek();
        let is_comparison = (tok.kind == TokenKind::Operator
            && matches!(tok.text.as_str(), "==" | "!=" | "<" | ">" | "<=" | ">="))
            || (tok.kind == TokenKind::Ident && tok.text == "in");
        if !is_comparison {
            return Ok(lhs);
        }
        let op = tok.text.clone();
        self.pos += 1;
        self.skip_comments();
        let rhs = self.parse_additive()?;
        Ok(binary(&op, lhs, rhs))
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        while self.at_operator(&["+", "-", "|"]) {
            let op = self.advance().text;
            self.skip_comments();
            let rhs = self.parse_multiplicative()?;
            lhs = binary(&op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while self.at_operator(&["*", "/", "//", "%"]) {
            let op = self.advance().text;
            self.skip_comments();
            let rhs = self.parse_unary()?;
            lhs = binary(&op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        if self.at_operator(&["-", "+"]) {
            let op = self.advance().text;
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = self.advance();
        let expr = match tok.kind {
            TokenKind::Str => Expr::Str(tok.value),
            TokenKind::Number => Expr::Number(tok.text),
            TokenKind::Ident => {
                if tok.text == "lambda" {
                    return Err(self.error_at(&tok, "lambda expressions are not supported"));
                }
                let mut name = tok.text;
                while self.peek().kind == TokenKind::Dot {
                    self.pos += 1;
                    let part = self.expect(TokenKind::Ident, "expected identifier after '.'")?;
                    name.push('.');
                    name.push_str(&part.text);
                }
                if self.peek().kind == TokenKind::LeftParen {
                    self.pos += 1;
                    Expr::Call(self.parse_call_rest(name)?)
                } else {
                    Expr::Ident(name)
                }
            }
            TokenKind::LeftBracket => {
                let (elements, trailing_comments, _) =
                    self.parse_delimited(TokenKind::RightBracket, Self::parse_element)?;
                Expr::List(ListExpr {
                    elements,
                    trailing_comments,
                })
            }
            TokenKind::LeftBrace => {
                let (entries, trailing_comments, _) =
                    self.parse_delimited(TokenKind::RightBrace, Self::parse_dict_entry)?;
                Expr::Dict(DictExpr {
                    entries,
                    trailing_comments,
                })
            }
            TokenKind::LeftParen => {
                let (mut elements, trailing_comments, trailing_comma) =
                    self.parse_delimited(TokenKind::RightParen, Self::parse_element)?;
                if elements.len() == 1 && !trailing_comma && !elements[0].has_comments() {
                    elements.remove(0).value
                } else {
                    Expr::Tuple(ListExpr {
                        elements,
                        trailing_comments,
                    })
                }
            }
            TokenKind::Eof => return Err(self.error_at(&tok, "unexpected end of file")),
            _ => return Err(self.error_at(&tok, format!("unexpected `{}`", tok.text))),
        };

        match self.peek().kind {
            TokenKind::LeftBracket => {
                let tok = self.peek().clone();
                Err(self.error_at(&tok, "indexing is not supported"))
            }
            TokenKind::Dot => {
                let tok = self.peek().clone();
                Err(self.error_at(&tok, "method calls are not supported"))
            }
            _ => Ok(expr),
        }
    }

    /// Parse call arguments after the opening parenthesis.
    fn parse_call_rest(&mut self, func: String) -> PResult<Call> {
        let (args, trailing_comments, _) =
            self.parse_delimited(TokenKind::RightParen, Self::parse_arg)?;
        Ok(Call {
            func,
            args,
            trailing_comments,
        })
    }

    fn parse_arg(&mut self, comments: Vec<String>) -> PResult<Arg> {
        let mut name = None;
        if self.peek().kind == TokenKind::Ident && self.peek_at(1).kind == TokenKind::Assign {
            name = Some(self.advance().text);
            self.pos += 1;
            self.skip_comments();
        }
        let value = self.parse_expr()?;
        Ok(Arg {
            comments,
            name,
            value,
            suffix: None,
        })
    }

    fn parse_element(&mut self, comments: Vec<String>) -> PResult<Element> {
        let value = self.parse_expr()?;
        if self.at_keyword("for") {
            let tok = self.peek().clone();
            return Err(self.error_at(&tok, "comprehensions are not supported"));
        }
        Ok(Element {
            comments,
            value,
            suffix: None,
        })
    }

    fn parse_dict_entry(&mut self, comments: Vec<String>) -> PResult<DictEntry> {
        let key = self.parse_expr()?;
        self.skip_comments();
        self.expect(TokenKind::Colon, "expected ':' in dict entry")?;
        self.skip_comments();
        let value = self.parse_expr()?;
        Ok(DictEntry {
            comments,
            key,
            value,
            suffix: None,
        })
    }

    /// Parse a comma-separated sequence up to `close`, attaching comments.
    ///
    /// Own-line comments go to the following item, a comment on the same
    /// line as the end of an item becomes its suffix, and comments before
    /// the closing bracket are returned separately. Also reports whether the
    /// sequence ended with a comma.
    fn parse_delimited<T: Suffixed>(
        &mut self,
        close: TokenKind,
        mut item: impl FnMut(&mut Self, Vec<String>) -> PResult<T>,
    ) -> PResult<(Vec<T>, Vec<String>, bool)> {
        let mut items: Vec<T> = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        let mut trailing_comma = false;

        loop {
            let tok = self.peek().clone();
            match tok.kind {
                TokenKind::Comment => {
                    let same_line = self.previous().end_line == tok.line;
                    match items.last_mut() {
                        Some(last) if same_line && pending.is_empty() && !last.has_suffix() => {
                            last.set_suffix(tok.text.trim_end().to_string());
                        }
                        _ => pending.push(tok.text.trim_end().to_string()),
                    }
                    self.pos += 1;
                }
                kind if kind == close => {
                    self.pos += 1;
                    return Ok((items, pending, trailing_comma));
                }
                TokenKind::Eof => {
                    return Err(self.error_at(&tok, "unexpected end of file, unclosed bracket"));
                }
                _ => {
                    if !items.is_empty() && !trailing_comma {
                        return Err(self.error_at(&tok, format!("expected ',' before `{}`", tok.text)));
                    }
                    let value = item(self, std::mem::take(&mut pending))?;
                    items.push(value);
                    trailing_comma = false;

                    // Comments may sit between the item and its comma.
                    while self.peek().kind == TokenKind::Comment
                        && self.peek_at(1).kind == TokenKind::Comma
                    {
                        let comment = self.advance();
                        if let Some(last) = items.last_mut() {
                            if !last.has_suffix() {
                                last.set_suffix(comment.text.trim_end().to_string());
                            }
                        }
                    }
                    if self.peek().kind == TokenKind::Comma {
                        self.pos += 1;
                        trailing_comma = true;
                    }
                }
            }
        }
    }

    fn skip_comments(&mut self) {
        while self.peek().kind == TokenKind::Comment {
            self.pos += 1;
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        let tok = self.peek();
        tok.kind == TokenKind::Ident && tok.text == keyword
    }

    fn at_operator(&self, ops: &[&str]) -> bool {
        let tok = self.peek();
        tok.kind == TokenKind::Operator && ops.contains(&tok.text.as_str())
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> PResult<Token> {
        let tok = self.peek().clone();
        if tok.kind != kind {
            return Err(self.error_at(&tok, message));
        }
        self.pos += 1;
        Ok(tok)
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn error_at(&self, tok: &Token, message: impl Into<String>) -> ParseError {
        ParseError {
            path: self.path.to_string(),
            line: tok.line,
            column: tok.column,
            message: message.into(),
            src: NamedSource::new(self.path, self.source.to_string()),
            span: (tok.start, (tok.end - tok.start).max(1)).into(),
        }
    }
}

fn binary(op: &str, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op: op.to_string(),
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

/// Sequence items that can carry a same-line comment.
trait Suffixed {
    fn has_suffix(&self) -> bool;
    fn set_suffix(&mut self, comment: String);
}

impl Suffixed for Arg {
    fn has_suffix(&self) -> bool {
        self.suffix.is_some()
    }
    fn set_suffix(&mut self, comment: String) {
        self.suffix = Some(comment);
    }
}

impl Suffixed for Element {
    fn has_suffix(&self) -> bool {
        self.suffix.is_some()
    }
    fn set_suffix(&mut self, comment: String) {
        self.suffix = Some(comment);
    }
}

impl Suffixed for DictEntry {
    fn has_suffix(&self) -> bool {
        self.suffix.is_some()
    }
    fn set_suffix(&mut self, comment: String) {
        self.suffix = Some(comment);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"# Copyright header

package(default_visibility = ["//visibility:public"])

load("@io_bazel_rules_go//go:def.bzl", "go_library")

go_library(
    name = "go_default_library",
    srcs = [
        "a.go",  # generated
        "b.go",
    ],
    tags = ["automanaged"],
)

VERSION = "1.0"  # bumped by release tooling
"#;

    #[test]
    fn test_parse_statements() {
        let file = parse("BUILD", SAMPLE).unwrap();
        assert_eq!(file.stmts.len(), 4);
        assert_eq!(file.stmts[0].comments, vec!["# Copyright header", ""]);
        assert_eq!(file.stmts[1].as_call().unwrap().func, "load");

        let rule = file.stmts[2].as_call().unwrap();
        assert_eq!(rule.name(), Some("go_default_library"));
        assert_eq!(rule.attr_strings("srcs"), vec!["a.go", "b.go"]);
        assert!(rule.is_managed());

        match &file.stmts[3].kind {
            StmtKind::Assign { target, value } => {
                assert_eq!(target, "VERSION");
                assert_eq!(value.as_str(), Some("1.0"));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
        assert_eq!(
            file.stmts[3].suffix.as_deref(),
            Some("# bumped by release tooling")
        );
    }

    #[test]
    fn test_list_suffix_comment() {
        let file = parse("BUILD", SAMPLE).unwrap();
        let rule = file.stmts[2].as_call().unwrap();
        let Some(Expr::List(srcs)) = rule.attr("srcs") else {
            panic!("srcs should be a list");
        };
        assert_eq!(srcs.elements[0].suffix.as_deref(), Some("# generated"));
        assert_eq!(srcs.elements[1].suffix, None);
    }

    #[test]
    fn test_raw_text_is_statement_source() {
        let file = parse("BUILD", SAMPLE).unwrap();
        assert_eq!(
            file.stmts[0].raw(),
            Some(r#"package(default_visibility = ["//visibility:public"])"#)
        );
        assert_eq!(
            file.stmts[3].raw(),
            Some(r#"VERSION = "1.0"  # bumped by release tooling"#)
        );
    }

    #[test]
    fn test_parse_glob_and_operators() {
        let file = parse(
            "BUILD",
            r#"filegroup(name = "x", srcs = glob(["**"], exclude = ["bazel-*/**"]) + ["extra"])"#,
        )
        .unwrap();
        let call = file.stmts[0].as_call().unwrap();
        match call.attr("srcs") {
            Some(Expr::Binary { op, lhs, .. }) => {
                assert_eq!(op, "+");
                assert!(matches!(lhs.as_ref(), Expr::Call(c) if c.func == "glob"));
            }
            other => panic!("unexpected srcs: {:?}", other),
        }
    }

    #[test]
    fn test_trailing_comments() {
        let file = parse("BUILD", "foo()\n\n# the end\n").unwrap();
        assert_eq!(file.stmts.len(), 1);
        assert_eq!(file.trailing_comments, vec!["# the end"]);
    }

    #[test]
    fn test_missing_comma_is_error() {
        let err = parse("pkg/BUILD", "foo(\n    a = 1\n    b = 2,\n)\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(err.to_string().starts_with("pkg/BUILD:3:5:"));
    }

    #[test]
    fn test_def_is_rejected() {
        let err = parse("BUILD", "def foo():\n    pass\n").unwrap_err();
        assert!(err.message.contains("unsupported statement"));
    }

    #[test]
    fn test_unclosed_call_is_error() {
        let err = parse("BUILD", "go_library(\n    name = \"x\",\n").unwrap_err();
        assert!(err.message.contains("unclosed"));
    }
}

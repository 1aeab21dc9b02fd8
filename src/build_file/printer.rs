//! Canonical BUILD file printer.

use super::{Arg, Call, DictExpr, Expr, File, ListExpr, StmtKind};

const INDENT: usize = 4;

/// Print a file.
///
/// Statements are separated by one blank line and the output ends with a
/// single newline. Statements that still carry their source text are copied
/// verbatim.
pub fn format_file(file: &File) -> String {
    let mut blocks = Vec::with_capacity(file.stmts.len() + 1);

    for stmt in &file.stmts {
        let mut block = String::new();
        for comment in skip_leading_blanks(&stmt.comments) {
            block.push_str(comment);
            block.push('\n');
        }
        match stmt.raw() {
            Some(raw) => block.push_str(raw),
            None => {
                block.push_str(&format_stmt(&stmt.kind));
                if let Some(suffix) = &stmt.suffix {
                    block.push_str("  ");
                    block.push_str(suffix);
                }
            }
        }
        blocks.push(block);
    }

    let trailing = skip_leading_blanks(&file.trailing_comments);
    if !trailing.is_empty() {
        blocks.push(trailing.join("\n"));
    }

    if blocks.is_empty() {
        return String::new();
    }
    let mut out = blocks.join("\n\n");
    out.push('\n');
    out
}

fn skip_leading_blanks(comments: &[String]) -> &[String] {
    let start = comments
        .iter()
        .position(|c| !c.is_empty())
        .unwrap_or(comments.len());
    &comments[start..]
}

fn format_stmt(kind: &StmtKind) -> String {
    match kind {
        StmtKind::Call(call) => format_call(call, 0),
        StmtKind::Assign { target, value } => format!("{} = {}", target, format_expr(value, 0)),
        StmtKind::Expr(expr) => format_expr(expr, 0),
    }
}

/// Print an expression that starts on a line indented by `indent` spaces.
pub fn format_expr(expr: &Expr, indent: usize) -> String {
    match expr {
        Expr::Str(s) => quote(s),
        Expr::Ident(s) | Expr::Number(s) => s.clone(),
        Expr::List(list) => format_list(list, indent, false),
        Expr::Tuple(list) => format_list(list, indent, true),
        Expr::Dict(dict) => format_dict(dict, indent),
        Expr::Call(call) => format_call(call, indent),
        Expr::Binary { op, lhs, rhs } => {
            let prec = precedence(op);
            format!(
                "{} {} {}",
                format_operand(lhs, prec, false, indent),
                op,
                format_operand(rhs, prec, true, indent)
            )
        }
        Expr::Unary { op, operand } => {
            let inner = format_operand(operand, UNARY_PRECEDENCE, false, indent);
            if op == "not" {
                format!("not {}", inner)
            } else {
                format!("{}{}", op, inner)
            }
        }
    }
}

const UNARY_PRECEDENCE: u8 = 6;

fn precedence(op: &str) -> u8 {
    match op {
        "or" => 1,
        "and" => 2,
        "==" | "!=" | "<" | ">" | "<=" | ">=" | "in" => 3,
        "+" | "-" | "|" => 4,
        _ => 5,
    }
}

fn format_operand(expr: &Expr, parent: u8, right: bool, indent: usize) -> String {
    let text = format_expr(expr, indent);
    let needs_parens = match expr {
        Expr::Binary { op, .. } => {
            let prec = precedence(op);
            prec < parent || (right && prec == parent)
        }
        _ => false,
    };
    if needs_parens {
        format!("({})", text)
    } else {
        text
    }
}

fn format_list(list: &ListExpr, indent: usize, tuple: bool) -> String {
    let (open, close) = if tuple { ("(", ")") } else { ("[", "]") };
    let commented = !list.trailing_comments.is_empty() || list.elements.iter().any(|e| e.has_comments());

    if !commented && (tuple || list.elements.len() <= 1) {
        let items: Vec<String> = list
            .elements
            .iter()
            .map(|e| format_expr(&e.value, indent))
            .collect();
        let trailer = if tuple && items.len() == 1 { "," } else { "" };
        return format!("{}{}{}{}", open, items.join(", "), trailer, close);
    }

    let inner = indent + INDENT;
    let mut out = String::from(open);
    out.push('\n');
    for element in &list.elements {
        push_comments(&mut out, &element.comments, inner);
        push_line(
            &mut out,
            inner,
            &format_expr(&element.value, inner),
            element.suffix.as_deref(),
        );
    }
    push_comments(&mut out, &list.trailing_comments, inner);
    pad(&mut out, indent);
    out.push_str(close);
    out
}

fn format_dict(dict: &DictExpr, indent: usize) -> String {
    if dict.entries.is_empty() && dict.trailing_comments.is_empty() {
        return "{}".to_string();
    }

    let inner = indent + INDENT;
    let mut out = String::from("{\n");
    for entry in &dict.entries {
        push_comments(&mut out, &entry.comments, inner);
        let line = format!(
            "{}: {}",
            format_expr(&entry.key, inner),
            format_expr(&entry.value, inner)
        );
        push_line(&mut out, inner, &line, entry.suffix.as_deref());
    }
    push_comments(&mut out, &dict.trailing_comments, inner);
    pad(&mut out, indent);
    out.push('}');
    out
}

fn format_call(call: &Call, indent: usize) -> String {
    if call.args.is_empty() && call.trailing_comments.is_empty() {
        return format!("{}()", call.func);
    }

    if is_compact(call) {
        let args: Vec<String> = call.args.iter().map(|a| format_arg(a, indent)).collect();
        return format!("{}({})", call.func, args.join(", "));
    }

    let mut args: Vec<&Arg> = call.args.iter().collect();
    if call.attr("name").is_some() {
        args.sort_by_key(|a| keyword_rank(a.name.as_deref()));
    }

    let inner = indent + INDENT;
    let mut out = format!("{}(\n", call.func);
    for arg in args {
        push_comments(&mut out, &arg.comments, inner);
        push_line(&mut out, inner, &format_arg(arg, inner), arg.suffix.as_deref());
    }
    push_comments(&mut out, &call.trailing_comments, inner);
    pad(&mut out, indent);
    out.push(')');
    out
}

/// `load`, and calls with at most one short argument and no `name`.
fn is_compact(call: &Call) -> bool {
    if call.has_comments() {
        return false;
    }
    if call.func == "load" {
        return true;
    }
    call.attr("name").is_none() && call.args.len() <= 1 && call.args.iter().all(|a| is_short(&a.value))
}

fn is_short(expr: &Expr) -> bool {
    match expr {
        Expr::Str(_) | Expr::Ident(_) | Expr::Number(_) => true,
        Expr::List(list) => list.elements.len() <= 1 && list.elements.iter().all(|e| is_short(&e.value)),
        Expr::Unary { operand, .. } => is_short(operand),
        _ => false,
    }
}

/// Sort key for rule keywords: positional, `name`, `srcs`, then alphabetical.
fn keyword_rank(name: Option<&str>) -> (u8, String) {
    match name {
        None => (0, String::new()),
        Some("name") => (1, String::new()),
        Some("srcs") => (2, String::new()),
        Some(other) => (3, other.to_string()),
    }
}

fn format_arg(arg: &Arg, indent: usize) -> String {
    let value = format_expr(&arg.value, indent);
    match &arg.name {
        Some(name) => format!("{} = {}", name, value),
        None => value,
    }
}

fn push_comments(out: &mut String, comments: &[String], indent: usize) {
    for comment in comments {
        if comment.is_empty() {
            out.push('\n');
            continue;
        }
        pad(out, indent);
        out.push_str(comment);
        out.push('\n');
    }
}

fn push_line(out: &mut String, indent: usize, text: &str, suffix: Option<&str>) {
    pad(out, indent);
    out.push_str(text);
    out.push(',');
    if let Some(suffix) = suffix {
        out.push_str("  ");
        out.push_str(suffix);
    }
    out.push('\n');
}

fn pad(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat(' ').take(indent));
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

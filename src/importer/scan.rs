//! Go source header scanning.
//!
//! Only the package clause and the import declarations are read, plus the
//! leading `//` comments that may carry build constraints.

/// What the header of a Go file declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoHeader {
    /// Package name from the package clause
    pub package: String,
    /// Imported paths in declaration order
    pub imports: Vec<String>,
    /// Build constraint candidates, see [`constraint_comments`]
    pub constraint_comments: Vec<String>,
}

impl GoHeader {
    /// Whether the file imports the cgo pseudo-package.
    pub fn imports_c(&self) -> bool {
        self.imports.iter().any(|i| i == "C")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Str(String),
    Punct(char),
    Eof,
}

struct Scanner<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        let src = src.strip_prefix('\u{feff}').unwrap_or(src);
        Scanner {
            chars: src.char_indices().peekable(),
        }
    }

    fn next_tok(&mut self) -> Result<Tok, String> {
        loop {
            let Some((_, c)) = self.chars.next() else {
                return Ok(Tok::Eof);
            };
            match c {
                c if c.is_whitespace() => continue,
                '/' if self.peek() == Some('/') => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.chars.next();
                    }
                }
                '/' if self.peek() == Some('*') => {
                    self.chars.next();
                    let mut prev = '\0';
                    loop {
                        let Some((_, c)) = self.chars.next() else {
                            return Err("unterminated block comment".to_string());
                        };
                        if prev == '*' && c == '/' {
                            break;
                        }
                        prev = c;
                    }
                }
                '"' => return self.interpreted_string().map(Tok::Str),
                '`' => {
                    let mut value = String::new();
                    loop {
                        match self.chars.next() {
                            Some((_, '`')) => break,
                            Some((_, c)) => value.push(c),
                            None => return Err("unterminated raw string".to_string()),
                        }
                    }
                    return Ok(Tok::Str(value));
                }
                c if c == '_' || c.is_alphabetic() => {
                    let mut ident = String::from(c);
                    while let Some(c) = self.peek() {
                        if c == '_' || c.is_alphanumeric() {
                            ident.push(c);
                            self.chars.next();
                        } else {
                            break;
                        }
                    }
                    return Ok(Tok::Ident(ident));
                }
                c => return Ok(Tok::Punct(c)),
            }
        }
    }

    fn interpreted_string(&mut self) -> Result<String, String> {
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some((_, '"')) => return Ok(value),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, c)) => value.push(c),
                    None => break,
                },
                Some((_, '\n')) | None => break,
                Some((_, c)) => value.push(c),
            }
        }
        Err("unterminated string literal".to_string())
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }
}

/// Scan the header of a Go source file.
pub fn scan_header(src: &str) -> Result<GoHeader, String> {
    let mut scanner = Scanner::new(src);

    match scanner.next_tok()? {
        Tok::Ident(kw) if kw == "package" => {}
        _ => return Err("expected 'package' clause".to_string()),
    }

    let package = match scanner.next_tok()? {
        Tok::Ident(name) => name,
        _ => return Err("expected package name".to_string()),
    };

    let mut header = GoHeader {
        package,
        imports: Vec::new(),
        constraint_comments: constraint_comments(src),
    };

    let mut tok = scanner.next_tok()?;
    loop {
        match tok {
            Tok::Punct(';') => {}
            Tok::Ident(ref kw) if kw == "import" => match scanner.next_tok()? {
                Tok::Punct('(') => loop {
                    match scanner.next_tok()? {
                        Tok::Punct(')') => break,
                        Tok::Punct(';') => {}
                        first => header.imports.push(import_spec(&mut scanner, first)?),
                    }
                },
                first => header.imports.push(import_spec(&mut scanner, first)?),
            },
            _ => break,
        }
        tok = scanner.next_tok()?;
    }

    Ok(header)
}

/// The `//` lines at the top of a source file that may hold build
/// constraints.
///
/// Only the leading run of blank lines and line comments is considered,
/// and only up to its last blank line: a comment block directly above the
/// package clause is documentation.
pub fn constraint_comments(src: &str) -> Vec<String> {
    let src = src.strip_prefix('\u{feff}').unwrap_or(src);
    let mut comments = Vec::new();
    let mut end = 0;
    for line in src.lines().map(str::trim) {
        if line.is_empty() {
            end = comments.len();
        } else if line.starts_with("//") {
            comments.push(line.to_string());
        } else {
            break;
        }
    }
    comments.truncate(end);
    comments
}

/// Parse `[name | . | _] "path"` given its first token.
fn import_spec(scanner: &mut Scanner<'_>, first: Tok) -> Result<String, String> {
    let tok = match first {
        Tok::Ident(_) | Tok::Punct('.') => scanner.next_tok()?,
        other => other,
    };
    match tok {
        Tok::Str(path) => Ok(path),
        _ => Err("expected import path".to_string()),
    }
}

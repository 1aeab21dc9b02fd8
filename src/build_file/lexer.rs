//! Tokenizer for BUILD files.
//!
//! Comments are kept as tokens so the parser can attach them to the
//! statement, argument or list element they describe. Every token records
//! byte offsets into the source so untouched statements can be copied back
//! verbatim.

/// Classification of BUILD file tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Str,
    Number,
    Comment,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Colon,
    Dot,
    Semicolon,
    /// `=`
    Assign,
    /// Binary and comparison operators (`+`, `==`, `//`, ...)
    Operator,
    Eof,
}

/// A lexed token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token
    pub text: String,
    /// Decoded value for string literals, otherwise equal to `text`
    pub value: String,
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Line of the first character (1-indexed)
    pub line: usize,
    /// Line of the last character
    pub end_line: usize,
    /// Column of the first character (1-indexed)
    pub column: usize,
}

/// A tokenization failure at a byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

/// Tokenizer state.
pub struct Lexer<'a> {
    source: &'a str,
    /// Characters with their byte offsets
    chars: Vec<(usize, char)>,
    current: usize,
    line: usize,
    column: usize,
    start: usize,
    start_line: usize,
    start_column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            chars: source.char_indices().collect(),
            current: 0,
            line: 1,
            column: 1,
            start: 0,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Tokenize the whole source. The last token is always `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace()?;

        self.start = self.current;
        self.start_line = self.line;
        self.start_column = self.column;

        let Some(c) = self.advance() else {
            return Ok(self.make_token(TokenKind::Eof));
        };

        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semicolon,
            '#' => {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
                TokenKind::Comment
            }
            '=' => {
                if self.match_char('=') {
                    TokenKind::Operator
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.match_char('=') {
                    TokenKind::Operator
                } else {
                    return Err(self.error("unexpected character '!'"));
                }
            }
            '<' | '>' => {
                self.match_char('=');
                TokenKind::Operator
            }
            '/' => {
                self.match_char('/');
                TokenKind::Operator
            }
            '+' | '-' | '*' | '%' | '|' => TokenKind::Operator,
            '"' | '\'' => return self.string(c, false),
            'r' | 'R' if matches!(self.peek(), Some('"') | Some('\'')) => {
                let quote = self.advance().unwrap_or('"');
                return self.string(quote, true);
            }
            c if c.is_ascii_digit() => {
                while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '.') {
                    self.advance();
                }
                TokenKind::Number
            }
            c if c == '_' || c.is_alphabetic() => {
                while matches!(self.peek(), Some(c) if c == '_' || c.is_alphanumeric()) {
                    self.advance();
                }
                TokenKind::Ident
            }
            other => return Err(self.error(format!("unexpected character '{}'", other))),
        };

        Ok(self.make_token(kind))
    }

    /// Lex a string literal whose opening quote has been consumed.
    fn string(&mut self, quote: char, raw: bool) -> Result<Token, LexError> {
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.advance() else {
                return Err(self.error("unterminated string literal"));
            };

            if c == quote {
                if !triple {
                    break;
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.advance();
                    self.advance();
                    break;
                }
                value.push(c);
                continue;
            }

            if c == '\n' && !triple {
                return Err(self.error("unterminated string literal"));
            }

            if c != '\\' {
                value.push(c);
                continue;
            }

            let Some(escaped) = self.advance() else {
                return Err(self.error("unterminated string literal"));
            };
            if raw {
                value.push('\\');
                value.push(escaped);
                continue;
            }
            match escaped {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                '\n' => {}
                '\\' | '\'' | '"' => value.push(escaped),
                other => {
                    value.push('\\');
                    value.push(other);
                }
            }
        }

        let mut token = self.make_token(TokenKind::Str);
        token.value = value;
        Ok(token)
    }

    fn skip_whitespace(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        let start = self.byte_offset(self.start);
        let end = self.byte_offset(self.current);
        let text = self.source[start..end].to_string();
        // Tokens never end on a newline, so the current line is the last one.
        Token {
            kind,
            value: text.clone(),
            text,
            start,
            end,
            line: self.start_line,
            end_line: self.line,
            column: self.start_column,
        }
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            offset: self.byte_offset(self.start),
            line: self.start_line,
            column: self.start_column,
        }
    }

    fn byte_offset(&self, index: usize) -> usize {
        self.chars
            .get(index)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.source.len())
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.current + n).map(|(_, c)| *c)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = *self.chars.get(self.current)?;
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_call_tokens() {
        assert_eq!(
            kinds(r#"go_library(name = "x", srcs = ["a.go"])"#),
            vec![
                TokenKind::Ident,
                TokenKind::LeftParen,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::Str,
                TokenKind::Comma,
                TokenKind::Ident,
                TokenKind::Assign,
                TokenKind::LeftBracket,
                TokenKind::Str,
                TokenKind::RightBracket,
                TokenKind::RightParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comment_positions() {
        let tokens = Lexer::new("# header\n\nfoo()  # trailing\n").tokenize().unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[0].text, "# header");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 3);
        assert_eq!(tokens[4].kind, TokenKind::Comment);
        assert_eq!(tokens[4].line, 3);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = Lexer::new(r#"'it\'s' "a\"b" r"\d""#).tokenize().unwrap();
        assert_eq!(tokens[0].value, "it's");
        assert_eq!(tokens[1].value, "a\"b");
        assert_eq!(tokens[2].value, "\\d");
    }

    #[test]
    fn test_triple_quoted_string_spans_lines() {
        let tokens = Lexer::new("x = \"\"\"a\nb\"\"\"\ny").tokenize().unwrap();
        assert_eq!(tokens[2].value, "a\nb");
        assert_eq!(tokens[2].line, 1);
        assert_eq!(tokens[2].end_line, 2);
        assert_eq!(tokens[3].line, 3);
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a == b // c"),
            vec![
                TokenKind::Ident,
                TokenKind::Operator,
                TokenKind::Ident,
                TokenKind::Operator,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("foo(\"abc\n)").tokenize().unwrap_err();
        assert_eq!(err.line, 1);
        assert!(err.message.contains("unterminated"));
    }
}

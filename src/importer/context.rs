//! Build context: which files take part in a build.
//!
//! Files are selected by their name (`_GOOS`, `_GOARCH`, `_GOOS_GOARCH`
//! suffixes) and by build constraints in their leading comments. A
//! `//go:build` line takes precedence over legacy `// +build` lines.

use crate::util::Config;

/// Operating systems recognised in file name suffixes.
const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js",
    "linux", "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

/// Architectures recognised in file name suffixes.
const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips",
    "mipsle", "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le",
    "riscv", "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

/// Operating systems that satisfy the `unix` tag.
const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Newest `go1.N` release tag considered satisfied.
const LATEST_GO_MINOR: u32 = 22;

/// Target platform and tags used to evaluate build constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub goos: String,
    pub goarch: String,
    pub cgo_enabled: bool,
    /// Extra satisfied tags
    pub build_tags: Vec<String>,
}

impl Default for BuildContext {
    fn default() -> Self {
        BuildContext {
            goos: "linux".to_string(),
            goarch: "amd64".to_string(),
            cgo_enabled: true,
            build_tags: Vec::new(),
        }
    }
}

impl BuildContext {
    pub fn from_config(config: &Config) -> Self {
        BuildContext {
            goos: config.goos.clone(),
            goarch: config.goarch.clone(),
            cgo_enabled: config.cgo_enabled,
            build_tags: config.build_tags.clone(),
        }
    }

    /// Whether a single tag is satisfied.
    pub fn matches_tag(&self, tag: &str) -> bool {
        if tag == self.goos || tag == self.goarch || tag == "gc" {
            return true;
        }
        match tag {
            "unix" => return UNIX_OS.contains(&self.goos.as_str()),
            "cgo" => return self.cgo_enabled,
            "linux" if self.goos == "android" => return true,
            "solaris" if self.goos == "illumos" => return true,
            "darwin" if self.goos == "ios" => return true,
            _ => {}
        }
        if let Some(minor) = tag.strip_prefix("go1.") {
            if let Ok(minor) = minor.parse::<u32>() {
                return (1..=LATEST_GO_MINOR).contains(&minor);
            }
        }
        self.build_tags.iter().any(|t| t == tag)
    }

    /// Whether a file name's OS/arch suffix matches the context.
    ///
    /// Everything up to the first `_` is the file's own name and never
    /// counts as a constraint, so `linux.go` applies everywhere.
    pub fn matches_file_name(&self, name: &str) -> bool {
        let stem = match name.rfind('.') {
            Some(i) => &name[..i],
            None => name,
        };
        let Some(i) = stem.find('_') else {
            return true;
        };
        let stem = &stem[i..];
        let stem = stem.strip_suffix("_test").unwrap_or(stem);

        let parts: Vec<&str> = stem.split('_').collect();
        let n = parts.len();
        if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
            return self.matches_tag(parts[n - 2]) && self.matches_tag(parts[n - 1]);
        }
        let last = parts[n - 1];
        if KNOWN_OS.contains(&last) || KNOWN_ARCH.contains(&last) {
            return self.matches_tag(last);
        }
        true
    }

    /// Whether the constraint comments of a file are satisfied.
    ///
    /// Malformed expressions are never satisfied.
    pub fn matches_constraints(&self, comments: &[String]) -> bool {
        let go_build = comments.iter().find_map(|c| {
            let rest = c.strip_prefix("//go:build")?;
            (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(rest)
        });
        if let Some(expr) = go_build {
            return match ExprParser::new(expr).parse(&|tag| self.matches_tag(tag)) {
                Ok(value) => value,
                Err(message) => {
                    tracing::debug!("invalid //go:build line `{}`: {}", expr.trim(), message);
                    false
                }
            };
        }

        comments
            .iter()
            .filter_map(|c| {
                let rest = c.strip_prefix("//")?.trim_start();
                let rest = rest.strip_prefix("+build")?;
                (rest.is_empty() || rest.starts_with(char::is_whitespace)).then_some(rest)
            })
            .all(|line| self.matches_plus_build(line))
    }

    /// `// +build` line: space-separated options OR-ed, comma-separated
    /// terms AND-ed.
    fn matches_plus_build(&self, line: &str) -> bool {
        line.split_whitespace().any(|option| {
            option.split(',').all(|term| match term.strip_prefix('!') {
                Some(tag) => !tag.is_empty() && !self.matches_tag(tag),
                None => !term.is_empty() && self.matches_tag(term),
            })
        })
    }
}

/// Recursive-descent evaluator for `//go:build` expressions.
struct ExprParser<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn new(expr: &'a str) -> Self {
        let mut tokens = Vec::new();
        let bytes = expr.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i];
            if c.is_ascii_whitespace() {
                i += 1;
            } else if expr[i..].starts_with("&&") || expr[i..].starts_with("||") {
                tokens.push(&expr[i..i + 2]);
                i += 2;
            } else if matches!(c, b'!' | b'(' | b')') {
                tokens.push(&expr[i..i + 1]);
                i += 1;
            } else {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.')
                {
                    i += 1;
                }
                if i == start {
                    // Unknown character; keep it so parsing fails on it.
                    i += expr[i..].chars().next().map_or(1, char::len_utf8);
                }
                tokens.push(&expr[start..i]);
            }
        }
        ExprParser { tokens, pos: 0 }
    }

    fn parse(mut self, tag: &dyn Fn(&str) -> bool) -> Result<bool, String> {
        let value = self.or(tag)?;
        match self.tokens.get(self.pos) {
            None => Ok(value),
            Some(tok) => Err(format!("unexpected `{}`", tok)),
        }
    }

    fn or(&mut self, tag: &dyn Fn(&str) -> bool) -> Result<bool, String> {
        let mut value = self.and(tag)?;
        while self.eat("||") {
            let rhs = self.and(tag)?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn and(&mut self, tag: &dyn Fn(&str) -> bool) -> Result<bool, String> {
        let mut value = self.not(tag)?;
        while self.eat("&&") {
            let rhs = self.not(tag)?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn not(&mut self, tag: &dyn Fn(&str) -> bool) -> Result<bool, String> {
        if self.eat("!") {
            return Ok(!self.not(tag)?);
        }
        self.atom(tag)
    }

    fn atom(&mut self, tag: &dyn Fn(&str) -> bool) -> Result<bool, String> {
        if self.eat("(") {
            let value = self.or(tag)?;
            if !self.eat(")") {
                return Err("missing `)`".to_string());
            }
            return Ok(value);
        }
        match self.tokens.get(self.pos) {
            Some(tok) if tok.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.') => {
                self.pos += 1;
                Ok(tag(tok))
            }
            Some(tok) => Err(format!("unexpected `{}`", tok)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn eat(&mut self, tok: &str) -> bool {
        if self.tokens.get(self.pos) == Some(&tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
}

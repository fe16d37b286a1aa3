// rcp-common/src/parse/formula.rs
//! Reader for the subset of the Homebrew formula DSL that describes a recipe:
//! metadata calls, `def install` with `<dir>.install` statements and a
//! `test do` block of `system` calls. Unrecognised top-level statements are
//! skipped; unrecognised statements inside `install`/`test` are errors because
//! they cannot be validated before running.
//!
//! Statements are read line by line. A line ending in `,` continues on the
//! next line; no other continuation form is recognised.

use tracing::debug;

use crate::error::{RcpError, Result};
use crate::model::{InstallStep, Recipe, TargetDir, TestStep};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Str(String),
    Symbol(String),
    Heredoc(String),
    Comma,
    Arrow,
    Dot,
    Lt,
    LParen,
    RParen,
    Other(char),
}

const BLOCK_KEYWORDS: &[&str] = &[
    "def", "if", "unless", "case", "begin", "while", "until", "class", "module",
];

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '?' || c == '!'
}

/// Splits one source line into tokens; fails only on unterminated strings.
fn tokenize(line: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' => i += 1,
            '#' => break,
            '"' | '\'' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                let mut closed = false;
                while i < chars.len() {
                    let ch = chars[i];
                    if ch == '\\' && i + 1 < chars.len() {
                        let next = chars[i + 1];
                        let unescaped = match (quote, next) {
                            ('"', 'n') => Some('\n'),
                            ('"', 't') => Some('\t'),
                            (_, '\\') => Some('\\'),
                            (q, n) if n == q => Some(q),
                            _ => None,
                        };
                        match unescaped {
                            Some(u) => value.push(u),
                            None => {
                                value.push('\\');
                                value.push(next);
                            }
                        }
                        i += 2;
                        continue;
                    }
                    if ch == quote {
                        closed = true;
                        i += 1;
                        break;
                    }
                    value.push(ch);
                    i += 1;
                }
                if !closed {
                    return Err("unterminated string literal".to_string());
                }
                tokens.push(Token::Str(value));
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'>') => {
                tokens.push(Token::Arrow);
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'<') => {
                let mut j = i + 2;
                if matches!(chars.get(j), Some('~') | Some('-')) {
                    j += 1;
                }
                let start = j;
                while j < chars.len() && (chars[j].is_ascii_uppercase() || chars[j] == '_') {
                    j += 1;
                }
                if j > start {
                    tokens.push(Token::Heredoc(chars[start..j].iter().collect()));
                    i = j;
                } else {
                    tokens.push(Token::Other('<'));
                    i += 1;
                }
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            ':' if chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic()) => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && is_word_char(chars[j]) {
                    j += 1;
                }
                tokens.push(Token::Symbol(chars[start..j].iter().collect()));
                i = j;
            }
            c if is_word_char(c) => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            other => {
                tokens.push(Token::Other(other));
                i += 1;
            }
        }
    }
    Ok(tokens)
}

/// Characters that make a single-string `system` call need a real shell.
const SHELL_META: &[char] = &[
    '|', '&', ';', '<', '>', '(', ')', '$', '`', '*', '?', '[', ']', '{', '}', '~', '!', '\n',
];

/// Whether `command` uses shell syntax beyond words and quoting. `#{…}`
/// interpolations are not shell syntax.
fn needs_shell(command: &str) -> bool {
    let mut rest = command;
    let mut plain = String::with_capacity(command.len());
    while let Some(start) = rest.find("#{") {
        plain.push_str(&rest[..start]);
        plain.push('x');
        match rest[start..].find('}') {
            Some(end) => rest = &rest[start + end + 1..],
            None => {
                rest = "";
            }
        }
    }
    plain.push_str(rest);
    let assigns_env = plain
        .split_whitespace()
        .next()
        .is_some_and(|first| first.contains('='));
    assigns_env || plain.contains(SHELL_META)
}

/// Splits a command into words. A leading `#` would start a shell comment,
/// so interpolations are hidden from the splitter.
fn split_command(command: &str) -> std::result::Result<Vec<String>, shell_words::ParseError> {
    const HIDDEN: &str = "\u{1}{";
    let words = shell_words::split(&command.replace("#{", HIDDEN))?;
    Ok(words.into_iter().map(|w| w.replace(HIDDEN, "#{")).collect())
}

fn is_word(token: Option<&Token>, expected: &str) -> bool {
    matches!(token, Some(Token::Word(w)) if w == expected)
}

fn opens_block(tokens: &[Token]) -> bool {
    let leading_keyword = matches!(tokens.first(), Some(Token::Word(w)) if BLOCK_KEYWORDS.contains(&w.as_str()));
    leading_keyword || tokens.iter().any(|t| matches!(t, Token::Word(w) if w == "do"))
}

/// Converts a formula class name to a recipe name: `FooBar` -> `foo-bar`.
pub fn class_to_name(class_name: &str) -> String {
    let mut name = String::with_capacity(class_name.len() + 4);
    let mut prev: Option<char> = None;
    for c in class_name.chars() {
        if c.is_ascii_uppercase() {
            if prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit()) {
                name.push('-');
            }
            name.push(c.to_ascii_lowercase());
        } else {
            name.push(c);
        }
        prev = Some(c);
    }
    name
}

struct FormulaParser<'a> {
    origin: &'a str,
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> FormulaParser<'a> {
    fn new(origin: &'a str, content: &'a str) -> Self {
        Self {
            origin,
            lines: content.lines().collect(),
            pos: 0,
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> RcpError {
        RcpError::Parse {
            file: self.origin.to_string(),
            line,
            message: message.into(),
        }
    }

    /// Next non-empty statement as (1-based line number, tokens).
    fn next_statement(&mut self) -> Result<Option<(usize, Vec<Token>)>> {
        while self.pos < self.lines.len() {
            let line_no = self.pos + 1;
            let raw = self.lines[self.pos];
            self.pos += 1;
            let mut tokens = tokenize(raw).map_err(|m| self.error(line_no, m))?;
            if tokens.is_empty() {
                continue;
            }
            while tokens.last() == Some(&Token::Comma) && self.pos < self.lines.len() {
                let cont_line = self.pos + 1;
                let cont = tokenize(self.lines[self.pos]).map_err(|m| self.error(cont_line, m))?;
                self.pos += 1;
                tokens.extend(cont);
            }
            if let Some(Token::Heredoc(tag)) = tokens.iter().find(|t| matches!(t, Token::Heredoc(_))) {
                self.skip_heredoc(line_no, tag)?;
            }
            return Ok(Some((line_no, tokens)));
        }
        Ok(None)
    }

    fn skip_heredoc(&mut self, start_line: usize, tag: &str) -> Result<()> {
        while self.pos < self.lines.len() {
            let raw = self.lines[self.pos];
            self.pos += 1;
            if raw.trim() == tag {
                return Ok(());
            }
        }
        Err(self.error(start_line, format!("unterminated heredoc <<{tag}")))
    }

    /// Skips the body of a block whose opening line was already consumed.
    fn skip_block(&mut self, start_line: usize) -> Result<()> {
        let mut depth = 1usize;
        while let Some((_, tokens)) = self.next_statement()? {
            if is_word(tokens.first(), "end") {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            } else if opens_block(&tokens) {
                depth += 1;
            }
        }
        Err(self.error(start_line, "block is missing its 'end'"))
    }

    fn expect_string(&self, line: usize, keyword: &str, tokens: &[Token]) -> Result<String> {
        let mut rest = tokens[1..].iter().skip_while(|t| **t == Token::LParen);
        match rest.next() {
            Some(Token::Str(s)) => Ok(s.clone()),
            _ => Err(self.error(line, format!("'{keyword}' expects a string literal"))),
        }
    }

    fn parse(mut self, name_hint: Option<&str>) -> Result<Recipe> {
        let (class_line, header) = self
            .next_statement()?
            .ok_or_else(|| self.error(1, "empty formula"))?;
        let class_name = match header.as_slice() {
            [Token::Word(kw), Token::Word(name), Token::Lt, Token::Word(base), ..]
                if kw == "class" && base == "Formula" =>
            {
                name.clone()
            }
            _ => {
                return Err(self.error(
                    class_line,
                    "expected 'class <Name> < Formula' as the first statement",
                ))
            }
        };

        let mut recipe = Recipe {
            name: name_hint
                .map(str::to_string)
                .unwrap_or_else(|| class_to_name(&class_name)),
            desc: None,
            homepage: None,
            url: String::new(),
            sha256: String::new(),
            version: None,
            install: Vec::new(),
            test: Vec::new(),
        };
        let mut closed = false;

        while let Some((line, tokens)) = self.next_statement()? {
            let Some(Token::Word(keyword)) = tokens.first() else {
                debug!("{}:{}: skipping statement {:?}", self.origin, line, tokens);
                continue;
            };
            match keyword.as_str() {
                "end" => {
                    closed = true;
                    break;
                }
                "desc" => recipe.desc = Some(self.expect_string(line, "desc", &tokens)?),
                "homepage" => recipe.homepage = Some(self.expect_string(line, "homepage", &tokens)?),
                "url" => recipe.url = self.expect_string(line, "url", &tokens)?,
                "sha256" => recipe.sha256 = self.expect_string(line, "sha256", &tokens)?,
                "version" => recipe.version = Some(self.expect_string(line, "version", &tokens)?),
                "def" if is_word(tokens.get(1), "install") => {
                    recipe.install = self.parse_install_block(line)?;
                }
                "test" if is_word(tokens.get(1), "do") => {
                    recipe.test = self.parse_test_block(line)?;
                }
                other => {
                    debug!(
                        "{}:{}: ignoring unsupported formula statement '{}'",
                        self.origin, line, other
                    );
                    if opens_block(&tokens) {
                        self.skip_block(line)?;
                    }
                }
            }
        }

        if !closed {
            return Err(self.error(class_line, "class is missing its 'end'"));
        }
        if recipe.url.is_empty() {
            return Err(self.error(class_line, "formula does not declare a url"));
        }
        Ok(recipe)
    }

    fn parse_install_block(&mut self, start_line: usize) -> Result<Vec<InstallStep>> {
        let mut steps = Vec::new();
        while let Some((line, tokens)) = self.next_statement()? {
            if is_word(tokens.first(), "end") {
                return Ok(steps);
            }
            let into = match tokens.as_slice() {
                [Token::Word(dir), Token::Dot, Token::Word(method), ..] if method == "install" => {
                    TargetDir::from_keyword(dir).ok_or_else(|| {
                        self.error(line, format!("unsupported install target '{dir}'"))
                    })?
                }
                _ => {
                    return Err(self.error(line, "unsupported statement in install block"));
                }
            };
            steps.extend(self.parse_install_args(line, into, &tokens[3..])?);
        }
        Err(self.error(start_line, "'def install' is missing its 'end'"))
    }

    fn parse_install_args(
        &self,
        line: usize,
        into: TargetDir,
        args: &[Token],
    ) -> Result<Vec<InstallStep>> {
        let args: Vec<&Token> = args
            .iter()
            .filter(|t| !matches!(t, Token::LParen | Token::RParen))
            .collect();
        let mut steps = Vec::new();
        for item in args.split(|t| **t == Token::Comma) {
            match item {
                [Token::Str(source)] => steps.push(InstallStep::FileCopy {
                    source: source.clone(),
                    into,
                    rename: None,
                }),
                [Token::Str(source), Token::Arrow, Token::Str(rename)] => {
                    steps.push(InstallStep::FileCopy {
                        source: source.clone(),
                        into,
                        rename: Some(rename.clone()),
                    })
                }
                _ => {
                    return Err(self.error(
                        line,
                        format!("unsupported argument to {into}.install; expected string literals"),
                    ))
                }
            }
        }
        if steps.is_empty() {
            return Err(self.error(line, format!("{into}.install needs at least one path")));
        }
        Ok(steps)
    }

    fn parse_test_block(&mut self, start_line: usize) -> Result<Vec<TestStep>> {
        let mut steps = Vec::new();
        while let Some((line, tokens)) = self.next_statement()? {
            if is_word(tokens.first(), "end") {
                return Ok(steps);
            }
            if !is_word(tokens.first(), "system") {
                return Err(self.error(line, "unsupported statement in test block"));
            }
            let args: Vec<&Token> = tokens[1..]
                .iter()
                .filter(|t| !matches!(t, Token::LParen | Token::RParen))
                .collect();
            let mut argv = Vec::new();
            for item in args.split(|t| **t == Token::Comma) {
                match item {
                    [Token::Str(arg)] => argv.push(arg.clone()),
                    _ => {
                        return Err(
                            self.error(line, "system expects comma-separated string literals")
                        )
                    }
                }
            }
            // A single command string is split into words like Kernel#system
            // does, and only handed to the shell when it uses shell syntax.
            if argv.len() == 1 && argv[0].contains(char::is_whitespace) {
                let command = argv.remove(0);
                argv = if needs_shell(&command) {
                    vec!["/bin/sh".to_string(), "-c".to_string(), command]
                } else {
                    split_command(&command)
                        .map_err(|e| self.error(line, format!("cannot split command '{command}': {e}")))?
                };
            }
            steps.push(TestStep::ShellInvoke { argv });
        }
        Err(self.error(start_line, "'test do' is missing its 'end'"))
    }
}

/// Parses formula DSL source. `name_hint` (usually the file stem) takes
/// precedence over the class name.
pub fn parse_formula(content: &str, origin: &str, name_hint: Option<&str>) -> Result<Recipe> {
    FormulaParser::new(origin, content).parse(name_hint)
}

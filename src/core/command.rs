//! Command-language expressions and their parser.
//!
//! The language is deliberately small:
//!
//! ```text
//! # comment
//! set hidden                      # boolean on, `nohidden` off, `hidden!` toggles
//! set period 5
//! cmd on-quit $echo bye           # user command with a single statement body
//! cmd trash {{ %trash-put "$fx"; echo trashed }}
//! $ls -la                         # shell, mode chosen by `$` `%` `!` `&`
//! :cd "/tmp/some dir"; reload     # builtin calls, leading `:` optional
//! ```
//!
//! Statements end at a newline or `;`. A shell statement runs to the end of the line (or
//! the closing `}}` of a group) so the shell sees its own `;` and quotes untouched.
//!
//! [Parser] is an iterator: it yields expressions until the first error, yields that error
//! once and then stops, so callers evaluate everything before a syntax error.

use crate::core::shell::ShellMode;

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Set {
        opt: String,
        val: Option<String>,
    },
    Cmd {
        name: String,
        body: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<String>,
    },
    Shell {
        mode: ShellMode,
        value: String,
        args: Vec<String>,
    },
    List(Vec<Expr>),
}

impl Expr {
    pub fn call<I, S>(name: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expr::Call {
            name: name.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// A call without arguments.
    pub fn simple(name: &str) -> Self {
        Expr::Call {
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    pub fn shell(mode: ShellMode, value: &str) -> Self {
        Expr::Shell {
            mode,
            value: value.to_string(),
            args: Vec::new(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Set { opt, val: None } => write!(f, "set {opt}"),
            Expr::Set { opt, val: Some(v) } => write!(f, "set {opt} {}", quote(v)),
            Expr::Cmd { name, body } => write!(f, "cmd {name} {body}"),
            Expr::Call { name, args } => {
                f.write_str(name)?;
                for arg in args {
                    write!(f, " {}", quote(arg))?;
                }
                Ok(())
            }
            Expr::Shell { mode, value, .. } => write!(f, "{}{value}", mode.prefix()),
            Expr::List(exprs) => {
                f.write_str("{{ ")?;
                for (i, e) in exprs.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{e}")?;
                }
                f.write_str(" }}")
            }
        }
    }
}

fn quote(s: &str) -> String {
    if !s.is_empty() && !s.contains(|c: char| c.is_whitespace() || "\"';#\\".contains(c)) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    line: usize,
    msg: String,
}

impl ParseError {
    pub fn line(&self) -> usize {
        self.line
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parsing line {}: {}", self.line, self.msg)
    }
}

impl std::error::Error for ParseError {}

pub struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    failed: bool,
}

impl Parser {
    pub fn new(src: &str) -> Self {
        Parser {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            failed: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn err(&self, msg: impl Into<String>) -> ParseError {
        ParseError {
            line: self.line,
            msg: msg.into(),
        }
    }

    fn at_group_open(&self) -> bool {
        self.peek() == Some('{') && self.peek_at(1) == Some('{')
    }

    fn at_group_close(&self) -> bool {
        self.peek() == Some('}') && self.peek_at(1) == Some('}')
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    /// Skips whitespace, statement separators and comments.
    fn skip_separators(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                c if c.is_whitespace() || c == ';' => {
                    self.bump();
                }
                '#' => self.skip_comment(),
                _ => break,
            }
        }
    }

    /// Skips spaces and tabs but not newlines.
    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace() && c != '\n') {
            self.bump();
        }
    }

    fn at_statement_end(&self, in_group: bool) -> bool {
        match self.peek() {
            None | Some('\n') | Some(';') | Some('#') => true,
            Some('}') => in_group && self.at_group_close(),
            _ => false,
        }
    }

    /// Reads one word, handling quotes and backslash escapes. `None` at statement end.
    fn read_word(&mut self, in_group: bool) -> Result<Option<String>, ParseError> {
        self.skip_blanks();
        if self.at_statement_end(in_group) {
            return Ok(None);
        }

        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || c == ';' || (in_group && self.at_group_close()) {
                break;
            }
            match c {
                '\'' => {
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('\'') => break,
                            Some(ch) => word.push(ch),
                            None => return Err(self.err("unterminated single quote")),
                        }
                    }
                }
                '"' => {
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('"') => break,
                            Some('\\') => match self.bump() {
                                Some(ch) => word.push(ch),
                                None => return Err(self.err("unterminated double quote")),
                            },
                            Some(ch) => word.push(ch),
                            None => return Err(self.err("unterminated double quote")),
                        }
                    }
                }
                '\\' => {
                    self.bump();
                    match self.bump() {
                        Some(ch) => word.push(ch),
                        None => return Err(self.err("dangling escape at end of input")),
                    }
                }
                _ => {
                    word.push(c);
                    self.bump();
                }
            }
        }
        Ok(Some(word))
    }

    fn read_rest_words(&mut self, in_group: bool) -> Result<Vec<String>, ParseError> {
        let mut words = Vec::new();
        while let Some(w) = self.read_word(in_group)? {
            words.push(w);
        }
        Ok(words)
    }

    /// Raw text of a shell statement: up to newline, or up to `}}` inside a group.
    fn read_shell_text(&mut self, in_group: bool) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '\n' || (in_group && self.at_group_close()) {
                break;
            }
            text.push(c);
            self.bump();
        }
        text.trim().to_string()
    }

    fn parse_group(&mut self) -> Result<Expr, ParseError> {
        // consume `{{`
        self.bump();
        self.bump();
        let mut exprs = Vec::new();
        loop {
            self.skip_separators();
            if self.at_group_close() {
                self.bump();
                self.bump();
                return Ok(Expr::List(exprs));
            }
            match self.parse_statement(true)? {
                Some(e) => exprs.push(e),
                None => return Err(self.err("unterminated '{{' group")),
            }
        }
    }

    fn parse_statement(&mut self, in_group: bool) -> Result<Option<Expr>, ParseError> {
        self.skip_separators();

        let Some(c) = self.peek() else {
            return Ok(None);
        };

        if in_group && self.at_group_close() {
            return Ok(None);
        }

        if self.at_group_open() {
            return self.parse_group().map(Some);
        }

        if let Some(mode) = ShellMode::from_prefix(c) {
            self.bump();
            let value = self.read_shell_text(in_group);
            if value.is_empty() {
                return Err(self.err(format!("missing command after '{c}'")));
            }
            return Ok(Some(Expr::Shell {
                mode,
                value,
                args: Vec::new(),
            }));
        }

        let Some(word) = self.read_word(in_group)? else {
            return Ok(None);
        };
        let name = word.strip_prefix(':').unwrap_or(&word).to_string();
        if name.is_empty() {
            return Err(self.err("empty command name"));
        }

        match name.as_str() {
            "set" => {
                let mut words = self.read_rest_words(in_group)?.into_iter();
                let Some(opt) = words.next() else {
                    return Err(self.err("set: missing option name"));
                };
                let val = words.next();
                if words.next().is_some() {
                    return Err(self.err(format!("set {opt}: too many values")));
                }
                Ok(Some(Expr::Set { opt, val }))
            }
            "cmd" => {
                let Some(cmd_name) = self.read_word(in_group)? else {
                    return Err(self.err("cmd: missing command name"));
                };
                self.skip_blanks();
                let body = if self.at_group_open() {
                    self.parse_group()?
                } else {
                    match self.parse_statement(in_group)? {
                        Some(e) => e,
                        None => return Err(self.err(format!("cmd {cmd_name}: missing body"))),
                    }
                };
                Ok(Some(Expr::Cmd {
                    name: cmd_name,
                    body: Box::new(body),
                }))
            }
            _ => {
                let args = self.read_rest_words(in_group)?;
                Ok(Some(Expr::Call { name, args }))
            }
        }
    }
}

impl Iterator for Parser {
    type Item = Result<Expr, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.parse_statement(false) {
            Ok(Some(expr)) => Some(Ok(expr)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Parses a whole fragment, failing on the first error.
pub fn parse(src: &str) -> Result<Vec<Expr>, ParseError> {
    Parser::new(src).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_calls_sets_and_shell() -> Result<(), ParseError> {
        let exprs = parse("set hidden\nset period 5; :cd '/tmp/a b'\n$ls -la; echo x\n")?;
        assert_eq!(
            exprs,
            vec![
                Expr::Set {
                    opt: "hidden".into(),
                    val: None
                },
                Expr::Set {
                    opt: "period".into(),
                    val: Some("5".into())
                },
                Expr::call("cd", ["/tmp/a b"]),
                Expr::shell(ShellMode::Sync, "ls -la; echo x"),
            ]
        );
        Ok(())
    }

    #[test]
    fn parses_cmd_with_group_body() -> Result<(), ParseError> {
        let exprs = parse("# header\ncmd on-quit {{ %echo bye; echo \"done now\" }}\n")?;
        assert_eq!(
            exprs,
            vec![Expr::Cmd {
                name: "on-quit".into(),
                body: Box::new(Expr::List(vec![
                    Expr::shell(ShellMode::Pipe, "echo bye; echo \"done now\""),
                ])),
            }]
        );

        let exprs = parse("cmd greet echo hi; down")?;
        assert_eq!(
            exprs,
            vec![
                Expr::Cmd {
                    name: "greet".into(),
                    body: Box::new(Expr::call("echo", ["hi"])),
                },
                Expr::simple("down"),
            ]
        );
        Ok(())
    }

    #[test]
    fn stops_at_first_error() {
        let mut parser = Parser::new("up\necho \"oops\ndown");
        assert_eq!(parser.next(), Some(Ok(Expr::simple("up"))));
        let err = parser.next();
        assert!(matches!(err, Some(Err(ref e)) if e.line() >= 2), "got {err:?}");
        assert_eq!(parser.next(), None);
    }

    #[test]
    fn rejects_incomplete_forms() {
        assert!(parse("set").is_err());
        assert!(parse("cmd").is_err());
        assert!(parse("cmd x").is_err());
        assert!(parse("$").is_err());
        assert!(parse("{{ up").is_err());
    }

    #[test]
    fn display_round_trips_through_parser() -> Result<(), ParseError> {
        let expr = Expr::call("echo", ["two words", "plain"]);
        assert_eq!(expr.to_string(), "echo \"two words\" plain");
        assert_eq!(parse(&expr.to_string())?, vec![expr]);
        Ok(())
    }
}

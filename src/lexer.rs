// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::cmp;
use core::fmt::{self, Debug, Formatter};
use core::iter::Peekable;
use core::str::CharIndices;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::{anyhow, bail, Result};

#[derive(Clone)]
struct SourceInternal {
    pub file: String,
    pub contents: String,
    pub lines: Vec<(u32, u32)>,
}

#[derive(Clone)]
pub struct Source {
    src: Rc<SourceInternal>,
}

impl cmp::Ord for Source {
    fn cmp(&self, other: &Source) -> cmp::Ordering {
        Rc::as_ptr(&self.src).cmp(&Rc::as_ptr(&other.src))
    }
}

impl cmp::PartialOrd for Source {
    fn partial_cmp(&self, other: &Source) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl cmp::PartialEq for Source {
    fn eq(&self, other: &Source) -> bool {
        Rc::as_ptr(&self.src) == Rc::as_ptr(&other.src)
    }
}

impl cmp::Eq for Source {}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        self.src.file.fmt(f)
    }
}

impl Source {
    pub fn from_contents(file: String, contents: String) -> Result<Source> {
        let max_size = u32::MAX as usize - 2; // Account for rows, cols possibly starting at 1, EOF etc.
        if contents.len() > max_size {
            bail!("{file} exceeds maximum allowed source file size {max_size}");
        }
        let mut lines = vec![];
        let mut prev_ch = ' ';
        let mut prev_pos = 0u32;
        let mut start = 0u32;
        for (i, ch) in contents.char_indices() {
            if ch == '\n' {
                let end = match prev_ch {
                    '\r' => prev_pos,
                    _ => i as u32,
                };
                lines.push((start, end));
                start = i as u32 + 1;
            }
            prev_ch = ch;
            prev_pos = i as u32;
        }

        if (start as usize) < contents.len() {
            lines.push((start, contents.len() as u32));
        } else if contents.is_empty() {
            lines.push((0, 0));
        } else {
            let s = (contents.len() - 1) as u32;
            lines.push((s, s));
        }
        Ok(Self {
            src: Rc::new(SourceInternal {
                file,
                contents,
                lines,
            }),
        })
    }

    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Source> {
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => bail!("Failed to read {}. {e}", path.as_ref().display()),
        };
        Self::from_contents(path.as_ref().to_string_lossy().to_string(), contents)
    }

    pub fn file(&self) -> &String {
        &self.src.file
    }

    pub fn contents(&self) -> &String {
        &self.src.contents
    }

    pub fn line(&self, idx: u32) -> &str {
        let idx = idx as usize;
        if idx < self.src.lines.len() {
            let (start, end) = self.src.lines[idx];
            &self.src.contents[start as usize..end as usize]
        } else {
            ""
        }
    }

    pub fn message(&self, line: u32, col: u32, kind: &str, msg: &str) -> String {
        if line as usize > self.src.lines.len() {
            return format!("{}: invalid line {} specified", self.src.file, line);
        }

        let line_str = format!("{line}");
        let line_num_width = line_str.len() + 1;
        let col_spaces = (col as usize).saturating_sub(1);

        format!(
            "\n--> {}:{}:{}\n{:<line_num_width$}|\n\
		{:<line_num_width$}| {}\n\
		{:<line_num_width$}| {:<col_spaces$}^\n\
		{}: {}",
            self.src.file,
            line,
            col,
            "",
            line,
            self.line(line.saturating_sub(1)),
            "",
            "",
            kind,
            msg
        )
    }

    pub fn error(&self, line: u32, col: u32, msg: &str) -> anyhow::Error {
        anyhow!(self.message(line, col, "error", msg))
    }
}

#[derive(Clone)]
pub struct Span {
    pub source: Source,
    pub line: u32,
    pub col: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn text(&self) -> &str {
        &self.source.contents()[self.start as usize..self.end as usize]
    }

    pub fn message(&self, kind: &str, msg: &str) -> String {
        self.source.message(self.line, self.col, kind, msg)
    }

    pub fn error(&self, msg: &str) -> anyhow::Error {
        self.source.error(self.line, self.col, msg)
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let t = self.text().escape_debug().to_string();
        let max = 32;
        let (txt, trailer) = if t.len() > max {
            (&t[0..max], "...")
        } else {
            (t.as_str(), "")
        };

        f.write_fmt(format_args!(
            "{}:{}:{}:{}, \"{}{}\"",
            self.line, self.col, self.start, self.end, txt, trailer
        ))
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TokenKind {
    Symbol,
    String,
    Number,
    Ident,
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token(pub TokenKind, pub Span);

// Longest symbols first so that prefix matching picks the longest operator.
const SYMBOLS: [&str; 47] = [
    "**=", "//=", ">>=", "<<=", "...", "->", "**", "//", "==", "!=", "<=", ">=", "<<", ">>", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=", ":=", "(", ")", "[", "]", "{", "}", ",", ":",
    ".", ";", "@", "=", "+", "-", "*", "/", "%", "&", "|", "^", "~", "<", ">",
];

const TAB_SIZE: u32 = 8;

#[derive(Clone)]
pub struct Lexer<'source> {
    source: Source,
    iter: Peekable<CharIndices<'source>>,
    line: u32,
    col: u32,
    // Widths of the enclosing indented blocks. The bottom entry is always 0.
    indents: Vec<u32>,
    pending: VecDeque<Token>,
    // Nesting depth of (), [] and {}. Line breaks are not significant inside.
    depth: u32,
    at_line_start: bool,
    // A logical line has produced tokens that still need a closing Newline.
    line_open: bool,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source Source) -> Self {
        Self {
            source: source.clone(),
            iter: source.contents().char_indices().peekable(),
            line: 1,
            col: 1,
            indents: vec![0],
            pending: VecDeque::new(),
            depth: 0,
            at_line_start: true,
            line_open: false,
        }
    }

    fn peek(&mut self) -> (usize, char) {
        match self.iter.peek() {
            Some((index, chr)) => (*index, *chr),
            _ => (self.source.contents().len(), '\x00'),
        }
    }

    fn peekahead(&mut self, n: usize) -> (usize, char) {
        match self.iter.clone().nth(n) {
            Some((index, chr)) => (index, chr),
            _ => (self.source.contents().len(), '\x00'),
        }
    }

    fn span(&self, line: u32, col: u32, start: usize, end: usize) -> Span {
        Span {
            source: self.source.clone(),
            line,
            col,
            start: start as u32,
            end: end as u32,
        }
    }

    fn next_line(&mut self) {
        self.iter.next();
        self.line += 1;
        self.col = 1;
    }

    fn skip_comment(&mut self) {
        loop {
            match self.peek().1 {
                '\n' | '\x00' => break,
                _ => {
                    self.iter.next();
                    self.col += 1;
                }
            }
        }
    }

    // Measure the indentation of the next line that carries tokens.
    // Blank and comment-only lines are consumed. Returns None at end of input.
    fn read_indentation(&mut self) -> Option<u32> {
        loop {
            let mut width = 0u32;
            loop {
                match self.peek().1 {
                    ' ' => {
                        width += 1;
                        self.col += 1;
                    }
                    '\t' => {
                        width = (width / TAB_SIZE + 1) * TAB_SIZE;
                        self.col += 4;
                    }
                    '\x0c' => {
                        width = 0;
                        self.col += 1;
                    }
                    _ => break,
                }
                self.iter.next();
            }

            match self.peek().1 {
                '#' => self.skip_comment(),
                '\r' => {
                    self.iter.next();
                }
                '\n' => self.next_line(),
                '\x00' => return None,
                _ => return Some(width),
            }
        }
    }

    fn indent_to(&mut self, width: u32) -> Result<()> {
        let (start, _) = self.peek();
        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            let span = self.span(self.line, self.col, start, start);
            self.pending.push_back(Token(TokenKind::Indent, span));
        } else if width < current {
            while let Some(&top) = self.indents.last() {
                if top <= width {
                    break;
                }
                self.indents.pop();
                let span = self.span(self.line, self.col, start, start);
                self.pending.push_back(Token(TokenKind::Dedent, span));
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(self.source.error(
                    self.line,
                    self.col,
                    "unindent does not match any outer indentation level",
                ));
            }
        }
        Ok(())
    }

    // Close the last logical line and all open blocks before Eof.
    fn finish(&mut self) -> Token {
        let (start, _) = self.peek();
        let span = self.span(self.line, self.col, start, start);
        if self.line_open {
            self.line_open = false;
            self.pending
                .push_back(Token(TokenKind::Newline, span.clone()));
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.pending
                .push_back(Token(TokenKind::Dedent, span.clone()));
        }
        self.pending.push_back(Token(TokenKind::Eof, span.clone()));
        self.pending
            .pop_front()
            .unwrap_or(Token(TokenKind::Eof, span))
    }

    fn skip_ws(&mut self) -> Result<()> {
        // A tab is considered 4 space characters for column reporting.
        loop {
            match self.peek().1 {
                ' ' | '\x0c' => self.col += 1,
                '\t' => self.col += 4,
                '\r' => (),
                '\n' if self.depth > 0 => {
                    self.next_line();
                    continue;
                }
                '#' => {
                    self.skip_comment();
                    continue;
                }
                '\\' => {
                    let next = match self.peekahead(1).1 {
                        '\r' => self.peekahead(2).1,
                        ch => ch,
                    };
                    if next != '\n' {
                        return Err(self.source.error(
                            self.line,
                            self.col,
                            "unexpected character after line continuation character",
                        ));
                    }
                    self.iter.next();
                    if self.peek().1 == '\r' {
                        self.iter.next();
                    }
                    self.next_line();
                    continue;
                }
                _ => break,
            }
            self.iter.next();
        }
        Ok(())
    }

    fn read_ident(&mut self) -> Result<Token> {
        let (start, _) = self.peek();
        let (line, col) = (self.line, self.col);
        loop {
            let ch = self.peek().1;
            if ch.is_alphanumeric() || ch == '_' {
                self.iter.next();
                self.col += 1;
            } else {
                break;
            }
        }
        let end = self.peek().0;

        // A short run of prefix letters directly followed by a quote starts a string.
        let quote = self.peek().1;
        if (quote == '"' || quote == '\'') && is_string_prefix(&self.source.contents()[start..end])
        {
            return self.read_string(start, line, col);
        }

        Ok(Token(TokenKind::Ident, self.span(line, col, start, end)))
    }

    fn read_number(&mut self) -> Result<Token> {
        let (start, _) = self.peek();
        let col = self.col;
        let mut prev = ' ';
        loop {
            let (offset, ch) = self.peek();
            let exponent_sign = matches!(ch, '+' | '-')
                && matches!(prev, 'e' | 'E')
                && !self.source.contents()[start..offset]
                    .to_ascii_lowercase()
                    .starts_with("0x");
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || exponent_sign {
                self.iter.next();
                self.col += 1;
                prev = ch;
            } else {
                break;
            }
        }
        let end = self.peek().0;

        let text = &self.source.contents()[start..end];
        if text.matches('.').count() > 1 || text.ends_with('_') {
            return Err(self.source.error(self.line, col, "invalid number"));
        }

        Ok(Token(TokenKind::Number, self.span(self.line, col, start, end)))
    }

    // The span of a string token covers prefix and quotes. The parser decodes it.
    fn read_string(&mut self, start: usize, line: u32, col: u32) -> Result<Token> {
        let quote = self.peek().1;
        let triple = self.peekahead(1).1 == quote && self.peekahead(2).1 == quote;
        let delimiter = if triple { 3 } else { 1 };
        for _ in 0..delimiter {
            self.iter.next();
            self.col += 1;
        }

        loop {
            let ch = self.peek().1;
            match ch {
                '\x00' => {
                    return Err(self
                        .source
                        .error(line, col, "unterminated string literal"));
                }
                '\\' => {
                    self.iter.next();
                    self.col += 1;
                    match self.peek().1 {
                        '\x00' => continue,
                        '\n' => self.next_line(),
                        _ => {
                            self.iter.next();
                            self.col += 1;
                        }
                    }
                }
                '\n' if !triple => {
                    return Err(self
                        .source
                        .error(line, col, "unterminated string literal"));
                }
                '\n' => self.next_line(),
                c if c == quote => {
                    if !triple {
                        self.iter.next();
                        self.col += 1;
                        break;
                    }
                    if self.peekahead(1).1 == quote && self.peekahead(2).1 == quote {
                        for _ in 0..3 {
                            self.iter.next();
                        }
                        self.col += 3;
                        break;
                    }
                    self.iter.next();
                    self.col += 1;
                }
                '\t' => {
                    self.iter.next();
                    self.col += 4;
                }
                _ => {
                    self.iter.next();
                    self.col += 1;
                }
            }
        }

        let end = self.peek().0;
        Ok(Token(TokenKind::String, self.span(line, col, start, end)))
    }

    fn read_symbol(&mut self) -> Result<Token> {
        let (start, _) = self.peek();
        let col = self.col;
        let rest = &self.source.contents()[start..];
        let symbol = match SYMBOLS.iter().find(|s| rest.starts_with(**s)) {
            Some(s) => *s,
            None => return Err(self.source.error(self.line, col, "invalid character")),
        };

        match symbol {
            "(" | "[" | "{" => self.depth += 1,
            ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
            _ => (),
        }

        for _ in 0..symbol.len() {
            self.iter.next();
        }
        self.col += symbol.len() as u32;

        Ok(Token(
            TokenKind::Symbol,
            self.span(self.line, col, start, start + symbol.len()),
        ))
    }

    fn read_token(&mut self) -> Result<Token> {
        if let Some(tok) = self.pending.pop_front() {
            return Ok(tok);
        }

        if self.at_line_start && self.depth == 0 {
            self.at_line_start = false;
            match self.read_indentation() {
                Some(width) => {
                    self.indent_to(width)?;
                    if let Some(tok) = self.pending.pop_front() {
                        return Ok(tok);
                    }
                }
                None => return Ok(self.finish()),
            }
        }

        self.skip_ws()?;

        let (start, chr) = self.peek();
        let (line, col) = (self.line, self.col);
        match chr {
            '\n' => {
                self.next_line();
                self.at_line_start = true;
                if self.line_open {
                    Ok(Token(TokenKind::Newline, self.span(line, col, start, start + 1)))
                } else {
                    self.read_token()
                }
            }
            '\x00' => Ok(self.finish()),
            '"' | '\'' => self.read_string(start, line, col),
            '.' if self.peekahead(1).1.is_ascii_digit() => self.read_number(),
            _ if chr.is_ascii_digit() => self.read_number(),
            _ if chr.is_alphabetic() || chr == '_' => self.read_ident(),
            _ => self.read_symbol(),
        }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        let tok = self.read_token()?;
        match tok.0 {
            TokenKind::Newline => self.line_open = false,
            TokenKind::Indent | TokenKind::Dedent | TokenKind::Eof => (),
            _ => self.line_open = true,
        }
        Ok(tok)
    }
}

fn is_string_prefix(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    matches!(
        lower.as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
    )
}

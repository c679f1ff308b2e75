//! Statement boundary detection for MySQL dump text.
//!
//! [`StatementParser`] is a character-at-a-time state machine. It never
//! interprets SQL beyond what is needed to find terminators: quoted literals,
//! comments, and `DELIMITER` directives. Reading and decoding happen one layer
//! up in [`crate::splitter`].


use crate::error::ImportError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::VecDeque;

pub const DEFAULT_DELIMITER: &str = ";";

const DIRECTIVE_KEYWORD: &str = "delimiter";

static DELIMITER_DIRECTIVE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i:delimiter)[ \t]+(\S+)").unwrap());

/// Lexical mode of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    InSingleQuote,
    InDoubleQuote,
    InBacktick,
    InLineComment,
    InBlockComment,
}

/// One complete statement, delimiter excluded.
///
/// Offsets are byte positions in the decoded text stream: `start_offset`
/// points at the first non-comment character, `end_offset` just past the
/// terminating delimiter (or the end of input for a trailing statement).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub text: String,
    pub start_offset: u64,
    pub end_offset: u64,
}

/// Characters seen in NORMAL mode that might open a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookahead {
    None,
    Dash,
    DashDash,
    Slash,
}

/// A position both in the statement buffer and in the input stream.
#[derive(Debug, Clone, Copy)]
struct Mark {
    index: usize,
    offset: u64,
}

pub struct StatementParser {
    mode: Mode,
    lookahead: Lookahead,
    lookahead_at: Mark,
    pending_escape: bool,
    delimiter: String,
    buffer: String,
    offset: u64,
    content_start: Option<Mark>,
    /// Recent buffer indexes just past a content character, newest last.
    /// Trailing comments and whitespace lie beyond the newest one and are cut
    /// from the statement text. Holds enough entries to step back over the
    /// leading characters of a multi-character delimiter.
    content_ends: VecDeque<usize>,
    /// Buffer index where the current NORMAL run began; a delimiter only
    /// counts when it lies entirely inside this run.
    normal_from: usize,
    in_directive: bool,
    opened_at: Mark,
    block_first: bool,
    block_executable: bool,
    prev_star: bool,
}

impl Default for StatementParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser {
    pub fn new() -> Self {
        let origin = Mark {
            index: 0,
            offset: 0,
        };
        Self {
            mode: Mode::Normal,
            lookahead: Lookahead::None,
            lookahead_at: origin,
            pending_escape: false,
            delimiter: DEFAULT_DELIMITER.to_string(),
            buffer: String::with_capacity(32 * 1024),
            offset: 0,
            content_start: None,
            content_ends: VecDeque::new(),
            normal_from: 0,
            in_directive: false,
            opened_at: origin,
            block_first: false,
            block_executable: false,
            prev_star: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Feed a run of text, queueing every statement it completes.
    pub fn push_str(
        &mut self,
        text: &str,
        out: &mut VecDeque<Statement>,
    ) -> Result<(), ImportError> {
        for c in text.chars() {
            if let Some(stmt) = self.feed(c)? {
                out.push_back(stmt);
            }
        }
        Ok(())
    }

    /// Feed one character. Returns a statement when `c` completes one.
    pub fn feed(&mut self, c: char) -> Result<Option<Statement>, ImportError> {
        let here = Mark {
            index: self.buffer.len(),
            offset: self.offset,
        };
        self.buffer.push(c);
        self.offset += c.len_utf8() as u64;

        match self.mode {
            Mode::Normal => self.normal(c, here),
            Mode::InSingleQuote => {
                self.quoted(c, '\'', true);
                Ok(None)
            }
            Mode::InDoubleQuote => {
                self.quoted(c, '"', true);
                Ok(None)
            }
            Mode::InBacktick => {
                self.quoted(c, '`', false);
                Ok(None)
            }
            Mode::InLineComment => {
                if c == '\n' {
                    self.enter_normal();
                }
                Ok(None)
            }
            Mode::InBlockComment => {
                self.block_comment(c);
                Ok(None)
            }
        }
    }

    /// Signal end of input. Emits a trailing statement that has no delimiter.
    pub fn finish(&mut self) -> Result<Option<Statement>, ImportError> {
        if self.pending_escape {
            return Err(self.unterminated("escape sequence"));
        }
        match self.mode {
            Mode::InSingleQuote => return Err(self.unterminated("single-quoted string")),
            Mode::InDoubleQuote => return Err(self.unterminated("double-quoted string")),
            Mode::InBacktick => return Err(self.unterminated("backtick-quoted identifier")),
            Mode::InBlockComment => return Err(self.unterminated("block comment")),
            Mode::Normal | Mode::InLineComment => {}
        }

        if self.in_directive {
            self.apply_directive()?;
            return Ok(None);
        }

        match self.lookahead {
            Lookahead::Dash | Lookahead::Slash => self.content_char(self.lookahead_at),
            Lookahead::DashDash | Lookahead::None => {}
        }
        self.lookahead = Lookahead::None;

        let end = self.buffer.len();
        Ok(self.take_statement(end))
    }

    fn normal(&mut self, c: char, here: Mark) -> Result<Option<Statement>, ImportError> {
        if self.in_directive {
            if c == '\n' {
                self.apply_directive()?;
            }
            return Ok(None);
        }

        match self.lookahead {
            Lookahead::None => {}
            Lookahead::Dash => {
                self.lookahead = Lookahead::None;
                if c == '-' {
                    self.lookahead = Lookahead::DashDash;
                    return Ok(None);
                }
                self.content_char(self.lookahead_at);
            }
            Lookahead::DashDash => {
                if c == '-' {
                    // "---": the first dash is an operator, the next two may still open a comment
                    self.content_char(self.lookahead_at);
                    self.lookahead_at = Mark {
                        index: self.lookahead_at.index + 1,
                        offset: self.lookahead_at.offset + 1,
                    };
                    return Ok(None);
                }
                self.lookahead = Lookahead::None;
                if c.is_whitespace() {
                    if c != '\n' {
                        self.mode = Mode::InLineComment;
                    }
                    return Ok(None);
                }
                // "--x": both dashes are operators
                let second = Mark {
                    index: self.lookahead_at.index + 1,
                    offset: self.lookahead_at.offset + 1,
                };
                self.content_char(self.lookahead_at);
                self.content_char(second);
            }
            Lookahead::Slash => {
                self.lookahead = Lookahead::None;
                if c == '*' {
                    self.opened_at = self.lookahead_at;
                    self.mode = Mode::InBlockComment;
                    self.block_first = true;
                    self.block_executable = false;
                    self.prev_star = false;
                    return Ok(None);
                }
                self.content_char(self.lookahead_at);
            }
        }

        if self.buffer[self.normal_from..].ends_with(self.delimiter.as_str()) {
            let end = self.buffer.len() - self.delimiter.len();
            return Ok(self.take_statement(end));
        }

        match c {
            '\'' => self.open_quote(Mode::InSingleQuote, here),
            '"' => self.open_quote(Mode::InDoubleQuote, here),
            '`' => self.open_quote(Mode::InBacktick, here),
            '#' => self.mode = Mode::InLineComment,
            '-' => {
                self.lookahead = Lookahead::Dash;
                self.lookahead_at = here;
            }
            '/' => {
                self.lookahead = Lookahead::Slash;
                self.lookahead_at = here;
            }
            c if c.is_whitespace() => {
                if let Some(start) = self.content_start {
                    if self.buffer[start.index..here.index].eq_ignore_ascii_case(DIRECTIVE_KEYWORD)
                    {
                        self.in_directive = true;
                        if c == '\n' {
                            self.apply_directive()?;
                        }
                    }
                }
            }
            _ => self.content_char(here),
        }
        Ok(None)
    }

    fn quoted(&mut self, c: char, quote: char, backslash_escapes: bool) {
        if self.pending_escape {
            self.pending_escape = false;
        } else if backslash_escapes && c == '\\' {
            self.pending_escape = true;
        } else if c == quote {
            self.extend_content(self.buffer.len());
            self.enter_normal();
        }
    }

    fn block_comment(&mut self, c: char) {
        if self.block_first {
            self.block_first = false;
            // /*!50003 ... */ and /*+ hint */ are executed by the server
            if c == '!' || c == '+' {
                self.mark_content(self.opened_at);
                self.block_executable = true;
            }
        }
        if self.prev_star && c == '/' {
            self.prev_star = false;
            if self.block_executable {
                self.extend_content(self.buffer.len());
            }
            self.enter_normal();
        } else {
            self.prev_star = c == '*';
        }
    }

    fn open_quote(&mut self, mode: Mode, here: Mark) {
        self.content_char(here);
        self.opened_at = here;
        self.mode = mode;
    }

    fn enter_normal(&mut self) {
        self.mode = Mode::Normal;
        self.normal_from = self.buffer.len();
    }

    fn mark_content(&mut self, at: Mark) {
        if self.content_start.is_none() {
            self.content_start = Some(at);
        }
    }

    /// Record the character at `at` as statement content.
    fn content_char(&mut self, at: Mark) {
        self.mark_content(at);
        let len = self.buffer[at.index..]
            .chars()
            .next()
            .map_or(0, char::len_utf8);
        self.extend_content(at.index + len);
    }

    fn extend_content(&mut self, end: usize) {
        if self.content_ends.back().is_some_and(|&last| last >= end) {
            return;
        }
        self.content_ends.push_back(end);
        if self.content_ends.len() > self.delimiter.len() + 1 {
            self.content_ends.pop_front();
        }
    }

    fn apply_directive(&mut self) -> Result<(), ImportError> {
        let start = self.content_start.map(|m| m.index).unwrap_or(0);
        let offset = self.content_start.map(|m| m.offset).unwrap_or(self.offset);
        let line = self.buffer[start..].trim_end();

        let token = DELIMITER_DIRECTIVE_RE
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| strip_quotes(m.as_str()).to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ImportError::Parse {
                offset,
                message: "DELIMITER directive requires a delimiter token".to_string(),
            })?;

        self.delimiter = token;
        self.reset();
        Ok(())
    }

    fn take_statement(&mut self, end: usize) -> Option<Statement> {
        while self.content_ends.back().is_some_and(|&last| last > end) {
            self.content_ends.pop_back();
        }
        let end = self.content_ends.back().copied().unwrap_or(0);
        let stmt = self.content_start.and_then(|start| {
            if start.index >= end {
                return None;
            }
            Some(Statement {
                text: self.buffer[start.index..end].to_string(),
                start_offset: start.offset,
                end_offset: self.offset,
            })
        });
        self.reset();
        stmt
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.content_start = None;
        self.content_ends.clear();
        self.normal_from = 0;
        self.lookahead = Lookahead::None;
        self.in_directive = false;
    }

    fn unterminated(&self, what: &str) -> ImportError {
        ImportError::Parse {
            offset: self.opened_at.offset,
            message: format!("unterminated {} at end of input", what),
        }
    }
}

fn strip_quotes(token: &str) -> &str {
    let bytes = token.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && matches!(first, b'\'' | b'"' | b'`') {
            return &token[1..token.len() - 1];
        }
    }
    token
}

/// Split an in-memory string into statements.
pub fn split_str(sql: &str) -> Result<Vec<Statement>, ImportError> {
    let mut parser = StatementParser::new();
    let mut out = VecDeque::new();
    parser.push_str(sql, &mut out)?;
    if let Some(last) = parser.finish()? {
        out.push_back(last);
    }
    Ok(out.into())
}

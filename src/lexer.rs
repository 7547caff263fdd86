//! Lexer for JavaScript source code
//!
//! Converts source text into a stream of tokens.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::string_dict::StringDict;
use crate::value::JsString;

/// Source span information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// One chunk of a template literal between substitutions.
///
/// `cooked` is `None` when the chunk contains an escape that is only legal in
/// tagged templates (e.g. `\unicode`).
#[derive(Debug, Clone, PartialEq)]
pub struct TemplatePart {
    pub cooked: Option<JsString>,
    pub raw: JsString,
}

/// Token types for JavaScript
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    /// `0777`-style literal, rejected in strict code
    LegacyOctalNumber(f64),
    String(JsString),
    /// String containing a `\07`-style escape, rejected in strict code
    LegacyOctalString(JsString),
    RegExp(String, String), // (pattern, flags)
    True,
    False,
    Null,

    // Identifiers & Keywords
    Identifier(JsString),

    Let,
    Const,
    Var,
    Function,
    Return,
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    Switch,
    Case,
    Default,
    Try,
    Catch,
    Finally,
    Throw,
    New,
    This,
    Super,
    Class,
    Extends,
    Static,
    Typeof,
    Instanceof,
    In,
    Of,
    Void,
    Delete,
    Yield,
    With,
    Debugger,

    // Operators
    Plus,             // +
    Minus,            // -
    Star,             // *
    Slash,            // /
    Percent,          // %
    StarStar,         // **
    PlusPlus,         // ++
    MinusMinus,       // --
    Eq,               // =
    EqEq,             // ==
    EqEqEq,           // ===
    BangEq,           // !=
    BangEqEq,         // !==
    Lt,               // <
    LtEq,             // <=
    Gt,               // >
    GtEq,             // >=
    LtLt,             // <<
    GtGt,             // >>
    GtGtGt,           // >>>
    Amp,              // &
    AmpAmp,           // &&
    Pipe,             // |
    PipePipe,         // ||
    Caret,            // ^
    Tilde,            // ~
    Bang,             // !
    Question,         // ?
    QuestionQuestion, // ??
    QuestionDot,      // ?.

    // Assignment Operators
    PlusEq,             // +=
    MinusEq,            // -=
    StarEq,             // *=
    SlashEq,            // /=
    PercentEq,          // %=
    StarStarEq,         // **=
    AmpEq,              // &=
    PipeEq,             // |=
    CaretEq,            // ^=
    LtLtEq,             // <<=
    GtGtEq,             // >>=
    GtGtGtEq,           // >>>=
    AmpAmpEq,           // &&=
    PipePipeEq,         // ||=
    QuestionQuestionEq, // ??=

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Dot,       // .
    DotDotDot, // ...
    Comma,     // ,
    Colon,     // :
    Semicolon, // ;
    Arrow,     // =>

    // Template literals
    TemplateHead(TemplatePart),   // `...${
    TemplateMiddle(TemplatePart), // }...${
    TemplateTail(TemplatePart),   // }...`
    TemplateNoSub(TemplatePart),  // `...` (no substitutions)

    // Special
    Eof,
    Invalid(char),
    Unterminated(&'static str),
}

/// A token with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn eof(pos: usize, line: u32, column: u32) -> Self {
        Self {
            kind: TokenKind::Eof,
            span: Span::new(pos, pos, line, column),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    Line,
    Block,
    /// `/** ... */`
    Doc,
}

/// A comment seen while lexing, kept only in comment-recording mode
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub kind: CommentKind,
    pub text: JsString,
    pub span: Span,
}

/// Lexer state checkpoint for backtracking
#[derive(Clone)]
pub struct LexerCheckpoint {
    current_pos: usize,
    line: u32,
    column: u32,
    start_pos: usize,
    start_line: u32,
    start_column: u32,
    saw_newline: bool,
}

/// Lexer for tokenizing JavaScript source code
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    /// Base offset added to char_indices positions (needed when resetting chars from middle of source)
    chars_base_offset: usize,
    current_pos: usize,
    line: u32,
    column: u32,
    start_pos: usize,
    start_line: u32,
    start_column: u32,
    /// Tracks if we just saw a newline (for ASI)
    saw_newline: bool,
    /// String dictionary for interning identifiers and strings
    string_dict: &'a mut StringDict,
    /// Recorded comments, in source order; `None` when not recording
    comments: Option<Vec<Comment>>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, string_dict: &'a mut StringDict) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            chars_base_offset: 0,
            current_pos: 0,
            line: 1,
            column: 1,
            start_pos: 0,
            start_line: 1,
            start_column: 1,
            saw_newline: false,
            string_dict,
            comments: None,
        }
    }

    /// Number lines from `line` instead of 1
    pub fn with_first_line(mut self, line: u32) -> Self {
        self.line = line.max(1);
        self.start_line = self.line;
        self
    }

    /// Keep every comment seen while scanning
    pub fn with_comments(mut self) -> Self {
        self.comments = Some(Vec::new());
        self
    }

    /// Get mutable reference to the string dictionary for interning
    pub fn string_dict(&mut self) -> &mut StringDict {
        self.string_dict
    }

    pub fn comments(&self) -> &[Comment] {
        self.comments.as_deref().unwrap_or(&[])
    }

    pub fn take_comments(&mut self) -> Vec<Comment> {
        self.comments.take().unwrap_or_default()
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Create a checkpoint of the current lexer state for backtracking
    pub fn checkpoint(&self) -> LexerCheckpoint {
        LexerCheckpoint {
            current_pos: self.current_pos,
            line: self.line,
            column: self.column,
            start_pos: self.start_pos,
            start_line: self.start_line,
            start_column: self.start_column,
            saw_newline: self.saw_newline,
        }
    }

    /// Restore the lexer state from a checkpoint
    pub fn restore(&mut self, checkpoint: LexerCheckpoint) {
        self.current_pos = checkpoint.current_pos;
        self.line = checkpoint.line;
        self.column = checkpoint.column;
        self.start_pos = checkpoint.start_pos;
        self.start_line = checkpoint.start_line;
        self.start_column = checkpoint.start_column;
        self.saw_newline = checkpoint.saw_newline;
        self.reset_chars(checkpoint.current_pos);
    }

    fn reset_chars(&mut self, offset: usize) {
        self.chars_base_offset = offset;
        self.chars = self
            .source
            .get(offset..)
            .unwrap_or("")
            .char_indices()
            .peekable();
    }

    /// Reset the lexer to a specific position (from a Span) to rescan as regexp.
    /// Used when parser determines that a `/` should start a regexp literal.
    pub fn rescan_as_regexp(&mut self, span: Span) -> Token {
        self.current_pos = span.start;
        self.line = span.line;
        self.column = span.column;
        self.start_pos = span.start;
        self.start_line = span.line;
        self.start_column = span.column;
        self.reset_chars(span.start);
        self.scan_regexp()
    }

    /// Get the next token from the source
    pub fn next_token(&mut self) -> Token {
        if let Some(kind) = self.skip_whitespace_and_comments() {
            return Token::new(kind, self.make_span());
        }

        self.start_pos = self.current_pos;
        self.start_line = self.line;
        self.start_column = self.column;

        let Some((_pos, ch)) = self.advance() else {
            return Token::eof(self.current_pos, self.line, self.column);
        };

        let kind = match ch {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            '~' => TokenKind::Tilde,
            ':' => TokenKind::Colon,

            '.' => self.scan_dot(),
            '+' => self.scan_plus(),
            '-' => self.scan_minus(),
            '*' => self.scan_star(),
            '/' => self.scan_slash(),
            '%' => self.scan_percent(),
            '=' => self.scan_equals(),
            '!' => self.scan_bang(),
            '<' => self.scan_less_than(),
            '>' => self.scan_greater_than(),
            '&' => self.scan_ampersand(),
            '|' => self.scan_pipe(),
            '^' => self.scan_caret(),
            '?' => self.scan_question(),

            '"' | '\'' => self.scan_string(ch),
            '`' => self.scan_template(false),
            '0'..='9' => self.scan_number(ch),

            c if is_id_start(c) => self.scan_identifier(c),

            c => TokenKind::Invalid(c),
        };

        Token::new(kind, self.make_span())
    }

    /// Check if there was a newline before the current position
    pub fn had_newline_before(&self) -> bool {
        self.saw_newline
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = self.chars_base_offset + pos + ch.len_utf8();
            let crlf = ch == '\r' && self.chars.peek().map(|(_, c)| *c) == Some('\n');
            if is_line_terminator(ch) && !crlf {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let slice = self.source.get(self.current_pos..)?;
        let mut iter = slice.chars();
        iter.next();
        iter.next()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn make_span(&self) -> Span {
        Span::new(
            self.start_pos,
            self.current_pos,
            self.start_line,
            self.start_column,
        )
    }

    fn record_comment(&mut self, kind: CommentKind, start: usize, line: u32, column: u32) {
        let end = self.current_pos;
        let Some(comments) = self.comments.as_mut() else {
            return;
        };
        // Backtracking rescans comments that were already recorded
        if comments.last().is_some_and(|c| c.span.start >= start) {
            return;
        }
        let text = self.source.get(start..end).unwrap_or("");
        comments.push(Comment {
            kind,
            text: JsString::from(text),
            span: Span::new(start, end, line, column),
        });
    }

    /// Skip trivia. Returns an error token for an unterminated block comment.
    fn skip_whitespace_and_comments(&mut self) -> Option<TokenKind> {
        self.saw_newline = false;

        loop {
            match self.peek() {
                Some(c) if is_line_terminator(c) => {
                    self.saw_newline = true;
                    self.advance();
                }
                Some(c) if is_whitespace(c) => {
                    self.advance();
                }
                Some('/') => {
                    let next = self.peek_next();
                    let (start, line, column) = (self.current_pos, self.line, self.column);
                    if next == Some('/') {
                        self.advance();
                        self.advance();
                        while let Some(ch) = self.peek() {
                            if is_line_terminator(ch) {
                                break;
                            }
                            self.advance();
                        }
                        self.record_comment(CommentKind::Line, start, line, column);
                    } else if next == Some('*') {
                        self.advance();
                        self.advance();
                        let doc = self.peek() == Some('*') && self.peek_next() != Some('/');
                        loop {
                            match self.advance() {
                                Some((_, '*')) if self.peek() == Some('/') => {
                                    self.advance();
                                    break;
                                }
                                Some((_, c)) if is_line_terminator(c) => {
                                    self.saw_newline = true;
                                }
                                Some(_) => {}
                                None => {
                                    self.start_pos = start;
                                    self.start_line = line;
                                    self.start_column = column;
                                    return Some(TokenKind::Unterminated("comment"));
                                }
                            }
                        }
                        let kind = if doc {
                            CommentKind::Doc
                        } else {
                            CommentKind::Block
                        };
                        self.record_comment(kind, start, line, column);
                    } else {
                        return None;
                    }
                }
                _ => return None,
            }
        }
    }

    fn scan_dot(&mut self) -> TokenKind {
        if self.peek() == Some('.') && self.peek_next() == Some('.') {
            self.advance();
            self.advance();
            TokenKind::DotDotDot
        } else if matches!(self.peek(), Some('0'..='9')) {
            self.scan_number('.')
        } else {
            TokenKind::Dot
        }
    }

    fn scan_plus(&mut self) -> TokenKind {
        if self.match_char('+') {
            TokenKind::PlusPlus
        } else if self.match_char('=') {
            TokenKind::PlusEq
        } else {
            TokenKind::Plus
        }
    }

    fn scan_minus(&mut self) -> TokenKind {
        if self.match_char('-') {
            TokenKind::MinusMinus
        } else if self.match_char('=') {
            TokenKind::MinusEq
        } else {
            TokenKind::Minus
        }
    }

    fn scan_star(&mut self) -> TokenKind {
        if self.match_char('*') {
            if self.match_char('=') {
                TokenKind::StarStarEq
            } else {
                TokenKind::StarStar
            }
        } else if self.match_char('=') {
            TokenKind::StarEq
        } else {
            TokenKind::Star
        }
    }

    fn scan_slash(&mut self) -> TokenKind {
        if self.match_char('=') {
            TokenKind::SlashEq
        } else {
            TokenKind::Slash
        }
    }

    /// Scan a regular expression literal.
    /// Called by the parser when a regex is expected (e.g., after `=`, `(`, `,`, etc.)
    /// The leading `/` should be the current position (not yet consumed).
    pub fn scan_regexp(&mut self) -> Token {
        let start_pos = self.current_pos;
        let start_line = self.line;
        let start_column = self.column;

        self.advance();

        let mut pattern = String::new();
        let mut in_class = false;

        loop {
            match self.advance() {
                Some((_, '/')) if !in_class => break,
                Some((_, '[')) => {
                    in_class = true;
                    pattern.push('[');
                }
                Some((_, ']')) => {
                    in_class = false;
                    pattern.push(']');
                }
                Some((_, '\\')) => {
                    pattern.push('\\');
                    match self.advance() {
                        Some((_, c)) if !is_line_terminator(c) => pattern.push(c),
                        _ => {
                            let span = Span::new(start_pos, self.current_pos, start_line, start_column);
                            return Token::new(TokenKind::Unterminated("regular expression"), span);
                        }
                    }
                }
                Some((_, c)) if !is_line_terminator(c) => pattern.push(c),
                _ => {
                    let span = Span::new(start_pos, self.current_pos, start_line, start_column);
                    return Token::new(TokenKind::Unterminated("regular expression"), span);
                }
            }
        }

        let mut flags = String::new();
        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                flags.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let span = Span::new(start_pos, self.current_pos, start_line, start_column);
        Token::new(TokenKind::RegExp(pattern, flags), span)
    }

    fn scan_percent(&mut self) -> TokenKind {
        if self.match_char('=') {
            TokenKind::PercentEq
        } else {
            TokenKind::Percent
        }
    }

    fn scan_equals(&mut self) -> TokenKind {
        if self.match_char('=') {
            if self.match_char('=') {
                TokenKind::EqEqEq
            } else {
                TokenKind::EqEq
            }
        } else if self.match_char('>') {
            TokenKind::Arrow
        } else {
            TokenKind::Eq
        }
    }

    fn scan_bang(&mut self) -> TokenKind {
        if self.match_char('=') {
            if self.match_char('=') {
                TokenKind::BangEqEq
            } else {
                TokenKind::BangEq
            }
        } else {
            TokenKind::Bang
        }
    }

    fn scan_less_than(&mut self) -> TokenKind {
        if self.match_char('<') {
            if self.match_char('=') {
                TokenKind::LtLtEq
            } else {
                TokenKind::LtLt
            }
        } else if self.match_char('=') {
            TokenKind::LtEq
        } else {
            TokenKind::Lt
        }
    }

    fn scan_greater_than(&mut self) -> TokenKind {
        if self.match_char('>') {
            if self.match_char('>') {
                if self.match_char('=') {
                    TokenKind::GtGtGtEq
                } else {
                    TokenKind::GtGtGt
                }
            } else if self.match_char('=') {
                TokenKind::GtGtEq
            } else {
                TokenKind::GtGt
            }
        } else if self.match_char('=') {
            TokenKind::GtEq
        } else {
            TokenKind::Gt
        }
    }

    fn scan_ampersand(&mut self) -> TokenKind {
        if self.match_char('&') {
            if self.match_char('=') {
                TokenKind::AmpAmpEq
            } else {
                TokenKind::AmpAmp
            }
        } else if self.match_char('=') {
            TokenKind::AmpEq
        } else {
            TokenKind::Amp
        }
    }

    fn scan_pipe(&mut self) -> TokenKind {
        if self.match_char('|') {
            if self.match_char('=') {
                TokenKind::PipePipeEq
            } else {
                TokenKind::PipePipe
            }
        } else if self.match_char('=') {
            TokenKind::PipeEq
        } else {
            TokenKind::Pipe
        }
    }

    fn scan_caret(&mut self) -> TokenKind {
        if self.match_char('=') {
            TokenKind::CaretEq
        } else {
            TokenKind::Caret
        }
    }

    fn scan_question(&mut self) -> TokenKind {
        if self.match_char('?') {
            if self.match_char('=') {
                TokenKind::QuestionQuestionEq
            } else {
                TokenKind::QuestionQuestion
            }
        } else if self.peek() == Some('.') && !matches!(self.peek_next(), Some('0'..='9')) {
            // `a?.5:b` is a conditional, not an optional chain
            self.advance();
            TokenKind::QuestionDot
        } else {
            TokenKind::Question
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();
        let mut legacy_octal = false;

        loop {
            match self.advance() {
                Some((_, c)) if c == quote => break,
                Some((_, '\\')) => match self.scan_escape(&mut value, EscapeContext::String) {
                    Ok(octal) => legacy_octal |= octal,
                    Err(()) => return TokenKind::Invalid('\\'),
                },
                Some((_, '\n' | '\r')) | None => {
                    return TokenKind::Unterminated("string literal");
                }
                Some((_, c)) => value.push(c),
            }
        }

        let value = self.string_dict.get_or_insert(&value);
        if legacy_octal {
            TokenKind::LegacyOctalString(value)
        } else {
            TokenKind::String(value)
        }
    }

    /// Decode one escape sequence after a consumed backslash into `out`.
    ///
    /// Returns `Ok(true)` for a legacy octal escape. In template context an invalid
    /// escape is reported as `Err(())` so the caller can mark the chunk uncooked.
    fn scan_escape(&mut self, out: &mut String, context: EscapeContext) -> Result<bool, ()> {
        let Some((_, c)) = self.advance() else {
            return Err(());
        };
        match c {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0C'),
            'v' => out.push('\x0B'),
            '0' if !matches!(self.peek(), Some('0'..='9')) => out.push('\0'),
            '0'..='7' if context == EscapeContext::String => {
                let mut code = c.to_digit(8).unwrap_or(0);
                let max_len = if c <= '3' { 3 } else { 2 };
                let mut len = 1;
                while len < max_len {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.advance();
                            len += 1;
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                return Ok(true);
            }
            '8' | '9' if context == EscapeContext::String => {
                out.push(c);
                return Ok(true);
            }
            '0'..='9' => return Err(()),
            'x' => {
                let code = self.scan_hex_digits(2).ok_or(())?;
                out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
            }
            'u' => {
                let code = self.scan_unicode_escape().ok_or(())?;
                push_code_unit_or_point(out, code, self);
            }
            '\r' => {
                self.match_char('\n');
            }
            c if is_line_terminator(c) => {}
            c => out.push(c),
        }
        Ok(false)
    }

    /// Body of `\uXXXX` or `\u{X...}` after the `u`
    fn scan_unicode_escape(&mut self) -> Option<u32> {
        if self.match_char('{') {
            let mut code: u32 = 0;
            let mut digits = 0;
            loop {
                let ch = self.peek()?;
                if ch == '}' {
                    self.advance();
                    break;
                }
                let d = ch.to_digit(16)?;
                self.advance();
                code = code.checked_mul(16)?.checked_add(d)?;
                digits += 1;
                if code > 0x10FFFF {
                    return None;
                }
            }
            if digits == 0 {
                return None;
            }
            Some(code)
        } else {
            self.scan_hex_digits(4)
        }
    }

    fn scan_hex_digits(&mut self, count: usize) -> Option<u32> {
        let mut code = 0;
        for _ in 0..count {
            let d = self.peek()?.to_digit(16)?;
            self.advance();
            code = code * 16 + d;
        }
        Some(code)
    }

    /// Scan a template chunk. `continuation` is true when resuming after `}`.
    fn scan_template(&mut self, continuation: bool) -> TokenKind {
        let mut cooked = String::new();
        let mut cooked_valid = true;
        let raw_start = self.current_pos;

        loop {
            let before = self.current_pos;
            match self.advance() {
                Some((_, '`')) => {
                    let part = self.template_part(raw_start, before, cooked, cooked_valid);
                    return if continuation {
                        TokenKind::TemplateTail(part)
                    } else {
                        TokenKind::TemplateNoSub(part)
                    };
                }
                Some((_, '$')) if self.peek() == Some('{') => {
                    self.advance();
                    let part = self.template_part(raw_start, before, cooked, cooked_valid);
                    return if continuation {
                        TokenKind::TemplateMiddle(part)
                    } else {
                        TokenKind::TemplateHead(part)
                    };
                }
                Some((_, '\\')) => {
                    if self.scan_escape(&mut cooked, EscapeContext::Template).is_err() {
                        cooked_valid = false;
                    }
                }
                Some((_, '\r')) => {
                    // CR and CRLF both cook to LF
                    self.match_char('\n');
                    cooked.push('\n');
                }
                Some((_, c)) => cooked.push(c),
                None => return TokenKind::Unterminated("template literal"),
            }
        }
    }

    fn template_part(
        &mut self,
        raw_start: usize,
        raw_end: usize,
        cooked: String,
        cooked_valid: bool,
    ) -> TemplatePart {
        let raw_text = self
            .source
            .get(raw_start..raw_end)
            .unwrap_or("")
            .replace("\r\n", "\n")
            .replace('\r', "\n");
        TemplatePart {
            cooked: cooked_valid.then(|| self.string_dict.get_or_insert(&cooked)),
            raw: self.string_dict.get_or_insert(&raw_text),
        }
    }

    /// Rescan template continuation from a given span position (the } token)
    /// This resets the lexer position to after the } and scans the template continuation
    pub fn rescan_template_continuation(&mut self, rbrace_span: Span) -> Token {
        let base_offset = rbrace_span.end;
        self.current_pos = base_offset;
        self.line = rbrace_span.line;
        self.column = rbrace_span.column + 1;
        self.start_pos = rbrace_span.start;
        self.start_line = rbrace_span.line;
        self.start_column = rbrace_span.column;
        self.reset_chars(base_offset);
        let kind = self.scan_template(true);
        Token::new(kind, self.make_span())
    }

    fn scan_digits(&mut self, radix: u32, out: &mut String) {
        while let Some(ch) = self.peek() {
            if ch.is_digit(radix) {
                out.push(ch);
                self.advance();
            } else if ch == '_' && self.peek_next().is_some_and(|c| c.is_digit(radix)) {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        let mut num_str = String::new();

        if first == '0' {
            let radix = match self.peek() {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                self.scan_digits(radix, &mut num_str);
                if num_str.is_empty() {
                    return TokenKind::Invalid(first);
                }
                let value = num_str
                    .chars()
                    .filter_map(|c| c.to_digit(radix))
                    .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
                return self.number_end(TokenKind::Number(value));
            }
            if matches!(self.peek(), Some('0'..='9')) {
                // Legacy octal (0777) or decimal with leading zero (089)
                let mut digits = String::new();
                self.scan_digits(10, &mut digits);
                let value = if digits.chars().all(|c| c.is_digit(8)) {
                    digits
                        .chars()
                        .filter_map(|c| c.to_digit(8))
                        .fold(0.0, |acc, d| acc * 8.0 + f64::from(d))
                } else {
                    digits.parse().unwrap_or(f64::NAN)
                };
                return self.number_end(TokenKind::LegacyOctalNumber(value));
            }
        }

        if first == '.' {
            num_str.push_str("0.");
            self.scan_digits(10, &mut num_str);
        } else {
            num_str.push(first);
            self.scan_digits(10, &mut num_str);
            if self.peek() == Some('.') {
                self.advance();
                num_str.push('.');
                self.scan_digits(10, &mut num_str);
            }
        }

        if matches!(self.peek(), Some('e' | 'E')) {
            let sign_then_digit = matches!(self.peek_next(), Some('+' | '-'));
            let digit_next = matches!(self.peek_next(), Some('0'..='9'));
            if sign_then_digit || digit_next {
                self.advance();
                num_str.push('e');
                if sign_then_digit {
                    if let Some((_, sign)) = self.advance() {
                        num_str.push(sign);
                    }
                }
                let before = num_str.len();
                self.scan_digits(10, &mut num_str);
                if num_str.len() == before {
                    return TokenKind::Invalid('e');
                }
            }
        }

        self.number_end(TokenKind::Number(num_str.parse().unwrap_or(f64::NAN)))
    }

    /// A numeric literal must not run straight into an identifier
    fn number_end(&mut self, kind: TokenKind) -> TokenKind {
        match self.peek() {
            Some(c) if is_id_start(c) || c.is_ascii_digit() => TokenKind::Invalid(c),
            _ => kind,
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::new();
        name.push(first);

        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match keyword_kind(&name) {
            Some(kind) => kind,
            None => TokenKind::Identifier(self.string_dict.get_or_insert(&name)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscapeContext {
    String,
    Template,
}

/// Push a decoded `\u` escape. Surrogate pairs written as two escapes are joined.
fn push_code_unit_or_point(out: &mut String, code: u32, lexer: &mut Lexer<'_>) {
    if (0xD800..0xDC00).contains(&code) && lexer.peek() == Some('\\') && lexer.peek_next() == Some('u') {
        let checkpoint = lexer.checkpoint();
        lexer.advance();
        lexer.advance();
        if let Some(low) = lexer.scan_unicode_escape() {
            if (0xDC00..0xE000).contains(&low) {
                let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                out.push(char::from_u32(combined).unwrap_or('\u{FFFD}'));
                return;
            }
        }
        lexer.restore(checkpoint);
    }
    out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
}

fn keyword_kind(name: &str) -> Option<TokenKind> {
    Some(match name {
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "let" => TokenKind::Let,
        "const" => TokenKind::Const,
        "var" => TokenKind::Var,
        "function" => TokenKind::Function,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "for" => TokenKind::For,
        "while" => TokenKind::While,
        "do" => TokenKind::Do,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "switch" => TokenKind::Switch,
        "case" => TokenKind::Case,
        "default" => TokenKind::Default,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "finally" => TokenKind::Finally,
        "throw" => TokenKind::Throw,
        "new" => TokenKind::New,
        "this" => TokenKind::This,
        "super" => TokenKind::Super,
        "class" => TokenKind::Class,
        "extends" => TokenKind::Extends,
        "static" => TokenKind::Static,
        "typeof" => TokenKind::Typeof,
        "instanceof" => TokenKind::Instanceof,
        "in" => TokenKind::In,
        "of" => TokenKind::Of,
        "void" => TokenKind::Void,
        "delete" => TokenKind::Delete,
        "yield" => TokenKind::Yield,
        "with" => TokenKind::With,
        "debugger" => TokenKind::Debugger,
        _ => return None,
    })
}

/// Source text of a keyword token, for keywords used as property names
pub fn keyword_text(kind: &TokenKind) -> Option<&'static str> {
    Some(match kind {
        TokenKind::True => "true",
        TokenKind::False => "false",
        TokenKind::Null => "null",
        TokenKind::Let => "let",
        TokenKind::Const => "const",
        TokenKind::Var => "var",
        TokenKind::Function => "function",
        TokenKind::Return => "return",
        TokenKind::If => "if",
        TokenKind::Else => "else",
        TokenKind::For => "for",
        TokenKind::While => "while",
        TokenKind::Do => "do",
        TokenKind::Break => "break",
        TokenKind::Continue => "continue",
        TokenKind::Switch => "switch",
        TokenKind::Case => "case",
        TokenKind::Default => "default",
        TokenKind::Try => "try",
        TokenKind::Catch => "catch",
        TokenKind::Finally => "finally",
        TokenKind::Throw => "throw",
        TokenKind::New => "new",
        TokenKind::This => "this",
        TokenKind::Super => "super",
        TokenKind::Class => "class",
        TokenKind::Extends => "extends",
        TokenKind::Static => "static",
        TokenKind::Typeof => "typeof",
        TokenKind::Instanceof => "instanceof",
        TokenKind::In => "in",
        TokenKind::Of => "of",
        TokenKind::Void => "void",
        TokenKind::Delete => "delete",
        TokenKind::Yield => "yield",
        TokenKind::With => "with",
        TokenKind::Debugger => "debugger",
        _ => return None,
    })
}

fn is_line_terminator(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn is_whitespace(ch: char) -> bool {
    matches!(
        ch,
        ' ' | '\t' | '\u{000B}' | '\u{000C}' | '\u{00A0}' | '\u{FEFF}' | '\u{1680}'
            | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}'
    )
}

/// Check if a character can start an identifier
fn is_id_start(ch: char) -> bool {
    ch == '_' || ch == '$' || unicode_xid::UnicodeXID::is_xid_start(ch)
}

/// Check if a character can continue an identifier
fn is_id_continue(ch: char) -> bool {
    ch == '_'
        || ch == '$'
        || ch == '\u{200C}'
        || ch == '\u{200D}'
        || unicode_xid::UnicodeXID::is_xid_continue(ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<TokenKind> {
        let mut dict = StringDict::new();
        let mut lexer = Lexer::new(source, &mut dict);
        let mut tokens = vec![];
        loop {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                break;
            }
            tokens.push(token.kind);
        }
        tokens
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lex("42"), vec![TokenKind::Number(42.0)]);
        assert_eq!(lex("1e10"), vec![TokenKind::Number(1e10)]);
        assert_eq!(lex("0xff"), vec![TokenKind::Number(255.0)]);
        assert_eq!(lex(".5"), vec![TokenKind::Number(0.5)]);
        assert_eq!(lex("1_000"), vec![TokenKind::Number(1000.0)]);
        assert_eq!(lex("010"), vec![TokenKind::LegacyOctalNumber(8.0)]);
        assert_eq!(lex("3in").first(), Some(&TokenKind::Invalid('i')));
    }

    #[test]
    fn test_member_access_on_integer_literal() {
        assert_eq!(
            lex("1..toString"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Dot,
                TokenKind::Identifier(JsString::from("toString"))
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(lex(r#""aA\x42""#), vec![TokenKind::String(JsString::from("aAB"))]);
        assert_eq!(lex(r#""😀""#), vec![TokenKind::String(JsString::from("😀"))]);
        assert_eq!(lex(r#""\101""#), vec![TokenKind::LegacyOctalString(JsString::from("A"))]);
        assert_eq!(lex("\"abc"), vec![TokenKind::Unterminated("string literal")]);
    }

    #[test]
    fn test_template_raw_and_cooked() {
        assert_eq!(
            lex(r"`a\nb`"),
            vec![TokenKind::TemplateNoSub(TemplatePart {
                cooked: Some(JsString::from("a\nb")),
                raw: JsString::from(r"a\nb"),
            })]
        );
    }

    #[test]
    fn test_invalid_template_escape_is_uncooked() {
        let tokens = lex(r"`\unicode`");
        assert!(matches!(
            tokens.as_slice(),
            [TokenKind::TemplateNoSub(TemplatePart { cooked: None, .. })]
        ));
    }

    #[test]
    fn test_comments_are_recorded_once() {
        let mut dict = StringDict::new();
        let mut lexer = Lexer::new("/** doc */ a // tail\n b", &mut dict).with_comments();
        let checkpoint = lexer.checkpoint();
        lexer.next_token();
        lexer.restore(checkpoint);
        while lexer.next_token().kind != TokenKind::Eof {}
        let kinds: Vec<CommentKind> = lexer.comments().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![CommentKind::Doc, CommentKind::Line]);
        assert_eq!(lexer.comments().first().map(|c| c.text.to_string()), Some("/** doc */".to_string()));
    }

    #[test]
    fn test_first_line_offset() {
        let mut dict = StringDict::new();
        let mut lexer = Lexer::new("\n\nx", &mut dict).with_first_line(10);
        let token = lexer.next_token();
        assert_eq!(token.span.line, 12);
    }

    #[test]
    fn test_optional_chain_vs_conditional() {
        assert_eq!(lex("a?.b").get(1), Some(&TokenKind::QuestionDot));
        assert_eq!(lex("a?.5:1").get(1), Some(&TokenKind::Question));
    }

    #[test]
    fn test_regexp_literal_with_class() {
        let mut dict = StringDict::new();
        let mut lexer = Lexer::new("/[/]+/gi", &mut dict);
        let token = lexer.scan_regexp();
        assert_eq!(
            token.kind,
            TokenKind::RegExp("[/]+".to_string(), "gi".to_string())
        );
    }
}

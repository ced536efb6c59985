// skema-parser - Lexer for Skema
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Lexer (tokeniser) for Scheme source text.
//!
//! The lexer wraps a growable character buffer and hands out tokens through
//! `peek`/`get`, with `unget` pushing a token back onto an internal deque.
//! `append_input` extends the buffer in place, which is what makes REPL line
//! continuation work: a partial token at end of input yields
//! [`LexResult::Incomplete`] with the cursor restored to the token start, so
//! the next read after appending sees the whole token.

use std::collections::VecDeque;
use std::fmt;

use crate::value::{Number, write_character, write_identifier, write_string_literal};

/// A 1-indexed source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Structural
    ParenLeft,       // (
    ParenRight,      // )
    VectorStart,     // #(
    BytevectorStart, // #u8(
    Quote,           // '
    Backtick,        // `
    Comma,           // ,
    CommaAt,         // ,@
    Period,          // .

    // Atoms
    Identifier,
    BooleanTrue,  // #t / #true
    BooleanFalse, // #f / #false
    Number,
    String,
    Character,

    // Meta
    Directive,    // #!name
    DatumComment, // #;
    EndOfFile,
    Invalid,
}

/// A token: kind, cooked lexeme, and the position it started at.
///
/// The lexeme is the cooked text: decoded string contents, the single
/// character, the normalized `#t`/`#f` word, the directive name without
/// `#!`. The `Display` impl renders a re-lexable form.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub location: Location,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, location: Location) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            location,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::ParenLeft => write!(f, "("),
            TokenKind::ParenRight => write!(f, ")"),
            TokenKind::VectorStart => write!(f, "#("),
            TokenKind::BytevectorStart => write!(f, "#u8("),
            TokenKind::Quote => write!(f, "'"),
            TokenKind::Backtick => write!(f, "`"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::CommaAt => write!(f, ",@"),
            TokenKind::Period => write!(f, "."),
            TokenKind::Identifier => write_identifier(f, &self.lexeme),
            TokenKind::BooleanTrue => write!(f, "#t"),
            TokenKind::BooleanFalse => write!(f, "#f"),
            TokenKind::Number => write!(f, "{}", self.lexeme),
            TokenKind::String => write_string_literal(f, &self.lexeme),
            TokenKind::Character => match self.lexeme.chars().next() {
                Some(c) => write_character(f, c),
                None => write!(f, "#\\"),
            },
            TokenKind::Directive => write!(f, "#!{}", self.lexeme),
            TokenKind::DatumComment => write!(f, "#;"),
            TokenKind::EndOfFile => Ok(()),
            TokenKind::Invalid => write!(f, "{}", self.lexeme),
        }
    }
}

/// The lexical rule a [`LexError`] failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorCode {
    InvalidEscape,
    InvalidHexEscape,
    MalformedBytevector,
    MalformedBoolean,
    MalformedDirective,
    MalformedNumber,
    BadCharacterName,
    UnsupportedRadixPrefix,
    UnknownHashSyntax,
    InvalidCharacter,
}

/// Lexer error with position information.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub code: LexErrorCode,
    pub message: String,
    pub location: Location,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lex error at {}: {}", self.location, self.message)
    }
}

impl std::error::Error for LexError {}

/// The outcome of asking for one token.
///
/// `Incomplete` means the input ended inside a token that a delimiter could
/// still complete (an unterminated string, vertical-bar identifier, block
/// comment, or dangling `#`-prefix); it is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum LexResult {
    Token(Token),
    Incomplete,
    Error(LexError),
}

impl LexResult {
    #[must_use]
    pub fn is_token(&self) -> bool {
        matches!(self, LexResult::Token(_))
    }

    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, LexResult::Incomplete)
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, LexResult::Error(_))
    }
}

// ============================================================================
// Character classes
// ============================================================================

/// Letters and the special initials that may start an identifier.
pub fn is_initial(c: char) -> bool {
    c.is_alphabetic()
        || matches!(
            c,
            '!' | '$' | '%' | '&' | '*' | '/' | ':' | '<' | '=' | '>' | '?' | '^' | '_' | '~'
        )
}

/// Characters that may continue an identifier.
pub fn is_subsequent(c: char) -> bool {
    is_initial(c) || c.is_ascii_digit() || matches!(c, '.' | '@' | '+' | '-')
}

pub fn is_explicit_sign(c: char) -> bool {
    matches!(c, '+' | '-')
}

pub fn is_sign_subsequent(c: char) -> bool {
    is_initial(c) || is_explicit_sign(c) || c == '@'
}

pub fn is_dot_subsequent(c: char) -> bool {
    is_sign_subsequent(c) || c == '.'
}

/// Characters that terminate identifiers, numbers, and `#`-words.
pub fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';' | '|')
}

// ============================================================================
// Lexer
// ============================================================================

/// Cursor snapshot for restoring the scan position of an incomplete token.
#[derive(Clone, Copy)]
struct Mark {
    pos: usize,
    line: usize,
    column: usize,
}

/// The lexer converts source text into tokens.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    /// Pushback queue. Only real tokens are queued; end-of-file, incomplete,
    /// and error results are recomputed so appended input is always observed.
    queue: VecDeque<Token>,
}

impl Lexer {
    /// Create a new lexer for the given source text.
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            queue: VecDeque::new(),
        }
    }

    /// Extend the input. Incomplete tokens at the old end of input are
    /// re-scanned in full on the next read.
    pub fn append_input(&mut self, source: &str) {
        self.chars.extend(source.chars());
    }

    /// Consume and return the next lex result.
    pub fn get(&mut self) -> LexResult {
        if let Some(token) = self.queue.pop_front() {
            return LexResult::Token(token);
        }
        self.read_token()
    }

    /// Return the next lex result without consuming it.
    pub fn peek(&mut self) -> LexResult {
        if let Some(token) = self.queue.front() {
            return LexResult::Token(token.clone());
        }
        let result = self.read_token();
        if let LexResult::Token(token) = &result
            && token.kind != TokenKind::EndOfFile
        {
            self.queue.push_back(token.clone());
        }
        result
    }

    /// Push a token back; it becomes the next token returned.
    pub fn unget(&mut self, token: Token) {
        self.queue.push_front(token);
    }

    /// Current position (1-indexed).
    #[must_use]
    pub fn location(&self) -> Location {
        Location {
            line: self.line,
            column: self.column,
        }
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied();
        if let Some(ch) = c {
            self.pos += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        c
    }

    fn mark(&self) -> Mark {
        Mark {
            pos: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    fn restore(&mut self, mark: Mark) {
        self.pos = mark.pos;
        self.line = mark.line;
        self.column = mark.column;
    }

    fn fail(code: LexErrorCode, message: impl Into<String>, location: Location) -> LexResult {
        LexResult::Error(LexError {
            code,
            message: message.into(),
            location,
        })
    }

    /// Scan one token from the character buffer.
    fn read_token(&mut self) -> LexResult {
        if let Some(incomplete) = self.skip_atmosphere() {
            return incomplete;
        }
        let location = self.location();
        let mark = self.mark();
        let result = match self.peek_char() {
            None => LexResult::Token(Token::new(TokenKind::EndOfFile, "", location)),
            Some('(') => {
                self.advance();
                LexResult::Token(Token::new(TokenKind::ParenLeft, "(", location))
            }
            Some(')') => {
                self.advance();
                LexResult::Token(Token::new(TokenKind::ParenRight, ")", location))
            }
            Some('\'') => {
                self.advance();
                LexResult::Token(Token::new(TokenKind::Quote, "'", location))
            }
            Some('`') => {
                self.advance();
                LexResult::Token(Token::new(TokenKind::Backtick, "`", location))
            }
            Some(',') => {
                self.advance();
                if self.peek_char() == Some('@') {
                    self.advance();
                    LexResult::Token(Token::new(TokenKind::CommaAt, ",@", location))
                } else {
                    LexResult::Token(Token::new(TokenKind::Comma, ",", location))
                }
            }
            Some('"') => self.read_string(location),
            Some('|') => self.read_bar_identifier(location),
            Some('#') => self.read_hash(location),
            Some('.') => self.read_period_or_identifier(location),
            Some(c) if is_explicit_sign(c) => self.read_sign(c, location),
            Some(c) if c.is_ascii_digit() => self.read_number(String::new(), location),
            Some(c) if is_initial(c) => self.read_identifier(location),
            Some(c) => {
                self.advance();
                Self::fail(
                    LexErrorCode::InvalidCharacter,
                    format!("no token can start with '{}'", c),
                    location,
                )
            }
        };
        if result.is_incomplete() {
            self.restore(mark);
        }
        result
    }

    /// Skip whitespace, line comments, and nested block comments. Returns
    /// `Some(Incomplete)` for an unterminated block comment, with the cursor
    /// restored to the comment opening.
    fn skip_atmosphere(&mut self) -> Option<LexResult> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some(';') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some('#') if self.peek_char_at(1) == Some('|') => {
                    let mark = self.mark();
                    self.advance();
                    self.advance();
                    let mut depth = 1usize;
                    while depth > 0 {
                        match self.advance() {
                            Some('|') if self.peek_char() == Some('#') => {
                                self.advance();
                                depth -= 1;
                            }
                            Some('#') if self.peek_char() == Some('|') => {
                                self.advance();
                                depth += 1;
                            }
                            Some(_) => {}
                            None => {
                                self.restore(mark);
                                return Some(LexResult::Incomplete);
                            }
                        }
                    }
                }
                _ => return None,
            }
        }
    }

    fn read_string(&mut self, location: Location) -> LexResult {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.advance() {
                None => return LexResult::Incomplete,
                Some('"') => break,
                Some('\\') => {
                    if let Err(result) = self.read_string_escape(&mut text, location) {
                        return result;
                    }
                }
                Some(c) => text.push(c),
            }
        }
        LexResult::Token(Token::new(TokenKind::String, text, location))
    }

    /// One escape sequence inside a string, after the backslash. Single-letter
    /// escapes take precedence over the spelled-out names, so `\null` is a
    /// newline followed by `ull`.
    fn read_string_escape(&mut self, text: &mut String, location: Location) -> Result<(), LexResult> {
        match self.peek_char() {
            None => Err(LexResult::Incomplete),
            Some('"') => {
                self.advance();
                text.push('"');
                Ok(())
            }
            Some('\\') => {
                self.advance();
                text.push('\\');
                Ok(())
            }
            Some('a') => {
                self.advance();
                text.push('\u{7}');
                Ok(())
            }
            Some('b') => {
                self.advance();
                text.push('\u{8}');
                Ok(())
            }
            Some('t') => {
                self.advance();
                text.push('\t');
                Ok(())
            }
            Some('n') => {
                self.advance();
                text.push('\n');
                Ok(())
            }
            Some('r') => {
                self.advance();
                text.push('\r');
                Ok(())
            }
            Some('x') => {
                self.advance();
                if self.peek_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                    text.push(self.read_hex_escape(location)?);
                } else if self.peek_char().is_none() {
                    return Err(LexResult::Incomplete);
                } else {
                    // No hex digits after \x: a literal x
                    text.push('x');
                }
                Ok(())
            }
            Some(c) if c.is_alphabetic() => {
                let mut name = String::new();
                while let Some(c) = self.peek_char() {
                    if c.is_alphabetic() {
                        name.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
                if self.peek_char().is_none() {
                    // Still inside an unterminated string
                    return Err(LexResult::Incomplete);
                }
                let escaped = match name.as_str() {
                    "alarm" => '\u{7}',
                    "backspace" => '\u{8}',
                    "delete" => '\u{7f}',
                    "escape" => '\u{1b}',
                    "newline" => '\n',
                    "null" => '\0',
                    "return" => '\r',
                    "space" => ' ',
                    "tab" => '\t',
                    _ => {
                        return Err(Self::fail(
                            LexErrorCode::InvalidEscape,
                            format!("unknown string escape: \\{}", name),
                            location,
                        ));
                    }
                };
                text.push(escaped);
                Ok(())
            }
            Some(c) if c.is_whitespace() => {
                // Line continuation: the backslash and the whitespace through
                // the next non-space contribute nothing
                while self.peek_char().is_some_and(|c| c.is_whitespace()) {
                    self.advance();
                }
                Ok(())
            }
            Some(c) => Err(Self::fail(
                LexErrorCode::InvalidEscape,
                format!("unknown string escape: \\{}", c),
                location,
            )),
        }
    }

    /// `\xHH…;` hex digits and the terminating semicolon; the caller has
    /// consumed the `\x` and verified at least one hex digit follows.
    fn read_hex_escape(&mut self, location: Location) -> Result<char, LexResult> {
        let mut digits = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_hexdigit() {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match self.peek_char() {
            None => Err(LexResult::Incomplete),
            Some(';') => {
                self.advance();
                let code = u32::from_str_radix(&digits, 16).map_err(|_| {
                    Self::fail(
                        LexErrorCode::InvalidHexEscape,
                        format!("hex escape out of range: \\x{};", digits),
                        location,
                    )
                })?;
                char::from_u32(code).ok_or_else(|| {
                    Self::fail(
                        LexErrorCode::InvalidHexEscape,
                        format!("hex escape is not a code point: \\x{};", digits),
                        location,
                    )
                })
            }
            Some(_) => Err(Self::fail(
                LexErrorCode::InvalidHexEscape,
                "hex escape without terminating ';'",
                location,
            )),
        }
    }

    fn read_bar_identifier(&mut self, location: Location) -> LexResult {
        self.advance(); // opening bar
        let mut name = String::new();
        loop {
            match self.advance() {
                None => return LexResult::Incomplete,
                Some('|') => break,
                Some('\\') => match self.peek_char() {
                    None => return LexResult::Incomplete,
                    Some('x') => {
                        self.advance();
                        match self.read_hex_escape(location) {
                            Ok(c) => name.push(c),
                            Err(result) => return result,
                        }
                    }
                    Some('a') => {
                        self.advance();
                        name.push('\u{7}');
                    }
                    Some('b') => {
                        self.advance();
                        name.push('\u{8}');
                    }
                    Some('t') => {
                        self.advance();
                        name.push('\t');
                    }
                    Some('n') => {
                        self.advance();
                        name.push('\n');
                    }
                    Some('r') => {
                        self.advance();
                        name.push('\r');
                    }
                    Some('|') => {
                        self.advance();
                        name.push('|');
                    }
                    Some(c) => {
                        return Self::fail(
                            LexErrorCode::InvalidEscape,
                            format!("unknown symbol escape: \\{}", c),
                            location,
                        );
                    }
                },
                Some(c) => name.push(c),
            }
        }
        LexResult::Token(Token::new(TokenKind::Identifier, name, location))
    }

    fn read_hash(&mut self, location: Location) -> LexResult {
        self.advance(); // #
        match self.peek_char() {
            None => LexResult::Incomplete,
            Some('(') => {
                self.advance();
                LexResult::Token(Token::new(TokenKind::VectorStart, "#(", location))
            }
            Some('u') => {
                self.advance();
                match self.peek_char() {
                    None => LexResult::Incomplete,
                    Some('8') => {
                        self.advance();
                        match self.peek_char() {
                            None => LexResult::Incomplete,
                            Some('(') => {
                                self.advance();
                                LexResult::Token(Token::new(
                                    TokenKind::BytevectorStart,
                                    "#u8(",
                                    location,
                                ))
                            }
                            Some(c) => Self::fail(
                                LexErrorCode::MalformedBytevector,
                                format!("expected '(' after #u8, found '{}'", c),
                                location,
                            ),
                        }
                    }
                    Some(c) => Self::fail(
                        LexErrorCode::MalformedBytevector,
                        format!("expected '8' after #u, found '{}'", c),
                        location,
                    ),
                }
            }
            Some('\\') => {
                self.advance();
                self.read_character(location)
            }
            Some('t') | Some('f') => {
                let mut word = String::new();
                while let Some(c) = self.peek_char() {
                    if c.is_ascii_alphabetic() {
                        word.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
                match word.as_str() {
                    "t" | "true" => {
                        LexResult::Token(Token::new(TokenKind::BooleanTrue, "#t", location))
                    }
                    "f" | "false" => {
                        LexResult::Token(Token::new(TokenKind::BooleanFalse, "#f", location))
                    }
                    _ => Self::fail(
                        LexErrorCode::MalformedBoolean,
                        format!("invalid boolean: #{}", word),
                        location,
                    ),
                }
            }
            Some(';') => {
                self.advance();
                LexResult::Token(Token::new(TokenKind::DatumComment, "#;", location))
            }
            Some('!') => {
                self.advance();
                let mut name = String::new();
                while let Some(c) = self.peek_char() {
                    if is_delimiter(c) {
                        break;
                    }
                    name.push(c);
                    self.advance();
                }
                if name.is_empty() {
                    Self::fail(
                        LexErrorCode::MalformedDirective,
                        "empty #! directive",
                        location,
                    )
                } else {
                    LexResult::Token(Token::new(TokenKind::Directive, name, location))
                }
            }
            Some(c @ ('b' | 'o' | 'd' | 'x' | 'e' | 'i')) => Self::fail(
                LexErrorCode::UnsupportedRadixPrefix,
                format!("radix prefix #{} is not supported", c),
                location,
            ),
            Some(c) => Self::fail(
                LexErrorCode::UnknownHashSyntax,
                format!("unknown # syntax: #{}", c),
                location,
            ),
        }
    }

    /// The character after `#\` has not been consumed yet.
    fn read_character(&mut self, location: Location) -> LexResult {
        match self.peek_char() {
            None => LexResult::Incomplete,
            Some('x') => {
                self.advance();
                if self.peek_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                    let mut digits = String::new();
                    while let Some(c) = self.peek_char() {
                        if c.is_ascii_hexdigit() {
                            digits.push(c);
                            self.advance();
                        } else {
                            break;
                        }
                    }
                    let scalar = u32::from_str_radix(&digits, 16)
                        .ok()
                        .and_then(char::from_u32);
                    match scalar {
                        Some(c) => LexResult::Token(Token::new(
                            TokenKind::Character,
                            c.to_string(),
                            location,
                        )),
                        None => Self::fail(
                            LexErrorCode::InvalidHexEscape,
                            format!("#\\x{} is not a code point", digits),
                            location,
                        ),
                    }
                } else {
                    // Bare #\x is the letter x
                    LexResult::Token(Token::new(TokenKind::Character, "x", location))
                }
            }
            Some(c) if c.is_alphabetic() => {
                let mut name = String::new();
                while let Some(c) = self.peek_char() {
                    if c.is_alphanumeric() {
                        name.push(c);
                        self.advance();
                    } else {
                        break;
                    }
                }
                if name.chars().count() == 1 {
                    LexResult::Token(Token::new(TokenKind::Character, name, location))
                } else {
                    let named = match name.as_str() {
                        "alarm" => Some('\u{7}'),
                        "backspace" => Some('\u{8}'),
                        "delete" => Some('\u{7f}'),
                        "escape" => Some('\u{1b}'),
                        "newline" => Some('\n'),
                        "null" => Some('\0'),
                        "return" => Some('\r'),
                        "space" => Some(' '),
                        "tab" => Some('\t'),
                        _ => None,
                    };
                    match named {
                        Some(c) => LexResult::Token(Token::new(
                            TokenKind::Character,
                            c.to_string(),
                            location,
                        )),
                        None => Self::fail(
                            LexErrorCode::BadCharacterName,
                            format!("unknown character name: #\\{}", name),
                            location,
                        ),
                    }
                }
            }
            Some(c) => {
                self.advance();
                LexResult::Token(Token::new(TokenKind::Character, c.to_string(), location))
            }
        }
    }

    /// Disambiguate `.`: a dot subsequent makes an identifier, anything else
    /// is the standalone period token.
    fn read_period_or_identifier(&mut self, location: Location) -> LexResult {
        self.advance(); // .
        match self.peek_char() {
            Some(c) if is_dot_subsequent(c) => {
                let mut name = String::from(".");
                name.push(c);
                self.advance();
                self.push_subsequents(&mut name);
                LexResult::Token(Token::new(TokenKind::Identifier, name, location))
            }
            _ => LexResult::Token(Token::new(TokenKind::Period, ".", location)),
        }
    }

    /// An explicit sign starts either a number or an identifier; commit only
    /// after looking at what follows.
    fn read_sign(&mut self, sign: char, location: Location) -> LexResult {
        self.advance(); // sign
        match self.peek_char() {
            Some(c) if c.is_ascii_digit() => self.read_number(sign.to_string(), location),
            Some('.') => match self.peek_char_at(1) {
                Some(c) if c.is_ascii_digit() => {
                    self.advance(); // .
                    self.read_number(format!("{}.", sign), location)
                }
                Some(c) if is_dot_subsequent(c) => {
                    let mut name = String::new();
                    name.push(sign);
                    name.push('.');
                    self.advance(); // .
                    name.push(c);
                    self.advance();
                    self.push_subsequents(&mut name);
                    LexResult::Token(Token::new(TokenKind::Identifier, name, location))
                }
                _ => {
                    self.advance(); // .
                    LexResult::Token(Token::new(
                        TokenKind::Identifier,
                        format!("{}.", sign),
                        location,
                    ))
                }
            },
            Some(c) if is_sign_subsequent(c) => {
                let mut name = String::new();
                name.push(sign);
                name.push(c);
                self.advance();
                self.push_subsequents(&mut name);
                LexResult::Token(Token::new(TokenKind::Identifier, name, location))
            }
            _ => LexResult::Token(Token::new(
                TokenKind::Identifier,
                sign.to_string(),
                location,
            )),
        }
    }

    /// Decimal number: the buffer already holds any sign/dot prefix.
    fn read_number(&mut self, mut buffer: String, location: Location) -> LexResult {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                buffer.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if self.peek_char() == Some('.') && !buffer.contains('.') {
            buffer.push('.');
            self.advance();
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    buffer.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        if self.peek_char() == Some('/') && !buffer.contains('/') {
            buffer.push('/');
            self.advance();
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    buffer.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        match Number::parse(&buffer) {
            Some(_) => LexResult::Token(Token::new(TokenKind::Number, buffer, location)),
            None => Self::fail(
                LexErrorCode::MalformedNumber,
                format!("invalid number: {}", buffer),
                location,
            ),
        }
    }

    fn read_identifier(&mut self, location: Location) -> LexResult {
        let mut name = String::new();
        if let Some(c) = self.peek_char() {
            name.push(c);
            self.advance();
        }
        self.push_subsequents(&mut name);
        LexResult::Token(Token::new(TokenKind::Identifier, name, location))
    }

    fn push_subsequents(&mut self, name: &mut String) {
        while let Some(c) = self.peek_char() {
            if is_subsequent(c) {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            match lexer.get() {
                LexResult::Token(t) => {
                    if t.kind == TokenKind::EndOfFile {
                        break;
                    }
                    tokens.push(t);
                }
                other => panic!("unexpected lex result: {:?}", other),
            }
        }
        tokens
    }

    fn summary(source: &str) -> Vec<(TokenKind, String)> {
        lex_all(source)
            .into_iter()
            .map(|t| (t.kind, t.lexeme))
            .collect()
    }

    fn one(source: &str) -> (TokenKind, String) {
        let mut tokens = summary(source);
        assert_eq!(tokens.len(), 1, "expected one token from {:?}", source);
        tokens.remove(0)
    }

    fn error_code(source: &str) -> LexErrorCode {
        let mut lexer = Lexer::new(source);
        loop {
            match lexer.get() {
                LexResult::Token(t) if t.kind == TokenKind::EndOfFile => {
                    panic!("no error in {:?}", source)
                }
                LexResult::Token(_) => {}
                LexResult::Error(e) => return e.code,
                LexResult::Incomplete => panic!("incomplete, not error, in {:?}", source),
            }
        }
    }

    fn is_incomplete(source: &str) -> bool {
        let mut lexer = Lexer::new(source);
        loop {
            match lexer.get() {
                LexResult::Token(t) if t.kind == TokenKind::EndOfFile => return false,
                LexResult::Token(_) => {}
                LexResult::Incomplete => return true,
                LexResult::Error(e) => panic!("error in {:?}: {}", source, e),
            }
        }
    }

    #[test]
    fn test_structural_tokens() {
        assert_eq!(
            summary("()'`,,@ ."),
            vec![
                (TokenKind::ParenLeft, "(".to_string()),
                (TokenKind::ParenRight, ")".to_string()),
                (TokenKind::Quote, "'".to_string()),
                (TokenKind::Backtick, "`".to_string()),
                (TokenKind::Comma, ",".to_string()),
                (TokenKind::CommaAt, ",@".to_string()),
                (TokenKind::Period, ".".to_string()),
            ]
        );
    }

    #[test]
    fn test_vector_and_bytevector_start() {
        assert_eq!(one("#("), (TokenKind::VectorStart, "#(".to_string()));
        assert_eq!(
            summary("#u8("),
            vec![(TokenKind::BytevectorStart, "#u8(".to_string())]
        );
    }

    #[test]
    fn test_booleans() {
        assert_eq!(one("#t"), (TokenKind::BooleanTrue, "#t".to_string()));
        assert_eq!(one("#true"), (TokenKind::BooleanTrue, "#t".to_string()));
        assert_eq!(one("#f"), (TokenKind::BooleanFalse, "#f".to_string()));
        assert_eq!(one("#false"), (TokenKind::BooleanFalse, "#f".to_string()));
    }

    #[test]
    fn test_malformed_boolean() {
        assert_eq!(error_code("#tr"), LexErrorCode::MalformedBoolean);
        assert_eq!(error_code("#falsey"), LexErrorCode::MalformedBoolean);
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(one("lambda"), (TokenKind::Identifier, "lambda".to_string()));
        assert_eq!(
            one("list->vector"),
            (TokenKind::Identifier, "list->vector".to_string())
        );
        assert_eq!(one("set!"), (TokenKind::Identifier, "set!".to_string()));
        assert_eq!(one("<=?"), (TokenKind::Identifier, "<=?".to_string()));
    }

    #[test]
    fn test_sign_identifiers() {
        assert_eq!(one("+"), (TokenKind::Identifier, "+".to_string()));
        assert_eq!(one("-"), (TokenKind::Identifier, "-".to_string()));
        assert_eq!(one("->"), (TokenKind::Identifier, "->".to_string()));
        assert_eq!(one("+soup+"), (TokenKind::Identifier, "+soup+".to_string()));
        assert_eq!(one("-x"), (TokenKind::Identifier, "-x".to_string()));
    }

    #[test]
    fn test_dot_identifiers() {
        assert_eq!(one("..."), (TokenKind::Identifier, "...".to_string()));
        assert_eq!(one(".x"), (TokenKind::Identifier, ".x".to_string()));
        assert_eq!(one("+.."), (TokenKind::Identifier, "+..".to_string()));
    }

    #[test]
    fn test_bar_identifiers() {
        assert_eq!(
            one("|two words|"),
            (TokenKind::Identifier, "two words".to_string())
        );
        assert_eq!(one("||"), (TokenKind::Identifier, "".to_string()));
        assert_eq!(
            one(r"|a\|b|"),
            (TokenKind::Identifier, "a|b".to_string())
        );
        assert_eq!(one(r"|a\n|"), (TokenKind::Identifier, "a\n".to_string()));
        assert_eq!(
            one(r"|\x3bb;|"),
            (TokenKind::Identifier, "\u{3bb}".to_string())
        );
    }

    #[test]
    fn test_bar_identifier_bad_escape() {
        assert_eq!(error_code(r"|a\q|"), LexErrorCode::InvalidEscape);
        assert_eq!(error_code(r"|\x3bb|"), LexErrorCode::InvalidHexEscape);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(one("42"), (TokenKind::Number, "42".to_string()));
        assert_eq!(one("-1"), (TokenKind::Number, "-1".to_string()));
        assert_eq!(one("+5"), (TokenKind::Number, "+5".to_string()));
        assert_eq!(one("3.14"), (TokenKind::Number, "3.14".to_string()));
        assert_eq!(one("1/2"), (TokenKind::Number, "1/2".to_string()));
        assert_eq!(one("-1/3"), (TokenKind::Number, "-1/3".to_string()));
        assert_eq!(one("+.5"), (TokenKind::Number, "+.5".to_string()));
    }

    #[test]
    fn test_malformed_numbers() {
        assert_eq!(error_code("1/0"), LexErrorCode::MalformedNumber);
        assert_eq!(error_code("1/"), LexErrorCode::MalformedNumber);
        assert_eq!(
            error_code("99999999999999999999999"),
            LexErrorCode::MalformedNumber
        );
    }

    #[test]
    fn test_radix_prefixes_rejected() {
        assert_eq!(error_code("#b101"), LexErrorCode::UnsupportedRadixPrefix);
        assert_eq!(error_code("#xff"), LexErrorCode::UnsupportedRadixPrefix);
        assert_eq!(error_code("#e1"), LexErrorCode::UnsupportedRadixPrefix);
    }

    #[test]
    fn test_strings() {
        assert_eq!(one(r#""""#), (TokenKind::String, "".to_string()));
        assert_eq!(one(r#""hello""#), (TokenKind::String, "hello".to_string()));
        assert_eq!(one(r#""a\nb""#), (TokenKind::String, "a\nb".to_string()));
        assert_eq!(
            one(r#""tab\there""#),
            (TokenKind::String, "tab\there".to_string())
        );
        assert_eq!(
            one(r#""say \"hi\"""#),
            (TokenKind::String, "say \"hi\"".to_string())
        );
        assert_eq!(one(r#""a\\b""#), (TokenKind::String, "a\\b".to_string()));
    }

    #[test]
    fn test_string_named_escapes() {
        assert_eq!(
            one(r#""\delete\escape\space""#),
            (TokenKind::String, "\u{7f}\u{1b} ".to_string())
        );
    }

    #[test]
    fn test_string_hex_escape() {
        assert_eq!(
            one(r#""\x41;\x3bb;""#),
            (TokenKind::String, "A\u{3bb}".to_string())
        );
        // \x with no digits is a literal x
        assert_eq!(one(r#""\xg""#), (TokenKind::String, "xg".to_string()));
    }

    #[test]
    fn test_string_hex_escape_requires_semicolon() {
        assert_eq!(error_code(r#""\x41""#), LexErrorCode::InvalidHexEscape);
    }

    #[test]
    fn test_string_line_continuation() {
        assert_eq!(
            one("\"one\\\n   two\""),
            (TokenKind::String, "onetwo".to_string())
        );
    }

    #[test]
    fn test_string_bad_escape() {
        assert_eq!(error_code(r#""\q ""#), LexErrorCode::InvalidEscape);
        assert_eq!(error_code(r#""\( ""#), LexErrorCode::InvalidEscape);
    }

    #[test]
    fn test_characters() {
        assert_eq!(one(r"#\a"), (TokenKind::Character, "a".to_string()));
        assert_eq!(one(r"#\Z"), (TokenKind::Character, "Z".to_string()));
        assert_eq!(one(r"#\7"), (TokenKind::Character, "7".to_string()));
        assert_eq!(one(r"#\("), (TokenKind::Character, "(".to_string()));
        assert_eq!(one(r"#\newline"), (TokenKind::Character, "\n".to_string()));
        assert_eq!(one(r"#\space"), (TokenKind::Character, " ".to_string()));
        assert_eq!(one(r"#\tab"), (TokenKind::Character, "\t".to_string()));
    }

    #[test]
    fn test_hex_characters() {
        assert_eq!(one(r"#\x41"), (TokenKind::Character, "A".to_string()));
        assert_eq!(
            one(r"#\x3bb"),
            (TokenKind::Character, "\u{3bb}".to_string())
        );
        // Bare #\x is the letter x
        assert_eq!(one(r"#\x"), (TokenKind::Character, "x".to_string()));
    }

    #[test]
    fn test_bad_character_name() {
        assert_eq!(error_code(r"#\frob"), LexErrorCode::BadCharacterName);
    }

    #[test]
    fn test_line_comments() {
        assert_eq!(
            summary("1 ; comment\n2"),
            vec![
                (TokenKind::Number, "1".to_string()),
                (TokenKind::Number, "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_nested_block_comments() {
        assert_eq!(
            summary("#| outer #| inner |# still-outer |# 7"),
            vec![(TokenKind::Number, "7".to_string())]
        );
    }

    #[test]
    fn test_datum_comment_token() {
        assert_eq!(
            summary("#;1"),
            vec![
                (TokenKind::DatumComment, "#;".to_string()),
                (TokenKind::Number, "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_directive() {
        assert_eq!(one("#!quit"), (TokenKind::Directive, "quit".to_string()));
        assert_eq!(error_code("#! "), LexErrorCode::MalformedDirective);
    }

    #[test]
    fn test_invalid_character() {
        assert_eq!(error_code("["), LexErrorCode::InvalidCharacter);
        assert_eq!(error_code("#zed"), LexErrorCode::UnknownHashSyntax);
    }

    #[test]
    fn test_incomplete_tokens() {
        assert!(is_incomplete("\"unterminated"));
        assert!(is_incomplete("\"trailing backslash\\"));
        assert!(is_incomplete("|unterminated"));
        assert!(is_incomplete("#| unterminated"));
        assert!(is_incomplete("#| nested #| |# still open"));
        assert!(is_incomplete("#"));
        assert!(is_incomplete("#u"));
        assert!(is_incomplete("#u8"));
        assert!(is_incomplete("#\\"));
    }

    #[test]
    fn test_end_of_input_delimits_words() {
        assert!(!is_incomplete("abc"));
        assert!(!is_incomplete("42"));
        assert!(!is_incomplete("#t"));
        assert!(!is_incomplete(r"#\a"));
        assert!(!is_incomplete("#!quit"));
        assert!(!is_incomplete(","));
    }

    #[test]
    fn test_append_input_completes_token() {
        let mut lexer = Lexer::new("\"hal");
        assert!(lexer.get().is_incomplete());
        lexer.append_input("f\"");
        match lexer.get() {
            LexResult::Token(t) => {
                assert_eq!(t.kind, TokenKind::String);
                assert_eq!(t.lexeme, "half");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_append_input_after_eof() {
        let mut lexer = Lexer::new("1");
        assert!(matches!(
            lexer.get(),
            LexResult::Token(t) if t.kind == TokenKind::Number
        ));
        assert!(matches!(
            lexer.get(),
            LexResult::Token(t) if t.kind == TokenKind::EndOfFile
        ));
        lexer.append_input(" 2");
        assert!(matches!(
            lexer.get(),
            LexResult::Token(t) if t.kind == TokenKind::Number && t.lexeme == "2"
        ));
    }

    #[test]
    fn test_peek_and_unget() {
        let mut lexer = Lexer::new("a b");
        let peeked = match lexer.peek() {
            LexResult::Token(t) => t,
            other => panic!("unexpected: {:?}", other),
        };
        let got = match lexer.get() {
            LexResult::Token(t) => t,
            other => panic!("unexpected: {:?}", other),
        };
        assert_eq!(peeked, got);

        lexer.unget(got.clone());
        assert!(matches!(
            lexer.get(),
            LexResult::Token(t) if t.lexeme == "a"
        ));
        assert!(matches!(
            lexer.get(),
            LexResult::Token(t) if t.lexeme == "b"
        ));
    }

    #[test]
    fn test_locations() {
        let tokens = lex_all("(a\n  b)");
        assert_eq!(tokens[0].location, Location { line: 1, column: 1 });
        assert_eq!(tokens[1].location, Location { line: 1, column: 2 });
        assert_eq!(tokens[2].location, Location { line: 2, column: 3 });
        assert_eq!(tokens[3].location, Location { line: 2, column: 4 });
    }

    #[test]
    fn test_period_before_digit_is_separate() {
        // .5 is not a number at this layer: the dot stands alone
        assert_eq!(
            summary(".5"),
            vec![
                (TokenKind::Period, ".".to_string()),
                (TokenKind::Number, "5".to_string()),
            ]
        );
    }

    #[test]
    fn test_token_display_relexes() {
        let source = r#"(define str "a\nb") #\newline |odd name| 1/2 #!quit"#;
        let first = lex_all(source);
        let rendered = first
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let second = lex_all(&rendered);
        assert_eq!(
            first
                .iter()
                .map(|t| (t.kind, t.lexeme.clone()))
                .collect::<Vec<_>>(),
            second
                .iter()
                .map(|t| (t.kind, t.lexeme.clone()))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_whole_program() {
        assert_eq!(
            summary("(define (id x) x)"),
            vec![
                (TokenKind::ParenLeft, "(".to_string()),
                (TokenKind::Identifier, "define".to_string()),
                (TokenKind::ParenLeft, "(".to_string()),
                (TokenKind::Identifier, "id".to_string()),
                (TokenKind::Identifier, "x".to_string()),
                (TokenKind::ParenRight, ")".to_string()),
                (TokenKind::Identifier, "x".to_string()),
                (TokenKind::ParenRight, ")".to_string()),
            ]
        );
    }
}

// skema-parser - Datum parser for Skema
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Recursive descent parser from tokens to datums.
//!
//! The parser is built for interactive use: when the token stream runs out
//! mid-expression it reports [`ParserResult::Incomplete`] and restores every
//! token it consumed, so the caller can append more input to the same
//! [`ParserInput`] and call [`parse_datum`] again from a clean slate.

use std::collections::VecDeque;
use std::fmt;

use crate::lexer::{LexError, LexResult, Lexer, Token, TokenKind};
use crate::value::{Datum, Number};

/// Parser error, carrying the offending token when there is one.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub token: Option<Token>,
}

impl ParseError {
    fn new(message: impl Into<String>, token: Option<Token>) -> Self {
        ParseError {
            message: message.into(),
            token,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.token {
            Some(token) => write!(
                f,
                "parse error at {}: {} (found {})",
                token.location, self.message, token
            ),
            None => write!(f, "parse error: {}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// The outcome of a parse rule.
#[derive(Debug, Clone)]
pub enum ParserResult {
    /// Intermediate success with nothing consumed; used between sub-rules,
    /// never returned by [`parse_datum`].
    Valid,
    /// The token stream ran out mid-datum; append input and retry.
    Incomplete,
    /// A whole datum.
    Complete(Datum),
    /// The lexer failed underneath the parser.
    LexerError(LexError),
    /// The token stream violated the datum grammar.
    ParserError(ParseError),
}

impl ParserResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, ParserResult::Valid)
    }

    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        matches!(self, ParserResult::Incomplete)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, ParserResult::Complete(_))
    }

    #[must_use]
    pub fn is_lexer_error(&self) -> bool {
        matches!(self, ParserResult::LexerError(_))
    }

    #[must_use]
    pub fn is_parser_error(&self) -> bool {
        matches!(self, ParserResult::ParserError(_))
    }
}

/// Token source for the parser: a lexer plus the parser's own pushback deque
/// and the record of tokens consumed by the parse in progress.
pub struct ParserInput {
    lexer: Lexer,
    tokens: VecDeque<Token>,
    trail: Vec<Token>,
}

impl ParserInput {
    pub fn new(source: &str) -> Self {
        ParserInput {
            lexer: Lexer::new(source),
            tokens: VecDeque::new(),
            trail: Vec::new(),
        }
    }

    /// Extend the underlying input; used by hosts on `Incomplete`.
    pub fn append_input(&mut self, source: &str) {
        self.lexer.append_input(source);
    }

    /// Look at the next lex result without consuming it.
    pub fn peek(&mut self) -> LexResult {
        if let Some(token) = self.tokens.front() {
            return LexResult::Token(token.clone());
        }
        self.lexer.peek()
    }

    /// Consume the next lex result. Consumed tokens are recorded so an
    /// incomplete parse can restore them.
    pub fn get(&mut self) -> LexResult {
        let result = match self.tokens.pop_front() {
            Some(token) => LexResult::Token(token),
            None => self.lexer.get(),
        };
        if let LexResult::Token(token) = &result
            && token.kind != TokenKind::EndOfFile
        {
            self.trail.push(token.clone());
        }
        result
    }

    /// Push a token back; it becomes the next token and is no longer counted
    /// as consumed.
    pub fn unget(&mut self, token: Token) {
        if let Some(idx) = self.trail.iter().rposition(|t| t == &token) {
            self.trail.remove(idx);
        }
        self.tokens.push_front(token);
    }

    fn restore_trail(&mut self) {
        while let Some(token) = self.trail.pop() {
            self.tokens.push_front(token);
        }
    }
}

/// Parse one datum. Returns `Complete`, `Incomplete` (with all consumed
/// tokens restored), `LexerError`, or `ParserError` — never `Valid`.
pub fn parse_datum(input: &mut ParserInput) -> ParserResult {
    input.trail.clear();
    let result = parse_datum_inner(input);
    if result.is_incomplete() {
        input.restore_trail();
    } else {
        input.trail.clear();
    }
    result
}

fn parse_datum_inner(input: &mut ParserInput) -> ParserResult {
    // Drain datum-comment prefixes, then handle quotation shorthands
    loop {
        let next = match input.peek() {
            LexResult::Token(token) => token,
            LexResult::Incomplete => return ParserResult::Incomplete,
            LexResult::Error(e) => return ParserResult::LexerError(e),
        };
        match next.kind {
            TokenKind::EndOfFile => return ParserResult::Incomplete,
            TokenKind::DatumComment => {
                input.get();
                let discarded = parse_datum_inner(input);
                if !discarded.is_complete() {
                    return discarded;
                }
            }
            TokenKind::Quote | TokenKind::Backtick | TokenKind::Comma | TokenKind::CommaAt => {
                let saved = match input.get() {
                    LexResult::Token(token) => token,
                    LexResult::Incomplete => return ParserResult::Incomplete,
                    LexResult::Error(e) => return ParserResult::LexerError(e),
                };
                let wrapper = match saved.kind {
                    TokenKind::Quote => "quote",
                    TokenKind::Backtick => "quasiquote",
                    TokenKind::Comma => "unquote",
                    _ => "unquote-splicing",
                };
                let sub = parse_datum_inner(input);
                return match sub {
                    ParserResult::Complete(datum) => ParserResult::Complete(Datum::list(vec![
                        Datum::symbol(wrapper),
                        datum,
                    ])),
                    other => {
                        // Put the quotation token back so the stream is
                        // restartable
                        input.unget(saved);
                        other
                    }
                };
            }
            _ => break,
        }
    }

    let simple = parse_simple(input);
    if !simple.is_valid() {
        return simple;
    }

    let next = match input.peek() {
        LexResult::Token(token) => token,
        LexResult::Incomplete => return ParserResult::Incomplete,
        LexResult::Error(e) => return ParserResult::LexerError(e),
    };
    match next.kind {
        TokenKind::ParenLeft => parse_list(input),
        TokenKind::VectorStart => parse_vector(input),
        TokenKind::BytevectorStart => ParserResult::ParserError(ParseError::new(
            "bytevector literals are not supported",
            Some(next),
        )),
        TokenKind::Directive => ParserResult::ParserError(ParseError::new(
            "a directive is not a datum",
            Some(next),
        )),
        _ => ParserResult::ParserError(ParseError::new(
            "could not parse non-simple datum",
            Some(next),
        )),
    }
}

/// Parse an atom. Returns `Valid` (nothing consumed) when the next token does
/// not start a simple datum.
fn parse_simple(input: &mut ParserInput) -> ParserResult {
    let next = match input.peek() {
        LexResult::Token(token) => token,
        LexResult::Incomplete => return ParserResult::Incomplete,
        LexResult::Error(e) => return ParserResult::LexerError(e),
    };
    match next.kind {
        TokenKind::Identifier => {
            input.get();
            ParserResult::Complete(Datum::symbol(&next.lexeme))
        }
        TokenKind::String => {
            input.get();
            ParserResult::Complete(Datum::string(next.lexeme))
        }
        TokenKind::BooleanTrue => {
            input.get();
            ParserResult::Complete(Datum::boolean(true))
        }
        TokenKind::BooleanFalse => {
            input.get();
            ParserResult::Complete(Datum::boolean(false))
        }
        TokenKind::Number => {
            input.get();
            match Number::parse(&next.lexeme) {
                Some(number) => ParserResult::Complete(Datum::Number(number)),
                None => ParserResult::ParserError(ParseError::new(
                    "malformed number literal",
                    Some(next),
                )),
            }
        }
        TokenKind::Character => {
            input.get();
            match next.lexeme.chars().next() {
                Some(c) => ParserResult::Complete(Datum::character(c)),
                None => ParserResult::ParserError(ParseError::new(
                    "empty character literal",
                    Some(next),
                )),
            }
        }
        _ => ParserResult::Valid,
    }
}

fn parse_list(input: &mut ParserInput) -> ParserResult {
    input.get(); // consume (
    let mut items: Vec<Datum> = Vec::new();
    loop {
        let next = match input.peek() {
            LexResult::Token(token) => token,
            LexResult::Incomplete => return ParserResult::Incomplete,
            LexResult::Error(e) => return ParserResult::LexerError(e),
        };
        match next.kind {
            TokenKind::EndOfFile => return ParserResult::Incomplete,
            TokenKind::ParenRight => {
                input.get();
                return ParserResult::Complete(Datum::list(items));
            }
            TokenKind::Period => {
                input.get();
                let tail = match parse_datum_inner(input) {
                    ParserResult::Complete(datum) => datum,
                    other => return other,
                };
                let close = match input.peek() {
                    LexResult::Token(token) => token,
                    LexResult::Incomplete => return ParserResult::Incomplete,
                    LexResult::Error(e) => return ParserResult::LexerError(e),
                };
                return match close.kind {
                    TokenKind::EndOfFile => ParserResult::Incomplete,
                    TokenKind::ParenRight => {
                        input.get();
                        ParserResult::Complete(Datum::improper_list(items, tail))
                    }
                    _ => ParserResult::ParserError(ParseError::new(
                        "expected ')' after improper list tail",
                        Some(close),
                    )),
                };
            }
            _ => match parse_datum_inner(input) {
                ParserResult::Complete(datum) => items.push(datum),
                other => return other,
            },
        }
    }
}

fn parse_vector(input: &mut ParserInput) -> ParserResult {
    input.get(); // consume #(
    let mut items: Vec<Datum> = Vec::new();
    loop {
        let next = match input.peek() {
            LexResult::Token(token) => token,
            LexResult::Incomplete => return ParserResult::Incomplete,
            LexResult::Error(e) => return ParserResult::LexerError(e),
        };
        match next.kind {
            TokenKind::EndOfFile => return ParserResult::Incomplete,
            TokenKind::ParenRight => {
                input.get();
                return ParserResult::Complete(Datum::vector(items));
            }
            _ => match parse_datum_inner(input) {
                ParserResult::Complete(datum) => items.push(datum),
                other => return other,
            },
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

// skema-parser - Lexer and datum parser for the Skema Scheme system
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! # skema-parser
//!
//! Lexer and datum parser for the Skema Scheme system. Turns source text into
//! tokens and tokens into `Datum` trees, tolerating incomplete input so a
//! REPL can read expressions across lines.

pub mod lexer;
pub mod parser;
pub mod symbol;
pub mod value;

pub use im::Vector;
pub use lexer::{LexError, LexErrorCode, LexResult, Lexer, Location, Token, TokenKind};
pub use parser::{ParseError, ParserInput, ParserResult, parse_datum};
pub use symbol::Symbol;
pub use value::{Closure, CustomType, Datum, DatumCustom, Number, Pair};

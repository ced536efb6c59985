// skema-core - Error types for environments and list operations
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Error types shared by the environment and list operations.

use std::fmt;

use skema_parser::Symbol;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from environment lookups and list operations.
#[derive(Debug, Clone)]
pub enum Error {
    /// Reference to a symbol with no binding in the environment chain
    UnboundVariable(Symbol),
    /// Wrong type for an operation
    TypeError {
        expected: &'static str,
        got: &'static str,
        context: Option<String>,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnboundVariable(sym) => {
                write!(f, "unbound variable: {}", sym)
            }
            Error::TypeError {
                expected,
                got,
                context,
            } => {
                if let Some(ctx) = context {
                    write!(f, "{}: expected {}, got {}", ctx, expected, got)
                } else {
                    write!(f, "type error: expected {}, got {}", expected, got)
                }
            }
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Create a type error.
    pub fn type_error(expected: &'static str, got: &'static str) -> Self {
        Error::TypeError {
            expected,
            got,
            context: None,
        }
    }

    /// Create a type error with context.
    pub fn type_error_in(
        context: impl Into<String>,
        expected: &'static str,
        got: &'static str,
    ) -> Self {
        Error::TypeError {
            expected,
            got,
            context: Some(context.into()),
        }
    }
}

//! Centralised error hierarchy for the interpreter.
//!
//! Every pipeline stage (scanner, parser, resolver, runtime) converts its
//! failure modes into a [`LoxError`] variant, giving the crate one uniform
//! `Result<T>` alias and one uniform diagnostic format:
//!
//! ```text
//! [line N] Error<location>: <message>
//! ```
//!
//! `<location>` is empty for scanner errors (no token exists yet) and
//! ` at '<lexeme>'` / ` at end` for token-anchored errors.  The module does
//! not print diagnostics itself; the front end decides where they go.

use std::io;

use log::info;
use thiserror::Error;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error.  Carries a line only.
    #[error("[line {line}] Error: {message}")]
    Lex { message: String, line: usize },

    /// Syntactic (parser) error, anchored to the offending token.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        location: String,
        line: usize,
    },

    /// Static-analysis failure from the resolver pass.
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        location: String,
        line: usize,
    },

    /// Runtime evaluation error, anchored to the offending token.
    #[error("[line {line}] Error{location}: {message}")]
    Runtime {
        message: String,
        location: String,
        line: usize,
    },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Renders the ` at '<lexeme>'` / ` at end` suffix for a token-anchored error.
fn location_of(token: &Token<'_>) -> String {
    if matches!(token.token_type, TokenType::EOF) {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        let message: String = msg.into();

        info!("Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        let message: String = msg.into();

        info!("Resolve error: line={}, msg={}", token.line, message);

        LoxError::Resolve {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(token: &Token<'_>, msg: S) -> Self {
        let message: String = msg.into();

        info!("Runtime error: line={}, msg={}", token.line, message);

        LoxError::Runtime {
            message,
            location: location_of(token),
            line: token.line,
        }
    }

    /// Process exit code for a batch run that ended with this error:
    /// 65 for any static (scan/parse/resolve) failure, 70 once execution
    /// has begun.
    pub const fn exit_code(&self) -> i32 {
        match self {
            LoxError::Runtime { .. } | LoxError::Io(_) => 70,
            _ => 65,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

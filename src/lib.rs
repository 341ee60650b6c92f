//! Lexer and parser for the mash shell language.
//!
//! Turns source text typed at a prompt, or loaded from a script, into a
//! typed AST of statements and commands that an executor can run.
//! Lexing and parsing recover from faults: every error is collected and
//! the most complete program possible is still returned.
//!
//! # Quick start
//!
//! ## Parse a command line
//!
//! ```
//! use mash_syntax::{Command, parse};
//!
//! let parsed = parse("ls -la | grep src && echo found");
//! assert!(parsed.is_ok());
//!
//! let command = parsed.program.statements[0].as_command().unwrap();
//! assert!(matches!(command, Command::Logical(_)));
//! ```
//!
//! ## Keep going after errors
//!
//! ```
//! use mash_syntax::parse;
//!
//! let parsed = parse("a\nb;");
//! assert_eq!(parsed.errors.len(), 1);
//! assert_eq!(parsed.program.statements.len(), 2);
//! ```
//!
//! ## Stream tokens from a lexer thread
//!
//! ```
//! use mash_syntax::{parse_stream, stream};
//!
//! let tokens = stream::spawn("make || echo failed").unwrap();
//! let parsed = parse_stream(tokens);
//! assert!(parsed.is_ok());
//! ```

// Allow noisy pedantic lints that don't add value for
// a library crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod ast;
pub mod formatter;
pub mod lexer;
pub mod parser;
pub mod stream;
pub mod token;

pub use ast::{
    BinaryCommand, BlockStatement, Command, CommandStatement, LiteralCommand, LogicalCommand,
    Program, Statement, UnaryCommand,
};
pub use formatter::format;
pub use lexer::{ErrorHandler, LexError, LexErrorKind, Lexer, tokenize};
pub use parser::{
    ParseError, ParseErrorKind, Parsed, Parser, parse, parse_bytes, parse_command, parse_stream,
};
pub use stream::TokenStream;
pub use token::{Position, Token, TokenKind};

/// Unified error type covering both lexing and parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A lexer error.
    #[error("{0}")]
    Lex(#[from] LexError),
    /// A parser error.
    #[error("{0}")]
    Parse(#[from] ParseError),
}

impl Error {
    /// Where in the source the error was found.
    #[must_use]
    pub const fn position(&self) -> token::Position {
        match self {
            Self::Lex(err) => err.position,
            Self::Parse(err) => err.position,
        }
    }
}

/// Tokenize and parse a source string in one step, failing on the
/// first error.
pub fn parse_str(input: &str) -> Result<Program, Error> {
    parse(input).into_result()
}

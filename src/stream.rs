//! Lexing on a dedicated thread.
//!
//! The lexer thread hands tokens over a zero-capacity channel, so it
//! blocks on every token until the consumer asks for the next one and
//! is never more than one token ahead of the parser.

use std::io;
use std::panic;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, bounded};
use tracing::{debug, warn};

use crate::lexer::{LexError, Lexer};
use crate::token::{Position, Token};

/// Tokens produced by a lexer running on another thread.
///
/// Iteration ends once the lexer has sent `Eof` and hung up. Dropping
/// the stream early disconnects the channel, which stops the lexer
/// thread at its next send.
#[derive(Debug)]
pub struct TokenStream {
    tokens: Receiver<Token>,
    lexer: JoinHandle<Vec<LexError>>,
}

/// Start lexing `source` on a new thread.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be spawned.
pub fn spawn(source: impl Into<String>) -> io::Result<TokenStream> {
    spawn_lexer(source.into(), None)
}

/// Like [`spawn`], reporting lexer faults to `handler` from the lexer
/// thread.
///
/// # Errors
///
/// Returns the OS error if the thread cannot be spawned.
pub fn spawn_with_handler(
    source: impl Into<String>,
    handler: impl FnMut(Position, &LexError) + Send + 'static,
) -> io::Result<TokenStream> {
    spawn_lexer(source.into(), Some(Box::new(handler)))
}

type BoxedHandler = Box<dyn FnMut(Position, &LexError) + Send>;

fn spawn_lexer(source: String, handler: Option<BoxedHandler>) -> io::Result<TokenStream> {
    let (sender, tokens) = bounded(0);

    let lexer = thread::Builder::new()
        .name("mash-lexer".to_string())
        .spawn(move || {
            let mut lexer = Lexer::new(&source);
            if let Some(handler) = handler {
                lexer = lexer.with_handler(handler);
            }
            for token in lexer.by_ref() {
                if sender.send(token).is_err() {
                    debug!("token stream dropped, stopping lexer");
                    break;
                }
            }
            lexer.into_errors()
        })?;

    Ok(TokenStream { tokens, lexer })
}

impl TokenStream {
    /// Stop consuming, wait for the lexer thread, and return the faults
    /// it recorded. Tokens not yet received are discarded.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from the lexer thread, such as one thrown by the
    /// error handler.
    #[must_use]
    pub fn join(self) -> Vec<LexError> {
        let Self { tokens, lexer } = self;
        drop(tokens);
        match lexer.join() {
            Ok(errors) => errors,
            Err(payload) => {
                warn!("lexer thread panicked");
                panic::resume_unwind(payload)
            }
        }
    }
}

impl Iterator for TokenStream {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.tokens.recv().ok()
    }
}

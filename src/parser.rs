use std::fmt;

use tracing::{debug, debug_span};

use crate::Error;
use crate::ast::{
    BinaryCommand, BlockStatement, Command, CommandStatement, LiteralCommand, LogicalCommand,
    Program, Statement, UnaryCommand,
};
use crate::lexer::Lexer;
use crate::stream::TokenStream;
use crate::token::{Position, Token, TokenKind};

/// Classifies a parser error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Token that cannot begin a statement.
    IllegalStatementStart { found: String },
    /// Statement not followed by `;`.
    MissingTerminator { found: String },
    /// Command position with no command name.
    ExpectedCommand { found: String },
    /// Block still open at the end of input.
    ExpectedCloseBrace,
    /// Reserved keyword whose statement form has no grammar yet.
    UnsupportedStatement { keyword: TokenKind },
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IllegalStatementStart { found } => {
                write!(f, "illegal token {found} at statement start")
            }
            Self::MissingTerminator { found } => {
                write!(f, "expected ';', got {found}")
            }
            Self::ExpectedCommand { found } => {
                write!(f, "expected command, got {found}")
            }
            Self::ExpectedCloseBrace => {
                write!(f, "expected '}}'")
            }
            Self::UnsupportedStatement { keyword } => {
                write!(f, "'{keyword}' statements are not supported")
            }
        }
    }
}

/// Error produced during parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {position}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: Position,
}

/// Outcome of parsing a whole source: the most complete program that
/// could be built, and every error found on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub program: Program,
    /// Lexer errors first, then parser errors, each in source order.
    pub errors: Vec<Error>,
}

impl Parsed {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The program, or the first error if there was any.
    pub fn into_result(self) -> Result<Program, Error> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.program),
        }
    }
}

/// Parse a source string into a `Program`, recovering from errors.
#[must_use]
pub fn parse(input: &str) -> Parsed {
    parse_bytes(input.as_bytes())
}

/// Like [`parse`], for sources that may not be valid UTF-8.
#[must_use]
pub fn parse_bytes(input: &[u8]) -> Parsed {
    let _span = debug_span!("parse", bytes = input.len()).entered();

    let mut lexer = Lexer::from_bytes(input);
    let mut parser = Parser::new(lexer.by_ref());
    let program = parser.parse_program();
    let parse_errors = parser.into_errors();

    collect(program, lexer.into_errors(), parse_errors)
}

/// Parse tokens coming from a lexer thread. Waits for the thread to
/// finish before returning.
#[must_use]
pub fn parse_stream(mut stream: TokenStream) -> Parsed {
    let _span = debug_span!("parse_stream").entered();

    let mut parser = Parser::new(stream.by_ref());
    let program = parser.parse_program();
    let parse_errors = parser.into_errors();

    collect(program, stream.join(), parse_errors)
}

fn collect(
    program: Program,
    lex_errors: Vec<crate::LexError>,
    parse_errors: Vec<ParseError>,
) -> Parsed {
    let errors: Vec<Error> = lex_errors
        .into_iter()
        .map(Error::from)
        .chain(parse_errors.into_iter().map(Error::from))
        .collect();
    debug!(
        statements = program.statements.len(),
        errors = errors.len(),
        "parsed program"
    );
    Parsed { program, errors }
}

/// Parse a source holding exactly one command, optionally followed
/// by `;`.
///
/// # Errors
///
/// Returns the first lexer error, or the parse error if the source is
/// not a single well-formed command. Empty input is an
/// `ExpectedCommand` error.
pub fn parse_command(input: &str) -> Result<Command, Error> {
    let mut lexer = Lexer::new(input);
    let command = Parser::new(lexer.by_ref()).parse_single_command();
    if let Some(err) = lexer.into_errors().into_iter().next() {
        return Err(err.into());
    }
    Ok(command?)
}

/// Recursive-descent parser over a token sequence.
///
/// Any `Iterator<Item = Token>` works as input: a [`Lexer`], a
/// [`TokenStream`], or a pre-lexed `Vec<Token>`. The parser looks at most
/// one token ahead.
#[derive(Debug)]
pub struct Parser<I: Iterator<Item = Token>> {
    tokens: I,
    peeked: Option<Token>,
    closed: bool,
    last_kind: TokenKind,
    last_end: Position,
    errors: Vec<ParseError>,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new(tokens: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            tokens: tokens.into_iter(),
            peeked: None,
            closed: false,
            last_kind: TokenKind::Illegal,
            last_end: Position::origin(),
            errors: Vec::new(),
        }
    }

    /// Errors reported so far.
    #[must_use]
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<ParseError> {
        self.errors
    }

    /// `Program := Statement* EOF`
    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();
        while !self.at_end() {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
        }
        Program { statements }
    }

    /// Parse one statement and its terminator.
    ///
    /// Returns `None` when nothing could be built; the error is recorded
    /// and the offending input skipped.
    pub fn parse_statement(&mut self) -> Option<Statement> {
        let stmt = match self.peek_kind() {
            TokenKind::LeftBrace => {
                let (block, closed) = self.parse_block();
                if !closed {
                    return Some(Statement::Block(block));
                }
                Statement::Block(block)
            }
            TokenKind::String | TokenKind::Not => match self.parse_command() {
                Ok(command) => Statement::Command(CommandStatement { command }),
                Err(err) => {
                    self.report(err);
                    self.synchronize();
                    return None;
                }
            },
            keyword if keyword.is_keyword() => {
                let (_, position) = self.found();
                self.report(ParseError {
                    kind: ParseErrorKind::UnsupportedStatement { keyword },
                    position,
                });
                self.synchronize();
                return None;
            }
            _ => {
                let (found, position) = self.found();
                self.report(ParseError {
                    kind: ParseErrorKind::IllegalStatementStart { found },
                    position,
                });
                self.next();
                return None;
            }
        };

        self.expect_terminator();
        Some(stmt)
    }

    /// `BlockStatement := '{' Statement* '}'`
    ///
    /// The flag is false when the input ended before the closing brace.
    fn parse_block(&mut self) -> (BlockStatement, bool) {
        self.next();

        let mut statements = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::RightBrace => {
                    self.next();
                    return (BlockStatement { statements }, true);
                }
                TokenKind::Eof => {
                    let (_, position) = self.found();
                    self.report(ParseError {
                        kind: ParseErrorKind::ExpectedCloseBrace,
                        position,
                    });
                    return (BlockStatement { statements }, false);
                }
                _ => {
                    if let Some(stmt) = self.parse_statement() {
                        statements.push(stmt);
                    }
                }
            }
        }
    }

    /// `Command := LogicalOr`
    ///
    /// # Errors
    ///
    /// Fails with `ExpectedCommand` where a command name is missing.
    pub fn parse_command(&mut self) -> Result<Command, ParseError> {
        self.parse_logical_or()
    }

    fn parse_single_command(&mut self) -> Result<Command, ParseError> {
        let command = self.parse_command()?;
        self.eat(TokenKind::Semicolon);
        if !self.at_end() {
            let (found, position) = self.found();
            return Err(ParseError {
                kind: ParseErrorKind::MissingTerminator { found },
                position,
            });
        }
        Ok(command)
    }

    /// `LogicalOr := LogicalAnd ('||' LogicalAnd)*`
    fn parse_logical_or(&mut self) -> Result<Command, ParseError> {
        let mut command = self.parse_logical_and()?;

        while let Some(operator) = self.eat(TokenKind::LogicalOr) {
            let right = self.parse_logical_and()?;
            command = Command::Logical(LogicalCommand {
                left: Box::new(command),
                operator,
                right: Box::new(right),
            });
        }

        Ok(command)
    }

    /// `LogicalAnd := Not ('&&' Not)*`
    fn parse_logical_and(&mut self) -> Result<Command, ParseError> {
        let mut command = self.parse_not()?;

        while let Some(operator) = self.eat(TokenKind::LogicalAnd) {
            let right = self.parse_not()?;
            command = Command::Logical(LogicalCommand {
                left: Box::new(command),
                operator,
                right: Box::new(right),
            });
        }

        Ok(command)
    }

    /// `Not := '!' Pipe | Pipe`
    fn parse_not(&mut self) -> Result<Command, ParseError> {
        if let Some(operator) = self.eat(TokenKind::Not) {
            let operand = self.parse_pipe()?;
            return Ok(Command::Unary(UnaryCommand {
                operator,
                operand: Box::new(operand),
            }));
        }

        self.parse_pipe()
    }

    /// `Pipe := Literal ('|' Literal)*`
    fn parse_pipe(&mut self) -> Result<Command, ParseError> {
        let mut command = self.parse_literal()?;

        while let Some(operator) = self.eat(TokenKind::Or) {
            let right = self.parse_literal()?;
            command = Command::Binary(BinaryCommand {
                left: Box::new(command),
                operator,
                right: Box::new(right),
            });
        }

        Ok(command)
    }

    /// `Literal := STRING STRING*`
    fn parse_literal(&mut self) -> Result<Command, ParseError> {
        let Some(name) = self.eat(TokenKind::String) else {
            let (found, position) = self.found();
            return Err(ParseError {
                kind: ParseErrorKind::ExpectedCommand { found },
                position,
            });
        };

        let mut args = Vec::new();
        while let Some(arg) = self.eat_argument() {
            args.push(arg);
        }

        Ok(Command::Literal(LiteralCommand { name, args }))
    }

    /// Next `STRING`, if it starts on the line the previous token ended
    /// on. A word on a later line belongs to the next statement.
    fn eat_argument(&mut self) -> Option<Token> {
        let line = self.last_end.line;
        let same_line = self
            .peek()
            .is_some_and(|t| t.kind == TokenKind::String && t.position.line == line);
        if same_line { self.next() } else { None }
    }

    /// Consume `;`, or accept an inferred one before `}` or the end of
    /// input, or after a `}` that ends its line. Anything else is
    /// reported and left in place.
    fn expect_terminator(&mut self) {
        if self.eat(TokenKind::Semicolon).is_some() {
            return;
        }

        let line = self.last_end.line;
        let next_line = self.peek().map(|t| t.position.line);
        let next = self.peek_kind();
        if self.last_kind.inserts_semicolon()
            && matches!(next, TokenKind::Eof | TokenKind::RightBrace)
        {
            return;
        }
        if self.last_kind == TokenKind::RightBrace && next_line.is_some_and(|l| l > line) {
            return;
        }

        let (found, position) = self.found();
        self.report(ParseError {
            kind: ParseErrorKind::MissingTerminator { found },
            position,
        });
    }

    /// Skip to the end of the broken statement: past the next `;` at
    /// brace depth zero, past a `}` that closes the statement's last
    /// block and ends its line, or up to an enclosing `}` or the end of
    /// input.
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        let mut skipped = 0usize;

        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Semicolon if depth == 0 => {
                    self.next();
                    skipped += 1;
                    break;
                }
                TokenKind::RightBrace if depth == 0 => break,
                TokenKind::RightBrace => {
                    depth -= 1;
                    self.next();
                    skipped += 1;
                    let line = self.last_end.line;
                    if depth == 0 && self.peek().is_some_and(|t| t.position.line > line) {
                        break;
                    }
                    continue;
                }
                TokenKind::LeftBrace => depth += 1,
                _ => {}
            }
            self.next();
            skipped += 1;
        }

        debug!(skipped, "resynchronized after parse error");
    }

    fn report(&mut self, error: ParseError) {
        debug!(position = %error.position, error = %error.kind, "parse error");
        self.errors.push(error);
    }

    // -- token window --

    fn fill(&mut self) {
        if self.peeked.is_none() && !self.closed {
            self.peeked = self.tokens.next();
            self.closed = self.peeked.is_none();
        }
    }

    fn peek(&mut self) -> Option<&Token> {
        self.fill();
        self.peeked.as_ref()
    }

    /// Kind of the next unconsumed token; `Eof` once the input is
    /// exhausted.
    fn peek_kind(&mut self) -> TokenKind {
        self.peek().map_or(TokenKind::Eof, |t| t.kind)
    }

    /// No tokens left: either `Eof` is next, or the sequence has ended.
    fn at_end(&mut self) -> bool {
        self.peek_kind() == TokenKind::Eof
    }

    /// Consume the next token. `Eof` is never consumed, so every later
    /// peek still sees it.
    fn next(&mut self) -> Option<Token> {
        self.fill();
        let token = self.peeked.take()?;
        if token.kind == TokenKind::Eof {
            self.peeked = Some(token);
            return None;
        }
        self.last_kind = token.kind;
        self.last_end = token.end();
        Some(token)
    }

    /// Consume the next token only if it is of `kind`.
    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.peek_kind() == kind {
            self.next()
        } else {
            None
        }
    }

    /// Description and position of the next token, for error messages.
    fn found(&mut self) -> (String, Position) {
        let last_end = self.last_end;
        self.peek().map_or_else(
            || ("end of input".to_string(), last_end),
            |t| (t.to_string(), t.position),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_input(input: &str) -> Parsed {
        parse(input)
    }

    fn literal(command: &Command) -> Vec<String> {
        command.as_literal().expect("literal command").argv()
    }

    fn only_command(parsed: &Parsed) -> &Command {
        assert!(parsed.is_ok(), "unexpected errors: {:?}", parsed.errors);
        assert_eq!(parsed.program.statements.len(), 1);
        parsed.program.statements[0]
            .as_command()
            .expect("command statement")
    }

    #[test]
    fn simple_command() {
        let parsed = parse_input("cmd a b");
        let command = only_command(&parsed);
        assert_eq!(literal(command), vec!["cmd", "a", "b"]);
    }

    #[test]
    fn pipe_folds_left() {
        let parsed = parse_input("a | b | c");
        let Command::Binary(outer) = only_command(&parsed) else {
            panic!("expected pipe");
        };
        let Command::Binary(inner) = outer.left.as_ref() else {
            panic!("expected nested pipe on the left");
        };
        assert_eq!(literal(&inner.left), vec!["a"]);
        assert_eq!(literal(&inner.right), vec!["b"]);
        assert_eq!(literal(&outer.right), vec!["c"]);
    }

    #[test]
    fn negation_wraps_pipe() {
        let parsed = parse_input("! a | b");
        let Command::Unary(unary) = only_command(&parsed) else {
            panic!("expected negation");
        };
        assert_eq!(unary.operator.kind, TokenKind::Not);
        assert!(matches!(unary.operand.as_ref(), Command::Binary(_)));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let parsed = parse_input("a || b && c");
        let Command::Logical(or) = only_command(&parsed) else {
            panic!("expected logical");
        };
        assert_eq!(or.operator.kind, TokenKind::LogicalOr);
        assert_eq!(literal(&or.left), vec!["a"]);
        let Command::Logical(and) = or.right.as_ref() else {
            panic!("expected && on the right");
        };
        assert_eq!(and.operator.kind, TokenKind::LogicalAnd);
    }

    #[test]
    fn missing_terminator_recovers() {
        let parsed = parse_input("a\nb;");
        assert_eq!(parsed.errors.len(), 1);
        assert!(matches!(
            &parsed.errors[0],
            Error::Parse(ParseError {
                kind: ParseErrorKind::MissingTerminator { .. },
                ..
            })
        ));
        assert_eq!(parsed.program.statements.len(), 2);
    }

    #[test]
    fn empty_command_is_rejected() {
        let err = parse_command("").unwrap_err();
        assert!(matches!(
            err,
            Error::Parse(ParseError {
                kind: ParseErrorKind::ExpectedCommand { .. },
                ..
            })
        ));
    }

    #[test]
    fn dangling_pipe_is_rejected() {
        let parsed = parse_input("a | ; b");
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.program.statements.len(), 1);
        let command = parsed.program.statements[0].as_command().expect("command");
        assert_eq!(literal(command), vec!["b"]);
    }

    #[test]
    fn block_statement() {
        let parsed = parse_input("{ a; b }");
        assert!(parsed.is_ok(), "{:?}", parsed.errors);
        let Statement::Block(block) = &parsed.program.statements[0] else {
            panic!("expected block");
        };
        assert_eq!(block.statements.len(), 2);
    }

    #[test]
    fn unclosed_block() {
        let parsed = parse_input("{ a;");
        assert_eq!(parsed.errors.len(), 1);
        assert!(matches!(
            &parsed.errors[0],
            Error::Parse(ParseError {
                kind: ParseErrorKind::ExpectedCloseBrace,
                ..
            })
        ));
        assert_eq!(parsed.program.statements.len(), 1);
    }

    #[test]
    fn reserved_keyword_is_reported() {
        let parsed = parse_input("let x = 1; ls");
        assert_eq!(parsed.errors.len(), 1);
        assert!(matches!(
            &parsed.errors[0],
            Error::Parse(ParseError {
                kind: ParseErrorKind::UnsupportedStatement {
                    keyword: TokenKind::Let
                },
                ..
            })
        ));
        assert_eq!(parsed.program.statements.len(), 1);
    }

    #[test]
    fn illegal_start_skips_one_token() {
        let parsed = parse_input("| a");
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.program.statements.len(), 1);
    }

    #[test]
    fn parses_vec_of_tokens() {
        let tokens = crate::tokenize("a && b").expect("tokenize");
        let mut parser = Parser::new(tokens);
        let program = parser.parse_program();
        assert!(parser.errors().is_empty());
        assert_eq!(program.statements.len(), 1);
    }
}

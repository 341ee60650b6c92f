use std::fmt;
use std::iter::FusedIterator;

use tracing::{debug, trace};

use crate::token::{Position, Token, TokenKind};

const BOM: char = '\u{FEFF}';
const BOM_BYTES: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Classifies a lexer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    /// NUL byte in the source.
    Nul,
    /// Byte sequence that is not valid UTF-8.
    InvalidUtf8,
    /// Byte order mark anywhere but the start of the source.
    MisplacedBom,
    /// Quoted string with no closing quote.
    UnterminatedString,
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nul => write!(f, "illegal character NUL"),
            Self::InvalidUtf8 => write!(f, "illegal utf-8 encoding"),
            Self::MisplacedBom => write!(f, "illegal byte order mark"),
            Self::UnterminatedString => write!(f, "unterminated quoted string"),
        }
    }
}

/// Error produced during lexing.
///
/// Lexer errors never stop the lexer: the offending input is recorded,
/// reported to the error handler, and lexing carries on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {position}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub position: Position,
}

/// Callback invoked once per lexer fault. Must not block.
pub type ErrorHandler<'a> = Box<dyn FnMut(Position, &LexError) + Send + 'a>;

/// Tokenize a source string into a sequence of tokens ending in `Eof`.
///
/// # Errors
///
/// Returns the first `LexError` encountered. Use [`Lexer`] directly
/// to keep the tokens of faulty input.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(input);
    let tokens: Vec<Token> = lexer.by_ref().collect();
    match lexer.into_errors().into_iter().next() {
        Some(err) => Err(err),
        None => Ok(tokens),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Start of a statement: decides between statement and command mode.
    Base,
    /// Keyword-led statement, lexed as programming-language tokens.
    Statement,
    /// Free-form command words.
    Command,
    Done,
}

/// Streaming lexer over a mash source.
///
/// The lexer is an iterator: each call to `next` runs the state machine
/// until one token is complete. The last token is always `Eof`, after
/// which the iterator is exhausted.
pub struct Lexer<'a> {
    src: &'a [u8],
    ch: Option<char>,
    width: usize,

    offset: usize,
    read_offset: usize,
    // bytes below this offset were already checked for encoding faults
    checked: usize,

    start: Position,
    prev: Position,
    pos: Position,

    state: State,
    errors: Vec<LexError>,
    handler: Option<ErrorHandler<'a>>,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(src: &'a str) -> Self {
        Self::from_bytes(src.as_bytes())
    }

    /// Lex raw bytes. Invalid UTF-8 is reported and lexed as `U+FFFD`.
    #[must_use]
    pub fn from_bytes(src: &'a [u8]) -> Self {
        let skip = if src.starts_with(&BOM_BYTES) {
            BOM_BYTES.len()
        } else {
            0
        };
        Self {
            src,
            ch: None,
            width: 0,
            offset: skip,
            read_offset: skip,
            checked: skip,
            start: Position::origin(),
            prev: Position::origin(),
            pos: Position::origin(),
            state: State::Base,
            errors: Vec::new(),
            handler: None,
        }
    }

    /// Report faults to `handler` as they are found.
    #[must_use]
    pub fn with_handler(mut self, handler: impl FnMut(Position, &LexError) + Send + 'a) -> Self {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Faults recorded so far.
    #[must_use]
    pub fn errors(&self) -> &[LexError] {
        &self.errors
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<LexError> {
        self.errors
    }

    fn error(&mut self, kind: LexErrorKind, position: Position) {
        let error = LexError { kind, position };
        debug!(%position, error = %error.kind, "lexer fault");
        if let Some(handler) = self.handler.as_mut() {
            handler(position, &error);
        }
        self.errors.push(error);
    }

    // -- state machine --

    fn lex_base(&mut self) -> Option<Token> {
        self.consume_while(char::is_whitespace);
        self.ignore();

        if self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.consume_while(is_ident);
            if !self.peek().is_some_and(is_word) {
                if let Some(keyword) = TokenKind::keyword(&self.literal()) {
                    self.state = State::Statement;
                    return Some(self.emit(keyword));
                }
            }
            self.rewind();
        }

        self.state = State::Command;
        None
    }

    fn lex_statement(&mut self) -> Option<Token> {
        self.consume();
        let Some(ch) = self.ch else {
            return Some(self.finish());
        };

        let kind = match ch {
            c if c.is_whitespace() => {
                self.consume_while(char::is_whitespace);
                self.ignore();
                return None;
            }
            '#' => {
                self.consume_comment();
                return None;
            }
            c if is_ident_start(c) => {
                self.consume_while(is_ident);
                TokenKind::lookup(&self.literal())
            }
            c if c.is_ascii_digit() => {
                self.consume_while(|c| c.is_ascii_digit());
                TokenKind::Number
            }
            '"' => {
                self.consume_string('"');
                TokenKind::String
            }
            c if is_operator_start(c) => self.lex_operator(c),
            _ => TokenKind::Illegal,
        };

        if matches!(
            kind,
            TokenKind::Semicolon | TokenKind::LeftBrace | TokenKind::RightBrace
        ) {
            self.state = State::Base;
        }
        Some(self.emit(kind))
    }

    fn lex_operator(&mut self, ch: char) -> TokenKind {
        use TokenKind as K;

        match ch {
            '+' => self.select('=', K::AdditionAssign, K::Addition),
            '-' => self.select('=', K::SubtractionAssign, K::Subtraction),
            '*' => self.select('=', K::MultiplicationAssign, K::Multiplication),
            '/' => self.select('=', K::QuotientAssign, K::Quotient),
            '%' => self.select('=', K::RemainderAssign, K::Remainder),
            '^' => self.select('=', K::XorAssign, K::Xor),
            '&' => {
                if self.accept('&') {
                    K::LogicalAnd
                } else if self.accept('^') {
                    self.select('=', K::AndNotAssign, K::AndNot)
                } else {
                    self.select('=', K::AndAssign, K::And)
                }
            }
            '|' => {
                if self.accept('|') {
                    K::LogicalOr
                } else {
                    self.select('=', K::OrAssign, K::Or)
                }
            }
            '<' => {
                if self.accept('<') {
                    self.select('=', K::ShiftLeftAssign, K::ShiftLeft)
                } else {
                    self.select('=', K::LessThanEqual, K::LessThan)
                }
            }
            '>' => {
                if self.accept('>') {
                    self.select('=', K::ShiftRightAssign, K::ShiftRight)
                } else {
                    self.select('=', K::GreaterThanEqual, K::GreaterThan)
                }
            }
            '=' => self.select('=', K::Equal, K::Assign),
            '!' => self.select('=', K::NotEqual, K::Not),
            ':' => self.select('=', K::Define, K::Colon),
            _ => {
                let mut buf = [0; 4];
                TokenKind::operator(ch.encode_utf8(&mut buf)).unwrap_or(K::Illegal)
            }
        }
    }

    fn lex_command(&mut self) -> Option<Token> {
        self.consume();
        let Some(ch) = self.ch else {
            return Some(self.finish());
        };

        let kind = match ch {
            c if c.is_whitespace() => {
                self.consume_while(char::is_whitespace);
                self.ignore();
                return None;
            }
            '#' => {
                self.consume_comment();
                return None;
            }
            '"' | '\'' => {
                self.consume_string(ch);
                TokenKind::String
            }
            ';' => {
                self.state = State::Base;
                TokenKind::Semicolon
            }
            '{' => {
                self.state = State::Base;
                TokenKind::LeftBrace
            }
            '}' => {
                self.state = State::Base;
                TokenKind::RightBrace
            }
            '|' => {
                if self.accept('|') {
                    TokenKind::LogicalOr
                } else {
                    TokenKind::Or
                }
            }
            '&' => {
                if self.accept('&') {
                    TokenKind::LogicalAnd
                } else {
                    TokenKind::And
                }
            }
            '!' => TokenKind::Not,
            _ => {
                self.consume_while(is_word);
                TokenKind::String
            }
        };

        Some(self.emit(kind))
    }

    fn finish(&mut self) -> Token {
        self.state = State::Done;
        self.emit(TokenKind::Eof)
    }

    // -- scanning helpers --

    fn consume_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.consume();
        }
    }

    /// Line comment, up to but not including the newline.
    fn consume_comment(&mut self) {
        self.consume_while(|c| c != '\n');
        self.ignore();
    }

    /// Rest of a string opened by `quote`. Backslash escapes the next
    /// rune inside double quotes only.
    fn consume_string(&mut self, quote: char) {
        loop {
            self.consume();
            match self.ch {
                None => {
                    self.error(LexErrorKind::UnterminatedString, self.start);
                    return;
                }
                Some('\\') if quote == '"' => self.consume(),
                Some(c) if c == quote => return,
                Some(_) => {}
            }
        }
    }

    /// Consume the next rune if it is `want`.
    fn accept(&mut self, want: char) -> bool {
        self.consume();
        if self.ch == Some(want) {
            true
        } else {
            self.backup();
            false
        }
    }

    fn select(&mut self, next: char, long: TokenKind, short: TokenKind) -> TokenKind {
        if self.accept(next) { long } else { short }
    }

    // -- cursor primitives --

    /// Read the next rune into `ch`, advancing the read offset and the
    /// position. At the end of input `ch` becomes `None`.
    fn consume(&mut self) {
        let Some(&byte) = self.src.get(self.read_offset) else {
            self.ch = None;
            self.width = 0;
            return;
        };

        let fresh = self.read_offset >= self.checked;
        let (ch, width) = if byte == 0 {
            if fresh {
                self.error(LexErrorKind::Nul, self.pos);
            }
            ('\0', 1)
        } else if let Some((ch, width)) = decode(&self.src[self.read_offset..]) {
            if ch == BOM && fresh {
                self.error(LexErrorKind::MisplacedBom, self.pos);
            }
            (ch, width)
        } else {
            if fresh {
                self.error(LexErrorKind::InvalidUtf8, self.pos);
            }
            (char::REPLACEMENT_CHARACTER, 1)
        };

        self.ch = Some(ch);
        self.width = width;
        self.prev = self.pos;
        self.read_offset += width;
        self.checked = self.checked.max(self.read_offset);

        if ch == '\n' {
            self.pos.next_line();
        } else {
            self.pos.column += 1;
        }
    }

    /// Undo the last `consume`. Only one step of backup is possible.
    const fn backup(&mut self) {
        if self.width == 0 {
            return;
        }
        self.read_offset -= self.width;
        self.pos = self.prev;
        self.width = 0;
    }

    /// Return to the start of the current token.
    const fn rewind(&mut self) {
        self.read_offset = self.offset;
        self.pos = self.start;
        self.width = 0;
    }

    /// The rune after the current one, without consuming it.
    fn peek(&self) -> Option<char> {
        let rest = self.src.get(self.read_offset..).filter(|rest| !rest.is_empty())?;
        Some(decode(rest).map_or(char::REPLACEMENT_CHARACTER, |(ch, _)| ch))
    }

    /// Text of the current token, one rune per rune `consume` read: an
    /// invalid byte becomes its own `U+FFFD`.
    fn literal(&self) -> String {
        let bytes = &self.src[self.offset..self.read_offset];
        if let Ok(text) = std::str::from_utf8(bytes) {
            return text.to_string();
        }

        let mut text = String::with_capacity(bytes.len());
        let mut rest = bytes;
        while !rest.is_empty() {
            let (ch, width) = decode(rest).unwrap_or((char::REPLACEMENT_CHARACTER, 1));
            text.push(ch);
            rest = &rest[width..];
        }
        text
    }

    const fn ignore(&mut self) {
        self.offset = self.read_offset;
        self.start = self.pos;
    }

    fn emit(&mut self, kind: TokenKind) -> Token {
        let token = Token {
            kind,
            literal: self.literal(),
            position: self.start,
        };
        trace!(%kind, literal = %token.literal, position = %token.position, "emit");
        self.ignore();
        token
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let token = match self.state {
                State::Base => self.lex_base(),
                State::Statement => self.lex_statement(),
                State::Command => self.lex_command(),
                State::Done => return None,
            };
            if token.is_some() {
                return token;
            }
        }
    }
}

impl FusedIterator for Lexer<'_> {}

impl fmt::Debug for Lexer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lexer")
            .field("read_offset", &self.read_offset)
            .field("position", &self.pos)
            .field("state", &self.state)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

/// Decode the rune at the start of `bytes`, with its width.
fn decode(bytes: &[u8]) -> Option<(char, usize)> {
    let width = match *bytes.first()? {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return None,
    };
    let text = std::str::from_utf8(bytes.get(..width)?).ok()?;
    text.chars().next().map(|ch| (ch, width))
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

/// Runes that may continue a bare command word.
///
/// Quotes end a word instead of joining it, so `a"b c"` is two words, and
/// a `#` right after a closing quote starts a comment.
fn is_word(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, ';' | '{' | '}' | '|' | '&' | '"' | '\'')
}

fn is_operator_start(c: char) -> bool {
    let mut buf = [0; 4];
    TokenKind::operator(c.encode_utf8(&mut buf)).is_some()
}

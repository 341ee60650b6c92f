use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Source location for tokens and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// The first column of the first line.
    #[must_use]
    pub const fn origin() -> Self {
        Self { line: 1, column: 1 }
    }

    /// Advance to the first column of the next line.
    pub const fn next_line(&mut self) {
        self.line += 1;
        self.column = 1;
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::origin()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Token kinds produced by the lexer.
///
/// Variants are grouped into contiguous ranges (sentinels, literals,
/// operators, keywords). Range checks compare discriminants, so a new
/// kind has to be declared inside the range it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum TokenKind {
    // Sentinels
    Illegal,
    Eof,

    // Literals
    Identifier,
    Number,
    String,

    // Operators and delimiters
    Addition,
    Subtraction,
    Multiplication,
    Quotient,
    Remainder,

    And,
    Or,
    Xor,
    ShiftLeft,
    ShiftRight,
    AndNot,

    AdditionAssign,
    SubtractionAssign,
    MultiplicationAssign,
    QuotientAssign,
    RemainderAssign,

    AndAssign,
    OrAssign,
    XorAssign,
    ShiftLeftAssign,
    ShiftRightAssign,
    AndNotAssign,

    LogicalAnd,
    LogicalOr,

    Equal,
    LessThan,
    GreaterThan,
    Assign,
    Define,
    Not,

    NotEqual,
    LessThanEqual,
    GreaterThanEqual,

    LeftParen,
    LeftBrack,
    LeftBrace,
    Template,
    Comma,
    Period,

    RightParen,
    RightBrack,
    RightBrace,
    Semicolon,
    Colon,

    // Keywords
    For,
    If,
    Else,

    Let,
    Obj,
    Func,

    Break,
    Continue,
    Return,
}

use TokenKind as K;

/// Every kind, in declaration order.
const KINDS: [TokenKind; 58] = [
    K::Illegal,
    K::Eof,
    K::Identifier,
    K::Number,
    K::String,
    K::Addition,
    K::Subtraction,
    K::Multiplication,
    K::Quotient,
    K::Remainder,
    K::And,
    K::Or,
    K::Xor,
    K::ShiftLeft,
    K::ShiftRight,
    K::AndNot,
    K::AdditionAssign,
    K::SubtractionAssign,
    K::MultiplicationAssign,
    K::QuotientAssign,
    K::RemainderAssign,
    K::AndAssign,
    K::OrAssign,
    K::XorAssign,
    K::ShiftLeftAssign,
    K::ShiftRightAssign,
    K::AndNotAssign,
    K::LogicalAnd,
    K::LogicalOr,
    K::Equal,
    K::LessThan,
    K::GreaterThan,
    K::Assign,
    K::Define,
    K::Not,
    K::NotEqual,
    K::LessThanEqual,
    K::GreaterThanEqual,
    K::LeftParen,
    K::LeftBrack,
    K::LeftBrace,
    K::Template,
    K::Comma,
    K::Period,
    K::RightParen,
    K::RightBrack,
    K::RightBrace,
    K::Semicolon,
    K::Colon,
    K::For,
    K::If,
    K::Else,
    K::Let,
    K::Obj,
    K::Func,
    K::Break,
    K::Continue,
    K::Return,
];

/// Canonical spelling of every kind, indexed by discriminant.
const SPELLINGS: [&str; 58] = [
    "ILLEGAL", "EOF", "IDENT", "NUMBER", "STRING", // sentinels and literals
    "+", "-", "*", "/", "%", //
    "&", "|", "^", "<<", ">>", "&^", //
    "+=", "-=", "*=", "/=", "%=", //
    "&=", "|=", "^=", "<<=", ">>=", "&^=", //
    "&&", "||", //
    "==", "<", ">", "=", ":=", "!", //
    "!=", "<=", ">=", //
    "(", "[", "{", "'", ",", ".", //
    ")", "]", "}", ";", ":", //
    "for", "if", "else", //
    "let", "obj", "func", //
    "break", "continue", "return",
];

static OPERATORS: LazyLock<HashMap<&'static str, TokenKind>> = LazyLock::new(|| {
    KINDS
        .iter()
        .filter(|kind| kind.is_operator())
        .map(|&kind| (kind.as_str(), kind))
        .collect()
});

static KEYWORDS: LazyLock<HashMap<&'static str, TokenKind>> = LazyLock::new(|| {
    KINDS
        .iter()
        .filter(|kind| kind.is_keyword())
        .map(|&kind| (kind.as_str(), kind))
        .collect()
});

impl TokenKind {
    /// Canonical spelling: the source text for operators and keywords,
    /// an upper-case name for sentinels and literals.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        SPELLINGS[self as usize]
    }

    /// Resolve an identifier-shaped word: the keyword kind if `name` is
    /// reserved, `Identifier` otherwise.
    #[must_use]
    pub fn lookup(name: &str) -> Self {
        Self::keyword(name).unwrap_or(Self::Identifier)
    }

    /// The keyword spelled `name`, if any.
    #[must_use]
    pub fn keyword(name: &str) -> Option<Self> {
        KEYWORDS.get(name).copied()
    }

    /// The operator or delimiter spelled `text`, if any.
    #[must_use]
    pub fn operator(text: &str) -> Option<Self> {
        OPERATORS.get(text).copied()
    }

    #[must_use]
    pub const fn is_literal(self) -> bool {
        Self::Identifier as u8 <= self as u8 && self as u8 <= Self::String as u8
    }

    #[must_use]
    pub const fn is_operator(self) -> bool {
        Self::Addition as u8 <= self as u8 && self as u8 <= Self::Colon as u8
    }

    #[must_use]
    pub const fn is_keyword(self) -> bool {
        Self::For as u8 <= self as u8 && self as u8 <= Self::Return as u8
    }

    /// Whether a statement ending in this kind may omit its `;`
    /// when the statement is followed by the end of input or a `}`.
    #[must_use]
    pub const fn inserts_semicolon(self) -> bool {
        self.is_literal()
            || matches!(
                self,
                Self::RightParen
                    | Self::RightBrack
                    | Self::RightBrace
                    | Self::Break
                    | Self::Continue
                    | Self::Return
            )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `name` is reserved.
#[must_use]
pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains_key(name)
}

/// Whether `name` is a valid identifier: a letter or underscore followed
/// by letters, underscores or decimal digits, and not a keyword.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphabetic() || c.is_ascii_digit())
        && !is_keyword(name)
}

/// Whether `text` spells an operator or delimiter.
#[must_use]
pub fn is_operator(text: &str) -> bool {
    TokenKind::operator(text).is_some()
}

/// A single token with its kind, source text, and start position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub position: Position,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, literal: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            literal: literal.into(),
            position,
        }
    }

    /// Position just past the last character of the literal.
    #[must_use]
    pub fn end(&self) -> Position {
        let mut end = self.position;
        for ch in self.literal.chars() {
            if ch == '\n' {
                end.next_line();
            } else {
                end.column += 1;
            }
        }
        end
    }

    /// Text the literal stands for.
    ///
    /// Double-quoted strings lose their quotes and have `\"`, `\\`,
    /// `\n`, `\t` and `\r` escapes resolved. Single-quoted strings lose
    /// their quotes only. Everything else is returned as written.
    #[must_use]
    pub fn value(&self) -> String {
        let text = self.literal.as_str();
        if self.kind != TokenKind::String {
            return text.to_string();
        }
        if let Some(inner) = text.strip_prefix('\'') {
            return inner.strip_suffix('\'').unwrap_or(inner).to_string();
        }
        let Some(inner) = text.strip_prefix('"') else {
            return text.to_string();
        };

        let mut value = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '"' => break,
                '\\' => match chars.next() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some(c @ ('"' | '\\')) => value.push(c),
                    Some(c) => {
                        value.push('\\');
                        value.push(c);
                    }
                    None => value.push('\\'),
                },
                _ => value.push(ch),
            }
        }
        value
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => f.write_str("end of input"),
            _ => write!(f, "'{}'", self.literal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spellings_line_up_with_kinds() {
        for (index, kind) in KINDS.iter().enumerate() {
            assert_eq!(*kind as usize, index, "{kind:?} out of order");
        }
        assert_eq!(TokenKind::ShiftLeftAssign.as_str(), "<<=");
        assert_eq!(TokenKind::Return.as_str(), "return");
    }

    #[test]
    fn ranges_partition_kinds() {
        for kind in KINDS {
            let classes = [kind.is_literal(), kind.is_operator(), kind.is_keyword()];
            let count = classes.iter().filter(|c| **c).count();
            let sentinel = matches!(kind, TokenKind::Illegal | TokenKind::Eof);
            assert_eq!(count, usize::from(!sentinel), "{kind:?}");
        }
    }

    #[test]
    fn keyword_lookup() {
        assert_eq!(TokenKind::lookup("for"), TokenKind::For);
        assert_eq!(TokenKind::lookup("forty"), TokenKind::Identifier);
        assert!(is_keyword("continue"));
        assert!(!is_keyword("ls"));
    }

    #[test]
    fn operator_lookup() {
        assert_eq!(TokenKind::operator("&^="), Some(TokenKind::AndNotAssign));
        assert_eq!(TokenKind::operator("for"), None);
        assert!(is_operator("|"));
        assert!(!is_operator("STRING"));
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("_tmp1"));
        assert!(is_identifier("ünïcode"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("let"));
    }

    #[test]
    fn semicolon_insertion() {
        assert!(TokenKind::String.inserts_semicolon());
        assert!(TokenKind::RightBrace.inserts_semicolon());
        assert!(TokenKind::Return.inserts_semicolon());
        assert!(!TokenKind::Or.inserts_semicolon());
        assert!(!TokenKind::If.inserts_semicolon());
    }

    #[test]
    fn string_values() {
        let quoted = Token::new(TokenKind::String, r#""a \"b\"\tc""#, Position::origin());
        assert_eq!(quoted.value(), "a \"b\"\tc");

        let raw = Token::new(TokenKind::String, r"'a\nb'", Position::origin());
        assert_eq!(raw.value(), r"a\nb");

        let bare = Token::new(TokenKind::String, "-la", Position::origin());
        assert_eq!(bare.value(), "-la");

        let unterminated = Token::new(TokenKind::String, "\"abc", Position::origin());
        assert_eq!(unterminated.value(), "abc");
    }

    #[test]
    fn end_position() {
        let token = Token::new(TokenKind::String, "\"a\nbc\"", Position { line: 2, column: 4 });
        assert_eq!(token.end(), Position { line: 3, column: 4 });
    }
}

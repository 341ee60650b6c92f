use crate::token::{Position, Token};

/// Complete parsed source: the top-level statements in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// A unit terminated by `;`, explicit or inferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `{ ... }`
    Block(BlockStatement),
    Command(CommandStatement),
}

/// Statements grouped by braces.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
}

/// A statement made of a single command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStatement {
    pub command: Command,
}

/// A runnable unit: one program invocation, or a composition of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `name arg...`
    Literal(LiteralCommand),
    /// `! command`
    Unary(UnaryCommand),
    /// `left | right`
    Binary(BinaryCommand),
    /// `left && right` or `left || right`
    Logical(LogicalCommand),
}

/// A command name followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralCommand {
    pub name: Token,
    pub args: Vec<Token>,
}

/// Negated command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnaryCommand {
    pub operator: Token,
    pub operand: Box<Command>,
}

/// Pipeline of two commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryCommand {
    pub left: Box<Command>,
    pub operator: Token,
    pub right: Box<Command>,
}

/// Short-circuiting composition of two commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalCommand {
    pub left: Box<Command>,
    pub operator: Token,
    pub right: Box<Command>,
}

impl LiteralCommand {
    /// Command name and arguments with quotes removed, ready to be
    /// handed to a process or builtin.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(&self.name)
            .chain(&self.args)
            .map(Token::value)
            .collect()
    }
}

impl Command {
    /// Position of the first token of the command.
    #[must_use]
    pub fn position(&self) -> Position {
        match self {
            Self::Literal(lit) => lit.name.position,
            Self::Unary(unary) => unary.operator.position,
            Self::Binary(BinaryCommand { left, .. })
            | Self::Logical(LogicalCommand { left, .. }) => left.position(),
        }
    }

    /// The literal command, if this is one.
    #[must_use]
    pub const fn as_literal(&self) -> Option<&LiteralCommand> {
        match self {
            Self::Literal(lit) => Some(lit),
            _ => None,
        }
    }
}

impl Statement {
    /// The command of a command statement.
    #[must_use]
    pub const fn as_command(&self) -> Option<&Command> {
        match self {
            Self::Command(stmt) => Some(&stmt.command),
            Self::Block(_) => None,
        }
    }
}

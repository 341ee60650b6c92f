//! Pretty-printer that serializes a mash AST back into canonical text.
//!
//! One statement per line, each command statement closed by `;`, block
//! contents indented by one tab. Words keep their original quoting.

use std::fmt;

use crate::ast::{Command, LiteralCommand, Program, Statement};

/// Format a `Program` into mash source that parses back to the same
/// structure.
#[must_use]
pub fn format(program: &Program) -> String {
    let mut out = String::new();
    format_statements(&mut out, &program.statements, 0);
    out
}

fn format_statements(out: &mut String, statements: &[Statement], indent: usize) {
    for stmt in statements {
        format_statement(out, stmt, indent);
    }
}

fn format_statement(out: &mut String, stmt: &Statement, indent: usize) {
    use std::fmt::Write as _;

    let prefix = "\t".repeat(indent);
    out.push_str(&prefix);

    match stmt {
        Statement::Command(cmd) => {
            let _ = writeln!(out, "{};", cmd.command);
        }
        Statement::Block(block) => {
            out.push_str("{\n");
            format_statements(out, &block.statements, indent + 1);
            out.push_str(&prefix);
            out.push_str("}\n");
        }
    }
}

impl fmt::Display for LiteralCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name.literal)?;
        for arg in &self.args {
            write!(f, " {}", arg.literal)?;
        }
        Ok(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(lit) => write!(f, "{lit}"),
            Self::Unary(unary) => write!(f, "{} {}", unary.operator.literal, unary.operand),
            Self::Binary(binary) => write!(
                f,
                "{} {} {}",
                binary.left, binary.operator.literal, binary.right
            ),
            Self::Logical(logical) => write!(
                f,
                "{} {} {}",
                logical.left, logical.operator.literal, logical.right
            ),
        }
    }
}

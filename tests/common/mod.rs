#![allow(dead_code)]

use mash_syntax::{Command, Program, Statement, format, parse};

/// Parse input that must be error free.
pub fn parse_ok(input: &str) -> Program {
    let parsed = parse(input);
    assert!(
        parsed.is_ok(),
        "unexpected errors for {input:?}: {:?}",
        parsed.errors
    );
    parsed.program
}

/// Compact prefix rendering of a command tree, e.g. `(| (| a b) c)`.
pub fn shape(command: &Command) -> String {
    match command {
        Command::Literal(lit) => lit.argv().join(" "),
        Command::Unary(unary) => {
            format!("({} {})", unary.operator.literal, shape(&unary.operand))
        }
        Command::Binary(binary) => format!(
            "({} {} {})",
            binary.operator.literal,
            shape(&binary.left),
            shape(&binary.right)
        ),
        Command::Logical(logical) => format!(
            "({} {} {})",
            logical.operator.literal,
            shape(&logical.left),
            shape(&logical.right)
        ),
    }
}

/// Shape of every statement, blocks rendered as `{...}`.
pub fn shapes(statements: &[Statement]) -> Vec<String> {
    statements
        .iter()
        .map(|stmt| match stmt {
            Statement::Command(cmd) => shape(&cmd.command),
            Statement::Block(block) => format!("{{{}}}", shapes(&block.statements).join("; ")),
        })
        .collect()
}

/// Shape of a single-command input.
pub fn shape_of(input: &str) -> String {
    let program = parse_ok(input);
    assert_eq!(program.statements.len(), 1, "expected one statement");
    shapes(&program.statements).remove(0)
}

/// Format, re-parse, format again, and require the same text.
pub fn assert_format_stable(input: &str) {
    let first = format(&parse_ok(input));
    let second = format(&parse_ok(&first));
    assert_eq!(
        first, second,
        "format not stable:\n--- first ---\n{first}\n--- second ---\n{second}"
    );
}

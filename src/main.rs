//! CLI tool to inspect, check, and format mash scripts.

use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use mash_syntax::{Lexer, Parsed};

const LOG_ENV: &str = "MASH_LOG";

fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        eprintln!("Usage: mash <command> [files...]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  tokens  Print the token stream of each script");
        eprintln!("  check   Check if script(s) parse without errors");
        eprintln!("  fmt     Format script(s) and print to stdout");
        eprintln!();
        eprintln!("Reads stdin when no file or '-' is given.");
        eprintln!("Set {LOG_ENV} (e.g. {LOG_ENV}=debug) to enable logging.");
        return ExitCode::from(2);
    }

    let command = args[1].as_str();
    if !matches!(command, "tokens" | "check" | "fmt") {
        eprintln!("Unknown command: {command}");
        return ExitCode::from(2);
    }

    let mut files: Vec<&str> = args[2..].iter().map(String::as_str).collect();
    if files.is_empty() {
        files.push("-");
    }

    let mut had_error = false;

    for path in files {
        let content = match read_source(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{path}: {e}");
                had_error = true;
                continue;
            }
        };

        let ok = match command {
            "tokens" => print_tokens(path, &content),
            "check" => check(path, &mash_syntax::parse_bytes(&content)),
            _ => {
                let parsed = mash_syntax::parse_bytes(&content);
                let ok = report(path, &parsed);
                if ok {
                    print!("{}", mash_syntax::format(&parsed.program));
                }
                ok
            }
        };
        had_error |= !ok;
    }

    if had_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn read_source(path: &str) -> io::Result<Vec<u8>> {
    if path == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        fs::read(path)
    }
}

fn print_tokens(path: &str, content: &[u8]) -> bool {
    let mut lexer = Lexer::from_bytes(content);
    for token in lexer.by_ref() {
        println!(
            "{}:{}\t{}\t{:?}",
            token.position.line, token.position.column, token.kind, token.literal
        );
    }
    for err in lexer.errors() {
        eprintln!("{path}: {err}");
    }
    lexer.error_count() == 0
}

fn check(path: &str, parsed: &Parsed) -> bool {
    let ok = report(path, parsed);
    if ok {
        eprintln!(
            "{path}: valid ({} statement(s))",
            parsed.program.statements.len()
        );
    }
    ok
}

fn report(path: &str, parsed: &Parsed) -> bool {
    for err in &parsed.errors {
        eprintln!("{path}: {err}");
    }
    parsed.is_ok()
}

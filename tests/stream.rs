//! Lexing on a separate thread.

use std::sync::{Arc, Mutex};

use mash_syntax::{LexErrorKind, Lexer, Position, Token, TokenKind, parse, parse_stream, stream};

#[test]
fn stream_matches_lexer() {
    let source = "cd /srv && { git pull; make | tee build.log; }\nlet x = 1";
    let streamed: Vec<Token> = stream::spawn(source).expect("spawn").collect();
    let direct: Vec<Token> = Lexer::new(source).collect();
    assert_eq!(streamed, direct);
}

#[test]
fn stream_ends_with_single_eof() {
    let tokens: Vec<Token> = stream::spawn("").expect("spawn").collect();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::Eof);
}

#[test]
fn stream_parse_collects_lexer_faults() {
    let parsed = parse_stream(stream::spawn("echo \"open").expect("spawn"));
    assert_eq!(parsed.errors.len(), 1);
    assert_eq!(parsed, parse("echo \"open"));
}

#[test]
fn handler_runs_on_lexer_thread() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let mut tokens = stream::spawn_with_handler("a\0b\nc\0", move |pos, err| {
        sink.lock().unwrap().push((pos, err.kind));
    })
    .expect("spawn");
    assert_eq!(tokens.by_ref().count(), 3);
    let errors = tokens.join();

    assert_eq!(errors.len(), 2);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            (Position { line: 1, column: 2 }, LexErrorKind::Nul),
            (Position { line: 2, column: 2 }, LexErrorKind::Nul),
        ]
    );
}

#[test]
fn dropping_stream_releases_lexer() {
    let source = "x ".repeat(50_000);
    let mut tokens = stream::spawn(source).expect("spawn");
    assert!(tokens.next().is_some());
    drop(tokens);
}

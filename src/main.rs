// skema - A Scheme reader and heap-based virtual machine
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! REPL host for the Skema reader pipeline.
//!
//! Reads datums interactively (continuing across lines while the parser
//! reports incomplete input) or from files, and prints their external
//! representation. The `#!quit` directive ends the session; the compiler and
//! machine consume the same datums programmatically.

use std::env;
use std::fs;
use std::process;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use skema_parser::{Datum, LexResult, ParserInput, ParserResult, TokenKind, parse_datum};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() == 2 && (args[1] == "--version" || args[1] == "-v") {
        println!("Skema v0.1.0");
        return;
    }

    if args.len() > 1 {
        run_files(&args[1..]);
    } else {
        run_repl();
    }
}

/// Read each file and print every datum it contains.
fn run_files(files: &[String]) {
    for path in files {
        if let Err(e) = read_file(path) {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

fn read_file(path: &str) -> Result<(), String> {
    let source =
        fs::read_to_string(path).map_err(|e| format!("error reading '{}': {}", path, e))?;
    let mut input = ParserInput::new(&source);
    loop {
        if let LexResult::Token(token) = input.peek()
            && token.kind == TokenKind::EndOfFile
        {
            return Ok(());
        }
        match parse_datum(&mut input) {
            ParserResult::Complete(datum) => println!("{}", datum),
            ParserResult::Incomplete => {
                return Err(format!("'{}': unexpected end of input", path));
            }
            ParserResult::LexerError(e) => return Err(format!("'{}': {}", path, e)),
            ParserResult::ParserError(e) => return Err(format!("'{}': {}", path, e)),
            ParserResult::Valid => {
                return Err(format!("'{}': parser yielded no datum", path));
            }
        }
    }
}

/// Run the interactive reader loop.
fn run_repl() {
    println!("Skema v0.1.0");

    let mut rl = DefaultEditor::new().expect("could not initialize line editor");
    let mut pending: Option<ParserInput> = None;

    loop {
        let prompt = if pending.is_some() { "....> " } else { "skema> " };
        match rl.readline(prompt) {
            Ok(line) => {
                if pending.is_none() && line.trim().is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line.as_str());

                let mut input = match pending.take() {
                    Some(mut continued) => {
                        // The line break is a real delimiter
                        continued.append_input("\n");
                        continued.append_input(&line);
                        continued
                    }
                    None => ParserInput::new(&line),
                };

                loop {
                    match input.peek() {
                        LexResult::Token(token) if token.kind == TokenKind::EndOfFile => break,
                        LexResult::Token(token) if token.kind == TokenKind::Directive => {
                            if token.lexeme == "quit" {
                                return;
                            }
                            input.get();
                            eprintln!("unknown directive: #!{}", token.lexeme);
                        }
                        LexResult::Incomplete => {
                            pending = Some(input);
                            break;
                        }
                        LexResult::Error(e) => {
                            eprintln!("{}", e);
                            break;
                        }
                        LexResult::Token(_) => match parse_datum(&mut input) {
                            ParserResult::Complete(datum) => {
                                if !matches!(datum, Datum::Unspecified) {
                                    println!("{}", datum);
                                }
                            }
                            ParserResult::Incomplete => {
                                pending = Some(input);
                                break;
                            }
                            ParserResult::LexerError(e) => {
                                eprintln!("{}", e);
                                break;
                            }
                            ParserResult::ParserError(e) => {
                                eprintln!("{}", e);
                                break;
                            }
                            ParserResult::Valid => break,
                        },
                    }
                }
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => return,
            Err(e) => {
                eprintln!("read error: {}", e);
                return;
            }
        }
    }
}

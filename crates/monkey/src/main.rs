use std::env;
use std::fs;
use std::process;

use monkey_parser::parse;

enum Engine {
    Interpreter,
    Compiler,
}

struct Args {
    engine: Engine,
    script: Option<String>,
}

fn parse_args(argv: &[String]) -> Result<Args, String> {
    let mut engine = Engine::Compiler;
    let mut script = None;
    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--engine" => {
                let value = iter.next().ok_or_else(|| "--engine requires a value".to_string())?;
                engine = match value.as_str() {
                    "interpreter" => Engine::Interpreter,
                    "compiler" => Engine::Compiler,
                    other => return Err(format!("unknown engine '{}' (expected interpreter or compiler)", other)),
                };
            }
            other if other.starts_with("--") => return Err(format!("unknown flag '{}'", other)),
            other => script = Some(other.to_string()),
        }
    }
    Ok(Args { engine, script })
}

fn main() {
    let argv: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("monkey: {}", e);
            eprintln!("Usage: monkey [--engine interpreter|compiler] [script.monkey]");
            process::exit(1);
        }
    };

    match &args.script {
        Some(path) => match fs::read_to_string(path) {
            Ok(source) => {
                if !run_source(&args.engine, &source) {
                    process::exit(1);
                }
            }
            Err(e) => {
                eprintln!("monkey: cannot read '{}': {}", path, e);
                process::exit(1);
            }
        },
        None => run_repl(&args.engine),
    }
}

/// Runs one chunk of source to completion, printing its result or error.
/// Returns `false` on any failure so callers can decide whether that's
/// fatal (a script) or just another prompt (the REPL).
fn run_source(engine: &Engine, source: &str) -> bool {
    let (_, lex_errors, parse_errors) = parse(source);
    if !lex_errors.is_empty() || !parse_errors.is_empty() {
        for e in &lex_errors {
            eprintln!("[LexError] {}", e);
        }
        for e in &parse_errors {
            eprintln!("[ParseError] {}", e);
        }
        eprintln!("{} error(s).", lex_errors.len() + parse_errors.len());
        return false;
    }

    match engine {
        Engine::Interpreter => match monkey_eval::eval(source) {
            Ok(value) => {
                if !matches!(&*value, monkey_object::ObjKind::Empty) {
                    println!("{}", value);
                }
                if let monkey_object::ObjKind::Error(msg) = &*value {
                    eprintln!("[RuntimeError] {}", msg);
                    return false;
                }
                true
            }
            Err(e) => {
                eprintln!("[ParseError] {}", e);
                false
            }
        },
        Engine::Compiler => match monkey_vm::run(source) {
            Ok(value) => {
                println!("{}", value);
                true
            }
            Err(e) => {
                eprintln!("[RuntimeError] {}", e);
                false
            }
        },
    }
}

/// A minimal, no-persistence REPL: each line is compiled/evaluated on its
/// own, so later lines can't see earlier `let` bindings. `monkey_repl`
/// is the full read-eval-print loop with state carried across lines.
fn run_repl(engine: &Engine) {
    use std::io::{self, BufRead, Write};
    println!("Monkey REPL v0.1.0 ({}) — Ctrl-D to exit", engine_name(engine));
    loop {
        print!(">> ");
        io::stdout().flush().unwrap();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => run_source(engine, &line),
            Err(e) => {
                eprintln!("monkey: {}", e);
                break;
            }
        }
    }
}

fn engine_name(engine: &Engine) -> &'static str {
    match engine {
        Engine::Interpreter => "interpreter",
        Engine::Compiler => "compiler",
    }
}

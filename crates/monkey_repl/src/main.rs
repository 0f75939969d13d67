//! monkey_repl — interactive read-eval-print loop for the Monkey language.
//! Supports both engines via `--engine interpreter|compiler` (default compiler).

use std::env;
use std::io::{self, BufRead, Write};

use monkey_eval::Interpreter;
use monkey_object::ObjKind;
use monkey_vm::{Compiler, SymbolTable, Vm};

const BANNER: &str = "Monkey REPL v0.1.0 — Ctrl-D to exit";

enum Engine {
    Interpreter,
    Compiler,
}

fn main() {
    let engine = match env::args().nth(1).as_deref() {
        Some("--engine") => match env::args().nth(2).as_deref() {
            Some("interpreter") => Engine::Interpreter,
            Some("compiler") | None => Engine::Compiler,
            Some(other) => {
                eprintln!("monkey_repl: unknown engine '{}'", other);
                std::process::exit(1);
            }
        },
        _ => Engine::Compiler,
    };

    println!("{}", BANNER);

    match engine {
        Engine::Interpreter => run_interpreter_repl(),
        Engine::Compiler => run_compiler_repl(),
    }
}

fn run_interpreter_repl() {
    let mut interp = Interpreter::new();
    read_loop(|source| {
        let (program, lex_errors, parse_errors) = monkey_parser::parse(source);
        if print_front_end_errors(&lex_errors, &parse_errors) {
            return;
        }
        let result = interp.eval_program(&program);
        print_result(&result);
    });
}

fn run_compiler_repl() {
    let mut symbol_table = SymbolTable::new();
    let mut constants = Vec::new();
    let mut globals = vec![monkey_object::null(); monkey_vm::vm::GLOBALS_SIZE];

    read_loop(|source| {
        let (program, lex_errors, parse_errors) = monkey_parser::parse(source);
        if print_front_end_errors(&lex_errors, &parse_errors) {
            return;
        }

        let mut compiler =
            Compiler::new_with_state(std::mem::take(&mut symbol_table), std::mem::take(&mut constants));
        if let Err(e) = compiler.compile(&program) {
            eprintln!("{}", e);
            let (st, consts) = compiler.into_state();
            symbol_table = st;
            constants = consts;
            return;
        }
        let bytecode = compiler.bytecode();
        let (st, consts) = compiler.into_state();
        symbol_table = st;
        constants = consts;

        let mut vm = Vm::new_with_globals(bytecode, std::mem::take(&mut globals));
        match vm.run() {
            Ok(()) => print_result(&vm.last_popped_stack_element()),
            Err(e) => eprintln!("{}", e),
        }
        globals = vm.globals();
    });
}

fn print_result(value: &monkey_object::Object) {
    if !matches!(&**value, ObjKind::Empty | ObjKind::Break) {
        println!("{}", value);
    }
}

fn print_front_end_errors(lex_errors: &[monkey_lexer::LexError], parse_errors: &[monkey_parser::ParseError]) -> bool {
    for e in lex_errors {
        eprintln!("  {}", e);
    }
    for e in parse_errors {
        eprintln!("  {}", e);
    }
    !lex_errors.is_empty() || !parse_errors.is_empty()
}

/// Reads lines from stdin, accumulating input until braces/brackets/parens
/// balance, then hands the whole chunk to `eval`.
fn read_loop(mut eval: impl FnMut(&str)) {
    let mut pending = String::new();
    loop {
        let prompt = if pending.is_empty() { ">> " } else { ".. " };
        print!("{}", prompt);
        io::stdout().flush().unwrap();

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => {
                println!();
                break;
            }
            Err(e) => {
                eprintln!("monkey_repl: {}", e);
                break;
            }
            Ok(_) => {}
        }

        pending.push_str(&line);
        if !is_balanced(&pending) {
            continue;
        }

        let source = std::mem::take(&mut pending);
        if source.trim().is_empty() {
            continue;
        }
        eval(&source);
    }
}

/// True once every `(`/`[`/`{` in `source` has a matching close, ignoring
/// delimiters inside string literals.
fn is_balanced(source: &str) -> bool {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        if in_string {
            match c {
                '\\' => {
                    chars.next();
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    depth <= 0
}

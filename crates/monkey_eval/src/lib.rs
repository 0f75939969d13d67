pub mod environment;
pub mod error;
pub mod interpreter;
pub mod stdlib;

pub use environment::Env;
pub use error::{EvalError, EvalResult};
pub use interpreter::Interpreter;

use monkey_object::Object;

/// Lexes, parses and evaluates `source` with a fresh `Interpreter`. For a
/// REPL that needs bindings to persist across lines, build an `Interpreter`
/// directly and call `eval_program` against its own environment instead.
pub fn eval(source: &str) -> EvalResult<Object> {
    let (program, lex_errors, parse_errors) = monkey_parser::parse(source);
    if let Some(e) = lex_errors.into_iter().next() {
        return Err(EvalError::Lex(e.to_string()));
    }
    if let Some(e) = parse_errors.into_iter().next() {
        return Err(EvalError::Parse(e.to_string()));
    }
    let mut interpreter = Interpreter::new();
    Ok(interpreter.eval_program(&program))
}

#[cfg(test)]
mod tests {
    use super::*;
    use monkey_object::ObjKind;
    use std::rc::Rc;

    fn run(src: &str) -> Object {
        eval(src).unwrap_or_else(|e| panic!("eval error: {}", e))
    }

    #[test]
    fn integer_arithmetic() {
        assert_eq!(run("5 * (2 + -10)"), Rc::new(ObjKind::Integer(-40)));
    }

    #[test]
    fn let_bindings_and_shadowing() {
        assert_eq!(run("let x = 5; let x = x + 1; x"), Rc::new(ObjKind::Integer(6)));
    }

    #[test]
    fn integers_are_canonicalized_within_a_run() {
        let src = "let a = 1000; let b = 1000; a == b";
        match &*run(src) {
            ObjKind::Boolean(b) => assert!(*b),
            other => panic!("expected boolean, got {:?}", other),
        }
    }

    #[test]
    fn recursive_closures_via_named_function_literal() {
        let src = "let fib = fn(x) { if (x < 2) { x } else { fib(x - 1) + fib(x - 2) } }; fib(15);";
        assert_eq!(run(src), Rc::new(ObjKind::Integer(610)));
    }

    #[test]
    fn closures_capture_their_defining_environment() {
        let src = "
            let newAdder = fn(x) { fn(y) { x + y } };
            let addTwo = newAdder(2);
            addTwo(8);
        ";
        assert_eq!(run(src), Rc::new(ObjKind::Integer(10)));
    }

    #[test]
    fn while_loop_with_break() {
        let src = "
            let i = 0;
            let sum = 0;
            while (true) {
                if (i == 5) { break; }
                sum = sum + i;
                i = i + 1;
            }
            sum;
        ";
        assert_eq!(run(src), Rc::new(ObjKind::Integer(10)));
    }

    #[test]
    fn assignment_updates_an_outer_binding() {
        let src = "let x = 1; let f = fn() { x = 2; }; f(); x;";
        assert_eq!(run(src), Rc::new(ObjKind::Integer(2)));
    }

    #[test]
    fn assignment_to_undefined_identifier_is_an_error() {
        match &*run("x = 1;") {
            ObjKind::Error(msg) => assert_eq!(msg, "cant assign to undefined identifier: 'x'"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn assigning_null_is_rejected() {
        let src = "let x = 1; x = if (false) { 1 };";
        match &*run(src) {
            ObjKind::Error(msg) => assert_eq!(msg, "cant assign null to variable 'x'"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn array_and_hash_literals() {
        assert_eq!(run("[1, 2, 3][1]"), Rc::new(ObjKind::Integer(2)));
        assert_eq!(run(r#"{"one": 1, "two": 2}["two"]"#), Rc::new(ObjKind::Integer(2)));
        assert_eq!(run("[1, 2, 3][99]"), Rc::new(ObjKind::Null));
    }

    #[test]
    fn identifier_not_found_error() {
        match &*run("foobar") {
            ObjKind::Error(msg) => assert_eq!(msg, "identifier not found: foobar"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn type_mismatch_error() {
        match &*run("5 + true") {
            ObjKind::Error(msg) => assert_eq!(msg, "type mismatch: INTEGER + BOOLEAN"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_operator_error() {
        match &*run("true + false") {
            ObjKind::Error(msg) => assert_eq!(msg, "unknown operator: BOOLEAN + BOOLEAN"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn not_a_function_error() {
        match &*run("let x = 5; x();") {
            ObjKind::Error(msg) => assert_eq!(msg, "not a function: INTEGER"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn error_short_circuits_through_nested_blocks() {
        let src = "
            if (10 > 1) {
                if (10 > 1) {
                    return true + false;
                }
                return 1;
            }
        ";
        match &*run(src) {
            ObjKind::Error(msg) => assert_eq!(msg, "unknown operator: BOOLEAN + BOOLEAN"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn builtin_len_and_array_helpers() {
        assert_eq!(run(r#"len("hello")"#), Rc::new(ObjKind::Integer(5)));
        assert_eq!(run("first([1, 2, 3])"), Rc::new(ObjKind::Integer(1)));
        assert_eq!(run("last([1, 2, 3])"), Rc::new(ObjKind::Integer(3)));
        assert_eq!(run("push([1, 2], 3)"), Rc::new(ObjKind::Array(vec![
            Rc::new(ObjKind::Integer(1)),
            Rc::new(ObjKind::Integer(2)),
            Rc::new(ObjKind::Integer(3)),
        ])));
    }

    #[test]
    fn parse_errors_surface_through_the_convenience_wrapper() {
        assert!(matches!(eval("let x = ;"), Err(EvalError::Parse(_))));
    }
}

pub mod chunk;
pub mod compiler;
pub mod error;
pub mod opcode;
pub mod stdlib;
pub mod symbol_table;
pub mod vm;

use std::fmt;

pub use chunk::{disassemble, Bytecode};
pub use compiler::Compiler;
pub use error::{CompileError, CompileResult, VmError, VmResult};
pub use opcode::{make, Op};
pub use symbol_table::{Symbol, SymbolScope, SymbolTable};
pub use vm::Vm;

use monkey_object::Object;

/// Either half of the pipeline can fail: the source might not compile, or
/// the compiled bytecode might fail at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    Compile(CompileError),
    Runtime(VmError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Compile(e) => write!(f, "{}", e),
            EngineError::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<CompileError> for EngineError {
    fn from(e: CompileError) -> Self {
        EngineError::Compile(e)
    }
}

impl From<VmError> for EngineError {
    fn from(e: VmError) -> Self {
        EngineError::Runtime(e)
    }
}

/// Compiles and runs `source` against a fresh `Compiler`/`Vm` pair,
/// returning the last popped stack value — what a one-shot script or the
/// `monkey` binary's `--engine compiler` mode wants.
pub fn run(source: &str) -> Result<Object, EngineError> {
    let (program, lex_errors, parse_errors) = monkey_parser::parse(source);
    if let Some(e) = lex_errors.into_iter().next() {
        return Err(EngineError::Compile(CompileError::UnsupportedFeature(e.to_string())));
    }
    if let Some(e) = parse_errors.into_iter().next() {
        return Err(EngineError::Compile(CompileError::UnsupportedFeature(e.to_string())));
    }
    let mut compiler = Compiler::new();
    compiler.compile(&program)?;
    let mut vm = Vm::new(compiler.bytecode());
    vm.run()?;
    Ok(vm.last_popped_stack_element())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use monkey_object::ObjKind;

    fn r(src: &str) -> Object {
        run(src).unwrap_or_else(|e| panic!("engine error: {}", e))
    }

    #[test]
    fn end_to_end_arithmetic() {
        assert_eq!(r("5 * (2 + -10)"), Rc::new(ObjKind::Integer(-40)));
    }

    #[test]
    fn end_to_end_string_concat() {
        assert_eq!(r(r#""mon" + "key" + "banana""#), Rc::new(ObjKind::Str("monkeybanana".to_string())));
    }

    #[test]
    fn end_to_end_array_out_of_bounds_is_null() {
        assert_eq!(r("[1, 2, 3][99]"), Rc::new(ObjKind::Null));
        assert_eq!(r("[1][-1]"), Rc::new(ObjKind::Null));
    }

    #[test]
    fn end_to_end_hash_missing_key_is_null() {
        assert_eq!(r("{1: 1}[0]"), Rc::new(ObjKind::Null));
    }

    #[test]
    fn end_to_end_recursive_fibonacci() {
        let src = "let fib = fn(x) { if (x < 2) { x } else { fib(x - 1) + fib(x - 2) } }; fib(15);";
        assert_eq!(r(src), Rc::new(ObjKind::Integer(610)));
    }

    #[test]
    fn end_to_end_nested_conditionals() {
        assert_eq!(r("if (if (false) { 10 }) { 10 } else { 20 }"), Rc::new(ObjKind::Integer(20)));
    }

    #[test]
    fn end_to_end_calling_with_wrong_arity_is_an_error() {
        let err = run("fn(a, b) { a + b; }(1);").unwrap_err();
        assert_eq!(err.to_string(), "wrong number of arguments: expected 2, got 1");
    }

    #[test]
    fn end_to_end_len_errors_match_spec_wording() {
        assert_eq!(
            run(r#"len("one", "two")"#).unwrap_err().to_string(),
            "invalid number of arguments for 'len'"
        );
        assert_eq!(run("len(1)").unwrap_err().to_string(), "argument INTEGER to 'len' not supported");
    }

    #[test]
    fn while_is_rejected_by_the_bytecode_compiler() {
        let err = run("while (true) { 1; }").unwrap_err();
        assert!(matches!(err, EngineError::Compile(CompileError::UnsupportedFeature(_))));
    }

    #[test]
    fn assignment_is_rejected_by_the_bytecode_compiler() {
        let err = run("let x = 1; x = 2;").unwrap_err();
        assert!(matches!(err, EngineError::Compile(CompileError::UnsupportedFeature(_))));
    }
}

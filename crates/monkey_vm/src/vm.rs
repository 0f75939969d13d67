use std::rc::Rc;

use indexmap::IndexMap;
use monkey_object::{ClosureObj, CompiledFunctionObj, HashKey, HashPair, ObjKind, Object, Pool};

use crate::chunk::Bytecode;
use crate::error::{VmError, VmResult};
use crate::opcode::{read_u16, read_u8, Op};
use crate::stdlib::BUILTINS;

pub const STACK_SIZE: usize = 2048;
pub const GLOBALS_SIZE: usize = 65536;
pub const FRAMES_SIZE: usize = 1024;

/// One call's worth of execution state: the closure being run, its
/// instruction pointer, and where its locals start on the value stack.
struct Frame {
    closure: Rc<ClosureObj>,
    ip: usize,
    base_pointer: usize,
}

impl Frame {
    fn instructions(&self) -> Rc<[u8]> {
        Rc::clone(&self.closure.func.instructions)
    }
}

/// Stack machine that executes compiled bytecode. `globals` and `constants`
/// are exposed so a REPL can carry them across separate calls to `run`.
pub struct Vm {
    constants: Vec<Object>,
    stack: Vec<Object>,
    sp: usize,
    globals: Vec<Object>,
    frames: Vec<Frame>,
    pool: Pool,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Vm::new_with_globals(bytecode, vec![Rc::new(ObjKind::Null); GLOBALS_SIZE])
    }

    /// Resumes execution with globals carried over from a previous call —
    /// how the REPL keeps top-level `let`-bindings alive across lines.
    pub fn new_with_globals(bytecode: Bytecode, globals: Vec<Object>) -> Self {
        let main_fn = CompiledFunctionObj {
            instructions: Rc::from(bytecode.instructions.into_boxed_slice()),
            num_locals: 0,
            num_parameters: 0,
        };
        let main_closure = ClosureObj { func: Rc::new(main_fn), free: Vec::new() };
        let main_frame = Frame { closure: Rc::new(main_closure), ip: 0, base_pointer: 0 };

        let null = Rc::new(ObjKind::Null);
        Vm {
            constants: bytecode.constants,
            stack: vec![null; STACK_SIZE],
            sp: 0,
            globals,
            frames: vec![main_frame],
            pool: Pool::new(),
        }
    }

    pub fn globals(&self) -> Vec<Object> {
        self.globals.clone()
    }

    /// The last value popped off the stack — what `OpPop` just discarded.
    /// Used by the REPL to print the value of the last top-level expression.
    pub fn last_popped_stack_element(&self) -> Object {
        Rc::clone(&self.stack[self.sp])
    }

    fn current_frame(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack underflow")
    }

    fn push_frame(&mut self, frame: Frame) -> VmResult<()> {
        if self.frames.len() >= FRAMES_SIZE {
            return Err(VmError::FrameOverflow);
        }
        self.frames.push(frame);
        Ok(())
    }

    fn pop_frame(&mut self) -> Frame {
        self.frames.pop().expect("frame stack underflow")
    }

    fn push(&mut self, obj: Object) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.stack[self.sp] = obj;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Object {
        self.sp -= 1;
        Rc::clone(&self.stack[self.sp])
    }

    pub fn run(&mut self) -> VmResult<()> {
        loop {
            let ip = self.current_frame().ip;
            let instructions = self.current_frame().instructions();
            if ip >= instructions.len() {
                break;
            }
            let op = Op::from_u8(instructions[ip]).expect("invalid opcode in compiled instructions");

            match op {
                Op::Constant => {
                    let idx = read_u16(&instructions, ip + 1) as usize;
                    self.current_frame().ip += 3;
                    self.push(Rc::clone(&self.constants[idx]))?;
                }
                Op::Add | Op::Sub | Op::Mul | Op::Div => {
                    self.current_frame().ip += 1;
                    self.execute_binary_operation(op)?;
                }
                Op::True => {
                    self.current_frame().ip += 1;
                    self.push(self.pool.boolean(true))?;
                }
                Op::False => {
                    self.current_frame().ip += 1;
                    self.push(self.pool.boolean(false))?;
                }
                Op::Null => {
                    self.current_frame().ip += 1;
                    self.push(self.pool.null())?;
                }
                Op::Equal | Op::NotEqual | Op::GreaterThan => {
                    self.current_frame().ip += 1;
                    self.execute_comparison(op)?;
                }
                Op::Minus => {
                    self.current_frame().ip += 1;
                    self.execute_minus()?;
                }
                Op::Bang => {
                    self.current_frame().ip += 1;
                    self.execute_bang()?;
                }
                Op::Pop => {
                    self.current_frame().ip += 1;
                    self.pop();
                }
                Op::Jump => {
                    let target = read_u16(&instructions, ip + 1) as usize;
                    self.current_frame().ip = target;
                }
                Op::JumpNotTruthy => {
                    self.current_frame().ip += 3;
                    let condition = self.pop();
                    if !condition.is_truthy() {
                        let target = read_u16(&instructions, ip + 1) as usize;
                        self.current_frame().ip = target;
                    }
                }
                Op::GetGlobal => {
                    let idx = read_u16(&instructions, ip + 1) as usize;
                    self.current_frame().ip += 3;
                    self.push(Rc::clone(&self.globals[idx]))?;
                }
                Op::SetGlobal => {
                    let idx = read_u16(&instructions, ip + 1) as usize;
                    self.current_frame().ip += 3;
                    self.globals[idx] = self.pop();
                }
                Op::GetLocal => {
                    let idx = read_u8(&instructions, ip + 1) as usize;
                    self.current_frame().ip += 2;
                    let base = self.current_frame().base_pointer;
                    self.push(Rc::clone(&self.stack[base + idx]))?;
                }
                Op::SetLocal => {
                    let idx = read_u8(&instructions, ip + 1) as usize;
                    self.current_frame().ip += 2;
                    let base = self.current_frame().base_pointer;
                    let value = self.pop();
                    self.stack[base + idx] = value;
                }
                Op::GetBuiltin => {
                    let idx = read_u8(&instructions, ip + 1) as usize;
                    self.current_frame().ip += 2;
                    self.push(Rc::new(ObjKind::Builtin(BUILTINS[idx])))?;
                }
                Op::GetFree => {
                    let idx = read_u8(&instructions, ip + 1) as usize;
                    self.current_frame().ip += 2;
                    let free = Rc::clone(&self.current_frame().closure.free[idx]);
                    self.push(free)?;
                }
                Op::CurrentClosure => {
                    self.current_frame().ip += 1;
                    let closure = Rc::clone(&self.current_frame().closure);
                    self.push(Rc::new(ObjKind::Closure((*closure).clone())))?;
                }
                Op::Array => {
                    let n = read_u16(&instructions, ip + 1) as usize;
                    self.current_frame().ip += 3;
                    let items = self.stack[self.sp - n..self.sp].to_vec();
                    self.sp -= n;
                    self.push(Rc::new(ObjKind::Array(items)))?;
                }
                Op::Hash => {
                    let n = read_u16(&instructions, ip + 1) as usize;
                    self.current_frame().ip += 3;
                    self.execute_hash(n)?;
                }
                Op::Index => {
                    self.current_frame().ip += 1;
                    self.execute_index()?;
                }
                Op::Call => {
                    let num_args = read_u8(&instructions, ip + 1) as usize;
                    self.current_frame().ip += 2;
                    self.execute_call(num_args)?;
                }
                Op::ReturnValue => {
                    let value = self.pop();
                    let frame = self.pop_frame();
                    self.sp = frame.base_pointer - 1;
                    self.push(value)?;
                }
                Op::ReturnNull => {
                    let frame = self.pop_frame();
                    self.sp = frame.base_pointer - 1;
                    self.push(self.pool.null())?;
                }
                Op::Closure => {
                    let const_idx = read_u16(&instructions, ip + 1) as usize;
                    let num_free = read_u8(&instructions, ip + 3) as usize;
                    self.current_frame().ip += 4;
                    self.push_closure(const_idx, num_free)?;
                }
            }
        }
        Ok(())
    }

    fn execute_binary_operation(&mut self, op: Op) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();
        match (&*left, &*right) {
            (ObjKind::Integer(a), ObjKind::Integer(b)) => {
                let result = match op {
                    Op::Add => a.wrapping_add(*b),
                    Op::Sub => a.wrapping_sub(*b),
                    Op::Mul => a.wrapping_mul(*b),
                    Op::Div => {
                        if *b == 0 {
                            return Err(VmError::Runtime("division by zero".to_string()));
                        }
                        a.wrapping_div(*b)
                    }
                    _ => unreachable!(),
                };
                self.push(self.pool.integer(result))
            }
            (ObjKind::Str(a), ObjKind::Str(b)) if op == Op::Add => {
                self.push(Rc::new(ObjKind::Str(format!("{}{}", a, b))))
            }
            _ => Err(VmError::UnsupportedBinaryOperation {
                left: left.type_name(),
                right: right.type_name(),
            }),
        }
    }

    fn execute_comparison(&mut self, op: Op) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();
        match (&*left, &*right) {
            (ObjKind::Integer(a), ObjKind::Integer(b)) => {
                let result = match op {
                    Op::Equal => a == b,
                    Op::NotEqual => a != b,
                    Op::GreaterThan => a > b,
                    _ => unreachable!(),
                };
                self.push(self.pool.boolean(result))
            }
            _ => match op {
                Op::Equal => self.push(self.pool.boolean(Rc::ptr_eq(&left, &right))),
                Op::NotEqual => self.push(self.pool.boolean(!Rc::ptr_eq(&left, &right))),
                Op::GreaterThan => Err(VmError::UnsupportedBinaryOperation {
                    left: left.type_name(),
                    right: right.type_name(),
                }),
                _ => unreachable!(),
            },
        }
    }

    fn execute_minus(&mut self) -> VmResult<()> {
        let operand = self.pop();
        match &*operand {
            ObjKind::Integer(n) => self.push(self.pool.integer(n.wrapping_neg())),
            other => Err(VmError::UnknownOperator(format!("-{}", other.type_name()))),
        }
    }

    fn execute_bang(&mut self) -> VmResult<()> {
        let operand = self.pop();
        self.push(self.pool.boolean(!operand.is_truthy()))
    }

    fn execute_hash(&mut self, n: usize) -> VmResult<()> {
        let mut pairs = IndexMap::new();
        let start = self.sp - n;
        let mut i = start;
        while i < self.sp {
            let key = Rc::clone(&self.stack[i]);
            let value = Rc::clone(&self.stack[i + 1]);
            let hash_key = HashKey::from_object(&key)
                .ok_or_else(|| VmError::UnusableHashKey(key.type_name()))?;
            pairs.insert(hash_key, HashPair { key, value });
            i += 2;
        }
        self.sp = start;
        self.push(Rc::new(ObjKind::Hash(pairs)))
    }

    fn execute_index(&mut self) -> VmResult<()> {
        let index = self.pop();
        let left = self.pop();
        match (&*left, &*index) {
            (ObjKind::Array(items), ObjKind::Integer(i)) => {
                if *i < 0 || *i as usize >= items.len() {
                    self.push(self.pool.null())
                } else {
                    self.push(Rc::clone(&items[*i as usize]))
                }
            }
            (ObjKind::Hash(pairs), _) => match HashKey::from_object(&index) {
                Some(key) => match pairs.get(&key) {
                    Some(pair) => self.push(Rc::clone(&pair.value)),
                    None => self.push(self.pool.null()),
                },
                None => Err(VmError::UnusableHashKey(index.type_name())),
            },
            _ => Err(VmError::IndexNotSupported { left: left.type_name(), index: index.type_name() }),
        }
    }

    fn push_closure(&mut self, const_idx: usize, num_free: usize) -> VmResult<()> {
        let func = match &*self.constants[const_idx] {
            ObjKind::CompiledFunction(f) => Rc::new(f.clone()),
            other => panic!("not a compiled function: {:?}", other),
        };
        let free = self.stack[self.sp - num_free..self.sp].to_vec();
        self.sp -= num_free;
        self.push(Rc::new(ObjKind::Closure(ClosureObj { func, free })))
    }

    fn execute_call(&mut self, num_args: usize) -> VmResult<()> {
        let callee = Rc::clone(&self.stack[self.sp - 1 - num_args]);
        match &*callee {
            ObjKind::Closure(closure) => self.call_closure(closure.clone(), num_args),
            ObjKind::Builtin(builtin) => self.call_builtin(*builtin, num_args),
            other => Err(VmError::NotCallable(other.type_name())),
        }
    }

    fn call_closure(&mut self, closure: ClosureObj, num_args: usize) -> VmResult<()> {
        if num_args != closure.func.num_parameters {
            return Err(VmError::WrongNumberOfArguments {
                expected: closure.func.num_parameters,
                got: num_args,
            });
        }
        let num_locals = closure.func.num_locals;
        let base_pointer = self.sp - num_args;
        let frame = Frame { closure: Rc::new(closure), ip: 0, base_pointer };
        self.push_frame(frame)?;
        self.sp = base_pointer + num_locals;
        Ok(())
    }

    fn call_builtin(&mut self, builtin: monkey_object::Builtin, num_args: usize) -> VmResult<()> {
        let args = self.stack[self.sp - num_args..self.sp].to_vec();
        self.sp = self.sp - num_args - 1;
        let result = (builtin.func)(&args);
        if let ObjKind::Error(msg) = &*result {
            return Err(VmError::Runtime(msg.clone()));
        }
        self.push(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use monkey_parser::parse;

    fn run(src: &str) -> Object {
        let (program, lex_errors, parse_errors) = parse(src);
        assert!(lex_errors.is_empty());
        assert!(parse_errors.is_empty());
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");
        let mut vm = Vm::new(compiler.bytecode());
        vm.run().expect("vm error");
        vm.last_popped_stack_element()
    }

    fn run_err(src: &str) -> VmError {
        let (program, _, _) = parse(src);
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");
        let mut vm = Vm::new(compiler.bytecode());
        vm.run().unwrap_err()
    }

    fn int(n: i64) -> Object {
        Rc::new(ObjKind::Integer(n))
    }

    #[test]
    fn integer_arithmetic() {
        assert_eq!(run("5 * (2 + -10)"), int(-40));
        assert_eq!(run("5 + 5 + 5 + 5 - 10"), int(10));
        assert_eq!(run("50 / 2 * 2 + 10 - 5"), int(55));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(run(r#""mon" + "key" + "banana""#), Rc::new(ObjKind::Str("monkeybanana".to_string())));
    }

    #[test]
    fn boolean_expressions() {
        assert_eq!(run("1 < 2"), Rc::new(ObjKind::Boolean(true)));
        assert_eq!(run("(1 < 2) == true"), Rc::new(ObjKind::Boolean(true)));
    }

    #[test]
    fn conditionals() {
        assert_eq!(run("if (if (false) { 10 }) { 10 } else { 20 }"), int(20));
        assert_eq!(run("if (false) { 10 }"), Rc::new(ObjKind::Null));
    }

    #[test]
    fn global_let_statements() {
        assert_eq!(run("let one = 1; let two = one + one; one + two"), int(3));
    }

    #[test]
    fn array_and_hash_literals() {
        assert_eq!(run("[1, 2, 3][99]"), Rc::new(ObjKind::Null));
        assert_eq!(run("[1][-1]"), Rc::new(ObjKind::Null));
        assert_eq!(run("{1: 1}[0]"), Rc::new(ObjKind::Null));
        assert_eq!(run("{1: 1, 2: 2}[2]"), int(2));
    }

    #[test]
    fn recursive_fibonacci() {
        let src = "let fib = fn(x) { if (x < 2) { x } else { fib(x - 1) + fib(x - 2) } }; fib(15);";
        assert_eq!(run(src), int(610));
    }

    #[test]
    fn closures_capture_enclosing_scope() {
        let src = "\
            let newAdder = fn(a, b) { fn(c) { a + b + c } };\n\
            let adder = newAdder(1, 2);\n\
            adder(8);";
        assert_eq!(run(src), int(11));
    }

    #[test]
    fn closures_over_recursive_counters() {
        let src = "\
            let wrapper = fn() {\n\
                let countDown = fn(x) { if (x == 0) { return 0; } else { countDown(x - 1); } };\n\
                countDown(1);\n\
            };\n\
            wrapper();";
        assert_eq!(run(src), int(0));
    }

    #[test]
    fn calling_with_wrong_number_of_arguments() {
        let err = run_err("fn(a, b) { a + b; }(1);");
        assert_eq!(err, VmError::WrongNumberOfArguments { expected: 2, got: 1 });
    }

    #[test]
    fn builtin_errors_surface_as_runtime_errors() {
        let err = run_err(r#"len("one", "two")"#);
        assert_eq!(err, VmError::Runtime("invalid number of arguments for 'len'".to_string()));

        let err = run_err("len(1)");
        assert_eq!(err, VmError::Runtime("argument INTEGER to 'len' not supported".to_string()));
    }

    #[test]
    fn puts_returns_empty() {
        assert_eq!(run("puts(1)"), Rc::new(ObjKind::Empty));
    }
}

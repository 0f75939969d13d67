use std::rc::Rc;

use monkey_object::{CompiledFunctionObj, ObjKind, Object};
use monkey_parser::ast::*;

use crate::chunk::Bytecode;
use crate::error::{CompileError, CompileResult};
use crate::opcode::{make, Op};
use crate::stdlib::BUILTINS;
use crate::symbol_table::{Symbol, SymbolScope, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EmittedInstruction {
    op: Op,
    position: usize,
}

/// One function body's worth of in-progress instructions, plus enough of
/// the last two emissions to support if-expression backpatching and the
/// trailing-`OpPop`-to-`OpReturnValue` rewrite.
struct CompilationScope {
    instructions: Vec<u8>,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

impl CompilationScope {
    fn new() -> Self {
        CompilationScope { instructions: Vec::new(), last_instruction: None, previous_instruction: None }
    }
}

/// AST → bytecode, single pass. The outer (main program) scope is always
/// `scopes[0]`; compiling a `FunctionLiteral` pushes a fresh scope and a
/// fresh, nested `SymbolTable` for the duration of its body.
pub struct Compiler {
    constants: Vec<Object>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            symbol_table.define_builtin(index, builtin.name);
        }
        Compiler { constants: Vec::new(), symbol_table, scopes: vec![CompilationScope::new()] }
    }

    /// Resumes compilation against state left over from a previous call —
    /// the REPL's way of making `let`-bindings and constants persist across
    /// separate lines of input.
    pub fn new_with_state(symbol_table: SymbolTable, constants: Vec<Object>) -> Self {
        Compiler { constants, symbol_table, scopes: vec![CompilationScope::new()] }
    }

    pub fn into_state(self) -> (SymbolTable, Vec<Object>) {
        (self.symbol_table, self.constants)
    }

    pub fn compile(&mut self, program: &Program) -> CompileResult<()> {
        for stmt in &program.stmts {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode { instructions: self.current_instructions().to_vec(), constants: self.constants.clone() }
    }

    fn current_instructions(&self) -> &[u8] {
        &self.scopes.last().expect("no compilation scope").instructions
    }

    fn add_constant(&mut self, obj: ObjKind) -> usize {
        self.constants.push(Rc::new(obj));
        self.constants.len() - 1
    }

    fn emit(&mut self, op: Op, operands: &[usize]) -> usize {
        let ins = make(op, operands);
        let pos = self.add_instruction(&ins);
        let scope = self.scopes.last_mut().unwrap();
        scope.previous_instruction = scope.last_instruction.take();
        scope.last_instruction = Some(EmittedInstruction { op, position: pos });
        pos
    }

    fn add_instruction(&mut self, ins: &[u8]) -> usize {
        let scope = self.scopes.last_mut().unwrap();
        let pos = scope.instructions.len();
        scope.instructions.extend_from_slice(ins);
        pos
    }

    fn last_instruction_is(&self, op: Op) -> bool {
        self.scopes.last().unwrap().last_instruction.map_or(false, |e| e.op == op)
    }

    fn remove_last_pop(&mut self) {
        let scope = self.scopes.last_mut().unwrap();
        let last = scope.last_instruction.expect("no last instruction to remove");
        scope.instructions.truncate(last.position);
        scope.last_instruction = scope.previous_instruction.take();
    }

    fn replace_instruction(&mut self, pos: usize, new_instruction: Vec<u8>) {
        let scope = self.scopes.last_mut().unwrap();
        scope.instructions[pos..pos + new_instruction.len()].copy_from_slice(&new_instruction);
    }

    fn change_operand(&mut self, pos: usize, operand: usize) {
        let op = Op::from_u8(self.current_instructions()[pos]).expect("backpatch site is not an opcode");
        let new_instruction = make(op, &[operand]);
        self.replace_instruction(pos, new_instruction);
    }

    /// Rewrites the trailing `OpPop` of a just-compiled function body into
    /// `OpReturnValue`, so the last expression's value becomes the return
    /// value instead of being discarded.
    fn replace_last_pop_with_return(&mut self) {
        let pos = self.scopes.last().unwrap().last_instruction.unwrap().position;
        self.replace_instruction(pos, make(Op::ReturnValue, &[]));
        self.scopes.last_mut().unwrap().last_instruction.as_mut().unwrap().op = Op::ReturnValue;
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::new());
        let outer = std::mem::replace(&mut self.symbol_table, SymbolTable::new());
        self.symbol_table = SymbolTable::enclosed(outer);
    }

    fn leave_scope(&mut self) -> Vec<u8> {
        let scope = self.scopes.pop().expect("no compilation scope to leave");
        let outer = std::mem::replace(&mut self.symbol_table, SymbolTable::new());
        self.symbol_table = outer.into_outer().expect("leaving the root symbol table");
        scope.instructions
    }

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Op::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Op::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Op::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Op::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(Op::CurrentClosure, &[]),
        };
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match &stmt.inner {
            StmtKind::Expr(expr) => {
                self.compile_expr(expr)?;
                self.emit(Op::Pop, &[]);
            }
            StmtKind::Let { name, value } => {
                // Defined before the value is compiled: a recursive function
                // bound by this `let` needs its own name to already resolve
                // to a global/local slot while its body is being compiled.
                let symbol = self.symbol_table.define(name);
                self.compile_expr(value)?;
                match symbol.scope {
                    SymbolScope::Global => self.emit(Op::SetGlobal, &[symbol.index]),
                    SymbolScope::Local => self.emit(Op::SetLocal, &[symbol.index]),
                    _ => unreachable!("define() only ever produces Global or Local"),
                };
            }
            StmtKind::Return(value) => {
                match value {
                    Some(expr) => {
                        self.compile_expr(expr)?;
                        self.emit(Op::ReturnValue, &[]);
                    }
                    None => {
                        self.emit(Op::ReturnNull, &[]);
                    }
                }
            }
            StmtKind::Assign { .. } => {
                return Err(CompileError::UnsupportedFeature(
                    "assignment is not supported by the bytecode compiler; use the evaluator".to_string(),
                ));
            }
            StmtKind::Break => {
                return Err(CompileError::UnsupportedFeature(
                    "break is not supported by the bytecode compiler; use the evaluator".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, block: &Block) -> CompileResult<()> {
        for stmt in block {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) -> CompileResult<()> {
        match &expr.inner {
            ExprKind::Integer(n) => {
                let idx = self.add_constant(ObjKind::Integer(*n));
                self.emit(Op::Constant, &[idx]);
            }
            ExprKind::Str(s) => {
                let idx = self.add_constant(ObjKind::Str(s.clone()));
                self.emit(Op::Constant, &[idx]);
            }
            ExprKind::Boolean(true) => {
                self.emit(Op::True, &[]);
            }
            ExprKind::Boolean(false) => {
                self.emit(Op::False, &[]);
            }
            ExprKind::Ident(name) => {
                let symbol = self
                    .symbol_table
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                self.load_symbol(&symbol);
            }
            ExprKind::Prefix { op, right } => {
                self.compile_expr(right)?;
                match op {
                    PrefixOp::Neg => self.emit(Op::Minus, &[]),
                    PrefixOp::Not => self.emit(Op::Bang, &[]),
                };
            }
            ExprKind::Infix { op: InfixOp::Lt, left, right } => {
                // No dedicated `<` opcode: swap operands and reuse
                // `OpGreaterThan`.
                self.compile_expr(right)?;
                self.compile_expr(left)?;
                self.emit(Op::GreaterThan, &[]);
            }
            ExprKind::Infix { op, left, right } => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                let opcode = match op {
                    InfixOp::Add => Op::Add,
                    InfixOp::Sub => Op::Sub,
                    InfixOp::Mul => Op::Mul,
                    InfixOp::Div => Op::Div,
                    InfixOp::Eq => Op::Equal,
                    InfixOp::NotEq => Op::NotEqual,
                    InfixOp::Gt => Op::GreaterThan,
                    InfixOp::Lt => unreachable!("handled above"),
                };
                self.emit(opcode, &[]);
            }
            ExprKind::If { condition, consequence, alternative } => {
                self.compile_if(condition, consequence, alternative.as_ref())?;
            }
            ExprKind::While { .. } => {
                return Err(CompileError::UnsupportedFeature(
                    "while loops are not supported by the bytecode compiler; use the evaluator".to_string(),
                ));
            }
            ExprKind::Function { name, params, body } => {
                self.compile_function(name.as_deref(), params, body)?;
            }
            ExprKind::Call { callee, args } => {
                self.compile_expr(callee)?;
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.emit(Op::Call, &[args.len()]);
            }
            ExprKind::Array(items) => {
                for item in items {
                    self.compile_expr(item)?;
                }
                self.emit(Op::Array, &[items.len()]);
            }
            ExprKind::Hash(pairs) => {
                self.compile_hash(pairs)?;
            }
            ExprKind::Index { left, index } => {
                self.compile_expr(left)?;
                self.compile_expr(index)?;
                self.emit(Op::Index, &[]);
            }
        }
        Ok(())
    }

    fn compile_if(&mut self, condition: &Expr, consequence: &Block, alternative: Option<&Block>) -> CompileResult<()> {
        self.compile_expr(condition)?;
        let jump_not_truthy_pos = self.emit(Op::JumpNotTruthy, &[9999]);

        self.compile_block(consequence)?;
        if self.last_instruction_is(Op::Pop) {
            self.remove_last_pop();
        }
        let jump_pos = self.emit(Op::Jump, &[9999]);

        let after_consequence = self.current_instructions().len();
        self.change_operand(jump_not_truthy_pos, after_consequence);

        match alternative {
            None => {
                self.emit(Op::Null, &[]);
            }
            Some(block) => {
                self.compile_block(block)?;
                if self.last_instruction_is(Op::Pop) {
                    self.remove_last_pop();
                }
            }
        }

        let after_alternative = self.current_instructions().len();
        self.change_operand(jump_pos, after_alternative);
        Ok(())
    }

    fn compile_function(&mut self, name: Option<&str>, params: &[String], body: &Block) -> CompileResult<()> {
        self.enter_scope();

        if let Some(name) = name {
            self.symbol_table.define_function_name(name);
        }
        for param in params {
            self.symbol_table.define(param);
        }

        self.compile_block(body)?;

        let last_op = self.scopes.last().unwrap().last_instruction.map(|e| e.op);
        match last_op {
            Some(Op::Pop) => self.replace_last_pop_with_return(),
            Some(Op::ReturnValue) | Some(Op::ReturnNull) => {}
            _ => {
                self.emit(Op::ReturnNull, &[]);
            }
        }

        let free_symbols = self.symbol_table.free_symbols.clone();
        let num_locals = self.symbol_table.num_definitions;
        let instructions = self.leave_scope();

        // Free variables are captured by value: load each one in the
        // *enclosing* scope, in the order the closure expects them.
        for symbol in &free_symbols {
            self.load_symbol(symbol);
        }

        let compiled = CompiledFunctionObj {
            instructions: Rc::from(instructions.into_boxed_slice()),
            num_locals,
            num_parameters: params.len(),
        };
        let const_idx = self.add_constant(ObjKind::CompiledFunction(compiled));
        self.emit(Op::Closure, &[const_idx, free_symbols.len()]);
        Ok(())
    }

    fn compile_hash(&mut self, pairs: &[(Expr, Expr)]) -> CompileResult<()> {
        // Sorted by the key expression's printed form purely so that the
        // emitted bytecode (and thus the constant pool) is deterministic
        // across compiles of the same source — `HashObj` equality itself
        // does not depend on order.
        let mut ordered: Vec<&(Expr, Expr)> = pairs.iter().collect();
        ordered.sort_by_key(|(key, _)| expr_sort_key(key));

        for (key, value) in ordered {
            self.compile_expr(key)?;
            self.compile_expr(value)?;
        }
        self.emit(Op::Hash, &[pairs.len() * 2]);
        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

fn expr_sort_key(expr: &Expr) -> String {
    match &expr.inner {
        ExprKind::Integer(n) => format!("{:020}", n),
        ExprKind::Str(s) => s.clone(),
        ExprKind::Boolean(b) => b.to_string(),
        ExprKind::Ident(name) => name.clone(),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monkey_parser::parse;

    fn compile(src: &str) -> Bytecode {
        let (program, lex_errors, parse_errors) = parse(src);
        assert!(lex_errors.is_empty(), "lex errors: {:?}", lex_errors);
        assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");
        compiler.bytecode()
    }

    fn concat(chunks: Vec<Vec<u8>>) -> Vec<u8> {
        chunks.into_iter().flatten().collect()
    }

    #[test]
    fn integer_arithmetic_emits_constants_and_add() {
        let bytecode = compile("1 + 2");
        assert_eq!(bytecode.constants.len(), 2);
        let expected = concat(vec![
            make(Op::Constant, &[0]),
            make(Op::Constant, &[1]),
            make(Op::Add, &[]),
            make(Op::Pop, &[]),
        ]);
        assert_eq!(bytecode.instructions, expected);
    }

    #[test]
    fn less_than_swaps_operands_for_greater_than() {
        let bytecode = compile("1 < 2");
        let expected = concat(vec![
            make(Op::Constant, &[0]),
            make(Op::Constant, &[1]),
            make(Op::GreaterThan, &[]),
            make(Op::Pop, &[]),
        ]);
        assert_eq!(bytecode.instructions, expected);
    }

    #[test]
    fn if_without_else_injects_null_branch() {
        let bytecode = compile("if (true) { 10 }; 3333;");
        let expected = concat(vec![
            make(Op::True, &[]),
            make(Op::JumpNotTruthy, &[10]),
            make(Op::Constant, &[0]),
            make(Op::Jump, &[11]),
            make(Op::Null, &[]),
            make(Op::Pop, &[]),
            make(Op::Constant, &[1]),
            make(Op::Pop, &[]),
        ]);
        assert_eq!(bytecode.instructions, expected);
    }

    #[test]
    fn let_statement_uses_global_slots() {
        let bytecode = compile("let one = 1; let two = 2;");
        let expected = concat(vec![
            make(Op::Constant, &[0]),
            make(Op::SetGlobal, &[0]),
            make(Op::Constant, &[1]),
            make(Op::SetGlobal, &[1]),
        ]);
        assert_eq!(bytecode.instructions, expected);
    }

    #[test]
    fn compiler_rejects_undefined_identifier() {
        let (program, _, _) = parse("foobar;");
        let mut compiler = Compiler::new();
        let err = compiler.compile(&program).unwrap_err();
        assert_eq!(err, CompileError::UndefinedVariable("foobar".to_string()));
    }

    #[test]
    fn compiler_rejects_while_and_assignment() {
        let (program, _, _) = parse("while (true) { 1; }");
        assert!(Compiler::new().compile(&program).is_err());
        let (program, _, _) = parse("let x = 1; x = 2;");
        assert!(Compiler::new().compile(&program).is_err());
    }

    #[test]
    fn closures_capture_free_variables_in_order() {
        let bytecode = compile("fn(a) { fn(b) { a + b } }");
        // outer: [constant? no — first compiled fn is the inner one, stored
        // before the outer closure constant]
        assert_eq!(bytecode.constants.len(), 2);
        let inner = match &*bytecode.constants[0] {
            ObjKind::CompiledFunction(f) => f,
            other => panic!("expected compiled function, got {:?}", other),
        };
        let expected_inner = concat(vec![
            make(Op::GetFree, &[0]),
            make(Op::GetLocal, &[0]),
            make(Op::Add, &[]),
            make(Op::ReturnValue, &[]),
        ]);
        assert_eq!(&*inner.instructions, expected_inner.as_slice());

        let expected_outer = concat(vec![
            make(Op::GetLocal, &[0]),
            make(Op::Closure, &[0, 1]),
            make(Op::ReturnValue, &[]),
        ]);
        match &*bytecode.constants[1] {
            ObjKind::CompiledFunction(f) => assert_eq!(&*f.instructions, expected_outer.as_slice()),
            other => panic!("expected compiled function, got {:?}", other),
        }
    }

    #[test]
    fn recursive_let_bound_function_uses_current_closure() {
        let bytecode = compile("let countDown = fn(x) { countDown(x - 1) }; countDown(1);");
        let compiled = match &*bytecode.constants[1] {
            ObjKind::CompiledFunction(f) => f,
            other => panic!("expected compiled function, got {:?}", other),
        };
        let expected = concat(vec![
            make(Op::CurrentClosure, &[]),
            make(Op::GetLocal, &[0]),
            make(Op::Constant, &[0]),
            make(Op::Sub, &[]),
            make(Op::Call, &[1]),
            make(Op::ReturnValue, &[]),
        ]);
        assert_eq!(&*compiled.instructions, expected.as_slice());
    }

    #[test]
    fn hash_literal_keys_are_compiled_in_sorted_order() {
        let bytecode = compile(r#"{"b": 2, "a": 1}"#);
        // "a" sorts before "b", so its constant (value then key, but we
        // compile key then value per pair) lands first in the pool.
        assert_eq!(bytecode.constants.len(), 4);
        let expected = concat(vec![
            make(Op::Constant, &[0]), // "a"
            make(Op::Constant, &[1]), // 1
            make(Op::Constant, &[2]), // "b"
            make(Op::Constant, &[3]), // 2
            make(Op::Hash, &[4]),
            make(Op::Pop, &[]),
        ]);
        assert_eq!(bytecode.instructions, expected);
    }
}

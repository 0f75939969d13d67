use std::cell::RefCell;
use std::rc::Rc;

use monkey_object::{Function, HashKey, HashPair, ObjKind, Object, Pool};
use monkey_parser::ast::{Block, ExprKind, InfixOp, PrefixOp, Program, StmtKind};

use crate::environment::Env;
use crate::stdlib;

/// Tree-walking evaluator. Errors are in-band `Obj::Error` values rather
/// than a `Result` — a function body that errors deep inside a call just
/// keeps returning that same `Error` object up through every caller until
/// something checks it, the same way `ReturnValue` unwinds a block.
pub struct Interpreter {
    env: Rc<RefCell<Env>>,
    pool: Pool,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter { env: Env::new(), pool: Pool::new() }
    }

    pub fn env(&self) -> Rc<RefCell<Env>> {
        Rc::clone(&self.env)
    }

    fn error(&self, msg: String) -> Object {
        Rc::new(ObjKind::Error(msg))
    }

    pub fn eval_program(&mut self, program: &Program) -> Object {
        let mut result = Rc::new(ObjKind::Empty);
        let env = self.env();
        for stmt in &program.stmts {
            result = self.eval_stmt(&stmt.inner, &env);
            match &*result {
                ObjKind::ReturnValue(v) => return Rc::clone(v),
                ObjKind::Error(_) => return result,
                _ => {}
            }
        }
        result
    }

    fn eval_block(&mut self, block: &Block, env: &Rc<RefCell<Env>>) -> Object {
        let mut result = Rc::new(ObjKind::Empty);
        for stmt in block {
            result = self.eval_stmt(&stmt.inner, env);
            match &*result {
                ObjKind::ReturnValue(_) | ObjKind::Error(_) | ObjKind::Break => return result,
                _ => {}
            }
        }
        result
    }

    fn eval_stmt(&mut self, stmt: &StmtKind, env: &Rc<RefCell<Env>>) -> Object {
        match stmt {
            StmtKind::Let { name, value } => {
                let val = self.eval_expr(&value.inner, env);
                if val.is_error() {
                    return val;
                }
                if matches!(&*val, ObjKind::Null | ObjKind::Empty | ObjKind::Break) {
                    return self.error(format!("cant assign null to variable '{}'", name));
                }
                env.borrow_mut().set(name.clone(), val);
                Rc::new(ObjKind::Empty)
            }
            StmtKind::Return(value) => {
                let val = match value {
                    Some(expr) => self.eval_expr(&expr.inner, env),
                    None => monkey_object::null(),
                };
                if val.is_error() {
                    return val;
                }
                Rc::new(ObjKind::ReturnValue(val))
            }
            StmtKind::Assign { name, value } => {
                let val = self.eval_expr(&value.inner, env);
                if val.is_error() {
                    return val;
                }
                if matches!(&*val, ObjKind::Null | ObjKind::Empty | ObjKind::Break) {
                    return self.error(format!("cant assign null to variable '{}'", name));
                }
                if !env.borrow_mut().assign(name, val) {
                    return self.error(format!("cant assign to undefined identifier: '{}'", name));
                }
                Rc::new(ObjKind::Empty)
            }
            StmtKind::Break => Rc::new(ObjKind::Break),
            StmtKind::Expr(expr) => self.eval_expr(&expr.inner, env),
        }
    }

    fn eval_expr(&mut self, expr: &ExprKind, env: &Rc<RefCell<Env>>) -> Object {
        match expr {
            ExprKind::Integer(n) => self.pool.integer(*n),
            ExprKind::Str(s) => Rc::new(ObjKind::Str(s.clone())),
            ExprKind::Boolean(b) => self.pool.boolean(*b),
            ExprKind::Ident(name) => self.eval_identifier(name, env),
            ExprKind::Prefix { op, right } => {
                let right = self.eval_expr(&right.inner, env);
                if right.is_error() {
                    return right;
                }
                self.eval_prefix(*op, right)
            }
            ExprKind::Infix { op, left, right } => {
                let left = self.eval_expr(&left.inner, env);
                if left.is_error() {
                    return left;
                }
                let right = self.eval_expr(&right.inner, env);
                if right.is_error() {
                    return right;
                }
                self.eval_infix(*op, left, right)
            }
            ExprKind::If { condition, consequence, alternative } => {
                let cond = self.eval_expr(&condition.inner, env);
                if cond.is_error() {
                    return cond;
                }
                if cond.is_truthy() {
                    let scope = Env::enclosed(Rc::clone(env));
                    self.eval_block(consequence, &scope)
                } else if let Some(alt) = alternative {
                    let scope = Env::enclosed(Rc::clone(env));
                    self.eval_block(alt, &scope)
                } else {
                    monkey_object::null()
                }
            }
            ExprKind::While { condition, body } => {
                loop {
                    let cond = self.eval_expr(&condition.inner, env);
                    if cond.is_error() {
                        return cond;
                    }
                    if !cond.is_truthy() {
                        break;
                    }
                    let scope = Env::enclosed(Rc::clone(env));
                    let result = self.eval_block(body, &scope);
                    match &*result {
                        ObjKind::Error(_) => return result,
                        ObjKind::ReturnValue(_) => return result,
                        ObjKind::Break => break,
                        _ => {}
                    }
                }
                Rc::new(ObjKind::Empty)
            }
            ExprKind::Function { name, params, body } => {
                let func = Rc::new(ObjKind::Function(Function {
                    params: params.clone(),
                    body: body.clone(),
                    env: Rc::clone(env),
                }));
                if let Some(name) = name {
                    env.borrow_mut().set(name.clone(), Rc::clone(&func));
                }
                func
            }
            ExprKind::Call { callee, args } => {
                let func = self.eval_expr(&callee.inner, env);
                if func.is_error() {
                    return func;
                }
                let mut evaluated = Vec::with_capacity(args.len());
                for arg in args {
                    let val = self.eval_expr(&arg.inner, env);
                    if val.is_error() {
                        return val;
                    }
                    evaluated.push(val);
                }
                self.apply_function(func, evaluated)
            }
            ExprKind::Array(elements) => {
                let mut items = Vec::with_capacity(elements.len());
                for el in elements {
                    let val = self.eval_expr(&el.inner, env);
                    if val.is_error() {
                        return val;
                    }
                    items.push(val);
                }
                Rc::new(ObjKind::Array(items))
            }
            ExprKind::Hash(pairs) => {
                let mut map = indexmap::IndexMap::new();
                for (k, v) in pairs {
                    let key = self.eval_expr(&k.inner, env);
                    if key.is_error() {
                        return key;
                    }
                    let value = self.eval_expr(&v.inner, env);
                    if value.is_error() {
                        return value;
                    }
                    let hash_key = match HashKey::from_object(&key) {
                        Some(hk) => hk,
                        None => return self.error(format!("unusable as hash key: {}", key.type_name())),
                    };
                    map.insert(hash_key, HashPair { key, value });
                }
                Rc::new(ObjKind::Hash(map))
            }
            ExprKind::Index { left, index } => {
                let left = self.eval_expr(&left.inner, env);
                if left.is_error() {
                    return left;
                }
                let index = self.eval_expr(&index.inner, env);
                if index.is_error() {
                    return index;
                }
                self.eval_index(left, index)
            }
        }
    }

    fn eval_identifier(&self, name: &str, env: &Rc<RefCell<Env>>) -> Object {
        if let Some(val) = env.borrow().get(name) {
            return val;
        }
        if let Some(idx) = stdlib::lookup_by_name(name) {
            return Rc::new(ObjKind::Builtin(stdlib::BUILTINS[idx]));
        }
        self.error(format!("identifier not found: {}", name))
    }

    fn eval_prefix(&self, op: PrefixOp, right: Object) -> Object {
        match op {
            PrefixOp::Not => self.pool.boolean(!right.is_truthy()),
            PrefixOp::Neg => match &*right {
                ObjKind::Integer(n) => self.pool.integer(n.wrapping_neg()),
                other => self.error(format!("unknown operator: -{}", other.type_name())),
            },
        }
    }

    fn eval_infix(&self, op: InfixOp, left: Object, right: Object) -> Object {
        match (&*left, &*right) {
            (ObjKind::Integer(l), ObjKind::Integer(r)) => self.eval_integer_infix(op, *l, *r),
            (ObjKind::Str(l), ObjKind::Str(r)) => self.eval_string_infix(op, l, r),
            _ => match op {
                InfixOp::Eq => self.pool.boolean(Rc::ptr_eq(&left, &right)),
                InfixOp::NotEq => self.pool.boolean(!Rc::ptr_eq(&left, &right)),
                _ => {
                    if left.type_name() != right.type_name() {
                        self.error(format!(
                            "type mismatch: {} {} {}",
                            left.type_name(),
                            op_symbol(op),
                            right.type_name()
                        ))
                    } else {
                        self.error(format!(
                            "unknown operator: {} {} {}",
                            left.type_name(),
                            op_symbol(op),
                            right.type_name()
                        ))
                    }
                }
            },
        }
    }

    fn eval_integer_infix(&self, op: InfixOp, l: i64, r: i64) -> Object {
        match op {
            InfixOp::Add => self.pool.integer(l.wrapping_add(r)),
            InfixOp::Sub => self.pool.integer(l.wrapping_sub(r)),
            InfixOp::Mul => self.pool.integer(l.wrapping_mul(r)),
            InfixOp::Div => {
                if r == 0 {
                    self.error("division by zero".to_string())
                } else {
                    self.pool.integer(l.wrapping_div(r))
                }
            }
            InfixOp::Lt => self.pool.boolean(l < r),
            InfixOp::Gt => self.pool.boolean(l > r),
            InfixOp::Eq => self.pool.boolean(l == r),
            InfixOp::NotEq => self.pool.boolean(l != r),
        }
    }

    fn eval_string_infix(&self, op: InfixOp, l: &str, r: &str) -> Object {
        match op {
            InfixOp::Add => Rc::new(ObjKind::Str(format!("{}{}", l, r))),
            InfixOp::Eq => self.pool.boolean(l == r),
            InfixOp::NotEq => self.pool.boolean(l != r),
            _ => self.error(format!("unknown operator: STRING {} STRING", op_symbol(op))),
        }
    }

    fn eval_index(&self, left: Object, index: Object) -> Object {
        match (&*left, &*index) {
            (ObjKind::Array(items), ObjKind::Integer(i)) => {
                if *i < 0 || *i as usize >= items.len() {
                    monkey_object::null()
                } else {
                    Rc::clone(&items[*i as usize])
                }
            }
            (ObjKind::Hash(map), _) => match HashKey::from_object(&index) {
                Some(key) => match map.get(&key) {
                    Some(pair) => Rc::clone(&pair.value),
                    None => monkey_object::null(),
                },
                None => self.error(format!("unusable as hash key: {}", index.type_name())),
            },
            _ => self.error(format!(
                "index operator not supported: {}[{}]",
                left.type_name(),
                index.type_name()
            )),
        }
    }

    fn apply_function(&mut self, func: Object, args: Vec<Object>) -> Object {
        match &*func {
            ObjKind::Function(f) => {
                if f.params.len() != args.len() {
                    return self.error(format!(
                        "wrong number of arguments: expected {}, got {}",
                        f.params.len(),
                        args.len()
                    ));
                }
                let scope = Env::enclosed(Rc::clone(&f.env));
                for (param, arg) in f.params.iter().zip(args) {
                    scope.borrow_mut().set(param.clone(), arg);
                }
                let result = self.eval_block(&f.body, &scope);
                match &*result {
                    ObjKind::ReturnValue(v) => Rc::clone(v),
                    _ => result,
                }
            }
            ObjKind::Builtin(b) => (b.func)(&args),
            other => self.error(format!("not a function: {}", other.type_name())),
        }
    }
}

fn op_symbol(op: InfixOp) -> &'static str {
    match op {
        InfixOp::Add => "+",
        InfixOp::Sub => "-",
        InfixOp::Mul => "*",
        InfixOp::Div => "/",
        InfixOp::Eq => "==",
        InfixOp::NotEq => "!=",
        InfixOp::Lt => "<",
        InfixOp::Gt => ">",
    }
}

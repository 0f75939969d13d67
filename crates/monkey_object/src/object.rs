use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use monkey_parser::ast::Block;

use crate::environment::Environment;
use crate::hash_key::HashKey;

/// Every Monkey runtime value is a reference-counted node. Integer, Boolean
/// and Null values are canonicalized through a `Pool` so that `Rc::ptr_eq`
/// can stand in for Monkey's "same value" comparisons.
pub type Object = Rc<ObjKind>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashPair {
    pub key: Object,
    pub value: Object,
}

/// A function value produced by the tree-walking evaluator: body plus the
/// environment captured at definition time.
#[derive(Debug)]
pub struct Function {
    pub params: Vec<String>,
    pub body: Block,
    pub env: Rc<RefCell<Environment>>,
}

/// A function value produced by the compiler, stored in the constant pool.
/// Holds nothing but what's known at compile time.
#[derive(Debug, Clone)]
pub struct CompiledFunctionObj {
    pub instructions: Rc<[u8]>,
    pub num_locals: usize,
    pub num_parameters: usize,
}

/// A `CompiledFunctionObj` together with the free variables captured at the
/// `OpClosure` site. Free variables are captured by copy, not by reference.
#[derive(Debug, Clone)]
pub struct ClosureObj {
    pub func: Rc<CompiledFunctionObj>,
    pub free: Vec<Object>,
}

pub type BuiltinFn = fn(&[Object]) -> Object;

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

#[derive(Debug)]
pub enum ObjKind {
    Integer(i64),
    Boolean(bool),
    Null,
    Str(String),
    Array(Vec<Object>),
    Hash(IndexMap<HashKey, HashPair>),
    Function(Function),
    CompiledFunction(CompiledFunctionObj),
    Closure(ClosureObj),
    Builtin(Builtin),
    ReturnValue(Object),
    Error(String),
    /// Sentinel produced by a bare `break` statement; consumed by the
    /// innermost enclosing `while`.
    Break,
    /// Sentinel for "no value" — distinct from `Null`, used by the REPL to
    /// suppress output for statements that produced nothing printable.
    Empty,
}

impl PartialEq for ObjKind {
    fn eq(&self, other: &Self) -> bool {
        use ObjKind::*;
        match (self, other) {
            (Integer(a), Integer(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (Null, Null) => true,
            (Str(a), Str(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Error(a), Error(b)) => a == b,
            (Break, Break) => true,
            (Empty, Empty) => true,
            _ => false,
        }
    }
}

impl Eq for ObjKind {}

impl ObjKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ObjKind::Integer(_) => "INTEGER",
            ObjKind::Boolean(_) => "BOOLEAN",
            ObjKind::Null => "NULL",
            ObjKind::Str(_) => "STRING",
            ObjKind::Array(_) => "ARRAY",
            ObjKind::Hash(_) => "HASH",
            ObjKind::Function(_) => "FUNCTION",
            ObjKind::CompiledFunction(_) => "COMPILED_FUNCTION_OBJ",
            ObjKind::Closure(_) => "CLOSURE",
            ObjKind::Builtin(_) => "BUILTIN",
            ObjKind::ReturnValue(_) => "RETURN_VALUE",
            ObjKind::Error(_) => "ERROR",
            ObjKind::Break => "BREAK",
            ObjKind::Empty => "EMPTY",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            ObjKind::Boolean(b) => *b,
            ObjKind::Null => false,
            _ => true,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ObjKind::Error(_))
    }
}

impl fmt::Display for ObjKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjKind::Integer(n) => write!(f, "{}", n),
            ObjKind::Boolean(b) => write!(f, "{}", b),
            ObjKind::Null => write!(f, "null"),
            ObjKind::Str(s) => write!(f, "{}", s),
            ObjKind::Array(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            ObjKind::Hash(pairs) => {
                let rendered: Vec<String> = pairs
                    .values()
                    .map(|p| format!("{}: {}", p.key, p.value))
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            ObjKind::Function(func) => {
                write!(f, "fn({}) {{\n  ...\n}}", func.params.join(", "))
            }
            ObjKind::CompiledFunction(_) => write!(f, "CompiledFunction[{:p}]", self),
            ObjKind::Closure(c) => write!(f, "Closure[{:p}]", Rc::as_ptr(&c.func)),
            ObjKind::Builtin(b) => write!(f, "builtin function {}", b.name),
            ObjKind::ReturnValue(v) => write!(f, "{}", v),
            ObjKind::Error(msg) => write!(f, "ERROR: {}", msg),
            ObjKind::Break => write!(f, "break"),
            ObjKind::Empty => Ok(()),
        }
    }
}

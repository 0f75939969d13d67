use std::fmt;

/// Errors raised while turning an AST into bytecode. Fatal to the current
/// compilation — the compiler does not attempt to recover and keep going
/// the way the parser does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    UndefinedVariable(String),
    UnsupportedFeature(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::UndefinedVariable(name) => write!(f, "undefined variable {}", name),
            CompileError::UnsupportedFeature(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CompileError {}

pub type CompileResult<T> = Result<T, CompileError>;

/// Errors raised by the VM's dispatch loop. These abort the current `run`
/// and are handed back to the caller; the VM does not try to resume.
#[derive(Debug, Clone, PartialEq)]
pub enum VmError {
    UnsupportedBinaryOperation { left: &'static str, right: &'static str },
    UnknownOperator(String),
    NotCallable(&'static str),
    WrongNumberOfArguments { expected: usize, got: usize },
    UnusableHashKey(&'static str),
    IndexNotSupported { left: &'static str, index: &'static str },
    StackOverflow,
    FrameOverflow,
    Runtime(String),
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::UnsupportedBinaryOperation { left, right } =>
                write!(f, "unsupported types for binary operation: {} {}", left, right),
            VmError::UnknownOperator(msg) => write!(f, "unknown operator: {}", msg),
            VmError::NotCallable(t) => write!(f, "cannot call object of type {}", t),
            VmError::WrongNumberOfArguments { expected, got } =>
                write!(f, "wrong number of arguments: expected {}, got {}", expected, got),
            VmError::UnusableHashKey(t) => write!(f, "unusable as hash key: {}", t),
            VmError::IndexNotSupported { left, index } =>
                write!(f, "index operator not supported: {}[{}]", left, index),
            VmError::StackOverflow => write!(f, "stack overflow"),
            VmError::FrameOverflow => write!(f, "frame overflow"),
            VmError::Runtime(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for VmError {}

pub type VmResult<T> = Result<T, VmError>;

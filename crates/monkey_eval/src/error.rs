use std::fmt;

/// Lex/parse failures surfaced by the [`crate::eval`] convenience wrapper
/// before an `Interpreter` ever runs. Once evaluation starts, errors are
/// `Obj::Error` values returned in-band per the language's own error model
/// (see §7 of the language design) — these variants only cover the front
/// end, which has no in-band representation to return errors through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    Lex(String),
    Parse(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Lex(msg) => write!(f, "{}", msg),
            EvalError::Parse(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for EvalError {}

pub type EvalResult<T> = Result<T, EvalError>;

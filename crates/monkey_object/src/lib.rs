pub mod environment;
pub mod hash_key;
pub mod object;
pub mod pool;

pub use environment::Environment;
pub use hash_key::HashKey;
pub use object::{
    Builtin, BuiltinFn, ClosureObj, CompiledFunctionObj, Function, HashPair, ObjKind, Object,
};
pub use pool::{boolean, null, Pool};

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::object::{ObjKind, Object};

thread_local! {
    // `TRUE`/`FALSE`/`NULL` are process-wide singletons (per thread) rather
    // than per-`Pool`, so that a value a builtin hands back (a bare `fn`
    // pointer with no access to whichever `Pool` is running) still compares
    // equal by `Rc::ptr_eq` to the `OpNull`/`OpTrue`/`OpFalse` a VM or
    // evaluator pushes from its own pool.
    static NULL: Object = Rc::new(ObjKind::Null);
    static TRUE: Object = Rc::new(ObjKind::Boolean(true));
    static FALSE: Object = Rc::new(ObjKind::Boolean(false));
}

/// The shared `NULL` singleton.
pub fn null() -> Object {
    NULL.with(Rc::clone)
}

/// The shared `TRUE`/`FALSE` singleton for `b`.
pub fn boolean(b: bool) -> Object {
    if b { TRUE.with(Rc::clone) } else { FALSE.with(Rc::clone) }
}

/// Hands out a single shared `Object` per distinct `Integer` value so a
/// pool owner can use `Rc::ptr_eq` as a cheap identity check, the way the
/// book's object package treats `TRUE`/`FALSE`/`NULL` as singletons. Integer
/// identity is scoped to one `Pool` (unlike `TRUE`/`FALSE`/`NULL`, numeric
/// equality never depends on it — see `HashKey` and the VM's `OpEqual`).
pub struct Pool {
    integers: RefCell<FxHashMap<i64, Object>>,
}

impl Pool {
    pub fn new() -> Self {
        Pool { integers: RefCell::new(FxHashMap::default()) }
    }

    pub fn integer(&self, n: i64) -> Object {
        if let Some(obj) = self.integers.borrow().get(&n) {
            return Rc::clone(obj);
        }
        let obj = Rc::new(ObjKind::Integer(n));
        self.integers.borrow_mut().insert(n, Rc::clone(&obj));
        obj
    }

    pub fn boolean(&self, b: bool) -> Object {
        boolean(b)
    }

    pub fn null(&self) -> Object {
        null()
    }
}

impl Default for Pool {
    fn default() -> Self {
        Pool::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn same_integer_is_same_rc() {
        let pool = Pool::new();
        let a = pool.integer(7);
        let b = pool.integer(7);
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn booleans_are_singletons() {
        let pool = Pool::new();
        assert!(Rc::ptr_eq(&pool.boolean(true), &pool.boolean(true)));
        assert!(!Rc::ptr_eq(&pool.boolean(true), &pool.boolean(false)));
    }

    #[test]
    fn null_is_singleton() {
        let pool = Pool::new();
        assert!(Rc::ptr_eq(&pool.null(), &pool.null()));
    }

    #[test]
    fn singletons_shared_across_pools() {
        let a = Pool::new();
        let b = Pool::new();
        assert!(Rc::ptr_eq(&a.null(), &b.null()));
        assert!(Rc::ptr_eq(&a.boolean(true), &b.boolean(true)));
    }
}

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::object::Object;

/// Lexical scope for the tree-walking evaluator. A function closure captures
/// the `Environment` that was live at its definition site; `outer` is that
/// captured scope, so lookups walk outward until a binding or the globals
/// are found.
#[derive(Debug)]
pub struct Environment {
    store: HashMap<String, Object>,
    outer: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment { store: HashMap::new(), outer: None }))
    }

    pub fn enclosed(outer: Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment { store: HashMap::new(), outer: Some(outer) }))
    }

    pub fn get(&self, name: &str) -> Option<Object> {
        match self.store.get(name) {
            Some(v) => Some(Rc::clone(v)),
            None => self.outer.as_ref().and_then(|o| o.borrow().get(name)),
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: Object) {
        self.store.insert(name.into(), value);
    }

    /// Updates an existing binding, walking outward through enclosing
    /// scopes the way `resolve` does. Returns `false` without creating a
    /// new binding if `name` is bound nowhere in the chain — plain `let`
    /// is the only thing that introduces a name.
    pub fn assign(&mut self, name: &str, value: Object) -> bool {
        if self.store.contains_key(name) {
            self.store.insert(name.to_string(), value);
            return true;
        }
        match &self.outer {
            Some(outer) => outer.borrow_mut().assign(name, value),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjKind;

    #[test]
    fn assign_updates_outer_binding() {
        let outer = Environment::new();
        outer.borrow_mut().set("x", Rc::new(ObjKind::Integer(1)));
        let inner = Environment::enclosed(outer.clone());
        assert!(inner.borrow_mut().assign("x", Rc::new(ObjKind::Integer(2))));
        assert_eq!(outer.borrow().get("x").unwrap(), Rc::new(ObjKind::Integer(2)));
    }

    #[test]
    fn assign_to_undefined_fails() {
        let env = Environment::new();
        assert!(!env.borrow_mut().assign("x", Rc::new(ObjKind::Integer(1))));
    }

    #[test]
    fn inner_let_shadows_rather_than_mutates() {
        let outer = Environment::new();
        outer.borrow_mut().set("x", Rc::new(ObjKind::Integer(1)));
        let inner = Environment::enclosed(outer.clone());
        inner.borrow_mut().set("x", Rc::new(ObjKind::Integer(99)));
        assert_eq!(inner.borrow().get("x").unwrap(), Rc::new(ObjKind::Integer(99)));
        assert_eq!(outer.borrow().get("x").unwrap(), Rc::new(ObjKind::Integer(1)));
    }
}

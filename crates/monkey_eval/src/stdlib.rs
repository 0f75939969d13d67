use std::rc::Rc;

use monkey_object::{Builtin, ObjKind, Object};

/// Same six built-ins and contracts as the bytecode engine's table
/// (`monkey_vm::stdlib`) — duplicated rather than shared, since each
/// engine resolves identifiers to builtins through its own lookup path
/// (`OpGetBuiltin` index vs. a name miss in `Environment::get`).
pub const BUILTINS: &[Builtin] = &[
    Builtin { name: "len", func: len },
    Builtin { name: "puts", func: puts },
    Builtin { name: "first", func: first },
    Builtin { name: "last", func: last },
    Builtin { name: "rest", func: rest },
    Builtin { name: "push", func: push },
];

pub fn lookup_by_name(name: &str) -> Option<usize> {
    BUILTINS.iter().position(|b| b.name == name)
}

fn error(msg: String) -> Object {
    Rc::new(ObjKind::Error(msg))
}

fn len(args: &[Object]) -> Object {
    if args.len() != 1 {
        return error("invalid number of arguments for 'len'".to_string());
    }
    match &*args[0] {
        ObjKind::Str(s) => Rc::new(ObjKind::Integer(s.chars().count() as i64)),
        ObjKind::Array(items) => Rc::new(ObjKind::Integer(items.len() as i64)),
        other => error(format!("argument {} to 'len' not supported", other.type_name())),
    }
}

fn puts(args: &[Object]) -> Object {
    for arg in args {
        println!("{}", arg);
    }
    Rc::new(ObjKind::Empty)
}

fn first(args: &[Object]) -> Object {
    if args.len() != 1 {
        return error("invalid number of arguments for 'first'".to_string());
    }
    match &*args[0] {
        ObjKind::Array(items) => items.first().cloned().unwrap_or_else(monkey_object::null),
        other => error(format!("argument {} to 'first' not supported", other.type_name())),
    }
}

fn last(args: &[Object]) -> Object {
    if args.len() != 1 {
        return error("invalid number of arguments for 'last'".to_string());
    }
    match &*args[0] {
        ObjKind::Array(items) => items.last().cloned().unwrap_or_else(monkey_object::null),
        other => error(format!("argument {} to 'last' not supported", other.type_name())),
    }
}

fn rest(args: &[Object]) -> Object {
    if args.len() != 1 {
        return error("invalid number of arguments for 'rest'".to_string());
    }
    match &*args[0] {
        ObjKind::Array(items) if items.is_empty() => monkey_object::null(),
        ObjKind::Array(items) => Rc::new(ObjKind::Array(items[1..].to_vec())),
        other => error(format!("argument {} to 'rest' not supported", other.type_name())),
    }
}

fn push(args: &[Object]) -> Object {
    if args.len() != 2 {
        return error("invalid number of arguments for 'push'".to_string());
    }
    match &*args[0] {
        ObjKind::Array(items) => {
            let mut copy = items.clone();
            copy.push(Rc::clone(&args[1]));
            Rc::new(ObjKind::Array(copy))
        }
        other => error(format!("argument {} to 'push' not supported", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Object]) -> Object {
        let idx = lookup_by_name(name).unwrap();
        (BUILTINS[idx].func)(args)
    }

    #[test]
    fn len_counts_array_elements() {
        let arr = Rc::new(ObjKind::Array(vec![Rc::new(ObjKind::Integer(1)), Rc::new(ObjKind::Integer(2))]));
        assert_eq!(call("len", &[arr]), Rc::new(ObjKind::Integer(2)));
    }

    #[test]
    fn rest_of_empty_array_is_null() {
        assert!(Rc::ptr_eq(&call("rest", &[Rc::new(ObjKind::Array(vec![]))]), &monkey_object::null()));
    }

    #[test]
    fn push_rejects_wrong_arity() {
        assert!(matches!(&*call("push", &[Rc::new(ObjKind::Array(vec![]))]), ObjKind::Error(_)));
    }
}

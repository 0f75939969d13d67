use std::rc::Rc;

use monkey_object::{Builtin, ObjKind, Object};

/// Fixed builtin table, in `OpGetBuiltin` index order — `len=0, puts=1,
/// first=2, last=3, rest=4, push=5`. Order matters: a compiled program's
/// `OpGetBuiltin` operand is an index into this slice, so it must stay
/// stable across compiles for a given binary.
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

    fn int(n: i64) -> Object {
        Rc::new(ObjKind::Integer(n))
    }

    #[test]
    fn len_counts_string_chars() {
        let s = Rc::new(ObjKind::Str("hello".to_string()));
        assert_eq!(call("len", &[s]), int(5));
    }

    #[test]
    fn len_rejects_wrong_arity() {
        assert!(matches!(&*call("len", &[]), ObjKind::Error(_)));
        assert!(matches!(&*call("len", &[int(1), int(2)]), ObjKind::Error(_)));
    }

    #[test]
    fn len_rejects_unsupported_type() {
        match &*call("len", &[int(1)]) {
            ObjKind::Error(msg) => assert_eq!(msg, "argument INTEGER to 'len' not supported"),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn first_and_last_of_empty_array_are_null() {
        let arr = Rc::new(ObjKind::Array(vec![]));
        assert!(Rc::ptr_eq(&call("first", &[Rc::clone(&arr)]), &monkey_object::null()));
        assert!(Rc::ptr_eq(&call("last", &[arr]), &monkey_object::null()));
    }

    #[test]
    fn rest_drops_the_head() {
        let arr = Rc::new(ObjKind::Array(vec![int(1), int(2), int(3)]));
        match &*call("rest", &[arr]) {
            ObjKind::Array(items) => assert_eq!(items, &[int(2), int(3)]),
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn push_does_not_mutate_the_original() {
        let original = vec![int(1)];
        let arr = Rc::new(ObjKind::Array(original.clone()));
        let pushed = call("push", &[Rc::clone(&arr), int(2)]);
        match (&*arr, &*pushed) {
            (ObjKind::Array(before), ObjKind::Array(after)) => {
                assert_eq!(before, &original);
                assert_eq!(after, &[int(1), int(2)]);
            }
            _ => panic!("expected arrays"),
        }
    }
}

use crate::value::Value;

/// Fixed-order builtin registry. Order matters: `OpGetBuiltin`'s operand is
/// an index into this slice, so the compiler and the VM must agree on it
/// without either depending on the other — both just depend on this table.
pub fn builtins() -> Vec<(&'static str, Value)> {
    vec![
        ("len", Value::Builtin("len", builtin_len)),
        ("first", Value::Builtin("first", builtin_first)),
        ("last", Value::Builtin("last", builtin_last)),
        ("rest", Value::Builtin("rest", builtin_rest)),
        ("push", Value::Builtin("push", builtin_push)),
        ("puts", Value::Builtin("puts", builtin_puts)),
        ("sprintf", Value::Builtin("sprintf", builtin_sprintf)),
    ]
}

pub fn lookup_by_name(name: &str) -> Option<usize> {
    builtins().iter().position(|(n, _)| *n == name)
}

fn wrong_arity(name: &str, want: usize, got: usize) -> Value {
    Value::Error(format!(
        "wrong number of arguments to `{name}`. got = {got}, want = {want}"
    ))
}

fn builtin_len(args: &[Value]) -> Value {
    if args.len() != 1 {
        return wrong_arity("len", 1, args.len());
    }
    match &args[0] {
        Value::String(s) => Value::Integer(s.len() as i64),
        Value::Array(arr) => Value::Integer(arr.borrow().len() as i64),
        other => Value::Error(format!(
            "argument to `len` not supported, got {}",
            other.type_name()
        )),
    }
}

fn builtin_first(args: &[Value]) -> Value {
    if args.len() != 1 {
        return wrong_arity("first", 1, args.len());
    }
    match &args[0] {
        Value::Array(arr) => arr.borrow().first().cloned().unwrap_or(Value::Null),
        other => Value::Error(format!(
            "argument to `first` must be ARRAY, got {}",
            other.type_name()
        )),
    }
}

fn builtin_last(args: &[Value]) -> Value {
    if args.len() != 1 {
        return wrong_arity("last", 1, args.len());
    }
    match &args[0] {
        Value::Array(arr) => arr.borrow().last().cloned().unwrap_or(Value::Null),
        other => Value::Error(format!(
            "argument to `last` must be ARRAY, got {}",
            other.type_name()
        )),
    }
}

fn builtin_rest(args: &[Value]) -> Value {
    if args.len() != 1 {
        return wrong_arity("rest", 1, args.len());
    }
    match &args[0] {
        Value::Array(arr) => {
            let borrowed = arr.borrow();
            if borrowed.is_empty() {
                Value::Null
            } else {
                Value::array(borrowed[1..].to_vec())
            }
        }
        other => Value::Error(format!(
            "argument to `rest` must be ARRAY, got {}",
            other.type_name()
        )),
    }
}

fn builtin_push(args: &[Value]) -> Value {
    if args.len() != 2 {
        return wrong_arity("push", 2, args.len());
    }
    match &args[0] {
        Value::Array(arr) => {
            let mut elements = arr.borrow().clone();
            elements.push(args[1].clone());
            Value::array(elements)
        }
        other => Value::Error(format!(
            "argument to `push` must be ARRAY, got {}",
            other.type_name()
        )),
    }
}

fn builtin_puts(args: &[Value]) -> Value {
    for arg in args {
        println!("{arg}");
    }
    Value::Null
}

/// `sprintf(fmt, ...args)`: a minimal positional `%s`/`%d` formatter, the
/// one builtin without an equivalent in the original interpreter's table.
fn builtin_sprintf(args: &[Value]) -> Value {
    if args.is_empty() {
        return wrong_arity("sprintf", 1, args.len());
    }
    let fmt = match &args[0] {
        Value::String(s) => s.as_str(),
        other => {
            return Value::Error(format!(
                "argument to `sprintf` must be STRING, got {}",
                other.type_name()
            ))
        }
    };

    let mut out = String::with_capacity(fmt.len());
    let mut rest = args[1..].iter();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('s') | Some('d') => match rest.next() {
                Some(value) => out.push_str(&value.to_string()),
                None => return Value::Error("sprintf: not enough arguments".to_string()),
            },
            Some(other) => return Value::Error(format!("sprintf: unknown verb %{other}")),
            None => return Value::Error("sprintf: dangling %".to_string()),
        }
    }
    Value::string(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_of_string() {
        assert!(matches!(builtin_len(&[Value::string("four")]), Value::Integer(4)));
    }

    #[test]
    fn len_wrong_arity() {
        assert!(matches!(builtin_len(&[]), Value::Error(_)));
    }

    #[test]
    fn first_and_last_on_empty_array_are_null() {
        assert!(matches!(builtin_first(&[Value::array(vec![])]), Value::Null));
        assert!(matches!(builtin_last(&[Value::array(vec![])]), Value::Null));
    }

    #[test]
    fn push_creates_new_array() {
        let original = Value::array(vec![Value::Integer(1)]);
        let pushed = builtin_push(&[original.clone(), Value::Integer(2)]);
        if let Value::Array(arr) = &original {
            assert_eq!(arr.borrow().len(), 1);
        }
        if let Value::Array(arr) = pushed {
            assert_eq!(arr.borrow().len(), 2);
        } else {
            panic!("expected array");
        }
    }

    #[test]
    fn sprintf_substitutes_positional_args() {
        let result = builtin_sprintf(&[Value::string("%s is %d"), Value::string("x"), Value::Integer(5)]);
        assert!(matches!(result, Value::String(ref s) if s.as_str() == "x is 5"));
    }

    #[test]
    fn lookup_by_name_matches_table_order() {
        assert_eq!(lookup_by_name("len"), Some(0));
        assert_eq!(lookup_by_name("sprintf"), Some(6));
        assert_eq!(lookup_by_name("nope"), None);
    }
}

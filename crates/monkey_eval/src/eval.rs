use std::rc::Rc;

use monkey_object::builtins::{builtins, lookup_by_name};
use monkey_object::{Environment, FunctionObject, Value};
use monkey_parser::{Expr, Program, Stmt};
use tracing::trace;

/// Walks the AST directly, evaluating each node against an [`Environment`].
/// Control flow that needs to unwind past nested blocks (`return`, runtime
/// errors) is represented as ordinary `Value` variants (`ReturnValue`,
/// `Error`) rather than a native exception — callers check for them after
/// every sub-evaluation and propagate immediately. Macro/quote-unquote
/// expansion is intentionally not implemented here.
pub fn eval_program(program: &Program, env: &Environment) -> Value {
    let mut result = Value::Null;
    for stmt in &program.statements {
        result = eval_statement(stmt, env);
        match result {
            Value::ReturnValue(value) => return *value,
            Value::Error(_) => return result,
            _ => {}
        }
    }
    result
}

fn eval_block(stmts: &[Stmt], env: &Environment) -> Value {
    let mut result = Value::Null;
    for stmt in stmts {
        result = eval_statement(stmt, env);
        if matches!(result, Value::ReturnValue(_) | Value::Error(_)) {
            return result;
        }
    }
    result
}

fn eval_statement(stmt: &Stmt, env: &Environment) -> Value {
    match stmt {
        Stmt::Let { name, value } => {
            let evaluated = eval_expression(value, env);
            if is_error(&evaluated) {
                return evaluated;
            }
            env.set(name, evaluated);
            Value::Null
        }
        Stmt::Return { value } => {
            let evaluated = eval_expression(value, env);
            if is_error(&evaluated) {
                return evaluated;
            }
            Value::ReturnValue(Box::new(evaluated))
        }
        Stmt::Expression(expr) => eval_expression(expr, env),
        Stmt::Block(stmts) => eval_block(stmts, env),
    }
}

fn eval_expression(expr: &Expr, env: &Environment) -> Value {
    match expr {
        Expr::IntegerLiteral(value) => Value::Integer(*value),
        Expr::StringLiteral(value) => Value::string(value.clone()),
        Expr::Boolean(value) => Value::Boolean(*value),
        Expr::Identifier(name) => eval_identifier(name, env),
        Expr::Prefix { operator, right } => {
            let right = eval_expression(right, env);
            if is_error(&right) {
                return right;
            }
            eval_prefix_expression(operator, right)
        }
        Expr::Infix {
            left,
            operator,
            right,
        } => {
            let left = eval_expression(left, env);
            if is_error(&left) {
                return left;
            }
            let right = eval_expression(right, env);
            if is_error(&right) {
                return right;
            }
            eval_infix_expression(operator, left, right)
        }
        Expr::If {
            condition,
            consequence,
            alternative,
        } => eval_if_expression(condition, consequence, alternative.as_deref(), env),
        Expr::ArrayLiteral(elements) => match eval_expressions(elements, env) {
            Ok(values) => Value::array(values),
            Err(err) => err,
        },
        Expr::HashLiteral(pairs) => eval_hash_literal(pairs, env),
        Expr::Index { left, index } => {
            let left = eval_expression(left, env);
            if is_error(&left) {
                return left;
            }
            let index = eval_expression(index, env);
            if is_error(&index) {
                return index;
            }
            eval_index_expression(left, index)
        }
        Expr::FunctionLiteral {
            parameters, body, ..
        } => Value::Function(Rc::new(FunctionObject {
            parameters: parameters.clone(),
            body: body.clone(),
            env: env.clone(),
        })),
        Expr::Call {
            function,
            arguments,
        } => eval_call_expression(function, arguments, env),
    }
}

fn eval_identifier(name: &str, env: &Environment) -> Value {
    if name == "null" {
        return Value::Null;
    }
    if let Some(value) = env.get(name) {
        return value;
    }
    if let Some(index) = lookup_by_name(name) {
        return builtins()[index].1.clone();
    }
    Value::Error(format!("identifier not found: {name}"))
}

fn eval_prefix_expression(operator: &str, right: Value) -> Value {
    match operator {
        "!" => Value::Boolean(!right.is_truthy()),
        "-" => match right {
            Value::Integer(i) => Value::Integer(-i),
            other => Value::Error(format!("unknown operator: -{}", other.type_name())),
        },
        other => Value::Error(format!("unknown operator: {other}")),
    }
}

fn eval_infix_expression(operator: &str, left: Value, right: Value) -> Value {
    match (&left, &right) {
        (Value::Integer(l), Value::Integer(r)) => eval_integer_infix(operator, *l, *r),
        (Value::String(l), Value::String(r)) if operator == "+" => {
            Value::string(format!("{l}{r}"))
        }
        _ if operator == "==" => Value::Boolean(left.identical(&right)),
        _ if operator == "!=" => Value::Boolean(!left.identical(&right)),
        (l, r) if l.type_name() != r.type_name() => Value::Error(format!(
            "type mismatch: {} {} {}",
            l.type_name(),
            operator,
            r.type_name()
        )),
        (l, r) => Value::Error(format!(
            "unknown operator: {} {} {}",
            l.type_name(),
            operator,
            r.type_name()
        )),
    }
}

fn eval_integer_infix(operator: &str, left: i64, right: i64) -> Value {
    match operator {
        "+" => Value::Integer(left + right),
        "-" => Value::Integer(left - right),
        "*" => Value::Integer(left * right),
        "/" => {
            if right == 0 {
                Value::Error("division by zero".to_string())
            } else {
                Value::Integer(left / right)
            }
        }
        "<" => Value::Boolean(left < right),
        ">" => Value::Boolean(left > right),
        "==" => Value::Boolean(left == right),
        "!=" => Value::Boolean(left != right),
        other => Value::Error(format!("unknown operator: INTEGER {other} INTEGER")),
    }
}

fn eval_if_expression(
    condition: &Expr,
    consequence: &[Stmt],
    alternative: Option<&[Stmt]>,
    env: &Environment,
) -> Value {
    let condition = eval_expression(condition, env);
    if is_error(&condition) {
        return condition;
    }
    if condition.is_truthy() {
        eval_block(consequence, env)
    } else if let Some(alt) = alternative {
        eval_block(alt, env)
    } else {
        Value::Null
    }
}

fn eval_expressions(exprs: &[Expr], env: &Environment) -> Result<Vec<Value>, Value> {
    let mut values = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let value = eval_expression(expr, env);
        if is_error(&value) {
            return Err(value);
        }
        values.push(value);
    }
    Ok(values)
}

fn eval_hash_literal(pairs: &[(Expr, Expr)], env: &Environment) -> Value {
    use monkey_object::value::HashPairs;
    use monkey_object::HashPair;
    use std::cell::RefCell;

    let mut hash_pairs = HashPairs::default();
    for (key_expr, value_expr) in pairs {
        let key = eval_expression(key_expr, env);
        if is_error(&key) {
            return key;
        }
        let value = eval_expression(value_expr, env);
        if is_error(&value) {
            return value;
        }
        let hash_key = match key.hash_key() {
            Ok(k) => k,
            Err(msg) => return Value::Error(msg),
        };
        hash_pairs.insert(hash_key, HashPair { key, value });
    }
    Value::Hash(Rc::new(RefCell::new(hash_pairs)))
}

fn eval_index_expression(left: Value, index: Value) -> Value {
    match (&left, &index) {
        (Value::Array(arr), Value::Integer(i)) => {
            let len = arr.borrow().len() as i64;
            if *i < 0 || *i >= len {
                Value::Null
            } else {
                arr.borrow()[*i as usize].clone()
            }
        }
        (Value::Hash(hash), _) => {
            let hash_key = match index.hash_key() {
                Ok(k) => k,
                Err(msg) => return Value::Error(msg),
            };
            match hash.borrow().get(&hash_key) {
                Some(pair) => pair.value.clone(),
                None => Value::Null,
            }
        }
        (l, _) => Value::Error(format!("index operator not supported: {}", l.type_name())),
    }
}

fn eval_call_expression(function: &Expr, arguments: &[Expr], env: &Environment) -> Value {
    let func = eval_expression(function, env);
    if is_error(&func) {
        return func;
    }
    let args = match eval_expressions(arguments, env) {
        Ok(args) => args,
        Err(err) => return err,
    };
    apply_function(func, args)
}

fn apply_function(func: Value, args: Vec<Value>) -> Value {
    match func {
        Value::Function(func) => {
            if args.len() != func.parameters.len() {
                return Value::Error(format!(
                    "wrong number of arguments. got = {}, want = {}",
                    args.len(),
                    func.parameters.len()
                ));
            }
            trace!(params = func.parameters.len(), "calling function");
            let call_env = Environment::enclosed(&func.env);
            for (param, arg) in func.parameters.iter().zip(args) {
                call_env.set(param, arg);
            }
            let result = eval_block(&func.body, &call_env);
            match result {
                Value::ReturnValue(value) => *value,
                other => other,
            }
        }
        Value::Builtin(_, f) => f(&args),
        other => Value::Error(format!("not a function: {}", other.type_name())),
    }
}

fn is_error(value: &Value) -> bool {
    matches!(value, Value::Error(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(input: &str) -> Value {
        let mut parser = monkey_parser::Parser::from_source(input);
        let program = parser.parse_program().expect("parse errors");
        let env = Environment::new();
        eval_program(&program, &env)
    }

    #[test]
    fn integer_expressions() {
        assert_eq!(eval("5 + 5 + 5 + 5 - 10"), Value::Integer(10));
        assert_eq!(eval("2 * (5 + 10)"), Value::Integer(30));
    }

    #[test]
    fn boolean_expressions() {
        assert_eq!(eval("1 < 2"), Value::Boolean(true));
        assert_eq!(eval("1 == 1"), Value::Boolean(true));
        assert_eq!(eval("(1 < 2) == true"), Value::Boolean(true));
    }

    #[test]
    fn bang_operator() {
        assert_eq!(eval("!true"), Value::Boolean(false));
        assert_eq!(eval("!!true"), Value::Boolean(true));
        assert_eq!(eval("!5"), Value::Boolean(false));
    }

    #[test]
    fn if_else_expressions() {
        assert_eq!(eval("if (true) { 10 }"), Value::Integer(10));
        assert_eq!(eval("if (false) { 10 }"), Value::Null);
        assert_eq!(eval("if (1 > 2) { 10 } else { 20 }"), Value::Integer(20));
    }

    #[test]
    fn return_statements_short_circuit_blocks() {
        let input = r#"
            if (10 > 1) {
                if (10 > 1) {
                    return 10;
                }
                return 1;
            }
        "#;
        assert_eq!(eval(input), Value::Integer(10));
    }

    #[test]
    fn error_handling() {
        assert_eq!(
            eval("5 + true;"),
            Value::Error("type mismatch: INTEGER + BOOLEAN".to_string())
        );
        assert_eq!(
            eval("foobar;"),
            Value::Error("identifier not found: foobar".to_string())
        );
    }

    #[test]
    fn let_statements() {
        assert_eq!(eval("let a = 5; a;"), Value::Integer(5));
        assert_eq!(eval("let a = 5 * 5; a;"), Value::Integer(25));
    }

    #[test]
    fn function_application() {
        assert_eq!(eval("let identity = fn(x) { x; }; identity(5);"), Value::Integer(5));
        assert_eq!(
            eval("let add = fn(x, y) { x + y; }; add(5, add(5, 5));"),
            Value::Integer(15)
        );
    }

    #[test]
    fn closures_capture_enclosing_environment() {
        let input = r#"
            let newAdder = fn(x) {
                fn(y) { x + y };
            };
            let addTwo = newAdder(2);
            addTwo(3);
        "#;
        assert_eq!(eval(input), Value::Integer(5));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            eval(r#"let greeting = fn(name) { "Hello, " + name }; greeting("world");"#),
            Value::string("Hello, world")
        );
    }

    #[test]
    fn builtin_len_and_array_index() {
        assert_eq!(eval(r#"len([1, 2, 3])"#), Value::Integer(3));
        assert_eq!(eval("[1, 2, 3][1]"), Value::Integer(2));
        assert_eq!(eval("[1, 2, 3][100]"), Value::Null);
    }

    #[test]
    fn hash_literal_and_index() {
        let input = r#"
            let two = "two";
            {
                "one": 10 - 9,
                two: 1 + 1,
                "thr" + "ee": 6 / 2,
                4: 4,
                true: 5,
                false: 6
            }["two"]
        "#;
        assert_eq!(eval(input), Value::Integer(2));
    }
}

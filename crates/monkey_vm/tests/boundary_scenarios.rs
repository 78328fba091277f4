use monkey_compiler::Compiler;
use monkey_object::Value;
use monkey_vm::{Vm, VmConfig};

fn run(input: &str) -> Value {
    let mut parser = monkey_parser::Parser::from_source(input);
    let program = parser.parse_program().expect("parse errors");
    let mut compiler = Compiler::new();
    compiler.compile(&program).expect("compile error");
    let mut vm = Vm::new(compiler.bytecode(), VmConfig::default());
    vm.run().expect("vm error");
    vm.last_popped_stack_element().clone()
}

#[test]
fn end_to_end_integer_and_boolean_pipeline() {
    assert_eq!(run("(5 + 5 * 2 - 10 / 2) * 2 + 1"), Value::Integer(21));
    assert_eq!(run("(1 > 2) == false"), Value::Boolean(true));
}

#[test]
fn end_to_end_string_array_hash_pipeline() {
    assert_eq!(run(r#"len("hello" + " " + "world")"#), Value::Integer(11));
    match run(r#"{"a": 1, "b": 2}["a"]"#) {
        Value::Integer(1) => {}
        other => panic!("expected 1, got {other:?}"),
    }
}

#[test]
fn end_to_end_closures_over_two_compilation_units() {
    let input = r#"
        let makeCounter = fn() {
            let count = 0;
            fn() {
                let count = count + 1;
                count;
            };
        };
        let counter = makeCounter();
        counter();
    "#;
    assert_eq!(run(input), Value::Integer(1));
}

use monkey_compiler::Compiler;
use monkey_object::code::{self, Op};
use monkey_object::Value;
use monkey_parser::Parser;
use pretty_assertions::assert_eq;

fn compile(input: &str) -> monkey_compiler::Bytecode {
    let mut parser = Parser::from_source(input);
    let program = parser.parse_program().expect("parse errors");
    let mut compiler = Compiler::new();
    compiler.compile(&program).expect("compile error");
    compiler.bytecode()
}

#[test]
fn builtin_call_resolves_through_get_builtin() {
    let bytecode = compile("len([1, 2, 3])");
    let expected = vec![
        code::make(Op::GetBuiltin, &[0]),
        code::make(Op::Constant, &[0]),
        code::make(Op::Constant, &[1]),
        code::make(Op::Constant, &[2]),
        code::make(Op::Array, &[3]),
        code::make(Op::Call, &[1]),
        code::make(Op::Pop, &[]),
    ]
    .concat();
    assert_eq!(bytecode.instructions, expected);
}

#[test]
fn nested_closures_capture_in_first_reference_order() {
    let bytecode = compile(
        r#"
        let global = 55;
        fn() {
            let a = 66;
            fn() {
                let b = 77;
                fn() {
                    let c = 88;
                    global + a + b + c;
                };
            };
        };
        "#,
    );
    // The outermost compiled function is the last constant produced.
    match bytecode.constants.last() {
        Some(Value::CompiledFunction(_)) => {}
        other => panic!("expected a compiled function constant, got {other:?}"),
    }
}

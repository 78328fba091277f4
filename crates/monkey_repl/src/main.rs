use std::env;
use std::process::ExitCode;

use monkey_compiler::Compiler;
use monkey_object::{Environment, Value};
use monkey_parser::Parser;
use monkey_vm::{Vm, VmConfig};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

const BANNER: &str = r#"
  Monkey REPL — type an expression, Ctrl-D to exit
"#;

#[derive(Clone, Copy, PartialEq)]
enum Engine {
    Vm,
    Tree,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let engine = match parse_engine_flag() {
        Ok(engine) => engine,
        Err(msg) => {
            eprintln!("monkey_repl: {msg}");
            return ExitCode::FAILURE;
        }
    };

    match engine {
        Engine::Vm => run_vm_repl(),
        Engine::Tree => run_tree_repl(),
    }
    ExitCode::SUCCESS
}

fn parse_engine_flag() -> Result<Engine, String> {
    let args: Vec<String> = env::args().collect();
    let mut engine = Engine::Vm;
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-engine" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| "-engine requires a value".to_string())?;
                engine = match value.as_str() {
                    "vm" => Engine::Vm,
                    "tree" => Engine::Tree,
                    other => return Err(format!("unknown engine '{other}', want vm or tree")),
                };
                i += 2;
            }
            other => return Err(format!("unrecognized argument '{other}'")),
        }
    }
    Ok(engine)
}

fn run_vm_repl() {
    println!("{BANNER}  engine: vm\n");
    let mut editor = DefaultEditor::new().expect("failed to start line editor");

    let config = VmConfig::from_env();
    let mut symbol_table = Compiler::new().into_symbol_table();
    let mut constants = Vec::new();
    let mut globals = vec![Value::Null; config.globals_size];

    loop {
        match editor.readline(">> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                let mut parser = Parser::from_source(&line);
                let program = match parser.parse_program() {
                    Ok(program) => program,
                    Err(errors) => {
                        print_parse_errors(&errors);
                        continue;
                    }
                };

                let mut compiler = Compiler::new_with_state(symbol_table.clone(), constants.clone());
                if let Err(err) = compiler.compile(&program) {
                    eprintln!("compile error: {err}");
                    continue;
                }
                symbol_table = compiler.symbol_table().clone();
                let bytecode = compiler.bytecode();
                constants = bytecode.constants.clone();

                let mut vm = Vm::with_globals(bytecode, globals, config);
                match vm.run() {
                    Ok(()) => println!("{}", vm.last_popped_stack_element()),
                    Err(err) => eprintln!("runtime error: {err}"),
                }
                globals = vm.globals;
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("readline error: {err}");
                break;
            }
        }
    }
}

fn run_tree_repl() {
    println!("{BANNER}  engine: tree\n");
    let mut editor = DefaultEditor::new().expect("failed to start line editor");
    let env = Environment::new();

    loop {
        match editor.readline(">> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                let mut parser = Parser::from_source(&line);
                match parser.parse_program() {
                    Ok(program) => {
                        let result = monkey_eval::eval_program(&program, &env);
                        if result != Value::Null {
                            println!("{result}");
                        }
                    }
                    Err(errors) => print_parse_errors(&errors),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("readline error: {err}");
                break;
            }
        }
    }
}

fn print_parse_errors(errors: &[monkey_parser::ParseError]) {
    eprintln!("  parser errors:");
    for err in errors {
        eprintln!("    {err}");
    }
}

use std::fs;
use std::process::ExitCode;

use monkey_compiler::Compiler;
use monkey_object::{Environment, Value};
use monkey_parser::Parser;
use monkey_vm::{Vm, VmConfig};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, PartialEq)]
enum Engine {
    Vm,
    Tree,
}

struct Args {
    file: Option<String>,
    engine: Engine,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("monkey: {msg}");
            return ExitCode::FAILURE;
        }
    };

    match &args.file {
        Some(path) => exec_file(path, args.engine),
        None => {
            println!("This is the Monkey programming language!");
            println!("Type in commands.");
            run_repl(args.engine);
            ExitCode::SUCCESS
        }
    }
}

fn parse_args() -> Result<Args, String> {
    let raw: Vec<String> = std::env::args().collect();
    let mut file = None;
    let mut engine = Engine::Vm;
    let mut i = 1;
    while i < raw.len() {
        match raw[i].as_str() {
            "-file" => {
                let value = raw.get(i + 1).ok_or_else(|| "-file requires a path".to_string())?;
                file = Some(value.clone());
                i += 2;
            }
            "-engine" => {
                let value = raw
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
    Ok(Args { file, engine })
}

fn exec_file(path: &str, engine: Engine) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("failed reading file at '{path}': {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut parser = Parser::from_source(&source);
    let program = match parser.parse_program() {
        Ok(program) => program,
        Err(errors) => {
            eprintln!("parser errors:");
            for err in &errors {
                eprintln!("\t{err}");
            }
            return ExitCode::FAILURE;
        }
    };

    match engine {
        Engine::Vm => {
            let mut compiler = Compiler::new();
            if let Err(err) = compiler.compile(&program) {
                eprintln!("failed compiling program: {err}");
                return ExitCode::FAILURE;
            }
            let mut vm = Vm::new(compiler.bytecode(), VmConfig::from_env());
            if let Err(err) = vm.run() {
                eprintln!("failed execution with an error: {err}");
                return ExitCode::FAILURE;
            }
        }
        Engine::Tree => {
            let env = Environment::new();
            let result = monkey_eval::eval_program(&program, &env);
            if let Value::Error(msg) = result {
                eprintln!("encountered a runtime error: {msg}");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn run_repl(engine: Engine) {
    let mut editor = DefaultEditor::new().expect("failed to start line editor");

    let config = VmConfig::from_env();
    let mut symbol_table = Compiler::new().into_symbol_table();
    let mut constants = Vec::new();
    let mut globals = vec![Value::Null; config.globals_size];
    let tree_env = Environment::new();

    loop {
        match editor.readline(">> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                let mut parser = Parser::from_source(&line);
                let program = match parser.parse_program() {
                    Ok(program) => program,
                    Err(errors) => {
                        eprintln!("parser errors:");
                        for err in &errors {
                            eprintln!("\t{err}");
                        }
                        continue;
                    }
                };

                match engine {
                    Engine::Vm => {
                        let mut compiler =
                            Compiler::new_with_state(symbol_table.clone(), constants.clone());
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
                    Engine::Tree => {
                        let result = monkey_eval::eval_program(&program, &tree_env);
                        if result != Value::Null {
                            println!("{result}");
                        }
                    }
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

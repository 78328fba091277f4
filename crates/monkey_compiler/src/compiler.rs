use std::rc::Rc;

use monkey_object::builtins::builtins;
use monkey_object::code::{self, Op};
use monkey_object::value::{CompiledFunction, Instructions as ObjInstructions};
use monkey_object::Value;
use monkey_parser::{Expr, Program, Stmt};
use tracing::trace;

use crate::error::CompileError;
use crate::symbol_table::{Symbol, SymbolScope, SymbolTable};

pub type Instructions = ObjInstructions;

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    op: Op,
    position: usize,
}

struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

impl CompilationScope {
    fn new() -> Self {
        CompilationScope {
            instructions: Vec::new(),
            last_instruction: None,
            previous_instruction: None,
        }
    }
}

/// The finished product of a compilation: a flat instruction stream and the
/// constant pool it indexes into. What the VM actually runs.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}

/// Single-pass AST-to-bytecode lowering. Owns the constant pool and the
/// symbol table; tracks a stack of [`CompilationScope`]s so that entering a
/// function literal gets its own instruction buffer without disturbing the
/// enclosing one.
pub struct Compiler {
    constants: Vec<Value>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (i, (name, _)) in builtins().iter().enumerate() {
            symbol_table.define_builtin(i, name);
        }
        Compiler {
            constants: Vec::new(),
            symbol_table,
            scopes: vec![CompilationScope::new()],
        }
    }

    /// Resumes compilation with a symbol table and constant pool carried
    /// over from a previous REPL iteration, per the incremental-compilation
    /// contract described for the REPL.
    pub fn new_with_state(symbol_table: SymbolTable, constants: Vec<Value>) -> Self {
        Compiler {
            constants,
            symbol_table,
            scopes: vec![CompilationScope::new()],
        }
    }

    pub fn into_symbol_table(self) -> SymbolTable {
        self.symbol_table
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        for stmt in &program.statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    pub fn bytecode(mut self) -> Bytecode {
        let instructions = std::mem::take(&mut self.current_scope_mut().instructions);
        Bytecode {
            instructions,
            constants: self.constants,
        }
    }

    fn current_scope(&self) -> &CompilationScope {
        self.scopes.last().expect("scope stack is never empty")
    }

    fn current_scope_mut(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    fn compile_statement(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Let { name, value } => {
                let symbol = self.symbol_table.define(name);
                self.compile_expression(value)?;
                match symbol.scope {
                    SymbolScope::Global => self.emit(Op::SetGlobal, &[symbol.index]),
                    SymbolScope::Local => self.emit(Op::SetLocal, &[symbol.index]),
                    other => unreachable!("let-bound symbol cannot resolve to {other:?}"),
                };
                Ok(())
            }
            Stmt::Return { value } => {
                self.compile_expression(value)?;
                self.emit(Op::ReturnValue, &[]);
                Ok(())
            }
            Stmt::Expression(expr) => {
                self.compile_expression(expr)?;
                self.emit(Op::Pop, &[]);
                Ok(())
            }
            Stmt::Block(stmts) => {
                for s in stmts {
                    self.compile_statement(s)?;
                }
                Ok(())
            }
        }
    }

    fn compile_expression(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::IntegerLiteral(value) => {
                let index = self.add_constant(Value::Integer(*value));
                self.emit(Op::Constant, &[index]);
            }
            Expr::StringLiteral(value) => {
                let index = self.add_constant(Value::string(value.clone()));
                self.emit(Op::Constant, &[index]);
            }
            Expr::Boolean(true) => {
                self.emit(Op::True, &[]);
            }
            Expr::Boolean(false) => {
                self.emit(Op::False, &[]);
            }
            Expr::Identifier(name) => {
                if name == "null" {
                    self.emit(Op::Null, &[]);
                    return Ok(());
                }
                let symbol = self
                    .symbol_table
                    .resolve(name)
                    .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
                self.load_symbol(symbol);
            }
            Expr::Prefix { operator, right } => {
                self.compile_expression(right)?;
                match operator.as_str() {
                    "!" => self.emit(Op::Bang, &[]),
                    "-" => self.emit(Op::Minus, &[]),
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
            }
            Expr::Infix {
                left,
                operator,
                right,
            } => {
                // `a < b` has no dedicated opcode: compile the operands in
                // reverse order and reuse GreaterThan, per the observation
                // that `a < b` == `b > a`.
                if operator == "<" {
                    self.compile_expression(right)?;
                    self.compile_expression(left)?;
                    self.emit(Op::GreaterThan, &[]);
                    return Ok(());
                }
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                match operator.as_str() {
                    "+" => self.emit(Op::Add, &[]),
                    "-" => self.emit(Op::Sub, &[]),
                    "*" => self.emit(Op::Mul, &[]),
                    "/" => self.emit(Op::Div, &[]),
                    ">" => self.emit(Op::GreaterThan, &[]),
                    "==" => self.emit(Op::Equal, &[]),
                    "!=" => self.emit(Op::NotEqual, &[]),
                    other => return Err(CompileError::UnknownOperator(other.to_string())),
                };
            }
            Expr::If {
                condition,
                consequence,
                alternative,
            } => self.compile_if_expression(condition, consequence, alternative.as_deref())?,
            Expr::ArrayLiteral(elements) => {
                for el in elements {
                    self.compile_expression(el)?;
                }
                self.emit(Op::Array, &[elements.len()]);
            }
            Expr::HashLiteral(pairs) => {
                let mut sorted: Vec<&(Expr, Expr)> = pairs.iter().collect();
                sorted.sort_by_key(|(k, _)| k.to_string());
                for (key, value) in sorted {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Op::Hash, &[pairs.len() * 2]);
            }
            Expr::Index { left, index } => {
                self.compile_expression(left)?;
                self.compile_expression(index)?;
                self.emit(Op::Index, &[]);
            }
            Expr::FunctionLiteral {
                name,
                parameters,
                body,
            } => self.compile_function_literal(name.as_deref(), parameters, body)?,
            Expr::Call {
                function,
                arguments,
            } => {
                self.compile_expression(function)?;
                for arg in arguments {
                    self.compile_expression(arg)?;
                }
                self.emit(Op::Call, &[arguments.len()]);
            }
        }
        Ok(())
    }

    fn compile_if_expression(
        &mut self,
        condition: &Expr,
        consequence: &[Stmt],
        alternative: Option<&[Stmt]>,
    ) -> Result<(), CompileError> {
        self.compile_expression(condition)?;
        let jump_not_truthy_pos = self.emit(Op::JumpNotTruthy, &[9999]);

        for stmt in consequence {
            self.compile_statement(stmt)?;
        }
        if self.last_instruction_is(Op::Pop) {
            self.remove_last_pop();
        }

        let jump_pos = self.emit(Op::Jump, &[9999]);
        let after_consequence_pos = self.current_scope().instructions.len();
        self.change_operand(jump_not_truthy_pos, after_consequence_pos);

        match alternative {
            None => {
                self.emit(Op::Null, &[]);
            }
            Some(alt) => {
                for stmt in alt {
                    self.compile_statement(stmt)?;
                }
                if self.last_instruction_is(Op::Pop) {
                    self.remove_last_pop();
                }
            }
        }

        let after_alternative_pos = self.current_scope().instructions.len();
        self.change_operand(jump_pos, after_alternative_pos);
        Ok(())
    }

    fn compile_function_literal(
        &mut self,
        name: Option<&str>,
        parameters: &[String],
        body: &[Stmt],
    ) -> Result<(), CompileError> {
        self.enter_scope();

        if let Some(name) = name {
            self.symbol_table.define_function_name(name);
        }
        for param in parameters {
            self.symbol_table.define(param);
        }

        for stmt in body {
            self.compile_statement(stmt)?;
        }
        if self.last_instruction_is(Op::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Op::ReturnValue) {
            self.emit(Op::Return, &[]);
        }

        let free_symbols = self.symbol_table.free_symbols.clone();
        let num_locals = self.symbol_table.num_definitions();
        let instructions = self.leave_scope();

        for symbol in &free_symbols {
            self.load_symbol(symbol.clone());
        }

        let compiled_fn = CompiledFunction {
            instructions,
            num_locals,
            num_parameters: parameters.len(),
        };
        let const_index = self.add_constant(Value::CompiledFunction(Rc::new(compiled_fn)));
        self.emit(Op::Closure, &[const_index, free_symbols.len()]);
        Ok(())
    }

    fn load_symbol(&mut self, symbol: Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Op::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Op::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Op::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Op::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(Op::CurrentClosure, &[]),
        };
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::new());
        let table = std::mem::replace(&mut self.symbol_table, SymbolTable::new());
        self.symbol_table = table.enter_scope();
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().expect("leave_scope with no scope to leave");
        let table = std::mem::replace(&mut self.symbol_table, SymbolTable::new());
        self.symbol_table = table.leave_scope();
        scope.instructions
    }

    fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    fn emit(&mut self, op: Op, operands: &[usize]) -> usize {
        let scope = self.current_scope_mut();
        let position = code::emit(&mut scope.instructions, op, operands);
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { op, position });
        trace!(?op, position, "emitted instruction");
        position
    }

    fn last_instruction_is(&self, op: Op) -> bool {
        match self.current_scope().last_instruction {
            Some(instr) => instr.op == op,
            None => false,
        }
    }

    fn remove_last_pop(&mut self) {
        let scope = self.current_scope_mut();
        let last = scope.last_instruction.expect("remove_last_pop with no last instruction");
        scope.instructions.truncate(last.position);
        scope.last_instruction = scope.previous_instruction;
    }

    fn replace_last_pop_with_return(&mut self) {
        let last = self
            .current_scope()
            .last_instruction
            .expect("replace_last_pop_with_return with no last instruction");
        let new_instruction = code::make(Op::ReturnValue, &[]);
        self.replace_instruction(last.position, &new_instruction);
        self.current_scope_mut().last_instruction = Some(EmittedInstruction {
            op: Op::ReturnValue,
            position: last.position,
        });
    }

    fn replace_instruction(&mut self, position: usize, new_instruction: &[u8]) {
        let instructions = &mut self.current_scope_mut().instructions;
        for (offset, byte) in new_instruction.iter().enumerate() {
            instructions[position + offset] = *byte;
        }
    }

    fn change_operand(&mut self, position: usize, operand: usize) {
        let op = Op::from_u8(self.current_scope().instructions[position])
            .expect("change_operand on unknown opcode");
        let new_instruction = code::make(op, &[operand]);
        self.replace_instruction(position, &new_instruction);
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monkey_object::code::disassemble;
    use pretty_assertions::assert_eq;

    fn compile(input: &str) -> Bytecode {
        let mut parser = monkey_parser::Parser::from_source(input);
        let program = parser.parse_program().expect("parse errors");
        let mut compiler = Compiler::new();
        compiler.compile(&program).expect("compile error");
        compiler.bytecode()
    }

    #[test]
    fn integer_arithmetic() {
        let bytecode = compile("1 + 2");
        let expected = vec![
            code::make(Op::Constant, &[0]),
            code::make(Op::Constant, &[1]),
            code::make(Op::Add, &[]),
            code::make(Op::Pop, &[]),
        ]
        .concat();
        assert_eq!(bytecode.instructions, expected);
        assert_eq!(bytecode.constants.len(), 2);
    }

    #[test]
    fn less_than_compiles_as_swapped_greater_than() {
        let bytecode = compile("1 < 2");
        let expected = vec![
            code::make(Op::Constant, &[0]),
            code::make(Op::Constant, &[1]),
            code::make(Op::GreaterThan, &[]),
            code::make(Op::Pop, &[]),
        ]
        .concat();
        assert_eq!(bytecode.instructions, expected);
        if let Value::Integer(first) = bytecode.constants[0] {
            assert_eq!(first, 2);
        } else {
            panic!("expected integer constant");
        }
    }

    #[test]
    fn if_without_else_emits_null_branch() {
        let bytecode = compile("if (true) { 10 }; 3333;");
        let expected = vec![
            code::make(Op::True, &[]),
            code::make(Op::JumpNotTruthy, &[10]),
            code::make(Op::Constant, &[0]),
            code::make(Op::Jump, &[11]),
            code::make(Op::Null, &[]),
            code::make(Op::Pop, &[]),
            code::make(Op::Constant, &[1]),
            code::make(Op::Pop, &[]),
        ]
        .concat();
        assert_eq!(
            disassemble(&bytecode.instructions),
            disassemble(&expected)
        );
    }

    #[test]
    fn global_let_statements() {
        let bytecode = compile("let one = 1; let two = 2;");
        let expected = vec![
            code::make(Op::Constant, &[0]),
            code::make(Op::SetGlobal, &[0]),
            code::make(Op::Constant, &[1]),
            code::make(Op::SetGlobal, &[1]),
        ]
        .concat();
        assert_eq!(bytecode.instructions, expected);
    }

    #[test]
    fn string_constants_are_deduped_by_occurrence_not_value() {
        let bytecode = compile(r#""monkey"; "monkey";"#);
        assert_eq!(bytecode.constants.len(), 2);
    }

    #[test]
    fn hash_literal_keys_compiled_in_sorted_order() {
        let bytecode = compile(r#"{"one": 1, "two": 2, "three": 3}"#);
        let expected = vec![
            code::make(Op::Constant, &[0]), // "one"
            code::make(Op::Constant, &[1]), // 1
            code::make(Op::Constant, &[2]), // "three"
            code::make(Op::Constant, &[3]), // 3
            code::make(Op::Constant, &[4]), // "two"
            code::make(Op::Constant, &[5]), // 2
            code::make(Op::Hash, &[6]),
            code::make(Op::Pop, &[]),
        ]
        .concat();
        assert_eq!(bytecode.instructions, expected);
    }

    #[test]
    fn compiled_function_returns_last_expression() {
        let bytecode = compile("fn() { 5 + 10 }");
        match bytecode.constants.last() {
            Some(Value::CompiledFunction(func)) => {
                let expected = vec![
                    code::make(Op::Constant, &[0]),
                    code::make(Op::Constant, &[1]),
                    code::make(Op::Add, &[]),
                    code::make(Op::ReturnValue, &[]),
                ]
                .concat();
                assert_eq!(func.instructions, expected);
            }
            other => panic!("expected compiled function constant, got {other:?}"),
        }
    }

    #[test]
    fn closures_capture_free_variables_in_reference_order() {
        let bytecode = compile(
            r#"
            fn(a) {
                fn(b) {
                    a + b
                }
            }
            "#,
        );
        match bytecode.constants.last() {
            Some(Value::CompiledFunction(func)) => {
                let expected = vec![
                    code::make(Op::GetFree, &[0]),
                    code::make(Op::GetLocal, &[0]),
                    code::make(Op::Add, &[]),
                    code::make(Op::ReturnValue, &[]),
                ]
                .concat();
                assert_eq!(func.instructions, expected);
            }
            other => panic!("expected inner compiled function, got {other:?}"),
        }
    }

    #[test]
    fn recursive_function_uses_current_closure() {
        let bytecode = compile(
            r#"
            let countDown = fn(x) { countDown(x - 1) };
            countDown(1);
            "#,
        );
        match &bytecode.constants[1] {
            Value::CompiledFunction(func) => {
                let expected = vec![
                    code::make(Op::CurrentClosure, &[]),
                    code::make(Op::GetLocal, &[0]),
                    code::make(Op::Constant, &[0]),
                    code::make(Op::Sub, &[]),
                    code::make(Op::Call, &[1]),
                    code::make(Op::ReturnValue, &[]),
                ]
                .concat();
                assert_eq!(func.instructions, expected);
            }
            other => panic!("expected compiled function, got {other:?}"),
        }
    }
}

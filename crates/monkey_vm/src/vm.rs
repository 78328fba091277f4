use std::cell::RefCell;
use std::rc::Rc;

use monkey_compiler::Bytecode;
use monkey_object::code::{read_u16, read_u8, Op};
use monkey_object::value::{Closure, CompiledFunction, HashPairs};
use monkey_object::{builtins, HashPair, Value};
use tracing::{debug, error};

use crate::config::VmConfig;
use crate::error::{VmError, VmErrorKind, VmResult};
use crate::frame::Frame;

/// A stack-based bytecode interpreter. Owns a fixed-capacity operand stack
/// and call-frame stack; `sp` is the index of the next free stack slot, not
/// decremented-and-cleared on pop, so [`Vm::last_popped_stack_element`] can
/// read the value just removed straight out of `stack[sp]`.
pub struct Vm {
    constants: Vec<Value>,
    stack: Vec<Value>,
    sp: usize,
    pub globals: Vec<Value>,
    frames: Vec<Frame>,
    config: VmConfig,
}

impl Vm {
    pub fn new(bytecode: Bytecode, config: VmConfig) -> Self {
        Vm::with_globals(bytecode, vec![Value::Null; config.globals_size], config)
    }

    /// Carries a globals array over from a previous REPL iteration.
    pub fn with_globals(bytecode: Bytecode, globals: Vec<Value>, config: VmConfig) -> Self {
        let main_fn = Rc::new(CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
        });
        let main_closure = Rc::new(Closure {
            func: main_fn,
            free: Vec::new(),
        });
        Vm {
            constants: bytecode.constants,
            stack: vec![Value::Null; config.stack_size],
            sp: 0,
            globals,
            frames: vec![Frame::new(main_closure, 0)],
            config,
        }
    }

    pub fn last_popped_stack_element(&self) -> &Value {
        &self.stack[self.sp]
    }

    pub fn run(&mut self) -> VmResult<()> {
        loop {
            let ip = self.current_frame().ip;
            if ip >= self.current_frame().instructions().len() {
                break;
            }
            let opcode_byte = self.current_frame().instructions()[ip];
            let op = match Op::from_u8(opcode_byte) {
                Some(op) => op,
                None => {
                    let err = self.err(VmErrorKind::UnknownOpcode(opcode_byte));
                    error!(ip = err.ip, kind = %err.kind, "vm execution error");
                    return Err(err);
                }
            };
            self.current_frame_mut().ip += 1;

            let result = self.execute(op);
            if let Err(err) = result {
                error!(ip = err.ip, kind = %err.kind, "vm execution error");
                return Err(err);
            }
        }
        Ok(())
    }

    fn execute(&mut self, op: Op) -> VmResult<()> {
        match op {
            Op::Constant => {
                let index = self.read_u16_operand();
                self.push(self.constants[index].clone())
            }
            Op::Add | Op::Sub | Op::Mul | Op::Div => self.execute_binary_operation(op),
            Op::True => self.push(Value::Boolean(true)),
            Op::False => self.push(Value::Boolean(false)),
            Op::Equal | Op::NotEqual | Op::GreaterThan => self.execute_comparison(op),
            Op::Bang => self.execute_bang_operator(),
            Op::Minus => self.execute_minus_operator(),
            Op::Pop => {
                self.pop();
                Ok(())
            }
            Op::Jump => {
                let pos = self.read_u16_operand();
                self.current_frame_mut().ip = pos;
                Ok(())
            }
            Op::JumpNotTruthy => {
                let pos = self.read_u16_operand();
                let condition = self.pop();
                if !condition.is_truthy() {
                    self.current_frame_mut().ip = pos;
                }
                Ok(())
            }
            Op::Null => self.push(Value::Null),
            Op::GetGlobal => {
                let index = self.read_u16_operand();
                self.push(self.globals[index].clone())
            }
            Op::SetGlobal => {
                let index = self.read_u16_operand();
                let value = self.pop();
                self.globals[index] = value;
                Ok(())
            }
            Op::GetLocal => {
                let index = self.read_u8_operand();
                let bp = self.current_frame().base_pointer;
                self.push(self.stack[bp + index].clone())
            }
            Op::SetLocal => {
                let index = self.read_u8_operand();
                let bp = self.current_frame().base_pointer;
                let value = self.pop();
                self.stack[bp + index] = value;
                Ok(())
            }
            Op::GetBuiltin => {
                let index = self.read_u8_operand();
                let (_, func) = builtins()[index].clone();
                self.push(func)
            }
            Op::Array => {
                let count = self.read_u16_operand();
                let elements = self.stack[self.sp - count..self.sp].to_vec();
                self.sp -= count;
                self.push(Value::array(elements))
            }
            Op::Hash => {
                let count = self.read_u16_operand();
                self.execute_hash_literal(count)
            }
            Op::Index => {
                let index = self.pop();
                let left = self.pop();
                self.execute_index_expression(left, index)
            }
            Op::Call => {
                let num_args = self.read_u8_operand();
                self.execute_call(num_args)
            }
            Op::ReturnValue => {
                let return_value = self.pop();
                let frame = self.pop_frame();
                self.sp = frame.base_pointer - 1;
                self.push(return_value)
            }
            Op::Return => {
                let frame = self.pop_frame();
                self.sp = frame.base_pointer - 1;
                self.push(Value::Null)
            }
            Op::Closure => {
                let const_index = self.read_u16_operand();
                let num_free = self.read_u8_operand();
                self.push_closure(const_index, num_free)
            }
            Op::GetFree => {
                let index = self.read_u8_operand();
                let value = self.current_frame().closure.free[index].clone();
                self.push(value)
            }
            Op::CurrentClosure => {
                let closure = Rc::clone(&self.current_frame().closure);
                self.push(Value::Closure(closure))
            }
        }
    }

    fn current_frame(&self) -> &Frame {
        self.frames.last().expect("frame stack is never empty")
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack is never empty")
    }

    fn push_frame(&mut self, frame: Frame) -> VmResult<()> {
        if self.frames.len() >= self.config.max_frames {
            return Err(self.err(VmErrorKind::StackOverflow));
        }
        self.frames.push(frame);
        Ok(())
    }

    fn pop_frame(&mut self) -> Frame {
        self.frames.pop().expect("pop_frame with no frame to pop")
    }

    fn read_u16_operand(&mut self) -> usize {
        let ip = self.current_frame().ip;
        let value = read_u16(&self.current_frame().instructions()[ip..]) as usize;
        self.current_frame_mut().ip += 2;
        value
    }

    fn read_u8_operand(&mut self) -> usize {
        let ip = self.current_frame().ip;
        let value = read_u8(&self.current_frame().instructions()[ip..]) as usize;
        self.current_frame_mut().ip += 1;
        value
    }

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.sp >= self.config.stack_size {
            return Err(self.err(VmErrorKind::StackOverflow));
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.sp -= 1;
        self.stack[self.sp].clone()
    }

    fn err(&self, kind: VmErrorKind) -> VmError {
        VmError {
            ip: self.current_frame().ip,
            stack_trace: self.stack[..self.sp].iter().map(|v| v.to_string()).collect(),
            kind,
        }
    }

    fn execute_binary_operation(&mut self, op: Op) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();
        match (&left, &right) {
            (Value::Integer(l), Value::Integer(r)) => {
                let result = match op {
                    Op::Add => l.wrapping_add(*r),
                    Op::Sub => l.wrapping_sub(*r),
                    Op::Mul => l.wrapping_mul(*r),
                    Op::Div => {
                        if *r == 0 {
                            return Err(self.err(VmErrorKind::UnknownOperator {
                                op: "/",
                                operand: "division by zero",
                            }));
                        }
                        l / r
                    }
                    other => unreachable!("non-arithmetic opcode {other:?} in binary operation"),
                };
                self.push(Value::Integer(result))
            }
            (Value::String(l), Value::String(r)) if op == Op::Add => {
                self.push(Value::string(format!("{l}{r}")))
            }
            _ => Err(self.err(VmErrorKind::TypeMismatch {
                left: left.type_name(),
                op: op_symbol(op),
                right: right.type_name(),
            })),
        }
    }

    fn execute_comparison(&mut self, op: Op) -> VmResult<()> {
        let right = self.pop();
        let left = self.pop();
        if let (Value::Integer(l), Value::Integer(r)) = (&left, &right) {
            let result = match op {
                Op::Equal => l == r,
                Op::NotEqual => l != r,
                Op::GreaterThan => l > r,
                other => unreachable!("non-comparison opcode {other:?}"),
            };
            return self.push(Value::Boolean(result));
        }
        match op {
            Op::Equal => self.push(Value::Boolean(left.identical(&right))),
            Op::NotEqual => self.push(Value::Boolean(!left.identical(&right))),
            _ => Err(self.err(VmErrorKind::TypeMismatch {
                left: left.type_name(),
                op: op_symbol(op),
                right: right.type_name(),
            })),
        }
    }

    fn execute_bang_operator(&mut self) -> VmResult<()> {
        let operand = self.pop();
        match operand {
            Value::Boolean(b) => self.push(Value::Boolean(!b)),
            Value::Null => self.push(Value::Boolean(true)),
            _ => self.push(Value::Boolean(false)),
        }
    }

    fn execute_minus_operator(&mut self) -> VmResult<()> {
        let operand = self.pop();
        match operand {
            Value::Integer(i) => self.push(Value::Integer(-i)),
            other => Err(self.err(VmErrorKind::UnknownOperator {
                op: "-",
                operand: other.type_name(),
            })),
        }
    }

    fn execute_hash_literal(&mut self, count: usize) -> VmResult<()> {
        let mut pairs: HashPairs = HashPairs::default();
        let start = self.sp - count;
        let mut i = start;
        while i < self.sp {
            let key = self.stack[i].clone();
            let value = self.stack[i + 1].clone();
            let hash_key = key
                .hash_key()
                .map_err(|msg| self.err(VmErrorKind::UnhashableKey(msg)))?;
            pairs.insert(hash_key, HashPair { key, value });
            i += 2;
        }
        self.sp = start;
        self.push(Value::Hash(Rc::new(RefCell::new(pairs))))
    }

    fn execute_index_expression(&mut self, left: Value, index: Value) -> VmResult<()> {
        match (&left, &index) {
            (Value::Array(arr), Value::Integer(i)) => {
                let len = arr.borrow().len() as i64;
                if *i < 0 || *i >= len {
                    self.push(Value::Null)
                } else {
                    self.push(arr.borrow()[*i as usize].clone())
                }
            }
            (Value::Hash(hash), _) => {
                let hash_key = index
                    .hash_key()
                    .map_err(|msg| self.err(VmErrorKind::UnhashableKey(msg)))?;
                match hash.borrow().get(&hash_key) {
                    Some(pair) => self.push(pair.value.clone()),
                    None => self.push(Value::Null),
                }
            }
            _ => Err(self.err(VmErrorKind::IndexNotSupported(left.type_name()))),
        }
    }

    fn execute_call(&mut self, num_args: usize) -> VmResult<()> {
        let callee = self.stack[self.sp - 1 - num_args].clone();
        match callee {
            Value::Closure(closure) => self.call_closure(closure, num_args),
            Value::Builtin(_, func) => self.call_builtin(func, num_args),
            _ => Err(self.err(VmErrorKind::NotCallable)),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, num_args: usize) -> VmResult<()> {
        if num_args != closure.func.num_parameters {
            return Err(self.err(VmErrorKind::ArityMismatch {
                want: closure.func.num_parameters,
                got: num_args,
            }));
        }
        debug!(frame_depth = self.frames.len(), "calling closure");
        let num_locals = closure.func.num_locals;
        let base_pointer = self.sp - num_args;
        self.push_frame(Frame::new(closure, base_pointer))?;
        self.sp = base_pointer + num_locals;
        Ok(())
    }

    fn call_builtin(&mut self, func: monkey_object::value::BuiltinFn, num_args: usize) -> VmResult<()> {
        let args = self.stack[self.sp - num_args..self.sp].to_vec();
        self.sp -= num_args + 1;
        // A builtin's `Error` is a domain error, not a VM failure — it is
        // pushed like any other value and left for the caller to inspect.
        self.push(func(&args))
    }

    fn push_closure(&mut self, const_index: usize, num_free: usize) -> VmResult<()> {
        let func = match &self.constants[const_index] {
            Value::CompiledFunction(f) => Rc::clone(f),
            other => panic!("OpClosure constant at {const_index} is not a compiled function: {other:?}"),
        };
        let free = self.stack[self.sp - num_free..self.sp].to_vec();
        self.sp -= num_free;
        self.push(Value::Closure(Rc::new(Closure { func, free })))
    }
}

fn op_symbol(op: Op) -> &'static str {
    match op {
        Op::Add => "+",
        Op::Sub => "-",
        Op::Mul => "*",
        Op::Div => "/",
        Op::Equal => "==",
        Op::NotEqual => "!=",
        Op::GreaterThan => ">",
        other => unreachable!("no infix symbol for {other:?}"),
    }
}

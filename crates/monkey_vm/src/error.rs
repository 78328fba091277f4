use thiserror::Error;

/// The diagnostic bundle every recoverable VM error carries: the
/// instruction offset it failed at, and a snapshot of the operand stack
/// up to (not including) the unused slots past `sp`.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub ip: usize,
    pub stack_trace: Vec<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum VmErrorKind {
    #[error("stack overflow")]
    StackOverflow,
    #[error("calling non-function and non-built-in")]
    NotCallable,
    #[error("wrong number of arguments: want={want}, got={got}")]
    ArityMismatch { want: usize, got: usize },
    #[error("unsupported types for binary operation: {left} {op} {right}")]
    TypeMismatch {
        left: &'static str,
        op: &'static str,
        right: &'static str,
    },
    #[error("unknown operator: {op} {operand}")]
    UnknownOperator { op: &'static str, operand: &'static str },
    #[error("unusable as hash key: {0}")]
    UnhashableKey(String),
    #[error("index operator not supported: {0}")]
    IndexNotSupported(&'static str),
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u8),
}

#[derive(Debug, Error, PartialEq)]
#[error("{kind} (at ip={ip})")]
pub struct VmError {
    pub kind: VmErrorKind,
    pub ip: usize,
    pub stack_trace: Vec<String>,
}

pub type VmResult<T> = Result<T, VmError>;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum CompileError {
    #[error("undefined variable {0}")]
    UndefinedVariable(String),

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("unusable as hash key: {0}")]
    UnhashableKey(String),
}

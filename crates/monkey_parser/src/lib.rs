mod ast;
mod error;
mod parser;

pub use ast::{Expr, Program, Stmt};
pub use error::ParseError;
pub use parser::Parser;

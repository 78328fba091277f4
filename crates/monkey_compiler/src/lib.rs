pub mod compiler;
pub mod error;
pub mod symbol_table;

pub use compiler::{Bytecode, Compiler};
pub use error::CompileError;
pub use symbol_table::{Symbol, SymbolScope, SymbolTable};

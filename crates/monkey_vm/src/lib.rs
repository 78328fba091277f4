pub mod config;
pub mod error;
pub mod frame;
pub mod vm;

pub use config::VmConfig;
pub use error::{VmError, VmErrorKind, VmResult};
pub use frame::Frame;
pub use vm::Vm;

pub mod machine;
pub mod run_stack;
pub mod runtime_error;

pub use machine::{Machine, Transition};
pub use run_stack::RunStack;
pub use runtime_error::RuntimeError;

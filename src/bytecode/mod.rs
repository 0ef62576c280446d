pub mod load_error;
pub mod loader;
pub mod op;
pub mod program;

pub use load_error::LoadError;
pub use op::{Bop, Op};
pub use program::Program;

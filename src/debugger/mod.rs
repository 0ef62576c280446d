pub mod debug_machine;
pub mod frame_record;
pub mod session;
pub mod source;
pub mod symbol_table;

pub use debug_machine::{DebugMachine, StepMode};
pub use frame_record::FrameRecord;
pub use session::Session;
pub use source::SourceLine;
pub use symbol_table::SymbolTable;

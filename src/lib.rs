pub mod cli;
pub mod config;
pub mod errors;
pub mod interpreter;
pub mod program;
pub mod sessions;
pub mod types;

// Re-export main types
pub use errors::{DebuggerError, ExecError};
pub use interpreter::{CommandOutcome, DebugCommand, Debugger, ExecutionState};
pub use program::Program;
pub use sessions::{BreakpointAction, SessionManager};
pub use types::*;

//! Program interpreter
//!
//! Walks a `Program` one step at a time under operator control. `machine` owns the
//! session state machine; the other modules are the pieces it is built from.

pub mod command;
pub mod cursor;
pub mod evaluator;
pub mod machine;
pub mod resolver;
pub mod risk;
pub mod state;

#[cfg(test)]
mod tests;

pub use command::{CommandExecutor, CommandOutput};
pub use cursor::Cursor;
pub use evaluator::{StepEvaluator, StepResult};
pub use machine::{CommandOutcome, DebugCommand, Debugger, Evaluation, Inspection};
pub use resolver::VariableSource;
pub use state::{ErrorKind, ExecutionState};

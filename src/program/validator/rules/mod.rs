//! Validation Rules
//!
//! Each file in this module contains one or two closely related rules:
//!
//! - `empty_program.rs` - Programs with nothing to execute
//! - `duplicate_id.rs` - Procedure and step ids must be unique
//! - `execution_order.rs` - `execution_order` must reference known procedures
//! - `step_fields.rs` - Required step fields must be non-blank
//! - `undefined_variable.rs` - `$name` used before any step can define it

mod duplicate_id;
mod empty_program;
mod execution_order;
mod step_fields;
mod undefined_variable;

pub use duplicate_id::DuplicateIdRule;
pub use empty_program::EmptyProgramRule;
pub use execution_order::ExecutionOrderRule;
pub use step_fields::StepFieldsRule;
pub use undefined_variable::UndefinedVariableRule;

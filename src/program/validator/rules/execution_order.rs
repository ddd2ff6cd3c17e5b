//! Rule: Execution Order
//!
//! Every id listed in `execution_order` must name a declared procedure.

use crate::program::Program;

use super::super::{Location, ValidationError, ValidationRule};

pub struct ExecutionOrderRule;

impl ValidationRule for ExecutionOrderRule {
    fn id(&self) -> &'static str {
        "unknown-procedure"
    }

    fn description(&self) -> &'static str {
        "execution_order must only reference declared procedures"
    }

    fn validate(&self, program: &Program) -> Vec<ValidationError> {
        program
            .execution_order
            .iter()
            .filter(|id| program.procedure(id).is_none())
            .map(|id| {
                ValidationError::error(
                    Location::program(),
                    format!("execution_order references unknown procedure '{}'", id),
                    self.id(),
                )
            })
            .collect()
    }
}

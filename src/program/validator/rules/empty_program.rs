//! Rule: Empty Program
//!
//! A program must contain at least one executable step, otherwise a fresh session
//! would have no valid cursor.

use crate::program::Program;

use super::super::{Location, ValidationError, ValidationRule};

pub struct EmptyProgramRule;

impl ValidationRule for EmptyProgramRule {
    fn id(&self) -> &'static str {
        "empty-program"
    }

    fn description(&self) -> &'static str {
        "Programs must contain at least one step"
    }

    fn validate(&self, program: &Program) -> Vec<ValidationError> {
        if program.procedures.is_empty() {
            return vec![ValidationError::error(
                Location::program(),
                "Program has no procedures",
                self.id(),
            )];
        }

        if program.total_steps() == 0 {
            return vec![ValidationError::error(
                Location::program(),
                "Program has no executable steps",
                self.id(),
            )];
        }

        Vec::new()
    }
}

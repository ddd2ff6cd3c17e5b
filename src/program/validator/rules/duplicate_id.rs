//! Rule: Duplicate Id
//!
//! Procedure ids and step ids must each be unique across the whole program.
//! Breakpoints and the cursor address steps by id alone.

use std::collections::HashSet;

use crate::program::Program;

use super::super::{Location, ValidationError, ValidationRule};

pub struct DuplicateIdRule;

impl ValidationRule for DuplicateIdRule {
    fn id(&self) -> &'static str {
        "duplicate-id"
    }

    fn description(&self) -> &'static str {
        "Procedure and step ids must be unique"
    }

    fn validate(&self, program: &Program) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut procedures = HashSet::new();
        let mut steps = HashSet::new();

        for procedure in &program.procedures {
            if procedure.id.trim().is_empty() {
                errors.push(ValidationError::error(
                    Location::program(),
                    "Procedure id must not be empty",
                    self.id(),
                ));
            } else if !procedures.insert(procedure.id.as_str()) {
                errors.push(ValidationError::error(
                    Location::procedure(&procedure.id),
                    format!("Duplicate procedure id '{}'", procedure.id),
                    self.id(),
                ));
            }

            for step in &procedure.steps {
                if step.id.trim().is_empty() {
                    errors.push(ValidationError::error(
                        Location::procedure(&procedure.id),
                        "Step id must not be empty",
                        self.id(),
                    ));
                } else if !steps.insert(step.id.as_str()) {
                    errors.push(ValidationError::error(
                        Location::step(&procedure.id, &step.id),
                        format!("Duplicate step id '{}'", step.id),
                        self.id(),
                    ));
                }
            }
        }

        errors
    }
}

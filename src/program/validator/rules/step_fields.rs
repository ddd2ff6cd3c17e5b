//! Rule: Step Fields
//!
//! Catches steps that deserialize fine but can never do anything useful:
//! blank commands, blank assignment targets, choices without options.

use crate::program::{Action, Program, StepKind};

use super::super::{Location, ValidationError, ValidationRule};

pub struct StepFieldsRule;

impl ValidationRule for StepFieldsRule {
    fn id(&self) -> &'static str {
        "step-fields"
    }

    fn description(&self) -> &'static str {
        "Required step fields must be present and non-blank"
    }

    fn validate(&self, program: &Program) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for procedure in &program.procedures {
            for step in &procedure.steps {
                let location = Location::step(&procedure.id, &step.id);
                let mut problems: Vec<String> = Vec::new();

                match &step.kind {
                    StepKind::Command { command, .. } => {
                        if command.trim().is_empty() {
                            problems.push("command step has an empty command".to_string());
                        }
                    }
                    StepKind::Conditional {
                        true_branch,
                        false_branch,
                        ..
                    } => {
                        for action in [true_branch, false_branch].into_iter().flatten() {
                            problems.extend(check_action(action));
                        }
                    }
                    StepKind::Assignment { assign_to, .. } => {
                        if assign_to.trim().is_empty() {
                            problems.push("assignment step has an empty assign_to".to_string());
                        }
                    }
                    StepKind::Choice { options } => {
                        if options.is_empty() {
                            problems.push("choice step has no options".to_string());
                        }
                        for option in options {
                            problems.extend(check_action(&option.action));
                        }
                    }
                    StepKind::Analysis { .. } | StepKind::Note { .. } => {}
                }

                errors.extend(
                    problems
                        .into_iter()
                        .map(|message| ValidationError::error(location.clone(), message, self.id())),
                );
            }
        }

        errors
    }
}

fn check_action(action: &Action) -> Option<String> {
    match action {
        Action::Command { command, .. } if command.trim().is_empty() => {
            Some("command action has an empty command".to_string())
        }
        _ => None,
    }
}

//! Rule: Undefined Variable
//!
//! Warns when a step references `$name` before any earlier step (in execution order)
//! or the program's `global_memory` could have defined it. Unresolved references are
//! left verbatim at runtime, so this is a warning rather than an error.
//!
//! ```json
//! {"id": "s1", "type": "command", "command": "cat $log_path"}
//! ```
//! Warning: `log_path` is never assigned before `s1`.

use std::collections::HashSet;

use crate::interpreter::resolver::references;
use crate::program::{Action, Condition, Program, Step, StepKind};

use super::super::{Location, ValidationError, ValidationRule};

pub struct UndefinedVariableRule;

impl ValidationRule for UndefinedVariableRule {
    fn id(&self) -> &'static str {
        "undefined-variable"
    }

    fn description(&self) -> &'static str {
        "Variables should be assigned before they are referenced"
    }

    fn validate(&self, program: &Program) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut defined: HashSet<String> = program.global_memory.keys().cloned().collect();

        for procedure in program.ordered_procedures() {
            for step in &procedure.steps {
                let mut reported = HashSet::new();
                for name in used_variables(step) {
                    if !defined.contains(&name) && reported.insert(name.clone()) {
                        errors.push(ValidationError::warning(
                            Location::step(&procedure.id, &step.id),
                            format!("Variable '{}' is used before it is assigned", name),
                            self.id(),
                        ));
                    }
                }

                defined.extend(step.defined_variables().into_iter().map(str::to_string));
            }
        }

        errors
    }
}

/// Every variable a step reads
fn used_variables(step: &Step) -> Vec<String> {
    let mut used = Vec::new();

    match &step.kind {
        StepKind::Command { command, .. } => used.extend(references(command)),
        StepKind::Conditional {
            condition,
            true_branch,
            false_branch,
        } => {
            match condition {
                Condition::EqualityCheck { variable, value }
                | Condition::ContainsCheck { variable, value } => {
                    used.extend(operand_variables(variable));
                    used.extend(references(value));
                }
                Condition::BooleanCheck { expression } => used.extend(references(expression)),
            }
            for action in [true_branch, false_branch].into_iter().flatten() {
                used.extend(action_variables(action));
            }
        }
        StepKind::Assignment { value, .. } => used.extend(references(value)),
        StepKind::Choice { options } => {
            if let Some(first) = options.first() {
                used.extend(action_variables(&first.action));
            }
        }
        StepKind::Analysis { input, .. } => used.extend(input.iter().cloned()),
        StepKind::Note { message, .. } => used.extend(references(message)),
    }

    used
}

/// The `variable` side of a check is either a template or a bare variable name
fn operand_variables(operand: &str) -> Vec<String> {
    let refs = references(operand);
    if !refs.is_empty() {
        return refs;
    }
    let trimmed = operand.trim();
    if is_identifier(trimmed) {
        vec![trimmed.to_string()]
    } else {
        Vec::new()
    }
}

fn action_variables(action: &Action) -> Vec<String> {
    match action {
        Action::Command { command, .. } => references(command),
        Action::Log { message, .. } => references(message),
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

//! Structural validation for programs
//!
//! Deserialization already guarantees every step, action and condition has a known
//! type. This pass catches what the type system can't: duplicate ids, dangling
//! references in `execution_order`, empty choices, and so on.
//!
//! # Architecture
//!
//! 1. **ValidationRule trait** - Each rule implements this trait
//! 2. **Validator** - Collects and runs all rules
//! 3. **ValidationError** - The output of validation (errors and warnings)
//!
//! Only errors block a session from starting. Warnings are reported to the caller.

pub mod rules;

use std::fmt;

use super::Program;
use crate::errors::DebuggerError;

/// Where in the program a diagnostic applies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub procedure_id: Option<String>,
    pub step_id: Option<String>,
}

impl Location {
    pub fn program() -> Self {
        Self::default()
    }

    pub fn procedure(procedure_id: &str) -> Self {
        Self {
            procedure_id: Some(procedure_id.to_string()),
            step_id: None,
        }
    }

    pub fn step(procedure_id: &str, step_id: &str) -> Self {
        Self {
            procedure_id: Some(procedure_id.to_string()),
            step_id: Some(step_id.to_string()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.procedure_id, &self.step_id) {
            (Some(p), Some(s)) => write!(f, "{}/{}", p, s),
            (Some(p), None) => write!(f, "{}", p),
            _ => write!(f, "program"),
        }
    }
}

/// A diagnostic produced by a validation rule
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub location: Location,
    pub message: String,
    pub severity: Severity,
    /// Which rule produced this error
    pub rule_id: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Program cannot be executed
    Error,
    /// Program runs, but probably not as intended
    Warning,
}

impl ValidationError {
    pub fn error(location: Location, message: impl Into<String>, rule_id: &'static str) -> Self {
        Self {
            location,
            message: message.into(),
            severity: Severity::Error,
            rule_id,
        }
    }

    pub fn warning(location: Location, message: impl Into<String>, rule_id: &'static str) -> Self {
        Self {
            location,
            message: message.into(),
            severity: Severity::Warning,
            rule_id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.severity, Severity::Error)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            f,
            "{} at {}: {} [{}]",
            severity, self.location, self.message, self.rule_id
        )
    }
}

impl std::error::Error for ValidationError {}

/// Trait that all validation rules implement.
///
/// Rules are independent of each other and should only inspect the program.
pub trait ValidationRule: Send + Sync {
    /// Unique identifier, e.g. "duplicate-step-id"
    fn id(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn validate(&self, program: &Program) -> Vec<ValidationError>;
}

/// Runs every registered rule.
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(rules::EmptyProgramRule),
                Box::new(rules::DuplicateIdRule),
                Box::new(rules::ExecutionOrderRule),
                Box::new(rules::StepFieldsRule),
                // Warnings
                Box::new(rules::UndefinedVariableRule),
            ],
        }
    }

    pub fn validate(&self, program: &Program) -> Vec<ValidationError> {
        self.rules
            .iter()
            .flat_map(|rule| rule.validate(program))
            .collect()
    }

    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

/// Run all rules against a program
pub fn validate_program(program: &Program) -> Vec<ValidationError> {
    Validator::new().validate(program)
}

/// Reject a program that has any error-level diagnostics
pub fn ensure_valid(program: &Program) -> Result<Vec<ValidationError>, DebuggerError> {
    let diagnostics = validate_program(program);
    let errors: Vec<String> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.to_string())
        .collect();

    if errors.is_empty() {
        Ok(diagnostics)
    } else {
        Err(DebuggerError::Validation(errors.join("; ")))
    }
}

//! Program model
//!
//! A `Program` is the immutable input handed to the debugger: an ordered set of
//! procedures, each a fixed list of typed steps. Programs arrive as JSON and are
//! never mutated after a session is started.

pub mod validator;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::errors::DebuggerError;

pub type ProcedureId = String;
pub type StepId = String;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Program {
    pub name: String,
    #[serde(default)]
    pub tools: Vec<String>,
    pub procedures: Vec<Procedure>,
    /// Procedure run order. Empty means declaration order.
    #[serde(default)]
    pub execution_order: Vec<ProcedureId>,
    #[serde(default)]
    pub global_memory: Map<String, JsonValue>,
    #[serde(default)]
    pub error_handling: ErrorHandling,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorHandling {
    #[serde(default = "default_policy")]
    pub on_tool_error: String,
    #[serde(default = "default_policy")]
    pub on_condition_error: String,
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn default_policy() -> String {
    "stop".to_string()
}

impl Default for ErrorHandling {
    fn default() -> Self {
        Self {
            on_tool_error: default_policy(),
            on_condition_error: default_policy(),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Procedure {
    pub id: ProcedureId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub id: StepId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(flatten)]
    pub kind: StepKind,
}

/// Step variants, discriminated by `type`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    Command {
        #[serde(default)]
        tool: String,
        command: String,
        #[serde(default)]
        parameters: Map<String, JsonValue>,
        #[serde(default)]
        assign_to: Option<String>,
    },
    Conditional {
        condition: Condition,
        #[serde(default)]
        true_branch: Option<Action>,
        #[serde(default)]
        false_branch: Option<Action>,
    },
    Assignment {
        assign_to: String,
        value: String,
        /// Key used when writing to persistent memory
        #[serde(default)]
        name: Option<String>,
    },
    Choice {
        options: Vec<ChoiceOption>,
    },
    Analysis {
        #[serde(default)]
        input: Vec<String>,
        #[serde(default)]
        extract: Vec<String>,
    },
    Note {
        #[serde(default)]
        level: NoteLevel,
        message: String,
    },
}

/// `assign_to` targets that write persistent memory instead of the frame
pub fn is_memory_target(assign_to: &str) -> bool {
    matches!(assign_to, "memory" | "global")
}

impl Step {
    /// Key an assignment step writes to when targeting persistent memory
    pub fn memory_key(&self) -> &str {
        match &self.kind {
            StepKind::Assignment {
                name: Some(name), ..
            } if !name.trim().is_empty() => name,
            _ => &self.id,
        }
    }

    /// Variable names this step may define when it succeeds
    pub fn defined_variables(&self) -> Vec<&str> {
        match &self.kind {
            StepKind::Command { assign_to, .. } => assign_to.iter().map(String::as_str).collect(),
            StepKind::Assignment { assign_to, .. } => {
                if is_memory_target(assign_to) {
                    vec![self.memory_key()]
                } else {
                    vec![assign_to.as_str()]
                }
            }
            StepKind::Conditional {
                true_branch,
                false_branch,
                ..
            } => [true_branch, false_branch]
                .into_iter()
                .flatten()
                .filter_map(Action::assign_to)
                .collect(),
            StepKind::Choice { options } => options
                .iter()
                .filter_map(|o| o.action.assign_to())
                .collect(),
            StepKind::Analysis { .. } | StepKind::Note { .. } => Vec::new(),
        }
    }
}

impl Action {
    pub fn assign_to(&self) -> Option<&str> {
        match self {
            Action::Command { assign_to, .. } => assign_to.as_deref(),
            Action::Log { .. } => None,
        }
    }
}

impl StepKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            StepKind::Command { .. } => "command",
            StepKind::Conditional { .. } => "conditional",
            StepKind::Assignment { .. } => "assignment",
            StepKind::Choice { .. } => "choice",
            StepKind::Analysis { .. } => "analysis",
            StepKind::Note { .. } => "note",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    EqualityCheck { variable: String, value: String },
    ContainsCheck { variable: String, value: String },
    BooleanCheck { expression: String },
}

/// Branch or choice action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Command {
        #[serde(default)]
        tool: String,
        command: String,
        #[serde(default)]
        assign_to: Option<String>,
    },
    Log {
        message: String,
        #[serde(default)]
        level: NoteLevel,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChoiceOption {
    #[serde(default)]
    pub description: String,
    pub action: Action,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoteLevel {
    #[default]
    Info,
    Warning,
    Error,
}

impl Program {
    /// Parse a program from its JSON form
    pub fn from_json(json: &str) -> Result<Self, DebuggerError> {
        serde_json::from_str(json)
            .map_err(|e| DebuggerError::Validation(format!("Malformed program: {}", e)))
    }

    pub fn from_value(value: JsonValue) -> Result<Self, DebuggerError> {
        serde_json::from_value(value)
            .map_err(|e| DebuggerError::Validation(format!("Malformed program: {}", e)))
    }

    pub fn procedure(&self, id: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.id == id)
    }

    /// Procedures in the order they execute
    pub fn ordered_procedures(&self) -> Vec<&Procedure> {
        if self.execution_order.is_empty() {
            self.procedures.iter().collect()
        } else {
            self.execution_order
                .iter()
                .filter_map(|id| self.procedure(id))
                .collect()
        }
    }

    pub fn find_step(&self, step_id: &str) -> Option<(&Procedure, &Step)> {
        self.procedures.iter().find_map(|procedure| {
            procedure
                .steps
                .iter()
                .find(|step| step.id == step_id)
                .map(|step| (procedure, step))
        })
    }

    pub fn total_steps(&self) -> usize {
        self.ordered_procedures()
            .iter()
            .map(|p| p.steps.len())
            .sum()
    }
}

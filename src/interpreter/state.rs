//! Execution state
//!
//! Everything a session needs to pause, inspect and resume a program run lives in
//! `ExecutionState`. It is fully serializable and built only through `ExecutionState::new`,
//! so a reset is just a rebuild.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};

use super::cursor::{first_cursor, Cursor};
use crate::program::Program;
use crate::types::ExecutionStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionState {
    pub status: ExecutionStatus,
    /// `None` once every step has run
    pub current_step: Option<Cursor>,
    /// Single variable scope shared by every procedure
    pub frame: BTreeMap<String, String>,
    pub heap: Heap,
    pub memory: Memory,
    pub execution_history: Vec<HistoryEntry>,
    pub breakpoints: BTreeSet<String>,
    pub error_state: Option<ErrorState>,
    pub steps_executed: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Heap {
    pub tool_outputs: BTreeMap<String, ToolOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutput {
    pub command: String,
    pub output: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Memory {
    pub persistent_vars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub step_id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RiskBlocked,
    Execution,
    StepLimit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorState {
    pub step_id: String,
    pub kind: ErrorKind,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionState {
    /// Fresh state for a program: cursor on the first step, memory seeded from
    /// `global_memory`.
    pub fn new(program: &Program) -> Self {
        let persistent_vars = program
            .global_memory
            .iter()
            .map(|(key, value)| (key.clone(), value_to_string(value)))
            .collect();

        Self {
            status: ExecutionStatus::Initialized,
            current_step: first_cursor(program),
            frame: BTreeMap::new(),
            heap: Heap::default(),
            memory: Memory { persistent_vars },
            execution_history: Vec::new(),
            breakpoints: BTreeSet::new(),
            error_state: None,
            steps_executed: 0,
        }
    }

    pub fn fail(&mut self, step_id: &str, kind: ErrorKind, error: impl Into<String>) {
        self.status = ExecutionStatus::Error;
        self.error_state = Some(ErrorState {
            step_id: step_id.to_string(),
            kind,
            error: error.into(),
            timestamp: Utc::now(),
        });
    }
}

/// Render a JSON value the way variables are stored: strings verbatim, everything
/// else as compact JSON.
pub fn value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

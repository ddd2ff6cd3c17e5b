//! Test helpers for interpreter tests

use std::sync::Arc;

use serde_json::{json, Value as JsonValue};

use crate::interpreter::{CommandExecutor, Debugger, ExecutionState};
use crate::program::Program;
use crate::types::{RiskLevel, SessionOptions};

pub const MAX_STEPS: u64 = 1000;

/// Build a program from a list of procedure JSON objects
pub fn program(procedures: JsonValue) -> Program {
    Program::from_value(json!({
        "name": "test-program",
        "procedures": procedures,
    }))
    .expect("test program should parse")
}

/// Single-procedure program named `main`
pub fn single(steps: JsonValue) -> Program {
    program(json!([{ "id": "main", "name": "Main", "steps": steps }]))
}

pub fn options(risk_level: RiskLevel) -> SessionOptions {
    SessionOptions {
        timeout_ms: 5000,
        risk_level,
        ..SessionOptions::default()
    }
}

pub fn debugger(program: Program) -> Debugger {
    debugger_with(program, options(RiskLevel::Medium))
}

pub fn debugger_with(program: Program, options: SessionOptions) -> Debugger {
    Debugger::new(
        Arc::new(program),
        None,
        options,
        Arc::new(CommandExecutor::default()),
        MAX_STEPS,
    )
}

/// Fresh state with the given frame entries
pub fn state_with_frame(pairs: &[(&str, &str)]) -> ExecutionState {
    let mut state = ExecutionState::new(&single(json!([])));
    for (name, value) in pairs {
        state.frame.insert(name.to_string(), value.to_string());
    }
    state
}

pub fn note(id: &str, message: &str) -> JsonValue {
    json!({ "id": id, "type": "note", "message": message })
}

pub fn command(id: &str, command: &str, assign_to: Option<&str>) -> JsonValue {
    match assign_to {
        Some(name) => json!({
            "id": id, "type": "command", "tool": "shell", "command": command, "assign_to": name
        }),
        None => json!({ "id": id, "type": "command", "tool": "shell", "command": command }),
    }
}

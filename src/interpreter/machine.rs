//! Debugger state machine
//!
//! ```text
//! initialized ──step/continue──▶ running ──▶ paused ──step/continue──▶ running ...
//!                                    │
//!                                    ├──▶ completed
//!                                    └──▶ error
//! any state ──reset──▶ initialized
//! ```
//!
//! `running` only exists while a command is being applied: every single step ends
//! `paused`, `completed` or `error`. Once `completed` or `error`, stepping commands are
//! no-ops that hand back the frozen state until `reset`; on an `error` session they
//! report failure.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info};

use super::command::CommandExecutor;
use super::cursor::{next_cursor, step_at};
use super::evaluator::{CommandAttempt, StepEvaluator, StepResult};
use super::resolver::{get_variable, resolve, sole_reference, VariableSource};
use super::state::{ErrorKind, ExecutionState};
use crate::errors::DebuggerError;
use crate::program::Program;
use crate::types::{Analysis, ExecutionStatus, RiskLevel, SessionOptions};

/// Operator command applied to a session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DebugCommand {
    StepOver,
    StepInto,
    StepOut,
    Continue,
    Pause,
    Reset,
    Evaluate { expression: String },
    Inspect { variable: String },
}

impl DebugCommand {
    pub fn name(&self) -> &'static str {
        match self {
            DebugCommand::StepOver => "step_over",
            DebugCommand::StepInto => "step_into",
            DebugCommand::StepOut => "step_out",
            DebugCommand::Continue => "continue",
            DebugCommand::Pause => "pause",
            DebugCommand::Reset => "reset",
            DebugCommand::Evaluate { .. } => "evaluate",
            DebugCommand::Inspect { .. } => "inspect",
        }
    }

    /// Build a command from its transport form: a name plus optional JSON params
    pub fn from_request(name: &str, params: Option<&JsonValue>) -> Result<Self, DebuggerError> {
        let param = |key: &str| -> Result<String, DebuggerError> {
            params
                .and_then(|p| p.get(key))
                .and_then(JsonValue::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    DebuggerError::Validation(format!("'{}' requires a '{}' parameter", name, key))
                })
        };

        match name {
            "step_over" => Ok(DebugCommand::StepOver),
            "step_into" => Ok(DebugCommand::StepInto),
            "step_out" => Ok(DebugCommand::StepOut),
            "continue" => Ok(DebugCommand::Continue),
            "pause" => Ok(DebugCommand::Pause),
            "reset" => Ok(DebugCommand::Reset),
            "evaluate" => Ok(DebugCommand::Evaluate {
                expression: param("expression")?,
            }),
            "inspect" => Ok(DebugCommand::Inspect {
                variable: param("variable")?,
            }),
            other => Err(DebuggerError::Validation(format!(
                "Unknown debug command: {}",
                other
            ))),
        }
    }

    pub fn params(&self) -> Option<JsonValue> {
        match self {
            DebugCommand::Evaluate { expression } => Some(json!({ "expression": expression })),
            DebugCommand::Inspect { variable } => Some(json!({ "variable": variable })),
            _ => None,
        }
    }
}

/// Result of `evaluate`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evaluation {
    Variable {
        name: String,
        value: Option<String>,
        source: VariableSource,
    },
    Command {
        command: String,
        success: bool,
        output: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        stdout: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stderr: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        risk_level: RiskLevel,
    },
    Literal {
        value: String,
    },
}

impl Evaluation {
    pub fn succeeded(&self) -> bool {
        match self {
            Evaluation::Command { success, .. } => *success,
            _ => true,
        }
    }
}

/// Result of `inspect`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Inspection {
    pub name: String,
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub value_type: String,
    pub length: usize,
    pub source: VariableSource,
}

/// What every debug command hands back
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub state: ExecutionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_result: Option<StepResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inspection: Option<Inspection>,
    /// Steps evaluated while applying the command
    pub steps_run: usize,
}

/// One program run under operator control
#[derive(Debug, Clone)]
pub struct Debugger {
    program: Arc<Program>,
    analysis: Option<Analysis>,
    options: SessionOptions,
    executor: Arc<CommandExecutor>,
    max_steps: u64,
    state: ExecutionState,
}

impl Debugger {
    pub fn new(
        program: Arc<Program>,
        analysis: Option<Analysis>,
        options: SessionOptions,
        executor: Arc<CommandExecutor>,
        max_steps: u64,
    ) -> Self {
        let state = ExecutionState::new(&program);
        Self {
            program,
            analysis,
            options,
            executor,
            max_steps,
            state,
        }
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        self.analysis.as_ref()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Apply one operator command
    pub async fn execute(&mut self, command: DebugCommand) -> CommandOutcome {
        let status_before = self.state.status;
        let stepping = matches!(
            command,
            DebugCommand::StepOver
                | DebugCommand::StepInto
                | DebugCommand::StepOut
                | DebugCommand::Continue
        );
        let mut evaluation = None;
        let mut inspection = None;

        let (step_result, steps_run) = match command {
            DebugCommand::StepOver | DebugCommand::StepInto => {
                let result = self.step_over().await;
                let run = usize::from(result.is_some());
                (result, run)
            }
            DebugCommand::StepOut => self.step_out().await,
            DebugCommand::Continue => self.run_continue().await,
            DebugCommand::Pause => {
                self.pause();
                (None, 0)
            }
            DebugCommand::Reset => {
                self.reset();
                (None, 0)
            }
            DebugCommand::Evaluate { expression } => {
                evaluation = Some(self.evaluate(&expression).await);
                (None, 0)
            }
            DebugCommand::Inspect { variable } => {
                inspection = Some(self.inspect(&variable));
                (None, 0)
            }
        };

        let entered_error = self.state.status == ExecutionStatus::Error
            && status_before != ExecutionStatus::Error;
        let frozen = stepping && status_before == ExecutionStatus::Error;
        let success = !entered_error
            && !frozen
            && step_result.as_ref().map_or(true, |r| r.success)
            && evaluation.as_ref().map_or(true, Evaluation::succeeded);

        CommandOutcome {
            success,
            state: self.state.clone(),
            step_result,
            evaluation,
            inspection,
            steps_run,
        }
    }

    /// Execute the step under the cursor. `None` when nothing was evaluated.
    pub async fn step_over(&mut self) -> Option<StepResult> {
        if self.state.status.is_final() {
            return None;
        }

        let Some(cursor) = self.state.current_step.clone() else {
            self.state.status = ExecutionStatus::Completed;
            return None;
        };

        if self.state.steps_executed >= self.max_steps {
            let error = DebuggerError::StepLimitExceeded {
                limit: self.max_steps,
            };
            info!(step_id = %cursor.step_id, %error, "Stopping execution");
            self.state
                .fail(&cursor.step_id, ErrorKind::StepLimit, error.to_string());
            return None;
        }

        let program = Arc::clone(&self.program);
        let Some(step) = step_at(&program, &cursor) else {
            self.state.fail(
                &cursor.step_id,
                ErrorKind::Execution,
                format!("cursor points at unknown step '{}'", cursor.step_id),
            );
            return None;
        };

        self.state.status = ExecutionStatus::Running;
        let evaluator = StepEvaluator::new(&self.executor, &self.options);
        let result = evaluator.evaluate(&mut self.state, step).await;

        if result.success {
            self.state.steps_executed += 1;
            self.state.current_step = next_cursor(&program, &cursor);
            self.state.status = if self.state.current_step.is_some() {
                ExecutionStatus::Paused
            } else {
                ExecutionStatus::Completed
            };
        } else {
            let kind = result.error_kind.unwrap_or(ErrorKind::Execution);
            let error = result.error.clone().unwrap_or_default();
            self.state.fail(&step.id, kind, error);
        }

        Some(result)
    }

    /// Step until execution leaves the current procedure
    async fn step_out(&mut self) -> (Option<StepResult>, usize) {
        let Some(origin) = self
            .state
            .current_step
            .as_ref()
            .map(|c| c.order_index)
        else {
            return (self.step_over().await, 0);
        };

        self.run_until(|state, _| {
            state
                .current_step
                .as_ref()
                .map_or(true, |c| c.order_index != origin)
        })
        .await
    }

    async fn run_continue(&mut self) -> (Option<StepResult>, usize) {
        self.run_until(|_, _| false).await
    }

    /// Repeat `step_over` until completion, error, a breakpoint, or `stop` says so
    async fn run_until<F>(&mut self, stop: F) -> (Option<StepResult>, usize)
    where
        F: Fn(&ExecutionState, &StepResult) -> bool,
    {
        let mut last = None;
        let mut steps_run = 0;

        while let Some(result) = self.step_over().await {
            steps_run += 1;
            let hit_breakpoint = self.state.breakpoints.contains(&result.step_id);
            let halt = self.state.status != ExecutionStatus::Paused
                || hit_breakpoint
                || stop(&self.state, &result);

            if hit_breakpoint && self.state.status == ExecutionStatus::Paused {
                debug!(step_id = %result.step_id, "Breakpoint hit");
            }

            last = Some(result);
            if halt {
                break;
            }
        }

        (last, steps_run)
    }

    pub fn pause(&mut self) {
        if self.state.status == ExecutionStatus::Running {
            self.state.status = ExecutionStatus::Paused;
        }
    }

    pub fn reset(&mut self) {
        self.state = ExecutionState::new(&self.program);
    }

    /// Read-only expression evaluation
    pub async fn evaluate(&self, expression: &str) -> Evaluation {
        let trimmed = expression.trim();

        if let Some(template) = trimmed.strip_prefix('!') {
            let evaluator = StepEvaluator::new(&self.executor, &self.options);
            return match evaluator.attempt_command(&self.state, template.trim()).await {
                CommandAttempt::Blocked { command, level } => Evaluation::Command {
                    command,
                    success: false,
                    output: String::new(),
                    stdout: None,
                    stderr: None,
                    exit_code: None,
                    error: Some(DebuggerError::RiskBlocked { level }.to_string()),
                    risk_level: level,
                },
                CommandAttempt::Aborted {
                    command,
                    level,
                    error,
                } => Evaluation::Command {
                    command,
                    success: false,
                    output: String::new(),
                    stdout: None,
                    stderr: None,
                    exit_code: None,
                    error: Some(DebuggerError::from(error).to_string()),
                    risk_level: level,
                },
                CommandAttempt::Finished {
                    command,
                    level,
                    output,
                } => Evaluation::Command {
                    command,
                    success: output.success,
                    output: output.combined(),
                    error: None,
                    exit_code: output.exit_code,
                    stdout: Some(output.stdout),
                    stderr: Some(output.stderr),
                    risk_level: level,
                },
            };
        }

        if let Some(name) = sole_reference(trimmed) {
            let (value, source) = lookup(&self.state, name);
            return Evaluation::Variable {
                name: name.to_string(),
                value,
                source,
            };
        }

        Evaluation::Literal {
            value: resolve(&self.state, expression),
        }
    }

    pub fn inspect(&self, variable: &str) -> Inspection {
        let name = variable.trim().trim_start_matches('$');
        let name = name
            .strip_prefix('{')
            .and_then(|n| n.strip_suffix('}'))
            .unwrap_or(name);
        let (value, source) = lookup(&self.state, name);

        Inspection {
            name: name.to_string(),
            value_type: value
                .as_deref()
                .map_or("undefined", infer_type)
                .to_string(),
            length: value.as_ref().map_or(0, |v| v.chars().count()),
            value,
            source,
        }
    }

    /// Add or remove a breakpoint. Both directions are idempotent.
    pub fn set_breakpoint(
        &mut self,
        step_id: &str,
        enabled: bool,
    ) -> Result<&BTreeSet<String>, DebuggerError> {
        if self.program.find_step(step_id).is_none() {
            return Err(DebuggerError::Validation(format!(
                "Unknown step id: {}",
                step_id
            )));
        }

        if enabled {
            self.state.breakpoints.insert(step_id.to_string());
        } else {
            self.state.breakpoints.remove(step_id);
        }
        Ok(&self.state.breakpoints)
    }

    /// Change the session's risk level. Returns true when this lifted a risk block,
    /// leaving the session paused on the step that was refused.
    pub fn set_risk_level(&mut self, level: RiskLevel) -> bool {
        self.options.risk_level = level;

        let risk_blocked = self
            .state
            .error_state
            .as_ref()
            .is_some_and(|e| e.kind == ErrorKind::RiskBlocked);

        if self.state.status == ExecutionStatus::Error
            && risk_blocked
            && level != RiskLevel::Low
        {
            self.state.error_state = None;
            self.state.status = ExecutionStatus::Paused;
            return true;
        }
        false
    }
}

fn lookup(state: &ExecutionState, name: &str) -> (Option<String>, VariableSource) {
    match get_variable(state, name) {
        Some((value, source)) => (Some(value), source),
        None => (None, VariableSource::Unknown),
    }
}

fn infer_type(value: &str) -> &'static str {
    let trimmed = value.trim();
    if trimmed.parse::<f64>().is_ok_and(f64::is_finite) {
        return "number";
    }
    if matches!(trimmed, "true" | "false") {
        return "boolean";
    }
    match serde_json::from_str::<JsonValue>(trimmed) {
        Ok(JsonValue::Object(_)) => "object",
        Ok(JsonValue::Array(_)) => "array",
        _ => "string",
    }
}

//! Step evaluation
//!
//! One handler per step variant. Every call to `StepEvaluator::evaluate` appends exactly
//! one history entry, whatever the outcome. Moving the cursor and changing the session
//! status is left to the state machine.

use std::time::{Duration, Instant};

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use tracing::{debug, error, info, warn};

use super::command::{CommandExecutor, CommandOutput};
use super::resolver::{get_variable, resolve};
use super::risk::{classify, is_blocked};
use super::state::{ErrorKind, ExecutionState, HistoryEntry, ToolOutput};
use crate::errors::{DebuggerError, ExecError};
use crate::program::{is_memory_target, Action, Condition, NoteLevel, Step, StepKind};
use crate::types::{RiskLevel, SessionOptions};

const FALSY_VALUES: &[&str] = &["false", "0", "no", "off", "null", "none"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub step_id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub success: bool,
    pub output: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl StepResult {
    fn ok(step: &Step, output: JsonValue) -> Self {
        Self {
            step_id: step.id.clone(),
            step_type: step.kind.type_name().to_string(),
            success: true,
            output,
            error: None,
            error_kind: None,
            risk_level: None,
            stdout: None,
            stderr: None,
            exit_code: None,
        }
    }

    fn failed(step: &Step, kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: JsonValue::Null,
            error: Some(error.into()),
            error_kind: Some(kind),
            ..Self::ok(step, JsonValue::Null)
        }
    }
}

/// Outcome of trying to run one command template
#[derive(Debug)]
pub enum CommandAttempt {
    /// Refused by the risk gate; nothing was spawned
    Blocked { command: String, level: RiskLevel },
    /// The executor itself failed (spawn error, timeout, overflow)
    Aborted {
        command: String,
        level: RiskLevel,
        error: ExecError,
    },
    /// The process ran to completion, successfully or not
    Finished {
        command: String,
        level: RiskLevel,
        output: CommandOutput,
    },
}

pub struct StepEvaluator<'a> {
    executor: &'a CommandExecutor,
    options: &'a SessionOptions,
}

impl<'a> StepEvaluator<'a> {
    pub fn new(executor: &'a CommandExecutor, options: &'a SessionOptions) -> Self {
        Self { executor, options }
    }

    /// Evaluate one step and record it in the execution history
    pub async fn evaluate(&self, state: &mut ExecutionState, step: &Step) -> StepResult {
        let started_at = Utc::now();
        let start = Instant::now();
        debug!(step_id = %step.id, step_type = step.kind.type_name(), "Evaluating step");

        let result = self.dispatch(state, step).await;

        state.execution_history.push(HistoryEntry {
            step_id: step.id.clone(),
            step_type: result.step_type.clone(),
            started_at,
            completed_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
            success: result.success,
            output: result.success.then(|| result.output.clone()),
            error: result.error.clone(),
        });

        result
    }

    async fn dispatch(&self, state: &mut ExecutionState, step: &Step) -> StepResult {
        match &step.kind {
            StepKind::Command {
                command, assign_to, ..
            } => {
                self.execute_command_step(state, step, command, assign_to.as_deref())
                    .await
            }
            StepKind::Conditional {
                condition,
                true_branch,
                false_branch,
            } => {
                let outcome = check_condition(state, condition);
                let branch = if outcome { true_branch } else { false_branch };
                let label = if outcome { "true" } else { "false" };

                match branch {
                    Some(action) => {
                        let mut result = self.run_action(state, step, action).await;
                        result.output = json!({
                            "condition": outcome,
                            "branch": label,
                            "result": result.output,
                        });
                        result
                    }
                    None => StepResult::ok(
                        step,
                        json!({"condition": outcome, "branch": JsonValue::Null}),
                    ),
                }
            }
            StepKind::Assignment {
                assign_to, value, ..
            } => {
                let resolved = resolve(state, value);
                let key = if is_memory_target(assign_to) {
                    let key = step.memory_key().to_string();
                    state
                        .memory
                        .persistent_vars
                        .insert(key.clone(), resolved.clone());
                    key
                } else {
                    state.frame.insert(assign_to.clone(), resolved.clone());
                    assign_to.clone()
                };
                StepResult::ok(
                    step,
                    json!({"assign_to": assign_to, "key": key, "value": resolved}),
                )
            }
            StepKind::Choice { options } => {
                let Some(chosen) = options.first() else {
                    return StepResult::failed(
                        step,
                        ErrorKind::Execution,
                        "choice step has no options",
                    );
                };
                let mut result = self.run_action(state, step, &chosen.action).await;
                result.output = json!({
                    "chosen_option": 0,
                    "description": chosen.description,
                    "result": result.output,
                });
                result
            }
            StepKind::Analysis { input, extract } => {
                StepResult::ok(step, analyze(state, &step.description, input, extract))
            }
            StepKind::Note { level, message } => {
                let message = resolve(state, message);
                log_message(*level, &step.id, &message);
                StepResult::ok(step, json!({"level": level, "message": message}))
            }
        }
    }

    async fn run_action(
        &self,
        state: &mut ExecutionState,
        step: &Step,
        action: &Action,
    ) -> StepResult {
        match action {
            Action::Command {
                command, assign_to, ..
            } => {
                let mut result = self
                    .execute_command_step(state, step, command, assign_to.as_deref())
                    .await;
                result.step_type = step.kind.type_name().to_string();
                result
            }
            Action::Log { message, level } => {
                let message = resolve(state, message);
                log_message(*level, &step.id, &message);
                StepResult::ok(step, json!({"level": level, "message": message}))
            }
        }
    }

    async fn execute_command_step(
        &self,
        state: &mut ExecutionState,
        step: &Step,
        template: &str,
        assign_to: Option<&str>,
    ) -> StepResult {
        match self.attempt_command(state, template).await {
            CommandAttempt::Blocked { command, level } => {
                warn!(step_id = %step.id, %command, "Blocked high-risk command in safe mode");
                let mut result = StepResult::failed(
                    step,
                    ErrorKind::RiskBlocked,
                    DebuggerError::RiskBlocked { level }.to_string(),
                );
                result.risk_level = Some(level);
                result.output = json!({ "command": command });
                result
            }
            CommandAttempt::Aborted {
                command,
                level,
                error,
            } => {
                let mut result = StepResult::failed(
                    step,
                    ErrorKind::Execution,
                    DebuggerError::from(error).to_string(),
                );
                result.risk_level = Some(level);
                result.output = json!({ "command": command });
                result
            }
            CommandAttempt::Finished {
                command,
                level,
                output,
            } => {
                let combined = output.combined();
                let mut result = if output.success {
                    if let Some(name) = assign_to {
                        state.heap.tool_outputs.insert(
                            name.to_string(),
                            ToolOutput {
                                command: command.clone(),
                                output: combined.clone(),
                                timestamp: Utc::now(),
                            },
                        );
                        state.frame.insert(name.to_string(), combined.clone());
                    }
                    StepResult::ok(step, JsonValue::String(combined))
                } else {
                    let status = output
                        .exit_code
                        .map(|code| code.to_string())
                        .unwrap_or_else(|| "signal".to_string());
                    let mut failed = StepResult::failed(
                        step,
                        ErrorKind::Execution,
                        DebuggerError::Execution(format!(
                            "command exited with status {}: {}",
                            status,
                            output.stderr.trim()
                        ))
                        .to_string(),
                    );
                    failed.output = JsonValue::String(combined);
                    failed
                };
                result.risk_level = Some(level);
                result.stdout = Some(output.stdout);
                result.stderr = Some(output.stderr);
                result.exit_code = output.exit_code;
                result
            }
        }
    }

    /// Resolve, risk-gate and run a command template without touching any state
    pub async fn attempt_command(&self, state: &ExecutionState, template: &str) -> CommandAttempt {
        let command = resolve(state, template);
        let level = classify(&command);

        if is_blocked(self.options.risk_level, level) {
            return CommandAttempt::Blocked { command, level };
        }

        if self.options.debug_mode {
            info!(%command, risk = %level, "Running command");
        }

        match self
            .executor
            .run(
                &command,
                Duration::from_millis(self.options.timeout_ms),
                self.options.memory_limit_bytes,
            )
            .await
        {
            Ok(output) => CommandAttempt::Finished {
                command,
                level,
                output,
            },
            Err(error) => CommandAttempt::Aborted {
                command,
                level,
                error,
            },
        }
    }
}

fn check_condition(state: &ExecutionState, condition: &Condition) -> bool {
    match condition {
        Condition::EqualityCheck { variable, value } => {
            operand(state, variable) == resolve(state, value)
        }
        Condition::ContainsCheck { variable, value } => {
            operand(state, variable).contains(resolve(state, value).as_str())
        }
        Condition::BooleanCheck { expression } => is_truthy(&operand(state, expression)),
    }
}

/// Templates are resolved; a bare name reads that variable if it exists, otherwise
/// the text is taken literally.
fn operand(state: &ExecutionState, text: &str) -> String {
    if text.contains('$') {
        return resolve(state, text);
    }
    get_variable(state, text.trim())
        .map(|(value, _)| value)
        .unwrap_or_else(|| text.to_string())
}

pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !FALSY_VALUES.contains(&value.to_lowercase().as_str())
}

fn analyze(
    state: &ExecutionState,
    description: &str,
    input: &[String],
    extract: &[String],
) -> JsonValue {
    let inputs: Map<String, JsonValue> = input
        .iter()
        .map(|name| {
            let value = get_variable(state, name)
                .map(|(value, _)| JsonValue::String(value))
                .unwrap_or(JsonValue::Null);
            (name.clone(), value)
        })
        .collect();

    let text = resolve(state, description);
    let extracted: Map<String, JsonValue> = extract
        .iter()
        .map(|name| {
            let value = extract_value(&text, name)
                .map(JsonValue::String)
                .unwrap_or(JsonValue::Null);
            (name.clone(), value)
        })
        .collect();

    json!({"inputs": inputs, "extracted": extracted})
}

/// Find `name: value` or `name = value` in free text. Quoted values may contain spaces.
pub fn extract_value(text: &str, name: &str) -> Option<String> {
    let pattern = format!(
        r#"(?i)\b{}\s*[:=]\s*(?:"([^"]*)"|'([^']*)'|([^\s,;]+))"#,
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().to_string())
}

fn log_message(level: NoteLevel, step_id: &str, message: &str) {
    match level {
        NoteLevel::Info => info!(step_id, "{}", message),
        NoteLevel::Warning => warn!(step_id, "{}", message),
        NoteLevel::Error => error!(step_id, "{}", message),
    }
}

//! Tests for single-step evaluation

use serde_json::json;

use super::helpers::{options, single};
use crate::interpreter::evaluator::{extract_value, is_truthy};
use crate::interpreter::{CommandExecutor, ErrorKind, ExecutionState, StepEvaluator};
use crate::program::{Program, Step};
use crate::types::RiskLevel;

fn first_step(program: &Program) -> &Step {
    &program.procedures[0].steps[0]
}

async fn evaluate_with(
    state: &mut ExecutionState,
    step: serde_json::Value,
    risk_level: RiskLevel,
) -> crate::interpreter::StepResult {
    let program = single(json!([step]));
    let executor = CommandExecutor::default();
    let options = options(risk_level);
    StepEvaluator::new(&executor, &options)
        .evaluate(state, first_step(&program))
        .await
}

async fn evaluate(state: &mut ExecutionState, step: serde_json::Value) -> crate::interpreter::StepResult {
    evaluate_with(state, step, RiskLevel::Medium).await
}

fn empty_state() -> ExecutionState {
    ExecutionState::new(&single(json!([])))
}

#[tokio::test]
async fn test_note_resolves_message_and_records_history() {
    let mut state = empty_state();
    state.frame.insert("who".to_string(), "world".to_string());

    let result = evaluate(
        &mut state,
        json!({"id": "n1", "type": "note", "level": "warning", "message": "hello $who"}),
    )
    .await;

    assert!(result.success);
    assert_eq!(result.step_type, "note");
    assert_eq!(result.output, json!({"level": "warning", "message": "hello world"}));
    assert_eq!(state.execution_history.len(), 1);
    assert_eq!(state.execution_history[0].step_id, "n1");
    assert!(state.execution_history[0].success);
}

#[tokio::test]
async fn test_assignment_to_frame() {
    let mut state = empty_state();
    state.frame.insert("env".to_string(), "prod".to_string());

    let result = evaluate(
        &mut state,
        json!({"id": "a1", "type": "assignment", "assign_to": "target", "value": "db-$env"}),
    )
    .await;

    assert!(result.success);
    assert_eq!(state.frame.get("target").map(String::as_str), Some("db-prod"));
    assert!(state.memory.persistent_vars.is_empty());
}

#[tokio::test]
async fn test_assignment_to_memory_uses_name_then_id() {
    let mut state = empty_state();

    evaluate(
        &mut state,
        json!({"id": "a1", "type": "assignment", "assign_to": "memory", "name": "region", "value": "eu"}),
    )
    .await;
    evaluate(
        &mut state,
        json!({"id": "a2", "type": "assignment", "assign_to": "global", "value": "42"}),
    )
    .await;

    assert_eq!(state.memory.persistent_vars.get("region").map(String::as_str), Some("eu"));
    assert_eq!(state.memory.persistent_vars.get("a2").map(String::as_str), Some("42"));
    assert!(state.frame.is_empty());
}

#[tokio::test]
async fn test_conditional_takes_true_branch() {
    let mut state = empty_state();
    state.frame.insert("status".to_string(), "active".to_string());

    let result = evaluate(
        &mut state,
        json!({
            "id": "c1",
            "type": "conditional",
            "condition": {"type": "equality_check", "variable": "status", "value": "active"},
            "true_branch": {"type": "log", "message": "is $status"},
            "false_branch": {"type": "log", "message": "not active"}
        }),
    )
    .await;

    assert!(result.success);
    assert_eq!(result.step_type, "conditional");
    assert_eq!(result.output["condition"], json!(true));
    assert_eq!(result.output["branch"], json!("true"));
    assert_eq!(result.output["result"]["message"], json!("is active"));
}

#[tokio::test]
async fn test_equality_check_compares_exact_strings() {
    let mut state = empty_state();
    state.frame.insert("status".to_string(), "active ".to_string());

    let step = |value: &str| {
        json!({
            "id": "c1",
            "type": "conditional",
            "condition": {"type": "equality_check", "variable": "status", "value": value},
            "true_branch": {"type": "log", "message": "match"},
            "false_branch": {"type": "log", "message": "differs"}
        })
    };

    let padded = evaluate(&mut state, step("active")).await;
    assert_eq!(padded.output["condition"], json!(false));
    assert_eq!(padded.output["branch"], json!("false"));

    let exact = evaluate(&mut state, step("active ")).await;
    assert_eq!(exact.output["condition"], json!(true));
}

#[tokio::test]
async fn test_conditional_without_matching_branch_is_a_no_op() {
    let mut state = empty_state();

    let result = evaluate(
        &mut state,
        json!({
            "id": "c1",
            "type": "conditional",
            "condition": {"type": "contains_check", "variable": "$missing", "value": "x"},
            "true_branch": {"type": "log", "message": "never"}
        }),
    )
    .await;

    assert!(result.success);
    assert_eq!(result.output, json!({"condition": false, "branch": null}));
}

#[tokio::test]
async fn test_boolean_check_truthiness() {
    let mut state = empty_state();
    state.frame.insert("enabled".to_string(), "off".to_string());

    let result = evaluate(
        &mut state,
        json!({
            "id": "c1",
            "type": "conditional",
            "condition": {"type": "boolean_check", "expression": "$enabled"},
            "true_branch": {"type": "log", "message": "on"},
            "false_branch": {"type": "log", "message": "off"}
        }),
    )
    .await;

    assert_eq!(result.output["branch"], json!("false"));
    assert!(is_truthy("yes"));
    assert!(is_truthy("1"));
    assert!(!is_truthy("  "));
    assert!(!is_truthy("FALSE"));
    assert!(!is_truthy("None"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_assigns_output() {
    let mut state = empty_state();

    let result = evaluate(
        &mut state,
        json!({"id": "s1", "type": "command", "tool": "shell", "command": "echo hi", "assign_to": "greeting"}),
    )
    .await;

    assert!(result.success);
    assert_eq!(result.output, json!("hi"));
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.risk_level, Some(RiskLevel::Low));
    assert_eq!(state.frame.get("greeting").map(String::as_str), Some("hi"));
    let tool_output = &state.heap.tool_outputs["greeting"];
    assert_eq!(tool_output.command, "echo hi");
    assert_eq!(tool_output.output, "hi");
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_command_assigns_nothing() {
    let mut state = empty_state();

    let result = evaluate(
        &mut state,
        json!({"id": "s1", "type": "command", "command": "echo partial; exit 2", "assign_to": "out"}),
    )
    .await;

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::Execution));
    assert_eq!(result.exit_code, Some(2));
    assert_eq!(result.stdout.as_deref().map(str::trim), Some("partial"));
    assert!(state.frame.is_empty());
    assert!(state.heap.tool_outputs.is_empty());
    assert!(!state.execution_history[0].success);
}

#[tokio::test]
async fn test_high_risk_command_blocked_in_safe_mode() {
    let mut state = empty_state();

    let result = evaluate_with(
        &mut state,
        json!({"id": "s1", "type": "command", "command": "rm -rf /tmp/does-not-matter"}),
        RiskLevel::Low,
    )
    .await;

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::RiskBlocked));
    assert_eq!(result.risk_level, Some(RiskLevel::High));
    assert!(result.exit_code.is_none());
    assert_eq!(state.execution_history.len(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_choice_runs_first_option() {
    let mut state = empty_state();

    let result = evaluate(
        &mut state,
        json!({
            "id": "ch1",
            "type": "choice",
            "options": [
                {"description": "fast path", "action": {"type": "command", "command": "echo first", "assign_to": "picked"}},
                {"description": "slow path", "action": {"type": "command", "command": "echo second", "assign_to": "picked"}}
            ]
        }),
    )
    .await;

    assert!(result.success);
    assert_eq!(result.step_type, "choice");
    assert_eq!(result.output["chosen_option"], json!(0));
    assert_eq!(result.output["description"], json!("fast path"));
    assert_eq!(state.frame.get("picked").map(String::as_str), Some("first"));
}

#[tokio::test]
async fn test_choice_without_options_fails() {
    let mut state = empty_state();

    let result = evaluate(&mut state, json!({"id": "ch1", "type": "choice", "options": []})).await;

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::Execution));
}

#[tokio::test]
async fn test_analysis_gathers_inputs_and_extracts_values() {
    let mut state = empty_state();
    state.frame.insert("report".to_string(), "disk usage high".to_string());
    state.frame.insert("usage".to_string(), "91%".to_string());

    let result = evaluate(
        &mut state,
        json!({
            "id": "an1",
            "type": "analysis",
            "description": "usage: $usage, owner = \"ops team\"",
            "input": ["report", "unknown"],
            "extract": ["usage", "owner", "missing"]
        }),
    )
    .await;

    assert!(result.success);
    assert_eq!(
        result.output,
        json!({
            "inputs": {"report": "disk usage high", "unknown": null},
            "extracted": {"usage": "91%", "owner": "ops team", "missing": null}
        })
    );
}

#[test]
fn test_extract_value_forms() {
    assert_eq!(extract_value("cpu=80 mem=40", "mem"), Some("40".to_string()));
    assert_eq!(extract_value("Name: 'a b'", "name"), Some("a b".to_string()));
    assert_eq!(extract_value("hostname: x", "name"), None);
}

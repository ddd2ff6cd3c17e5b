//! Tests for variable resolution

use chrono::Utc;

use super::helpers::state_with_frame;
use crate::interpreter::resolver::{get_variable, references, resolve, sole_reference};
use crate::interpreter::state::ToolOutput;
use crate::interpreter::VariableSource;

#[test]
fn test_resolves_both_token_forms() {
    let state = state_with_frame(&[("host", "db1"), ("port", "5432")]);
    assert_eq!(resolve(&state, "psql -h $host -p ${port}"), "psql -h db1 -p 5432");
}

#[test]
fn test_unresolved_tokens_are_left_verbatim() {
    let state = state_with_frame(&[("known", "yes")]);
    assert_eq!(
        resolve(&state, "$known $missing ${also_missing}"),
        "yes $missing ${also_missing}"
    );
}

#[test]
fn test_text_without_tokens_is_unchanged() {
    let state = state_with_frame(&[]);
    assert_eq!(resolve(&state, "echo 100% done"), "echo 100% done");
    assert_eq!(resolve(&state, "cost: $5"), "cost: $5");
}

#[test]
fn test_frame_shadows_memory_and_tool_outputs() {
    let mut state = state_with_frame(&[("x", "frame")]);
    state
        .memory
        .persistent_vars
        .insert("x".to_string(), "memory".to_string());
    state.heap.tool_outputs.insert(
        "x".to_string(),
        ToolOutput {
            command: "echo tool".to_string(),
            output: "tool".to_string(),
            timestamp: Utc::now(),
        },
    );

    assert_eq!(
        get_variable(&state, "x"),
        Some(("frame".to_string(), VariableSource::LocalVariable))
    );

    state.frame.remove("x");
    assert_eq!(
        get_variable(&state, "x"),
        Some(("memory".to_string(), VariableSource::PersistentMemory))
    );

    state.memory.persistent_vars.remove("x");
    assert_eq!(
        get_variable(&state, "x"),
        Some(("tool".to_string(), VariableSource::ToolOutput))
    );

    state.heap.tool_outputs.remove("x");
    assert_eq!(get_variable(&state, "x"), None);
}

#[test]
fn test_references_in_order() {
    assert_eq!(
        references("cp $src ${dst}/$src"),
        vec!["src".to_string(), "dst".to_string(), "src".to_string()]
    );
    assert!(references("no variables here").is_empty());
}

#[test]
fn test_sole_reference() {
    assert_eq!(sole_reference("$name"), Some("name"));
    assert_eq!(sole_reference("  ${name} "), Some("name"));
    assert_eq!(sole_reference("$name suffix"), None);
    assert_eq!(sole_reference("name"), None);
}

//! Variable resolution
//!
//! `$name` and `${name}` tokens are looked up in three tiers, first hit wins:
//! 1. the frame
//! 2. persistent memory
//! 3. the output of a command that was `assign_to`'d under that name
//!
//! Tokens that resolve nowhere are left untouched so half-finished programs still run.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::state::ExecutionState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VariableSource {
    LocalVariable,
    PersistentMemory,
    ToolOutput,
    Unknown,
}

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("variable pattern is valid")
    })
}

fn token_name<'t>(caps: &Captures<'t>) -> Option<&'t str> {
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

/// Substitute every resolvable variable token in `text`
pub fn resolve(state: &ExecutionState, text: &str) -> String {
    variable_pattern()
        .replace_all(text, |caps: &Captures| {
            token_name(caps)
                .and_then(|name| get_variable(state, name))
                .map(|(value, _)| value)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Look a variable up with the same precedence as `resolve`
pub fn get_variable(state: &ExecutionState, name: &str) -> Option<(String, VariableSource)> {
    if let Some(value) = state.frame.get(name) {
        return Some((value.clone(), VariableSource::LocalVariable));
    }
    if let Some(value) = state.memory.persistent_vars.get(name) {
        return Some((value.clone(), VariableSource::PersistentMemory));
    }
    state
        .heap
        .tool_outputs
        .get(name)
        .map(|output| (output.output.clone(), VariableSource::ToolOutput))
}

/// Names referenced by `text`, in order of appearance (duplicates kept)
pub fn references(text: &str) -> Vec<String> {
    variable_pattern()
        .captures_iter(text)
        .filter_map(|caps| token_name(&caps).map(str::to_string))
        .collect()
}

/// If `text` is exactly one variable token, its name
pub fn sole_reference(text: &str) -> Option<&str> {
    let text = text.trim();
    let caps = variable_pattern().captures(text)?;
    let whole = caps.get(0)?;
    if whole.start() == 0 && whole.end() == text.len() {
        token_name(&caps)
    } else {
        None
    }
}

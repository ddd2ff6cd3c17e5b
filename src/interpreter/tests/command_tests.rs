//! Tests for the external command executor

#![cfg(unix)]

use std::time::{Duration, Instant};

use crate::errors::ExecError;
use crate::interpreter::CommandExecutor;

const LIMIT: usize = 1024 * 1024;

#[tokio::test]
async fn test_captures_stdout_and_exit_code() {
    let output = CommandExecutor::default()
        .run("echo hi", Duration::from_secs(5), LIMIT)
        .await
        .unwrap();

    assert!(output.success);
    assert_eq!(output.exit_code, Some(0));
    assert_eq!(output.stdout, "hi\n");
    assert_eq!(output.combined(), "hi");
}

#[tokio::test]
async fn test_non_zero_exit_keeps_both_streams() {
    let output = CommandExecutor::default()
        .run("echo out; echo err >&2; exit 3", Duration::from_secs(5), LIMIT)
        .await
        .unwrap();

    assert!(!output.success);
    assert_eq!(output.exit_code, Some(3));
    assert_eq!(output.stdout.trim(), "out");
    assert_eq!(output.stderr.trim(), "err");
    assert_eq!(output.combined(), "out\nerr");
}

#[tokio::test]
async fn test_timeout_kills_the_process() {
    let start = Instant::now();
    let result = CommandExecutor::default()
        .run("sleep 5", Duration::from_millis(200), LIMIT)
        .await;

    assert!(matches!(result, Err(ExecError::Timeout { timeout_ms: 200 })));
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_output_over_limit_is_rejected() {
    let result = CommandExecutor::default()
        .run("head -c 4096 /dev/zero", Duration::from_secs(5), 1024)
        .await;

    assert!(matches!(
        result,
        Err(ExecError::OutputOverflow { limit: 1024 })
    ));
}

#[tokio::test]
async fn test_output_at_limit_is_accepted() {
    let output = CommandExecutor::default()
        .run("printf abcd", Duration::from_secs(5), 4)
        .await
        .unwrap();

    assert_eq!(output.stdout, "abcd");
}

#[tokio::test]
async fn test_missing_shell_fails_to_spawn() {
    let executor = CommandExecutor::new(&crate::config::ExecutorConfig {
        shell: "/nonexistent/shell".to_string(),
        shell_arg: "-c".to_string(),
    });
    let result = executor.run("echo hi", Duration::from_secs(1), LIMIT).await;

    assert!(matches!(result, Err(ExecError::Spawn(_))));
}

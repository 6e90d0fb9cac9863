//! Tests for external command execution via search path lookup.
//!
//! These verify that pash falls back to executables when no function or
//! builtin matches a command name, and that external programs behave like
//! any other pipeline stage.

#![cfg(unix)]

use pash_kernel::{
    quote_arguments, ErrorCategory, Kernel, KernelConfig, PipelineState, Value, LAST_EXIT_CODE,
};

fn repl_kernel() -> Kernel {
    Kernel::new(KernelConfig::repl()).expect("Failed to create kernel")
}

// ============================================================================
// Argument quoting
// ============================================================================

#[test]
fn quoting_wraps_arguments_with_spaces() {
    let args: Vec<String> = ["a b", "\"c d\"", "e"].iter().map(|s| s.to_string()).collect();
    assert_eq!(quote_arguments(&args), r#""a b" "c d" e"#);
}

// ============================================================================
// Basic External Command Tests
// ============================================================================

#[tokio::test]
async fn external_command_basic() {
    let kernel = repl_kernel();
    let result = kernel.execute("true").await.unwrap();
    assert!(result.ok(), "true should succeed: {:?}", result);
    assert!(result.errors.is_empty());
    assert_eq!(kernel.get_var(LAST_EXIT_CODE).await, Some(Value::from(0)));
}

#[tokio::test]
async fn output_lines_become_strings() {
    let kernel = repl_kernel();
    let result = kernel
        .execute("sh -c 'echo one; echo two' | ForEach-Object { $_.ToUpper() }")
        .await
        .unwrap();
    assert_eq!(result.output_strings(), ["ONE", "TWO"]);
}

#[tokio::test]
async fn input_values_are_written_to_stdin() {
    let kernel = repl_kernel();
    let result = kernel.execute("1..3 | ForEach-Object { $_ * 2 } | cat").await.unwrap();
    assert_eq!(result.output_strings(), ["2", "4", "6"]);
}

#[tokio::test]
async fn nonzero_exit_is_one_error_record() {
    let kernel = repl_kernel();
    let result = kernel.execute("sh -c 'exit 4'; 'next'").await.unwrap();
    assert_eq!(result.state, PipelineState::Completed);
    assert_eq!(result.output_strings(), ["next"]);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].category, ErrorCategory::ExternalProcess);
    assert_eq!(kernel.get_var(LAST_EXIT_CODE).await, Some(Value::from(4)));
}

#[tokio::test]
async fn last_exit_code_is_visible_to_scripts() {
    let kernel = repl_kernel();
    let result = kernel.execute("sh -c 'exit 2'; $LASTEXITCODE").await.unwrap();
    assert_eq!(result.output_strings(), ["2"]);
}

#[tokio::test]
async fn external_command_not_found() {
    let kernel = repl_kernel();
    let result = kernel
        .execute("definitely_not_a_real_command_12345")
        .await
        .unwrap();
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].category, ErrorCategory::CommandNotFound);
}

#[tokio::test]
async fn empty_search_path_finds_nothing() {
    let kernel = Kernel::new(KernelConfig::named("isolated").with_search_path(vec![])).unwrap();
    let result = kernel.execute("true").await.unwrap();
    assert_eq!(result.errors[0].category, ErrorCategory::CommandNotFound);
    let result = kernel.execute("/bin/sh -c 'echo direct'").await.unwrap();
    assert_eq!(result.output_strings(), ["direct"]);
}

// ============================================================================
// Synchronous output
// ============================================================================

#[tokio::test]
async fn forced_synchronous_output_keeps_order() {
    let kernel = Kernel::new(KernelConfig::repl().with_force_sync_process_output(true)).unwrap();
    let result = kernel
        .execute("'a','b','c' | cat | ForEach-Object { \"<$_>\" }")
        .await
        .unwrap();
    assert_eq!(result.output_strings(), ["<a>", "<b>", "<c>"]);
}

#[tokio::test]
async fn the_flag_is_read_from_the_scope() {
    let kernel = repl_kernel();
    kernel.set_flag("ForceSynchronizeProcessOutput", true).await;
    let result = kernel
        .execute("$ForceSynchronizeProcessOutput; 'x' | cat")
        .await
        .unwrap();
    assert_eq!(result.output_strings(), ["True", "x"]);
}

#[tokio::test]
async fn cancel_kills_a_running_program() {
    let kernel = repl_kernel();
    let token = kernel.cancel_token();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        token.cancel();
    });
    let started = std::time::Instant::now();
    let result = kernel.execute("sleep 30").await.unwrap();
    canceller.await.unwrap();
    assert_eq!(result.state, PipelineState::Stopped);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}

//! Integration tests for the pash REPL.
//!
//! These tests run scripts through the REPL and verify behavior.

use pash_repl::{needs_more_input, LineOutcome, Repl};
use rstest::rstest;

/// Run lines through one REPL, joining continuation lines the way the
/// interactive loop does, and collect everything it prints.
fn run_script(script: &str) -> Vec<String> {
    let mut repl = Repl::new().expect("Failed to create REPL");
    let mut outputs = Vec::new();
    let mut block = String::new();

    for line in script.lines() {
        let trimmed = line.trim();
        if block.is_empty() && (trimmed.is_empty() || trimmed.starts_with('#')) {
            continue;
        }
        if !block.is_empty() {
            block.push('\n');
        }
        block.push_str(trimmed);
        if needs_more_input(&block) {
            continue;
        }
        match repl.process_line(&block) {
            Ok(LineOutcome::Print(output)) => outputs.push(output),
            Ok(LineOutcome::Silent) => {}
            Ok(LineOutcome::Exit) => break,
            Err(e) => outputs.push(format!("ERROR: {}", e)),
        }
        block.clear();
    }

    outputs
}

/// Helper to check if output contains expected strings.
fn outputs_contain(outputs: &[String], expected: &[&str]) -> bool {
    let joined = outputs.join("\n");
    expected.iter().all(|e| joined.contains(e))
}

// ============================================================================
// Session state
// ============================================================================

#[test]
fn variables_persist_between_lines() {
    let outputs = run_script(r#"
        $x = 42
        $x + 1
    "#);
    assert_eq!(outputs, ["43"]);
}

#[test]
fn functions_persist_between_lines() {
    let outputs = run_script(r#"
        function Greet($name) {
            "Hello $name"
        }
        Greet 'World'
    "#);
    assert_eq!(outputs, ["Hello World"]);
}

#[test]
fn reset_clears_the_session() {
    let outputs = run_script(r#"
        $x = 'kept'
        /reset
        $x -eq $null
    "#);
    assert!(outputs_contain(&outputs, &["Session reset", "True"]));
}

#[test]
fn vars_lists_user_variables() {
    let outputs = run_script(r#"
        $answer = 42
        /vars
    "#);
    assert!(outputs_contain(&outputs, &["$answer = 42"]), "{:?}", outputs);
}

// ============================================================================
// Values and errors
// ============================================================================

#[rstest]
#[case::replication(r#""red" * 3"#, "redredred")]
#[case::hex_string("12 * \"0xabc\"", "32976")]
#[case::double_division("10 / 3", "3.33333333333333")]
#[case::decimal("-10.300D * 12", "-123.600")]
#[case::pipeline("@(1,2,3) | Write-Output", "1\n2\n3")]
fn prints_values(#[case] line: &str, #[case] expected: &str) {
    assert_eq!(run_script(line), [expected]);
}

#[test]
fn errors_follow_values() {
    let outputs = run_script("1, 0, 2 | ForEach-Object { 2 / $_ }");
    assert_eq!(outputs.len(), 1);
    let lines: Vec<&str> = outputs[0].lines().collect();
    assert_eq!(&lines[..2], ["2", "1"]);
    assert!(lines[2].contains("DivideByZero"), "{:?}", lines);
}

#[test]
fn parse_errors_are_printed_not_fatal() {
    let outputs = run_script(r#"
        1 + )
        'still running'
    "#);
    assert_eq!(outputs.len(), 2);
    assert!(outputs[0].starts_with("Error:"), "{:?}", outputs);
    assert_eq!(outputs[1], "still running");
}

#[test]
fn silent_lines_print_nothing() {
    assert!(run_script("$quiet = 1").is_empty());
}

// ============================================================================
// Meta commands
// ============================================================================

#[test]
fn ast_mode_shows_the_tree() {
    let outputs = run_script(r#"
        /ast
        "red" * 3
    "#);
    assert_eq!(outputs, ["AST mode: ON", r#"(* "red" 3)"#]);
}

#[test]
fn json_mode_prints_results_as_json() {
    let outputs = run_script(r#"
        /json
        1, 'two'
    "#);
    assert_eq!(outputs[0], "JSON output: ON");
    let parsed: serde_json::Value = serde_json::from_str(&outputs[1]).expect("valid JSON");
    assert_eq!(parsed["output"][0], 1);
    assert_eq!(parsed["output"][1], "two");
}

#[test]
fn sync_toggles_the_flag() {
    let outputs = run_script(r#"
        /sync
        $ForceSynchronizeProcessOutput
        /sync
        $ForceSynchronizeProcessOutput
    "#);
    assert_eq!(
        outputs,
        [
            "Synchronous process output: ON",
            "True",
            "Synchronous process output: OFF",
            "False",
        ]
    );
}

#[test]
fn builtins_are_listed() {
    let outputs = run_script("/builtins");
    assert!(outputs_contain(&outputs, &["Write-Output", "ForEach-Object", "Where-Object"]));
}

#[rstest]
#[case::slash("/quit")]
#[case::short("/q")]
#[case::shell_style("exit")]
fn quit_ends_the_session(#[case] command: &str) {
    let mut repl = Repl::new().expect("Failed to create REPL");
    assert_eq!(repl.process_line(command).unwrap(), LineOutcome::Exit);
}

#[test]
fn unknown_meta_command() {
    let outputs = run_script("/frobnicate");
    assert!(outputs_contain(&outputs, &["Unknown command: /frobnicate"]));
}

#[test]
fn help_mentions_the_builtins() {
    let outputs = run_script("help");
    assert!(outputs_contain(&outputs, &["pash REPL", "ForEach-Object", "/json"]));
}

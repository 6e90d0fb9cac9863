//! Parser tests: insta snapshots of the S-expression rendering of the AST.

use insta::assert_snapshot;
use pash_kernel::ast::sexpr::format_program;
use pash_kernel::parser::parse;
use rstest::rstest;

fn sexpr(input: &str) -> String {
    let program = parse(input).unwrap_or_else(|errors| {
        let error_msg = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        panic!("Parse error for {:?}: {}", input, error_msg);
    });
    format_program(&program)
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

#[test]
fn string_replication() {
    assert_snapshot!(sexpr(r#""red" * 3"#), @r#"(* "red" 3)"#);
}

#[test]
fn negative_decimal_literal() {
    assert_snapshot!(sexpr("-10.300D * 12"), @"(* (- 10.300D) 12)");
}

#[test]
fn comma_list_with_nested_arrays() {
    assert_snapshot!(sexpr("1,2,@(4),,3"), @"(array 1 2 (@ 4) (, 3))");
}

#[test]
fn static_call_and_member() {
    assert_snapshot!(
        sexpr("[Math]::Sqrt(16) + $x.Length"),
        @"(+ (static-call [Math] Sqrt 16) (. $x Length))"
    );
}

#[test]
fn expandable_string_with_subexpression() {
    assert_snapshot!(sexpr(r#""total: $($a + 1)""#), @r#"(str "total: " ($ (+ $a 1)))"#);
}

// =============================================================================
// PIPELINES
// =============================================================================

#[test]
fn array_into_command() {
    assert_snapshot!(
        sexpr("@(1,2,3) | Write-Output"),
        @"(pipe (@ (array 1 2 3)) (cmd Write-Output))"
    );
}

#[test]
fn pipeline_assignment() {
    assert_snapshot!(
        sexpr("$x = 1..3 | Where-Object { $_ -gt 1 }"),
        @"(= $x (pipe (.. 1 3) (cmd Where-Object (block (-gt $_ 1)))))"
    );
}

#[test]
fn alias_after_pipe() {
    assert_snapshot!(sexpr("1..3 | % { $_ }"), @"(pipe (.. 1 3) (cmd % (block $_)))");
}

#[test]
fn invoke_operator() {
    assert_snapshot!(sexpr("& $sb 1 -Verbose"), @"(cmd & $sb 1 -Verbose)");
}

// =============================================================================
// STATEMENTS
// =============================================================================

#[test]
fn if_elseif_else() {
    assert_snapshot!(
        sexpr("if ($a -eq 1) { 'one' } elseif ($a -eq 2) { 'two' } else { 'many' }"),
        @r#"(if ((-eq $a 1) "one") (elseif (-eq $a 2) "two") (else "many"))"#
    );
}

#[test]
fn foreach_loop() {
    assert_snapshot!(
        sexpr("foreach ($n in 1..3) { $n * 2 }"),
        @"(foreach $n (.. 1 3) (* $n 2))"
    );
}

#[test]
fn try_catch_finally() {
    assert_snapshot!(
        sexpr("try { throw 'x' } catch [DivideByZeroException] { $_ } finally { 'done' }"),
        @r#"(try (throw "x") (catch [DivideByZeroException] $_) (finally "done"))"#
    );
}

#[test]
fn statements_one_per_line() {
    assert_snapshot!(sexpr("$a = 1; $a += 2\n$a"), @r"
    (= $a 1)
    (+= $a 2)
    $a
    ");
}

// =============================================================================
// ERRORS
// =============================================================================

#[rstest]
#[case::unclosed_paren("(1 +")]
#[case::unclosed_block("if ($x) { 1")]
#[case::try_without_handlers("try { 1 }")]
#[case::lexer_error("1 + ^")]
#[case::missing_condition("while { 1 }")]
#[case::adjacent_values("1 2")]
#[case::assignment_then_value("$x = 1 2")]
#[case::group_then_value("(1 + 2) 3")]
#[case::adjacent_hash_entries("@{ a = 1 b = 2 }")]
fn parse_errors(#[case] input: &str) {
    assert!(parse(input).is_err(), "Expected error for input: {:?}", input);
}

#[test]
fn lexer_errors_report_position() {
    let source = "$a = 1\n$b = ^";
    let errors = parse(source).unwrap_err();
    assert!(errors[0].lexical);
    assert_eq!(errors[0].line_col(source), (2, 6));
}

//! Pipelines, arrays, functions and the error stream, driven through the kernel.

use pash_kernel::{ErrorCategory, Kernel, KernelConfig, PipelineState};
use rstest::rstest;

fn kernel() -> Kernel {
    Kernel::new(KernelConfig::named("pipelines")).expect("Failed to create kernel")
}

async fn run(source: &str) -> Vec<String> {
    let result = kernel().execute(source).await.unwrap();
    assert!(result.ok(), "{}: {:?}", source, result);
    assert!(result.errors.is_empty(), "{}: {:?}", source, result.errors);
    result.output_strings()
}

// ============================================================================
// Builtins
// ============================================================================

#[rstest]
#[case::write_output("@(1,2,3) | Write-Output", &["1", "2", "3"])]
#[case::echo_alias("echo a b", &["a", "b"])]
#[case::foreach_block("1..3 | ForEach-Object { $_ * 10 }", &["10", "20", "30"])]
#[case::foreach_member("'ab','cde' | % Length", &["2", "3"])]
#[case::foreach_begin_end("1..3 | ForEach-Object -Begin { 'start' } -Process { $_ } -End { 'stop' }", &["start", "1", "2", "3", "stop"])]
#[case::where_block("1..6 | Where-Object { $_ % 2 -eq 0 }", &["2", "4", "6"])]
#[case::question_alias("1..4 | ? { $_ -gt 2 }", &["3", "4"])]
#[case::select_first("1..10 | Select-Object -First 2", &["1", "2"])]
#[case::select_last("1..10 | Select-Object -Last 2", &["9", "10"])]
#[case::select_skip("1..5 | Select-Object -Skip 3", &["4", "5"])]
#[case::sort("3,1,2 | Sort-Object", &["1", "2", "3"])]
#[case::sort_descending("'b','c','a' | Sort-Object -Descending", &["c", "b", "a"])]
#[case::measure_sum("(1..4 | Measure-Object -Sum).Sum", &["10"])]
#[case::measure_count("(1..4 | Measure-Object).Count", &["4"])]
#[case::out_null("1..3 | Out-Null", &[])]
#[case::out_string("'a','b' | Out-String -Stream", &["a", "b"])]
#[tokio::test]
async fn builtins(#[case] source: &str, #[case] expected: &[&str]) {
    assert_eq!(run(source).await, expected);
}

#[tokio::test]
async fn order_is_preserved_through_many_stages() {
    let out = run("1..200 | ForEach-Object { $_ } | Where-Object { $true } | ForEach-Object { $_ }").await;
    let expected: Vec<String> = (1..=200).map(|n| n.to_string()).collect();
    assert_eq!(out, expected);
}

#[tokio::test]
async fn first_stops_an_endless_producer() {
    let out = run("function Forever { $i = 0; while ($true) { $i += 1; $i } }\nForever | Select-Object -First 3").await;
    assert_eq!(out, ["1", "2", "3"]);
}

#[tokio::test]
async fn small_channels_still_preserve_order() {
    let kernel = Kernel::new(KernelConfig::named("tight").with_channel_capacity(1)).unwrap();
    let result = kernel.execute("1..50 | ForEach-Object { $_ } | Sort-Object -Descending | Select-Object -First 3").await.unwrap();
    assert_eq!(result.output_strings(), ["50", "49", "48"]);
}

#[tokio::test]
async fn script_block_stages_keep_their_own_dollar_under() {
    let out = run("1..20 | ForEach-Object { 1 | Out-Null; $_ } | ForEach-Object { 1 | Out-Null; $_ }").await;
    let expected: Vec<String> = (1..=20).map(|n| n.to_string()).collect();
    assert_eq!(out, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn script_block_stages_on_many_workers() {
    let out = run("1..500 | ForEach-Object { 1 | Out-Null; $_ } | Where-Object { 1 | Out-Null; $true } | ForEach-Object { $_ }").await;
    let expected: Vec<String> = (1..=500).map(|n| n.to_string()).collect();
    assert_eq!(out, expected);
}

#[tokio::test]
async fn dollar_under_does_not_leak_out_of_a_pipeline() {
    let out = run("$total = 0\n1..4 | ForEach-Object { $total += $_ }\n$total; $_ -eq $null").await;
    assert_eq!(out, ["10", "True"]);
}

// ============================================================================
// Arrays
// ============================================================================

#[rstest]
#[case::empty_array("@().Count", &["0"])]
#[case::single_array("@(1).Count", &["1"])]
#[case::nested_array_sub("@(@(@('foo'))).Count", &["1"])]
#[case::mixed_commas("$a = 1,2,@(4),,3; $a.Count; $a[2].GetType().Name; $a[3].GetType().Name", &["4", "Object[]", "Object[]"])]
#[case::paren_does_not_wrap("(5).GetType().Name", &["Int32"])]
#[case::subexpr_single("$($null).Count; $(1).GetType().Name; $(1;2).Count", &["0", "Int32", "2"])]
#[case::pipeline_assignment_many("$r = 1..3 | Write-Output; $r.GetType().Name; $r.Count", &["Object[]", "3"])]
#[case::pipeline_assignment_one("$r = 'x' | Write-Output; $r.GetType().Name", &["String"])]
#[case::pipeline_assignment_none("$r = 1 | Out-Null; $r -eq $null", &["True"])]
#[case::output_unrolls_once("@(@(@('foo')), @(@('bar'))) | ForEach-Object { $_.GetType().Name }", &["Object[]", "Object[]"])]
#[case::no_enumerate("Write-Output -NoEnumerate 1,2 | ForEach-Object { $_.Count }", &["2"])]
#[tokio::test]
async fn arrays(#[case] source: &str, #[case] expected: &[&str]) {
    assert_eq!(run(source).await, expected);
}

// ============================================================================
// Functions
// ============================================================================

#[rstest]
#[case::positional("function Add($a, $b) { $a + $b }\nAdd 1 2", &["3"])]
#[case::named_prefix("function Add { param($first, $second = 10) $first + $second }\nAdd -f 5", &["15"])]
#[case::typed_param("function Twice([int]$n) { $n * 2 }\nTwice '21'", &["42"])]
#[case::filter("filter Twice { $_ * 2 }\n1,2,3 | Twice", &["2", "4", "6"])]
#[case::input_variable("function Total { $sum = 0; foreach ($n in $input) { $sum += $n }; $sum }\n1..4 | Total", &["10"])]
#[case::named_blocks("function Sum { begin { $t = 0 } process { $t += $_ } end { $t } }\n1..4 | Sum", &["10"])]
#[case::return_ends_early("function F { 1; return 2; 3 }\nF", &["1", "2"])]
#[case::args_rest("function Rest { $args.Count }\nRest a b c", &["3"])]
#[case::invoke_block("$sb = { param($x) $x + 1 }\n& $sb 41", &["42"])]
#[case::locals_stay_local("$x = 'outer'\nfunction F { $x = 'inner'; $x }\nF; $x", &["inner", "outer"])]
#[tokio::test]
async fn functions(#[case] source: &str, #[case] expected: &[&str]) {
    assert_eq!(run(source).await, expected);
}

// ============================================================================
// Error stream
// ============================================================================

#[tokio::test]
async fn one_record_per_failing_input() {
    let result = kernel()
        .execute("1, 0, 2, 0, 4 | ForEach-Object { 8 / $_ }")
        .await
        .unwrap();
    assert_eq!(result.state, PipelineState::Completed);
    assert_eq!(result.output_strings(), ["8", "4", "2"]);
    assert_eq!(result.errors.len(), 2);
    assert!(result
        .errors
        .iter()
        .all(|e| e.category == ErrorCategory::DivideByZero && !e.terminating));
}

#[tokio::test]
async fn a_failing_stage_keeps_processing() {
    let result = kernel()
        .execute("$m = 1, 'abc', 3 | Measure-Object -Sum; $m.Count; $m.Sum")
        .await
        .unwrap();
    assert_eq!(result.state, PipelineState::Completed);
    assert_eq!(result.output_strings(), ["3", "4"]);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].category, ErrorCategory::InvalidCast);
}

#[tokio::test]
async fn a_failing_stage_is_caught_by_try() {
    let out = run("try { 1, 'abc', 3 | Measure-Object -Sum } catch { 'caught' }").await;
    assert_eq!(out, ["caught"]);
}

#[tokio::test]
async fn write_error_continues() {
    let result = kernel()
        .execute("'a'; Write-Error 'bad thing'; 'b'")
        .await
        .unwrap();
    assert!(result.ok());
    assert_eq!(result.output_strings(), ["a", "b"]);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].message, "bad thing");
}

#[tokio::test]
async fn unknown_commands_are_reported_once() {
    let result = kernel()
        .execute("'before'; Get-DefinitelyMissing 1 2; 'after'")
        .await
        .unwrap();
    assert_eq!(result.output_strings(), ["before", "after"]);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].category, ErrorCategory::CommandNotFound);
    assert_eq!(result.errors[0].target.as_deref(), Some("Get-DefinitelyMissing"));
}

#[tokio::test]
async fn throw_fails_the_script() {
    let result = kernel().execute("'partial'; throw 'boom'; 'never'").await.unwrap();
    assert_eq!(result.state, PipelineState::Failed);
    assert_eq!(result.output_strings(), ["partial"]);
    let failure = result.failure.expect("terminating record");
    assert!(failure.terminating);
    assert_eq!(failure.message, "boom");
}

#[tokio::test]
async fn try_catches_non_terminating_errors() {
    let out = run("try { 1 / 0; 'skipped' } catch [DivideByZeroException] { 'caught' } finally { 'cleanup' }").await;
    assert_eq!(out, ["caught", "cleanup"]);
}

#[tokio::test]
async fn a_throw_inside_a_stage_stops_the_pipeline() {
    let result = kernel()
        .execute("1..5 | ForEach-Object { if ($_ -eq 3) { throw 'three' }; $_ }")
        .await
        .unwrap();
    assert_eq!(result.state, PipelineState::Failed);
    assert_eq!(result.output_strings(), ["1", "2"]);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn cancel_stops_an_endless_loop() {
    let kernel = kernel();
    let token = kernel.cancel_token();
    let mut seen = 0;
    let result = kernel
        .execute_streaming("$i = 0; while ($true) { $i += 1; $i }", &mut |_| {
            seen += 1;
            if seen == 5 {
                token.cancel();
            }
        })
        .await
        .unwrap();
    assert_eq!(result.state, PipelineState::Stopped);
    assert!(result.output.len() >= 5);
}

#[tokio::test]
async fn cancel_stops_every_stage() {
    let kernel = kernel();
    let token = kernel.cancel_token();
    let result = kernel
        .execute_streaming(
            "function Forever { while ($true) { 1 } }\nForever | ForEach-Object { $_ } | Where-Object { $true }",
            &mut |_| token.cancel(),
        )
        .await
        .unwrap();
    assert_eq!(result.state, PipelineState::Stopped);
}

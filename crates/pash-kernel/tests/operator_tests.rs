//! Operator semantics end to end: value and result type of each expression.

use pash_kernel::ast::BinaryOp;
use pash_kernel::ops::binary;
use pash_kernel::{Kernel, KernelConfig, Value};
use rstest::rstest;

fn kernel() -> Kernel {
    Kernel::new(KernelConfig::named("operators")).expect("Failed to create kernel")
}

/// Evaluate `expr` and report its text and short type name.
async fn eval(expr: &str) -> (String, String) {
    let result = kernel()
        .execute(&format!("$r = {}\n$r\n$r.GetType().Name", expr))
        .await
        .unwrap();
    assert!(result.errors.is_empty(), "{}: {:?}", expr, result.errors);
    let out = result.output_strings();
    assert_eq!(out.len(), 2, "{}: {:?}", expr, out);
    (out[0].clone(), out[1].clone())
}

#[rstest]
#[case::string_replication(r#""red" * 3"#, "redredred", "String")]
#[case::hex_string_operand(r#"12 * "0xabc""#, "32976", "Int32")]
#[case::signed_hex_string(r#"12 * "-0xabc""#, "-32976", "Int32")]
#[case::inexact_int_division("10 / 3", "3.33333333333333", "Double")]
#[case::decimal_keeps_scale("-10.300D * 12", "-123.600", "Decimal")]
#[case::long_operand("12 * -10L", "-120", "Int64")]
#[case::double_operand("10.5 * 13", "136.5", "Double")]
#[case::exact_int_division("10 / -10", "-1", "Int32")]
#[case::negative_double_quotient("12 / -10", "-1.2", "Double")]
#[case::decimal_quotient("12 / -10.0D", "-1.2", "Decimal")]
#[case::int_remainder("10 % 3", "1", "Int32")]
#[case::decimal_remainder_hex(r#"10.00D % "0x4""#, "2.00", "Decimal")]
#[case::decimal_remainder("10.00D % 0.33D", "0.10", "Decimal")]
#[case::double_remainder_is_exact("10.0 % 0.33", "0.0999999999999995", "Double")]
#[case::overflow_widens("2147483647 + 1", "2147483648", "Int64")]
#[case::string_left_concatenates(r#""5" + 5"#, "55", "String")]
#[case::number_left_coerces(r#"5 + "5""#, "10", "Int32")]
#[case::replication_truncates(r#""abc" * 2.7"#, "abcabc", "String")]
#[case::doubled_quote_literal("'it''s' + '!'", "it's!", "String")]
#[case::null_left("$null + 3", "3", "Int32")]
#[case::cast_rounds_half_even("[int]2.5", "2", "Int32")]
#[case::cast_rounds_up("[int]3.5", "4", "Int32")]
#[case::comparison_converts_right(r#"7 -eq "7""#, "True", "Boolean")]
#[case::comparison_ignores_case(r#""ABC" -eq "abc""#, "True", "Boolean")]
#[tokio::test]
async fn operators(#[case] expr: &str, #[case] text: &str, #[case] type_name: &str) {
    let (got_text, got_type) = eval(expr).await;
    assert_eq!(got_text, text, "value of {}", expr);
    assert_eq!(got_type, type_name, "type of {}", expr);
}

#[rstest]
#[case::divide_by_zero("1 / 0", "DivideByZero")]
#[case::bad_numeric_string(r#"5 * "five""#, "InvalidCast")]
#[case::hex_overflow(r#"1 + "0xFFFFFFFFFFFFFFFFF""#, "InvalidCast")]
#[case::undefined_pair("@{a=1} - 1", "IncompatibleTypes")]
#[case::replication_overflows("'abc' * 9000000000000000000", "Runtime")]
#[case::sequence_replication_too_large("@(1, 2) * 4000000000", "Runtime")]
#[tokio::test]
async fn operator_errors(#[case] expr: &str, #[case] category: &str) {
    let result = kernel().execute(expr).await.unwrap();
    assert!(result.ok(), "operator errors are not terminating");
    assert_eq!(result.errors.len(), 1, "{}: {:?}", expr, result.errors);
    assert_eq!(result.errors[0].category.to_string(), category);
}

#[tokio::test]
async fn byte_arrays_keep_their_element_type() {
    let result = kernel()
        .execute("(([byte[]]5) * 2).GetType().FullName; (([byte[]]5) * 2).Count")
        .await
        .unwrap();
    assert_eq!(result.output_strings(), ["System.Byte[]", "2"]);
}

#[tokio::test]
async fn record_merge_rejects_duplicate_keys() {
    let result = kernel()
        .execute("$m = @{a=1} + @{b=2}; $m.Count; @{a=1} + @{a=2}")
        .await
        .unwrap();
    assert_eq!(result.output_strings(), ["2"]);
    assert_eq!(result.errors.len(), 1);
}

// =============================================================================
// PROPERTIES
// =============================================================================

fn int_samples() -> Vec<Value> {
    let mut samples: Vec<Value> = [0, 1, -1, 7, -13, 46341, 65536, i32::MAX, i32::MIN]
        .into_iter()
        .map(Value::from)
        .collect();
    samples.extend([3_000_000_000i64, -42, i64::MAX].into_iter().map(Value::from));
    samples
}

#[test]
fn integer_multiplication_commutes() {
    let samples = int_samples();
    for a in &samples {
        for b in &samples {
            let ab = binary(BinaryOp::Mul, a, b).unwrap();
            let ba = binary(BinaryOp::Mul, b, a).unwrap();
            assert_eq!(ab, ba, "{} * {}", a, b);
            assert_eq!(ab.type_tag(), ba.type_tag(), "type of {} * {}", a, b);
        }
    }
}

#[test]
fn replication_length_scales() {
    for s in ["", "a", "abc", "héllo wörld"] {
        let len = s.chars().count();
        for n in 0..6 {
            let out = binary(BinaryOp::Mul, &Value::from(s), &Value::from(n)).unwrap();
            assert_eq!(out.to_string().chars().count(), n as usize * len, "{:?} * {}", s, n);
        }
        let once = binary(BinaryOp::Mul, &Value::from(s), &Value::from(1)).unwrap();
        assert_eq!(once, Value::from(s));
        let none = binary(BinaryOp::Mul, &Value::from(s), &Value::from(-2)).unwrap();
        assert_eq!(none, Value::from(""));
    }
}

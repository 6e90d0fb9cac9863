//! Arithmetic over the numeric tower, plus replication and concatenation.

use bigdecimal::{BigDecimal, Zero};
use pash_types::{ElementType, Payload, Record, Value};

use super::coerce::{int_from_i128, promote, replication_count, to_number, Num};
use super::OperatorError;
use crate::ast::BinaryOp;

/// Longest range `a..b` will materialise.
pub const MAX_RANGE: u64 = 50_000_000;

/// Most elements (or characters) a replication may produce.
pub const MAX_REPLICATION: usize = 50_000_000;

/// Significant digits kept by a non-terminating decimal quotient.
const DECIMAL_DIGITS: u64 = 29;

/// `+ - * / %` once both operands are numbers.
pub fn numeric(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, OperatorError> {
    let (a, b) = promote(to_number(left)?, to_number(right)?)?;
    let result = match op {
        BinaryOp::Add => add(a, b),
        BinaryOp::Sub => sub(a, b),
        BinaryOp::Mul => mul(a, b),
        BinaryOp::Div => div(a, b)?,
        BinaryOp::Rem => rem(a, b)?,
        other => return Err(OperatorError::incompatible(other, left, right)),
    };
    Ok(result.into_value())
}

/// Integer results keep their tier when they fit and widen otherwise:
/// int32 → int64 → double.
fn widen_int(exact: i128, rank: u8) -> Num {
    match (rank, int_from_i128(exact)) {
        (0, Some(n)) => n,
        (_, Some(Num::Int32(n))) => Num::Int64(n as i64),
        (_, Some(n)) => n,
        (_, None) => Num::Double(exact as f64),
    }
}

fn int_pair(a: &Num, b: &Num) -> Option<(i128, i128, u8)> {
    match (a, b) {
        (Num::Int32(x), Num::Int32(y)) => Some((*x as i128, *y as i128, 0)),
        (Num::Int64(x), Num::Int64(y)) => Some((*x as i128, *y as i128, 1)),
        _ => None,
    }
}

fn add(a: Num, b: Num) -> Num {
    if let Some((x, y, rank)) = int_pair(&a, &b) {
        return widen_int(x + y, rank);
    }
    match (a, b) {
        (Num::Decimal(x), Num::Decimal(y)) => Num::Decimal(x + y),
        (x, y) => Num::Double(x.to_f64() + y.to_f64()),
    }
}

fn sub(a: Num, b: Num) -> Num {
    if let Some((x, y, rank)) = int_pair(&a, &b) {
        return widen_int(x - y, rank);
    }
    match (a, b) {
        (Num::Decimal(x), Num::Decimal(y)) => Num::Decimal(x - y),
        (x, y) => Num::Double(x.to_f64() - y.to_f64()),
    }
}

fn mul(a: Num, b: Num) -> Num {
    if let Some((x, y, rank)) = int_pair(&a, &b) {
        return widen_int(x * y, rank);
    }
    match (a, b) {
        (Num::Decimal(x), Num::Decimal(y)) => Num::Decimal(x * y),
        (x, y) => Num::Double(x.to_f64() * y.to_f64()),
    }
}

/// Division: exact integer quotients stay integers, inexact ones become
/// doubles; decimals divide as decimals.
fn div(a: Num, b: Num) -> Result<Num, OperatorError> {
    if b.is_zero() {
        return Err(OperatorError::DivideByZero);
    }
    if let Some((x, y, rank)) = int_pair(&a, &b) {
        if x % y == 0 {
            return Ok(widen_int(x / y, rank));
        }
        return Ok(Num::Double(x as f64 / y as f64));
    }
    Ok(match (a, b) {
        (Num::Decimal(x), Num::Decimal(y)) => Num::Decimal(decimal_quotient(&x, &y)),
        (x, y) => Num::Double(x.to_f64() / y.to_f64()),
    })
}

/// Exact quotients keep the shortest scale; repeating ones are cut to the
/// decimal precision.
fn decimal_quotient(x: &BigDecimal, y: &BigDecimal) -> BigDecimal {
    let quotient = (x / y).with_prec(DECIMAL_DIGITS);
    if quotient.is_zero() {
        return BigDecimal::zero();
    }
    let normalized = quotient.normalized();
    let (_, scale) = normalized.as_bigint_and_exponent();
    if scale < 0 {
        normalized.with_scale(0)
    } else {
        normalized
    }
}

/// Remainder of truncating division, typed like division.
fn rem(a: Num, b: Num) -> Result<Num, OperatorError> {
    if b.is_zero() {
        return Err(OperatorError::DivideByZero);
    }
    if let Some((x, y, rank)) = int_pair(&a, &b) {
        return Ok(widen_int(x % y, rank));
    }
    Ok(match (a, b) {
        (Num::Decimal(x), Num::Decimal(y)) => Num::Decimal(x % y),
        (x, y) => Num::Double(x.to_f64() % y.to_f64()),
    })
}

pub fn negate(n: Num) -> Result<Num, OperatorError> {
    Ok(match n {
        Num::Int32(x) => widen_int(-(x as i128), 0),
        Num::Int64(x) => widen_int(-(x as i128), 1),
        Num::Double(x) => Num::Double(-x),
        Num::Decimal(x) => Num::Decimal(-x),
    })
}

pub fn replicate_string(left: &Value, right: &Value) -> Result<Value, OperatorError> {
    let count = replication_count(right)?;
    let text = left.as_str().unwrap_or_default();
    replicated_len(text.len(), count)?;
    Ok(Value::from(text.repeat(count)))
}

/// Repeat a sequence's elements, keeping its declared element type.
pub fn replicate_sequence(left: &Value, right: &Value) -> Result<Value, OperatorError> {
    let count = replication_count(right)?;
    let Some(seq) = left.as_sequence() else {
        return Err(OperatorError::incompatible(BinaryOp::Mul, left, right));
    };
    let total = replicated_len(seq.len(), count)?;
    let mut elements = Vec::with_capacity(total);
    while elements.len() < total {
        elements.extend(seq.iter().cloned());
    }
    Ok(Value::typed_sequence(elements, seq.element_type()))
}

fn replicated_len(len: usize, count: usize) -> Result<usize, OperatorError> {
    len.checked_mul(count)
        .filter(|total| *total <= MAX_REPLICATION)
        .ok_or_else(|| {
            OperatorError::InvalidArgument(format!(
                "replicating {} items {} times is too large",
                len, count
            ))
        })
}

/// `seq + x` appends `x` (or its elements, when it is a sequence). The
/// element type survives when every new element fits it.
pub fn append(left: &Value, right: &Value) -> Value {
    let (mut elements, element) = match left.as_sequence() {
        Some(seq) => (seq.elements().to_vec(), seq.element_type()),
        None => (vec![left.clone()], ElementType::Object),
    };
    let added = match right.payload() {
        Payload::Sequence(seq) => seq.elements().to_vec(),
        _ => vec![right.clone()],
    };
    let element = if added.iter().all(|v| element.admits(v)) {
        element
    } else {
        ElementType::Object
    };
    elements.extend(added);
    Value::typed_sequence(elements, element)
}

pub fn merge_records(left: &Value, right: &Value) -> Result<Value, OperatorError> {
    let (Some(a), Some(b)) = (left.as_record(), right.as_record()) else {
        return Err(OperatorError::incompatible(BinaryOp::Add, left, right));
    };
    let mut merged: Record = a.clone();
    for (key, value) in b.iter() {
        if merged.contains_key(key) {
            return Err(OperatorError::InvalidArgument(format!(
                "duplicate key '{}' in hashtable addition",
                key
            )));
        }
        merged.insert(key.clone(), value.clone());
    }
    Ok(Value::record(merged))
}

/// `a..b`: int32 values from `a` to `b` inclusive, counting down when
/// `a > b`.
pub fn range(left: &Value, right: &Value) -> Result<Value, OperatorError> {
    let bound = |v: &Value| -> Result<i32, OperatorError> {
        to_number(v)?
            .to_i64_rounded()
            .and_then(|n| i32::try_from(n).ok())
            .ok_or_else(|| OperatorError::invalid_cast(v.to_string(), "System.Int32"))
    };
    let (start, end) = (bound(left)?, bound(right)?);
    if start.abs_diff(end) as u64 >= MAX_RANGE {
        return Err(OperatorError::InvalidArgument(format!(
            "range {}..{} is too large",
            start, end
        )));
    }
    let elements: Vec<Value> = if start <= end {
        (start..=end).map(Value::from).collect()
    } else {
        (end..=start).rev().map(Value::from).collect()
    };
    Ok(Value::sequence(elements))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pash_types::{format_decimal, TypeTag};
    use std::str::FromStr;

    fn dec(s: &str) -> Value {
        Value::from(BigDecimal::from_str(s).unwrap())
    }

    fn num(op: BinaryOp, l: Value, r: Value) -> Value {
        numeric(op, &l, &r).unwrap()
    }

    #[test]
    fn int32_overflow_widens_to_int64() {
        let v = num(BinaryOp::Mul, Value::from(i32::MAX), Value::from(2));
        assert_eq!(v, Value::from(i32::MAX as i64 * 2));
    }

    #[test]
    fn int64_overflow_widens_to_double() {
        let v = num(BinaryOp::Add, Value::from(i64::MAX), Value::from(1i64));
        assert_eq!(v.type_tag(), TypeTag::Double);
    }

    #[test]
    fn exact_integer_division_stays_integer() {
        assert_eq!(num(BinaryOp::Div, Value::from(10), Value::from(-10)), Value::from(-1));
        assert_eq!(num(BinaryOp::Div, Value::from(12), Value::from(-10)), Value::from(-1.2));
    }

    #[test]
    fn decimal_division_keeps_short_scale() {
        let v = num(BinaryOp::Div, Value::from(12), dec("-10.0"));
        let Payload::Decimal(d) = v.payload() else {
            panic!("expected decimal, got {:?}", v);
        };
        assert_eq!(format_decimal(d), "-1.2");
    }

    #[test]
    fn decimal_remainder_keeps_scale() {
        let v = num(BinaryOp::Rem, dec("10.00"), Value::from("0x4"));
        assert_eq!(v.to_string(), "2.00");
        let v = num(BinaryOp::Rem, dec("10.00"), dec("0.33"));
        assert_eq!(v.to_string(), "0.10");
    }

    #[test]
    fn division_by_zero() {
        assert_eq!(
            numeric(BinaryOp::Div, &Value::from(1), &Value::from(0)),
            Err(OperatorError::DivideByZero)
        );
        assert_eq!(
            numeric(BinaryOp::Rem, &Value::from(1.5), &Value::from(0.0)),
            Err(OperatorError::DivideByZero)
        );
    }

    #[test]
    fn append_keeps_element_type_when_it_fits() {
        let bytes = Value::typed_sequence(vec![Value::from(1u8)], ElementType::Byte);
        assert_eq!(
            append(&bytes, &Value::from(2u8)).type_tag(),
            TypeTag::Array(ElementType::Byte)
        );
        assert_eq!(
            append(&bytes, &Value::from("x")).type_tag(),
            TypeTag::Array(ElementType::Object)
        );
    }

    #[test]
    fn ranges_count_both_ways() {
        let up = range(&Value::from(1), &Value::from(3)).unwrap();
        assert_eq!(up.to_string(), "1 2 3");
        let down = range(&Value::from(3), &Value::from(1)).unwrap();
        assert_eq!(down.to_string(), "3 2 1");
    }

    #[test]
    fn duplicate_record_keys_are_rejected() {
        let mut a = Record::new();
        a.insert("k", Value::from(1));
        let mut b = Record::new();
        b.insert("K", Value::from(2));
        assert!(merge_records(&Value::record(a), &Value::record(b)).is_err());
    }

    #[test]
    fn oversized_replication_is_rejected() {
        let huge = Value::from(9_000_000_000_000_000_000i64);
        assert!(matches!(
            replicate_string(&Value::from("abc"), &huge),
            Err(OperatorError::InvalidArgument(_))
        ));
        let pair = Value::sequence(vec![Value::from(1), Value::from(2)]);
        assert!(matches!(
            replicate_sequence(&pair, &huge),
            Err(OperatorError::InvalidArgument(_))
        ));
        assert!(replicate_string(&Value::from(""), &huge).is_ok());
        let empty = replicate_sequence(&Value::sequence(vec![]), &huge).unwrap();
        assert_eq!(empty.as_sequence().map(|s| s.len()), Some(0));
    }
}

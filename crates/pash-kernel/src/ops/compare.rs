//! Comparison operators.
//!
//! Strings compare case-insensitively. The right operand is converted
//! toward the left operand's type before comparing. A sequence on the left
//! turns the comparison into a filter over its elements.

use std::cmp::Ordering;

use pash_types::{Payload, TypeClass, Value};
use regex::RegexBuilder;

use super::coerce::{promote, to_number, Num};
use super::OperatorError;
use crate::ast::BinaryOp;

pub fn apply(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, OperatorError> {
    match op {
        BinaryOp::Contains | BinaryOp::NotContains => {
            let found = contains(left, right);
            Ok(Value::from(found == (op == BinaryOp::Contains)))
        }
        BinaryOp::In | BinaryOp::NotIn => {
            let found = contains(right, left);
            Ok(Value::from(found == (op == BinaryOp::In)))
        }
        _ => match left.as_sequence() {
            Some(seq) => {
                let mut kept = Vec::new();
                for item in seq.iter() {
                    if scalar(op, item, right)? {
                        kept.push(item.clone());
                    }
                }
                Ok(Value::sequence(kept))
            }
            None => scalar(op, left, right).map(Value::from),
        },
    }
}

fn scalar(op: BinaryOp, left: &Value, right: &Value) -> Result<bool, OperatorError> {
    Ok(match op {
        BinaryOp::Eq => equals(left, right),
        BinaryOp::Ne => !equals(left, right),
        BinaryOp::Gt => compare(left, right)? == Ordering::Greater,
        BinaryOp::Ge => compare(left, right)? != Ordering::Less,
        BinaryOp::Lt => compare(left, right)? == Ordering::Less,
        BinaryOp::Le => compare(left, right)? != Ordering::Greater,
        BinaryOp::Like => like(&left.to_string(), &right.to_string())?,
        BinaryOp::NotLike => !like(&left.to_string(), &right.to_string())?,
        BinaryOp::Match => matches(&left.to_string(), &right.to_string())?,
        BinaryOp::NotMatch => !matches(&left.to_string(), &right.to_string())?,
        other => {
            return Err(OperatorError::incompatible(other, left, right));
        }
    })
}

/// Equality with the right operand converted to the left's type.
/// Conversions that fail compare unequal.
pub fn equals(left: &Value, right: &Value) -> bool {
    match (left.type_class(), right.type_class()) {
        (TypeClass::Null, _) | (_, TypeClass::Null) => left.is_null() && right.is_null(),
        (TypeClass::String, _) => left
            .to_string()
            .to_lowercase()
            .eq(&right.to_string().to_lowercase()),
        (TypeClass::Bool, _) => left.is_truthy() == right.is_truthy(),
        (l, _) if l.is_numeric() => match (to_number(left), to_number(right)) {
            (Ok(a), Ok(b)) => numeric_order(a, b) == Some(Ordering::Equal),
            _ => false,
        },
        _ => left == right,
    }
}

/// Ordering with the right operand converted to the left's type.
pub fn compare(left: &Value, right: &Value) -> Result<Ordering, OperatorError> {
    match (left.payload(), right.payload()) {
        (Payload::Null, Payload::Null) => return Ok(Ordering::Equal),
        (Payload::Null, _) => return Ok(Ordering::Less),
        (_, Payload::Null) => return Ok(Ordering::Greater),
        _ => {}
    }
    let class = left.type_class();
    if class == TypeClass::String {
        let a = left.to_string().to_lowercase();
        let b = right.to_string().to_lowercase();
        return Ok(a.cmp(&b));
    }
    if class == TypeClass::Bool {
        return Ok(left.is_truthy().cmp(&right.is_truthy()));
    }
    if class.is_numeric() {
        let a = to_number(left)?;
        let b = to_number(right)?;
        return numeric_order(a, b).ok_or_else(|| {
            OperatorError::invalid_cast(right.to_string(), left.type_tag().full_name())
        });
    }
    Err(OperatorError::IncompatibleTypes {
        op: "compare".to_string(),
        left: left.type_tag().full_name(),
        right: right.type_tag().full_name(),
    })
}

fn numeric_order(a: Num, b: Num) -> Option<Ordering> {
    let (a, b) = promote(a, b).ok()?;
    match (a, b) {
        (Num::Int32(x), Num::Int32(y)) => Some(x.cmp(&y)),
        (Num::Int64(x), Num::Int64(y)) => Some(x.cmp(&y)),
        (Num::Double(x), Num::Double(y)) => x.partial_cmp(&y),
        (Num::Decimal(x), Num::Decimal(y)) => Some(x.cmp(&y)),
        _ => None,
    }
}

fn contains(collection: &Value, item: &Value) -> bool {
    match collection.as_sequence() {
        Some(seq) => seq.iter().any(|element| equals(element, item)),
        None => equals(collection, item),
    }
}

/// Translate a wildcard pattern (`*`, `?`, `[a-z]`) to an anchored regex.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let mut out = String::from("^");
    let mut in_class = false;
    for c in pattern.chars() {
        match c {
            '*' if !in_class => out.push_str(".*"),
            '?' if !in_class => out.push('.'),
            '[' if !in_class => {
                in_class = true;
                out.push('[');
            }
            ']' if in_class => {
                in_class = false;
                out.push(']');
            }
            c if in_class => {
                if c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    if in_class {
        out.push(']');
    }
    out.push('$');
    out
}

fn build_regex(pattern: &str) -> Result<regex::Regex, OperatorError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| OperatorError::InvalidArgument(format!("invalid pattern '{}': {}", pattern, e)))
}

fn like(text: &str, pattern: &str) -> Result<bool, OperatorError> {
    Ok(build_regex(&wildcard_to_regex(pattern))?.is_match(text))
}

fn matches(text: &str, pattern: &str) -> Result<bool, OperatorError> {
    Ok(build_regex(pattern)?.is_match(text))
}

pub(super) fn regex(pattern: &str) -> Result<regex::Regex, OperatorError> {
    build_regex(pattern)
}

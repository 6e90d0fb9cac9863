//! Operator and type-promotion engine.
//!
//! Every binary operator node is resolved from `(operator, left class,
//! right class)` to a [`Rule`] by a static table, then the rule is applied.
//! Pairs the table does not name fall back to numeric promotion, which
//! either finds both operands on the numeric tower or reports an invalid
//! cast.
//!
//! # Rules at a glance
//!
//! | Operator | Left     | Right    | Rule                 |
//! |----------|----------|----------|----------------------|
//! | `+`      | string   | any      | concatenation        |
//! | `+`      | sequence | any      | append               |
//! | `+`      | record   | record   | merge                |
//! | `+`      | `$null`  | any      | right operand        |
//! | `*`      | string   | number   | replication          |
//! | `*`      | sequence | number   | replication          |
//! | arith    | number   | number   | numeric tower        |
//! | `-eq` …  | any      | any      | comparison           |
//!
//! The evaluator short-circuits `-and`/`-or` before reaching this module.

mod arithmetic;
mod cast;
mod coerce;
mod compare;
mod text;

use pash_types::{ErrorCategory, ErrorRecord, TypeClass, Value};
use thiserror::Error;

use crate::ast::{BinaryOp, UnaryOp};

pub use arithmetic::MAX_REPLICATION;
pub use cast::{cast, cast_to_tag, to_index};
pub use coerce::{coerce_number, promote, replication_count, to_number, Num};
pub use compare::{compare, equals};
pub use text::format_string;

/// Failure of an operator or conversion.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperatorError {
    #[error("cannot convert value \"{value}\" to {target}")]
    InvalidCast { value: String, target: String },

    #[error("operator '{op}' is not defined for {left} and {right}")]
    IncompatibleTypes {
        op: String,
        left: String,
        right: String,
    },

    #[error("attempted to divide by zero")]
    DivideByZero,

    #[error("{0}")]
    InvalidArgument(String),
}

impl OperatorError {
    pub fn invalid_cast(value: impl Into<String>, target: impl Into<String>) -> Self {
        OperatorError::InvalidCast {
            value: value.into(),
            target: target.into(),
        }
    }

    pub fn incompatible(op: impl ToString, left: &Value, right: &Value) -> Self {
        OperatorError::IncompatibleTypes {
            op: op.to_string(),
            left: left.type_tag().full_name(),
            right: right.type_tag().full_name(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            OperatorError::InvalidCast { .. } => ErrorCategory::InvalidCast,
            OperatorError::IncompatibleTypes { .. } => ErrorCategory::IncompatibleTypes,
            OperatorError::DivideByZero => ErrorCategory::DivideByZero,
            OperatorError::InvalidArgument(_) => ErrorCategory::Runtime,
        }
    }

    /// The error as a non-terminating record.
    pub fn to_record(&self) -> ErrorRecord {
        ErrorRecord::new(self.category(), self.to_string())
    }
}

impl From<OperatorError> for ErrorRecord {
    fn from(err: OperatorError) -> Self {
        err.to_record()
    }
}

/// How an operator applies to a pair of operand classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Both operands on the numeric tower.
    Numeric,
    /// `$null + x` is `x`.
    NullLeft,
    Concat,
    StringReplicate,
    SequenceAppend,
    SequenceReplicate,
    RecordMerge,
    Compare,
    Logical,
    Range,
    Format,
    Join,
    Split,
    Replace,
    /// No meaning for this pair.
    Undefined,
}

/// Classes that can be read as a number without losing information.
fn numeric_like(class: TypeClass) -> bool {
    class.is_numeric() || matches!(class, TypeClass::String | TypeClass::Null)
}

/// Resolve the rule for an operator and the classes of its operands.
pub fn resolve(op: BinaryOp, left: TypeClass, right: TypeClass) -> Rule {
    use TypeClass as C;

    if op.is_logical() {
        return Rule::Logical;
    }
    match op {
        BinaryOp::Range => return Rule::Range,
        BinaryOp::Format => return Rule::Format,
        BinaryOp::Join => return Rule::Join,
        BinaryOp::Split => return Rule::Split,
        BinaryOp::Replace => return Rule::Replace,
        _ if op.is_comparison() => return Rule::Compare,
        _ => {}
    }

    match (op, left, right) {
        (BinaryOp::Add, C::Null, _) => Rule::NullLeft,
        (BinaryOp::Add, C::String, _) => Rule::Concat,
        (BinaryOp::Add, C::Sequence, _) => Rule::SequenceAppend,
        (BinaryOp::Add, C::Record, C::Record) => Rule::RecordMerge,
        (BinaryOp::Mul, C::String, r) if numeric_like(r) => Rule::StringReplicate,
        (BinaryOp::Mul, C::Sequence, r) if numeric_like(r) => Rule::SequenceReplicate,
        (_, l, r) if numeric_like(l) && numeric_like(r) => Rule::Numeric,
        _ => Rule::Undefined,
    }
}

/// Apply a binary operator.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, OperatorError> {
    let rule = resolve(op, left.type_class(), right.type_class());
    tracing::trace!(%op, ?rule, "binary operator");
    match rule {
        Rule::Numeric => arithmetic::numeric(op, left, right),
        Rule::NullLeft => Ok(right.clone()),
        Rule::Concat => Ok(Value::from(format!("{}{}", left, right))),
        Rule::StringReplicate => arithmetic::replicate_string(left, right),
        Rule::SequenceAppend => Ok(arithmetic::append(left, right)),
        Rule::SequenceReplicate => arithmetic::replicate_sequence(left, right),
        Rule::RecordMerge => arithmetic::merge_records(left, right),
        Rule::Compare => compare::apply(op, left, right),
        Rule::Logical => {
            let (l, r) = (left.is_truthy(), right.is_truthy());
            Ok(Value::from(match op {
                BinaryOp::And => l && r,
                BinaryOp::Or => l || r,
                _ => l ^ r,
            }))
        }
        Rule::Range => arithmetic::range(left, right),
        Rule::Format => text::format(left, right),
        Rule::Join => Ok(text::join(left, right)),
        Rule::Split => text::split(left, right),
        Rule::Replace => text::replace(left, right),
        Rule::Undefined => Err(OperatorError::incompatible(op, left, right)),
    }
}

/// Apply a unary operator.
pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, OperatorError> {
    match op {
        UnaryOp::Not => Ok(Value::from(!operand.is_truthy())),
        UnaryOp::Comma => Ok(Value::sequence(vec![operand.clone()])),
        UnaryOp::Plus => Ok(to_number(operand)?.into_value()),
        UnaryOp::Neg => arithmetic::negate(to_number(operand)?).map(Num::into_value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pash_types::TypeClass as C;

    #[test]
    fn table_names_the_special_pairs() {
        assert_eq!(resolve(BinaryOp::Mul, C::String, C::Int32), Rule::StringReplicate);
        assert_eq!(resolve(BinaryOp::Mul, C::Int32, C::String), Rule::Numeric);
        assert_eq!(resolve(BinaryOp::Add, C::Sequence, C::Int32), Rule::SequenceAppend);
        assert_eq!(resolve(BinaryOp::Add, C::Record, C::Record), Rule::RecordMerge);
        assert_eq!(resolve(BinaryOp::Sub, C::Sequence, C::Int32), Rule::Undefined);
        assert_eq!(resolve(BinaryOp::Eq, C::Sequence, C::Int32), Rule::Compare);
    }

    #[test]
    fn undefined_pairs_report_both_types() {
        let err = binary(
            BinaryOp::Sub,
            &Value::sequence(vec![Value::from(1)]),
            &Value::from(1),
        )
        .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::IncompatibleTypes);
        assert!(err.to_string().contains("System.Object[]"));
    }

    #[test]
    fn unary_minus_widens_at_the_edge() {
        assert_eq!(
            unary(UnaryOp::Neg, &Value::from(i32::MIN)).unwrap().type_tag(),
            pash_types::TypeTag::Int64
        );
        assert_eq!(unary(UnaryOp::Neg, &Value::from("5")).unwrap(), Value::from(-5));
    }

    #[test]
    fn unary_comma_wraps() {
        let wrapped = unary(UnaryOp::Comma, &Value::from(3)).unwrap();
        assert_eq!(wrapped.count(), 1);
        assert!(wrapped.as_sequence().is_some());
    }
}

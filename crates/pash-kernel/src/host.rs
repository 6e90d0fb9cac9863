//! Host capability: static members and host objects.
//!
//! The interpreter never reflects over anything itself. `[Type]::Member`
//! and members of host objects go through one injected capability:
//!
//! ```text
//! [Math]::Sqrt(16)   → invoke("Math", "Sqrt", [16])
//! $obj.Frobnicate(1) → invoke("<obj type>", "Frobnicate", [$obj, 1])
//! ```

use std::cmp::Ordering;

use bigdecimal::RoundingMode;
use pash_types::{ErrorCategory, ErrorRecord, Value};

use crate::ops::{self, Num};

/// Invokes host operations by type and member name.
pub trait HostCapability: Send + Sync {
    /// Static calls pass no receiver; instance calls on host objects pass
    /// the receiver as `args[0]`. Properties are calls without arguments.
    fn invoke(&self, type_name: &str, member_name: &str, args: &[Value]) -> Result<Value, ErrorRecord>;
}

fn unsupported(type_name: &str, member_name: &str) -> ErrorRecord {
    ErrorRecord::new(
        ErrorCategory::Host,
        format!("Unable to find member '{}' on type [{}]", member_name, type_name),
    )
    .with_target(format!("{}::{}", type_name, member_name))
}

/// Refuses every operation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl HostCapability for NullHost {
    fn invoke(&self, type_name: &str, member_name: &str, _args: &[Value]) -> Result<Value, ErrorRecord> {
        Err(unsupported(type_name, member_name))
    }
}

/// A small standard library: `[Math]` and integer limits.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardHost;

impl HostCapability for StandardHost {
    fn invoke(&self, type_name: &str, member_name: &str, args: &[Value]) -> Result<Value, ErrorRecord> {
        let ty = type_name
            .strip_prefix("System.")
            .unwrap_or(type_name)
            .to_ascii_lowercase();
        let member = member_name.to_ascii_lowercase();
        tracing::trace!(type_name = %ty, member = %member, args = args.len(), "host invoke");

        match (ty.as_str(), member.as_str()) {
            ("int" | "int32", "maxvalue") => Ok(Value::from(i32::MAX)),
            ("int" | "int32", "minvalue") => Ok(Value::from(i32::MIN)),
            ("long" | "int64", "maxvalue") => Ok(Value::from(i64::MAX)),
            ("long" | "int64", "minvalue") => Ok(Value::from(i64::MIN)),
            ("math", _) => math(&member, args).map_err(|e| match e {
                MathError::Unknown => unsupported(type_name, member_name),
                MathError::Arity(n) => ErrorRecord::new(
                    ErrorCategory::Host,
                    format!("Cannot find an overload for \"{}\" and the argument count: \"{}\"", member_name, n),
                ),
                MathError::Operator(err) => err.to_record(),
            }),
            _ => Err(unsupported(type_name, member_name)),
        }
    }
}

enum MathError {
    Unknown,
    Arity(usize),
    Operator(ops::OperatorError),
}

impl From<ops::OperatorError> for MathError {
    fn from(err: ops::OperatorError) -> Self {
        MathError::Operator(err)
    }
}

fn arg(args: &[Value], i: usize) -> Result<Num, MathError> {
    match args.get(i) {
        Some(value) => Ok(ops::to_number(value)?),
        None => Err(MathError::Arity(args.len())),
    }
}

fn exact(args: &[Value], n: usize) -> Result<(), MathError> {
    if args.len() == n {
        Ok(())
    } else {
        Err(MathError::Arity(args.len()))
    }
}

fn overflow(n: impl ToString) -> MathError {
    MathError::Operator(ops::OperatorError::invalid_cast(n.to_string(), "a non-negative value"))
}

fn math(member: &str, args: &[Value]) -> Result<Value, MathError> {
    Ok(match member {
        "pi" => Value::from(std::f64::consts::PI),
        "e" => Value::from(std::f64::consts::E),
        "abs" => {
            exact(args, 1)?;
            match arg(args, 0)? {
                Num::Int32(n) => Value::from(n.checked_abs().ok_or_else(|| overflow(n))?),
                Num::Int64(n) => Value::from(n.checked_abs().ok_or_else(|| overflow(n))?),
                Num::Double(n) => Value::from(n.abs()),
                Num::Decimal(d) => Value::from(d.abs()),
            }
        }
        "sqrt" => {
            exact(args, 1)?;
            Value::from(arg(args, 0)?.to_f64().sqrt())
        }
        "pow" => {
            exact(args, 2)?;
            Value::from(arg(args, 0)?.to_f64().powf(arg(args, 1)?.to_f64()))
        }
        "floor" | "ceiling" => {
            exact(args, 1)?;
            let mode = if member == "floor" { RoundingMode::Floor } else { RoundingMode::Ceiling };
            match arg(args, 0)? {
                Num::Decimal(d) => Value::from(d.with_scale_round(0, mode)),
                n if member == "floor" => Value::from(n.to_f64().floor()),
                n => Value::from(n.to_f64().ceil()),
            }
        }
        "round" => {
            let digits = match args.len() {
                1 => 0,
                2 => ops::to_index(&args[1])?,
                n => return Err(MathError::Arity(n)),
            };
            match arg(args, 0)? {
                Num::Decimal(d) => Value::from(d.with_scale_round(digits, RoundingMode::HalfEven)),
                n => {
                    let scale = 10f64.powi(digits as i32);
                    Value::from((n.to_f64() * scale).round_ties_even() / scale)
                }
            }
        }
        "max" | "min" => {
            exact(args, 2)?;
            let ordering = ops::compare(&args[0], &args[1])?;
            let want = if member == "max" { Ordering::Less } else { Ordering::Greater };
            let picked = if ordering == want { &args[1] } else { &args[0] };
            ops::to_number(picked)?.into_value()
        }
        _ => return Err(MathError::Unknown),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn math_members() {
        let host = StandardHost;
        assert_eq!(host.invoke("Math", "Sqrt", &[Value::from(16)]).unwrap(), Value::from(4.0));
        assert_eq!(host.invoke("System.Math", "abs", &[Value::from(-3)]).unwrap(), Value::from(3));
        assert_eq!(
            host.invoke("Math", "Max", &[Value::from(2), Value::from(7)]).unwrap(),
            Value::from(7)
        );
        assert_eq!(host.invoke("Math", "Round", &[Value::from(2.5)]).unwrap(), Value::from(2.0));
        assert_eq!(host.invoke("Math", "Floor", &[Value::from(-1.5)]).unwrap(), Value::from(-2.0));
    }

    #[test]
    fn integer_limits() {
        let host = StandardHost;
        assert_eq!(host.invoke("int", "MaxValue", &[]).unwrap(), Value::from(i32::MAX));
        assert_eq!(host.invoke("long", "MinValue", &[]).unwrap(), Value::from(i64::MIN));
    }

    #[test]
    fn unknown_members_are_host_errors() {
        let err = StandardHost.invoke("Math", "Frobnicate", &[]).unwrap_err();
        assert_eq!(err.category, ErrorCategory::Host);
        assert_eq!(NullHost.invoke("Math", "PI", &[]).unwrap_err().category, ErrorCategory::Host);
        assert!(StandardHost.invoke("Math", "Sqrt", &[]).is_err());
    }
}

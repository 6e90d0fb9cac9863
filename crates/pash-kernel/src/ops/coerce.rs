//! Numeric coercion: moving values onto the numeric tower.
//!
//! The tower is `int32 → int64 → double → decimal`. Bool and byte enter as
//! int32, `$null` and the empty string as `0`. Strings are read by their
//! lexical form: signed hex, integer, real or decimal text.

use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive, Zero};
use pash_types::{format_double, Payload, Value};

use super::OperatorError;

/// A value on the numeric tower.
#[derive(Debug, Clone, PartialEq)]
pub enum Num {
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal(BigDecimal),
}

impl Num {
    /// Position on the tower; higher absorbs lower.
    pub fn rank(&self) -> u8 {
        match self {
            Num::Int32(_) => 0,
            Num::Int64(_) => 1,
            Num::Double(_) => 2,
            Num::Decimal(_) => 3,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Num::Int32(_) | Num::Int64(_))
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Num::Int32(n) => *n == 0,
            Num::Int64(n) => *n == 0,
            Num::Double(n) => *n == 0.0,
            Num::Decimal(d) => d.is_zero(),
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Num::Int32(n) => *n as f64,
            Num::Int64(n) => *n as f64,
            Num::Double(n) => *n,
            Num::Decimal(d) => d.to_f64().unwrap_or(f64::NAN),
        }
    }

    /// Decimal form. Doubles go through their shortest text so `0.1`
    /// becomes `0.1`, not its binary expansion.
    pub fn to_decimal(&self) -> Result<BigDecimal, OperatorError> {
        match self {
            Num::Int32(n) => Ok(BigDecimal::from(*n)),
            Num::Int64(n) => Ok(BigDecimal::from(*n)),
            Num::Double(n) => {
                if !n.is_finite() {
                    return Err(OperatorError::invalid_cast(format_double(*n), "System.Decimal"));
                }
                BigDecimal::from_str(&n.to_string())
                    .map_err(|_| OperatorError::invalid_cast(format_double(*n), "System.Decimal"))
            }
            Num::Decimal(d) => Ok(d.clone()),
        }
    }

    /// Lift to the given rank.
    pub fn widen_to(self, rank: u8) -> Result<Num, OperatorError> {
        if self.rank() >= rank {
            return Ok(self);
        }
        Ok(match rank {
            1 => match self {
                Num::Int32(n) => Num::Int64(n as i64),
                other => other,
            },
            2 => Num::Double(self.to_f64()),
            _ => Num::Decimal(self.to_decimal()?),
        })
    }

    /// Round to an integer the way casts do: halves go to the even neighbour.
    pub fn to_i64_rounded(&self) -> Option<i64> {
        match self {
            Num::Int32(n) => Some(*n as i64),
            Num::Int64(n) => Some(*n),
            Num::Double(n) => {
                let r = n.round_ties_even();
                (r.is_finite() && r >= i64::MIN as f64 && r <= i64::MAX as f64).then_some(r as i64)
            }
            Num::Decimal(d) => d.with_scale_round(0, RoundingMode::HalfEven).to_i64(),
        }
    }

    /// Truncate toward zero.
    pub fn to_i64_truncated(&self) -> Option<i64> {
        match self {
            Num::Int32(n) => Some(*n as i64),
            Num::Int64(n) => Some(*n),
            Num::Double(n) => {
                let t = n.trunc();
                (t.is_finite() && t >= i64::MIN as f64 && t <= i64::MAX as f64).then_some(t as i64)
            }
            Num::Decimal(d) => d.with_scale_round(0, RoundingMode::Down).to_i64(),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Num::Int32(n) => Value::from(n),
            Num::Int64(n) => Value::from(n),
            Num::Double(n) => Value::from(n),
            Num::Decimal(d) => Value::from(d),
        }
    }
}

/// Narrowest integer tier that holds `n`.
pub fn int_from_i128(n: i128) -> Option<Num> {
    if let Ok(small) = i32::try_from(n) {
        Some(Num::Int32(small))
    } else {
        i64::try_from(n).ok().map(Num::Int64)
    }
}

/// Move a value onto the numeric tower.
pub fn to_number(value: &Value) -> Result<Num, OperatorError> {
    match value.payload() {
        Payload::Null => Ok(Num::Int32(0)),
        Payload::Bool(b) => Ok(Num::Int32(*b as i32)),
        Payload::Byte(n) => Ok(Num::Int32(*n as i32)),
        Payload::Int32(n) => Ok(Num::Int32(*n)),
        Payload::Int64(n) => Ok(Num::Int64(*n)),
        Payload::Double(n) => Ok(Num::Double(*n)),
        Payload::Decimal(d) => Ok(Num::Decimal(d.clone())),
        Payload::String(s) => coerce_number(s),
        _ => Err(OperatorError::invalid_cast(
            value.to_string(),
            "a number",
        )),
    }
}

/// Read a string as a number by its lexical form.
///
/// `"0xabc"` is `2748` (int32), `"-0xabc"` is `-2748`; hex that does not fit
/// int64 is an invalid cast. Integer text takes the narrowest integer tier
/// and falls back to double; a `d` suffix makes a decimal, `l` an int64.
pub fn coerce_number(text: &str) -> Result<Num, OperatorError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Num::Int32(0));
    }

    let invalid = || OperatorError::invalid_cast(text, "a number");

    let (negative, body) = match trimmed.as_bytes()[0] {
        b'-' => (true, &trimmed[1..]),
        b'+' => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        let (digits, force_long) = match hex.strip_suffix(['l', 'L']) {
            Some(digits) => (digits, true),
            None => (hex, false),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let magnitude = u64::from_str_radix(digits, 16).map_err(|_| invalid())? as i128;
        let signed = if negative { -magnitude } else { magnitude };
        if force_long {
            return i64::try_from(signed).map(Num::Int64).map_err(|_| invalid());
        }
        return int_from_i128(signed).ok_or_else(invalid);
    }

    if !body.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return Err(invalid());
    }

    let signed_text = |digits: &str| {
        if negative {
            format!("-{}", digits)
        } else {
            digits.to_string()
        }
    };

    if let Some(digits) = body.strip_suffix(['d', 'D']) {
        return BigDecimal::from_str(&signed_text(digits))
            .map(Num::Decimal)
            .map_err(|_| invalid());
    }

    if let Some(digits) = body.strip_suffix(['l', 'L']) {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return signed_text(digits)
                .parse::<i64>()
                .map(Num::Int64)
                .map_err(|_| invalid());
        }
        return Err(invalid());
    }

    if body.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = signed_text(body).parse::<i128>() {
            if let Some(num) = int_from_i128(n) {
                return Ok(num);
            }
        }
    }

    signed_text(body)
        .parse::<f64>()
        .map(Num::Double)
        .map_err(|_| invalid())
}

/// Repetition count for string and sequence replication. Fractions
/// truncate toward zero; negative counts are zero.
pub fn replication_count(value: &Value) -> Result<usize, OperatorError> {
    let n = to_number(value)?;
    let count = n
        .to_i64_truncated()
        .ok_or_else(|| OperatorError::invalid_cast(value.to_string(), "System.Int32"))?;
    Ok(count.max(0) as usize)
}

/// Bring two numbers to the same tier.
pub fn promote(left: Num, right: Num) -> Result<(Num, Num), OperatorError> {
    let rank = left.rank().max(right.rank());
    Ok((left.widen_to(rank)?, right.widen_to(rank)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_strings_take_narrowest_integer() {
        assert_eq!(coerce_number("0xabc").unwrap(), Num::Int32(2748));
        assert_eq!(coerce_number("+0xabc").unwrap(), Num::Int32(2748));
        assert_eq!(coerce_number("-0xabc").unwrap(), Num::Int32(-2748));
        assert_eq!(coerce_number("0x100000000").unwrap(), Num::Int64(1 << 32));
        assert!(coerce_number("0xFFFFFFFFFFFFFFFFFF").is_err());
    }

    #[test]
    fn integer_text_widens_then_falls_back_to_double() {
        assert_eq!(coerce_number(" 42 ").unwrap(), Num::Int32(42));
        assert_eq!(coerce_number("3000000000").unwrap(), Num::Int64(3_000_000_000));
        assert!(matches!(
            coerce_number("99999999999999999999").unwrap(),
            Num::Double(_)
        ));
    }

    #[test]
    fn real_and_decimal_text() {
        assert_eq!(coerce_number("2.5").unwrap(), Num::Double(2.5));
        assert_eq!(coerce_number("1e3").unwrap(), Num::Double(1000.0));
        assert_eq!(
            coerce_number("10.50d").unwrap(),
            Num::Decimal(BigDecimal::from_str("10.50").unwrap())
        );
    }

    #[test]
    fn empty_is_zero_and_junk_is_invalid() {
        assert_eq!(coerce_number("").unwrap(), Num::Int32(0));
        assert!(matches!(
            coerce_number("abc"),
            Err(OperatorError::InvalidCast { .. })
        ));
        assert!(coerce_number("inf").is_err());
        assert!(coerce_number("0x").is_err());
    }

    #[test]
    fn replication_truncates() {
        assert_eq!(replication_count(&Value::from(2.7)).unwrap(), 2);
        assert_eq!(replication_count(&Value::from(-3)).unwrap(), 0);
        assert_eq!(replication_count(&Value::from("3")).unwrap(), 3);
    }

    #[test]
    fn casts_round_half_to_even() {
        assert_eq!(Num::Double(2.5).to_i64_rounded(), Some(2));
        assert_eq!(Num::Double(3.5).to_i64_rounded(), Some(4));
        assert_eq!(Num::Double(-2.7).to_i64_truncated(), Some(-2));
    }
}

//! Text forms of the floating and fixed-point tiers of the numeric tower.
//!
//! Doubles render with fifteen significant digits, trailing zeros trimmed,
//! switching to exponent notation outside `1e-5 ..= 1e15`. Decimals render
//! in plain notation and keep their scale, so `-123.600` stays `-123.600`.

use bigdecimal::BigDecimal;

/// Significant digits used when a double is turned into text.
pub const DOUBLE_DIGITS: usize = 15;

/// Format a double the way scripts see it: `10/3` prints `3.33333333333333`.
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    // Let the formatter do the rounding, then lay the digits out ourselves.
    let sci = format!("{:.*e}", DOUBLE_DIGITS - 1, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some(parts) => parts,
        None => return sci,
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let negative = mantissa.starts_with('-');
    let mut digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    while digits.len() > 1 && digits.ends_with('0') {
        digits.pop();
    }

    let mut out = String::new();
    if negative {
        out.push('-');
    }

    if exponent >= DOUBLE_DIGITS as i32 || exponent < -5 {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let sign = if exponent < 0 { '-' } else { '+' };
        out.push_str(&format!("E{}{:02}", sign, exponent.abs()));
    } else if exponent >= 0 {
        let int_len = exponent as usize + 1;
        if digits.len() <= int_len {
            out.push_str(&digits);
            out.push_str(&"0".repeat(int_len - digits.len()));
        } else {
            out.push_str(&digits[..int_len]);
            out.push('.');
            out.push_str(&digits[int_len..]);
        }
    } else {
        out.push_str("0.");
        out.push_str(&"0".repeat((-exponent - 1) as usize));
        out.push_str(&digits);
    }
    out
}

/// Format a decimal in plain notation, preserving its scale.
pub fn format_decimal(value: &BigDecimal) -> String {
    let (int_val, scale) = value.as_bigint_and_exponent();
    let raw = int_val.to_string();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest.to_string()),
        None => (false, raw),
    };

    let mut out = String::new();
    if negative {
        out.push('-');
    }

    if scale <= 0 {
        out.push_str(&digits);
        if digits != "0" {
            out.push_str(&"0".repeat((-scale) as usize));
        }
        return out;
    }

    let scale = scale as usize;
    if digits.len() > scale {
        let split = digits.len() - scale;
        out.push_str(&digits[..split]);
        out.push('.');
        out.push_str(&digits[split..]);
    } else {
        out.push_str("0.");
        out.push_str(&"0".repeat(scale - digits.len()));
        out.push_str(&digits);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn doubles_use_fifteen_significant_digits() {
        assert_eq!(format_double(10.0 / 3.0), "3.33333333333333");
        assert_eq!(format_double(12.0 / 10.6), "1.13207547169811");
        assert_eq!(format_double(12.0 / 2748.0), "0.00436681222707424");
        assert_eq!(format_double(100000000000001.0 / 100000000000000.0), "1.00000000000001");
    }

    #[test]
    fn doubles_trim_trailing_zeros() {
        assert_eq!(format_double(-1.2), "-1.2");
        assert_eq!(format_double(136.5), "136.5");
        assert_eq!(format_double(42.0), "42");
        assert_eq!(format_double(0.0), "0");
    }

    #[test]
    fn doubles_switch_to_exponent_form() {
        assert_eq!(format_double(1e20), "1E+20");
        assert_eq!(format_double(1.5e-7), "1.5E-07");
        assert_eq!(format_double(f64::INFINITY), "Infinity");
    }

    #[test]
    fn decimals_keep_their_scale() {
        let d = BigDecimal::from_str("-123.600").expect("decimal");
        assert_eq!(format_decimal(&d), "-123.600");
        let d = BigDecimal::from_str("0.10").expect("decimal");
        assert_eq!(format_decimal(&d), "0.10");
        let d = BigDecimal::from_str("42").expect("decimal");
        assert_eq!(format_decimal(&d), "42");
    }
}

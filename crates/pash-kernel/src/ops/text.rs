//! String operators: `-f`, `-join`, `-split`, `-replace`.

use pash_types::{format_decimal, Payload, Value};

use super::coerce::{to_number, Num};
use super::compare::regex;
use super::OperatorError;

/// `"{0} and {1}" -f $a, $b`
pub fn format(left: &Value, right: &Value) -> Result<Value, OperatorError> {
    let args = right.clone().enumerate();
    format_string(&left.to_string(), &args).map(Value::from)
}

/// Composite formatting: `{index[,alignment][:format]}` with `{{` and `}}`
/// as literal braces. Formats `N`, `F`, `D`, `X` and `P` take an optional
/// precision.
pub fn format_string(template: &str, args: &[Value]) -> Result<String, OperatorError> {
    let bad = || OperatorError::InvalidArgument(format!("invalid format string '{}'", template));
    let mut out = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut item = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => item.push(ch),
                        None => return Err(bad()),
                    }
                }
                let (head, spec) = match item.split_once(':') {
                    Some((h, s)) => (h, Some(s)),
                    None => (item.as_str(), None),
                };
                let (index, align) = match head.split_once(',') {
                    Some((i, a)) => (i, Some(a.trim().parse::<i32>().map_err(|_| bad())?)),
                    None => (head, None),
                };
                let index: usize = index.trim().parse().map_err(|_| bad())?;
                let value = args.get(index).ok_or_else(|| {
                    OperatorError::InvalidArgument(format!(
                        "format item {{{}}} has no matching argument",
                        index
                    ))
                })?;
                let text = match spec {
                    Some(spec) => format_item(value, spec)?,
                    None => value.to_string(),
                };
                match align {
                    Some(width) if width < 0 => {
                        out.push_str(&format!("{:<w$}", text, w = width.unsigned_abs() as usize))
                    }
                    Some(width) => out.push_str(&format!("{:>w$}", text, w = width as usize)),
                    None => out.push_str(&text),
                }
            }
            '}' => return Err(bad()),
            c => out.push(c),
        }
    }
    Ok(out)
}

fn format_item(value: &Value, spec: &str) -> Result<String, OperatorError> {
    let mut spec_chars = spec.chars();
    let Some(kind) = spec_chars.next() else {
        return Ok(value.to_string());
    };
    let precision: Option<usize> = {
        let rest = spec_chars.as_str();
        if rest.is_empty() {
            None
        } else {
            Some(rest.parse().map_err(|_| {
                OperatorError::InvalidArgument(format!("invalid format specifier '{}'", spec))
            })?)
        }
    };

    let number = || to_number(value);
    Ok(match kind.to_ascii_uppercase() {
        'F' => format!("{:.*}", precision.unwrap_or(2), number()?.to_f64()),
        'N' => group_thousands(&format!("{:.*}", precision.unwrap_or(2), number()?.to_f64())),
        'P' => format!("{:.*} %", precision.unwrap_or(2), number()?.to_f64() * 100.0),
        'D' => {
            let n = number()?
                .to_i64_rounded()
                .ok_or_else(|| OperatorError::invalid_cast(value.to_string(), "System.Int64"))?;
            let digits = format!("{:0w$}", n.unsigned_abs(), w = precision.unwrap_or(1));
            if n < 0 {
                format!("-{}", digits)
            } else {
                digits
            }
        }
        'X' => {
            let n = match number()? {
                Num::Int32(n) => n as u32 as u64,
                other => other
                    .to_i64_rounded()
                    .ok_or_else(|| OperatorError::invalid_cast(value.to_string(), "System.Int64"))?
                    as u64,
            };
            let text = format!("{:0w$x}", n, w = precision.unwrap_or(1));
            if kind == 'X' {
                text.to_uppercase()
            } else {
                text
            }
        }
        _ => match value.payload() {
            Payload::Decimal(d) => format_decimal(d),
            _ => value.to_string(),
        },
    })
}

fn group_thousands(fixed: &str) -> String {
    let (sign, body) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed),
    };
    let (int_part, frac) = match body.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (body, None),
    };
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    match frac {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

/// `$items -join ','`
pub fn join(left: &Value, right: &Value) -> Value {
    let separator = right.to_string();
    let parts: Vec<String> = left.clone().unroll().iter().map(Value::to_string).collect();
    Value::from(parts.join(&separator))
}

/// `'a,b' -split ','`: regex split, case-insensitive.
pub fn split(left: &Value, right: &Value) -> Result<Value, OperatorError> {
    let re = regex(&right.to_string())?;
    let mut parts = Vec::new();
    for item in left.clone().unroll() {
        let text = item.to_string();
        parts.extend(re.split(&text).map(Value::from));
    }
    Ok(Value::sequence(parts))
}

/// `'abc' -replace 'b', 'x'`; a lone pattern replaces with nothing.
pub fn replace(left: &Value, right: &Value) -> Result<Value, OperatorError> {
    let args = right.clone().enumerate();
    let (pattern, replacement) = match args.as_slice() {
        [pattern] => (pattern.to_string(), String::new()),
        [pattern, replacement] => (pattern.to_string(), replacement.to_string()),
        _ => {
            return Err(OperatorError::InvalidArgument(
                "-replace takes a pattern and an optional replacement".to_string(),
            ))
        }
    };
    let re = regex(&pattern)?;
    let apply = |v: Value| Value::from(re.replace_all(&v.to_string(), replacement.as_str()).into_owned());
    Ok(match left.as_sequence() {
        Some(seq) => Value::sequence(seq.iter().cloned().map(apply).collect()),
        None => apply(left.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_format() {
        let args = vec![Value::from("x"), Value::from(3.14159)];
        assert_eq!(format_string("{0}={1:F2}", &args).unwrap(), "x=3.14");
        assert_eq!(format_string("{{{0}}}", &args).unwrap(), "{x}");
        assert_eq!(format_string("[{0,3}]", &args).unwrap(), "[  x]");
        assert_eq!(format_string("{0:N0}", &[Value::from(1234567)]).unwrap(), "1,234,567");
        assert_eq!(format_string("{0:X}", &[Value::from(255)]).unwrap(), "FF");
        assert_eq!(format_string("{0:D3}", &[Value::from(7)]).unwrap(), "007");
        assert!(format_string("{2}", &args).is_err());
    }

    #[test]
    fn join_split_replace() {
        let seq = Value::sequence(vec![Value::from(1), Value::from(2)]);
        assert_eq!(join(&seq, &Value::from(",")), Value::from("1,2"));
        let parts = split(&Value::from("aXbxc"), &Value::from("x")).unwrap();
        assert_eq!(parts.count(), 3);
        let args = Value::sequence(vec![Value::from("B"), Value::from("_")]);
        assert_eq!(replace(&Value::from("abc"), &args).unwrap(), Value::from("a_c"));
        let swapped = Value::sequence(vec![Value::from(r"(\w)(\w)"), Value::from("$2$1")]);
        assert_eq!(replace(&Value::from("ab"), &swapped).unwrap(), Value::from("ba"));
    }
}

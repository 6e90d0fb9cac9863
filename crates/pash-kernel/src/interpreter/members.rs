//! Member access, method calls and indexing on values.
//!
//! Lookup order for `$x.Name`: note properties, record keys, intrinsic
//! members, then the host capability for host objects. Unknown properties
//! read as `$null`; unknown methods are an error.

use pash_types::{ErrorCategory, ErrorRecord, Payload, TypeTag, Value};

use crate::host::HostCapability;
use crate::ops;

use super::control_flow::EvalResult;

fn runtime(message: impl Into<String>) -> ErrorRecord {
    ErrorRecord::new(ErrorCategory::Runtime, message)
}

fn count(n: usize) -> Value {
    i32::try_from(n)
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(n as i64))
}

/// `$value.name`
pub fn get_member(value: &Value, name: &str, host: &dyn HostCapability) -> EvalResult<Value> {
    if let Some(found) = value.property(name) {
        return Ok(found.clone());
    }
    let lower = name.to_ascii_lowercase();
    Ok(match value.payload() {
        Payload::Record(record) => match record.get(name) {
            Some(found) => found.clone(),
            None => match lower.as_str() {
                "count" => count(record.len()),
                "keys" => Value::sequence(record.keys().map(|k| Value::from(k.as_str())).collect()),
                "values" => Value::sequence(record.iter().map(|(_, v)| v.clone()).collect()),
                _ => Value::null(),
            },
        },
        Payload::Type(tag) => match lower.as_str() {
            "name" => Value::from(tag.name()),
            "fullname" => Value::from(tag.full_name()),
            _ => Value::null(),
        },
        Payload::Host(object) => host.invoke(object.type_name(), name, &[value.clone()])?,
        Payload::Sequence(seq) => match lower.as_str() {
            "length" | "count" => count(seq.len()),
            _ => {
                // member enumeration: `$items.Name`
                let mut found = Vec::new();
                for item in seq.iter() {
                    let member = get_member(item, name, host)?;
                    if !member.is_null() {
                        found.push(member);
                    }
                }
                match found.len() {
                    0 => Value::null(),
                    1 => found.remove(0),
                    _ => Value::sequence(found),
                }
            }
        },
        Payload::String(s) => match lower.as_str() {
            "length" => count(s.chars().count()),
            "count" => Value::from(1),
            _ => Value::null(),
        },
        Payload::Null => match lower.as_str() {
            "count" | "length" => Value::from(0),
            _ => Value::null(),
        },
        _ => match lower.as_str() {
            "count" | "length" => Value::from(1),
            _ => Value::null(),
        },
    })
}

/// `$value.name(args)`. Script block `Invoke` is handled by the evaluator.
pub fn call_method(
    value: &Value,
    name: &str,
    args: &[Value],
    host: &dyn HostCapability,
) -> EvalResult<Value> {
    let lower = name.to_ascii_lowercase();
    match (lower.as_str(), args) {
        ("gettype", []) => return Ok(Value::type_value(value.type_tag())),
        ("tostring", []) => return Ok(Value::from(value.to_string())),
        ("tostring", [format]) => {
            let template = format!("{{0:{}}}", format);
            return Ok(Value::from(ops::format_string(&template, &[value.clone()])?));
        }
        ("equals", [other]) => return Ok(Value::from(ops::equals(value, other))),
        _ => {}
    }

    match value.payload() {
        Payload::String(s) => match string_method(s, &lower, args)? {
            Some(found) => Ok(found),
            None => Err(no_such_method(value, name).into()),
        },
        Payload::Record(record) => match (lower.as_str(), args) {
            ("containskey", [key]) => Ok(Value::from(record.contains_key(&key.to_string()))),
            ("clone", []) => Ok(Value::record(record.clone())),
            _ => Err(no_such_method(value, name).into()),
        },
        Payload::Sequence(seq) => match (lower.as_str(), args) {
            ("contains", [item]) => Ok(Value::from(seq.iter().any(|e| ops::equals(e, item)))),
            ("indexof", [item]) => Ok(Value::from(
                seq.iter()
                    .position(|e| ops::equals(e, item))
                    .map(|i| i as i32)
                    .unwrap_or(-1),
            )),
            ("clone", []) => Ok(value.clone()),
            _ => Err(no_such_method(value, name).into()),
        },
        Payload::Host(object) => {
            let mut call_args = Vec::with_capacity(args.len() + 1);
            call_args.push(value.clone());
            call_args.extend(args.iter().cloned());
            Ok(host.invoke(object.type_name(), name, &call_args)?)
        }
        _ => Err(no_such_method(value, name).into()),
    }
}

fn no_such_method(value: &Value, name: &str) -> ErrorRecord {
    runtime(format!(
        "Method invocation failed because [{}] does not contain a method named '{}'.",
        value.type_tag().full_name(),
        name
    ))
    .with_target(name)
}

fn int_arg(value: &Value) -> Result<i64, ErrorRecord> {
    ops::to_index(value).map_err(ErrorRecord::from)
}

/// .NET-style string methods. `Ok(None)` when the method does not exist.
fn string_method(s: &str, name: &str, args: &[Value]) -> Result<Option<Value>, ErrorRecord> {
    let text = |i: usize| args.get(i).map(|v| v.to_string()).unwrap_or_default();
    let chars: Vec<char> = s.chars().collect();
    let out = match (name, args.len()) {
        ("toupper", 0) => Value::from(s.to_uppercase()),
        ("tolower", 0) => Value::from(s.to_lowercase()),
        ("trim", 0) => Value::from(s.trim()),
        ("trimstart", 0) => Value::from(s.trim_start()),
        ("trimend", 0) => Value::from(s.trim_end()),
        ("trim", 1) => {
            let set: Vec<char> = text(0).chars().collect();
            Value::from(s.trim_matches(|c| set.contains(&c)))
        }
        ("contains", 1) => Value::from(s.contains(&text(0))),
        ("startswith", 1) => Value::from(s.starts_with(&text(0))),
        ("endswith", 1) => Value::from(s.ends_with(&text(0))),
        ("replace", 2) => Value::from(s.replace(&text(0), &text(1))),
        ("indexof", 1) => {
            let needle = text(0);
            Value::from(
                s.find(&needle)
                    .map(|byte| s[..byte].chars().count() as i32)
                    .unwrap_or(-1),
            )
        }
        ("split", 1) => {
            let separators: Vec<char> = text(0).chars().collect();
            Value::sequence(
                s.split(|c| separators.contains(&c))
                    .map(Value::from)
                    .collect(),
            )
        }
        ("substring", 1 | 2) => {
            let start = int_arg(&args[0])?;
            let len = match args.get(1) {
                Some(v) => int_arg(v)?,
                None => (chars.len() as i64).saturating_sub(start),
            };
            let end = start.checked_add(len);
            if start < 0 || len < 0 || end.map_or(true, |end| end > chars.len() as i64) {
                return Err(runtime(format!(
                    "Substring({}, {}) is outside the bounds of a {}-character string",
                    start,
                    len,
                    chars.len()
                )));
            }
            let (start, len) = (start as usize, len as usize);
            Value::from(chars[start..start + len].iter().collect::<String>())
        }
        ("padleft" | "padright", 1) => {
            let width = int_arg(&args[0])?.max(0) as usize;
            if width > ops::MAX_REPLICATION {
                return Err(runtime(format!("padding width {} is too large", width)));
            }
            let fill = " ".repeat(width.saturating_sub(chars.len()));
            if name == "padleft" {
                Value::from(format!("{}{}", fill, s))
            } else {
                Value::from(format!("{}{}", s, fill))
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(out))
}

/// Normalise an index against a length; negative indexes count from the end.
fn position(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let i = if index < 0 { len + index } else { index };
    (0..len).contains(&i).then_some(i as usize)
}

/// `$value[index]`. An index sequence slices.
pub fn index(value: &Value, index: &Value) -> EvalResult<Value> {
    if let Some(indexes) = index.as_sequence() {
        let mut picked = Vec::with_capacity(indexes.len());
        for i in indexes.iter() {
            let item = single_index(value, i)?;
            if !item.is_null() {
                picked.push(item);
            }
        }
        return Ok(Value::sequence(picked));
    }
    single_index(value, index)
}

fn single_index(value: &Value, index: &Value) -> EvalResult<Value> {
    Ok(match value.payload() {
        Payload::Sequence(seq) => position(ops::to_index(index)?, seq.len())
            .and_then(|i| seq.get(i).cloned())
            .unwrap_or_default(),
        Payload::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            position(ops::to_index(index)?, chars.len())
                .map(|i| Value::from(chars[i].to_string()))
                .unwrap_or_default()
        }
        Payload::Record(record) => record.get(&index.to_string()).cloned().unwrap_or_default(),
        Payload::Null => return Err(runtime("Cannot index into a null array.").into()),
        _ => match ops::to_index(index)? {
            0 | -1 => value.clone(),
            _ => {
                return Err(runtime(format!(
                    "Unable to index into an object of type {}.",
                    value.type_tag().full_name()
                ))
                .into())
            }
        },
    })
}

/// `$container[index] = item`, returning the updated container.
pub fn set_index(mut container: Value, index: &Value, item: Value) -> EvalResult<Value> {
    let type_name = container.type_tag().full_name();
    match container.payload_mut() {
        Payload::Sequence(seq) => {
            let element = seq.element_type();
            let item = if element.admits(&item) {
                item
            } else {
                ops::cast_to_tag(&item, &element.scalar_tag())?
            };
            let i = position(ops::to_index(index)?, seq.len())
                .ok_or_else(|| runtime("Index was outside the bounds of the array."))?;
            seq.make_mut()[i] = item;
        }
        Payload::Record(record) => record.insert(index.to_string(), item),
        Payload::Null => return Err(runtime("Cannot index into a null array.").into()),
        _ => {
            return Err(runtime(format!("Unable to index into an object of type {}.", type_name)).into())
        }
    }
    Ok(container)
}

/// `$container.name = item`, returning the updated container.
pub fn set_member(mut container: Value, name: &str, item: Value) -> EvalResult<Value> {
    if container.is_null() {
        return Err(runtime(format!("The property '{}' cannot be found on this object.", name)).into());
    }
    if let Payload::Record(record) = container.payload_mut() {
        record.insert(name, item);
    } else {
        container.set_property(name, item);
    }
    Ok(container)
}

/// The value of a bare type literal: a known type or an opaque host type.
pub fn type_literal(name: &str) -> Value {
    Value::type_value(TypeTag::from_name(name).unwrap_or_else(|| TypeTag::Host(name.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::NullHost;
    use pash_types::{ElementType, Record};

    fn seq(items: &[i32]) -> Value {
        Value::sequence(items.iter().copied().map(Value::from).collect())
    }

    #[test]
    fn intrinsic_lengths() {
        let host = NullHost;
        assert_eq!(get_member(&seq(&[1, 2, 3]), "Length", &host).unwrap(), Value::from(3));
        assert_eq!(get_member(&Value::from("héllo"), "length", &host).unwrap(), Value::from(5));
        assert_eq!(get_member(&Value::null(), "Count", &host).unwrap(), Value::from(0));
        assert_eq!(get_member(&Value::from(7), "Count", &host).unwrap(), Value::from(1));
    }

    #[test]
    fn gettype_reports_full_names() {
        let host = NullHost;
        let ty = call_method(&Value::from(1.5), "GetType", &[], &host).unwrap();
        assert_eq!(get_member(&ty, "FullName", &host).unwrap(), Value::from("System.Double"));
        assert_eq!(get_member(&ty, "Name", &host).unwrap(), Value::from("Double"));
    }

    #[test]
    fn record_keys_and_enumeration() {
        let host = NullHost;
        let mut r = Record::new();
        r.insert("Name", Value::from("a"));
        let rec = Value::record(r);
        assert_eq!(get_member(&rec, "name", &host).unwrap(), Value::from("a"));
        assert!(get_member(&rec, "missing", &host).unwrap().is_null());

        let both = Value::sequence(vec![rec.clone(), rec]);
        assert_eq!(get_member(&both, "Name", &host).unwrap().count(), 2);
    }

    #[test]
    fn string_methods() {
        let host = NullHost;
        let s = Value::from("Hello");
        assert_eq!(call_method(&s, "ToUpper", &[], &host).unwrap(), Value::from("HELLO"));
        assert_eq!(
            call_method(&s, "Substring", &[Value::from(1), Value::from(3)], &host).unwrap(),
            Value::from("ell")
        );
        assert!(call_method(&s, "Frobnicate", &[], &host).is_err());
        assert!(call_method(&s, "Substring", &[Value::from(2), Value::from(i64::MAX)], &host).is_err());
        assert!(call_method(&s, "Substring", &[Value::from(i64::MIN)], &host).is_err());
        assert_eq!(
            call_method(&s, "PadLeft", &[Value::from(7)], &host).unwrap(),
            Value::from("  Hello")
        );
        assert!(call_method(&s, "PadRight", &[Value::from(i64::MAX)], &host).is_err());
        assert_eq!(
            call_method(&Value::from(3.14159), "ToString", &[Value::from("F2")], &host).unwrap(),
            Value::from("3.14")
        );
    }

    #[test]
    fn indexing() {
        let s = seq(&[10, 20, 30]);
        assert_eq!(index(&s, &Value::from(-1)).unwrap(), Value::from(30));
        assert!(index(&s, &Value::from(9)).unwrap().is_null());
        assert_eq!(index(&s, &seq(&[0, 2])).unwrap().to_string(), "10 30");
        assert_eq!(index(&Value::from("abc"), &Value::from(1)).unwrap(), Value::from("b"));
        assert!(index(&Value::null(), &Value::from(0)).is_err());
    }

    #[test]
    fn set_index_casts_into_typed_arrays() {
        let bytes = Value::typed_sequence(vec![Value::from(1u8)], ElementType::Byte);
        let updated = set_index(bytes.clone(), &Value::from(0), Value::from(7)).unwrap();
        assert_eq!(updated.as_sequence().unwrap().get(0), Some(&Value::from(7u8)));
        assert!(set_index(bytes.clone(), &Value::from(0), Value::from(300)).is_err());
        assert!(set_index(bytes, &Value::from(5), Value::from(1)).is_err());
    }

    #[test]
    fn set_member_writes_records_and_properties() {
        let rec = set_member(Value::record(Record::new()), "k", Value::from(1)).unwrap();
        assert_eq!(rec.as_record().unwrap().get("K"), Some(&Value::from(1)));
        let tagged = set_member(Value::from(5), "Note", Value::from("x")).unwrap();
        assert_eq!(tagged.property("note"), Some(&Value::from("x")));
    }
}

//! Explicit conversions: `[int]$x`, `[byte[]]5`, `[string]$n`.

use pash_types::{ElementType, Payload, TypeTag, Value};

use super::coerce::{to_number, Num};
use super::OperatorError;

/// Cast by type literal name.
pub fn cast(value: &Value, type_name: &str) -> Result<Value, OperatorError> {
    let tag = TypeTag::from_name(type_name)
        .ok_or_else(|| OperatorError::InvalidArgument(format!("unable to find type [{}]", type_name)))?;
    cast_to_tag(value, &tag)
}

pub fn cast_to_tag(value: &Value, tag: &TypeTag) -> Result<Value, OperatorError> {
    let invalid = || OperatorError::invalid_cast(value.to_string(), tag.full_name());

    match tag {
        TypeTag::Object => Ok(value.clone()),
        TypeTag::Null => Ok(Value::null()),
        TypeTag::String => Ok(Value::from(value.to_string()).with_properties_of(value)),
        TypeTag::Bool => Ok(Value::from(value.is_truthy())),
        TypeTag::Byte => {
            let n = to_number(value)?.to_i64_rounded().ok_or_else(invalid)?;
            u8::try_from(n).map(Value::from).map_err(|_| invalid())
        }
        TypeTag::Int32 => {
            let n = to_number(value)?.to_i64_rounded().ok_or_else(invalid)?;
            i32::try_from(n).map(Value::from).map_err(|_| invalid())
        }
        TypeTag::Int64 => {
            let n = to_number(value)?.to_i64_rounded().ok_or_else(invalid)?;
            Ok(Value::from(n))
        }
        TypeTag::Double => Ok(Value::from(to_number(value)?.to_f64())),
        TypeTag::Decimal => Ok(Value::from(to_number(value)?.to_decimal()?)),
        TypeTag::Array(element) => cast_array(value, *element),
        TypeTag::Record => match value.payload() {
            Payload::Record(_) => Ok(value.clone()),
            Payload::Null => Ok(Value::null()),
            _ => Err(invalid()),
        },
        TypeTag::ScriptBlock | TypeTag::Type | TypeTag::Host(_) => {
            if &value.type_tag() == tag {
                Ok(value.clone())
            } else {
                Err(invalid())
            }
        }
    }
}

/// `[T[]]x`: every element cast to `T`, a scalar becomes one element.
fn cast_array(value: &Value, element: ElementType) -> Result<Value, OperatorError> {
    if value.is_null() {
        return Ok(Value::null());
    }
    let items = value.clone().enumerate();
    let scalar = element.scalar_tag();
    let mut cast_items = Vec::with_capacity(items.len());
    for item in &items {
        cast_items.push(match element {
            ElementType::Object => item.clone(),
            _ => cast_to_tag(item, &scalar)?,
        });
    }
    Ok(Value::typed_sequence(cast_items, element))
}

/// Narrow a number to int32 when a script expects an index.
pub fn to_index(value: &Value) -> Result<i64, OperatorError> {
    match to_number(value)? {
        Num::Int32(n) => Ok(n as i64),
        other => other
            .to_i64_rounded()
            .ok_or_else(|| OperatorError::invalid_cast(value.to_string(), "System.Int32")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_casts_round_half_even() {
        assert_eq!(cast(&Value::from(2.5), "int").unwrap(), Value::from(2));
        assert_eq!(cast(&Value::from("3.5"), "int").unwrap(), Value::from(4));
        assert!(cast(&Value::from(3_000_000_000i64), "int").is_err());
    }

    #[test]
    fn byte_array_cast_sets_element_type() {
        let bytes = cast(&Value::from(5), "byte[]").unwrap();
        assert_eq!(bytes.type_tag().full_name(), "System.Byte[]");
        assert_eq!(bytes.count(), 1);
        assert!(cast(&Value::from(300), "byte[]").is_err());
    }

    #[test]
    fn string_and_bool_casts() {
        assert_eq!(cast(&Value::from(1.5), "string").unwrap(), Value::from("1.5"));
        assert_eq!(cast(&Value::from(""), "bool").unwrap(), Value::from(false));
    }

    #[test]
    fn unknown_types_are_reported() {
        assert!(matches!(
            cast(&Value::from(1), "Frobnicator"),
            Err(OperatorError::InvalidArgument(_))
        ));
    }
}

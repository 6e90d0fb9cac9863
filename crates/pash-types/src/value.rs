//! Runtime values for pash.
//!
//! A [`Value`] is a native [`Payload`] plus an ordered property bag. The type
//! tag is computed from the payload on demand, so the two can never disagree.
//! Sequences and records share their storage behind an `Arc`; writes go
//! through copy-on-write.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::number::{format_decimal, format_double};

// ═══════════════════════════════════════════════════════════════════════════
// Type tags
// ═══════════════════════════════════════════════════════════════════════════

/// Declared element type of a sequence.
///
/// Typed sequences (`[byte[]]`, `[int[]]`) keep their element type through
/// replication and slicing; `Object` accepts anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Object,
    Bool,
    Byte,
    Int32,
    Int64,
    Double,
    Decimal,
    String,
}

impl ElementType {
    /// The scalar tag elements of this type carry.
    pub fn scalar_tag(self) -> TypeTag {
        match self {
            ElementType::Object => TypeTag::Object,
            ElementType::Bool => TypeTag::Bool,
            ElementType::Byte => TypeTag::Byte,
            ElementType::Int32 => TypeTag::Int32,
            ElementType::Int64 => TypeTag::Int64,
            ElementType::Double => TypeTag::Double,
            ElementType::Decimal => TypeTag::Decimal,
            ElementType::String => TypeTag::String,
        }
    }

    pub fn from_tag(tag: &TypeTag) -> Option<ElementType> {
        Some(match tag {
            TypeTag::Object => ElementType::Object,
            TypeTag::Bool => ElementType::Bool,
            TypeTag::Byte => ElementType::Byte,
            TypeTag::Int32 => ElementType::Int32,
            TypeTag::Int64 => ElementType::Int64,
            TypeTag::Double => ElementType::Double,
            TypeTag::Decimal => ElementType::Decimal,
            TypeTag::String => ElementType::String,
            _ => return None,
        })
    }

    /// Whether a value can live in a sequence of this element type unchanged.
    pub fn admits(self, value: &Value) -> bool {
        self == ElementType::Object || value.type_tag() == self.scalar_tag()
    }
}

/// Runtime type of a value, as reported by `.GetType()`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Null,
    Object,
    Bool,
    Byte,
    Int32,
    Int64,
    Double,
    Decimal,
    String,
    Array(ElementType),
    Record,
    ScriptBlock,
    Type,
    Host(Arc<str>),
}

impl TypeTag {
    /// Short name: `Int32`, `Byte[]`, `Hashtable`.
    pub fn name(&self) -> String {
        let full = self.full_name();
        match full.rsplit_once('.') {
            Some((_, short)) => short.to_string(),
            None => full,
        }
    }

    /// Fully qualified name: `System.Int32`, `System.Byte[]`.
    pub fn full_name(&self) -> String {
        match self {
            TypeTag::Null => "null".to_string(),
            TypeTag::Object => "System.Object".to_string(),
            TypeTag::Bool => "System.Boolean".to_string(),
            TypeTag::Byte => "System.Byte".to_string(),
            TypeTag::Int32 => "System.Int32".to_string(),
            TypeTag::Int64 => "System.Int64".to_string(),
            TypeTag::Double => "System.Double".to_string(),
            TypeTag::Decimal => "System.Decimal".to_string(),
            TypeTag::String => "System.String".to_string(),
            TypeTag::Array(element) => format!("{}[]", element.scalar_tag().full_name()),
            TypeTag::Record => "System.Collections.Hashtable".to_string(),
            TypeTag::ScriptBlock => "System.Management.Automation.ScriptBlock".to_string(),
            TypeTag::Type => "System.Type".to_string(),
            TypeTag::Host(name) => name.to_string(),
        }
    }

    /// Resolve a type literal name (`int`, `System.Int64`, `byte[]`).
    ///
    /// Matching is case-insensitive. Unknown names return `None`; the caller
    /// decides whether that is a host type or an error.
    pub fn from_name(name: &str) -> Option<TypeTag> {
        let lower = name.trim().to_ascii_lowercase();
        if let Some(element) = lower.strip_suffix("[]") {
            let element = TypeTag::from_name(element)?;
            return ElementType::from_tag(&element).map(TypeTag::Array);
        }
        let lower = lower.strip_prefix("system.").unwrap_or(&lower);
        Some(match lower {
            "object" | "psobject" => TypeTag::Object,
            "bool" | "boolean" => TypeTag::Bool,
            "byte" => TypeTag::Byte,
            "int" | "int32" => TypeTag::Int32,
            "long" | "int64" => TypeTag::Int64,
            "double" | "float" => TypeTag::Double,
            "decimal" => TypeTag::Decimal,
            "string" => TypeTag::String,
            "array" => TypeTag::Array(ElementType::Object),
            "hashtable" | "collections.hashtable" => TypeTag::Record,
            "scriptblock" | "management.automation.scriptblock" => TypeTag::ScriptBlock,
            "type" => TypeTag::Type,
            _ => return None,
        })
    }

    /// Dispatch class used by the operator table.
    pub fn class(&self) -> TypeClass {
        match self {
            TypeTag::Null => TypeClass::Null,
            TypeTag::Bool => TypeClass::Bool,
            TypeTag::Byte => TypeClass::Byte,
            TypeTag::Int32 => TypeClass::Int32,
            TypeTag::Int64 => TypeClass::Int64,
            TypeTag::Double => TypeClass::Double,
            TypeTag::Decimal => TypeClass::Decimal,
            TypeTag::String => TypeClass::String,
            TypeTag::Array(_) => TypeClass::Sequence,
            TypeTag::Record => TypeClass::Record,
            TypeTag::Object | TypeTag::ScriptBlock | TypeTag::Type | TypeTag::Host(_) => {
                TypeClass::Other
            }
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Closed set of operand classes the operator engine dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Null,
    Bool,
    Byte,
    Int32,
    Int64,
    Double,
    Decimal,
    String,
    Sequence,
    Record,
    Other,
}

impl TypeClass {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            TypeClass::Bool
                | TypeClass::Byte
                | TypeClass::Int32
                | TypeClass::Int64
                | TypeClass::Double
                | TypeClass::Decimal
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            TypeClass::Bool | TypeClass::Byte | TypeClass::Int32 | TypeClass::Int64
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Payload pieces
// ═══════════════════════════════════════════════════════════════════════════

/// An ordered sequence of values with a declared element type.
#[derive(Debug, Clone)]
pub struct Sequence {
    elements: Arc<Vec<Value>>,
    element: ElementType,
}

impl Sequence {
    pub fn new(elements: Vec<Value>, element: ElementType) -> Self {
        Self {
            elements: Arc::new(elements),
            element,
        }
    }

    pub fn objects(elements: Vec<Value>) -> Self {
        Self::new(elements, ElementType::Object)
    }

    pub fn element_type(&self) -> ElementType {
        self.element
    }

    pub fn elements(&self) -> &[Value] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.elements.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.elements.iter()
    }

    /// Mutable access, cloning the storage if it is shared.
    pub fn make_mut(&mut self) -> &mut Vec<Value> {
        Arc::make_mut(&mut self.elements)
    }

    pub fn into_vec(self) -> Vec<Value> {
        Arc::try_unwrap(self.elements).unwrap_or_else(|shared| (*shared).clone())
    }
}

/// An ordered key/value record (hashtable literal `@{ a = 1 }`).
///
/// Key lookup is case-insensitive; the original key spelling is kept.
#[derive(Debug, Clone, Default)]
pub struct Record {
    entries: Arc<IndexMap<String, Value>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(entries: IndexMap<String, Value>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .get(key)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v)
            })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace, matching existing keys case-insensitively.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let entries = Arc::make_mut(&mut self.entries);
        let existing = entries
            .keys()
            .find(|k| k.eq_ignore_ascii_case(&key))
            .cloned();
        match existing {
            Some(k) => {
                entries.insert(k, value);
            }
            None => {
                entries.insert(key, value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

/// A script block value. The body is opaque to this crate; the kernel
/// stores its AST here and downcasts it back when the block is invoked.
#[derive(Clone)]
pub struct ScriptBlockRef {
    source: Arc<str>,
    body: Arc<dyn Any + Send + Sync>,
}

impl ScriptBlockRef {
    pub fn new(source: impl Into<Arc<str>>, body: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            source: source.into(),
            body,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn body<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.body).downcast::<T>().ok()
    }
}

impl fmt::Debug for ScriptBlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptBlock({{{}}})", self.source)
    }
}

/// An object owned by the host. pash never looks inside; member access on
/// it is forwarded to the host capability with `type_name`.
#[derive(Clone)]
pub struct HostObject {
    type_name: Arc<str>,
    inner: Arc<dyn Any + Send + Sync>,
}

impl HostObject {
    pub fn new(type_name: impl Into<Arc<str>>, inner: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            type_name: type_name.into(),
            inner,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostObject({})", self.type_name)
    }
}

/// The native payload of a value.
#[derive(Debug, Clone)]
pub enum Payload {
    Null,
    Bool(bool),
    Byte(u8),
    Int32(i32),
    Int64(i64),
    Double(f64),
    Decimal(BigDecimal),
    String(String),
    Sequence(Sequence),
    Record(Record),
    ScriptBlock(ScriptBlockRef),
    Type(TypeTag),
    Host(HostObject),
}

// ═══════════════════════════════════════════════════════════════════════════
// Property bag
// ═══════════════════════════════════════════════════════════════════════════

/// Ordered note properties attached to a value.
///
/// Empty bags allocate nothing; the map is created on first write and shared
/// copy-on-write between clones.
#[derive(Debug, Clone, Default)]
pub struct PropertyBag(Option<Arc<IndexMap<String, Value>>>);

impl PropertyBag {
    pub fn is_empty(&self) -> bool {
        self.0.as_ref().map(|m| m.is_empty()).unwrap_or(true)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        let map = self.0.as_ref()?;
        map.get(name).or_else(|| {
            map.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        let map = Arc::make_mut(self.0.get_or_insert_with(Default::default));
        let existing = map.keys().find(|k| k.eq_ignore_ascii_case(&name)).cloned();
        map.insert(existing.unwrap_or(name), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter().flat_map(|m| m.iter())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Value
// ═══════════════════════════════════════════════════════════════════════════

/// The universal runtime datum.
#[derive(Debug, Clone, Default)]
pub struct Value {
    payload: Payload,
    properties: PropertyBag,
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Null
    }
}

impl Value {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            properties: PropertyBag::default(),
        }
    }

    pub fn null() -> Self {
        Self::new(Payload::Null)
    }

    /// An `Object[]` sequence.
    pub fn sequence(elements: Vec<Value>) -> Self {
        Self::new(Payload::Sequence(Sequence::objects(elements)))
    }

    /// A sequence with a declared element type.
    pub fn typed_sequence(elements: Vec<Value>, element: ElementType) -> Self {
        Self::new(Payload::Sequence(Sequence::new(elements, element)))
    }

    pub fn record(record: Record) -> Self {
        Self::new(Payload::Record(record))
    }

    pub fn script_block(block: ScriptBlockRef) -> Self {
        Self::new(Payload::ScriptBlock(block))
    }

    pub fn type_value(tag: TypeTag) -> Self {
        Self::new(Payload::Type(tag))
    }

    pub fn host(object: HostObject) -> Self {
        Self::new(Payload::Host(object))
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    pub fn type_tag(&self) -> TypeTag {
        match &self.payload {
            Payload::Null => TypeTag::Null,
            Payload::Bool(_) => TypeTag::Bool,
            Payload::Byte(_) => TypeTag::Byte,
            Payload::Int32(_) => TypeTag::Int32,
            Payload::Int64(_) => TypeTag::Int64,
            Payload::Double(_) => TypeTag::Double,
            Payload::Decimal(_) => TypeTag::Decimal,
            Payload::String(_) => TypeTag::String,
            Payload::Sequence(seq) => TypeTag::Array(seq.element_type()),
            Payload::Record(_) => TypeTag::Record,
            Payload::ScriptBlock(_) => TypeTag::ScriptBlock,
            Payload::Type(_) => TypeTag::Type,
            Payload::Host(obj) => TypeTag::Host(Arc::from(obj.type_name())),
        }
    }

    pub fn type_class(&self) -> TypeClass {
        self.type_tag().class()
    }

    pub fn is_null(&self) -> bool {
        matches!(self.payload, Payload::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match &self.payload {
            Payload::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match &self.payload {
            Payload::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_script_block(&self) -> Option<&ScriptBlockRef> {
        match &self.payload {
            Payload::ScriptBlock(block) => Some(block),
            _ => None,
        }
    }

    pub fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: Value) {
        self.properties.set(name, value);
    }

    /// Copy this value's note properties onto `other`.
    pub fn with_properties_of(mut self, other: &Value) -> Self {
        for (k, v) in other.properties.iter() {
            self.properties.set(k.clone(), v.clone());
        }
        self
    }

    /// Number of items this value contributes when enumerated.
    pub fn count(&self) -> usize {
        match &self.payload {
            Payload::Null => 0,
            Payload::Sequence(seq) => seq.len(),
            _ => 1,
        }
    }

    /// One level of enumeration: a sequence yields its elements, `$null`
    /// yields nothing, anything else yields itself.
    pub fn unroll(self) -> Vec<Value> {
        match self.payload {
            Payload::Sequence(seq) => seq.into_vec(),
            Payload::Null => Vec::new(),
            _ => vec![self],
        }
    }

    /// Like [`Value::unroll`], but `$null` is kept as a single item.
    pub fn enumerate(self) -> Vec<Value> {
        match self.payload {
            Payload::Sequence(seq) => seq.into_vec(),
            _ => vec![self],
        }
    }

    /// Truthiness used by conditions, `-not` and `Where-Object`.
    pub fn is_truthy(&self) -> bool {
        match &self.payload {
            Payload::Null => false,
            Payload::Bool(b) => *b,
            Payload::Byte(n) => *n != 0,
            Payload::Int32(n) => *n != 0,
            Payload::Int64(n) => *n != 0,
            Payload::Double(n) => *n != 0.0,
            Payload::Decimal(d) => !d.is_zero(),
            Payload::String(s) => !s.is_empty(),
            Payload::Sequence(seq) => match seq.len() {
                0 => false,
                1 => seq.elements()[0].is_truthy(),
                _ => true,
            },
            Payload::Record(_) | Payload::ScriptBlock(_) | Payload::Type(_) | Payload::Host(_) => {
                true
            }
        }
    }

    /// JSON form, used by hosts that want structured output.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match &self.payload {
            Payload::Null => Json::Null,
            Payload::Bool(b) => Json::Bool(*b),
            Payload::Byte(n) => Json::from(*n),
            Payload::Int32(n) => Json::from(*n),
            Payload::Int64(n) => Json::from(*n),
            Payload::Double(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Payload::Decimal(d) => {
                let text = format_decimal(d);
                serde_json::from_str::<Json>(&text).unwrap_or(Json::String(text))
            }
            Payload::String(s) => Json::String(s.clone()),
            Payload::Sequence(seq) => Json::Array(seq.iter().map(Value::to_json).collect()),
            Payload::Record(record) => Json::Object(
                record
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Payload::ScriptBlock(block) => Json::String(block.source().to_string()),
            Payload::Type(tag) => Json::String(tag.full_name()),
            Payload::Host(obj) => Json::String(obj.type_name().to_string()),
        }
    }
}

impl PartialEq for Value {
    /// Payload equality. Note properties do not take part, and sequences
    /// compare element-wise regardless of declared element type.
    fn eq(&self, other: &Self) -> bool {
        match (&self.payload, &other.payload) {
            (Payload::Null, Payload::Null) => true,
            (Payload::Bool(a), Payload::Bool(b)) => a == b,
            (Payload::Byte(a), Payload::Byte(b)) => a == b,
            (Payload::Int32(a), Payload::Int32(b)) => a == b,
            (Payload::Int64(a), Payload::Int64(b)) => a == b,
            (Payload::Double(a), Payload::Double(b)) => a == b,
            (Payload::Decimal(a), Payload::Decimal(b)) => a == b,
            (Payload::String(a), Payload::String(b)) => a == b,
            (Payload::Sequence(a), Payload::Sequence(b)) => a.elements() == b.elements(),
            (Payload::Record(a), Payload::Record(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Payload::ScriptBlock(a), Payload::ScriptBlock(b)) => a.source() == b.source(),
            (Payload::Type(a), Payload::Type(b)) => a == b,
            (Payload::Host(a), Payload::Host(b)) => Arc::ptr_eq(&a.inner, &b.inner),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    /// The string conversion scripts observe (`"$x"`, `[string]$x`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::Null => Ok(()),
            Payload::Bool(true) => f.write_str("True"),
            Payload::Bool(false) => f.write_str("False"),
            Payload::Byte(n) => write!(f, "{}", n),
            Payload::Int32(n) => write!(f, "{}", n),
            Payload::Int64(n) => write!(f, "{}", n),
            Payload::Double(n) => f.write_str(&format_double(*n)),
            Payload::Decimal(d) => f.write_str(&format_decimal(d)),
            Payload::String(s) => f.write_str(s),
            Payload::Sequence(seq) => {
                for (i, item) in seq.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Payload::Record(_) => f.write_str("System.Collections.Hashtable"),
            Payload::ScriptBlock(block) => f.write_str(block.source()),
            Payload::Type(tag) => f.write_str(&tag.full_name()),
            Payload::Host(obj) => f.write_str(obj.type_name()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Conversions
// ═══════════════════════════════════════════════════════════════════════════

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        Value::new(payload)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::new(Payload::Bool(b))
    }
}

impl From<u8> for Value {
    fn from(n: u8) -> Self {
        Value::new(Payload::Byte(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::new(Payload::Int32(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::new(Payload::Int64(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::new(Payload::Double(n))
    }
}

impl From<BigDecimal> for Value {
    fn from(d: BigDecimal) -> Self {
        Value::new(Payload::Decimal(d))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::new(Payload::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::new(Payload::String(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(elements: Vec<Value>) -> Self {
        Value::sequence(elements)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn type_tag_follows_payload() {
        assert_eq!(Value::from(1).type_tag(), TypeTag::Int32);
        assert_eq!(Value::from(1i64).type_tag(), TypeTag::Int64);
        assert_eq!(
            Value::typed_sequence(vec![Value::from(5u8)], ElementType::Byte)
                .type_tag()
                .full_name(),
            "System.Byte[]"
        );
        assert_eq!(Value::sequence(vec![]).type_tag().full_name(), "System.Object[]");
        assert_eq!(Value::sequence(vec![]).type_tag().name(), "Object[]");
    }

    #[test]
    fn type_names_resolve_case_insensitively() {
        assert_eq!(TypeTag::from_name("INT"), Some(TypeTag::Int32));
        assert_eq!(TypeTag::from_name("System.Int64"), Some(TypeTag::Int64));
        assert_eq!(
            TypeTag::from_name("byte[]"),
            Some(TypeTag::Array(ElementType::Byte))
        );
        assert_eq!(TypeTag::from_name("Math"), None);
    }

    #[test]
    fn property_bag_is_lazy_and_ordered() {
        let mut value = Value::from("x");
        assert!(value.properties().is_empty());
        value.set_property("b", Value::from(2));
        value.set_property("a", Value::from(1));
        value.set_property("B", Value::from(3));
        let names: Vec<_> = value.properties().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(value.property("b"), Some(&Value::from(3)));
    }

    #[test]
    fn property_writes_do_not_leak_into_clones() {
        let mut original = Value::from(1);
        original.set_property("note", Value::from("first"));
        let mut copy = original.clone();
        copy.set_property("note", Value::from("second"));
        assert_eq!(original.property("note"), Some(&Value::from("first")));
    }

    #[test]
    fn unroll_is_one_level() {
        let inner = Value::sequence(vec![Value::from(1), Value::from(2)]);
        let outer = Value::sequence(vec![inner.clone(), Value::from(3)]);
        let items = outer.unroll();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], inner);
        assert!(Value::null().unroll().is_empty());
        assert_eq!(Value::from("a").unroll(), vec![Value::from("a")]);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::null().is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::sequence(vec![Value::from(0)]).is_truthy());
        assert!(Value::sequence(vec![Value::from(0), Value::from(0)]).is_truthy());
        let zero = BigDecimal::from_str("0.00").expect("decimal");
        assert!(!Value::from(zero).is_truthy());
    }

    #[test]
    fn display_matches_script_conversions() {
        assert_eq!(Value::from(true).to_string(), "True");
        assert_eq!(Value::from(10.0 / 3.0).to_string(), "3.33333333333333");
        assert_eq!(
            Value::sequence(vec![Value::from(1), Value::from("a")]).to_string(),
            "1 a"
        );
        assert_eq!(Value::null().to_string(), "");
    }

    #[test]
    fn record_keys_are_case_insensitive() {
        let mut record = Record::new();
        record.insert("Name", Value::from("pash"));
        record.insert("name", Value::from("again"));
        assert_eq!(record.len(), 1);
        assert_eq!(record.get("NAME"), Some(&Value::from("again")));
        assert_eq!(record.keys().next().map(String::as_str), Some("Name"));
    }

    #[test]
    fn json_conversion() {
        let mut record = Record::new();
        record.insert("n", Value::from(2));
        record.insert("d", Value::from(BigDecimal::from_str("1.50").expect("decimal")));
        let value = Value::sequence(vec![Value::from(record), Value::null()]);
        assert_eq!(value.to_json().to_string(), r#"[{"d":1.5,"n":2},null]"#);
    }
}

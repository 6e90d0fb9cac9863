//! Core builtin traits and types.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use pash_types::{ErrorCategory, ErrorRecord, Value};

use crate::interpreter::EvalResult;
use crate::processor::CommandArg;

use super::context::ExecContext;

/// How a parameter takes its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Present or absent: `-Descending`.
    Switch,
    /// Takes the next argument: `-First 3`.
    Value,
}

/// Schema for a builtin parameter.
#[derive(Debug, Clone)]
pub struct ParamSchema {
    pub name: String,
    pub kind: ParamKind,
    /// Bound from this positional slot when not given by name.
    pub position: Option<usize>,
    /// Collects every positional argument left over.
    pub remaining: bool,
    /// Description for help text.
    pub description: String,
}

impl ParamSchema {
    /// Create a switch parameter.
    pub fn switch(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Switch,
            position: None,
            remaining: false,
            description: description.into(),
        }
    }

    /// Create a parameter that takes a value.
    pub fn value(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Value,
            position: None,
            remaining: false,
            description: description.into(),
        }
    }

    /// Also bind this parameter from positional slot `position`.
    pub fn at(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    /// Collect leftover positional arguments into this parameter.
    pub fn remaining(mut self) -> Self {
        self.remaining = true;
        self
    }
}

/// Schema describing a builtin's interface.
#[derive(Debug, Clone)]
pub struct BuiltinSchema {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSchema>,
}

impl BuiltinSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter to the schema.
    pub fn param(mut self, param: ParamSchema) -> Self {
        self.params.push(param);
        self
    }

    /// Find a parameter by exact name or unique prefix, case-insensitively.
    pub fn find(&self, name: &str) -> Result<&ParamSchema, ErrorRecord> {
        if let Some(param) = self.params.iter().find(|p| p.name.eq_ignore_ascii_case(name)) {
            return Ok(param);
        }
        let lower = name.to_ascii_lowercase();
        let mut matches = self
            .params
            .iter()
            .filter(|p| p.name.to_ascii_lowercase().starts_with(&lower));
        match (matches.next(), matches.next()) {
            (Some(param), None) => Ok(param),
            (Some(_), Some(_)) => Err(binding_error(
                &self.name,
                format!("Parameter name '{}' is ambiguous", name),
            )),
            (None, _) => Err(binding_error(
                &self.name,
                format!("A parameter cannot be found that matches parameter name '{}'", name),
            )),
        }
    }
}

fn binding_error(command: &str, message: String) -> ErrorRecord {
    ErrorRecord::new(ErrorCategory::Runtime, format!("{}: {}", command, message)).with_target(command)
}

/// Arguments bound against a [`BuiltinSchema`]. Keys are the schema's
/// parameter names, lowercased.
#[derive(Debug, Clone, Default)]
pub struct BuiltinArgs {
    values: HashMap<String, Value>,
    switches: HashSet<String>,
}

impl BuiltinArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind command arguments: named parameters first, then positional
    /// slots in order, then the `remaining` parameter.
    pub fn bind(schema: &BuiltinSchema, args: Vec<CommandArg>) -> Result<Self, ErrorRecord> {
        let mut bound = Self::new();
        let mut positional = Vec::new();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg {
                CommandArg::Positional(value) => positional.push(value),
                CommandArg::Parameter(name) => {
                    let param = schema.find(&name)?;
                    let key = param.name.to_ascii_lowercase();
                    match param.kind {
                        ParamKind::Switch => {
                            bound.switches.insert(key);
                        }
                        ParamKind::Value => match args.next() {
                            Some(CommandArg::Positional(value)) => {
                                bound.values.insert(key, value);
                            }
                            _ => {
                                return Err(binding_error(
                                    &schema.name,
                                    format!("Missing an argument for parameter '{}'", param.name),
                                ))
                            }
                        },
                    }
                }
            }
        }

        let mut slots: Vec<&ParamSchema> = schema
            .params
            .iter()
            .filter(|p| p.position.is_some())
            .collect();
        slots.sort_by_key(|p| p.position);

        let mut positional = positional.into_iter();
        for param in slots {
            let key = param.name.to_ascii_lowercase();
            if bound.values.contains_key(&key) {
                continue;
            }
            match positional.next() {
                Some(value) => {
                    bound.values.insert(key, value);
                }
                None => break,
            }
        }

        let rest: Vec<Value> = positional.collect();
        if !rest.is_empty() {
            match schema.params.iter().find(|p| p.remaining) {
                Some(param) => {
                    let key = param.name.to_ascii_lowercase();
                    let mut values = bound.values.remove(&key).map(|v| vec![v]).unwrap_or_default();
                    values.extend(rest);
                    bound.values.insert(key, Value::sequence(values));
                }
                None => {
                    return Err(binding_error(
                        &schema.name,
                        format!(
                            "A positional parameter cannot be found that accepts argument '{}'",
                            rest[0]
                        ),
                    ))
                }
            }
        }
        Ok(bound)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(&name.to_ascii_lowercase())
    }

    /// Whether a switch was given.
    pub fn has(&self, name: &str) -> bool {
        self.switches.contains(&name.to_ascii_lowercase())
    }

    /// A value parameter as a non-negative count.
    pub fn get_count(&self, name: &str) -> Result<Option<usize>, ErrorRecord> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let n = crate::ops::to_index(value)?;
        usize::try_from(n).map(Some).map_err(|_| {
            ErrorRecord::new(
                ErrorCategory::InvalidCast,
                format!("Cannot bind '{}' to parameter '{}': the value must not be negative", value, name),
            )
        })
    }
}

/// A builtin command.
pub trait Builtin: Send + Sync {
    /// The builtin's name (used for lookup).
    fn name(&self) -> &str;

    /// Alternative names, matched case-insensitively like the name.
    fn aliases(&self) -> &[&'static str] {
        &[]
    }

    fn schema(&self) -> BuiltinSchema;

    /// Create the per-invocation state from bound arguments.
    fn instantiate(&self, args: BuiltinArgs) -> Result<Box<dyn BuiltinInstance>, ErrorRecord>;
}

/// One running invocation of a builtin.
#[async_trait]
pub trait BuiltinInstance: Send {
    async fn begin(&mut self, _ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        Ok(())
    }

    /// Handle one input value, or `None` when nothing is piped in.
    async fn process(&mut self, input: Option<Value>, ctx: &mut ExecContext<'_>) -> EvalResult<()>;

    async fn end(&mut self, _ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> BuiltinSchema {
        BuiltinSchema::new("Select-Object", "test")
            .param(ParamSchema::value("First", "").at(0))
            .param(ParamSchema::value("Filter", ""))
            .param(ParamSchema::switch("Descending", ""))
            .param(ParamSchema::value("Rest", "").remaining())
    }

    fn pos(v: i32) -> CommandArg {
        CommandArg::Positional(Value::from(v))
    }

    fn named(n: &str) -> CommandArg {
        CommandArg::Parameter(n.to_string())
    }

    #[test]
    fn named_and_positional() {
        let args = BuiltinArgs::bind(&schema(), vec![named("desc"), pos(3), pos(4), pos(5)]).unwrap();
        assert!(args.has("Descending"));
        assert_eq!(args.get("first"), Some(&Value::from(3)));
        assert_eq!(args.get("rest").map(Value::count), Some(2));
    }

    #[test]
    fn ambiguous_prefix_is_an_error() {
        let err = BuiltinArgs::bind(&schema(), vec![named("fi"), pos(1)]).unwrap_err();
        assert!(err.message.contains("ambiguous"));
    }

    #[test]
    fn missing_value_is_an_error() {
        assert!(BuiltinArgs::bind(&schema(), vec![named("First")]).is_err());
    }

    #[test]
    fn counts_reject_negatives() {
        let args = BuiltinArgs::bind(&schema(), vec![named("First"), pos(-1)]).unwrap();
        assert!(args.get_count("First").is_err());
    }
}

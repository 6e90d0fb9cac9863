//! Select-Object: take part of the input, or project properties.

use std::collections::VecDeque;

use async_trait::async_trait;
use pash_types::{ErrorRecord, Record, Value};

use crate::interpreter::{members, EvalResult, Fail};
use crate::ops;
use crate::tools::{Builtin, BuiltinArgs, BuiltinInstance, BuiltinSchema, ExecContext, ParamSchema};

pub struct SelectObject;

impl Builtin for SelectObject {
    fn name(&self) -> &str {
        "Select-Object"
    }

    fn aliases(&self) -> &[&'static str] {
        &["select"]
    }

    fn schema(&self) -> BuiltinSchema {
        BuiltinSchema::new("Select-Object", "Select objects or object properties")
            .param(ParamSchema::value("Property", "Properties to copy into new records").at(0).remaining())
            .param(ParamSchema::value("First", "Number of objects from the start"))
            .param(ParamSchema::value("Last", "Number of objects from the end"))
            .param(ParamSchema::value("Skip", "Number of objects to skip"))
            .param(ParamSchema::switch("Unique", "Drop repeated objects"))
    }

    fn instantiate(&self, args: BuiltinArgs) -> Result<Box<dyn BuiltinInstance>, ErrorRecord> {
        let properties = args
            .get("Property")
            .map(|p| p.clone().unroll().iter().map(Value::to_string).collect())
            .unwrap_or_default();
        Ok(Box::new(Instance {
            properties,
            first: args.get_count("First")?,
            last: args.get_count("Last")?,
            skip: args.get_count("Skip")?.unwrap_or(0),
            unique: args.has("Unique"),
            seen: Vec::new(),
            emitted: 0,
            tail: VecDeque::new(),
        }))
    }
}

struct Instance {
    properties: Vec<String>,
    first: Option<usize>,
    last: Option<usize>,
    skip: usize,
    unique: bool,
    seen: Vec<Value>,
    emitted: usize,
    tail: VecDeque<Value>,
}

impl Instance {
    fn project(&self, input: Value, ctx: &ExecContext<'_>) -> EvalResult<Value> {
        if self.properties.is_empty() {
            return Ok(input);
        }
        let host = ctx.evaluator.session().host.clone();
        let mut record = Record::new();
        for name in &self.properties {
            record.insert(name.clone(), members::get_member(&input, name, host.as_ref())?);
        }
        Ok(Value::record(record))
    }

    /// True when `value` was already let through under `-Unique`.
    fn repeated(&mut self, value: &Value) -> bool {
        if !self.unique {
            return false;
        }
        if self.seen.iter().any(|seen| ops::equals(seen, value)) {
            return true;
        }
        self.seen.push(value.clone());
        false
    }
}

#[async_trait]
impl BuiltinInstance for Instance {
    async fn begin(&mut self, _ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        if self.first == Some(0) && self.last.is_none() {
            return Err(Fail::OutputClosed);
        }
        Ok(())
    }

    async fn process(&mut self, input: Option<Value>, ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        let Some(input) = input else {
            return Ok(());
        };
        if self.skip > 0 {
            self.skip -= 1;
            return Ok(());
        }
        let value = self.project(input, ctx)?;
        if self.repeated(&value) {
            return Ok(());
        }

        if let Some(last) = self.last {
            if self.first.is_none() {
                self.tail.push_back(value);
                if self.tail.len() > last {
                    self.tail.pop_front();
                }
                return Ok(());
            }
        }

        match self.first {
            Some(first) if self.emitted < first => {
                ctx.emit(value).await?;
                self.emitted += 1;
                if self.emitted == first && self.last.is_none() {
                    // enough; stop the upstream stages
                    return Err(Fail::OutputClosed);
                }
                Ok(())
            }
            Some(_) => Ok(()),
            None => ctx.emit(value).await,
        }
    }

    async fn end(&mut self, ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        for value in std::mem::take(&mut self.tail) {
            ctx.emit(value).await?;
        }
        Ok(())
    }
}

//! Measure-Object: count and summarize the input.

use std::cmp::Ordering;

use async_trait::async_trait;
use pash_types::{ErrorRecord, Record, Value};

use crate::ast::BinaryOp;
use crate::interpreter::{members, EvalResult};
use crate::ops;
use crate::tools::{Builtin, BuiltinArgs, BuiltinInstance, BuiltinSchema, ExecContext, ParamSchema};

pub struct MeasureObject;

impl Builtin for MeasureObject {
    fn name(&self) -> &str {
        "Measure-Object"
    }

    fn aliases(&self) -> &[&'static str] {
        &["measure"]
    }

    fn schema(&self) -> BuiltinSchema {
        BuiltinSchema::new("Measure-Object", "Count objects and compute numeric statistics")
            .param(ParamSchema::value("Property", "Property to measure").at(0))
            .param(ParamSchema::switch("Sum", "Compute the sum"))
            .param(ParamSchema::switch("Average", "Compute the average"))
            .param(ParamSchema::switch("Maximum", "Find the largest value"))
            .param(ParamSchema::switch("Minimum", "Find the smallest value"))
    }

    fn instantiate(&self, args: BuiltinArgs) -> Result<Box<dyn BuiltinInstance>, ErrorRecord> {
        Ok(Box::new(Instance {
            property: args.get("Property").map(Value::to_string),
            sum: args.has("Sum"),
            average: args.has("Average"),
            maximum: args.has("Maximum"),
            minimum: args.has("Minimum"),
            stats: Stats::default(),
        }))
    }
}

#[derive(Default)]
struct Stats {
    count: i32,
    sum: Option<Value>,
    max: Option<Value>,
    min: Option<Value>,
}

struct Instance {
    property: Option<String>,
    sum: bool,
    average: bool,
    maximum: bool,
    minimum: bool,
    stats: Stats,
}

impl Instance {
    fn wants_sum(&self) -> bool {
        self.sum || self.average
    }

    fn add(&mut self, value: Value) -> EvalResult<()> {
        self.stats.count += 1;
        if self.wants_sum() {
            let number = ops::to_number(&value)?.into_value();
            self.stats.sum = Some(match self.stats.sum.take() {
                Some(sum) => ops::binary(BinaryOp::Add, &sum, &number)?,
                None => number,
            });
        }
        if self.maximum && keep(&self.stats.max, &value, Ordering::Greater)? {
            self.stats.max = Some(value.clone());
        }
        if self.minimum && keep(&self.stats.min, &value, Ordering::Less)? {
            self.stats.min = Some(value);
        }
        Ok(())
    }
}

/// Whether `candidate` replaces `current` as the extreme in `direction`.
fn keep(current: &Option<Value>, candidate: &Value, direction: Ordering) -> EvalResult<bool> {
    Ok(match current {
        None => true,
        Some(current) => ops::compare(candidate, current)? == direction,
    })
}

#[async_trait]
impl BuiltinInstance for Instance {
    async fn process(&mut self, input: Option<Value>, ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        let Some(input) = input else {
            return Ok(());
        };
        let value = match &self.property {
            Some(name) => {
                let host = ctx.evaluator.session().host.clone();
                members::get_member(&input, name, host.as_ref())?
            }
            None => input,
        };
        self.add(value)
    }

    async fn end(&mut self, ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        let stats = std::mem::take(&mut self.stats);
        let average = match (&stats.sum, self.average && stats.count > 0) {
            (Some(sum), true) => Some(ops::binary(BinaryOp::Div, sum, &Value::from(stats.count))?),
            _ => None,
        };

        let mut record = Record::new();
        record.insert("Count", Value::from(stats.count));
        record.insert("Average", average.unwrap_or_default());
        record.insert("Sum", stats.sum.filter(|_| self.sum).unwrap_or_default());
        record.insert("Maximum", stats.max.unwrap_or_default());
        record.insert("Minimum", stats.min.unwrap_or_default());
        record.insert(
            "Property",
            self.property.as_deref().map(Value::from).unwrap_or_default(),
        );
        ctx.emit(Value::record(record)).await
    }
}

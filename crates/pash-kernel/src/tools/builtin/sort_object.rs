//! Sort-Object: sort the whole input.

use std::cmp::Ordering;

use async_trait::async_trait;
use pash_types::{ErrorRecord, Value};

use crate::interpreter::{members, EvalResult};
use crate::ops;
use crate::tools::{Builtin, BuiltinArgs, BuiltinInstance, BuiltinSchema, ExecContext, ParamSchema};

pub struct SortObject;

impl Builtin for SortObject {
    fn name(&self) -> &str {
        "Sort-Object"
    }

    fn aliases(&self) -> &[&'static str] {
        &["sort"]
    }

    fn schema(&self) -> BuiltinSchema {
        BuiltinSchema::new("Sort-Object", "Sort objects by value or by properties")
            .param(ParamSchema::value("Property", "Properties to sort by").at(0).remaining())
            .param(ParamSchema::switch("Descending", "Sort in descending order"))
            .param(ParamSchema::switch("Unique", "Drop equal objects"))
    }

    fn instantiate(&self, args: BuiltinArgs) -> Result<Box<dyn BuiltinInstance>, ErrorRecord> {
        let properties = args
            .get("Property")
            .map(|p| p.clone().unroll().iter().map(Value::to_string).collect())
            .unwrap_or_default();
        Ok(Box::new(Instance {
            properties,
            descending: args.has("Descending"),
            unique: args.has("Unique"),
            items: Vec::new(),
        }))
    }
}

/// Order two sort keys. Values the operator engine cannot compare fall
/// back to their string forms.
fn order(a: &Value, b: &Value) -> Ordering {
    ops::compare(a, b).unwrap_or_else(|_| a.to_string().to_lowercase().cmp(&b.to_string().to_lowercase()))
}

fn order_keys(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(a, b)| order(a, b))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

struct Instance {
    properties: Vec<String>,
    descending: bool,
    unique: bool,
    /// Sort keys and the original value.
    items: Vec<(Vec<Value>, Value)>,
}

#[async_trait]
impl BuiltinInstance for Instance {
    async fn process(&mut self, input: Option<Value>, ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        let Some(input) = input else {
            return Ok(());
        };
        let keys = if self.properties.is_empty() {
            vec![input.clone()]
        } else {
            let host = ctx.evaluator.session().host.clone();
            self.properties
                .iter()
                .map(|name| members::get_member(&input, name, host.as_ref()))
                .collect::<EvalResult<Vec<_>>>()?
        };
        self.items.push((keys, input));
        Ok(())
    }

    async fn end(&mut self, ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        let mut items = std::mem::take(&mut self.items);
        // stable, so equal keys keep their input order
        items.sort_by(|a, b| {
            let o = order_keys(&a.0, &b.0);
            if self.descending {
                o.reverse()
            } else {
                o
            }
        });
        if self.unique {
            items.dedup_by(|a, b| order_keys(&a.0, &b.0) == Ordering::Equal);
        }
        for (_, value) in items {
            ctx.emit(value).await?;
        }
        Ok(())
    }
}

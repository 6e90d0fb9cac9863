//! Where-Object: pass through inputs a script block accepts.

use async_trait::async_trait;
use pash_types::{ErrorCategory, ErrorRecord, ScriptBlockRef, Value};

use crate::interpreter::EvalResult;
use crate::tools::{Builtin, BuiltinArgs, BuiltinInstance, BuiltinSchema, ExecContext, ParamSchema};

use super::foreach_object::block_arg;

pub struct WhereObject;

impl Builtin for WhereObject {
    fn name(&self) -> &str {
        "Where-Object"
    }

    fn aliases(&self) -> &[&'static str] {
        &["where", "?"]
    }

    fn schema(&self) -> BuiltinSchema {
        BuiltinSchema::new("Where-Object", "Keep objects for which the filter is true")
            .param(ParamSchema::value("FilterScript", "Predicate evaluated with $_").at(0))
    }

    fn instantiate(&self, args: BuiltinArgs) -> Result<Box<dyn BuiltinInstance>, ErrorRecord> {
        let filter = block_arg(&args, "FilterScript")?.ok_or_else(|| {
            ErrorRecord::new(ErrorCategory::Runtime, "Where-Object: a FilterScript is required")
                .with_target("Where-Object")
        })?;
        Ok(Box::new(Instance { filter }))
    }
}

struct Instance {
    filter: ScriptBlockRef,
}

#[async_trait]
impl BuiltinInstance for Instance {
    async fn process(&mut self, input: Option<Value>, ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        let Some(input) = input else {
            return Ok(());
        };
        if ctx.invoke_value(&self.filter, input.clone()).await?.is_truthy() {
            ctx.emit(input).await?;
        }
        Ok(())
    }
}

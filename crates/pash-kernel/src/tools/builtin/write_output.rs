//! Write-Output: send values down the pipeline.

use async_trait::async_trait;
use pash_types::{ErrorRecord, Value};

use crate::interpreter::EvalResult;
use crate::tools::{Builtin, BuiltinArgs, BuiltinInstance, BuiltinSchema, ExecContext, ParamSchema};

pub struct WriteOutput;

impl Builtin for WriteOutput {
    fn name(&self) -> &str {
        "Write-Output"
    }

    fn aliases(&self) -> &[&'static str] {
        &["echo", "write"]
    }

    fn schema(&self) -> BuiltinSchema {
        BuiltinSchema::new("Write-Output", "Send objects to the success stream")
            .param(ParamSchema::value("InputObject", "Objects to write").at(0).remaining())
            .param(ParamSchema::switch("NoEnumerate", "Write sequences as a single object"))
    }

    fn instantiate(&self, args: BuiltinArgs) -> Result<Box<dyn BuiltinInstance>, ErrorRecord> {
        Ok(Box::new(Instance {
            input: args.get("InputObject").cloned(),
            no_enumerate: args.has("NoEnumerate"),
        }))
    }
}

struct Instance {
    input: Option<Value>,
    no_enumerate: bool,
}

#[async_trait]
impl BuiltinInstance for Instance {
    async fn process(&mut self, input: Option<Value>, ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        let Some(value) = input.or_else(|| self.input.take()) else {
            return Ok(());
        };
        if self.no_enumerate {
            ctx.emit(value).await
        } else {
            ctx.write(value).await
        }
    }
}

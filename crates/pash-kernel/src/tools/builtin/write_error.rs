//! Write-Error: report a non-terminating error.

use async_trait::async_trait;
use pash_types::{ErrorCategory, ErrorRecord, Value};

use crate::interpreter::EvalResult;
use crate::tools::{Builtin, BuiltinArgs, BuiltinInstance, BuiltinSchema, ExecContext, ParamSchema};

pub struct WriteError;

impl Builtin for WriteError {
    fn name(&self) -> &str {
        "Write-Error"
    }

    fn schema(&self) -> BuiltinSchema {
        BuiltinSchema::new("Write-Error", "Write an error record to the error stream")
            .param(ParamSchema::value("Message", "Error message").at(0).remaining())
            .param(ParamSchema::value("TargetObject", "Object the error is about"))
    }

    fn instantiate(&self, args: BuiltinArgs) -> Result<Box<dyn BuiltinInstance>, ErrorRecord> {
        Ok(Box::new(Instance {
            message: args.get("Message").cloned(),
            target: args.get("TargetObject").map(Value::to_string),
        }))
    }
}

struct Instance {
    message: Option<Value>,
    target: Option<String>,
}

#[async_trait]
impl BuiltinInstance for Instance {
    async fn process(&mut self, input: Option<Value>, ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        let message = match (&self.message, input) {
            (Some(message), _) => message.to_string(),
            (None, Some(input)) => input.to_string(),
            (None, None) => return Ok(()),
        };
        let mut record = ErrorRecord::new(ErrorCategory::Runtime, message);
        if let Some(target) = &self.target {
            record = record.with_target(target.clone());
        }
        ctx.error(record);
        Ok(())
    }
}

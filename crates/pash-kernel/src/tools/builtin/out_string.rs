//! Out-String: render the input as text.

use async_trait::async_trait;
use pash_types::{ErrorRecord, Value};

use crate::format::render_lines;
use crate::interpreter::EvalResult;
use crate::tools::{Builtin, BuiltinArgs, BuiltinInstance, BuiltinSchema, ExecContext, ParamSchema};

pub struct OutString;

impl Builtin for OutString {
    fn name(&self) -> &str {
        "Out-String"
    }

    fn schema(&self) -> BuiltinSchema {
        BuiltinSchema::new("Out-String", "Render objects as a string")
            .param(ParamSchema::value("InputObject", "Objects to render").at(0))
            .param(ParamSchema::switch("Stream", "Emit one string per line"))
    }

    fn instantiate(&self, args: BuiltinArgs) -> Result<Box<dyn BuiltinInstance>, ErrorRecord> {
        Ok(Box::new(Instance {
            input: args.get("InputObject").cloned(),
            stream: args.has("Stream"),
            values: Vec::new(),
        }))
    }
}

struct Instance {
    input: Option<Value>,
    stream: bool,
    values: Vec<Value>,
}

#[async_trait]
impl BuiltinInstance for Instance {
    async fn process(&mut self, input: Option<Value>, _ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        if let Some(value) = input.or_else(|| self.input.take()) {
            self.values.extend(value.unroll());
        }
        Ok(())
    }

    async fn end(&mut self, ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        let lines = render_lines(&std::mem::take(&mut self.values));
        if self.stream {
            for line in lines {
                ctx.emit(Value::from(line)).await?;
            }
            return Ok(());
        }
        let mut text = lines.join("\n");
        text.push('\n');
        ctx.emit(Value::from(text)).await
    }
}

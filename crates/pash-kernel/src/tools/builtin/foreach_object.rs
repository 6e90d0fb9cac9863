//! ForEach-Object: run a script block for every input.

use async_trait::async_trait;
use pash_types::{ErrorCategory, ErrorRecord, ScriptBlockRef, Value};

use crate::interpreter::{members, EvalResult};
use crate::tools::{Builtin, BuiltinArgs, BuiltinInstance, BuiltinSchema, ExecContext, ParamSchema};

pub struct ForEachObject;

impl Builtin for ForEachObject {
    fn name(&self) -> &str {
        "ForEach-Object"
    }

    fn aliases(&self) -> &[&'static str] {
        &["foreach", "%"]
    }

    fn schema(&self) -> BuiltinSchema {
        BuiltinSchema::new("ForEach-Object", "Run a script block for each input object")
            .param(ParamSchema::value("Process", "Block run per object, or a member name").at(0))
            .param(ParamSchema::value("Begin", "Block run before the first object"))
            .param(ParamSchema::value("End", "Block run after the last object"))
    }

    fn instantiate(&self, args: BuiltinArgs) -> Result<Box<dyn BuiltinInstance>, ErrorRecord> {
        let process = match args.get("Process") {
            Some(value) => match value.as_script_block() {
                Some(block) => Action::Block(block.clone()),
                None => Action::Member(value.to_string()),
            },
            None => Action::Nothing,
        };
        Ok(Box::new(Instance {
            begin: block_arg(&args, "Begin")?,
            process,
            end: block_arg(&args, "End")?,
        }))
    }
}

/// A parameter that must hold a script block when given.
pub(super) fn block_arg(args: &BuiltinArgs, name: &str) -> Result<Option<ScriptBlockRef>, ErrorRecord> {
    match args.get(name) {
        None => Ok(None),
        Some(value) => match value.as_script_block() {
            Some(block) => Ok(Some(block.clone())),
            None => Err(ErrorRecord::new(
                ErrorCategory::InvalidCast,
                format!("Cannot convert '{}' to a script block for parameter '{}'", value, name),
            )),
        },
    }
}

enum Action {
    Block(ScriptBlockRef),
    /// `ForEach-Object Length`: read a member of each input.
    Member(String),
    Nothing,
}

struct Instance {
    begin: Option<ScriptBlockRef>,
    process: Action,
    end: Option<ScriptBlockRef>,
}

#[async_trait]
impl BuiltinInstance for Instance {
    async fn begin(&mut self, ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        match &self.begin {
            Some(block) => ctx.invoke(block, Value::null()).await,
            None => Ok(()),
        }
    }

    async fn process(&mut self, input: Option<Value>, ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        let input = input.unwrap_or_default();
        match &self.process {
            Action::Block(block) => ctx.invoke(block, input).await,
            Action::Member(name) => {
                let value = members::get_member(&input, name, ctx.evaluator.session().host.as_ref())?;
                ctx.write(value).await
            }
            Action::Nothing => Ok(()),
        }
    }

    async fn end(&mut self, ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        match &self.end {
            Some(block) => ctx.invoke(block, Value::null()).await,
            None => Ok(()),
        }
    }
}

//! Out-Null: discard the input.

use async_trait::async_trait;
use pash_types::{ErrorRecord, Value};

use crate::interpreter::EvalResult;
use crate::tools::{Builtin, BuiltinArgs, BuiltinInstance, BuiltinSchema, ExecContext};

pub struct OutNull;

impl Builtin for OutNull {
    fn name(&self) -> &str {
        "Out-Null"
    }

    fn schema(&self) -> BuiltinSchema {
        BuiltinSchema::new("Out-Null", "Discard output")
    }

    fn instantiate(&self, _args: BuiltinArgs) -> Result<Box<dyn BuiltinInstance>, ErrorRecord> {
        Ok(Box::new(Instance))
    }
}

struct Instance;

#[async_trait]
impl BuiltinInstance for Instance {
    async fn process(&mut self, _input: Option<Value>, _ctx: &mut ExecContext<'_>) -> EvalResult<()> {
        Ok(())
    }
}

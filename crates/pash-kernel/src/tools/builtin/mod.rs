//! Built-in commands for pash.
//!
//! These are always available and cover what scripts need to shape a
//! pipeline without leaving the process.

mod foreach_object;
mod measure_object;
mod out_null;
mod out_string;
mod select_object;
mod sort_object;
mod where_object;
mod write_error;
mod write_output;

use super::BuiltinRegistry;

/// Register all built-in commands with the registry.
pub fn register_builtins(registry: &mut BuiltinRegistry) {
    registry.register(foreach_object::ForEachObject);
    registry.register(measure_object::MeasureObject);
    registry.register(out_null::OutNull);
    registry.register(out_string::OutString);
    registry.register(select_object::SelectObject);
    registry.register(sort_object::SortObject);
    registry.register(where_object::WhereObject);
    registry.register(write_error::WriteError);
    registry.register(write_output::WriteOutput);
}

//! Builtin lookup by name or alias.

use std::collections::HashMap;
use std::sync::Arc;

use super::traits::{Builtin, BuiltinSchema};

/// Builtins keyed by lowercased name and alias.
#[derive(Default, Clone)]
pub struct BuiltinRegistry {
    builtins: HashMap<String, Arc<dyn Builtin>>,
    /// Canonical names in registration order, for listings.
    names: Vec<String>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a builtin under its name and every alias. A later
    /// registration with the same name replaces the earlier one.
    pub fn register(&mut self, builtin: impl Builtin + 'static) {
        self.register_arc(Arc::new(builtin));
    }

    pub fn register_arc(&mut self, builtin: Arc<dyn Builtin>) {
        let name = builtin.name().to_string();
        tracing::trace!(builtin = %name, "register builtin");
        for alias in builtin.aliases() {
            self.builtins.insert(alias.to_ascii_lowercase(), builtin.clone());
        }
        if !self.names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
            self.names.push(name.clone());
        }
        self.builtins.insert(name.to_ascii_lowercase(), builtin);
    }

    /// Look up a builtin, case-insensitively.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Builtin>> {
        self.builtins.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builtins.contains_key(&name.to_ascii_lowercase())
    }

    /// Canonical builtin names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn schemas(&self) -> Vec<BuiltinSchema> {
        self.names
            .iter()
            .filter_map(|name| self.get(name))
            .map(|builtin| builtin.schema())
            .collect()
    }
}

impl std::fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinRegistry").field("names", &self.names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::register_builtins;

    #[test]
    fn names_and_aliases_are_case_insensitive() {
        let mut registry = BuiltinRegistry::new();
        register_builtins(&mut registry);
        assert!(registry.contains("write-output"));
        assert!(registry.contains("ECHO"));
        assert_eq!(
            registry.get("foreach").map(|b| b.name().to_string()).as_deref(),
            Some("ForEach-Object")
        );
        assert!(registry.get("Get-Nothing").is_none());
        assert_eq!(registry.names().len(), registry.schemas().len());
    }
}

//! Command resolution: what a command name refers to.
//!
//! Every command element of a pipeline is resolved once, before the
//! pipeline starts, in this order:
//!
//! ```text
//! name ──▶ function in scope ──▶ builtin (name or alias) ──▶ executable ──▶ CommandNotFound
//! ```
//!
//! Path-like names (`./run.sh`, `/bin/ls`) skip the search path and are
//! checked directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pash_types::{ErrorRecord, ScriptBlockRef};

use crate::ast::FunctionDef;
use crate::interpreter::Evaluator;
use crate::tools::Builtin;

/// What a command name resolved to.
pub enum Resolved {
    Function(Arc<FunctionDef>),
    Builtin(Arc<dyn Builtin>),
    External(PathBuf),
    /// `& $block`
    ScriptBlock(ScriptBlockRef),
}

impl Resolved {
    pub fn kind(&self) -> &'static str {
        match self {
            Resolved::Function(_) => "function",
            Resolved::Builtin(_) => "builtin",
            Resolved::External(_) => "external",
            Resolved::ScriptBlock(_) => "script block",
        }
    }
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolved::Function(def) => f.debug_tuple("Function").field(&def.name).finish(),
            Resolved::Builtin(b) => f.debug_tuple("Builtin").field(&b.name()).finish(),
            Resolved::External(path) => f.debug_tuple("External").field(path).finish(),
            Resolved::ScriptBlock(_) => f.write_str("ScriptBlock"),
        }
    }
}

/// Resolves command names against an evaluator's scope and session.
pub struct CommandResolver;

impl CommandResolver {
    #[tracing::instrument(level = "debug", skip(evaluator), ret)]
    pub fn resolve(name: &str, evaluator: &Evaluator) -> Result<Resolved, ErrorRecord> {
        if let Some(def) = evaluator.scope().function(name) {
            return Ok(Resolved::Function(def));
        }

        let builtin = evaluator
            .session()
            .builtins
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name);
        if let Some(builtin) = builtin {
            return Ok(Resolved::Builtin(builtin));
        }

        if let Some(path) = find_executable(name, &evaluator.session().search_path) {
            return Ok(Resolved::External(path));
        }

        Err(ErrorRecord::command_not_found(name))
    }
}

fn is_path_like(name: &str) -> bool {
    name.contains('/') || name.contains(std::path::MAIN_SEPARATOR)
}

/// Find an executable by name: directly for path-like names, otherwise in
/// each search directory in order.
pub fn find_executable(name: &str, search_path: &[PathBuf]) -> Option<PathBuf> {
    if is_path_like(name) {
        let path = PathBuf::from(name);
        return is_executable(&path).then_some(path);
    }
    search_path
        .iter()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|path| is_executable(path))
}

fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|metadata| metadata.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Split a `PATH`-style variable into directories.
pub fn split_search_path(path_var: &str) -> Vec<PathBuf> {
    std::env::split_paths(path_var).collect()
}

//! Variable and function scopes.
//!
//! A [`Scope`] is a chain of frames, innermost last. Frame 0 is the
//! global frame; `global:` and `script:` qualified names go there. Reads
//! walk the chain outward, unqualified writes land in the innermost frame.
//!
//! Frames are `Arc<RwLock<_>>` so a child scope handed to a pipeline stage
//! on another task still sees (and can write through `global:`) the frames
//! it was created from. Locks are only held for the duration of a lookup
//! and never across an `.await`.
//!
//! A dot-sourced script block gets an overlay frame that holds only its
//! automatic variables (`$_`, `$args`). Reads see the overlay first; writes
//! skip it and land in the caller's frame. Every invocation gets its own
//! overlay, so two stages running the caller's blocks never share a `$_`.
//!
//! Names are case-insensitive: `$Count` and `$count` are one variable.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pash_types::Value;

use crate::ast::{FunctionDef, VarRef, VarScope};

/// Name of the session flag that forces external process output to be
/// collected after the process exits.
pub const FORCE_SYNC_PROCESS_OUTPUT: &str = "ForceSynchronizeProcessOutput";

/// Exit status of the last external program.
pub const LAST_EXIT_CODE: &str = "LASTEXITCODE";

#[derive(Debug, Clone)]
struct Variable {
    /// Spelling of the first assignment, kept for listings.
    name: String,
    value: Value,
}

#[derive(Debug, Default)]
struct Frame {
    variables: HashMap<String, Variable>,
    functions: HashMap<String, Arc<FunctionDef>>,
    /// `$env:` writes. Only used in the global frame; the process
    /// environment itself is never modified.
    env: HashMap<String, String>,
    /// Automatic-variable overlay; ordinary writes pass through it.
    overlay: bool,
}

type SharedFrame = Arc<RwLock<Frame>>;

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn read(frame: &SharedFrame) -> RwLockReadGuard<'_, Frame> {
    frame.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write(frame: &SharedFrame) -> RwLockWriteGuard<'_, Frame> {
    frame.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Chain of variable frames.
#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<SharedFrame>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// A scope with only the global frame.
    pub fn new() -> Self {
        Self {
            frames: vec![SharedFrame::default()],
        }
    }

    /// A child scope: the same frames plus a fresh local frame.
    pub fn child(&self) -> Self {
        let mut frames = self.frames.clone();
        frames.push(SharedFrame::default());
        Self { frames }
    }

    /// The same frames plus an overlay for a dot-sourced invocation's
    /// automatic variables.
    pub fn dot_sourced(&self) -> Self {
        let mut frames = self.frames.clone();
        frames.push(Arc::new(RwLock::new(Frame {
            overlay: true,
            ..Frame::default()
        })));
        Self { frames }
    }

    /// Number of frames, global included.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn global(&self) -> &SharedFrame {
        &self.frames[0]
    }

    /// Innermost frame that takes ordinary writes.
    fn local(&self) -> &SharedFrame {
        self.frames
            .iter()
            .rev()
            .find(|frame| !read(frame).overlay)
            .unwrap_or_else(|| self.global())
    }

    fn innermost(&self) -> &SharedFrame {
        // `frames` always holds at least the global frame
        &self.frames[self.frames.len() - 1]
    }

    /// Look up a variable reference, honouring its scope modifier.
    pub fn get(&self, var: &VarRef) -> Option<Value> {
        match var.scope {
            VarScope::Any => self.get_name(&var.name),
            VarScope::Local => Self::lookup(self.local(), &var.name),
            VarScope::Global | VarScope::Script => Self::lookup(self.global(), &var.name),
            VarScope::Env => self.env(&var.name).map(Value::from),
        }
    }

    /// Look up an unqualified name from the innermost frame outward.
    pub fn get_name(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| Self::lookup(frame, name))
    }

    fn lookup(frame: &SharedFrame, name: &str) -> Option<Value> {
        read(frame).variables.get(&key(name)).map(|v| v.value.clone())
    }

    /// Assign through a variable reference.
    pub fn set(&self, var: &VarRef, value: Value) {
        match var.scope {
            VarScope::Any | VarScope::Local => Self::store(self.local(), &var.name, value),
            VarScope::Global | VarScope::Script => Self::store(self.global(), &var.name, value),
            VarScope::Env => {
                write(self.global())
                    .env
                    .insert(var.name.clone(), value.to_string());
            }
        }
    }

    /// Assign an unqualified name in the innermost frame.
    pub fn set_local(&self, name: &str, value: Value) {
        Self::store(self.local(), name, value);
    }

    /// Bind an automatic variable (`$_`, `$args`, `$input`) in the
    /// innermost frame, overlay or not.
    pub fn set_automatic(&self, name: &str, value: Value) {
        Self::store(self.innermost(), name, value);
    }

    /// Assign a name in the global frame.
    pub fn set_global(&self, name: &str, value: Value) {
        Self::store(self.global(), name, value);
    }

    fn store(frame: &SharedFrame, name: &str, value: Value) {
        let mut frame = write(frame);
        let entry = frame.variables.entry(key(name)).or_insert_with(|| Variable {
            name: name.to_string(),
            value: Value::null(),
        });
        entry.value = value;
    }

    /// Remove the innermost binding of a name.
    pub fn remove(&self, name: &str) -> Option<Value> {
        let k = key(name);
        self.frames
            .iter()
            .rev()
            .find_map(|frame| write(frame).variables.remove(&k))
            .map(|v| v.value)
    }

    /// Read a boolean session flag. Unset flags are false.
    pub fn get_flag(&self, name: &str) -> bool {
        self.get_name(name).map(|v| v.is_truthy()).unwrap_or(false)
    }

    /// `$env:NAME`: overlay first, then the process environment.
    pub fn env(&self, name: &str) -> Option<String> {
        let overlay = read(self.global()).env.get(name).cloned();
        overlay.or_else(|| std::env::var(name).ok())
    }

    /// Environment overrides made by scripts, for child processes.
    pub fn env_overrides(&self) -> Vec<(String, String)> {
        read(self.global())
            .env
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Define a function in the innermost frame.
    pub fn define_function(&self, def: Arc<FunctionDef>) {
        write(self.local()).functions.insert(key(&def.name), def);
    }

    /// Find a function from the innermost frame outward.
    pub fn function(&self, name: &str) -> Option<Arc<FunctionDef>> {
        let k = key(name);
        self.frames
            .iter()
            .rev()
            .find_map(|frame| read(frame).functions.get(&k).cloned())
    }

    /// Every visible variable, inner bindings shadowing outer ones, sorted
    /// by name.
    pub fn all(&self) -> Vec<(String, Value)> {
        let mut seen: HashMap<String, (String, Value)> = HashMap::new();
        for frame in &self.frames {
            for (k, var) in read(frame).variables.iter() {
                seen.insert(k.clone(), (var.name.clone(), var.value.clone()));
            }
        }
        let mut vars: Vec<(String, Value)> = seen.into_values().collect();
        vars.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()));
        vars
    }
}

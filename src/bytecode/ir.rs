use crate::bytecode::Op;
use crate::bytecode::scope::{ScopeTable, VarKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which part of a movie a script belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScriptType {
    Movie,
    Score,
    Cast,
    /// Primary event handlers installed with `when`.
    Global,
}

/// A compiled handler (`on`, `macro` or factory `method`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handler {
    pub name: String,
    /// Parameter names in call order. Methods start with `me`.
    pub args: Vec<String>,
    pub nargs: u32,
    pub code: Vec<Op>,
    /// Variable classes resolved while compiling the body.
    pub vars: ScopeTable,
}

impl Handler {
    pub fn var_kind(&self, name: &str) -> Option<VarKind> {
        self.vars.kind(name)
    }
}

/// `factory Name` with its methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Factory {
    pub name: String,
    pub methods: BTreeMap<String, Handler>,
}

/// Everything compiled from one script source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptContext {
    pub script_type: ScriptType,
    pub id: i32,
    /// Keyed by lowercased handler name.
    pub handlers: BTreeMap<String, Handler>,
    pub factories: BTreeMap<String, Factory>,
    /// Top-level statements outside any definition.
    pub script: Vec<Op>,
    /// Declared `property` and `instance` names.
    pub properties: Vec<String>,
    /// Globals created while classifying names.
    pub globals: Vec<String>,
}

impl ScriptContext {
    pub fn new(script_type: ScriptType, id: i32) -> Self {
        Self {
            script_type,
            id,
            handlers: BTreeMap::new(),
            factories: BTreeMap::new(),
            script: Vec::new(),
            properties: Vec::new(),
            globals: Vec::new(),
        }
    }

    pub fn handler(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(&name.to_ascii_lowercase())
    }

    pub fn has_handler(&self, name: &str) -> bool {
        self.handler(name).is_some()
    }

    pub fn add_handler(&mut self, handler: Handler) {
        self.handlers
            .insert(handler.name.to_ascii_lowercase(), handler);
    }

    pub fn method(&self, factory: &str, name: &str) -> Option<&Handler> {
        self.factories
            .get(&factory.to_ascii_lowercase())?
            .methods
            .get(&name.to_ascii_lowercase())
    }
}

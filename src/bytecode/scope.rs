use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Storage class of a variable inside one definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Global,
    Local,
    Property,
    Instance,
    Argument,
}

/// Name -> kind map for the definition being compiled.
///
/// Lingo names are case-insensitive, so keys are stored lowercased. The first
/// classification of a name wins; later ones are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScopeTable {
    vars: BTreeMap<String, VarKind>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table for a new definition: inherits the enclosing globals and
    /// properties, plus every name in `instances` as an instance variable.
    pub fn seeded_from<'a>(
        parent: &ScopeTable,
        instances: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let mut vars: BTreeMap<String, VarKind> = parent
            .vars
            .iter()
            .filter(|(_, kind)| matches!(kind, VarKind::Global | VarKind::Property))
            .map(|(name, kind)| (name.clone(), *kind))
            .collect();
        for name in instances {
            vars.insert(name.to_ascii_lowercase(), VarKind::Instance);
        }
        Self { vars }
    }

    /// Records `name` as `kind` unless it is already known.
    ///
    /// Returns `true` when this call created the entry.
    pub fn classify(&mut self, name: &str, kind: VarKind) -> bool {
        let key = name.to_ascii_lowercase();
        if self.vars.contains_key(&key) {
            return false;
        }
        self.vars.insert(key, kind);
        true
    }

    /// Overwrites an entry. Only used for the implicit `me` of a method.
    pub fn force(&mut self, name: &str, kind: VarKind) {
        self.vars.insert(name.to_ascii_lowercase(), kind);
    }

    pub fn kind(&self, name: &str) -> Option<VarKind> {
        self.vars.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &VarKind)> {
        self.vars.iter()
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::bytecode::{CompileResult, Compiler, ScriptContext, ScriptType};
use crate::events::LEvent;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("cannot encode archive: {0}")]
    Encode(#[source] postcard::Error),
    #[error("cannot decode archive: {0}")]
    Decode(#[source] postcard::Error),
}

/// The two handler partitions, consulted main first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchiveKind {
    Main,
    Shared,
}

/// Where the handler for an (event, entity) key lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHandlerEntry {
    pub script_type: ScriptType,
    pub entity: i32,
    /// Handler name as written in the source.
    pub name: String,
}

/// A resolved event handler, including the archive it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerRef {
    pub archive: ArchiveKind,
    pub entry: EventHandlerEntry,
}

/// Compiled scripts of one partition plus the event index over them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Archive {
    /// Per script type, ordered by entity id (cast order).
    pub script_contexts: BTreeMap<ScriptType, BTreeMap<i32, ScriptContext>>,
    /// Keyed by entity id alone: a later script with the same id replaces
    /// the entry, whatever its script type.
    pub event_handlers: BTreeMap<(LEvent, i32), EventHandlerEntry>,
    /// Source of `when` handlers.
    pub primary_event_handlers: BTreeMap<LEvent, String>,
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_context(&self, script_type: ScriptType, entity: i32) -> Option<&ScriptContext> {
        self.script_contexts.get(&script_type)?.get(&entity)
    }

    /// Movie scripts in cast order.
    pub fn movie_scripts(&self) -> impl Iterator<Item = &ScriptContext> {
        self.script_contexts
            .get(&ScriptType::Movie)
            .into_iter()
            .flat_map(|contexts| contexts.values())
    }

    pub fn event_handler(&self, event: LEvent, entity: i32) -> Option<&EventHandlerEntry> {
        self.event_handlers.get(&(event, entity))
    }

    /// Stores a compiled context and indexes every handler named after an
    /// event under (event, context id).
    pub fn add_context(&mut self, context: ScriptContext) {
        for handler in context.handlers.values() {
            if let Some(event) = LEvent::from_name(&handler.name) {
                debug!(
                    "registering {} handler for {:?} {}",
                    event, context.script_type, context.id
                );
                self.event_handlers.insert(
                    (event, context.id),
                    EventHandlerEntry {
                        script_type: context.script_type,
                        entity: context.id,
                        name: handler.name.clone(),
                    },
                );
            }
        }
        self.script_contexts
            .entry(context.script_type)
            .or_default()
            .insert(context.id, context);
    }

    pub fn clear(&mut self) {
        self.script_contexts.clear();
        self.event_handlers.clear();
        self.primary_event_handlers.clear();
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArchiveError> {
        postcard::to_allocvec(self).map_err(ArchiveError::Encode)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        postcard::from_bytes(bytes).map_err(ArchiveError::Decode)
    }
}

/// Main and shared archives, with the one new code goes to by default.
#[derive(Debug, Default)]
pub struct Archives {
    main: Archive,
    shared: Archive,
    current: Option<ArchiveKind>,
}

impl Archives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: ArchiveKind) -> &Archive {
        match kind {
            ArchiveKind::Main => &self.main,
            ArchiveKind::Shared => &self.shared,
        }
    }

    pub fn get_mut(&mut self, kind: ArchiveKind) -> &mut Archive {
        match kind {
            ArchiveKind::Main => &mut self.main,
            ArchiveKind::Shared => &mut self.shared,
        }
    }

    pub fn current_kind(&self) -> ArchiveKind {
        self.current.unwrap_or(ArchiveKind::Main)
    }

    pub fn current(&self) -> &Archive {
        self.get(self.current_kind())
    }

    pub fn set_current(&mut self, kind: ArchiveKind) {
        self.current = Some(kind);
    }

    /// Compiles `source` as script `entity` of `script_type`. The result is
    /// stored only when compilation had no error.
    pub fn add_code(
        &mut self,
        compiler: &Compiler,
        source: &str,
        kind: ArchiveKind,
        script_type: ScriptType,
        entity: i32,
    ) -> CompileResult {
        let result = compiler.compile_script(source, script_type, entity);
        if result.had_error() {
            debug!(
                "discarding {:?} script {}: {} error(s)",
                script_type,
                entity,
                result.errors().count()
            );
        } else {
            self.get_mut(kind).add_context(result.script.clone());
        }
        result
    }

    /// Installs `code` as the primary handler for `event`: a global script
    /// in the main archive keyed by the event id.
    pub fn set_primary_event_handler(
        &mut self,
        compiler: &Compiler,
        event: LEvent,
        code: &str,
    ) -> CompileResult {
        debug!("setting primary event handler ({})", event);
        self.main
            .primary_event_handlers
            .insert(event, code.to_string());
        self.add_code(
            compiler,
            code,
            ArchiveKind::Main,
            ScriptType::Global,
            event.id() as i32,
        )
    }

    pub fn primary_handler_script(&self, event: LEvent) -> Option<&ScriptContext> {
        self.main
            .script_context(ScriptType::Global, event.id() as i32)
    }

    /// Main archive first, then shared.
    pub fn lookup_event_handler(&self, event: LEvent, entity: i32) -> Option<HandlerRef> {
        [ArchiveKind::Main, ArchiveKind::Shared]
            .into_iter()
            .find_map(|kind| {
                self.get(kind)
                    .event_handler(event, entity)
                    .map(|entry| HandlerRef {
                        archive: kind,
                        entry: entry.clone(),
                    })
            })
    }

    /// Movie teardown.
    pub fn clear(&mut self) {
        self.main.clear();
        self.shared.clear();
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::CompilerOptions;

    fn compiler() -> Compiler {
        Compiler::new(CompilerOptions::default())
    }

    #[test]
    fn test_add_code_indexes_event_handlers() {
        let mut archives = Archives::new();
        let result = archives.add_code(
            &compiler(),
            "on mouseUp\n  put 1\nend\non helper\nend",
            ArchiveKind::Main,
            ScriptType::Cast,
            5,
        );
        assert!(!result.had_error());
        let found = archives.lookup_event_handler(LEvent::MouseUp, 5).unwrap();
        assert_eq!(found.archive, ArchiveKind::Main);
        assert_eq!(found.entry.name, "mouseUp");
        assert!(archives.current().script_context(ScriptType::Cast, 5).is_some());
        assert_eq!(archives.current().event_handlers.len(), 1);
    }

    #[test]
    fn test_same_id_scripts_share_event_entry() {
        let mut archives = Archives::new();
        let cast = "on mouseUp\n  put 1\nend";
        let movie = "on mouseUp\n  put 2\nend";
        for (source, script_type) in [(cast, ScriptType::Cast), (movie, ScriptType::Movie)] {
            let result = archives.add_code(&compiler(), source, ArchiveKind::Main, script_type, 5);
            assert!(!result.had_error());
        }
        let found = archives.lookup_event_handler(LEvent::MouseUp, 5).unwrap();
        assert_eq!(found.entry.script_type, ScriptType::Movie);
        assert_eq!(archives.current().event_handlers.len(), 1);
        // both contexts are still stored
        assert!(archives.current().script_context(ScriptType::Cast, 5).is_some());
        assert!(archives.current().script_context(ScriptType::Movie, 5).is_some());
    }

    #[test]
    fn test_add_code_discards_on_error() {
        let mut archives = Archives::new();
        let result = archives.add_code(
            &compiler(),
            "on mouseUp\n  put (\nend",
            ArchiveKind::Main,
            ScriptType::Cast,
            5,
        );
        assert!(result.had_error());
        assert!(archives.lookup_event_handler(LEvent::MouseUp, 5).is_none());
        assert!(archives.current().script_contexts.is_empty());
    }

    #[test]
    fn test_lookup_falls_back_to_shared() {
        let mut archives = Archives::new();
        archives.add_code(
            &compiler(),
            "on exitFrame\nend",
            ArchiveKind::Shared,
            ScriptType::Score,
            2,
        );
        let found = archives.lookup_event_handler(LEvent::ExitFrame, 2).unwrap();
        assert_eq!(found.archive, ArchiveKind::Shared);
    }

    #[test]
    fn test_primary_handler_is_global_script() {
        let mut archives = Archives::new();
        let result =
            archives.set_primary_event_handler(&compiler(), LEvent::MouseDown, "go to frame 3");
        assert!(!result.had_error());
        assert!(archives.primary_handler_script(LEvent::MouseDown).is_some());
        assert_eq!(
            archives.get(ArchiveKind::Main).primary_event_handlers[&LEvent::MouseDown],
            "go to frame 3"
        );
    }

    #[test]
    fn test_movie_scripts_in_cast_order() {
        let mut archives = Archives::new();
        for id in [9, 3, 7] {
            archives.add_code(&compiler(), "on startMovie\nend", ArchiveKind::Main, ScriptType::Movie, id);
        }
        let ids: Vec<i32> = archives.current().movie_scripts().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 7, 9]);
    }

    #[test]
    fn test_postcard_round_trip() {
        let mut archives = Archives::new();
        archives.add_code(
            &compiler(),
            "global g\non mouseUp\n  put [1, #a, \"s\", 2.5] into g\nend",
            ArchiveKind::Main,
            ScriptType::Movie,
            1,
        );
        let archive = archives.get(ArchiveKind::Main);
        let bytes = archive.to_bytes().unwrap();
        let decoded = Archive::from_bytes(&bytes).unwrap();
        assert_eq!(&decoded, archive);
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(
            Archive::from_bytes(&[0xff, 0xff, 0xff]),
            Err(ArchiveError::Decode(_))
        ));
    }

    #[test]
    fn test_clear() {
        let mut archives = Archives::new();
        archives.add_code(&compiler(), "on idle\nend", ArchiveKind::Main, ScriptType::Score, 1);
        archives.set_current(ArchiveKind::Shared);
        archives.clear();
        assert_eq!(archives.current_kind(), ArchiveKind::Main);
        assert!(archives.lookup_event_handler(LEvent::Idle, 1).is_none());
    }
}

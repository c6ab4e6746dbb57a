use std::collections::VecDeque;

use crate::bytecode::ScriptType;
use crate::events::LEvent;

/// One pending (event, entity) dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEvent {
    pub event: LEvent,
    pub script_type: ScriptType,
    pub entity: i32,
    /// Sprite channel the event came from, 0 when not sprite-bound.
    pub channel: i32,
    /// Registration call that produced this entry.
    pub raise: u64,
}

/// FIFO of pending dispatches, drained to empty by the dispatcher.
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: VecDeque<QueuedEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: QueuedEvent) {
        self.pending.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<QueuedEvent> {
        self.pending.pop_front()
    }

    pub fn peek(&self) -> Option<&QueuedEvent> {
        self.pending.front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &QueuedEvent> {
        self.pending.iter()
    }
}

//! Event routing: which scripts see a raised event, and in what order.

pub mod archive;
pub mod dispatch;
pub mod event;
pub mod queue;

pub use archive::{Archive, ArchiveError, ArchiveKind, Archives, EventHandlerEntry, HandlerRef};
pub use dispatch::{
    DispatchError, DispatchReport, DispatcherConfig, EventDispatcher, HandlerExecutor, Score,
    Signals, SpriteInfo,
};
pub use event::{EventCategory, LEvent};
pub use queue::{EventQueue, QueuedEvent};

use serde::{Deserialize, Serialize};

use crate::events::DispatchError;

/// Every event the engine can raise.
///
/// The numeric id is stable and is used as the entity id of primary event
/// handler scripts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(u16)]
pub enum LEvent {
    PrepareMovie,
    StartMovie,
    StepMovie,
    StopMovie,

    NewSprite,
    BeginSprite,
    EndSprite,

    EnterFrame,
    PrepareFrame,
    Idle,
    StepFrame,
    ExitFrame,

    ActivateWindow,
    DeactivateWindow,
    MoveWindow,
    ResizeWindow,
    OpenWindow,
    CloseWindow,
    Start,

    KeyUp,
    KeyDown,
    MouseUp,
    MouseDown,
    RightMouseDown,
    RightMouseUp,
    MouseEnter,
    MouseLeave,
    MouseUpOutSide,
    MouseWithin,

    Timeout,

    StartUp,

    /// Pseudo-event that runs a legacy script body directly.
    None,
}

/// Named events in table order. `None` has no handler name.
const EVENT_TABLE: &[(LEvent, &str)] = &[
    (LEvent::PrepareMovie, "prepareMovie"),
    (LEvent::StartMovie, "startMovie"),
    (LEvent::StepMovie, "stepMovie"),
    (LEvent::StopMovie, "stopMovie"),
    (LEvent::NewSprite, "newSprite"),
    (LEvent::BeginSprite, "beginSprite"),
    (LEvent::EndSprite, "endSprite"),
    (LEvent::EnterFrame, "enterFrame"),
    (LEvent::PrepareFrame, "prepareFrame"),
    (LEvent::Idle, "idle"),
    (LEvent::StepFrame, "stepFrame"),
    (LEvent::ExitFrame, "exitFrame"),
    (LEvent::ActivateWindow, "activateWindow"),
    (LEvent::DeactivateWindow, "deactivateWindow"),
    (LEvent::MoveWindow, "moveWindow"),
    (LEvent::ResizeWindow, "resizeWindow"),
    (LEvent::OpenWindow, "openWindow"),
    (LEvent::CloseWindow, "closeWindow"),
    (LEvent::Start, "start"),
    (LEvent::KeyUp, "keyUp"),
    (LEvent::KeyDown, "keyDown"),
    (LEvent::MouseUp, "mouseUp"),
    (LEvent::MouseDown, "mouseDown"),
    (LEvent::RightMouseDown, "rightMouseDown"),
    (LEvent::RightMouseUp, "rightMouseUp"),
    (LEvent::MouseEnter, "mouseEnter"),
    (LEvent::MouseLeave, "mouseLeave"),
    (LEvent::MouseUpOutSide, "mouseUpOutSide"),
    (LEvent::MouseWithin, "mouseWithin"),
    (LEvent::Timeout, "timeout"),
    (LEvent::StartUp, "startUp"),
];

/// How an event propagates when it is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    /// Primary handler, then sprite, cast, frame and movie scripts.
    Input,
    /// Frame script, then movie scripts.
    Frame,
    /// Movie scripts only.
    Generic,
    /// Cast script of every enabled sprite.
    Sprite,
    /// Not routed anywhere.
    Unhandled,
}

impl LEvent {
    pub fn id(self) -> u16 {
        self as u16
    }

    /// Handler name, `None` for the pseudo-event.
    pub fn name(self) -> Option<&'static str> {
        EVENT_TABLE
            .iter()
            .find(|(event, _)| *event == self)
            .map(|(_, name)| *name)
    }

    /// Looks up an event by handler name, ignoring case.
    pub fn from_name(name: &str) -> Option<LEvent> {
        EVENT_TABLE
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(event, _)| *event)
    }

    /// All events including the pseudo-event, in id order.
    pub fn all() -> impl Iterator<Item = LEvent> {
        EVENT_TABLE
            .iter()
            .map(|(event, _)| *event)
            .chain(std::iter::once(LEvent::None))
    }

    pub fn category(self) -> EventCategory {
        use LEvent::*;
        match self {
            KeyUp | KeyDown | MouseUp | MouseDown => EventCategory::Input,
            Idle | EnterFrame | ExitFrame | PrepareFrame | Timeout | None => EventCategory::Frame,
            Start | StartUp | StartMovie | StopMovie | PrepareMovie => EventCategory::Generic,
            BeginSprite => EventCategory::Sprite,
            _ => EventCategory::Unhandled,
        }
    }

    /// Events that consult the primary (`when`) handler first.
    pub fn has_primary_handler(self) -> bool {
        matches!(
            self,
            LEvent::MouseDown | LEvent::MouseUp | LEvent::KeyUp | LEvent::KeyDown | LEvent::Timeout
        )
    }
}

impl TryFrom<u16> for LEvent {
    type Error = DispatchError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        LEvent::all()
            .find(|event| event.id() == id)
            .ok_or(DispatchError::UnknownEvent(id))
    }
}

impl std::fmt::Display for LEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name().unwrap_or("none"))
    }
}

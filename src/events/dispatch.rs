use std::collections::VecDeque;

use thiserror::Error;
use tracing::{debug, warn};

use crate::bytecode::{CompileResult, Compiler, CompilerOptions, ScriptType};
use crate::events::{
    EventCategory, LEvent,
    archive::{ArchiveKind, Archives, HandlerRef},
    queue::{EventQueue, QueuedEvent},
};
use crate::runtime::runtime_error::RuntimeError;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown event id {0}")]
    UnknownEvent(u16),
    #[error("handler failed while dispatching {event}: {source}")]
    Handler {
        event: LEvent,
        #[source]
        source: RuntimeError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub version: u16,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { version: 4 }
    }
}

/// A sprite as the score reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpriteInfo {
    pub channel: i32,
    /// Sprite (score) script id, 0 when the sprite has none.
    pub script_id: i32,
    pub cast_id: i32,
    /// Legacy scripts of immediate sprites run on mouse down.
    pub immediate: bool,
}

/// What the dispatcher needs to know about the playing score.
pub trait Score {
    fn current_frame(&self) -> i32;
    /// Frame script id of the current frame.
    fn frame_action_id(&self) -> i32;
    /// The sprite under the mouse, if any.
    fn mouse_sprite(&self) -> Option<SpriteInfo>;
    fn enabled_sprites(&self) -> Vec<SpriteInfo>;
    fn stop_play(&self) -> bool;
}

/// Side effects a handler run reports back to the dispatcher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signals {
    /// `dontPassEvent` was called.
    pub dont_pass: bool,
    /// Events raised while running; registered after the current entry.
    pub raised: Vec<LEvent>,
    /// `when <event> then <code>` installs.
    pub primary_handlers: Vec<(LEvent, String)>,
}

/// Runs compiled code on behalf of the dispatcher.
pub trait HandlerExecutor {
    fn execute_handler(
        &mut self,
        archives: &Archives,
        handler: &HandlerRef,
        event: LEvent,
    ) -> Result<Signals, RuntimeError>;

    /// Runs the top-level code of a script context.
    fn execute_script(
        &mut self,
        archives: &Archives,
        archive: ArchiveKind,
        script_type: ScriptType,
        entity: i32,
    ) -> Result<Signals, RuntimeError>;
}

/// Outcome of one `process_event` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// A primary handler stopped propagation.
    pub suppressed: bool,
    /// Handlers and scripts run while draining.
    pub executed: usize,
}

/// Routes raised events to handlers through a FIFO queue.
///
/// `register_event` decides which (event, entity) pairs should run and
/// queues them; `process_events` drains the queue. Neither recurses into the
/// other: events raised while draining are registered after the entry that
/// raised them and drained in the same loop.
pub struct EventDispatcher {
    config: DispatcherConfig,
    compiler: Compiler,
    archives: Archives,
    queue: EventQueue,
    /// Raised by a primary handler during the current registration.
    dont_pass: bool,
    raise_seq: u64,
    /// Registration whose remaining entries a handler cancelled.
    suppressed_raise: Option<u64>,
    deferred: VecDeque<LEvent>,
}

impl EventDispatcher {
    pub fn new(config: DispatcherConfig, options: CompilerOptions) -> Self {
        Self {
            config,
            compiler: Compiler::new(options),
            archives: Archives::new(),
            queue: EventQueue::new(),
            dont_pass: false,
            raise_seq: 0,
            suppressed_raise: None,
            deferred: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn archives(&self) -> &Archives {
        &self.archives
    }

    pub fn archives_mut(&mut self) -> &mut Archives {
        &mut self.archives
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn event_count(&self) -> usize {
        self.queue.len()
    }

    pub fn add_code(
        &mut self,
        source: &str,
        archive: ArchiveKind,
        script_type: ScriptType,
        entity: i32,
    ) -> CompileResult {
        self.archives
            .add_code(&self.compiler, source, archive, script_type, entity)
    }

    pub fn set_primary_event_handler(&mut self, event: LEvent, code: &str) -> CompileResult {
        self.archives
            .set_primary_event_handler(&self.compiler, event, code)
    }

    /// Movie teardown: drops queued events and every compiled script.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.deferred.clear();
        self.archives.clear();
        self.dont_pass = false;
        self.suppressed_raise = None;
    }

    /// Script type whose legacy body answers `event`, for old movies.
    pub fn event2script(&self, event: LEvent) -> Option<ScriptType> {
        if self.config.version < 4 && event == LEvent::EnterFrame {
            Some(ScriptType::Score)
        } else {
            None
        }
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Queues everything that should see `event`. Returns true when a
    /// primary handler stopped propagation.
    pub fn register_event(
        &mut self,
        event: LEvent,
        score: &dyn Score,
        executor: &mut dyn HandlerExecutor,
    ) -> Result<bool, DispatchError> {
        self.raise_seq += 1;
        debug!("registering {} (raise {})", event, self.raise_seq);

        let result = match event.category() {
            EventCategory::Input => self.register_input_event(event, score, executor),
            EventCategory::Frame => self.register_frame_event(event, score, executor),
            EventCategory::Generic => {
                self.run_movie_script(event);
                Ok(false)
            }
            EventCategory::Sprite => {
                self.register_sprite_event(event, score);
                Ok(false)
            }
            EventCategory::Unhandled => {
                warn!("registerEvent: unhandled event {}", event);
                Ok(false)
            }
        };

        self.dont_pass = false;
        result
    }

    fn enqueue(&mut self, event: LEvent, script_type: ScriptType, entity: i32, channel: i32) {
        debug!("queueing {} for {:?} {}", event, script_type, entity);
        self.queue.push(QueuedEvent {
            event,
            script_type,
            entity,
            channel,
            raise: self.raise_seq,
        });
    }

    /// Runs the `when` handler for `event`, if one is installed.
    fn primary_event_handler(
        &mut self,
        event: LEvent,
        executor: &mut dyn HandlerExecutor,
    ) -> Result<(), DispatchError> {
        if self.archives.primary_handler_script(event).is_none() {
            return Ok(());
        }
        debug!("calling primary event handler ({})", event);
        let signals = executor
            .execute_script(
                &self.archives,
                ArchiveKind::Main,
                ScriptType::Global,
                event.id() as i32,
            )
            .map_err(|source| DispatchError::Handler { event, source })?;
        if signals.dont_pass {
            self.dont_pass = true;
        }
        self.apply_signals(signals);
        Ok(())
    }

    /// Sprite, cast and frame scripts, then the movie. Old movies only route
    /// mouse clicks, as the legacy `none` pseudo-event.
    fn register_input_event(
        &mut self,
        event: LEvent,
        score: &dyn Score,
        executor: &mut dyn HandlerExecutor,
    ) -> Result<bool, DispatchError> {
        if event.has_primary_handler() {
            self.primary_event_handler(event, executor)?;
        }
        if self.dont_pass {
            debug!("{} stopped by primary handler", event);
            return Ok(true);
        }

        let sprite = score.mouse_sprite();
        if self.config.version > 3 {
            if let Some(sprite) = sprite {
                self.enqueue(event, ScriptType::Score, sprite.script_id, sprite.channel);
                self.enqueue(event, ScriptType::Cast, sprite.cast_id, sprite.channel);
            }
            self.enqueue(event, ScriptType::Score, score.frame_action_id(), 0);
        } else if matches!(event, LEvent::MouseDown | LEvent::MouseUp) {
            if let Some(sprite) = sprite {
                let run_script = (event == LEvent::MouseDown && sprite.immediate)
                    || (event == LEvent::MouseUp && !sprite.immediate);

                // a sprite script replaces the cast script
                if sprite.script_id != 0 {
                    if run_script {
                        self.enqueue(
                            LEvent::None,
                            ScriptType::Score,
                            sprite.script_id,
                            sprite.channel,
                        );
                    }
                } else {
                    if run_script {
                        self.enqueue(LEvent::None, ScriptType::Cast, sprite.cast_id, 0);
                    }
                    self.enqueue(event, ScriptType::Cast, sprite.cast_id, 0);
                }
            }
        }

        self.run_movie_script(event);
        Ok(false)
    }

    /// Frame script, then the movie. `timeout` asks the primary handler first.
    fn register_frame_event(
        &mut self,
        event: LEvent,
        score: &dyn Score,
        executor: &mut dyn HandlerExecutor,
    ) -> Result<bool, DispatchError> {
        if event.has_primary_handler() {
            self.primary_event_handler(event, executor)?;
        }
        if self.dont_pass {
            return Ok(true);
        }

        let entity = match event {
            LEvent::PrepareFrame | LEvent::Idle => score.current_frame(),
            _ => score.frame_action_id(),
        };
        self.enqueue(event, ScriptType::Score, entity, 0);
        self.run_movie_script(event);
        Ok(false)
    }

    fn register_sprite_event(&mut self, event: LEvent, score: &dyn Score) {
        for sprite in score.enabled_sprites() {
            self.enqueue(event, ScriptType::Cast, sprite.cast_id, sprite.channel);
        }
    }

    /// Queues the first movie script, in cast order, that handles `event`.
    fn run_movie_script(&mut self, event: LEvent) {
        if self.dont_pass {
            return;
        }
        let Some(name) = event.name() else {
            return;
        };
        let found = self
            .archives
            .current()
            .movie_scripts()
            .find(|ctx| ctx.has_handler(name))
            .map(|ctx| ctx.id);
        if let Some(id) = found {
            self.enqueue(event, ScriptType::Movie, id, 0);
        }
    }

    // -------------------------------------------------------------------------
    // Draining
    // -------------------------------------------------------------------------

    fn apply_signals(&mut self, signals: Signals) {
        for (event, code) in signals.primary_handlers {
            let result = self.set_primary_event_handler(event, &code);
            for err in result.errors() {
                warn!("primary handler for {} does not compile: {}", event, err);
            }
        }
        self.deferred.extend(signals.raised);
    }

    fn register_deferred(
        &mut self,
        score: &dyn Score,
        executor: &mut dyn HandlerExecutor,
    ) -> Result<(), DispatchError> {
        while let Some(event) = self.deferred.pop_front() {
            self.register_event(event, score, executor)?;
        }
        Ok(())
    }

    /// Drains the queue to empty. Returns how many handlers and scripts ran.
    pub fn process_events(
        &mut self,
        score: &dyn Score,
        executor: &mut dyn HandlerExecutor,
    ) -> Result<usize, DispatchError> {
        let mut executed = 0;
        self.register_deferred(score, executor)?;

        while let Some(entry) = self.queue.pop() {
            if score.stop_play() && entry.event != LEvent::StopMovie {
                debug!("play stopped, dropping {}", entry.event);
                continue;
            }
            if self.suppressed_raise == Some(entry.raise) {
                continue;
            }
            if let Some(signals) = self.process_entry(&entry, executor)? {
                executed += 1;
                if signals.dont_pass {
                    self.suppressed_raise = Some(entry.raise);
                }
                self.apply_signals(signals);
            }
            self.register_deferred(score, executor)?;
        }

        self.suppressed_raise = None;
        Ok(executed)
    }

    /// Runs one queue entry. `None` when nothing answered it.
    fn process_entry(
        &mut self,
        entry: &QueuedEvent,
        executor: &mut dyn HandlerExecutor,
    ) -> Result<Option<Signals>, DispatchError> {
        if entry.entity < 0 {
            return Ok(None);
        }
        let event = entry.event;
        let fail = |source| DispatchError::Handler { event, source };

        if let Some(handler) = self.archives.lookup_event_handler(event, entry.entity) {
            debug!(
                "processEvent({}, {:?}, {}): executing event handler",
                event, entry.script_type, entry.entity
            );
            let signals = executor
                .execute_handler(&self.archives, &handler, event)
                .map_err(fail)?;
            return Ok(Some(signals));
        }

        let archive = self.archives.current_kind();
        if self.config.version < 4
            && event == LEvent::None
            && self
                .archives
                .get(archive)
                .script_context(entry.script_type, entry.entity)
                .is_some()
        {
            debug!(
                "processEvent({}, {:?}, {}): executing event script",
                event, entry.script_type, entry.entity
            );
            let signals = executor
                .execute_script(&self.archives, archive, entry.script_type, entry.entity)
                .map_err(fail)?;
            return Ok(Some(signals));
        }

        debug!(
            "processEvent({}, {:?}, {}): no handler",
            event, entry.script_type, entry.entity
        );
        Ok(None)
    }

    /// Registers `event` and drains the queue.
    pub fn process_event(
        &mut self,
        event: LEvent,
        score: &dyn Score,
        executor: &mut dyn HandlerExecutor,
    ) -> Result<DispatchReport, DispatchError> {
        let suppressed = self.register_event(event, score, executor)?;
        let executed = self.process_events(score, executor)?;
        Ok(DispatchReport {
            suppressed,
            executed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct TestScore {
        frame: i32,
        action: i32,
        mouse: Option<SpriteInfo>,
        sprites: Vec<SpriteInfo>,
        stopped: bool,
    }

    impl Score for TestScore {
        fn current_frame(&self) -> i32 {
            self.frame
        }
        fn frame_action_id(&self) -> i32 {
            self.action
        }
        fn mouse_sprite(&self) -> Option<SpriteInfo> {
            self.mouse
        }
        fn enabled_sprites(&self) -> Vec<SpriteInfo> {
            self.sprites.clone()
        }
        fn stop_play(&self) -> bool {
            self.stopped
        }
    }

    /// Records calls; optionally stops propagation from chosen entities.
    #[derive(Default)]
    struct Recorder {
        calls: Vec<(LEvent, ScriptType, i32)>,
        scripts: Vec<(ScriptType, i32)>,
        dont_pass_from: Vec<i32>,
        primary_dont_pass: bool,
    }

    impl HandlerExecutor for Recorder {
        fn execute_handler(
            &mut self,
            _archives: &Archives,
            handler: &HandlerRef,
            event: LEvent,
        ) -> Result<Signals, RuntimeError> {
            let entry = &handler.entry;
            self.calls.push((event, entry.script_type, entry.entity));
            Ok(Signals {
                dont_pass: self.dont_pass_from.contains(&entry.entity),
                ..Signals::default()
            })
        }

        fn execute_script(
            &mut self,
            _archives: &Archives,
            _archive: ArchiveKind,
            script_type: ScriptType,
            entity: i32,
        ) -> Result<Signals, RuntimeError> {
            self.scripts.push((script_type, entity));
            Ok(Signals {
                dont_pass: script_type == ScriptType::Global && self.primary_dont_pass,
                ..Signals::default()
            })
        }
    }

    fn dispatcher(version: u16) -> EventDispatcher {
        EventDispatcher::new(
            DispatcherConfig { version },
            CompilerOptions::for_version(version),
        )
    }

    fn add(d: &mut EventDispatcher, st: ScriptType, id: i32, src: &str) {
        let result = d.add_code(src, ArchiveKind::Main, st, id);
        assert!(!result.had_error(), "{:?}", result.diagnostics);
    }

    #[test]
    fn test_input_event_order() {
        let mut d = dispatcher(4);
        add(&mut d, ScriptType::Score, 10, "on mouseUp\nend");
        add(&mut d, ScriptType::Cast, 5, "on mouseUp\nend");
        add(&mut d, ScriptType::Score, 20, "on mouseUp\nend");
        add(&mut d, ScriptType::Movie, 1, "on mouseUp\nend");
        let score = TestScore {
            action: 20,
            mouse: Some(SpriteInfo {
                channel: 1,
                script_id: 10,
                cast_id: 5,
                immediate: false,
            }),
            ..TestScore::default()
        };
        let mut rec = Recorder::default();
        let report = d.process_event(LEvent::MouseUp, &score, &mut rec).unwrap();
        assert_eq!(report.executed, 4);
        let entities: Vec<i32> = rec.calls.iter().map(|c| c.2).collect();
        assert_eq!(entities, vec![10, 5, 20, 1]);
    }

    #[test]
    fn test_only_first_movie_script_runs() {
        let mut d = dispatcher(4);
        add(&mut d, ScriptType::Movie, 7, "on startMovie\nend");
        add(&mut d, ScriptType::Movie, 2, "on startMovie\nend");
        add(&mut d, ScriptType::Movie, 1, "on other\nend");
        let mut rec = Recorder::default();
        d.process_event(LEvent::StartMovie, &TestScore::default(), &mut rec)
            .unwrap();
        assert_eq!(rec.calls, vec![(LEvent::StartMovie, ScriptType::Movie, 2)]);
    }

    #[test]
    fn test_primary_handler_dont_pass() {
        let mut d = dispatcher(4);
        add(&mut d, ScriptType::Movie, 1, "on mouseDown\nend");
        assert!(!d.set_primary_event_handler(LEvent::MouseDown, "dontPassEvent").had_error());
        let mut rec = Recorder {
            primary_dont_pass: true,
            ..Recorder::default()
        };
        let report = d
            .process_event(LEvent::MouseDown, &TestScore::default(), &mut rec)
            .unwrap();
        assert!(report.suppressed);
        assert_eq!(report.executed, 0);
        assert_eq!(rec.scripts, vec![(ScriptType::Global, LEvent::MouseDown.id() as i32)]);
        assert!(rec.calls.is_empty());

        // the flag does not leak into the next raise
        rec.primary_dont_pass = false;
        let report = d
            .process_event(LEvent::MouseDown, &TestScore::default(), &mut rec)
            .unwrap();
        assert!(!report.suppressed);
        assert_eq!(rec.calls.len(), 1);
    }

    #[test]
    fn test_only_primary_events_consult_when_handler() {
        let mut d = dispatcher(4);
        for event in [LEvent::Timeout, LEvent::ExitFrame, LEvent::KeyUp] {
            assert!(!d.set_primary_event_handler(event, "dontPassEvent").had_error());
        }
        let mut rec = Recorder {
            primary_dont_pass: true,
            ..Recorder::default()
        };
        let score = TestScore::default();
        assert!(d.process_event(LEvent::Timeout, &score, &mut rec).unwrap().suppressed);
        assert!(d.process_event(LEvent::KeyUp, &score, &mut rec).unwrap().suppressed);
        assert!(!d.process_event(LEvent::ExitFrame, &score, &mut rec).unwrap().suppressed);
        assert_eq!(
            rec.scripts,
            vec![
                (ScriptType::Global, LEvent::Timeout.id() as i32),
                (ScriptType::Global, LEvent::KeyUp.id() as i32),
            ]
        );
    }

    #[test]
    fn test_frame_event_entities() {
        let mut d = dispatcher(4);
        add(&mut d, ScriptType::Score, 3, "on idle\nend");
        add(&mut d, ScriptType::Score, 40, "on exitFrame\nend");
        let score = TestScore {
            frame: 3,
            action: 40,
            ..TestScore::default()
        };
        let mut rec = Recorder::default();
        d.process_event(LEvent::Idle, &score, &mut rec).unwrap();
        d.process_event(LEvent::ExitFrame, &score, &mut rec).unwrap();
        assert_eq!(
            rec.calls,
            vec![
                (LEvent::Idle, ScriptType::Score, 3),
                (LEvent::ExitFrame, ScriptType::Score, 40)
            ]
        );
    }

    #[test]
    fn test_begin_sprite_for_each_enabled_sprite() {
        let mut d = dispatcher(4);
        add(&mut d, ScriptType::Cast, 8, "on beginSprite\nend");
        add(&mut d, ScriptType::Cast, 9, "on beginSprite\nend");
        let score = TestScore {
            sprites: vec![
                SpriteInfo {
                    channel: 1,
                    cast_id: 8,
                    ..SpriteInfo::default()
                },
                SpriteInfo {
                    channel: 2,
                    cast_id: 9,
                    ..SpriteInfo::default()
                },
            ],
            ..TestScore::default()
        };
        let mut rec = Recorder::default();
        let report = d.process_event(LEvent::BeginSprite, &score, &mut rec).unwrap();
        assert_eq!(report.executed, 2);
    }

    #[test]
    fn test_unhandled_event_queues_nothing() {
        let mut d = dispatcher(4);
        add(&mut d, ScriptType::Movie, 1, "on mouseWithin\nend");
        let mut rec = Recorder::default();
        d.register_event(LEvent::MouseWithin, &TestScore::default(), &mut rec)
            .unwrap();
        assert_eq!(d.event_count(), 0);
    }

    #[test]
    fn test_stop_play_lets_only_stop_movie_through() {
        let mut d = dispatcher(4);
        add(&mut d, ScriptType::Movie, 1, "on startMovie\nend\non stopMovie\nend");
        let score = TestScore {
            stopped: true,
            ..TestScore::default()
        };
        let mut rec = Recorder::default();
        d.register_event(LEvent::StartMovie, &score, &mut rec).unwrap();
        d.register_event(LEvent::StopMovie, &score, &mut rec).unwrap();
        assert_eq!(d.process_events(&score, &mut rec).unwrap(), 1);
        assert_eq!(rec.calls[0].0, LEvent::StopMovie);
    }

    #[test]
    fn test_negative_entity_is_skipped() {
        let mut d = dispatcher(4);
        add(&mut d, ScriptType::Score, -1, "on exitFrame\nend");
        let score = TestScore {
            action: -1,
            ..TestScore::default()
        };
        let mut rec = Recorder::default();
        assert_eq!(
            d.process_event(LEvent::ExitFrame, &score, &mut rec)
                .unwrap()
                .executed,
            0
        );
    }

    #[test]
    fn test_handler_dont_pass_skips_rest_of_raise() {
        let mut d = dispatcher(4);
        add(&mut d, ScriptType::Cast, 5, "on mouseUp\nend");
        add(&mut d, ScriptType::Movie, 1, "on mouseUp\nend");
        let score = TestScore {
            mouse: Some(SpriteInfo {
                cast_id: 5,
                ..SpriteInfo::default()
            }),
            ..TestScore::default()
        };
        let mut rec = Recorder {
            dont_pass_from: vec![5],
            ..Recorder::default()
        };
        let report = d.process_event(LEvent::MouseUp, &score, &mut rec).unwrap();
        assert_eq!(report.executed, 1);
    }

    #[test]
    fn test_d3_mouse_up_runs_cast_script_body() {
        let mut d = dispatcher(3);
        add(&mut d, ScriptType::Cast, 4, "put 1");
        let score = TestScore {
            mouse: Some(SpriteInfo {
                channel: 1,
                script_id: 0,
                cast_id: 4,
                immediate: false,
            }),
            ..TestScore::default()
        };
        let mut rec = Recorder::default();
        let report = d.process_event(LEvent::MouseUp, &score, &mut rec).unwrap();
        assert_eq!(report.executed, 1);
        assert_eq!(rec.scripts, vec![(ScriptType::Cast, 4)]);

        // immediate sprites react on mouse down instead
        let mut rec = Recorder::default();
        d.process_event(LEvent::MouseDown, &score, &mut rec).unwrap();
        assert!(rec.scripts.is_empty());
    }

    #[test]
    fn test_d3_sprite_script_replaces_cast() {
        let mut d = dispatcher(3);
        add(&mut d, ScriptType::Score, 12, "put 1");
        add(&mut d, ScriptType::Cast, 4, "put 2");
        let score = TestScore {
            mouse: Some(SpriteInfo {
                channel: 1,
                script_id: 12,
                cast_id: 4,
                immediate: true,
            }),
            ..TestScore::default()
        };
        let mut rec = Recorder::default();
        d.process_event(LEvent::MouseDown, &score, &mut rec).unwrap();
        assert_eq!(rec.scripts, vec![(ScriptType::Score, 12)]);
    }

    #[test]
    fn test_event2script() {
        assert_eq!(dispatcher(3).event2script(LEvent::EnterFrame), Some(ScriptType::Score));
        assert_eq!(dispatcher(3).event2script(LEvent::ExitFrame), None);
        assert_eq!(dispatcher(4).event2script(LEvent::EnterFrame), None);
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut d = dispatcher(4);
        add(&mut d, ScriptType::Movie, 1, "on startMovie\nend");
        let mut rec = Recorder::default();
        d.register_event(LEvent::StartMovie, &TestScore::default(), &mut rec)
            .unwrap();
        d.clear();
        assert_eq!(d.event_count(), 0);
        assert_eq!(d.process_events(&TestScore::default(), &mut rec).unwrap(), 0);
    }
}

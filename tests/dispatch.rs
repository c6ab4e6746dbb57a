use lingo::bytecode::{CompilerOptions, ScriptType};
use lingo::events::{
    ArchiveKind, DispatchError, DispatcherConfig, EventDispatcher, LEvent, Score, SpriteInfo,
};
use lingo::runtime::Interpreter;

struct Stage {
    mouse: Option<SpriteInfo>,
    sprites: Vec<SpriteInfo>,
}

impl Score for Stage {
    fn current_frame(&self) -> i32 {
        1
    }
    fn frame_action_id(&self) -> i32 {
        0
    }
    fn mouse_sprite(&self) -> Option<SpriteInfo> {
        self.mouse
    }
    fn enabled_sprites(&self) -> Vec<SpriteInfo> {
        self.sprites.clone()
    }
    fn stop_play(&self) -> bool {
        false
    }
}

fn over_cast(cast_id: i32) -> Stage {
    Stage {
        mouse: Some(SpriteInfo {
            channel: 1,
            script_id: 0,
            cast_id,
            immediate: false,
        }),
        sprites: Vec::new(),
    }
}

fn dispatcher() -> EventDispatcher {
    EventDispatcher::new(DispatcherConfig::default(), CompilerOptions::default())
}

fn add(d: &mut EventDispatcher, script_type: ScriptType, id: i32, source: &str) {
    let result = d.add_code(source, ArchiveKind::Main, script_type, id);
    assert!(!result.had_error(), "{:?}", result.diagnostics);
}

#[test]
fn mouse_up_runs_cast_then_movie() {
    let mut d = dispatcher();
    add(&mut d, ScriptType::Cast, 5, "on mouseUp\n  put \"cast\"\nend");
    add(&mut d, ScriptType::Movie, 1, "on mouseUp\n  put \"movie\"\nend");

    let mut vm = Interpreter::new();
    let report = d
        .process_event(LEvent::MouseUp, &over_cast(5), &mut vm)
        .unwrap();

    assert!(!report.suppressed);
    assert_eq!(report.executed, 2);
    assert_eq!(vm.output(), &["cast".to_string(), "movie".to_string()]);
    assert_eq!(d.event_count(), 0);
}

#[test]
fn dont_pass_in_cast_handler_stops_movie() {
    let mut d = dispatcher();
    add(&mut d, ScriptType::Cast, 5, "on mouseUp\n  put \"cast\"\n  dontPassEvent\nend");
    add(&mut d, ScriptType::Movie, 1, "on mouseUp\n  put \"movie\"\nend");

    let mut vm = Interpreter::new();
    let report = d
        .process_event(LEvent::MouseUp, &over_cast(5), &mut vm)
        .unwrap();

    assert_eq!(report.executed, 1);
    assert_eq!(vm.output(), &["cast".to_string()]);
}

#[test]
fn only_first_movie_script_runs() {
    let mut d = dispatcher();
    add(&mut d, ScriptType::Movie, 7, "on startMovie\n  put 7\nend");
    add(&mut d, ScriptType::Movie, 2, "on startMovie\n  put 2\nend");

    let mut vm = Interpreter::new();
    let report = d
        .process_event(LEvent::StartMovie, &over_cast(5), &mut vm)
        .unwrap();

    assert_eq!(report.executed, 1);
    assert_eq!(vm.output(), &["2".to_string()]);
}

#[test]
fn queued_events_drain_in_order() {
    let mut d = dispatcher();
    add(&mut d, ScriptType::Movie, 1, "on keyDown\n  put \"key\"\nend\non mouseDown\n  put \"mouse\"\nend");

    let stage = Stage {
        mouse: None,
        sprites: Vec::new(),
    };
    let mut vm = Interpreter::new();
    d.register_event(LEvent::MouseDown, &stage, &mut vm).unwrap();
    d.register_event(LEvent::KeyDown, &stage, &mut vm).unwrap();
    // frame script and movie script for each
    assert_eq!(d.event_count(), 4);

    let executed = d.process_events(&stage, &mut vm).unwrap();
    assert_eq!(executed, 2);
    assert_eq!(vm.output(), &["mouse".to_string(), "key".to_string()]);
}

#[test]
fn primary_handler_can_stop_an_input_event() {
    let mut d = dispatcher();
    add(&mut d, ScriptType::Cast, 5, "on mouseUp\n  put \"cast\"\nend");
    add(&mut d, ScriptType::Movie, 1, "on mouseUp\n  put \"movie\"\nend");
    let result = d.set_primary_event_handler(LEvent::MouseUp, "dontPassEvent");
    assert!(!result.had_error());

    let mut vm = Interpreter::new();
    let stage = over_cast(5);
    let report = d.process_event(LEvent::MouseUp, &stage, &mut vm).unwrap();
    assert!(report.suppressed);
    assert_eq!(report.executed, 0);
    assert!(vm.output().is_empty());

    // the flag does not outlive the registration that set it
    let report = d.process_event(LEvent::MouseDown, &stage, &mut vm).unwrap();
    assert!(!report.suppressed);
}

#[test]
fn when_statement_installs_primary_handler() {
    let mut d = dispatcher();
    add(
        &mut d,
        ScriptType::Movie,
        1,
        "on startMovie\n  when mouseDown then put \"primary\"\nend",
    );

    let mut vm = Interpreter::new();
    let stage = over_cast(5);
    d.process_event(LEvent::StartMovie, &stage, &mut vm).unwrap();
    assert!(d.archives().primary_handler_script(LEvent::MouseDown).is_some());

    d.process_event(LEvent::MouseDown, &stage, &mut vm).unwrap();
    assert_eq!(vm.output(), &["primary".to_string()]);
}

#[test]
fn begin_sprite_reaches_each_enabled_cast() {
    let mut d = dispatcher();
    add(&mut d, ScriptType::Cast, 3, "on beginSprite\n  put 3\nend");
    add(&mut d, ScriptType::Cast, 4, "on beginSprite\n  put 4\nend");

    let stage = Stage {
        mouse: None,
        sprites: vec![
            SpriteInfo {
                channel: 1,
                script_id: 0,
                cast_id: 4,
                immediate: false,
            },
            SpriteInfo {
                channel: 2,
                script_id: 0,
                cast_id: 3,
                immediate: false,
            },
        ],
    };
    let mut vm = Interpreter::new();
    let report = d.process_event(LEvent::BeginSprite, &stage, &mut vm).unwrap();
    assert_eq!(report.executed, 2);
    assert_eq!(vm.output(), &["4".to_string(), "3".to_string()]);
}

#[test]
fn runtime_error_surfaces_with_event() {
    let mut d = dispatcher();
    add(&mut d, ScriptType::Movie, 1, "on mouseUp\n  put 1 / 0\nend");

    let mut vm = Interpreter::new();
    let err = d
        .process_event(LEvent::MouseUp, &over_cast(5), &mut vm)
        .unwrap_err();
    match err {
        DispatchError::Handler { event, source } => {
            assert_eq!(event, LEvent::MouseUp);
            assert!(source.message.contains("division by zero"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

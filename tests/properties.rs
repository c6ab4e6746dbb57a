use lingo::bytecode::assembler::Assembler;
use lingo::bytecode::scope::VarKind;
use lingo::bytecode::stack_check::{check_handler_stack, check_ops};
use lingo::bytecode::{CompileError, Compiler, CompilerOptions, Op, ScriptType, compile};
use lingo::events::{ArchiveKind, Archives};
use lingo::lang::value::Value;
use lingo::runtime::Interpreter;

fn compile_ok(source: &str) -> lingo::bytecode::ScriptContext {
    let result = compile(source, &CompilerOptions::default());
    assert!(!result.had_error(), "{:?}", result.diagnostics);
    result.script
}

fn call(source: &str, handler: &str, args: Vec<Value>) -> Value {
    let mut archives = Archives::new();
    let result = archives.add_code(
        &Compiler::new(CompilerOptions::default()),
        source,
        ArchiveKind::Main,
        ScriptType::Movie,
        1,
    );
    assert!(!result.had_error(), "{:?}", result.diagnostics);
    Interpreter::new()
        .call_handler(&archives, ArchiveKind::Main, ScriptType::Movie, 1, handler, args)
        .unwrap()
}

#[test]
fn first_classification_wins() {
    let mut asm = Assembler::new();
    asm.start_def();
    asm.in_def();
    asm.classify("count", VarKind::Local);
    asm.classify("COUNT", VarKind::Global);
    asm.classify("Count", VarKind::Property);
    assert_eq!(asm.scope().unwrap().kind("count"), Some(VarKind::Local));
}

#[test]
fn first_classification_wins_in_compiled_handler() {
    let ctx = compile_ok("on f\n  global g\n  g = 1\n  x = 2\n  put x into x\nend");
    let f = ctx.handler("f").unwrap();
    assert_eq!(f.var_kind("g"), Some(VarKind::Global));
    assert_eq!(f.var_kind("x"), Some(VarKind::Local));
}

#[test]
fn repeat_in_list_leaves_stack_as_found() {
    let source = "on f l\n  repeat with x in l\n    put x\n  end repeat\n  return 7\nend";
    let ctx = compile_ok(source);
    let code = &ctx.handler("f").unwrap().code;
    check_handler_stack(code).unwrap();

    let heights = check_ops(code).unwrap();
    let drop = code
        .iter()
        .position(|op| *op == Op::StackDrop(3))
        .unwrap();
    assert_eq!(heights[drop], Some(3));
    assert_eq!(heights[drop + 1], Some(0));

    assert_eq!(call(source, "f", vec![Value::List(vec![])]), Value::Integer(7));
    assert_eq!(
        call(source, "f", vec![Value::List(vec![Value::Integer(1)])]),
        Value::Integer(7)
    );
}

#[test]
fn forward_jumps_are_patched_once() {
    let mut asm = Assembler::new();
    let site = asm.emit_forward_jump_if_z();
    asm.emit(Op::IntPush(1));
    assert_eq!(asm.unresolved(), vec![site]);
    assert!(asm.check_complete().is_err());

    asm.patch_here(site).unwrap();
    assert!(asm.check_complete().is_ok());
    assert_eq!(asm.code()[site], Op::JumpIfZ(2));
    assert_eq!(
        asm.patch(site, 0),
        Err(CompileError::DoublePatch { site })
    );
}

#[test]
fn compiled_jumps_stay_in_range() {
    let ctx = compile_ok(
        "on f\n  repeat with i = 1 to 3\n    if i = 2 then\n      next repeat\n    else if i = 3 then\n      exit repeat\n    end if\n  end repeat\n  repeat while 0\n  end repeat\nend",
    );
    let code = &ctx.handler("f").unwrap().code;
    for (ip, op) in code.iter().enumerate() {
        if let Op::Jump(offset) | Op::JumpIfZ(offset) = op {
            assert_ne!(*offset, 0, "unpatched jump at {}", ip);
            let target = ip as i64 + *offset as i64;
            assert!(target >= 0 && target as usize <= code.len());
        }
    }
    check_handler_stack(code).unwrap();
}

#[test]
fn small_program_round_trip() {
    let source = "on foo\n  return 1 + 2\nend foo";
    let ctx = compile_ok(source);
    let foo = ctx.handler("foo").unwrap();
    assert_eq!(foo.name, "foo");
    assert_eq!(foo.nargs, 0);
    assert_eq!(call(source, "foo", vec![]), Value::Integer(3));
}

#[test]
fn else_if_cascade_takes_matching_branch() {
    let body = "if 1=2 then\n  return 10\nelse if 1=1 then\n  return 20\nelse\n  return 30\nend if";
    compile_ok(body);
    let source = format!("on pick\n{}\nend", body);
    assert_eq!(call(&source, "pick", vec![]), Value::Integer(20));
}

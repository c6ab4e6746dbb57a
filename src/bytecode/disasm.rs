use crate::bytecode::ir::{Handler, ScriptContext};
use crate::bytecode::op::{ChunkKind, GoTarget, Op, PutMode};
use std::fmt::Write;

/// Disassemble a whole compiled script: top-level code, handlers
/// (alphabetically) and factory methods.
pub fn disassemble_script(ctx: &ScriptContext) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "=== SCRIPT {:?} #{} ===",
        ctx.script_type, ctx.id
    );
    if !ctx.globals.is_empty() {
        let _ = writeln!(out, "globals: {}", ctx.globals.join(", "));
    }
    if !ctx.properties.is_empty() {
        let _ = writeln!(out, "properties: {}", ctx.properties.join(", "));
    }
    out.push('\n');

    if !ctx.script.is_empty() {
        write_code_object(&mut out, "<script>", &ctx.script);
    }
    for handler in ctx.handlers.values() {
        write_handler(&mut out, &handler.name, handler);
    }
    for factory in ctx.factories.values() {
        for method in factory.methods.values() {
            let label = format!("{}.{}", factory.name, method.name);
            write_handler(&mut out, &label, method);
        }
    }
    out
}

fn write_handler(out: &mut String, label: &str, handler: &Handler) {
    let title = if handler.args.is_empty() {
        label.to_string()
    } else {
        format!("{} {}", label, handler.args.join(", "))
    };
    write_code_object(out, &title, &handler.code);
}

fn write_code_object(out: &mut String, name: &str, ops: &[Op]) {
    let _ = writeln!(out, "════════════════════════════════════════");
    let _ = writeln!(out, " {}", name);
    let _ = writeln!(out, " {} instructions", ops.len());
    let _ = writeln!(out, "════════════════════════════════════════");
    out.push_str(&disassemble(ops));
    out.push('\n');
}

/// Disassemble a slice of ops, one line per instruction. Jump targets are
/// marked with `►`.
pub fn disassemble(ops: &[Op]) -> String {
    let jump_targets = collect_jump_targets(ops);
    let mut out = String::new();

    for (ip, op) in ops.iter().enumerate() {
        let marker = if jump_targets.contains(&ip) { "► " } else { "  " };
        let _ = writeln!(out, "{:04} {}{}", ip, marker, format_op(op, ip));
    }
    out
}

fn collect_jump_targets(ops: &[Op]) -> Vec<usize> {
    let mut targets = Vec::new();

    for (ip, op) in ops.iter().enumerate() {
        if let Some(offset) = op.jump_offset() {
            let target = (ip as i32 + offset) as usize;
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    targets
}

fn jump_text(name: &str, ip: usize, offset: i32) -> String {
    let target = ip as i32 + offset;
    let arrow = if offset < 0 { "↑" } else { "↓" };
    format!("{:<12}{:+} {} (→ {:04})", name, offset, arrow, target)
}

fn put_mode(mode: PutMode) -> &'static str {
    match mode {
        PutMode::Into => "into",
        PutMode::After => "after",
        PutMode::Before => "before",
    }
}

fn chunk_name(kind: ChunkKind) -> &'static str {
    match kind {
        ChunkKind::Char => "char",
        ChunkKind::Word => "word",
        ChunkKind::Item => "item",
        ChunkKind::Line => "line",
    }
}

pub fn format_op(op: &Op, ip: usize) -> String {
    match op {
        // Literals
        Op::IntPush(n) => format!("INTPUSH     {}", n),
        Op::FloatPush(n) => format!("FLOATPUSH   {}", n),
        Op::StringPush(s) => format!("STRINGPUSH  \"{}\"", s),
        Op::SymbolPush(s) => format!("SYMBOLPUSH  #{}", s),
        Op::ArrayPush(n) => format!("ARRAYPUSH   {}", n),
        Op::PropArrayPush(n) => format!("PROPARRAYPUSH {}", n),

        // Variables
        Op::Eval(name) => format!("EVAL        {}", name),
        Op::Assign { name, mode } => format!("ASSIGN      {} {}", put_mode(*mode), name),

        // Entities and properties
        Op::TheEntityPush { field } => format!("THEPUSH     the {}", field),
        Op::TheEntityOfPush { field, entity } => match entity {
            Some(entity) => format!("THEPUSH     the {} of {}", field, entity),
            None => format!("THEPUSH     the {} of", field),
        },
        Op::TheEntityAssign { field } => format!("THEASSIGN   the {}", field),
        Op::TheEntityOfAssign { field, entity } => match entity {
            Some(entity) => format!("THEASSIGN   the {} of {}", field, entity),
            None => format!("THEASSIGN   the {} of", field),
        },
        Op::ObjectPropPush { object, prop } => format!("PROPPUSH    {}.{}", object, prop),
        Op::ObjectPropAssign { object, prop } => format!("PROPASSIGN  {}.{}", object, prop),

        // Chunks
        Op::ChunkOf(kind) => format!("CHUNKOF     {}", chunk_name(*kind)),
        Op::ChunkAssign { kind, name, mode } => format!(
            "CHUNKASSIGN {} {} of {}",
            put_mode(*mode),
            chunk_name(*kind),
            name
        ),

        // Stack operations
        Op::Swap => "SWAP".to_string(),
        Op::StackPeek(n) => format!("STACKPEEK   {}", n),
        Op::StackDrop(n) => format!("STACKDROP   {}", n),

        // Arithmetic
        Op::Add => "ADD".to_string(),
        Op::Sub => "SUB".to_string(),
        Op::Mul => "MUL".to_string(),
        Op::Div => "DIV".to_string(),
        Op::Mod => "MOD".to_string(),
        Op::Negate => "NEGATE".to_string(),

        // Strings
        Op::Ampersand => "AMPERSAND".to_string(),
        Op::Concat => "CONCAT".to_string(),
        Op::Contains => "CONTAINS".to_string(),
        Op::Starts => "STARTS".to_string(),

        // Comparison
        Op::Eq => "EQ".to_string(),
        Op::Neq => "NEQ".to_string(),
        Op::Gt => "GT".to_string(),
        Op::Lt => "LT".to_string(),
        Op::Ge => "GE".to_string(),
        Op::Le => "LE".to_string(),

        // Logic
        Op::And => "AND".to_string(),
        Op::Or => "OR".to_string(),
        Op::Not => "NOT".to_string(),

        Op::Intersects => "INTERSECTS".to_string(),
        Op::Within => "WITHIN".to_string(),

        // Control flow
        Op::Jump(offset) => jump_text("JUMP", ip, *offset),
        Op::JumpIfZ(offset) => jump_text("JUMPIFZ", ip, *offset),

        Op::Call { name, argc } => format!("CALL        {} ({} args)", name, argc),
        Op::CallFunc { name, argc } => format!("CALLFUNC    {} ({} args)", name, argc),
        Op::Return => "RETURN".to_string(),
        Op::Exit => "EXIT".to_string(),

        // Movie control
        Op::PrintTop => "PRINTTOP".to_string(),
        Op::Goto => "GOTO".to_string(),
        Op::Go(target) => match target {
            GoTarget::Loop => "GO          loop".to_string(),
            GoTarget::Next => "GO          next".to_string(),
            GoTarget::Previous => "GO          previous".to_string(),
        },
        Op::Play => "PLAY".to_string(),
        Op::PlayDone => "PLAYDONE".to_string(),
        Op::Tell => "TELL".to_string(),
        Op::TellDone => "TELLDONE".to_string(),
        Op::WhenCode { event, code } => format!("WHENCODE    {} \"{}\"", event, code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jump_targets_are_marked() {
        let ops = vec![Op::IntPush(0), Op::JumpIfZ(2), Op::IntPush(1), Op::Exit];
        let text = disassemble(&ops);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[3].starts_with("0003 ► EXIT"));
        assert!(lines[1].contains("+2 ↓ (→ 0003)"));
    }

    #[test]
    fn test_backward_jump_arrow() {
        let ops = vec![Op::Exit, Op::Jump(-1)];
        let text = disassemble(&ops);
        assert!(text.contains("-1 ↑ (→ 0000)"));
    }

    #[test]
    fn test_format_assign() {
        let op = Op::Assign {
            name: "x".to_string(),
            mode: PutMode::After,
        };
        assert_eq!(format_op(&op, 0), "ASSIGN      after x");
    }
}

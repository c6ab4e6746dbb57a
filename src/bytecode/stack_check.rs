use crate::bytecode::Op;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
#[error("stack-check error: {message}")]
pub struct StackCheckError {
    pub message: String,
}

impl StackCheckError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Returns (pops, pushes) for an op.
fn effect(op: &Op) -> (i32, i32) {
    use Op::*;
    match op {
        IntPush(_) | FloatPush(_) | StringPush(_) | SymbolPush(_) => (0, 1),
        ArrayPush(n) => (*n as i32, 1),
        PropArrayPush(n) => (2 * *n as i32, 1),

        Eval(_) => (0, 1),
        Assign { .. } => (1, 0),

        TheEntityPush { .. } => (0, 1),
        TheEntityOfPush { .. } => (1, 1),
        TheEntityAssign { .. } => (1, 0),
        TheEntityOfAssign { .. } => (2, 0),
        ObjectPropPush { .. } => (0, 1),
        ObjectPropAssign { .. } => (1, 0),

        ChunkOf(_) => (3, 1),
        ChunkAssign { .. } => (3, 0),

        Swap => (2, 2),
        // peek n needs n+1 values and leaves them plus the copy
        StackPeek(n) => (*n as i32 + 1, *n as i32 + 2),
        StackDrop(n) => (*n as i32, 0),

        Add | Sub | Mul | Div | Mod => (2, 1),
        Negate => (1, 1),
        Ampersand | Concat | Contains | Starts => (2, 1),
        Eq | Neq | Gt | Lt | Ge | Le => (2, 1),
        And | Or => (2, 1),
        Not => (1, 1),
        Intersects | Within => (2, 1),

        Jump(_) => (0, 0),
        JumpIfZ(_) => (1, 0),

        Call { argc, .. } => (*argc as i32, 0),
        CallFunc { argc, .. } => (*argc as i32, 1),
        Return => (1, 0),
        Exit => (0, 0),

        PrintTop => (1, 0),
        Goto => (1, 0),
        Go(_) => (0, 0),
        Play => (1, 0),
        PlayDone => (0, 0),
        Tell => (1, 0),
        TellDone => (0, 0),
        WhenCode { .. } => (0, 0),
    }
}

/// Instructions control can reach next from `ip`.
fn successors(op: &Op, ip: usize) -> Vec<i64> {
    let ip = ip as i64;
    match op {
        Op::Jump(offset) => vec![ip + *offset as i64],
        Op::JumpIfZ(offset) => vec![ip + 1, ip + *offset as i64],
        Op::Return | Op::Exit => vec![],
        _ => vec![ip + 1],
    }
}

/// Checks stack effects along every control-flow path.
///
/// Starting from `initial_height`, follows jumps through the code and
/// verifies that no path underflows, every jump lands inside the code (or
/// exactly at its end), and every instruction is reached with a single stack
/// height. Returns the height on entry to each instruction, `None` for
/// unreachable ones.
pub fn check_ops_with_initial(
    ops: &[Op],
    initial_height: i32,
) -> Result<Vec<Option<i32>>, StackCheckError> {
    // one extra slot for falling off the end
    let mut heights: Vec<Option<i32>> = vec![None; ops.len() + 1];
    let mut worklist: Vec<usize> = Vec::new();

    if ops.is_empty() {
        return Ok(Vec::new());
    }
    heights[0] = Some(initial_height);
    worklist.push(0);

    while let Some(ip) = worklist.pop() {
        if ip == ops.len() {
            continue;
        }
        let op = &ops[ip];
        let mut h = heights[ip].unwrap_or(initial_height);

        let (pops, pushes) = effect(op);
        h -= pops;
        if h < 0 {
            return Err(StackCheckError::new(format!(
                "stack underflow at ip={}, op={:?}, needed {} items",
                ip, op, pops
            )));
        }
        h += pushes;

        for next in successors(op, ip) {
            if next < 0 || next as usize > ops.len() {
                return Err(StackCheckError::new(format!(
                    "jump out of bounds at ip={}, op={:?}, target={}",
                    ip, op, next
                )));
            }
            let next = next as usize;
            match heights[next] {
                None => {
                    heights[next] = Some(h);
                    worklist.push(next);
                }
                Some(seen) if seen != h => {
                    return Err(StackCheckError::new(format!(
                        "stack height mismatch at ip={}: {} vs {} (from ip={})",
                        next, seen, h, ip
                    )));
                }
                Some(_) => {}
            }
        }
    }

    heights.truncate(ops.len());
    Ok(heights)
}

/// Check stack effects starting from empty stack.
pub fn check_ops(ops: &[Op]) -> Result<Vec<Option<i32>>, StackCheckError> {
    check_ops_with_initial(ops, 0)
}

/// Checks a statement-level body: every `Exit` must be reached with an
/// empty stack, and every `Return` with exactly its return value.
pub fn check_handler_stack(ops: &[Op]) -> Result<(), StackCheckError> {
    let heights = check_ops(ops)?;
    for (ip, op) in ops.iter().enumerate() {
        let expected = match op {
            Op::Exit => 0,
            Op::Return => 1,
            _ => continue,
        };
        if let Some(h) = heights[ip] {
            if h != expected {
                return Err(StackCheckError::new(format!(
                    "{:?} at ip={} reached with stack height {}",
                    op, ip, h
                )));
            }
        }
    }
    Ok(())
}

use serde::{Deserialize, Serialize};

// =============================================================================
// OP - Bytecode instructions
// =============================================================================

/// How `put` combines a value with its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PutMode {
    Into,
    After,
    Before,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkKind {
    Char,
    Word,
    Item,
    Line,
}

/// Relative playback targets for `go`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoTarget {
    Loop,
    Next,
    Previous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    // literals
    IntPush(i64),
    FloatPush(f64),
    StringPush(String),
    SymbolPush(String),
    /// ( a1 .. an -- [a1, .., an] )
    ArrayPush(u32),
    /// ( k1 v1 .. kn vn -- [k1: v1, ..] )
    PropArrayPush(u32),

    // variables
    /// ( -- value )
    Eval(String),
    /// ( value -- )
    Assign { name: String, mode: PutMode },

    // `the` entities and object properties
    /// ( -- value )
    TheEntityPush { field: String },
    /// ( id -- value )
    TheEntityOfPush {
        field: String,
        entity: Option<String>,
    },
    /// ( value -- )
    TheEntityAssign { field: String },
    /// ( value id -- )
    TheEntityOfAssign {
        field: String,
        entity: Option<String>,
    },
    /// ( -- value )
    ObjectPropPush { object: String, prop: String },
    /// ( value -- )
    ObjectPropAssign { object: String, prop: String },

    // chunks
    /// ( from to string -- chunk ). `to` is 0 for a single chunk.
    ChunkOf(ChunkKind),
    /// ( value from to -- )
    ChunkAssign {
        kind: ChunkKind,
        name: String,
        mode: PutMode,
    },

    // stack ops
    Swap,
    /// Copies the n-th value from the top (0 = top).
    StackPeek(u32),
    StackDrop(u32),

    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Negate,

    // strings
    Ampersand,
    Concat,
    Contains,
    Starts,

    // comparison
    Eq,
    Neq,
    Gt,
    Lt,
    Ge,
    Le,

    // logic
    And,
    Or,
    Not,

    // sprites
    Intersects,
    Within,

    // ==========================================================================
    // Jump instructions
    // ==========================================================================
    /// Unconditional relative jump: the target is this instruction's index
    /// plus the offset.
    Jump(i32),

    /// Pop a value, jump if it is zero. Otherwise continue to the next instruction.
    JumpIfZ(i32),

    // calls
    /// Procedure call, result discarded. ( a1 .. an -- )
    Call { name: String, argc: u32 },
    /// Function call. ( a1 .. an -- result )
    CallFunc { name: String, argc: u32 },
    /// Leave the handler with a value. ( value -- )
    Return,
    /// Leave the handler with no value.
    Exit,

    // movie control
    /// ( value -- )
    PrintTop,
    /// ( frame -- )
    Goto,
    Go(GoTarget),
    /// ( frame -- )
    Play,
    PlayDone,
    /// ( target -- )
    Tell,
    TellDone,
    /// Installs `code` as the primary handler of `event`.
    WhenCode { event: String, code: String },
}

impl Op {
    /// Relative offset of a jump instruction.
    pub fn jump_offset(&self) -> Option<i32> {
        match self {
            Op::Jump(offset) | Op::JumpIfZ(offset) => Some(*offset),
            _ => None,
        }
    }

    pub fn is_jump(&self) -> bool {
        self.jump_offset().is_some()
    }
}
